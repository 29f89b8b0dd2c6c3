//! Error types for the rowcast rendering pipeline.
//!
//! The core operations (`parse`, `compile`, `render`, `run_job`) never fail:
//! bad references degrade to the `"ERR"` sentinel one segment at a time.
//! The types below cover the outer surfaces around that core:
//!
//! - [`TextError`] - Reading and decoding raw input
//! - [`PatternError`] - Structural problems reported by strict compilation
//! - [`FunctionError`] - A native function could not produce a value
//! - [`JobError`] - Off-thread job orchestration
//! - [`ServerError`] - HTTP surface
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Raw Text Errors
// =============================================================================

/// Errors while reading or decoding delimited text.
#[derive(Debug, Error)]
pub enum TextError {
    /// Failed to read file.
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    /// Bytes could not be decoded with the detected encoding.
    #[error("Failed to decode input as {encoding}: {message}")]
    Encoding { encoding: String, message: String },
}

// =============================================================================
// Pattern Errors
// =============================================================================

/// Structural problems in a pattern string.
///
/// [`crate::pattern::compile`] never returns these; they are surfaced by
/// [`crate::pattern::diagnose`] and [`crate::pattern::compile_strict`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// A `$(` or `@name(` construct has no matching `)`.
    #[error("Unbalanced parenthesis: construct opened at byte {position} is never closed")]
    UnbalancedParenthesis { position: usize },
}

// =============================================================================
// Function Errors
// =============================================================================

/// Errors raised by native pattern functions.
///
/// The evaluator turns every one of these into the `"ERR"` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FunctionError {
    /// Argument count outside the function's arity.
    #[error("{name} expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },

    /// An argument could not be interpreted.
    #[error("Invalid argument for {name}: {message}")]
    InvalidArgument { name: String, message: String },

    /// A percent-escape sequence is not valid UTF-8 or not hex.
    #[error("Malformed escape sequence: {0}")]
    MalformedEscape(String),
}

// =============================================================================
// Job Errors
// =============================================================================

/// Errors of the job surfaces that wrap the core.
#[derive(Debug, Error)]
pub enum JobError {
    /// Strict compilation rejected the pattern.
    #[error("Pattern error: {0}")]
    Pattern(#[from] PatternError),

    /// The blocking worker panicked or was cancelled.
    #[error("Worker failed: {0}")]
    Worker(String),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Job error.
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Socket or listener failure.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for text input operations.
pub type TextResult<T> = Result<T, TextError>;

/// Result type for strict pattern compilation.
pub type PatternResult<T> = Result<T, PatternError>;

/// Result type for native functions.
pub type FunctionResult = Result<String, FunctionError>;

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // PatternError -> JobError
        let pattern_err = PatternError::UnbalancedParenthesis { position: 4 };
        let job_err: JobError = pattern_err.into();
        assert!(job_err.to_string().contains("byte 4"));

        // JobError -> ServerError
        let server_err: ServerError = JobError::Worker("cancelled".into()).into();
        assert!(server_err.to_string().contains("cancelled"));
    }

    #[test]
    fn test_function_error_format() {
        let err = FunctionError::Arity {
            name: "slice".into(),
            expected: "2-3".into(),
            got: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("slice"));
        assert!(msg.contains("2-3"));
        assert!(msg.contains("got 1"));
    }
}
