//! # Rowcast - render delimited text through a row pattern
//!
//! Rowcast reads comma- or tab-separated text and renders every data row
//! through a small template language: literal text, `$(column)` references
//! and `@function(args)` calls, nested arbitrarily.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Raw Text   │────▶│   Parser    │────▶│  Evaluator  │────▶│  Rendered   │
//! │ (CSV / TSV) │     │  (Dataset)  │     │  (per row)  │     │    Text     │
//! └─────────────┘     └─────────────┘     └──────▲──────┘     └─────────────┘
//!                                                │
//!                     ┌─────────────┐     ┌──────┴──────┐
//!                     │   Pattern   │────▶│  Compiler   │
//!                     │   String    │     │  (+ cache)  │
//!                     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rowcast::{run_job, JobRequest, SeparatorKind};
//!
//! let request = JobRequest::new("Name,Age\nAda,36", "$(name) (@upper($(age)))", SeparatorKind::Comma, true);
//! let response = run_job(&request).unwrap();
//! assert_eq!(response.rendered_text, "Ada (36)\n");
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`parser`] - Delimited text parsing, encoding and separator detection
//! - [`pattern`] - Pattern compiler, function table and evaluator
//! - [`job`] - Job orchestration
//! - [`cache`] - Prepared program cache
//! - [`api`] - HTTP API server and log stream

// Core modules
pub mod error;

// Parsing
pub mod parser;

// Patterns
pub mod pattern;

// Orchestration
pub mod job;

// Caching
pub mod cache;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    FunctionError,
    JobError,
    JobResult,
    PatternError,
    PatternResult,
    ServerError,
    TextError,
    TextResult,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    parse,
    parse_bytes,
    parse_file,
    detect_encoding,
    detect_separator,
    decode_content,
    Dataset,
    Row,
    SeparatorKind,
};

// =============================================================================
// Re-exports - Patterns
// =============================================================================

pub use pattern::{
    compile,
    compile_strict,
    diagnose,
    evaluate,
    render,
    render_report,
    functions_description,
    EvaluationContext,
    PatternProgram,
    PreparedProgram,
    RenderReport,
    Segment,
    ERR,
};

// =============================================================================
// Re-exports - Jobs
// =============================================================================

pub use job::{
    run_job,
    run_job_with,
    run_job_strict,
    run_job_blocking,
    JobOptions,
    JobRequest,
    JobResponse,
};

// =============================================================================
// Re-exports - Cache
// =============================================================================

pub use cache::{CacheStats, ProgramCache};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{UploadResponse, FunctionInfo, error_response};

// Server
pub mod server {
    pub use crate::api::server::{start_server, ServerConfig};
}
