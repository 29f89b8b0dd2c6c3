//! Job orchestration: parse once, compile once, render every row.
//!
//! This is the single entry point the outer surfaces (CLI, HTTP server) call.
//!
//! # Example
//!
//! ```rust,ignore
//! use rowcast::job::{run_job, JobRequest};
//! use rowcast::SeparatorKind;
//!
//! let request = JobRequest::new("Name\nAda", "Hi $(name)", SeparatorKind::Comma, true);
//! let response = run_job(&request).expect("complete request");
//! assert_eq!(response.rendered_text, "Hi Ada\n");
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::cache::ProgramCache;
use crate::error::{JobError, JobResult};
use crate::parser::{parse, SeparatorKind};
use crate::pattern::{compile, compile_strict, PreparedProgram};

/// Everything one job needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub separator_kind: SeparatorKind,
    #[serde(default)]
    pub has_header_row: bool,
}

impl JobRequest {
    pub fn new(
        raw_text: impl Into<String>,
        pattern: impl Into<String>,
        separator_kind: SeparatorKind,
        has_header_row: bool,
    ) -> Self {
        Self {
            raw_text: raw_text.into(),
            pattern: pattern.into(),
            separator_kind,
            has_header_row,
        }
    }

    /// A job runs only when both the text and the pattern are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.raw_text.is_empty() && !self.pattern.is_empty()
    }
}

/// Result of a complete job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    /// Echo of the request flag
    pub has_header_row: bool,
    /// One rendered line per data row
    pub rendered_text: String,
}

/// Options for running a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobOptions {
    /// Appended after every rendered row
    pub line_separator: String,

    /// Consult the program cache when one is supplied
    pub use_cache: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            line_separator: "\n".to_string(),
            use_cache: true,
        }
    }
}

/// Run a job with default options and no cache.
///
/// Returns `None` for an incomplete request; that is a no-op, not an error.
pub fn run_job(request: &JobRequest) -> Option<JobResponse> {
    run_job_with(request, &JobOptions::default(), None)
}

/// Run a job with explicit options and an optional program cache.
pub fn run_job_with(
    request: &JobRequest,
    options: &JobOptions,
    cache: Option<&ProgramCache>,
) -> Option<JobResponse> {
    if !request.is_complete() {
        return None;
    }

    let program = match cache.filter(|_| options.use_cache) {
        Some(cache) => cache.get_or_compile(&request.pattern),
        None => Arc::new(PreparedProgram::new(&compile(&request.pattern))),
    };

    Some(execute(request, &program, options))
}

/// Like [`run_job_with`], but rejects structurally malformed patterns.
pub fn run_job_strict(request: &JobRequest, options: &JobOptions) -> JobResult<Option<JobResponse>> {
    if !request.is_complete() {
        return Ok(None);
    }

    let program = PreparedProgram::new(&compile_strict(&request.pattern)?);
    Ok(Some(execute(request, &program, options)))
}

/// Run a job on the blocking thread pool so the caller stays responsive.
pub async fn run_job_blocking(
    request: JobRequest,
    options: JobOptions,
    cache: Option<Arc<ProgramCache>>,
) -> JobResult<Option<JobResponse>> {
    tokio::task::spawn_blocking(move || run_job_with(&request, &options, cache.as_deref()))
        .await
        .map_err(|e| JobError::Worker(e.to_string()))
}

fn execute(request: &JobRequest, program: &PreparedProgram, options: &JobOptions) -> JobResponse {
    log_info(format!(
        "📖 Parsing {} bytes as {}-separated text...",
        request.raw_text.len(),
        request.separator_kind
    ));
    let dataset = parse(
        &request.raw_text,
        request.separator_kind,
        request.has_header_row,
    );
    if request.has_header_row {
        log_info_indent(format!("Headers: {}", dataset.headers.join(", ")), 1);
    }
    log_success(format!(
        "Read {} rows ({} columns)",
        dataset.rows.len(),
        dataset.column_count()
    ));

    log_info(format!("⚙️  Rendering rows ({} segments)...", program.segment_count()));
    let report = program.render_report(&dataset, &options.line_separator);
    if report.substitutions > 0 {
        log_warning(format!(
            "{} segment(s) rendered as ERR (unknown column or function)",
            report.substitutions
        ));
    }
    log_success(format!(
        "Rendered {} lines ({} bytes)",
        report.rows,
        report.text.len()
    ));

    JobResponse {
        has_header_row: request.has_header_row,
        rendered_text: report.text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::logs::set_echo;

    fn request(raw: &str, pattern: &str, has_header: bool) -> JobRequest {
        JobRequest::new(raw, pattern, SeparatorKind::Comma, has_header)
    }

    #[test]
    fn test_default_options() {
        let opts = JobOptions::default();
        assert_eq!(opts.line_separator, "\n");
        assert!(opts.use_cache);
    }

    #[test]
    fn test_incomplete_request_yields_nothing() {
        set_echo(false);
        assert_eq!(run_job(&request("", "$(0)", false)), None);
        assert_eq!(run_job(&request("a,b", "", false)), None);
    }

    #[test]
    fn test_complete_job() {
        set_echo(false);
        let response = run_job(&request("Name,Age\nAlice,30\nBob,25", "$(name) is $(AGE)", true)).unwrap();

        assert!(response.has_header_row);
        assert_eq!(response.rendered_text, "Alice is 30\nBob is 25\n");
    }

    #[test]
    fn test_tab_job_with_custom_separator() {
        set_echo(false);
        let req = JobRequest::new("a\t\"b\"", "@upper($(1))", SeparatorKind::Tab, false);
        let options = JobOptions {
            line_separator: "\r\n".to_string(),
            ..JobOptions::default()
        };
        let response = run_job_with(&req, &options, None).unwrap();

        assert!(!response.has_header_row);
        assert_eq!(response.rendered_text, "\"B\"\r\n");
    }

    #[test]
    fn test_job_uses_cache() {
        set_echo(false);
        let cache = ProgramCache::new(4);
        let req = request("x\ny", "<$(0)>", false);

        run_job_with(&req, &JobOptions::default(), Some(&cache));
        let response = run_job_with(&req, &JobOptions::default(), Some(&cache)).unwrap();

        assert_eq!(response.rendered_text, "<x>\n<y>\n");
        assert_eq!(cache.stats().hits, 1);

        let no_cache = JobOptions {
            use_cache: false,
            ..JobOptions::default()
        };
        run_job_with(&req, &no_cache, Some(&cache));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_strict_job_rejects_unbalanced() {
        set_echo(false);
        let result = run_job_strict(&request("a", "$(0", false), &JobOptions::default());
        assert!(matches!(result, Err(JobError::Pattern(_))));

        let lenient = run_job(&request("a", "$(0", false)).unwrap();
        assert_eq!(lenient.rendered_text, "a\n");
    }

    #[test]
    fn test_request_json_contract() {
        let req: JobRequest = serde_json::from_str(
            r#"{"rawText":"a\tb","pattern":"$(1)","separatorKind":"tab-separated","hasHeaderRow":false}"#,
        )
        .unwrap();
        assert_eq!(req.separator_kind, SeparatorKind::Tab);

        let response = JobResponse {
            has_header_row: true,
            rendered_text: "x\n".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["hasHeaderRow"], true);
        assert_eq!(json["renderedText"], "x\n");
    }

    #[test]
    fn test_headers_are_logged_indented() {
        use crate::api::logs::LOG_BROADCASTER;
        use tokio::sync::broadcast::error::TryRecvError;

        set_echo(false);
        let mut rx = LOG_BROADCASTER.subscribe();
        run_job(&request("Zephyr,Quill\n1,2", "$(zephyr)", true)).unwrap();

        let mut found = None;
        loop {
            match rx.try_recv() {
                Ok(entry) if entry.message == "Headers: zephyr, quill" => {
                    found = Some(entry);
                    break;
                }
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        assert_eq!(found.map(|e| e.indent), Some(1));
    }

    #[tokio::test]
    async fn test_blocking_job() {
        set_echo(false);
        let cache = Arc::new(ProgramCache::default());
        let req = request("Name\nAda", "Hi $(name)", true);

        let response = run_job_blocking(req, JobOptions::default(), Some(cache))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.rendered_text, "Hi Ada\n");
    }
}
