//! REST API types.
//!
//! `POST /api/render` speaks the plain job contract ([`JobRequest`] in,
//! [`JobResponse`] out). The upload endpoint wraps the same response with
//! details about how the file was read.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::TextResult;
use crate::job::{JobRequest, JobResponse};
use crate::parser::{decode_content, detect_encoding, detect_separator, SeparatorKind};
use crate::pattern::{functions, Function};

/// Response sent after a file upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Uploaded file name, when the client sent one
    pub file_name: Option<String>,

    /// Detected text encoding
    pub encoding: String,

    /// Separator used for parsing
    pub separator_kind: SeparatorKind,

    #[serde(flatten)]
    pub result: JobResponse,
}

/// One function table entry as exposed over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInfo {
    pub name: String,
    pub arity: String,
    pub description: String,
    pub deterministic: bool,
}

impl From<&Function> for FunctionInfo {
    fn from(f: &Function) -> Self {
        Self {
            name: f.name.to_string(),
            arity: f.arity.to_string(),
            description: f.description.to_string(),
            deterministic: f.deterministic,
        }
    }
}

/// The whole function table.
pub fn function_infos() -> Vec<FunctionInfo> {
    functions().iter().map(FunctionInfo::from).collect()
}

/// Uploaded bytes turned into a job request.
#[derive(Debug, Clone)]
pub struct DecodedUpload {
    pub request: JobRequest,
    pub encoding: String,
}

/// Decode an uploaded file and build the job request.
///
/// Without an explicit separator it is guessed from the first line.
pub fn decode_upload(
    bytes: &[u8],
    pattern: String,
    separator: Option<SeparatorKind>,
    has_header_row: bool,
) -> TextResult<DecodedUpload> {
    let encoding = detect_encoding(bytes);
    let raw_text = decode_content(bytes, &encoding)?;
    let separator_kind = separator.unwrap_or_else(|| detect_separator(&raw_text));

    Ok(DecodedUpload {
        request: JobRequest {
            raw_text,
            pattern,
            separator_kind,
            has_header_row,
        },
        encoding,
    })
}

/// Parse a form boolean ("true", "1", "yes", "on").
pub fn form_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_upload_detects_tab() {
        let upload = decode_upload(b"Name\tAge\nAda\t36", "$(name)".into(), None, true).unwrap();

        assert_eq!(upload.encoding, "utf-8");
        assert_eq!(upload.request.separator_kind, SeparatorKind::Tab);
        assert_eq!(upload.request.raw_text, "Name\tAge\nAda\t36");
        assert!(upload.request.has_header_row);
    }

    #[test]
    fn test_decode_upload_explicit_separator_wins() {
        let upload = decode_upload(b"a\tb", "$(0)".into(), Some(SeparatorKind::Comma), false).unwrap();
        assert_eq!(upload.request.separator_kind, SeparatorKind::Comma);
    }

    #[test]
    fn test_upload_response_is_flat() {
        let response = UploadResponse {
            job_id: "j".into(),
            file_name: Some("people.csv".into()),
            encoding: "utf-8".into(),
            separator_kind: SeparatorKind::Comma,
            result: JobResponse {
                has_header_row: true,
                rendered_text: "Ada\n".into(),
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["renderedText"], "Ada\n");
        assert_eq!(json["separatorKind"], "comma");
        assert_eq!(json["fileName"], "people.csv");
    }

    #[test]
    fn test_form_bool() {
        assert!(form_bool("TRUE"));
        assert!(form_bool(" on "));
        assert!(!form_bool("false"));
        assert!(!form_bool(""));
    }

    #[test]
    fn test_function_infos() {
        let infos = function_infos();
        let guid = infos.iter().find(|f| f.name == "guid").unwrap();
        assert_eq!(guid.arity, "0");
        assert!(!guid.deterministic);
    }
}
