//! Delimited text parser (comma- or tab-separated) with encoding detection.
//!
//! Turns raw text into a [`Dataset`] of headers and ragged rows. Parsing never
//! fails: malformed quoting degrades into literal cell content.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{TextError, TextResult};

/// One parsed row of cell values.
pub type Row = Vec<String>;

/// Which delimited-text variant to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeparatorKind {
    /// CSV-like: `,` separates columns and `"` quotes cells.
    #[default]
    #[serde(alias = "csv", alias = "comma-separated")]
    Comma,
    /// TSV-like: `\t` separates columns, no quoting at all.
    #[serde(alias = "tsv", alias = "tab-separated")]
    Tab,
}

impl SeparatorKind {
    /// The column separator character.
    pub fn as_char(self) -> char {
        match self {
            SeparatorKind::Comma => ',',
            SeparatorKind::Tab => '\t',
        }
    }

    /// Whether `"` has quoting semantics in this variant.
    fn quotes(self) -> bool {
        matches!(self, SeparatorKind::Comma)
    }
}

impl std::fmt::Display for SeparatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeparatorKind::Comma => write!(f, "comma"),
            SeparatorKind::Tab => write!(f, "tab"),
        }
    }
}

impl std::str::FromStr for SeparatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "comma" | "csv" | "comma-separated" | "," => Ok(SeparatorKind::Comma),
            "tab" | "tsv" | "tab-separated" | "\\t" => Ok(SeparatorKind::Tab),
            other => Err(format!("unknown separator '{}' (expected comma or tab)", other)),
        }
    }
}

/// Parsed delimited text.
///
/// Rows keep source order and may have different lengths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    /// Header names, lower-cased. Empty when the input had no header row.
    pub headers: Vec<String>,
    /// Data rows, header row excluded.
    pub rows: Vec<Row>,
}

impl Dataset {
    /// Number of columns in the widest row (headers included).
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    /// True when there are no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    InQuotes,
}

/// Parse delimited text into headers and rows.
///
/// - `"\r\n"`, `"\n"` and `"\r"` each end a logical row.
/// - In comma mode `"` toggles quoting and `""` inside quotes is a literal `"`;
///   separators and line terminators inside quotes are cell content.
/// - In tab mode quotes are ordinary characters.
/// - With `has_header_row`, the first logical row becomes the lower-cased
///   headers and is not part of `rows`.
///
/// # Example
/// ```ignore
/// use rowcast::{parse, SeparatorKind};
///
/// let data = parse("Name,Age\nAlice,30", SeparatorKind::Comma, true);
/// assert_eq!(data.headers, vec!["name", "age"]);
/// assert_eq!(data.rows, vec![vec!["Alice", "30"]]);
/// ```
pub fn parse(raw_text: &str, kind: SeparatorKind, has_header_row: bool) -> Dataset {
    let separator = kind.as_char();
    let mut dataset = Dataset::default();
    let mut header_pending = has_header_row;

    let mut state = ScanState::Normal;
    let mut row: Row = Vec::new();
    let mut cell = String::new();
    // A row only exists once at least one character has been consumed for it,
    // so a trailing terminator does not produce an empty last row.
    let mut row_started = false;

    let mut chars = raw_text.chars().peekable();
    while let Some(c) = chars.next() {
        row_started = true;

        if kind.quotes() && c == '"' {
            if state == ScanState::InQuotes && chars.peek() == Some(&'"') {
                cell.push('"');
                chars.next();
            } else {
                state = match state {
                    ScanState::Normal => ScanState::InQuotes,
                    ScanState::InQuotes => ScanState::Normal,
                };
            }
            continue;
        }

        if state == ScanState::InQuotes {
            cell.push(c);
            continue;
        }

        match c {
            c if c == separator => {
                row.push(std::mem::take(&mut cell));
            }
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(std::mem::take(&mut cell));
                finish_row(&mut dataset, std::mem::take(&mut row), &mut header_pending);
                row_started = false;
            }
            _ => cell.push(c),
        }
    }

    if row_started {
        row.push(cell);
        finish_row(&mut dataset, row, &mut header_pending);
    }

    dataset
}

fn finish_row(dataset: &mut Dataset, row: Row, header_pending: &mut bool) {
    if *header_pending {
        dataset.headers = row.iter().map(|h| h.to_lowercase()).collect();
        *header_pending = false;
    } else {
        dataset.rows.push(row);
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> TextResult<String> {
    let text = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8(bytes.to_vec())
            .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned()),
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) => {
                let (decoded, _, had_errors) = enc.decode(bytes);
                if had_errors {
                    return Err(TextError::Encoding {
                        encoding: other.to_string(),
                        message: "input contains invalid sequences".to_string(),
                    });
                }
                decoded.into_owned()
            }
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    };

    // A leading BOM would otherwise end up in the first header.
    Ok(text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text))
}

/// Guess the separator by counting commas and tabs in the first line.
///
/// Tab wins only when strictly more frequent than comma.
pub fn detect_separator(content: &str) -> SeparatorKind {
    let first_line = content.lines().next().unwrap_or("");
    let commas = first_line.matches(',').count();
    let tabs = first_line.matches('\t').count();

    if tabs > commas {
        SeparatorKind::Tab
    } else {
        SeparatorKind::Comma
    }
}

/// Decode raw bytes (auto-detected encoding) and parse them.
pub fn parse_bytes(
    bytes: &[u8],
    kind: SeparatorKind,
    has_header_row: bool,
) -> TextResult<Dataset> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    Ok(parse(&content, kind, has_header_row))
}

/// Read a file, decode it (auto-detected encoding) and parse it.
pub fn parse_file<P: AsRef<Path>>(
    path: P,
    kind: SeparatorKind,
    has_header_row: bool,
) -> TextResult<Dataset> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes(&bytes, kind, has_header_row)
}
