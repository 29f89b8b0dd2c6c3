//! Function table for pattern calls.
//!
//! A fixed, case-sensitive registry of native string operations. Every
//! function receives its arguments already rendered to strings, evaluated
//! left to right against the same row. Only `random` and `guid` are
//! non-deterministic.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{FunctionError, FunctionResult};

/// Signature of a native pattern function.
pub type NativeFn = fn(&[String]) -> FunctionResult;

/// Number of arguments a function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    /// Inclusive range.
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::Range(min, max) => (min..=max).contains(&count),
        }
    }

    /// True for functions that take no arguments at all.
    pub fn is_nullary(self) -> bool {
        self == Arity::Exact(0)
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::Range(min, max) => write!(f, "{}-{}", min, max),
        }
    }
}

/// One entry of the function table.
#[derive(Debug)]
pub struct Function {
    pub name: &'static str,
    pub arity: Arity,
    pub description: &'static str,
    pub deterministic: bool,
    op: NativeFn,
}

impl Function {
    /// Check the argument count, then run the native operation.
    pub fn call(&self, args: &[String]) -> FunctionResult {
        if !self.arity.accepts(args.len()) {
            return Err(FunctionError::Arity {
                name: self.name.to_string(),
                expected: self.arity.to_string(),
                got: args.len(),
            });
        }
        (self.op)(args)
    }
}

const fn entry(
    name: &'static str,
    arity: Arity,
    description: &'static str,
    op: NativeFn,
) -> Function {
    Function {
        name,
        arity,
        description,
        deterministic: true,
        op,
    }
}

const fn random_entry(
    name: &'static str,
    arity: Arity,
    description: &'static str,
    op: NativeFn,
) -> Function {
    Function {
        name,
        arity,
        description,
        deterministic: false,
        op,
    }
}

static FUNCTIONS: &[Function] = &[
    entry("backtick", Arity::Exact(1), "Wrap in backticks", backtick),
    random_entry("guid", Arity::Exact(0), "Random version-4 UUID", guid),
    entry("indexOf", Arity::Exact(2), "First position of a substring, -1 if absent", index_of),
    entry("lastIndexOf", Arity::Exact(2), "Last position of a substring, -1 if absent", last_index_of),
    entry("lower", Arity::Exact(1), "Convert to lowercase", lower),
    entry("quote", Arity::Exact(1), "Wrap in double quotes", quote),
    random_entry("random", Arity::Exact(2), "Random integer in [ceil(min), floor(max)]", random),
    entry("replace", Arity::Exact(3), "Replace all regex matches of arg 2 with arg 3 ($1, ${name} refer to groups)", replace),
    entry("reverse", Arity::Exact(1), "Reverse character order", reverse),
    entry("single", Arity::Exact(1), "Wrap in single quotes", single),
    entry("slice", Arity::Range(2, 3), "Characters from start to optional end (negative counts from end)", slice),
    entry("substring", Arity::Range(2, 3), "Characters from start, optional length", substring),
    entry("title", Arity::Exact(1), "Capitalize each word, lowercase the rest", title),
    entry("trim", Arity::Exact(1), "Remove leading and trailing whitespace", trim),
    entry("trimLeft", Arity::Exact(1), "Remove leading whitespace", trim_left),
    entry("trimRight", Arity::Exact(1), "Remove trailing whitespace", trim_right),
    entry("upper", Arity::Exact(1), "Convert to uppercase", upper),
    entry("urlDecode", Arity::Exact(1), "Decode a percent-encoded URI", url_decode),
    entry("urlDecodeComponent", Arity::Exact(1), "Decode a percent-encoded URI component", url_decode_component),
    entry("urlEncode", Arity::Exact(1), "Percent-encode a URI", url_encode),
    entry("urlEncodeComponent", Arity::Exact(1), "Percent-encode a URI component", url_encode_component),
];

static BY_NAME: Lazy<HashMap<&'static str, &'static Function>> =
    Lazy::new(|| FUNCTIONS.iter().map(|f| (f.name, f)).collect());

/// Resolve a function by exact (case-sensitive) name.
pub fn lookup(name: &str) -> Option<&'static Function> {
    BY_NAME.get(name).copied()
}

/// All functions, sorted by name.
pub fn functions() -> &'static [Function] {
    FUNCTIONS
}

// =============================================================================
// Argument helpers
// =============================================================================

/// Numeric value of an argument; blank counts as zero.
fn to_number(arg: &str) -> Option<f64> {
    let trimmed = arg.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().filter(|n| !n.is_nan())
}

/// Integer value of an argument, truncated toward zero; unparseable is zero.
fn to_integer(arg: &str) -> i64 {
    to_number(arg).map(|n| n.trunc() as i64).unwrap_or(0)
}

/// Resolve a possibly negative index against a length, clamped to `0..=len`.
fn clamp_index(index: i64, len: usize) -> usize {
    let len = len as i64;
    let resolved = if index < 0 { len + index } else { index };
    resolved.clamp(0, len) as usize
}

fn char_position(haystack: &str, byte_index: usize) -> String {
    haystack[..byte_index].chars().count().to_string()
}

// =============================================================================
// Native operations
// =============================================================================

fn backtick(args: &[String]) -> FunctionResult {
    Ok(format!("`{}`", args[0]))
}

fn quote(args: &[String]) -> FunctionResult {
    Ok(format!("\"{}\"", args[0]))
}

fn single(args: &[String]) -> FunctionResult {
    Ok(format!("'{}'", args[0]))
}

fn guid(_args: &[String]) -> FunctionResult {
    Ok(Uuid::new_v4().to_string())
}

fn index_of(args: &[String]) -> FunctionResult {
    let (haystack, needle) = (&args[0], &args[1]);
    Ok(haystack
        .find(needle.as_str())
        .map(|i| char_position(haystack, i))
        .unwrap_or_else(|| "-1".to_string()))
}

fn last_index_of(args: &[String]) -> FunctionResult {
    let (haystack, needle) = (&args[0], &args[1]);
    Ok(haystack
        .rfind(needle.as_str())
        .map(|i| char_position(haystack, i))
        .unwrap_or_else(|| "-1".to_string()))
}

fn lower(args: &[String]) -> FunctionResult {
    Ok(args[0].to_lowercase())
}

fn upper(args: &[String]) -> FunctionResult {
    Ok(args[0].to_uppercase())
}

fn random(args: &[String]) -> FunctionResult {
    let invalid = |message: String| FunctionError::InvalidArgument {
        name: "random".to_string(),
        message,
    };

    let (Some(a), Some(b)) = (to_number(&args[0]), to_number(&args[1])) else {
        return Err(invalid(format!("'{}' or '{}' is not a number", args[0], args[1])));
    };
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    let (min, max) = (low.ceil(), high.floor());
    if !min.is_finite() || !max.is_finite() || min > max {
        return Err(invalid(format!("no integer between {} and {}", a, b)));
    }

    let value = rand::thread_rng().gen_range(min as i64..=max as i64);
    Ok(value.to_string())
}

fn replace(args: &[String]) -> FunctionResult {
    let re = Regex::new(&args[1]).map_err(|e| FunctionError::InvalidArgument {
        name: "replace".to_string(),
        message: e.to_string(),
    })?;
    let replacement = braced_group_refs(&args[2]);
    Ok(re.replace_all(&args[0], replacement.as_str()).into_owned())
}

/// Rewrite bare `$N` group references as `${N}`, so `$1st` means group 1
/// followed by `st`. `$$` stays an escaped dollar.
fn braced_group_refs(replacement: &str) -> String {
    let bytes = replacement.as_bytes();
    let mut out = String::with_capacity(replacement.len() + 4);
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'$' {
            let ch = replacement[pos..].chars().next().unwrap_or_default();
            out.push(ch);
            pos += ch.len_utf8().max(1);
            continue;
        }
        if bytes.get(pos + 1) == Some(&b'$') {
            out.push_str("$$");
            pos += 2;
            continue;
        }

        let digits = bytes[pos + 1..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits == 0 {
            out.push('$');
            pos += 1;
        } else {
            out.push_str("${");
            out.push_str(&replacement[pos + 1..pos + 1 + digits]);
            out.push('}');
            pos += 1 + digits;
        }
    }
    out
}

fn reverse(args: &[String]) -> FunctionResult {
    Ok(args[0].chars().rev().collect())
}

fn slice(args: &[String]) -> FunctionResult {
    let chars: Vec<char> = args[0].chars().collect();
    let start = clamp_index(to_integer(&args[1]), chars.len());
    let end = args
        .get(2)
        .map(|e| clamp_index(to_integer(e), chars.len()))
        .unwrap_or(chars.len());

    if start >= end {
        return Ok(String::new());
    }
    Ok(chars[start..end].iter().collect())
}

fn substring(args: &[String]) -> FunctionResult {
    let chars: Vec<char> = args[0].chars().collect();
    let start = clamp_index(to_integer(&args[1]), chars.len());
    let available = chars.len() - start;
    let length = args
        .get(2)
        .map(|l| to_integer(l).clamp(0, available as i64) as usize)
        .unwrap_or(available);

    Ok(chars[start..start + length].iter().collect())
}

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w\S*").expect("static regex"));

fn title(args: &[String]) -> FunctionResult {
    let titled = WORD.replace_all(&args[0], |caps: &regex::Captures| -> String {
        let mut chars = caps[0].chars();
        let mut word = String::new();
        if let Some(first) = chars.next() {
            word.extend(first.to_uppercase());
            word.push_str(&chars.as_str().to_lowercase());
        }
        word
    });
    Ok(titled.into_owned())
}

fn trim(args: &[String]) -> FunctionResult {
    Ok(args[0].trim().to_string())
}

fn trim_left(args: &[String]) -> FunctionResult {
    Ok(args[0].trim_start().to_string())
}

fn trim_right(args: &[String]) -> FunctionResult {
    Ok(args[0].trim_end().to_string())
}

// =============================================================================
// URI encoding
// =============================================================================

/// Characters never escaped by either encoder.
const UNRESERVED_MARKS: &[u8] = b"-_.!~*'()";

/// Characters with URI meaning: kept by `urlEncode`, not decoded by `urlDecode`.
const URI_RESERVED: &[u8] = b";,/?:@&=+$#";

fn percent_encode(input: &str, keep: &[u8]) -> String {
    let mut encoded = String::with_capacity(input.len());
    for byte in input.bytes() {
        if byte.is_ascii_alphanumeric() || UNRESERVED_MARKS.contains(&byte) || keep.contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

fn percent_decode(input: &str, preserve: &[u8]) -> FunctionResult {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'%' {
            decoded.push(bytes[pos]);
            pos += 1;
            continue;
        }

        let byte = input
            .get(pos + 1..pos + 3)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .ok_or_else(|| {
                FunctionError::MalformedEscape(input[pos..].chars().take(3).collect())
            })?;

        if preserve.contains(&byte) {
            decoded.extend_from_slice(&bytes[pos..pos + 3]);
        } else {
            decoded.push(byte);
        }
        pos += 3;
    }

    String::from_utf8(decoded)
        .map_err(|e| FunctionError::MalformedEscape(format!("invalid UTF-8: {}", e)))
}

fn url_encode(args: &[String]) -> FunctionResult {
    Ok(percent_encode(&args[0], URI_RESERVED))
}

fn url_encode_component(args: &[String]) -> FunctionResult {
    Ok(percent_encode(&args[0], b""))
}

fn url_decode(args: &[String]) -> FunctionResult {
    percent_decode(&args[0], URI_RESERVED)
}

fn url_decode_component(args: &[String]) -> FunctionResult {
    percent_decode(&args[0], b"")
}

/// Markdown table of all functions, for help output.
pub fn functions_description() -> String {
    let mut out = String::from("Available pattern functions:\n\n");
    out.push_str("| Function | Arguments | Description |\n");
    out.push_str("|----------|-----------|-------------|\n");
    for f in FUNCTIONS {
        out.push_str(&format!("| {} | {} | {} |\n", f.name, f.arity, f.description));
    }
    out.push_str(
        r#"
Syntax:
  $(0), $(-1)       column by zero-based index
  $(name)           column by header name (case-insensitive)
  @upper($(name))   function call; arguments may nest
  @replace($(0),-,)  arguments split on top-level commas only

Unresolved columns and unknown functions render as ERR."#,
    );
    out
}
