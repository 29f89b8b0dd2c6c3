//! Pattern compiler.
//!
//! Scans a pattern left to right with an explicit cursor and nesting depth,
//! emitting a [`PatternProgram`]. Compilation is total: malformed input drifts
//! into literal text or a longer-than-intended construct, and the structural
//! problems found on the way are kept as diagnostics.
//!
//! ```text
//! pattern      := (literal | variableRef | call)*
//! variableRef  := '$(' selectorText ')'
//! call         := '@' name '(' [arg (',' arg)*] ')'
//! arg          := pattern
//! ```

use crate::error::{PatternError, PatternResult};

use super::ast::{PatternProgram, Segment};

/// Compile a pattern string. Never fails.
///
/// # Example
/// ```ignore
/// let program = rowcast::compile("$(name) is @upper($(1))");
/// assert_eq!(program.segments.len(), 3);
/// ```
pub fn compile(pattern: &str) -> PatternProgram {
    Compiler::default().program(pattern, 0)
}

/// Compile a pattern, rejecting structural malformations.
///
/// On success the returned program is identical to [`compile`]'s.
pub fn compile_strict(pattern: &str) -> PatternResult<PatternProgram> {
    let mut compiler = Compiler::default();
    let program = compiler.program(pattern, 0);
    match compiler.issues.into_iter().next() {
        Some(issue) => Err(issue),
        None => Ok(program),
    }
}

/// List structural problems in a pattern, in the order they were found.
pub fn diagnose(pattern: &str) -> Vec<PatternError> {
    let mut compiler = Compiler::default();
    compiler.program(pattern, 0);
    compiler.issues
}

#[derive(Default)]
struct Compiler {
    issues: Vec<PatternError>,
}

/// Span of text between a construct's parentheses.
struct Group {
    /// Byte ranges of the comma-separated pieces, relative to the scanned text.
    pieces: Vec<(usize, usize)>,
    /// Position right after the closing `)`, or the end of input.
    next: usize,
}

impl Compiler {
    /// Compile `text`, which starts at byte `offset` of the original pattern.
    fn program(&mut self, text: &str, offset: usize) -> PatternProgram {
        let bytes = text.as_bytes();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut pos = 0;

        while pos < bytes.len() {
            if bytes[pos] == b'$' && bytes.get(pos + 1) == Some(&b'(') {
                let group = self.group(text, pos + 2, offset, pos, false);
                let (start, end) = group.pieces[0];
                flush_literal(&mut literal, &mut segments);
                segments.push(Segment::variable(&text[start..end]));
                pos = group.next;
                continue;
            }

            if bytes[pos] == b'@' {
                if let Some(open) = call_open(bytes, pos + 1) {
                    let name = &text[pos + 1..open];
                    let group = self.group(text, open + 1, offset, pos, true);
                    let args = group
                        .pieces
                        .iter()
                        .map(|&(start, end)| self.program(&text[start..end], offset + start))
                        .collect();
                    flush_literal(&mut literal, &mut segments);
                    segments.push(Segment::call(name, args));
                    pos = group.next;
                    continue;
                }
            }

            // Not a construct: copy one whole character.
            let ch = text[pos..].chars().next().unwrap_or_default();
            literal.push(ch);
            pos += ch.len_utf8().max(1);
        }

        flush_literal(&mut literal, &mut segments);
        PatternProgram::from_segments(segments)
    }

    /// Scan from just after an opening `(` to its matching `)`.
    ///
    /// Commas split pieces only at depth 1 and only when `split_args` is set.
    /// An unclosed group runs to the end of `text` and is recorded as an issue.
    fn group(
        &mut self,
        text: &str,
        from: usize,
        offset: usize,
        opened_at: usize,
        split_args: bool,
    ) -> Group {
        let bytes = text.as_bytes();
        let mut pieces = Vec::new();
        let mut depth = 1usize;
        let mut piece_start = from;
        let mut pos = from;

        while pos < bytes.len() {
            match bytes[pos] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        pieces.push((piece_start, pos));
                        return Group {
                            pieces,
                            next: pos + 1,
                        };
                    }
                }
                b',' if split_args && depth == 1 => {
                    pieces.push((piece_start, pos));
                    piece_start = pos + 1;
                }
                _ => {}
            }
            pos += 1;
        }

        self.issues.push(PatternError::UnbalancedParenthesis {
            position: offset + opened_at,
        });
        pieces.push((piece_start, bytes.len()));
        Group {
            pieces,
            next: bytes.len(),
        }
    }
}

/// If `@` is followed by a function name and `(`, return the `(` position.
fn call_open(bytes: &[u8], name_start: usize) -> Option<usize> {
    let mut pos = name_start;
    while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
        pos += 1;
    }
    (pos > name_start && bytes.get(pos) == Some(&b'(')).then_some(pos)
}

fn flush_literal(literal: &mut String, segments: &mut Vec<Segment>) {
    if !literal.is_empty() {
        segments.push(Segment::literal(std::mem::take(literal)));
    }
}
