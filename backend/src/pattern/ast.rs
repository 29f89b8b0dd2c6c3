//! Compiled pattern representation.
//!
//! A [`PatternProgram`] is the tagged-variant tree produced by the compiler.
//! It carries no row data and no resolved function handles, so it can be
//! inspected, serialized, and evaluated against any number of rows.

use serde::{Deserialize, Serialize};

/// An ordered sequence of segments compiled from one pattern string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternProgram {
    pub segments: Vec<Segment>,
}

/// One compiled unit of a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    /// Fixed text, emitted as-is.
    Literal { text: String },

    /// `$(selector)`: a column index or a header name, resolved per row.
    Variable { selector: String },

    /// `@name(arg, ...)`: a function call over compiled argument programs.
    Call {
        name: String,
        #[serde(default)]
        args: Vec<PatternProgram>,
    },
}

impl Segment {
    pub fn literal(text: impl Into<String>) -> Self {
        Segment::Literal { text: text.into() }
    }

    pub fn variable(selector: impl Into<String>) -> Self {
        Segment::Variable {
            selector: selector.into(),
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<PatternProgram>) -> Self {
        Segment::Call {
            name: name.into(),
            args,
        }
    }
}

impl PatternProgram {
    /// Create an empty program
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// True when the program has no segments (renders as an empty string).
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a program from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// All variable selectors referenced, including inside call arguments.
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.walk(&mut |segment| {
            if let Segment::Variable { selector } = segment {
                out.push(selector.clone());
            }
        });
        out
    }

    /// All function names referenced, including nested calls.
    pub fn functions(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.walk(&mut |segment| {
            if let Segment::Call { name, .. } = segment {
                out.push(name.clone());
            }
        });
        out
    }

    fn walk(&self, visit: &mut dyn FnMut(&Segment)) {
        for segment in &self.segments {
            visit(segment);
            if let Segment::Call { args, .. } = segment {
                for arg in args {
                    arg.walk(visit);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PatternProgram {
        PatternProgram::from_segments(vec![
            Segment::literal("Hi "),
            Segment::call(
                "upper",
                vec![PatternProgram::from_segments(vec![Segment::variable("name")])],
            ),
            Segment::variable("0"),
        ])
    }

    #[test]
    fn test_walk_collects_nested_references() {
        let program = sample();
        assert_eq!(program.variables(), vec!["name", "0"]);
        assert_eq!(program.functions(), vec!["upper"]);
    }

    #[test]
    fn test_json_shape() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("\"type\": \"call\""));
        assert!(json.contains("\"selector\": \"name\""));

        let back = PatternProgram::from_json(&json).unwrap();
        assert_eq!(back, sample());
    }
}
