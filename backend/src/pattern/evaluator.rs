//! Pattern evaluator.
//!
//! A [`PatternProgram`] is first prepared: function names are resolved to
//! table entries and selectors are classified, once. The prepared program is
//! then evaluated per row without any name lookups in the function table.

use crate::parser::Dataset;

use super::ast::{PatternProgram, Segment};
use super::functions::{lookup, Function};

/// Sentinel emitted for anything that cannot be resolved.
pub const ERR: &str = "ERR";

/// The (headers, row) pair one evaluation runs against.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub headers: &'a [String],
    pub row: &'a [String],
}

impl<'a> EvaluationContext<'a> {
    pub fn new(headers: &'a [String], row: &'a [String]) -> Self {
        Self { headers, row }
    }
}

/// Column reference classified at preparation time.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Selector {
    /// Zero-based index; `None` when the number can never be a valid index.
    Index(Option<usize>),
    /// Lower-cased header name.
    Header(String),
}

impl Selector {
    fn classify(selector: &str) -> Self {
        if is_signed_integer(selector) {
            let index = selector
                .parse::<i64>()
                .ok()
                .and_then(|n| usize::try_from(n).ok());
            Selector::Index(index)
        } else {
            Selector::Header(selector.to_lowercase())
        }
    }

    fn resolve<'a>(&self, ctx: &EvaluationContext<'a>) -> Option<&'a str> {
        let index = match self {
            Selector::Index(index) => (*index)?,
            Selector::Header(name) => ctx
                .headers
                .iter()
                .position(|h| h == name || h.to_lowercase() == *name)?,
        };
        ctx.row.get(index).map(String::as_str)
    }
}

/// `+`/`-` only as the first character, ASCII digits everywhere else.
fn is_signed_integer(text: &str) -> bool {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone)]
enum Node {
    Literal(String),
    Column(Selector),
    Call {
        function: &'static Function,
        args: Vec<Vec<Node>>,
    },
    /// Unknown function or wrong argument count.
    Error,
}

/// A program with every function call bound to its native operation.
#[derive(Debug, Clone)]
pub struct PreparedProgram {
    nodes: Vec<Node>,
    deterministic: bool,
}

/// Output of rendering a whole dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Rendered lines, each followed by the line separator.
    pub text: String,
    /// Number of rows rendered.
    pub rows: usize,
    /// Number of segment evaluations that produced `"ERR"`.
    pub substitutions: usize,
}

impl PreparedProgram {
    /// Bind a compiled program to the function table.
    pub fn new(program: &PatternProgram) -> Self {
        let mut deterministic = true;
        let nodes = prepare_nodes(program, &mut deterministic);
        Self {
            nodes,
            deterministic,
        }
    }

    /// False when the program calls `random` or `guid`.
    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    /// Number of top-level segments.
    pub fn segment_count(&self) -> usize {
        self.nodes.len()
    }

    /// Render one row.
    pub fn evaluate(&self, ctx: &EvaluationContext<'_>) -> String {
        let mut substitutions = 0;
        eval_nodes(&self.nodes, ctx, &mut substitutions)
    }

    /// Render every row of `dataset`, each followed by `line_separator`.
    pub fn render(&self, dataset: &Dataset, line_separator: &str) -> String {
        self.render_report(dataset, line_separator).text
    }

    /// Like [`PreparedProgram::render`], also counting `"ERR"` substitutions.
    pub fn render_report(&self, dataset: &Dataset, line_separator: &str) -> RenderReport {
        let mut report = RenderReport::default();
        for row in &dataset.rows {
            let ctx = EvaluationContext::new(&dataset.headers, row);
            let line = eval_nodes(&self.nodes, &ctx, &mut report.substitutions);
            report.text.push_str(&line);
            report.text.push_str(line_separator);
            report.rows += 1;
        }
        report
    }
}

fn prepare_nodes(program: &PatternProgram, deterministic: &mut bool) -> Vec<Node> {
    program
        .segments
        .iter()
        .map(|segment| match segment {
            Segment::Literal { text } => Node::Literal(text.clone()),
            Segment::Variable { selector } => Node::Column(Selector::classify(selector)),
            Segment::Call { name, args } => match lookup(name) {
                Some(function) if function.arity.is_nullary() => {
                    *deterministic &= function.deterministic;
                    Node::Call {
                        function,
                        args: Vec::new(),
                    }
                }
                Some(function) if function.arity.accepts(args.len()) => {
                    *deterministic &= function.deterministic;
                    Node::Call {
                        function,
                        args: args
                            .iter()
                            .map(|arg| prepare_nodes(arg, deterministic))
                            .collect(),
                    }
                }
                _ => Node::Error,
            },
        })
        .collect()
}

fn eval_nodes(nodes: &[Node], ctx: &EvaluationContext<'_>, substitutions: &mut usize) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Literal(text) => out.push_str(text),
            Node::Column(selector) => match selector.resolve(ctx) {
                Some(value) => out.push_str(value),
                None => {
                    *substitutions += 1;
                    out.push_str(ERR);
                }
            },
            Node::Call { function, args } => {
                let values: Vec<String> = args
                    .iter()
                    .map(|arg| eval_nodes(arg, ctx, substitutions))
                    .collect();
                match function.call(&values) {
                    Ok(value) => out.push_str(&value),
                    Err(_) => {
                        *substitutions += 1;
                        out.push_str(ERR);
                    }
                }
            }
            Node::Error => {
                *substitutions += 1;
                out.push_str(ERR);
            }
        }
    }
    out
}

/// Evaluate a compiled program against one (headers, row) pair.
pub fn evaluate(program: &PatternProgram, headers: &[String], row: &[String]) -> String {
    PreparedProgram::new(program).evaluate(&EvaluationContext::new(headers, row))
}

/// Render every row of `dataset` through `program`, one line per row.
///
/// # Example
/// ```ignore
/// use rowcast::{compile, parse, render, SeparatorKind};
///
/// let data = parse("Name\nAda\nBob", SeparatorKind::Comma, true);
/// let text = render(&compile("Hi @upper($(name))"), &data, "\n");
/// assert_eq!(text, "Hi ADA\nHi BOB\n");
/// ```
pub fn render(program: &PatternProgram, dataset: &Dataset, line_separator: &str) -> String {
    PreparedProgram::new(program).render(dataset, line_separator)
}

/// Render and report how many segments degraded to `"ERR"`.
pub fn render_report(program: &PatternProgram, dataset: &Dataset, line_separator: &str) -> RenderReport {
    PreparedProgram::new(program).render_report(dataset, line_separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, SeparatorKind};
    use crate::pattern::compile;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn eval(pattern: &str) -> String {
        let headers = strings(&["name", "age"]);
        let row = strings(&["Alice", "30"]);
        evaluate(&compile(pattern), &headers, &row)
    }

    #[test]
    fn test_index_variables() {
        assert_eq!(eval("$(0)-$(1)"), "Alice-30");
        assert_eq!(eval("$(+1)"), "30");
    }

    #[test]
    fn test_header_variables_case_insensitive() {
        assert_eq!(eval("$(Name) is $(AGE)"), "Alice is 30");
    }

    #[test]
    fn test_function_application() {
        assert_eq!(eval("@upper($(name))"), "ALICE");
        assert_eq!(eval("@quote(@lower($(0)))"), "\"alice\"");
    }

    #[test]
    fn test_unknown_function_is_local() {
        assert_eq!(eval("@nope($(name))"), "ERR");
        assert_eq!(eval("[@nope($(name))] $(age)"), "[ERR] 30");
        assert_eq!(eval("@Upper($(name))"), "ERR");
    }

    #[test]
    fn test_unresolved_variable_is_local() {
        assert_eq!(eval("$(missing)"), "ERR");
        assert_eq!(eval("$(2)"), "ERR");
        assert_eq!(eval("$(-1)"), "ERR");
        assert_eq!(eval("$(99999999999999999999999)"), "ERR");
        assert_eq!(eval("$(name) $(missing)"), "Alice ERR");
    }

    #[test]
    fn test_selector_that_looks_numeric_but_is_not() {
        let headers = strings(&["1a", "+"]);
        let row = strings(&["x", "y"]);
        assert_eq!(evaluate(&compile("$(1A)|$(+)"), &headers, &row), "x|y");
    }

    #[test]
    fn test_index_of_absent() {
        assert_eq!(eval("@indexOf($(name),\"z\")"), "-1");
        assert_eq!(eval("@indexOf($(name),z)"), "-1");
    }

    #[test]
    fn test_double_quotes_are_plain_text() {
        assert_eq!(eval("@upper($(age)\") and $(name)"), "30\" and Alice");
        assert_eq!(eval("@lower(a\"b)|$(name)"), "a\"b|Alice");
        assert_eq!(eval("@quote(\"x\")"), "\"\"x\"\"");
        assert_eq!(eval("@upper(a \"b,c\" d)"), "ERR");
    }

    #[test]
    fn test_wrong_arity_degrades() {
        assert_eq!(eval("@slice($(name))"), "ERR");
        assert_eq!(eval("@upper()"), "");
        assert_eq!(eval("<@slice($(name),1,2,3)>"), "<ERR>");
    }

    #[test]
    fn test_nullary_call_ignores_body() {
        let id = eval("@guid(ignored $(missing))");
        assert_eq!(id.len(), 36);
    }

    #[test]
    fn test_function_error_degrades() {
        assert_eq!(eval("@replace($(name),[,x)"), "ERR");
        assert_eq!(eval("@urlDecodeComponent(%E0%A4%A)|$(0)"), "ERR|Alice");
    }

    #[test]
    fn test_render_joins_rows() {
        let data = parse("Name,Age\nAlice,30\nBob,25", SeparatorKind::Comma, true);
        let text = render(&compile("$(name) ($(age))"), &data, "\n");
        assert_eq!(text, "Alice (30)\nBob (25)\n");
    }

    #[test]
    fn test_render_custom_separator_and_ragged_rows() {
        let data = parse("a,b\nc", SeparatorKind::Comma, false);
        let report = render_report(&compile("$(1)"), &data, ";");
        assert_eq!(report.text, "b;ERR;");
        assert_eq!(report.rows, 2);
        assert_eq!(report.substitutions, 1);
    }

    #[test]
    fn test_literal_pattern_is_unchanged_on_every_row() {
        let data = parse("x,y\n1,2\n3,4", SeparatorKind::Comma, true);
        let text = render(&compile("just text, (really)"), &data, "\n");
        assert_eq!(text, "just text, (really)\njust text, (really)\n");
    }

    #[test]
    fn test_compiled_twice_renders_identically() {
        let data = parse("Name,City\nada,london\nbob,paris", SeparatorKind::Comma, true);
        let pattern = "@title($(name)) from @upper(@slice($(city),0,3)) #@reverse($(0))";
        let first = render(&compile(pattern), &data, "\n");
        let second = render(&compile(pattern), &data, "\n");
        assert_eq!(first, second);
        assert_eq!(first, "Ada from LON #ada\nBob from PAR #bob\n");
    }

    #[test]
    fn test_prepared_program_is_reusable() {
        let prepared = PreparedProgram::new(&compile("<$(0)>"));
        let a = parse("1\n2", SeparatorKind::Comma, false);
        let b = parse("x", SeparatorKind::Tab, false);
        assert_eq!(prepared.render(&a, "\n"), "<1>\n<2>\n");
        assert_eq!(prepared.render(&b, "\n"), "<x>\n");
        assert!(prepared.is_deterministic());
        assert_eq!(prepared.segment_count(), 3);
        assert!(!PreparedProgram::new(&compile("@random(1,2)")).is_deterministic());
    }

    #[test]
    fn test_headers_without_lowercasing() {
        let headers = strings(&["Name"]);
        let row = strings(&["Ada"]);
        assert_eq!(evaluate(&compile("$(NAME)"), &headers, &row), "Ada");
    }

    #[test]
    fn test_is_signed_integer() {
        assert!(is_signed_integer("0"));
        assert!(is_signed_integer("-12"));
        assert!(is_signed_integer("+7"));
        assert!(!is_signed_integer("+"));
        assert!(!is_signed_integer("1-2"));
        assert!(!is_signed_integer(" 1"));
        assert!(!is_signed_integer(""));
    }
}
