//! Rowcast CLI - render delimited text through a row pattern
//!
//! # Main Commands
//!
//! ```bash
//! rowcast render people.csv -p '$(name) <$(email)>' --header
//! rowcast serve                     # Start HTTP server (port 3000)
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! rowcast parse people.csv --header # Parsed dataset as JSON
//! rowcast compile '@upper($(0))'    # Compiled program as JSON
//! rowcast functions                 # Show available pattern functions
//! ```

use clap::{Parser, Subcommand};
use rowcast::{
    compile, decode_content, detect_encoding, detect_separator, diagnose, functions_description,
    parse, run_job_strict, run_job_with, JobOptions, JobRequest, SeparatorKind,
};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rowcast")]
#[command(about = "Render CSV/TSV rows through a text pattern", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every data row through a pattern
    Render {
        /// Input file (reads stdin when omitted and --text is not given)
        input: Option<PathBuf>,

        /// Inline input text instead of a file
        #[arg(short, long, conflicts_with = "input")]
        text: Option<String>,

        /// Pattern applied to each row
        #[arg(short, long)]
        pattern: String,

        /// Separator: comma or tab (auto-detect if not specified)
        #[arg(short, long)]
        separator: Option<SeparatorKind>,

        /// Treat the first row as column names
        #[arg(long)]
        header: bool,

        /// Text appended after each rendered row
        #[arg(long, default_value = "\n")]
        line_separator: String,

        /// Reject patterns with unbalanced parentheses
        #[arg(long)]
        strict: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a file and output the dataset as JSON
    Parse {
        /// Input file
        input: PathBuf,

        /// Separator: comma or tab (auto-detect if not specified)
        #[arg(short, long)]
        separator: Option<SeparatorKind>,

        /// Treat the first row as column names
        #[arg(long)]
        header: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compile a pattern and output the program as JSON
    Compile {
        /// Pattern to compile
        pattern: String,

        /// Fail on structural problems instead of reporting them
        #[arg(long)]
        strict: bool,
    },

    /// Show available pattern functions
    Functions,

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: ROWCAST_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Render {
            input,
            text,
            pattern,
            separator,
            header,
            line_separator,
            strict,
            output,
        } => cmd_render(
            input.as_deref(),
            text,
            pattern,
            separator,
            header,
            line_separator,
            strict,
            output.as_deref(),
        ),

        Commands::Parse {
            input,
            separator,
            header,
            output,
        } => cmd_parse(&input, separator, header, output.as_deref()),

        Commands::Compile { pattern, strict } => cmd_compile(&pattern, strict),

        Commands::Functions => cmd_functions(),

        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Read and decode input text, from a file or stdin.
fn read_input(input: Option<&Path>) -> Result<String, Box<dyn std::error::Error>> {
    let bytes = match input {
        Some(path) => {
            eprintln!("📄 Reading: {}", path.display());
            fs::read(path)?
        }
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    let encoding = detect_encoding(&bytes);
    eprintln!("   Encoding: {}", encoding);
    Ok(decode_content(&bytes, &encoding)?)
}

fn resolve_separator(explicit: Option<SeparatorKind>, content: &str) -> SeparatorKind {
    let kind = explicit.unwrap_or_else(|| detect_separator(content));
    eprintln!(
        "   Separator: {}{}",
        kind,
        if explicit.is_none() { " (auto-detected)" } else { "" }
    );
    kind
}

#[allow(clippy::too_many_arguments)]
fn cmd_render(
    input: Option<&Path>,
    text: Option<String>,
    pattern: String,
    separator: Option<SeparatorKind>,
    header: bool,
    line_separator: String,
    strict: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw_text = match text {
        Some(text) => text,
        None => read_input(input)?,
    };
    let separator_kind = resolve_separator(separator, &raw_text);

    for issue in diagnose(&pattern) {
        eprintln!("⚠️  Pattern: {}", issue);
    }

    let request = JobRequest::new(raw_text, pattern, separator_kind, header);
    let options = JobOptions {
        line_separator,
        use_cache: false,
    };
    let response = if strict {
        run_job_strict(&request, &options)?
    } else {
        run_job_with(&request, &options, None)
    };

    match response {
        Some(response) => {
            eprintln!("✅ Rendered {} bytes", response.rendered_text.len());
            write_output(&response.rendered_text, output)?;
        }
        None => eprintln!("⚠️  Nothing to render: input text or pattern is empty"),
    }

    Ok(())
}

fn cmd_parse(
    input: &Path,
    separator: Option<SeparatorKind>,
    header: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = read_input(Some(input))?;
    let kind = resolve_separator(separator, &content);

    let dataset = parse(&content, kind, header);
    if header {
        eprintln!("   Columns: {}", dataset.headers.join(", "));
    }
    eprintln!("✅ Parsed {} rows", dataset.rows.len());

    let json = serde_json::to_string_pretty(&dataset)?;
    write_output(&format!("{}\n", json), output)?;

    Ok(())
}

fn cmd_compile(pattern: &str, strict: bool) -> Result<(), Box<dyn std::error::Error>> {
    let issues = diagnose(pattern);
    if strict {
        if let Some(first) = issues.first() {
            return Err(first.clone().into());
        }
    }
    for issue in &issues {
        eprintln!("⚠️  {}", issue);
    }

    let program = compile(pattern);
    let variables = program.variables();
    let functions = program.functions();
    if !variables.is_empty() {
        eprintln!("   Columns: {}", variables.join(", "));
    }
    if !functions.is_empty() {
        eprintln!("   Functions: {}", functions.join(", "));
    }

    println!("{}", program.to_json()?);
    Ok(())
}

fn cmd_functions() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", functions_description());
    Ok(())
}

async fn cmd_serve(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = rowcast::server::ServerConfig::from_env();
    if let Some(port) = port {
        config = config.with_port(port);
    }
    rowcast::server::start_server(config).await?;
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
