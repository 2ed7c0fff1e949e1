//! Binary entry point for the pygrapher CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Graph the current directory
//! pygrapher > graph.json
//!
//! # Graph a tree with pretty output and debug diagnostics
//! pygrapher --dir src --pretty --verbose
//!
//! # Graph exactly two files (what each batch worker runs)
//! pygrapher --dir src --files pkg/__init__.py pkg/mod.py
//! ```

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use pygrapher::cli::{execute, Cli, LogFormat, LogLevel};
use pygrapher::error::{GraphError, OutputErrorCode};
use pygrapher::output::emit_graph;

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.effective_level(), cli.log_format);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // stdout carries only the graph document
            let _ = writeln!(io::stderr(), "pygrapher: {}", err);
            ExitCode::from(OutputErrorCode::from(&err).code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel, format: LogFormat) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn run(cli: &Cli) -> Result<(), GraphError> {
    let graph = execute(cli)?;
    let mut stdout = io::stdout().lock();
    emit_graph(&graph, cli.output_style(), &mut stdout)?;
    stdout.flush()?;
    Ok(())
}
