//! `weft` command line tool.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use weft_tools::ToolError;
use weft_tools::cli::{Cli, Commands};
use weft_tools::commands;

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env("WEFT_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Exit code 1 means the input had syntax errors.
fn run(cli: Cli) -> Result<ExitCode, ToolError> {
    match cli.command {
        Commands::Compile { grammar, output } => {
            print!("{}", commands::compile(&grammar, output.as_deref())?);
        }
        Commands::Conflicts { grammar } => {
            let (_, compiled) = commands::compile_grammar(&grammar)?;
            print!("{}", commands::format_diagnostics(&compiled));
        }
        Commands::Graph { grammar } => {
            print!("{}", commands::graph(&grammar)?);
        }
        Commands::Parse {
            grammar,
            extend,
            table,
            file,
            fixed_form,
            format,
        } => {
            let language = match (table, grammar) {
                (Some(table), _) => commands::load_table(&table)?,
                (None, Some(grammar)) => {
                    let args = weft_tools::cli::GrammarArgs {
                        grammar,
                        extend,
                        canonical: false,
                    };
                    let (_, compiled) = commands::compile_grammar(&args)?;
                    for diagnostic in &compiled.diagnostics {
                        tracing::warn!(%diagnostic, "grammar conflict");
                    }
                    compiled.language
                }
                // clap requires one of the two
                (None, None) => return Ok(ExitCode::from(2)),
            };
            let (tree, output) = commands::parse(language, &file, fixed_form, format)?;
            print!("{output}");
            if !tree.errors().is_empty() {
                return Ok(ExitCode::from(1));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(2)
        }
    }
}
