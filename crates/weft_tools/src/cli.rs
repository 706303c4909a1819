//! Command line interface of the `weft` tool

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "weft")]
#[command(about = "Compile weft grammars and inspect parse trees")]
#[command(version)]
pub struct Cli {
    /// Verbosity (-v info, -vv debug, -vvv trace). Overrides `WEFT_LOG`.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the grammar comes from: a JSON description plus extensions
#[derive(Args, Debug, Clone)]
pub struct GrammarArgs {
    /// JSON grammar description
    pub grammar: PathBuf,

    /// JSON extension applied on top of the grammar; repeatable
    #[arg(short, long)]
    pub extend: Vec<PathBuf>,

    /// Build canonical LR(1) tables instead of LALR(1)
    #[arg(long)]
    pub canonical: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a grammar, print conflict diagnostics and write the tables
    Compile {
        #[command(flatten)]
        grammar: GrammarArgs,

        /// Output file for the compiled tables (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a file and print its tree and errors
    Parse {
        /// JSON grammar description
        #[arg(short, long, required_unless_present = "table", conflicts_with = "table")]
        grammar: Option<PathBuf>,

        /// JSON extension applied on top of the grammar; repeatable
        #[arg(short, long, requires = "grammar")]
        extend: Vec<PathBuf>,

        /// Tables written by `weft compile`
        #[arg(short, long)]
        table: Option<PathBuf>,

        /// File to parse
        file: PathBuf,

        /// Register the fixed-form comment and continuation scanners
        #[arg(long)]
        fixed_form: bool,

        /// Output format
        #[arg(short, long, default_value = "sexp")]
        format: OutputFormat,
    },

    /// Print the conflict diagnostics of a grammar
    Conflicts {
        #[command(flatten)]
        grammar: GrammarArgs,
    },

    /// Render the rule graph of a grammar as Graphviz
    Graph {
        #[command(flatten)]
        grammar: GrammarArgs,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Sexp,
    Dot,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sexp" | "s-expression" => Ok(Self::Sexp),
            "dot" | "graphviz" => Ok(Self::Dot),
            _ => Err(format!("Unknown format: {s}. Supported: sexp, dot")),
        }
    }
}
