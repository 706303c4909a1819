//! Developer tools for weft grammars: the `weft` command line, Graphviz
//! renderings, and the fixed-form layout scanners.

pub mod cli;
pub mod commands;
pub mod error;
pub mod fixed_form;
pub mod visualize;

pub use error::ToolError;
pub use fixed_form::FixedFormScanner;
pub use visualize::{grammar_to_dot, tree_to_dot};
