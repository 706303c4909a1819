//! # Weft
//!
//! A grammar-driven, error-tolerant, incremental parsing engine.
//!
//! ## Overview
//!
//! - [`grammar`]: declarative grammars built from combinators, with
//!   external tokens, conflict entries, precedence and extension of a base
//!   grammar.
//! - [`compile`]: the table compiler. Produces an immutable [`Language`]
//!   (LALR(1) tables plus lexical tables) and advisory conflict
//!   diagnostics.
//! - [`lexer`]: the context-aware lexer and the [`ExternalScanner`]
//!   capability for tokens that regular patterns cannot describe.
//! - [`parser`]: the [`Parser`], which never fails: malformed input ends
//!   up in `ERROR` nodes. Parses can be stepped and cancelled.
//! - [`incremental`]: [`Edit`]s and the reuse of unchanged subtrees by
//!   [`Parser::reparse`].
//! - [`syntax`]: the concrete syntax tree.
//!
//! ## Quick Start
//!
//! ```rust
//! use weft::grammar::{GrammarBuilder, choice, pattern, prec_left, repeat, seq, string, sym};
//! use weft::{Edit, Parser, compile};
//!
//! let grammar = GrammarBuilder::new("arithmetic")
//!     .rule("program", repeat(sym("statement")))
//!     .rule("statement", seq([sym("expression"), string(";")]))
//!     .rule(
//!         "expression",
//!         choice([
//!             prec_left(1, seq([sym("expression"), string("+"), sym("expression")])),
//!             sym("number"),
//!         ]),
//!     )
//!     .rule("number", pattern(r"\d+"))
//!     .build()?;
//! let compiled = compile(&grammar)?;
//! let parser = Parser::new(compiled.language);
//!
//! let tree = parser.parse("1 + 2;");
//! assert_eq!(
//!     tree.to_sexp(),
//!     "(program (statement (expression (expression (number)) (expression (number)))))"
//! );
//!
//! let (edit, source) = Edit::splice(tree.source(), 4, 5, b"20");
//! let edited = parser.reparse(&tree, &[edit], &source);
//! assert!(edited.same_structure(&parser.parse(&source)));
//! # Ok::<(), weft::error::GrammarError>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel` (default): [`parser::parse_batch`] on the rayon pool.
//! - `serialize`: serde support for grammar descriptions, [`Language`]
//!   and trees.
//! - `diagnostics`: `miette::Diagnostic` for errors.

pub mod compile;
pub mod error;
pub mod grammar;
pub mod incremental;
pub mod lexer;
pub mod parser;
pub mod syntax;

pub use compile::{CompileOptions, Compiled, Language, compile, compile_with};
pub use error::{ConflictDiagnostic, GrammarError, LexError, ParseDiagnostic, SyntaxError};
pub use grammar::{Grammar, GrammarBuilder, GrammarExtension};
pub use incremental::Edit;
pub use lexer::{ExternalScanner, ExternalScanners, ScanCursor};
#[cfg(feature = "parallel")]
pub use parser::parse_batch;
pub use parser::{ParseOptions, ParseSession, ParseStatus, Parser, parse, reparse};
pub use syntax::{Point, Symbol, SyntaxNode, SyntaxTree, TextRange, TextSize};
