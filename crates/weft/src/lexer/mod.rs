//! # Lexer Module
//!
//! Context-aware tokenization driven by the parser.
//!
//! ## Overview
//!
//! Token rules are compiled once, by the table compiler, into a single DFA
//! over characters. At run time the [`Lexer`] is asked for one token at a
//! time together with the set of tokens the current parse state accepts:
//!
//! - **External scanners** registered in [`ExternalScanners`] are tried
//!   first, in the grammar's declaration order, and only for valid tokens.
//! - **Internal tokens** are matched by the DFA restricted to the valid
//!   set. The longest match wins; ties go to lexical precedence, then to
//!   string literals over patterns, then to the token declared first. Two
//!   tokens listed in the same conflict entry are decided by precedence
//!   alone.
//! - **Errors**: when nothing matches, the lexer yields a one-character
//!   error token, so the parser always makes progress.
//!
//! ## External Scanners
//!
//! ```rust
//! use weft::lexer::{ExternalScanners, ScanCursor};
//!
//! // `!` only in the first column.
//! fn bang(cursor: &mut ScanCursor<'_>) -> bool {
//!     if cursor.column() == 0 && cursor.lookahead() == Some('!') {
//!         cursor.advance();
//!         return true;
//!     }
//!     false
//! }
//!
//! let scanners = ExternalScanners::new().with("BANG", bang);
//! assert_eq!(scanners.len(), 1);
//! ```

pub(crate) mod dfa;
pub mod external;
pub(crate) mod regex;
pub mod tokenizer;

pub use external::{ExternalScanner, ExternalScanners, ScanCursor};
pub use tokenizer::{LexMode, Lexer, Token};
