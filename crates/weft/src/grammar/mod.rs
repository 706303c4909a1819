//! # Grammar Module
//!
//! Declarative grammar model: rules built from combinators, external
//! tokens, conflict declarations and precedence levels.
//!
//! ## Overview
//!
//! A [`Grammar`] is an ordered map from rule names to [`Combinator`]
//! bodies. References between rules are by name and resolved when the
//! grammar is compiled, so rules may be mutually recursive without shared
//! ownership. Construction validates names; reachability and derivation
//! cycles are checked by the compiler.
//!
//! ## Extending a grammar
//!
//! [`Grammar::extend`] derives a new grammar without touching the base:
//!
//! ```rust
//! use weft::grammar::{
//!     GrammarBuilder, GrammarExtension, choice, pattern, repeat, seq, string, sym,
//! };
//!
//! let base = GrammarBuilder::new("fortran")
//!     .rule("program", repeat(choice([sym("comment"), sym("identifier")])))
//!     .rule("comment", seq([string("!"), pattern(".*")]))
//!     .rule("identifier", pattern("[a-zA-Z_][a-zA-Z0-9_]*"))
//!     .build()
//!     .expect("valid grammar");
//!
//! let fixed_form = base
//!     .extend(
//!         GrammarExtension::new()
//!             .external("_comment_character")
//!             .conflict(["_comment_character", "identifier"])
//!             .rule("comment", seq([sym("_comment_character"), pattern(".*")])),
//!     )
//!     .expect("valid extension");
//!
//! assert!(fixed_form.is_external("_comment_character"));
//! assert!(!base.is_external("_comment_character"));
//! ```

pub mod combinator;
#[cfg(feature = "serialize")]
pub mod description;
pub mod model;
pub mod precedence;
pub(crate) mod validate;

pub use combinator::{
    Combinator, blank, choice, field, immediate_token, optional, pattern, prec, prec_dynamic,
    prec_left, prec_right, repeat, repeat1, seq, string, sym, token,
};
#[cfg(feature = "serialize")]
pub use description::{ExtensionDescription, ExternalDescription, GrammarDescription};
pub use model::{ConflictEntry, ExternalToken, Grammar, GrammarBuilder, GrammarExtension};
pub use precedence::{Associativity, Precedence};
