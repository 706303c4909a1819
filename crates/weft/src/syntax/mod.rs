//! # Syntax Trees
//!
//! Green/red concrete syntax trees produced by the parser.
//!
//! ## Overview
//!
//! - [`GreenNode`] / [`GreenToken`]: immutable, position-independent tree
//!   storage. Subtrees are `Arc`-shared between tree versions, which is what
//!   lets a reparse reuse unaffected regions without copying them.
//! - [`SyntaxTree`]: a green root together with its source buffer and the
//!   [`Language`](crate::Language) it was parsed with.
//! - [`SyntaxNode`]: positioned view used for inspection (spans, kinds,
//!   children, error predicates).
//!
//! Every byte of the input belongs to exactly one leaf: extras such as
//! whitespace are kept in the tree, so the root always spans the whole
//! buffer of a completed parse.

pub mod green;
pub mod red;
pub mod symbol;
pub mod text;

pub use green::*;
pub use red::*;
pub use symbol::*;
pub use text::*;
