//! # Incremental Reparsing
//!
//! Edits and the reuse of unchanged subtrees across tree versions.
//!
//! ## Overview
//!
//! An [`Edit`] describes one replacement in byte offsets. A sequence of
//! edits, each expressed against the buffer the previous ones produced, is
//! composed into an [`EditMap`] from the old buffer to the new one.
//!
//! During [`Parser::reparse`](crate::Parser::reparse) the parser walks the
//! previous tree alongside the new parse. At each shift it is offered the
//! old node that starts at the current position. The node is taken over
//! unchanged, sharing its `Arc`, when:
//!
//! - it is error-free and not an extra,
//! - it was started in the same parse state the parser is in now,
//! - no edit touches the bytes it was built from, including the bytes the
//!   lexer looked at before and after it,
//! - its first token is the token the lexer produces here now.
//!
//! Otherwise the node is entered and its children are offered in turn.
//! The result is the tree a fresh parse of the new buffer produces.
//!
//! ```rust
//! use weft::incremental::{Edit, EditMap};
//!
//! let (edit, text) = Edit::splice(b"a + b", 4, 5, b"cd");
//! assert_eq!(text, b"a + cd");
//! let map = EditMap::new(&[edit]);
//! assert_eq!(map.delta(), 1);
//! assert!(map.touches(4, 5));
//! ```

mod edit;
pub(crate) mod reuse;

pub use edit::{Edit, EditMap};
