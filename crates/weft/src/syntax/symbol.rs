#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Grammar symbol identifier inside a compiled [`Language`](crate::Language).
///
/// Terminals (end of input, internal tokens, external tokens) come first,
/// nonterminals after them. [`Symbol::ERROR`] is reserved for error nodes
/// and unrecognised input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Symbol(u16);

impl Symbol {
    /// End of input.
    pub const END: Self = Self(0);
    /// Error nodes and unrecognised bytes.
    pub const ERROR: Self = Self(u16::MAX);

    #[must_use]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn is_error(self) -> bool {
        self.0 == u16::MAX
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error() {
            f.write_str("ERROR")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// Parse automaton state identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct StateId(u32);

impl StateId {
    pub const START: Self = Self(0);

    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state {}", self.0)
    }
}
