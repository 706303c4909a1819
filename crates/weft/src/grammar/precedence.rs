#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use compact_str::CompactString;
use std::fmt;

/// Associativity attached to a precedence-tagged combinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum Associativity {
    Left,
    Right,
    None,
}

/// Precedence key: a number, or a level named in [`Grammar::precedences`].
///
/// [`Grammar::precedences`]: crate::grammar::Grammar::precedences
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(untagged))]
pub enum Precedence {
    Integer(i32),
    Name(CompactString),
}

impl Precedence {
    /// Resolves to an integer. Named levels declared earlier bind tighter,
    /// so the first of `levels` maps to the highest value.
    #[must_use]
    pub fn resolve(&self, levels: &[CompactString]) -> Option<i32> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Name(name) => {
                let position = levels.iter().position(|level| level == name)?;
                let count = i32::try_from(levels.len()).ok()?;
                let position = i32::try_from(position).ok()?;
                Some(count - position)
            }
        }
    }
}

impl From<i32> for Precedence {
    fn from(value: i32) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for Precedence {
    fn from(value: &str) -> Self {
        Self::Name(value.into())
    }
}

impl fmt::Display for Precedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Name(name) => write!(f, "'{name}'"),
        }
    }
}
