//! Grammar combinators
//!
//! The building blocks of rule bodies. The vocabulary matches the JSON
//! grammar description (`SEQ`, `CHOICE`, `PREC`, ...) so a description
//! deserialises straight into a [`Combinator`] tree.

use crate::grammar::{Associativity, Precedence};
use compact_str::CompactString;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Rule body combinator
///
/// Rule references carry names, never links, so mutually recursive rules
/// need no shared ownership; names are resolved to symbols at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serialize",
    serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum Combinator {
    /// Matches the empty string.
    Blank,
    /// Literal token text.
    String { value: CompactString },
    /// Regular-expression token.
    Pattern { value: CompactString },
    /// Reference to a rule or an external token by name.
    Symbol { name: CompactString },
    Seq { members: Vec<Combinator> },
    Choice { members: Vec<Combinator> },
    /// Zero or more.
    Repeat { content: Box<Combinator> },
    /// One or more.
    Repeat1 { content: Box<Combinator> },
    Optional { content: Box<Combinator> },
    Prec {
        value: Precedence,
        #[cfg_attr(feature = "serialize", serde(default))]
        associativity: Option<Associativity>,
        content: Box<Combinator>,
    },
    /// Preference used when static precedence cannot separate two actions.
    PrecDynamic { value: i32, content: Box<Combinator> },
    Field {
        name: CompactString,
        content: Box<Combinator>,
    },
    /// Collapses the content into a single lexical token.
    Token {
        content: Box<Combinator>,
        /// Disallows extras before the token.
        #[cfg_attr(feature = "serialize", serde(default))]
        immediate: bool,
    },
}

impl Combinator {
    /// Calls `f` for every rule or external reference in the tree.
    pub fn for_each_reference<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            Self::Symbol { name } => f(name),
            Self::Seq { members } | Self::Choice { members } => {
                for member in members {
                    member.for_each_reference(f);
                }
            }
            Self::Repeat { content }
            | Self::Repeat1 { content }
            | Self::Optional { content }
            | Self::Prec { content, .. }
            | Self::PrecDynamic { content, .. }
            | Self::Field { content, .. }
            | Self::Token { content, .. } => content.for_each_reference(f),
            Self::Blank | Self::String { .. } | Self::Pattern { .. } => {}
        }
    }

    /// Calls `f` for every precedence key in the tree.
    pub fn for_each_precedence<'a>(&'a self, f: &mut impl FnMut(&'a Precedence)) {
        match self {
            Self::Prec { value, content, .. } => {
                f(value);
                content.for_each_precedence(f);
            }
            Self::Seq { members } | Self::Choice { members } => {
                for member in members {
                    member.for_each_precedence(f);
                }
            }
            Self::Repeat { content }
            | Self::Repeat1 { content }
            | Self::Optional { content }
            | Self::PrecDynamic { content, .. }
            | Self::Field { content, .. }
            | Self::Token { content, .. } => content.for_each_precedence(f),
            Self::Blank | Self::String { .. } | Self::Pattern { .. } | Self::Symbol { .. } => {}
        }
    }

    /// `true` when the body describes a single lexical token: a literal, a
    /// pattern, a `token(...)`, or one of those under a precedence tag.
    #[must_use]
    pub fn is_lexical(&self) -> bool {
        match self {
            Self::String { .. } | Self::Pattern { .. } | Self::Token { .. } => true,
            Self::Prec { content, .. } => content.is_lexical(),
            _ => false,
        }
    }
}

#[must_use]
pub const fn blank() -> Combinator {
    Combinator::Blank
}

#[must_use]
pub fn string(value: &str) -> Combinator {
    Combinator::String {
        value: value.into(),
    }
}

#[must_use]
pub fn pattern(value: &str) -> Combinator {
    Combinator::Pattern {
        value: value.into(),
    }
}

#[must_use]
pub fn sym(name: &str) -> Combinator {
    Combinator::Symbol { name: name.into() }
}

#[must_use]
pub fn seq(members: impl IntoIterator<Item = Combinator>) -> Combinator {
    Combinator::Seq {
        members: members.into_iter().collect(),
    }
}

#[must_use]
pub fn choice(members: impl IntoIterator<Item = Combinator>) -> Combinator {
    Combinator::Choice {
        members: members.into_iter().collect(),
    }
}

#[must_use]
pub fn repeat(content: Combinator) -> Combinator {
    Combinator::Repeat {
        content: Box::new(content),
    }
}

#[must_use]
pub fn repeat1(content: Combinator) -> Combinator {
    Combinator::Repeat1 {
        content: Box::new(content),
    }
}

#[must_use]
pub fn optional(content: Combinator) -> Combinator {
    Combinator::Optional {
        content: Box::new(content),
    }
}

#[must_use]
pub fn prec(value: impl Into<Precedence>, content: Combinator) -> Combinator {
    Combinator::Prec {
        value: value.into(),
        associativity: None,
        content: Box::new(content),
    }
}

#[must_use]
pub fn prec_left(value: impl Into<Precedence>, content: Combinator) -> Combinator {
    Combinator::Prec {
        value: value.into(),
        associativity: Some(Associativity::Left),
        content: Box::new(content),
    }
}

#[must_use]
pub fn prec_right(value: impl Into<Precedence>, content: Combinator) -> Combinator {
    Combinator::Prec {
        value: value.into(),
        associativity: Some(Associativity::Right),
        content: Box::new(content),
    }
}

#[must_use]
pub fn prec_dynamic(value: i32, content: Combinator) -> Combinator {
    Combinator::PrecDynamic {
        value,
        content: Box::new(content),
    }
}

#[must_use]
pub fn field(name: &str, content: Combinator) -> Combinator {
    Combinator::Field {
        name: name.into(),
        content: Box::new(content),
    }
}

#[must_use]
pub fn token(content: Combinator) -> Combinator {
    Combinator::Token {
        content: Box::new(content),
        immediate: false,
    }
}

#[must_use]
pub fn immediate_token(content: Combinator) -> Combinator {
    Combinator::Token {
        content: Box::new(content),
        immediate: true,
    }
}
