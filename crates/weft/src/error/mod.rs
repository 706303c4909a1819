//! # Error Types
//!
//! Errors and diagnostics produced while compiling grammars and parsing.
//!
//! ## Overview
//!
//! Only [`GrammarError`] is a failure: it is returned when a grammar is
//! structurally broken and no automaton can be built. Everything else is
//! advisory or recovered:
//!
//! - [`ConflictDiagnostic`]: an ambiguity the table compiler resolved with
//!   its default policy. Compilation still succeeds.
//! - [`LexError`] / [`SyntaxError`]: problems met while parsing. The parser
//!   recovers locally, records them on the tree (see
//!   [`SyntaxTree::errors`](crate::SyntaxTree::errors)) and represents them
//!   structurally as error nodes.
//!
//! ## Diagnostics Support
//!
//! With the `diagnostics` feature, [`GrammarError`], [`LexError`] and
//! [`SyntaxError`] implement [`miette::Diagnostic`].

use crate::syntax::{StateId, TextRange};
use compact_str::CompactString;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// Structural grammar problem. Fatal to construction or compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum GrammarError {
    #[error("rule `{rule}` references undefined symbol `{symbol}`")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(weft::grammar::undefined_symbol),
            help("define a rule with this name or list it in `externals`")
        )
    )]
    UndefinedSymbol {
        rule: CompactString,
        symbol: CompactString,
    },

    #[error("rule `{rule}` cannot be reached from the start rule or the extras")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(weft::grammar::unreachable_rule)))]
    UnreachableRule { rule: CompactString },

    #[error("malformed precedence in `{rule}`: {reason}")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(code(weft::grammar::malformed_precedence))
    )]
    MalformedPrecedence { rule: CompactString, reason: String },

    #[error("invalid pattern /{pattern}/ in `{rule}`: {reason}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(weft::grammar::invalid_pattern)))]
    InvalidPattern {
        rule: CompactString,
        pattern: CompactString,
        reason: String,
    },

    #[error("invalid token in `{rule}`: {reason}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(weft::grammar::invalid_token)))]
    InvalidToken { rule: CompactString, reason: String },

    #[error("invalid conflict entry: {reason}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(weft::grammar::invalid_conflict)))]
    InvalidConflict { reason: String },

    #[error("symbol `{name}` is declared more than once")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(weft::grammar::duplicate_symbol)))]
    DuplicateSymbol { name: CompactString },

    #[error("grammar has no rules")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(weft::grammar::empty)))]
    EmptyGrammar,

    #[error("invalid extra: {reason}")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(weft::grammar::invalid_extra),
            help("extras must be tokens: literals, patterns, token rules or externals")
        )
    )]
    InvalidExtra { reason: String },

    #[error("start rule `{rule}` is a single token; the start rule must be syntactic")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(code(weft::grammar::lexical_start_rule))
    )]
    LexicalStartRule { rule: CompactString },

    #[error("rule `{rule}` can derive itself without consuming input")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(code(weft::grammar::cyclic_derivation))
    )]
    CyclicDerivation { rule: CompactString },

    #[error("grammar needs {count} symbols; at most {limit} are supported")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(weft::grammar::too_many_symbols)))]
    TooManySymbols { count: usize, limit: usize },
}

/// How the compiler settled an ambiguous table entry
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Resolution {
    Shift,
    Reduce { rule: CompactString },
    /// Lexical overlap: the external recognizer is consulted first.
    ExternalFirst,
}

/// The kind of ambiguity behind a [`ConflictDiagnostic`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ConflictKind {
    /// Neither side carries precedence and no conflict entry covers them.
    ShiftReduce {
        reduce_rule: CompactString,
        shift_rules: Vec<CompactString>,
    },
    /// Covered by precedence or a conflict entry, but precedence,
    /// associativity, entry order and dynamic precedence are all tied.
    RuntimeChoiceRequired {
        reduce_rule: CompactString,
        shift_rules: Vec<CompactString>,
    },
    ReduceReduce {
        chosen: CompactString,
        discarded: CompactString,
    },
    /// An external token can fire where a valid internal token could match
    /// a longer input.
    LexicalOverlap {
        external: CompactString,
        internal: CompactString,
    },
}

/// Advisory report of an ambiguity resolved at compile time
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ConflictDiagnostic {
    pub kind: ConflictKind,
    pub state: Option<StateId>,
    pub lookahead: Option<CompactString>,
    pub resolution: Resolution,
}

impl fmt::Display for ConflictDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ConflictKind::ShiftReduce {
                reduce_rule,
                shift_rules,
            } => write!(
                f,
                "shift/reduce conflict between `{reduce_rule}` and `{}`",
                shift_rules.join("`, `")
            )?,
            ConflictKind::RuntimeChoiceRequired {
                reduce_rule,
                shift_rules,
            } => write!(
                f,
                "ambiguity between `{reduce_rule}` and `{}` needs a runtime choice",
                shift_rules.join("`, `")
            )?,
            ConflictKind::ReduceReduce { chosen, discarded } => write!(
                f,
                "reduce/reduce conflict between `{chosen}` and `{discarded}`"
            )?,
            ConflictKind::LexicalOverlap { external, internal } => write!(
                f,
                "external token `{external}` may shadow `{internal}`"
            )?,
        }
        if let Some(lookahead) = &self.lookahead {
            write!(f, " on `{lookahead}`")?;
        }
        if let Some(state) = self.state {
            write!(f, " in {state}")?;
        }
        match &self.resolution {
            Resolution::Shift => write!(f, "; resolved as shift"),
            Resolution::Reduce { rule } => write!(f, "; resolved as reduce `{rule}`"),
            Resolution::ExternalFirst => write!(f, "; the external recognizer is tried first"),
        }
    }
}

/// No recognizer matched; the bytes became an error token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[cfg_attr(feature = "diagnostics", diagnostic(code(weft::parse::unrecognized)))]
#[error("unrecognized input at {range}")]
pub struct LexError {
    #[cfg_attr(feature = "diagnostics", label("no token matches here"))]
    pub range: TextRange,
}

/// How the parser got past a syntax error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// A zero-width token was inserted.
    Inserted,
    /// Stack frames were wrapped into an error node.
    Popped { frames: usize },
    /// The lookahead was wrapped into an error node.
    Skipped,
    /// The rest of the input was wrapped into an error node.
    Truncated,
}

/// Action-table miss recovered by the parser
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[cfg_attr(feature = "diagnostics", diagnostic(code(weft::parse::unexpected)))]
#[error("unexpected `{found}` at {range}{}", expected_suffix(.expected))]
pub struct SyntaxError {
    #[cfg_attr(feature = "diagnostics", label("unexpected here"))]
    pub range: TextRange,
    pub found: CompactString,
    pub expected: Vec<CompactString>,
    pub recovery: Recovery,
}

fn expected_suffix(expected: &[CompactString]) -> String {
    match expected {
        [] => String::new(),
        [one] => format!(", expected `{one}`"),
        many => format!(", expected one of `{}`", many.join("`, `")),
    }
}

/// A recovered parse-time problem
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseDiagnostic {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

impl ParseDiagnostic {
    #[must_use]
    pub const fn range(&self) -> TextRange {
        match self {
            Self::Lex(error) => error.range,
            Self::Syntax(error) => error.range,
        }
    }
}
