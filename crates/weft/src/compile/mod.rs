//! # Table Compiler
//!
//! Turns a validated [`Grammar`] into a [`Language`]: numbered symbols, an
//! LALR(1) parse table and the lexical tables used by the context-aware
//! lexer.
//!
//! ## Overview
//!
//! 1. Rules are lowered into flat productions. Choices, optionals and
//!    sequences expand in place; repetitions get hidden auxiliary rules.
//! 2. FIRST sets and nullability drive LR(1) closure; states with equal
//!    kernels are merged (LALR) unless [`CompileOptions::lalr`] is off.
//! 3. Conflicting actions are settled by precedence, associativity and
//!    conflict entries. Ambiguity never fails compilation; it is reported
//!    as [`ConflictDiagnostic`]s.
//! 4. Every internal token is compiled into one combined DFA.
//!
//! Only structural problems are errors: undefined or unreachable rules,
//! bad precedence, invalid patterns, derivation cycles.
//!
//! ```rust
//! use weft::compile::compile;
//! use weft::grammar::{GrammarBuilder, choice, pattern, prec_left, seq, string, sym};
//!
//! let grammar = GrammarBuilder::new("sums")
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
//! assert!(compiled.diagnostics.is_empty());
//! assert!(compiled.language.state_count() > 0);
//! # Ok::<(), weft::error::GrammarError>(())
//! ```

mod automaton;
mod conflict;
mod first;
pub mod language;
mod prepare;

pub use language::{Action, Language, ProductionInfo, SymbolInfo, SymbolKind, TokenInfo, TokenSet};

use crate::error::{ConflictDiagnostic, GrammarError};
use crate::grammar::Grammar;
use crate::lexer::dfa::Dfa;
use crate::lexer::regex::Nfa;
use language::LexTable;
use smallvec::SmallVec;
use std::sync::Arc;

/// Knobs for [`compile_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Merge LR(1) states with equal kernels.
    pub lalr: bool,
    /// Report shaped external tokens that may shadow internal ones.
    pub report_lexical_overlaps: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            lalr: true,
            report_lexical_overlaps: true,
        }
    }
}

impl CompileOptions {
    #[must_use]
    pub const fn with_lalr(mut self, lalr: bool) -> Self {
        self.lalr = lalr;
        self
    }

    #[must_use]
    pub const fn with_lexical_overlaps(mut self, report: bool) -> Self {
        self.report_lexical_overlaps = report;
        self
    }
}

/// A compiled language plus the advisory diagnostics produced for it.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub language: Arc<Language>,
    pub diagnostics: Vec<ConflictDiagnostic>,
}

/// Compiles `grammar` with default options.
///
/// # Errors
///
/// Returns a [`GrammarError`] for structural problems only.
pub fn compile(grammar: &Grammar) -> Result<Compiled, GrammarError> {
    compile_with(grammar, CompileOptions::default())
}

/// Compiles `grammar`.
///
/// # Errors
///
/// Returns a [`GrammarError`] for undefined or unreachable rules, unknown
/// precedence levels, invalid token patterns, syntactic extras and
/// derivation cycles.
pub fn compile_with(grammar: &Grammar, options: CompileOptions) -> Result<Compiled, GrammarError> {
    let prepared = prepare::prepare(grammar)?;
    let first = first::FirstSets::compute(&prepared);
    prepare::check_cycles(&prepared, &first.nullable)?;
    tracing::debug!(
        grammar = %prepared.name,
        symbols = prepared.symbols.len(),
        tokens = prepared.tokens.len(),
        productions = prepared.productions.len(),
        "prepared grammar"
    );

    let mut nfa = Nfa::new();
    let mut tokens = vec![None; prepared.symbols.len()];
    for token in &prepared.tokens {
        nfa.add_token(token.symbol, &token.rule, &token.body)?;
        tokens[token.symbol.index()] = Some(token.info);
    }
    let dfa = Dfa::from_nfa(&nfa);

    let automaton = automaton::build(&prepared, &first, options.lalr);
    let (table, mut diagnostics) = conflict::build_table(&prepared, &first, &automaton);
    if options.report_lexical_overlaps {
        diagnostics.extend(conflict::lexical_overlaps(&prepared, &table)?);
    }

    let productions = prepared
        .productions
        .iter()
        .map(|production| ProductionInfo {
            lhs: production.lhs,
            child_count: u16::try_from(production.steps.len()).unwrap_or(u16::MAX),
            fields: production.steps.iter().map(|step| step.field).collect::<SmallVec<_>>(),
            dynamic_precedence: production.dynamic_precedence,
        })
        .collect();

    tracing::debug!(
        grammar = %prepared.name,
        states = table.state_count,
        lexer_states = dfa.state_count(),
        diagnostics = diagnostics.len(),
        "compiled grammar"
    );

    let language = Language {
        name: prepared.name,
        symbols: prepared.symbols,
        fields: prepared.fields,
        productions,
        start_symbol: prepared.start_symbol,
        external_start: prepared.external_start,
        table,
        lex: LexTable { dfa, tokens },
        extras: prepared.extras,
        conflicts: prepared.conflicts,
    };
    Ok(Compiled {
        language: Arc::new(language),
        diagnostics,
    })
}
