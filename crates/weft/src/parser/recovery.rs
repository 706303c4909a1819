//! Table-driven error recovery.
//!
//! When the lookahead has no action the parser tries, in order and at most
//! once per lookahead token:
//!
//! 1. inserting one zero-width token, after the reductions it calls for,
//!    such that the lookahead can be shifted next,
//! 2. popping the fewest grammar symbols that leave a state accepting the
//!    lookahead, wrapping them into an `ERROR` node,
//! 3. skipping the lookahead into an `ERROR` node.
//!
//! The checks below only simulate the state stack; the engine applies the
//! chosen repair.

use crate::compile::{Action, Language};
use crate::syntax::{StateId, Symbol};

/// Upper bound on simulated reductions for one lookahead.
pub(crate) const REDUCTION_LIMIT: usize = 4096;

/// Repairs already attempted for the current lookahead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Attempts {
    pub(crate) inserted: bool,
    pub(crate) popped: bool,
}

/// Applies one reduction to the simulated stack.
fn reduce(language: &Language, states: &mut Vec<StateId>, production: u32) -> Option<()> {
    let info = language.production(production)?;
    let count = usize::from(info.child_count);
    if count >= states.len() {
        return None;
    }
    states.truncate(states.len() - count);
    let below = states.last().copied().unwrap_or(StateId::START);
    states.push(language.goto(below, info.lhs)?);
    Some(())
}

/// `true` if `symbol` is eventually shifted or accepted from `states`.
///
/// `states` holds the states of grammar symbols only, bottom first.
pub(crate) fn would_accept(language: &Language, mut states: Vec<StateId>, symbol: Symbol) -> bool {
    for _ in 0..REDUCTION_LIMIT {
        let Some(&top) = states.last() else {
            return false;
        };
        match language.action(top, symbol) {
            Action::Shift(_) | Action::Accept => return true,
            Action::Error => return false,
            Action::Reduce(production) => {
                if reduce(language, &mut states, production).is_none() {
                    return false;
                }
            }
        }
    }
    false
}

/// The stack after performing the reductions that lead up to shifting
/// `symbol`, and the shift itself.
fn shift_through(language: &Language, mut states: Vec<StateId>, symbol: Symbol) -> Option<Vec<StateId>> {
    for _ in 0..REDUCTION_LIMIT {
        match language.action(*states.last()?, symbol) {
            Action::Shift(next) => {
                states.push(next);
                return Some(states);
            }
            Action::Reduce(production) => reduce(language, &mut states, production)?,
            Action::Accept | Action::Error => return None,
        }
    }
    None
}

/// First terminal, in symbol order, whose insertion makes `lookahead`
/// acceptable. Extras are never inserted.
pub(crate) fn find_insertion(language: &Language, states: &[StateId], lookahead: Symbol) -> Option<Symbol> {
    (1..language.terminal_count())
        .filter_map(|index| u16::try_from(index).ok().map(Symbol::new))
        .filter(|&symbol| symbol != lookahead && !language.is_extra(symbol))
        .find(|&symbol| {
            shift_through(language, states.to_vec(), symbol)
                .is_some_and(|after| would_accept(language, after, lookahead))
        })
}

/// Fewest grammar symbols to pop so that `lookahead` becomes acceptable.
pub(crate) fn find_pop_depth(language: &Language, states: &[StateId], lookahead: Symbol) -> Option<usize> {
    (1..states.len()).find(|&depth| {
        let trial = states[..states.len() - depth].to_vec();
        would_accept(language, trial, lookahead)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::grammar::{GrammarBuilder, pattern, repeat, repeat1, seq, string, sym};
    use std::sync::Arc;

    // program: repeat(statement); statement: "(" word ")"
    fn language() -> Arc<Language> {
        let grammar = GrammarBuilder::new("parens")
            .rule("program", repeat(sym("statement")))
            .rule("statement", seq([string("("), sym("word"), string(")")]))
            .rule("word", pattern("[a-z]+"))
            .build()
            .unwrap();
        compile(&grammar).unwrap().language
    }

    fn shift(language: &Language, states: &mut Vec<StateId>, name: &str) {
        let symbol = language.symbol_for_name(name).unwrap();
        let Action::Shift(next) = language.action(*states.last().unwrap(), symbol) else {
            panic!("no shift on {name}");
        };
        states.push(next);
    }

    #[test]
    fn test_would_accept_follows_reductions() {
        let language = language();
        let mut states = vec![StateId::START];
        assert!(would_accept(&language, states.clone(), Symbol::END));
        shift(&language, &mut states, "(");
        assert!(!would_accept(&language, states.clone(), Symbol::END));
        shift(&language, &mut states, "word");
        shift(&language, &mut states, ")");
        assert!(would_accept(&language, states, Symbol::END));
    }

    #[test]
    fn test_insertion_finds_missing_close() {
        let language = language();
        let mut states = vec![StateId::START];
        shift(&language, &mut states, "(");
        shift(&language, &mut states, "word");
        let symbol = find_insertion(&language, &states, Symbol::END).unwrap();
        assert_eq!(language.symbol_name(symbol), ")");
    }

    #[test]
    fn test_insertion_follows_reductions() {
        // `)` is only shifted once the words are reduced to a list.
        let grammar = GrammarBuilder::new("lists")
            .rule("program", repeat(sym("statement")))
            .rule("statement", seq([string("("), repeat1(sym("word")), string(")")]))
            .rule("word", pattern("[a-z]+"))
            .build()
            .unwrap();
        let language = compile(&grammar).unwrap().language;
        let mut states = vec![StateId::START];
        shift(&language, &mut states, "(");
        shift(&language, &mut states, "word");
        let close = language.symbol_for_name(")").unwrap();
        assert!(!matches!(
            language.action(*states.last().unwrap(), close),
            Action::Shift(_)
        ));
        let symbol = find_insertion(&language, &states, Symbol::END).unwrap();
        assert_eq!(symbol, close);
    }

    #[test]
    fn test_pop_depth_is_minimal() {
        let language = language();
        let mut states = vec![StateId::START];
        shift(&language, &mut states, "(");
        shift(&language, &mut states, "word");
        let open = language.symbol_for_name("(").unwrap();
        assert_eq!(find_pop_depth(&language, &states, open), Some(2));
        assert_eq!(find_pop_depth(&language, &[StateId::START], open), None);
    }
}
