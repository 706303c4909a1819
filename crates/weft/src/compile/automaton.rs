//! LR(1) item sets, merged by core into an LALR(1) automaton.

use crate::compile::first::FirstSets;
use crate::compile::language::TokenSet;
use crate::compile::prepare::PreparedGrammar;
use crate::syntax::{StateId, Symbol};
use hashbrown::HashMap;
use indexmap::IndexMap;
use std::collections::{BTreeMap, VecDeque};

/// Dotted production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct Item {
    pub(crate) production: u32,
    pub(crate) dot: u32,
}

impl Item {
    /// Symbol after the dot, `None` for a completed item.
    pub(crate) fn next_symbol(self, prepared: &PreparedGrammar) -> Option<Symbol> {
        prepared
            .productions
            .get(self.production as usize)
            .and_then(|production| production.steps.get(self.dot as usize))
            .map(|step| step.symbol)
    }
}

/// Kernel items with their lookaheads, sorted by item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ItemSet {
    pub(crate) items: Vec<Item>,
    pub(crate) lookaheads: Vec<TokenSet>,
}

#[derive(Debug, Clone)]
pub(crate) struct Automaton {
    pub(crate) states: Vec<ItemSet>,
    /// Successor per symbol, ascending by symbol.
    pub(crate) transitions: Vec<Vec<(Symbol, StateId)>>,
}

pub(crate) fn state_id(index: usize) -> StateId {
    StateId::new(u32::try_from(index).unwrap_or(u32::MAX))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StateKey {
    items: Vec<Item>,
    /// Present only for canonical LR(1), where lookaheads split states.
    lookaheads: Option<Vec<TokenSet>>,
}

/// Closure of a kernel: every item with its lookahead set.
pub(crate) fn closure(
    prepared: &PreparedGrammar,
    first: &FirstSets,
    kernel: &ItemSet,
) -> IndexMap<Item, TokenSet, ahash::RandomState> {
    let mut items: IndexMap<Item, TokenSet, ahash::RandomState> =
        IndexMap::with_hasher(ahash::RandomState::new());
    let mut queue: VecDeque<Item> = VecDeque::new();
    for (item, lookahead) in kernel.items.iter().zip(&kernel.lookaheads) {
        items.insert(*item, lookahead.clone());
        queue.push_back(*item);
    }

    while let Some(item) = queue.pop_front() {
        let Some(production) = prepared.productions.get(item.production as usize) else {
            continue;
        };
        let dot = item.dot as usize;
        let Some(step) = production.steps.get(dot) else {
            continue;
        };
        if prepared.is_terminal(step.symbol) {
            continue;
        }
        let follow = items.get(&item).cloned().unwrap_or_default();
        let lookahead = first.sequence(&production.steps[dot + 1..], &follow);
        for &index in &prepared.by_lhs[step.symbol.index()] {
            let start = Item {
                production: index,
                dot: 0,
            };
            let grew = match items.get_mut(&start) {
                Some(existing) => existing.union_with(&lookahead),
                None => {
                    items.insert(start, lookahead.clone());
                    true
                }
            };
            if grew {
                queue.push_back(start);
            }
        }
    }
    items
}

/// Builds the automaton. With `lalr`, states with equal kernels are
/// merged and their lookaheads united; otherwise the canonical LR(1)
/// collection is built.
pub(crate) fn build(prepared: &PreparedGrammar, first: &FirstSets, lalr: bool) -> Automaton {
    let mut end = TokenSet::with_capacity(prepared.terminal_count);
    end.insert(Symbol::END);
    let start = ItemSet {
        items: vec![Item {
            production: prepared.augmented,
            dot: 0,
        }],
        lookaheads: vec![end],
    };

    let key_of = |set: &ItemSet| StateKey {
        items: set.items.clone(),
        lookaheads: (!lalr).then(|| set.lookaheads.clone()),
    };

    let mut states = vec![start.clone()];
    let mut transitions: Vec<Vec<(Symbol, StateId)>> = vec![Vec::new()];
    let mut index: HashMap<StateKey, usize, ahash::RandomState> =
        HashMap::with_hasher(ahash::RandomState::new());
    index.insert(key_of(&start), 0);
    let mut queue = VecDeque::from([0usize]);
    let mut queued = vec![true];

    while let Some(current) = queue.pop_front() {
        queued[current] = false;
        let items = closure(prepared, first, &states[current]);

        let mut successors: BTreeMap<Symbol, BTreeMap<Item, TokenSet>> = BTreeMap::new();
        for (item, lookahead) in &items {
            if let Some(symbol) = item.next_symbol(prepared) {
                let advanced = Item {
                    production: item.production,
                    dot: item.dot + 1,
                };
                successors
                    .entry(symbol)
                    .or_default()
                    .entry(advanced)
                    .or_default()
                    .union_with(lookahead);
            }
        }

        let mut edges = Vec::with_capacity(successors.len());
        for (symbol, kernel) in successors {
            let (items, lookaheads): (Vec<Item>, Vec<TokenSet>) = kernel.into_iter().unzip();
            let kernel = ItemSet { items, lookaheads };
            let key = key_of(&kernel);
            let target = if let Some(&target) = index.get(&key) {
                let mut grew = false;
                for (existing, incoming) in states[target]
                    .lookaheads
                    .iter_mut()
                    .zip(&kernel.lookaheads)
                {
                    grew |= existing.union_with(incoming);
                }
                if grew && !queued[target] {
                    queued[target] = true;
                    queue.push_back(target);
                }
                target
            } else {
                let target = states.len();
                states.push(kernel);
                transitions.push(Vec::new());
                queued.push(true);
                queue.push_back(target);
                index.insert(key, target);
                target
            };
            edges.push((symbol, state_id(target)));
        }
        transitions[current] = edges;
    }

    tracing::debug!(
        states = states.len(),
        lalr,
        "built parse automaton"
    );
    Automaton {
        states,
        transitions,
    }
}
