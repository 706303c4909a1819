//! Action table construction and conflict resolution.
//!
//! Each (state, terminal) pair collects its shift and reduce candidates.
//! Reduce/reduce ties are settled first, then shift/reduce:
//!
//! 1. When a precedence annotation is involved or a conflict entry lists
//!    the competing rules, the higher static precedence wins; equal
//!    precedence consults associativity (left reduces, right shifts).
//! 2. Still tied inside a declared entry: the symbol listed first wins,
//!    then the higher dynamic precedence. A remaining tie shifts and is
//!    reported as [`ConflictKind::RuntimeChoiceRequired`].
//! 3. Otherwise shift wins and [`ConflictKind::ShiftReduce`] is reported.
//!
//! Reduce/reduce conflicts prefer higher precedence, then the production
//! declared earlier.

use crate::compile::automaton::{Automaton, closure};
use crate::compile::first::FirstSets;
use crate::compile::language::{Action, ParseTable, TokenSet};
use crate::compile::prepare::{PreparedGrammar, Production};
use crate::error::{ConflictDiagnostic, ConflictKind, GrammarError, Resolution};
use crate::grammar::Associativity;
use crate::lexer::dfa::Dfa;
use crate::lexer::regex::Nfa;
use crate::syntax::{StateId, Symbol};
use compact_str::CompactString;
use hashbrown::HashSet;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct ShiftCandidate {
    target: Option<StateId>,
    /// Highest precedence among the items shifting the terminal.
    precedence: Option<i32>,
    dynamic_precedence: Option<i32>,
    /// Left-hand sides of the shifting items.
    rules: SmallVec<[Symbol; 2]>,
}

struct TableBuilder<'a> {
    prepared: &'a PreparedGrammar,
    diagnostics: Vec<ConflictDiagnostic>,
    reported: HashSet<(ConflictKind, Option<CompactString>), ahash::RandomState>,
}

/// Builds the dense action and goto tables.
pub(crate) fn build_table(
    prepared: &PreparedGrammar,
    first: &FirstSets,
    automaton: &Automaton,
) -> (ParseTable, Vec<ConflictDiagnostic>) {
    let terminal_count = prepared.terminal_count;
    let nonterminal_count = prepared.symbols.len() - terminal_count;
    let state_count = automaton.states.len();
    let mut builder = TableBuilder {
        prepared,
        diagnostics: Vec::new(),
        reported: HashSet::with_hasher(ahash::RandomState::new()),
    };

    let mut actions = vec![Action::Error; state_count * terminal_count];
    let mut gotos = vec![None; state_count * nonterminal_count];
    let mut valid = Vec::with_capacity(state_count);

    for (index, kernel) in automaton.states.iter().enumerate() {
        let state = crate::compile::automaton::state_id(index);
        let items = closure(prepared, first, kernel);

        let mut shifts: BTreeMap<Symbol, ShiftCandidate> = BTreeMap::new();
        let mut reduces: BTreeMap<Symbol, SmallVec<[u32; 2]>> = BTreeMap::new();
        let mut accepts = false;

        for (item, lookahead) in &items {
            let Some(production) = prepared.productions.get(item.production as usize) else {
                continue;
            };
            match production.steps.get(item.dot as usize) {
                Some(step) if prepared.is_terminal(step.symbol) => {
                    let candidate = shifts.entry(step.symbol).or_default();
                    candidate.precedence = max_option(candidate.precedence, step.precedence);
                    candidate.dynamic_precedence = max_option(
                        candidate.dynamic_precedence,
                        Some(production.dynamic_precedence),
                    );
                    if !candidate.rules.contains(&production.lhs) {
                        candidate.rules.push(production.lhs);
                    }
                }
                Some(_) => {}
                None if item.production == prepared.augmented => accepts = true,
                None => {
                    for terminal in lookahead.iter() {
                        let list = reduces.entry(terminal).or_default();
                        if !list.contains(&item.production) {
                            list.push(item.production);
                        }
                    }
                }
            }
        }

        for &(symbol, target) in &automaton.transitions[index] {
            if prepared.is_terminal(symbol) {
                shifts.entry(symbol).or_default().target = Some(target);
            } else {
                gotos[index * nonterminal_count + symbol.index() - terminal_count] = Some(target);
            }
        }

        let mut terminals: Vec<Symbol> = shifts.keys().chain(reduces.keys()).copied().collect();
        terminals.sort_unstable();
        terminals.dedup();

        let mut state_valid = prepared.extras.clone();
        for terminal in terminals {
            let reduce = reduces
                .get_mut(&terminal)
                .and_then(|list| builder.resolve_reduce_reduce(state, terminal, list));
            let shift = shifts.get(&terminal).filter(|candidate| candidate.target.is_some());
            let action = match (shift, reduce) {
                (Some(shift), Some(reduce)) => {
                    builder.resolve_shift_reduce(state, terminal, shift, reduce)
                }
                (Some(shift), None) => shift.target.map_or(Action::Error, Action::Shift),
                (None, Some(reduce)) => Action::Reduce(reduce),
                (None, None) => Action::Error,
            };
            if action != Action::Error {
                actions[index * terminal_count + terminal.index()] = action;
                state_valid.insert(terminal);
            }
        }
        if accepts {
            actions[index * terminal_count + Symbol::END.index()] = Action::Accept;
            state_valid.insert(Symbol::END);
        }
        valid.push(state_valid);
    }

    let table = ParseTable {
        state_count,
        terminal_count,
        nonterminal_count,
        actions,
        gotos,
        valid,
    };
    (table, builder.diagnostics)
}

fn max_option(a: Option<i32>, b: Option<i32>) -> Option<i32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

impl<'a> TableBuilder<'a> {
    fn production(&self, index: u32) -> Option<&'a Production> {
        self.prepared.productions.get(index as usize)
    }

    fn rule_name(&self, symbol: Symbol) -> CompactString {
        self.prepared.origin_name(symbol).into()
    }

    /// Entry declaring `a` and `b` together, if any.
    fn entry_for(&self, a: Symbol, b: Symbol) -> Option<&'a SmallVec<[Symbol; 2]>> {
        let (a, b) = (self.prepared.origin(a), self.prepared.origin(b));
        self.prepared
            .conflicts
            .iter()
            .find(|entry| entry.contains(&a) && entry.contains(&b))
    }

    fn report(
        &mut self,
        kind: ConflictKind,
        state: StateId,
        lookahead: Symbol,
        resolution: Resolution,
    ) {
        let lookahead = Some(CompactString::from(self.prepared.name_of(lookahead)));
        if self.reported.insert((kind.clone(), lookahead.clone())) {
            tracing::debug!(%state, ?kind, "conflict resolved by default");
            self.diagnostics.push(ConflictDiagnostic {
                kind,
                state: Some(state),
                lookahead,
                resolution,
            });
        }
    }

    fn resolve_reduce_reduce(
        &mut self,
        state: StateId,
        lookahead: Symbol,
        candidates: &mut SmallVec<[u32; 2]>,
    ) -> Option<u32> {
        candidates.sort_unstable();
        let mut winner = *candidates.first()?;
        for &challenger in candidates.iter().skip(1) {
            let (Some(current), Some(other)) =
                (self.production(winner), self.production(challenger))
            else {
                continue;
            };
            let declared = self.entry_for(current.lhs, other.lhs).is_some();
            let by_precedence = other
                .precedence
                .unwrap_or(0)
                .cmp(&current.precedence.unwrap_or(0));
            let by_dynamic = other.dynamic_precedence.cmp(&current.dynamic_precedence);
            winner = match (by_precedence, by_dynamic) {
                (Ordering::Greater, _) => challenger,
                (Ordering::Less, _) => winner,
                (Ordering::Equal, Ordering::Greater) if declared => challenger,
                (Ordering::Equal, _) => {
                    if !declared {
                        let kind = ConflictKind::ReduceReduce {
                            chosen: self.rule_name(current.lhs),
                            discarded: self.rule_name(other.lhs),
                        };
                        let resolution = Resolution::Reduce {
                            rule: self.rule_name(current.lhs),
                        };
                        self.report(kind, state, lookahead, resolution);
                    }
                    winner
                }
            };
        }
        Some(winner)
    }

    fn resolve_shift_reduce(
        &mut self,
        state: StateId,
        lookahead: Symbol,
        shift: &ShiftCandidate,
        reduce: u32,
    ) -> Action {
        let Some(target) = shift.target else {
            return Action::Reduce(reduce);
        };
        let Some(production) = self.production(reduce) else {
            return Action::Shift(target);
        };
        let reduce_rule = production.lhs;

        let entry = shift
            .rules
            .iter()
            .find_map(|&rule| self.entry_for(reduce_rule, rule))
            .or_else(|| self.entry_for(reduce_rule, lookahead));
        let explicit = shift.precedence.is_some() || production.precedence.is_some();

        let shift_rules: Vec<CompactString> = {
            let mut names: Vec<CompactString> =
                shift.rules.iter().map(|&rule| self.rule_name(rule)).collect();
            names.dedup();
            names
        };

        if entry.is_none() && !explicit {
            let kind = ConflictKind::ShiftReduce {
                reduce_rule: self.rule_name(reduce_rule),
                shift_rules,
            };
            self.report(kind, state, lookahead, Resolution::Shift);
            return Action::Shift(target);
        }

        match production
            .precedence
            .unwrap_or(0)
            .cmp(&shift.precedence.unwrap_or(0))
        {
            Ordering::Greater => return Action::Reduce(reduce),
            Ordering::Less => return Action::Shift(target),
            Ordering::Equal => {}
        }
        match production.associativity {
            Some(Associativity::Left) => return Action::Reduce(reduce),
            Some(Associativity::Right) => return Action::Shift(target),
            Some(Associativity::None) | None => {}
        }

        if let Some(entry) = entry {
            let reduce_position = entry
                .iter()
                .position(|&symbol| symbol == self.prepared.origin(reduce_rule));
            let shift_position = shift
                .rules
                .iter()
                .chain(std::iter::once(&lookahead))
                .filter_map(|&rule| {
                    let rule = self.prepared.origin(rule);
                    entry.iter().position(|&symbol| symbol == rule)
                })
                .min();
            if let (Some(reduce_position), Some(shift_position)) = (reduce_position, shift_position)
            {
                match reduce_position.cmp(&shift_position) {
                    Ordering::Less => return Action::Reduce(reduce),
                    Ordering::Greater => return Action::Shift(target),
                    Ordering::Equal => {}
                }
            }
            match production
                .dynamic_precedence
                .cmp(&shift.dynamic_precedence.unwrap_or(0))
            {
                Ordering::Greater => return Action::Reduce(reduce),
                Ordering::Less => return Action::Shift(target),
                Ordering::Equal => {}
            }
        }

        let kind = if entry.is_some() || production.associativity == Some(Associativity::None) {
            ConflictKind::RuntimeChoiceRequired {
                reduce_rule: self.rule_name(reduce_rule),
                shift_rules,
            }
        } else {
            ConflictKind::ShiftReduce {
                reduce_rule: self.rule_name(reduce_rule),
                shift_rules,
            }
        };
        self.report(kind, state, lookahead, Resolution::Shift);
        Action::Shift(target)
    }
}

/// Reports shaped external tokens that can fire where an internal token,
/// not declared in the same conflict entry, could match the same text or
/// a longer one.
pub(crate) fn lexical_overlaps(
    prepared: &PreparedGrammar,
    table: &ParseTable,
) -> Result<Vec<ConflictDiagnostic>, GrammarError> {
    let mut diagnostics = Vec::new();
    let declared = |a: Symbol, b: Symbol| {
        prepared
            .conflicts
            .iter()
            .any(|entry| entry.contains(&a) && entry.contains(&b))
    };

    let mut token_dfas: Vec<Option<Dfa>> = vec![None; prepared.symbols.len()];
    for external in &prepared.externals {
        let Some(shape) = &external.shape else {
            continue;
        };
        let external_name = prepared.name_of(external.symbol);
        let mut nfa = Nfa::new();
        nfa.add_token(external.symbol, external_name, shape)?;
        let shape_dfa = Dfa::from_nfa(&nfa);

        let mut seen = TokenSet::with_capacity(prepared.terminal_count);
        for (index, valid) in table.valid.iter().enumerate() {
            if !valid.contains(external.symbol) {
                continue;
            }
            for token in &prepared.tokens {
                if !valid.contains(token.symbol)
                    || seen.contains(token.symbol)
                    || declared(external.symbol, token.symbol)
                {
                    continue;
                }
                let slot = &mut token_dfas[token.symbol.index()];
                if slot.is_none() {
                    let mut nfa = Nfa::new();
                    nfa.add_token(token.symbol, &token.rule, &token.body)?;
                    *slot = Some(Dfa::from_nfa(&nfa));
                }
                let Some(dfa) = slot.as_ref() else {
                    continue;
                };
                if shape_dfa.shadows(dfa) {
                    seen.insert(token.symbol);
                    diagnostics.push(ConflictDiagnostic {
                        kind: ConflictKind::LexicalOverlap {
                            external: external_name.into(),
                            internal: prepared.name_of(token.symbol).into(),
                        },
                        state: Some(crate::compile::automaton::state_id(index)),
                        lookahead: None,
                        resolution: Resolution::ExternalFirst,
                    });
                }
            }
        }
    }
    Ok(diagnostics)
}
