use crate::compile::TokenSet;
use crate::lexer::regex::{CharRange, Nfa};
use crate::syntax::Symbol;
use hashbrown::{HashMap, HashSet};
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::VecDeque;

/// DFA state with transitions sorted by range start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub(crate) struct DfaState {
    transitions: Vec<(CharRange, u32)>,
    /// Tokens accepted here, ascending.
    accepting: SmallVec<[Symbol; 2]>,
    /// Tokens still reachable from here, accepting ones included.
    alive: TokenSet,
}

impl DfaState {
    /// Binary search over the sorted, disjoint ranges.
    fn find_transition(&self, c: char) -> Option<u32> {
        self.transitions
            .binary_search_by(|(range, _)| {
                if c < *range.start() {
                    std::cmp::Ordering::Greater
                } else if c > *range.end() {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .ok()
            .map(|index| self.transitions[index].1)
    }
}

/// Deterministic automaton over chars. State 0 is the start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub(crate) struct Dfa {
    states: Vec<DfaState>,
}

type StateSet = SmallVec<[u32; 8]>;

fn epsilon_closure(nfa: &Nfa, states: impl IntoIterator<Item = u32>) -> StateSet {
    let mut closure: HashSet<u32, ahash::RandomState> =
        HashSet::with_hasher(ahash::RandomState::new());
    let mut stack: Vec<u32> = Vec::new();
    for state in states {
        if closure.insert(state) {
            stack.push(state);
        }
    }
    while let Some(state) = stack.pop() {
        for &next in &nfa.states[state as usize].epsilon_transitions {
            if closure.insert(next) {
                stack.push(next);
            }
        }
    }
    let mut sorted: StateSet = closure.into_iter().collect();
    sorted.sort_unstable();
    sorted
}

/// Chars in `low..=high`, stepping over the surrogate gap.
fn char_interval(low: u32, high: u32) -> Option<(char, char)> {
    let first = char::from_u32(low).or_else(|| char::from_u32(0xE000))?;
    let last = char::from_u32(high).or_else(|| char::from_u32(0xD7FF))?;
    (first <= last).then_some((first, last))
}

impl Dfa {
    pub(crate) const START: u32 = 0;

    /// Subset construction. Overlapping NFA ranges are split at every
    /// boundary so the resulting transitions are disjoint.
    pub(crate) fn from_nfa(nfa: &Nfa) -> Self {
        let mut map: HashMap<StateSet, u32, ahash::RandomState> =
            HashMap::with_hasher(ahash::RandomState::new());
        let mut sets: Vec<StateSet> = Vec::new();
        let mut states: Vec<DfaState> = Vec::new();

        let start = epsilon_closure(nfa, [nfa.start()]);
        map.insert(start.clone(), 0);
        sets.push(start);
        states.push(DfaState::default());

        let mut worklist = VecDeque::from([0u32]);
        while let Some(id) = worklist.pop_front() {
            let set = sets[id as usize].clone();

            let mut accepting: SmallVec<[Symbol; 2]> = set
                .iter()
                .filter_map(|&state| nfa.states[state as usize].accepting)
                .collect();
            accepting.sort_unstable();
            accepting.dedup();

            let moves: Vec<(&CharRange, u32)> = set
                .iter()
                .flat_map(|&state| {
                    nfa.states[state as usize]
                        .transitions
                        .iter()
                        .map(|(range, target)| (range, *target))
                })
                .collect();

            let mut points: Vec<u32> = moves
                .iter()
                .flat_map(|(range, _)| [u32::from(*range.start()), u32::from(*range.end()) + 1])
                .collect();
            points.sort_unstable();
            points.dedup();

            let mut transitions: Vec<(CharRange, u32)> = Vec::new();
            for window in points.windows(2) {
                let (low, high) = (window[0], window[1] - 1);
                let Some((first, last)) = char_interval(low, high) else {
                    continue;
                };
                let targets = epsilon_closure(
                    nfa,
                    moves
                        .iter()
                        .filter(|(range, _)| range.contains(&first))
                        .map(|(_, target)| *target),
                );
                if targets.is_empty() {
                    continue;
                }
                let next_id = u32::try_from(sets.len()).unwrap_or(u32::MAX);
                let target = *map.entry(targets.clone()).or_insert_with(|| {
                    sets.push(targets);
                    states.push(DfaState::default());
                    worklist.push_back(next_id);
                    next_id
                });
                match transitions.last_mut() {
                    Some((range, previous))
                        if *previous == target
                            && u32::from(*range.end()) + 1 == u32::from(first) =>
                    {
                        *range = *range.start()..=last;
                    }
                    _ => transitions.push((first..=last, target)),
                }
            }

            let state = &mut states[id as usize];
            state.transitions = transitions;
            state.accepting = accepting;
        }

        let mut dfa = Self { states };
        dfa.compute_alive();
        dfa
    }

    fn compute_alive(&mut self) {
        for state in &mut self.states {
            state.alive = state.accepting.iter().copied().collect();
        }
        let mut changed = true;
        while changed {
            changed = false;
            for index in (0..self.states.len()).rev() {
                let targets: SmallVec<[u32; 8]> = self.states[index]
                    .transitions
                    .iter()
                    .map(|(_, target)| *target)
                    .collect();
                for target in targets {
                    if target as usize == index {
                        continue;
                    }
                    let alive = self.states[target as usize].alive.clone();
                    changed |= self.states[index].alive.union_with(&alive);
                }
            }
        }
    }

    pub(crate) fn state_count(&self) -> usize {
        self.states.len()
    }

    pub(crate) fn step(&self, state: u32, c: char) -> Option<u32> {
        self.states.get(state as usize)?.find_transition(c)
    }

    pub(crate) fn accepting(&self, state: u32) -> &[Symbol] {
        self.states
            .get(state as usize)
            .map_or(&[], |state| state.accepting.as_slice())
    }

    pub(crate) fn alive(&self, state: u32) -> Option<&TokenSet> {
        self.states.get(state as usize).map(|state| &state.alive)
    }

    /// Runs the automaton over `text` and returns the state reached.
    #[cfg(test)]
    pub(crate) fn run(&self, text: &str) -> Option<u32> {
        text.chars()
            .try_fold(Self::START, |state, c| self.step(state, c))
    }

    /// `true` if some non-empty string accepted by `self` leaves `other` in
    /// a state that accepts now or can still accept: a token of `other`
    /// could match the same text or a longer one.
    pub(crate) fn shadows(&self, other: &Self) -> bool {
        let mut seen: HashSet<(u32, u32), ahash::RandomState> =
            HashSet::with_hasher(ahash::RandomState::new());
        let mut queue = VecDeque::from([(Self::START, Self::START)]);
        seen.insert((Self::START, Self::START));
        while let Some((mine, theirs)) = queue.pop_front() {
            let (Some(a), Some(b)) = (
                self.states.get(mine as usize),
                other.states.get(theirs as usize),
            ) else {
                continue;
            };
            for (range_a, next_a) in &a.transitions {
                for (range_b, next_b) in &b.transitions {
                    if range_a.start() > range_b.end() || range_b.start() > range_a.end() {
                        continue;
                    }
                    let pair = (*next_a, *next_b);
                    if !self.accepting(pair.0).is_empty()
                        && other.alive(pair.1).is_some_and(|alive| !alive.is_empty())
                    {
                        return true;
                    }
                    if seen.insert(pair) {
                        queue.push_back(pair);
                    }
                }
            }
        }
        false
    }
}
