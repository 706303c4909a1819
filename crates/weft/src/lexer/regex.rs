//! Thompson construction from token combinators and regex patterns.

use crate::error::GrammarError;
use crate::grammar::Combinator;
use crate::syntax::Symbol;
use regex_syntax::hir::{Class, Hir, HirKind};

pub(crate) type CharRange = std::ops::RangeInclusive<char>;

/// Largest bounded repetition expanded into copies.
const MAX_REPETITION: u32 = 256;

#[derive(Debug, Clone, Default)]
pub(crate) struct NfaState {
    pub(crate) transitions: Vec<(CharRange, u32)>,
    pub(crate) epsilon_transitions: Vec<u32>,
    pub(crate) accepting: Option<Symbol>,
}

/// NFA shared by every token of a lexical table. State 0 is the start.
#[derive(Debug, Clone)]
pub(crate) struct Nfa {
    pub(crate) states: Vec<NfaState>,
}

impl Default for Nfa {
    fn default() -> Self {
        Self::new()
    }
}

impl Nfa {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            states: vec![NfaState::default()],
        }
    }

    pub(crate) const fn start(&self) -> u32 {
        0
    }

    fn add_state(&mut self) -> u32 {
        let id = u32::try_from(self.states.len()).unwrap_or(u32::MAX);
        self.states.push(NfaState::default());
        id
    }

    fn state_mut(&mut self, id: u32) -> &mut NfaState {
        &mut self.states[id as usize]
    }

    fn epsilon(&mut self, from: u32, to: u32) {
        self.state_mut(from).epsilon_transitions.push(to);
    }

    /// Adds `body` as an alternative of the start state accepting `symbol`.
    ///
    /// # Errors
    ///
    /// Fails on invalid or unsupported regex syntax and on non-lexical
    /// combinators.
    pub(crate) fn add_token(
        &mut self,
        symbol: Symbol,
        rule: &str,
        body: &Combinator,
    ) -> Result<(), GrammarError> {
        let (start, end) = self.combinator(rule, body)?;
        self.epsilon(self.start(), start);
        self.state_mut(end).accepting = Some(symbol);
        Ok(())
    }

    fn combinator(&mut self, rule: &str, body: &Combinator) -> Result<(u32, u32), GrammarError> {
        match body {
            Combinator::Blank => Ok(self.empty()),
            Combinator::String { value } => Ok(self.literal(value)),
            Combinator::Pattern { value } => {
                let hir = regex_syntax::ParserBuilder::new()
                    .build()
                    .parse(value)
                    .map_err(|error| GrammarError::InvalidPattern {
                        rule: rule.into(),
                        pattern: value.clone(),
                        reason: error.to_string(),
                    })?;
                self.hir(rule, value, &hir)
            }
            Combinator::Seq { members } => {
                let mut fragment = self.empty();
                for member in members {
                    let next = self.combinator(rule, member)?;
                    fragment = self.concat(fragment, next);
                }
                Ok(fragment)
            }
            Combinator::Choice { members } => {
                let mut branches = Vec::with_capacity(members.len());
                for member in members {
                    branches.push(self.combinator(rule, member)?);
                }
                Ok(self.alternation(&branches))
            }
            Combinator::Repeat { content } => {
                let inner = self.combinator(rule, content)?;
                Ok(self.star(inner))
            }
            Combinator::Repeat1 { content } => {
                let inner = self.combinator(rule, content)?;
                Ok(self.plus(inner))
            }
            Combinator::Optional { content } => {
                let inner = self.combinator(rule, content)?;
                let empty = self.empty();
                Ok(self.alternation(&[inner, empty]))
            }
            Combinator::Prec { content, .. }
            | Combinator::PrecDynamic { content, .. }
            | Combinator::Token { content, .. } => self.combinator(rule, content),
            Combinator::Symbol { name } => Err(GrammarError::InvalidToken {
                rule: rule.into(),
                reason: format!("`{name}` is referenced inside a token"),
            }),
            Combinator::Field { name, .. } => Err(GrammarError::InvalidToken {
                rule: rule.into(),
                reason: format!("field `{name}` inside a token"),
            }),
        }
    }

    fn hir(&mut self, rule: &str, pattern: &str, hir: &Hir) -> Result<(u32, u32), GrammarError> {
        let unsupported = |reason: &str| GrammarError::InvalidPattern {
            rule: rule.into(),
            pattern: pattern.into(),
            reason: reason.into(),
        };
        match hir.kind() {
            HirKind::Empty => Ok(self.empty()),
            HirKind::Literal(literal) => {
                let text = std::str::from_utf8(&literal.0)
                    .map_err(|_| unsupported("literal is not valid UTF-8"))?;
                Ok(self.literal(text))
            }
            HirKind::Class(Class::Unicode(class)) => {
                let ranges: Vec<CharRange> = class
                    .ranges()
                    .iter()
                    .map(|range| range.start()..=range.end())
                    .collect();
                Ok(self.class(&ranges))
            }
            HirKind::Class(Class::Bytes(class)) => {
                let mut ranges = Vec::new();
                for range in class.ranges() {
                    if !range.end().is_ascii() {
                        return Err(unsupported("byte classes must be ASCII"));
                    }
                    ranges.push(char::from(range.start())..=char::from(range.end()));
                }
                Ok(self.class(&ranges))
            }
            HirKind::Look(_) => Err(unsupported(
                "anchors and word boundaries cannot be used in tokens",
            )),
            HirKind::Repetition(repetition) => {
                let min = repetition.min;
                if min > MAX_REPETITION || repetition.max.is_some_and(|max| max > MAX_REPETITION) {
                    return Err(unsupported("repetition bound is too large"));
                }
                let mut fragment = self.empty();
                for _ in 0..min {
                    let copy = self.hir(rule, pattern, &repetition.sub)?;
                    fragment = self.concat(fragment, copy);
                }
                match repetition.max {
                    None => {
                        let copy = self.hir(rule, pattern, &repetition.sub)?;
                        let tail = self.star(copy);
                        fragment = self.concat(fragment, tail);
                    }
                    Some(max) => {
                        for _ in min..max {
                            let copy = self.hir(rule, pattern, &repetition.sub)?;
                            let empty = self.empty();
                            let optional = self.alternation(&[copy, empty]);
                            fragment = self.concat(fragment, optional);
                        }
                    }
                }
                Ok(fragment)
            }
            HirKind::Capture(capture) => self.hir(rule, pattern, &capture.sub),
            HirKind::Concat(parts) => {
                let mut fragment = self.empty();
                for part in parts {
                    let next = self.hir(rule, pattern, part)?;
                    fragment = self.concat(fragment, next);
                }
                Ok(fragment)
            }
            HirKind::Alternation(parts) => {
                let mut branches = Vec::with_capacity(parts.len());
                for part in parts {
                    branches.push(self.hir(rule, pattern, part)?);
                }
                Ok(self.alternation(&branches))
            }
        }
    }

    fn empty(&mut self) -> (u32, u32) {
        let state = self.add_state();
        (state, state)
    }

    fn literal(&mut self, text: &str) -> (u32, u32) {
        let start = self.add_state();
        let mut current = start;
        for c in text.chars() {
            let next = self.add_state();
            self.state_mut(current).transitions.push((c..=c, next));
            current = next;
        }
        (start, current)
    }

    fn class(&mut self, ranges: &[CharRange]) -> (u32, u32) {
        let start = self.add_state();
        let end = self.add_state();
        for range in ranges {
            self.state_mut(start).transitions.push((range.clone(), end));
        }
        (start, end)
    }

    fn concat(&mut self, first: (u32, u32), second: (u32, u32)) -> (u32, u32) {
        self.epsilon(first.1, second.0);
        (first.0, second.1)
    }

    fn alternation(&mut self, branches: &[(u32, u32)]) -> (u32, u32) {
        let start = self.add_state();
        let end = self.add_state();
        for &(branch_start, branch_end) in branches {
            self.epsilon(start, branch_start);
            self.epsilon(branch_end, end);
        }
        (start, end)
    }

    fn star(&mut self, inner: (u32, u32)) -> (u32, u32) {
        let start = self.add_state();
        let end = self.add_state();
        self.epsilon(start, inner.0);
        self.epsilon(start, end);
        self.epsilon(inner.1, inner.0);
        self.epsilon(inner.1, end);
        (start, end)
    }

    fn plus(&mut self, inner: (u32, u32)) -> (u32, u32) {
        let end = self.add_state();
        self.epsilon(inner.1, inner.0);
        self.epsilon(inner.1, end);
        (inner.0, end)
    }
}
