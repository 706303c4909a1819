use crate::lexer::dfa::Dfa;
use crate::syntax::{StateId, Symbol};
use compact_str::CompactString;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Parse table entry for a (state, terminal) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Action {
    Shift(StateId),
    /// Reduce by the production with this index.
    Reduce(u32),
    Accept,
    Error,
}

/// What a symbol stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum SymbolKind {
    End,
    /// Internal token recognised by the lexical tables.
    Token,
    /// Token recognised by an [`ExternalScanner`](crate::lexer::ExternalScanner).
    External,
    Rule,
    /// Rule introduced by the compiler for repetitions.
    Auxiliary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SymbolInfo {
    pub name: CompactString,
    pub kind: SymbolKind,
    /// Shown by [`SyntaxNode::children`](crate::SyntaxNode::children).
    pub visible: bool,
    /// Named rule or token, as opposed to an anonymous literal.
    pub named: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ProductionInfo {
    pub lhs: Symbol,
    /// Number of grammar symbols popped on reduction; extras excluded.
    pub child_count: u16,
    /// Field id per step.
    pub fields: SmallVec<[Option<u16>; 4]>,
    pub dynamic_precedence: i32,
}

/// Lexical attributes of an internal token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TokenInfo {
    pub precedence: i32,
    /// Declared as a string literal rather than a pattern.
    pub literal: bool,
    /// Not allowed after an extra.
    pub immediate: bool,
}

/// Fixed-capacity bit set over symbols.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TokenSet {
    words: SmallVec<[u64; 2]>,
}

impl TokenSet {
    #[must_use]
    pub fn with_capacity(symbols: usize) -> Self {
        Self {
            words: SmallVec::from_elem(0, symbols.div_ceil(64)),
        }
    }

    pub fn insert(&mut self, symbol: Symbol) -> bool {
        let (word, bit) = (symbol.index() / 64, symbol.index() % 64);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let fresh = self.words[word] & (1 << bit) == 0;
        self.words[word] |= 1 << bit;
        fresh
    }

    pub fn remove(&mut self, symbol: Symbol) {
        let (word, bit) = (symbol.index() / 64, symbol.index() % 64);
        if let Some(slot) = self.words.get_mut(word) {
            *slot &= !(1 << bit);
        }
    }

    #[must_use]
    pub fn contains(&self, symbol: Symbol) -> bool {
        let (word, bit) = (symbol.index() / 64, symbol.index() % 64);
        self.words.get(word).is_some_and(|w| w & (1 << bit) != 0)
    }

    /// Adds every member of `other`; returns whether `self` grew.
    pub fn union_with(&mut self, other: &Self) -> bool {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        let mut grew = false;
        for (mine, theirs) in self.words.iter_mut().zip(&other.words) {
            let merged = *mine | *theirs;
            grew |= merged != *mine;
            *mine = merged;
        }
        grew
    }

    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .any(|(a, b)| a & b != 0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.words.iter().enumerate().flat_map(|(index, word)| {
            (0..64u16)
                .filter(move |bit| word & (1 << bit) != 0)
                .filter_map(move |bit| {
                    u16::try_from(index * 64)
                        .ok()
                        .and_then(|base| base.checked_add(bit))
                        .map(Symbol::new)
                })
        })
    }
}

impl FromIterator<Symbol> for TokenSet {
    fn from_iter<I: IntoIterator<Item = Symbol>>(iter: I) -> Self {
        let mut set = Self::default();
        for symbol in iter {
            set.insert(symbol);
        }
        set
    }
}

/// Dense LR tables.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub(crate) struct ParseTable {
    pub(crate) state_count: usize,
    pub(crate) terminal_count: usize,
    pub(crate) nonterminal_count: usize,
    /// `state_count * terminal_count` entries.
    pub(crate) actions: Vec<Action>,
    /// `state_count * nonterminal_count` entries.
    pub(crate) gotos: Vec<Option<StateId>>,
    /// Terminals with a non-error action, plus the extras.
    pub(crate) valid: Vec<TokenSet>,
}

impl ParseTable {
    pub(crate) fn action(&self, state: StateId, symbol: Symbol) -> Action {
        if symbol.index() >= self.terminal_count {
            return Action::Error;
        }
        self.actions
            .get(state.index() * self.terminal_count + symbol.index())
            .copied()
            .unwrap_or(Action::Error)
    }

    pub(crate) fn goto(&self, state: StateId, symbol: Symbol) -> Option<StateId> {
        let column = symbol.index().checked_sub(self.terminal_count)?;
        if column >= self.nonterminal_count {
            return None;
        }
        self.gotos
            .get(state.index() * self.nonterminal_count + column)
            .copied()
            .flatten()
    }
}

/// Lexical tables: the combined token DFA and per-token attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub(crate) struct LexTable {
    pub(crate) dfa: Dfa,
    /// Indexed by symbol; `None` for non-internal symbols.
    pub(crate) tokens: Vec<Option<TokenInfo>>,
}

/// A compiled grammar: everything the lexer and parser need at run time.
///
/// Immutable and shared by `Arc` between parsers and threads. With the
/// `serialize` feature it round-trips through serde unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Language {
    pub(crate) name: CompactString,
    pub(crate) symbols: Vec<SymbolInfo>,
    pub(crate) fields: Vec<CompactString>,
    pub(crate) productions: Vec<ProductionInfo>,
    pub(crate) start_symbol: Symbol,
    pub(crate) external_start: usize,
    pub(crate) table: ParseTable,
    pub(crate) lex: LexTable,
    pub(crate) extras: TokenSet,
    /// Declared conflict entries, resolved to symbols.
    pub(crate) conflicts: Vec<SmallVec<[Symbol; 2]>>,
}

impl Language {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// End of input, internal tokens and external tokens.
    #[must_use]
    pub const fn terminal_count(&self) -> usize {
        self.table.terminal_count
    }

    #[must_use]
    pub const fn state_count(&self) -> usize {
        self.table.state_count
    }

    /// Symbol of the grammar's first rule.
    #[must_use]
    pub const fn start_symbol(&self) -> Symbol {
        self.start_symbol
    }

    #[must_use]
    pub fn symbol_info(&self, symbol: Symbol) -> Option<&SymbolInfo> {
        self.symbols.get(symbol.index())
    }

    /// Name of `symbol`; `"ERROR"` for error nodes.
    #[must_use]
    pub fn symbol_name(&self, symbol: Symbol) -> &str {
        if symbol.is_error() {
            return "ERROR";
        }
        self.symbol_info(symbol).map_or("", |info| info.name.as_str())
    }

    #[must_use]
    pub fn symbol_kind(&self, symbol: Symbol) -> Option<SymbolKind> {
        self.symbol_info(symbol).map(|info| info.kind)
    }

    #[must_use]
    pub fn is_visible(&self, symbol: Symbol) -> bool {
        symbol.is_error() || self.symbol_info(symbol).is_some_and(|info| info.visible)
    }

    #[must_use]
    pub fn is_named(&self, symbol: Symbol) -> bool {
        symbol.is_error() || self.symbol_info(symbol).is_some_and(|info| info.named)
    }

    #[must_use]
    pub const fn is_terminal(&self, symbol: Symbol) -> bool {
        symbol.index() < self.table.terminal_count
    }

    #[must_use]
    pub const fn is_external(&self, symbol: Symbol) -> bool {
        symbol.index() >= self.external_start && symbol.index() < self.table.terminal_count
    }

    /// Position of an external token in the grammar's `externals` list.
    #[must_use]
    pub fn external_index(&self, symbol: Symbol) -> Option<usize> {
        self.is_external(symbol)
            .then(|| symbol.index() - self.external_start)
    }

    /// External tokens in declaration order.
    pub fn externals(&self) -> impl Iterator<Item = Symbol> + '_ {
        (self.external_start..self.table.terminal_count)
            .filter_map(|index| u16::try_from(index).ok().map(Symbol::new))
    }

    #[must_use]
    pub fn is_extra(&self, symbol: Symbol) -> bool {
        self.extras.contains(symbol)
    }

    /// Looks a symbol up by name. Named symbols are preferred over
    /// anonymous literals with the same text.
    #[must_use]
    pub fn symbol_for_name(&self, name: &str) -> Option<Symbol> {
        let mut fallback = None;
        for (index, info) in self.symbols.iter().enumerate() {
            if info.name != name {
                continue;
            }
            let symbol = u16::try_from(index).ok().map(Symbol::new)?;
            if info.named {
                return Some(symbol);
            }
            fallback.get_or_insert(symbol);
        }
        if name == "ERROR" {
            return fallback.or(Some(Symbol::ERROR));
        }
        fallback
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn field_name_for_id(&self, id: u16) -> Option<&str> {
        self.fields.get(usize::from(id)).map(CompactString::as_str)
    }

    #[must_use]
    pub fn field_id_for_name(&self, name: &str) -> Option<u16> {
        self.fields
            .iter()
            .position(|field| field == name)
            .and_then(|index| u16::try_from(index).ok())
    }

    /// Field attached to the `step`-th child of `production`.
    #[must_use]
    pub fn field_name(&self, production: u32, step: usize) -> Option<&str> {
        let id = self.field_id(production, step)?;
        self.field_name_for_id(id)
    }

    pub(crate) fn field_id(&self, production: u32, step: usize) -> Option<u16> {
        self.production(production)?.fields.get(step).copied().flatten()
    }

    #[must_use]
    pub fn production(&self, index: u32) -> Option<&ProductionInfo> {
        self.productions.get(index as usize)
    }

    #[must_use]
    pub fn production_count(&self) -> usize {
        self.productions.len()
    }

    #[must_use]
    pub fn action(&self, state: StateId, symbol: Symbol) -> Action {
        self.table.action(state, symbol)
    }

    #[must_use]
    pub fn goto(&self, state: StateId, symbol: Symbol) -> Option<StateId> {
        self.table.goto(state, symbol)
    }

    /// Tokens the lexer may produce in `state`.
    #[must_use]
    pub fn valid_tokens(&self, state: StateId) -> Option<&TokenSet> {
        self.table.valid.get(state.index())
    }

    /// Terminals with a shift, reduce or accept action in `state`.
    #[must_use]
    pub fn expected_symbols(&self, state: StateId) -> Vec<Symbol> {
        (0..self.table.terminal_count)
            .filter_map(|index| u16::try_from(index).ok().map(Symbol::new))
            .filter(|symbol| self.action(state, *symbol) != Action::Error)
            .collect()
    }

    pub(crate) fn token_info(&self, symbol: Symbol) -> Option<&TokenInfo> {
        self.lex.tokens.get(symbol.index()).and_then(Option::as_ref)
    }

    pub(crate) const fn dfa(&self) -> &Dfa {
        &self.lex.dfa
    }

    /// `true` if a conflict entry lists both symbols.
    #[must_use]
    pub fn declared_together(&self, a: Symbol, b: Symbol) -> bool {
        self.conflicts
            .iter()
            .any(|entry| entry.contains(&a) && entry.contains(&b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_set_basics() {
        let mut set = TokenSet::with_capacity(10);
        assert!(set.insert(Symbol::new(3)));
        assert!(!set.insert(Symbol::new(3)));
        assert!(set.insert(Symbol::new(70)));
        assert!(set.contains(Symbol::new(70)));
        assert_eq!(set.iter().collect::<Vec<_>>(), [Symbol::new(3), Symbol::new(70)]);
        set.remove(Symbol::new(3));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_token_set_union_reports_growth() {
        let mut a: TokenSet = [Symbol::new(1)].into_iter().collect();
        let b: TokenSet = [Symbol::new(1), Symbol::new(2)].into_iter().collect();
        assert!(a.union_with(&b));
        assert!(!a.union_with(&b));
        assert!(a.intersects(&b));
    }
}
