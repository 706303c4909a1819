use crate::compile::language::TokenSet;
use crate::compile::prepare::{PreparedGrammar, Step};
use crate::syntax::Symbol;

/// Nullable flags and FIRST sets for every symbol.
#[derive(Debug, Clone)]
pub(crate) struct FirstSets {
    pub(crate) nullable: Vec<bool>,
    first: Vec<TokenSet>,
    terminal_count: usize,
}

impl FirstSets {
    /// Least fixed point over the productions.
    pub(crate) fn compute(prepared: &PreparedGrammar) -> Self {
        let count = prepared.symbols.len();
        let terminal_count = prepared.terminal_count;
        let mut nullable = vec![false; count];
        let mut first: Vec<TokenSet> = (0..count)
            .map(|index| {
                let mut set = TokenSet::with_capacity(terminal_count);
                if index < terminal_count {
                    if let Ok(index) = u16::try_from(index) {
                        set.insert(Symbol::new(index));
                    }
                }
                set
            })
            .collect();

        let mut changed = true;
        while changed {
            changed = false;
            for production in &prepared.productions {
                let lhs = production.lhs.index();
                let mut all_nullable = true;
                for step in &production.steps {
                    let symbol = step.symbol.index();
                    if symbol != lhs {
                        let addition = first[symbol].clone();
                        changed |= first[lhs].union_with(&addition);
                    }
                    if !nullable[symbol] {
                        all_nullable = false;
                        break;
                    }
                }
                if all_nullable && !nullable[lhs] {
                    nullable[lhs] = true;
                    changed = true;
                }
            }
        }

        Self {
            nullable,
            first,
            terminal_count,
        }
    }

    pub(crate) fn first(&self, symbol: Symbol) -> Option<&TokenSet> {
        self.first.get(symbol.index())
    }

    pub(crate) fn is_nullable(&self, symbol: Symbol) -> bool {
        self.nullable.get(symbol.index()).copied().unwrap_or(false)
    }

    /// FIRST of `steps`, with `follow` added when all of them are nullable.
    pub(crate) fn sequence(&self, steps: &[Step], follow: &TokenSet) -> TokenSet {
        let mut result = TokenSet::with_capacity(self.terminal_count);
        for step in steps {
            if let Some(first) = self.first(step.symbol) {
                result.union_with(first);
            }
            if !self.is_nullable(step.symbol) {
                return result;
            }
        }
        result.union_with(follow);
        result
    }
}
