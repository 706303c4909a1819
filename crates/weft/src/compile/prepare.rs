//! Lowering of a [`Grammar`] into numbered symbols and flat productions.

use crate::compile::language::{SymbolInfo, SymbolKind, TokenInfo, TokenSet};
use crate::error::GrammarError;
use crate::grammar::{Associativity, Combinator, Grammar};
use crate::syntax::Symbol;
use compact_str::{CompactString, format_compact};
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::collections::VecDeque;

/// One position in a production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Step {
    pub(crate) symbol: Symbol,
    /// `None` when no precedence annotation encloses the step.
    pub(crate) precedence: Option<i32>,
    pub(crate) associativity: Option<Associativity>,
    pub(crate) field: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Production {
    pub(crate) lhs: Symbol,
    pub(crate) steps: Vec<Step>,
    pub(crate) precedence: Option<i32>,
    pub(crate) associativity: Option<Associativity>,
    pub(crate) dynamic_precedence: i32,
}

/// Internal token with the combinator its lexical table is built from.
#[derive(Debug, Clone)]
pub(crate) struct LexicalToken {
    pub(crate) symbol: Symbol,
    pub(crate) rule: CompactString,
    pub(crate) body: Combinator,
    pub(crate) info: TokenInfo,
}

#[derive(Debug, Clone)]
pub(crate) struct ExternalShape {
    pub(crate) symbol: Symbol,
    pub(crate) shape: Option<Combinator>,
}

/// A grammar lowered to numbered symbols.
///
/// Symbol layout: end of input, internal tokens, external tokens, rules,
/// auxiliary repetition rules, and the augmented start symbol last.
#[derive(Debug, Clone)]
pub(crate) struct PreparedGrammar {
    pub(crate) name: CompactString,
    pub(crate) symbols: Vec<SymbolInfo>,
    /// Rule each symbol was written in; an auxiliary maps to its parent rule.
    pub(crate) origins: Vec<Symbol>,
    pub(crate) fields: Vec<CompactString>,
    pub(crate) productions: Vec<Production>,
    /// Productions per symbol.
    pub(crate) by_lhs: Vec<SmallVec<[u32; 4]>>,
    pub(crate) tokens: Vec<LexicalToken>,
    pub(crate) externals: Vec<ExternalShape>,
    pub(crate) external_start: usize,
    pub(crate) terminal_count: usize,
    pub(crate) start_symbol: Symbol,
    /// Production `_start -> start_symbol`.
    pub(crate) augmented: u32,
    pub(crate) extras: TokenSet,
    pub(crate) conflicts: Vec<SmallVec<[Symbol; 2]>>,
}

impl PreparedGrammar {
    pub(crate) fn is_terminal(&self, symbol: Symbol) -> bool {
        symbol.index() < self.terminal_count
    }

    pub(crate) fn name_of(&self, symbol: Symbol) -> &str {
        self.symbols
            .get(symbol.index())
            .map_or("ERROR", |info| info.name.as_str())
    }

    /// Name of the user-written rule behind `symbol`.
    pub(crate) fn origin_name(&self, symbol: Symbol) -> &str {
        let origin = self.origins.get(symbol.index()).copied().unwrap_or(symbol);
        self.name_of(origin)
    }

    pub(crate) fn origin(&self, symbol: Symbol) -> Symbol {
        self.origins.get(symbol.index()).copied().unwrap_or(symbol)
    }
}

/// Key identifying an anonymous token written inline in a syntactic rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum AnonymousKey {
    Literal(CompactString),
    Pattern(CompactString),
    Token(Combinator),
}

#[derive(Debug, Clone, Copy, Default)]
struct Context {
    precedence: Option<i32>,
    associativity: Option<Associativity>,
    field: Option<u16>,
}

#[derive(Debug, Clone)]
struct Alternative {
    steps: Vec<Step>,
    precedence: Option<i32>,
    associativity: Option<Associativity>,
    dynamic_precedence: i32,
}

impl Alternative {
    const fn empty(context: Context) -> Self {
        Self {
            steps: Vec::new(),
            precedence: context.precedence,
            associativity: context.associativity,
            dynamic_precedence: 0,
        }
    }

    fn single(step: Step) -> Self {
        Self {
            precedence: step.precedence,
            associativity: step.associativity,
            steps: vec![step],
            dynamic_precedence: 0,
        }
    }

    fn concat(&self, next: &Self) -> Self {
        let mut steps = self.steps.clone();
        steps.extend(next.steps.iter().cloned());
        let (precedence, associativity) = if next.steps.is_empty() {
            (self.precedence, self.associativity)
        } else {
            (next.precedence, next.associativity)
        };
        Self {
            steps,
            precedence,
            associativity,
            dynamic_precedence: self.dynamic_precedence + next.dynamic_precedence,
        }
    }
}

struct Preparer<'g> {
    grammar: &'g Grammar,
    symbols: Vec<SymbolInfo>,
    origins: Vec<Symbol>,
    names: HashMap<CompactString, Symbol, ahash::RandomState>,
    anonymous: HashMap<AnonymousKey, Symbol, ahash::RandomState>,
    tokens: Vec<LexicalToken>,
    fields: Vec<CompactString>,
    /// Productions of auxiliary rules, keyed by their symbol.
    auxiliary: Vec<(Symbol, Vec<Alternative>)>,
    repeat_counts: HashMap<Symbol, usize, ahash::RandomState>,
    token_counts: HashMap<CompactString, usize, ahash::RandomState>,
}

/// Maximum number of symbols: `u16::MAX` is reserved for `ERROR`.
const SYMBOL_LIMIT: usize = u16::MAX as usize - 1;

fn symbol_at(index: usize) -> Result<Symbol, GrammarError> {
    u16::try_from(index)
        .ok()
        .filter(|index| usize::from(*index) < SYMBOL_LIMIT)
        .map(Symbol::new)
        .ok_or(GrammarError::TooManySymbols {
            count: index + 1,
            limit: SYMBOL_LIMIT,
        })
}

pub(crate) fn prepare(grammar: &Grammar) -> Result<PreparedGrammar, GrammarError> {
    let start_rule = grammar.start_rule();
    if grammar.rule(start_rule).is_some_and(Combinator::is_lexical) {
        return Err(GrammarError::LexicalStartRule {
            rule: start_rule.into(),
        });
    }
    check_reachability(grammar)?;

    let mut preparer = Preparer {
        grammar,
        symbols: Vec::new(),
        origins: Vec::new(),
        names: HashMap::with_hasher(ahash::RandomState::new()),
        anonymous: HashMap::with_hasher(ahash::RandomState::new()),
        tokens: Vec::new(),
        fields: Vec::new(),
        auxiliary: Vec::new(),
        repeat_counts: HashMap::with_hasher(ahash::RandomState::new()),
        token_counts: HashMap::with_hasher(ahash::RandomState::new()),
    };
    preparer.push_symbol("end", SymbolKind::End, false, false)?;
    preparer.collect_tokens()?;

    let external_start = preparer.symbols.len();
    let mut externals = Vec::new();
    for external in grammar.externals() {
        let visible = !external.name.starts_with('_');
        let symbol = preparer.push_symbol(&external.name, SymbolKind::External, visible, true)?;
        preparer.names.insert(external.name.clone(), symbol);
        externals.push(ExternalShape {
            symbol,
            shape: external.shape.clone(),
        });
    }
    let terminal_count = preparer.symbols.len();

    let syntactic: Vec<(&str, &Combinator)> = grammar
        .rules()
        .filter(|(_, body)| !body.is_lexical())
        .collect();
    for (name, _) in &syntactic {
        let symbol = preparer.push_symbol(name, SymbolKind::Rule, !name.starts_with('_'), true)?;
        preparer.names.insert((*name).into(), symbol);
    }
    let start_symbol = preparer.lookup(start_rule, start_rule)?;

    let mut rule_productions: Vec<(Symbol, Vec<Alternative>)> = Vec::new();
    for (name, body) in &syntactic {
        let lhs = preparer.lookup(name, name)?;
        let alternatives = preparer.flatten(lhs, name, body, Context::default())?;
        rule_productions.push((lhs, alternatives));
    }
    let auxiliary = std::mem::take(&mut preparer.auxiliary);

    let augmented_symbol = preparer.push_symbol("_start", SymbolKind::Auxiliary, false, false)?;
    let mut productions = Vec::new();
    for (lhs, alternatives) in rule_productions.into_iter().chain(auxiliary) {
        for alternative in alternatives {
            productions.push(Production {
                lhs,
                steps: alternative.steps,
                precedence: alternative.precedence,
                associativity: alternative.associativity,
                dynamic_precedence: alternative.dynamic_precedence,
            });
        }
    }
    let augmented = u32::try_from(productions.len()).unwrap_or(u32::MAX);
    productions.push(Production {
        lhs: augmented_symbol,
        steps: vec![Step {
            symbol: start_symbol,
            precedence: None,
            associativity: None,
            field: None,
        }],
        precedence: None,
        associativity: None,
        dynamic_precedence: 0,
    });

    let mut by_lhs: Vec<SmallVec<[u32; 4]>> = vec![SmallVec::new(); preparer.symbols.len()];
    for (index, production) in productions.iter().enumerate() {
        if let Ok(index) = u32::try_from(index) {
            by_lhs[production.lhs.index()].push(index);
        }
    }

    let extras = preparer.extras()?;
    let conflicts = preparer.conflicts()?;

    Ok(PreparedGrammar {
        name: grammar.name().into(),
        symbols: preparer.symbols,
        origins: preparer.origins,
        fields: preparer.fields,
        productions,
        by_lhs,
        tokens: preparer.tokens,
        externals,
        external_start,
        terminal_count,
        start_symbol,
        augmented,
        extras,
        conflicts,
    })
}

/// Every rule must be reachable from the start rule or the extras.
fn check_reachability(grammar: &Grammar) -> Result<(), GrammarError> {
    let mut reached = vec![false; grammar.rule_count()];
    let mut queue: VecDeque<&Combinator> = VecDeque::new();
    if let Some(body) = grammar.rule(grammar.start_rule()) {
        reached[0] = true;
        queue.push_back(body);
    }
    queue.extend(grammar.extras());

    while let Some(body) = queue.pop_front() {
        body.for_each_reference(&mut |name| {
            if let Some(index) = grammar.rule_index(name)
                && !reached[index]
            {
                reached[index] = true;
                if let Some(body) = grammar.rule(name) {
                    queue.push_back(body);
                }
            }
        });
    }

    match grammar
        .rules()
        .zip(&reached)
        .find(|(_, reached)| !**reached)
    {
        Some(((name, _), _)) => Err(GrammarError::UnreachableRule { rule: name.into() }),
        None => Ok(()),
    }
}

/// Lexical precedence: the outermost `prec` around a token body.
fn lexical_precedence(body: &Combinator, levels: &[CompactString]) -> i32 {
    match body {
        Combinator::Prec { value, .. } => value.resolve(levels).unwrap_or(0),
        Combinator::Token { content, .. } => lexical_precedence(content, levels),
        _ => 0,
    }
}

fn is_literal(body: &Combinator) -> bool {
    match body {
        Combinator::String { .. } => true,
        Combinator::Prec { content, .. } | Combinator::Token { content, .. } => {
            is_literal(content)
        }
        _ => false,
    }
}

fn is_immediate(body: &Combinator) -> bool {
    match body {
        Combinator::Token { immediate, .. } => *immediate,
        Combinator::Prec { content, .. } => is_immediate(content),
        _ => false,
    }
}

impl Preparer<'_> {
    fn push_symbol(
        &mut self,
        name: &str,
        kind: SymbolKind,
        visible: bool,
        named: bool,
    ) -> Result<Symbol, GrammarError> {
        let symbol = symbol_at(self.symbols.len())?;
        self.symbols.push(SymbolInfo {
            name: name.into(),
            kind,
            visible,
            named,
        });
        self.origins.push(symbol);
        Ok(symbol)
    }

    fn lookup(&self, rule: &str, name: &str) -> Result<Symbol, GrammarError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| GrammarError::UndefinedSymbol {
                rule: rule.into(),
                symbol: name.into(),
            })
    }

    fn token_info(&self, body: &Combinator) -> TokenInfo {
        TokenInfo {
            precedence: lexical_precedence(body, self.grammar.precedences()),
            literal: is_literal(body),
            immediate: is_immediate(body),
        }
    }

    /// Numbers the internal tokens: lexical rules first, in declaration
    /// order, then anonymous tokens in order of appearance.
    fn collect_tokens(&mut self) -> Result<(), GrammarError> {
        let grammar = self.grammar;
        for (name, body) in grammar.rules().filter(|(_, body)| body.is_lexical()) {
            let symbol = self.push_symbol(name, SymbolKind::Token, !name.starts_with('_'), true)?;
            self.names.insert(name.into(), symbol);
            let info = self.token_info(body);
            self.tokens.push(LexicalToken {
                symbol,
                rule: name.into(),
                body: body.clone(),
                info,
            });
        }
        for (name, body) in grammar.rules().filter(|(_, body)| !body.is_lexical()) {
            self.collect_anonymous(name, body)?;
        }
        for extra in grammar.extras() {
            if extra.is_lexical() {
                self.anonymous_token("extras", extra)?;
            }
        }
        Ok(())
    }

    fn collect_anonymous(&mut self, rule: &str, body: &Combinator) -> Result<(), GrammarError> {
        match body {
            Combinator::String { .. } | Combinator::Pattern { .. } | Combinator::Token { .. } => {
                self.anonymous_token(rule, body).map(|_| ())
            }
            Combinator::Seq { members } | Combinator::Choice { members } => members
                .iter()
                .try_for_each(|member| self.collect_anonymous(rule, member)),
            Combinator::Repeat { content }
            | Combinator::Repeat1 { content }
            | Combinator::Optional { content }
            | Combinator::Prec { content, .. }
            | Combinator::PrecDynamic { content, .. }
            | Combinator::Field { content, .. } => self.collect_anonymous(rule, content),
            Combinator::Blank | Combinator::Symbol { .. } => Ok(()),
        }
    }

    /// Symbol of a token written inline, created on first sight.
    fn anonymous_token(&mut self, rule: &str, body: &Combinator) -> Result<Symbol, GrammarError> {
        let key = match body {
            Combinator::String { value } => AnonymousKey::Literal(value.clone()),
            Combinator::Pattern { value } => AnonymousKey::Pattern(value.clone()),
            other => AnonymousKey::Token(other.clone()),
        };
        if let Some(symbol) = self.anonymous.get(&key) {
            return Ok(*symbol);
        }
        let (name, visible) = match &key {
            AnonymousKey::Literal(value) => (value.clone(), true),
            _ => {
                let count = self.token_counts.entry(rule.into()).or_insert(0);
                *count += 1;
                (format_compact!("{rule}_token{count}"), false)
            }
        };
        let symbol = self.push_symbol(&name, SymbolKind::Token, visible, false)?;
        self.anonymous.insert(key, symbol);
        let info = self.token_info(body);
        self.tokens.push(LexicalToken {
            symbol,
            rule: rule.into(),
            body: body.clone(),
            info,
        });
        Ok(symbol)
    }

    fn field_id(&mut self, name: &str) -> u16 {
        let index = self
            .fields
            .iter()
            .position(|field| field == name)
            .unwrap_or_else(|| {
                self.fields.push(name.into());
                self.fields.len() - 1
            });
        u16::try_from(index).unwrap_or(u16::MAX)
    }

    fn step(&self, symbol: Symbol, context: Context) -> Step {
        Step {
            symbol,
            precedence: context.precedence,
            associativity: context.associativity,
            field: context.field,
        }
    }

    /// Expands a rule body into the alternatives of its productions.
    fn flatten(
        &mut self,
        lhs: Symbol,
        rule: &str,
        body: &Combinator,
        context: Context,
    ) -> Result<Vec<Alternative>, GrammarError> {
        match body {
            Combinator::Blank => Ok(vec![Alternative::empty(context)]),
            Combinator::String { .. } | Combinator::Pattern { .. } | Combinator::Token { .. } => {
                let symbol = self.anonymous_token(rule, body)?;
                Ok(vec![Alternative::single(self.step(symbol, context))])
            }
            Combinator::Symbol { name } => {
                let symbol = self.lookup(rule, name)?;
                Ok(vec![Alternative::single(self.step(symbol, context))])
            }
            Combinator::Seq { members } => {
                let mut result = vec![Alternative::empty(context)];
                for member in members {
                    let tails = self.flatten(lhs, rule, member, context)?;
                    result = result
                        .iter()
                        .flat_map(|head| tails.iter().map(move |tail| head.concat(tail)))
                        .collect();
                }
                Ok(result)
            }
            Combinator::Choice { members } => {
                let mut result = Vec::new();
                for member in members {
                    result.extend(self.flatten(lhs, rule, member, context)?);
                }
                Ok(result)
            }
            Combinator::Optional { content } => {
                let mut result = self.flatten(lhs, rule, content, context)?;
                result.push(Alternative::empty(context));
                Ok(result)
            }
            Combinator::Repeat { content } => {
                let repeat = self.repetition(lhs, rule, content, context)?;
                Ok(vec![
                    Alternative::empty(context),
                    Alternative::single(self.step(repeat, context)),
                ])
            }
            Combinator::Repeat1 { content } => {
                let repeat = self.repetition(lhs, rule, content, context)?;
                Ok(vec![Alternative::single(self.step(repeat, context))])
            }
            Combinator::Prec {
                value,
                associativity,
                content,
            } => {
                let precedence = value.resolve(self.grammar.precedences()).ok_or_else(|| {
                    GrammarError::MalformedPrecedence {
                        rule: rule.into(),
                        reason: format!("unknown precedence level {value}"),
                    }
                })?;
                let inner = Context {
                    precedence: Some(precedence),
                    associativity: *associativity,
                    ..context
                };
                self.flatten(lhs, rule, content, inner)
            }
            Combinator::PrecDynamic { value, content } => {
                let mut result = self.flatten(lhs, rule, content, context)?;
                for alternative in &mut result {
                    alternative.dynamic_precedence += value;
                }
                Ok(result)
            }
            Combinator::Field { name, content } => {
                let field = self.field_id(name);
                let inner = Context {
                    field: Some(field),
                    ..context
                };
                self.flatten(lhs, rule, content, inner)
            }
        }
    }

    /// Introduces `R -> R x | x` for a repetition of `x` inside `rule`.
    fn repetition(
        &mut self,
        lhs: Symbol,
        rule: &str,
        content: &Combinator,
        context: Context,
    ) -> Result<Symbol, GrammarError> {
        let origin = self.origins.get(lhs.index()).copied().unwrap_or(lhs);
        let count = self.repeat_counts.entry(origin).or_insert(0);
        *count += 1;
        let name = format_compact!("{}_repeat{count}", self.symbols[origin.index()].name);
        let symbol = self.push_symbol(&name, SymbolKind::Auxiliary, false, false)?;
        self.origins[symbol.index()] = origin;

        let items = self.flatten(symbol, rule, content, context)?;
        let recursive = Alternative::single(Step {
            symbol,
            precedence: None,
            associativity: None,
            field: None,
        });
        let mut alternatives: Vec<Alternative> =
            items.iter().map(|item| recursive.concat(item)).collect();
        alternatives.extend(items);
        self.auxiliary.push((symbol, alternatives));
        Ok(symbol)
    }

    /// Extras must be terminals.
    fn extras(&mut self) -> Result<TokenSet, GrammarError> {
        let mut extras = TokenSet::with_capacity(self.symbols.len());
        for extra in self.grammar.extras() {
            let symbol = match extra {
                Combinator::Symbol { name } => {
                    let symbol = self.lookup("extras", name)?;
                    if matches!(
                        self.symbols[symbol.index()].kind,
                        SymbolKind::Rule | SymbolKind::Auxiliary
                    ) {
                        return Err(GrammarError::InvalidExtra {
                            reason: format!("`{name}` is a syntactic rule"),
                        });
                    }
                    symbol
                }
                body if body.is_lexical() => self.anonymous_token("extras", body)?,
                _ => {
                    return Err(GrammarError::InvalidExtra {
                        reason: "extras must be single tokens".into(),
                    });
                }
            };
            extras.insert(symbol);
        }
        Ok(extras)
    }

    fn conflicts(&self) -> Result<Vec<SmallVec<[Symbol; 2]>>, GrammarError> {
        self.grammar
            .conflicts()
            .iter()
            .map(|entry| {
                entry
                    .symbols()
                    .iter()
                    .map(|name| self.lookup("conflicts", name))
                    .collect::<Result<SmallVec<[Symbol; 2]>, GrammarError>>()
            })
            .collect()
    }
}

/// Rejects `A =>+ A` derivations that consume no input.
pub(crate) fn check_cycles(
    prepared: &PreparedGrammar,
    nullable: &[bool],
) -> Result<(), GrammarError> {
    let count = prepared.symbols.len();
    let mut edges: Vec<SmallVec<[Symbol; 4]>> = vec![SmallVec::new(); count];
    for production in &prepared.productions {
        let steps = &production.steps;
        for (index, step) in steps.iter().enumerate() {
            if prepared.is_terminal(step.symbol) {
                continue;
            }
            let others_nullable = steps
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != index)
                .all(|(_, other)| nullable.get(other.symbol.index()).copied().unwrap_or(false));
            if others_nullable && !edges[production.lhs.index()].contains(&step.symbol) {
                edges[production.lhs.index()].push(step.symbol);
            }
        }
    }

    // 0 = unvisited, 1 = on the stack, 2 = done
    let mut marks = vec![0u8; count];
    for root in 0..count {
        if marks[root] != 0 {
            continue;
        }
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        marks[root] = 1;
        while let Some((node, next)) = stack.last_mut() {
            let node = *node;
            if let Some(target) = edges[node].get(*next) {
                *next += 1;
                let target = target.index();
                match marks[target] {
                    0 => {
                        marks[target] = 1;
                        stack.push((target, 0));
                    }
                    1 => {
                        let symbol = symbol_at(target)?;
                        return Err(GrammarError::CyclicDerivation {
                            rule: prepared.origin_name(symbol).into(),
                        });
                    }
                    _ => {}
                }
            } else {
                marks[node] = 2;
                stack.pop();
            }
        }
    }
    Ok(())
}
