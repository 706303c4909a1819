use crate::error::GrammarError;
use crate::grammar::combinator::{pattern, Combinator};
use crate::grammar::validate;
use compact_str::CompactString;
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::sync::Arc;

pub(crate) type RuleMap = IndexMap<CompactString, Arc<Combinator>, ahash::RandomState>;

/// A validated grammar.
///
/// Rules keep their declaration order: the first rule is the start rule,
/// and earlier rules win reduce/reduce ties. Rule bodies are shared, so
/// extending a grammar copies only the rule table.
///
/// # Example
///
/// ```rust
/// use weft::grammar::{GrammarBuilder, choice, pattern, prec_left, repeat, seq, string, sym};
///
/// let grammar = GrammarBuilder::new("arithmetic")
///     .rule("program", repeat(sym("expression")))
///     .rule(
///         "expression",
///         choice([
///             prec_left(1, seq([sym("expression"), string("+"), sym("expression")])),
///             sym("number"),
///         ]),
///     )
///     .rule("number", pattern(r"\d+"))
///     .build()
///     .expect("valid grammar");
/// assert_eq!(grammar.start_rule(), "program");
/// ```
#[derive(Debug, Clone)]
pub struct Grammar {
    name: CompactString,
    rules: RuleMap,
    extras: Vec<Combinator>,
    externals: Vec<ExternalToken>,
    conflicts: Vec<ConflictEntry>,
    precedences: Vec<CompactString>,
}

/// Token recognised by embedder-supplied logic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalToken {
    pub name: CompactString,
    /// What the recognizer can produce, when known. Used only to report
    /// overlaps with internal tokens.
    pub shape: Option<Combinator>,
}

impl ExternalToken {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            shape: None,
        }
    }

    #[must_use]
    pub fn with_shape(name: &str, shape: Combinator) -> Self {
        Self {
            name: name.into(),
            shape: Some(shape),
        }
    }
}

/// Symbols declared to be mutually ambiguous.
///
/// Order matters only as the last static tie-break: the symbol listed
/// first is preferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictEntry {
    symbols: SmallVec<[CompactString; 2]>,
}

impl ConflictEntry {
    #[must_use]
    pub fn new<'a>(symbols: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            symbols: symbols.into_iter().map(CompactString::from).collect(),
        }
    }

    #[must_use]
    pub fn symbols(&self) -> &[CompactString] {
        &self.symbols
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.symbols.iter().any(|symbol| symbol == name)
    }

    /// Position of `name` in the declaration, used for preference.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.symbols.iter().position(|symbol| symbol == name)
    }
}

impl Grammar {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> impl Iterator<Item = (&str, &Combinator)> {
        self.rules.iter().map(|(name, body)| (name.as_str(), &**body))
    }

    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&Combinator> {
        self.rules.get(name).map(|body| &**body)
    }

    #[must_use]
    pub fn rule_index(&self, name: &str) -> Option<usize> {
        self.rules.get_index_of(name)
    }

    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Name of the first rule.
    #[must_use]
    pub fn start_rule(&self) -> &str {
        self.rules
            .get_index(0)
            .map_or("", |(name, _)| name.as_str())
    }

    #[must_use]
    pub fn extras(&self) -> &[Combinator] {
        &self.extras
    }

    #[must_use]
    pub fn externals(&self) -> &[ExternalToken] {
        &self.externals
    }

    #[must_use]
    pub fn is_external(&self, name: &str) -> bool {
        self.externals.iter().any(|external| external.name == name)
    }

    #[must_use]
    pub fn conflicts(&self) -> &[ConflictEntry] {
        &self.conflicts
    }

    /// Named precedence levels, tightest first.
    #[must_use]
    pub fn precedences(&self) -> &[CompactString] {
        &self.precedences
    }

    /// Derives a new grammar: overriding or adding rules, appending external
    /// tokens and conflict entries. `self` is left untouched.
    ///
    /// # Errors
    ///
    /// Returns a [`GrammarError`] if the derived grammar does not validate.
    pub fn extend(&self, extension: GrammarExtension) -> Result<Self, GrammarError> {
        let mut rules = self.rules.clone();
        for (name, body) in extension.rules {
            // Overrides keep the base rule's position.
            rules.insert(name, Arc::new(body));
        }

        let mut externals = self.externals.clone();
        externals.extend(extension.externals);
        let mut conflicts = self.conflicts.clone();
        conflicts.extend(extension.conflicts);
        let mut precedences = self.precedences.clone();
        precedences.extend(extension.precedences);

        let grammar = Self {
            name: extension.name.unwrap_or_else(|| self.name.clone()),
            rules,
            extras: extension.extras.unwrap_or_else(|| self.extras.clone()),
            externals,
            conflicts,
            precedences,
        };
        validate::validate(&grammar)?;
        tracing::debug!(
            base = %self.name,
            derived = %grammar.name,
            rules = grammar.rules.len(),
            externals = grammar.externals.len(),
            "extended grammar"
        );
        Ok(grammar)
    }
}

/// Builder for [`Grammar`]
#[derive(Debug, Clone)]
pub struct GrammarBuilder {
    name: CompactString,
    rules: RuleMap,
    extras: Option<Vec<Combinator>>,
    externals: Vec<ExternalToken>,
    conflicts: Vec<ConflictEntry>,
    precedences: Vec<CompactString>,
    duplicate: Option<CompactString>,
}

impl GrammarBuilder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            rules: IndexMap::with_hasher(ahash::RandomState::new()),
            extras: None,
            externals: Vec::new(),
            conflicts: Vec::new(),
            precedences: Vec::new(),
            duplicate: None,
        }
    }

    #[must_use]
    pub fn rule(mut self, name: &str, body: Combinator) -> Self {
        if self.rules.insert(name.into(), Arc::new(body)).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(name.into());
        }
        self
    }

    /// Replaces the default extras (`/\s/`).
    #[must_use]
    pub fn extras(mut self, extras: impl IntoIterator<Item = Combinator>) -> Self {
        self.extras = Some(extras.into_iter().collect());
        self
    }

    #[must_use]
    pub fn external(mut self, name: &str) -> Self {
        self.externals.push(ExternalToken::new(name));
        self
    }

    #[must_use]
    pub fn external_token(mut self, external: ExternalToken) -> Self {
        self.externals.push(external);
        self
    }

    #[must_use]
    pub fn conflict<'a>(mut self, symbols: impl IntoIterator<Item = &'a str>) -> Self {
        self.conflicts.push(ConflictEntry::new(symbols));
        self
    }

    #[must_use]
    pub fn precedences<'a>(mut self, levels: impl IntoIterator<Item = &'a str>) -> Self {
        self.precedences
            .extend(levels.into_iter().map(CompactString::from));
        self
    }

    /// Validates and builds the grammar.
    ///
    /// # Errors
    ///
    /// Returns a [`GrammarError`] for undefined symbols, duplicate names,
    /// unknown precedence levels, malformed conflict entries or tokens.
    pub fn build(self) -> Result<Grammar, GrammarError> {
        if let Some(name) = self.duplicate {
            return Err(GrammarError::DuplicateSymbol { name });
        }
        let grammar = Grammar {
            name: self.name,
            rules: self.rules,
            extras: self.extras.unwrap_or_else(default_extras),
            externals: self.externals,
            conflicts: self.conflicts,
            precedences: self.precedences,
        };
        validate::validate(&grammar)?;
        Ok(grammar)
    }
}

fn default_extras() -> Vec<Combinator> {
    vec![pattern(r"\s")]
}

/// Overrides applied by [`Grammar::extend`]
#[derive(Debug, Clone, Default)]
pub struct GrammarExtension {
    name: Option<CompactString>,
    rules: Vec<(CompactString, Combinator)>,
    extras: Option<Vec<Combinator>>,
    externals: Vec<ExternalToken>,
    conflicts: Vec<ConflictEntry>,
    precedences: Vec<CompactString>,
}

impl GrammarExtension {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a rule, or replaces the base rule of the same name.
    #[must_use]
    pub fn rule(mut self, name: &str, body: Combinator) -> Self {
        self.rules.push((name.into(), body));
        self
    }

    #[must_use]
    pub fn extras(mut self, extras: impl IntoIterator<Item = Combinator>) -> Self {
        self.extras = Some(extras.into_iter().collect());
        self
    }

    /// Appends an external token after the base grammar's externals.
    #[must_use]
    pub fn external(mut self, name: &str) -> Self {
        self.externals.push(ExternalToken::new(name));
        self
    }

    #[must_use]
    pub fn external_token(mut self, external: ExternalToken) -> Self {
        self.externals.push(external);
        self
    }

    #[must_use]
    pub fn conflict<'a>(mut self, symbols: impl IntoIterator<Item = &'a str>) -> Self {
        self.conflicts.push(ConflictEntry::new(symbols));
        self
    }

    #[must_use]
    pub fn precedences<'a>(mut self, levels: impl IntoIterator<Item = &'a str>) -> Self {
        self.precedences
            .extend(levels.into_iter().map(CompactString::from));
        self
    }
}
