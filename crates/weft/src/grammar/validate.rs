use crate::error::GrammarError;
use crate::grammar::{Combinator, Grammar};
use compact_str::CompactString;
use hashbrown::HashSet;

/// Construction-time checks: names resolve, precedence levels exist,
/// conflict entries are well formed and `token(...)` bodies are lexical.
///
/// Reachability and derivation cycles need the flattened grammar and are
/// checked by the compiler.
pub(crate) fn validate(grammar: &Grammar) -> Result<(), GrammarError> {
    if grammar.rule_count() == 0 {
        return Err(GrammarError::EmptyGrammar);
    }

    let mut externals: HashSet<&str, ahash::RandomState> =
        HashSet::with_hasher(ahash::RandomState::new());
    for external in grammar.externals() {
        if grammar.rule(&external.name).is_some() || !externals.insert(external.name.as_str()) {
            return Err(GrammarError::DuplicateSymbol {
                name: external.name.clone(),
            });
        }
    }

    let mut levels: HashSet<&str, ahash::RandomState> =
        HashSet::with_hasher(ahash::RandomState::new());
    for level in grammar.precedences() {
        if !levels.insert(level.as_str()) {
            return Err(GrammarError::MalformedPrecedence {
                rule: "precedences".into(),
                reason: format!("level `{level}` is declared twice"),
            });
        }
    }

    let defined = |name: &str| grammar.rule(name).is_some() || externals.contains(name);

    for (name, body) in grammar.rules() {
        check_references(name, body, &defined)?;
        check_precedences(name, body, grammar.precedences())?;
        check_tokens(name, body, false)?;
    }
    for extra in grammar.extras() {
        check_references("extras", extra, &defined)?;
        check_tokens("extras", extra, false)?;
    }
    for external in grammar.externals() {
        if let Some(shape) = &external.shape {
            check_tokens(&external.name, shape, true)?;
        }
    }

    for entry in grammar.conflicts() {
        if entry.symbols().len() < 2 {
            return Err(GrammarError::InvalidConflict {
                reason: format!(
                    "an entry needs at least two symbols, found [{}]",
                    entry.symbols().join(", ")
                ),
            });
        }
        if let Some(symbol) = entry.symbols().iter().find(|symbol| !defined(symbol.as_str())) {
            return Err(GrammarError::UndefinedSymbol {
                rule: "conflicts".into(),
                symbol: symbol.clone(),
            });
        }
    }

    Ok(())
}

fn check_references(
    rule: &str,
    body: &Combinator,
    defined: &impl Fn(&str) -> bool,
) -> Result<(), GrammarError> {
    let mut missing: Option<&str> = None;
    body.for_each_reference(&mut |name| {
        if missing.is_none() && !defined(name) {
            missing = Some(name);
        }
    });
    match missing {
        Some(symbol) => Err(GrammarError::UndefinedSymbol {
            rule: rule.into(),
            symbol: symbol.into(),
        }),
        None => Ok(()),
    }
}

fn check_precedences(
    rule: &str,
    body: &Combinator,
    levels: &[CompactString],
) -> Result<(), GrammarError> {
    let mut unknown = None;
    body.for_each_precedence(&mut |value| {
        if unknown.is_none() && value.resolve(levels).is_none() {
            unknown = Some(value.to_string());
        }
    });
    match unknown {
        Some(value) => Err(GrammarError::MalformedPrecedence {
            rule: rule.into(),
            reason: format!("unknown precedence level {value}"),
        }),
        None => Ok(()),
    }
}

/// Inside `token(...)` only lexical combinators are allowed.
fn check_tokens(rule: &str, body: &Combinator, in_token: bool) -> Result<(), GrammarError> {
    match body {
        Combinator::Symbol { name } if in_token => Err(GrammarError::InvalidToken {
            rule: rule.into(),
            reason: format!("`{name}` is referenced inside a token"),
        }),
        Combinator::Field { name, .. } if in_token => Err(GrammarError::InvalidToken {
            rule: rule.into(),
            reason: format!("field `{name}` inside a token"),
        }),
        Combinator::Token { content, .. } => check_tokens(rule, content, true),
        Combinator::Seq { members } | Combinator::Choice { members } => members
            .iter()
            .try_for_each(|member| check_tokens(rule, member, in_token)),
        Combinator::Repeat { content }
        | Combinator::Repeat1 { content }
        | Combinator::Optional { content }
        | Combinator::Prec { content, .. }
        | Combinator::PrecDynamic { content, .. }
        | Combinator::Field { content, .. } => check_tokens(rule, content, in_token),
        Combinator::Blank
        | Combinator::String { .. }
        | Combinator::Pattern { .. }
        | Combinator::Symbol { .. } => Ok(()),
    }
}
