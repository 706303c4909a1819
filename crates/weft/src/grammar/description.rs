//! JSON grammar description
//!
//! The data shape consumed by the `weft` tool: a grammar is a JSON object
//! with `name`, `rules` (in order, first is the start rule), and optional
//! `extras`, `externals`, `conflicts` and `precedences`. An extension file
//! has the same keys, all optional, and is applied with
//! [`Grammar::extend`].
//!
//! Key order in `rules` is significant. Going through `serde_json::Value`
//! keeps it only with serde_json's `preserve_order` feature.
//!
//! ```json
//! {
//!   "name": "arithmetic",
//!   "rules": {
//!     "program": { "type": "REPEAT", "content": { "type": "SYMBOL", "name": "number" } },
//!     "number": { "type": "PATTERN", "value": "\\d+" }
//!   },
//!   "externals": ["BANG", { "name": "HASH", "shape": { "type": "STRING", "value": "#" } }],
//!   "conflicts": [["BANG", "number"]]
//! }
//! ```

use crate::error::GrammarError;
use crate::grammar::{Combinator, ExternalToken, Grammar, GrammarBuilder, GrammarExtension};
use compact_str::CompactString;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A full grammar as data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarDescription {
    pub name: CompactString,
    pub rules: IndexMap<CompactString, Combinator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Vec<Combinator>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub externals: Vec<ExternalDescription>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<Vec<CompactString>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub precedences: Vec<CompactString>,
}

/// External token entry: a bare name, or a name with a shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalDescription {
    Name(CompactString),
    Shaped {
        name: CompactString,
        #[serde(default)]
        shape: Option<Combinator>,
    },
}

impl From<ExternalDescription> for ExternalToken {
    fn from(description: ExternalDescription) -> Self {
        match description {
            ExternalDescription::Name(name) => Self { name, shape: None },
            ExternalDescription::Shaped { name, shape } => Self { name, shape },
        }
    }
}

/// Overrides for an existing grammar
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtensionDescription {
    #[serde(default)]
    pub name: Option<CompactString>,
    #[serde(default)]
    pub rules: IndexMap<CompactString, Combinator>,
    #[serde(default)]
    pub extras: Option<Vec<Combinator>>,
    #[serde(default)]
    pub externals: Vec<ExternalDescription>,
    #[serde(default)]
    pub conflicts: Vec<Vec<CompactString>>,
    #[serde(default)]
    pub precedences: Vec<CompactString>,
}

impl Grammar {
    /// Builds and validates a grammar from its description.
    ///
    /// # Errors
    ///
    /// Returns a [`GrammarError`] if the described grammar does not validate.
    pub fn from_description(description: GrammarDescription) -> Result<Self, GrammarError> {
        let mut builder = GrammarBuilder::new(&description.name);
        for (name, body) in description.rules {
            builder = builder.rule(&name, body);
        }
        if let Some(extras) = description.extras {
            builder = builder.extras(extras);
        }
        for external in description.externals {
            builder = builder.external_token(external.into());
        }
        for entry in &description.conflicts {
            builder = builder.conflict(entry.iter().map(CompactString::as_str));
        }
        builder
            .precedences(description.precedences.iter().map(CompactString::as_str))
            .build()
    }

    /// Describes the grammar as data.
    #[must_use]
    pub fn to_description(&self) -> GrammarDescription {
        GrammarDescription {
            name: self.name().into(),
            rules: self
                .rules()
                .map(|(name, body)| (CompactString::from(name), body.clone()))
                .collect(),
            extras: Some(self.extras().to_vec()),
            externals: self
                .externals()
                .iter()
                .map(|external| match &external.shape {
                    None => ExternalDescription::Name(external.name.clone()),
                    Some(shape) => ExternalDescription::Shaped {
                        name: external.name.clone(),
                        shape: Some(shape.clone()),
                    },
                })
                .collect(),
            conflicts: self
                .conflicts()
                .iter()
                .map(|entry| entry.symbols().to_vec())
                .collect(),
            precedences: self.precedences().to_vec(),
        }
    }
}

impl From<ExtensionDescription> for GrammarExtension {
    fn from(description: ExtensionDescription) -> Self {
        let mut extension = Self::new();
        if let Some(name) = &description.name {
            extension = extension.name(name);
        }
        for (name, body) in description.rules {
            extension = extension.rule(&name, body);
        }
        if let Some(extras) = description.extras {
            extension = extension.extras(extras);
        }
        for external in description.externals {
            extension = extension.external_token(external.into());
        }
        for entry in &description.conflicts {
            extension = extension.conflict(entry.iter().map(CompactString::as_str));
        }
        extension.precedences(description.precedences.iter().map(CompactString::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{prec_left, seq, string, sym};

    const BASE: &str = r#"{
        "name": "sums",
        "rules": {
            "program": { "type": "REPEAT", "content": { "type": "SYMBOL", "name": "sum" } },
            "sum": {
                "type": "CHOICE",
                "members": [
                    {
                        "type": "PREC",
                        "value": 1,
                        "associativity": "left",
                        "content": {
                            "type": "SEQ",
                            "members": [
                                { "type": "SYMBOL", "name": "sum" },
                                { "type": "STRING", "value": "+" },
                                { "type": "SYMBOL", "name": "sum" }
                            ]
                        }
                    },
                    { "type": "SYMBOL", "name": "number" }
                ]
            },
            "number": { "type": "PATTERN", "value": "\\d+" }
        }
    }"#;

    #[test]
    fn test_description_builds_grammar() {
        let description: GrammarDescription = serde_json::from_str(BASE).unwrap();
        let grammar = Grammar::from_description(description).unwrap();
        assert_eq!(grammar.start_rule(), "program");
        assert_eq!(
            grammar.rule("sum").and_then(|body| match body {
                Combinator::Choice { members } => members.first().cloned(),
                _ => None,
            }),
            Some(prec_left(1, seq([sym("sum"), string("+"), sym("sum")])))
        );
    }

    #[test]
    fn test_extension_description_appends() {
        let description: GrammarDescription = serde_json::from_str(BASE).unwrap();
        let grammar = Grammar::from_description(description).unwrap();
        let extension: ExtensionDescription = serde_json::from_str(
            r##"{
                "externals": [{ "name": "HASH", "shape": { "type": "STRING", "value": "#" } }],
                "conflicts": [["HASH", "number"]],
                "rules": {
                    "program": {
                        "type": "REPEAT",
                        "content": {
                            "type": "CHOICE",
                            "members": [
                                { "type": "SYMBOL", "name": "sum" },
                                { "type": "SYMBOL", "name": "HASH" }
                            ]
                        }
                    }
                }
            }"##,
        )
        .unwrap();
        let derived = grammar.extend(extension.into()).unwrap();
        assert_eq!(derived.externals()[0].shape, Some(string("#")));
        assert_eq!(derived.conflicts()[0].symbols(), ["HASH", "number"]);
    }

    #[test]
    fn test_round_trip_through_description() {
        let description: GrammarDescription = serde_json::from_str(BASE).unwrap();
        let grammar = Grammar::from_description(description).unwrap();
        let again = Grammar::from_description(grammar.to_description()).unwrap();
        assert_eq!(
            grammar.rules().collect::<Vec<_>>(),
            again.rules().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_rule_order_survives_json_value() {
        let description: GrammarDescription = serde_json::from_str(BASE).unwrap();
        let value = serde_json::to_value(&description).unwrap();
        let restored: GrammarDescription = serde_json::from_value(value).unwrap();
        let names: Vec<_> = restored.rules.keys().map(CompactString::as_str).collect();
        assert_eq!(names, ["program", "sum", "number"]);
        assert_eq!(
            Grammar::from_description(restored).unwrap().start_rule(),
            "program"
        );
    }
}
