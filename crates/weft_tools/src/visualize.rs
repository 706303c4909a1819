//! Graphviz renderings of grammars and parse trees.

use std::collections::BTreeSet;
use std::fmt::Write;
use weft::grammar::Combinator;
use weft::{ConflictDiagnostic, Grammar, SyntaxNode, SyntaxTree};
use weft::error::ConflictKind;

/// Rules that take part in a reported conflict.
fn conflicting_rules(diagnostics: &[ConflictDiagnostic]) -> BTreeSet<&str> {
    let mut rules = BTreeSet::new();
    for diagnostic in diagnostics {
        match &diagnostic.kind {
            ConflictKind::ShiftReduce {
                reduce_rule,
                shift_rules,
            }
            | ConflictKind::RuntimeChoiceRequired {
                reduce_rule,
                shift_rules,
            } => {
                rules.insert(reduce_rule.as_str());
                rules.extend(shift_rules.iter().map(|rule| rule.as_str()));
            }
            ConflictKind::ReduceReduce { chosen, discarded } => {
                rules.insert(chosen.as_str());
                rules.insert(discarded.as_str());
            }
            ConflictKind::LexicalOverlap { external, internal } => {
                rules.insert(external.as_str());
                rules.insert(internal.as_str());
            }
        }
    }
    rules
}

fn literals<'a>(body: &'a Combinator, found: &mut BTreeSet<&'a str>) {
    match body {
        Combinator::String { value } => {
            found.insert(value.as_str());
        }
        Combinator::Seq { members } | Combinator::Choice { members } => {
            for member in members {
                literals(member, found);
            }
        }
        Combinator::Repeat { content }
        | Combinator::Repeat1 { content }
        | Combinator::Optional { content }
        | Combinator::Prec { content, .. }
        | Combinator::PrecDynamic { content, .. }
        | Combinator::Field { content, .. } => literals(content, found),
        // A token's literals are part of one lexeme.
        Combinator::Token { .. }
        | Combinator::Blank
        | Combinator::Pattern { .. }
        | Combinator::Symbol { .. } => {}
    }
}

fn escape(text: &str) -> String {
    text.escape_default().to_string().replace('"', "\\\"")
}

/// Rule dependency graph. Rules are ellipses, external tokens diamonds and
/// literal tokens filled boxes; rules named by `diagnostics` are orange.
#[must_use]
pub fn grammar_to_dot(grammar: &Grammar, diagnostics: &[ConflictDiagnostic]) -> String {
    let conflicting = conflicting_rules(diagnostics);
    let mut output = String::new();
    let _ = writeln!(output, "digraph \"{}\" {{", escape(grammar.name()));
    let _ = writeln!(output, "  rankdir=LR;");
    let _ = writeln!(output, "  node [shape=box];");
    let _ = writeln!(output);

    for (name, _) in grammar.rules() {
        let style = if conflicting.contains(name) {
            ", style=filled, fillcolor=orange"
        } else {
            ""
        };
        let _ = writeln!(output, "  \"{}\" [shape=ellipse{style}];", escape(name));
    }
    for external in grammar.externals() {
        let _ = writeln!(output, "  \"{}\" [shape=diamond];", escape(&external.name));
    }

    let mut tokens = BTreeSet::new();
    let _ = writeln!(output);
    for (name, body) in grammar.rules() {
        let mut references = BTreeSet::new();
        body.for_each_reference(&mut |reference| {
            references.insert(reference);
        });
        for reference in references {
            let _ = writeln!(output, "  \"{}\" -> \"{}\";", escape(name), escape(reference));
        }

        let mut found = BTreeSet::new();
        literals(body, &mut found);
        for literal in &found {
            let _ = writeln!(
                output,
                "  \"{}\" -> \"'{}'\" [style=dashed];",
                escape(name),
                escape(literal)
            );
        }
        tokens.extend(found);
    }

    if !tokens.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "  // Tokens");
    }
    for token in tokens {
        let _ = writeln!(
            output,
            "  \"'{}'\" [style=filled, fillcolor=lightblue];",
            escape(token)
        );
    }
    let _ = writeln!(output, "}}");
    output
}

/// The visible tree. Error nodes are red, missing tokens dashed.
#[must_use]
pub fn tree_to_dot(tree: &SyntaxTree) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "digraph Tree {{");
    let _ = writeln!(output, "  node [shape=box, fontname=monospace];");
    let mut next = 0usize;
    write_node(&tree.root_node(), &mut output, &mut next);
    let _ = writeln!(output, "}}");
    output
}

fn write_node(node: &SyntaxNode, output: &mut String, next: &mut usize) -> usize {
    let id = *next;
    *next += 1;

    let mut label = format!("{} [{}]", escape(node.kind_name()), node.text_range());
    if node.is_token() && !node.is_missing() {
        let _ = write!(label, "\\n{}", escape(&node.text()));
    }
    let style = if node.is_missing() {
        ", style=dashed, color=red"
    } else if node.is_error() {
        ", style=filled, fillcolor=\"#f4a6a6\""
    } else if node.is_token() {
        ", style=filled, fillcolor=lightblue"
    } else {
        ""
    };
    let _ = writeln!(output, "  n{id} [label=\"{label}\"{style}];");

    for child in node.children() {
        let child_id = write_node(&child, output, next);
        match child.field_name() {
            Some(field) => {
                let _ = writeln!(output, "  n{id} -> n{child_id} [label=\"{field}\"];");
            }
            None => {
                let _ = writeln!(output, "  n{id} -> n{child_id};");
            }
        }
    }
    id
}
