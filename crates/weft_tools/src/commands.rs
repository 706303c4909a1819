//! What each subcommand does, separated from argument parsing and
//! printing.

use crate::cli::{GrammarArgs, OutputFormat};
use crate::error::ToolError;
use crate::fixed_form::FixedFormScanner;
use crate::visualize::{grammar_to_dot, tree_to_dot};
use serde::de::DeserializeOwned;
use std::fmt::Write;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use weft::grammar::{ExtensionDescription, GrammarDescription};
use weft::{CompileOptions, Compiled, ExternalScanners, Grammar, Language, Parser, SyntaxTree, compile_with};

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ToolError> {
    let text = fs::read_to_string(path).map_err(|source| ToolError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ToolError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads a grammar description and applies the extensions in order.
///
/// # Errors
///
/// Unreadable files, malformed JSON, or a grammar that does not validate.
pub fn load_grammar(path: &Path, extensions: &[impl AsRef<Path>]) -> Result<Grammar, ToolError> {
    let description: GrammarDescription = read_json(path)?;
    let mut grammar =
        Grammar::from_description(description).map_err(|source| ToolError::Grammar {
            path: path.to_path_buf(),
            source,
        })?;
    for extension in extensions {
        let extension = extension.as_ref();
        let description: ExtensionDescription = read_json(extension)?;
        grammar = grammar
            .extend(description.into())
            .map_err(|source| ToolError::Grammar {
                path: extension.to_path_buf(),
                source,
            })?;
        tracing::info!(extension = %extension.display(), "applied extension");
    }
    Ok(grammar)
}

/// Loads and compiles the grammar named by `args`.
///
/// # Errors
///
/// See [`load_grammar`]; structural grammar errors are reported against
/// the base grammar file.
pub fn compile_grammar(args: &GrammarArgs) -> Result<(Grammar, Compiled), ToolError> {
    let grammar = load_grammar(&args.grammar, &args.extend)?;
    let options = CompileOptions::default().with_lalr(!args.canonical);
    let compiled = compile_with(&grammar, options).map_err(|source| ToolError::Grammar {
        path: args.grammar.clone(),
        source,
    })?;
    tracing::info!(
        grammar = grammar.name(),
        states = compiled.language.state_count(),
        diagnostics = compiled.diagnostics.len(),
        "compiled"
    );
    Ok((grammar, compiled))
}

/// One diagnostic per line, or a note that there are none.
#[must_use]
pub fn format_diagnostics(compiled: &Compiled) -> String {
    if compiled.diagnostics.is_empty() {
        return String::from("no conflicts\n");
    }
    let mut output = String::new();
    for diagnostic in &compiled.diagnostics {
        let _ = writeln!(output, "warning: {diagnostic}");
    }
    output
}

/// Compiles and, when `output` is given, writes the tables as JSON.
///
/// # Errors
///
/// Grammar errors, or failure to write the tables.
pub fn compile(args: &GrammarArgs, output: Option<&Path>) -> Result<String, ToolError> {
    let (_, compiled) = compile_grammar(args)?;
    let mut report = format_diagnostics(&compiled);
    if let Some(path) = output {
        let json = serde_json::to_string(&*compiled.language).map_err(ToolError::Encode)?;
        fs::write(path, json).map_err(|source| ToolError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        let _ = writeln!(report, "wrote tables to {}", path.display());
    }
    Ok(report)
}

/// Reads tables written by [`compile`].
///
/// # Errors
///
/// Unreadable file or malformed JSON.
pub fn load_table(path: &Path) -> Result<Arc<Language>, ToolError> {
    read_json(path).map(Arc::new)
}

/// Parses `file` and renders the tree, followed by one line per error.
///
/// # Errors
///
/// Only when `file` cannot be read; syntax errors are part of the output.
pub fn parse(
    language: Arc<Language>,
    file: &Path,
    fixed_form: bool,
    format: OutputFormat,
) -> Result<(SyntaxTree, String), ToolError> {
    let source = fs::read(file).map_err(|source| ToolError::Read {
        path: file.to_path_buf(),
        source,
    })?;
    let scanners = if fixed_form {
        FixedFormScanner::scanners()
    } else {
        ExternalScanners::new()
    };
    let tree = Parser::new(language).with_scanners(&scanners).parse(&source);

    let mut output = match format {
        OutputFormat::Sexp => format!("{}\n", tree.to_sexp()),
        OutputFormat::Dot => tree_to_dot(&tree),
    };
    for error in tree.errors() {
        let _ = writeln!(output, "error: {}: {error}", file.display());
    }
    Ok((tree, output))
}

/// Rule graph of the grammar with conflicting rules highlighted.
///
/// # Errors
///
/// See [`compile_grammar`].
pub fn graph(args: &GrammarArgs) -> Result<String, ToolError> {
    let (grammar, compiled) = compile_grammar(args)?;
    Ok(grammar_to_dot(&grammar, &compiled.diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const BASE: &str = r#"{
        "name": "lines",
        "rules": {
            "program": { "type": "REPEAT", "content": { "type": "SYMBOL", "name": "line" } },
            "line": {
                "type": "SEQ",
                "members": [
                    { "type": "REPEAT1", "content": { "type": "SYMBOL", "name": "word" } },
                    { "type": "STRING", "value": ";" }
                ]
            },
            "word": { "type": "PATTERN", "value": "[a-z]+" }
        }
    }"#;

    const COMMENTS: &str = r#"{
        "name": "lines_comments",
        "externals": ["_comment_character"],
        "conflicts": [["_comment_character", "word"]],
        "rules": {
            "line": {
                "type": "CHOICE",
                "members": [
                    {
                        "type": "SEQ",
                        "members": [
                            { "type": "SYMBOL", "name": "_comment_character" },
                            { "type": "TOKEN", "content": { "type": "PATTERN", "value": "[^\\n]+" } }
                        ]
                    },
                    {
                        "type": "SEQ",
                        "members": [
                            { "type": "REPEAT1", "content": { "type": "SYMBOL", "name": "word" } },
                            { "type": "STRING", "value": ";" }
                        ]
                    }
                ]
            }
        }
    }"#;

    struct Scratch {
        dir: PathBuf,
    }

    impl Scratch {
        fn new(name: &str) -> Self {
            let dir = std::env::temp_dir().join(format!("weft-tools-{name}-{}", std::process::id()));
            fs::create_dir_all(&dir).unwrap();
            Self { dir }
        }

        fn file(&self, name: &str, contents: &str) -> PathBuf {
            let path = self.dir.join(name);
            fs::write(&path, contents).unwrap();
            path
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }

    fn args(grammar: PathBuf, extend: Vec<PathBuf>) -> GrammarArgs {
        GrammarArgs {
            grammar,
            extend,
            canonical: false,
        }
    }

    #[test]
    fn test_compile_writes_tables_that_parse() {
        let scratch = Scratch::new("compile");
        let grammar = scratch.file("lines.json", BASE);
        let table = scratch.dir.join("lines.table.json");
        let report = compile(&args(grammar, Vec::new()), Some(&table)).unwrap();
        assert!(report.starts_with("no conflicts\n"));

        let input = scratch.file("input.txt", "ab cd; ef;");
        let (tree, output) = parse(load_table(&table).unwrap(), &input, false, OutputFormat::Sexp).unwrap();
        assert!(tree.errors().is_empty());
        assert_eq!(output, "(program (line (word) (word)) (line (word)))\n");
    }

    #[test]
    fn test_extension_with_fixed_form_scanner() {
        let scratch = Scratch::new("extend");
        let grammar = scratch.file("lines.json", BASE);
        let extension = scratch.file("comments.json", COMMENTS);
        let (_, compiled) = compile_grammar(&args(grammar, vec![extension])).unwrap();

        let input = scratch.file("input.txt", "c note!\nab;\n");
        let (tree, output) = parse(Arc::clone(&compiled.language), &input, true, OutputFormat::Sexp).unwrap();
        assert!(tree.errors().is_empty(), "{output}");
        assert_eq!(output, "(program (line) (line (word)))\n");

        // Without the scanner the comment is ordinary words and a stray `!`.
        let (tree, output) = parse(compiled.language, &input, false, OutputFormat::Sexp).unwrap();
        assert!(!tree.errors().is_empty());
        assert!(output.contains("error: "));
    }

    #[test]
    fn test_errors_name_the_file() {
        let scratch = Scratch::new("errors");
        let missing = scratch.dir.join("missing.json");
        let error = load_grammar(&missing, &[] as &[PathBuf]).unwrap_err();
        assert!(matches!(error, ToolError::Read { .. }));

        let broken = scratch.file("broken.json", r#"{ "name": "x", "rules": { "a": { "type": "SYMBOL", "name": "b" } } }"#);
        let error = load_grammar(&broken, &[] as &[PathBuf]).unwrap_err();
        assert!(error.to_string().contains("broken.json"));
        assert!(matches!(error, ToolError::Grammar { .. }));
    }

    #[test]
    fn test_graph_lists_rules() {
        let scratch = Scratch::new("graph");
        let grammar = scratch.file("lines.json", BASE);
        let dot = graph(&args(grammar, Vec::new())).unwrap();
        assert!(dot.contains("\"program\" -> \"line\";"));
        assert!(dot.contains("\"line\" -> \"word\";"));
    }
}
