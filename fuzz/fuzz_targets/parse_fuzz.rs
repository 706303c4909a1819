#![no_main]
use libfuzzer_sys::fuzz_target;
use std::sync::{Arc, LazyLock};
use weft::grammar::{choice, pattern, prec, prec_left, repeat, repeat1, seq, string, sym};
use weft::{ExternalScanners, GrammarBuilder, GrammarExtension, Language, Parser, ScanCursor, compile};

fn bang(cursor: &mut ScanCursor<'_>) -> bool {
    if cursor.column() == 0 && cursor.lookahead() == Some('!') {
        cursor.advance();
        return true;
    }
    false
}

static LANGUAGE: LazyLock<Arc<Language>> = LazyLock::new(|| {
    let compiled = GrammarBuilder::new("fuzz")
        .rule("program", repeat(sym("statement")))
        .rule("statement", seq([repeat1(sym("expression")), string("\n")]))
        .rule(
            "expression",
            choice([
                prec_left(1, seq([sym("expression"), string("+"), sym("expression")])),
                prec_left(2, seq([sym("expression"), string("*"), sym("expression")])),
                prec(3, seq([sym("not_operator"), sym("expression")])),
                seq([string("("), sym("expression"), string(")")]),
                sym("identifier"),
            ]),
        )
        .rule("not_operator", string("!"))
        .rule("identifier", pattern("[a-z]+"))
        .extras([pattern(" ")])
        .build()
        .and_then(|grammar| {
            grammar.extend(
                GrammarExtension::new()
                    .external("BANG")
                    .conflict(["BANG", "not_operator"])
                    .rule(
                        "statement",
                        choice([
                            seq([sym("BANG"), sym("expression"), string("\n")]),
                            seq([repeat1(sym("expression")), string("\n")]),
                        ]),
                    ),
            )
        })
        .and_then(|grammar| compile(&grammar))
        .unwrap();
    compiled.language
});

fuzz_target!(|data: &[u8]| {
    let parser = Parser::new(Arc::clone(&LANGUAGE))
        .with_scanners(&ExternalScanners::new().with("BANG", bang));
    let tree = parser.parse(data);
    let root = tree.root_node();
    assert_eq!(root.end_byte(), data.len());
    assert_eq!(tree.errors().is_empty(), !root.has_error());
});
