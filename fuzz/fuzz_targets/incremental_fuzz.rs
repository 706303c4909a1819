#![no_main]
use libfuzzer_sys::fuzz_target;
use std::sync::{Arc, LazyLock};
use weft::grammar::{choice, pattern, prec_left, repeat, seq, string, sym};
use weft::{Edit, GrammarBuilder, Language, Parser, compile};

static LANGUAGE: LazyLock<Arc<Language>> = LazyLock::new(|| {
    let grammar = GrammarBuilder::new("fuzz")
        .rule("program", repeat(sym("statement")))
        .rule("statement", seq([sym("expression"), string(";")]))
        .rule(
            "expression",
            choice([
                prec_left(1, seq([sym("expression"), string("+"), sym("expression")])),
                seq([string("("), sym("expression"), string(")")]),
                sym("word"),
            ]),
        )
        .rule("word", pattern("[a-z]+"))
        .extras([pattern("\\s")])
        .build()
        .unwrap();
    compile(&grammar).unwrap().language
});

// Input layout: [start, removed, inserted_len, inserted bytes..., buffer...]
fuzz_target!(|data: &[u8]| {
    let [start, removed, inserted, rest @ ..] = data else {
        return;
    };
    let inserted = usize::from(*inserted).min(rest.len());
    let (text, source) = rest.split_at(inserted);
    let start = usize::from(*start).min(source.len());
    let end = (start + usize::from(*removed)).min(source.len());

    let parser = Parser::new(Arc::clone(&LANGUAGE));
    let old = parser.parse(source);
    let (edit, edited) = Edit::splice(source, start, end, text);
    let incremental = parser.reparse(&old, &[edit], &edited);
    let fresh = parser.parse(&edited);
    assert!(incremental.same_structure(&fresh));
    assert_eq!(incremental.errors(), fresh.errors());
});
