//! External scanner hooks: context-sensitive terminals recognized by
//! host-registered callbacks.

mod helpers;

use canopy::base::{SymbolId, TextRange, TextSize, TokenSet};
use canopy::lexer::ScannedToken;
use canopy::{ExternalScanner, GrammarBuilder, Language, Parser, alt, nt, tok};
use helpers::assert_lossless;

/// A grammar where shouted words (`HELLO`) are recognized externally and
/// ordinary words by the lexical automaton.
fn shout_language() -> Language {
    let mut g = GrammarBuilder::new();
    g.token("word", "[a-z]+");
    g.token("space", " +");
    g.extra("space");
    g.external("shout");
    g.rule("doc", [alt([nt("doc"), nt("item")]), alt([nt("item")])]);
    g.rule("item", [alt([tok("word")]), alt([tok("shout")])]);
    g.start("doc");
    Language::compile(g.build().unwrap()).unwrap()
}

/// Recognizes a run of uppercase letters; counts tokens so its state has
/// something to snapshot.
struct ShoutScanner {
    seen: u32,
}

impl ExternalScanner for ShoutScanner {
    fn scan(
        &mut self,
        text: &str,
        offset: TextSize,
        terminal: SymbolId,
        _valid: &TokenSet,
    ) -> Option<ScannedToken> {
        let start = u32::from(offset) as usize;
        let len = text[start..]
            .bytes()
            .take_while(|b| b.is_ascii_uppercase())
            .count();
        if len == 0 {
            return None;
        }
        self.seen += 1;
        Some(ScannedToken {
            terminal,
            range: TextRange::at(offset, TextSize::new(len as u32)),
        })
    }

    fn serialize_state(&self) -> Vec<u8> {
        self.seen.to_le_bytes().to_vec()
    }

    fn restore_state(&mut self, state: &[u8]) {
        if let Ok(bytes) = <[u8; 4]>::try_from(state) {
            self.seen = u32::from_le_bytes(bytes);
        }
    }
}

#[test]
fn test_external_terminal_recognized() {
    let mut parser = Parser::new(shout_language());
    parser
        .set_external_scanner("shout", Box::new(ShoutScanner { seen: 0 }))
        .unwrap();
    let source = "hello WORLD again";
    let tree = parser.parse(source, None).unwrap();
    assert!(!tree.has_error(), "markers: {:?}", tree.error_ranges());
    assert_lossless(&tree, source);

    let kinds: Vec<String> = tree
        .root_node()
        .descendants()
        .filter(|n| n.is_leaf() && n.kind_name() != "space")
        .map(|n| n.kind_name().to_string())
        .collect();
    assert_eq!(kinds, ["word", "shout", "word"]);
}

#[test]
fn test_unregistered_external_recovers() {
    // No scanner registered: shouted words cannot be recognized, but the
    // parse still produces a full-span tree with error markers.
    let mut parser = Parser::new(shout_language());
    let source = "hello WORLD";
    let tree = parser.parse(source, None).unwrap();
    assert_lossless(&tree, source);
    assert!(tree.has_error());
}

#[test]
fn test_registering_unknown_external_fails() {
    let mut parser = Parser::new(shout_language());
    let err = parser
        .set_external_scanner("nope", Box::new(ShoutScanner { seen: 0 }))
        .unwrap_err();
    assert!(matches!(err, canopy::GrammarError::UndefinedSymbol { .. }));
    // Internal terminals are not valid targets either.
    assert!(
        parser
            .set_external_scanner("word", Box::new(ShoutScanner { seen: 0 }))
            .is_err()
    );
}

#[test]
fn test_incremental_parse_with_external_tokens() {
    let mut parser = Parser::new(shout_language());
    parser
        .set_external_scanner("shout", Box::new(ShoutScanner { seen: 0 }))
        .unwrap();
    let source = "AAA bbb CCC";
    let tree = parser.parse(source, None).unwrap();
    assert!(!tree.has_error());

    // bbb -> bzb
    let edit = canopy::InputEdit::replace(TextSize::new(5), TextSize::new(6), "z");
    let edited = tree.edit(&edit);
    let new_source = "AAA bzb CCC";
    let incremental = parser.parse(new_source, Some(&edited)).unwrap();
    let scratch = parser.parse(new_source, None).unwrap();
    assert_eq!(helpers::shape(&incremental), helpers::shape(&scratch));
}
