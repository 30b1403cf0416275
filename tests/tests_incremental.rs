//! Incremental re-parsing: edits must be equivalent to parsing from
//! scratch, and old snapshots must stay intact.

mod helpers;

use canopy::{InputEdit, Parser, TextSize, Tree};
use helpers::{arith, assert_lossless, script, shape};
use rstest::rstest;

/// Apply `edit` to both the tree and the source string, re-parse
/// incrementally, and check the result is structurally identical to a
/// from-scratch parse of the new source.
fn check_equivalent(parser: &mut Parser, source: &str, edit: InputEdit) -> Tree {
    let old = parser.parse(source, None).unwrap();

    let mut new_source = source.to_string();
    let range = u32::from(edit.start) as usize..u32::from(edit.old_end) as usize;
    new_source.replace_range(range, &edit.text);

    let edited = old.edit(&edit);
    assert_eq!(edited.text(), new_source, "edit splice must match the text");

    let incremental = parser.parse(&new_source, Some(&edited)).unwrap();
    let scratch = parser.parse(&new_source, None).unwrap();
    assert_eq!(
        shape(&incremental),
        shape(&scratch),
        "incremental parse diverged from scratch parse",
    );
    assert_lossless(&incremental, &new_source);
    incremental
}

#[rstest]
#[case::widen_number(TextSize::new(3), TextSize::new(3), "0")]
#[case::replace_number(TextSize::new(0), TextSize::new(1), "42")]
#[case::delete_operand(TextSize::new(1), TextSize::new(3), "")]
#[case::insert_operator(TextSize::new(5), TextSize::new(5), "+9")]
#[case::break_syntax(TextSize::new(2), TextSize::new(3), "+")]
fn test_arith_edits(#[case] start: TextSize, #[case] old_end: TextSize, #[case] text: &str) {
    let mut parser = Parser::new(arith());
    check_equivalent(&mut parser, "1+2+3", InputEdit::replace(start, old_end, text));
}

#[test]
fn test_edit_in_one_binding_of_many() {
    let mut parser = Parser::new(script());
    let source = "let a = 1;\nlet b = 2 + 3;\nlet c = a + b;\n";
    // Change `2` to `20` inside the middle binding.
    let edit = InputEdit::replace(TextSize::new(19), TextSize::new(20), "20");
    check_equivalent(&mut parser, source, edit);
}

#[test]
fn test_edit_that_breaks_then_fixes() {
    let mut parser = Parser::new(script());
    let source = "let a = 1;let b = 2;";
    // Break: delete the `=` of the first binding.
    let broken_edit = InputEdit::delete(TextSize::new(6), TextSize::new(7));
    let broken = check_equivalent(&mut parser, source, broken_edit);
    assert!(broken.has_error());

    // Fix: put it back, editing the already-edited tree.
    let fixed_edit = InputEdit::insert(TextSize::new(6), "=");
    let edited = broken.edit(&fixed_edit);
    let fixed_source = source.to_string();
    let fixed = parser.parse(&fixed_source, Some(&edited)).unwrap();
    let scratch = parser.parse(&fixed_source, None).unwrap();
    assert_eq!(shape(&fixed), shape(&scratch));
    assert!(!fixed.has_error());
}

#[test]
fn test_edit_never_mutates_prior_snapshot() {
    let mut parser = Parser::new(script());
    let source = "let a = 1;";
    let old = parser.parse(source, None).unwrap();
    let old_shape = shape(&old);

    let edited = old.edit(&InputEdit::replace(TextSize::new(8), TextSize::new(9), "777"));
    let _new = parser.parse("let a = 777;", Some(&edited)).unwrap();

    assert_eq!(old.text(), source);
    assert_eq!(shape(&old), old_shape);
}

#[test]
fn test_chained_edits_accumulate_dirty_ranges() {
    let mut parser = Parser::new(script());
    let source = "let a = 1;let b = 2;let c = 3;";
    let tree = parser.parse(source, None).unwrap();

    let once = tree.edit(&InputEdit::replace(TextSize::new(8), TextSize::new(9), "9"));
    let twice = once.edit(&InputEdit::replace(TextSize::new(28), TextSize::new(29), "8"));
    assert!(twice.dirty_ranges().len() >= 2);

    let new_source = "let a = 9;let b = 2;let c = 8;";
    let incremental = parser.parse(new_source, Some(&twice)).unwrap();
    let scratch = parser.parse(new_source, None).unwrap();
    assert_eq!(shape(&incremental), shape(&scratch));
}

#[test]
fn test_edit_at_token_join_boundary() {
    let mut parser = Parser::new(script());
    // Deleting the space joins `le` + `t` into the keyword `let`.
    let source = "le t x = 1;";
    let edit = InputEdit::delete(TextSize::new(2), TextSize::new(3));
    check_equivalent(&mut parser, source, edit);
}

#[test]
fn test_stale_old_tree_is_ignored() {
    let mut parser = Parser::new(script());
    let old = parser.parse("let a = 1;", None).unwrap();
    // A tree whose length disagrees with the text cannot seed reuse.
    let tree = parser.parse("let a = 1;let b = 2;", Some(&old)).unwrap();
    assert!(!tree.has_error());
    assert_lossless(&tree, "let a = 1;let b = 2;");
}
