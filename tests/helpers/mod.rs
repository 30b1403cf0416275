//! Shared fixture grammars and tree assertions for the integration suites.

#![allow(dead_code)]

use canopy::{Assoc, GrammarBuilder, Language, Node, Tree, alt, lit, nt, tok};
use once_cell::sync::Lazy;

static ARITH: Lazy<Language> = Lazy::new(build_arith);
static COND: Lazy<Language> = Lazy::new(build_cond);
static SCRIPT: Lazy<Language> = Lazy::new(build_script);

/// Arithmetic with two left-associative precedence levels and whitespace
/// extras. Compiled once; clones share the tables.
pub fn arith() -> Language {
    ARITH.clone()
}

/// Conditionals: `if <expr> then <stmt>`, statements end with `;`.
pub fn cond() -> Language {
    COND.clone()
}

/// A small statement language used by the incremental tests: a file is a
/// sequence of `let <ident> = <expr> ;` bindings.
pub fn script() -> Language {
    SCRIPT.clone()
}

fn build_arith() -> Language {
    let mut g = GrammarBuilder::new();
    g.token("number", "[0-9]+");
    g.token("space", r"\s+");
    g.extra("space");
    g.precedence("sum", 1, Assoc::Left);
    g.precedence("product", 2, Assoc::Left);
    g.rule(
        "expr",
        [
            alt([nt("expr"), lit("+"), nt("expr")]).prec("sum"),
            alt([nt("expr"), lit("*"), nt("expr")]).prec("product"),
            alt([lit("("), nt("expr"), lit(")")]),
            alt([tok("number")]),
        ],
    );
    Language::compile(g.build().unwrap()).unwrap()
}

fn build_cond() -> Language {
    let mut g = GrammarBuilder::new();
    g.token("number", "[0-9]+");
    g.token("space", r"\s+");
    g.extra("space");
    g.rule(
        "stmt",
        [
            alt([lit("if"), nt("expr"), lit("then"), nt("stmt")]),
            alt([nt("expr"), lit(";")]),
        ],
    );
    g.rule("expr", [alt([tok("number")])]);
    g.build().map(Language::compile).unwrap().unwrap()
}

fn build_script() -> Language {
    let mut g = GrammarBuilder::new();
    g.token("ident", r"[_\p{ID_Start}][_\p{ID_Continue}]*");
    g.token("number", "[0-9]+");
    g.token("space", r"\s+");
    g.token("comment", r"#[^\n]*");
    g.extra("space");
    g.extra("comment");
    g.precedence("sum", 1, Assoc::Left);
    g.rule("file", [alt([nt("items")])]);
    g.hide("items");
    g.rule("items", [alt([nt("items"), nt("binding")]), alt([])]);
    g.rule(
        "binding",
        [alt([lit("let"), tok("ident"), lit("="), nt("expr"), lit(";")])],
    );
    g.rule(
        "expr",
        [
            alt([nt("expr"), lit("+"), nt("expr")]).prec("sum"),
            alt([tok("number")]),
            alt([tok("ident")]),
        ],
    );
    g.start("file");
    Language::compile(g.build().unwrap()).unwrap()
}

/// Deliberately ambiguous juxtaposition grammar (`E := E E | a`) with the
/// ambiguity declared acceptable, for generalized-parsing tests.
pub fn ambiguous(max_stacks: usize) -> Language {
    let mut g = GrammarBuilder::new();
    g.token("a", "a");
    g.rule("e", [alt([nt("e"), nt("e")]), alt([tok("a")])]);
    g.expected_conflict(&["e"]);
    Language::compile_with(
        g.build().unwrap(),
        canopy::CompileOptions {
            max_parallel_stacks: max_stacks,
        },
    )
    .unwrap()
}

/// Render the tree shape as an s-expression of kind names with byte
/// ranges, for structural comparison.
pub fn shape(tree: &Tree) -> String {
    fn walk(node: &Node, out: &mut String) {
        let range = node.range();
        if node.is_leaf() {
            let tag = if node.is_missing() { "MISSING " } else { "" };
            out.push_str(&format!(
                "({tag}{} {:?}..{:?})",
                node.kind_name(),
                u32::from(range.start()),
                u32::from(range.end())
            ));
            return;
        }
        out.push_str(&format!(
            "({} {:?}..{:?}",
            node.kind_name(),
            u32::from(range.start()),
            u32::from(range.end())
        ));
        for child in node.children() {
            out.push(' ');
            walk(&child, out);
        }
        out.push(')');
    }
    let mut out = String::new();
    walk(&tree.root_node(), &mut out);
    out
}

/// Leaf-concatenation invariant: the leaves reproduce the source exactly.
pub fn assert_lossless(tree: &Tree, source: &str) {
    assert_eq!(tree.text(), source, "leaf concatenation must equal source");
    assert_eq!(
        u32::from(tree.root_node().range().end()) as usize,
        source.len(),
        "root must span the entire input",
    );
}
