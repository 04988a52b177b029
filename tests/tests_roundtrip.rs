//! Round-Trip Tests
//!
//! A parsed file with no pending edits must write back byte-identically,
//! whitespace and comments included. These tests drive the full pipeline:
//! file system, parse, element tree, write-back.

use std::path::Path;

use gradlekit::{apply_changes, parse, BuildModelContext, MemoryFileSystem};
use rstest::rstest;

fn load(text: &str) -> (BuildModelContext, gradlekit::FileId) {
    let fs = MemoryFileSystem::new();
    fs.insert("/p/build.gradle", text);
    let mut ctx = BuildModelContext::new(Box::new(fs));
    let id = ctx
        .get_or_create_build_file(Path::new("/p/build.gradle"))
        .unwrap()
        .unwrap();
    (ctx, id)
}

// ============================================================================
// Lossless CST
// ============================================================================

#[rstest]
#[case("version = '1.0'\n")]
#[case("// comment\nandroid {\n    compileSdkVersion 28  // trailing\n}\n")]
#[case("apply plugin: 'kotlin-android'\n\n\nfoo { }\n")]
#[case("deps = [a, b,\n    c]\n")]
#[case("/* block\n   comment */\nx = \"${a}b\"\r\nno_newline_at_end = true")]
fn cst_preserves_source_text(#[case] input: &str) {
    let parsed = parse(input);
    assert!(parsed.ok(), "parse errors: {:?}", parsed.errors);
    assert_eq!(parsed.syntax().text().to_string(), input);
}

#[test]
fn cst_keeps_text_even_with_parse_errors() {
    let input = "foo = \nbar { baz = 1 }\n";
    let parsed = parse(input);
    assert!(!parsed.ok());
    assert_eq!(parsed.syntax().text().to_string(), input);
}

// ============================================================================
// Zero-edit write-back
// ============================================================================

#[test]
fn apply_without_edits_is_byte_identical() {
    let original = "// keep me\nbuildscript {\n    ext.kotlin_version = '1.3.0'\n\n    repositories {\n        google()\n    }\n}\n";
    let (mut ctx, file) = load(original);

    apply_changes(&mut ctx, file).unwrap();

    assert_eq!(ctx.file(file).text(), original);
    // The no-edit path never writes, so the backing store is untouched too.
    assert_eq!(
        ctx.fs().read_file(Path::new("/p/build.gradle")).unwrap(),
        original
    );
}

#[test]
fn apply_is_idempotent_after_an_edit_cycle() {
    let (mut ctx, file) = load("foo {\n    bar = 1\n}\n");
    let tree = &mut ctx.file_mut(file).tree;
    let foo = tree.find_child_block(tree.root(), "foo").unwrap();
    let bar = tree.find_child_expr(foo, "bar").unwrap();
    tree.set_value(
        bar,
        gradlekit::ExprValue::Literal(gradlekit::LiteralValue::Int(2)),
    );

    apply_changes(&mut ctx, file).unwrap();
    let after_first = ctx.file(file).text().to_string();
    assert_eq!(after_first, "foo {\n    bar = 2\n}\n");

    // Second apply has nothing pending and must not disturb the text.
    assert!(!ctx.file(file).tree.has_pending_edits());
    apply_changes(&mut ctx, file).unwrap();
    assert_eq!(ctx.file(file).text(), after_first);
}

#[test]
fn reanchored_tree_matches_a_fresh_parse() {
    let (mut ctx, file) = load("android {\n    compileSdkVersion 28\n}\n");
    let tree = &mut ctx.file_mut(file).tree;
    let android = tree.find_child_block(tree.root(), "android").unwrap();
    tree.add_property(
        android,
        "buildToolsVersion",
        gradlekit::ExprValue::Literal(gradlekit::LiteralValue::Str("29.0.2".into())),
    );
    apply_changes(&mut ctx, file).unwrap();

    let written = ctx.fs().read_file(Path::new("/p/build.gradle")).unwrap();
    let reparsed = parse(&written);
    assert!(reparsed.ok(), "written text must reparse: {written:?}");

    // The in-session tree was rebuilt from the same text.
    let tree = &ctx.file(file).tree;
    let android = tree.find_child_block(tree.root(), "android").unwrap();
    assert!(tree.find_child_expr(android, "buildToolsVersion").is_some());
    assert!(!tree.has_pending_edits());
}
