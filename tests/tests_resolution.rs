//! Resolution Tests
//!
//! Cross-file property resolution: build-file chains, gradle.properties,
//! parent-module fallback, injected globals, and failure reporting.

use std::path::Path;

use gradlekit::{
    resolve, resolve_reference, BuildModelContext, ExprValue, FileId, LiteralValue,
    MemoryFileSystem, ResolutionContext, ResolvedValue, UnresolvedReason,
};
use rstest::rstest;

fn context_with(files: &[(&str, &str)]) -> BuildModelContext {
    let fs = MemoryFileSystem::new();
    for (path, text) in files {
        fs.insert(*path, *text);
    }
    BuildModelContext::new(Box::new(fs))
}

fn open(ctx: &mut BuildModelContext, path: &str) -> FileId {
    ctx.get_or_create_build_file(Path::new(path))
        .unwrap()
        .unwrap()
}

fn resolve_at_root(ctx: &BuildModelContext, file: FileId, name: &str) -> ResolvedValue {
    resolve_reference(ResolutionContext::at_root(ctx, file), name)
}

// ============================================================================
// gradle.properties
// ============================================================================

#[test]
fn sibling_properties_file_supplies_values() {
    let mut ctx = context_with(&[
        ("/p/build.gradle", "name = \"$artifact-$version\"\n"),
        ("/p/gradle.properties", "version=3\nartifact=core\n"),
    ]);
    let file = open(&mut ctx, "/p/build.gradle");

    assert_eq!(resolve_at_root(&ctx, file, "version"), ResolvedValue::Int(3));
    assert_eq!(
        resolve_at_root(&ctx, file, "name"),
        ResolvedValue::Str("core-3".into())
    );
}

#[test]
fn build_file_definition_wins_over_properties_file() {
    let mut ctx = context_with(&[
        ("/p/build.gradle", "ext.version = '9.9'\n"),
        ("/p/gradle.properties", "version=3\n"),
    ]);
    let file = open(&mut ctx, "/p/build.gradle");

    assert_eq!(
        resolve_at_root(&ctx, file, "version"),
        ResolvedValue::Str("9.9".into())
    );
}

#[rstest]
#[case("flag=true", ResolvedValue::Bool(true))]
#[case("flag=28", ResolvedValue::Int(28))]
#[case("flag=28.0.2", ResolvedValue::Str("28.0.2".into()))]
fn properties_values_are_typed(#[case] line: &str, #[case] expected: ResolvedValue) {
    let mut ctx = context_with(&[
        ("/p/build.gradle", "x = 1\n"),
        ("/p/gradle.properties", line),
    ]);
    let file = open(&mut ctx, "/p/build.gradle");
    assert_eq!(resolve_at_root(&ctx, file, "flag"), expected);
}

// ============================================================================
// Parent module fallback
// ============================================================================

#[test]
fn module_file_falls_back_to_the_root_build_file() {
    let mut ctx = context_with(&[
        ("/p/build.gradle", "ext.kotlin_version = '1.3.0'\n"),
        ("/p/app/build.gradle", "v = \"$kotlin_version\"\n"),
    ]);
    let root = open(&mut ctx, "/p/build.gradle");
    ctx.set_root_project_file(root);
    let app = open(&mut ctx, "/p/app/build.gradle");

    assert_eq!(
        resolve_at_root(&ctx, app, "v"),
        ResolvedValue::Str("1.3.0".into())
    );
}

#[test]
fn root_project_prefix_jumps_straight_to_the_root_file() {
    let mut ctx = context_with(&[
        ("/p/build.gradle", "ext.sdk = 28\n"),
        ("/p/app/build.gradle", "sdk = 7\n"),
    ]);
    let root = open(&mut ctx, "/p/build.gradle");
    ctx.set_root_project_file(root);
    let app = open(&mut ctx, "/p/app/build.gradle");

    assert_eq!(resolve_at_root(&ctx, app, "sdk"), ResolvedValue::Int(7));
    assert_eq!(
        resolve_at_root(&ctx, app, "rootProject.sdk"),
        ResolvedValue::Int(28)
    );
}

// ============================================================================
// Injected globals
// ============================================================================

#[test]
fn injected_global_is_the_last_resort() {
    let mut ctx = context_with(&[("/p/build.gradle", "x = \"$sdk_dir/tools\"\n")]);
    ctx.inject_global_property("sdk_dir", "/opt/android");
    let file = open(&mut ctx, "/p/build.gradle");

    assert_eq!(
        resolve_at_root(&ctx, file, "x"),
        ResolvedValue::Str("/opt/android/tools".into())
    );
}

#[test]
fn properties_file_shadows_an_injected_global() {
    let mut ctx = context_with(&[
        ("/p/build.gradle", "x = 1\n"),
        ("/p/gradle.properties", "channel=beta\n"),
    ]);
    ctx.inject_global_property("channel", "stable");
    let file = open(&mut ctx, "/p/build.gradle");

    assert_eq!(
        resolve_at_root(&ctx, file, "channel"),
        ResolvedValue::Str("beta".into())
    );
}

// ============================================================================
// Failure reporting
// ============================================================================

#[test]
fn unknown_reference_reports_not_found() {
    let mut ctx = context_with(&[("/p/build.gradle", "x = \"$nope\"\n")]);
    let file = open(&mut ctx, "/p/build.gradle");

    match resolve_at_root(&ctx, file, "nope") {
        ResolvedValue::Unresolved(UnresolvedReason::NotFound { reference }) => {
            assert_eq!(reference, "nope");
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn reference_cycle_reports_circular_not_stack_overflow() {
    let mut ctx = context_with(&[(
        "/p/build.gradle",
        "a = \"$b\"\nb = \"$c\"\nc = \"$a\"\n",
    )]);
    let file = open(&mut ctx, "/p/build.gradle");

    match resolve_at_root(&ctx, file, "a") {
        ResolvedValue::Unresolved(UnresolvedReason::Circular { .. }) => {}
        other => panic!("expected Circular, got {other:?}"),
    }
}

#[test]
fn self_reference_is_circular() {
    let mut ctx = context_with(&[("/p/build.gradle", "a = \"$a\"\n")]);
    let file = open(&mut ctx, "/p/build.gradle");

    assert!(matches!(
        resolve_at_root(&ctx, file, "a"),
        ResolvedValue::Unresolved(UnresolvedReason::Circular { .. })
    ));
}

#[test]
fn list_resolution_keeps_per_item_failures() {
    let mut ctx = context_with(&[(
        "/p/build.gradle",
        "good = 'x'\ndeps = [good, missing]\n",
    )]);
    let file = open(&mut ctx, "/p/build.gradle");
    let tree = &ctx.file(file).tree;
    let deps = tree.find_child_expr(tree.root(), "deps").unwrap();

    match resolve(ResolutionContext::at_root(&ctx, file), deps) {
        ResolvedValue::List(items) => {
            assert_eq!(items.len(), 2);
            assert_eq!(items[0], ResolvedValue::Str("x".into()));
            assert!(!items[1].is_resolved());
        }
        other => panic!("expected List, got {other:?}"),
    }
}

// ============================================================================
// Resolution over pending edits
// ============================================================================

#[test]
fn resolution_sees_unapplied_edits() {
    let mut ctx = context_with(&[(
        "/p/build.gradle",
        "ext.v = '1.0'\nname = \"lib-$v\"\n",
    )]);
    let file = open(&mut ctx, "/p/build.gradle");
    assert_eq!(
        resolve_at_root(&ctx, file, "name"),
        ResolvedValue::Str("lib-1.0".into())
    );

    let tree = &mut ctx.file_mut(file).tree;
    let v = tree.find_child_expr(tree.root(), "ext.v").unwrap();
    tree.set_value(v, ExprValue::Literal(LiteralValue::Str("2.0".into())));

    // No apply yet: the model, not the file, is the source of truth.
    assert_eq!(
        resolve_at_root(&ctx, file, "name"),
        ResolvedValue::Str("lib-2.0".into())
    );
}

#[test]
fn removed_definition_stops_resolving() {
    let mut ctx = context_with(&[("/p/build.gradle", "v = 3\nx = \"$v\"\n")]);
    let file = open(&mut ctx, "/p/build.gradle");
    assert_eq!(resolve_at_root(&ctx, file, "x"), ResolvedValue::Str("3".into()));

    let tree = &mut ctx.file_mut(file).tree;
    tree.remove_property(tree.root(), "v");

    assert!(!resolve_at_root(&ctx, file, "x").is_resolved());
}
