//! The write-back engine.
//!
//! `apply_changes` turns recorded element edits into a minimal batch of
//! text edits against the file's source snapshot: removed statements are
//! deleted with their line, added elements are rendered and inserted before
//! their parent's closing brace, and modified values replace only their own
//! value span. Everything else in the file - formatting, comments,
//! untouched siblings - stays byte-identical.
//!
//! All edit offsets are computed against the original snapshot and applied
//! back-to-front in one batch, so earlier edits never invalidate later
//! offsets. The whole operation is atomic per file: on conflict nothing is
//! mutated, in memory or on disk.

use crate::base::FileId;
use crate::dsl::{
    ElementId, ElementPayload, ElementState, ElementTree, ExprStyle, ExprValue, Segment,
};
use crate::project::BuildModelContext;
use crate::syntax::TextRange;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const INDENT: &str = "    ";

/// Structural write-back failures. All-or-nothing: when any variant is
/// returned, neither the in-memory tree nor the on-disk file has changed
/// (except `Reparse`, which indicates a renderer bug).
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// The underlying file no longer matches the parsed snapshot; the
    /// caller must reparse and retry.
    #[error("{} changed since it was parsed; reparse and retry", path.display())]
    Conflict { path: PathBuf },
    #[error("failed to persist {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write-back produced unparseable text for {}", path.display())]
    Reparse { path: PathBuf },
}

/// One pending text mutation, addressed in original-snapshot offsets.
#[derive(Debug)]
struct TextEdit {
    range: TextRange,
    insert: String,
}

/// Applies all recorded edits of `file` to its text and persists the
/// result through the session's file system.
///
/// Re-entrant: with no pending edits this is a no-op that performs no text
/// mutation, so parse-then-apply round-trips byte-identically.
pub fn apply_changes(ctx: &mut BuildModelContext, file: FileId) -> Result<(), ApplyError> {
    let dsl_file = ctx.file(file);
    if !dsl_file.tree.has_pending_edits() {
        return Ok(());
    }
    let path = dsl_file.path.clone();
    let mut edits = Vec::new();
    collect_edits(
        &dsl_file.tree,
        dsl_file.text(),
        dsl_file.tree.root(),
        &mut edits,
    );

    if edits.is_empty() {
        // Edits that cancel out textually (e.g. added then removed) still
        // need their state cleared for the next cycle.
        let snapshot = dsl_file.text().to_string();
        return reanchor(ctx, file, snapshot);
    }

    // Conflict detection: the snapshot must still match the live document.
    let on_disk = match ctx.fs().read_file(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "file disappeared since parse");
            return Err(ApplyError::Conflict { path });
        }
        Err(source) => return Err(ApplyError::Io { path, source }),
    };
    let dsl_file = ctx.file(file);
    if on_disk != dsl_file.text() {
        warn!(path = %path.display(), "file changed externally since parse");
        return Err(ApplyError::Conflict { path });
    }

    debug!(path = %path.display(), edits = edits.len(), "applying edit batch");
    let new_text = splice(dsl_file.text(), edits, &path)?;
    ctx.fs()
        .write_file(&path, &new_text)
        .map_err(|source| ApplyError::Io {
            path: path.clone(),
            source,
        })?;
    reanchor(ctx, file, new_text)
}

/// Applies pending edits of every file in the session.
pub fn apply_all_changes(ctx: &mut BuildModelContext) -> Result<(), ApplyError> {
    let files: Vec<_> = ctx.all_files().collect();
    for file in files {
        apply_changes(ctx, file)?;
    }
    Ok(())
}

/// Commits the state machine: dirty nodes go to `Applied`, then the tree
/// is rebuilt from the new text so every surviving element is `Parsed`
/// with a fresh syntax anchor and removed elements are detached.
fn reanchor(ctx: &mut BuildModelContext, file: FileId, new_text: String) -> Result<(), ApplyError> {
    let dsl_file = ctx.file_mut(file);
    dsl_file.tree.mark_all_applied();
    let path = dsl_file.path.clone();
    dsl_file
        .replace_text(new_text)
        .map_err(|_| ApplyError::Reparse { path })
}

// =============================================================================
// Edit collection
// =============================================================================

fn collect_edits(tree: &ElementTree, text: &str, id: ElementId, edits: &mut Vec<TextEdit>) {
    for child in tree.children(id) {
        let element = tree.get(child);
        match element.state {
            ElementState::Removed => {
                // Physical deletion, explicit only: an emptied enclosing
                // block is never cascaded. No recursion - the span covers
                // the whole subtree.
                if let Some(anchor) = &element.anchor {
                    edits.push(TextEdit {
                        range: line_span(text, anchor.statement),
                        insert: String::new(),
                    });
                }
            }
            ElementState::Added => {
                edits.push(insert_edit(tree, text, child));
            }
            ElementState::Modified => {
                if let Some(edit) = replace_edit(tree, child) {
                    edits.push(edit);
                } else if element.is_block_like() {
                    collect_edits(tree, text, child, edits);
                }
            }
            ElementState::Parsed | ElementState::Applied => {
                collect_edits(tree, text, child, edits);
            }
        }
    }
}

/// Renders an added element and picks its insertion point: before the
/// parent block's closing brace, or at the end of the file for root-level
/// additions.
fn insert_edit(tree: &ElementTree, text: &str, id: ElementId) -> TextEdit {
    let parent = tree
        .get(id)
        .parent
        .expect("added elements always have a parent");
    let level = tree.depth(id);
    let rendered = render_statement(tree, id, level);

    let body_close = tree
        .get(parent)
        .anchor
        .as_ref()
        .and_then(|a| a.body_close);
    match body_close {
        Some(close) => {
            let close: usize = close.into();
            let line_start = line_start(text, close);
            if text[line_start..close].chars().all(|c| c == ' ' || c == '\t') {
                // The brace sits alone on its line: slot the new statement in
                // above it.
                let at = TextRange::empty((line_start as u32).into());
                TextEdit {
                    range: at,
                    insert: format!("{rendered}\n"),
                }
            } else {
                // Single-line block: break before the brace.
                let at = TextRange::empty((close as u32).into());
                TextEdit {
                    range: at,
                    insert: format!("\n{rendered}\n"),
                }
            }
        }
        None => {
            // Root level: append at end of file.
            let at = TextRange::empty((text.len() as u32).into());
            let lead = if text.is_empty() || text.ends_with('\n') {
                ""
            } else {
                "\n"
            };
            TextEdit {
                range: at,
                insert: format!("{lead}{rendered}\n"),
            }
        }
    }
}

/// Minimal replacement for a modified expression: only its own value span
/// is rewritten.
fn replace_edit(tree: &ElementTree, id: ElementId) -> Option<TextEdit> {
    let element = tree.get(id);
    let expr = element.as_expr()?;
    let anchor = element.anchor.as_ref()?;
    match anchor.value {
        Some(range) => Some(TextEdit {
            range,
            insert: render_value_of(tree, &expr.value),
        }),
        // No value span to target (e.g. a call that had no arguments):
        // rewrite the whole statement in place.
        None => Some(TextEdit {
            range: anchor.statement,
            insert: render_statement(tree, id, 0),
        }),
    }
}

// =============================================================================
// Batch application
// =============================================================================

fn splice(text: &str, mut edits: Vec<TextEdit>, path: &Path) -> Result<String, ApplyError> {
    // Stable order: ascending by start, collection order breaking ties.
    // Applying in reverse keeps every edit addressed in original offsets,
    // and ties land in collection order.
    edits.sort_by_key(|e| e.range.start());
    for pair in edits.windows(2) {
        if pair[1].range.start() < pair[0].range.end() {
            // Overlapping edits mean the same text region was edited through
            // two elements; refuse rather than corrupt the file.
            warn!(path = %path.display(), "overlapping edits in batch");
            return Err(ApplyError::Conflict {
                path: path.to_path_buf(),
            });
        }
    }
    let mut out = text.to_string();
    for edit in edits.iter().rev() {
        let start: usize = edit.range.start().into();
        let end: usize = edit.range.end().into();
        out.replace_range(start..end, &edit.insert);
    }
    Ok(out)
}

/// Expands a statement span to cover its whole line when the statement is
/// alone on it: leading indentation and the trailing newline go too.
fn line_span(text: &str, range: TextRange) -> TextRange {
    let start: usize = range.start().into();
    let end: usize = range.end().into();
    let bytes = text.as_bytes();

    let ls = line_start(text, start);
    let new_start = if text[ls..start].chars().all(|c| c == ' ' || c == '\t') {
        ls
    } else {
        start
    };

    let mut new_end = end;
    while new_end < bytes.len() && (bytes[new_end] == b' ' || bytes[new_end] == b'\t') {
        new_end += 1;
    }
    if new_end < bytes.len() && bytes[new_end] == b'\r' {
        new_end += 1;
    }
    if new_end < bytes.len() && bytes[new_end] == b'\n' {
        new_end += 1;
    }
    TextRange::new((new_start as u32).into(), (new_end as u32).into())
}

fn line_start(text: &str, offset: usize) -> usize {
    text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

// =============================================================================
// Rendering
// =============================================================================

/// Renders a whole statement (recursively for blocks) at `level` nesting.
/// Formatting of synthesized text is implementation-defined; it reparses
/// to an equivalent tree.
fn render_statement(tree: &ElementTree, id: ElementId, level: usize) -> String {
    let element = tree.get(id);
    let indent = INDENT.repeat(level);
    match &element.payload {
        ElementPayload::Block(_) | ElementPayload::Map(_) => {
            let mut out = format!("{indent}{} {{\n", element.name.render());
            for child in tree.children(id) {
                if tree.get(child).is_live() {
                    out.push_str(&render_statement(tree, child, level + 1));
                    out.push('\n');
                }
            }
            out.push_str(&indent);
            out.push('}');
            out
        }
        ElementPayload::Expr(expr) => match expr.style {
            ExprStyle::Call => {
                let args = match &expr.value {
                    ExprValue::Call { args, .. } => render_args(tree, args),
                    other => render_value_of(tree, other),
                };
                if args.is_empty() {
                    format!("{indent}{}()", element.name.render())
                } else {
                    format!("{indent}{} {args}", element.name.render())
                }
            }
            ExprStyle::Assignment | ExprStyle::Nested => format!(
                "{indent}{} = {}",
                element.name.render(),
                render_value_of(tree, &expr.value)
            ),
        },
    }
}

fn render_args(tree: &ElementTree, args: &[ElementId]) -> String {
    args.iter()
        .filter(|&&a| tree.get(a).is_live())
        .map(|&a| render_arg(tree, a))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Positional arguments (index-named) render bare; named arguments keep
/// their `key: value` form.
fn render_arg(tree: &ElementTree, id: ElementId) -> String {
    let element = tree.get(id);
    let value = match element.as_expr() {
        Some(expr) => render_value_of(tree, &expr.value),
        None => String::new(),
    };
    if element.name.as_str().parse::<usize>().is_ok() {
        value
    } else {
        format!("{}: {value}", element.name.render())
    }
}

fn render_value_of(tree: &ElementTree, value: &ExprValue) -> String {
    match value {
        ExprValue::Literal(lit) => lit.render(),
        ExprValue::Reference(path) => path.to_string(),
        ExprValue::Interpolated(segments) => {
            let mut out = String::from("\"");
            for segment in segments {
                match segment {
                    Segment::Text(t) => out.push_str(
                        &t.replace('\\', "\\\\")
                            .replace('"', "\\\"")
                            .replace('$', "\\$"),
                    ),
                    Segment::Reference(name) => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
            }
            out.push('"');
            out
        }
        ExprValue::List(items) => {
            let rendered: Vec<_> = items
                .iter()
                .filter(|&&item| tree.get(item).is_live())
                .map(|&item| match tree.get(item).as_expr() {
                    Some(expr) => render_value_of(tree, &expr.value),
                    None => String::new(),
                })
                .collect();
            format!("[{}]", rendered.join(", "))
        }
        ExprValue::Call { callee, args } => match callee {
            Some(name) => format!("{name}({})", render_args(tree, args)),
            None => render_args(tree, args),
        },
    }
}

/// Renders a value with no tree context (scalars only); test helper.
#[cfg(test)]
pub(crate) fn render_scalar(value: &ExprValue) -> String {
    match value {
        ExprValue::Literal(lit) => lit.render(),
        ExprValue::Reference(path) => path.to_string(),
        _ => panic!("render_scalar is for scalars"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::LiteralValue;

    #[test]
    fn line_span_swallows_a_whole_line() {
        let text = "foo {\n    bar = 1\n}\n";
        let start = text.find("bar").unwrap() as u32;
        let end = start + "bar = 1".len() as u32;
        let span = line_span(text, TextRange::new(start.into(), end.into()));
        assert_eq!(&text[..span.start().into()], "foo {\n");
        assert_eq!(&text[span.end().into()..], "}\n");
    }

    #[test]
    fn line_span_keeps_inline_neighbours() {
        let text = "foo { bar = 1 }\n";
        let start = text.find("bar").unwrap() as u32;
        let end = start + "bar = 1".len() as u32;
        let span = line_span(text, TextRange::new(start.into(), end.into()));
        // Only the statement and its trailing space go.
        assert_eq!(&text[span.start().into()..span.end().into()], "bar = 1 ");
    }

    #[test]
    fn scalar_rendering() {
        assert_eq!(
            render_scalar(&ExprValue::Literal(LiteralValue::Str("x".into()))),
            "'x'"
        );
        assert_eq!(render_scalar(&ExprValue::Literal(LiteralValue::Int(28))), "28");
        assert_eq!(
            render_scalar(&ExprValue::Literal(LiteralValue::Bool(true))),
            "true"
        );
        assert_eq!(
            render_scalar(&ExprValue::Reference("kotlin_version".into())),
            "kotlin_version"
        );
    }

    #[test]
    fn splice_applies_back_to_front() {
        let text = "a = 1\nb = 2\n";
        let edits = vec![
            TextEdit {
                range: TextRange::new(4.into(), 5.into()),
                insert: "9".into(),
            },
            TextEdit {
                range: TextRange::new(10.into(), 11.into()),
                insert: "8".into(),
            },
        ];
        let out = splice(text, edits, Path::new("/t")).unwrap();
        assert_eq!(out, "a = 9\nb = 8\n");
    }

    #[test]
    fn overlapping_edits_are_rejected() {
        let text = "a = 1\n";
        let edits = vec![
            TextEdit {
                range: TextRange::new(0.into(), 5.into()),
                insert: String::new(),
            },
            TextEdit {
                range: TextRange::new(4.into(), 5.into()),
                insert: "2".into(),
            },
        ];
        assert!(matches!(
            splice(text, edits, Path::new("/t")),
            Err(ApplyError::Conflict { .. })
        ));
    }
}
