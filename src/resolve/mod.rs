//! Property reference resolution.
//!
//! Converts symbolic references into concrete values by walking the
//! resolution chain of the owning file:
//!
//! 1. the current block scope, then each enclosing block outward to the
//!    file root (inner definitions shadow outer ones),
//! 2. the `ext` block at the file root,
//! 3. the file's sibling properties file,
//! 4. the parent-module build file (its root scope, then its properties),
//! 5. externally injected global bindings.
//!
//! First match wins. The chain ordering between a sibling properties file
//! and parent-module values is deliberate and fixed: the file's own
//! properties file is the more local definition.
//!
//! Resolution is a pure function of (tree, context): nothing is memoized,
//! so re-resolving after a tree mutation always sees the current state.
//! Unresolved references are data, not errors - one bad property never
//! blocks reading the rest of the tree.

use crate::base::FileId;
use crate::dsl::{Element, ElementId, ElementTree, ExprValue, LiteralValue, Segment};
use crate::project::BuildModelContext;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use tracing::debug;

/// Hard cap on chained reference hops, a backstop behind cycle detection.
const MAX_RESOLVE_DEPTH: usize = 32;

/// Outcome of resolving one expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Element-wise composite; entries may individually be `Unresolved`.
    List(Vec<ResolvedValue>),
    Unresolved(UnresolvedReason),
}

impl ResolvedValue {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unresolved(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Stringification used when splicing a value into an interpolated
    /// string.
    fn to_display(&self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s.clone()),
            Self::Int(n) => Some(n.to_string()),
            Self::Float(x) => Some(x.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::List(_) | Self::Unresolved(_) => None,
        }
    }
}

/// Why a reference failed to resolve. Carried as data, with a distinct tag
/// for cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// No definition found anywhere in the chain.
    NotFound { reference: SmolStr },
    /// The reference participates in a cycle.
    Circular { reference: SmolStr },
    /// The element exists but has no single value (e.g. a zero-argument
    /// method call).
    NotAValue,
}

/// Lookup chain for one resolution: the owning file plus the block scope
/// the reference appears in. Cheap to build; recomputed per resolution.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext<'a> {
    pub ctx: &'a BuildModelContext,
    pub file: FileId,
    pub scope: ElementId,
}

impl<'a> ResolutionContext<'a> {
    /// Chain rooted at the block enclosing `element`.
    pub fn for_element(ctx: &'a BuildModelContext, file: FileId, element: ElementId) -> Self {
        let tree = &ctx.file(file).tree;
        let scope = enclosing_block(tree, element);
        Self { ctx, file, scope }
    }

    /// Chain rooted at the file's top level.
    pub fn at_root(ctx: &'a BuildModelContext, file: FileId) -> Self {
        let scope = ctx.file(file).tree.root();
        Self { ctx, file, scope }
    }
}

/// Resolves the expression element `id` in `rctx`.
pub fn resolve(rctx: ResolutionContext<'_>, id: ElementId) -> ResolvedValue {
    let mut guard = Guard::default();
    resolve_element(rctx, id, &mut guard)
}

/// Resolves the reference `name` as if it appeared in `rctx`'s scope.
pub fn resolve_reference(rctx: ResolutionContext<'_>, name: &str) -> ResolvedValue {
    let mut guard = Guard::default();
    lookup(rctx, name, &mut guard)
}

#[derive(Default)]
struct Guard {
    visited: FxHashSet<(FileId, SmolStr)>,
    depth: usize,
}

fn resolve_element(rctx: ResolutionContext<'_>, id: ElementId, guard: &mut Guard) -> ResolvedValue {
    if guard.depth >= MAX_RESOLVE_DEPTH {
        return ResolvedValue::Unresolved(UnresolvedReason::Circular {
            reference: SmolStr::new("<depth limit>"),
        });
    }
    guard.depth += 1;
    let result = resolve_element_inner(rctx, id, guard);
    guard.depth -= 1;
    result
}

fn resolve_element_inner(
    rctx: ResolutionContext<'_>,
    id: ElementId,
    guard: &mut Guard,
) -> ResolvedValue {
    let tree = &rctx.ctx.file(rctx.file).tree;
    let Some(expr) = tree.get(id).as_expr() else {
        return ResolvedValue::Unresolved(UnresolvedReason::NotAValue);
    };
    // Re-root the scope at the element itself so nested expressions look up
    // from the block they appear in.
    let rctx = ResolutionContext {
        scope: enclosing_block(tree, id),
        ..rctx
    };
    match &expr.value {
        ExprValue::Literal(lit) => literal(lit),
        ExprValue::Reference(name) => lookup(rctx, name, guard),
        ExprValue::List(items) => ResolvedValue::List(
            items
                .iter()
                .filter(|&&item| tree.get(item).is_live())
                .map(|&item| resolve_element(rctx, item, guard))
                .collect(),
        ),
        ExprValue::Interpolated(segments) => interpolate(rctx, segments, guard),
        ExprValue::Call { args, .. } => match args.as_slice() {
            [] => ResolvedValue::Unresolved(UnresolvedReason::NotAValue),
            [single] => resolve_element(rctx, *single, guard),
            many => ResolvedValue::List(
                many.iter()
                    .map(|&arg| resolve_element(rctx, arg, guard))
                    .collect(),
            ),
        },
    }
}

fn literal(lit: &LiteralValue) -> ResolvedValue {
    match lit {
        LiteralValue::Str(s) => ResolvedValue::Str(s.clone()),
        LiteralValue::Int(n) => ResolvedValue::Int(*n),
        LiteralValue::Float(x) => ResolvedValue::Float(*x),
        LiteralValue::Bool(b) => ResolvedValue::Bool(*b),
    }
}

fn interpolate(
    rctx: ResolutionContext<'_>,
    segments: &[Segment],
    guard: &mut Guard,
) -> ResolvedValue {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Text(t) => out.push_str(t),
            Segment::Reference(name) => match lookup(rctx, name, guard) {
                ResolvedValue::Unresolved(reason) => {
                    return ResolvedValue::Unresolved(reason);
                }
                value => match value.to_display() {
                    Some(s) => out.push_str(&s),
                    None => {
                        return ResolvedValue::Unresolved(UnresolvedReason::NotAValue);
                    }
                },
            },
        }
    }
    ResolvedValue::Str(out)
}

/// Walks the full resolution chain for `name`. First match wins.
fn lookup(rctx: ResolutionContext<'_>, name: &str, guard: &mut Guard) -> ResolvedValue {
    // `rootProject.x` jumps straight to the session root file.
    if let Some(rest) = name.strip_prefix("rootProject.") {
        if let Some(root) = rctx.ctx.root_project_file() {
            return lookup(ResolutionContext::at_root(rctx.ctx, root), rest, guard);
        }
        return ResolvedValue::Unresolved(UnresolvedReason::NotFound {
            reference: SmolStr::new(name),
        });
    }
    let key = scope_key(name);

    let visit = (rctx.file, SmolStr::new(key));
    if !guard.visited.insert(visit) {
        debug!(reference = key, "circular reference detected");
        return ResolvedValue::Unresolved(UnresolvedReason::Circular {
            reference: SmolStr::new(key),
        });
    }
    let result = lookup_chain(rctx, key, guard);
    guard.visited.remove(&(rctx.file, SmolStr::new(key)));
    if !result.is_resolved() {
        debug!(reference = key, file = rctx.file.index(), "reference did not resolve");
    }
    result
}

fn lookup_chain(rctx: ResolutionContext<'_>, key: &str, guard: &mut Guard) -> ResolvedValue {
    let file = rctx.ctx.file(rctx.file);
    let tree = &file.tree;

    // 1. Block scopes, innermost out. Definitions may be spelled with an
    //    `ext.` prefix; compare both sides stripped.
    let mut scope = Some(rctx.scope);
    while let Some(block) = scope {
        if let Some(found) = find_definition(tree, block, key) {
            return resolve_element(rctx, found, guard);
        }
        scope = tree.get(block).parent.map(|p| enclosing_block(tree, p));
    }

    // 2. The root `ext` block.
    if let Some(ext) = tree.find_child_block(tree.root(), "ext") {
        if let Some(found) = find_definition(tree, ext, key) {
            return resolve_element(rctx, found, guard);
        }
    }

    // 3. Sibling properties file.
    if let Some(props) = file.properties {
        if let Some(raw) = rctx.ctx.properties_file(props).get(key) {
            return properties_value(raw);
        }
    }

    // 4. Parent-module build file: its root scope, then its own properties.
    if let Some(parent) = file.parent_module {
        let parent_rctx = ResolutionContext::at_root(rctx.ctx, parent);
        let result = lookup_chain(parent_rctx, key, guard);
        if result.is_resolved() {
            return result;
        }
    }

    // 5. Injected globals.
    if let Some(raw) = rctx.ctx.global_property(key) {
        return properties_value(raw);
    }

    ResolvedValue::Unresolved(UnresolvedReason::NotFound {
        reference: SmolStr::new(key),
    })
}

/// A definition for `key` directly inside `block`: the last live expression
/// child whose stripped name matches.
fn find_definition(tree: &ElementTree, block: ElementId, key: &str) -> Option<ElementId> {
    tree.children(block)
        .into_iter()
        .filter(|&c| {
            let el = tree.get(c);
            el.is_live() && el.as_expr().is_some() && scope_key(el.name.as_str()) == key
        })
        .next_back()
}

/// Strips scope qualifiers that mean "this file": `ext.` and `project.`.
fn scope_key(name: &str) -> &str {
    let name = name.strip_prefix("project.").unwrap_or(name);
    name.strip_prefix("ext.").unwrap_or(name)
}

/// Properties-file values are untyped text; give them the same scalar
/// typing a literal would get.
fn properties_value(raw: &str) -> ResolvedValue {
    if let Ok(n) = raw.parse::<i64>() {
        return ResolvedValue::Int(n);
    }
    match raw {
        "true" => ResolvedValue::Bool(true),
        "false" => ResolvedValue::Bool(false),
        _ => ResolvedValue::Str(raw.to_string()),
    }
}

/// Nearest block-like ancestor of `id` (or `id` itself when block-like).
fn enclosing_block(tree: &ElementTree, id: ElementId) -> ElementId {
    let mut current = id;
    loop {
        let element: &Element = tree.get(current);
        if element.is_block_like() {
            return current;
        }
        match element.parent {
            Some(parent) => current = parent,
            None => return tree.root(),
        }
    }
}
