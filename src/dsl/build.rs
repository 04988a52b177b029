//! CST → element tree construction.
//!
//! A recursive descent over the typed AST registers each statement as an
//! element. Well-known block names get a specific [`BlockKind`]; everything
//! else becomes a generic block or expression, preserved opaquely so
//! round-trip fidelity holds for unsupported DSL surface.
//!
//! Per-block parsing quirks live in a dispatch table keyed by
//! (parent block kind, child name) rather than in an inheritance chain:
//! the table entry overrides the generic "append as child" default.

use super::{
    Anchor, BlockElement, Element, ElementId, ElementPayload, ElementState, ElementTree,
    ExprElement, ExprStyle, ExprValue, LiteralValue, MapElement, Segment,
};
use crate::base::DslName;
use crate::syntax::ast::{self, Arg, AstNode, Expr, Statement};
use crate::syntax::{SyntaxKind, TextRange};
use indexmap::IndexMap;
use smol_str::SmolStr;

/// Classification of well-known blocks. Drives map-vs-block payloads and
/// the parsed-element dispatch hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// The file itself.
    Root,
    Android,
    Buildscript,
    DefaultConfig,
    Dependencies,
    Ext,
    Repositories,
    /// Map blocks: uniquely-named entries.
    BuildTypes,
    Configurations,
    ProductFlavors,
    SigningConfigs,
    SourceSets,
    /// Blocks with list-coercion hooks.
    AdbOptions,
    DexOptions,
    /// Anything unrecognized.
    Generic,
}

impl BlockKind {
    /// Whether children are uniquely keyed by name.
    fn is_map(self) -> bool {
        matches!(
            self,
            Self::BuildTypes
                | Self::Configurations
                | Self::ProductFlavors
                | Self::SigningConfigs
                | Self::SourceSets
        )
    }
}

/// Block classification table: (allowed parent, name) → kind. A `None`
/// parent entry matches any parent.
const BLOCK_KINDS: &[(Option<BlockKind>, &str, BlockKind)] = &[
    (None, "android", BlockKind::Android),
    (None, "buildscript", BlockKind::Buildscript),
    (None, "dependencies", BlockKind::Dependencies),
    (None, "repositories", BlockKind::Repositories),
    (None, "ext", BlockKind::Ext),
    (None, "configurations", BlockKind::Configurations),
    (Some(BlockKind::Android), "defaultConfig", BlockKind::DefaultConfig),
    (Some(BlockKind::Android), "buildTypes", BlockKind::BuildTypes),
    (Some(BlockKind::Android), "productFlavors", BlockKind::ProductFlavors),
    (Some(BlockKind::Android), "signingConfigs", BlockKind::SigningConfigs),
    (Some(BlockKind::Android), "sourceSets", BlockKind::SourceSets),
    (Some(BlockKind::Android), "dexOptions", BlockKind::DexOptions),
    (Some(BlockKind::Android), "adbOptions", BlockKind::AdbOptions),
];

fn classify_block(parent: BlockKind, name: &str) -> BlockKind {
    BLOCK_KINDS
        .iter()
        .find(|(p, n, _)| *n == name && (p.is_none() || *p == Some(parent)))
        .map(|(_, _, kind)| *kind)
        .unwrap_or(BlockKind::Generic)
}

// =============================================================================
// Parsed-element dispatch hooks
// =============================================================================

type ParsedElementHook = fn(&mut ElementTree, ElementId, ElementId);

/// Overrides for `add_parsed_element`, keyed by (parent kind, child name).
/// Unregistered names fall through to the generic append.
const PARSED_ELEMENT_HOOKS: &[(BlockKind, &str, ParsedElementHook)] = &[
    (BlockKind::DexOptions, "additionalParameters", coerce_to_list),
    (BlockKind::AdbOptions, "installOptions", coerce_to_list),
];

pub(super) fn run_parsed_element_hook(
    tree: &mut ElementTree,
    parent: ElementId,
    child: ElementId,
) {
    let Some(parent_kind) = tree.get(parent).block_kind() else {
        return;
    };
    let hook = PARSED_ELEMENT_HOOKS
        .iter()
        .find(|(kind, name, _)| *kind == parent_kind && tree.get(child).name.matches(name))
        .map(|(_, _, hook)| *hook);
    if let Some(hook) = hook {
        hook(tree, parent, child);
    }
}

/// Coerces a scalar expression into a single-element list, so properties
/// like `additionalParameters` always read as lists regardless of how the
/// script spelled them.
fn coerce_to_list(tree: &mut ElementTree, _parent: ElementId, child: ElementId) {
    let Some(expr) = tree.get(child).as_expr() else {
        return;
    };
    match &expr.value {
        ExprValue::List(_) => {}
        // `additionalParameters '--a', '--b'` - the call arguments are
        // already the list items.
        ExprValue::Call { args, .. } => {
            let items = args.clone();
            tree.set_value_raw(child, ExprValue::List(items));
        }
        _ => {
            let scalar = expr.value.clone();
            let anchor = tree.get(child).anchor.clone();
            let item = tree.alloc(Element {
                name: DslName::new("0"),
                parent: Some(child),
                anchor,
                state: ElementState::Parsed,
                payload: ElementPayload::Expr(ExprElement {
                    style: ExprStyle::Nested,
                    value: scalar,
                }),
            });
            tree.set_value_raw(child, ExprValue::List(vec![item]));
        }
    }
}

impl ElementTree {
    /// Replaces a value without touching edit state. Parse-time only.
    pub(super) fn set_value_raw(&mut self, id: ElementId, value: ExprValue) {
        if let ElementPayload::Expr(expr) = &mut self.get_mut(id).payload {
            expr.value = value;
        }
    }
}

// =============================================================================
// Tree building
// =============================================================================

/// Builds the element tree for one parsed file.
pub fn build_tree(file: &ast::SourceFile) -> ElementTree {
    let mut tree = ElementTree::new();
    let root = tree.root();
    for stmt in file.statements() {
        build_statement(&mut tree, root, &stmt);
    }
    tree
}

fn build_statement(tree: &mut ElementTree, parent: ElementId, stmt: &Statement) {
    let Some(name_node) = stmt.name() else {
        return;
    };
    let name = DslName::from_source(&name_node.text());

    match stmt {
        Statement::Block(block) => {
            build_block(tree, parent, name, block.body(), block.range());
        }
        Statement::MethodCall(call) if call.body().is_some() => {
            // `name(args) { ... }` configures a block; the arguments stay
            // opaque in the text.
            build_block(tree, parent, name, call.body(), call.range());
        }
        Statement::Assignment(assign) => {
            let Some(value_ast) = assign.value() else {
                return;
            };
            let (value, children) = build_value(tree, &value_ast);
            let anchor = Anchor {
                statement: assign.range(),
                value: Some(value_ast.range()),
                body_close: None,
            };
            let id = tree.add_parsed_element(
                parent,
                Element {
                    name,
                    parent: None,
                    anchor: Some(anchor),
                    state: ElementState::Parsed,
                    payload: ElementPayload::Expr(ExprElement {
                        style: ExprStyle::Assignment,
                        value,
                    }),
                },
            );
            reparent(tree, id, &children);
        }
        Statement::MethodCall(call) => {
            let mut children = Vec::new();
            if let Some(arg_list) = call.arg_list() {
                for (index, arg) in arg_list.args().enumerate() {
                    if let Some(id) = build_arg(tree, index, &arg) {
                        children.push(id);
                    }
                }
            }
            let anchor = Anchor {
                statement: call.range(),
                value: call.arg_list().and_then(|a| a.args_range()),
                body_close: None,
            };
            let id = tree.add_parsed_element(
                parent,
                Element {
                    name,
                    parent: None,
                    anchor: Some(anchor),
                    state: ElementState::Parsed,
                    payload: ElementPayload::Expr(ExprElement {
                        style: ExprStyle::Call,
                        value: ExprValue::Call {
                            callee: None,
                            args: children.clone(),
                        },
                    }),
                },
            );
            reparent(tree, id, &children);
        }
    }
}

fn build_block(
    tree: &mut ElementTree,
    parent: ElementId,
    name: DslName,
    body: Option<ast::BlockBody>,
    range: TextRange,
) {
    let parent_kind = tree.get(parent).block_kind().unwrap_or(BlockKind::Generic);

    // Repeated invocations of a map entry merge into the existing entry
    // instead of shadowing it.
    if parent_kind.is_map() {
        if let Some(existing) = tree.find_child_block(parent, name.as_str()) {
            if let Some(body) = body {
                for stmt in body.statements() {
                    build_statement(tree, existing, &stmt);
                }
            }
            return;
        }
    }

    let kind = classify_block(parent_kind, name.as_str());
    let body_close = body
        .as_ref()
        .and_then(|b| b.close_brace())
        .map(|t| t.text_range().start());
    let payload = if kind.is_map() {
        ElementPayload::Map(MapElement {
            kind,
            entries: IndexMap::new(),
        })
    } else {
        ElementPayload::Block(BlockElement {
            kind,
            children: Vec::new(),
        })
    };
    let id = tree.add_parsed_element(
        parent,
        Element {
            name,
            parent: None,
            anchor: Some(Anchor {
                statement: range,
                value: None,
                body_close,
            }),
            state: ElementState::Parsed,
            payload,
        },
    );
    if let Some(body) = body {
        for stmt in body.statements() {
            build_statement(tree, id, &stmt);
        }
    }
}

/// Builds one call argument as a nested element. Pairs keep their key as
/// the element name; positional arguments are named by index.
fn build_arg(tree: &mut ElementTree, index: usize, arg: &Arg) -> Option<ElementId> {
    match arg {
        Arg::Pair(pair) => {
            let key = pair.key()?;
            let value = pair.value()?;
            Some(build_nested(
                tree,
                DslName::from_source(key.text()),
                &value,
                arg.syntax().text_range(),
            ))
        }
        Arg::Expr(expr) => Some(build_nested(
            tree,
            DslName::new(&index.to_string()),
            expr,
            expr.range(),
        )),
    }
}

/// Allocates an element for an expression in value position.
fn build_nested(
    tree: &mut ElementTree,
    name: DslName,
    expr: &Expr,
    range: TextRange,
) -> ElementId {
    let (value, children) = build_value(tree, expr);
    let id = tree.alloc(Element {
        name,
        parent: None,
        anchor: Some(Anchor {
            statement: range,
            value: Some(expr.range()),
            body_close: None,
        }),
        state: ElementState::Parsed,
        payload: ElementPayload::Expr(ExprElement {
            style: ExprStyle::Nested,
            value,
        }),
    });
    reparent(tree, id, &children);
    id
}

/// Converts an AST expression to an [`ExprValue`], allocating child
/// elements for composites. Returns the value and the direct children whose
/// parent link still needs to point at the enclosing element.
fn build_value(tree: &mut ElementTree, expr: &Expr) -> (ExprValue, Vec<ElementId>) {
    match expr {
        Expr::Literal(lit) => {
            let value = lit
                .token()
                .map(|t| literal_value(t.kind(), t.text()))
                .unwrap_or(ExprValue::Literal(LiteralValue::Str(String::new())));
            (value, Vec::new())
        }
        Expr::Reference(reference) => {
            (ExprValue::Reference(SmolStr::new(reference.path())), Vec::new())
        }
        Expr::List(list) => {
            let items: Vec<_> = list
                .elements()
                .enumerate()
                .map(|(i, e)| build_nested(tree, DslName::new(&i.to_string()), &e, e.range()))
                .collect();
            (ExprValue::List(items.clone()), items)
        }
        Expr::Call(call) => {
            let callee = call.name().map(|n| SmolStr::new(n.text()));
            let mut args = Vec::new();
            if let Some(arg_list) = call.arg_list() {
                for (index, arg) in arg_list.args().enumerate() {
                    if let Some(id) = build_arg(tree, index, &arg) {
                        args.push(id);
                    }
                }
            }
            (
                ExprValue::Call {
                    callee,
                    args: args.clone(),
                },
                args,
            )
        }
    }
}

fn reparent(tree: &mut ElementTree, parent: ElementId, children: &[ElementId]) {
    for &child in children {
        tree.get_mut(child).parent = Some(parent);
    }
}

// =============================================================================
// Literals and interpolation
// =============================================================================

fn literal_value(kind: SyntaxKind, text: &str) -> ExprValue {
    match kind {
        SyntaxKind::INTEGER => match text.parse::<i64>() {
            Ok(n) => ExprValue::Literal(LiteralValue::Int(n)),
            Err(_) => ExprValue::Literal(LiteralValue::Str(text.to_string())),
        },
        SyntaxKind::DECIMAL => match text.parse::<f64>() {
            Ok(x) => ExprValue::Literal(LiteralValue::Float(x)),
            Err(_) => ExprValue::Literal(LiteralValue::Str(text.to_string())),
        },
        SyntaxKind::TRUE_KW => ExprValue::Literal(LiteralValue::Bool(true)),
        SyntaxKind::FALSE_KW => ExprValue::Literal(LiteralValue::Bool(false)),
        SyntaxKind::STRING => string_value(text),
        _ => ExprValue::Literal(LiteralValue::Str(text.to_string())),
    }
}

/// Classifies a string token: plain literal or interpolated GString.
/// Single-quoted strings never interpolate, and interpolation always
/// yields a string on resolution, even for a lone `"$ref"` - so a
/// single-reference string stays `Interpolated` rather than collapsing
/// into a bare reference.
fn string_value(text: &str) -> ExprValue {
    let double_quoted = text.starts_with('"');
    let inner = quote_stripped(text);
    if !double_quoted {
        return ExprValue::Literal(LiteralValue::Str(unescape(inner)));
    }

    // Interpolation is scanned on the raw text, before escape resolution:
    // an escaped `\$` must stay a plain dollar, never a reference.
    let segments = interpolation_segments(inner);
    if segments.iter().any(|s| matches!(s, Segment::Reference(_))) {
        ExprValue::Interpolated(segments)
    } else {
        // No references: at most one accumulated text segment survives.
        let cooked = match segments.into_iter().next() {
            Some(Segment::Text(t)) => t,
            _ => String::new(),
        };
        ExprValue::Literal(LiteralValue::Str(cooked))
    }
}

fn quote_stripped(text: &str) -> &str {
    match text.as_bytes() {
        [b'"', .., b'"'] | [b'\'', .., b'\''] if text.len() >= 2 => &text[1..text.len() - 1],
        _ => text,
    }
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(esc) => out.push(esc),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits a raw (still escaped) double-quoted string body into text and
/// reference segments. Escapes resolve into the text segments here.
fn interpolation_segments(inner: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut chars = inner.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => text.push('\n'),
                Some('t') => text.push('\t'),
                Some(esc) => text.push(esc),
                None => text.push('\\'),
            }
            continue;
        }
        if c != '$' {
            text.push(c);
            continue;
        }
        let reference = match chars.peek() {
            Some('{') => {
                chars.next();
                let mut name = String::new();
                for next in chars.by_ref() {
                    if next == '}' {
                        break;
                    }
                    name.push(next);
                }
                name
            }
            Some(c) if c.is_alphanumeric() || *c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                name
            }
            _ => {
                text.push('$');
                continue;
            }
        };
        if !text.is_empty() {
            segments.push(Segment::Text(std::mem::take(&mut text)));
        }
        segments.push(Segment::Reference(SmolStr::new(reference)));
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    segments
}
