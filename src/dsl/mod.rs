//! The mutable DSL element tree
//!
//! This is the model layer between the lossless CST and consumers: a tree of
//! typed elements (blocks, map blocks, expressions) with per-element edit
//! state. The tree is arena-backed: one [`ElementTree`] per file owns every
//! [`Element`], and elements refer to each other by [`ElementId`] handles,
//! including the upward parent link.
//!
//! Elements record where they came from in the CST through an [`Anchor`]
//! (byte ranges into the file snapshot). Elements created in memory have no
//! anchor until write-back assigns them one.

mod build;
mod tree;

pub use build::{BlockKind, build_tree};
pub use tree::ElementTree;

use crate::base::DslName;
use crate::syntax::{TextRange, TextSize};
use indexmap::IndexMap;
use smol_str::SmolStr;

/// Handle to an element within one file's [`ElementTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub(crate) u32);

impl ElementId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Edit state of one element.
///
/// Transitions only move forward within one edit cycle:
/// `Parsed`/`Added` → `Modified` → `Applied`, or any → `Removed`. A
/// successful write-back resets surviving elements to `Parsed` with fresh
/// anchors and detaches `Removed` ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElementState {
    /// Built straight from parsed source, unmodified.
    #[default]
    Parsed,
    /// Created in memory, not yet present in the text.
    Added,
    /// Value changed since parse.
    Modified,
    /// Marked for deletion; stays in the tree until write-back.
    Removed,
    /// Transient state while a write-back is committing.
    Applied,
}

/// Where an element lives in the underlying text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Span of the whole statement, excluding surrounding trivia.
    pub statement: TextRange,
    /// Span of just the value (assignment right-hand side, call arguments,
    /// or a list element's own text). `None` for blocks.
    pub value: Option<TextRange>,
    /// Offset of the closing `}` for block elements, the insertion point
    /// for new children.
    pub body_close: Option<TextSize>,
}

/// One node of the element tree.
#[derive(Debug, Clone)]
pub struct Element {
    pub name: DslName,
    pub parent: Option<ElementId>,
    pub anchor: Option<Anchor>,
    pub state: ElementState,
    pub payload: ElementPayload,
}

/// The typed payload of an element.
#[derive(Debug, Clone)]
pub enum ElementPayload {
    /// Ordered children; duplicate names allowed.
    Block(BlockElement),
    /// Uniquely-keyed named entries (e.g. `signingConfigs`); insertion order
    /// preserved for enumeration and write-back.
    Map(MapElement),
    /// A leaf or composite value.
    Expr(ExprElement),
}

#[derive(Debug, Clone)]
pub struct BlockElement {
    pub kind: BlockKind,
    pub children: Vec<ElementId>,
}

#[derive(Debug, Clone)]
pub struct MapElement {
    pub kind: BlockKind,
    pub entries: IndexMap<SmolStr, ElementId>,
}

/// How an expression statement was written, which also decides how a new
/// one is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprStyle {
    /// `name = value`
    Assignment,
    /// `name value, value` or `name(value)`
    Call,
    /// Nested inside a composite value (list element, call argument).
    Nested,
}

#[derive(Debug, Clone)]
pub struct ExprElement {
    pub style: ExprStyle,
    pub value: ExprValue,
}

/// The value of an expression element. Distinguishing the kind matters:
/// resolution and write-back differ per kind.
#[derive(Debug, Clone)]
pub enum ExprValue {
    Literal(LiteralValue),
    /// Symbolic reference to a property elsewhere in scope.
    Reference(SmolStr),
    /// Double-quoted string with `$var` / `${var}` segments.
    Interpolated(Vec<Segment>),
    /// Ordered element-wise composite.
    List(Vec<ElementId>),
    /// Method-call composite. `callee` is set for calls in value position
    /// (`file('x')`); statement-level calls carry their name as the
    /// element name instead.
    Call {
        callee: Option<SmolStr>,
        args: Vec<ElementId>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl LiteralValue {
    /// Renders the literal as DSL source text. Strings use single quotes,
    /// the style Gradle scripts conventionally use for plain values.
    pub fn render(&self) -> String {
        match self {
            Self::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Self::Int(n) => n.to_string(),
            Self::Float(x) => {
                if x.fract() == 0.0 {
                    format!("{x:.1}")
                } else {
                    x.to_string()
                }
            }
            Self::Bool(b) => b.to_string(),
        }
    }
}

/// One piece of an interpolated string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Reference(SmolStr),
}

/// Filter for [`ElementTree::property_elements`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKindFilter {
    Any,
    Blocks,
    Expressions,
}

impl Element {
    pub fn is_block_like(&self) -> bool {
        matches!(
            self.payload,
            ElementPayload::Block(_) | ElementPayload::Map(_)
        )
    }

    pub fn as_expr(&self) -> Option<&ExprElement> {
        match &self.payload {
            ElementPayload::Expr(e) => Some(e),
            _ => None,
        }
    }

    pub fn block_kind(&self) -> Option<BlockKind> {
        match &self.payload {
            ElementPayload::Block(b) => Some(b.kind),
            ElementPayload::Map(m) => Some(m.kind),
            ElementPayload::Expr(_) => None,
        }
    }

    /// Whether the element still participates in lookups and write-back
    /// output.
    pub fn is_live(&self) -> bool {
        self.state != ElementState::Removed
    }
}
