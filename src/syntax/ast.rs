//! Typed AST wrappers over the untyped rowan CST.
//!
//! Each struct wraps a [`SyntaxNode`] and provides methods to access its
//! children. The element tree builder consumes only this surface, so the
//! CST itself stays an opaque, position-addressable dependency.

use super::syntax_kind::SyntaxKind;
use super::{SyntaxNode, SyntaxToken};
use text_size::TextRange;

/// Trait for AST nodes that wrap a SyntaxNode
pub trait AstNode: Sized {
    fn can_cast(kind: SyntaxKind) -> bool;
    fn cast(node: SyntaxNode) -> Option<Self>;
    fn syntax(&self) -> &SyntaxNode;

    fn range(&self) -> TextRange {
        self.syntax().text_range()
    }
}

// ============================================================================
// Helper macro
// ============================================================================

macro_rules! ast_node {
    ($name:ident, $kind:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(SyntaxNode);

        impl AstNode for $name {
            fn can_cast(kind: SyntaxKind) -> bool {
                kind == SyntaxKind::$kind
            }

            fn cast(node: SyntaxNode) -> Option<Self> {
                if Self::can_cast(node.kind()) {
                    Some(Self(node))
                } else {
                    None
                }
            }

            fn syntax(&self) -> &SyntaxNode {
                &self.0
            }
        }
    };
}

// ============================================================================
// Root
// ============================================================================

ast_node!(SourceFile, ROOT);

impl SourceFile {
    pub fn statements(&self) -> impl Iterator<Item = Statement> + '_ {
        self.0.children().filter_map(Statement::cast)
    }
}

// ============================================================================
// Statements
// ============================================================================

/// Any statement in a file or block body
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Statement {
    Block(Block),
    Assignment(Assignment),
    MethodCall(MethodCall),
}

impl Statement {
    pub fn cast(node: SyntaxNode) -> Option<Self> {
        match node.kind() {
            SyntaxKind::BLOCK => Block::cast(node).map(Self::Block),
            SyntaxKind::ASSIGNMENT => Assignment::cast(node).map(Self::Assignment),
            SyntaxKind::METHOD_CALL => MethodCall::cast(node).map(Self::MethodCall),
            _ => None,
        }
    }

    pub fn syntax(&self) -> &SyntaxNode {
        match self {
            Self::Block(n) => n.syntax(),
            Self::Assignment(n) => n.syntax(),
            Self::MethodCall(n) => n.syntax(),
        }
    }

    pub fn name(&self) -> Option<Name> {
        self.syntax().children().find_map(Name::cast)
    }
}

ast_node!(Block, BLOCK);

impl Block {
    pub fn name(&self) -> Option<Name> {
        self.0.children().find_map(Name::cast)
    }

    pub fn body(&self) -> Option<BlockBody> {
        self.0.children().find_map(BlockBody::cast)
    }
}

ast_node!(BlockBody, BLOCK_BODY);

impl BlockBody {
    pub fn statements(&self) -> impl Iterator<Item = Statement> + '_ {
        self.0.children().filter_map(Statement::cast)
    }

    /// The closing `}` token, the insertion point for new children.
    pub fn close_brace(&self) -> Option<SyntaxToken> {
        self.0
            .children_with_tokens()
            .filter_map(|e| e.into_token())
            .find(|t| t.kind() == SyntaxKind::R_BRACE)
    }
}

ast_node!(Assignment, ASSIGNMENT);

impl Assignment {
    pub fn name(&self) -> Option<Name> {
        self.0.children().find_map(Name::cast)
    }

    pub fn value(&self) -> Option<Expr> {
        self.0.children().find_map(Expr::cast)
    }
}

ast_node!(MethodCall, METHOD_CALL);

impl MethodCall {
    pub fn name(&self) -> Option<Name> {
        self.0.children().find_map(Name::cast)
    }

    pub fn arg_list(&self) -> Option<ArgList> {
        self.0.children().find_map(ArgList::cast)
    }

    /// Trailing configuration block, as in `someTask(x) { ... }`.
    pub fn body(&self) -> Option<BlockBody> {
        self.0.children().find_map(BlockBody::cast)
    }
}

ast_node!(ArgList, ARG_LIST);

impl ArgList {
    pub fn args(&self) -> impl Iterator<Item = Arg> + '_ {
        self.0.children().filter_map(Arg::cast)
    }

    /// Range covering the arguments themselves, excluding parentheses.
    ///
    /// Used by write-back to rewrite a call's arguments in place. `None`
    /// when the list has no arguments.
    pub fn args_range(&self) -> Option<TextRange> {
        let args: Vec<_> = self.args().collect();
        let first = args.first()?.syntax().text_range();
        let last = args.last()?.syntax().text_range();
        Some(TextRange::new(first.start(), last.end()))
    }
}

/// A single call argument: a named `key: value` pair or a plain expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Arg {
    Pair(Pair),
    Expr(Expr),
}

impl Arg {
    pub fn cast(node: SyntaxNode) -> Option<Self> {
        if node.kind() == SyntaxKind::PAIR {
            Pair::cast(node).map(Self::Pair)
        } else {
            Expr::cast(node).map(Self::Expr)
        }
    }

    pub fn syntax(&self) -> &SyntaxNode {
        match self {
            Self::Pair(n) => n.syntax(),
            Self::Expr(n) => n.syntax(),
        }
    }
}

ast_node!(Pair, PAIR);

impl Pair {
    pub fn key(&self) -> Option<SyntaxToken> {
        self.0
            .children_with_tokens()
            .filter_map(|e| e.into_token())
            .find(|t| matches!(t.kind(), SyntaxKind::IDENT | SyntaxKind::STRING))
    }

    pub fn value(&self) -> Option<Expr> {
        self.0.children().find_map(Expr::cast)
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// Any expression usable as a value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Literal(Literal),
    Reference(Reference),
    List(ListExpr),
    Call(MethodCall),
}

impl Expr {
    pub fn cast(node: SyntaxNode) -> Option<Self> {
        match node.kind() {
            SyntaxKind::LITERAL => Literal::cast(node).map(Self::Literal),
            SyntaxKind::REFERENCE => Reference::cast(node).map(Self::Reference),
            SyntaxKind::LIST_EXPR => ListExpr::cast(node).map(Self::List),
            SyntaxKind::METHOD_CALL => MethodCall::cast(node).map(Self::Call),
            _ => None,
        }
    }

    pub fn syntax(&self) -> &SyntaxNode {
        match self {
            Self::Literal(n) => n.syntax(),
            Self::Reference(n) => n.syntax(),
            Self::List(n) => n.syntax(),
            Self::Call(n) => n.syntax(),
        }
    }

    pub fn range(&self) -> TextRange {
        self.syntax().text_range()
    }
}

ast_node!(Literal, LITERAL);

impl Literal {
    pub fn token(&self) -> Option<SyntaxToken> {
        self.0
            .children_with_tokens()
            .filter_map(|e| e.into_token())
            .find(|t| !t.kind().is_trivia())
    }
}

ast_node!(Reference, REFERENCE);

impl Reference {
    /// The dotted path text, with inner trivia stripped.
    pub fn path(&self) -> String {
        let mut out = String::new();
        for element in self.0.descendants_with_tokens() {
            if let Some(token) = element.into_token() {
                if !token.kind().is_trivia() {
                    out.push_str(token.text());
                }
            }
        }
        out
    }
}

ast_node!(ListExpr, LIST_EXPR);

impl ListExpr {
    pub fn elements(&self) -> impl Iterator<Item = Expr> + '_ {
        self.0.children().filter_map(Expr::cast)
    }
}

ast_node!(Name, NAME);

impl Name {
    /// The name text as written, with inner trivia stripped.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for element in self.0.children_with_tokens() {
            if let Some(token) = element.into_token() {
                if !token.kind().is_trivia() {
                    out.push_str(token.text());
                }
            }
        }
        out
    }
}
