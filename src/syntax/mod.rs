//! Lossless syntax tree for the build-script DSL
//!
//! This module provides the syntax collaborator the rest of the crate
//! consumes:
//! - **logos** for fast lexing
//! - **rowan** for the CST (Concrete Syntax Tree)
//!
//! We build a lossless CST that preserves all whitespace and comments, then
//! expose a typed AST layer on top.
//!
//! ```text
//! Source Text
//!     ↓
//! Lexer (logos) → Tokens with SyntaxKind
//!     ↓
//! Parser → GreenNode tree (immutable, cheap to clone)
//!     ↓
//! SyntaxNode (rowan) → CST with parent pointers
//!     ↓
//! AST layer → Typed wrappers over SyntaxNode
//!     ↓
//! Element tree → Mutable DSL model
//! ```
//!
//! Losslessness is load-bearing: write-back computes text edits against
//! token offsets taken from this tree, so `syntax().text()` must equal the
//! input byte-for-byte.

pub mod ast;
mod lexer;
mod parser;
mod syntax_kind;

pub use lexer::{Lexer, Token, tokenize};
pub use parser::{Parse, ParseError, parse};
pub use syntax_kind::{DslLanguage, SyntaxElement, SyntaxKind, SyntaxNode, SyntaxToken};

/// Re-export position types for convenience
pub use text_size::{TextRange, TextSize};
