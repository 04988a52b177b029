//! Syntax kinds for the Rowan-based CST
//!
//! This enum defines all possible node and token kinds in the syntax tree
//! for the Gradle-style block/property DSL.

/// All syntax kinds (tokens and nodes) in the build-script DSL
///
/// Tokens are leaf nodes (identifiers, literals, punctuation).
/// Nodes are composite (blocks, assignments, method calls).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
#[allow(non_camel_case_types)]
pub enum SyntaxKind {
    // =========================================================================
    // TRIVIA (preserved but not semantically meaningful)
    // =========================================================================
    WHITESPACE = 0, // spaces and tabs
    NEWLINE,        // \n or \r\n (statement separator, still trivia in the tree)
    LINE_COMMENT,   // // ...
    BLOCK_COMMENT,  // /* ... */

    // =========================================================================
    // LITERALS
    // =========================================================================
    IDENT,   // identifier
    INTEGER, // 42
    DECIMAL, // 3.14
    STRING,  // "hello" or 'hello'
    TRUE_KW, // true
    FALSE_KW, // false

    // =========================================================================
    // PUNCTUATION
    // =========================================================================
    L_BRACE,   // {
    R_BRACE,   // }
    L_BRACKET, // [
    R_BRACKET, // ]
    L_PAREN,   // (
    R_PAREN,   // )
    COMMA,     // ,
    DOT,       // .
    EQ,        // =
    COLON,     // :
    SEMICOLON, // ;

    // =========================================================================
    // NODES (composite syntax tree nodes)
    // =========================================================================
    ROOT,        // whole file
    BLOCK,       // name { ... }
    BLOCK_BODY,  // { ... }
    ASSIGNMENT,  // name = expr
    METHOD_CALL, // name(args) or name arg, arg
    ARG_LIST,    // argument list of a method call
    NAME,        // statement name, possibly dotted or quoted
    LITERAL,     // scalar literal value
    REFERENCE,   // identifier path used as a value
    LIST_EXPR,   // [a, b, c]
    PAIR,        // key: value named argument
    ERROR,       // error recovery node/token

    #[doc(hidden)]
    __LAST,
}

impl SyntaxKind {
    /// Whether this kind is trivia (whitespace or comments).
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            SyntaxKind::WHITESPACE
                | SyntaxKind::NEWLINE
                | SyntaxKind::LINE_COMMENT
                | SyntaxKind::BLOCK_COMMENT
        )
    }
}

impl From<SyntaxKind> for rowan::SyntaxKind {
    fn from(kind: SyntaxKind) -> Self {
        Self(kind as u16)
    }
}

impl From<rowan::SyntaxKind> for SyntaxKind {
    fn from(raw: rowan::SyntaxKind) -> Self {
        assert!(raw.0 < SyntaxKind::__LAST as u16);
        // Safety: repr(u16) with contiguous discriminants, checked above.
        unsafe { std::mem::transmute::<u16, SyntaxKind>(raw.0) }
    }
}

/// Language definition for Rowan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DslLanguage {}

impl rowan::Language for DslLanguage {
    type Kind = SyntaxKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        raw.into()
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        kind.into()
    }
}

/// Type aliases for convenience
pub type SyntaxNode = rowan::SyntaxNode<DslLanguage>;
pub type SyntaxToken = rowan::SyntaxToken<DslLanguage>;
pub type SyntaxElement = rowan::SyntaxElement<DslLanguage>;
