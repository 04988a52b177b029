//! Recursive descent parser for the build-script DSL
//!
//! Builds a rowan GreenNode tree from tokens. Supports error recovery and
//! produces a lossless CST: the tree's text is byte-identical to the input.
//!
//! Grammar (statements are newline- or semicolon-terminated):
//!
//! ```text
//! root       := statement*
//! statement  := name '=' expr            (assignment)
//!             | name '{' statement* '}'  (block)
//!             | name '(' args ')'        (method call)
//!             | name args                (method call, command form)
//! name       := (IDENT | STRING) ('.' (IDENT | STRING))*
//! args       := arg (',' arg)*
//! arg        := (IDENT | STRING) ':' expr | expr
//! expr       := literal | list | reference | call
//! ```

use super::lexer::{Lexer, Token};
use super::syntax_kind::SyntaxKind;
use rowan::{GreenNode, GreenNodeBuilder};
use text_size::{TextRange, TextSize};

/// Parse result containing the green tree and any errors
#[derive(Debug, Clone)]
pub struct Parse {
    pub green: GreenNode,
    pub errors: Vec<ParseError>,
}

impl Parse {
    pub fn syntax(&self) -> super::SyntaxNode {
        super::SyntaxNode::new_root(self.green.clone())
    }

    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A syntax error with location and message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub range: TextRange,
}

impl ParseError {
    pub fn new(message: impl Into<String>, range: TextRange) -> Self {
        Self {
            message: message.into(),
            range,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.range, self.message)
    }
}

/// Parse build-script source into a lossless CST
pub fn parse(input: &str) -> Parse {
    let tokens: Vec<_> = Lexer::new(input).collect();
    let mut parser = Parser::new(&tokens, input.len());
    parser.parse_root();
    parser.finish()
}

/// The parser state
struct Parser<'a> {
    tokens: &'a [Token<'a>],
    pos: usize,
    input_len: usize,
    builder: GreenNodeBuilder<'static>,
    errors: Vec<ParseError>,
}

const NAME_START: &[SyntaxKind] = &[SyntaxKind::IDENT, SyntaxKind::STRING];

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token<'a>], input_len: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            input_len,
            builder: GreenNodeBuilder::new(),
            errors: Vec::new(),
        }
    }

    fn finish(self) -> Parse {
        Parse {
            green: self.builder.finish(),
            errors: self.errors,
        }
    }

    // === Token inspection ===

    fn current(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    /// Kind of the next significant token, skipping all trivia.
    fn peek(&self) -> Option<SyntaxKind> {
        self.tokens[self.pos..]
            .iter()
            .map(|t| t.kind)
            .find(|k| !k.is_trivia())
    }

    /// Kind of the next significant token on the current line; newlines and
    /// semicolons end the line.
    fn peek_on_line(&self) -> Option<SyntaxKind> {
        for token in &self.tokens[self.pos..] {
            match token.kind {
                SyntaxKind::WHITESPACE | SyntaxKind::LINE_COMMENT | SyntaxKind::BLOCK_COMMENT => {}
                SyntaxKind::NEWLINE | SyntaxKind::SEMICOLON => return None,
                kind => return Some(kind),
            }
        }
        None
    }

    fn at(&self, kind: SyntaxKind) -> bool {
        self.peek() == Some(kind)
    }

    fn current_range(&self) -> TextRange {
        match self.current() {
            Some(t) => TextRange::at(t.offset, TextSize::of(t.text)),
            None => {
                let end = TextSize::new(self.input_len as u32);
                TextRange::empty(end)
            }
        }
    }

    // === Tree construction ===

    /// Adds the current token to the tree and advances.
    fn bump_raw(&mut self) {
        if let Some(token) = self.current() {
            self.builder.token(token.kind.into(), token.text);
            self.pos += 1;
        }
    }

    /// Attaches any pending trivia, then the next significant token.
    fn bump(&mut self) {
        self.eat_trivia();
        self.bump_raw();
    }

    /// Attaches pending trivia tokens at the current tree position.
    fn eat_trivia(&mut self) {
        while self.current().is_some_and(|t| t.kind.is_trivia()) {
            self.bump_raw();
        }
    }

    /// Attaches pending spaces and comments, but stops at a newline.
    fn eat_trivia_on_line(&mut self) {
        while self.current().is_some_and(|t| {
            matches!(
                t.kind,
                SyntaxKind::WHITESPACE | SyntaxKind::LINE_COMMENT | SyntaxKind::BLOCK_COMMENT
            )
        }) {
            self.bump_raw();
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        let range = self.current_range();
        self.errors.push(ParseError::new(message, range));
    }

    /// Consumes one unexpected token wrapped in an ERROR node.
    fn bump_error(&mut self) {
        self.eat_trivia();
        self.builder.start_node(SyntaxKind::ERROR.into());
        self.bump_raw();
        self.builder.finish_node();
    }

    // === Grammar ===

    fn parse_root(&mut self) {
        self.builder.start_node(SyntaxKind::ROOT.into());
        self.parse_statements(false);
        self.eat_trivia();
        self.builder.finish_node();
    }

    /// Parses statements until EOF, or until `}` when inside a block body.
    fn parse_statements(&mut self, in_block: bool) {
        loop {
            match self.peek() {
                None => break,
                Some(SyntaxKind::R_BRACE) if in_block => break,
                Some(SyntaxKind::SEMICOLON) => self.bump(),
                Some(k) if NAME_START.contains(&k) => self.parse_statement(),
                Some(_) => {
                    self.error("expected a statement");
                    self.bump_error();
                }
            }
        }
    }

    fn parse_statement(&mut self) {
        self.eat_trivia();
        let checkpoint = self.builder.checkpoint();
        self.parse_name();

        match self.peek_on_line() {
            Some(SyntaxKind::EQ) => {
                self.builder.start_node_at(checkpoint, SyntaxKind::ASSIGNMENT.into());
                self.bump(); // =
                self.eat_trivia_on_line();
                if self.peek_on_line().is_some() {
                    self.parse_expr();
                } else {
                    self.error("expected a value after `=`");
                }
                self.builder.finish_node();
            }
            Some(SyntaxKind::L_BRACE) => {
                self.builder.start_node_at(checkpoint, SyntaxKind::BLOCK.into());
                self.parse_block_body();
                self.builder.finish_node();
            }
            Some(SyntaxKind::L_PAREN) => {
                self.builder.start_node_at(checkpoint, SyntaxKind::METHOD_CALL.into());
                self.parse_paren_args();
                // A call may still open a configuration block on the same line.
                if self.peek_on_line() == Some(SyntaxKind::L_BRACE) {
                    self.parse_block_body();
                }
                self.builder.finish_node();
            }
            Some(_) => {
                self.builder.start_node_at(checkpoint, SyntaxKind::METHOD_CALL.into());
                self.parse_command_args();
                self.builder.finish_node();
            }
            None => {
                // Bare statement like `mavenCentral` - model as a call with no args.
                self.builder.start_node_at(checkpoint, SyntaxKind::METHOD_CALL.into());
                self.builder.start_node(SyntaxKind::ARG_LIST.into());
                self.builder.finish_node();
                self.builder.finish_node();
            }
        }
    }

    /// name := (IDENT | STRING) ('.' (IDENT | STRING))*
    fn parse_name(&mut self) {
        self.eat_trivia();
        self.builder.start_node(SyntaxKind::NAME.into());
        self.bump_raw(); // first segment, caller checked NAME_START
        while self.peek_on_line() == Some(SyntaxKind::DOT) {
            self.bump(); // .
            self.eat_trivia_on_line();
            if self.current().is_some_and(|t| NAME_START.contains(&t.kind)) {
                self.bump_raw();
            } else {
                self.error("expected a name segment after `.`");
                break;
            }
        }
        self.builder.finish_node();
    }

    /// { statement* }
    fn parse_block_body(&mut self) {
        self.eat_trivia_on_line();
        self.builder.start_node(SyntaxKind::BLOCK_BODY.into());
        self.bump_raw(); // {
        self.parse_statements(true);
        self.eat_trivia();
        if self.at(SyntaxKind::R_BRACE) {
            self.bump_raw();
        } else {
            self.error("expected `}`");
        }
        self.builder.finish_node();
    }

    /// ( arg, arg, ... )
    fn parse_paren_args(&mut self) {
        self.eat_trivia_on_line();
        self.builder.start_node(SyntaxKind::ARG_LIST.into());
        self.bump_raw(); // (
        loop {
            match self.peek() {
                None => {
                    self.error("expected `)`");
                    break;
                }
                Some(SyntaxKind::R_PAREN) => {
                    self.bump();
                    break;
                }
                Some(SyntaxKind::COMMA) => self.bump(),
                Some(_) => {
                    self.eat_trivia();
                    self.parse_arg();
                }
            }
        }
        self.builder.finish_node();
    }

    /// arg, arg, ...  terminated by end of line or a closing delimiter
    fn parse_command_args(&mut self) {
        self.builder.start_node(SyntaxKind::ARG_LIST.into());
        loop {
            match self.peek_on_line() {
                None => break,
                Some(
                    SyntaxKind::R_BRACE | SyntaxKind::R_PAREN | SyntaxKind::R_BRACKET,
                ) => break,
                Some(SyntaxKind::COMMA) => self.bump(),
                Some(_) => {
                    self.eat_trivia_on_line();
                    self.parse_arg();
                }
            }
        }
        self.builder.finish_node();
    }

    /// arg := key ':' expr | expr
    fn parse_arg(&mut self) {
        let is_pair = self.current().is_some_and(|t| NAME_START.contains(&t.kind))
            && self.tokens[self.pos + 1..]
                .iter()
                .find(|t| !t.kind.is_trivia())
                .is_some_and(|t| t.kind == SyntaxKind::COLON);
        if is_pair {
            self.builder.start_node(SyntaxKind::PAIR.into());
            self.bump_raw(); // key
            self.bump(); // :
            self.eat_trivia();
            self.parse_expr();
            self.builder.finish_node();
        } else {
            self.parse_expr();
        }
    }

    /// expr := literal | list | reference | call
    ///
    /// The caller has already attached leading trivia.
    fn parse_expr(&mut self) {
        match self.current().map(|t| t.kind) {
            Some(
                SyntaxKind::STRING
                | SyntaxKind::INTEGER
                | SyntaxKind::DECIMAL
                | SyntaxKind::TRUE_KW
                | SyntaxKind::FALSE_KW,
            ) => {
                self.builder.start_node(SyntaxKind::LITERAL.into());
                self.bump_raw();
                self.builder.finish_node();
            }
            Some(SyntaxKind::L_BRACKET) => self.parse_list(),
            Some(SyntaxKind::IDENT) => self.parse_reference_or_call(),
            _ => {
                self.error("expected an expression");
                self.bump_error();
            }
        }
    }

    /// [ expr, expr, ... ]
    fn parse_list(&mut self) {
        self.builder.start_node(SyntaxKind::LIST_EXPR.into());
        self.bump_raw(); // [
        loop {
            match self.peek() {
                None => {
                    self.error("expected `]`");
                    break;
                }
                Some(SyntaxKind::R_BRACKET) => {
                    self.bump();
                    break;
                }
                Some(SyntaxKind::COMMA) => self.bump(),
                Some(_) => {
                    self.eat_trivia();
                    self.parse_expr();
                }
            }
        }
        self.builder.finish_node();
    }

    /// ident ('.' ident)* optionally followed by '(' args ')'
    fn parse_reference_or_call(&mut self) {
        let checkpoint = self.builder.checkpoint();
        self.builder.start_node(SyntaxKind::NAME.into());
        self.bump_raw(); // ident
        while self.peek_on_line() == Some(SyntaxKind::DOT) {
            self.bump(); // .
            self.eat_trivia_on_line();
            if self.current().is_some_and(|t| t.kind == SyntaxKind::IDENT) {
                self.bump_raw();
            } else {
                self.error("expected a name segment after `.`");
                break;
            }
        }
        self.builder.finish_node();

        if self.peek_on_line() == Some(SyntaxKind::L_PAREN) {
            self.builder.start_node_at(checkpoint, SyntaxKind::METHOD_CALL.into());
            self.parse_paren_args();
            self.builder.finish_node();
        } else {
            self.builder.start_node_at(checkpoint, SyntaxKind::REFERENCE.into());
            self.builder.finish_node();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(input: &str) {
        let parse = parse(input);
        assert_eq!(parse.syntax().text().to_string(), input);
    }

    #[test]
    fn cst_is_lossless() {
        roundtrip("");
        roundtrip("foo { bar = 1 }\n");
        roundtrip("// leading comment\nandroid {\n    compileSdkVersion 28\n}\n");
        roundtrip("dependencies {\n    implementation 'a:b:1.0'\n    api 'c:d:2.0'\n}\n");
        roundtrip("ext.kotlin_version = '1.3.0'\napply plugin: 'kotlin'\n");
        roundtrip("list = [1, 2,\n    3]\n");
        roundtrip("storeFile file('release.keystore')\n");
    }

    #[test]
    fn assignment_parses_to_assignment_node() {
        let parse = parse("version = '1.0'\n");
        assert!(parse.ok());
        let root = parse.syntax();
        assert!(
            root.children()
                .any(|n| n.kind() == SyntaxKind::ASSIGNMENT)
        );
    }

    #[test]
    fn block_with_call_statement() {
        let parse = parse("android {\n    compileSdkVersion 28\n}\n");
        assert!(parse.ok());
        let block = parse
            .syntax()
            .children()
            .find(|n| n.kind() == SyntaxKind::BLOCK)
            .unwrap();
        let body = block
            .children()
            .find(|n| n.kind() == SyntaxKind::BLOCK_BODY)
            .unwrap();
        assert!(body.children().any(|n| n.kind() == SyntaxKind::METHOD_CALL));
    }

    #[test]
    fn malformed_input_recovers_and_stays_lossless() {
        let input = "foo = = 1\nbar = 2\n";
        let parse = parse(input);
        assert!(!parse.ok());
        assert_eq!(parse.syntax().text().to_string(), input);
        // The statement after the error still parses.
        assert!(
            parse
                .syntax()
                .children()
                .filter(|n| n.kind() == SyntaxKind::ASSIGNMENT)
                .count()
                >= 1
        );
    }

    #[test]
    fn nested_blocks() {
        let parse = parse("android { signingConfigs { release { storeFile file('a') } } }\n");
        assert!(parse.ok());
        roundtrip("android { signingConfigs { release { storeFile file('a') } } }\n");
    }

    #[test]
    fn command_args_stop_at_a_closing_brace() {
        let parse = parse("buildTypes { release { minifyEnabled true } }\n");
        assert!(parse.ok());
        let args = parse
            .syntax()
            .descendants()
            .find(|n| n.kind() == SyntaxKind::ARG_LIST)
            .unwrap();
        // Only `true` is an argument; the braces belong to the blocks.
        assert_eq!(args.children().count(), 1);
    }
}
