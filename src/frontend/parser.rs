//! Compilation engine for Jack
//!
//! LL(1) recursive descent over the token sequence. Every nonterminal is one
//! method that opens its tag, consumes its children and closes its tag; the
//! parse tree only exists as the tag stream written to the [`TagSink`].
//! Terminals are consumed exclusively through [`CompilationEngine::expect`].

use log::debug;

use crate::backend::TagSink;
use crate::frontend::lexer::Tokenizer;
use crate::frontend::token::*;
use crate::utils::{Error, Result};

/// Deepest nesting of statements, expressions and terms the engine accepts
pub const MAX_PARSE_DEPTH: usize = 256;

/// The compilation engine
pub struct CompilationEngine<S: TagSink> {
    tokenizer: Tokenizer,
    sink: S,
    /// Lookahead token; `None` once the sequence is exhausted
    current: Option<Token>,
    consumed: usize,
    depth: usize,
}

impl<S: TagSink> CompilationEngine<S> {
    /// Create an engine with the first token already loaded
    pub fn new(mut tokenizer: Tokenizer, sink: S) -> Self {
        tokenizer.reset();
        let current = tokenizer.advance().ok();
        Self {
            tokenizer,
            sink,
            current,
            consumed: 0,
            depth: 0,
        }
    }

    /// Number of tokens matched so far
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    // ==================== Helper Methods ====================

    fn advance(&mut self) {
        self.current = self.tokenizer.advance().ok();
    }

    fn check(&self, kind: TokenKind, value: &str) -> bool {
        self.current.as_ref().is_some_and(|t| t.is(kind, value))
    }

    fn check_one_of(&self, kind: TokenKind, values: &[&str]) -> bool {
        self.current.as_ref().is_some_and(|t| t.is_one_of(kind, values))
    }

    /// Match the current token against `kind` (and `value` when given),
    /// advance, and emit it as a terminal
    fn expect(&mut self, kind: TokenKind, value: Option<&str>) -> Result<()> {
        let expected = || match value {
            Some(v) => format!("{kind} '{v}'"),
            None => kind.to_string(),
        };

        let token = match self.current.take() {
            Some(token) => token,
            None => {
                return Err(Error::EndOfTokens {
                    expected: expected(),
                    line: self.tokenizer.last_line(),
                })
            }
        };

        if token.kind != kind || value.is_some_and(|v| token.value() != v) {
            let err = Error::UnexpectedToken {
                expected: expected(),
                got: token.kind,
                text: token.value().to_string(),
                line: token.line,
            };
            self.current = Some(token);
            return Err(err);
        }

        self.advance();
        self.consumed += 1;
        self.sink.terminal(&token)
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        self.expect(TokenKind::Keyword, Some(keyword))
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<()> {
        self.expect(TokenKind::Symbol, Some(symbol))
    }

    fn expect_identifier(&mut self) -> Result<()> {
        self.expect(TokenKind::Identifier, None)
    }

    /// Line of the lookahead, or of the last token once input is exhausted
    fn current_line(&self) -> usize {
        match &self.current {
            Some(token) => token.line,
            None => self.tokenizer.last_line(),
        }
    }

    /// Run a recursive production one level deeper
    fn nested(&mut self, production: fn(&mut Self) -> Result<()>) -> Result<()> {
        if self.depth >= MAX_PARSE_DEPTH {
            return Err(Error::NestingTooDeep {
                limit: MAX_PARSE_DEPTH,
                line: self.current_line(),
            });
        }
        self.depth += 1;
        let result = production(self);
        self.depth -= 1;
        result
    }

    fn exhausted(&self, expected: &str) -> Error {
        Error::EndOfTokens {
            expected: expected.to_string(),
            line: self.tokenizer.last_line(),
        }
    }

    // ==================== Program Structure ====================

    /// Parse one class, which must span the whole token sequence
    pub fn process_class(&mut self) -> Result<()> {
        self.sink.open("class")?;
        self.expect_keyword(KW_CLASS)?;
        self.expect_identifier()?;
        self.expect_symbol(SYM_LBRACE)?;

        while self.check_one_of(TokenKind::Keyword, CLASS_VAR_KINDS) {
            self.parse_class_var_dec()?;
        }
        while self.check_one_of(TokenKind::Keyword, SUBROUTINE_KINDS) {
            self.parse_subroutine_dec()?;
        }

        self.expect_symbol(SYM_RBRACE)?;
        self.sink.close("class")?;

        if let Some(token) = &self.current {
            return Err(Error::UnexpectedToken {
                expected: "end of input".to_string(),
                got: token.kind,
                text: token.value().to_string(),
                line: token.line,
            });
        }

        debug!("parsed class from {} tokens", self.consumed);
        Ok(())
    }

    fn parse_class_var_dec(&mut self) -> Result<()> {
        self.sink.open("classVarDec")?;
        // static | field
        self.expect(TokenKind::Keyword, None)?;
        self.parse_type()?;
        self.parse_var_names()?;
        self.expect_symbol(SYM_SEMICOLON)?;
        self.sink.close("classVarDec")
    }

    /// varName {',' varName}
    fn parse_var_names(&mut self) -> Result<()> {
        self.expect_identifier()?;
        while self.check(TokenKind::Symbol, SYM_COMMA) {
            self.expect_symbol(SYM_COMMA)?;
            self.expect_identifier()?;
        }
        Ok(())
    }

    fn parse_type(&mut self) -> Result<()> {
        if self.check_one_of(TokenKind::Keyword, PRIMITIVE_TYPES) {
            self.expect(TokenKind::Keyword, None)
        } else {
            self.expect_identifier()
        }
    }

    fn parse_subroutine_dec(&mut self) -> Result<()> {
        self.sink.open("subroutineDec")?;
        // constructor | function | method
        self.expect(TokenKind::Keyword, None)?;
        self.parse_type()?;
        self.expect_identifier()?;
        self.expect_symbol(SYM_LPAREN)?;
        self.parse_parameter_list()?;
        self.expect_symbol(SYM_RPAREN)?;
        self.parse_subroutine_body()?;
        self.sink.close("subroutineDec")
    }

    fn parse_parameter_list(&mut self) -> Result<()> {
        self.sink.open("parameterList")?;
        if !self.check(TokenKind::Symbol, SYM_RPAREN) {
            self.parse_type()?;
            self.expect_identifier()?;
            while self.check(TokenKind::Symbol, SYM_COMMA) {
                self.expect_symbol(SYM_COMMA)?;
                self.parse_type()?;
                self.expect_identifier()?;
            }
        }
        self.sink.close("parameterList")
    }

    fn parse_subroutine_body(&mut self) -> Result<()> {
        self.sink.open("subroutineBody")?;
        self.expect_symbol(SYM_LBRACE)?;
        while self.check(TokenKind::Keyword, KW_VAR) {
            self.parse_var_dec()?;
        }
        self.parse_statements()?;
        self.expect_symbol(SYM_RBRACE)?;
        self.sink.close("subroutineBody")
    }

    fn parse_var_dec(&mut self) -> Result<()> {
        self.sink.open("varDec")?;
        self.expect_keyword(KW_VAR)?;
        self.parse_type()?;
        self.parse_var_names()?;
        self.expect_symbol(SYM_SEMICOLON)?;
        self.sink.close("varDec")
    }

    // ==================== Statements ====================

    fn parse_statements(&mut self) -> Result<()> {
        self.nested(Self::statements)
    }

    fn statements(&mut self) -> Result<()> {
        self.sink.open("statements")?;
        while self.check_one_of(TokenKind::Keyword, STATEMENT_KEYWORDS) {
            let parse: fn(&mut Self) -> Result<()> = match self.current.as_ref() {
                Some(token) => match token.value() {
                    KW_LET => Self::parse_let,
                    KW_DO => Self::parse_do,
                    KW_IF => Self::parse_if,
                    KW_WHILE => Self::parse_while,
                    KW_RETURN => Self::parse_return,
                    other => {
                        return Err(Error::UnknownStatement {
                            text: other.to_string(),
                            line: token.line,
                        })
                    }
                },
                None => return Err(self.exhausted("statement")),
            };
            parse(self)?;
        }
        self.sink.close("statements")
    }

    fn parse_let(&mut self) -> Result<()> {
        self.sink.open("letStatement")?;
        self.expect_keyword(KW_LET)?;
        self.expect_identifier()?;
        if self.check(TokenKind::Symbol, SYM_LBRACKET) {
            self.expect_symbol(SYM_LBRACKET)?;
            self.parse_expression()?;
            self.expect_symbol(SYM_RBRACKET)?;
        }
        self.expect_symbol(SYM_EQ)?;
        self.parse_expression()?;
        self.expect_symbol(SYM_SEMICOLON)?;
        self.sink.close("letStatement")
    }

    fn parse_do(&mut self) -> Result<()> {
        self.sink.open("doStatement")?;
        self.expect_keyword(KW_DO)?;
        self.expect_identifier()?;
        self.parse_subroutine_call()?;
        self.expect_symbol(SYM_SEMICOLON)?;
        self.sink.close("doStatement")
    }

    /// Call tail after the leading name: ['.' name] '(' expressionList ')'.
    /// Emits no tag of its own.
    fn parse_subroutine_call(&mut self) -> Result<()> {
        if self.check(TokenKind::Symbol, SYM_DOT) {
            self.expect_symbol(SYM_DOT)?;
            self.expect_identifier()?;
        }
        self.expect_symbol(SYM_LPAREN)?;
        self.parse_expression_list()?;
        self.expect_symbol(SYM_RPAREN)
    }

    fn parse_return(&mut self) -> Result<()> {
        self.sink.open("returnStatement")?;
        self.expect_keyword(KW_RETURN)?;
        if !self.check(TokenKind::Symbol, SYM_SEMICOLON) {
            self.parse_expression()?;
        }
        self.expect_symbol(SYM_SEMICOLON)?;
        self.sink.close("returnStatement")
    }

    fn parse_if(&mut self) -> Result<()> {
        self.sink.open("ifStatement")?;
        self.expect_keyword(KW_IF)?;
        self.parse_condition()?;
        self.parse_block()?;
        if self.check(TokenKind::Keyword, KW_ELSE) {
            self.expect_keyword(KW_ELSE)?;
            self.parse_block()?;
        }
        self.sink.close("ifStatement")
    }

    fn parse_while(&mut self) -> Result<()> {
        self.sink.open("whileStatement")?;
        self.expect_keyword(KW_WHILE)?;
        self.parse_condition()?;
        self.parse_block()?;
        self.sink.close("whileStatement")
    }

    /// '(' expression ')'
    fn parse_condition(&mut self) -> Result<()> {
        self.expect_symbol(SYM_LPAREN)?;
        self.parse_expression()?;
        self.expect_symbol(SYM_RPAREN)
    }

    /// '{' statements '}'
    fn parse_block(&mut self) -> Result<()> {
        self.expect_symbol(SYM_LBRACE)?;
        self.parse_statements()?;
        self.expect_symbol(SYM_RBRACE)
    }

    // ==================== Expressions ====================

    /// term (op term)*, all operators at one precedence level
    fn parse_expression(&mut self) -> Result<()> {
        self.nested(Self::expression)
    }

    fn expression(&mut self) -> Result<()> {
        self.sink.open("expression")?;
        self.parse_term()?;
        while self.check_one_of(TokenKind::Symbol, BINARY_OPS) {
            self.expect(TokenKind::Symbol, None)?;
            self.parse_term()?;
        }
        self.sink.close("expression")
    }

    fn parse_term(&mut self) -> Result<()> {
        self.nested(Self::term)
    }

    fn term(&mut self) -> Result<()> {
        self.sink.open("term")?;

        let Some(token) = self.current.as_ref() else {
            return Err(self.exhausted("term"));
        };
        let kind = token.kind;
        let is_keyword_constant = token.is_one_of(TokenKind::Keyword, KEYWORD_CONSTANTS);
        let is_group = token.is(TokenKind::Symbol, SYM_LPAREN);
        let is_unary = token.is_one_of(TokenKind::Symbol, UNARY_OPS);

        match kind {
            TokenKind::IntegerConstant | TokenKind::StringConstant => self.expect(kind, None)?,
            TokenKind::Keyword if is_keyword_constant => self.expect(kind, None)?,
            TokenKind::Symbol if is_group => {
                self.expect_symbol(SYM_LPAREN)?;
                self.parse_expression()?;
                self.expect_symbol(SYM_RPAREN)?;
            }
            TokenKind::Symbol if is_unary => {
                self.expect(kind, None)?;
                self.parse_term()?;
            }
            TokenKind::Identifier => {
                self.expect_identifier()?;
                if self.check(TokenKind::Symbol, SYM_LBRACKET) {
                    self.expect_symbol(SYM_LBRACKET)?;
                    self.parse_expression()?;
                    self.expect_symbol(SYM_RBRACKET)?;
                } else if self.check(TokenKind::Symbol, SYM_LPAREN)
                    || self.check(TokenKind::Symbol, SYM_DOT)
                {
                    self.parse_subroutine_call()?;
                }
            }
            _ => {
                return Err(Error::ExpectedTerm {
                    got: kind,
                    text: token.value().to_string(),
                    line: token.line,
                })
            }
        }

        self.sink.close("term")
    }

    fn parse_expression_list(&mut self) -> Result<()> {
        self.sink.open("expressionList")?;
        if !self.check(TokenKind::Symbol, SYM_RPAREN) {
            self.parse_expression()?;
            while self.check(TokenKind::Symbol, SYM_COMMA) {
                self.expect_symbol(SYM_COMMA)?;
                self.parse_expression()?;
            }
        }
        self.sink.close("expressionList")
    }
}

/// Parse the tokenizer's sequence as one class into `sink`
pub fn parse<S: TagSink>(tokenizer: Tokenizer, sink: S) -> Result<()> {
    CompilationEngine::new(tokenizer, sink).process_class()
}
