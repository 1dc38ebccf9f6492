//! Tokenizer for Jack
//!
//! Converts source code into the complete token sequence up front. Lexemes
//! are found with an ordered alternation of five patterns and then classified
//! by re-testing them against anchored versions of the same patterns, so a
//! reserved word is always a keyword even though it also looks like an
//! identifier.
#![allow(dead_code)]

use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::frontend::token::{escape_symbol, Token, TokenKind, KEYWORDS, SYMBOLS};
use crate::utils::{Error, Result};

const INT_PATTERN: &str = r"[0-9]+";
const STRING_PATTERN: &str = r#""[^"\n]*""#;
const IDENT_PATTERN: &str = r"[A-Za-z_][A-Za-z0-9_]*";

/// Compiled lexical patterns, shared by every tokenizer
struct Patterns {
    /// Leftmost lexeme at the start of the remaining text
    lexeme: Regex,
    /// Anchored classifiers in priority order
    classifiers: Vec<(TokenKind, Regex)>,
}

impl Patterns {
    fn get() -> &'static Patterns {
        static PATTERNS: OnceLock<Patterns> = OnceLock::new();
        PATTERNS.get_or_init(Patterns::build)
    }

    fn build() -> Self {
        let keywords = KEYWORDS.join("|");
        let symbols = SYMBOLS
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");

        let lexeme = format!(
            r"^(?:(?:{keywords})\b|{symbols}|{INT_PATTERN}|{STRING_PATTERN}|{IDENT_PATTERN})"
        );
        let anchored = |pattern: &str| compile(&format!("^(?:{pattern})$"));

        Self {
            lexeme: compile(&lexeme),
            classifiers: vec![
                (TokenKind::Keyword, anchored(&keywords)),
                (TokenKind::Symbol, anchored(&symbols)),
                (TokenKind::IntegerConstant, anchored(INT_PATTERN)),
                (TokenKind::StringConstant, anchored(STRING_PATTERN)),
                (TokenKind::Identifier, anchored(IDENT_PATTERN)),
            ],
        }
    }

    fn classify(&self, lexeme: &str) -> Option<TokenKind> {
        self.classifiers
            .iter()
            .find(|(_, re)| re.is_match(lexeme))
            .map(|(kind, _)| *kind)
    }
}

fn compile(pattern: &str) -> Regex {
    // The patterns are built from constant tables, failure is a programming error.
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid lexical pattern {pattern:?}: {e}"))
}

/// The tokenizer state
#[derive(Debug, Clone)]
pub struct Tokenizer {
    tokens: Vec<Token>,
    /// Index of the token the next `advance` returns
    next: usize,
}

impl Tokenizer {
    /// Tokenize the whole source eagerly
    pub fn new(source: &str) -> Result<Self> {
        let patterns = Patterns::get();
        let mut tokens = Vec::new();
        let mut in_block_comment = false;

        for (index, raw_line) in source.lines().enumerate() {
            let line = index + 1;
            let code = strip_comments(raw_line, &mut in_block_comment);
            tokenize_line(patterns, line, raw_line, &code, &mut tokens)?;
        }

        debug!(
            "tokenized {} lines into {} tokens",
            source.lines().count(),
            tokens.len()
        );

        Ok(Self { tokens, next: 0 })
    }

    /// Rewind to before the first token
    pub fn reset(&mut self) {
        self.next = 0;
    }

    /// Consume and return the next token
    pub fn advance(&mut self) -> Result<Token> {
        match self.tokens.get(self.next) {
            Some(token) => {
                self.next += 1;
                Ok(token.clone())
            }
            None => Err(Error::EndOfTokens {
                expected: "another token".to_string(),
                line: self.last_line(),
            }),
        }
    }

    /// The token `advance` would return, without consuming it
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.next)
    }

    /// Line of the last token in the sequence (0 for empty input)
    pub fn last_line(&self) -> usize {
        self.tokens.last().map(|t| t.line).unwrap_or(0)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }
}

/// Tokenize a source unit into its token sequence
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Tokenizer::new(source).map(Tokenizer::into_tokens)
}

/// Remove `//` and `/* */` comments from one line.
///
/// `in_block` carries an unterminated block comment over to the next line.
/// Comment markers inside string constants are left alone.
fn strip_comments(line: &str, in_block: &mut bool) -> String {
    let mut code = String::with_capacity(line.len());
    let mut in_string = false;
    let mut rest = line;

    while !rest.is_empty() {
        if *in_block {
            match rest.find("*/") {
                Some(end) => {
                    *in_block = false;
                    rest = &rest[end + 2..];
                    code.push(' ');
                }
                None => break,
            }
            continue;
        }

        if !in_string && rest.starts_with("//") {
            break;
        }
        if !in_string && rest.starts_with("/*") {
            *in_block = true;
            rest = &rest[2..];
            continue;
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            if c == '"' {
                in_string = !in_string;
            }
            code.push(c);
        }
        rest = chars.as_str();
    }

    code
}

/// Append the tokens of one comment-free line
fn tokenize_line(
    patterns: &Patterns,
    line: usize,
    raw_line: &str,
    code: &str,
    tokens: &mut Vec<Token>,
) -> Result<()> {
    let mut rest = code.trim_start();

    while !rest.is_empty() {
        let lexeme = match patterns.lexeme.find(rest) {
            Some(m) => m.as_str(),
            None => return Err(lex_error(line, raw_line, rest)),
        };
        let kind = patterns
            .classify(lexeme)
            .ok_or_else(|| lex_error(line, raw_line, rest))?;

        let text = match kind {
            TokenKind::Symbol => escape_symbol(lexeme).to_string(),
            TokenKind::StringConstant => lexeme.trim_matches('"').to_string(),
            _ => lexeme.to_string(),
        };
        tokens.push(Token::new(kind, text, line));

        rest = rest[lexeme.len()..].trim_start();
    }

    Ok(())
}

fn lex_error(line: usize, raw_line: &str, rest: &str) -> Error {
    let fragment = rest.split_whitespace().next().unwrap_or(rest);
    Error::Lex {
        line,
        text: raw_line.trim().to_string(),
        fragment: fragment.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds_and_text(source: &str) -> Vec<(TokenKind, String)> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_minimal_class() {
        let tokens = tokenize("class Main { function void main() { return; } }").unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();

        assert_eq!(
            texts,
            vec!["class", "Main", "{", "function", "void", "main", "(", ")", "{", "return", ";", "}", "}"]
        );
        assert_eq!(tokens.len(), 13);
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[2].kind, TokenKind::Symbol);
        assert!(tokens.iter().all(|t| t.line == 1));
    }

    #[test]
    fn test_keywords_win_over_identifiers() {
        let tokens = kinds_and_text("while this null classic if_ return");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Keyword, "while".to_string()),
                (TokenKind::Keyword, "this".to_string()),
                (TokenKind::Keyword, "null".to_string()),
                (TokenKind::Identifier, "classic".to_string()),
                (TokenKind::Identifier, "if_".to_string()),
                (TokenKind::Keyword, "return".to_string()),
            ]
        );
    }

    #[test]
    fn test_symbols_are_escaped() {
        let tokens = kinds_and_text("a<b&c>d");
        assert_eq!(tokens[1], (TokenKind::Symbol, "&lt;".to_string()));
        assert_eq!(tokens[3], (TokenKind::Symbol, "&amp;".to_string()));
        assert_eq!(tokens[5], (TokenKind::Symbol, "&gt;".to_string()));
    }

    #[test]
    fn test_string_constant_loses_quotes() {
        let tokens = kinds_and_text(r#"do Output.printString("Hello, world // not a comment");"#);
        assert!(tokens.contains(&(
            TokenKind::StringConstant,
            "Hello, world // not a comment".to_string()
        )));
        assert_eq!(tokens.last(), Some(&(TokenKind::Symbol, ";".to_string())));
    }

    #[test]
    fn test_integer_then_identifier() {
        let tokens = kinds_and_text("1Main x-1");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::IntegerConstant, "1".to_string()),
                (TokenKind::Identifier, "Main".to_string()),
                (TokenKind::Identifier, "x".to_string()),
                (TokenKind::Symbol, "-".to_string()),
                (TokenKind::IntegerConstant, "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_line_comments_are_stripped() {
        let source = "// header\nclass Foo { // trailing\n}\n";
        let tokens = tokenize(source).unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[3].line, 3);
    }

    #[test]
    fn test_multiline_block_comment_is_stripped() {
        let source = "/**\n * Draws a square.\n * let x = 1;\n */\nclass Square /* inline */ {\n}\n";
        let tokens = tokenize(source).unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();

        assert_eq!(texts, vec!["class", "Square", "{", "}"]);
        assert_eq!(tokens[0].line, 5);
    }

    #[test]
    fn test_block_comment_closing_mid_line() {
        let tokens = kinds_and_text("/* a\n b */ var int x;");
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0], (TokenKind::Keyword, "var".to_string()));
    }

    #[test]
    fn test_unrecognized_character_reports_line() {
        let err = tokenize("class Main {\n  var int x;\n  let x = 3 # 4;\n}").unwrap_err();
        match err {
            Error::Lex { line, text, fragment } => {
                assert_eq!(line, 3);
                assert_eq!(text, "let x = 3 # 4;");
                assert_eq!(fragment, "#");
            }
            other => panic!("expected lex error, got {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_string_is_rejected() {
        let err = tokenize("let s = \"open;").unwrap_err();
        assert_eq!(err.line(), Some(1));
        assert_eq!(err.code(), "E0001");
    }

    #[test]
    fn test_tokenizing_is_deterministic() {
        let source = "class A { field int x, y; method void m() { let x = x + 1; return; } }";
        assert_eq!(tokenize(source).unwrap(), tokenize(source).unwrap());
    }

    #[test]
    fn test_cursor_operations() {
        let mut tokenizer = Tokenizer::new("let x = 1;").unwrap();
        assert_eq!(tokenizer.peek().map(|t| t.text.as_str()), Some("let"));

        assert_eq!(tokenizer.advance().unwrap().text, "let");
        assert_eq!(tokenizer.peek().map(|t| t.text.as_str()), Some("x"));
        for _ in 0..4 {
            tokenizer.advance().unwrap();
        }
        assert!(tokenizer.peek().is_none());
        assert!(tokenizer.advance().unwrap_err().is_exhaustion());

        tokenizer.reset();
        assert_eq!(tokenizer.advance().unwrap().text, "let");
    }

    #[test]
    fn test_empty_source() {
        let tokenizer = Tokenizer::new("\n  // nothing here\n").unwrap();
        assert!(tokenizer.is_empty());
        assert_eq!(tokenizer.last_line(), 0);
    }
}
