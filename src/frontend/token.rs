//! Token definitions for Jack

use std::fmt;

/// A token produced by the tokenizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Literal text; XML-escaped for symbols, unquoted for string constants
    pub text: String,
    /// 1-based source line
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
        }
    }

    /// Terminal tag: `<kind> text </kind>`
    pub fn tag(&self) -> String {
        format!("<{0}> {1} </{0}>", self.kind, self.text)
    }

    /// Literal text with symbol escaping undone
    pub fn value(&self) -> &str {
        if self.kind == TokenKind::Symbol {
            unescape_symbol(&self.text)
        } else {
            &self.text
        }
    }

    /// Check kind and literal value
    pub fn is(&self, kind: TokenKind, value: &str) -> bool {
        self.kind == kind && self.value() == value
    }

    /// Check kind and membership of the literal value in `values`
    pub fn is_one_of(&self, kind: TokenKind, values: &[&str]) -> bool {
        self.kind == kind && values.iter().any(|v| self.value() == *v)
    }

    /// Numeric value of an integer constant within the Jack range (0..=32767)
    pub fn int_value(&self) -> Option<u16> {
        if self.kind != TokenKind::IntegerConstant {
            return None;
        }
        self.text.parse::<u16>().ok().filter(|n| *n <= MAX_INT)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// Lexical categories, in classification priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Keyword,
    Symbol,
    IntegerConstant,
    StringConstant,
    Identifier,
}

impl TokenKind {
    /// Tag name used in the XML output
    pub fn tag_name(&self) -> &'static str {
        match self {
            TokenKind::Keyword => "keyword",
            TokenKind::Symbol => "symbol",
            TokenKind::IntegerConstant => "integerConstant",
            TokenKind::StringConstant => "stringConstant",
            TokenKind::Identifier => "identifier",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_name())
    }
}

/// Largest integer constant the language allows
pub const MAX_INT: u16 = 32767;

// ============ Keywords ============

pub const KW_CLASS: &str = "class";
pub const KW_CONSTRUCTOR: &str = "constructor";
pub const KW_FUNCTION: &str = "function";
pub const KW_METHOD: &str = "method";
pub const KW_FIELD: &str = "field";
pub const KW_STATIC: &str = "static";
pub const KW_VAR: &str = "var";
pub const KW_INT: &str = "int";
pub const KW_CHAR: &str = "char";
pub const KW_BOOLEAN: &str = "boolean";
pub const KW_VOID: &str = "void";
pub const KW_TRUE: &str = "true";
pub const KW_FALSE: &str = "false";
pub const KW_NULL: &str = "null";
pub const KW_THIS: &str = "this";
pub const KW_LET: &str = "let";
pub const KW_DO: &str = "do";
pub const KW_IF: &str = "if";
pub const KW_ELSE: &str = "else";
pub const KW_WHILE: &str = "while";
pub const KW_RETURN: &str = "return";

pub const KEYWORDS: &[&str] = &[
    KW_CLASS,
    KW_CONSTRUCTOR,
    KW_FUNCTION,
    KW_METHOD,
    KW_FIELD,
    KW_STATIC,
    KW_VAR,
    KW_INT,
    KW_CHAR,
    KW_BOOLEAN,
    KW_VOID,
    KW_TRUE,
    KW_FALSE,
    KW_NULL,
    KW_THIS,
    KW_LET,
    KW_DO,
    KW_IF,
    KW_ELSE,
    KW_WHILE,
    KW_RETURN,
];

// ============ Symbols ============

pub const SYM_LBRACE: &str = "{";
pub const SYM_RBRACE: &str = "}";
pub const SYM_LPAREN: &str = "(";
pub const SYM_RPAREN: &str = ")";
pub const SYM_LBRACKET: &str = "[";
pub const SYM_RBRACKET: &str = "]";
pub const SYM_DOT: &str = ".";
pub const SYM_COMMA: &str = ",";
pub const SYM_SEMICOLON: &str = ";";
pub const SYM_PLUS: &str = "+";
pub const SYM_MINUS: &str = "-";
pub const SYM_STAR: &str = "*";
pub const SYM_SLASH: &str = "/";
pub const SYM_AMP: &str = "&";
pub const SYM_PIPE: &str = "|";
pub const SYM_LT: &str = "<";
pub const SYM_GT: &str = ">";
pub const SYM_EQ: &str = "=";
pub const SYM_TILDE: &str = "~";

pub const SYMBOLS: &[&str] = &[
    SYM_LBRACE,
    SYM_RBRACE,
    SYM_LPAREN,
    SYM_RPAREN,
    SYM_LBRACKET,
    SYM_RBRACKET,
    SYM_DOT,
    SYM_COMMA,
    SYM_SEMICOLON,
    SYM_PLUS,
    SYM_MINUS,
    SYM_STAR,
    SYM_SLASH,
    SYM_AMP,
    SYM_PIPE,
    SYM_LT,
    SYM_GT,
    SYM_EQ,
    SYM_TILDE,
];

// ============ Grammar sets ============

/// Primitive type keywords accepted by the `type` rule
pub const PRIMITIVE_TYPES: &[&str] = &[KW_INT, KW_CHAR, KW_BOOLEAN, KW_VOID];

pub const CLASS_VAR_KINDS: &[&str] = &[KW_STATIC, KW_FIELD];

pub const SUBROUTINE_KINDS: &[&str] = &[KW_CONSTRUCTOR, KW_FUNCTION, KW_METHOD];

pub const STATEMENT_KEYWORDS: &[&str] = &[KW_LET, KW_DO, KW_IF, KW_WHILE, KW_RETURN];

pub const KEYWORD_CONSTANTS: &[&str] = &[KW_TRUE, KW_FALSE, KW_NULL, KW_THIS];

/// Binary operators; all share one precedence level
pub const BINARY_OPS: &[&str] = &[
    SYM_PLUS, SYM_MINUS, SYM_STAR, SYM_SLASH, SYM_AMP, SYM_PIPE, SYM_LT, SYM_GT, SYM_EQ,
];

pub const UNARY_OPS: &[&str] = &[SYM_MINUS, SYM_TILDE];

/// Escape a symbol for XML output
pub fn escape_symbol(symbol: &str) -> &str {
    match symbol {
        "<" => "&lt;",
        ">" => "&gt;",
        "&" => "&amp;",
        "\"" => "&quot;",
        "'" => "&#39;",
        other => other,
    }
}

fn unescape_symbol(text: &str) -> &str {
    match text {
        "&lt;" => "<",
        "&gt;" => ">",
        "&amp;" => "&",
        "&quot;" => "\"",
        "&#39;" => "'",
        other => other,
    }
}
