//! Error handling for the Jack analyzer

use std::io;
use std::path::PathBuf;

use crate::frontend::token::TokenKind;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Analyzer error
#[derive(Error, Debug)]
pub enum Error {
    // ==================== Lexer Errors ====================

    #[error("Unrecognized input `{fragment}` at line {line}: {text}")]
    Lex {
        line: usize,
        text: String,
        fragment: String,
    },

    // ==================== Parser Errors ====================

    #[error("expected {expected}, got {got} '{text}'")]
    UnexpectedToken {
        expected: String,
        got: TokenKind,
        text: String,
        line: usize,
    },

    #[error("expected term, got {got} '{text}'")]
    ExpectedTerm {
        got: TokenKind,
        text: String,
        line: usize,
    },

    #[error("unknown statement: {text}")]
    UnknownStatement { text: String, line: usize },

    #[error("no more tokens: expected {expected}")]
    EndOfTokens { expected: String, line: usize },

    #[error("nesting deeper than {limit} levels")]
    NestingTooDeep { limit: usize, line: usize },

    // ==================== Output Errors ====================

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("cannot access {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Source line the error points at, if it has one
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Lex { line, .. }
            | Self::UnexpectedToken { line, .. }
            | Self::ExpectedTerm { line, .. }
            | Self::UnknownStatement { line, .. }
            | Self::EndOfTokens { line, .. }
            | Self::NestingTooDeep { line, .. } => Some(*line),
            Self::Io(_) | Self::File { .. } => None,
        }
    }

    /// The offending source text: the whole line for lex errors, the token otherwise
    pub fn offending_text(&self) -> Option<&str> {
        match self {
            Self::Lex { text, .. }
            | Self::UnexpectedToken { text, .. }
            | Self::ExpectedTerm { text, .. }
            | Self::UnknownStatement { text, .. } => Some(text),
            Self::EndOfTokens { .. }
            | Self::NestingTooDeep { .. }
            | Self::Io(_)
            | Self::File { .. } => None,
        }
    }

    /// Stable diagnostic code used in reports
    pub fn code(&self) -> &'static str {
        match self {
            Self::Lex { .. } => "E0001",
            Self::UnexpectedToken { .. } => "E0100",
            Self::ExpectedTerm { .. } => "E0101",
            Self::UnknownStatement { .. } => "E0102",
            Self::NestingTooDeep { .. } => "E0103",
            Self::EndOfTokens { .. } => "E0200",
            Self::Io(_) => "E0900",
            Self::File { .. } => "E0901",
        }
    }

    /// True for the "ran out of tokens" condition
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::EndOfTokens { .. })
    }
}
