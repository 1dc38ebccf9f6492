//! Frontend module - Tokenizer and compilation engine

pub mod token;
pub mod lexer;
pub mod parser;
