//! XML output - tag sinks and the token dump
//!
//! The compilation engine never builds a tree; it streams open, close and
//! terminal events into a [`TagSink`]. [`XmlWriter`] turns those events into
//! text, either as the raw concatenated stream or re-indented with two spaces
//! per nesting level.

use std::io::Write;

use crate::frontend::token::Token;
use crate::utils::Result;

/// Destination for the parse tree tag stream
pub trait TagSink {
    /// Open a nonterminal
    fn open(&mut self, tag: &'static str) -> Result<()>;

    /// Close a nonterminal opened by `open`
    fn close(&mut self, tag: &'static str) -> Result<()>;

    /// Emit a matched token
    fn terminal(&mut self, token: &Token) -> Result<()>;
}

impl<S: TagSink + ?Sized> TagSink for &mut S {
    fn open(&mut self, tag: &'static str) -> Result<()> {
        (**self).open(tag)
    }

    fn close(&mut self, tag: &'static str) -> Result<()> {
        (**self).close(tag)
    }

    fn terminal(&mut self, token: &Token) -> Result<()> {
        (**self).terminal(token)
    }
}

/// Layout of the written XML
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XmlStyle {
    /// Tags back to back, no whitespace
    Flat,
    /// One element per line, two spaces per level
    #[default]
    Indented,
}

const INDENT: &str = "  ";

/// Writes tag events to any `io::Write`
pub struct XmlWriter<W: Write> {
    out: W,
    style: XmlStyle,
    depth: usize,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(out: W, style: XmlStyle) -> Self {
        Self {
            out,
            style,
            depth: 0,
        }
    }

    /// Current nesting depth (0 when every opened tag was closed)
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) -> Result<()> {
        match self.style {
            XmlStyle::Flat => self.out.write_all(text.as_bytes())?,
            XmlStyle::Indented => {
                let pad = INDENT.repeat(self.depth);
                writeln!(self.out, "{pad}{text}")?;
            }
        }
        Ok(())
    }
}

impl<W: Write> TagSink for XmlWriter<W> {
    fn open(&mut self, tag: &'static str) -> Result<()> {
        self.line(&format!("<{tag}>"))?;
        self.depth += 1;
        Ok(())
    }

    fn close(&mut self, tag: &'static str) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        self.line(&format!("</{tag}>"))
    }

    fn terminal(&mut self, token: &Token) -> Result<()> {
        self.line(&token.tag())
    }
}

/// Write the `<tokens>` dump, one terminal tag per line
pub fn write_token_dump<W: Write>(tokens: &[Token], out: &mut W) -> Result<()> {
    writeln!(out, "<tokens>")?;
    for token in tokens {
        writeln!(out, "{}", token.tag())?;
    }
    writeln!(out, "</tokens>")?;
    Ok(())
}

/// Render the token dump into a string
pub fn token_dump(tokens: &[Token]) -> Result<String> {
    let mut out = Vec::new();
    write_token_dump(tokens, &mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// One recorded tag event
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum TagEvent {
    Open(&'static str),
    Close(&'static str),
    Terminal(Token),
}

/// In-memory sink used by tests to inspect the event stream
#[cfg(test)]
#[derive(Debug, Default)]
pub struct TagRecorder {
    pub events: Vec<TagEvent>,
}

#[cfg(test)]
impl TagRecorder {
    /// True when every close matches the most recent unclosed open
    pub fn is_balanced(&self) -> bool {
        let mut stack = Vec::new();
        for event in &self.events {
            match event {
                TagEvent::Open(tag) => stack.push(*tag),
                TagEvent::Close(tag) => {
                    if stack.pop() != Some(*tag) {
                        return false;
                    }
                }
                TagEvent::Terminal(_) => {}
            }
        }
        stack.is_empty()
    }

    pub fn terminal_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, TagEvent::Terminal(_)))
            .count()
    }

    pub fn count_open(&self, tag: &str) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, TagEvent::Open(t) if *t == tag))
            .count()
    }
}

#[cfg(test)]
impl TagSink for TagRecorder {
    fn open(&mut self, tag: &'static str) -> Result<()> {
        self.events.push(TagEvent::Open(tag));
        Ok(())
    }

    fn close(&mut self, tag: &'static str) -> Result<()> {
        self.events.push(TagEvent::Close(tag));
        Ok(())
    }

    fn terminal(&mut self, token: &Token) -> Result<()> {
        self.events.push(TagEvent::Terminal(token.clone()));
        Ok(())
    }
}
