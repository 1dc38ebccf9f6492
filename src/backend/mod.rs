//! Backend module - XML emission

pub mod xml;

pub use xml::{TagSink, XmlStyle, XmlWriter};
