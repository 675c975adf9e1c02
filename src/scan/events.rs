//! Tokenizer event stream.

use crate::error::ParseError;

/// One event from the tokenizer.
///
/// An open tag carries its full attribute map; individual [`Attribute`]
/// events follow it so consumers can also react per attribute. A
/// self-closing tag emits `Open` followed immediately by `Close`.
///
/// [`Attribute`]: ScanEvent::Attribute
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// Start of an element, with all attributes already decoded.
    Open {
        name: String,
        attrs: Vec<(String, String)>,
    },
    /// One attribute of the most recently opened element.
    Attribute { name: String, value: String },
    /// A run of character data, entity-decoded.
    Text(String),
    /// A comment's content, delimiters stripped.
    Comment(String),
    /// Start of a CDATA section; content follows as raw `Text`.
    CdataStart,
    /// End of a CDATA section.
    CdataEnd,
    /// A closing tag.
    Close(String),
    /// First malformation encountered; the stream ends here.
    Error(ParseError),
    /// End of input, emitted exactly once by `finish`.
    End,
}
