//! Push tokenizer state machine.
//!
//! Bytes are buffered until a construct is complete, so feeding a document
//! one byte at a time produces exactly the same events as feeding it whole.
//! Text runs stream eagerly, holding back only a trailing fragment that
//! could still turn into an entity reference or CDATA terminator.

use log::{trace, warn};
use memchr::{memchr, memmem, memrchr};

use super::cursor::{is_name_start, Cursor};
use super::entities;
use super::events::ScanEvent;
use super::ScanOptions;
use crate::error::ParseError;

/// Longest span a complete entity reference can occupy.
const ENTITY_HOLDBACK: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    Cdata,
}

enum Markup {
    Consumed(usize),
    Incomplete,
}

/// Incremental tokenizer. Feed chunks, drain events, then call `finish`.
pub struct Tokenizer {
    buffer: Vec<u8>,
    /// Bytes already drained off the front of the buffer, for absolute
    /// error positions.
    consumed: usize,
    state: State,
    options: ScanOptions,
    finished: bool,
    failed: bool,
}

impl Tokenizer {
    /// Permissive tokenizer.
    pub fn new() -> Self {
        Self::with_options(ScanOptions::default())
    }

    pub fn with_options(options: ScanOptions) -> Self {
        Tokenizer {
            buffer: Vec::with_capacity(8192),
            consumed: 0,
            state: State::Text,
            options,
            finished: false,
            failed: false,
        }
    }

    /// True once an error event has been emitted; the stream is dead.
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Feed a chunk and collect the events it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ScanEvent> {
        if self.finished || self.failed {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        let processed = self.drain(&mut events, false);
        self.buffer.drain(..processed);
        self.consumed += processed;
        events
    }

    /// Signal end of input. Flushes held-back text and emits `End`.
    pub fn finish(&mut self) -> Vec<ScanEvent> {
        if self.finished || self.failed {
            self.finished = true;
            return Vec::new();
        }
        self.finished = true;
        let mut events = Vec::new();
        let processed = self.drain(&mut events, true);
        if !self.failed {
            if processed < self.buffer.len() {
                // An unterminated construct starting with '<'.
                if self.options.permissive {
                    warn!(
                        "unterminated markup at byte {} kept as text",
                        self.consumed + processed
                    );
                    events.push(ScanEvent::Text(entities::decode(&self.buffer[processed..])));
                } else {
                    self.failed = true;
                    events.push(ScanEvent::Error(ParseError::malformed(
                        "unterminated markup at end of input",
                        self.consumed + processed,
                    )));
                }
            }
            if !self.failed && self.state == State::Cdata {
                events.push(ScanEvent::CdataEnd);
                self.state = State::Text;
            }
        }
        if !self.failed {
            events.push(ScanEvent::End);
        }
        self.buffer.clear();
        events
    }

    /// Process the buffer as far as possible, returning how many bytes were
    /// fully handled.
    fn drain(&mut self, events: &mut Vec<ScanEvent>, at_end: bool) -> usize {
        let mut pos = 0;
        while pos < self.buffer.len() && !self.failed {
            match self.state {
                State::Text => {
                    match memchr(b'<', &self.buffer[pos..]) {
                        Some(rel) => {
                            let lt = pos + rel;
                            if lt > pos {
                                events.push(ScanEvent::Text(entities::decode(
                                    &self.buffer[pos..lt],
                                )));
                            }
                            match self.markup(lt, events) {
                                Markup::Consumed(next) => pos = next,
                                Markup::Incomplete => return lt,
                            }
                        }
                        None => {
                            // Pure text; keep a possible partial entity back.
                            let end = self.buffer.len();
                            let safe = if at_end {
                                end
                            } else {
                                pos + text_holdback(&self.buffer[pos..end])
                            };
                            if safe > pos {
                                events.push(ScanEvent::Text(entities::decode(
                                    &self.buffer[pos..safe],
                                )));
                            }
                            return safe;
                        }
                    }
                }
                State::Cdata => {
                    match memmem::find(&self.buffer[pos..], b"]]>") {
                        Some(rel) => {
                            let end = pos + rel;
                            if end > pos {
                                events.push(ScanEvent::Text(lossy(&self.buffer[pos..end])));
                            }
                            trace!("leaving cdata at byte {}", self.consumed + end);
                            events.push(ScanEvent::CdataEnd);
                            self.state = State::Text;
                            pos = end + 3;
                        }
                        None => {
                            // The last two bytes could start "]]>".
                            let end = self.buffer.len();
                            let safe = if at_end {
                                end
                            } else {
                                end.saturating_sub(2).max(pos)
                            };
                            if safe > pos {
                                events.push(ScanEvent::Text(lossy(&self.buffer[pos..safe])));
                            }
                            return safe;
                        }
                    }
                }
            }
        }
        pos.min(self.buffer.len())
    }

    /// Handle the markup construct starting at `pos` (which holds '<').
    fn markup(&mut self, pos: usize, events: &mut Vec<ScanEvent>) -> Markup {
        let after = pos + 1;
        if after >= self.buffer.len() {
            return Markup::Incomplete;
        }
        match self.buffer[after] {
            b'/' => match memchr(b'>', &self.buffer[after..]) {
                Some(rel) => {
                    let gt = after + rel;
                    let name = lossy(&self.buffer[after + 1..gt]).trim().to_string();
                    events.push(ScanEvent::Close(name));
                    Markup::Consumed(gt + 1)
                }
                None => Markup::Incomplete,
            },
            b'!' => self.bang_markup(pos, events),
            b'?' => match memmem::find(&self.buffer[after + 1..], b"?>") {
                // Processing instructions and declarations carry nothing the
                // tree wants; skip them whole.
                Some(rel) => Markup::Consumed(after + 1 + rel + 2),
                None => Markup::Incomplete,
            },
            b if is_name_start(b) => self.open_tag(pos, events),
            _ => {
                if self.options.permissive {
                    warn!("stray '<' at byte {} kept as text", self.consumed + pos);
                    events.push(ScanEvent::Text("<".to_string()));
                    Markup::Consumed(after)
                } else {
                    self.failed = true;
                    events.push(ScanEvent::Error(ParseError::malformed(
                        "unexpected character after '<'",
                        self.consumed + pos,
                    )));
                    Markup::Consumed(pos)
                }
            }
        }
    }

    /// Constructs opening with "<!": comment, CDATA or declaration.
    fn bang_markup(&mut self, pos: usize, events: &mut Vec<ScanEvent>) -> Markup {
        let rest = &self.buffer[pos + 2..];
        if rest.starts_with(b"--") {
            return match memmem::find(&self.buffer[pos + 4..], b"-->") {
                Some(rel) => {
                    let end = pos + 4 + rel;
                    events.push(ScanEvent::Comment(lossy(&self.buffer[pos + 4..end])));
                    Markup::Consumed(end + 3)
                }
                None => Markup::Incomplete,
            };
        }
        if rest.starts_with(b"[CDATA[") {
            trace!("entering cdata at byte {}", self.consumed + pos);
            events.push(ScanEvent::CdataStart);
            self.state = State::Cdata;
            return Markup::Consumed(pos + 2 + 7);
        }
        // Too few bytes yet to tell a comment or CDATA opener apart.
        if b"--".starts_with(rest) || b"[CDATA[".starts_with(rest) {
            return Markup::Incomplete;
        }
        // Doctype-style declaration: skip to '>' outside the bracketed
        // internal subset.
        let mut depth = 0usize;
        for (i, &b) in rest.iter().enumerate() {
            match b {
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                b'>' if depth == 0 => return Markup::Consumed(pos + 2 + i + 1),
                _ => {}
            }
        }
        Markup::Incomplete
    }

    fn open_tag(&mut self, pos: usize, events: &mut Vec<ScanEvent>) -> Markup {
        let mut cur = Cursor::new(&self.buffer);
        cur.set_position(pos + 1);
        let gt = match cur.find_tag_end_quoted() {
            Some(gt) => gt,
            None => return Markup::Incomplete,
        };
        let mut tag = &self.buffer[pos + 1..gt];
        let self_close = tag.last() == Some(&b'/');
        if self_close {
            tag = &tag[..tag.len() - 1];
        }
        let (name, attrs) = parse_tag(tag);
        events.push(ScanEvent::Open {
            name: name.clone(),
            attrs: attrs.clone(),
        });
        for (attr_name, value) in attrs {
            events.push(ScanEvent::Attribute {
                name: attr_name,
                value,
            });
        }
        if self_close {
            events.push(ScanEvent::Close(name));
        }
        Markup::Consumed(gt + 1)
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Tokenizer::new()
    }
}

/// Length of the text prefix safe to emit now. A trailing '&' without its
/// ';' yet is held back in case the reference completes in the next chunk.
fn text_holdback(text: &[u8]) -> usize {
    match memrchr(b'&', text) {
        Some(amp) => {
            let tail = &text[amp..];
            if memchr(b';', tail).is_some() || tail.len() > ENTITY_HOLDBACK {
                text.len()
            } else {
                amp
            }
        }
        None => text.len(),
    }
}

/// Split tag bytes into the element name and decoded attributes.
fn parse_tag(tag: &[u8]) -> (String, Vec<(String, String)>) {
    let mut cur = Cursor::new(tag);
    let name = match cur.read_name() {
        Some(raw) => lossy(raw),
        None => String::new(),
    };
    let mut attrs: Vec<(String, String)> = Vec::new();
    loop {
        cur.skip_whitespace();
        if cur.is_eof() {
            break;
        }
        let attr_name = match cur.read_name() {
            Some(raw) => lossy(raw),
            None => {
                cur.advance(1);
                continue;
            }
        };
        cur.skip_whitespace();
        let value = if cur.peek() == Some(b'=') {
            cur.advance(1);
            cur.skip_whitespace();
            match cur.peek() {
                Some(quote @ (b'"' | b'\'')) => {
                    cur.advance(1);
                    let start = cur.position();
                    let end = cur.find_byte(quote).unwrap_or(tag.len());
                    let value = entities::decode(cur.slice(start, end));
                    cur.set_position(end);
                    cur.advance(1);
                    value
                }
                _ => {
                    let start = cur.position();
                    while let Some(b) = cur.peek() {
                        if b.is_ascii_whitespace() {
                            break;
                        }
                        cur.advance(1);
                    }
                    entities::decode(cur.slice(start, cur.position()))
                }
            }
        } else {
            String::new()
        };
        match attrs.iter_mut().find(|(n, _)| *n == attr_name) {
            Some(slot) => slot.1 = value,
            None => attrs.push((attr_name, value)),
        }
    }
    (name, attrs)
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_whole(input: &str) -> Vec<ScanEvent> {
        let mut tok = Tokenizer::new();
        let mut events = tok.feed(input.as_bytes());
        events.extend(tok.finish());
        events
    }

    fn run_bytewise(input: &str) -> Vec<ScanEvent> {
        let mut tok = Tokenizer::new();
        let mut events = Vec::new();
        for byte in input.as_bytes() {
            events.extend(tok.feed(std::slice::from_ref(byte)));
        }
        events.extend(tok.finish());
        events
    }

    /// Text events may be split differently between chunkings; merge
    /// adjacent runs before comparing.
    fn merged(events: Vec<ScanEvent>) -> Vec<ScanEvent> {
        let mut out: Vec<ScanEvent> = Vec::new();
        for event in events {
            match (out.last_mut(), &event) {
                (Some(ScanEvent::Text(prev)), ScanEvent::Text(next)) => prev.push_str(next),
                _ => out.push(event),
            }
        }
        out
    }

    #[test]
    fn simple_document() {
        let events = run_whole(r#"<a x="1"><b>hi</b></a>"#);
        assert_eq!(
            events,
            vec![
                ScanEvent::Open {
                    name: "a".into(),
                    attrs: vec![("x".into(), "1".into())],
                },
                ScanEvent::Attribute {
                    name: "x".into(),
                    value: "1".into(),
                },
                ScanEvent::Open {
                    name: "b".into(),
                    attrs: vec![],
                },
                ScanEvent::Text("hi".into()),
                ScanEvent::Close("b".into()),
                ScanEvent::Close("a".into()),
                ScanEvent::End,
            ]
        );
    }

    #[test]
    fn self_close_emits_open_then_close() {
        let events = run_whole("<a/>");
        assert_eq!(
            events,
            vec![
                ScanEvent::Open {
                    name: "a".into(),
                    attrs: vec![],
                },
                ScanEvent::Close("a".into()),
                ScanEvent::End,
            ]
        );
    }

    #[test]
    fn chunking_is_invisible() {
        let input = r#"<root a="1" b='two &amp; three'>
  <item>alpha &lt;3</item>
  <!-- skip me -->
  <data><![CDATA[raw ]] bytes]]></data>
</root>"#;
        assert_eq!(merged(run_whole(input)), merged(run_bytewise(input)));
    }

    #[test]
    fn attributes_decode_entities() {
        let events = run_whole(r#"<a title="a &quot;b&quot;" flag empty="">"#);
        match &events[0] {
            ScanEvent::Open { attrs, .. } => {
                assert_eq!(
                    attrs,
                    &vec![
                        ("title".to_string(), "a \"b\"".to_string()),
                        ("flag".to_string(), String::new()),
                        ("empty".to_string(), String::new()),
                    ]
                );
            }
            other => panic!("expected open, got {:?}", other),
        }
    }

    #[test]
    fn comment_and_cdata_events() {
        let events = run_whole("<a><!--note--><![CDATA[<raw>&amp;]]></a>");
        assert_eq!(
            events,
            vec![
                ScanEvent::Open {
                    name: "a".into(),
                    attrs: vec![],
                },
                ScanEvent::Comment("note".into()),
                ScanEvent::CdataStart,
                ScanEvent::Text("<raw>&amp;".into()),
                ScanEvent::CdataEnd,
                ScanEvent::Close("a".into()),
                ScanEvent::End,
            ]
        );
    }

    #[test]
    fn bare_ampersand_tolerated() {
        let events = run_whole("<a>fish & chips</a>");
        assert!(events.contains(&ScanEvent::Text("fish & chips".into())));
    }

    #[test]
    fn entity_split_across_chunks() {
        let mut tok = Tokenizer::new();
        let mut events = tok.feed(b"<a>x &am");
        events.extend(tok.feed(b"p; y</a>"));
        events.extend(tok.finish());
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "x & y");
    }

    #[test]
    fn stray_lt_is_text_when_permissive() {
        let events = run_whole("<a>1 < 2</a>");
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "1 < 2");
    }

    #[test]
    fn stray_lt_fails_when_strict() {
        let mut tok = Tokenizer::with_options(ScanOptions { permissive: false });
        let events = tok.feed(b"<a>1 < 2</a>");
        assert!(events.iter().any(|e| matches!(e, ScanEvent::Error(_))));
        assert!(tok.failed());
        // Dead stream stays dead.
        assert!(tok.feed(b"<b/>").is_empty());
        assert!(tok.finish().is_empty());
    }

    #[test]
    fn unterminated_tag_flushes_as_text() {
        let events = run_whole("<a><b attr=\"unclosed");
        assert!(events.contains(&ScanEvent::Text("<b attr=\"unclosed".into())));
        assert_eq!(events.last(), Some(&ScanEvent::End));
    }

    #[test]
    fn doctype_and_pi_are_skipped() {
        let events = run_whole("<?xml version=\"1.0\"?><!DOCTYPE html><a/>");
        assert_eq!(
            events,
            vec![
                ScanEvent::Open {
                    name: "a".into(),
                    attrs: vec![],
                },
                ScanEvent::Close("a".into()),
                ScanEvent::End,
            ]
        );
    }

    #[test]
    fn duplicate_attribute_last_wins() {
        let events = run_whole(r#"<a x="1" x="2">"#);
        match &events[0] {
            ScanEvent::Open { attrs, .. } => {
                assert_eq!(attrs, &vec![("x".to_string(), "2".to_string())]);
            }
            other => panic!("expected open, got {:?}", other),
        }
    }
}
