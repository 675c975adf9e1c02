//! Byte cursor over a tokenizer buffer.
//!
//! Delimiter searches go through memchr so the hot scanning loops get SIMD
//! where the platform has it.

use memchr::{memchr, memchr2};

/// Positioned byte cursor.
pub struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    #[inline]
    pub fn new(input: &'a [u8]) -> Self {
        Cursor { input, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    #[inline]
    pub fn slice(&self, start: usize, end: usize) -> &'a [u8] {
        &self.input[start..end]
    }

    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    #[inline]
    pub fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.pos += 1;
        }
    }

    /// Next occurrence of `byte` at or after the cursor, as an absolute index.
    #[inline]
    pub fn find_byte(&self, byte: u8) -> Option<usize> {
        memchr(byte, &self.input[self.pos..]).map(|i| self.pos + i)
    }

    /// Next occurrence of either byte, as an absolute index.
    #[inline]
    pub fn find_byte2(&self, b1: u8, b2: u8) -> Option<usize> {
        memchr2(b1, b2, &self.input[self.pos..]).map(|i| self.pos + i)
    }

    #[inline]
    pub fn starts_with(&self, needle: &[u8]) -> bool {
        self.input[self.pos..].starts_with(needle)
    }

    /// Position of the `>` closing the current tag, skipping quoted spans.
    pub fn find_tag_end_quoted(&self) -> Option<usize> {
        let mut pos = self.pos;
        let mut in_single = false;
        let mut in_double = false;
        while pos < self.input.len() {
            match self.input[pos] {
                b'"' if !in_single => in_double = !in_double,
                b'\'' if !in_double => in_single = !in_single,
                b'>' if !in_single && !in_double => return Some(pos),
                _ => {}
            }
            pos += 1;
        }
        None
    }

    /// Read a tag or attribute name, or None when the cursor is not at a
    /// name-start byte.
    pub fn read_name(&mut self) -> Option<&'a [u8]> {
        let start = self.pos;
        if !self.peek().map(is_name_start).unwrap_or(false) {
            return None;
        }
        self.pos += 1;
        while self.peek().map(is_name_byte).unwrap_or(false) {
            self.pos += 1;
        }
        Some(&self.input[start..self.pos])
    }
}

/// Name-start byte. Non-ASCII bytes pass through as UTF-8 continuation.
#[inline]
pub fn is_name_start(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

/// Name byte after the first.
#[inline]
pub fn is_name_byte(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'.' | b':') || b >= 0x80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_name_stops_at_delimiter() {
        let mut cur = Cursor::new(b"item-name>rest");
        assert_eq!(cur.read_name(), Some(b"item-name" as &[u8]));
        assert_eq!(cur.position(), 9);
    }

    #[test]
    fn read_name_rejects_digit_start() {
        let mut cur = Cursor::new(b"1abc");
        assert_eq!(cur.read_name(), None);
        assert_eq!(cur.position(), 0);
    }

    #[test]
    fn tag_end_skips_quoted_gt() {
        let cur = Cursor::new(b"a href=\"x>y\">tail");
        assert_eq!(cur.find_tag_end_quoted(), Some(12));
    }

    #[test]
    fn whitespace_skip() {
        let mut cur = Cursor::new(b" \t\r\nx");
        cur.skip_whitespace();
        assert_eq!(cur.peek(), Some(b'x'));
    }
}
