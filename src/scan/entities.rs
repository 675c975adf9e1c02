//! Entity decoding.
//!
//! Named entities (`lt`, `gt`, `amp`, `quot`, `apos`) and numeric character
//! references decode; anything else, including a bare `&`, passes through as
//! literal text. Input bytes are treated as UTF-8 with lossy fallback.

use memchr::memchr;

/// Decode entity references in a run of character data.
pub fn decode(input: &[u8]) -> String {
    if memchr(b'&', input).is_none() {
        return String::from_utf8_lossy(input).into_owned();
    }
    let mut out = Vec::with_capacity(input.len());
    let mut pos = 0;
    while pos < input.len() {
        match memchr(b'&', &input[pos..]) {
            Some(amp) => {
                out.extend_from_slice(&input[pos..pos + amp]);
                pos += amp;
                match memchr(b';', &input[pos..]) {
                    // A reference can't span more than a handful of bytes;
                    // a distant ';' means this '&' is literal.
                    Some(semi) if semi <= 32 => {
                        let name = &input[pos + 1..pos + semi];
                        match decode_entity(name) {
                            Some(text) => {
                                out.extend_from_slice(text.as_bytes());
                                pos += semi + 1;
                            }
                            None => {
                                out.push(b'&');
                                pos += 1;
                            }
                        }
                    }
                    _ => {
                        out.push(b'&');
                        pos += 1;
                    }
                }
            }
            None => {
                out.extend_from_slice(&input[pos..]);
                break;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn decode_entity(name: &[u8]) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    if name[0] == b'#' {
        return decode_numeric(&name[1..]);
    }
    match name {
        b"lt" => Some("<".to_string()),
        b"gt" => Some(">".to_string()),
        b"amp" => Some("&".to_string()),
        b"quot" => Some("\"".to_string()),
        b"apos" => Some("'".to_string()),
        _ => None,
    }
}

fn decode_numeric(digits: &[u8]) -> Option<String> {
    let code = if digits.first() == Some(&b'x') || digits.first() == Some(&b'X') {
        u32::from_str_radix(std::str::from_utf8(&digits[1..]).ok()?, 16).ok()?
    } else {
        std::str::from_utf8(digits).ok()?.parse::<u32>().ok()?
    };
    char::from_u32(code).map(|c| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_entities() {
        assert_eq!(decode(b"a &lt; b &amp;&amp; c &gt; d"), "a < b && c > d");
        assert_eq!(decode(b"&quot;hi&apos;"), "\"hi'");
    }

    #[test]
    fn numeric_references() {
        assert_eq!(decode(b"&#65;&#x42;"), "AB");
        assert_eq!(decode(b"&#x263A;"), "\u{263A}");
    }

    #[test]
    fn bare_ampersand_passes_through() {
        assert_eq!(decode(b"fish & chips"), "fish & chips");
        assert_eq!(decode(b"&unknown; stays"), "&unknown; stays");
        assert_eq!(decode(b"trailing &"), "trailing &");
    }

    #[test]
    fn plain_text_unchanged() {
        assert_eq!(decode(b"plain text"), "plain text");
    }

    #[test]
    fn invalid_utf8_is_lossy() {
        assert_eq!(decode(b"bad \xFF byte"), "bad \u{FFFD} byte");
    }
}
