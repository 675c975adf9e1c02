//! Ordered rewrite passes from selector syntax to path-expression source.
//!
//! Every pass is quote-aware: string literals pass through untouched, with
//! escape sequences honored. Passes that cannot fail run as plain regex
//! rewrites; `as` casts, `is` predicates, hex literals and navigation
//! sugar validate their input and fail with token-carrying errors.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::error::CompileError;
use crate::norm;

use super::casts;
use super::Transform;

lazy_static! {
    static ref LITERAL_KEYWORD: Regex = Regex::new(r"(?i)\b(true|false|null)\b").unwrap();
    static ref ROOT_ALIAS: Regex = Regex::new(r"\b(?:this|self)\b").unwrap();
    static ref SHORTHAND: Regex = Regex::new(r":(name|key|value|root|match|text)\b").unwrap();
    static ref AS_CAST: Regex = Regex::new(r"\s+as\s+([A-Za-z][A-Za-z0-9]*)").unwrap();
    static ref IS_NOT_PRED: Regex =
        Regex::new(r"\s+is\s+not\s+([A-Za-z][A-Za-z0-9]*)").unwrap();
    static ref IS_PRED: Regex = Regex::new(r"\s+is\s+([A-Za-z][A-Za-z0-9]*)").unwrap();
    static ref HEX_LITERAL: Regex = Regex::new(r"\b0[xX]([0-9A-Fa-f]+)\b").unwrap();
    static ref CHILDREN_SLICE: Regex = Regex::new(r":children\(").unwrap();
    static ref CHILDREN_WORD: Regex = Regex::new(r":children\b").unwrap();
    static ref NTH_CHILD: Regex = Regex::new(r":nth-child\((\d+)\)").unwrap();
    static ref ATTR_CALL: Regex = Regex::new(r":attr\(\s*([A-Za-z_][\w-]*)\s*\)").unwrap();
    static ref ATTRS_WORD: Regex = Regex::new(r":(?:attributes|attrs)\b").unwrap();
    static ref ORDINAL: Regex = Regex::new(
        r":(first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth|last)\b"
    )
    .unwrap();
    static ref STRAY_PSEUDO: Regex = Regex::new(r":[A-Za-z][\w-]*").unwrap();
}

/// Given `bytes[open]` at a quote, the index just past the closing quote
/// (or the end of input when unterminated).
fn skip_string(bytes: &[u8], open: usize) -> usize {
    let quote = bytes[open];
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Apply an infallible rewrite to the spans outside string literals.
fn rewrite_outside(text: &str, apply: impl Fn(&str) -> String) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'"' || bytes[i] == b'\'' {
            out.push_str(&apply(&text[start..i]));
            let end = skip_string(bytes, i);
            out.push_str(&text[i..end]);
            start = end;
            i = end;
        } else {
            i += 1;
        }
    }
    out.push_str(&apply(&text[start..]));
    out
}

/// Fallible variant of [`rewrite_outside`].
fn try_rewrite_outside(
    text: &str,
    apply: impl Fn(&str) -> Result<String, CompileError>,
) -> Result<String, CompileError> {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'"' || bytes[i] == b'\'' {
            out.push_str(&apply(&text[start..i])?);
            let end = skip_string(bytes, i);
            out.push_str(&text[i..end]);
            start = end;
            i = end;
        } else {
            i += 1;
        }
    }
    out.push_str(&apply(&text[start..])?);
    Ok(out)
}

/// Drop `#` line comments, leaving string literals intact.
pub(crate) fn strip_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'#' => {
                out.push_str(&text[start..i]);
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                start = i;
            }
            _ => i += 1,
        }
    }
    out.push_str(&text[start..]);
    out
}

/// Split on `;` outside quotes and outside brackets.
pub(crate) fn split_statements(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'(' | b'[' => {
                depth += 1;
                i += 1;
            }
            b')' | b']' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            b';' if depth == 0 => {
                parts.push(&text[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Offset of `word` standing alone outside quotes. A preceding `$` or `.`
/// disqualifies a match so rewritten output is not rewritten again.
fn find_keyword(text: &str, word: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => i = skip_string(bytes, i),
            _ => {
                if text[i..].starts_with(word) {
                    let before_ok = i == 0 || {
                        let p = bytes[i - 1];
                        !is_word_byte(p) && p != b'$' && p != b'.'
                    };
                    let after = bytes.get(i + word.len());
                    let after_ok = after.map(|&b| !is_word_byte(b)).unwrap_or(true);
                    if before_ok && after_ok {
                        return Some(i);
                    }
                }
                i += 1;
            }
        }
    }
    None
}

/// True when a lower-precedence keyword starts at `i`.
fn at_stop_word(text: &str, i: usize) -> bool {
    const STOPS: [&str; 6] = ["contains", "has", "and", "or", "is", "as"];
    let bytes = text.as_bytes();
    if i > 0 {
        let p = bytes[i - 1];
        if is_word_byte(p) || p == b'$' || p == b'.' {
            return false;
        }
    }
    STOPS.iter().any(|w| {
        text[i..].starts_with(w)
            && bytes
                .get(i + w.len())
                .map(|&b| !is_word_byte(b))
                .unwrap_or(true)
    })
}

/// Extent of the operand following a rewritten keyword: balanced through
/// brackets and quotes, ending at a top-level delimiter, comparison, or
/// lower-precedence keyword.
fn operand_extent(text: &str, from: usize) -> (usize, usize) {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    let start = i;
    let mut depth = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'(' | b'[' => {
                depth += 1;
                i += 1;
            }
            b')' | b']' => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                i += 1;
            }
            b',' | b';' | b'=' | b'<' | b'>' if depth == 0 => break,
            b'!' if depth == 0 && bytes.get(i + 1) == Some(&b'=') => break,
            _ => {
                if depth == 0 && at_stop_word(text, i) {
                    break;
                }
                i += 1;
            }
        }
    }
    let mut end = i;
    while end > start && bytes[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    (start, end)
}

/// `typeof <operand>` becomes `$typeof(<operand>)`.
fn rewrite_typeof(text: &str) -> String {
    let mut out = text.to_string();
    while let Some(kw) = find_keyword(&out, "typeof") {
        let (start, end) = operand_extent(&out, kw + "typeof".len());
        let mut next = String::with_capacity(out.len() + 4);
        next.push_str(&out[..kw]);
        next.push_str("$typeof(");
        next.push_str(&out[start..end]);
        next.push(')');
        next.push_str(&out[end..]);
        out = next;
    }
    out
}

/// `<lhs> <word> <operand>` becomes `<lhs>.$<binding>(<operand>)`.
fn rewrite_infix(text: &str, word: &str, binding: &str) -> String {
    let mut out = text.to_string();
    while let Some(kw) = find_keyword(&out, word) {
        let lhs_end = out[..kw].trim_end().len();
        let (start, end) = operand_extent(&out, kw + word.len());
        let mut next = String::with_capacity(out.len() + 8);
        next.push_str(&out[..lhs_end]);
        next.push_str(".$");
        next.push_str(binding);
        next.push('(');
        next.push_str(&out[start..end]);
        next.push(')');
        next.push_str(&out[end..]);
        out = next;
    }
    out
}

/// `as <Type>` casts against the closed cast vocabulary.
fn apply_casts(seg: &str) -> Result<String, CompileError> {
    let mut out = String::with_capacity(seg.len());
    let mut last = 0;
    for caps in AS_CAST.captures_iter(seg) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(word) = caps.get(1) else { continue };
        let (_, name) = casts::cast_for(word.as_str()).ok_or_else(|| {
            CompileError::UnknownCast {
                token: word.as_str().to_string(),
            }
        })?;
        out.push_str(&seg[last..whole.start()]);
        out.push_str(".$");
        out.push_str(name);
        out.push_str("()");
        last = whole.end();
    }
    out.push_str(&seg[last..]);
    Ok(out)
}

/// `is [not] <Type>` predicates against the fixed type table.
fn apply_predicates(seg: &str) -> Result<String, CompileError> {
    let negated = splice_predicates(seg, &IS_NOT_PRED, true)?;
    splice_predicates(&negated, &IS_PRED, false)
}

fn splice_predicates(seg: &str, re: &Regex, negate: bool) -> Result<String, CompileError> {
    let mut out = String::with_capacity(seg.len());
    let mut last = 0;
    for caps in re.captures_iter(seg) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(word) = caps.get(1) else { continue };
        let name = casts::predicate_for(word.as_str()).ok_or_else(|| {
            CompileError::UnknownPredicate {
                token: word.as_str().to_string(),
            }
        })?;
        out.push_str(&seg[last..whole.start()]);
        out.push_str(".$");
        out.push_str(name);
        out.push_str("()");
        if negate {
            out.push_str(".$not()");
        }
        last = whole.end();
    }
    out.push_str(&seg[last..]);
    Ok(out)
}

/// Hex integer literals become decimal. A literal wider than u64 is
/// rejected under its original spelling rather than leaking a mangled
/// token into path lexing.
fn apply_hex(seg: &str) -> Result<String, CompileError> {
    let mut out = String::with_capacity(seg.len());
    let mut last = 0;
    for caps in HEX_LITERAL.captures_iter(seg) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(digits) = caps.get(1) else { continue };
        let n =
            u64::from_str_radix(digits.as_str(), 16).map_err(|_| CompileError::Syntax {
                token: whole.as_str().to_string(),
            })?;
        out.push_str(&seg[last..whole.start()]);
        out.push_str(&n.to_string());
        last = whole.end();
    }
    out.push_str(&seg[last..]);
    Ok(out)
}

/// `:nth-child(n)` is literal and 1-based; 0 is rejected.
fn apply_nth_child(seg: &str) -> Result<String, CompileError> {
    let mut out = String::with_capacity(seg.len());
    let mut last = 0;
    for caps in NTH_CHILD.captures_iter(seg) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(digits) = caps.get(1) else { continue };
        let n: u64 = digits.as_str().parse().map_err(|_| CompileError::Syntax {
            token: whole.as_str().to_string(),
        })?;
        if n == 0 {
            return Err(CompileError::Syntax {
                token: whole.as_str().to_string(),
            });
        }
        out.push_str(&seg[last..whole.start()]);
        out.push_str(&format!(".children[{}]", n - 1));
        last = whole.end();
    }
    out.push_str(&seg[last..]);
    Ok(out)
}

/// Phase 1 navigation sugar, with a trailing check that no `:pseudo`
/// survived.
fn apply_navigation(seg: &str) -> Result<String, CompileError> {
    let step = CHILDREN_SLICE.replace_all(seg, ".children.$$slice(");
    let step = CHILDREN_WORD.replace_all(&step, ".children");
    let step = apply_nth_child(&step)?;
    let step = ATTR_CALL.replace_all(&step, |caps: &Captures| {
        format!(".{}", norm::fold_key(&caps[1]))
    });
    let step = ATTRS_WORD.replace_all(&step, ".attributes");
    let step = ORDINAL.replace_all(&step, |caps: &Captures| {
        match &caps[1] {
            "first" => "[0]",
            "second" => "[1]",
            "third" => "[2]",
            "fourth" => "[3]",
            "fifth" => "[4]",
            "sixth" => "[5]",
            "seventh" => "[6]",
            "eighth" => "[7]",
            "ninth" => "[8]",
            "tenth" => "[9]",
            "last" => "[-1]",
            other => return format!(":{}", other),
        }
        .to_string()
    });
    if let Some(stray) = STRAY_PSEUDO.find(&step) {
        return Err(CompileError::Syntax {
            token: stray.as_str().to_string(),
        });
    }
    Ok(step.into_owned())
}

/// Rewrite one expression statement through every phase, ending with the
/// caller's transforms and final cleanup.
pub(crate) fn rewrite_expression(
    text: &str,
    transforms: &[Transform],
) -> Result<String, CompileError> {
    let step = rewrite_outside(text, |seg| {
        LITERAL_KEYWORD
            .replace_all(seg, |caps: &Captures| caps[1].to_ascii_lowercase())
            .into_owned()
    });
    let step = rewrite_outside(&step, |seg| ROOT_ALIAS.replace_all(seg, "$$").into_owned());
    let step = rewrite_outside(&step, |seg| SHORTHAND.replace_all(seg, ".$1").into_owned());
    let step = rewrite_typeof(&step);
    let step = rewrite_infix(&step, "contains", "contains");
    let step = rewrite_infix(&step, "has", "has");
    let step = try_rewrite_outside(&step, apply_casts)?;
    let step = try_rewrite_outside(&step, apply_predicates)?;
    let step = try_rewrite_outside(&step, apply_hex)?;
    let step = try_rewrite_outside(&step, apply_navigation)?;

    let mut step = step;
    for transform in transforms {
        step = rewrite_outside(&step, |seg| transform.apply(seg));
    }
    let step = strip_comments(&step);
    let trimmed = step.trim();
    if trimmed.starts_with('.') || trimmed.starts_with(',') {
        Ok(format!("${}", trimmed))
    } else {
        Ok(trimmed.to_string())
    }
}
