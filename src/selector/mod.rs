//! Selector compiler: compact selector syntax to path-expression source.
//!
//! Input splits into `;`-separated statements. `let` and `import`
//! statements compile to nothing and are carried as side-effect records on
//! the compiled result; the remaining statements rewrite through the
//! ordered phases in [`phases`] and join back into one sequenced
//! expression. Compilation is deterministic, so results are cacheable by
//! input text.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::CompileError;
use crate::path::{self, CompiledPath};

pub mod casts;
mod phases;

lazy_static! {
    static ref LET_BINDING: Regex =
        Regex::new(r"(?s)^\s*([A-Za-z_][\w-]*)\s*=\s*(.+)$").unwrap();
}

/// A caller-registered rewrite, applied after the built-in phases.
///
/// The replacement may use `$1`-style capture references. Transforms see
/// only the spans outside string literals.
#[derive(Debug, Clone)]
pub struct Transform {
    pattern: Regex,
    replacement: String,
}

impl Transform {
    pub fn new(pattern: &str, replacement: &str) -> Result<Transform, CompileError> {
        let pattern = Regex::new(pattern).map_err(|_| CompileError::Syntax {
            token: pattern.to_string(),
        })?;
        Ok(Transform {
            pattern,
            replacement: replacement.to_string(),
        })
    }

    pub(crate) fn apply(&self, seg: &str) -> String {
        self.pattern
            .replace_all(seg, self.replacement.as_str())
            .into_owned()
    }
}

/// An import target named by an `import` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportRequest {
    /// Quoted target, taken verbatim.
    Literal(String),
    /// Unquoted target, normalized by the context before loading.
    Expression(String),
}

impl ImportRequest {
    pub fn text(&self) -> &str {
        match self {
            ImportRequest::Literal(s) => s,
            ImportRequest::Expression(s) => s,
        }
    }
}

/// A compiled selector: the rendered path-expression source, its compiled
/// ops, and the side-effect records the context re-applies on each run.
#[derive(Debug, Clone)]
pub struct Compiled {
    /// Rendered path-expression source after all phases.
    pub source: String,
    /// Compiled ops for the joined expression.
    pub path: CompiledPath,
    /// `let` statements in order: name and raw right-hand side.
    pub variables_declared: Vec<(String, String)>,
    /// `import` statements in order.
    pub imports_requested: Vec<ImportRequest>,
}

/// Compile selector text through every phase.
pub fn compile(text: &str, transforms: &[Transform]) -> Result<Compiled, CompileError> {
    let stripped = phases::strip_comments(text);
    let mut variables_declared = Vec::new();
    let mut imports_requested = Vec::new();
    let mut rendered: Vec<String> = Vec::new();

    for statement in phases::split_statements(&stripped) {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        if let Some(rest) = keyword_statement(statement, "let") {
            variables_declared.push(parse_let(rest)?);
            continue;
        }
        if let Some(rest) = keyword_statement(statement, "import") {
            imports_requested.push(parse_import(rest.trim())?);
            continue;
        }
        if let Some(rest) = keyword_statement(statement, "print") {
            let inner = phases::rewrite_expression(rest, transforms)?;
            rendered.push(format!("$print({})", inner));
            continue;
        }
        rendered.push(phases::rewrite_expression(statement, transforms)?);
    }

    let source = rendered.join("; ");
    let path = path::compile(&source)?;
    Ok(Compiled {
        source,
        path,
        variables_declared,
        imports_requested,
    })
}

/// The remainder of `statement` when it opens with `word` as a whole word.
fn keyword_statement<'a>(statement: &'a str, word: &str) -> Option<&'a str> {
    let rest = statement.strip_prefix(word)?;
    match rest.chars().next() {
        Some(c) if c.is_whitespace() => Some(rest),
        None => Some(rest),
        _ => None,
    }
}

fn parse_let(rest: &str) -> Result<(String, String), CompileError> {
    let caps = LET_BINDING
        .captures(rest)
        .ok_or_else(|| CompileError::Syntax {
            token: token_preview(rest),
        })?;
    Ok((caps[1].to_string(), caps[2].trim().to_string()))
}

fn parse_import(target: &str) -> Result<ImportRequest, CompileError> {
    if target.is_empty() {
        return Err(CompileError::UnexpectedEnd {
            token: "import".to_string(),
        });
    }
    let mut chars = target.chars();
    let first = chars.next();
    if let Some(quote) = first.filter(|c| *c == '"' || *c == '\'') {
        let mut name = String::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        name.push(escaped);
                    }
                }
                c if c == quote => {
                    closed = true;
                    break;
                }
                c => name.push(c),
            }
        }
        if !closed {
            return Err(CompileError::UnterminatedString {
                token: token_preview(target),
            });
        }
        return Ok(ImportRequest::Literal(name));
    }
    Ok(ImportRequest::Expression(target.to_string()))
}

fn token_preview(s: &str) -> String {
    s.trim().chars().take(16).collect()
}
