//! Document facade: parsing entry points and readiness.
//!
//! A document is a tree plus a one-shot readiness cell. The synchronous
//! entry points settle readiness before returning; [`DocumentParser`]
//! exposes the incremental path, settling on `finish` or rejecting with
//! [`ParseError::Aborted`] when dropped mid-stream.

use std::io::Read;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::build::{BuildOptions, TreeBuilder};
use crate::context::Context;
use crate::error::{Error, ParseError};
use crate::scan::{ScanOptions, Tokenizer};
use crate::session::Session;
use crate::sync::Deferred;
use crate::tree::{JsonOptions, MarkupOptions, NodeId, Tree};
use crate::value::Value;

/// Parsing configuration for both the tokenizer and the builder.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    pub scan: ScanOptions,
    pub build: BuildOptions,
}

/// Shareable handle on a parse's outcome. Cloned handles observe the same
/// one-shot cell from any thread.
#[derive(Clone)]
pub struct Ready {
    cell: Arc<Deferred<Result<(), ParseError>>>,
}

impl Ready {
    fn unsettled() -> Self {
        Ready {
            cell: Arc::new(Deferred::new()),
        }
    }

    /// Block until the parse ends one way or the other.
    pub fn wait(&self) -> Result<(), ParseError> {
        self.cell.wait()
    }

    /// Non-blocking look at the outcome.
    pub fn peek(&self) -> Option<Result<(), ParseError>> {
        self.cell.peek()
    }

    pub fn is_settled(&self) -> bool {
        self.cell.peek().is_some()
    }
}

/// A parsed document.
pub struct Document {
    tree: Tree,
    ready: Ready,
}

impl Document {
    /// Parse from a reader, streaming through the incremental parser.
    pub fn parse(mut reader: impl Read, options: ParseOptions) -> Result<Document, Error> {
        let mut parser = DocumentParser::new(options);
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            parser.feed(&buf[..n]);
        }
        parser.finish().map_err(Error::from)
    }

    pub fn parse_str(input: &str, options: ParseOptions) -> Result<Document, ParseError> {
        Self::parse_bytes(input.as_bytes(), options)
    }

    pub fn parse_bytes(input: &[u8], options: ParseOptions) -> Result<Document, ParseError> {
        let mut parser = DocumentParser::new(options);
        parser.feed(input);
        parser.finish()
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// The readiness handle; settled by the time a `Document` exists.
    pub fn ready(&self) -> Ready {
        self.ready.clone()
    }

    /// Compile and run a selector against this document's root, blocking on
    /// any imports it requests.
    pub fn query(&self, session: &Session, selector: &str) -> Result<Value, Error> {
        let mut context = Context::new(&self.tree, session);
        context.query(selector)
    }

    /// A fresh evaluation context for this document. Use this instead of
    /// [`Document::query`] when assignments or imports should carry across
    /// several selectors.
    pub fn context<'a>(&'a self, session: &'a Session) -> Context<'a> {
        Context::new(&self.tree, session)
    }

    pub fn serialize(&self, opts: &MarkupOptions) -> String {
        crate::tree::serialize::serialize(&self.tree, self.tree.root(), opts)
    }

    pub fn to_json(&self, opts: &JsonOptions) -> serde_json::Value {
        crate::tree::serialize::to_json(&self.tree, self.tree.root(), opts)
    }
}

/// Incremental parser: feed chunks, then `finish`.
///
/// Dropping a parser without finishing rejects its readiness handle with
/// [`ParseError::Aborted`].
pub struct DocumentParser {
    tokenizer: Tokenizer,
    builder: Option<TreeBuilder>,
    ready: Ready,
}

impl DocumentParser {
    pub fn new(options: ParseOptions) -> Self {
        Self::with_tree(Tree::new(), options)
    }

    /// Build into a caller-supplied tree so pre-registered hooks observe
    /// the parse.
    pub fn with_tree(tree: Tree, options: ParseOptions) -> Self {
        DocumentParser {
            tokenizer: Tokenizer::with_options(options.scan),
            builder: Some(TreeBuilder::with_tree(tree, options.build)),
            ready: Ready::unsettled(),
        }
    }

    /// Readiness handle; hand clones to anything that needs to block on or
    /// observe the outcome of this parse.
    pub fn ready(&self) -> Ready {
        self.ready.clone()
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        if let Some(builder) = &mut self.builder {
            for event in self.tokenizer.feed(chunk) {
                builder.handle(event);
            }
        }
    }

    pub fn finish(mut self) -> Result<Document, ParseError> {
        let events = self.tokenizer.finish();
        let mut builder = match self.builder.take() {
            Some(b) => b,
            None => return Err(ParseError::Aborted),
        };
        for event in events {
            builder.handle(event);
        }
        let outcome = builder
            .outcome()
            .cloned()
            .unwrap_or(Err(ParseError::Aborted));
        self.ready.cell.resolve(outcome.clone());
        match outcome {
            Ok(()) => Ok(Document {
                tree: builder.into_tree(),
                ready: self.ready.clone(),
            }),
            Err(err) => Err(err),
        }
    }
}

impl Drop for DocumentParser {
    fn drop(&mut self) {
        // No-op when finish already settled the cell.
        self.ready.cell.resolve(Err(ParseError::Aborted));
    }
}
