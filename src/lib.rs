//! tagpath - tag-tree documents with a path-based selector dialect
//!
//! The pipeline, front to back:
//! - scan: incremental markup tokenizer (feed chunks, drain events)
//! - build: folds scan events into a mutable tree arena
//! - selector: rewrites the query dialect into path expressions
//! - path: lexes, parses, compiles and evaluates path expressions
//! - context: per-target evaluation state (assignments, imports, output)
//! - session: shared compile cache, transforms, extensions, import loader
//!
//! ```
//! use tagpath::{Document, ParseOptions, Session};
//!
//! # fn main() -> Result<(), tagpath::Error> {
//! let doc = Document::parse_str(
//!     "<list><item>hi</item><item>yo</item></list>",
//!     ParseOptions::default(),
//! )?;
//! let session = Session::new();
//! let value = doc.query(&session, "[name=\"item\"]:first:text")?;
//! assert_eq!(value.to_string(), "hi");
//! # Ok(())
//! # }
//! ```

pub mod build;
pub mod context;
pub mod document;
pub mod error;
pub mod model;
pub mod norm;
pub mod parallel;
pub mod path;
pub mod scan;
pub mod selector;
pub mod session;
pub mod tree;
pub mod value;

mod sync;

pub use context::{Context, Evaluation, ImportCell, ImportLoader};
pub use document::{Document, DocumentParser, ParseOptions, Ready};
pub use error::{
    AttachmentError, CompileError, Error, EvalError, ImportError, ParseError, Result,
};
pub use parallel::{evaluate_parallel, query_map, select_map};
pub use selector::Transform;
pub use session::Session;
pub use tree::{
    JsonOptions, MarkupOptions, NodeId, NodeKind, Tree, TreeHooks, TreeNode, Walk,
};
pub use value::{Fragment, TextLeaf, Value};
