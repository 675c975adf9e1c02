//! Path expression engine.
//!
//! The target dialect selectors compile into: `$` is the query target,
//! `.field` steps through the live model view with sequence semantics,
//! `[...]` indexes or filters, `$name` reads a variable and `$name(...)`
//! calls a binding. Expressions are lexed, parsed to an AST, flattened to
//! a compact op sequence and run on a small stack machine.

pub mod compiler;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use compiler::{compile, CompiledPath, Op};
pub use eval::{evaluate, BindingFn, Bindings, EvalScope, NoVars, VarSource};
pub use parser::BinaryOp;
