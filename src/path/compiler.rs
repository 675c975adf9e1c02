//! Path expression compiler.
//!
//! Flattens the parsed AST into a compact op sequence for the stack
//! evaluator. Predicate filters compile to nested programs evaluated once
//! per candidate item.

use crate::error::CompileError;

use super::parser::{self, BinaryOp, Expr};

/// Compiled path expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPath {
    pub ops: Vec<Op>,
}

/// Compiled operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Push the focus value.
    Focus,
    /// Push a literal number.
    Number(f64),
    /// Push a literal string.
    Str(String),
    /// Push a literal boolean.
    Bool(bool),
    /// Push null.
    Null,
    /// Push a variable's value (null when unbound).
    Variable(String),
    /// Pop a base value, push the named property step over it.
    Field(String),
    /// Pop a base value, push the indexed item (negative from the end).
    Index(i64),
    /// Pop a base value, push the items its subtree contributes.
    Descend,
    /// Pop a base value, keep the items the predicate accepts.
    Filter(Box<CompiledPath>),
    /// Pop n values, push them as an array.
    Array(usize),
    /// Pop n values, push the last non-null one.
    Sequence(usize),
    /// Pop argc arguments, call the named binding.
    Call(String, usize),
    /// Pop two values, apply a binary operator.
    Binary(BinaryOp),
    /// Pop one value, negate numerically.
    Negate,
}

impl CompiledPath {
    /// Compile a parsed expression.
    pub fn from_expr(expr: &Expr) -> Self {
        let mut ops = Vec::new();
        Self::compile_expr(expr, &mut ops);
        CompiledPath { ops }
    }

    fn compile_expr(expr: &Expr, ops: &mut Vec<Op>) {
        match expr {
            Expr::Focus => ops.push(Op::Focus),
            Expr::Number(n) => ops.push(Op::Number(*n)),
            Expr::Str(s) => ops.push(Op::Str(s.clone())),
            Expr::Bool(b) => ops.push(Op::Bool(*b)),
            Expr::Null => ops.push(Op::Null),
            Expr::Variable(name) => ops.push(Op::Variable(name.clone())),
            Expr::Call(name, args) => {
                for arg in args {
                    Self::compile_expr(arg, ops);
                }
                ops.push(Op::Call(name.clone(), args.len()));
            }
            Expr::Field(base, name) => {
                Self::compile_expr(base, ops);
                ops.push(Op::Field(name.clone()));
            }
            Expr::Method(base, name, args) => {
                // the base value becomes the binding's first argument
                Self::compile_expr(base, ops);
                for arg in args {
                    Self::compile_expr(arg, ops);
                }
                ops.push(Op::Call(name.clone(), args.len() + 1));
            }
            Expr::Index(base, i) => {
                Self::compile_expr(base, ops);
                ops.push(Op::Index(*i));
            }
            Expr::Filter(base, pred) => {
                Self::compile_expr(base, ops);
                let compiled = CompiledPath::from_expr(pred);
                ops.push(Op::Filter(Box::new(compiled)));
            }
            Expr::Descend(base) => {
                Self::compile_expr(base, ops);
                ops.push(Op::Descend);
            }
            Expr::Array(items) => {
                for item in items {
                    Self::compile_expr(item, ops);
                }
                ops.push(Op::Array(items.len()));
            }
            Expr::Sequence(items) => {
                for item in items {
                    Self::compile_expr(item, ops);
                }
                ops.push(Op::Sequence(items.len()));
            }
            Expr::Binary(left, op, right) => {
                Self::compile_expr(left, ops);
                Self::compile_expr(right, ops);
                ops.push(Op::Binary(*op));
            }
            Expr::Neg(inner) => {
                Self::compile_expr(inner, ops);
                ops.push(Op::Negate);
            }
        }
    }
}

/// Compile path expression source. Empty source compiles to a null result.
pub fn compile(source: &str) -> Result<CompiledPath, CompileError> {
    if source.trim().is_empty() {
        return Ok(CompiledPath {
            ops: vec![Op::Null],
        });
    }
    let expr = parser::parse(source)?;
    Ok(CompiledPath::from_expr(&expr))
}
