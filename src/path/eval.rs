//! Path expression evaluation engine.
//!
//! Runs compiled ops on a value stack. Property steps go through the live
//! model view; stepping over a collection maps item-wise with sequence
//! semantics: nulls drop, nested collections flatten one level, an empty
//! result is null and a singleton result unwraps to its item.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::EvalError;
use crate::model;
use crate::norm;
use crate::tree::{NodeId, Tree};
use crate::value::{Fragment, TextLeaf, Value};

use super::compiler::{CompiledPath, Op};
use super::parser::BinaryOp;

/// Variable resolution for `$name` references.
pub trait VarSource {
    fn resolve(&self, name: &str) -> Option<Value>;
}

impl VarSource for IndexMap<String, Value> {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// An empty variable source.
pub struct NoVars;

impl VarSource for NoVars {
    fn resolve(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// A named callable reachable as `$name(...)` from expressions.
pub type BindingFn =
    Arc<dyn Fn(&EvalScope<'_>, &[Value]) -> Result<Value, EvalError> + Send + Sync>;

/// Named callables available to an evaluation.
#[derive(Clone, Default)]
pub struct Bindings {
    table: IndexMap<String, BindingFn>,
}

impl Bindings {
    pub fn new() -> Self {
        Bindings {
            table: IndexMap::new(),
        }
    }

    /// Register a callable, replacing any previous one of the same name.
    pub fn register(&mut self, name: &str, binding: BindingFn) {
        self.table.insert(name.to_string(), binding);
    }

    /// Register a plain closure.
    pub fn register_fn<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&EvalScope<'_>, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<&BindingFn> {
        self.table.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl std::fmt::Debug for Bindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bindings")
            .field("names", &self.table.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Evaluation scope: the tree under query, the focus value, variable and
/// binding tables, and the print output buffer.
#[derive(Clone, Copy)]
pub struct EvalScope<'a> {
    pub tree: &'a Tree,
    pub focus: &'a Value,
    pub vars: &'a dyn VarSource,
    pub bindings: &'a Bindings,
    pub output: &'a RefCell<String>,
}

impl<'a> EvalScope<'a> {
    /// The same scope focused on another value (used per filter item).
    pub fn with_focus<'b>(&self, focus: &'b Value) -> EvalScope<'b>
    where
        'a: 'b,
    {
        EvalScope {
            tree: self.tree,
            focus,
            vars: self.vars,
            bindings: self.bindings,
            output: self.output,
        }
    }
}

/// Evaluate a compiled path expression.
pub fn evaluate(expr: &CompiledPath, scope: &EvalScope<'_>) -> Result<Value, EvalError> {
    let mut stack: Vec<Value> = Vec::new();

    for op in &expr.ops {
        match op {
            Op::Focus => stack.push(scope.focus.clone()),
            Op::Number(n) => stack.push(Value::Number(*n)),
            Op::Str(s) => stack.push(Value::Str(s.clone())),
            Op::Bool(b) => stack.push(Value::Bool(*b)),
            Op::Null => stack.push(Value::Null),

            Op::Variable(name) => {
                stack.push(scope.vars.resolve(name).unwrap_or(Value::Null));
            }

            Op::Field(name) => {
                let base = pop(&mut stack);
                stack.push(step_field(scope, &base, name)?);
            }

            Op::Index(index) => {
                let base = pop(&mut stack);
                stack.push(index_value(&base, *index));
            }

            Op::Descend => {
                let base = pop(&mut stack);
                let mut seen = HashSet::new();
                let mut out = Vec::new();
                descend_into(scope.tree, &base, &mut seen, &mut out);
                stack.push(Value::Fragment(Fragment::new(out)));
            }

            Op::Filter(pred) => {
                let base = pop(&mut stack);
                stack.push(apply_filter(scope, &base, pred)?);
            }

            Op::Array(n) => {
                let items = drain(&mut stack, *n);
                stack.push(Value::Array(items));
            }

            Op::Sequence(n) => {
                let items = drain(&mut stack, *n);
                let value = items
                    .into_iter()
                    .rev()
                    .find(|v| !matches!(v, Value::Null))
                    .unwrap_or(Value::Null);
                stack.push(value);
            }

            Op::Call(name, argc) => {
                let args = drain(&mut stack, *argc);
                let binding = scope
                    .bindings
                    .get(name)
                    .ok_or_else(|| EvalError::UnknownBinding(name.clone()))?
                    .clone();
                stack.push(binding(scope, &args)?);
            }

            Op::Binary(op) => {
                let right = pop(&mut stack);
                let left = pop(&mut stack);
                stack.push(binary(*op, &left, &right));
            }

            Op::Negate => {
                let value = pop(&mut stack);
                stack.push(Value::Number(-value.as_number()));
            }
        }
    }

    Ok(stack.pop().unwrap_or(Value::Null))
}

fn pop(stack: &mut Vec<Value>) -> Value {
    stack.pop().unwrap_or(Value::Null)
}

fn drain(stack: &mut Vec<Value>, n: usize) -> Vec<Value> {
    let at = stack.len().saturating_sub(n);
    stack.split_off(at)
}

/// Resolve one property step, mapping over collections.
fn step_field(scope: &EvalScope<'_>, base: &Value, name: &str) -> Result<Value, EvalError> {
    match base {
        Value::Null => Ok(Value::Null),
        Value::Array(items) => map_step(scope, items, name),
        Value::Fragment(f) => map_step(scope, f.items(), name),
        single => Ok(field_of(scope, single, name)),
    }
}

fn map_step(scope: &EvalScope<'_>, items: &[Value], name: &str) -> Result<Value, EvalError> {
    let mut out = Vec::new();
    for item in items {
        match step_field(scope, item, name)? {
            Value::Null => {}
            Value::Array(nested) => out.extend(nested),
            Value::Fragment(nested) => out.extend(nested.iter().cloned()),
            other => out.push(other),
        }
    }
    Ok(collect_sequence(out))
}

/// Pack step results: empty is null, a singleton unwraps, more stay a
/// fragment.
pub(crate) fn collect_sequence(mut items: Vec<Value>) -> Value {
    match items.len() {
        0 => Value::Null,
        1 => items.pop().unwrap_or(Value::Null),
        _ => Value::Fragment(Fragment::new(items)),
    }
}

/// Resolve one property on a single (non-collection) value.
fn field_of(scope: &EvalScope<'_>, value: &Value, name: &str) -> Value {
    match value {
        Value::Node(id) => model::synthesize(scope.tree, *id)
            .get(name)
            .unwrap_or(Value::Null),
        Value::Object(map) => map
            .get(name)
            .or_else(|| map.get(norm::fold_key(name).as_str()))
            .cloned()
            .unwrap_or(Value::Null),
        Value::Text(t) => string_field(t.as_str(), name, true),
        Value::Str(s) => string_field(s, name, false),
        _ => Value::Null,
    }
}

/// Pseudo-fields on string content. Text leaves keep producing text leaves.
fn string_field(content: &str, name: &str, textish: bool) -> Value {
    let wrap = |s: String| {
        if textish {
            Value::Text(TextLeaf(s))
        } else {
            Value::Str(s)
        }
    };
    match name {
        "length" => Value::Number(content.chars().count() as f64),
        "trim" => wrap(content.trim().to_string()),
        "uppercase" => wrap(content.to_uppercase()),
        "lowercase" => wrap(content.to_lowercase()),
        "text" => Value::Text(TextLeaf::new(content)),
        "value" => norm::classify(content),
        _ => Value::Null,
    }
}

/// Collect the items a value contributes to a subtree search: nodes expand
/// to themselves plus all descendants, collections flatten, scalars pass
/// through as themselves.
fn descend_into(tree: &Tree, value: &Value, seen: &mut HashSet<NodeId>, out: &mut Vec<Value>) {
    match value {
        Value::Node(id) => {
            for node in tree.self_and_descendants(*id) {
                if seen.insert(node) {
                    out.push(Value::Node(node));
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                descend_into(tree, item, seen, out);
            }
        }
        Value::Fragment(f) => {
            for item in f.iter() {
                descend_into(tree, item, seen, out);
            }
        }
        Value::Null => {}
        other => out.push(other.clone()),
    }
}

fn apply_filter(
    scope: &EvalScope<'_>,
    base: &Value,
    pred: &CompiledPath,
) -> Result<Value, EvalError> {
    match base {
        Value::Null => Ok(Value::Null),
        Value::Array(items) => filter_items(scope, items, pred),
        Value::Fragment(f) => filter_items(scope, f.items(), pred),
        single => {
            if filter_keeps(scope, single, 0, 1, pred)? {
                Ok(single.clone())
            } else {
                Ok(Value::Null)
            }
        }
    }
}

fn filter_items(
    scope: &EvalScope<'_>,
    items: &[Value],
    pred: &CompiledPath,
) -> Result<Value, EvalError> {
    let len = items.len();
    let mut out = Vec::new();
    for (position, item) in items.iter().enumerate() {
        if filter_keeps(scope, item, position, len, pred)? {
            out.push(item.clone());
        }
    }
    Ok(collect_sequence(out))
}

/// A numeric predicate selects by position (negative from the end); any
/// other predicate keeps truthy matches.
fn filter_keeps(
    scope: &EvalScope<'_>,
    item: &Value,
    position: usize,
    len: usize,
    pred: &CompiledPath,
) -> Result<bool, EvalError> {
    let sub = scope.with_focus(item);
    let verdict = evaluate(pred, &sub)?;
    Ok(match verdict {
        Value::Number(n) => {
            let wanted = n.trunc();
            wanted == position as f64 || wanted == position as f64 - len as f64
        }
        other => other.truthy(),
    })
}

/// Index into a collection; a non-collection answers to 0 and -1 as itself.
fn index_value(value: &Value, index: i64) -> Value {
    match value {
        Value::Array(items) => pick(items, index),
        Value::Fragment(f) => f.get(index).cloned().unwrap_or(Value::Null),
        Value::Null => Value::Null,
        other => {
            if index == 0 || index == -1 {
                other.clone()
            } else {
                Value::Null
            }
        }
    }
}

fn pick(items: &[Value], index: i64) -> Value {
    let len = items.len() as i64;
    let i = if index < 0 { len + index } else { index };
    if i < 0 || i >= len {
        Value::Null
    } else {
        items[i as usize].clone()
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Or => Value::Bool(left.truthy() || right.truthy()),
        BinaryOp::And => Value::Bool(left.truthy() && right.truthy()),
        BinaryOp::Eq => Value::Bool(eq_values(left, right)),
        BinaryOp::NotEq => Value::Bool(!eq_values(left, right)),
        BinaryOp::Lt => Value::Bool(matches!(cmp_values(left, right), Some(Ordering::Less))),
        BinaryOp::LtEq => Value::Bool(matches!(
            cmp_values(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(matches!(cmp_values(left, right), Some(Ordering::Greater))),
        BinaryOp::GtEq => Value::Bool(matches!(
            cmp_values(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(op, left, right)
        }
    }
}

/// Type-aware equality: numbers numerically, string content by content,
/// collections item-wise with singleton unwrapping, mixed types through
/// numeric coercion.
pub(crate) fn eq_values(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Date(a), Value::Date(b)) => a == b,
        (Value::Node(a), Value::Node(b)) => a == b,
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).map(|w| eq_values(v, w)).unwrap_or(false))
        }
        (l, r) => {
            if let (Some(a), Some(b)) = (l.as_str(), r.as_str()) {
                return a == b;
            }
            match (l.as_slice(), r.as_slice()) {
                (Some(a), Some(b)) => {
                    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| eq_values(x, y))
                }
                (Some(a), None) if a.len() == 1 => eq_values(&a[0], r),
                (None, Some(b)) if b.len() == 1 => eq_values(l, &b[0]),
                _ => {
                    let (a, b) = (l.as_number(), r.as_number());
                    !a.is_nan() && !b.is_nan() && a == b
                }
            }
        }
    }
}

/// Ordering: numeric when both sides coerce, lexical when both carry string
/// content, otherwise unordered.
pub(crate) fn cmp_values(left: &Value, right: &Value) -> Option<Ordering> {
    let (a, b) = (left.as_number(), right.as_number());
    if !a.is_nan() && !b.is_nan() {
        return a.partial_cmp(&b);
    }
    match (left.as_str(), right.as_str()) {
        (Some(a), Some(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Value {
    // dates shift by seconds; the difference of two dates is seconds
    match (op, left, right) {
        (BinaryOp::Add, Value::Date(d), n) => return shift_date(d, n.as_number()),
        (BinaryOp::Add, n, Value::Date(d)) => return shift_date(d, n.as_number()),
        (BinaryOp::Sub, Value::Date(a), Value::Date(b)) => {
            return Value::Number((*a - *b).num_milliseconds() as f64 / 1000.0);
        }
        (BinaryOp::Sub, Value::Date(d), n) => return shift_date(d, -n.as_number()),
        _ => {}
    }
    let (a, b) = (left.as_number(), right.as_number());
    Value::Number(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        _ => f64::NAN,
    })
}

fn shift_date(date: &chrono::DateTime<chrono::FixedOffset>, seconds: f64) -> Value {
    Value::Date(*date + chrono::Duration::milliseconds((seconds * 1000.0) as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::compile;

    fn sample_tree() -> Tree {
        let mut tree = Tree::new();
        let a = tree.create_element("a");
        tree.attach(tree.root(), a).unwrap();
        let b1 = tree.create_element("b");
        tree.attach(a, b1).unwrap();
        let b2 = tree.create_element("b");
        tree.attach(a, b2).unwrap();
        if let Some(node) = tree.get_mut(b1) {
            node.set_attr("x", "1");
            node.append_body("hi");
        }
        if let Some(node) = tree.get_mut(b2) {
            node.set_attr("x", "2");
            node.append_body("yo");
        }
        tree
    }

    fn run_with(tree: &Tree, vars: &IndexMap<String, Value>, source: &str) -> Value {
        let compiled = compile(source).unwrap();
        let focus = Value::Node(tree.root());
        let bindings = Bindings::new();
        let output = RefCell::new(String::new());
        let scope = EvalScope {
            tree,
            focus: &focus,
            vars,
            bindings: &bindings,
            output: &output,
        };
        evaluate(&compiled, &scope).unwrap()
    }

    fn run(tree: &Tree, source: &str) -> Value {
        run_with(tree, &IndexMap::new(), source)
    }

    #[test]
    fn literal_arithmetic() {
        let tree = Tree::new();
        assert_eq!(run(&tree, "1 + 2 * 3"), Value::Number(7.0));
        assert_eq!(run(&tree, "(1 + 2) * 3"), Value::Number(9.0));
        assert_eq!(run(&tree, "7 % 4"), Value::Number(3.0));
        assert_eq!(run(&tree, "-(1 + 2)"), Value::Number(-3.0));
    }

    #[test]
    fn comparison_and_logic() {
        let tree = Tree::new();
        assert_eq!(run(&tree, "1 < 2 and 2 <= 2"), Value::Bool(true));
        assert_eq!(run(&tree, "\"a\" < \"b\""), Value::Bool(true));
        assert_eq!(run(&tree, "1 = 1 or 1 = 2"), Value::Bool(true));
        assert_eq!(run(&tree, "1 != 1"), Value::Bool(false));
    }

    #[test]
    fn leading_filter_selects_by_name() {
        let tree = sample_tree();
        let result = run(&tree, "[name=\"b\"]");
        let items = result.as_slice().expect("fragment");
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|v| matches!(v, Value::Node(_))));
    }

    #[test]
    fn field_step_maps_and_flattens() {
        let tree = sample_tree();
        let result = run(&tree, "[name=\"b\"].x");
        assert_eq!(
            result.as_slice(),
            Some(&[Value::Number(1.0), Value::Number(2.0)][..])
        );
    }

    #[test]
    fn index_selects_and_unwraps() {
        let tree = sample_tree();
        assert_eq!(
            run(&tree, "[name=\"b\"][0].text"),
            Value::Text(TextLeaf::new("hi"))
        );
        assert_eq!(
            run(&tree, "[name=\"b\"][-1].text"),
            Value::Text(TextLeaf::new("yo"))
        );
        assert_eq!(run(&tree, "[name=\"b\"][5]"), Value::Null);
    }

    #[test]
    fn indexing_non_collection_yields_self() {
        let tree = Tree::new();
        assert_eq!(run(&tree, "(42)[0]"), Value::Number(42.0));
        assert_eq!(run(&tree, "(42)[-1]"), Value::Number(42.0));
        assert_eq!(run(&tree, "(42)[1]"), Value::Null);
    }

    #[test]
    fn empty_match_is_null() {
        let tree = sample_tree();
        assert_eq!(run(&tree, "[name=\"zzz\"]"), Value::Null);
    }

    #[test]
    fn singleton_filter_unwraps() {
        let tree = sample_tree();
        let result = run(&tree, "[x=2]");
        assert!(matches!(result, Value::Node(_)));
    }

    #[test]
    fn numeric_predicate_selects_position() {
        let tree = sample_tree();
        let mut vars = IndexMap::new();
        vars.insert("i".to_string(), Value::Number(1.0));
        let result = run_with(&tree, &vars, "[name=\"b\"][$i].text");
        assert_eq!(result, Value::Text(TextLeaf::new("yo")));
    }

    #[test]
    fn variables_resolve_and_default_to_null() {
        let tree = Tree::new();
        let mut vars = IndexMap::new();
        vars.insert("n".to_string(), Value::Number(5.0));
        assert_eq!(run_with(&tree, &vars, "$n + 1"), Value::Number(6.0));
        assert_eq!(run_with(&tree, &vars, "$missing"), Value::Null);
    }

    #[test]
    fn sequence_yields_last_non_null() {
        let tree = Tree::new();
        assert_eq!(run(&tree, "1; 2; null"), Value::Number(2.0));
        assert_eq!(run(&tree, "null; 3"), Value::Number(3.0));
        assert_eq!(run(&tree, "null; null"), Value::Null);
    }

    #[test]
    fn array_literal() {
        let tree = Tree::new();
        assert_eq!(
            run(&tree, "1, 2, 3"),
            Value::Array(vec![
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0)
            ])
        );
    }

    #[test]
    fn unknown_binding_errors() {
        let tree = Tree::new();
        let compiled = compile("$nope()").unwrap();
        let focus = Value::Node(tree.root());
        let vars = NoVars;
        let bindings = Bindings::new();
        let output = RefCell::new(String::new());
        let scope = EvalScope {
            tree: &tree,
            focus: &focus,
            vars: &vars,
            bindings: &bindings,
            output: &output,
        };
        let err = evaluate(&compiled, &scope).unwrap_err();
        assert!(matches!(err, EvalError::UnknownBinding(name) if name == "nope"));
    }

    #[test]
    fn method_call_prepends_base() {
        let tree = Tree::new();
        let mut bindings = Bindings::new();
        bindings.register_fn("double", |_scope, args| {
            Ok(Value::Number(
                args.first().map(Value::as_number).unwrap_or(f64::NAN) * 2.0,
            ))
        });
        let compiled = compile("(3).$double()").unwrap();
        let focus = Value::Null;
        let vars = NoVars;
        let output = RefCell::new(String::new());
        let scope = EvalScope {
            tree: &tree,
            focus: &focus,
            vars: &vars,
            bindings: &bindings,
            output: &output,
        };
        assert_eq!(evaluate(&compiled, &scope).unwrap(), Value::Number(6.0));
    }

    #[test]
    fn string_pseudo_fields_keep_family() {
        let tree = Tree::new();
        assert_eq!(run(&tree, "(\"  Hi  \").trim"), Value::Str("Hi".into()));
        assert_eq!(run(&tree, "(\"abc\").length"), Value::Number(3.0));
    }

    #[test]
    fn date_arithmetic_shifts_seconds() {
        let date = chrono::DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z").unwrap();
        let shifted = binary(BinaryOp::Add, &Value::Date(date), &Value::Number(90.0));
        match shifted {
            Value::Date(d) => assert_eq!((d - date).num_seconds(), 90),
            other => panic!("unexpected value: {:?}", other),
        }
        let later = Value::Date(date + chrono::Duration::seconds(30));
        assert_eq!(binary(BinaryOp::Sub, &later, &Value::Date(date)), Value::Number(30.0));
    }
}
