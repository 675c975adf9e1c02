//! Built-in bindings: casts, type predicates and general callables.
//!
//! Every binding shares one calling convention: the method-call step
//! `value.$name(args…)` passes the base value as the first argument, so
//! `$int(x)` and `x.$int()` are the same call. Casts are total over the
//! value family and answer `Null` rather than failing on a hopeless
//! operand; predicates lift over non-empty collections (all items must
//! match) except the collection predicates themselves, which inspect the
//! value directly.

use std::cmp::Ordering;

use chrono::Utc;
use indexmap::IndexMap;

use crate::error::EvalError;
use crate::model;
use crate::norm;
use crate::path::eval::{cmp_values, collect_sequence, eq_values};
use crate::path::{self, Bindings, EvalScope};
use crate::value::{Fragment, TextLeaf, Value};

/// The full built-in table a fresh context starts from.
pub(crate) fn builtins() -> Bindings {
    let mut bindings = Bindings::new();
    register_casts(&mut bindings);
    register_predicates(&mut bindings);
    register_general(&mut bindings);
    bindings
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Null)
}

fn need(name: &str, args: &[Value], expected: usize) -> Result<(), EvalError> {
    if args.len() < expected {
        return Err(EvalError::Arity {
            name: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

/// Collection predicates hold when every item matches; empty collections
/// never match.
fn lifted(value: &Value, pred: &dyn Fn(&Value) -> bool) -> bool {
    match value.as_slice() {
        Some(items) => !items.is_empty() && items.iter().all(pred),
        None => pred(value),
    }
}

fn register_casts(bindings: &mut Bindings) {
    bindings.register_fn("array", |_, args| {
        Ok(match arg(args, 0) {
            Value::Null => Value::Array(Vec::new()),
            Value::Array(items) => Value::Array(items),
            Value::Fragment(f) => Value::Array(f.items().to_vec()),
            other => Value::Array(vec![other]),
        })
    });
    bindings.register_fn("boolean", |_, args| {
        Ok(Value::Bool(arg(args, 0).truthy()))
    });
    bindings.register_fn("float", |_, args| {
        Ok(Value::Number(arg(args, 0).as_number()))
    });
    bindings.register_fn("int", |_, args| {
        Ok(Value::Number(arg(args, 0).as_number().trunc()))
    });
    bindings.register_fn("number", |_, args| {
        Ok(Value::Number(arg(args, 0).as_number()))
    });
    bindings.register_fn("object", |scope, args| Ok(to_object(scope, &arg(args, 0))));
    bindings.register_fn("string", |scope, args| {
        Ok(Value::Str(model::display_value(scope.tree, &arg(args, 0))))
    });

    bindings.register_fn("true", |_, _| Ok(Value::Bool(true)));
    bindings.register_fn("false", |_, _| Ok(Value::Bool(false)));
    bindings.register_fn("null", |_, _| Ok(Value::Null));
    bindings.register_fn("nan", |_, _| Ok(Value::Number(f64::NAN)));

    bindings.register_fn("date", |_, args| {
        Ok(match arg(args, 0) {
            date @ Value::Date(_) => date,
            Value::Number(n) if !n.is_nan() => chrono::DateTime::from_timestamp(n as i64, 0)
                .map(|d| Value::Date(d.fixed_offset()))
                .unwrap_or(Value::Null),
            Value::Str(s) => date_from_text(&s),
            Value::Text(t) => date_from_text(t.as_str()),
            _ => Value::Null,
        })
    });
    bindings.register_fn("document", |scope, _| Ok(Value::Node(scope.tree.root())));
    bindings.register_fn("fragment", |_, args| {
        Ok(match arg(args, 0) {
            frag @ Value::Fragment(_) => frag,
            Value::Array(items) => Value::Fragment(Fragment::new(items)),
            Value::Null => Value::Fragment(Fragment::empty()),
            other => Value::Fragment(Fragment::new(vec![other])),
        })
    });
    bindings.register_fn("node", |_, args| {
        Ok(match arg(args, 0) {
            node @ Value::Node(_) => node,
            Value::Array(items) => first_node(&items),
            Value::Fragment(f) => first_node(f.items()),
            _ => Value::Null,
        })
    });
    bindings.register_fn("text", |scope, args| {
        Ok(Value::Text(TextLeaf::new(model::display_value(
            scope.tree,
            &arg(args, 0),
        ))))
    });

    bindings.register_fn("camelcase", |scope, args| {
        Ok(Value::Str(norm::camel_case(&model::display_value(
            scope.tree,
            &arg(args, 0),
        ))))
    });
    bindings.register_fn("pascalcase", |scope, args| {
        Ok(Value::Str(norm::pascal_case(&model::display_value(
            scope.tree,
            &arg(args, 0),
        ))))
    });
    bindings.register_fn("snakecase", |scope, args| {
        Ok(Value::Str(norm::snake_case(&model::display_value(
            scope.tree,
            &arg(args, 0),
        ))))
    });

    bindings.register_fn("eval", |scope, args| {
        let target = arg(args, 0);
        match target.as_str() {
            Some(source) => {
                let compiled = path::compile(source)
                    .map_err(|e| EvalError::Message(format!("eval: {}", e)))?;
                path::evaluate(&compiled, scope)
            }
            None => Ok(target),
        }
    });
    bindings.register_fn("json", |scope, args| {
        let target = arg(args, 0);
        match target.as_str() {
            Some(text) => serde_json::from_str::<serde_json::Value>(text)
                .map(Value::from_json)
                .map_err(|e| EvalError::Message(format!("json: {}", e))),
            None => Ok(Value::Str(
                model::to_json_value(scope.tree, &target).to_string(),
            )),
        }
    });
    bindings.register_fn("keys", |scope, args| {
        Ok(match arg(args, 0) {
            Value::Node(id) => Value::Array(
                model::synthesize(scope.tree, id)
                    .keys()
                    .into_iter()
                    .map(Value::Str)
                    .collect(),
            ),
            Value::Object(map) => Value::Array(map.keys().cloned().map(Value::Str).collect()),
            Value::Array(items) => index_keys(items.len()),
            Value::Fragment(f) => index_keys(f.len()),
            _ => Value::Array(Vec::new()),
        })
    });
    bindings.register_fn("sorted", |_, args| {
        Ok(match arg(args, 0) {
            Value::Array(mut items) => {
                sort_values(&mut items);
                Value::Array(items)
            }
            Value::Fragment(f) => {
                let mut items = f.items().to_vec();
                sort_values(&mut items);
                Value::Fragment(Fragment::new(items))
            }
            Value::Str(s) => Value::Str(sorted_chars(&s)),
            Value::Text(t) => Value::Text(TextLeaf(sorted_chars(t.as_str()))),
            other => other,
        })
    });
    bindings.register_fn("reversed", |_, args| {
        Ok(match arg(args, 0) {
            Value::Array(mut items) => {
                items.reverse();
                Value::Array(items)
            }
            Value::Fragment(f) => {
                let mut items = f.items().to_vec();
                items.reverse();
                Value::Fragment(Fragment::new(items))
            }
            Value::Str(s) => Value::Str(s.chars().rev().collect()),
            Value::Text(t) => Value::Text(TextLeaf(t.as_str().chars().rev().collect())),
            other => other,
        })
    });
    bindings.register_fn("tuple", |_, args| {
        Ok(match arg(args, 0) {
            Value::Object(map) => Value::Array(
                map.into_iter()
                    .map(|(k, v)| Value::Array(vec![Value::Str(k), v]))
                    .collect(),
            ),
            Value::Array(items) => pairs_to_object(&items).unwrap_or(Value::Null),
            Value::Fragment(f) => pairs_to_object(f.items()).unwrap_or(Value::Null),
            _ => Value::Null,
        })
    });
    bindings.register_fn("unique", |_, args| {
        Ok(match arg(args, 0) {
            Value::Array(items) => Value::Array(dedupe(items)),
            Value::Fragment(f) => Value::Fragment(Fragment::new(dedupe(f.items().to_vec()))),
            other => other,
        })
    });
}

fn register_predicates(bindings: &mut Bindings) {
    bindings.register_fn("istext", |_, args| {
        Ok(Value::Bool(lifted(&arg(args, 0), &|v| {
            matches!(v, Value::Text(_))
        })))
    });
    bindings.register_fn("isnode", |scope, args| {
        let tree = scope.tree;
        Ok(Value::Bool(lifted(&arg(args, 0), &|v| match v {
            Value::Node(id) => tree.get(*id).map(|n| n.is_element()).unwrap_or(false),
            _ => false,
        })))
    });
    bindings.register_fn("isdocument", |scope, args| {
        let tree = scope.tree;
        Ok(Value::Bool(lifted(&arg(args, 0), &|v| match v {
            Value::Node(id) => tree.get(*id).map(|n| n.is_document()).unwrap_or(false),
            _ => false,
        })))
    });
    bindings.register_fn("isnumber", |_, args| {
        Ok(Value::Bool(lifted(&arg(args, 0), &|v| {
            matches!(v, Value::Number(_))
        })))
    });
    bindings.register_fn("isstring", |_, args| {
        Ok(Value::Bool(lifted(&arg(args, 0), &|v| {
            matches!(v, Value::Str(_))
        })))
    });
    bindings.register_fn("isobject", |_, args| {
        Ok(Value::Bool(lifted(&arg(args, 0), &|v| {
            matches!(v, Value::Object(_))
        })))
    });
    bindings.register_fn("isboolean", |_, args| {
        Ok(Value::Bool(lifted(&arg(args, 0), &|v| {
            matches!(v, Value::Bool(_))
        })))
    });
    bindings.register_fn("isdate", |_, args| {
        Ok(Value::Bool(lifted(&arg(args, 0), &|v| {
            matches!(v, Value::Date(_))
        })))
    });
    // collection predicates look at the value itself, never the items
    bindings.register_fn("isarray", |_, args| {
        Ok(Value::Bool(matches!(arg(args, 0), Value::Array(_))))
    });
    bindings.register_fn("isfragment", |_, args| {
        Ok(Value::Bool(matches!(arg(args, 0), Value::Fragment(_))))
    });
    bindings.register_fn("not", |_, args| Ok(Value::Bool(!arg(args, 0).truthy())));
}

fn register_general(bindings: &mut Bindings) {
    bindings.register_fn("length", |scope, args| {
        let target = arg(args, 0);
        let n = match &target {
            Value::Null => 0.0,
            Value::Str(s) => s.chars().count() as f64,
            Value::Text(t) => t.len() as f64,
            Value::Array(items) => items.len() as f64,
            Value::Fragment(f) => f.len() as f64,
            Value::Object(map) => map.len() as f64,
            Value::Node(id) => scope.tree.children(*id).len() as f64,
            _ => 1.0,
        };
        Ok(Value::Number(n))
    });
    bindings.register_fn("concat", |scope, args| {
        let mut out = String::new();
        for value in args {
            out.push_str(&model::display_value(scope.tree, value));
        }
        Ok(match args.first() {
            Some(Value::Text(_)) => Value::Text(TextLeaf(out)),
            _ => Value::Str(out),
        })
    });
    bindings.register_fn("join", |scope, args| {
        need("join", args, 1)?;
        let sep = match args.get(1) {
            Some(Value::Null) | None => ",".to_string(),
            Some(v) => model::display_value(scope.tree, v),
        };
        let joined = match args[0].as_slice() {
            Some(items) => items
                .iter()
                .map(|v| model::display_value(scope.tree, v))
                .collect::<Vec<_>>()
                .join(&sep),
            None => model::display_value(scope.tree, &args[0]),
        };
        Ok(Value::Str(joined))
    });
    bindings.register_fn("slice", |_, args| {
        need("slice", args, 2)?;
        let start = args[1].as_number();
        let start = if start.is_nan() { 0 } else { start as i64 };
        let count = match args.get(2) {
            Some(Value::Null) | None => None,
            Some(v) => {
                let n = v.as_number();
                if n.is_nan() {
                    None
                } else {
                    Some(n.max(0.0) as i64)
                }
            }
        };
        Ok(slice_value(&args[0], start, count))
    });
    bindings.register_fn("typeof", |scope, args| {
        need("typeof", args, 1)?;
        Ok(Value::Str(model::type_name(scope.tree, &args[0]).to_string()))
    });
    bindings.register_fn("classConstructorName", |scope, args| {
        need("classConstructorName", args, 1)?;
        let name = match &args[0] {
            Value::Text(_) => "TextLeaf".to_string(),
            other => capitalize(model::type_name(scope.tree, other)),
        };
        Ok(Value::Str(name))
    });
    bindings.register_fn("now", |_, _| Ok(Value::Date(Utc::now().fixed_offset())));
    bindings.register_fn("print", |scope, args| {
        let line = args
            .iter()
            .map(|v| model::display_value(scope.tree, v))
            .collect::<Vec<_>>()
            .join(" ");
        let mut out = scope.output.borrow_mut();
        out.push_str(&line);
        out.push('\n');
        Ok(Value::Null)
    });
    bindings.register_fn("contains", |scope, args| {
        need("contains", args, 2)?;
        let needle = &args[1];
        let found = match &args[0] {
            Value::Array(items) => items.iter().any(|v| eq_values(v, needle)),
            Value::Fragment(f) => f.iter().any(|v| eq_values(v, needle)),
            Value::Str(s) => s.contains(&model::display_value(scope.tree, needle)),
            Value::Text(t) => t
                .as_str()
                .contains(&model::display_value(scope.tree, needle)),
            Value::Object(map) => map.values().any(|v| eq_values(v, needle)),
            _ => false,
        };
        Ok(Value::Bool(found))
    });
    bindings.register_fn("has", |scope, args| {
        need("has", args, 2)?;
        let key = model::display_value(scope.tree, &args[1]);
        let found = match &args[0] {
            Value::Object(map) => {
                map.contains_key(&key) || map.contains_key(norm::fold_key(&key).as_str())
            }
            Value::Node(id) => model::synthesize(scope.tree, *id).get(&key).is_some(),
            _ => false,
        };
        Ok(Value::Bool(found))
    });
}

fn to_object(scope: &EvalScope<'_>, value: &Value) -> Value {
    match value {
        Value::Object(_) => value.clone(),
        Value::Node(id) => model::synthesize(scope.tree, *id)
            .get("attributes")
            .unwrap_or(Value::Null),
        Value::Str(_) | Value::Text(_) => {
            let parsed = value
                .as_str()
                .and_then(|s| serde_json::from_str::<serde_json::Value>(s).ok());
            match parsed {
                Some(json @ serde_json::Value::Object(_)) => Value::from_json(json),
                _ => Value::Null,
            }
        }
        Value::Array(items) => pairs_to_object(items).unwrap_or(Value::Null),
        Value::Fragment(f) => pairs_to_object(f.items()).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn pairs_to_object(items: &[Value]) -> Option<Value> {
    let mut map = IndexMap::new();
    for item in items {
        let pair = item.as_slice()?;
        if pair.len() != 2 {
            return None;
        }
        map.insert(pair[0].to_string(), pair[1].clone());
    }
    Some(Value::Object(map))
}

fn first_node(items: &[Value]) -> Value {
    items
        .iter()
        .find(|v| matches!(v, Value::Node(_)))
        .cloned()
        .unwrap_or(Value::Null)
}

fn date_from_text(text: &str) -> Value {
    match norm::classify(text.trim()) {
        date @ Value::Date(_) => date,
        _ => Value::Null,
    }
}

fn index_keys(len: usize) -> Value {
    Value::Array((0..len).map(|i| Value::Number(i as f64)).collect())
}

fn sort_values(items: &mut [Value]) {
    items.sort_by(|a, b| cmp_values(a, b).unwrap_or(Ordering::Equal));
}

fn sorted_chars(s: &str) -> String {
    let mut chars: Vec<char> = s.chars().collect();
    chars.sort_unstable();
    chars.into_iter().collect()
}

fn dedupe(items: Vec<Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        if !out.iter().any(|seen| eq_values(seen, &item)) {
            out.push(item);
        }
    }
    out
}

fn slice_value(value: &Value, start: i64, count: Option<i64>) -> Value {
    match value {
        Value::Array(items) => Value::Array(slice_items(items, start, count)),
        Value::Fragment(f) => Value::Fragment(Fragment::new(slice_items(f.items(), start, count))),
        Value::Text(t) => {
            let (from, end) = char_range(t.len(), start, count);
            Value::Text(t.slice(from, end))
        }
        Value::Str(s) => {
            let leaf = TextLeaf::new(s.clone());
            let (from, end) = char_range(leaf.len(), start, count);
            Value::Str(leaf.slice(from, end).0)
        }
        Value::Null => Value::Null,
        other => collect_sequence(slice_items(&[other.clone()], start, count)),
    }
}

fn char_range(len: usize, start: i64, count: Option<i64>) -> (i64, Option<i64>) {
    let len = len as i64;
    let from = (if start < 0 { len + start } else { start }).clamp(0, len);
    (from, count.map(|c| from + c.max(0)))
}

fn slice_items(items: &[Value], start: i64, count: Option<i64>) -> Vec<Value> {
    let len = items.len() as i64;
    let from = (if start < 0 { len + start } else { start }).clamp(0, len);
    let to = match count {
        Some(c) => (from + c.max(0)).min(len),
        None => len,
    };
    items[from as usize..to as usize].to_vec()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::NoVars;
    use crate::tree::Tree;
    use std::cell::RefCell;

    fn sample_tree() -> Tree {
        let mut tree = Tree::new();
        let a = tree.create_element("a");
        tree.attach(tree.root(), a).unwrap();
        let b = tree.create_element("b");
        tree.attach(a, b).unwrap();
        if let Some(node) = tree.get_mut(b) {
            node.set_attr("x", "1");
            node.append_body("hi");
        }
        tree
    }

    fn with_scope<R>(tree: &Tree, f: impl FnOnce(&EvalScope<'_>) -> R) -> R {
        let focus = Value::Node(tree.root());
        let vars = NoVars;
        let bindings = builtins();
        let output = RefCell::new(String::new());
        let scope = EvalScope {
            tree,
            focus: &focus,
            vars: &vars,
            bindings: &bindings,
            output: &output,
        };
        f(&scope)
    }

    fn call(scope: &EvalScope<'_>, name: &str, args: &[Value]) -> Value {
        let binding = scope.bindings.get(name).expect(name).clone();
        binding(scope, args).expect(name)
    }

    #[test]
    fn numeric_casts() {
        let tree = Tree::new();
        with_scope(&tree, |scope| {
            assert_eq!(
                call(scope, "int", &[Value::Number(3.9)]),
                Value::Number(3.0)
            );
            assert_eq!(
                call(scope, "number", &[Value::Str("4.5".into())]),
                Value::Number(4.5)
            );
            assert_eq!(
                call(scope, "boolean", &[Value::Str("".into())]),
                Value::Bool(false)
            );
        });
    }

    #[test]
    fn constant_casts_ignore_their_operand() {
        let tree = Tree::new();
        with_scope(&tree, |scope| {
            assert_eq!(
                call(scope, "true", &[Value::Number(0.0)]),
                Value::Bool(true)
            );
            assert_eq!(call(scope, "null", &[Value::Number(7.0)]), Value::Null);
            match call(scope, "nan", &[]) {
                Value::Number(n) => assert!(n.is_nan()),
                other => panic!("unexpected: {:?}", other),
            }
        });
    }

    #[test]
    fn date_cast_parses_and_converts() {
        let tree = Tree::new();
        with_scope(&tree, |scope| {
            assert!(matches!(
                call(scope, "date", &[Value::Str("2024-06-01T00:00:00Z".into())]),
                Value::Date(_)
            ));
            assert!(matches!(
                call(scope, "date", &[Value::Number(0.0)]),
                Value::Date(_)
            ));
            assert_eq!(call(scope, "date", &[Value::Str("pancake".into())]), Value::Null);
        });
    }

    #[test]
    fn collection_casts() {
        let tree = Tree::new();
        with_scope(&tree, |scope| {
            assert_eq!(
                call(scope, "array", &[Value::Number(1.0)]),
                Value::Array(vec![Value::Number(1.0)])
            );
            assert_eq!(call(scope, "array", &[Value::Null]), Value::Array(vec![]));
            assert!(matches!(
                call(scope, "fragment", &[Value::Array(vec![Value::Number(1.0)])]),
                Value::Fragment(_)
            ));
        });
    }

    #[test]
    fn sorted_reversed_unique() {
        let tree = Tree::new();
        with_scope(&tree, |scope| {
            let list = Value::Array(vec![
                Value::Number(3.0),
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(1.0),
            ]);
            assert_eq!(
                call(scope, "sorted", &[list.clone()]),
                Value::Array(vec![
                    Value::Number(1.0),
                    Value::Number(1.0),
                    Value::Number(2.0),
                    Value::Number(3.0)
                ])
            );
            assert_eq!(
                call(scope, "unique", &[list.clone()]),
                Value::Array(vec![
                    Value::Number(3.0),
                    Value::Number(1.0),
                    Value::Number(2.0)
                ])
            );
            assert_eq!(
                call(scope, "reversed", &[Value::Str("abc".into())]),
                Value::Str("cba".into())
            );
        });
    }

    #[test]
    fn tuple_converts_both_ways() {
        let tree = Tree::new();
        with_scope(&tree, |scope| {
            let mut map = IndexMap::new();
            map.insert("a".to_string(), Value::Number(1.0));
            let pairs = call(scope, "tuple", &[Value::Object(map.clone())]);
            assert_eq!(
                pairs,
                Value::Array(vec![Value::Array(vec![
                    Value::Str("a".into()),
                    Value::Number(1.0)
                ])])
            );
            assert_eq!(call(scope, "tuple", &[pairs]), Value::Object(map));
        });
    }

    #[test]
    fn lengths() {
        let tree = sample_tree();
        with_scope(&tree, |scope| {
            assert_eq!(
                call(scope, "length", &[Value::Str("abc".into())]),
                Value::Number(3.0)
            );
            assert_eq!(call(scope, "length", &[Value::Null]), Value::Number(0.0));
            assert_eq!(
                call(scope, "length", &[Value::Node(tree.root())]),
                Value::Number(1.0)
            );
        });
    }

    #[test]
    fn join_and_slice() {
        let tree = Tree::new();
        with_scope(&tree, |scope| {
            let list = Value::Array(vec![
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0),
            ]);
            assert_eq!(
                call(scope, "join", &[list.clone(), Value::Str("-".into())]),
                Value::Str("1-2-3".into())
            );
            assert_eq!(
                call(scope, "slice", &[list.clone(), Value::Number(1.0)]),
                Value::Array(vec![Value::Number(2.0), Value::Number(3.0)])
            );
            assert_eq!(
                call(
                    scope,
                    "slice",
                    &[list, Value::Number(-2.0), Value::Number(1.0)]
                ),
                Value::Array(vec![Value::Number(2.0)])
            );
            assert_eq!(
                call(
                    scope,
                    "slice",
                    &[Value::Str("hello".into()), Value::Number(1.0), Value::Number(3.0)]
                ),
                Value::Str("ell".into())
            );
        });
    }

    #[test]
    fn type_names() {
        let tree = sample_tree();
        with_scope(&tree, |scope| {
            assert_eq!(
                call(scope, "typeof", &[Value::Node(tree.root())]),
                Value::Str("document".into())
            );
            assert_eq!(
                call(scope, "classConstructorName", &[Value::Text(TextLeaf::new("x"))]),
                Value::Str("TextLeaf".into())
            );
            assert_eq!(
                call(scope, "classConstructorName", &[Value::Number(1.0)]),
                Value::Str("Number".into())
            );
        });
    }

    #[test]
    fn predicates_lift_over_collections() {
        let tree = sample_tree();
        with_scope(&tree, |scope| {
            let nodes = Value::Fragment(Fragment::new(
                tree.children(tree.root())
                    .iter()
                    .map(|&id| Value::Node(id))
                    .collect(),
            ));
            assert_eq!(call(scope, "isnode", &[nodes.clone()]), Value::Bool(true));
            assert_eq!(call(scope, "isfragment", &[nodes]), Value::Bool(true));
            assert_eq!(
                call(scope, "isnode", &[Value::Fragment(Fragment::empty())]),
                Value::Bool(false)
            );
            assert_eq!(
                call(scope, "isnode", &[Value::Node(tree.root())]),
                Value::Bool(false)
            );
            assert_eq!(
                call(scope, "isdocument", &[Value::Node(tree.root())]),
                Value::Bool(true)
            );
        });
    }

    #[test]
    fn print_appends_line_to_output() {
        let tree = Tree::new();
        with_scope(&tree, |scope| {
            call(scope, "print", &[Value::Str("a".into()), Value::Number(1.0)]);
            call(scope, "print", &[Value::Str("b".into())]);
            assert_eq!(*scope.output.borrow(), "a 1\nb\n");
        });
    }

    #[test]
    fn contains_and_has() {
        let tree = sample_tree();
        with_scope(&tree, |scope| {
            let list = Value::Array(vec![Value::Number(1.0), Value::Number(2.0)]);
            assert_eq!(
                call(scope, "contains", &[list.clone(), Value::Number(2.0)]),
                Value::Bool(true)
            );
            assert_eq!(
                call(scope, "contains", &[list, Value::Number(9.0)]),
                Value::Bool(false)
            );
            assert_eq!(
                call(
                    scope,
                    "contains",
                    &[Value::Str("hello".into()), Value::Str("ell".into())]
                ),
                Value::Bool(true)
            );

            let b = tree.children(tree.children(tree.root())[0])[0];
            assert_eq!(
                call(scope, "has", &[Value::Node(b), Value::Str("x".into())]),
                Value::Bool(true)
            );
            assert_eq!(
                call(scope, "has", &[Value::Node(b), Value::Str("zzz".into())]),
                Value::Bool(false)
            );
        });
    }

    #[test]
    fn eval_runs_in_the_same_scope() {
        let tree = sample_tree();
        with_scope(&tree, |scope| {
            assert_eq!(
                call(scope, "eval", &[Value::Str("1 + 2".into())]),
                Value::Number(3.0)
            );
            assert_eq!(
                call(scope, "eval", &[Value::Number(5.0)]),
                Value::Number(5.0)
            );
        });
    }

    #[test]
    fn json_round_trips() {
        let tree = Tree::new();
        with_scope(&tree, |scope| {
            let parsed = call(scope, "json", &[Value::Str("{\"a\": 1}".into())]);
            match &parsed {
                Value::Object(map) => assert_eq!(map.get("a"), Some(&Value::Number(1.0))),
                other => panic!("unexpected: {:?}", other),
            }
            assert_eq!(
                call(scope, "json", &[parsed]),
                Value::Str("{\"a\":1.0}".into())
            );
        });
    }
}
