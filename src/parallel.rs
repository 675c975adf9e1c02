//! Parallel selector evaluation.
//!
//! Uses Rayon to fan independent selectors out across threads. Each
//! selector gets a fresh [`Context`], so assignments and imports made by
//! one selector are invisible to the others; the session still shares
//! its compile cache and import registry across the batch.

use rayon::prelude::*;

use crate::context::Context;
use crate::error::Error;
use crate::session::Session;
use crate::tree::{NodeId, Tree};
use crate::value::Value;

/// Evaluate multiple selectors in parallel against one tree.
pub fn evaluate_parallel(
    tree: &Tree,
    session: &Session,
    selectors: &[&str],
) -> Vec<Result<Value, Error>> {
    selectors
        .par_iter()
        .map(|selector| Context::new(tree, session).query(selector))
        .collect()
}

/// Evaluate a selector and map each matched node in parallel.
pub fn select_map<F, T>(
    tree: &Tree,
    session: &Session,
    selector: &str,
    mapper: F,
) -> Result<Vec<T>, Error>
where
    F: Fn(NodeId) -> T + Sync + Send,
    T: Send,
{
    let result = Context::new(tree, session).query(selector)?;
    let nodes: Vec<NodeId> = match result {
        Value::Node(id) => vec![id],
        other => match other.as_slice() {
            Some(items) => items
                .iter()
                .filter_map(|item| match item {
                    Value::Node(id) => Some(*id),
                    _ => None,
                })
                .collect(),
            None => Vec::new(),
        },
    };
    Ok(nodes.par_iter().map(|&id| mapper(id)).collect())
}

/// Evaluate labeled selectors in parallel and collect keyed results.
pub fn query_map(
    tree: &Tree,
    session: &Session,
    queries: &[(&str, &str)],
) -> Result<Vec<(String, Value)>, Error> {
    queries
        .par_iter()
        .map(|(key, selector)| {
            Context::new(tree, session)
                .query(selector)
                .map(|value| (key.to_string(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Tree {
        let mut tree = Tree::new();
        let root = tree.root();
        for name in ["a", "b", "c"] {
            let node = tree.create_element(name);
            tree.attach(root, node).unwrap();
        }
        tree
    }

    #[test]
    fn parallel_eval() {
        let tree = sample_tree();
        let session = Session::new();
        let selectors = ["[name=\"a\"]", "[name=\"b\"]", "[name=\"c\"]"];

        let results = evaluate_parallel(&tree, &session, &selectors);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn contexts_are_isolated() {
        let tree = sample_tree();
        let session = Session::new();
        let selectors = ["let n = 1; $n", "$n"];

        let results = evaluate_parallel(&tree, &session, &selectors);
        assert_eq!(*results[0].as_ref().unwrap(), Value::Number(1.0));
        // the second context never saw the first's assignment
        assert_eq!(*results[1].as_ref().unwrap(), Value::Null);
    }

    #[test]
    fn mapped_selection() {
        let tree = sample_tree();
        let session = Session::new();
        let names = select_map(&tree, &session, ":children", |id| {
            tree.get(id).map(|n| n.name.clone()).unwrap_or_default()
        })
        .unwrap();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn keyed_queries() {
        let tree = sample_tree();
        let session = Session::new();
        let queries = [("head", ":children:first:name"), ("count", ":children.$length()")];

        let results = query_map(&tree, &session, &queries).unwrap();
        assert_eq!(results[0], ("head".to_string(), Value::Str("a".into())));
        assert_eq!(results[1], ("count".to_string(), Value::Number(3.0)));
    }
}
