//! Flat string-keyed maps: `{"database.url": "pg://", "ports": "80,443"}`.
//!
//! Flat formats (environment, properties) only carry strings, so lists are
//! represented either as comma-joined text or as index-keyed entries
//! (`ports.0`, `ports.1`). Reading promotes index keys to lists; writing
//! picks whichever form reads back unambiguously.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::StratumError;
use crate::path::{Path, dotted};
use crate::source::Source;
use crate::tree::TreeNode;

/// Build a tree from dotted keys.
///
/// Keys are applied in sorted order, so for `a` and `a.b` the shorter key
/// is applied first. A key that conflicts with one already applied fails with
/// [`StratumError::PathConflict`], or is dropped when `allow_conflict` is set.
pub fn flat_to_tree<I, K, V>(entries: I, allow_conflict: bool) -> Result<TreeNode, StratumError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let sorted: BTreeMap<String, String> = entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    let mut tree = TreeNode::empty();
    for (key, value) in sorted {
        if let Err(e) = set_flat(&mut tree, &key, value) {
            if allow_conflict {
                debug!(key = %key, error = %e, "dropping conflicting flat key");
                continue;
            }
            return Err(e);
        }
    }
    Ok(tree.promote_to_list())
}

fn set_flat(tree: &mut TreeNode, key: &str, value: String) -> Result<(), StratumError> {
    let path = Path::parse(key)?;
    if path.is_empty() {
        return Err(StratumError::InvalidPath(key.to_string()));
    }
    if let Some(TreeNode::Container(existing)) = tree.get_or_null(&path)
        && !existing.is_empty()
    {
        return Err(StratumError::PathConflict { path: path.name() });
    }
    tree.set(&path, TreeNode::flat_text(value))
}

/// A source over a flat map.
pub fn flat_source<I, K, V>(entries: I, allow_conflict: bool) -> Result<Source, StratumError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    Ok(Source::new(flat_to_tree(entries, allow_conflict)?).with_info("type", "flat"))
}

/// Flatten a tree into dotted keys.
///
/// Lists of plain values are comma-joined; an empty list or map is the
/// empty string. Lists whose elements are empty, contain a comma or are not
/// scalars are written as index keys instead.
pub fn to_flat_map(tree: &TreeNode) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into(tree, "", &mut out);
    out
}

fn flatten_into(node: &TreeNode, prefix: &str, out: &mut BTreeMap<String, String>) {
    match node {
        TreeNode::Container(c) if c.is_empty() && !prefix.is_empty() => {
            out.insert(prefix.to_string(), String::new());
        }
        TreeNode::Container(c) => {
            for (key, child) in c.iter() {
                flatten_into(child, &dotted(prefix, key), out);
            }
        }
        TreeNode::List(l) => {
            let texts: Option<Vec<String>> = l
                .items
                .iter()
                .map(|item| match item {
                    TreeNode::Value(v) => Some(v.scalar.to_text()),
                    _ => None,
                })
                .collect();
            match texts {
                Some(texts) if texts.iter().all(|t| !t.is_empty() && !t.contains(',')) => {
                    out.insert(prefix.to_string(), texts.join(","));
                }
                _ => {
                    for (i, item) in l.items.iter().enumerate() {
                        flatten_into(item, &dotted(prefix, &i.to_string()), out);
                    }
                }
            }
        }
        TreeNode::Value(v) => {
            out.insert(prefix.to_string(), v.scalar.to_text());
        }
        TreeNode::Null => {
            out.insert(prefix.to_string(), "null".to_string());
        }
    }
}
