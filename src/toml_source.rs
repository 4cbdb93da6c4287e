use toml::{Table, Value};

use crate::error::StratumError;
use crate::provider::{Provider, format_error};
use crate::tree::{ContainerNode, Scalar, TreeNode};

/// TOML adapter over the `toml` crate.
///
/// TOML has no null: null nodes are left out when rendering. Date-times are
/// read as text and coerced by the target type.
pub struct TomlProvider;

impl Provider for TomlProvider {
    fn name(&self) -> &str {
        "toml"
    }

    fn extensions(&self) -> &[&'static str] {
        &["toml"]
    }

    fn parse(&self, bytes: &[u8]) -> Result<TreeNode, StratumError> {
        let text = std::str::from_utf8(bytes).map_err(|e| format_error("toml", e))?;
        let table: Table = text.parse().map_err(|e| format_error("toml", e))?;
        Ok(table_to_tree(&table))
    }

    fn render(&self, tree: &TreeNode) -> Result<Vec<u8>, StratumError> {
        let table = match tree_to_toml(tree) {
            Some(Value::Table(table)) => table,
            _ => return Err(format_error("toml", "top level of a TOML document must be a table")),
        };
        toml::to_string_pretty(&table)
            .map(String::into_bytes)
            .map_err(|e| format_error("toml", e))
    }
}

fn table_to_tree(table: &Table) -> TreeNode {
    TreeNode::Container(
        table
            .iter()
            .map(|(k, v)| (k.clone(), toml_to_tree(v)))
            .collect::<ContainerNode>(),
    )
}

fn toml_to_tree(value: &Value) -> TreeNode {
    match value {
        Value::String(s) => TreeNode::text(s.clone()),
        Value::Integer(i) => TreeNode::scalar(Scalar::Int((*i).into())),
        Value::Float(f) => TreeNode::scalar(Scalar::Float(*f)),
        Value::Boolean(b) => TreeNode::scalar(Scalar::Bool(*b)),
        Value::Datetime(dt) => TreeNode::scalar(Scalar::Str(dt.to_string())),
        Value::Array(items) => TreeNode::list(items.iter().map(toml_to_tree).collect()),
        Value::Table(table) => table_to_tree(table),
    }
}

fn tree_to_toml(tree: &TreeNode) -> Option<Value> {
    match tree {
        TreeNode::Null => None,
        TreeNode::Value(v) => Some(match &v.scalar {
            Scalar::Bool(b) => Value::Boolean(*b),
            Scalar::Int(i) => match i64::try_from(*i) {
                Ok(i) => Value::Integer(i),
                Err(_) => Value::String(i.to_string()),
            },
            Scalar::Float(f) => Value::Float(*f),
            Scalar::Str(s) => Value::String(s.clone()),
        }),
        TreeNode::List(l) => Some(Value::Array(l.items.iter().filter_map(tree_to_toml).collect())),
        TreeNode::Container(c) => {
            let mut table = Table::new();
            for (key, child) in c.iter() {
                if let Some(value) = tree_to_toml(child) {
                    table.insert(key.to_string(), value);
                }
            }
            Some(Value::Table(table))
        }
    }
}
