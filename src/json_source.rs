use serde_json::{Map, Number, Value as Json};

use crate::error::StratumError;
use crate::provider::{Provider, format_error};
use crate::tree::{ContainerNode, Scalar, TreeNode};

/// JSON adapter over `serde_json`.
pub struct JsonProvider;

impl Provider for JsonProvider {
    fn name(&self) -> &str {
        "json"
    }

    fn extensions(&self) -> &[&'static str] {
        &["json"]
    }

    fn parse(&self, bytes: &[u8]) -> Result<TreeNode, StratumError> {
        let json: Json = serde_json::from_slice(bytes).map_err(|e| format_error("json", e))?;
        Ok(json_to_tree(&json))
    }

    fn render(&self, tree: &TreeNode) -> Result<Vec<u8>, StratumError> {
        serde_json::to_vec_pretty(&tree_to_json(tree)).map_err(|e| format_error("json", e))
    }
}

pub(crate) fn json_to_tree(json: &Json) -> TreeNode {
    match json {
        Json::Null => TreeNode::Null,
        Json::Bool(b) => TreeNode::scalar(Scalar::Bool(*b)),
        Json::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => TreeNode::scalar(Scalar::Int(i.into())),
            (None, Some(u)) => TreeNode::scalar(Scalar::Int(u.into())),
            _ => TreeNode::scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN))),
        },
        Json::String(s) => TreeNode::text(s.clone()),
        Json::Array(items) => TreeNode::list(items.iter().map(json_to_tree).collect()),
        Json::Object(map) => TreeNode::Container(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_tree(v)))
                .collect::<ContainerNode>(),
        ),
    }
}

pub(crate) fn tree_to_json(tree: &TreeNode) -> Json {
    match tree {
        TreeNode::Null => Json::Null,
        TreeNode::Value(v) => match &v.scalar {
            Scalar::Bool(b) => Json::Bool(*b),
            Scalar::Int(i) => {
                if let Ok(i) = i64::try_from(*i) {
                    Json::from(i)
                } else if let Ok(u) = u64::try_from(*i) {
                    Json::from(u)
                } else {
                    Json::String(i.to_string())
                }
            }
            Scalar::Float(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Scalar::Str(s) => Json::String(s.clone()),
        },
        TreeNode::List(l) => Json::Array(l.items.iter().map(tree_to_json).collect()),
        TreeNode::Container(c) => Json::Object(
            c.iter()
                .map(|(k, v)| (k.to_string(), tree_to_json(v)))
                .collect::<Map<String, Json>>(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;

    #[test]
    fn parses_nested_document() {
        let tree = JsonProvider
            .parse(br#"{"server": {"host": "h", "port": 80, "tags": ["a", "b"], "ratio": 0.5, "tls": null}}"#)
            .unwrap();
        let at = |p: &str| tree.get_or_null(&Path::parse(p).unwrap()).cloned();
        assert_eq!(at("server.host"), Some(TreeNode::text("h")));
        assert_eq!(at("server.port"), Some(TreeNode::scalar(Scalar::Int(80))));
        assert_eq!(at("server.tags.1"), Some(TreeNode::text("b")));
        assert_eq!(at("server.ratio"), Some(TreeNode::scalar(Scalar::Float(0.5))));
        assert_eq!(at("server.tls"), Some(TreeNode::Null));
    }

    #[test]
    fn strings_are_substitutable() {
        let tree = JsonProvider.parse(br#"{"a": "${b}"}"#).unwrap();
        match tree.get_or_null(&Path::parse("a").unwrap()) {
            Some(TreeNode::Value(v)) => assert!(v.substitutable),
            other => panic!("Expected value node, got {other:?}"),
        }
    }

    #[test]
    fn invalid_json_is_format_error() {
        let err = JsonProvider.parse(b"{not json").unwrap_err();
        assert!(matches!(err, StratumError::Format { .. }));
    }

    #[test]
    fn render_then_parse() {
        let original = JsonProvider.parse(br#"{"a": {"b": [1, 2]}, "c": true}"#).unwrap();
        let rendered = JsonProvider.render(&original).unwrap();
        assert_eq!(JsonProvider.parse(&rendered).unwrap(), original);
    }

    #[test]
    fn large_unsigned_kept_exact() {
        let tree = JsonProvider.parse(b"18446744073709551615").unwrap();
        assert_eq!(tree, TreeNode::scalar(Scalar::Int(u64::MAX.into())));
    }
}
