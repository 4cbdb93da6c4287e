//! `${path}` substitution.
//!
//! Rules:
//! - A text that is exactly one reference (`${a.b}`, surrounding whitespace
//!   ignored) is replaced by the referenced node itself, so it can yield a
//!   number, a list or a whole container.
//! - Otherwise each `${path}` inside the text is replaced by the referenced
//!   node's text. References nest: `${a.${b}}` resolves `b` first.
//! - `$${` produces a literal `${`. The escape is applied before any
//!   reference is recognized and the output is never scanned again.
//! - Undefined references fail, or stay as literal text when the pass is
//!   lenient.
//! - A reference back to a path that is still being resolved fails.

use crate::error::StratumError;
use crate::path::Path;
use crate::source::Source;
use crate::tree::{ContainerNode, ListNode, TreeNode, ValueNode};

/// Substitute every substitutable string in `tree`, resolving references
/// against `root`.
pub(crate) fn substitute_tree(
    root: &Source,
    tree: &TreeNode,
    error_when_undefined: bool,
) -> Result<TreeNode, StratumError> {
    let mut substitutor = Substitutor {
        root,
        error_when_undefined,
        resolving: Vec::new(),
    };
    substitutor.walk(tree, &Path::empty())
}

struct Substitutor<'a> {
    root: &'a Source,
    error_when_undefined: bool,
    resolving: Vec<String>,
}

impl Substitutor<'_> {
    fn walk(&mut self, node: &TreeNode, path: &Path) -> Result<TreeNode, StratumError> {
        match node {
            TreeNode::Value(v) => match v.substitution_text() {
                Some(text) => {
                    let text = text.to_string();
                    self.resolving.push(path.name());
                    let out = self.substitute_value(v, &text);
                    self.resolving.pop();
                    out
                }
                None => Ok(node.clone()),
            },
            TreeNode::List(l) => {
                let items = l
                    .items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.walk(item, &path.child(&i.to_string())))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(TreeNode::List(ListNode {
                    items,
                    comments: l.comments.clone(),
                }))
            }
            TreeNode::Container(c) => {
                let mut out = c
                    .iter()
                    .map(|(k, child)| Ok((k.to_string(), self.walk(child, &path.child(k))?)))
                    .collect::<Result<ContainerNode, StratumError>>()?;
                out.comments = c.comments.clone();
                Ok(TreeNode::Container(out))
            }
            TreeNode::Null => Ok(TreeNode::Null),
        }
    }

    fn substitute_value(&mut self, v: &ValueNode, text: &str) -> Result<TreeNode, StratumError> {
        if let Some(inner) = whole_reference(text.trim()) {
            let name = self.replace_text(inner, text)?;
            if let Some(node) = self.resolve(&name, text)? {
                return Ok(node.with_comments(v.comments.clone()));
            }
        }
        let replaced = self.replace_text(text, text)?;
        if replaced == text && v.original.is_none() {
            return Ok(TreeNode::Value(v.clone()));
        }
        Ok(v.substitute(replaced))
    }

    /// Look up `name` in the root and substitute the node found there.
    fn resolve(&mut self, name: &str, text: &str) -> Result<Option<TreeNode>, StratumError> {
        let Ok(path) = Path::parse(name) else {
            return Ok(None);
        };
        if self.resolving.iter().any(|p| p == name) {
            return Err(StratumError::Substitution {
                text: text.to_string(),
                reason: format!("cyclic reference to '{name}'"),
            });
        }
        let Some(node) = self.root.node_at(&path) else {
            return Ok(None);
        };
        self.resolving.push(name.to_string());
        let out = self.walk(&node, &path);
        self.resolving.pop();
        out.map(Some)
    }

    /// Interpolate every reference inside `text`.
    fn replace_text(&mut self, text: &str, whole: &str) -> Result<String, StratumError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix("$${") {
                out.push_str("${");
                rest = after;
                continue;
            }
            if rest.starts_with("${") {
                let Some(end) = closing_brace(rest) else {
                    out.push_str(rest);
                    break;
                };
                let inner = &rest[2..end];
                let name = self.replace_text(inner, whole)?;
                match self.resolve(&name, whole)? {
                    Some(node) => out.push_str(&inline_text(&node)),
                    None if self.error_when_undefined => {
                        return Err(StratumError::Substitution {
                            text: whole.to_string(),
                            reason: format!("undefined path variable '{name}'"),
                        });
                    }
                    None => out.push_str(&rest[..=end]),
                }
                rest = &rest[end + 1..];
                continue;
            }
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
        Ok(out)
    }
}

fn inline_text(node: &TreeNode) -> String {
    match node {
        TreeNode::Value(v) => v.scalar.to_text(),
        other => other.to_string(),
    }
}

/// Byte index of the `}` closing the `${` at the start of `s`.
fn closing_brace(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut i = 2;
    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            depth += 1;
            i += 2;
            continue;
        }
        if bytes[i] == b'}' {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
        }
        i += 1;
    }
    None
}

/// The inside of `${...}` when `s` is exactly one reference.
fn whole_reference(s: &str) -> Option<&str> {
    if !s.starts_with("${") {
        return None;
    }
    let end = closing_brace(s)?;
    (end == s.len() - 1).then(|| &s[2..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Scalar;

    fn source(pairs: &[(&str, TreeNode)]) -> Source {
        let mut tree = TreeNode::empty();
        for (path, node) in pairs {
            tree.set(&Path::parse(path).unwrap(), node.clone()).unwrap();
        }
        Source::new(tree)
    }

    fn text(s: &str) -> TreeNode {
        TreeNode::text(s)
    }

    fn int(i: i128) -> TreeNode {
        TreeNode::scalar(Scalar::Int(i))
    }

    fn resolved(source: &Source, path: &str) -> TreeNode {
        source.substituted(true).unwrap().get(path).unwrap().tree()
    }

    #[test]
    fn whole_reference_keeps_node_type() {
        let s = source(&[("a", int(1)), ("b", text("${a}"))]);
        assert_eq!(resolved(&s, "b"), int(1));
    }

    #[test]
    fn whole_reference_to_container() {
        let s = source(&[("db.host", text("h")), ("copy", text(" ${db} "))]);
        let copy = resolved(&s, "copy");
        assert_eq!(copy.get_or_null(&Path::parse("host").unwrap()), Some(&text("h")));
    }

    #[test]
    fn inline_interpolation() {
        let s = source(&[
            ("host", text("localhost")),
            ("port", int(5432)),
            ("url", text("pg://${host}:${port}/db")),
        ]);
        assert_eq!(resolved(&s, "url").to_string(), "pg://localhost:5432/db");
    }

    #[test]
    fn nested_variables() {
        let s = source(&[
            ("env", text("prod")),
            ("hosts.prod", text("prod.example")),
            ("target", text("${hosts.${env}}")),
        ]);
        assert_eq!(resolved(&s, "target"), text("prod.example"));
    }

    #[test]
    fn chained_references_resolve() {
        let s = source(&[("a", text("x")), ("b", text("${a}-y")), ("c", text("${b}-z"))]);
        assert_eq!(resolved(&s, "c").to_string(), "x-y-z");
    }

    #[test]
    fn escape_produces_literal() {
        let s = source(&[("a", text("1")), ("b", text("$${a} costs ${a}"))]);
        assert_eq!(resolved(&s, "b").to_string(), "${a} costs 1");
    }

    #[test]
    fn escaped_output_is_not_rescanned() {
        let s = source(&[("a", text("1")), ("b", text("$${a}"))]);
        let once = s.substituted(true).unwrap();
        let twice = once.substituted(true).unwrap();
        assert_eq!(twice.get("b").unwrap().tree().to_string(), "${a}");
    }

    #[test]
    fn undefined_reference_strict_and_lenient() {
        let s = source(&[("b", text("${missing}"))]);
        let err = s.substituted(true).unwrap_err();
        assert!(matches!(err, StratumError::Substitution { .. }));
        assert!(err.to_string().contains("missing"));
        let lenient = s.substituted(false).unwrap();
        assert_eq!(lenient.get("b").unwrap().tree().to_string(), "${missing}");
    }

    #[test]
    fn self_reference_fails() {
        let s = source(&[("a", text("${a}"))]);
        let err = s.substituted(true).unwrap_err();
        assert!(err.to_string().contains("cyclic"));
    }

    #[test]
    fn cycle_fails_instead_of_looping() {
        let s = source(&[("a", text("${b}")), ("b", text("x${a}"))]);
        assert!(matches!(
            s.substituted(false),
            Err(StratumError::Substitution { .. })
        ));
    }

    #[test]
    fn substitution_is_idempotent() {
        let s = source(&[("a", text("1")), ("b", text("v${a}"))]);
        let once = s.substituted(true).unwrap();
        let twice = once.substituted(true).unwrap();
        assert_eq!(once.tree(), twice.tree());
    }

    #[test]
    fn list_items_substituted() {
        let s = source(&[
            ("a", text("1")),
            ("xs", TreeNode::list(vec![text("${a}"), text("2")])),
        ]);
        assert_eq!(resolved(&s, "xs").to_string(), "[1, 2]");
    }

    #[test]
    fn non_substitutable_strings_untouched() {
        let literal = TreeNode::Value(ValueNode::new(Scalar::Str("${a}".into())));
        let s = source(&[("a", text("1")), ("b", literal.clone())]);
        assert_eq!(resolved(&s, "b"), literal);
    }

    #[test]
    fn unterminated_reference_is_literal() {
        let s = source(&[("b", text("${oops"))]);
        assert_eq!(resolved(&s, "b").to_string(), "${oops");
    }
}
