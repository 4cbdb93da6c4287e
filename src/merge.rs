use crate::tree::{ContainerNode, TreeNode};

/// Deep-merge `overlay` on top of `base`.
/// If both sides are containers, recurse key by key.
/// Otherwise, `overlay` wins (lists are replaced, never concatenated).
pub fn deep_merge(base: TreeNode, overlay: TreeNode) -> TreeNode {
    match (base, overlay) {
        (TreeNode::Container(base), TreeNode::Container(overlay)) => {
            TreeNode::Container(merge_containers(base, overlay))
        }
        (_, overlay) => overlay,
    }
}

fn merge_containers(mut base: ContainerNode, overlay: ContainerNode) -> ContainerNode {
    if !overlay.comments.is_empty() {
        base.comments = overlay.comments.clone();
    }
    for (key, overlay_val) in overlay {
        match base.get_mut(&key) {
            Some(slot) => {
                let base_val = std::mem::replace(slot, TreeNode::Null);
                *slot = deep_merge(base_val, overlay_val);
            }
            None => base.insert(key, overlay_val),
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;
    use crate::tree::Scalar;

    fn tree(pairs: &[(&str, TreeNode)]) -> TreeNode {
        let mut t = TreeNode::empty();
        for (path, node) in pairs {
            t.set(&Path::parse(path).unwrap(), node.clone()).unwrap();
        }
        t
    }

    fn int(i: i128) -> TreeNode {
        TreeNode::scalar(Scalar::Int(i))
    }

    fn at<'a>(t: &'a TreeNode, path: &str) -> Option<&'a TreeNode> {
        t.get_or_null(&Path::parse(path).unwrap())
    }

    #[test]
    fn disjoint_keys_merge() {
        let base = tree(&[("host", TreeNode::text("localhost"))]);
        let overlay = tree(&[("port", int(3000))]);
        let merged = deep_merge(base, overlay);
        assert_eq!(at(&merged, "host"), Some(&TreeNode::text("localhost")));
        assert_eq!(at(&merged, "port"), Some(&int(3000)));
    }

    #[test]
    fn same_scalar_key_overlay_wins() {
        let merged = deep_merge(tree(&[("port", int(8080))]), tree(&[("port", int(3000))]));
        assert_eq!(at(&merged, "port"), Some(&int(3000)));
    }

    #[test]
    fn nested_containers_recurse() {
        let base = tree(&[
            ("database.url", TreeNode::text("postgres://old")),
            ("database.pool_size", int(5)),
        ]);
        let overlay = tree(&[("database.pool_size", int(20))]);
        let merged = deep_merge(base, overlay);
        assert_eq!(
            at(&merged, "database.url"),
            Some(&TreeNode::text("postgres://old"))
        );
        assert_eq!(at(&merged, "database.pool_size"), Some(&int(20)));
    }

    #[test]
    fn overlay_scalar_replaces_container() {
        let base = tree(&[("database.url", TreeNode::text("x"))]);
        let overlay = tree(&[("database", TreeNode::text("flat_string"))]);
        let merged = deep_merge(base, overlay);
        assert_eq!(at(&merged, "database"), Some(&TreeNode::text("flat_string")));
    }

    #[test]
    fn lists_are_replaced_not_concatenated() {
        let base = tree(&[("xs", TreeNode::list(vec![int(1), int(2)]))]);
        let overlay = tree(&[("xs", TreeNode::list(vec![int(3)]))]);
        let merged = deep_merge(base, overlay);
        assert_eq!(at(&merged, "xs"), Some(&TreeNode::list(vec![int(3)])));
    }

    #[test]
    fn explicit_null_overrides() {
        let merged = deep_merge(tree(&[("a", int(1))]), tree(&[("a", TreeNode::Null)]));
        assert_eq!(at(&merged, "a"), Some(&TreeNode::Null));
    }

    #[test]
    fn empty_overlay_returns_base() {
        let base = tree(&[("port", int(8080))]);
        let merged = deep_merge(base.clone(), TreeNode::empty());
        assert_eq!(merged, base);
    }

    #[test]
    fn empty_base_returns_overlay() {
        let overlay = tree(&[("port", int(3000))]);
        let merged = deep_merge(TreeNode::empty(), overlay.clone());
        assert_eq!(merged, overlay);
    }

    #[test]
    fn deeply_nested_three_levels() {
        let base = tree(&[("a.b.c.val", int(1)), ("a.b.c.other", TreeNode::text("keep"))]);
        let overlay = tree(&[("a.b.c.val", int(99))]);
        let merged = deep_merge(base, overlay);
        assert_eq!(at(&merged, "a.b.c.val"), Some(&int(99)));
        assert_eq!(at(&merged, "a.b.c.other"), Some(&TreeNode::text("keep")));
    }

    #[test]
    fn multiple_sequential_merges_are_associative() {
        let a = tree(&[("host", TreeNode::text("a"))]);
        let b = tree(&[("port", int(1000))]);
        let c = tree(&[("host", TreeNode::text("c"))]);
        let left = deep_merge(deep_merge(c.clone(), b.clone()), a.clone());
        let right = deep_merge(c, deep_merge(b, a));
        assert_eq!(at(&left, "host"), Some(&TreeNode::text("a")));
        assert_eq!(at(&left, "port"), Some(&int(1000)));
        assert_eq!(left.paths(), right.paths());
        assert_eq!(at(&left, "host"), at(&right, "host"));
    }
}
