//! The uniform tree every source format is normalized into.
//!
//! A [`TreeNode`] is a scalar value, a list, a container (string keys,
//! insertion order preserved) or an explicit null. Key absence and explicit
//! null are different things: a container never stores "no node".

use std::collections::HashSet;
use std::fmt;

use crate::error::StratumError;
use crate::path::Path;

/// A scalar as produced by format adapters.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
}

impl Scalar {
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "integer",
            Scalar::Float(_) => "float",
            Scalar::Str(_) => "string",
        }
    }

    /// Textual form used by substitution and string coercion.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Str(s) => s.clone(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

/// A leaf holding one scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueNode {
    pub scalar: Scalar,
    pub comments: String,
    /// Whether `${...}` references in this node are resolved by the substitution pass.
    pub substitutable: bool,
    /// Text before substitution, set once the node has been substituted.
    pub original: Option<String>,
    /// Read from a flat source, where comma text stands in for a list.
    pub flat: bool,
}

impl ValueNode {
    pub fn new(scalar: Scalar) -> Self {
        ValueNode {
            scalar,
            comments: String::new(),
            substitutable: false,
            original: None,
            flat: false,
        }
    }

    /// A substitutable string leaf, as produced by text-based adapters.
    pub fn text(s: impl Into<String>) -> Self {
        ValueNode {
            scalar: Scalar::Str(s.into()),
            comments: String::new(),
            substitutable: true,
            original: None,
            flat: false,
        }
    }

    /// A substitutable string leaf from a flat source.
    pub fn flat_text(s: impl Into<String>) -> Self {
        ValueNode {
            flat: true,
            ..ValueNode::text(s)
        }
    }

    /// The text the substitution pass works from: the original text if the
    /// node was substituted before, the current string otherwise.
    pub fn substitution_text(&self) -> Option<&str> {
        if !self.substitutable {
            return None;
        }
        match (&self.original, &self.scalar) {
            (Some(original), _) => Some(original),
            (None, Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Replace the text of this node with `resolved`, remembering the original.
    pub fn substitute(&self, resolved: String) -> TreeNode {
        let original = self
            .substitution_text()
            .map(str::to_string)
            .or_else(|| self.original.clone());
        TreeNode::Value(ValueNode {
            scalar: Scalar::Str(resolved),
            comments: self.comments.clone(),
            substitutable: self.substitutable,
            original,
            flat: self.flat,
        })
    }

    /// A string leaf read as a list. Empty text is an empty list in every
    /// format. Flat leaves also read text without a separator as a single
    /// element and `a,b,c` as three elements.
    pub fn list_view(&self) -> Option<Vec<TreeNode>> {
        let Scalar::Str(s) = &self.scalar else {
            return None;
        };
        if s.is_empty() {
            return Some(Vec::new());
        }
        if !self.flat {
            return None;
        }
        Some(
            s.split(',')
                .map(|part| {
                    TreeNode::Value(ValueNode {
                        scalar: Scalar::Str(part.to_string()),
                        comments: String::new(),
                        substitutable: self.substitutable,
                        original: None,
                        flat: false,
                    })
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListNode {
    pub items: Vec<TreeNode>,
    pub comments: String,
}

impl ListNode {
    pub fn new(items: Vec<TreeNode>) -> Self {
        ListNode {
            items,
            comments: String::new(),
        }
    }
}

/// Ordered string-keyed children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContainerNode {
    children: Vec<(String, TreeNode)>,
    pub comments: String,
}

impl ContainerNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&TreeNode> {
        self.children.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut TreeNode> {
        self.children
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Insert or replace `key`. A replaced key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, node: TreeNode) {
        let key = key.into();
        match self.get_mut(&key) {
            Some(existing) => *existing = node,
            None => self.children.push((key, node)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<TreeNode> {
        let index = self.children.iter().position(|(k, _)| k == key)?;
        Some(self.children.remove(index).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TreeNode)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn set_at(&mut self, full: &Path, depth: usize, node: TreeNode) -> Result<(), StratumError> {
        let segments = full.segments();
        let key = &segments[depth];
        if depth + 1 == segments.len() {
            self.insert(key.clone(), node);
            return Ok(());
        }
        if !self.contains_key(key) {
            self.insert(key.clone(), TreeNode::Container(ContainerNode::new()));
        }
        match self.get_mut(key) {
            Some(TreeNode::Container(child)) => child.set_at(full, depth + 1, node),
            _ => Err(StratumError::PathConflict {
                path: Path::from_segments(segments[..=depth].iter().cloned()).name(),
            }),
        }
    }
}

impl IntoIterator for ContainerNode {
    type Item = (String, TreeNode);
    type IntoIter = std::vec::IntoIter<(String, TreeNode)>;

    fn into_iter(self) -> Self::IntoIter {
        self.children.into_iter()
    }
}

impl FromIterator<(String, TreeNode)> for ContainerNode {
    fn from_iter<I: IntoIterator<Item = (String, TreeNode)>>(iter: I) -> Self {
        let mut container = ContainerNode::new();
        for (key, node) in iter {
            container.insert(key, node);
        }
        container
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Value(ValueNode),
    List(ListNode),
    Container(ContainerNode),
    Null,
}

impl TreeNode {
    pub fn empty() -> Self {
        TreeNode::Container(ContainerNode::new())
    }

    pub fn scalar(scalar: Scalar) -> Self {
        TreeNode::Value(ValueNode::new(scalar))
    }

    pub fn text(s: impl Into<String>) -> Self {
        TreeNode::Value(ValueNode::text(s))
    }

    pub fn flat_text(s: impl Into<String>) -> Self {
        TreeNode::Value(ValueNode::flat_text(s))
    }

    pub fn list(items: Vec<TreeNode>) -> Self {
        TreeNode::List(ListNode::new(items))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            TreeNode::Value(v) => v.scalar.type_name(),
            TreeNode::List(_) => "list",
            TreeNode::Container(_) => "map",
            TreeNode::Null => "null",
        }
    }

    /// Lists, scalars, nulls and empty containers are leaves.
    pub fn is_leaf(&self) -> bool {
        match self {
            TreeNode::Container(c) => c.is_empty(),
            _ => true,
        }
    }

    pub fn comments(&self) -> &str {
        match self {
            TreeNode::Value(v) => &v.comments,
            TreeNode::List(l) => &l.comments,
            TreeNode::Container(c) => &c.comments,
            TreeNode::Null => "",
        }
    }

    pub fn with_comments(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            TreeNode::Value(v) => v.comments = text.into(),
            TreeNode::List(l) => l.comments = text.into(),
            TreeNode::Container(c) => c.comments = text.into(),
            TreeNode::Null => {}
        }
        self
    }

    pub fn as_container(&self) -> Option<&ContainerNode> {
        match self {
            TreeNode::Container(c) => Some(c),
            _ => None,
        }
    }

    /// Navigate by path. The empty path returns `self`; list items are
    /// addressed by their index.
    pub fn get_or_null(&self, path: &Path) -> Option<&TreeNode> {
        let mut current = self;
        for segment in path.segments() {
            current = match current {
                TreeNode::Container(c) => c.get(segment)?,
                TreeNode::List(l) => l.items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.get_or_null(path).is_some()
    }

    /// Associate `path` with `node`, creating intermediate containers.
    ///
    /// The empty path replaces this node. Fails with
    /// [`StratumError::PathConflict`] when a non-container blocks the path.
    pub fn set(&mut self, path: &Path, node: TreeNode) -> Result<(), StratumError> {
        if path.is_empty() {
            *self = node;
            return Ok(());
        }
        match self {
            TreeNode::Container(c) => c.set_at(path, 0, node),
            _ => Err(StratumError::PathConflict {
                path: path.name(),
            }),
        }
    }

    /// Every leaf path in this tree, in insertion order.
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_paths(self, &Path::empty(), &mut out);
        out
    }

    /// The part of `self` not covered by `other`, or `None` if nothing remains.
    pub fn minus(&self, other: &TreeNode) -> Option<TreeNode> {
        match (self, other) {
            (TreeNode::Container(left), TreeNode::Container(right))
                if !left.is_empty() && !right.is_empty() =>
            {
                let mut out = ContainerNode::new();
                for (key, child) in left.iter() {
                    match right.get(key) {
                        None => out.insert(key, child.clone()),
                        Some(covered) => {
                            if let Some(rest) = child.minus(covered) {
                                out.insert(key, rest);
                            }
                        }
                    }
                }
                if out.is_empty() {
                    None
                } else {
                    Some(TreeNode::Container(out))
                }
            }
            _ => None,
        }
    }

    /// Collapse index-keyed containers (`"0".."N-1"`) into lists, bottom-up.
    ///
    /// Returns a new tree; flat string leaves are left alone because they
    /// already read as lists through [`ValueNode::list_view`].
    pub fn promote_to_list(&self) -> TreeNode {
        match self {
            TreeNode::Container(c) => {
                let promoted: ContainerNode = c
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.promote_to_list()))
                    .collect();
                match index_ordered(&promoted) {
                    Some(items) => TreeNode::List(ListNode {
                        items,
                        comments: c.comments.clone(),
                    }),
                    None => TreeNode::Container(ContainerNode {
                        comments: c.comments.clone(),
                        ..promoted
                    }),
                }
            }
            TreeNode::List(l) => TreeNode::List(ListNode {
                items: l.items.iter().map(TreeNode::promote_to_list).collect(),
                comments: l.comments.clone(),
            }),
            other => other.clone(),
        }
    }

    /// Children of a container or items of a list viewed as a list, if the
    /// node can be read that way.
    pub fn list_items(&self) -> Option<Vec<TreeNode>> {
        match self {
            TreeNode::List(l) => Some(l.items.clone()),
            TreeNode::Value(v) => v.list_view(),
            TreeNode::Container(c) => index_ordered(c),
            TreeNode::Null => None,
        }
    }

    /// A copy with every container key lower-cased.
    pub fn lowercased(&self) -> TreeNode {
        match self {
            TreeNode::Container(c) => {
                let mut lower: ContainerNode = c
                    .iter()
                    .map(|(k, v)| (k.to_lowercase(), v.lowercased()))
                    .collect();
                lower.comments = c.comments.clone();
                TreeNode::Container(lower)
            }
            TreeNode::List(l) => TreeNode::List(ListNode {
                items: l.items.iter().map(TreeNode::lowercased).collect(),
                comments: l.comments.clone(),
            }),
            other => other.clone(),
        }
    }
}

fn index_ordered(container: &ContainerNode) -> Option<Vec<TreeNode>> {
    if container.is_empty() {
        return None;
    }
    let keys: HashSet<&str> = container.keys().collect();
    let n = container.len();
    if keys.len() != n || !(0..n).all(|i| keys.contains(i.to_string().as_str())) {
        return None;
    }
    (0..n)
        .map(|i| container.get(&i.to_string()).cloned())
        .collect()
}

fn collect_paths(node: &TreeNode, prefix: &Path, out: &mut Vec<String>) {
    match node {
        TreeNode::Container(c) if !c.is_empty() => {
            for (key, child) in c.iter() {
                collect_paths(child, &prefix.child(key), out);
            }
        }
        _ => out.push(prefix.name()),
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeNode::Value(v) => write!(f, "{}", v.scalar),
            TreeNode::Null => write!(f, "null"),
            TreeNode::List(l) => {
                write!(f, "[")?;
                for (i, item) in l.items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            TreeNode::Container(c) => {
                write!(f, "{{")?;
                for (i, (key, child)) in c.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {child}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
