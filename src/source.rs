//! Sources: a tree plus descriptive metadata, and the fallback combinator.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::coerce::coerce;
use crate::error::StratumError;
use crate::feature::{Feature, FeatureSet};
use crate::json_source::tree_to_json;
use crate::merge::deep_merge;
use crate::path::Path;
use crate::substitute::substitute_tree;
use crate::tree::TreeNode;
use crate::value::{ConfigValue, TypeDesc, Value};

/// A configuration source.
///
/// Cloning is cheap. Combinators such as [`Source::with_fallback`] build new
/// handles over the same trees; lookups through a fallback chain merge
/// per lookup and never copy whole trees up front.
#[derive(Clone)]
pub struct Source(Arc<SourceInner>);

#[derive(Clone)]
struct SourceInner {
    kind: Kind,
    info: Vec<(String, String)>,
    context: Vec<(String, String)>,
    features: FeatureSet,
}

#[derive(Clone)]
enum Kind {
    Base(Arc<TreeNode>),
    Fallback { facade: Source, fallback: Source },
}

impl Source {
    pub fn new(tree: TreeNode) -> Self {
        Source(Arc::new(SourceInner {
            kind: Kind::Base(Arc::new(tree)),
            info: Vec::new(),
            context: Vec::new(),
            features: FeatureSet::new(),
        }))
    }

    pub fn empty() -> Self {
        Source::new(TreeNode::empty())
    }

    /// Fold sources into one fallback chain; the first has highest priority.
    pub fn chain(sources: impl IntoIterator<Item = Source>) -> Source {
        let mut iter = sources.into_iter();
        match iter.next() {
            Some(first) => iter.fold(first, |acc, next| acc.with_fallback(&next)),
            None => Source::empty(),
        }
    }

    fn rebuild(&self, f: impl FnOnce(&mut SourceInner)) -> Source {
        let mut inner = (*self.0).clone();
        f(&mut inner);
        Source(Arc::new(inner))
    }

    /// Attach a static descriptive entry such as `type = json`.
    pub fn with_info(&self, key: impl Into<String>, value: impl Into<String>) -> Source {
        let (key, value) = (key.into(), value.into());
        self.rebuild(|inner| set_entry(&mut inner.info, key, value))
    }

    /// Attach provenance such as the file path or URL it came from.
    pub fn with_context(&self, key: impl Into<String>, value: impl Into<String>) -> Source {
        let (key, value) = (key.into(), value.into());
        self.rebuild(|inner| set_entry(&mut inner.context, key, value))
    }

    pub fn info(&self) -> &[(String, String)] {
        &self.0.info
    }

    pub fn context(&self) -> &[(String, String)] {
        &self.0.context
    }

    pub fn info_value(&self, key: &str) -> Option<&str> {
        self.0
            .info
            .iter()
            .chain(self.0.context.iter())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `[key: value, ...]` over info and context.
    pub fn description(&self) -> String {
        let entries: Vec<String> = self
            .0
            .info
            .iter()
            .chain(self.0.context.iter())
            .map(|(k, v)| format!("{k}: {v}"))
            .collect();
        format!("[{}]", entries.join(", "))
    }

    /// Combine with `fallback`: lookups prefer `self` and fall through.
    ///
    /// Feature overrides of the facade win over those of the fallback, except
    /// [`Feature::SubstituteSourceBeforeLoaded`], which each side keeps for
    /// itself; disable it on the result to skip the whole chain.
    pub fn with_fallback(&self, fallback: &Source) -> Source {
        Source(Arc::new(SourceInner {
            info: vec![
                ("facade".to_string(), self.description()),
                ("fallback".to_string(), fallback.description()),
            ],
            context: Vec::new(),
            features: self
                .0
                .features
                .over(&fallback.0.features)
                .without(Feature::SubstituteSourceBeforeLoaded),
            kind: Kind::Fallback {
                facade: self.clone(),
                fallback: fallback.clone(),
            },
        }))
    }

    /// Nest the whole tree under `prefix`.
    pub fn with_prefix(&self, prefix: &str) -> Result<Source, StratumError> {
        self.nested(&Path::parse(prefix)?)
    }

    pub(crate) fn nested(&self, prefix: &Path) -> Result<Source, StratumError> {
        if prefix.is_empty() {
            return Ok(self.clone());
        }
        let mut tree = TreeNode::empty();
        tree.set(prefix, self.tree())?;
        let kind = Kind::Base(Arc::new(tree));
        Ok(self.rebuild(|inner| inner.kind = kind))
    }

    /// The sub-source at `path`, or an empty tree with the same info.
    pub(crate) fn within(&self, path: &Path) -> Source {
        self.sub_source(path).unwrap_or_else(|| {
            let kind = Kind::Base(Arc::new(TreeNode::empty()));
            self.rebuild(|inner| inner.kind = kind)
        })
    }

    /// The node at `path`, merged across the fallback chain.
    pub(crate) fn node_at(&self, path: &Path) -> Option<TreeNode> {
        match &self.0.kind {
            Kind::Base(tree) => tree.get_or_null(path).cloned(),
            Kind::Fallback { facade, fallback } => {
                match (facade.node_at(path), fallback.node_at(path)) {
                    (Some(f @ TreeNode::Container(_)), Some(b @ TreeNode::Container(_))) => {
                        Some(deep_merge(b, f))
                    }
                    (Some(f), _) => Some(f),
                    (None, b) => b,
                }
            }
        }
    }

    pub(crate) fn contains_path(&self, path: &Path) -> bool {
        match &self.0.kind {
            Kind::Base(tree) => tree.contains(path),
            Kind::Fallback { facade, fallback } => {
                facade.contains_path(path) || fallback.contains_path(path)
            }
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        Path::parse(path).is_ok_and(|p| self.contains_path(&p))
    }

    /// The sub-source rooted at `path`, if present.
    pub fn get_or_null(&self, path: &str) -> Option<Source> {
        let path = Path::parse(path).ok()?;
        self.sub_source(&path)
    }

    pub fn get(&self, path: &str) -> Result<Source, StratumError> {
        let parsed = Path::parse(path)?;
        self.sub_source(&parsed)
            .ok_or_else(|| StratumError::NoSuchPath {
                path: path.to_string(),
                source_desc: self.description(),
            })
    }

    fn sub_source(&self, path: &Path) -> Option<Source> {
        if path.is_empty() {
            return Some(self.clone());
        }
        let node = self.node_at(path)?;
        let kind = Kind::Base(Arc::new(node));
        Some(self.rebuild(|inner| inner.kind = kind))
    }

    /// The merged tree of this source.
    pub fn tree(&self) -> TreeNode {
        match &self.0.kind {
            Kind::Base(tree) => (**tree).clone(),
            Kind::Fallback { facade, fallback } => deep_merge(fallback.tree(), facade.tree()),
        }
    }

    /// Resolve `${path}` references against this (merged) source.
    ///
    /// Each side of a fallback chain is substituted against the whole chain,
    /// so cross-source references resolve. Sides that disable
    /// [`Feature::SubstituteSourceBeforeLoaded`] are left untouched.
    pub fn substituted(&self, error_when_undefined: bool) -> Result<Source, StratumError> {
        debug!(source = %self.description(), "substituting source");
        self.substituted_against(self, error_when_undefined)
    }

    fn substituted_against(&self, root: &Source, error_when_undefined: bool) -> Result<Source, StratumError> {
        if self.0.features.get(Feature::SubstituteSourceBeforeLoaded) == Some(false) {
            return Ok(self.clone());
        }
        let kind = match &self.0.kind {
            Kind::Base(tree) => Kind::Base(Arc::new(substitute_tree(root, tree, error_when_undefined)?)),
            Kind::Fallback { facade, fallback } => Kind::Fallback {
                facade: facade.substituted_against(root, error_when_undefined)?,
                fallback: fallback.substituted_against(root, error_when_undefined)?,
            },
        };
        Ok(self.rebuild(|inner| inner.kind = kind))
    }

    /// A view with every key lower-cased.
    pub fn lowercased(&self) -> Source {
        let kind = match &self.0.kind {
            Kind::Base(tree) => Kind::Base(Arc::new(tree.lowercased())),
            Kind::Fallback { facade, fallback } => Kind::Fallback {
                facade: facade.lowercased(),
                fallback: fallback.lowercased(),
            },
        };
        self.rebuild(|inner| inner.kind = kind)
    }

    pub fn enabled(&self, feature: Feature) -> Source {
        self.rebuild(|inner| inner.features.set(feature, true))
    }

    pub fn disabled(&self, feature: Feature) -> Source {
        self.rebuild(|inner| inner.features.set(feature, false))
    }

    /// Explicit override on this source, if any.
    pub fn feature_override(&self, feature: Feature) -> Option<bool> {
        self.0.features.get(feature)
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.feature_override(feature)
            .unwrap_or_else(|| feature.enabled_by_default())
    }

    /// Coerce the whole source into `T`.
    pub fn to<T: ConfigValue>(&self) -> Result<T, StratumError> {
        T::from_value(coerce(&self.tree(), &T::type_desc())?)
    }

    pub fn to_bool(&self) -> Result<bool, StratumError> {
        self.to()
    }

    pub fn to_i64(&self) -> Result<i64, StratumError> {
        self.to()
    }

    pub fn to_f64(&self) -> Result<f64, StratumError> {
        self.to()
    }

    pub fn to_text(&self) -> Result<String, StratumError> {
        self.to()
    }

    pub fn to_list<T: ConfigValue>(&self) -> Result<Vec<T>, StratumError> {
        self.to()
    }

    /// Coerce into an arbitrary type described at runtime.
    pub fn to_value(&self, desc: &TypeDesc) -> Result<Value, StratumError> {
        coerce(&self.tree(), desc)
    }

    /// Bind the source to a serde type. Scalars are taken as stored, so
    /// text-only sources are better bound through [`ConfigValue`].
    pub fn to_object<T: DeserializeOwned>(&self) -> Result<T, StratumError> {
        serde_json::from_value(tree_to_json(&self.tree())).map_err(|e| {
            StratumError::ObjectMapping {
                ty: type_name::<T>().to_string(),
                reason: e.to_string(),
            }
        })
    }
}

fn set_entry(entries: &mut Vec<(String, String)>, key: String, value: String) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("description", &self.description())
            .field("tree", &self.tree())
            .finish()
    }
}

impl Default for Source {
    fn default() -> Self {
        Source::empty()
    }
}

impl From<TreeNode> for Source {
    fn from(tree: TreeNode) -> Self {
        Source::new(tree)
    }
}
