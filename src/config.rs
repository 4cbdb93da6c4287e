//! The layered configuration model.
//!
//! A [`Config`] is one layer in a stack. Each layer owns its bindings and
//! never writes into an ancestor; reads fall through to the parent chain and
//! finally to the item's own lifecycle (default or lazy thunk).
//!
//! ```text
//! with_source(file)       "[type: json, file: app.json]"   port = 9090
//!        ↑ parent
//! root                    "config"                         port = 8080 (set)
//!                                                          host = default
//! ```
//!
//! Two kinds of view sit beside plain layers. [`Config::at`] and
//! [`Config::with_prefix`] are child layers that see the parent's item names
//! moved by a prefix. [`Config::with_fallback`] joins two configs: the facade
//! answers first, the fallback fills in what the facade leaves unbound, and
//! writes go to whichever side declares the item.
//!
//! State sits behind a re-entrant lock so [`Config::lock`] can group several
//! operations atomically while the same thread keeps calling into the layer.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::error::StratumError;
use crate::feature::{Feature, FeatureSet};
use crate::flat::to_flat_map;
use crate::load;
use crate::loader::Loader;
use crate::path::{Path, dotted};
use crate::provider::Provider;
use crate::source::Source;
use crate::spec::{AnyItem, Item, ItemId, Lifecycle, Spec, Thunk, erase_thunk};
use crate::tree::TreeNode;
use crate::value::{ConfigValue, Value, to_json};

/// A configuration layer. Cloning shares the layer.
#[derive(Clone)]
pub struct Config(Arc<Layer>);

struct Layer {
    name: String,
    kind: Kind,
    state: ReentrantMutex<RefCell<LayerState>>,
}

enum Kind {
    Root,
    Child(Config),
    Relocated(Config, Relocation),
    Merged { facade: Config, fallback: Config },
}

#[derive(Clone)]
enum Relocation {
    /// The parent's `prefix.*` items appear without the prefix.
    DrillDown(Path),
    /// The parent's items appear under the prefix.
    RollUp(Path),
}

impl Relocation {
    /// A parent name as the relocated layer sees it.
    fn outward(&self, name: &str) -> Option<String> {
        let path = Path::parse(name).ok()?;
        let moved = match self {
            Relocation::DrillDown(prefix) => path.strip_prefix(prefix)?,
            Relocation::RollUp(prefix) => prefix.join(&path),
        };
        (!moved.is_empty()).then(|| moved.name())
    }

    /// A relocated name as the parent knows it.
    fn inward(&self, name: &str) -> Option<String> {
        let path = Path::parse(name).ok()?;
        let moved = match self {
            Relocation::DrillDown(prefix) => prefix.join(&path),
            Relocation::RollUp(prefix) => path.strip_prefix(prefix)?,
        };
        (!moved.is_empty()).then(|| moved.name())
    }

    fn source(&self, source: &Source) -> Option<Source> {
        match self {
            Relocation::DrillDown(prefix) => Some(source.within(prefix)),
            Relocation::RollUp(prefix) => source.nested(prefix).ok(),
        }
    }
}

#[derive(Default)]
struct LayerState {
    specs: Vec<Spec>,
    items: Vec<(String, AnyItem)>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<ItemId, usize>,
    bindings: HashMap<ItemId, Binding>,
    sources: Vec<Source>,
    has_children: bool,
    features: FeatureSet,
}

#[derive(Clone)]
enum Binding {
    Resolved(Value),
    Lazy(Thunk),
}

/// Loads sources into the layer made by [`Config::with_load_trigger`].
/// Clones share the layer, so a watcher can keep one and load later.
#[derive(Clone)]
pub struct LayerLoader {
    layer: Config,
}

impl LayerLoader {
    pub fn layer(&self) -> &Config {
        &self.layer
    }

    /// Merge `source` into the layer; a failure leaves it unchanged.
    pub fn load(&self, source: &Source) -> Result<(), StratumError> {
        load::load(&self.layer, source)
    }
}

impl Config {
    /// A root layer named `config`.
    pub fn new() -> Self {
        Config::named("config")
    }

    pub fn named(name: &str) -> Self {
        Config::layer(name, Kind::Root)
    }

    fn layer(name: &str, kind: Kind) -> Self {
        Config(Arc::new(Layer {
            name: name.to_string(),
            kind,
            state: ReentrantMutex::new(RefCell::new(LayerState::default())),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The layer this one reads through. Merged views have none.
    pub fn parent(&self) -> Option<&Config> {
        match &self.0.kind {
            Kind::Child(parent) | Kind::Relocated(parent, _) => Some(parent),
            Kind::Root | Kind::Merged { .. } => None,
        }
    }

    fn read<R>(&self, f: impl FnOnce(&LayerState) -> R) -> R {
        let guard = self.0.state.lock();
        let state = guard.borrow();
        f(&state)
    }

    fn write<R>(&self, f: impl FnOnce(&mut LayerState) -> R) -> R {
        let guard = self.0.state.lock();
        let mut state = guard.borrow_mut();
        f(&mut state)
    }

    /// Run `f` with this layer locked. Nested calls on the same thread
    /// re-enter; other threads block until `f` returns. A merged view locks
    /// its facade, then its fallback.
    pub fn lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let mut f = Some(f);
        let mut out = None;
        self.lock_dyn(&mut || out = Some((f.take().unwrap())()));
        out.unwrap()
    }

    fn lock_dyn(&self, f: &mut dyn FnMut()) {
        match &self.0.kind {
            Kind::Merged { facade, fallback } => facade.lock_dyn(&mut || {
                fallback.lock_dyn(&mut || {
                    let _guard = self.0.state.lock();
                    f()
                })
            }),
            _ => {
                let _guard = self.0.state.lock();
                f()
            }
        }
    }

    // -- Layers -------------------------------------------------------------

    /// Fork a child layer. The parent's specs are frozen from now on.
    pub fn with_layer(&self, name: &str) -> Config {
        self.mark_forked(name);
        Config::layer(name, Kind::Child(self.clone()))
    }

    /// Fork a child layer named after `source` and load it. On failure no
    /// layer is forked and this layer's specs stay open.
    pub fn with_source(&self, source: &Source) -> Result<Config, StratumError> {
        self.lock(|| {
            let child = Config::layer(&source.description(), Kind::Child(self.clone()));
            load::load(&child, source)?;
            self.mark_forked(child.name());
            Ok(child)
        })
    }

    fn mark_forked(&self, child: &str) {
        self.write(|state| state.has_children = true);
        trace!(parent = %self.name(), layer = %child, "forked layer");
    }

    /// Fork a child layer named `trigger: <description>` and hand `trigger`
    /// a loader for it. The loader may be kept and used later, e.g. by a
    /// watcher reacting to changes.
    pub fn with_load_trigger<F>(&self, description: &str, trigger: F) -> Result<Config, StratumError>
    where
        F: FnOnce(&Config, LayerLoader) -> Result<(), StratumError>,
    {
        let layer = self.with_layer(&format!("trigger: {description}"));
        trigger(&layer, LayerLoader { layer: layer.clone() })?;
        Ok(layer)
    }

    /// A view whose items are this config's items under `path`, with
    /// `path.` removed from their names.
    pub fn at(&self, path: &str) -> Result<Config, StratumError> {
        let prefix = Path::parse(path)?;
        if prefix.is_empty() {
            return Ok(self.clone());
        }
        if !self.contains_path(path) {
            return Err(StratumError::NoSuchItem {
                name: path.to_string(),
            });
        }
        Ok(self.relocated(&format!("at({path})"), Relocation::DrillDown(prefix)))
    }

    /// A view whose items are this config's items with `prefix.` prepended.
    pub fn with_prefix(&self, prefix: &str) -> Result<Config, StratumError> {
        let parsed = Path::parse(prefix)?;
        if parsed.is_empty() {
            return Ok(self.clone());
        }
        Ok(self.relocated(&format!("with_prefix({prefix})"), Relocation::RollUp(parsed)))
    }

    fn relocated(&self, name: &str, relocation: Relocation) -> Config {
        trace!(parent = %self.name(), layer = %name, "relocated view");
        Config::layer(name, Kind::Relocated(self.clone(), relocation))
    }

    /// A view where this config answers first and `fallback` answers for
    /// items this config leaves unbound or does not declare.
    pub fn with_fallback(&self, fallback: &Config) -> Config {
        let name = format!("merged({}, {})", self.name(), fallback.name());
        Config::layer(
            &name,
            Kind::Merged {
                facade: self.clone(),
                fallback: fallback.clone(),
            },
        )
    }

    /// `facade` in front of this config; the mirror of [`Config::with_fallback`].
    pub fn plus(&self, facade: &Config) -> Config {
        facade.with_fallback(self)
    }

    /// Load from a specific format into child layers.
    pub fn from(&self, provider: impl Provider + 'static) -> Loader {
        Loader::new(self.clone(), Some(Arc::new(provider)))
    }

    /// Load files into child layers, detecting the format by extension.
    pub fn from_files(&self) -> Loader {
        Loader::new(self.clone(), None)
    }

    /// Layer names from this layer up to the root.
    pub fn layer_names(&self) -> Vec<String> {
        let mut names = vec![self.name().to_string()];
        if let Some(parent) = self.parent() {
            names.extend(parent.layer_names());
        }
        names
    }

    /// Drop every binding in this layer. A merged view clears both sides.
    pub fn clear(&self) {
        self.write(|state| state.bindings.clear());
        if let Kind::Merged { facade, fallback } = &self.0.kind {
            facade.clear();
            fallback.clear();
        }
    }

    // -- Specs and items ----------------------------------------------------

    /// Register the items of `spec` (inner specs included) in this layer and
    /// load them from the sources already in the chain.
    pub fn add_spec(&self, spec: Spec) -> Result<(), StratumError> {
        let incoming = spec.qualified_items();
        self.register(incoming, Some(spec))
    }

    /// Register a single item as `prefix.<item name>`.
    pub fn add_item<T: ConfigValue>(&self, item: &Item<T>, prefix: &str) -> Result<(), StratumError> {
        let name = dotted(prefix, item.name());
        self.register(vec![(name, item.erased().clone())], None)
    }

    fn register(&self, incoming: Vec<(String, AnyItem)>, spec: Option<Spec>) -> Result<(), StratumError> {
        if let Kind::Merged { facade, fallback } = &self.0.kind {
            return self.lock(|| {
                fallback.check_incoming(&incoming)?;
                facade.register(incoming, spec)
            });
        }
        self.lock(|| {
            if self.read(|state| state.has_children) {
                return Err(StratumError::SpecFrozen {
                    layer: self.name().to_string(),
                });
            }
            self.check_incoming(&incoming)?;

            let mut staged = Vec::new();
            for source in self.sources() {
                staged.extend(load::resolve_items(self, &incoming, &source)?);
            }

            self.write(|state| {
                for (name, item) in incoming {
                    let index = state.items.len();
                    state.by_name.insert(name.clone(), index);
                    state.by_id.insert(item.id(), index);
                    state.items.push((name, item));
                }
                for (id, value) in staged {
                    state.bindings.insert(id, Binding::Resolved(value));
                }
                state.specs.extend(spec);
            });
            Ok(())
        })
    }

    /// Reject items already visible here and names that nest inside (or
    /// around) a visible name.
    fn check_incoming(&self, incoming: &[(String, AnyItem)]) -> Result<(), StratumError> {
        let mut known: Vec<String> = self.chain_items().into_iter().map(|(name, _)| name).collect();
        for (name, item) in incoming {
            if self.contains_id(item.id()) || incoming_repeats(incoming, name, item) {
                return Err(StratumError::RepeatedItem { name: name.clone() });
            }
            let path = Path::parse(name)?;
            let clash = known.iter().any(|other| {
                Path::parse(other).is_ok_and(|other| other.is_prefix_of(&path) || path.is_prefix_of(&other))
            });
            if clash {
                return Err(StratumError::NameConflict { name: name.clone() });
            }
            known.push(name.clone());
        }
        Ok(())
    }

    /// Specs visible from this layer, root first.
    pub fn specs(&self) -> Vec<Spec> {
        let mut specs = match &self.0.kind {
            Kind::Root => Vec::new(),
            Kind::Child(parent) | Kind::Relocated(parent, _) => parent.specs(),
            Kind::Merged { facade, fallback } => {
                let mut specs = fallback.specs();
                specs.extend(facade.specs());
                specs
            }
        };
        specs.extend(self.read(|state| state.specs.clone()));
        specs
    }

    /// Items visible from this layer, root first.
    pub fn items(&self) -> Vec<AnyItem> {
        self.chain_items().into_iter().map(|(_, item)| item).collect()
    }

    pub(crate) fn chain_items(&self) -> Vec<(String, AnyItem)> {
        let mut items = match &self.0.kind {
            Kind::Root => Vec::new(),
            Kind::Child(parent) => parent.chain_items(),
            Kind::Relocated(parent, relocation) => parent
                .chain_items()
                .into_iter()
                .filter_map(|(name, item)| relocation.outward(&name).map(|name| (name, item)))
                .collect(),
            Kind::Merged { facade, fallback } => {
                let front = facade.chain_items();
                let shadowed: HashSet<ItemId> = front.iter().map(|(_, item)| item.id()).collect();
                let mut items: Vec<_> = fallback
                    .chain_items()
                    .into_iter()
                    .filter(|(_, item)| !shadowed.contains(&item.id()))
                    .collect();
                items.extend(front);
                items
            }
        };
        items.extend(self.read(|state| state.items.clone()));
        items
    }

    /// Sources loaded into this layer and its ancestors, root first.
    pub fn sources(&self) -> Vec<Source> {
        let mut sources = match &self.0.kind {
            Kind::Root => Vec::new(),
            Kind::Child(parent) => parent.sources(),
            Kind::Relocated(parent, relocation) => parent
                .sources()
                .iter()
                .filter_map(|source| relocation.source(source))
                .collect(),
            Kind::Merged { facade, fallback } => {
                let mut sources = fallback.sources();
                sources.extend(facade.sources());
                sources
            }
        };
        sources.extend(self.read(|state| state.sources.clone()));
        sources
    }

    fn contains_id(&self, id: ItemId) -> bool {
        self.read(|state| state.by_id.contains_key(&id))
            || match &self.0.kind {
                Kind::Root => false,
                Kind::Child(parent) => parent.contains_id(id),
                Kind::Relocated(..) => self.qualified_name(id).is_some(),
                Kind::Merged { facade, fallback } => facade.contains_id(id) || fallback.contains_id(id),
            }
    }

    pub fn contains_item<T>(&self, item: &Item<T>) -> bool
    where
        T: ConfigValue,
    {
        self.contains_id(item.id())
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.find_by_name(name).is_some()
    }

    /// Whether `path` is an item name or a prefix of one.
    pub fn contains_path(&self, path: &str) -> bool {
        let Ok(path) = Path::parse(path) else {
            return false;
        };
        self.chain_items()
            .iter()
            .any(|(name, _)| Path::parse(name).is_ok_and(|n| path.is_prefix_of(&n)))
    }

    /// Whether every required item visible here has a value.
    pub fn contains_required(&self) -> bool {
        self.validate_required().is_ok()
    }

    /// Fail with [`StratumError::UnsetValue`] for the first required item
    /// that has no value.
    pub fn validate_required(&self) -> Result<(), StratumError> {
        for (_, item) in self.chain_items() {
            if !item.is_required() {
                continue;
            }
            if let Err(e @ StratumError::UnsetValue { .. }) = self.get_any(&item) {
                return Err(e);
            }
        }
        Ok(())
    }

    /// The fully qualified name `item` is registered under.
    pub fn name_of<T: ConfigValue>(&self, item: &Item<T>) -> Option<String> {
        self.qualified_name(item.id())
    }

    fn qualified_name(&self, id: ItemId) -> Option<String> {
        let own = self.read(|state| state.by_id.get(&id).map(|&index| state.items[index].0.clone()));
        own.or_else(|| match &self.0.kind {
            Kind::Root => None,
            Kind::Child(parent) => parent.qualified_name(id),
            Kind::Relocated(parent, relocation) => parent
                .qualified_name(id)
                .and_then(|name| relocation.outward(&name)),
            Kind::Merged { facade, fallback } => facade
                .qualified_name(id)
                .or_else(|| fallback.qualified_name(id)),
        })
    }

    fn find_by_name(&self, name: &str) -> Option<AnyItem> {
        let own = self.read(|state| {
            state
                .by_name
                .get(name)
                .map(|&index| state.items[index].1.clone())
        });
        own.or_else(|| match &self.0.kind {
            Kind::Root => None,
            Kind::Child(parent) => parent.find_by_name(name),
            Kind::Relocated(parent, relocation) => relocation
                .inward(name)
                .and_then(|name| parent.find_by_name(&name)),
            Kind::Merged { facade, fallback } => facade
                .find_by_name(name)
                .or_else(|| fallback.find_by_name(name)),
        })
    }

    fn item_by_name(&self, name: &str) -> Result<AnyItem, StratumError> {
        self.find_by_name(name).ok_or_else(|| StratumError::NoSuchItem {
            name: name.to_string(),
        })
    }

    fn ensure_contains(&self, item: &AnyItem) -> Result<(), StratumError> {
        if self.contains_id(item.id()) {
            Ok(())
        } else {
            Err(StratumError::NoSuchItem {
                name: item.name().to_string(),
            })
        }
    }

    // -- Reads --------------------------------------------------------------

    pub fn get<T: ConfigValue>(&self, item: &Item<T>) -> Result<T, StratumError> {
        T::from_value(self.get_any(item.erased())?)
    }

    /// Like [`Config::get`], but an unset item reads as `None`.
    pub fn get_or_none<T: ConfigValue>(&self, item: &Item<T>) -> Result<Option<T>, StratumError> {
        match self.get(item) {
            Ok(value) => Ok(Some(value)),
            Err(StratumError::UnsetValue { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_by_name(&self, name: &str) -> Result<Value, StratumError> {
        let item = self.item_by_name(name)?;
        self.get_any(&item)
    }

    pub(crate) fn get_any(&self, item: &AnyItem) -> Result<Value, StratumError> {
        self.ensure_contains(item)?;
        match self.bound(item, self) {
            Some(value) => value,
            None => match item.lifecycle() {
                Lifecycle::Required => Err(StratumError::UnsetValue {
                    name: self.display_name(item),
                }),
                Lifecycle::Optional(default) => Ok(default.clone()),
                Lifecycle::Lazy(thunk) => self.evaluate(item, thunk),
            },
        }
    }

    /// The nearest binding of `item`, evaluated against `reader`; `None`
    /// when no layer binds it.
    fn bound(&self, item: &AnyItem, reader: &Config) -> Option<Result<Value, StratumError>> {
        let binding = self.read(|state| state.bindings.get(&item.id()).cloned());
        match binding {
            Some(Binding::Resolved(value)) => Some(Ok(value)),
            Some(Binding::Lazy(thunk)) => Some(reader.evaluate(item, &thunk)),
            None => match &self.0.kind {
                Kind::Root => None,
                Kind::Child(parent) | Kind::Relocated(parent, _) => parent.bound(item, reader),
                Kind::Merged { facade, fallback } => [facade, fallback]
                    .into_iter()
                    .filter(|side| side.contains_id(item.id()))
                    .find_map(|side| side.bound(item, reader)),
            },
        }
    }

    fn evaluate(&self, item: &AnyItem, thunk: &Thunk) -> Result<Value, StratumError> {
        let value = thunk(self)?;
        if value.conforms(item.type_desc()) {
            Ok(value)
        } else {
            Err(StratumError::InvalidLazySet {
                name: self.display_name(item),
                reason: value.mismatch(item.type_desc()).to_string(),
            })
        }
    }

    fn display_name(&self, item: &AnyItem) -> String {
        self.qualified_name(item.id())
            .unwrap_or_else(|| item.name().to_string())
    }

    // -- Writes -------------------------------------------------------------

    /// Bind `value` in this layer, replacing any lazy binding.
    pub fn set<T: ConfigValue>(&self, item: &Item<T>, value: T) -> Result<(), StratumError> {
        self.set_any(item.erased(), value.into_value())
    }

    pub fn set_by_name(&self, name: &str, value: Value) -> Result<(), StratumError> {
        let item = self.item_by_name(name)?;
        self.set_any(&item, value)
    }

    fn set_any(&self, item: &AnyItem, value: Value) -> Result<(), StratumError> {
        self.ensure_contains(item)?;
        if !value.conforms(item.type_desc()) {
            return Err(value.mismatch(item.type_desc()));
        }
        if let Some(side) = self.owning_side(item) {
            return side.set_any(item, value);
        }
        self.write(|state| state.bindings.insert(item.id(), Binding::Resolved(value.clone())));
        item.notify_set(&value);
        Ok(())
    }

    /// Bind a thunk evaluated on every read against the reading layer.
    pub fn lazy_set<T, F>(&self, item: &Item<T>, thunk: F) -> Result<(), StratumError>
    where
        T: ConfigValue,
        F: Fn(&Config) -> Result<T, StratumError> + Send + Sync + 'static,
    {
        self.lazy_set_any(item.erased(), erase_thunk(thunk))
    }

    pub fn lazy_set_by_name<F>(&self, name: &str, thunk: F) -> Result<(), StratumError>
    where
        F: Fn(&Config) -> Result<Value, StratumError> + Send + Sync + 'static,
    {
        let item = self.item_by_name(name)?;
        self.lazy_set_any(&item, Arc::new(thunk))
    }

    fn lazy_set_any(&self, item: &AnyItem, thunk: Thunk) -> Result<(), StratumError> {
        self.ensure_contains(item)?;
        if let Some(side) = self.owning_side(item) {
            return side.lazy_set_any(item, thunk);
        }
        self.write(|state| state.bindings.insert(item.id(), Binding::Lazy(thunk)));
        Ok(())
    }

    /// Remove this layer's binding; reads fall through to the parent.
    pub fn unset<T: ConfigValue>(&self, item: &Item<T>) -> Result<(), StratumError> {
        self.unset_any(item.erased())
    }

    pub fn unset_by_name(&self, name: &str) -> Result<(), StratumError> {
        let item = self.item_by_name(name)?;
        self.unset_any(&item)
    }

    fn unset_any(&self, item: &AnyItem) -> Result<(), StratumError> {
        self.ensure_contains(item)?;
        if let Some(side) = self.owning_side(item) {
            return side.unset_any(item);
        }
        self.write(|state| state.bindings.remove(&item.id()));
        Ok(())
    }

    /// The side of a merged view that takes writes for `item`.
    fn owning_side(&self, item: &AnyItem) -> Option<&Config> {
        match &self.0.kind {
            Kind::Merged { facade, fallback } => {
                Some(if facade.contains_id(item.id()) { facade } else { fallback })
            }
            _ => None,
        }
    }

    /// Commit loaded values and record `source`. `clear` drops existing
    /// bindings first. A merged view hands each value to the side that
    /// declares the item and records the source on the facade.
    pub(crate) fn commit(&self, values: Vec<(ItemId, Value)>, source: Option<Source>, clear: bool) {
        if let Kind::Merged { facade, fallback } = &self.0.kind {
            let (front, back): (Vec<_>, Vec<_>) =
                values.into_iter().partition(|(id, _)| facade.contains_id(*id));
            fallback.commit(back, None, clear);
            facade.commit(front, source, clear);
            return;
        }
        self.write(|state| {
            if clear {
                state.bindings.clear();
                state.sources.clear();
            }
            for (id, value) in values {
                state.bindings.insert(id, Binding::Resolved(value));
            }
            state.sources.extend(source);
        });
    }

    /// Replace this layer's bindings with the contents of `source`.
    pub fn reload(&self, source: &Source) -> Result<(), StratumError> {
        load::reload(self, source)
    }

    // -- Features -----------------------------------------------------------

    pub fn enable(&self, feature: Feature) {
        self.write(|state| state.features.set(feature, true));
    }

    pub fn disable(&self, feature: Feature) {
        self.write(|state| state.features.set(feature, false));
    }

    /// This layer's override, else the nearest ancestor's, else the default.
    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.feature_override(feature)
            .unwrap_or_else(|| feature.enabled_by_default())
    }

    fn feature_override(&self, feature: Feature) -> Option<bool> {
        self.read(|state| state.features.get(feature))
            .or_else(|| self.parent().and_then(|p| p.feature_override(feature)))
    }

    // -- Exports ------------------------------------------------------------

    /// Every item that currently has a value, by qualified name.
    pub fn to_map(&self) -> Result<BTreeMap<String, Value>, StratumError> {
        let mut map = BTreeMap::new();
        for (name, item) in self.chain_items() {
            match self.get_any(&item) {
                Ok(value) => {
                    map.insert(name, value);
                }
                Err(StratumError::UnsetValue { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(map)
    }

    pub fn to_tree(&self) -> Result<TreeNode, StratumError> {
        let mut tree = TreeNode::empty();
        for (name, value) in self.to_map()? {
            tree.set(&Path::parse(&name)?, value.to_tree())?;
        }
        Ok(tree)
    }

    pub fn to_flat_map(&self) -> Result<BTreeMap<String, String>, StratumError> {
        Ok(to_flat_map(&self.to_tree()?))
    }

    /// Bind the current values to a serde type.
    pub fn to_object<T: DeserializeOwned>(&self) -> Result<T, StratumError> {
        let mut root = serde_json::Map::new();
        for (name, value) in self.to_map()? {
            insert_json(&mut root, Path::parse(&name)?.segments(), to_json(&value));
        }
        serde_json::from_value(serde_json::Value::Object(root)).map_err(|e| {
            StratumError::ObjectMapping {
                ty: std::any::type_name::<T>().to_string(),
                reason: e.to_string(),
            }
        })
    }
}

fn incoming_repeats(incoming: &[(String, AnyItem)], name: &str, item: &AnyItem) -> bool {
    incoming
        .iter()
        .take_while(|(other, _)| other != name)
        .any(|(_, other)| other.id() == item.id())
}

fn insert_json(map: &mut serde_json::Map<String, serde_json::Value>, segments: &[String], value: serde_json::Value) {
    match segments {
        [] => {}
        [last] => {
            map.insert(last.clone(), value);
        }
        [head, rest @ ..] => {
            let entry = map
                .entry(head.clone())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
            if let serde_json::Value::Object(child) = entry {
                insert_json(child, rest, value);
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("layers", &self.layer_names())
            .field("items", &self.chain_items().iter().map(|(n, _)| n.clone()).collect::<Vec<_>>())
            .finish()
    }
}
