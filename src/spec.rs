//! Item declarations.
//!
//! An [`Item<T>`] is a typed handle: a name, a [`TypeDesc`] derived from `T`,
//! and a lifecycle (required, optional with a default, or lazy). A [`Spec`]
//! groups items under a prefix; specs nest.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::StratumError;
use crate::path::dotted;
use crate::value::{ConfigValue, TypeDesc, Value};

/// A value derived from other items at read time.
pub type Thunk = Arc<dyn Fn(&Config) -> Result<Value, StratumError> + Send + Sync>;

/// Process-unique item identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(usize);

impl ItemId {
    fn next() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        ItemId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone)]
pub(crate) enum Lifecycle {
    Required,
    Optional(Value),
    Lazy(Thunk),
}

type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next: u64,
    entries: Vec<(u64, Listener)>,
}

#[derive(Clone)]
pub(crate) struct ItemInner {
    id: ItemId,
    name: String,
    desc: TypeDesc,
    description: String,
    lifecycle: Lifecycle,
    listeners: Arc<Mutex<Listeners>>,
}

/// An item with its value type erased.
#[derive(Clone)]
pub struct AnyItem(Arc<ItemInner>);

impl AnyItem {
    pub fn id(&self) -> ItemId {
        self.0.id
    }

    /// Name relative to the spec that declares it.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn type_desc(&self) -> &TypeDesc {
        &self.0.desc
    }

    pub fn description(&self) -> &str {
        &self.0.description
    }

    /// Whether the item accepts null (its type is an `Option`).
    pub fn nullable(&self) -> bool {
        self.0.desc.is_optional()
    }

    pub fn is_required(&self) -> bool {
        matches!(self.0.lifecycle, Lifecycle::Required)
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.0.lifecycle, Lifecycle::Optional(_))
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self.0.lifecycle, Lifecycle::Lazy(_))
    }

    /// The default of an optional item.
    pub fn default_value(&self) -> Option<&Value> {
        match &self.0.lifecycle {
            Lifecycle::Optional(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn lifecycle(&self) -> &Lifecycle {
        &self.0.lifecycle
    }

    /// Call every `on_set` listener with a value just set on some layer.
    pub(crate) fn notify_set(&self, value: &Value) {
        let listeners: Vec<Listener> = self
            .0
            .listeners
            .lock()
            .entries
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(value);
        }
    }
}

/// Returned by [`Item::on_set`]; cancelling removes the listener.
pub struct ListenerHandle {
    listeners: Weak<Mutex<Listeners>>,
    key: u64,
}

impl ListenerHandle {
    pub fn cancel(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().entries.retain(|(key, _)| *key != self.key);
        }
    }
}

impl fmt::Debug for AnyItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.0.lifecycle {
            Lifecycle::Required => "required",
            Lifecycle::Optional(_) => "optional",
            Lifecycle::Lazy(_) => "lazy",
        };
        f.debug_struct("Item")
            .field("name", &self.0.name)
            .field("type", &self.0.desc.to_string())
            .field("lifecycle", &kind)
            .finish()
    }
}

/// A typed item handle.
pub struct Item<T> {
    inner: AnyItem,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Item<T> {
    fn clone(&self) -> Self {
        Item {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Item<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl<T: ConfigValue> Item<T> {
    fn with_lifecycle(name: &str, lifecycle: Lifecycle) -> Self {
        Item {
            inner: AnyItem(Arc::new(ItemInner {
                id: ItemId::next(),
                name: name.to_string(),
                desc: T::type_desc(),
                description: String::new(),
                lifecycle,
                listeners: Arc::default(),
            })),
            _marker: PhantomData,
        }
    }

    /// An item that must be set or loaded before it is read.
    pub fn required(name: &str) -> Self {
        Self::with_lifecycle(name, Lifecycle::Required)
    }

    /// An item that reads as `default` until set.
    pub fn optional(name: &str, default: T) -> Self {
        Self::with_lifecycle(name, Lifecycle::Optional(default.into_value()))
    }

    /// An item computed from other items each time it is read, until set.
    pub fn lazy<F>(name: &str, thunk: F) -> Self
    where
        F: Fn(&Config) -> Result<T, StratumError> + Send + Sync + 'static,
    {
        Self::with_lifecycle(name, Lifecycle::Lazy(erase_thunk(thunk)))
    }

    pub fn described(self, description: &str) -> Self {
        let mut inner = Arc::unwrap_or_clone(self.inner.0);
        inner.description = description.to_string();
        Item {
            inner: AnyItem(Arc::new(inner)),
            _marker: PhantomData,
        }
    }

    pub fn erased(&self) -> &AnyItem {
        &self.inner
    }

    /// Run `f` whenever a value is set on this item in any layer. Loads do
    /// not count.
    pub fn on_set<F>(&self, f: F) -> ListenerHandle
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(move |value: &Value| {
            if let Ok(value) = T::from_value(value.clone()) {
                f(&value);
            }
        });
        let mut listeners = self.inner.0.listeners.lock();
        let key = listeners.next;
        listeners.next += 1;
        listeners.entries.push((key, listener));
        ListenerHandle {
            listeners: Arc::downgrade(&self.inner.0.listeners),
            key,
        }
    }

    pub fn id(&self) -> ItemId {
        self.inner.id()
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }
}

pub(crate) fn erase_thunk<T, F>(thunk: F) -> Thunk
where
    T: ConfigValue,
    F: Fn(&Config) -> Result<T, StratumError> + Send + Sync + 'static,
{
    Arc::new(move |config: &Config| thunk(config).map(ConfigValue::into_value))
}

/// A group of items under a common prefix.
#[derive(Clone, Default)]
pub struct Spec {
    prefix: String,
    description: String,
    items: Vec<AnyItem>,
    inner: Vec<Spec>,
}

impl Spec {
    pub fn new(prefix: &str) -> Self {
        Spec {
            prefix: prefix.to_string(),
            ..Spec::default()
        }
    }

    pub fn described(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn items(&self) -> &[AnyItem] {
        &self.items
    }

    pub fn inner_specs(&self) -> &[Spec] {
        &self.inner
    }

    /// Declare an existing item in this spec.
    pub fn add<T: ConfigValue>(&mut self, item: &Item<T>) {
        self.items.push(item.erased().clone());
    }

    pub fn required<T: ConfigValue>(&mut self, name: &str, description: &str) -> Item<T> {
        let item = Item::required(name).described(description);
        self.add(&item);
        item
    }

    pub fn optional<T: ConfigValue>(&mut self, name: &str, default: T, description: &str) -> Item<T> {
        let item = Item::optional(name, default).described(description);
        self.add(&item);
        item
    }

    pub fn lazy<T, F>(&mut self, name: &str, description: &str, thunk: F) -> Item<T>
    where
        T: ConfigValue,
        F: Fn(&Config) -> Result<T, StratumError> + Send + Sync + 'static,
    {
        let item = Item::lazy(name, thunk).described(description);
        self.add(&item);
        item
    }

    /// Nest `spec` under this spec's prefix.
    pub fn add_inner(&mut self, spec: Spec) {
        self.inner.push(spec);
    }

    /// Every item with its fully qualified dotted name, inner specs included.
    pub fn qualified_items(&self) -> Vec<(String, AnyItem)> {
        let mut out = Vec::new();
        self.collect("", &mut out);
        out
    }

    fn collect(&self, parent: &str, out: &mut Vec<(String, AnyItem)>) {
        let prefix = dotted(parent, &self.prefix);
        for item in &self.items {
            out.push((dotted(&prefix, item.name()), item.clone()));
        }
        for inner in &self.inner {
            inner.collect(&prefix, out);
        }
    }
}

impl fmt::Debug for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spec")
            .field("prefix", &self.prefix)
            .field("items", &self.items)
            .field("inner", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = Item::<i32>::required("a");
        let b = Item::<i32>::required("a");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn described_keeps_identity() {
        let a = Item::<i32>::required("a");
        let id = a.id();
        let a = a.described("the a");
        assert_eq!(a.id(), id);
        assert_eq!(a.erased().description(), "the a");
    }

    #[test]
    fn lifecycles() {
        let r = Item::<i32>::required("r");
        let o = Item::optional("o", 5i32);
        let l = Item::<i32>::lazy("l", |_| Ok(1));
        assert!(r.erased().is_required());
        assert_eq!(o.erased().default_value(), Some(&Value::I32(5)));
        assert!(l.erased().is_lazy());
    }

    #[test]
    fn nullable_follows_option_type() {
        assert!(Item::<Option<String>>::required("u").erased().nullable());
        assert!(!Item::<String>::required("u").erased().nullable());
    }

    #[test]
    fn qualified_names_include_inner_prefixes() {
        let mut server = Spec::new("server");
        server.required::<String>("host", "");
        let mut tls = Spec::new("tls");
        tls.optional("enabled", false, "");
        server.add_inner(tls);
        let mut root = Spec::new("");
        root.optional("debug", false, "");
        root.add_inner(server);

        let names: Vec<String> = root.qualified_items().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["debug", "server.host", "server.tls.enabled"]);
    }
}
