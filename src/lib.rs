//! Cascading, type-safe configuration. Declare typed items, stack sources,
//! and read values through layers.
//!
//! Stratum reads configuration from heterogeneous formats (JSON, TOML,
//! `.properties`, environment variables, plain maps), normalizes everything
//! into one tree model, merges sources with fallback semantics, resolves
//! `${path}` references, and loads the result into a stack of named layers
//! that hand back strongly typed values.
//!
//! ```rust
//! use stratum::{Config, JsonProvider, Spec, StratumError};
//!
//! fn main() -> Result<(), StratumError> {
//!     let mut server = Spec::new("server");
//!     let host = server.optional("host", "localhost".to_string(), "Listen address.");
//!     let port = server.required::<u16>("port", "Listen port.");
//!
//!     let config = Config::new();
//!     config.add_spec(server)?;
//!
//!     let layer = config.from(JsonProvider).string(r#"{"server": {"port": 8080}}"#)?;
//!     assert_eq!(layer.get(&port)?, 8080);
//!     assert_eq!(layer.get(&host)?, "localhost");
//!     Ok(())
//! }
//! ```
//!
//! # Items and specs
//!
//! An [`Item<T>`] is a typed handle: the value type `T` fixes how source
//! content is coerced, and the handle is how you read and write the value.
//! Every item has one lifecycle:
//!
//! - **required**: reading it before anything binds a value fails with
//!   [`StratumError::UnsetValue`].
//! - **optional**: reads as its default until a layer binds a value.
//! - **lazy**: computed from other items on every read, until bound.
//!
//! A [`Spec`] groups items under a dotted prefix; specs nest, so
//! `server.database.url` is the `url` item of a `database` spec inside a
//! `server` spec. An item whose type is `Option<T>` accepts null.
//!
//! # Layers
//!
//! A [`Config`] is one layer. Forking ([`Config::with_layer`],
//! [`Config::with_source`]) creates a child that sees everything the parent
//! sees and writes only to itself:
//!
//! ```text
//! with_source(app.json)   port = 9090
//!        ↑ parent
//! root                    port = 8080 (set)    host = default
//! ```
//!
//! Reads walk the chain: this layer's binding, then each ancestor's, then
//! the item's own default or lazy thunk. Lazy thunks always evaluate against
//! the layer the read started from, so a child that overrides `port` also
//! changes anything derived from it, for that child only.
//!
//! Once a layer has children its specs are frozen; a child may still add
//! its own specs.
//!
//! # Sources
//!
//! A [`Source`] wraps a tree plus descriptive metadata (`type`, `file`, ...).
//! [`Source::with_fallback`] stacks sources without copying them: lookups try
//! the facade first and fall through, and containers found on both sides are
//! merged key by key.
//!
//! | Origin | Entry point |
//! |--------|-------------|
//! | JSON | [`JsonProvider`] |
//! | TOML (`toml` feature, on by default) | `TomlProvider` |
//! | `.properties` | [`PropertiesProvider`] |
//! | Environment | [`env_source`], [`process_env_source`] |
//! | Flat `key → value` maps | [`flat_source`] |
//!
//! [`Config::from_files`] picks the format from the file extension through a
//! [`ProviderRegistry`]; custom formats implement [`Provider`].
//!
//! # Loading
//!
//! Loading a source into a layer substitutes `${path}` references, coerces
//! the value at every declared item's path, and commits only when every item
//! succeeded. A failing item surfaces as [`StratumError::Load`] naming the
//! item path, with the underlying error as its `source()`.
//!
//! # Feature flags
//!
//! [`Feature`] switches are set per layer ([`Config::enable`]) or per source
//! ([`Source::enabled`]):
//!
//! | Feature | Default | Effect |
//! |---------|---------|--------|
//! | `FailOnUnknownPath` | off | reject source paths no item claims |
//! | `LoadKeysCaseInsensitively` | off | match keys ignoring case |
//! | `FailOnUnfoundSource` | on | a missing file is an error, not an empty source |
//! | `SubstituteSourceBeforeLoaded` | on | run `${...}` substitution before loading |
//!
//! # Value types
//!
//! Anything implementing [`ConfigValue`] can be an item type: the primitive
//! numbers, `bool`, `char`, `String`, [`std::time::Duration`] (`"10s"`,
//! `"PT1M"`), [`SizeInBytes`] (`"64 MiB"`), `chrono` dates and times,
//! `Vec`/sets/string-keyed maps and `Option` of any of them. Records
//! implement it with a [`RecordDesc`] and the [`Fields`] helper.
//!
//! # Concurrency
//!
//! Single reads and writes are atomic. [`Config::lock`] groups several
//! operations on a layer; it re-enters on the same thread and excludes other
//! threads. [`Loader::watch`] builds a [`Refresh`] task that reloads a layer
//! on a background thread until its [`RefreshHandle`] is stopped or dropped.
//!
//! # Error handling
//!
//! Every fallible operation returns [`StratumError`]. See the [`error`]
//! module for the full set.

pub mod error;

mod coerce;
mod config;
mod duration;
mod env;
mod feature;
mod flat;
mod json_source;
mod load;
mod loader;
mod merge;
mod path;
mod properties;
mod provider;
mod refresh;
mod size;
mod source;
mod spec;
mod substitute;
#[cfg(feature = "toml")]
mod toml_source;
mod tree;
mod value;

#[cfg(test)]
mod fixtures;

pub use coerce::coerce;
pub use config::{Config, LayerLoader};
pub use duration::{format_duration, parse_duration};
pub use env::{env_source, process_env_source};
pub use error::StratumError;
pub use feature::{Feature, FeatureSet};
pub use flat::{flat_source, flat_to_tree, to_flat_map};
pub use json_source::JsonProvider;
pub use loader::Loader;
pub use merge::deep_merge;
pub use path::Path;
pub use properties::PropertiesProvider;
pub use provider::{Provider, ProviderRegistry};
pub use refresh::{Refresh, RefreshHandle};
pub use size::SizeInBytes;
pub use source::Source;
pub use spec::{AnyItem, Item, ItemId, ListenerHandle, Spec, Thunk};
#[cfg(feature = "toml")]
pub use toml_source::TomlProvider;
pub use tree::{ContainerNode, ListNode, Scalar, TreeNode, ValueNode};
pub use value::{ConfigValue, FieldDesc, Fields, RecordDesc, TypeDesc, Value};
