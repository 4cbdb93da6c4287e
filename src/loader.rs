//! Loading sources from text, bytes, readers, and files into child layers.

use std::io::Read;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::Config;
use crate::error::StratumError;
use crate::feature::Feature;
use crate::provider::{Provider, ProviderRegistry};
use crate::refresh::Refresh;
use crate::source::Source;

/// Loads sources into new child layers of a [`Config`].
///
/// Built by [`Config::from`] for one fixed format, or by
/// [`Config::from_files`] to detect the format from the file extension.
/// Every successful load returns the new child layer; the parent is
/// untouched.
#[derive(Clone)]
pub struct Loader {
    config: Config,
    provider: Option<Arc<dyn Provider>>,
    registry: ProviderRegistry,
}

impl Loader {
    pub(crate) fn new(config: Config, provider: Option<Arc<dyn Provider>>) -> Self {
        Loader {
            config,
            provider,
            registry: ProviderRegistry::default(),
        }
    }

    /// Use `registry` for extension detection instead of the default one.
    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    fn fixed_provider(&self, location: &str) -> Result<Arc<dyn Provider>, StratumError> {
        self.provider
            .clone()
            .ok_or_else(|| StratumError::UnsupportedExtension {
                location: location.to_string(),
                supported: self.registry.supported_extensions(),
            })
    }

    pub fn string(&self, text: &str) -> Result<Config, StratumError> {
        let source = self.fixed_provider("<string>")?.source_from_str(text)?;
        self.source(&source)
    }

    pub fn bytes(&self, bytes: &[u8]) -> Result<Config, StratumError> {
        let source = self.fixed_provider("<bytes>")?.source_from_bytes(bytes)?;
        self.source(&source)
    }

    pub fn reader(&self, reader: &mut dyn Read) -> Result<Config, StratumError> {
        let source = self.fixed_provider("<reader>")?.source_from_reader(reader)?;
        self.source(&source)
    }

    pub fn file(&self, path: impl AsRef<FsPath>) -> Result<Config, StratumError> {
        let source = self.read_file(path.as_ref())?;
        self.source(&source)
    }

    pub fn source(&self, source: &Source) -> Result<Config, StratumError> {
        self.config.with_source(source)
    }

    /// Read `path` into a source.
    ///
    /// A missing file fails with [`StratumError::SourceNotFound`] unless the
    /// layer disables [`Feature::FailOnUnfoundSource`], in which case an empty
    /// source typed after the file is returned.
    pub fn read_file(&self, path: &FsPath) -> Result<Source, StratumError> {
        let provider = match &self.provider {
            Some(p) => p.clone(),
            None => self.registry.for_path(path)?,
        };
        match provider.source_from_file(path) {
            Err(StratumError::SourceNotFound { location })
                if !self.config.is_enabled(Feature::FailOnUnfoundSource) =>
            {
                debug!(file = %location, "optional source not found, using empty source");
                Ok(Source::empty()
                    .with_info("type", provider.name())
                    .with_context("file", location))
            }
            other => other,
        }
    }

    /// Load once from `fetch` now, and return a [`Refresh`] that reloads the
    /// new layer from `fetch` every `delay` once spawned.
    pub fn watch<F>(&self, delay: Duration, mut fetch: F) -> Result<Refresh, StratumError>
    where
        F: FnMut() -> Result<Source, StratumError> + Send + 'static,
    {
        let layer = self.source(&fetch()?)?;
        Ok(Refresh::new(layer, delay, fetch))
    }

    /// [`Loader::watch`] over a file.
    pub fn watch_file(&self, path: impl Into<PathBuf>, delay: Duration) -> Result<Refresh, StratumError> {
        let path = path.into();
        let loader = self.clone();
        self.watch(delay, move || loader.read_file(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::server_config;
    use crate::json_source::JsonProvider;
    use crate::properties::PropertiesProvider;

    #[test]
    fn string_with_fixed_format() {
        let (config, items) = server_config();
        let layer = config
            .from(JsonProvider)
            .string(r#"{"server": {"port": 9000}}"#)
            .unwrap();
        assert_eq!(layer.get(&items.port).unwrap(), 9000);
        assert_eq!(config.get(&items.port).unwrap(), 8080);
        assert_eq!(layer.layer_names()[1], "config");
    }

    #[test]
    fn bytes_and_reader() {
        let (config, items) = server_config();
        let layer = config.from(PropertiesProvider).bytes(b"server.host=a").unwrap();
        assert_eq!(layer.get(&items.host).unwrap(), "a");

        let mut input: &[u8] = b"server.host=b";
        let layer = config.from(PropertiesProvider).reader(&mut input).unwrap();
        assert_eq!(layer.get(&items.host).unwrap(), "b");
    }

    #[test]
    fn string_needs_a_format() {
        let (config, _) = server_config();
        assert!(matches!(
            config.from_files().string("{}").unwrap_err(),
            StratumError::UnsupportedExtension { .. }
        ));
    }

    #[test]
    fn file_format_detected_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("app.json");
        std::fs::write(&json, r#"{"server": {"port": 1}}"#).unwrap();
        let props = dir.path().join("app.properties");
        std::fs::write(&props, "server.host = example.com\n").unwrap();

        let (config, items) = server_config();
        let layer = config.from_files().file(&json).unwrap();
        let layer = layer.from_files().file(&props).unwrap();
        assert_eq!(layer.get(&items.port).unwrap(), 1);
        assert_eq!(layer.get(&items.host).unwrap(), "example.com");
        assert_eq!(layer.sources().len(), 2);
        assert_eq!(
            layer.sources()[0].info_value("file"),
            Some(json.display().to_string().as_str())
        );
    }

    #[cfg(feature = "toml")]
    #[test]
    fn toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.toml");
        std::fs::write(&path, "[server]\nport = 3000\ntags = [\"a\", \"b\"]\n").unwrap();
        let (config, items) = server_config();
        let layer = config.from_files().file(&path).unwrap();
        assert_eq!(layer.get(&items.port).unwrap(), 3000);
        assert_eq!(layer.get(&items.tags).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn missing_file_is_fatal_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let (config, _) = server_config();
        let err = config
            .from_files()
            .file(dir.path().join("missing.json"))
            .unwrap_err();
        assert!(matches!(err, StratumError::SourceNotFound { .. }));
    }

    #[test]
    fn missing_file_is_empty_when_optional() {
        let dir = tempfile::tempdir().unwrap();
        let (config, items) = server_config();
        config.disable(Feature::FailOnUnfoundSource);
        let layer = config
            .from_files()
            .file(dir.path().join("missing.json"))
            .unwrap();
        assert_eq!(layer.get(&items.port).unwrap(), 8080);
        let source = &layer.sources()[0];
        assert_eq!(source.info_value("type"), Some("json"));
        assert!(source.info_value("file").unwrap().ends_with("missing.json"));
    }

    #[test]
    fn unsupported_extension() {
        let (config, _) = server_config();
        assert!(matches!(
            config.from_files().file("app.ini").unwrap_err(),
            StratumError::UnsupportedExtension { .. }
        ));
    }

    #[test]
    fn watch_file_picks_up_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.properties");
        std::fs::write(&path, "server.port=1\n").unwrap();

        let (config, items) = server_config();
        let refresh = config
            .from_files()
            .watch_file(&path, Duration::from_millis(10))
            .unwrap();
        let layer = refresh.layer().clone();
        assert_eq!(layer.get(&items.port).unwrap(), 1);

        let handle = refresh.spawn().unwrap();
        std::fs::write(&path, "server.port=2\n").unwrap();
        let start = std::time::Instant::now();
        while layer.get(&items.port).unwrap() != 2 && start.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(5));
        }
        handle.stop();
        assert_eq!(layer.get(&items.port).unwrap(), 2);
    }
}
