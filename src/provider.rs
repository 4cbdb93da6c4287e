//! The format adapter contract and extension-based detection.

use std::io::Read;
use std::path::Path as FsPath;
use std::sync::Arc;

use crate::error::StratumError;
use crate::json_source::JsonProvider;
use crate::properties::PropertiesProvider;
use crate::source::Source;
use crate::tree::TreeNode;

/// A format adapter: bytes in, tree out, and back.
pub trait Provider: Send + Sync {
    /// Format name, recorded as the `type` info of produced sources.
    fn name(&self) -> &str;

    /// File extensions claimed by this format, without the dot.
    fn extensions(&self) -> &[&'static str];

    fn parse(&self, bytes: &[u8]) -> Result<TreeNode, StratumError>;

    fn render(&self, tree: &TreeNode) -> Result<Vec<u8>, StratumError>;

    fn source_from_bytes(&self, bytes: &[u8]) -> Result<Source, StratumError> {
        Ok(Source::new(self.parse(bytes)?).with_info("type", self.name()))
    }

    fn source_from_str(&self, text: &str) -> Result<Source, StratumError> {
        self.source_from_bytes(text.as_bytes())
    }

    fn source_from_reader(&self, reader: &mut dyn Read) -> Result<Source, StratumError> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| StratumError::Io {
                path: "<reader>".into(),
                source: e,
            })?;
        self.source_from_bytes(&bytes)
    }

    /// Read a file. A missing file is [`StratumError::SourceNotFound`].
    fn source_from_file(&self, path: &FsPath) -> Result<Source, StratumError> {
        let bytes = std::fs::read(path).map_err(|e| read_error(path, e))?;
        Ok(self
            .source_from_bytes(&bytes)?
            .with_context("file", path.display().to_string()))
    }
}

pub(crate) fn read_error(path: &FsPath, e: std::io::Error) -> StratumError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StratumError::SourceNotFound {
            location: path.display().to_string(),
        }
    } else {
        StratumError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    }
}

pub(crate) fn format_error(format: &str, reason: impl ToString) -> StratumError {
    StratumError::Format {
        format: format.to_string(),
        reason: reason.to_string(),
    }
}

/// Adapters keyed by the extensions they claim.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// A registry with no adapters.
    pub fn new() -> Self {
        ProviderRegistry {
            providers: Vec::new(),
        }
    }

    /// Register an adapter. Later registrations win for shared extensions.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.push(provider);
    }

    pub fn for_extension(&self, extension: &str) -> Option<Arc<dyn Provider>> {
        self.providers
            .iter()
            .rev()
            .find(|p| p.extensions().iter().any(|e| e.eq_ignore_ascii_case(extension)))
            .cloned()
    }

    pub fn for_path(&self, path: &FsPath) -> Result<Arc<dyn Provider>, StratumError> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| self.for_extension(e))
            .ok_or_else(|| StratumError::UnsupportedExtension {
                location: path.display().to_string(),
                supported: self.supported_extensions(),
            })
    }

    pub fn supported_extensions(&self) -> Vec<String> {
        let mut all: Vec<String> = self
            .providers
            .iter()
            .flat_map(|p| p.extensions().iter().map(|e| e.to_string()))
            .collect();
        all.sort();
        all.dedup();
        all
    }
}

impl Default for ProviderRegistry {
    /// JSON, properties, and TOML when the `toml` feature is on.
    fn default() -> Self {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(JsonProvider));
        registry.register(Arc::new(PropertiesProvider));
        #[cfg(feature = "toml")]
        registry.register(Arc::new(crate::toml_source::TomlProvider));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn detects_by_extension() {
        let registry = ProviderRegistry::default();
        assert_eq!(registry.for_path(&PathBuf::from("app.json")).unwrap().name(), "json");
        assert_eq!(
            registry.for_path(&PathBuf::from("app.PROPERTIES")).unwrap().name(),
            "properties"
        );
    }

    #[cfg(feature = "toml")]
    #[test]
    fn detects_toml() {
        let registry = ProviderRegistry::default();
        assert_eq!(registry.for_path(&PathBuf::from("app.toml")).unwrap().name(), "toml");
    }

    #[test]
    fn unknown_extension_lists_supported() {
        let registry = ProviderRegistry::default();
        match registry.for_path(&PathBuf::from("app.ini")) {
            Err(StratumError::UnsupportedExtension { location, supported }) => {
                assert_eq!(location, "app.ini");
                assert!(supported.contains(&"json".to_string()));
            }
            Err(other) => panic!("Expected UnsupportedExtension, got {other:?}"),
            Ok(p) => panic!("Expected an error, got provider {}", p.name()),
        }
        assert!(registry.for_path(&PathBuf::from("no_extension")).is_err());
    }

    #[test]
    fn source_carries_type_and_file_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        std::fs::write(&path, r#"{"port": 80}"#).unwrap();
        let source = JsonProvider.source_from_file(&path).unwrap();
        assert_eq!(source.info_value("type"), Some("json"));
        assert_eq!(source.info_value("file"), Some(path.display().to_string().as_str()));
        assert_eq!(source.get("port").unwrap().to_i64().unwrap(), 80);
    }

    #[test]
    fn missing_file_is_source_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonProvider
            .source_from_file(&dir.path().join("nope.json"))
            .unwrap_err();
        assert!(matches!(err, StratumError::SourceNotFound { .. }));
    }

    #[test]
    fn reader_input() {
        let mut input: &[u8] = b"a=1";
        let source = PropertiesProvider.source_from_reader(&mut input).unwrap();
        assert_eq!(source.get("a").unwrap().to_i64().unwrap(), 1);
    }
}
