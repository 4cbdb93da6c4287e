use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StratumError {
    #[error("Path conflict at '{path}': an existing value blocks a nested path")]
    PathConflict { path: String },

    #[error("Invalid path '{0}'")]
    InvalidPath(String),

    #[error("Cannot find path '{path}' in source {source_desc}")]
    NoSuchPath { path: String, source_desc: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("{value} has type {actual} rather than {expected}")]
    WrongType {
        value: String,
        actual: String,
        expected: String,
    },

    #[error("Value of type {ty} is unsupported")]
    UnsupportedType { ty: String },

    #[error("Cannot support map with {key} key, only string keys are supported")]
    UnsupportedMapKey { key: String },

    #[error("Unable to map value to {ty}: {reason}")]
    ObjectMapping { ty: String, reason: String },

    #[error("Failed to load '{path}': {cause}")]
    Load {
        path: String,
        #[source]
        cause: Box<StratumError>,
    },

    #[error("Source {source_desc} contains unknown paths: {}", paths.join(", "))]
    UnknownPaths {
        source_desc: String,
        paths: Vec<String>,
    },

    #[error("Item '{name}' is unset")]
    UnsetValue { name: String },

    #[error("Cannot find item '{name}' in config")]
    NoSuchItem { name: String },

    #[error("Item '{name}' has already been added")]
    RepeatedItem { name: String },

    #[error("Item '{name}' conflicts with an existing item path")]
    NameConflict { name: String },

    #[error("Layer '{layer}' has child layers, its specs are frozen")]
    SpecFrozen { layer: String },

    #[error("Substitution failed for \"{text}\": {reason}")]
    Substitution { text: String, reason: String },

    #[error("Invalid lazy value for '{name}': {reason}")]
    InvalidLazySet { name: String, reason: String },

    #[error("Source not found: {location}")]
    SourceNotFound { location: String },

    #[error("Cannot detect a supported extension for '{location}' (supported: {})", supported.join(", "))]
    UnsupportedExtension {
        location: String,
        supported: Vec<String>,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid {format} content: {reason}")]
    Format { format: String, reason: String },
}

impl StratumError {
    /// Wrap an error raised while loading the item at `path`.
    pub(crate) fn at_path(self, path: &str) -> Self {
        StratumError::Load {
            path: path.to_string(),
            cause: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn load_error_preserves_cause() {
        let err = StratumError::Parse("2147483648 cannot be parsed to an i32".into()).at_path("server.port");
        let msg = err.to_string();
        assert!(msg.contains("server.port"));
        let cause = err.source().unwrap();
        assert!(cause.to_string().contains("2147483648"));
    }

    #[test]
    fn unknown_paths_lists_every_path() {
        let err = StratumError::UnknownPaths {
            source_desc: "[type: flat]".into(),
            paths: vec!["x.z".into(), "w".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("x.z"));
        assert!(msg.contains("w"));
    }

    #[test]
    fn spec_frozen_names_layer() {
        let err = StratumError::SpecFrozen {
            layer: "base".into(),
        };
        assert!(err.to_string().contains("base"));
    }

    #[test]
    fn unsupported_extension_lists_supported() {
        let err = StratumError::UnsupportedExtension {
            location: "app.ini".into(),
            supported: vec!["json".into(), "toml".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("app.ini"));
        assert!(msg.contains("json, toml"));
    }
}
