use tracing::debug;

use crate::error::StratumError;
use crate::feature::Feature;
use crate::flat::flat_to_tree;
use crate::source::Source;

/// Build a source from environment variables.
///
/// Keys are lowercased and single `_` separates nesting levels, so
/// `DATABASE_POOL_SIZE` maps to `database.pool.size`. With a `prefix`, only
/// variables named `{PREFIX}_*` are used and the prefix is stripped. Keys
/// that are not valid identifiers are skipped.
///
/// Overlapping keys such as `DATABASE=x` next to `DATABASE_URL=y` are legal
/// in an environment, so conflicting keys are dropped instead of failing.
/// Keys are matched case-insensitively, and `${...}` text is not substituted.
///
/// Takes an iterator so tests can pass synthetic data instead of `std::env::vars()`.
pub fn env_source(
    prefix: Option<&str>,
    vars: impl IntoIterator<Item = (String, String)>,
) -> Result<Source, StratumError> {
    let needle = prefix.map(|p| format!("{}_", p.to_uppercase()));
    let mut entries = Vec::new();

    for (key, value) in vars {
        let rest = match &needle {
            Some(needle) => match key.strip_prefix(needle.as_str()) {
                Some(rest) => rest,
                None => continue,
            },
            None => key.as_str(),
        };
        if !is_valid_key(rest) {
            debug!(key = %key, "skipping environment variable with unusable name");
            continue;
        }
        entries.push((rest.to_lowercase().replace('_', "."), value));
    }

    let mut source = Source::new(flat_to_tree(entries, true)?)
        .with_info("type", "system-environment")
        .enabled(Feature::LoadKeysCaseInsensitively)
        .disabled(Feature::SubstituteSourceBeforeLoaded);
    if let Some(prefix) = prefix {
        source = source.with_info("prefix", prefix);
    }
    Ok(source)
}

/// [`env_source`] over the current process environment.
pub fn process_env_source(prefix: Option<&str>) -> Result<Source, StratumError> {
    env_source(prefix, std::env::vars())
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.split('_').all(|segment| {
            !segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphanumeric())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn simple_key() {
        let source = env_source(Some("MYAPP"), vars(&[("MYAPP_HOST", "0.0.0.0")])).unwrap();
        assert_eq!(source.get("host").unwrap().to_text().unwrap(), "0.0.0.0");
    }

    #[test]
    fn nested_key() {
        let source = env_source(Some("MYAPP"), vars(&[("MYAPP_DATABASE_URL", "postgres://db")])).unwrap();
        assert_eq!(
            source.get("database.url").unwrap().to_text().unwrap(),
            "postgres://db"
        );
    }

    #[test]
    fn without_prefix_every_variable_is_used() {
        let source = env_source(None, vars(&[("AA_BB", "1"), ("HOME", "/root")])).unwrap();
        assert_eq!(source.get("aa.bb").unwrap().to_i64().unwrap(), 1);
        assert!(source.contains("home"));
    }

    #[test]
    fn values_coerce_on_read() {
        let source = env_source(
            Some("APP"),
            vars(&[("APP_DEBUG", "TRUE"), ("APP_PORT", "8080"), ("APP_RATE", "1.5")]),
        )
        .unwrap();
        assert!(source.get("debug").unwrap().to_bool().unwrap());
        assert_eq!(source.get("port").unwrap().to_i64().unwrap(), 8080);
        assert_eq!(source.get("rate").unwrap().to_f64().unwrap(), 1.5);
    }

    #[test]
    fn no_matching_prefix_ignored() {
        let source = env_source(Some("MYAPP"), vars(&[("OTHER_HOST", "x")])).unwrap();
        assert!(!source.contains("host"));
    }

    #[test]
    fn bare_prefix_ignored() {
        let source = env_source(Some("MYAPP"), vars(&[("MYAPP", "x"), ("MYAPP_", "y")])).unwrap();
        assert_eq!(source.tree().paths(), vec![String::new()]);
    }

    #[test]
    fn invalid_names_skipped() {
        let source = env_source(None, vars(&[("A__B", "1"), ("C-D", "2"), ("OK", "3")])).unwrap();
        assert_eq!(source.tree().paths(), vec!["ok".to_string()]);
    }

    #[test]
    fn conflicting_keys_dropped() {
        let source = env_source(
            Some("APP"),
            vars(&[("APP_DATABASE", "x"), ("APP_DATABASE_URL", "pg://")]),
        )
        .unwrap();
        assert_eq!(source.get("database").unwrap().to_text().unwrap(), "x");
        assert!(!source.contains("database.url"));
    }

    #[test]
    fn features_and_info() {
        let source = env_source(Some("APP"), vars(&[])).unwrap();
        assert!(source.is_enabled(Feature::LoadKeysCaseInsensitively));
        assert!(!source.is_enabled(Feature::SubstituteSourceBeforeLoaded));
        assert_eq!(source.info_value("type"), Some("system-environment"));
        assert_eq!(source.info_value("prefix"), Some("APP"));
    }

    #[test]
    fn comma_value_reads_as_list() {
        let source = env_source(Some("APP"), vars(&[("APP_PORTS", "80,443")])).unwrap();
        let ports: Vec<u16> = source.get("ports").unwrap().to_list().unwrap();
        assert_eq!(ports, vec![80, 443]);
    }
}
