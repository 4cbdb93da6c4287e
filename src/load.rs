//! Applying a source to a layer.
//!
//! 1. Substitute `${...}` references when both the layer and the source
//!    enable it.
//! 2. Under the layer lock, look up every item's path in the source and
//!    coerce what is present into a scratch list.
//! 3. In strict mode, reject paths no item claims.
//! 4. Commit the scratch list and record the source.
//!
//! Any failure leaves the layer exactly as it was.

use tracing::debug;

use crate::coerce::coerce;
use crate::config::Config;
use crate::error::StratumError;
use crate::feature::Feature;
use crate::path::Path;
use crate::source::Source;
use crate::spec::{AnyItem, ItemId};
use crate::tree::TreeNode;
use crate::value::Value;

pub(crate) fn load(config: &Config, source: &Source) -> Result<(), StratumError> {
    apply(config, source, false)
}

/// Like [`load`], but the layer's bindings are replaced rather than merged.
pub(crate) fn reload(config: &Config, source: &Source) -> Result<(), StratumError> {
    apply(config, source, true)
}

fn apply(config: &Config, source: &Source, clear: bool) -> Result<(), StratumError> {
    let source = if config.is_enabled(Feature::SubstituteSourceBeforeLoaded)
        && source.is_enabled(Feature::SubstituteSourceBeforeLoaded)
    {
        source.substituted(true)?
    } else {
        source.clone()
    };

    config.lock(|| {
        let items = config.chain_items();
        let values = resolve_items(config, &items, &source)?;
        check_unknown_paths(config, &items, &source)?;
        debug!(
            layer = %config.name(),
            source = %source.description(),
            items = values.len(),
            reload = clear,
            "loaded source"
        );
        config.commit(values, Some(source.clone()), clear);
        Ok(())
    })
}

fn case_insensitive(config: &Config, source: &Source) -> bool {
    config.is_enabled(Feature::LoadKeysCaseInsensitively)
        || source.is_enabled(Feature::LoadKeysCaseInsensitively)
}

fn item_path(name: &str, lowercase: bool) -> Result<Path, StratumError> {
    let path = Path::parse(name)?;
    Ok(if lowercase { path.lowercased() } else { path })
}

/// Coerce the value of each item present in `source`. Absent items are
/// skipped; the first failure aborts with the item's path attached.
pub(crate) fn resolve_items(
    config: &Config,
    items: &[(String, AnyItem)],
    source: &Source,
) -> Result<Vec<(ItemId, Value)>, StratumError> {
    let lowercase = case_insensitive(config, source);
    let lookup = if lowercase {
        source.lowercased()
    } else {
        source.clone()
    };

    let mut values = Vec::new();
    for (name, item) in items {
        let path = item_path(name, lowercase)?;
        let Some(node) = lookup.node_at(&path) else {
            continue;
        };
        let value = coerce(&node, item.type_desc()).map_err(|e| e.at_path(name))?;
        values.push((item.id(), value));
    }
    Ok(values)
}

fn check_unknown_paths(
    config: &Config,
    items: &[(String, AnyItem)],
    source: &Source,
) -> Result<(), StratumError> {
    if !(config.is_enabled(Feature::FailOnUnknownPath) || source.is_enabled(Feature::FailOnUnknownPath)) {
        return Ok(());
    }
    let lowercase = case_insensitive(config, source);
    let tree = if lowercase {
        source.lowercased().tree()
    } else {
        source.tree()
    };

    let mut claimed = TreeNode::empty();
    for (name, _) in items {
        claimed.set(&item_path(name, lowercase)?, TreeNode::Null)?;
    }

    let unknown = unclaimed_paths(&tree, &claimed);
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(StratumError::UnknownPaths {
            source_desc: source.description(),
            paths: unknown,
        })
    }
}

fn unclaimed_paths(tree: &TreeNode, claimed: &TreeNode) -> Vec<String> {
    let claims_nothing = claimed.as_container().is_some_and(|c| c.is_empty());
    if claims_nothing {
        return match tree.as_container() {
            Some(c) if !c.is_empty() => tree.paths(),
            _ => Vec::new(),
        };
    }
    tree.minus(claimed).map(|rest| rest.paths()).unwrap_or_default()
}
