use std::collections::HashMap;
use std::fmt;

/// Behavior switches checked by the load orchestrator.
///
/// Each flag can be overridden per source and per layer; a layer inherits
/// its parent's overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Reject sources that contain paths no item claims.
    FailOnUnknownPath,
    /// Match source keys against item paths case-insensitively.
    LoadKeysCaseInsensitively,
    /// Treat a missing file or resource as an error instead of an empty source.
    FailOnUnfoundSource,
    /// Run the `${...}` substitution pass on a source before loading it.
    SubstituteSourceBeforeLoaded,
}

impl Feature {
    pub const ALL: [Feature; 4] = [
        Feature::FailOnUnknownPath,
        Feature::LoadKeysCaseInsensitively,
        Feature::FailOnUnfoundSource,
        Feature::SubstituteSourceBeforeLoaded,
    ];

    pub fn enabled_by_default(self) -> bool {
        match self {
            Feature::FailOnUnknownPath => false,
            Feature::LoadKeysCaseInsensitively => false,
            Feature::FailOnUnfoundSource => true,
            Feature::SubstituteSourceBeforeLoaded => true,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feature::FailOnUnknownPath => "fail-on-unknown-path",
            Feature::LoadKeysCaseInsensitively => "load-keys-case-insensitively",
            Feature::FailOnUnfoundSource => "fail-on-unfound-source",
            Feature::SubstituteSourceBeforeLoaded => "substitute-source-before-loaded",
        };
        f.write_str(name)
    }
}

/// Explicit overrides; flags not present fall back to the next level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet(HashMap<Feature, bool>);

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, feature: Feature, enabled: bool) {
        self.0.insert(feature, enabled);
    }

    pub fn get(&self, feature: Feature) -> Option<bool> {
        self.0.get(&feature).copied()
    }

    /// Overrides in `self` win over those in `base`.
    pub fn over(&self, base: &FeatureSet) -> FeatureSet {
        let mut merged = base.clone();
        merged.0.extend(self.0.iter().map(|(k, v)| (*k, *v)));
        merged
    }

    /// A copy with no override for `feature`.
    pub fn without(&self, feature: Feature) -> FeatureSet {
        let mut out = self.clone();
        out.0.remove(&feature);
        out
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
