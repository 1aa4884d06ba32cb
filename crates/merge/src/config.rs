use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::MergeError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MergeConfig {
    pub name: String,
    /// Ordered by ascending `min_sources`. The first tier is the "low" tier
    /// that manual Dubbed directives are forced into.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierConfig>,
    #[serde(default)]
    pub incomplete_policy: IncompletePolicy,
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
    #[serde(default)]
    pub overrides: Option<OverridesConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TierConfig {
    pub name: String,
    pub min_sources: usize,
}

impl TierConfig {
    pub fn new(name: impl Into<String>, min_sources: usize) -> Self {
        Self {
            name: name.into(),
            min_sources,
        }
    }
}

pub fn default_tiers() -> Vec<TierConfig> {
    vec![
        TierConfig::new("low", 1),
        TierConfig::new("normal", 2),
        TierConfig::new("high", 3),
        TierConfig::new("very_high", 4),
    ]
}

/// How an Incomplete flag interacts with the tier sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompletePolicy {
    /// Dubbed sets are untouched; every tier lists every flagged id as
    /// incomplete.
    #[default]
    Annotate,
    /// Flagged ids are removed from every dubbed set; every tier lists every
    /// flagged id as incomplete.
    Exclude,
    /// Dubbed sets are untouched; a tier lists only its own dubbed ids that
    /// are flagged.
    TierScoped,
}

impl std::fmt::Display for IncompletePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Annotate => write!(f, "annotate"),
            Self::Exclude => write!(f, "exclude"),
            Self::TierScoped => write!(f, "tier_scoped"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sources + overrides
// ---------------------------------------------------------------------------

/// One upstream catalog whose observation files live in `dir`.
///
/// A source needs a way into the canonical namespace: either its local ids
/// already are canonical ids (`canonical = true`), or a `mapping` CSV lists
/// `source_id,canonical_id` rows. Both may be set when a catalog is mostly
/// canonical but has a few remapped entries.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub dir: String,
    #[serde(default)]
    pub canonical: bool,
    #[serde(default)]
    pub mapping: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverridesConfig {
    pub dir: String,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
    /// Also write this tier's files flat at the output root
    /// (`dubbed_<language>.json`), the layout older consumers read.
    #[serde(default)]
    pub legacy_tier: Option<String>,
    /// Write `_languages.json`.
    #[serde(default = "default_true")]
    pub index: bool,
    /// Refresh the language statistics block of this markdown file.
    #[serde(default)]
    pub readme: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            legacy_tier: None,
            index: true,
            readme: None,
        }
    }
}

fn default_output_dir() -> String {
    "final".into()
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl MergeConfig {
    pub fn from_toml(input: &str) -> Result<Self, MergeError> {
        let config: MergeConfig =
            toml::from_str(input).map_err(|e| MergeError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MergeError> {
        if self.tiers.is_empty() {
            return Err(MergeError::ConfigValidation(
                "at least one tier is required".into(),
            ));
        }

        let mut seen = BTreeSet::new();
        let mut previous: Option<&TierConfig> = None;
        for tier in &self.tiers {
            if !is_file_safe(&tier.name) {
                return Err(MergeError::ConfigValidation(format!(
                    "tier name '{}' must be non-empty lowercase [a-z0-9_]",
                    tier.name
                )));
            }
            if !seen.insert(tier.name.as_str()) {
                return Err(MergeError::ConfigValidation(format!(
                    "duplicate tier '{}'",
                    tier.name
                )));
            }
            if tier.min_sources == 0 {
                return Err(MergeError::ConfigValidation(format!(
                    "tier '{}': min_sources must be at least 1",
                    tier.name
                )));
            }
            if let Some(prev) = previous {
                if tier.min_sources <= prev.min_sources {
                    return Err(MergeError::ConfigValidation(format!(
                        "tier '{}' (min_sources={}) must have a higher threshold than '{}' (min_sources={})",
                        tier.name, tier.min_sources, prev.name, prev.min_sources
                    )));
                }
            }
            previous = Some(tier);
        }

        for (name, source) in &self.sources {
            if !is_file_safe(name) {
                return Err(MergeError::ConfigValidation(format!(
                    "source name '{name}' must be non-empty lowercase [a-z0-9_]"
                )));
            }
            if !source.canonical && source.mapping.is_none() {
                return Err(MergeError::ConfigValidation(format!(
                    "source '{name}': needs `canonical = true` or a `mapping` file"
                )));
            }
        }

        if let Some(ref legacy) = self.output.legacy_tier {
            if self.tier(legacy).is_none() {
                return Err(MergeError::ConfigValidation(format!(
                    "output.legacy_tier '{legacy}' is not a configured tier"
                )));
            }
        }

        Ok(())
    }

    pub fn tier(&self, name: &str) -> Option<&TierConfig> {
        self.tiers.iter().find(|t| t.name == name)
    }

    /// Threshold of the lowest tier: the count a manual Dubbed directive
    /// guarantees.
    pub fn low_threshold(&self) -> usize {
        self.tiers.first().map(|t| t.min_sources).unwrap_or(1)
    }
}

fn is_file_safe(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
