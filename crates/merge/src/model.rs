use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::IncompletePolicy;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// A title in the canonical namespace. Never recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalId(pub u64);

impl std::fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CanonicalId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One source's claim that a title, in the source's own id space, is dubbed
/// into `language`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceObservation {
    pub source: String,
    pub local_id: u64,
    pub language: String,
    pub asserted: bool,
}

/// The only legal translation from a source-local id to a canonical id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub source: String,
    pub local_id: u64,
    pub canonical_id: CanonicalId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    Dubbed,
    NotDubbed,
    Incomplete,
}

impl std::fmt::Display for OverrideKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dubbed => write!(f, "dubbed"),
            Self::NotDubbed => write!(f, "not_dubbed"),
            Self::Incomplete => write!(f, "incomplete"),
        }
    }
}

/// Manually curated fact for one (title, language) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideDirective {
    pub canonical_id: CanonicalId,
    pub language: String,
    pub kind: OverrideKind,
}

/// Everything one merge run consumes, already loaded into memory.
#[derive(Debug, Clone, Default)]
pub struct MergeInput {
    pub observations: Vec<SourceObservation>,
    pub mappings: Vec<MappingEntry>,
    pub overrides: Vec<OverrideDirective>,
}

// ---------------------------------------------------------------------------
// Resolution + aggregation
// ---------------------------------------------------------------------------

/// An observation translated into the canonical namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalObservation {
    pub source: String,
    pub canonical_id: CanonicalId,
    pub language: String,
    pub asserted: bool,
}

/// Key for every per-title, per-language map. Orders by language first so
/// iteration groups a language's ids together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    pub language: String,
    pub canonical_id: CanonicalId,
}

impl PairKey {
    pub fn new(language: impl Into<String>, canonical_id: CanonicalId) -> Self {
        Self {
            language: language.into(),
            canonical_id,
        }
    }
}

/// Distinct asserting sources per pair, before overrides.
pub type CorroborationCounts = BTreeMap<PairKey, usize>;

// ---------------------------------------------------------------------------
// Merged table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// No Dubbed/NotDubbed directive; the aggregated count stands.
    Automatic,
    /// Forced dubbed by a manual directive.
    ForcedDubbed,
    /// Forced not dubbed by a manual directive.
    ForcedNotDubbed,
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Automatic => write!(f, "automatic"),
            Self::ForcedDubbed => write!(f, "forced_dubbed"),
            Self::ForcedNotDubbed => write!(f, "forced_not_dubbed"),
        }
    }
}

/// Final record for one (title, language) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedEntry {
    pub canonical_id: CanonicalId,
    pub language: String,
    pub raw_count: usize,
    pub effective_count: usize,
    pub status: EntryStatus,
    pub is_incomplete: bool,
}

impl MergedEntry {
    pub fn is_not_dubbed(&self) -> bool {
        self.status == EntryStatus::ForcedNotDubbed
    }
}

// ---------------------------------------------------------------------------
// Tier projections
// ---------------------------------------------------------------------------

/// Dubbed and incomplete ids of one language within one tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TierSet {
    pub dubbed: BTreeSet<CanonicalId>,
    pub incomplete: BTreeSet<CanonicalId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierProjection {
    pub name: String,
    pub min_sources: usize,
    pub languages: BTreeMap<String, TierSet>,
}

impl TierProjection {
    pub fn dubbed(&self, language: &str) -> Option<&BTreeSet<CanonicalId>> {
        self.languages.get(language).map(|s| &s.dubbed)
    }

    pub fn incomplete(&self, language: &str) -> Option<&BTreeSet<CanonicalId>> {
        self.languages.get(language).map(|s| &s.incomplete)
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// A source-local id with no mapping. Reported once per (source, local id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmappedId {
    pub source: String,
    pub local_id: u64,
    pub languages: BTreeSet<String>,
    pub observations: usize,
}

/// A source-local id mapped to more than one canonical id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguousMapping {
    pub source: String,
    pub local_id: u64,
    pub candidates: BTreeSet<CanonicalId>,
    pub excluded_observations: usize,
}

/// A pair carrying both Dubbed and NotDubbed directives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictingOverride {
    pub canonical_id: CanonicalId,
    pub language: String,
    pub raw_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub unmapped: Vec<UnmappedId>,
    pub ambiguous: Vec<AmbiguousMapping>,
    pub conflicting: Vec<ConflictingOverride>,
}

impl Diagnostics {
    pub fn is_clean(&self) -> bool {
        self.unmapped.is_empty() && self.ambiguous.is_empty() && self.conflicting.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub observations: usize,
    pub resolved_observations: usize,
    pub entries: usize,
    pub languages: usize,
    pub unmapped_ids: usize,
    pub ambiguous_mappings: usize,
    pub conflicting_overrides: usize,
    /// Dubbed ids per tier, summed over languages.
    pub tier_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeMeta {
    pub config_name: String,
    pub engine_version: String,
    pub incomplete_policy: IncompletePolicy,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeOutput {
    pub meta: MergeMeta,
    pub summary: MergeSummary,
    /// Canonical merged table sorted by (language, canonical_id).
    pub entries: Vec<MergedEntry>,
    /// Tier projections in ascending threshold order.
    pub tiers: Vec<TierProjection>,
    pub diagnostics: Diagnostics,
}

impl MergeOutput {
    pub fn tier(&self, name: &str) -> Option<&TierProjection> {
        self.tiers.iter().find(|t| t.name == name)
    }
}
