use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Diagnostics, MergeSummary, MergedEntry, TierProjection};

/// Compute summary statistics for a merge run.
pub fn compute_summary(
    observations: usize,
    resolved_observations: usize,
    entries: &[MergedEntry],
    tiers: &[TierProjection],
    diagnostics: &Diagnostics,
) -> MergeSummary {
    let languages: BTreeSet<&str> = entries.iter().map(|e| e.language.as_str()).collect();

    let tier_counts: BTreeMap<String, usize> = tiers
        .iter()
        .map(|t| {
            let dubbed = t.languages.values().map(|s| s.dubbed.len()).sum();
            (t.name.clone(), dubbed)
        })
        .collect();

    MergeSummary {
        observations,
        resolved_observations,
        entries: entries.len(),
        languages: languages.len(),
        unmapped_ids: diagnostics.unmapped.len(),
        ambiguous_mappings: diagnostics.ambiguous.len(),
        conflicting_overrides: diagnostics.conflicting.len(),
        tier_counts,
    }
}
