use std::collections::{BTreeMap, BTreeSet};

use crate::config::{IncompletePolicy, TierConfig};
use crate::model::{CanonicalId, MergedEntry, TierProjection, TierSet};

/// Project merged entries into confidence tiers.
///
/// `tiers` must be in ascending threshold order (config validation enforces
/// this). Each tier's dubbed set is computed by filtering the previous tier's
/// set, so a higher tier is always a subset of a lower one. Every language
/// present in `entries` appears in every tier, possibly with empty sets.
pub fn bucketize<'a>(
    entries: impl IntoIterator<Item = &'a MergedEntry>,
    tiers: &[TierConfig],
    policy: IncompletePolicy,
) -> Vec<TierProjection> {
    // language -> (candidates with their effective count, incomplete-flagged ids)
    let mut by_language: BTreeMap<&str, (BTreeMap<CanonicalId, usize>, BTreeSet<CanonicalId>)> =
        BTreeMap::new();

    for entry in entries {
        let (candidates, flagged) = by_language.entry(entry.language.as_str()).or_default();
        if entry.is_incomplete {
            flagged.insert(entry.canonical_id);
        }
        if entry.is_not_dubbed() || entry.effective_count == 0 {
            continue;
        }
        if policy == IncompletePolicy::Exclude && entry.is_incomplete {
            continue;
        }
        candidates.insert(entry.canonical_id, entry.effective_count);
    }

    let mut projections: Vec<TierProjection> = Vec::with_capacity(tiers.len());
    let mut current: BTreeMap<&str, BTreeMap<CanonicalId, usize>> = by_language
        .iter()
        .map(|(lang, (candidates, _))| (*lang, candidates.clone()))
        .collect();

    for tier in tiers {
        let mut languages = BTreeMap::new();
        for (lang, members) in current.iter_mut() {
            members.retain(|_, count| *count >= tier.min_sources);

            let dubbed: BTreeSet<CanonicalId> = members.keys().copied().collect();
            let flagged = by_language
                .get(lang)
                .map(|(_, flagged)| flagged.clone())
                .unwrap_or_default();
            let incomplete = match policy {
                IncompletePolicy::Annotate | IncompletePolicy::Exclude => flagged,
                IncompletePolicy::TierScoped => dubbed.intersection(&flagged).copied().collect(),
            };

            languages.insert(lang.to_string(), TierSet { dubbed, incomplete });
        }

        log::debug!(
            "tier '{}' (>= {}): {} dubbed ids across {} languages",
            tier.name,
            tier.min_sources,
            languages.values().map(|s: &TierSet| s.dubbed.len()).sum::<usize>(),
            languages.len()
        );
        projections.push(TierProjection {
            name: tier.name.clone(),
            min_sources: tier.min_sources,
            languages,
        });
    }

    projections
}
