use std::collections::{BTreeMap, BTreeSet};

use crate::model::{AmbiguousMapping, CanonicalId, CanonicalObservation, MappingEntry, SourceObservation, UnmappedId};

/// Lookup table from (source, local id) to canonical id, built from mapping
/// records. Duplicate rows that agree collapse; rows that disagree make the
/// local id ambiguous.
#[derive(Debug, Default)]
pub struct MappingIndex {
    forward: BTreeMap<(String, u64), BTreeSet<CanonicalId>>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<'a> {
    Resolved(CanonicalId),
    Unmapped,
    Ambiguous(&'a BTreeSet<CanonicalId>),
}

impl MappingIndex {
    pub fn build(entries: &[MappingEntry]) -> Self {
        let mut forward: BTreeMap<(String, u64), BTreeSet<CanonicalId>> = BTreeMap::new();
        for entry in entries {
            forward
                .entry((entry.source.clone(), entry.local_id))
                .or_default()
                .insert(entry.canonical_id);
        }
        Self { forward }
    }

    pub fn lookup(&self, source: &str, local_id: u64) -> Lookup<'_> {
        // BTreeMap<(String, u64), _> cannot be queried with a borrowed tuple.
        match self.forward.get(&(source.to_string(), local_id)) {
            None => Lookup::Unmapped,
            Some(ids) if ids.len() == 1 => match ids.first() {
                Some(id) => Lookup::Resolved(*id),
                None => Lookup::Unmapped,
            },
            Some(ids) => Lookup::Ambiguous(ids),
        }
    }

    /// Local ids with more than one candidate canonical id.
    pub fn ambiguous(&self) -> impl Iterator<Item = (&(String, u64), &BTreeSet<CanonicalId>)> {
        self.forward.iter().filter(|(_, ids)| ids.len() > 1)
    }
}

/// Output of the resolver stage.
#[derive(Debug, Default)]
pub struct Resolution {
    pub observations: Vec<CanonicalObservation>,
    pub unmapped: Vec<UnmappedId>,
    pub ambiguous: Vec<AmbiguousMapping>,
}

/// Translate observations into the canonical namespace.
///
/// Unmapped observations are reported once per distinct (source, local id).
/// Observations of an ambiguous local id resolve to nothing; every ambiguous
/// mapping is reported whether or not anything referenced it.
pub fn resolve(mappings: &[MappingEntry], observations: &[SourceObservation]) -> Resolution {
    let index = MappingIndex::build(mappings);

    let mut resolved = Vec::with_capacity(observations.len());
    let mut unmapped: BTreeMap<(String, u64), UnmappedId> = BTreeMap::new();
    let mut excluded: BTreeMap<(String, u64), usize> = BTreeMap::new();

    for obs in observations {
        match index.lookup(&obs.source, obs.local_id) {
            Lookup::Resolved(canonical_id) => resolved.push(CanonicalObservation {
                source: obs.source.clone(),
                canonical_id,
                language: obs.language.clone(),
                asserted: obs.asserted,
            }),
            Lookup::Unmapped => {
                let report = unmapped
                    .entry((obs.source.clone(), obs.local_id))
                    .or_insert_with(|| UnmappedId {
                        source: obs.source.clone(),
                        local_id: obs.local_id,
                        languages: BTreeSet::new(),
                        observations: 0,
                    });
                report.languages.insert(obs.language.clone());
                report.observations += 1;
            }
            Lookup::Ambiguous(_) => {
                *excluded.entry((obs.source.clone(), obs.local_id)).or_insert(0) += 1;
            }
        }
    }

    let ambiguous: Vec<AmbiguousMapping> = index
        .ambiguous()
        .map(|((source, local_id), ids)| AmbiguousMapping {
            source: source.clone(),
            local_id: *local_id,
            candidates: ids.clone(),
            excluded_observations: excluded
                .get(&(source.clone(), *local_id))
                .copied()
                .unwrap_or(0),
        })
        .collect();

    for a in &ambiguous {
        log::warn!(
            "ambiguous mapping {}:{} -> {:?}; {} observation(s) excluded",
            a.source,
            a.local_id,
            a.candidates.iter().map(|c| c.0).collect::<Vec<_>>(),
            a.excluded_observations
        );
    }
    for u in unmapped.values() {
        log::warn!(
            "unmapped id {}:{} ({} observation(s)); skipped",
            u.source,
            u.local_id,
            u.observations
        );
    }
    log::debug!(
        "resolved {} of {} observations via {} mapping rows ({} unmapped ids, {} ambiguous)",
        resolved.len(),
        observations.len(),
        mappings.len(),
        unmapped.len(),
        ambiguous.len()
    );

    Resolution {
        observations: resolved,
        unmapped: unmapped.into_values().collect(),
        ambiguous,
    }
}
