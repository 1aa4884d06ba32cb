use std::collections::{BTreeMap, BTreeSet};

use crate::model::{CanonicalObservation, CorroborationCounts, PairKey};

/// Count distinct asserting sources per (language, canonical id).
///
/// A source asserting the same pair more than once counts once. Observations
/// with `asserted = false` never count. The result depends only on the set of
/// observations, not their order.
pub fn count_corroboration(observations: &[CanonicalObservation]) -> CorroborationCounts {
    let mut sources: BTreeMap<PairKey, BTreeSet<&str>> = BTreeMap::new();

    for obs in observations.iter().filter(|o| o.asserted) {
        sources
            .entry(PairKey::new(obs.language.as_str(), obs.canonical_id))
            .or_default()
            .insert(obs.source.as_str());
    }

    sources
        .into_iter()
        .map(|(key, set)| (key, set.len()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CanonicalId;

    fn obs(source: &str, id: u64, language: &str) -> CanonicalObservation {
        CanonicalObservation {
            source: source.into(),
            canonical_id: CanonicalId(id),
            language: language.into(),
            asserted: true,
        }
    }

    #[test]
    fn dedup_by_source() {
        let counts = count_corroboration(&[obs("mal", 300, "french"), obs("mal", 300, "french")]);
        assert_eq!(counts[&PairKey::new("french", CanonicalId(300))], 1);
    }

    #[test]
    fn distinct_sources_add_up() {
        let counts = count_corroboration(&[
            obs("mal", 7, "english"),
            obs("anilist", 7, "english"),
            obs("ann", 7, "english"),
            obs("mal", 7, "german"),
        ]);
        assert_eq!(counts[&PairKey::new("english", CanonicalId(7))], 3);
        assert_eq!(counts[&PairKey::new("german", CanonicalId(7))], 1);
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn unasserted_never_counts() {
        let mut o = obs("mal", 1, "english");
        o.asserted = false;
        let counts = count_corroboration(&[o]);
        assert!(counts.is_empty());
    }

    #[test]
    fn order_independent() {
        let a = vec![
            obs("mal", 1, "english"),
            obs("anilist", 1, "english"),
            obs("anilist", 2, "spanish"),
        ];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(count_corroboration(&a), count_corroboration(&b));
    }
}
