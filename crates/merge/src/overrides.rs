use std::collections::{BTreeMap, BTreeSet};

use crate::model::{
    ConflictingOverride, CorroborationCounts, EntryStatus, MergedEntry, OverrideDirective, OverrideKind, PairKey,
};

#[derive(Debug, Default, Clone, Copy)]
struct DirectiveFlags {
    dubbed: bool,
    not_dubbed: bool,
    incomplete: bool,
}

/// Output of the override stage.
#[derive(Debug, Default)]
pub struct OverrideOutcome {
    /// One entry per pair with a count, a directive, or an incomplete flag.
    /// Conflicting pairs are absent.
    pub entries: BTreeMap<PairKey, MergedEntry>,
    pub conflicting: Vec<ConflictingOverride>,
}

/// Apply manual directives on top of aggregated counts.
///
/// Precedence: NotDubbed zeroes the pair; Dubbed raises the count to at least
/// `low_threshold` and no further; Incomplete only sets the flag. A pair with
/// both Dubbed and NotDubbed is dropped from the table and reported.
pub fn apply_overrides(
    counts: &CorroborationCounts,
    directives: &[OverrideDirective],
    low_threshold: usize,
) -> OverrideOutcome {
    let mut flags: BTreeMap<PairKey, DirectiveFlags> = BTreeMap::new();
    for d in directives {
        let f = flags
            .entry(PairKey::new(d.language.as_str(), d.canonical_id))
            .or_default();
        match d.kind {
            OverrideKind::Dubbed => f.dubbed = true,
            OverrideKind::NotDubbed => f.not_dubbed = true,
            OverrideKind::Incomplete => f.incomplete = true,
        }
    }

    let mut outcome = OverrideOutcome::default();

    let keys: BTreeSet<&PairKey> = counts.keys().chain(flags.keys()).collect();
    for key in keys {
        let raw_count = counts.get(key).copied().unwrap_or(0);
        let f = flags.get(key).copied().unwrap_or_default();

        if f.dubbed && f.not_dubbed {
            log::warn!(
                "conflicting overrides for {} '{}': dubbed and not_dubbed; excluded",
                key.canonical_id,
                key.language
            );
            outcome.conflicting.push(ConflictingOverride {
                canonical_id: key.canonical_id,
                language: key.language.clone(),
                raw_count,
            });
            continue;
        }

        let (status, effective_count) = if f.not_dubbed {
            (EntryStatus::ForcedNotDubbed, 0)
        } else if f.dubbed {
            (EntryStatus::ForcedDubbed, raw_count.max(low_threshold))
        } else {
            (EntryStatus::Automatic, raw_count)
        };

        outcome.entries.insert(
            key.clone(),
            MergedEntry {
                canonical_id: key.canonical_id,
                language: key.language.clone(),
                raw_count,
                effective_count,
                status,
                is_incomplete: f.incomplete,
            },
        );
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CanonicalId;

    fn key(language: &str, id: u64) -> PairKey {
        PairKey::new(language, CanonicalId(id))
    }

    fn directive(id: u64, language: &str, kind: OverrideKind) -> OverrideDirective {
        OverrideDirective {
            canonical_id: CanonicalId(id),
            language: language.into(),
            kind,
        }
    }

    #[test]
    fn no_directive_keeps_raw_count() {
        let counts = CorroborationCounts::from([(key("english", 1), 3)]);
        let out = apply_overrides(&counts, &[], 1);
        let e = &out.entries[&key("english", 1)];
        assert_eq!(e.effective_count, 3);
        assert_eq!(e.status, EntryStatus::Automatic);
        assert!(!e.is_incomplete);
    }

    #[test]
    fn not_dubbed_zeroes() {
        let counts = CorroborationCounts::from([(key("english", 100), 4)]);
        let out = apply_overrides(&counts, &[directive(100, "english", OverrideKind::NotDubbed)], 1);
        let e = &out.entries[&key("english", 100)];
        assert_eq!(e.raw_count, 4);
        assert_eq!(e.effective_count, 0);
        assert!(e.is_not_dubbed());
    }

    #[test]
    fn dubbed_forces_low_only() {
        let out = apply_overrides(
            &CorroborationCounts::new(),
            &[directive(200, "german", OverrideKind::Dubbed)],
            1,
        );
        let e = &out.entries[&key("german", 200)];
        assert_eq!(e.raw_count, 0);
        assert_eq!(e.effective_count, 1);
        assert_eq!(e.status, EntryStatus::ForcedDubbed);
    }

    #[test]
    fn dubbed_does_not_lower_real_count() {
        let counts = CorroborationCounts::from([(key("german", 200), 3)]);
        let out = apply_overrides(&counts, &[directive(200, "german", OverrideKind::Dubbed)], 1);
        assert_eq!(out.entries[&key("german", 200)].effective_count, 3);
    }

    #[test]
    fn incomplete_is_orthogonal() {
        let counts = CorroborationCounts::from([(key("french", 5), 2)]);
        let out = apply_overrides(
            &counts,
            &[
                directive(5, "french", OverrideKind::Incomplete),
                directive(6, "french", OverrideKind::Incomplete),
                directive(6, "french", OverrideKind::Dubbed),
            ],
            1,
        );
        let five = &out.entries[&key("french", 5)];
        assert!(five.is_incomplete);
        assert_eq!(five.effective_count, 2);
        let six = &out.entries[&key("french", 6)];
        assert!(six.is_incomplete);
        assert_eq!(six.effective_count, 1);
    }

    #[test]
    fn incomplete_only_pair_gets_an_entry() {
        let out = apply_overrides(
            &CorroborationCounts::new(),
            &[directive(9, "italian", OverrideKind::Incomplete)],
            1,
        );
        let e = &out.entries[&key("italian", 9)];
        assert_eq!(e.effective_count, 0);
        assert!(e.is_incomplete);
    }

    #[test]
    fn conflicting_pair_dropped_and_reported_once() {
        let counts = CorroborationCounts::from([(key("english", 7), 2)]);
        let out = apply_overrides(
            &counts,
            &[
                directive(7, "english", OverrideKind::Dubbed),
                directive(7, "english", OverrideKind::NotDubbed),
            ],
            1,
        );
        assert!(!out.entries.contains_key(&key("english", 7)));
        assert_eq!(out.conflicting.len(), 1);
        assert_eq!(out.conflicting[0].raw_count, 2);
    }

    #[test]
    fn directive_language_scopes_override() {
        let counts = CorroborationCounts::from([(key("english", 1), 1), (key("spanish", 1), 1)]);
        let out = apply_overrides(&counts, &[directive(1, "spanish", OverrideKind::NotDubbed)], 1);
        assert_eq!(out.entries[&key("english", 1)].effective_count, 1);
        assert_eq!(out.entries[&key("spanish", 1)].effective_count, 0);
    }
}
