use crate::aggregate::count_corroboration;
use crate::config::MergeConfig;
use crate::evidence::compute_summary;
use crate::model::{Diagnostics, MergeInput, MergeMeta, MergeOutput, MergedEntry};
use crate::overrides::apply_overrides;
use crate::resolve::resolve;
use crate::tiers::bucketize;

/// Run the merge per config: resolve → aggregate → override → bucketize.
///
/// Pure over `input`; nothing is read or written. Record-level problems land
/// in `diagnostics` and never abort the run.
pub fn run(config: &MergeConfig, input: &MergeInput) -> MergeOutput {
    let resolution = resolve(&input.mappings, &input.observations);
    let counts = count_corroboration(&resolution.observations);
    let outcome = apply_overrides(&counts, &input.overrides, config.low_threshold());

    let entries: Vec<MergedEntry> = outcome.entries.into_values().collect();
    let tiers = bucketize(&entries, &config.tiers, config.incomplete_policy);

    let diagnostics = Diagnostics {
        unmapped: resolution.unmapped,
        ambiguous: resolution.ambiguous,
        conflicting: outcome.conflicting,
    };

    let summary = compute_summary(
        input.observations.len(),
        resolution.observations.len(),
        &entries,
        &tiers,
        &diagnostics,
    );

    log::info!(
        "merged {} observations into {} entries across {} languages ({} unmapped ids, {} ambiguous mappings, {} conflicting overrides)",
        summary.observations,
        summary.entries,
        summary.languages,
        summary.unmapped_ids,
        summary.ambiguous_mappings,
        summary.conflicting_overrides,
    );

    MergeOutput {
        meta: MergeMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            incomplete_policy: config.incomplete_policy,
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        entries,
        tiers,
        diagnostics,
    }
}
