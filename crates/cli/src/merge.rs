//! `dublist run | validate | stats`: config-driven dataset merge.

use std::path::{Path, PathBuf};

use serde::Serialize;

use dublist_merge::load::load_input;
use dublist_merge::model::{Diagnostics, MergeMeta, MergeSummary};
use dublist_merge::stats::{load_language_index, refresh_readme, render_table};
use dublist_merge::writer::{self, write_output, LanguageDelta, WriteReport};
use dublist_merge::{MergeConfig, MergeError};

use crate::exit_codes::{
    EXIT_MERGE_DIAGNOSTICS, EXIT_MERGE_INVALID_CONFIG, EXIT_MERGE_MALFORMED_INPUT, EXIT_MERGE_WRITE,
    EXIT_USAGE,
};
use crate::CliError;

fn merge_err(code: u8, e: MergeError) -> CliError {
    CliError::new(code, e.to_string())
}

fn load_config(config_path: &Path) -> Result<MergeConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        CliError::new(
            EXIT_USAGE,
            format!("cannot read config {}: {e}", config_path.display()),
        )
    })?;
    MergeConfig::from_toml(&config_str).map_err(|e| merge_err(EXIT_MERGE_INVALID_CONFIG, e))
}

/// Relative paths in a config resolve against the config file's directory.
fn base_dir(config_path: &Path) -> &Path {
    match config_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RunReport<'a> {
    meta: &'a MergeMeta,
    summary: &'a MergeSummary,
    diagnostics: &'a Diagnostics,
    output: OutputReport,
}

#[derive(Serialize)]
struct OutputReport {
    dir: String,
    dry_run: bool,
    committed: bool,
    added: Vec<String>,
    changed: Vec<String>,
    removed: Vec<String>,
    unchanged: usize,
    languages: Vec<LanguageDelta>,
}

impl OutputReport {
    fn new(dir: &Path, dry_run: bool, write: &WriteReport) -> Self {
        let paths = |list: &[PathBuf]| -> Vec<String> {
            list.iter().map(|p| p.display().to_string()).collect()
        };
        Self {
            dir: dir.display().to_string(),
            dry_run,
            committed: write.committed,
            added: paths(&write.diff.added),
            changed: paths(&write.diff.changed),
            removed: paths(&write.diff.removed),
            unchanged: write.diff.unchanged.len(),
            languages: write.diff.languages.clone(),
        }
    }
}

pub fn cmd_run(
    config_path: PathBuf,
    dry_run: bool,
    json_output: bool,
    report_file: Option<PathBuf>,
    strict: bool,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let base_dir = base_dir(&config_path);

    let input = load_input(&config, base_dir)
        .map_err(|e| merge_err(EXIT_MERGE_MALFORMED_INPUT, e))?;
    let output = dublist_merge::run(&config, &input);

    let output_dir = base_dir.join(&config.output.dir);
    let write = write_output(&output, &config.output, &output_dir, dry_run)
        .map_err(|e| merge_err(EXIT_MERGE_WRITE, e))?;

    // The dataset is committed by now; a stale README is not worth failing on.
    if let (Some(readme), false) = (&config.output.readme, dry_run) {
        if let Some(index) = writer::language_index(&output, &config.output) {
            if let Err(e) = refresh_readme(&base_dir.join(readme), &index) {
                log::warn!("README stats not refreshed: {e}");
            }
        }
    }

    let report = RunReport {
        meta: &output.meta,
        summary: &output.summary,
        diagnostics: &output.diagnostics,
        output: OutputReport::new(&output_dir, dry_run, &write),
    };

    if json_output || report_file.is_some() {
        let json_str = serde_json::to_string_pretty(&report).map_err(|e| {
            CliError::new(EXIT_MERGE_WRITE, format!("JSON serialization error: {e}"))
        })?;

        if let Some(ref path) = report_file {
            std::fs::write(path, &json_str).map_err(|e| {
                CliError::new(EXIT_MERGE_WRITE, format!("cannot write report: {e}"))
            })?;
            eprintln!("wrote {}", path.display());
        }

        if json_output {
            println!("{json_str}");
        }
    }

    // Human summary to stderr
    let s = &output.summary;
    eprintln!(
        "merge '{}': {} observations, {} entries across {} languages",
        output.meta.config_name, s.observations, s.entries, s.languages,
    );
    let tiers: Vec<String> = config
        .tiers
        .iter()
        .map(|t| format!("{} {}", t.name, s.tier_counts.get(&t.name).copied().unwrap_or(0)))
        .collect();
    eprintln!("tiers: {}", tiers.join(", "));
    if !output.diagnostics.is_clean() {
        eprintln!(
            "diagnostics: {} unmapped ids, {} ambiguous mappings, {} conflicting overrides",
            s.unmapped_ids, s.ambiguous_mappings, s.conflicting_overrides,
        );
    }

    let d = &write.diff;
    let verb = if write.committed {
        "wrote"
    } else if d.is_noop() {
        "unchanged"
    } else {
        "would write"
    };
    eprintln!(
        "{verb} {}: {} added, {} changed, {} removed",
        output_dir.display(),
        d.added.len(),
        d.changed.len(),
        d.removed.len(),
    );
    for delta in &d.languages {
        eprintln!("  {}", format_delta(delta));
    }

    if strict && !output.diagnostics.is_clean() {
        return Err(CliError::new(EXIT_MERGE_DIAGNOSTICS, "diagnostics present (--strict)")
            .with_hint(format!(
                "see {} for details",
                output_dir.join(writer::DIAGNOSTICS_FILE).display()
            )));
    }

    Ok(())
}

fn format_delta(d: &LanguageDelta) -> String {
    let mut parts = vec![format!("+{} dubbed", d.added_dubbed)];
    if d.removed_dubbed > 0 {
        parts.push(format!("-{} dubbed", d.removed_dubbed));
    }
    parts.push(format!("+{} incomplete", d.added_incomplete));
    if d.removed_incomplete > 0 {
        parts.push(format!("-{} incomplete", d.removed_incomplete));
    }
    format!("{}/{}: {}", d.tier, d.language, parts.join(", "))
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let thresholds: Vec<String> = config
        .tiers
        .iter()
        .map(|t| format!("{}>={}", t.name, t.min_sources))
        .collect();
    eprintln!(
        "valid: merge '{}' with {} source(s), tiers {}, incomplete policy {}",
        config.name,
        config.sources.len(),
        thresholds.join(" "),
        config.incomplete_policy,
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// stats
// ---------------------------------------------------------------------------

pub fn cmd_stats(config_path: PathBuf, json_output: bool) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let index_path = base_dir(&config_path)
        .join(&config.output.dir)
        .join(writer::LANGUAGES_FILE);

    if !index_path.exists() {
        return Err(CliError::new(
            EXIT_MERGE_MALFORMED_INPUT,
            format!("no language index at {}", index_path.display()),
        )
        .with_hint(format!(
            "run `dublist run {}` first (with output.index enabled)",
            config_path.display()
        )));
    }
    let index = load_language_index(&index_path)
        .map_err(|e| merge_err(EXIT_MERGE_MALFORMED_INPUT, e))?;

    if json_output {
        let json_str = serde_json::to_string_pretty(&index).map_err(|e| {
            CliError::new(EXIT_MERGE_MALFORMED_INPUT, format!("JSON serialization error: {e}"))
        })?;
        println!("{json_str}");
    } else {
        println!("{}", render_table(&index));
    }
    Ok(())
}
