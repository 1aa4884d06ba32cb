//! Rendering and committing the output tree.
//!
//! The whole tree is rendered in memory first. Rendering is byte-stable for
//! identical logical content (sorted ids, no timestamps), so comparing it with
//! the tree on disk tells whether the run changed anything. A commit stages
//! the tree in a sibling temporary directory and swaps it in by rename, so
//! readers see either the previous tree or the new one, never a mix.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::OutputConfig;
use crate::error::{MergeError, MergeResult};
use crate::language;
use crate::model::{CanonicalId, Diagnostics, MergeOutput, MergeSummary, MergedEntry, TierProjection};
use crate::stats::{build_language_index, LanguageIndex};

pub const LICENSE: &str = "CC BY 4.0 - https://creativecommons.org/licenses/by/4.0/";
pub const ATTRIBUTION: &str = "MyDubList - https://mydublist.com - (CC BY 4.0)";
pub const ORIGIN: &str = "https://github.com/Joelis57/MyDubList";

pub const MERGED_FILE: &str = "_merged.json";
pub const DIAGNOSTICS_FILE: &str = "_diagnostics.json";
pub const LANGUAGES_FILE: &str = "_languages.json";

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct LanguageFile<'a> {
    _license: &'static str,
    _attribution: &'static str,
    _origin: &'static str,
    language: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tier: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_sources: Option<usize>,
    dubbed: &'a BTreeSet<CanonicalId>,
    incomplete: &'a BTreeSet<CanonicalId>,
}

#[derive(Serialize)]
struct MergedFile<'a> {
    _license: &'static str,
    _attribution: &'static str,
    _origin: &'static str,
    entries: &'a [MergedEntry],
}

#[derive(Serialize)]
struct DiagnosticsFile<'a> {
    summary: &'a MergeSummary,
    diagnostics: &'a Diagnostics,
}

/// Output files keyed by path relative to the output root.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenderedTree {
    pub files: BTreeMap<PathBuf, Vec<u8>>,
}

fn to_json<T: Serialize>(value: &T) -> MergeResult<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|e| MergeError::Serialize(e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn render_projection(
    files: &mut BTreeMap<PathBuf, Vec<u8>>,
    projection: &TierProjection,
    dir: &Path,
    with_tier: bool,
) -> MergeResult<()> {
    for (lang, set) in &projection.languages {
        if !language::is_safe_key(lang) {
            return Err(MergeError::malformed(
                dir,
                format!("language '{lang}' is not usable as a file name"),
            ));
        }
        let file = LanguageFile {
            _license: LICENSE,
            _attribution: ATTRIBUTION,
            _origin: ORIGIN,
            language: lang,
            tier: with_tier.then_some(projection.name.as_str()),
            min_sources: with_tier.then_some(projection.min_sources),
            dubbed: &set.dubbed,
            incomplete: &set.incomplete,
        };
        files.insert(dir.join(language::file_name(lang)), to_json(&file)?);
    }
    Ok(())
}

/// Render every output file of a merge run.
pub fn render(output: &MergeOutput, config: &OutputConfig) -> MergeResult<RenderedTree> {
    let mut files = BTreeMap::new();

    for projection in &output.tiers {
        render_projection(&mut files, projection, Path::new(&projection.name), true)?;
    }

    let legacy = config
        .legacy_tier
        .as_deref()
        .and_then(|name| output.tier(name));
    if let Some(projection) = legacy {
        render_projection(&mut files, projection, Path::new(""), false)?;
    }

    files.insert(
        PathBuf::from(MERGED_FILE),
        to_json(&MergedFile {
            _license: LICENSE,
            _attribution: ATTRIBUTION,
            _origin: ORIGIN,
            entries: &output.entries,
        })?,
    );
    files.insert(
        PathBuf::from(DIAGNOSTICS_FILE),
        to_json(&DiagnosticsFile {
            summary: &output.summary,
            diagnostics: &output.diagnostics,
        })?,
    );

    if config.index {
        if let Some(index) = language_index(output, config) {
            files.insert(PathBuf::from(LANGUAGES_FILE), to_json(&index)?);
        }
    }

    Ok(RenderedTree { files })
}

/// Index of the files consumers read: the legacy flat files when configured,
/// else the lowest tier. `None` only when no tier exists.
pub fn language_index(output: &MergeOutput, config: &OutputConfig) -> Option<LanguageIndex> {
    let legacy = config
        .legacy_tier
        .as_deref()
        .and_then(|name| output.tier(name));
    match legacy {
        Some(p) => Some(build_language_index(p, &config.dir)),
        None => output
            .tiers
            .first()
            .map(|p| build_language_index(p, &format!("{}/{}", config.dir, p.name))),
    }
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TreeDiff {
    pub added: Vec<PathBuf>,
    pub changed: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    /// Files on disk the new tree no longer contains.
    pub removed: Vec<PathBuf>,
    /// Id changes of tiered language files, sorted by tier then language.
    /// Legacy root files mirror a tier and are not counted twice.
    pub languages: Vec<LanguageDelta>,
}

/// Ids gained and lost by one `<tier>/dubbed_<language>.json` file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageDelta {
    pub tier: String,
    pub language: String,
    pub added_dubbed: usize,
    pub removed_dubbed: usize,
    pub added_incomplete: usize,
    pub removed_incomplete: usize,
}

impl LanguageDelta {
    pub fn is_empty(&self) -> bool {
        self.added_dubbed == 0
            && self.removed_dubbed == 0
            && self.added_incomplete == 0
            && self.removed_incomplete == 0
    }
}

#[derive(Debug, Default, Deserialize)]
struct LanguageIds {
    #[serde(default)]
    dubbed: BTreeSet<u64>,
    #[serde(default)]
    incomplete: BTreeSet<u64>,
}

fn language_ids(bytes: Option<&[u8]>, rel: &Path) -> LanguageIds {
    let Some(bytes) = bytes else {
        return LanguageIds::default();
    };
    serde_json::from_slice(bytes).unwrap_or_else(|e| {
        log::warn!("cannot compare ids of {}: {e}", rel.display());
        LanguageIds::default()
    })
}

/// Tier and language key of a `<tier>/dubbed_<language>.json` path.
fn tiered_language_file(rel: &Path) -> Option<(String, String)> {
    let name = rel.file_name()?.to_str()?;
    if !name.starts_with("dubbed_") || !name.ends_with(".json") {
        return None;
    }
    let mut parents = rel.parent()?.components();
    let tier = parents.next()?.as_os_str().to_str()?.to_string();
    if parents.next().is_some() {
        return None;
    }
    Some((tier, language::from_file_name(name)))
}

fn language_delta(rel: &Path, old: Option<&[u8]>, new: Option<&[u8]>) -> Option<LanguageDelta> {
    let (tier, language) = tiered_language_file(rel)?;
    let old = language_ids(old, rel);
    let new = language_ids(new, rel);
    let delta = LanguageDelta {
        tier,
        language,
        added_dubbed: new.dubbed.difference(&old.dubbed).count(),
        removed_dubbed: old.dubbed.difference(&new.dubbed).count(),
        added_incomplete: new.incomplete.difference(&old.incomplete).count(),
        removed_incomplete: old.incomplete.difference(&new.incomplete).count(),
    };
    (!delta.is_empty()).then_some(delta)
}

impl TreeDiff {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut BTreeSet<PathBuf>) -> MergeResult<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| MergeError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| MergeError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| MergeError::io(&path, e))?;
        if file_type.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.insert(rel.to_path_buf());
        }
    }
    Ok(())
}

/// Compare a rendered tree with what is persisted under `root`.
pub fn diff(tree: &RenderedTree, root: &Path) -> MergeResult<TreeDiff> {
    let mut on_disk = BTreeSet::new();
    if root.is_dir() {
        collect_files(root, root, &mut on_disk)?;
    }

    let mut result = TreeDiff::default();
    for (rel, bytes) in &tree.files {
        if !on_disk.remove(rel) {
            result.languages.extend(language_delta(rel, None, Some(bytes.as_slice())));
            result.added.push(rel.clone());
            continue;
        }
        let path = root.join(rel);
        let existing = std::fs::read(&path).map_err(|e| MergeError::io(&path, e))?;
        if &existing == bytes {
            result.unchanged.push(rel.clone());
        } else {
            let delta = language_delta(rel, Some(existing.as_slice()), Some(bytes.as_slice()));
            result.languages.extend(delta);
            result.changed.push(rel.clone());
        }
    }
    for rel in &on_disk {
        if tiered_language_file(rel).is_some() {
            let path = root.join(rel);
            let existing = std::fs::read(&path).map_err(|e| MergeError::io(&path, e))?;
            result.languages.extend(language_delta(rel, Some(existing.as_slice()), None));
        }
    }
    result.removed = on_disk.into_iter().collect();
    result
        .languages
        .sort_by(|a, b| (&a.tier, &a.language).cmp(&(&b.tier, &b.language)));
    Ok(result)
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// Replace the tree under `root` with `tree`, all or nothing.
///
/// Files are staged in a temporary directory next to `root`; any failure
/// while staging leaves `root` untouched. The previous tree is moved aside,
/// the staged tree renamed into place, and the previous tree restored if that
/// rename fails.
pub fn commit(tree: &RenderedTree, root: &Path) -> MergeResult<()> {
    let parent = match root.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| MergeError::io(&parent, e))?;

    let staging = tempfile::Builder::new()
        .prefix(".dublist-staging-")
        .tempdir_in(&parent)
        .map_err(|e| MergeError::io(&parent, e))?;

    for (rel, bytes) in &tree.files {
        let path = staging.path().join(rel);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| MergeError::io(dir, e))?;
        }
        std::fs::write(&path, bytes).map_err(|e| MergeError::io(&path, e))?;
    }

    // Holds the previous tree until the swap succeeds; dropping it deletes it.
    let previous = tempfile::Builder::new()
        .prefix(".dublist-previous-")
        .tempdir_in(&parent)
        .map_err(|e| MergeError::io(&parent, e))?;
    let previous_tree = previous.path().join("tree");

    let had_previous = root.exists();
    if had_previous {
        std::fs::rename(root, &previous_tree).map_err(|e| MergeError::io(root, e))?;
    }

    if let Err(e) = std::fs::rename(staging.path(), root) {
        if had_previous {
            if let Err(restore) = std::fs::rename(&previous_tree, root) {
                log::error!(
                    "could not restore previous output from {}: {restore}",
                    previous_tree.display()
                );
                // Keep the moved-aside tree on disk for manual recovery.
                let kept = previous.into_path();
                log::error!("previous output kept at {}", kept.display());
            }
        }
        return Err(MergeError::io(root, e));
    }

    log::debug!("committed {} files to {}", tree.files.len(), root.display());
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub diff: TreeDiff,
    pub committed: bool,
}

/// Render, diff, and (unless `dry_run` or nothing changed) commit.
pub fn write_output(
    output: &MergeOutput,
    config: &OutputConfig,
    root: &Path,
    dry_run: bool,
) -> MergeResult<WriteReport> {
    let tree = render(output, config)?;
    let diff = diff(&tree, root)?;

    log::info!(
        "output {}: {} added, {} changed, {} unchanged, {} removed",
        root.display(),
        diff.added.len(),
        diff.changed.len(),
        diff.unchanged.len(),
        diff.removed.len()
    );

    if diff.is_noop() {
        log::info!("output unchanged, skipping write");
        return Ok(WriteReport { diff, committed: false });
    }
    if dry_run {
        return Ok(WriteReport { diff, committed: false });
    }

    commit(&tree, root)?;
    Ok(WriteReport { diff, committed: true })
}
