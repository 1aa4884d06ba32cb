//! Language index (`_languages.json`) and the README statistics block.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MergeError, MergeResult};
use crate::language;
use crate::model::TierProjection;

const STATS_START: &str = "<!-- LANG-STATS:START -->";
const STATS_END: &str = "<!-- LANG-STATS:END -->";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageIndexEntry {
    pub key: String,
    pub english_name: String,
    pub native_name: String,
    pub file: String,
    pub dubbed_count: usize,
    pub incomplete_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageIndex {
    pub languages: Vec<LanguageIndexEntry>,
}

/// Index every language of `projection`, largest dubbed set first.
/// `file_dir` is prefixed to each language's file name.
pub fn build_language_index(projection: &TierProjection, file_dir: &str) -> LanguageIndex {
    let mut languages: Vec<LanguageIndexEntry> = projection
        .languages
        .iter()
        .map(|(key, set)| LanguageIndexEntry {
            key: language::file_token(key),
            english_name: language::english_name(key),
            native_name: language::native_name(key),
            file: format!("{file_dir}/{}", language::file_name(key)),
            dubbed_count: set.dubbed.len(),
            incomplete_count: set.incomplete.len(),
        })
        .collect();

    languages.sort_by(|a, b| b.dubbed_count.cmp(&a.dubbed_count).then_with(|| a.key.cmp(&b.key)));
    LanguageIndex { languages }
}

pub fn load_language_index(path: &Path) -> MergeResult<LanguageIndex> {
    crate::load::read_json(path)
}

// ---------------------------------------------------------------------------
// README
// ---------------------------------------------------------------------------

pub fn render_table(index: &LanguageIndex) -> String {
    let mut lines = vec![
        "| Language | Native name | Dubbed | Incomplete | File |".to_string(),
        "|---|---:|---:|---:|---|".to_string(),
    ];
    for row in &index.languages {
        lines.push(format!(
            "| {} | {} | {} | {} | `{}` |",
            row.english_name, row.native_name, row.dubbed_count, row.incomplete_count, row.file
        ));
    }
    lines.join("\n")
}

fn stats_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!-- LANG-STATS:START -->.*?<!-- LANG-STATS:END -->").unwrap())
}

/// Replace the statistics block of `content`, or append a new section when
/// the markers are missing.
pub fn splice_readme(content: &str, index: &LanguageIndex) -> String {
    let block = format!("{STATS_START}\n{}\n{STATS_END}", render_table(index));
    if content.contains(STATS_START) && content.contains(STATS_END) {
        stats_block_re()
            .replace(content, regex::NoExpand(&block))
            .into_owned()
    } else {
        format!("{content}\n\n## Language statistics\n\n{block}\n")
    }
}

/// Rewrite the statistics block of the README at `path`. Returns whether the
/// file changed. A missing README is skipped.
pub fn refresh_readme(path: &Path, index: &LanguageIndex) -> MergeResult<bool> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("README not found at {}, skipping stats update", path.display());
            return Ok(false);
        }
        Err(e) => return Err(MergeError::io(path, e)),
    };

    let updated = splice_readme(&content, index);
    if updated == content {
        log::info!("README language stats already up to date");
        return Ok(false);
    }

    let temp_path = path.with_extension("md.tmp");
    std::fs::write(&temp_path, &updated).map_err(|e| MergeError::io(&temp_path, e))?;
    std::fs::rename(&temp_path, path).map_err(|e| MergeError::io(path, e))?;
    log::info!("updated README language stats: {}", path.display());
    Ok(true)
}
