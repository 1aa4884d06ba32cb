//! Loading persisted inputs into a [`MergeInput`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::MergeConfig;
use crate::error::{MergeError, MergeResult};
use crate::language;
use crate::model::{CanonicalId, MappingEntry, MergeInput, OverrideDirective, OverrideKind};
use crate::source::{JsonDirSource, ObservationSource};

/// Load every source, mapping file, and override file named by `config`.
/// Relative paths resolve against `base_dir` (the config file's directory).
pub fn load_input(config: &MergeConfig, base_dir: &Path) -> MergeResult<MergeInput> {
    let mut input = MergeInput::default();

    for (name, source_config) in &config.sources {
        let source = JsonDirSource::new(name.clone(), base_dir.join(&source_config.dir));
        let observations = source.observations()?;

        let mut mappings = match source_config.mapping {
            Some(ref file) => {
                let path = base_dir.join(file);
                let data = std::fs::read_to_string(&path).map_err(|e| MergeError::io(&path, e))?;
                load_mapping_csv(name, &data, &path)?
            }
            None => Vec::new(),
        };

        if source_config.canonical {
            // Rows from the mapping file win over the identity mapping.
            let remapped: BTreeSet<u64> = mappings.iter().map(|m| m.local_id).collect();
            let local_ids: BTreeSet<u64> = observations.iter().map(|o| o.local_id).collect();
            mappings.extend(local_ids.difference(&remapped).map(|&local_id| MappingEntry {
                source: name.clone(),
                local_id,
                canonical_id: CanonicalId(local_id),
            }));
        }

        log::info!(
            "source '{name}': {} observations, {} mappings",
            observations.len(),
            mappings.len()
        );
        input.observations.extend(observations);
        input.mappings.extend(mappings);
    }

    if let Some(ref overrides) = config.overrides {
        input.overrides = load_overrides(&base_dir.join(&overrides.dir))?;
        log::info!("overrides: {} directives", input.overrides.len());
    }

    Ok(input)
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// `*.json` files of a language directory paired with the language key their
/// filename implies, sorted by filename. Files starting with `_` are
/// generated artifacts and skipped. `None` when the directory is missing.
pub fn language_files(dir: &Path) -> MergeResult<Option<Vec<(PathBuf, String)>>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(MergeError::io(dir, e)),
    };

    let mut files = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| MergeError::io(dir, e))?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !file_name.ends_with(".json") || file_name.starts_with('_') {
            continue;
        }
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let lang = language::from_file_name(&file_name);
        if lang.is_empty() {
            return Err(MergeError::malformed(&path, "cannot infer language from filename"));
        }
        files.insert(file_name, (path, lang));
    }
    Ok(Some(files.into_values().collect()))
}

/// Language key of a language file: the declared `language` field when it
/// normalizes to something, else the key implied by the filename. Keys that
/// are unsafe as a file name are rejected, since they become output paths.
pub(crate) fn resolve_language(
    path: &Path,
    declared: Option<&str>,
    from_file_name: String,
) -> MergeResult<String> {
    let lang = declared
        .map(language::normalize)
        .filter(|l| !l.is_empty())
        .unwrap_or(from_file_name);
    if !language::is_safe_key(&lang) {
        return Err(MergeError::malformed(
            path,
            format!("language '{lang}' is not usable as a file name"),
        ));
    }
    Ok(lang)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> MergeResult<T> {
    let data = std::fs::read_to_string(path).map_err(|e| MergeError::io(path, e))?;
    serde_json::from_str(&data).map_err(|e| MergeError::malformed(path, e.to_string()))
}

// ---------------------------------------------------------------------------
// Mappings
// ---------------------------------------------------------------------------

/// Parse a mapping CSV with `source_id` and `canonical_id` columns. An
/// optional `source` column must name `source` on every row.
pub fn load_mapping_csv(source: &str, csv_data: &str, path: &Path) -> MergeResult<Vec<MappingEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| MergeError::malformed(path, e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let idx = |name: &str| headers.iter().position(|h| h == name);
    let local_idx = idx("source_id")
        .ok_or_else(|| MergeError::malformed(path, "missing column 'source_id'"))?;
    let canonical_idx = idx("canonical_id")
        .ok_or_else(|| MergeError::malformed(path, "missing column 'canonical_id'"))?;
    let source_idx = idx("source");

    let mut entries = Vec::new();
    for (i, record) in reader.records().enumerate() {
        // Header is line 1.
        let row = i + 2;
        let record = record.map_err(|e| MergeError::malformed(path, e.to_string()))?;

        if let Some(si) = source_idx {
            let found = record.get(si).unwrap_or("");
            if found != source {
                return Err(MergeError::SourceMismatch {
                    path: path.to_path_buf(),
                    row,
                    expected: source.into(),
                    found: found.into(),
                });
            }
        }

        let field = |fi: usize, column: &str| -> MergeResult<u64> {
            let value = record.get(fi).unwrap_or("");
            value.parse().map_err(|_| {
                MergeError::malformed(path, format!("row {row}: {column} '{value}' is not an id"))
            })
        };

        entries.push(MappingEntry {
            source: source.into(),
            local_id: field(local_idx, "source_id")?,
            canonical_id: CanonicalId(field(canonical_idx, "canonical_id")?),
        });
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OverrideFile {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    dubbed: Vec<u64>,
    #[serde(default)]
    not_dubbed: Vec<u64>,
    #[serde(default)]
    incomplete: Vec<u64>,
}

/// Read every `dubbed_<language>.json` override file in `dir`. A missing
/// directory yields no directives.
pub fn load_overrides(dir: &Path) -> MergeResult<Vec<OverrideDirective>> {
    let Some(files) = language_files(dir)? else {
        log::warn!("overrides directory {} does not exist", dir.display());
        return Ok(Vec::new());
    };

    let mut directives = Vec::new();
    for (path, file_language) in files {
        let file: OverrideFile = read_json(&path)?;
        let lang = resolve_language(&path, file.language.as_deref(), file_language)?;

        let groups = [
            (OverrideKind::Dubbed, file.dubbed),
            (OverrideKind::NotDubbed, file.not_dubbed),
            (OverrideKind::Incomplete, file.incomplete),
        ];
        for (kind, ids) in groups {
            directives.extend(ids.into_iter().map(|id| OverrideDirective {
                canonical_id: CanonicalId(id),
                language: lang.clone(),
                kind,
            }));
        }
    }
    Ok(directives)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_csv_basic() {
        let csv = "source_id,canonical_id\n55,7\n 56 , 8 \n";
        let entries = load_mapping_csv("anilist", csv, Path::new("anilist.csv")).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].source, "anilist");
        assert_eq!(entries[0].local_id, 55);
        assert_eq!(entries[0].canonical_id, CanonicalId(7));
        assert_eq!(entries[1].canonical_id, CanonicalId(8));
    }

    #[test]
    fn mapping_csv_missing_column() {
        let csv = "source_id,mal_id\n55,7\n";
        let err = load_mapping_csv("anilist", csv, Path::new("anilist.csv")).unwrap_err();
        assert!(err.to_string().contains("canonical_id"));
    }

    #[test]
    fn mapping_csv_bad_id() {
        let csv = "source_id,canonical_id\n55,seven\n";
        let err = load_mapping_csv("anilist", csv, Path::new("anilist.csv")).unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn mapping_csv_source_column_must_match() {
        let csv = "source,source_id,canonical_id\nanilist,1,1\nmal,2,2\n";
        let err = load_mapping_csv("anilist", csv, Path::new("anilist.csv")).unwrap_err();
        assert!(matches!(err, MergeError::SourceMismatch { row: 3, .. }));
    }

    #[test]
    fn overrides_all_kinds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("dubbed_german.json"),
            r#"{"language": "German", "dubbed": [200], "not_dubbed": [100], "incomplete": [200, 300]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("_languages.json"), r#"{"languages": []}"#).unwrap();

        let directives = load_overrides(dir.path()).unwrap();
        assert_eq!(directives.len(), 4);
        assert!(directives.iter().all(|d| d.language == "german"));
        let kinds: Vec<_> = directives.iter().map(|d| (d.canonical_id.0, d.kind)).collect();
        assert!(kinds.contains(&(200, OverrideKind::Dubbed)));
        assert!(kinds.contains(&(100, OverrideKind::NotDubbed)));
        assert!(kinds.contains(&(300, OverrideKind::Incomplete)));
    }

    #[test]
    fn overrides_malformed_json_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dubbed_german.json"), "{ not json").unwrap();
        let err = load_overrides(dir.path()).unwrap_err();
        assert!(matches!(err, MergeError::MalformedRecord { .. }));
    }

    #[test]
    fn overrides_reject_path_like_language() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("dubbed_german.json"),
            r#"{"language": "../german", "dubbed": [200]}"#,
        )
        .unwrap();
        let err = load_overrides(dir.path()).unwrap_err();
        assert!(matches!(err, MergeError::MalformedRecord { .. }), "{err}");
    }

    #[test]
    fn filename_language_falls_back_when_declared_is_blank() {
        let path = Path::new("dubbed_sign_language.json");
        let lang = resolve_language(path, Some("  "), "sign language".into()).unwrap();
        assert_eq!(lang, "sign language");
        assert!(resolve_language(path, Some("Deutsch/.."), "german".into()).is_err());
    }

    #[test]
    fn load_input_identity_and_remap() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        std::fs::create_dir_all(base.join("mal")).unwrap();
        std::fs::write(base.join("mal/dubbed_english.json"), r#"{"dubbed": [1, 2]}"#).unwrap();
        std::fs::write(base.join("mal.csv"), "source_id,canonical_id\n2,20\n").unwrap();

        let config = MergeConfig::from_toml(
            r#"
name = "t"
[sources.mal]
dir = "mal"
canonical = true
mapping = "mal.csv"
"#,
        )
        .unwrap();

        let input = load_input(&config, base).unwrap();
        assert_eq!(input.observations.len(), 2);
        let mut maps: Vec<(u64, u64)> = input
            .mappings
            .iter()
            .map(|m| (m.local_id, m.canonical_id.0))
            .collect();
        maps.sort();
        assert_eq!(maps, vec![(1, 1), (2, 20)]);
        assert!(input.overrides.is_empty());
    }
}
