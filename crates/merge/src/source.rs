//! Observation producers.
//!
//! Anything that can say "this title, in my id space, is dubbed into this
//! language" implements [`ObservationSource`]. The engine never knows how the
//! observations were obtained; upstream fetchers write per-language JSON files
//! and [`JsonDirSource`] reads them back.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::MergeResult;
use crate::language;
use crate::load::{language_files, read_json, resolve_language};
use crate::model::SourceObservation;

pub trait ObservationSource {
    /// Source name; distinct names are what corroboration counts.
    fn name(&self) -> &str;

    /// Every observation this source currently asserts.
    fn observations(&self) -> MergeResult<Vec<SourceObservation>>;
}

// ---------------------------------------------------------------------------
// JSON directory
// ---------------------------------------------------------------------------

/// A directory of `dubbed_<language>.json` files:
///
/// ```json
/// { "language": "English", "dubbed": [1, 5, 20] }
/// ```
///
/// `language` is optional and falls back to the filename. License and
/// attribution fields are ignored.
pub struct JsonDirSource {
    name: String,
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ObservationFile {
    #[serde(default)]
    language: Option<String>,
    dubbed: Vec<u64>,
}

impl JsonDirSource {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }
}

impl ObservationSource for JsonDirSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn observations(&self) -> MergeResult<Vec<SourceObservation>> {
        let Some(files) = language_files(&self.dir)? else {
            log::warn!(
                "source '{}': directory {} does not exist, no observations",
                self.name,
                self.dir.display()
            );
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for (path, file_language) in files {
            let file: ObservationFile = read_json(&path)?;
            let lang = resolve_language(&path, file.language.as_deref(), file_language)?;

            log::debug!(
                "source '{}': {} ids for '{lang}' from {}",
                self.name,
                file.dubbed.len(),
                path.display()
            );
            out.extend(file.dubbed.into_iter().map(|local_id| SourceObservation {
                source: self.name.clone(),
                local_id,
                language: lang.clone(),
                asserted: true,
            }));
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Observations held in memory, for embedding callers and tests.
pub struct MemorySource {
    name: String,
    entries: BTreeSet<(String, u64)>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeSet::new(),
        }
    }

    pub fn with(mut self, language: &str, local_ids: impl IntoIterator<Item = u64>) -> Self {
        let lang = language::normalize(language);
        for id in local_ids {
            self.entries.insert((lang.clone(), id));
        }
        self
    }
}

impl ObservationSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn observations(&self) -> MergeResult<Vec<SourceObservation>> {
        Ok(self
            .entries
            .iter()
            .map(|(language, local_id)| SourceObservation {
                source: self.name.clone(),
                local_id: *local_id,
                language: language.clone(),
                asserted: true,
            })
            .collect())
    }
}
