/// Manifest store
///
/// Reads the upstream-generated mapping from generator scripts to the figure
/// files they declare. The manifest is read fresh on every lookup; requests may
/// run in separate processes and nothing is memoized between them.
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::logging::{operations, services, status};

/// One generator script and its declared outputs
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub script: String,
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestDocument {
    Wrapped { figures: BTreeMap<String, ManifestEntry> },
    Bare(BTreeMap<String, ManifestEntry>),
}

impl ManifestDocument {
    fn into_entries(self) -> BTreeMap<String, ManifestEntry> {
        match self {
            Self::Wrapped { figures } => figures,
            Self::Bare(entries) => entries,
        }
    }
}

/// Result of looking up a script's declared outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestLookup {
    /// Bare output file names, in declaration order, without duplicates
    Found(Vec<String>),
    NotFound,
}

impl ManifestLookup {
    pub fn outputs(&self) -> &[String] {
        match self {
            Self::Found(outputs) => outputs,
            Self::NotFound => &[],
        }
    }
}

pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up the declared outputs of the script whose file name is
    /// `script_name`. Unreadable or malformed manifests yield `NotFound`.
    pub fn lookup_owner(&self, script_name: &str) -> ManifestLookup {
        let entries = match self.load() {
            Ok(entries) => entries,
            Err(reason) => {
                warn!(
                    service = services::MANIFEST,
                    operation = operations::LOOKUP,
                    status = status::UNAVAILABLE,
                    manifest = %self.path.display(),
                    reason = %reason,
                    "manifest unavailable, caching disabled for this request"
                );
                return ManifestLookup::NotFound;
            }
        };

        // Entry labels sort deterministically; the first matching script wins.
        let found = entries
            .into_values()
            .find(|entry| file_name_of(&entry.script) == script_name);

        match found {
            Some(entry) => {
                let mut outputs: Vec<String> = Vec::with_capacity(entry.files.len());
                for file in &entry.files {
                    let name = file_name_of(file);
                    if !name.is_empty() && !outputs.iter().any(|o| o == name) {
                        outputs.push(name.to_string());
                    }
                }
                debug!(
                    service = services::MANIFEST,
                    operation = operations::LOOKUP,
                    status = status::SUCCESS,
                    script = script_name,
                    outputs = outputs.len(),
                    "manifest entry found"
                );
                ManifestLookup::Found(outputs)
            }
            None => {
                debug!(
                    service = services::MANIFEST,
                    operation = operations::LOOKUP,
                    status = status::NOT_FOUND,
                    script = script_name,
                    "script not declared in manifest"
                );
                ManifestLookup::NotFound
            }
        }
    }

    fn load(&self) -> Result<BTreeMap<String, ManifestEntry>, String> {
        let content = fs::read_to_string(&self.path).map_err(|e| e.to_string())?;
        let document: ManifestDocument =
            serde_json::from_str(&content).map_err(|e| e.to_string())?;
        Ok(document.into_entries())
    }
}

fn file_name_of(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_manifest(dir: &TempDir, content: &str) -> ManifestStore {
        let path = dir.path().join("scripts.json");
        fs::write(&path, content).unwrap();
        ManifestStore::new(path)
    }

    #[test]
    fn test_lookup_wrapped_manifest() {
        let temp = TempDir::new().unwrap();
        let store = write_manifest(
            &temp,
            r#"{
                "figures": {
                    "fig:a": {
                        "script": "src/figures/multi.py",
                        "files": ["src/figures/a.pdf", "src/figures/b.pdf", "src/figures/c.pdf"]
                    },
                    "fig:d": { "script": "src/figures/single.py", "files": ["src/figures/d.pdf"] }
                }
            }"#,
        );

        assert_eq!(
            store.lookup_owner("multi.py"),
            ManifestLookup::Found(vec![
                "a.pdf".to_string(),
                "b.pdf".to_string(),
                "c.pdf".to_string()
            ])
        );
        assert_eq!(
            store.lookup_owner("single.py").outputs(),
            &["d.pdf".to_string()]
        );
    }

    #[test]
    fn test_lookup_bare_manifest() {
        let temp = TempDir::new().unwrap();
        let store = write_manifest(
            &temp,
            r#"{ "plot": { "script": "plot.py", "files": ["x.png", "y.png"] } }"#,
        );

        assert_eq!(store.lookup_owner("plot.py").outputs().len(), 2);
    }

    #[test]
    fn test_unknown_script_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = write_manifest(
            &temp,
            r#"{ "figures": { "a": { "script": "plot.py", "files": ["x.png"] } } }"#,
        );

        assert_eq!(store.lookup_owner("other.py"), ManifestLookup::NotFound);
    }

    #[test]
    fn test_missing_manifest_degrades_to_not_found() {
        let temp = TempDir::new().unwrap();
        let store = ManifestStore::new(temp.path().join("scripts.json"));

        assert_eq!(store.lookup_owner("plot.py"), ManifestLookup::NotFound);
    }

    #[test]
    fn test_malformed_manifest_degrades_to_not_found() {
        let temp = TempDir::new().unwrap();
        let store = write_manifest(&temp, "{ not json");

        assert_eq!(store.lookup_owner("plot.py"), ManifestLookup::NotFound);
    }

    #[test]
    fn test_duplicate_outputs_collapse() {
        let temp = TempDir::new().unwrap();
        let store = write_manifest(
            &temp,
            r#"{ "figures": { "a": { "script": "plot.py", "files": ["out/x.png", "x.png", "y.png"] } } }"#,
        );

        assert_eq!(
            store.lookup_owner("plot.py").outputs(),
            &["x.png".to_string(), "y.png".to_string()]
        );
    }
}
