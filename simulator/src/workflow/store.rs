use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// JSON artifacts laid out under one root directory.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize(name)))
    }

    /// Writes `value` as pretty JSON to `<root>/<name>.json`.
    pub fn write<T: Serialize>(&self, name: &str, value: &T) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating artifact directory {}", self.root.display()))?;
        let path = self.path_for(name);
        write_json(&path, value)?;
        Ok(path)
    }
}

pub fn write_json<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> anyhow::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let contents = serde_json::to_string_pretty(value)
        .with_context(|| format!("serializing {}", path.display()))?;
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> anyhow::Result<T> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

// Time keys such as "2012.001" are kept; path separators are not.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use compliancecore::records::FrequencyBand;

    #[test]
    fn store_round_trips_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("refs"));
        let band = FrequencyBand::new(0.004, 0.02).unwrap();
        let path = store.write("STN1_2012.001", &band).unwrap();
        assert!(path.ends_with("STN1_2012.001.json"));
        assert_eq!(path, store.path_for("STN1_2012.001"));
        let restored: FrequencyBand = read_json(&path).unwrap();
        assert_eq!(restored, band);
    }

    #[test]
    fn names_cannot_escape_the_root() {
        let store = ArtifactStore::new("/data");
        assert_eq!(store.path_for("a/b"), PathBuf::from("/data/a_b.json"));
    }

    #[test]
    fn missing_artifact_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_json::<FrequencyBand, _>(dir.path().join("absent.json")).unwrap_err();
        assert!(format!("{err:#}").contains("absent.json"));
    }
}
