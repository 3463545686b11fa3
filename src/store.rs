use std::fs;
use std::io;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::{Builder, TempDir};

use crate::domain::{CompetitionSlug, DatasetRef, DatasetSpecifier};
use crate::error::FetchError;

/// Layout of the local data directory. Extracted datasets live under
/// `<data_root>/competitions/<slug>` and `<data_root>/datasets/<owner>/<name>`.
#[derive(Debug, Clone)]
pub struct Store {
    data_root: Utf8PathBuf,
}

impl Store {
    pub fn new(data_root: Utf8PathBuf) -> Self {
        Self { data_root }
    }

    pub fn data_root(&self) -> &Utf8Path {
        &self.data_root
    }

    pub fn competition_dir(&self, slug: &CompetitionSlug) -> Utf8PathBuf {
        self.data_root.join("competitions").join(slug.as_str())
    }

    pub fn dataset_dir(&self, dataset: &DatasetRef) -> Utf8PathBuf {
        self.data_root
            .join("datasets")
            .join(dataset.owner())
            .join(dataset.name())
    }

    pub fn destination_for(&self, specifier: &DatasetSpecifier) -> Utf8PathBuf {
        match specifier {
            DatasetSpecifier::Competition(slug) => self.competition_dir(slug),
            DatasetSpecifier::Dataset(dataset) => self.dataset_dir(dataset),
        }
    }

    /// Staging lives next to the data root so the final rename stays on one
    /// filesystem. The directory is removed on drop, so a failed fetch leaves
    /// nothing behind.
    pub fn staging(&self) -> Result<TempDir, FetchError> {
        let parent = match self.data_root.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
            _ => Utf8PathBuf::from("."),
        };
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        Builder::new()
            .prefix(".kagfetch-stage")
            .tempdir_in(parent.as_std_path())
            .map_err(|err| FetchError::Filesystem(err.to_string()))
    }

    /// Replace whatever is at `destination` with the staged extraction.
    pub fn swap_into_place(&self, staged: &Path, destination: &Utf8Path) -> Result<(), FetchError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        }
        atomic_rename_dir(staged, destination.as_std_path())
            .map_err(|err| FetchError::Filesystem(err.to_string()))
    }

    /// Move a downloaded archive out of staging into the data root.
    pub fn persist_archive(
        &self,
        archive: &Path,
        file_name: &str,
    ) -> Result<Utf8PathBuf, FetchError> {
        fs::create_dir_all(self.data_root.as_std_path())
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        let target = self.data_root.join(file_name);
        fs::rename(archive, target.as_std_path())
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        Ok(target)
    }
}

pub fn atomic_rename_dir(from: &Path, to: &Path) -> io::Result<()> {
    if to.exists() {
        fs::remove_dir_all(to)?;
    }
    fs::rename(from, to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let store = Store::new(Utf8PathBuf::from("data"));
        let slug: CompetitionSlug = "playground-series-s5e8".parse().unwrap();
        let dataset: DatasetRef = "zynicide/wine-reviews".parse().unwrap();

        assert_eq!(
            store.competition_dir(&slug),
            Utf8PathBuf::from("data/competitions/playground-series-s5e8")
        );
        assert_eq!(
            store.dataset_dir(&dataset),
            Utf8PathBuf::from("data/datasets/zynicide/wine-reviews")
        );
    }

    #[test]
    fn swap_replaces_previous_contents() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();
        let store = Store::new(root.clone());

        let dest = root.join("competitions").join("demo");
        fs::create_dir_all(dest.as_std_path()).unwrap();
        fs::write(dest.join("stale.csv").as_std_path(), b"old").unwrap();

        let staged = temp.path().join("staged");
        fs::create_dir_all(&staged).unwrap();
        fs::write(staged.join("train.csv"), b"new").unwrap();

        store.swap_into_place(&staged, &dest).unwrap();
        assert!(!dest.join("stale.csv").as_std_path().exists());
        assert_eq!(
            fs::read_to_string(dest.join("train.csv").as_std_path()).unwrap(),
            "new"
        );
    }
}
