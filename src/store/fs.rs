//! Filesystem backend: one JSON file per dataset.
//!
//! Layout under the data directory:
//!
//! ```text
//! <root>/sequence          last id handed out
//! <root>/datasets/<id>.json
//! ```
//!
//! Files are written to a sibling `.tmp` path and renamed into place. A
//! record that cannot be read back is renamed to `<id>.corrupt` the next
//! time the directory is listed.

use super::backend::Backend;
use crate::error::StoreError;
use crate::models::Dataset;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DATASETS_DIR: &str = "datasets";
const SEQUENCE_FILE: &str = "sequence";
const RECORD_EXTENSION: &str = "json";
const QUARANTINE_EXTENSION: &str = "corrupt";

/// Durable backend rooted at a data directory.
#[derive(Debug)]
pub struct FsBackend {
    root: PathBuf,
    datasets_dir: PathBuf,
    last_id: u64,
}

impl FsBackend {
    /// Open (creating if needed) a data directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let datasets_dir = root.join(DATASETS_DIR);

        fs::create_dir_all(&datasets_dir).map_err(|e| StoreError::io(&datasets_dir, e))?;

        let mut backend = Self {
            root,
            datasets_dir,
            last_id: 0,
        };

        let stored_max = backend.stored_ids()?.into_iter().max().unwrap_or(0);
        let sequence = backend.read_sequence()?;
        if sequence.is_none() && stored_max > 0 {
            warn!(
                "Sequence file missing in {}, resuming after id {}",
                backend.root.display(),
                stored_max
            );
        }
        backend.last_id = sequence.unwrap_or(0).max(stored_max);

        info!(
            "Opened dataset store at {} (last id {})",
            backend.root.display(),
            backend.last_id
        );
        Ok(backend)
    }

    fn record_path(&self, id: u64) -> PathBuf {
        self.datasets_dir.join(format!("{id}.{RECORD_EXTENSION}"))
    }

    fn sequence_path(&self) -> PathBuf {
        self.root.join(SEQUENCE_FILE)
    }

    fn read_sequence(&self) -> Result<Option<u64>, StoreError> {
        let path = self.sequence_path();
        match fs::read_to_string(&path) {
            Ok(content) => content.trim().parse::<u64>().map(Some).map_err(|e| {
                StoreError::io(&path, std::io::Error::new(ErrorKind::InvalidData, e))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Ids of every record file present on disk.
    fn stored_ids(&self) -> Result<Vec<u64>, StoreError> {
        let entries =
            fs::read_dir(&self.datasets_dir).map_err(|e| StoreError::io(&self.datasets_dir, e))?;

        let mut ids = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            match path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            {
                Some(id) => ids.push(id),
                None => debug!("Ignoring stray file {}", path.display()),
            }
        }

        ids.sort_unstable();
        Ok(ids)
    }

    /// Move an unreadable record out of the listing so it no longer counts
    /// against retention.
    fn quarantine(&self, path: &Path) -> Result<(), StoreError> {
        let target = path.with_extension(QUARANTINE_EXTENSION);
        fs::rename(path, &target).map_err(|e| StoreError::io(path, e))?;
        warn!("Moved unreadable record to {}", target.display());
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
}

impl Backend for FsBackend {
    fn allocate_id(&mut self) -> Result<u64, StoreError> {
        let id = self.last_id + 1;
        write_atomic(&self.sequence_path(), id.to_string().as_bytes())?;
        self.last_id = id;
        Ok(id)
    }

    fn insert(&mut self, dataset: &Dataset) -> Result<(), StoreError> {
        let path = self.record_path(dataset.id);
        let bytes = serde_json::to_vec_pretty(dataset).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &bytes)
    }

    fn fetch(&self, id: u64) -> Result<Option<Dataset>, StoreError> {
        let path = self.record_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { path, source })
    }

    fn remove(&mut self, id: u64) -> Result<(), StoreError> {
        let path = self.record_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn load_all(&self) -> Result<Vec<Dataset>, StoreError> {
        let mut datasets = Vec::new();
        for id in self.stored_ids()? {
            // A concurrent external delete between listing and reading is tolerated
            match self.fetch(id) {
                Ok(Some(dataset)) => datasets.push(dataset),
                Ok(None) => {}
                Err(StoreError::Corrupt { path, source }) => {
                    warn!("Skipping unreadable record {}: {}", path.display(), source);
                    self.quarantine(&path)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(datasets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Aggregates, DatasetDraft, EquipmentRow};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn dataset(id: u64) -> Dataset {
        DatasetDraft {
            source_file_name: "plant.csv".to_string(),
            aggregates: Aggregates {
                row_count: 1,
                average_flowrate: 1.5,
                average_pressure: 2.5,
                average_temperature: 3.5,
                category_distribution: [("Pump".to_string(), 1)].into_iter().collect(),
            },
            rows: vec![EquipmentRow {
                name: "P-1".to_string(),
                category: "Pump".to_string(),
                flowrate: 1.5,
                pressure: 2.5,
                temperature: 3.5,
            }],
        }
        .into_dataset(id, Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap())
    }

    #[test]
    fn test_record_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut backend = FsBackend::open(dir.path()).unwrap();

        let id = backend.allocate_id().unwrap();
        backend.insert(&dataset(id)).unwrap();

        assert!(dir.path().join("datasets").join("1.json").exists());
        assert_eq!(backend.fetch(id).unwrap(), Some(dataset(id)));
        assert_eq!(backend.load_all().unwrap(), vec![dataset(id)]);
    }

    #[test]
    fn test_sequence_survives_reopen_and_pruning() {
        let dir = TempDir::new().unwrap();
        {
            let mut backend = FsBackend::open(dir.path()).unwrap();
            for _ in 0..3 {
                let id = backend.allocate_id().unwrap();
                backend.insert(&dataset(id)).unwrap();
            }
            backend.remove(3).unwrap();
        }

        let mut backend = FsBackend::open(dir.path()).unwrap();
        assert_eq!(backend.allocate_id().unwrap(), 4);
    }

    #[test]
    fn test_missing_sequence_resumes_after_stored_ids() {
        let dir = TempDir::new().unwrap();
        {
            let mut backend = FsBackend::open(dir.path()).unwrap();
            backend.insert(&dataset(9)).unwrap();
        }
        fs::remove_file(dir.path().join(SEQUENCE_FILE)).ok();

        let mut backend = FsBackend::open(dir.path()).unwrap();
        assert_eq!(backend.allocate_id().unwrap(), 10);
    }

    #[test]
    fn test_remove_deletes_file() {
        let dir = TempDir::new().unwrap();
        let mut backend = FsBackend::open(dir.path()).unwrap();
        backend.insert(&dataset(1)).unwrap();

        backend.remove(1).unwrap();
        backend.remove(1).unwrap();

        assert!(!dir.path().join("datasets").join("1.json").exists());
        assert!(backend.fetch(1).unwrap().is_none());
    }

    #[test]
    fn test_stray_files_are_ignored() {
        let dir = TempDir::new().unwrap();
        let mut backend = FsBackend::open(dir.path()).unwrap();
        backend.insert(&dataset(2)).unwrap();
        fs::write(dir.path().join("datasets").join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join("datasets").join("draft.json"), "{}").unwrap();

        assert_eq!(backend.load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_load_all_moves_corrupt_records_aside() {
        let dir = TempDir::new().unwrap();
        let mut backend = FsBackend::open(dir.path()).unwrap();
        backend.insert(&dataset(1)).unwrap();
        fs::write(dir.path().join("datasets").join("7.json"), "not json").unwrap();

        let loaded = backend.load_all().unwrap();

        assert_eq!(loaded, vec![dataset(1)]);
        assert!(!dir.path().join("datasets").join("7.json").exists());
        assert!(dir.path().join("datasets").join("7.corrupt").exists());
        assert_eq!(backend.load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_record_is_reported() {
        let dir = TempDir::new().unwrap();
        let backend = FsBackend::open(dir.path()).unwrap();
        fs::write(dir.path().join("datasets").join("5.json"), "not json").unwrap();

        assert!(matches!(
            backend.fetch(5),
            Err(StoreError::Corrupt { .. })
        ));
    }
}
