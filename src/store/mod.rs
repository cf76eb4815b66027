//! Dataset store with a bounded retention window.
//!
//! The store exclusively owns every [`Dataset`]. Records are immutable once
//! created and are only ever destroyed by the retention rule: after each
//! `create`, everything but the `retention` most recent records is deleted.
//! Recency is `uploaded_at` descending with the higher id winning ties.
//!
//! `create` holds one mutex across id allocation, insert and prune, so two
//! concurrent uploads can never both skip pruning.

pub mod backend;
pub mod fs;

pub use backend::{Backend, MemoryBackend};
pub use fs::FsBackend;

use crate::error::StoreError;
use crate::models::{Dataset, DatasetDraft};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Number of datasets kept when nothing else is configured.
pub const DEFAULT_RETENTION: usize = 5;

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Thread-safe dataset store.
pub struct DatasetStore {
    backend: Mutex<Box<dyn Backend>>,
    retention: usize,
    clock: Clock,
}

impl std::fmt::Debug for DatasetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetStore")
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

impl DatasetStore {
    /// Wrap a backend. A retention of zero is raised to one.
    pub fn new(backend: impl Backend + 'static, retention: usize) -> Self {
        Self {
            backend: Mutex::new(Box::new(backend)),
            retention: retention.max(1),
            clock: Box::new(Utc::now),
        }
    }

    /// Volatile store, used for `--in-memory` runs and tests.
    pub fn in_memory(retention: usize) -> Self {
        Self::new(MemoryBackend::new(), retention)
    }

    /// Durable store rooted at `data_dir`.
    ///
    /// Records left outside the window (for example after lowering the
    /// retention) are pruned on open.
    pub fn open(data_dir: impl Into<PathBuf>, retention: usize) -> Result<Self, StoreError> {
        let store = Self::new(FsBackend::open(data_dir)?, retention);
        {
            let mut backend = store.lock();
            prune(backend.as_mut(), store.retention)?;
        }
        Ok(store)
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Maximum number of datasets kept.
    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Persist a draft, assigning its id and upload time, then enforce retention.
    ///
    /// Either the dataset is stored and the window enforced, or the call fails
    /// and the dataset is not kept.
    pub fn create(&self, draft: DatasetDraft) -> Result<Dataset, StoreError> {
        if !draft.aggregates.is_finite() {
            return Err(StoreError::NonFiniteAggregates);
        }

        let mut backend = self.lock();

        let id = backend.allocate_id()?;
        let dataset = draft.into_dataset(id, (self.clock)());
        backend.insert(&dataset)?;
        debug!("Stored dataset {} ({} rows)", id, dataset.row_count());

        let pruned = match prune(backend.as_mut(), self.retention) {
            Ok(pruned) => pruned,
            Err(e) => {
                if let Err(undo) = backend.remove(id) {
                    warn!("Failed to discard dataset {} after prune error: {}", id, undo);
                }
                return Err(e);
            }
        };
        if !pruned.is_empty() {
            info!("Retention pruned datasets {:?}", pruned);
        }

        Ok(dataset)
    }

    /// Most recent datasets first, at most `limit` of them.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<Dataset>, StoreError> {
        let backend = self.lock();

        let mut datasets = backend.load_all()?;
        sort_most_recent_first(&mut datasets);
        datasets.truncate(limit);

        Ok(datasets)
    }

    /// Fetch one dataset.
    pub fn get(&self, id: u64) -> Result<Dataset, StoreError> {
        self.lock().fetch(id)?.ok_or(StoreError::NotFound(id))
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Backend>> {
        // Backends never leave partial in-memory state behind, so a poisoned lock is still usable
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn sort_most_recent_first(datasets: &mut [Dataset]) {
    datasets.sort_by(|a, b| b.recency_key().cmp(&a.recency_key()));
}

/// Delete everything outside the retention window. Returns the deleted ids.
fn prune(backend: &mut dyn Backend, retention: usize) -> Result<Vec<u64>, StoreError> {
    let mut datasets = backend.load_all()?;
    if datasets.len() <= retention {
        return Ok(Vec::new());
    }

    sort_most_recent_first(&mut datasets);

    let mut pruned = Vec::with_capacity(datasets.len() - retention);
    for dataset in &datasets[retention..] {
        backend.remove(dataset.id)?;
        pruned.push(dataset.id);
    }

    Ok(pruned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Aggregates, EquipmentRow};
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn draft(name: &str) -> DatasetDraft {
        DatasetDraft {
            source_file_name: name.to_string(),
            aggregates: Aggregates::default(),
            rows: Vec::new(),
        }
    }

    /// Clock that advances one second per call.
    fn ticking_clock() -> impl Fn() -> DateTime<Utc> + Send + Sync + 'static {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let ticks = AtomicI64::new(0);
        move || base + Duration::seconds(ticks.fetch_add(1, Ordering::SeqCst))
    }

    #[test]
    fn test_create_assigns_increasing_ids_and_timestamps() {
        let store = DatasetStore::in_memory(5).with_clock(ticking_clock());

        let first = store.create(draft("a.csv")).unwrap();
        let second = store.create(draft("b.csv")).unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(second.uploaded_at > first.uploaded_at);
        assert_eq!(second.source_file_name, "b.csv");
    }

    #[test]
    fn test_retention_keeps_five_most_recent() {
        let store = DatasetStore::in_memory(DEFAULT_RETENTION).with_clock(ticking_clock());

        let ids: Vec<u64> = (0..6)
            .map(|i| store.create(draft(&format!("{i}.csv"))).unwrap().id)
            .collect();

        let recent: Vec<u64> = store.list_recent(5).unwrap().iter().map(|d| d.id).collect();
        assert_eq!(recent, vec![6, 5, 4, 3, 2]);
        assert!(matches!(store.get(ids[0]), Err(StoreError::NotFound(1))));
        assert_eq!(store.list_recent(100).unwrap().len(), 5);
    }

    #[test]
    fn test_equal_timestamps_break_ties_by_id() {
        let fixed = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let store = DatasetStore::in_memory(2).with_clock(move || fixed);

        for i in 0..4 {
            store.create(draft(&format!("{i}.csv"))).unwrap();
        }

        let recent: Vec<u64> = store.list_recent(5).unwrap().iter().map(|d| d.id).collect();
        assert_eq!(recent, vec![4, 3]);
    }

    #[test]
    fn test_list_recent_truncates_and_is_idempotent() {
        let store = DatasetStore::in_memory(5).with_clock(ticking_clock());
        for i in 0..3 {
            store.create(draft(&format!("{i}.csv"))).unwrap();
        }

        let first = store.list_recent(2).unwrap();
        let second = store.list_recent(2).unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(first[0].id, 3);
    }

    #[test]
    fn test_get_unknown_id() {
        let store = DatasetStore::in_memory(5);
        assert!(matches!(store.get(42), Err(StoreError::NotFound(42))));
    }

    #[test]
    fn test_rows_returned_unchanged() {
        let store = DatasetStore::in_memory(5);
        let rows = vec![
            EquipmentRow {
                name: "B".to_string(),
                category: "Valve".to_string(),
                flowrate: 0.1,
                pressure: 0.2,
                temperature: 0.3,
            },
            EquipmentRow {
                name: "A".to_string(),
                category: "Pump".to_string(),
                flowrate: 1e-9,
                pressure: 123456.789,
                temperature: -40.0,
            },
        ];
        let mut input = draft("rows.csv");
        input.rows = rows.clone();

        let created = store.create(input).unwrap();
        assert_eq!(store.get(created.id).unwrap().rows, rows);
    }

    #[test]
    fn test_concurrent_creates_never_exceed_retention() {
        let store = Arc::new(DatasetStore::in_memory(5));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..4 {
                        store.create(draft(&format!("{i}-{j}.csv"))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let all = store.list_recent(usize::MAX).unwrap();
        assert_eq!(all.len(), 5);
        assert!(all.iter().any(|d| d.id == 64));
    }

    #[test]
    fn test_fs_store_prunes_files_and_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = DatasetStore::open(dir.path(), 5)
                .unwrap()
                .with_clock(ticking_clock());
            for i in 0..7 {
                store.create(draft(&format!("{i}.csv"))).unwrap();
            }
        }

        let files = std::fs::read_dir(dir.path().join("datasets")).unwrap().count();
        assert_eq!(files, 5);

        let store = DatasetStore::open(dir.path(), 5).unwrap();
        let recent: Vec<u64> = store.list_recent(5).unwrap().iter().map(|d| d.id).collect();
        assert_eq!(recent, vec![7, 6, 5, 4, 3]);
        assert!(matches!(store.get(2), Err(StoreError::NotFound(2))));
    }

    #[test]
    fn test_open_applies_lowered_retention() {
        let dir = TempDir::new().unwrap();
        {
            let store = DatasetStore::open(dir.path(), 5)
                .unwrap()
                .with_clock(ticking_clock());
            for i in 0..4 {
                store.create(draft(&format!("{i}.csv"))).unwrap();
            }
        }

        let store = DatasetStore::open(dir.path(), 2).unwrap();
        let recent: Vec<u64> = store.list_recent(5).unwrap().iter().map(|d| d.id).collect();
        assert_eq!(recent, vec![4, 3]);
    }

    #[test]
    fn test_corrupt_record_does_not_stop_retention() {
        let dir = TempDir::new().unwrap();
        let store = DatasetStore::open(dir.path(), 5)
            .unwrap()
            .with_clock(ticking_clock());
        let datasets_dir = dir.path().join("datasets");
        std::fs::write(datasets_dir.join("1000.json"), "not json").unwrap();

        for i in 0..8 {
            store.create(draft(&format!("{i}.csv"))).unwrap();
        }

        let records = std::fs::read_dir(&datasets_dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
            .count();
        assert_eq!(records, 5);
        assert!(datasets_dir.join("1000.corrupt").exists());

        let recent: Vec<u64> = store.list_recent(5).unwrap().iter().map(|d| d.id).collect();
        assert_eq!(recent, vec![8, 7, 6, 5, 4]);
    }

    /// Memory backend whose listing always fails, so pruning cannot run.
    struct UnlistableBackend(MemoryBackend);

    impl Backend for UnlistableBackend {
        fn allocate_id(&mut self) -> Result<u64, StoreError> {
            self.0.allocate_id()
        }

        fn insert(&mut self, dataset: &Dataset) -> Result<(), StoreError> {
            self.0.insert(dataset)
        }

        fn fetch(&self, id: u64) -> Result<Option<Dataset>, StoreError> {
            self.0.fetch(id)
        }

        fn remove(&mut self, id: u64) -> Result<(), StoreError> {
            self.0.remove(id)
        }

        fn load_all(&self) -> Result<Vec<Dataset>, StoreError> {
            Err(StoreError::io(
                "datasets",
                std::io::Error::new(std::io::ErrorKind::Other, "listing failed"),
            ))
        }
    }

    #[test]
    fn test_failed_prune_discards_new_dataset() {
        let store = DatasetStore::new(UnlistableBackend(MemoryBackend::new()), 5);

        let err = store.create(draft("a.csv")).unwrap_err();

        assert!(matches!(err, StoreError::Io { .. }));
        assert!(matches!(store.get(1), Err(StoreError::NotFound(1))));
    }

    #[test]
    fn test_non_finite_aggregates_are_rejected() {
        let store = DatasetStore::in_memory(5);
        let mut input = draft("huge.csv");
        input.aggregates.average_flowrate = f64::INFINITY;

        assert!(matches!(
            store.create(input),
            Err(StoreError::NonFiniteAggregates)
        ));
        assert!(store.list_recent(5).unwrap().is_empty());
        assert_eq!(store.create(draft("ok.csv")).unwrap().id, 1);
    }
}
