// crates/foresight-store/src/rocks.rs
//
// RocksDB-backed persistent storage for tasks and answers.
//
// Key format:
//   - Schema:    `meta:schema_version`            -> version string
//   - Task:      `task:{timestamp:020}`           -> JSON-serialized Task
//   - Pending:   `pending:{timestamp:020}`        -> empty value (index only)
//   - Answer:    `answer:{timestamp:020}:{peer}`  -> JSON-serialized Answer
//
// Timestamps are zero-padded so lexicographic key order is chronological.
// The pending index holds exactly the tasks whose observed value is still
// missing, so the earliest pending task is the first key under `pending:`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rocksdb::{DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options, WriteBatch};

use foresight_core::error::ForesightError;
use foresight_core::task::{Answer, ScoredAnswer, Task};
use foresight_core::traits::TaskStore;

const SCHEMA_KEY: &[u8] = b"meta:schema_version";
const SCHEMA_VERSION: &str = "1";

/// RocksDB wrapper implementing the `TaskStore` trait.
///
/// Reads go straight to RocksDB. Every read-modify-write path takes
/// `write_lock` so that duplicate checks and first-write-wins updates are
/// serialized across the validator loops.
#[derive(Debug)]
pub struct RocksStore {
    db: DBWithThreadMode<MultiThreaded>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open a RocksDB database at the given filesystem path and ensure the
    /// schema marker is present.
    ///
    /// Creates the database directory if it does not exist.
    pub fn open(path: &str) -> Result<Self, ForesightError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DBWithThreadMode::<MultiThreaded>::open(&opts, path).map_err(|e| {
            ForesightError::Storage(format!("Failed to open RocksDB at {}: {}", path, e))
        })?;

        let store = Self {
            db,
            write_lock: Mutex::new(()),
        };
        store.create_schema_sync()?;
        Ok(store)
    }

    fn task_key(timestamp: u64) -> Vec<u8> {
        format!("task:{:020}", timestamp).into_bytes()
    }

    fn pending_key(timestamp: u64) -> Vec<u8> {
        format!("pending:{:020}", timestamp).into_bytes()
    }

    fn answer_prefix(timestamp: u64) -> Vec<u8> {
        format!("answer:{:020}:", timestamp).into_bytes()
    }

    fn answer_key(timestamp: u64, peer_id: &str) -> Vec<u8> {
        format!("answer:{:020}:{}", timestamp, peer_id).into_bytes()
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, ForesightError> {
        self.write_lock
            .lock()
            .map_err(|_| ForesightError::Storage("store writer lock poisoned".to_string()))
    }

    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ForesightError> {
        self.db
            .get(key)
            .map_err(|e| ForesightError::Storage(format!("RocksDB get failed: {}", e)))
    }

    fn put_raw(&self, key: &[u8], value: &[u8]) -> Result<(), ForesightError> {
        self.db
            .put(key, value)
            .map_err(|e| ForesightError::Storage(format!("RocksDB put failed: {}", e)))
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), ForesightError> {
        self.db
            .write(batch)
            .map_err(|e| ForesightError::Storage(format!("RocksDB batch write failed: {}", e)))
    }

    /// Collect `(key, value)` pairs under `prefix`, starting at `from`
    /// (which must itself start with `prefix`).
    fn scan_from(
        &self,
        prefix: &[u8],
        from: &[u8],
    ) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>, ForesightError> {
        let mut rows = Vec::new();
        let iter = self.db.iterator(IteratorMode::From(from, Direction::Forward));
        for item in iter {
            let (key, value) = item
                .map_err(|e| ForesightError::Storage(format!("RocksDB iteration error: {}", e)))?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key, value));
        }
        Ok(rows)
    }

    fn create_schema_sync(&self) -> Result<(), ForesightError> {
        let _guard = self.lock()?;
        match self.get_raw(SCHEMA_KEY)? {
            Some(version) if version == SCHEMA_VERSION.as_bytes() => Ok(()),
            Some(version) => Err(ForesightError::DataIntegrity(format!(
                "unsupported schema version {}",
                String::from_utf8_lossy(&version)
            ))),
            None => self.put_raw(SCHEMA_KEY, SCHEMA_VERSION.as_bytes()),
        }
    }

    /// Get a task by timestamp.
    pub fn get_task(&self, timestamp: u64) -> Result<Option<Task>, ForesightError> {
        match self.get_raw(&Self::task_key(timestamp))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All answers recorded for one task, ordered by peer identity.
    pub fn answers_for_task(&self, timestamp: u64) -> Result<Vec<Answer>, ForesightError> {
        let prefix = Self::answer_prefix(timestamp);
        self.scan_from(&prefix, &prefix)?
            .into_iter()
            .map(|(_, value)| serde_json::from_slice(&value).map_err(ForesightError::from))
            .collect()
    }

    /// Number of tasks still waiting for their observed value.
    pub fn pending_count(&self) -> Result<usize, ForesightError> {
        Ok(self.scan_from(b"pending:", b"pending:")?.len())
    }

    pub fn insert_task_sync(
        &self,
        timestamp: u64,
        category: &str,
        instrument: &str,
    ) -> Result<Task, ForesightError> {
        let _guard = self.lock()?;
        let key = Self::task_key(timestamp);
        if self.get_raw(&key)?.is_some() {
            return Err(ForesightError::DuplicateTask(timestamp));
        }

        let task = Task::new(timestamp, category, instrument);
        let mut batch = WriteBatch::default();
        batch.put(&key, serde_json::to_vec(&task)?);
        // Secondary pending index (empty value; existence is the signal).
        batch.put(Self::pending_key(timestamp), b"");
        self.write_batch(batch)?;
        Ok(task)
    }

    pub fn record_answer_sync(
        &self,
        timestamp: u64,
        peer_id: &str,
        value: Option<f64>,
        category: &str,
        instrument: &str,
    ) -> Result<(), ForesightError> {
        let _guard = self.lock()?;
        let key = Self::answer_key(timestamp, peer_id);
        if self.get_raw(&key)?.is_some() {
            return Err(ForesightError::DuplicateAnswer {
                timestamp,
                peer_id: peer_id.to_string(),
            });
        }
        let answer = Answer::new(timestamp, peer_id, value, category, instrument);
        self.put_raw(&key, &serde_json::to_vec(&answer)?)
    }

    pub fn set_observed_value_sync(
        &self,
        timestamp: u64,
        category: &str,
        instrument: &str,
        value: f64,
    ) -> Result<bool, ForesightError> {
        if !value.is_finite() {
            return Err(ForesightError::DataIntegrity(format!(
                "refusing non-finite observed value for task {}",
                timestamp
            )));
        }

        let _guard = self.lock()?;
        let mut task = match self.get_task(timestamp)? {
            Some(task) if task.matches(timestamp, category, instrument) => task,
            Some(_) | None => {
                tracing::warn!(
                    "No task {} for {}/{}; observed value not stored",
                    timestamp,
                    category,
                    instrument
                );
                return Ok(false);
            }
        };
        if let Some(existing) = task.observed_value {
            tracing::debug!(
                "Task {} already observed at {}; keeping first value",
                timestamp,
                existing
            );
            return Ok(false);
        }

        task.observed_value = Some(value);
        let mut batch = WriteBatch::default();
        batch.put(Self::task_key(timestamp), serde_json::to_vec(&task)?);
        batch.delete(Self::pending_key(timestamp));
        self.write_batch(batch)?;
        Ok(true)
    }

    pub fn next_pending_task_sync(&self) -> Result<Option<Task>, ForesightError> {
        let prefix: &[u8] = b"pending:";
        let iter = self.db.iterator(IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item
                .map_err(|e| ForesightError::Storage(format!("RocksDB iteration error: {}", e)))?;
            if !key.starts_with(prefix) {
                break;
            }
            let timestamp = parse_timestamp(&key[prefix.len()..]).ok_or_else(|| {
                ForesightError::DataIntegrity(format!(
                    "bad pending key {}",
                    String::from_utf8_lossy(&key)
                ))
            })?;
            match self.get_task(timestamp)? {
                Some(task) => return Ok(Some(task)),
                None => {
                    tracing::warn!("Pending index entry {} has no task row; skipping", timestamp);
                }
            }
        }
        Ok(None)
    }

    pub fn tasks_and_answers_since_sync(
        &self,
        cutoff: u64,
    ) -> Result<BTreeMap<String, Vec<ScoredAnswer>>, ForesightError> {
        let mut tasks: HashMap<u64, Option<Task>> = HashMap::new();
        let mut grouped: BTreeMap<String, Vec<ScoredAnswer>> = BTreeMap::new();

        for (key, value) in self.scan_from(b"answer:", &Self::answer_prefix(cutoff))? {
            let answer: Answer = match serde_json::from_slice(&value) {
                Ok(answer) => answer,
                Err(e) => {
                    tracing::warn!(
                        "Skipping undecodable answer {}: {}",
                        String::from_utf8_lossy(&key),
                        e
                    );
                    continue;
                }
            };

            let task = match tasks.get(&answer.timestamp) {
                Some(cached) => cached.clone(),
                None => {
                    let loaded = self.get_task(answer.timestamp)?;
                    tasks.insert(answer.timestamp, loaded.clone());
                    loaded
                }
            };
            let Some(task) = task else {
                tracing::warn!(
                    "Answer from {} references missing task {}; skipping",
                    answer.peer_id,
                    answer.timestamp
                );
                continue;
            };
            let Some(observed_value) = task.observed_value else {
                continue;
            };

            grouped
                .entry(answer.peer_id)
                .or_default()
                .push(ScoredAnswer {
                    timestamp: task.timestamp,
                    category: task.category,
                    instrument: task.instrument,
                    predicted_value: answer.predicted_value,
                    observed_value,
                });
        }

        Ok(grouped)
    }
}

#[async_trait]
impl TaskStore for RocksStore {
    async fn create_schema(&self) -> Result<(), ForesightError> {
        self.create_schema_sync()
    }

    async fn insert_task(
        &self,
        timestamp: u64,
        category: &str,
        instrument: &str,
    ) -> Result<Task, ForesightError> {
        self.insert_task_sync(timestamp, category, instrument)
    }

    async fn record_answer(
        &self,
        timestamp: u64,
        peer_id: &str,
        value: Option<f64>,
        category: &str,
        instrument: &str,
    ) -> Result<(), ForesightError> {
        self.record_answer_sync(timestamp, peer_id, value, category, instrument)
    }

    async fn set_observed_value(
        &self,
        timestamp: u64,
        category: &str,
        instrument: &str,
        value: f64,
    ) -> Result<bool, ForesightError> {
        self.set_observed_value_sync(timestamp, category, instrument, value)
    }

    async fn next_pending_task(&self) -> Result<Option<Task>, ForesightError> {
        self.next_pending_task_sync()
    }

    async fn tasks_and_answers_since(
        &self,
        cutoff: u64,
    ) -> Result<BTreeMap<String, Vec<ScoredAnswer>>, ForesightError> {
        self.tasks_and_answers_since_sync(cutoff)
    }
}

/// Parse the zero-padded decimal timestamp segment of a key.
fn parse_timestamp(bytes: &[u8]) -> Option<u64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use foresight_core::task::NO_ANSWER;
    use uuid::Uuid;

    fn temp_db_path(label: &str) -> String {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("foresight_test_{}_{}", label, Uuid::now_v7()));
        path.to_string_lossy().to_string()
    }

    fn open_store(label: &str) -> RocksStore {
        RocksStore::open(&temp_db_path(label)).unwrap()
    }

    #[test]
    fn test_keys_sort_chronologically() {
        assert!(RocksStore::task_key(999) < RocksStore::task_key(1000));
        assert!(RocksStore::pending_key(9) < RocksStore::pending_key(10));
        assert!(RocksStore::answer_key(999, "z") < RocksStore::answer_key(1000, "a"));
    }

    #[tokio::test]
    async fn test_create_schema_is_idempotent() {
        let store = open_store("schema");
        store.create_schema().await.unwrap();
        store.create_schema().await.unwrap();
    }

    #[tokio::test]
    async fn test_reopen_keeps_rows() {
        let path = temp_db_path("reopen");
        {
            let store = RocksStore::open(&path).unwrap();
            store.insert_task(1000, "crypto", "BTCUSDT").await.unwrap();
        }
        let store = RocksStore::open(&path).unwrap();
        let task = store.get_task(1000).unwrap().unwrap();
        assert_eq!(task.instrument, "BTCUSDT");
        assert!(task.is_pending());
    }

    #[tokio::test]
    async fn test_duplicate_task_rejected() {
        let store = open_store("dup_task");
        store.insert_task(1000, "crypto", "BTCUSDT").await.unwrap();
        let err = store.insert_task(1000, "crypto", "ETHUSDT").await.unwrap_err();
        assert!(matches!(err, ForesightError::DuplicateTask(1000)));
        assert_eq!(store.get_task(1000).unwrap().unwrap().instrument, "BTCUSDT");
    }

    #[tokio::test]
    async fn test_absent_answer_stored_as_sentinel() {
        let store = open_store("sentinel");
        store.insert_task(1000, "crypto", "BTCUSDT").await.unwrap();
        store
            .record_answer(1000, "peer-b", None, "crypto", "BTCUSDT")
            .await
            .unwrap();
        let answers = store.answers_for_task(1000).unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].predicted_value, NO_ANSWER);
    }

    #[tokio::test]
    async fn test_duplicate_answer_keeps_first() {
        let store = open_store("dup_answer");
        store
            .record_answer(1000, "peer-a", Some(1.0), "crypto", "BTCUSDT")
            .await
            .unwrap();
        let err = store
            .record_answer(1000, "peer-a", Some(2.0), "crypto", "BTCUSDT")
            .await
            .unwrap_err();
        assert!(matches!(err, ForesightError::DuplicateAnswer { .. }));
        assert_eq!(store.answers_for_task(1000).unwrap()[0].predicted_value, 1.0);
    }

    #[tokio::test]
    async fn test_set_observed_value_first_write_wins() {
        let store = open_store("observed");
        store.insert_task(1000, "crypto", "BTCUSDT").await.unwrap();

        assert!(store
            .set_observed_value(1000, "crypto", "BTCUSDT", 65232.25)
            .await
            .unwrap());
        // Same value again: no-op.
        assert!(!store
            .set_observed_value(1000, "crypto", "BTCUSDT", 65232.25)
            .await
            .unwrap());
        // Different value: ignored.
        assert!(!store
            .set_observed_value(1000, "crypto", "BTCUSDT", 1.0)
            .await
            .unwrap());

        let task = store.get_task(1000).unwrap().unwrap();
        assert_eq!(task.observed_value, Some(65232.25));
        assert_eq!(store.pending_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_observed_value_unknown_task_is_noop() {
        let store = open_store("observed_missing");
        assert!(!store
            .set_observed_value(42, "crypto", "BTCUSDT", 1.0)
            .await
            .unwrap());

        store.insert_task(1000, "crypto", "BTCUSDT").await.unwrap();
        // Key mismatch on instrument.
        assert!(!store
            .set_observed_value(1000, "crypto", "ETHUSDT", 1.0)
            .await
            .unwrap());
        assert!(store.get_task(1000).unwrap().unwrap().is_pending());
    }

    #[tokio::test]
    async fn test_set_observed_value_rejects_nan() {
        let store = open_store("observed_nan");
        store.insert_task(1000, "crypto", "BTCUSDT").await.unwrap();
        assert!(store
            .set_observed_value(1000, "crypto", "BTCUSDT", f64::NAN)
            .await
            .is_err());
        assert!(store.get_task(1000).unwrap().unwrap().is_pending());
    }

    #[tokio::test]
    async fn test_next_pending_task_is_earliest() {
        let store = open_store("pending");
        assert_eq!(store.next_pending_task().await.unwrap(), None);

        store.insert_task(3000, "crypto", "BTCUSDT").await.unwrap();
        store.insert_task(1000, "crypto", "BTCUSDT").await.unwrap();
        store.insert_task(2000, "crypto", "BTCUSDT").await.unwrap();
        assert_eq!(store.next_pending_task().await.unwrap().unwrap().timestamp, 1000);

        store
            .set_observed_value(1000, "crypto", "BTCUSDT", 5.0)
            .await
            .unwrap();
        assert_eq!(store.next_pending_task().await.unwrap().unwrap().timestamp, 2000);
        assert_eq!(store.pending_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_join_filters_window_and_unobserved() {
        let store = open_store("join");
        for ts in [500u64, 1000, 2000] {
            store.insert_task(ts, "crypto", "BTCUSDT").await.unwrap();
            store
                .record_answer(ts, "peer-a", Some(100.0), "crypto", "BTCUSDT")
                .await
                .unwrap();
            store
                .record_answer(ts, "peer-b", None, "crypto", "BTCUSDT")
                .await
                .unwrap();
        }
        store.set_observed_value(500, "crypto", "BTCUSDT", 90.0).await.unwrap();
        store.set_observed_value(1000, "crypto", "BTCUSDT", 110.0).await.unwrap();
        // 2000 stays unobserved.

        let grouped = store.tasks_and_answers_since(1000).await.unwrap();
        assert_eq!(grouped.len(), 2);

        let a = &grouped["peer-a"];
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].timestamp, 1000);
        assert_eq!(a[0].observed_value, 110.0);
        assert_eq!(a[0].difference(), Some(10.0));

        let b = &grouped["peer-b"];
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].difference(), None);
    }

    #[tokio::test]
    async fn test_join_skips_orphan_answers() {
        let store = open_store("orphan");
        store
            .record_answer(1000, "peer-a", Some(1.0), "crypto", "BTCUSDT")
            .await
            .unwrap();
        let grouped = store.tasks_and_answers_since(0).await.unwrap();
        assert!(grouped.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_one_winner() {
        let store = std::sync::Arc::new(open_store("concurrent"));
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let instrument = format!("I{}", i);
                let result = store.insert_task(1000, "crypto", &instrument).await;
                result
            }));
        }
        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.pending_count().unwrap(), 1);
    }
}
