//! Read-through / write-through caching over a remote document source.
//!
//! Reads go to the remote first and copy successful results into the local
//! cache. When the remote fails, reads may fall back to whatever the cache
//! holds. Writes go to the remote first and only reach the cache once the
//! remote accepted them. There is no eviction and no staleness policy: the
//! cache holds the last value the remote returned or accepted.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use testsync_core::model::{AssignmentId, DayRecord, TestAssignment, TesterId};

use crate::repository::{
    AssignmentRepository, DayRecordRepository, NewAssignmentRecord, Storage, StorageError,
};

/// A keyed source of values, remote or local.
#[async_trait]
pub trait DocumentSource<K, V>: Send + Sync {
    async fn read(&self, key: &K) -> Result<Option<V>, StorageError>;

    async fn write(&self, key: &K, value: &V) -> Result<(), StorageError>;
}

/// Where a fetched value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Remote,
    Cache,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched<V> {
    pub value: V,
    pub origin: Origin,
}

/// Generic read-through / write-through cache over two document sources.
pub struct CachedRemoteStore<K, V> {
    name: &'static str,
    remote: Arc<dyn DocumentSource<K, V>>,
    local: Arc<dyn DocumentSource<K, V>>,
}

impl<K, V> Clone for CachedRemoteStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            remote: Arc::clone(&self.remote),
            local: Arc::clone(&self.local),
        }
    }
}

impl<K, V> CachedRemoteStore<K, V>
where
    K: Debug + Send + Sync,
    V: Send + Sync,
{
    #[must_use]
    pub fn new(
        name: &'static str,
        remote: Arc<dyn DocumentSource<K, V>>,
        local: Arc<dyn DocumentSource<K, V>>,
    ) -> Self {
        Self {
            name,
            remote,
            local,
        }
    }

    /// Read from the remote and copy a hit into the cache.
    ///
    /// A failed cache write is logged and does not fail the read.
    ///
    /// # Errors
    ///
    /// Returns the remote error unchanged.
    pub async fn fetch(&self, key: &K) -> Result<Fetched<Option<V>>, StorageError> {
        let value = self.remote.read(key).await?;
        if let Some(v) = &value {
            self.store_local(key, v).await;
        }
        Ok(Fetched {
            value,
            origin: Origin::Remote,
        })
    }

    /// Like `fetch`, but serve the cached value when the remote fails.
    ///
    /// # Errors
    ///
    /// Returns the remote error when the cache has nothing for `key` or
    /// cannot be read either.
    pub async fn fallback_on_error(&self, key: &K) -> Result<Fetched<Option<V>>, StorageError> {
        let remote_err = match self.fetch(key).await {
            Ok(fetched) => return Ok(fetched),
            Err(err) => err,
        };

        match self.local.read(key).await {
            Ok(Some(v)) => {
                tracing::warn!(
                    store = self.name,
                    ?key,
                    error = %remote_err,
                    "remote read failed, serving cached value"
                );
                Ok(Fetched {
                    value: Some(v),
                    origin: Origin::Cache,
                })
            }
            Ok(None) => Err(remote_err),
            Err(local_err) => {
                tracing::warn!(
                    store = self.name,
                    ?key,
                    error = %local_err,
                    "cache read failed after remote failure"
                );
                Err(remote_err)
            }
        }
    }

    /// Write to the remote, then to the cache.
    ///
    /// The cache is left untouched when the remote write fails. A failed
    /// cache write after a successful remote write is logged only.
    ///
    /// # Errors
    ///
    /// Returns the remote error unchanged.
    pub async fn write_through(&self, key: &K, value: &V) -> Result<(), StorageError> {
        self.remote.write(key, value).await?;
        self.store_local(key, value).await;
        Ok(())
    }

    /// Copy a value into the cache without touching the remote.
    pub async fn store_local(&self, key: &K, value: &V) {
        if let Err(err) = self.local.write(key, value).await {
            tracing::warn!(store = self.name, ?key, error = %err, "cache write failed");
        }
    }
}

//
// ─── REPOSITORY ADAPTERS ───────────────────────────────────────────────────────
//

/// Key of a day record: the owning assignment and the 1-based day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DayKey {
    pub assignment_id: AssignmentId,
    pub day: u32,
}

impl DayKey {
    #[must_use]
    pub fn of(record: &DayRecord) -> Self {
        Self {
            assignment_id: record.assignment_id(),
            day: record.day(),
        }
    }
}

struct AssignmentSource(Arc<dyn AssignmentRepository>);

#[async_trait]
impl DocumentSource<AssignmentId, TestAssignment> for AssignmentSource {
    async fn read(&self, key: &AssignmentId) -> Result<Option<TestAssignment>, StorageError> {
        self.0.get_assignment(*key).await
    }

    async fn write(&self, _key: &AssignmentId, value: &TestAssignment) -> Result<(), StorageError> {
        self.0.upsert_assignment(value).await
    }
}

struct DayRecordSource(Arc<dyn DayRecordRepository>);

#[async_trait]
impl DocumentSource<DayKey, DayRecord> for DayRecordSource {
    async fn read(&self, key: &DayKey) -> Result<Option<DayRecord>, StorageError> {
        self.0.get_day_record(key.assignment_id, key.day).await
    }

    async fn write(&self, _key: &DayKey, value: &DayRecord) -> Result<(), StorageError> {
        self.0.upsert_day_record(value).await
    }
}

/// Repositories backed by a remote store with a local read-through cache.
#[derive(Clone)]
pub struct CachedRepository {
    remote: Storage,
    local: Storage,
    assignments: CachedRemoteStore<AssignmentId, TestAssignment>,
    day_records: CachedRemoteStore<DayKey, DayRecord>,
}

impl CachedRepository {
    #[must_use]
    pub fn new(remote: Storage, local: Storage) -> Self {
        let assignments = CachedRemoteStore::new(
            "assignments",
            Arc::new(AssignmentSource(Arc::clone(&remote.assignments))),
            Arc::new(AssignmentSource(Arc::clone(&local.assignments))),
        );
        let day_records = CachedRemoteStore::new(
            "day_records",
            Arc::new(DayRecordSource(Arc::clone(&remote.day_records))),
            Arc::new(DayRecordSource(Arc::clone(&local.day_records))),
        );
        Self {
            remote,
            local,
            assignments,
            day_records,
        }
    }
}

#[async_trait]
impl AssignmentRepository for CachedRepository {
    async fn insert_new_assignment(
        &self,
        record: NewAssignmentRecord,
    ) -> Result<AssignmentId, StorageError> {
        let id = self
            .remote
            .assignments
            .insert_new_assignment(record.clone())
            .await?;
        let assignment = TestAssignment::new(
            id,
            record.tester_id,
            record.campaign_id,
            record.assigned_at,
            record.total_days,
        )?;
        self.assignments.store_local(&id, &assignment).await;
        Ok(id)
    }

    async fn upsert_assignment(&self, assignment: &TestAssignment) -> Result<(), StorageError> {
        self.assignments
            .write_through(&assignment.id(), assignment)
            .await
    }

    async fn raise_completed_days(&self, id: AssignmentId, day: u32) -> Result<u32, StorageError> {
        let raised = self
            .remote
            .assignments
            .raise_completed_days(id, day)
            .await?;
        if let Err(err) = self.local.assignments.raise_completed_days(id, raised).await {
            tracing::warn!(%id, error = %err, "cache counter update failed");
        }
        Ok(raised)
    }

    async fn get_assignment(
        &self,
        id: AssignmentId,
    ) -> Result<Option<TestAssignment>, StorageError> {
        Ok(self.assignments.fallback_on_error(&id).await?.value)
    }

    async fn list_for_tester(
        &self,
        tester_id: TesterId,
        limit: u32,
    ) -> Result<Vec<TestAssignment>, StorageError> {
        match self.remote.assignments.list_for_tester(tester_id, limit).await {
            Ok(found) => {
                for a in &found {
                    self.assignments.store_local(&a.id(), a).await;
                }
                Ok(found)
            }
            Err(remote_err) => {
                tracing::warn!(
                    %tester_id,
                    error = %remote_err,
                    "remote listing failed, using cache"
                );
                self.local
                    .assignments
                    .list_for_tester(tester_id, limit)
                    .await
                    .map_err(|_| remote_err)
            }
        }
    }
}

#[async_trait]
impl DayRecordRepository for CachedRepository {
    async fn upsert_day_record(&self, record: &DayRecord) -> Result<(), StorageError> {
        self.day_records
            .write_through(&DayKey::of(record), record)
            .await
    }

    async fn get_day_record(
        &self,
        assignment_id: AssignmentId,
        day: u32,
    ) -> Result<Option<DayRecord>, StorageError> {
        let key = DayKey { assignment_id, day };
        Ok(self.day_records.fallback_on_error(&key).await?.value)
    }

    async fn list_day_records(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Vec<DayRecord>, StorageError> {
        match self.remote.day_records.list_day_records(assignment_id).await {
            Ok(found) => {
                for r in &found {
                    self.day_records.store_local(&DayKey::of(r), r).await;
                }
                Ok(found)
            }
            Err(remote_err) => {
                tracing::warn!(
                    %assignment_id,
                    error = %remote_err,
                    "remote listing failed, using cache"
                );
                self.local
                    .day_records
                    .list_day_records(assignment_id)
                    .await
                    .map_err(|_| remote_err)
            }
        }
    }
}

impl Storage {
    /// Build a `Storage` that reads through `local` and writes through to `remote`.
    #[must_use]
    pub fn cached(remote: Storage, local: Storage) -> Self {
        let repo = CachedRepository::new(remote, local);
        let assignments: Arc<dyn AssignmentRepository> = Arc::new(repo.clone());
        let day_records: Arc<dyn DayRecordRepository> = Arc::new(repo);
        Self {
            assignments,
            day_records,
        }
    }
}
