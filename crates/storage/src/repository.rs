use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use testsync_core::model::{
    AssignmentError, AssignmentId, CampaignId, DayRecord, TestAssignment, TesterId,
};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl From<AssignmentError> for StorageError {
    fn from(err: AssignmentError) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Insert shape for an assignment whose id is allocated by the backend.
#[derive(Debug, Clone)]
pub struct NewAssignmentRecord {
    pub tester_id: TesterId,
    pub campaign_id: CampaignId,
    pub assigned_at: DateTime<Utc>,
    pub total_days: u32,
}

impl NewAssignmentRecord {
    /// Build the record, validating the window the same way the domain does.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentError::InvalidTotalDays` for an empty or oversized window.
    pub fn new(
        tester_id: TesterId,
        campaign_id: CampaignId,
        assigned_at: DateTime<Utc>,
        total_days: u32,
    ) -> Result<Self, AssignmentError> {
        // Validate against a throwaway id so the window rules live in one place.
        TestAssignment::new(
            AssignmentId::new(0),
            tester_id,
            campaign_id,
            assigned_at,
            total_days,
        )?;
        Ok(Self {
            tester_id,
            campaign_id,
            assigned_at,
            total_days,
        })
    }

    fn into_assignment(self, id: AssignmentId) -> Result<TestAssignment, AssignmentError> {
        TestAssignment::new(
            id,
            self.tester_id,
            self.campaign_id,
            self.assigned_at,
            self.total_days,
        )
    }
}

/// Repository contract for tester assignments.
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Persist a new assignment and return the allocated ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the assignment cannot be stored.
    async fn insert_new_assignment(
        &self,
        record: NewAssignmentRecord,
    ) -> Result<AssignmentId, StorageError>;

    /// Persist or update an assignment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the assignment cannot be stored.
    async fn upsert_assignment(&self, assignment: &TestAssignment) -> Result<(), StorageError>;

    /// Raise `completed_days` to `day` (clamped to `total_days`) in one
    /// atomic step and return the stored value afterwards.
    ///
    /// The counter never decreases, whatever order concurrent calls land in.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the assignment does not exist.
    async fn raise_completed_days(
        &self,
        id: AssignmentId,
        day: u32,
    ) -> Result<u32, StorageError>;

    /// Fetch an assignment by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_assignment(
        &self,
        id: AssignmentId,
    ) -> Result<Option<TestAssignment>, StorageError>;

    /// List a tester's assignments ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list_for_tester(
        &self,
        tester_id: TesterId,
        limit: u32,
    ) -> Result<Vec<TestAssignment>, StorageError>;
}

/// Repository contract for per-day submissions.
#[async_trait]
pub trait DayRecordRepository: Send + Sync {
    /// Persist or replace the record for `(assignment_id, day)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_day_record(&self, record: &DayRecord) -> Result<(), StorageError>;

    /// Fetch the record for one day. `Ok(None)` when nothing was submitted yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_day_record(
        &self,
        assignment_id: AssignmentId,
        day: u32,
    ) -> Result<Option<DayRecord>, StorageError>;

    /// All stored records of an assignment ordered by day.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list_day_records(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Vec<DayRecord>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    assignments: Arc<Mutex<HashMap<AssignmentId, TestAssignment>>>,
    day_records: Arc<Mutex<HashMap<(AssignmentId, u32), DayRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl AssignmentRepository for InMemoryRepository {
    async fn insert_new_assignment(
        &self,
        record: NewAssignmentRecord,
    ) -> Result<AssignmentId, StorageError> {
        let mut guard = self.assignments.lock().map_err(poisoned)?;
        let next = guard.keys().map(AssignmentId::value).max().unwrap_or(0) + 1;
        let id = AssignmentId::new(next);
        guard.insert(id, record.into_assignment(id)?);
        Ok(id)
    }

    async fn upsert_assignment(&self, assignment: &TestAssignment) -> Result<(), StorageError> {
        let mut guard = self.assignments.lock().map_err(poisoned)?;
        guard.insert(assignment.id(), assignment.clone());
        Ok(())
    }

    async fn raise_completed_days(
        &self,
        id: AssignmentId,
        day: u32,
    ) -> Result<u32, StorageError> {
        let mut guard = self.assignments.lock().map_err(poisoned)?;
        let assignment = guard.get_mut(&id).ok_or(StorageError::NotFound)?;
        assignment.record_completed_day(day);
        Ok(assignment.completed_days())
    }

    async fn get_assignment(
        &self,
        id: AssignmentId,
    ) -> Result<Option<TestAssignment>, StorageError> {
        let guard = self.assignments.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_for_tester(
        &self,
        tester_id: TesterId,
        limit: u32,
    ) -> Result<Vec<TestAssignment>, StorageError> {
        let guard = self.assignments.lock().map_err(poisoned)?;
        let mut found: Vec<TestAssignment> = guard
            .values()
            .filter(|a| a.tester_id() == tester_id)
            .cloned()
            .collect();
        found.sort_by_key(TestAssignment::id);
        found.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(found)
    }
}

#[async_trait]
impl DayRecordRepository for InMemoryRepository {
    async fn upsert_day_record(&self, record: &DayRecord) -> Result<(), StorageError> {
        let mut guard = self.day_records.lock().map_err(poisoned)?;
        guard.insert((record.assignment_id(), record.day()), record.clone());
        Ok(())
    }

    async fn get_day_record(
        &self,
        assignment_id: AssignmentId,
        day: u32,
    ) -> Result<Option<DayRecord>, StorageError> {
        let guard = self.day_records.lock().map_err(poisoned)?;
        Ok(guard.get(&(assignment_id, day)).cloned())
    }

    async fn list_day_records(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Vec<DayRecord>, StorageError> {
        let guard = self.day_records.lock().map_err(poisoned)?;
        let mut found: Vec<DayRecord> = guard
            .values()
            .filter(|r| r.assignment_id() == assignment_id)
            .cloned()
            .collect();
        found.sort_by_key(DayRecord::day);
        Ok(found)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub assignments: Arc<dyn AssignmentRepository>,
    pub day_records: Arc<dyn DayRecordRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let assignments: Arc<dyn AssignmentRepository> = Arc::new(repo.clone());
        let day_records: Arc<dyn DayRecordRepository> = Arc::new(repo);
        Self {
            assignments,
            day_records,
        }
    }
}
