//! Schemaless document store and the typed boundary in front of it.
//!
//! The remote backend keeps assignments and day records as loosely shaped
//! JSON documents whose fields may be missing or carry legacy names. Every
//! read converts a document into a domain type exactly once, here, so no
//! caller has to default individual fields.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use testsync_core::model::{AssignmentId, CampaignId, DayRecord, TestAssignment, TesterId};
use testsync_core::time::from_millis;

use crate::repository::{
    AssignmentRepository, DayRecordRepository, NewAssignmentRecord, Storage, StorageError,
};

/// Window length used when an assignment document has no `totalDays`.
pub const DEFAULT_TOTAL_DAYS: u32 = 14;

const ASSIGNMENTS: &str = "assignments";

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn missing(field: &'static str) -> StorageError {
    StorageError::Serialization(format!("missing field: {field}"))
}

fn timestamp(field: &'static str, millis: i64) -> Result<DateTime<Utc>, StorageError> {
    from_millis(millis)
        .ok_or_else(|| StorageError::Serialization(format!("{field} out of range: {millis}")))
}

//
// ─── DOCUMENT SHAPES ───────────────────────────────────────────────────────────
//

/// Wire shape of an assignment document. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssignmentDocument {
    pub id: Option<u64>,
    pub tester_id: Option<u64>,
    pub campaign_id: Option<u64>,
    #[serde(alias = "pickedAt")]
    pub assigned_at: Option<i64>,
    pub total_days: Option<u32>,
    pub completed_days: Option<u32>,
}

impl From<&TestAssignment> for AssignmentDocument {
    fn from(a: &TestAssignment) -> Self {
        Self {
            id: Some(a.id().value()),
            tester_id: Some(a.tester_id().value()),
            campaign_id: Some(a.campaign_id().value()),
            assigned_at: Some(a.assigned_at().timestamp_millis()),
            total_days: Some(a.total_days()),
            completed_days: Some(a.completed_days()),
        }
    }
}

impl TryFrom<AssignmentDocument> for TestAssignment {
    type Error = StorageError;

    fn try_from(doc: AssignmentDocument) -> Result<Self, Self::Error> {
        let assigned_at = timestamp("assignedAt", doc.assigned_at.ok_or(missing("assignedAt"))?)?;
        let assignment = TestAssignment::from_persisted(
            AssignmentId::new(doc.id.ok_or(missing("id"))?),
            TesterId::new(doc.tester_id.ok_or(missing("testerId"))?),
            CampaignId::new(doc.campaign_id.ok_or(missing("campaignId"))?),
            assigned_at,
            doc.total_days.unwrap_or(DEFAULT_TOTAL_DAYS),
            doc.completed_days.unwrap_or(0),
        )?;
        Ok(assignment)
    }
}

/// Wire shape of a day record document.
///
/// `is_completed` is written for readers that want it, and ignored on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DayRecordDocument {
    pub assignment_id: Option<u64>,
    pub day: Option<u32>,
    pub screenshot_url: Option<String>,
    pub feedback: Option<String>,
    pub is_completed: Option<bool>,
    pub completed_at: Option<i64>,
}

impl From<&DayRecord> for DayRecordDocument {
    fn from(r: &DayRecord) -> Self {
        Self {
            assignment_id: Some(r.assignment_id().value()),
            day: Some(r.day()),
            screenshot_url: r.screenshot_url().map(str::to_owned),
            feedback: r.feedback().map(str::to_owned),
            is_completed: Some(r.is_completed()),
            completed_at: r.completed_at().map(|t| t.timestamp_millis()),
        }
    }
}

impl TryFrom<DayRecordDocument> for DayRecord {
    type Error = StorageError;

    fn try_from(doc: DayRecordDocument) -> Result<Self, Self::Error> {
        let completed_at = doc
            .completed_at
            .map(|ms| timestamp("completedAt", ms))
            .transpose()?;
        Ok(DayRecord::from_persisted(
            AssignmentId::new(doc.assignment_id.ok_or(missing("assignmentId"))?),
            doc.day.ok_or(missing("day"))?,
            doc.screenshot_url,
            doc.feedback,
            completed_at,
        ))
    }
}

/// Decode a raw assignment document.
///
/// # Errors
///
/// Returns `StorageError::Serialization` when the document is not an object,
/// a field has the wrong type, or a required field is missing.
pub fn assignment_from_value(value: Value) -> Result<TestAssignment, StorageError> {
    let doc: AssignmentDocument = serde_json::from_value(value).map_err(ser)?;
    TestAssignment::try_from(doc)
}

/// Decode a raw day record document.
///
/// # Errors
///
/// Returns `StorageError::Serialization` when the document cannot be decoded.
pub fn day_record_from_value(value: Value) -> Result<DayRecord, StorageError> {
    let doc: DayRecordDocument = serde_json::from_value(value).map_err(ser)?;
    DayRecord::try_from(doc)
}

//
// ─── STORE ─────────────────────────────────────────────────────────────────────
//

fn assignment_path(id: AssignmentId) -> String {
    format!("{ASSIGNMENTS}/{id}")
}

fn day_path(id: AssignmentId, day: u32) -> String {
    format!("{ASSIGNMENTS}/{id}/days/{day}")
}

fn days_prefix(id: AssignmentId) -> String {
    format!("{ASSIGNMENTS}/{id}/days/")
}

/// Top-level assignment path, i.e. `assignments/<id>` with no sub-collection.
fn is_assignment_path(path: &str) -> bool {
    path.strip_prefix("assignments/")
        .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
}

/// In-process stand-in for the remote document service.
///
/// Documents are stored as raw JSON under slash-separated paths. The store
/// can be switched offline to exercise fallback paths.
#[derive(Clone, Default)]
pub struct DocumentStore {
    docs: Arc<Mutex<BTreeMap<String, Value>>>,
    offline: Arc<AtomicBool>,
}

impl DocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every operation fails with `StorageError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Store a raw document, bypassing the typed boundary.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` while offline.
    pub fn put_raw(&self, path: impl Into<String>, value: Value) -> Result<(), StorageError> {
        self.check_online()?;
        self.lock()?.insert(path.into(), value);
        Ok(())
    }

    /// Read a raw document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` while offline.
    pub fn get_raw(&self, path: &str) -> Result<Option<Value>, StorageError> {
        self.check_online()?;
        Ok(self.lock()?.get(path).cloned())
    }

    fn check_online(&self) -> Result<(), StorageError> {
        if self.is_offline() {
            Err(StorageError::Unavailable("document store offline".into()))
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Value>>, StorageError> {
        self.docs
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn put_doc<T: Serialize>(&self, path: String, doc: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(doc).map_err(ser)?;
        self.put_raw(path, value)
    }
}

#[async_trait]
impl AssignmentRepository for DocumentStore {
    async fn insert_new_assignment(
        &self,
        record: NewAssignmentRecord,
    ) -> Result<AssignmentId, StorageError> {
        self.check_online()?;
        let next = {
            let guard = self.lock()?;
            guard
                .keys()
                .filter(|path| is_assignment_path(path))
                .filter_map(|path| path.rsplit('/').next()?.parse::<u64>().ok())
                .max()
                .unwrap_or(0)
                + 1
        };
        let id = AssignmentId::new(next);
        let assignment = TestAssignment::new(
            id,
            record.tester_id,
            record.campaign_id,
            record.assigned_at,
            record.total_days,
        )?;
        self.put_doc(assignment_path(id), &AssignmentDocument::from(&assignment))?;
        Ok(id)
    }

    async fn upsert_assignment(&self, assignment: &TestAssignment) -> Result<(), StorageError> {
        self.put_doc(
            assignment_path(assignment.id()),
            &AssignmentDocument::from(assignment),
        )
    }

    async fn raise_completed_days(
        &self,
        id: AssignmentId,
        day: u32,
    ) -> Result<u32, StorageError> {
        self.check_online()?;
        let path = assignment_path(id);
        let mut guard = self.lock()?;
        let value = guard.get(&path).cloned().ok_or(StorageError::NotFound)?;
        let mut assignment = assignment_from_value(value)?;
        if assignment.record_completed_day(day) {
            let doc = serde_json::to_value(AssignmentDocument::from(&assignment)).map_err(ser)?;
            guard.insert(path, doc);
        }
        Ok(assignment.completed_days())
    }

    async fn get_assignment(
        &self,
        id: AssignmentId,
    ) -> Result<Option<TestAssignment>, StorageError> {
        self.get_raw(&assignment_path(id))?
            .map(assignment_from_value)
            .transpose()
    }

    async fn list_for_tester(
        &self,
        tester_id: TesterId,
        limit: u32,
    ) -> Result<Vec<TestAssignment>, StorageError> {
        self.check_online()?;
        let docs: Vec<(String, Value)> = {
            let guard = self.lock()?;
            guard
                .iter()
                .filter(|(path, _)| is_assignment_path(path))
                .map(|(path, value)| (path.clone(), value.clone()))
                .collect()
        };

        let mut found = Vec::new();
        for (path, value) in docs {
            match assignment_from_value(value) {
                Ok(a) if a.tester_id() == tester_id => found.push(a),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(%path, error = %err, "skipping malformed assignment document");
                }
            }
        }
        found.sort_by_key(TestAssignment::id);
        found.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(found)
    }
}

#[async_trait]
impl DayRecordRepository for DocumentStore {
    async fn upsert_day_record(&self, record: &DayRecord) -> Result<(), StorageError> {
        self.put_doc(
            day_path(record.assignment_id(), record.day()),
            &DayRecordDocument::from(record),
        )
    }

    async fn get_day_record(
        &self,
        assignment_id: AssignmentId,
        day: u32,
    ) -> Result<Option<DayRecord>, StorageError> {
        let path = day_path(assignment_id, day);
        let Some(value) = self.get_raw(&path)? else {
            return Ok(None);
        };
        let record = day_record_from_value(value)?;
        if record.assignment_id() != assignment_id || record.day() != day {
            return Err(StorageError::Serialization(format!(
                "document at {path} holds day {} of assignment {}",
                record.day(),
                record.assignment_id()
            )));
        }
        Ok(Some(record))
    }

    async fn list_day_records(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Vec<DayRecord>, StorageError> {
        self.check_online()?;
        let prefix = days_prefix(assignment_id);
        let docs: Vec<Value> = {
            let guard = self.lock()?;
            guard
                .range(prefix.clone()..)
                .take_while(|(path, _)| path.starts_with(&prefix))
                .map(|(_, value)| value.clone())
                .collect()
        };

        let mut found = Vec::with_capacity(docs.len());
        for value in docs {
            let record = day_record_from_value(value)?;
            if record.assignment_id() != assignment_id {
                return Err(StorageError::Serialization(format!(
                    "day record of assignment {} filed under {prefix}",
                    record.assignment_id()
                )));
            }
            found.push(record);
        }
        found.sort_by_key(DayRecord::day);
        Ok(found)
    }
}

impl Storage {
    /// Build a `Storage` whose repositories share one document store.
    #[must_use]
    pub fn document(store: DocumentStore) -> Self {
        let assignments: Arc<dyn AssignmentRepository> = Arc::new(store.clone());
        let day_records: Arc<dyn DayRecordRepository> = Arc::new(store);
        Self {
            assignments,
            day_records,
        }
    }
}
