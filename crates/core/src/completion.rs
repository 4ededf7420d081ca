//! Per-day completion and the cascade into the assignment's counter.
//!
//! A day is complete once both a screenshot and a feedback entry are
//! present. When a day becomes complete its `completed_at` is stamped once,
//! and the parent assignment's `completed_days` is raised to that day index
//! if it is higher than the current value. The counter therefore tracks the
//! furthest day confirmed, not the number of complete days: finishing day 5
//! before day 3 moves it to 5.

use chrono::{DateTime, Utc};

use crate::model::{AssignmentId, DayRecord};

/// A single artifact submitted for a test day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Screenshot(String),
    Feedback(String),
}

/// Result of evaluating a day record after an artifact write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    /// The record to persist.
    pub record: DayRecord,
    /// True only on the write that moved the day to complete.
    pub newly_completed: bool,
    /// New value for the assignment's `completed_days`, when it must move.
    pub completed_days: Option<u32>,
}

impl CompletionOutcome {
    #[must_use]
    pub fn needs_cascade(&self) -> bool {
        self.completed_days.is_some()
    }
}

/// Evaluate `candidate` against the stored version of the same day.
///
/// `stored` is `None` when the day has never been written, which is the same
/// as an empty record. The stored `completed_at` is carried over when the
/// day was already complete; otherwise it is stamped with `now` on the
/// transition.
#[must_use]
pub fn evaluate(
    stored: Option<&DayRecord>,
    candidate: DayRecord,
    completed_days: u32,
    now: DateTime<Utc>,
) -> CompletionOutcome {
    let mut record = candidate;
    let was_completed = stored.is_some_and(DayRecord::is_completed);

    let newly_completed = record.is_completed() && !was_completed;
    if newly_completed {
        record.set_completed_at(Some(now));
    } else if was_completed {
        let previous = stored.and_then(DayRecord::completed_at).unwrap_or(now);
        record.set_completed_at(Some(previous));
    } else {
        record.set_completed_at(None);
    }

    let completed_days = (record.is_completed() && record.day() > completed_days)
        .then_some(record.day());

    CompletionOutcome {
        record,
        newly_completed,
        completed_days,
    }
}

/// Overlay one artifact onto the stored record (or an empty one) and
/// evaluate the result.
#[must_use]
pub fn apply_artifact(
    stored: Option<&DayRecord>,
    assignment_id: AssignmentId,
    day: u32,
    artifact: Artifact,
    completed_days: u32,
    now: DateTime<Utc>,
) -> CompletionOutcome {
    let base = stored
        .cloned()
        .unwrap_or_else(|| DayRecord::empty(assignment_id, day));
    let candidate = match artifact {
        Artifact::Screenshot(url) => base.with_screenshot(url),
        Artifact::Feedback(text) => base.with_feedback(text),
    };
    evaluate(stored, candidate, completed_days, now)
}

/// Fold the cascade rule over a sequence of completed day indices.
#[must_use]
pub fn cascade_completed_days(current: u32, days: impl IntoIterator<Item = u32>) -> u32 {
    days.into_iter().fold(current, u32::max)
}
