use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::ids::AssignmentId;

/// Completion state of a single test day.
///
/// Transitions only move forward: `Empty -> Partial -> Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayState {
    Empty,
    Partial,
    Complete,
}

/// Artifacts submitted by a tester for one day of an assignment.
///
/// Completion is derived from the artifacts on every read; it is never
/// stored as a flag that could disagree with them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayRecord {
    assignment_id: AssignmentId,
    day: u32,
    screenshot_url: Option<String>,
    feedback: Option<String>,
    completed_at: Option<DateTime<Utc>>,
}

/// Blank strings count as absent.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl DayRecord {
    /// Placeholder for a day with no submissions yet.
    #[must_use]
    pub fn empty(assignment_id: AssignmentId, day: u32) -> Self {
        Self {
            assignment_id,
            day,
            screenshot_url: None,
            feedback: None,
            completed_at: None,
        }
    }

    /// Rehydrate a day record from storage.
    ///
    /// `completed_at` is dropped when the artifacts do not make the day
    /// complete.
    #[must_use]
    pub fn from_persisted(
        assignment_id: AssignmentId,
        day: u32,
        screenshot_url: Option<String>,
        feedback: Option<String>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        let mut record = Self {
            assignment_id,
            day,
            screenshot_url: present(screenshot_url),
            feedback: present(feedback),
            completed_at: None,
        };
        if record.is_completed() {
            record.completed_at = completed_at;
        }
        record
    }

    #[must_use]
    pub fn assignment_id(&self) -> AssignmentId {
        self.assignment_id
    }

    #[must_use]
    pub fn day(&self) -> u32 {
        self.day
    }

    #[must_use]
    pub fn screenshot_url(&self) -> Option<&str> {
        self.screenshot_url.as_deref()
    }

    #[must_use]
    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.screenshot_url.is_some() && self.feedback.is_some()
    }

    #[must_use]
    pub fn state(&self) -> DayState {
        match (self.screenshot_url.is_some(), self.feedback.is_some()) {
            (true, true) => DayState::Complete,
            (false, false) => DayState::Empty,
            _ => DayState::Partial,
        }
    }

    /// Returns a copy with the screenshot replaced. Blank values leave the
    /// current screenshot in place.
    #[must_use]
    pub fn with_screenshot(mut self, url: impl Into<String>) -> Self {
        if let Some(url) = present(Some(url.into())) {
            self.screenshot_url = Some(url);
        }
        self
    }

    /// Returns a copy with the feedback replaced. Blank values leave the
    /// current feedback in place.
    #[must_use]
    pub fn with_feedback(mut self, text: impl Into<String>) -> Self {
        if let Some(text) = present(Some(text.into())) {
            self.feedback = Some(text);
        }
        self
    }

    pub(crate) fn set_completed_at(&mut self, at: Option<DateTime<Utc>>) {
        self.completed_at = at;
    }
}
