use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{AssignmentId, CampaignId, TesterId};
use crate::progress;

/// Longest testing window a campaign may request.
pub const MAX_TOTAL_DAYS: u32 = 90;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssignmentError {
    #[error("total days must be between 1 and 90, got {0}")]
    InvalidTotalDays(u32),

    #[error("completed days ({completed}) exceeds total days ({total})")]
    CompletedDaysOutOfRange { completed: u32, total: u32 },
}

//
// ─── ASSIGNMENT ────────────────────────────────────────────────────────────────
//

/// A tester matched to a campaign for a fixed testing window.
///
/// `completed_days` is the highest day number confirmed complete, not a
/// count of completed days. The current test day is never stored; it is
/// recomputed from `assigned_at` on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestAssignment {
    id: AssignmentId,
    tester_id: TesterId,
    campaign_id: CampaignId,
    assigned_at: DateTime<Utc>,
    total_days: u32,
    completed_days: u32,
}

impl TestAssignment {
    /// Creates a fresh assignment with no completed days.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentError::InvalidTotalDays` if `total_days` is zero or
    /// longer than `MAX_TOTAL_DAYS`.
    pub fn new(
        id: AssignmentId,
        tester_id: TesterId,
        campaign_id: CampaignId,
        assigned_at: DateTime<Utc>,
        total_days: u32,
    ) -> Result<Self, AssignmentError> {
        Self::from_persisted(id, tester_id, campaign_id, assigned_at, total_days, 0)
    }

    /// Rehydrate an assignment from storage.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentError::InvalidTotalDays` for an invalid window, or
    /// `AssignmentError::CompletedDaysOutOfRange` if the counter overshoots it.
    pub fn from_persisted(
        id: AssignmentId,
        tester_id: TesterId,
        campaign_id: CampaignId,
        assigned_at: DateTime<Utc>,
        total_days: u32,
        completed_days: u32,
    ) -> Result<Self, AssignmentError> {
        if total_days == 0 || total_days > MAX_TOTAL_DAYS {
            return Err(AssignmentError::InvalidTotalDays(total_days));
        }
        if completed_days > total_days {
            return Err(AssignmentError::CompletedDaysOutOfRange {
                completed: completed_days,
                total: total_days,
            });
        }

        Ok(Self {
            id,
            tester_id,
            campaign_id,
            assigned_at,
            total_days,
            completed_days,
        })
    }

    #[must_use]
    pub fn id(&self) -> AssignmentId {
        self.id
    }

    #[must_use]
    pub fn tester_id(&self) -> TesterId {
        self.tester_id
    }

    #[must_use]
    pub fn campaign_id(&self) -> CampaignId {
        self.campaign_id
    }

    #[must_use]
    pub fn assigned_at(&self) -> DateTime<Utc> {
        self.assigned_at
    }

    #[must_use]
    pub fn total_days(&self) -> u32 {
        self.total_days
    }

    #[must_use]
    pub fn completed_days(&self) -> u32 {
        self.completed_days
    }

    /// The 1-based test day the tester is on at `now`, clamped to the window.
    #[must_use]
    pub fn current_day(&self, now: DateTime<Utc>) -> u32 {
        progress::current_day(self.assigned_at, now, self.total_days)
    }

    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        progress::progress_percent(self.completed_days, self.total_days)
    }

    #[must_use]
    pub fn contains_day(&self, day: u32) -> bool {
        (1..=self.total_days).contains(&day)
    }

    /// Raise `completed_days` to `day` when `day` is past the current value.
    ///
    /// Returns `true` if the counter moved. Never decreases the counter.
    pub fn record_completed_day(&mut self, day: u32) -> bool {
        let next = day.min(self.total_days);
        if next > self.completed_days {
            self.completed_days = next;
            true
        } else {
            false
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn build(total_days: u32) -> TestAssignment {
        TestAssignment::new(
            AssignmentId::new(1),
            TesterId::new(10),
            CampaignId::new(100),
            fixed_now(),
            total_days,
        )
        .unwrap()
    }

    #[test]
    fn rejects_empty_window() {
        let err = TestAssignment::new(
            AssignmentId::new(1),
            TesterId::new(1),
            CampaignId::new(1),
            fixed_now(),
            0,
        )
        .unwrap_err();
        assert_eq!(err, AssignmentError::InvalidTotalDays(0));
    }

    #[test]
    fn rejects_counter_past_window() {
        let err = TestAssignment::from_persisted(
            AssignmentId::new(1),
            TesterId::new(1),
            CampaignId::new(1),
            fixed_now(),
            7,
            8,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AssignmentError::CompletedDaysOutOfRange {
                completed: 8,
                total: 7
            }
        ));
    }

    #[test]
    fn current_day_follows_elapsed_time() {
        let assignment = build(7);
        assert_eq!(assignment.current_day(fixed_now()), 1);
        assert_eq!(assignment.current_day(fixed_now() + Duration::days(3)), 4);
        assert_eq!(assignment.current_day(fixed_now() + Duration::days(30)), 7);
    }

    #[test]
    fn record_completed_day_only_moves_forward() {
        let mut assignment = build(14);
        assert!(assignment.record_completed_day(5));
        assert!(!assignment.record_completed_day(3));
        assert!(!assignment.record_completed_day(5));
        assert_eq!(assignment.completed_days(), 5);
        assert_eq!(assignment.progress_percent(), 35);
    }

    #[test]
    fn record_completed_day_clamps_to_window() {
        let mut assignment = build(7);
        assert!(assignment.record_completed_day(12));
        assert_eq!(assignment.completed_days(), 7);
        assert_eq!(assignment.progress_percent(), 100);
    }

    #[test]
    fn contains_day_is_one_based() {
        let assignment = build(7);
        assert!(!assignment.contains_day(0));
        assert!(assignment.contains_day(1));
        assert!(assignment.contains_day(7));
        assert!(!assignment.contains_day(8));
    }
}
