//! Derived testing progress: current day, completed days, percentage.
//!
//! Everything here is a pure function of its inputs. Nothing is cached; the
//! values are recomputed from the stored assignment and day records on every
//! read so a partially applied write corrects itself on the next load.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::completion::cascade_completed_days;
use crate::model::{AssignmentId, DayRecord, DayState, TestAssignment};
use crate::time::MILLIS_PER_DAY;

/// Whole days elapsed between `assigned_at` and `now`, floored.
///
/// Negative when `now` is before `assigned_at`.
#[must_use]
pub fn elapsed_days(assigned_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    now.signed_duration_since(assigned_at)
        .num_milliseconds()
        .div_euclid(MILLIS_PER_DAY)
}

/// The 1-based test day at `now`, clamped to `[1, max_days]`.
///
/// Clock skew (`now` before `assigned_at`) yields day 1, and a window that
/// has run out stays on `max_days`. A `max_days` of zero is treated as one.
///
/// ```
/// # use chrono::Duration;
/// # use testsync_core::progress::current_day;
/// # use testsync_core::time::fixed_now;
/// let start = fixed_now();
/// assert_eq!(current_day(start, start + Duration::days(3), 7), 4);
/// assert_eq!(current_day(start, start + Duration::days(10), 7), 7);
/// ```
#[must_use]
pub fn current_day(assigned_at: DateTime<Utc>, now: DateTime<Utc>, max_days: u32) -> u32 {
    let max_days = max_days.max(1);
    let day = elapsed_days(assigned_at, now)
        .saturating_add(1)
        .clamp(1, i64::from(max_days));
    u32::try_from(day).unwrap_or(max_days)
}

/// Integer percentage of the window covered by `completed_days`, floored.
#[must_use]
pub fn progress_percent(completed_days: u32, total_days: u32) -> u8 {
    if total_days == 0 {
        return 0;
    }
    let pct = u64::from(completed_days.min(total_days)) * 100 / u64::from(total_days);
    u8::try_from(pct).unwrap_or(100)
}

/// Display status of one day in the testing window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayStatus {
    pub day: u32,
    pub state: DayState,
    pub has_screenshot: bool,
    pub has_feedback: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_current: bool,
}

/// Progress snapshot for an assignment, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentProgress {
    pub assignment_id: AssignmentId,
    pub current_day: u32,
    pub total_days: u32,
    pub completed_days: u32,
    pub percent: u8,
    pub today_complete: bool,
    pub days: Vec<DayStatus>,
}

impl AssignmentProgress {
    /// Build the snapshot from the assignment and whatever day records exist.
    ///
    /// Missing days are reported as `Empty`. Records outside the window are
    /// ignored. `completed_days` is the larger of the stored counter and the
    /// highest complete day found in `records`.
    #[must_use]
    pub fn derive(assignment: &TestAssignment, records: &[DayRecord], now: DateTime<Utc>) -> Self {
        let total_days = assignment.total_days();
        let current = assignment.current_day(now);

        let days: Vec<DayStatus> = (1..=total_days)
            .map(|day| {
                let placeholder;
                let record = match records.iter().find(|r| r.day() == day) {
                    Some(r) => r,
                    None => {
                        placeholder = DayRecord::empty(assignment.id(), day);
                        &placeholder
                    }
                };
                DayStatus {
                    day,
                    state: record.state(),
                    has_screenshot: record.screenshot_url().is_some(),
                    has_feedback: record.feedback().is_some(),
                    completed_at: record.completed_at(),
                    is_current: day == current,
                }
            })
            .collect();

        let completed_days = cascade_completed_days(
            assignment.completed_days(),
            days.iter()
                .filter(|d| d.state == DayState::Complete)
                .map(|d| d.day),
        );
        let today_complete = days
            .iter()
            .any(|d| d.is_current && d.state == DayState::Complete);

        Self {
            assignment_id: assignment.id(),
            current_day: current,
            total_days,
            completed_days,
            percent: progress_percent(completed_days, total_days),
            today_complete,
            days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CampaignId, TesterId};
    use crate::time::fixed_now;
    use chrono::Duration;

    const DAY_MS: i64 = MILLIS_PER_DAY;

    #[test]
    fn day_four_after_three_full_days() {
        let t = fixed_now();
        assert_eq!(current_day(t, t + Duration::milliseconds(3 * DAY_MS), 7), 4);
    }

    #[test]
    fn clamps_to_last_day_when_window_overruns() {
        let t = fixed_now();
        assert_eq!(current_day(t, t + Duration::milliseconds(10 * DAY_MS), 7), 7);
    }

    #[test]
    fn clock_skew_clamps_to_first_day() {
        let t = fixed_now();
        assert_eq!(current_day(t, t - Duration::milliseconds(1), 7), 1);
        assert_eq!(current_day(t, t - Duration::days(40), 7), 1);
        assert_eq!(elapsed_days(t, t - Duration::milliseconds(1)), -1);
    }

    #[test]
    fn day_boundary_is_exact() {
        let t = fixed_now();
        assert_eq!(current_day(t, t + Duration::milliseconds(DAY_MS - 1), 7), 1);
        assert_eq!(current_day(t, t + Duration::milliseconds(DAY_MS), 7), 2);
    }

    #[test]
    fn zero_max_days_does_not_panic() {
        let t = fixed_now();
        assert_eq!(current_day(t, t + Duration::days(5), 0), 1);
    }

    #[test]
    fn day_index_stays_in_range_and_never_decreases() {
        let t = fixed_now();
        for max_days in [1_u32, 7, 14, 28] {
            let mut previous = 0;
            for hours in (-48_i64..=24 * 40).step_by(7) {
                let day = current_day(t, t + Duration::hours(hours), max_days);
                assert!((1..=max_days).contains(&day));
                assert!(day >= previous);
                previous = day;
            }
        }
    }

    #[test]
    fn percent_floors_and_caps() {
        assert_eq!(progress_percent(0, 7), 0);
        assert_eq!(progress_percent(3, 7), 42);
        assert_eq!(progress_percent(7, 7), 100);
        assert_eq!(progress_percent(9, 7), 100);
        assert_eq!(progress_percent(1, 0), 0);
    }

    fn assignment(completed_days: u32) -> TestAssignment {
        TestAssignment::from_persisted(
            AssignmentId::new(5),
            TesterId::new(1),
            CampaignId::new(2),
            fixed_now(),
            7,
            completed_days,
        )
        .unwrap()
    }

    #[test]
    fn derive_fills_missing_days_with_placeholders() {
        let records = vec![
            DayRecord::empty(AssignmentId::new(5), 2).with_screenshot("s2"),
            DayRecord::empty(AssignmentId::new(5), 9).with_screenshot("ignored"),
        ];
        let progress =
            AssignmentProgress::derive(&assignment(0), &records, fixed_now() + Duration::days(1));

        assert_eq!(progress.days.len(), 7);
        assert_eq!(progress.current_day, 2);
        assert_eq!(progress.days[0].state, DayState::Empty);
        assert_eq!(progress.days[1].state, DayState::Partial);
        assert!(progress.days[1].is_current);
        assert!(!progress.today_complete);
        assert_eq!(progress.completed_days, 0);
    }

    #[test]
    fn derive_heals_a_lagging_counter() {
        let records = vec![
            DayRecord::empty(AssignmentId::new(5), 3)
                .with_screenshot("s3")
                .with_feedback("ok"),
        ];
        let progress = AssignmentProgress::derive(&assignment(1), &records, fixed_now());

        assert_eq!(progress.completed_days, 3);
        assert_eq!(progress.percent, 42);
    }

    #[test]
    fn derive_keeps_a_counter_ahead_of_records() {
        let progress = AssignmentProgress::derive(&assignment(4), &[], fixed_now());
        assert_eq!(progress.completed_days, 4);
    }
}
