use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use storage::repository::{AssignmentRepository, DayRecordRepository};
use testsync_core::model::{DayState, Notification, NotificationKind, TestAssignment, TesterId};
use testsync_core::notifications::{NotificationGroup, group_by_date, unread_count};
use testsync_core::progress::{AssignmentProgress, elapsed_days};

use crate::Clock;
use crate::error::InboxServiceError;

/// A tester's notifications, grouped by day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inbox {
    pub unread: usize,
    pub groups: Vec<NotificationGroup>,
}

/// Builds the inbox from assignment and day record state.
///
/// Notifications are not stored. Anything created before today's UTC date
/// counts as read.
#[derive(Clone)]
pub struct InboxService {
    clock: Clock,
    assignments: Arc<dyn AssignmentRepository>,
    day_records: Arc<dyn DayRecordRepository>,
}

impl InboxService {
    #[must_use]
    pub fn new(
        clock: Clock,
        assignments: Arc<dyn AssignmentRepository>,
        day_records: Arc<dyn DayRecordRepository>,
    ) -> Self {
        Self {
            clock,
            assignments,
            day_records,
        }
    }

    /// Inbox over the tester's first `limit` assignments.
    ///
    /// # Errors
    ///
    /// Returns `InboxServiceError::Storage` if repository access fails.
    pub async fn inbox(
        &self,
        tester_id: TesterId,
        limit: u32,
    ) -> Result<Inbox, InboxServiceError> {
        let now = self.clock.now();
        let mut notifications = Vec::new();
        for assignment in self.assignments.list_for_tester(tester_id, limit).await? {
            let records = self.day_records.list_day_records(assignment.id()).await?;
            let progress = AssignmentProgress::derive(&assignment, &records, now);
            notifications.extend(notifications_for(&assignment, &progress, now));
        }

        let today = now.date_naive();
        for n in &mut notifications {
            n.read = n.created_at.date_naive() < today;
        }

        tracing::debug!(%tester_id, count = notifications.len(), "inbox built");
        Ok(Inbox {
            unread: unread_count(&notifications),
            groups: group_by_date(notifications, now),
        })
    }
}

fn notifications_for(
    assignment: &TestAssignment,
    progress: &AssignmentProgress,
    now: DateTime<Utc>,
) -> Vec<Notification> {
    let id = assignment.id();
    let campaign = assignment.campaign_id();
    let mut out = vec![Notification::new(
        format!("assigned-{id}"),
        NotificationKind::TestAssigned,
        "New test assigned",
        format!("Campaign {campaign}: {} day window", assignment.total_days()),
        assignment.assigned_at(),
    )];

    let done: Vec<(u32, DateTime<Utc>)> = progress
        .days
        .iter()
        .filter(|d| d.state == DayState::Complete)
        .filter_map(|d| d.completed_at.map(|at| (d.day, at)))
        .collect();
    for (day, at) in &done {
        out.push(Notification::new(
            format!("day-{id}-{day}"),
            NotificationKind::FeedbackReceived,
            format!("Day {day} submitted"),
            format!("Campaign {campaign}: screenshot and feedback received"),
            *at,
        ));
    }

    let all_done = progress
        .days
        .iter()
        .all(|d| d.state == DayState::Complete);
    if all_done {
        if let Some(at) = done.iter().map(|(_, at)| *at).max() {
            out.push(Notification::new(
                format!("completed-{id}"),
                NotificationKind::CampaignCompleted,
                "Test completed",
                format!("Campaign {campaign}: all {} days done", assignment.total_days()),
                at,
            ));
        }
        return out;
    }

    let elapsed = elapsed_days(assignment.assigned_at(), now);
    let in_window = (0..i64::from(assignment.total_days())).contains(&elapsed);
    if in_window && !progress.today_complete {
        out.push(Notification::new(
            format!("reminder-{id}-{}", progress.current_day),
            NotificationKind::DayReminder,
            format!("Day {} due", progress.current_day),
            format!("Campaign {campaign}: submit a screenshot and feedback today"),
            now,
        ));
    }
    out
}
