//! Inbox grouping by calendar day.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;

use crate::model::Notification;

/// Heading for a group of notifications received on the same UTC date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "label", content = "date", rename_all = "snake_case")]
pub enum DateLabel {
    Today,
    Yesterday,
    On(NaiveDate),
}

impl DateLabel {
    fn for_date(date: NaiveDate, today: NaiveDate) -> Self {
        if date == today {
            DateLabel::Today
        } else if today.checked_sub_days(Days::new(1)) == Some(date) {
            DateLabel::Yesterday
        } else {
            DateLabel::On(date)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationGroup {
    pub label: DateLabel,
    pub date: NaiveDate,
    pub items: Vec<Notification>,
}

/// Group notifications by the UTC date they were created on.
///
/// Groups are ordered newest date first, and items inside a group newest
/// first. Notifications dated after `now` land in whatever group their own
/// date gives them.
#[must_use]
pub fn group_by_date(
    notifications: impl IntoIterator<Item = Notification>,
    now: DateTime<Utc>,
) -> Vec<NotificationGroup> {
    let today = now.date_naive();
    let mut by_date: BTreeMap<NaiveDate, Vec<Notification>> = BTreeMap::new();
    for n in notifications {
        by_date.entry(n.created_at.date_naive()).or_default().push(n);
    }

    by_date
        .into_iter()
        .rev()
        .map(|(date, mut items)| {
            items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            NotificationGroup {
                label: DateLabel::for_date(date, today),
                date,
                items,
            }
        })
        .collect()
}

#[must_use]
pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.read).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NotificationKind;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn note(id: &str, at: DateTime<Utc>) -> Notification {
        Notification::new(id, NotificationKind::DayReminder, "Reminder", "Submit today", at)
    }

    #[test]
    fn groups_today_yesterday_and_older() {
        // fixed_now() is 22:13 UTC, so one hour earlier is still today.
        let now = fixed_now();
        let groups = group_by_date(
            vec![
                note("old", now - Duration::days(5)),
                note("today-early", now - Duration::hours(1)),
                note("yesterday", now - Duration::days(1)),
                note("today-late", now),
            ],
            now,
        );

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].label, DateLabel::Today);
        assert_eq!(groups[0].items[0].id, "today-late");
        assert_eq!(groups[0].items[1].id, "today-early");
        assert_eq!(groups[1].label, DateLabel::Yesterday);
        assert_eq!(
            groups[2].label,
            DateLabel::On((now - Duration::days(5)).date_naive())
        );
    }

    #[test]
    fn empty_inbox_has_no_groups() {
        assert!(group_by_date(Vec::new(), fixed_now()).is_empty());
    }

    #[test]
    fn counts_unread() {
        let mut read = note("a", fixed_now());
        read.read = true;
        let unread = note("b", fixed_now());
        assert_eq!(unread_count(&[read, unread]), 1);
    }
}
