mod assignment;
mod day_record;
mod ids;
mod notification;

pub use assignment::{AssignmentError, MAX_TOTAL_DAYS, TestAssignment};
pub use day_record::{DayRecord, DayState};
pub use ids::{AssignmentId, CampaignId, ParseIdError, TesterId};
pub use notification::{Notification, NotificationKind};
