#![forbid(unsafe_code)]

pub mod app_services;
pub mod assignment_service;
pub mod error;
pub mod inbox_service;
pub mod progress_service;
pub mod submission_service;

pub use testsync_core::Clock;

pub use app_services::AppServices;
pub use assignment_service::AssignmentService;
pub use error::{
    AppServicesError, AssignmentServiceError, InboxServiceError, ProgressServiceError,
    SubmissionError,
};
pub use inbox_service::{Inbox, InboxService};
pub use progress_service::ProgressService;
pub use submission_service::{SubmissionResult, SubmissionService};
