use thiserror::Error;

use crate::model::{AssignmentError, ParseIdError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Assignment(#[from] AssignmentError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
}
