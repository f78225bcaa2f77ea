use thiserror::Error;

use crate::domain::batch::FileStatus;

/// Payload construction failures. Required canonical fields must be present
/// before either payload side can be built; nothing is defaulted silently.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TranslationError {
    #[error("canonical record is missing required field `{0}`")]
    MissingField(&'static str),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("invalid file status transition from {from:?} to {to:?}")]
    InvalidTransition { from: FileStatus, to: FileStatus },
}
