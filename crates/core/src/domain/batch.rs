use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::record::ParsedQuoteRecord;
use crate::errors::BatchError;

/// Per-file lifecycle. `Pending` files have not been parsed yet; only
/// `Ready` files may enter submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    Pending,
    Ready,
    Submitting,
    Success,
    Error,
}

/// One uploaded spreadsheet. Owned exclusively by the batch list; status is
/// mutated only through `transition_to`, by the ingest stage
/// (pending -> ready/error) and the orchestrator (ready -> submitting ->
/// success/error).
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub id: Uuid,
    pub file_name: String,
    pub payload: Vec<u8>,
    pub status: FileStatus,
    pub error: Option<String>,
    pub record: Option<ParsedQuoteRecord>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            payload,
            status: FileStatus::Pending,
            error: None,
            record: None,
        }
    }

    pub fn can_transition_to(&self, next: FileStatus) -> bool {
        matches!(
            (self.status, next),
            (FileStatus::Pending, FileStatus::Ready)
                | (FileStatus::Pending, FileStatus::Error)
                | (FileStatus::Ready, FileStatus::Submitting)
                | (FileStatus::Submitting, FileStatus::Ready)
                | (FileStatus::Submitting, FileStatus::Success)
                | (FileStatus::Submitting, FileStatus::Error)
                | (FileStatus::Error, FileStatus::Ready)
        )
    }

    pub fn transition_to(&mut self, next: FileStatus) -> Result<(), BatchError> {
        if self.can_transition_to(next) {
            self.status = next;
            if next != FileStatus::Error {
                self.error = None;
            }
            return Ok(());
        }

        Err(BatchError::InvalidTransition { from: self.status, to: next })
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), BatchError> {
        self.transition_to(FileStatus::Error)?;
        self.error = Some(message.into());
        Ok(())
    }
}

/// The batch of uploaded files, owned by the orchestrator. Files are
/// replaced as snapshots on transition rather than shared and mutated in
/// place.
#[derive(Debug, Default)]
pub struct BatchContext {
    files: Vec<UploadedFile>,
}

impl BatchContext {
    pub fn push(&mut self, file: UploadedFile) {
        self.files.push(file);
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&UploadedFile> {
        self.files.get(index)
    }

    /// Replace the file at `index` with an updated snapshot.
    pub fn replace(&mut self, index: usize, file: UploadedFile) {
        if index < self.files.len() {
            self.files[index] = file;
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<UploadedFile> {
        if index < self.files.len() {
            Some(self.files.remove(index))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FileStatus, UploadedFile};

    #[test]
    fn allows_submission_lifecycle() {
        let mut file = UploadedFile::new("q1.xlsx", vec![]);
        file.transition_to(FileStatus::Ready).expect("pending -> ready");
        file.transition_to(FileStatus::Submitting).expect("ready -> submitting");
        file.transition_to(FileStatus::Success).expect("submitting -> success");
        assert_eq!(file.status, FileStatus::Success);
    }

    #[test]
    fn blocks_submission_of_unparsed_file() {
        let mut file = UploadedFile::new("q1.xlsx", vec![]);
        let error =
            file.transition_to(FileStatus::Submitting).expect_err("pending -> submitting");
        assert!(matches!(error, crate::errors::BatchError::InvalidTransition { .. }));
    }

    #[test]
    fn failure_captures_message_and_retry_clears_it() {
        let mut file = UploadedFile::new("q1.xlsx", vec![]);
        file.transition_to(FileStatus::Ready).expect("pending -> ready");
        file.transition_to(FileStatus::Submitting).expect("ready -> submitting");
        file.fail("deal.update rejected").expect("submitting -> error");
        assert_eq!(file.error.as_deref(), Some("deal.update rejected"));

        // manual re-submission path
        file.transition_to(FileStatus::Ready).expect("error -> ready");
        assert!(file.error.is_none());
    }
}
