//! Parses every pending file in a batch. Workbook decoding is CPU bound,
//! so each file runs on the blocking pool and the results are folded back
//! into the batch in one pass.

use tokio::task::JoinSet;
use tracing::warn;

use quotebridge_core::{BatchContext, FileStatus, ParsedQuoteRecord, ProductCatalog};
use quotebridge_ingest::{parse_quote_workbook, ParseError};

pub async fn ingest_batch(batch: &mut BatchContext, catalog: &ProductCatalog) {
    let mut tasks: JoinSet<(usize, Result<ParsedQuoteRecord, ParseError>)> = JoinSet::new();

    for index in 0..batch.len() {
        let Some(file) = batch.get(index) else { continue };
        if file.status != FileStatus::Pending {
            continue;
        }

        let payload = file.payload.clone();
        let catalog = catalog.clone();
        tasks.spawn_blocking(move || (index, parse_quote_workbook(&payload, &catalog)));
    }

    while let Some(joined) = tasks.join_next().await {
        let (index, outcome) = match joined {
            Ok(result) => result,
            Err(error) => {
                warn!(error = %error, "parse task panicked");
                continue;
            }
        };

        let Some(file) = batch.get(index) else { continue };
        let mut file = file.clone();
        match outcome {
            Ok(record) => {
                file.record = Some(record);
                let _ = file.transition_to(FileStatus::Ready);
            }
            Err(error) => {
                warn!(file = %file.file_name, error = %error, "failed to parse workbook");
                let _ = file.fail(error.to_string());
            }
        }
        batch.replace(index, file);
    }
}

#[cfg(test)]
mod tests {
    use quotebridge_core::{BatchContext, FileStatus, ProductCatalog, UploadedFile};

    use super::ingest_batch;

    #[tokio::test]
    async fn undecodable_payload_marks_the_file_failed() {
        let mut batch = BatchContext::default();
        batch.push(UploadedFile::new("broken.xlsx", b"not a zip archive".to_vec()));

        ingest_batch(&mut batch, &ProductCatalog::default()).await;

        let file = batch.get(0).expect("file still in batch");
        assert_eq!(file.status, FileStatus::Error);
        assert!(file.error.is_some());
        assert!(file.record.is_none());
    }

    #[tokio::test]
    async fn non_pending_files_are_left_untouched() {
        let mut file = UploadedFile::new("done.xlsx", vec![]);
        file.transition_to(FileStatus::Ready).expect("pending -> ready");

        let mut batch = BatchContext::default();
        batch.push(file);

        ingest_batch(&mut batch, &ProductCatalog::default()).await;
        assert_eq!(batch.get(0).map(|file| file.status), Some(FileStatus::Ready));
    }
}
