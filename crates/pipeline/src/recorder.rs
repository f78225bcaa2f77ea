//! Posts one history entry per submission attempt. A failure to persist
//! history is logged and swallowed: the trail is best effort and must
//! never change the outcome of a run that already happened.

use chrono::Utc;
use tracing::warn;

use quotebridge_bitrix::AuditApi;
use quotebridge_core::history::{HistoryEntry, OperationKind, RunOutcome};
use quotebridge_core::ParsedQuoteRecord;

pub async fn record_outcome(
    audit: &dyn AuditApi,
    record: &ParsedQuoteRecord,
    operator: &str,
    outcome: RunOutcome,
    operation: Option<OperationKind>,
    quote_id: Option<String>,
    error: Option<String>,
) {
    let entry = HistoryEntry::from_record(
        record,
        operator,
        outcome,
        operation,
        quote_id,
        error,
        Utc::now(),
    );

    if let Err(persist_error) = audit.record(&entry).await {
        warn!(
            deal_number = %record.deal_number,
            error = %persist_error,
            "failed to persist history entry"
        );
    }
}
