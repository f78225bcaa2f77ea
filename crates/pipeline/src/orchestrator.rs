//! Drives one batch of parsed files through the four remote submission
//! steps. Files are isolated from each other: a failure marks its own file
//! and the batch moves on. Cancellation is checked between steps, never
//! mid-request.

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use quotebridge_bitrix::{resolve_quote_existence, AuditApi, CrmApi, CrmError};
use quotebridge_core::history::{OperationKind, RunOutcome};
use quotebridge_core::translate::engine::{
    build_deal_payload, build_quote_create_payload, build_quote_update_payload, product_rows,
    ResolvedAssignees, SubmitOptions,
};
use quotebridge_core::{
    BatchContext, EmployeeDirectory, FileStatus, ParsedQuoteRecord, ReferenceResolutionError,
    TranslationError,
};

use crate::recorder::record_outcome;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitStep {
    DealProducts,
    DealUpdate,
    QuoteWrite,
    QuoteProducts,
}

impl std::fmt::Display for SubmitStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::DealProducts => "deal product rows",
            Self::DealUpdate => "deal update",
            Self::QuoteWrite => "quote write",
            Self::QuoteProducts => "quote product rows",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Translation(#[from] TranslationError),
    #[error(transparent)]
    Reference(#[from] ReferenceResolutionError),
    #[error("step `{step}` failed: {source}")]
    Remote { step: SubmitStep, source: CrmError },
    #[error("submission was cancelled")]
    Cancelled,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// A failed run plus whatever branch context was already resolved, so the
/// audit entry can name the operation and the quote it touched.
struct SubmitFailure {
    error: SubmissionError,
    operation: Option<OperationKind>,
    quote_id: Option<String>,
}

impl SubmitFailure {
    fn early(error: impl Into<SubmissionError>) -> Self {
        Self { error: error.into(), operation: None, quote_id: None }
    }
}

pub struct SubmissionOrchestrator<'a> {
    crm: &'a dyn CrmApi,
    audit: &'a dyn AuditApi,
    directory: &'a EmployeeDirectory,
    operator: String,
}

impl<'a> SubmissionOrchestrator<'a> {
    pub fn new(
        crm: &'a dyn CrmApi,
        audit: &'a dyn AuditApi,
        directory: &'a EmployeeDirectory,
        operator: impl Into<String>,
    ) -> Self {
        Self { crm, audit, directory, operator: operator.into() }
    }

    /// Submits every `Ready` file in the batch. Cancelled files are left
    /// `Ready` and are not audited; everything that actually ran gets a
    /// history entry for either outcome.
    pub async fn submit_batch(
        &self,
        batch: &mut BatchContext,
        options: &SubmitOptions,
        cancel: &CancellationToken,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for index in 0..batch.len() {
            let Some(file) = batch.get(index) else { continue };
            if file.status != FileStatus::Ready {
                report.skipped += 1;
                continue;
            }
            if cancel.is_cancelled() {
                report.skipped += 1;
                continue;
            }

            let mut file = file.clone();
            let file_name = file.file_name.clone();
            if let Err(error) = file.transition_to(FileStatus::Submitting) {
                warn!(file = %file_name, error = %error, "file skipped");
                report.skipped += 1;
                continue;
            }

            let Some(record) = file.record.clone() else {
                let _ = file.fail("file has no parsed record");
                batch.replace(index, file);
                report.failed += 1;
                continue;
            };

            match self.submit_file(&record, options, cancel).await {
                Ok((operation, quote_id)) => {
                    info!(file = %file_name, deal = %record.deal_number, ?operation, quote_id, "file submitted");
                    let _ = file.transition_to(FileStatus::Success);
                    report.succeeded += 1;
                    record_outcome(
                        self.audit,
                        &record,
                        &self.operator,
                        RunOutcome::Success,
                        Some(operation),
                        Some(quote_id),
                        None,
                    )
                    .await;
                }
                Err(failure) if matches!(failure.error, SubmissionError::Cancelled) => {
                    // roll back so a later run can pick the file up again
                    let _ = file.transition_to(FileStatus::Ready);
                    report.skipped += 1;
                }
                Err(failure) => {
                    warn!(file = %file_name, error = %failure.error, "file submission failed");
                    let message = failure.error.to_string();
                    let _ = file.fail(&message);
                    report.failed += 1;
                    record_outcome(
                        self.audit,
                        &record,
                        &self.operator,
                        RunOutcome::Error,
                        failure.operation,
                        failure.quote_id,
                        Some(message),
                    )
                    .await;
                }
            }

            batch.replace(index, file);
        }

        report
    }

    async fn submit_file(
        &self,
        record: &ParsedQuoteRecord,
        options: &SubmitOptions,
        cancel: &CancellationToken,
    ) -> Result<(OperationKind, String), SubmitFailure> {
        let assignees = self.resolve_assignees(record).map_err(SubmitFailure::early)?;

        if cancel.is_cancelled() {
            return Err(SubmitFailure::early(SubmissionError::Cancelled));
        }

        let existence = resolve_quote_existence(
            self.crm,
            &record.deal_number,
            &record.offer_name,
            options.forced_quote_id.as_deref(),
        )
        .await;

        let operation = match existence.quote_id {
            Some(_) => OperationKind::Update,
            None => OperationKind::Create,
        };
        let existing_quote = existence.quote_id.clone();

        self.run_steps(record, options, &assignees, existence.quote_id, cancel)
            .await
            .map_err(|error| SubmitFailure {
                error,
                operation: Some(operation),
                quote_id: existing_quote,
            })
    }

    async fn run_steps(
        &self,
        record: &ParsedQuoteRecord,
        options: &SubmitOptions,
        assignees: &ResolvedAssignees,
        existing_quote: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<(OperationKind, String), SubmissionError> {
        // a brand-new quote must carry its scheduling dates from day one
        if existing_quote.is_none()
            && (options.mail_date.is_none()
                || options.start_date.is_none()
                || options.send_date.is_none())
        {
            return Err(SubmissionError::Validation(
                "creating a quote requires mail, start and send dates".into(),
            ));
        }

        let rows = product_rows(&record.lines);

        if cancel.is_cancelled() {
            return Err(SubmissionError::Cancelled);
        }
        self.crm
            .set_deal_product_rows(&record.deal_number, &rows)
            .await
            .map_err(|source| SubmissionError::Remote { step: SubmitStep::DealProducts, source })?;

        if cancel.is_cancelled() {
            return Err(SubmissionError::Cancelled);
        }
        let deal_payload = build_deal_payload(record, assignees, options);
        self.crm
            .update_deal(&record.deal_number, &deal_payload)
            .await
            .map_err(|source| SubmissionError::Remote { step: SubmitStep::DealUpdate, source })?;

        if cancel.is_cancelled() {
            return Err(SubmissionError::Cancelled);
        }
        let (operation, quote_id) = match existing_quote {
            Some(quote_id) => {
                let payload = build_quote_update_payload(record, assignees, options);
                self.crm.update_quote(&quote_id, &payload).await.map_err(|source| {
                    SubmissionError::Remote { step: SubmitStep::QuoteWrite, source }
                })?;
                (OperationKind::Update, quote_id)
            }
            None => {
                let snapshot =
                    self.crm.get_deal(&record.deal_number).await.map_err(|source| {
                        SubmissionError::Remote { step: SubmitStep::QuoteWrite, source }
                    })?;
                let payload =
                    build_quote_create_payload(record, assignees, options, &snapshot);
                let quote_id = self.crm.add_quote(&payload).await.map_err(|source| {
                    SubmissionError::Remote { step: SubmitStep::QuoteWrite, source }
                })?;
                (OperationKind::Create, quote_id)
            }
        };

        if cancel.is_cancelled() {
            return Err(SubmissionError::Cancelled);
        }
        self.crm
            .set_quote_product_rows(&quote_id, &rows)
            .await
            .map_err(|source| SubmissionError::Remote { step: SubmitStep::QuoteProducts, source })?;

        Ok((operation, quote_id))
    }

    fn resolve_assignees(
        &self,
        record: &ParsedQuoteRecord,
    ) -> Result<ResolvedAssignees, SubmissionError> {
        let responsible_name =
            record.responsible.as_deref().ok_or(TranslationError::MissingField("responsible"))?;
        let preparer_name = record
            .prepared_by
            .as_deref()
            .or(record.prepared_by_unva.as_deref())
            .or(record.prepared_by_unai.as_deref())
            .ok_or(TranslationError::MissingField("preparer"))?;

        let responsible = self.directory.resolve(responsible_name)?;
        let preparer = self.directory.resolve(preparer_name)?;
        let approver = match record.approved_by.as_deref() {
            Some(name) => Some(self.directory.resolve(name)?),
            None => None,
        };

        Ok(ResolvedAssignees { responsible, preparer, approver })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::{json, Map, Value};
    use tokio_util::sync::CancellationToken;

    use quotebridge_bitrix::{CrmApi, CrmError, QuoteSummary, RecordingAuditApi};
    use quotebridge_core::history::{OperationKind, RunOutcome};
    use quotebridge_core::translate::engine::{FieldMap, SubmitOptions};
    use quotebridge_core::{
        BatchContext, EmployeeDirectory, EmployeeId, FileStatus, ParsedQuoteRecord, ProductId,
        ProductLine, UploadedFile,
    };

    use super::{BatchReport, SubmissionOrchestrator};

    #[derive(Default)]
    struct ScriptedCrm {
        calls: Mutex<Vec<String>>,
        quotes: Vec<QuoteSummary>,
        fail_method: Option<&'static str>,
        fail_for_deal: Option<&'static str>,
    }

    impl ScriptedCrm {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }

        fn track(&self, method: &str, object_id: &str) -> Result<(), CrmError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(format!("{method}({object_id})"));
            }
            let deal_matches =
                self.fail_for_deal.map(|deal| deal == object_id).unwrap_or(true);
            if self.fail_method == Some(method) && deal_matches {
                return Err(CrmError::Remote {
                    method: method.to_string(),
                    description: "scripted failure".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CrmApi for ScriptedCrm {
        async fn update_deal(&self, deal_id: &str, _: &FieldMap) -> Result<(), CrmError> {
            self.track("crm.deal.update", deal_id)
        }

        async fn set_deal_product_rows(
            &self,
            deal_id: &str,
            _: &[Value],
        ) -> Result<(), CrmError> {
            self.track("crm.deal.productrows.set", deal_id)
        }

        async fn get_deal(&self, deal_id: &str) -> Result<Map<String, Value>, CrmError> {
            self.track("crm.deal.get", deal_id)?;
            let mut snapshot = Map::new();
            snapshot.insert("TITLE".to_string(), json!("Planta Norte"));
            snapshot.insert("CURRENCY_ID".to_string(), json!("EUR"));
            Ok(snapshot)
        }

        async fn add_quote(&self, _: &FieldMap) -> Result<String, CrmError> {
            self.track("crm.quote.add", "-")?;
            Ok("900".to_string())
        }

        async fn update_quote(&self, quote_id: &str, _: &FieldMap) -> Result<(), CrmError> {
            self.track("crm.quote.update", quote_id)
        }

        async fn set_quote_product_rows(
            &self,
            quote_id: &str,
            _: &[Value],
        ) -> Result<(), CrmError> {
            self.track("crm.quote.productrows.set", quote_id)
        }

        async fn list_deal_quotes(&self, deal_id: &str) -> Result<Vec<QuoteSummary>, CrmError> {
            self.track("crm.quote.list", deal_id)?;
            Ok(self.quotes.clone())
        }
    }

    fn directory() -> EmployeeDirectory {
        EmployeeDirectory::new([
            ("Ana Torres".to_string(), EmployeeId(17)),
            ("Marta Ruiz".to_string(), EmployeeId(42)),
            ("Luis Prado".to_string(), EmployeeId(9)),
        ])
    }

    fn record(deal: &str) -> ParsedQuoteRecord {
        ParsedQuoteRecord {
            deal_number: deal.to_string(),
            offer_name: format!("OF-{deal}-1"),
            rubric: None,
            prepared_by: Some("Marta Ruiz".to_string()),
            prepared_by_unva: None,
            prepared_by_unai: None,
            responsible: Some("Ana Torres".to_string()),
            approved_by: Some("Luis Prado".to_string()),
            profit_ratio: None,
            cost_auma: Decimal::ZERO,
            cost_msa: Decimal::ZERO,
            cost_valmet: Decimal::ZERO,
            lines: vec![ProductLine {
                product_id: ProductId(101),
                name: "Actuator Service".to_string(),
                unit_price: Decimal::from(125),
                quantity: Decimal::from(2),
                tax_rate: Decimal::ZERO,
                business_unit: "UNAU".to_string(),
                area_deal: 2043,
                area_quote: 2051,
            }],
        }
    }

    fn ready_file(deal: &str) -> UploadedFile {
        let mut file = UploadedFile::new(format!("{deal}.xlsx"), vec![]);
        file.record = Some(record(deal));
        file.transition_to(FileStatus::Ready).expect("pending -> ready");
        file
    }

    fn quote_tagged(id: &str, tag: &str) -> QuoteSummary {
        QuoteSummary { id: id.to_string(), name_tag: Some(tag.to_string()) }
    }

    fn create_options() -> SubmitOptions {
        SubmitOptions {
            mail_date: NaiveDate::from_ymd_opt(2026, 4, 1),
            start_date: NaiveDate::from_ymd_opt(2026, 4, 8),
            send_date: NaiveDate::from_ymd_opt(2026, 4, 2),
            ..SubmitOptions::default()
        }
    }

    #[tokio::test]
    async fn update_branch_runs_steps_in_order_without_creating() {
        let crm = ScriptedCrm {
            quotes: vec![quote_tagged("55", "OF-7-1")],
            ..ScriptedCrm::default()
        };
        let audit = RecordingAuditApi::default();
        let directory = directory();
        let orchestrator = SubmissionOrchestrator::new(&crm, &audit, &directory, "ops");

        let mut batch = BatchContext::default();
        batch.push(ready_file("7"));

        let report = orchestrator
            .submit_batch(&mut batch, &SubmitOptions::default(), &CancellationToken::new())
            .await;

        assert_eq!(report, BatchReport { succeeded: 1, failed: 0, skipped: 0 });
        assert_eq!(
            crm.calls(),
            vec![
                "crm.quote.list(7)",
                "crm.deal.productrows.set(7)",
                "crm.deal.update(7)",
                "crm.quote.update(55)",
                "crm.quote.productrows.set(55)",
            ]
        );

        let entries = audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, RunOutcome::Success);
        assert_eq!(entries[0].operation, Some(OperationKind::Update));
        assert_eq!(entries[0].quote_id.as_deref(), Some("55"));
        assert_eq!(batch.get(0).map(|file| file.status), Some(FileStatus::Success));
    }

    #[tokio::test]
    async fn create_branch_fetches_deal_before_adding_quote() {
        let crm = ScriptedCrm::default();
        let audit = RecordingAuditApi::default();
        let directory = directory();
        let orchestrator = SubmissionOrchestrator::new(&crm, &audit, &directory, "ops");

        let mut batch = BatchContext::default();
        batch.push(ready_file("9"));

        orchestrator.submit_batch(&mut batch, &create_options(), &CancellationToken::new()).await;

        assert_eq!(
            crm.calls(),
            vec![
                "crm.quote.list(9)",
                "crm.deal.productrows.set(9)",
                "crm.deal.update(9)",
                "crm.deal.get(9)",
                "crm.quote.add(-)",
                "crm.quote.productrows.set(900)",
            ]
        );
        assert_eq!(audit.entries()[0].operation, Some(OperationKind::Create));
        assert_eq!(audit.entries()[0].quote_id.as_deref(), Some("900"));
    }

    #[tokio::test]
    async fn lookup_outage_assumes_create() {
        let crm = ScriptedCrm { fail_method: Some("crm.quote.list"), ..ScriptedCrm::default() };
        let audit = RecordingAuditApi::default();
        let directory = directory();
        let orchestrator = SubmissionOrchestrator::new(&crm, &audit, &directory, "ops");

        let mut batch = BatchContext::default();
        batch.push(ready_file("3"));

        let report =
            orchestrator.submit_batch(&mut batch, &create_options(), &CancellationToken::new()).await;

        assert_eq!(report.succeeded, 1);
        assert!(crm.calls().iter().any(|call| call == "crm.quote.add(-)"));
    }

    #[tokio::test]
    async fn one_failing_file_does_not_stop_the_batch() {
        let crm = ScriptedCrm {
            fail_method: Some("crm.deal.update"),
            fail_for_deal: Some("1"),
            ..ScriptedCrm::default()
        };
        let audit = RecordingAuditApi::default();
        let directory = directory();
        let orchestrator = SubmissionOrchestrator::new(&crm, &audit, &directory, "ops");

        let mut batch = BatchContext::default();
        batch.push(ready_file("1"));
        batch.push(ready_file("2"));

        let report =
            orchestrator.submit_batch(&mut batch, &create_options(), &CancellationToken::new()).await;

        assert_eq!(report, BatchReport { succeeded: 1, failed: 1, skipped: 0 });
        assert_eq!(batch.get(0).map(|file| file.status), Some(FileStatus::Error));
        assert!(batch
            .get(0)
            .and_then(|file| file.error.as_deref())
            .map(|message| message.contains("deal update"))
            .unwrap_or(false));
        assert_eq!(batch.get(1).map(|file| file.status), Some(FileStatus::Success));

        let entries = audit.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].outcome, RunOutcome::Error);
        // the branch was known by the time deal.update failed
        assert_eq!(entries[0].operation, Some(OperationKind::Create));
        assert!(entries[0].quote_id.is_none());
        assert_eq!(entries[1].outcome, RunOutcome::Success);
    }

    #[tokio::test]
    async fn failed_update_is_audited_with_its_quote_id() {
        let crm = ScriptedCrm {
            quotes: vec![quote_tagged("55", "OF-7-1")],
            fail_method: Some("crm.quote.update"),
            ..ScriptedCrm::default()
        };
        let audit = RecordingAuditApi::default();
        let directory = directory();
        let orchestrator = SubmissionOrchestrator::new(&crm, &audit, &directory, "ops");

        let mut batch = BatchContext::default();
        batch.push(ready_file("7"));

        let report = orchestrator
            .submit_batch(&mut batch, &SubmitOptions::default(), &CancellationToken::new())
            .await;

        assert_eq!(report.failed, 1);
        let entries = audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, RunOutcome::Error);
        assert_eq!(entries[0].operation, Some(OperationKind::Update));
        assert_eq!(entries[0].quote_id.as_deref(), Some("55"));
    }

    #[tokio::test]
    async fn cancelled_batch_leaves_files_ready_and_unaudited() {
        let crm = ScriptedCrm::default();
        let audit = RecordingAuditApi::default();
        let directory = directory();
        let orchestrator = SubmissionOrchestrator::new(&crm, &audit, &directory, "ops");

        let mut batch = BatchContext::default();
        batch.push(ready_file("4"));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report =
            orchestrator.submit_batch(&mut batch, &SubmitOptions::default(), &cancel).await;

        assert_eq!(report, BatchReport { succeeded: 0, failed: 0, skipped: 1 });
        assert_eq!(batch.get(0).map(|file| file.status), Some(FileStatus::Ready));
        assert!(crm.calls().is_empty());
        assert!(audit.entries().is_empty());
    }

    #[tokio::test]
    async fn unknown_employee_fails_validation_and_is_audited() {
        let crm = ScriptedCrm::default();
        let audit = RecordingAuditApi::default();
        let directory = directory();
        let orchestrator = SubmissionOrchestrator::new(&crm, &audit, &directory, "ops");

        let mut file = ready_file("6");
        if let Some(record) = file.record.as_mut() {
            record.responsible = Some("Desconocido".to_string());
        }
        let mut batch = BatchContext::default();
        batch.push(file);

        let report = orchestrator
            .submit_batch(&mut batch, &SubmitOptions::default(), &CancellationToken::new())
            .await;

        assert_eq!(report.failed, 1);
        assert!(crm.calls().is_empty());
        let entries = audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, RunOutcome::Error);
        assert!(entries[0]
            .error
            .as_deref()
            .map(|message| message.contains("Desconocido"))
            .unwrap_or(false));
    }

    #[tokio::test]
    async fn create_branch_without_dates_fails_validation() {
        let crm = ScriptedCrm::default();
        let audit = RecordingAuditApi::default();
        let directory = directory();
        let orchestrator = SubmissionOrchestrator::new(&crm, &audit, &directory, "ops");

        let mut batch = BatchContext::default();
        batch.push(ready_file("5"));

        let report = orchestrator
            .submit_batch(&mut batch, &SubmitOptions::default(), &CancellationToken::new())
            .await;

        assert_eq!(report.failed, 1);
        // the lookup ran, but no write was issued
        assert_eq!(crm.calls(), vec!["crm.quote.list(5)"]);
        let entries = audit.entries();
        assert_eq!(entries[0].operation, Some(OperationKind::Create));
        assert!(entries[0]
            .error
            .as_deref()
            .map(|message| message.contains("mail, start and send dates"))
            .unwrap_or(false));
    }

    #[tokio::test]
    async fn forced_quote_id_pins_the_update_branch() {
        let crm = ScriptedCrm::default();
        let audit = RecordingAuditApi::default();
        let directory = directory();
        let orchestrator = SubmissionOrchestrator::new(&crm, &audit, &directory, "ops");

        let mut batch = BatchContext::default();
        batch.push(ready_file("8"));

        let options =
            SubmitOptions { forced_quote_id: Some("77".to_string()), ..SubmitOptions::default() };
        orchestrator.submit_batch(&mut batch, &options, &CancellationToken::new()).await;

        let calls = crm.calls();
        assert!(!calls.iter().any(|call| call.starts_with("crm.quote.list")));
        assert!(calls.iter().any(|call| call == "crm.quote.update(77)"));
    }
}
