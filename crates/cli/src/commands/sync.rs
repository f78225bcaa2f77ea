//! The `sync` command: ingest workbooks, submit the batch, print per-file
//! results. Ctrl-C cancels between submission steps instead of killing
//! requests mid-flight.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::info;

use quotebridge_bitrix::{HttpAuditApi, ReferenceClient, WebhookClient};
use quotebridge_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use quotebridge_core::translate::engine::SubmitOptions;
use quotebridge_core::{BatchContext, FileStatus, UploadedFile};
use quotebridge_pipeline::{ingest_batch, BatchReport, SubmissionOrchestrator};

use super::CommandResult;

#[derive(Debug)]
pub struct SyncArgs {
    pub files: Vec<PathBuf>,
    pub quote_id: Option<String>,
    pub close_date: Option<NaiveDate>,
    pub mail_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub send_date: Option<NaiveDate>,
    pub operator: Option<String>,
    pub config: Option<PathBuf>,
}

pub fn run(args: SyncArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions {
        config_path: args.config.clone(),
        require_file: args.config.is_some(),
        overrides: ConfigOverrides {
            operator_name: args.operator.clone(),
            ..ConfigOverrides::default()
        },
    }) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure(format!("sync: {error}"), 2),
    };

    crate::init_logging(&config);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(format!("sync: failed to start runtime: {error}"), 2)
        }
    };

    match runtime.block_on(run_batch(&config, &args)) {
        Ok((batch, report)) => render_result(&batch, report),
        Err(error) => CommandResult::failure(format!("sync: {error:#}"), 2),
    }
}

async fn run_batch(
    config: &AppConfig,
    args: &SyncArgs,
) -> Result<(BatchContext, BatchReport)> {
    let crm = WebhookClient::new(&config.crm).context("failed to build crm client")?;
    let audit = HttpAuditApi::new(&config.audit);
    let reference = ReferenceClient::new(&config.reference);

    let catalog = reference.load_catalog().await.context("failed to load product catalog")?;
    let directory =
        reference.load_directory().await.context("failed to load employee directory")?;

    let mut batch = BatchContext::default();
    for path in &args.files {
        let payload = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        let file_name =
            path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
        batch.push(UploadedFile::new(file_name, payload));
    }

    ingest_batch(&mut batch, &catalog).await;

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing the current step then stopping");
            cancel_on_signal.cancel();
        }
    });

    let options = SubmitOptions {
        close_date: args.close_date,
        mail_date: args.mail_date,
        start_date: args.start_date,
        send_date: args.send_date,
        forced_quote_id: args.quote_id.clone(),
    };

    let orchestrator =
        SubmissionOrchestrator::new(&crm, &audit, &directory, config.operator.name.clone());
    let report = orchestrator.submit_batch(&mut batch, &options, &cancel).await;

    Ok((batch, report))
}

fn render_result(batch: &BatchContext, report: BatchReport) -> CommandResult {
    let mut output = String::new();

    for file in batch.files() {
        let line = match file.status {
            FileStatus::Success => format!("  ok      {}", file.file_name),
            FileStatus::Ready => format!("  skipped {} (not submitted)", file.file_name),
            FileStatus::Error => format!(
                "  failed  {} ({})",
                file.file_name,
                file.error.as_deref().unwrap_or("unknown error")
            ),
            _ => format!("  {:?} {}", file.status, file.file_name),
        };
        output.push_str(&line);
        output.push('\n');
    }

    output.push_str(&format!(
        "sync: {} succeeded, {} failed, {} skipped",
        report.succeeded, report.failed, report.skipped
    ));

    if report.failed > 0 {
        CommandResult::failure(output, 1)
    } else {
        CommandResult::success(output)
    }
}
