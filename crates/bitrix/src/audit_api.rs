//! Persistence of submission-history entries. The trait keeps the pipeline
//! testable; `RecordingAuditApi` is the double used throughout the test
//! suites.

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use quotebridge_core::config::AuditConfig;
use quotebridge_core::history::HistoryEntry;

#[derive(Debug, Error)]
pub enum AuditPersistError {
    #[error("history request failed: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },
    #[error("history endpoint returned http {status}")]
    Remote { status: reqwest::StatusCode },
}

#[async_trait]
pub trait AuditApi: Send + Sync {
    async fn record(&self, entry: &HistoryEntry) -> Result<(), AuditPersistError>;
}

pub struct HttpAuditApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAuditApi {
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AuditApi for HttpAuditApi {
    async fn record(&self, entry: &HistoryEntry) -> Result<(), AuditPersistError> {
        let url = format!("{}/api/history", self.base_url);
        let response = self.http.post(&url).json(entry).send().await?;
        if !response.status().is_success() {
            return Err(AuditPersistError::Remote { status: response.status() });
        }
        Ok(())
    }
}

/// In-memory sink that captures entries for assertions.
#[derive(Default)]
pub struct RecordingAuditApi {
    entries: Mutex<Vec<HistoryEntry>>,
    pub fail_next: Mutex<bool>,
}

impl RecordingAuditApi {
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().map(|entries| entries.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditApi for RecordingAuditApi {
    async fn record(&self, entry: &HistoryEntry) -> Result<(), AuditPersistError> {
        if let Ok(mut fail) = self.fail_next.lock() {
            if *fail {
                *fail = false;
                return Err(AuditPersistError::Remote {
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                });
            }
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry.clone());
        }
        Ok(())
    }
}
