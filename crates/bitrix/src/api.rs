//! Client-side surface of the Bitrix REST webhook. The trait exists so the
//! pipeline can run against an in-memory double; `client::WebhookClient` is
//! the production implementation.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use quotebridge_core::translate::engine::FieldMap;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("crm request failed: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },
    /// The webhook answered with its error envelope instead of a result.
    #[error("crm rejected `{method}`: {description}")]
    Remote { method: String, description: String },
    #[error("crm response for `{method}` was malformed: {detail}")]
    Malformed { method: String, detail: String },
}

/// One row of `crm.quote.list`, projected down to the name tag used for
/// existence matching.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuoteSummary {
    pub id: String,
    pub name_tag: Option<String>,
}

#[async_trait]
pub trait CrmApi: Send + Sync {
    async fn update_deal(&self, deal_id: &str, fields: &FieldMap) -> Result<(), CrmError>;

    async fn set_deal_product_rows(&self, deal_id: &str, rows: &[Value]) -> Result<(), CrmError>;

    /// Full field snapshot of a deal, as returned by `crm.deal.get`.
    async fn get_deal(&self, deal_id: &str) -> Result<Map<String, Value>, CrmError>;

    /// Returns the id of the newly created quote.
    async fn add_quote(&self, fields: &FieldMap) -> Result<String, CrmError>;

    async fn update_quote(&self, quote_id: &str, fields: &FieldMap) -> Result<(), CrmError>;

    async fn set_quote_product_rows(&self, quote_id: &str, rows: &[Value])
        -> Result<(), CrmError>;

    /// Quotes attached to a deal, with the name tag projected for matching.
    async fn list_deal_quotes(&self, deal_id: &str) -> Result<Vec<QuoteSummary>, CrmError>;
}
