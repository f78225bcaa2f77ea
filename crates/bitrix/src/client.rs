//! Production `CrmApi` backed by a Bitrix inbound webhook. Every method is
//! one POST to `<webhook>/<method>` with a JSON body; Bitrix answers with
//! either `{"result": ...}` or `{"error": ..., "error_description": ...}`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use quotebridge_core::config::CrmConfig;
use quotebridge_core::translate::engine::FieldMap;
use quotebridge_core::translate::tables::QUOTE_NAME_TAG_FIELD;

use crate::api::{CrmApi, CrmError, QuoteSummary};

pub struct WebhookClient {
    http: reqwest::Client,
    webhook_url: SecretString,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    result: Option<Value>,
    error: Option<String>,
    error_description: Option<String>,
}

impl WebhookClient {
    pub fn new(config: &CrmConfig) -> Result<Self, CrmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, webhook_url: config.webhook_url.clone() })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, CrmError> {
        let base = self.webhook_url.expose_secret().trim_end_matches('/');
        let url = format!("{base}/{method}");

        debug!(method, "calling crm webhook");
        let response = self.http.post(&url).json(&params).send().await?;
        let status = response.status();
        let envelope: Envelope = response.json().await.map_err(|error| CrmError::Malformed {
            method: method.to_string(),
            detail: format!("undecodable response body (http {status}): {error}"),
        })?;

        if let Some(error) = envelope.error {
            let description = envelope.error_description.unwrap_or(error);
            return Err(CrmError::Remote { method: method.to_string(), description });
        }

        envelope.result.ok_or_else(|| CrmError::Malformed {
            method: method.to_string(),
            detail: "response carried neither result nor error".to_string(),
        })
    }
}

fn result_as_id(method: &str, result: Value) -> Result<String, CrmError> {
    match result {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(CrmError::Malformed {
            method: method.to_string(),
            detail: format!("expected an id, got {other}"),
        }),
    }
}

#[async_trait]
impl CrmApi for WebhookClient {
    async fn update_deal(&self, deal_id: &str, fields: &FieldMap) -> Result<(), CrmError> {
        self.call("crm.deal.update", json!({ "id": deal_id, "fields": fields })).await?;
        Ok(())
    }

    async fn set_deal_product_rows(&self, deal_id: &str, rows: &[Value]) -> Result<(), CrmError> {
        self.call("crm.deal.productrows.set", json!({ "id": deal_id, "rows": rows })).await?;
        Ok(())
    }

    async fn get_deal(&self, deal_id: &str) -> Result<Map<String, Value>, CrmError> {
        let result = self.call("crm.deal.get", json!({ "id": deal_id })).await?;
        match result {
            Value::Object(fields) => Ok(fields),
            other => Err(CrmError::Malformed {
                method: "crm.deal.get".to_string(),
                detail: format!("expected an object, got {other}"),
            }),
        }
    }

    async fn add_quote(&self, fields: &FieldMap) -> Result<String, CrmError> {
        let result = self.call("crm.quote.add", json!({ "fields": fields })).await?;
        result_as_id("crm.quote.add", result)
    }

    async fn update_quote(&self, quote_id: &str, fields: &FieldMap) -> Result<(), CrmError> {
        self.call("crm.quote.update", json!({ "id": quote_id, "fields": fields })).await?;
        Ok(())
    }

    async fn set_quote_product_rows(
        &self,
        quote_id: &str,
        rows: &[Value],
    ) -> Result<(), CrmError> {
        self.call("crm.quote.productrows.set", json!({ "id": quote_id, "rows": rows })).await?;
        Ok(())
    }

    async fn list_deal_quotes(&self, deal_id: &str) -> Result<Vec<QuoteSummary>, CrmError> {
        let params = json!({
            "filter": { "DEAL_ID": deal_id },
            "select": ["ID", QUOTE_NAME_TAG_FIELD],
        });
        let result = self.call("crm.quote.list", params).await?;

        let rows = match result {
            Value::Array(rows) => rows,
            other => {
                return Err(CrmError::Malformed {
                    method: "crm.quote.list".to_string(),
                    detail: format!("expected an array, got {other}"),
                })
            }
        };

        rows.into_iter().map(|row| summarize_quote_row(&row)).collect()
    }
}

fn summarize_quote_row(row: &Value) -> Result<QuoteSummary, CrmError> {
    let fields: &Map<String, Value> = row.as_object().ok_or_else(|| CrmError::Malformed {
        method: "crm.quote.list".to_string(),
        detail: format!("expected quote rows to be objects, got {row}"),
    })?;

    let id = fields
        .get("ID")
        .and_then(|value| match value {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        })
        .ok_or_else(|| CrmError::Malformed {
            method: "crm.quote.list".to_string(),
            detail: "quote row is missing ID".to_string(),
        })?;

    let name_tag =
        fields.get(QUOTE_NAME_TAG_FIELD).and_then(Value::as_str).map(str::to_string);

    Ok(QuoteSummary { id, name_tag })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::summarize_quote_row;

    #[test]
    fn quote_rows_accept_numeric_and_string_ids() {
        let row = json!({ "ID": 77, "UF_CRM_1443821741": "OF-77-1" });
        let summary = summarize_quote_row(&row).expect("numeric id");
        assert_eq!(summary.id, "77");
        assert_eq!(summary.name_tag.as_deref(), Some("OF-77-1"));

        let row = json!({ "ID": "78" });
        let summary = summarize_quote_row(&row).expect("string id");
        assert_eq!(summary.id, "78");
        assert_eq!(summary.name_tag, None);
    }

    #[test]
    fn quote_rows_without_id_are_rejected() {
        let row = json!({ "UF_CRM_1443821741": "OF-1" });
        assert!(summarize_quote_row(&row).is_err());
    }
}
