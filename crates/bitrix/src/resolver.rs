//! Decides whether a run updates an existing quote or creates a new one.
//!
//! The decision is deliberately optimistic: when the existence lookup
//! itself fails, the run proceeds on the create branch rather than
//! aborting, matching how the CRM has always been operated. A duplicate
//! quote is recoverable; a silently skipped submission is not.

use tracing::{debug, warn};

use crate::api::CrmApi;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuoteExistence {
    pub exists: bool,
    pub quote_id: Option<String>,
}

impl QuoteExistence {
    fn create() -> Self {
        Self { exists: false, quote_id: None }
    }

    fn update(quote_id: String) -> Self {
        Self { exists: true, quote_id: Some(quote_id) }
    }
}

/// Looks for a quote on `deal_id` whose name tag exactly matches
/// `offer_name`. A `forced_quote_id` pins the decision without a lookup.
pub async fn resolve_quote_existence(
    api: &dyn CrmApi,
    deal_id: &str,
    offer_name: &str,
    forced_quote_id: Option<&str>,
) -> QuoteExistence {
    if let Some(quote_id) = forced_quote_id {
        debug!(deal_id, quote_id, "quote id pinned by operator, skipping lookup");
        return QuoteExistence::update(quote_id.to_string());
    }

    let quotes = match api.list_deal_quotes(deal_id).await {
        Ok(quotes) => quotes,
        Err(error) => {
            warn!(deal_id, error = %error, "quote lookup failed, proceeding with create");
            return QuoteExistence::create();
        }
    };

    for quote in quotes {
        if quote.name_tag.as_deref() == Some(offer_name) {
            debug!(deal_id, quote_id = %quote.id, "matched existing quote by name tag");
            return QuoteExistence::update(quote.id);
        }
    }

    debug!(deal_id, offer_name, "no matching quote, proceeding with create");
    QuoteExistence::create()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{Map, Value};

    use quotebridge_core::translate::engine::FieldMap;

    use super::{resolve_quote_existence, QuoteExistence};
    use crate::api::{CrmApi, CrmError, QuoteSummary};

    struct ListOnly {
        response: Result<Vec<QuoteSummary>, ()>,
    }

    #[async_trait]
    impl CrmApi for ListOnly {
        async fn update_deal(&self, _: &str, _: &FieldMap) -> Result<(), CrmError> {
            unreachable!("resolver only lists quotes")
        }

        async fn set_deal_product_rows(&self, _: &str, _: &[Value]) -> Result<(), CrmError> {
            unreachable!("resolver only lists quotes")
        }

        async fn get_deal(&self, _: &str) -> Result<Map<String, Value>, CrmError> {
            unreachable!("resolver only lists quotes")
        }

        async fn add_quote(&self, _: &FieldMap) -> Result<String, CrmError> {
            unreachable!("resolver only lists quotes")
        }

        async fn update_quote(&self, _: &str, _: &FieldMap) -> Result<(), CrmError> {
            unreachable!("resolver only lists quotes")
        }

        async fn set_quote_product_rows(&self, _: &str, _: &[Value]) -> Result<(), CrmError> {
            unreachable!("resolver only lists quotes")
        }

        async fn list_deal_quotes(&self, _: &str) -> Result<Vec<QuoteSummary>, CrmError> {
            self.response.clone().map_err(|()| CrmError::Remote {
                method: "crm.quote.list".to_string(),
                description: "simulated outage".to_string(),
            })
        }
    }

    fn quote(id: &str, tag: Option<&str>) -> QuoteSummary {
        QuoteSummary { id: id.to_string(), name_tag: tag.map(str::to_string) }
    }

    #[tokio::test]
    async fn exact_name_match_selects_update_branch() {
        let api = ListOnly {
            response: Ok(vec![quote("10", Some("OF-5-1")), quote("11", Some("OF-5-2"))]),
        };
        let existence = resolve_quote_existence(&api, "5", "OF-5-2", None).await;
        assert_eq!(existence, QuoteExistence { exists: true, quote_id: Some("11".to_string()) });
    }

    #[tokio::test]
    async fn near_miss_names_do_not_match() {
        let api = ListOnly { response: Ok(vec![quote("10", Some("of-5-1")), quote("11", None)]) };
        let existence = resolve_quote_existence(&api, "5", "OF-5-1", None).await;
        assert_eq!(existence, QuoteExistence { exists: false, quote_id: None });
    }

    #[tokio::test]
    async fn lookup_failure_falls_back_to_create() {
        let api = ListOnly { response: Err(()) };
        let existence = resolve_quote_existence(&api, "5", "OF-5-1", None).await;
        assert_eq!(existence, QuoteExistence { exists: false, quote_id: None });
    }

    #[tokio::test]
    async fn forced_quote_id_skips_the_lookup_entirely() {
        let api = ListOnly { response: Err(()) };
        let existence = resolve_quote_existence(&api, "5", "OF-5-1", Some("42")).await;
        assert_eq!(existence, QuoteExistence { exists: true, quote_id: Some("42".to_string()) });
    }
}
