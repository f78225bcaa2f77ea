//! Audit-history records posted after every submission attempt. The entry
//! is a flat snapshot of what was sent, not a reference to remote state,
//! so the trail stays readable even if the CRM objects change later.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::AreaTotals;
use crate::domain::record::{ParsedQuoteRecord, ProductLine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Success,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
}

/// One product line as recorded in the trail. Prices are kept as decimals;
/// coercion from spreadsheet text happens before this point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryProduct {
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub business_unit: String,
}

impl From<&ProductLine> for HistoryProduct {
    fn from(line: &ProductLine) -> Self {
        Self {
            name: line.name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            total: line.line_total(),
            business_unit: line.business_unit.clone(),
        }
    }
}

/// Snapshot of one submission attempt. Posted for both outcomes; a failed
/// run records the error text alongside everything that was about to be
/// sent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub deal_number: String,
    pub offer_name: String,
    pub rubric: Option<String>,
    pub prepared_by: Option<String>,
    pub prepared_by_unva: Option<String>,
    pub prepared_by_unai: Option<String>,
    pub responsible: Option<String>,
    pub approved_by: Option<String>,
    pub operator: String,
    pub profit_ratio: Option<Decimal>,
    pub cost_auma: Decimal,
    pub cost_msa: Decimal,
    pub cost_valmet: Decimal,
    pub recorded_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub operation: Option<OperationKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub products: Vec<HistoryProduct>,
    pub product_count: usize,
    pub area_totals: AreaTotals,
    pub grand_total: Decimal,
}

impl HistoryEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn from_record(
        record: &ParsedQuoteRecord,
        operator: impl Into<String>,
        outcome: RunOutcome,
        operation: Option<OperationKind>,
        quote_id: Option<String>,
        error: Option<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        let area_totals = crate::aggregate::aggregate(&record.lines);
        let grand_total = area_totals.grand_total();
        Self {
            deal_number: record.deal_number.clone(),
            offer_name: record.offer_name.clone(),
            rubric: record.rubric.clone(),
            prepared_by: record.prepared_by.clone(),
            prepared_by_unva: record.prepared_by_unva.clone(),
            prepared_by_unai: record.prepared_by_unai.clone(),
            responsible: record.responsible.clone(),
            approved_by: record.approved_by.clone(),
            operator: operator.into(),
            profit_ratio: record.profit_ratio,
            cost_auma: record.cost_auma,
            cost_msa: record.cost_msa,
            cost_valmet: record.cost_valmet,
            recorded_at,
            outcome,
            operation,
            quote_id,
            error,
            products: record.lines.iter().map(HistoryProduct::from).collect(),
            product_count: record.lines.len(),
            area_totals,
            grand_total,
        }
    }
}

/// Leading-number coercion for loosely formatted spreadsheet cells:
/// `"1.234 EUR"` becomes `1.234`, anything with no leading digits becomes
/// zero.
pub fn coerce_leading_number(text: &str) -> Decimal {
    let trimmed = text.trim();
    let mut end = 0;
    let mut seen_dot = false;
    for (index, ch) in trimmed.char_indices() {
        if ch.is_ascii_digit() {
            end = index + ch.len_utf8();
        } else if ch == '.' && !seen_dot && end == index {
            seen_dot = true;
            end = index + 1;
        } else {
            break;
        }
    }
    trimmed[..end].trim_end_matches('.').parse().unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{coerce_leading_number, HistoryEntry, OperationKind, RunOutcome};
    use crate::domain::record::{ParsedQuoteRecord, ProductId, ProductLine};

    #[test]
    fn coercion_takes_leading_number_only() {
        assert_eq!(coerce_leading_number("1234.5 EUR"), Decimal::new(12_345, 1));
        assert_eq!(coerce_leading_number("  42"), Decimal::from(42));
        assert_eq!(coerce_leading_number("7."), Decimal::from(7));
        assert_eq!(coerce_leading_number("n/a"), Decimal::ZERO);
        assert_eq!(coerce_leading_number(""), Decimal::ZERO);
    }

    #[test]
    fn entry_snapshot_totals_match_lines() {
        let record = ParsedQuoteRecord {
            deal_number: "311".to_owned(),
            offer_name: "OF-311".to_owned(),
            rubric: Some("Mantenimiento".to_owned()),
            prepared_by: Some("Marta Ruiz".to_owned()),
            prepared_by_unva: None,
            prepared_by_unai: None,
            responsible: Some("Ana Torres".to_owned()),
            approved_by: None,
            profit_ratio: Some(Decimal::new(250, 1)),
            cost_auma: Decimal::ZERO,
            cost_msa: Decimal::ZERO,
            cost_valmet: Decimal::ZERO,
            lines: vec![ProductLine {
                product_id: ProductId(5),
                name: "Bomba".to_owned(),
                unit_price: Decimal::from(100),
                quantity: Decimal::from(3),
                tax_rate: Decimal::ZERO,
                business_unit: "UNAU".to_owned(),
                area_deal: 2043,
                area_quote: 2051,
            }],
        };

        let entry = HistoryEntry::from_record(
            &record,
            "ops",
            RunOutcome::Success,
            Some(OperationKind::Update),
            Some("55".to_owned()),
            None,
            Utc::now(),
        );
        assert_eq!(entry.grand_total, Decimal::from(300));
        assert_eq!(entry.product_count, 1);
        assert_eq!(entry.products[0].total, Decimal::from(300));
        assert_eq!(entry.quote_id.as_deref(), Some("55"));
        assert_eq!(entry.responsible.as_deref(), Some("Ana Torres"));
        assert_eq!(
            serde_json::to_value(entry.outcome).expect("serialize outcome"),
            serde_json::json!("success")
        );
    }
}
