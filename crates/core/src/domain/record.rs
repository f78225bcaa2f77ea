use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmployeeId(pub i64);

/// One catalog-resolved product row from the spreadsheet. Rows whose name
/// is unknown to the catalog never become a `ProductLine`; they are dropped
/// during ingestion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: Decimal,
    pub tax_rate: Decimal,
    pub business_unit: String,
    /// Area enumeration code emitted on the deal side.
    pub area_deal: i64,
    /// Area enumeration code emitted on the quote side.
    pub area_quote: i64,
}

impl ProductLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * self.quantity
    }
}

/// Canonical in-memory representation of one spreadsheet's quote data,
/// independent of any remote payload shape. Immutable once produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuoteRecord {
    pub deal_number: String,
    pub offer_name: String,
    pub rubric: Option<String>,
    pub prepared_by: Option<String>,
    pub prepared_by_unva: Option<String>,
    pub prepared_by_unai: Option<String>,
    pub responsible: Option<String>,
    pub approved_by: Option<String>,
    pub profit_ratio: Option<Decimal>,
    pub cost_auma: Decimal,
    pub cost_msa: Decimal,
    pub cost_valmet: Decimal,
    pub lines: Vec<ProductLine>,
}
