use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::record::ProductLine;

/// Named reporting buckets; anything else lands in `Otros`.
pub const AREA_BUCKETS: &[&str] = &["UNAU", "UNAI", "UNVA", "Proyectos", "HSEQ"];
pub const OTHER_BUCKET: &str = "Otros";

/// Monetary totals per business-area bucket. Derived on demand, never
/// persisted on its own.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AreaTotals(BTreeMap<String, Decimal>);

impl AreaTotals {
    pub fn get(&self, area: &str) -> Decimal {
        self.0.get(area).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.0.iter().map(|(area, total)| (area.as_str(), *total))
    }

    pub fn grand_total(&self) -> Decimal {
        self.0.values().copied().sum()
    }
}

/// Sum line totals (unit price x quantity; tax and discount are out of
/// scope here) into per-area buckets. Pure and idempotent.
pub fn aggregate(lines: &[ProductLine]) -> AreaTotals {
    let mut totals: BTreeMap<String, Decimal> = AREA_BUCKETS
        .iter()
        .chain(std::iter::once(&OTHER_BUCKET))
        .map(|area| ((*area).to_owned(), Decimal::ZERO))
        .collect();

    for line in lines {
        let bucket = if AREA_BUCKETS.contains(&line.business_unit.as_str()) {
            line.business_unit.as_str()
        } else {
            OTHER_BUCKET
        };
        if let Some(total) = totals.get_mut(bucket) {
            *total += line.line_total();
        }
    }

    AreaTotals(totals)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{aggregate, OTHER_BUCKET};
    use crate::domain::record::{ProductId, ProductLine};

    fn line(unit: &str, price: i64, quantity: i64) -> ProductLine {
        ProductLine {
            product_id: ProductId(1),
            name: format!("{unit} line"),
            unit_price: Decimal::new(price, 2),
            quantity: Decimal::from(quantity),
            tax_rate: Decimal::ZERO,
            business_unit: unit.to_owned(),
            area_deal: 0,
            area_quote: 0,
        }
    }

    #[test]
    fn buckets_sum_to_total_of_all_lines() {
        let lines = vec![
            line("UNAU", 10_000, 2),
            line("UNVA", 5_000, 1),
            line("MANT", 2_500, 4),
        ];

        let totals = aggregate(&lines);
        let expected: Decimal = lines.iter().map(|l| l.line_total()).sum();
        assert_eq!(totals.grand_total(), expected);
        assert_eq!(totals.get("UNAU"), Decimal::new(20_000, 2));
        assert_eq!(totals.get(OTHER_BUCKET), Decimal::new(10_000, 2));
    }

    #[test]
    fn aggregation_is_idempotent() {
        let lines = vec![line("UNAI", 1_999, 3), line("HSEQ", 750, 2)];
        assert_eq!(aggregate(&lines), aggregate(&lines));
    }

    #[test]
    fn empty_input_yields_zeroed_buckets() {
        let totals = aggregate(&[]);
        assert_eq!(totals.grand_total(), Decimal::ZERO);
        assert_eq!(totals.get("UNVA"), Decimal::ZERO);
    }
}
