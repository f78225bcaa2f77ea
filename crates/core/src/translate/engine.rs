//! Payload assembly for the three outbound CRM writes: the deal update,
//! the quote update and the create-branch quote derived from a fetched
//! deal snapshot. All field naming comes from `tables`; this module only
//! decides which values go where and which optional fields are omitted.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::domain::record::{EmployeeId, ParsedQuoteRecord, ProductLine};
use crate::translate::tables::{
    self, AreaCategory, Side, Transform, COST_FIELDS, DEAL_TO_QUOTE_RULES,
    SERVICES_DEPARTMENT_DEAL, UNIT_CODES,
};

/// Ordered field -> value map. `BTreeMap` keeps serialized payloads
/// deterministic, which the tests and the audit trail rely on.
pub type FieldMap = BTreeMap<String, Value>;

/// Operator-supplied per-run inputs that are not present in the
/// spreadsheet.
#[derive(Clone, Debug, Default)]
pub struct SubmitOptions {
    pub close_date: Option<NaiveDate>,
    pub mail_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub send_date: Option<NaiveDate>,
    /// Pin the run to a known quote id instead of resolving by name.
    pub forced_quote_id: Option<String>,
}

/// People fields after directory resolution. Resolution happens before
/// translation so a payload can never carry a half-resolved name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedAssignees {
    pub responsible: EmployeeId,
    pub preparer: EmployeeId,
    pub approver: Option<EmployeeId>,
}

/// Remote timestamps are pinned to 03:00 in the +03:00 zone, matching the
/// convention of the existing CRM records.
pub fn format_crm_date(date: NaiveDate) -> String {
    format!("{}T03:00:00+03:00", date.format("%Y-%m-%d"))
}

fn decimal_value(value: Decimal) -> Value {
    Value::String(value.normalize().to_string())
}

fn code_list(codes: &[i64]) -> Value {
    Value::Array(codes.iter().map(|code| Value::from(*code)).collect())
}

/// Distinct area codes of the lines in `category`, first-seen order.
pub fn category_areas(lines: &[ProductLine], category: AreaCategory, side: Side) -> Vec<i64> {
    let mut codes = Vec::new();
    for line in lines.iter().filter(|line| category.matches(&line.business_unit)) {
        let code = match side {
            Side::Deal => line.area_deal,
            Side::Quote => line.area_quote,
        };
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

/// Deal-side department codes for every business unit present in the
/// lines, in the fixed unit order.
pub fn department_codes(lines: &[ProductLine]) -> Vec<i64> {
    let mut codes = Vec::new();
    for category in AreaCategory::ALL {
        if !lines.iter().any(|line| category.matches(&line.business_unit)) {
            continue;
        }
        let code = UNIT_CODES
            .iter()
            .find(|unit| category.matches(unit.unit))
            .map(|unit| unit.department_deal)
            .unwrap_or(SERVICES_DEPARTMENT_DEAL);
        codes.push(code);
    }
    codes
}

/// Deal-side summary codes for the named units present in the lines.
/// Products in the services bucket carry no summary code.
pub fn unit_summary_codes(lines: &[ProductLine]) -> Vec<i64> {
    UNIT_CODES
        .iter()
        .filter(|unit| lines.iter().any(|line| line.business_unit == unit.unit))
        .map(|unit| unit.summary_deal)
        .collect()
}

fn insert_area_lists(payload: &mut FieldMap, lines: &[ProductLine], side: Side) {
    for category in AreaCategory::ALL {
        let codes = category_areas(lines, category, side);
        payload.insert(category.field(side).to_owned(), code_list(&codes));
    }
}

fn insert_costs(payload: &mut FieldMap, record: &ParsedQuoteRecord, side: Side) {
    let costs = [record.cost_auma, record.cost_msa, record.cost_valmet];
    for (field, cost) in COST_FIELDS.iter().zip(costs) {
        if !cost.is_zero() {
            payload.insert(field.on(side).to_owned(), decimal_value(cost));
        }
    }
}

fn insert_field(payload: &mut FieldMap, field: tables::CanonicalField, side: Side, value: Value) {
    if let Some(name) = field.on(side) {
        payload.insert(name.to_owned(), value);
    }
}

/// Fields shared verbatim (modulo per-side ids) by the deal update and
/// both quote payload shapes.
fn insert_common(
    payload: &mut FieldMap,
    record: &ParsedQuoteRecord,
    assignees: &ResolvedAssignees,
    side: Side,
) {
    if let Some(rubric) = &record.rubric {
        insert_field(payload, tables::RUBRIC, side, Value::String(rubric.clone()));
    }

    insert_area_lists(payload, &record.lines, side);

    let departments = department_codes(&record.lines);
    let multi = i64::from(departments.len() > 1);
    let departments = match side {
        Side::Deal => departments,
        Side::Quote => departments.iter().map(|code| tables::remap_department(*code)).collect(),
    };
    insert_field(payload, tables::DEPARTMENTS, side, code_list(&departments));
    insert_field(payload, tables::MULTI_DEPARTMENT, side, Value::from(multi));

    if let Some(profit) = record.profit_ratio {
        insert_field(payload, tables::PROFIT_RATIO, side, decimal_value(profit));
    }

    insert_field(payload, tables::ASSIGNED, side, Value::from(assignees.responsible.0));

    let summary = unit_summary_codes(&record.lines);
    if !summary.is_empty() {
        let summary = match side {
            Side::Deal => summary,
            Side::Quote => summary.iter().map(|code| tables::remap_summary(*code)).collect(),
        };
        insert_field(payload, tables::UNIT_SUMMARY, side, code_list(&summary));
    }

    insert_costs(payload, record, side);
}

/// People fields carried on the quote side by both branches.
fn insert_quote_people(payload: &mut FieldMap, assignees: &ResolvedAssignees) {
    insert_field(
        payload,
        tables::PREPARERS,
        Side::Quote,
        json!([assignees.preparer.0]),
    );
    if let Some(approver) = assignees.approver {
        insert_field(payload, tables::APPROVER, Side::Quote, Value::from(approver.0));
    }
}

/// Fields only a brand-new quote receives. An update must not rewrite the
/// workflow status, the name tag or the scheduling dates of an existing
/// quote.
fn insert_create_fields(
    payload: &mut FieldMap,
    record: &ParsedQuoteRecord,
    options: &SubmitOptions,
) {
    insert_field(
        payload,
        tables::OFFER_NAME,
        Side::Quote,
        Value::String(record.offer_name.clone()),
    );

    let dates = [
        (tables::MAIL_DATE, options.mail_date),
        (tables::START_DATE, options.start_date),
        (tables::SEND_DATE, options.send_date),
    ];
    for (field, date) in dates {
        if let Some(date) = date {
            insert_field(payload, field, Side::Quote, Value::String(format_crm_date(date)));
        }
    }

    payload.insert("STATUS_ID".to_owned(), Value::String("SENT".to_owned()));
}

/// Fields for `crm.deal.update`.
pub fn build_deal_payload(
    record: &ParsedQuoteRecord,
    assignees: &ResolvedAssignees,
    options: &SubmitOptions,
) -> FieldMap {
    let mut payload = FieldMap::new();
    insert_common(&mut payload, record, assignees, Side::Deal);
    if let Some(close) = options.close_date {
        let close = Value::String(format_crm_date(close));
        insert_field(&mut payload, tables::CLOSE_DATE, Side::Deal, close);
    }
    payload
}

/// Fields for `crm.quote.update` against an existing quote.
pub fn build_quote_update_payload(
    record: &ParsedQuoteRecord,
    assignees: &ResolvedAssignees,
    options: &SubmitOptions,
) -> FieldMap {
    let mut payload = FieldMap::new();
    insert_common(&mut payload, record, assignees, Side::Quote);
    insert_quote_people(&mut payload, assignees);
    if let Some(close) = options.close_date {
        let close = Value::String(format_crm_date(close));
        insert_field(&mut payload, tables::CLOSE_DATE, Side::Quote, close);
    }
    payload
}

fn parse_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn apply_transform(transform: Transform, value: &Value) -> Option<Value> {
    match transform {
        Transform::Copy => Some(value.clone()),
        Transform::OffsetScalar(offset) => {
            parse_code(value).map(|code| Value::from(code + offset))
        }
        Transform::MapList(remap) => match value {
            Value::Array(items) => {
                let mapped = items
                    .iter()
                    .map(|item| match parse_code(item) {
                        Some(code) => Value::from(remap(code)),
                        None => item.clone(),
                    })
                    .collect();
                Some(Value::Array(mapped))
            }
            // Scalar values in list-typed fields are carried unchanged.
            other => Some(other.clone()),
        },
    }
}

/// Fields for `crm.quote.add` when no matching quote exists: the fetched
/// deal snapshot projected through `DEAL_TO_QUOTE_RULES`, then overlaid
/// with the spreadsheet-derived fields. Spreadsheet data wins on overlap.
pub fn build_quote_create_payload(
    record: &ParsedQuoteRecord,
    assignees: &ResolvedAssignees,
    options: &SubmitOptions,
    deal_snapshot: &serde_json::Map<String, Value>,
) -> FieldMap {
    let mut payload = FieldMap::new();

    for rule in DEAL_TO_QUOTE_RULES {
        let Some(value) = deal_snapshot.get(rule.deal_field) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        if let Some(translated) = apply_transform(rule.transform, value) {
            payload.insert(rule.quote_field.to_owned(), translated);
        }
    }

    payload.insert("DEAL_ID".to_owned(), Value::String(record.deal_number.clone()));

    insert_common(&mut payload, record, assignees, Side::Quote);
    insert_quote_people(&mut payload, assignees);
    insert_create_fields(&mut payload, record, options);
    payload
}

/// Product rows for `crm.deal.productrows.set` / `crm.quote.productrows.set`.
pub fn product_rows(lines: &[ProductLine]) -> Vec<Value> {
    lines
        .iter()
        .map(|line| {
            json!({
                "PRODUCT_ID": line.product_id.0,
                "PRICE": decimal_value(line.unit_price),
                "QUANTITY": decimal_value(line.quantity),
                "TAX_RATE": decimal_value(line.tax_rate),
                "TAX_INCLUDED": "N",
            })
        })
        .collect()
}
