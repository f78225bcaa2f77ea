//! Spreadsheet ingestion: decodes an uploaded XLSX workbook into a
//! `ParsedQuoteRecord`.
//!
//! The workbook layout is fixed by the template the sales team fills in:
//! a data sheet (named `Datos`, falling back to the first sheet) with the
//! header cells and the product table, and a summary sheet (`Resumen`,
//! falling back to the second) with the rubric, profit ratio and vendor
//! costs. Cell coordinates below are zero-based (row, column) pairs into
//! that template.
//!
//! Product rows whose name is not in the catalog are dropped without
//! failing the file; the template mixes in annotation rows that have
//! never been catalog entries.

use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use quotebridge_core::domain::catalog::ProductCatalog;
use quotebridge_core::domain::record::{ParsedQuoteRecord, ProductLine};
use quotebridge_core::history::coerce_leading_number;

const DATA_SHEET: &str = "Datos";
const SUMMARY_SHEET: &str = "Resumen";

const DEAL_NUMBER_CELL: (u32, u32) = (1, 4);
const OFFER_NAME_CELL: (u32, u32) = (2, 4);
const PREPARED_BY_CELL: (u32, u32) = (9, 4);
const RESPONSIBLE_CELL: (u32, u32) = (10, 4);
const APPROVED_BY_CELL: (u32, u32) = (11, 4);
const PREPARED_BY_UNVA_CELL: (u32, u32) = (12, 4);
const PREPARED_BY_UNAI_CELL: (u32, u32) = (13, 4);

const RUBRIC_CELL: (u32, u32) = (23, 11);
const PROFIT_CELL: (u32, u32) = (29, 4);
const COST_AUMA_CELL: (u32, u32) = (30, 4);
const COST_MSA_CELL: (u32, u32) = (31, 4);
const COST_VALMET_CELL: (u32, u32) = (32, 4);

const FIRST_PRODUCT_ROW: u32 = 14;
const PRODUCT_NAME_COL: u32 = 1;
const PRODUCT_QTY_COL: u32 = 2;
const PRODUCT_PRICE_COL: u32 = 3;
const PRODUCT_TAX_COL: u32 = 5;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("could not open workbook: {0}")]
    Workbook(#[from] calamine::XlsxError),
    #[error("workbook has no usable `{0}` sheet")]
    MissingSheet(&'static str),
    #[error("required cell {label} is empty (sheet `{sheet}`, row {row}, column {col})")]
    MissingRequiredCell { sheet: String, row: u32, col: u32, label: &'static str },
}

/// Decodes one uploaded workbook against the product catalog.
pub fn parse_quote_workbook(
    payload: &[u8],
    catalog: &ProductCatalog,
) -> Result<ParsedQuoteRecord, ParseError> {
    let mut workbook = Xlsx::new(Cursor::new(payload))?;
    let sheet_names = workbook.sheet_names();

    let data_name = pick_sheet(&sheet_names, DATA_SHEET, 0)
        .ok_or(ParseError::MissingSheet(DATA_SHEET))?;
    let data = workbook.worksheet_range(&data_name)?;

    // the summary sheet is optional; single-sheet workbooks simply have no
    // rubric, profit ratio or vendor costs
    let summary = match pick_sheet(&sheet_names, SUMMARY_SHEET, 1) {
        Some(name) => Some(workbook.worksheet_range(&name)?),
        None => None,
    };

    let deal_number = required_string(&data, &data_name, DEAL_NUMBER_CELL, "deal number")?;
    let offer_name = required_string(&data, &data_name, OFFER_NAME_CELL, "offer name")?;

    let lines = parse_product_lines(&data, catalog);

    Ok(ParsedQuoteRecord {
        deal_number,
        offer_name,
        rubric: summary.as_ref().and_then(|sheet| cell_string(sheet, RUBRIC_CELL)),
        prepared_by: cell_string(&data, PREPARED_BY_CELL),
        prepared_by_unva: cell_string(&data, PREPARED_BY_UNVA_CELL),
        prepared_by_unai: cell_string(&data, PREPARED_BY_UNAI_CELL),
        responsible: cell_string(&data, RESPONSIBLE_CELL),
        approved_by: cell_string(&data, APPROVED_BY_CELL),
        profit_ratio: summary.as_ref().and_then(|sheet| cell_decimal(sheet, PROFIT_CELL)),
        cost_auma: summary_cost(summary.as_ref(), COST_AUMA_CELL),
        cost_msa: summary_cost(summary.as_ref(), COST_MSA_CELL),
        cost_valmet: summary_cost(summary.as_ref(), COST_VALMET_CELL),
        lines,
    })
}

fn summary_cost(summary: Option<&Range<Data>>, cell: (u32, u32)) -> Decimal {
    summary.and_then(|sheet| cell_decimal(sheet, cell)).unwrap_or(Decimal::ZERO)
}

fn pick_sheet(names: &[String], preferred: &str, fallback_index: usize) -> Option<String> {
    if names.iter().any(|name| name == preferred) {
        return Some(preferred.to_string());
    }
    names.get(fallback_index).cloned()
}

fn parse_product_lines(data: &Range<Data>, catalog: &ProductCatalog) -> Vec<ProductLine> {
    let mut lines = Vec::new();
    let mut row = FIRST_PRODUCT_ROW;

    // the product table ends at the first row with an empty name cell
    while let Some(name) = cell_string_at(data, row, PRODUCT_NAME_COL) {
        let Some(product) = catalog.find(&name) else {
            debug!(row, name, "product not in catalog, dropping row");
            row += 1;
            continue;
        };

        lines.push(ProductLine {
            product_id: product.id,
            name,
            unit_price: cell_decimal(data, (row, PRODUCT_PRICE_COL)).unwrap_or(Decimal::ZERO),
            quantity: cell_decimal(data, (row, PRODUCT_QTY_COL)).unwrap_or(Decimal::ZERO),
            tax_rate: cell_decimal(data, (row, PRODUCT_TAX_COL)).unwrap_or(Decimal::ZERO),
            business_unit: product.business_unit.clone(),
            area_deal: product.area_deal,
            area_quote: product.area_quote,
        });
        row += 1;
    }

    lines
}

fn required_string(
    range: &Range<Data>,
    sheet: &str,
    cell: (u32, u32),
    label: &'static str,
) -> Result<String, ParseError> {
    cell_string(range, cell).ok_or_else(|| ParseError::MissingRequiredCell {
        sheet: sheet.to_string(),
        row: cell.0,
        col: cell.1,
        label,
    })
}

fn cell_string(range: &Range<Data>, (row, col): (u32, u32)) -> Option<String> {
    cell_string_at(range, row, col)
}

fn cell_string_at(range: &Range<Data>, row: u32, col: u32) -> Option<String> {
    let text = match range.get_value((row, col))? {
        Data::String(text) => text.trim().to_string(),
        Data::Float(value) => format_numeric_text(*value),
        Data::Int(value) => value.to_string(),
        Data::Bool(value) => value.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Whole numbers stored as floats come back without a fractional tail, so
/// a deal number cell holding `4821.0` reads as `"4821"`.
fn format_numeric_text(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn cell_decimal(range: &Range<Data>, (row, col): (u32, u32)) -> Option<Decimal> {
    match range.get_value((row, col))? {
        Data::Float(value) => Decimal::from_f64(*value),
        Data::Int(value) => Some(Decimal::from(*value)),
        Data::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| coerce_leading_number(trimmed))
        }
        _ => None,
    }
}
