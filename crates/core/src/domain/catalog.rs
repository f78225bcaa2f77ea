use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::record::{EmployeeId, ProductId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown employee name `{name}`")]
pub struct ReferenceResolutionError {
    pub name: String,
}

/// Catalog attributes for one product, keyed by the exact spreadsheet name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub business_unit: String,
    pub area_deal: i64,
    pub area_quote: i64,
}

/// Read-only name -> product mapping, loaded once per session from the
/// reference-data API. Never mutated by the pipeline.
#[derive(Clone, Debug, Default)]
pub struct ProductCatalog {
    by_name: HashMap<String, CatalogProduct>,
}

impl ProductCatalog {
    pub fn new(entries: impl IntoIterator<Item = (String, CatalogProduct)>) -> Self {
        Self { by_name: entries.into_iter().collect() }
    }

    pub fn find(&self, name: &str) -> Option<&CatalogProduct> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Read-only name -> employee id mapping. Resolution is a pure lookup;
/// unknown names surface as `ReferenceResolutionError` so the caller can
/// block the run instead of defaulting.
#[derive(Clone, Debug, Default)]
pub struct EmployeeDirectory {
    by_name: HashMap<String, EmployeeId>,
}

impl EmployeeDirectory {
    pub fn new(entries: impl IntoIterator<Item = (String, EmployeeId)>) -> Self {
        Self { by_name: entries.into_iter().collect() }
    }

    pub fn lookup(&self, name: &str) -> Option<EmployeeId> {
        self.by_name.get(name).copied()
    }

    pub fn resolve(&self, name: &str) -> Result<EmployeeId, ReferenceResolutionError> {
        self.lookup(name).ok_or_else(|| ReferenceResolutionError { name: name.to_owned() })
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
