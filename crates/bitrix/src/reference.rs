//! Loader for the reference-data API: the product catalog and the employee
//! directory. Both endpoints page with `skip`/`limit` and are fetched fully
//! once per session; the pipeline only ever sees the in-memory maps.

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use quotebridge_core::config::ReferenceConfig;
use quotebridge_core::domain::catalog::{CatalogProduct, EmployeeDirectory, ProductCatalog};
use quotebridge_core::domain::record::{EmployeeId, ProductId};

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("reference data request failed: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },
    #[error("reference data endpoint `{endpoint}` returned http {status}")]
    Remote { endpoint: &'static str, status: reqwest::StatusCode },
}

// Wire names come from the upstream service and stay in Spanish.
#[derive(Debug, Deserialize)]
struct ProductPage {
    productos: Vec<ProductRow>,
}

#[derive(Debug, Deserialize)]
struct EmployeePage {
    empleados: Vec<EmployeeRow>,
}

#[derive(Debug, Deserialize)]
struct ProductRow {
    code: i64,
    name_excel: String,
    unidad_negocio: String,
    area1: i64,
    area2: i64,
}

#[derive(Debug, Deserialize)]
struct EmployeeRow {
    id: i64,
    nombre: String,
}

pub struct ReferenceClient {
    http: reqwest::Client,
    base_url: String,
    page_size: u32,
}

impl ReferenceClient {
    pub fn new(config: &ReferenceConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
        }
    }

    /// Each page comes back wrapped in a one-key envelope; `rows` unwraps
    /// it so paging can count what was actually fetched.
    async fn fetch_all<P, T>(
        &self,
        endpoint: &'static str,
        rows: fn(P) -> Vec<T>,
    ) -> Result<Vec<T>, ReferenceError>
    where
        P: serde::de::DeserializeOwned,
    {
        let mut all = Vec::new();
        let mut skip = 0u32;

        loop {
            let url = format!(
                "{}/{endpoint}?skip={skip}&limit={}",
                self.base_url, self.page_size
            );
            let response = self.http.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(ReferenceError::Remote { endpoint, status: response.status() });
            }

            let page: P = response.json().await?;
            let page = rows(page);
            let fetched = page.len() as u32;
            all.extend(page);

            if fetched < self.page_size {
                return Ok(all);
            }
            skip += self.page_size;
        }
    }

    pub async fn load_catalog(&self) -> Result<ProductCatalog, ReferenceError> {
        let rows = self.fetch_all("api/products", |page: ProductPage| page.productos).await?;
        info!(products = rows.len(), "loaded product catalog");

        Ok(ProductCatalog::new(rows.into_iter().map(|row| {
            (
                row.name_excel,
                CatalogProduct {
                    id: ProductId(row.code),
                    business_unit: row.unidad_negocio,
                    area_deal: row.area1,
                    area_quote: row.area2,
                },
            )
        })))
    }

    pub async fn load_directory(&self) -> Result<EmployeeDirectory, ReferenceError> {
        let rows = self.fetch_all("api/employees", |page: EmployeePage| page.empleados).await?;
        info!(employees = rows.len(), "loaded employee directory");

        Ok(EmployeeDirectory::new(
            rows.into_iter().map(|row| (row.nombre, EmployeeId(row.id))),
        ))
    }
}
