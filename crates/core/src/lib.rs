pub mod aggregate;
pub mod config;
pub mod domain;
pub mod errors;
pub mod history;
pub mod translate;

pub use aggregate::{aggregate, AreaTotals};
pub use domain::batch::{BatchContext, FileStatus, UploadedFile};
pub use domain::catalog::{
    CatalogProduct, EmployeeDirectory, ProductCatalog, ReferenceResolutionError,
};
pub use domain::record::{EmployeeId, ParsedQuoteRecord, ProductId, ProductLine};
pub use errors::{BatchError, TranslationError};
pub use history::{HistoryEntry, HistoryProduct, OperationKind, RunOutcome};
pub use translate::engine::{FieldMap, ResolvedAssignees, SubmitOptions};
pub use translate::tables::Side;
