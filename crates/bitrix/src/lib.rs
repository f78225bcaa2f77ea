pub mod api;
pub mod audit_api;
pub mod client;
pub mod reference;
pub mod resolver;

pub use api::{CrmApi, CrmError, QuoteSummary};
pub use audit_api::{AuditApi, AuditPersistError, HttpAuditApi, RecordingAuditApi};
pub use client::WebhookClient;
pub use reference::{ReferenceClient, ReferenceError};
pub use resolver::{resolve_quote_existence, QuoteExistence};
