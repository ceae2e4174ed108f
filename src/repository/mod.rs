use crate::errors::RepositoryError;
use crate::model::{AuthType, CellFormat, RawDocument};
use async_trait::async_trait;
use std::sync::Arc;

pub mod a1;
pub mod credentials;
pub mod fallback;
pub mod google_sheets;
pub mod memory;
pub mod throttle;

pub use a1::CellAddress;
pub use credentials::{CredentialProvider, DelegatedToken, ServiceIdentity};
pub use fallback::{AccessPlan, Loaded};
pub use google_sheets::{GoogleSheetsConnector, GoogleSheetsRepository};
pub use memory::{Fixture, FixtureSheet, MemoryConnector, MemoryRepository, MemoryStore};
pub use throttle::{RateLimiter, RetryPolicy, Throttle};

/// Addresses one tab. The Sheets API needs the title for value ranges and the numeric id
/// for structural requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRef {
    pub document_id: String,
    pub sheet_id: i64,
    pub title: String,
}

impl SheetRef {
    pub fn new(document_id: impl Into<String>, sheet_id: i64, title: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            sheet_id,
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    pub cell: CellAddress,
    pub value: String,
}

impl CellUpdate {
    pub fn new(cell: CellAddress, value: impl Into<String>) -> Self {
        Self {
            cell,
            value: value.into(),
        }
    }
}

/// The only component that talks to the spreadsheet store.
#[async_trait]
pub trait SpreadsheetRepository: Send + Sync {
    /// Credential this repository acts with.
    fn auth_type(&self) -> AuthType;

    async fn load(&self, document_id: &str) -> Result<RawDocument, RepositoryError>;

    /// Overwrite the header row starting at column A.
    async fn set_headers(&self, sheet: &SheetRef, headers: &[String]) -> Result<(), RepositoryError>;

    /// Insert an empty column at a 0-based index, shifting later columns right.
    async fn insert_column(&self, sheet: &SheetRef, index: u32) -> Result<(), RepositoryError>;

    /// Add a header after the last non-blank header. When `format_from` names a header
    /// column its formatting is copied onto the new header cell. Returns the new column
    /// index.
    async fn append_column(
        &self,
        sheet: &SheetRef,
        name: &str,
        format_from: Option<u32>,
    ) -> Result<u32, RepositoryError>;

    /// Append a row after the last non-empty row. `values` are aligned with the header.
    async fn add_row(&self, sheet: &SheetRef, values: &[String]) -> Result<(), RepositoryError>;

    async fn update_row(
        &self,
        sheet: &SheetRef,
        row_number: u32,
        values: &[String],
    ) -> Result<(), RepositoryError>;

    async fn write_cells(&self, sheet: &SheetRef, updates: &[CellUpdate]) -> Result<(), RepositoryError>;

    async fn set_cell_format(
        &self,
        sheet: &SheetRef,
        cell: CellAddress,
        format: &CellFormat,
    ) -> Result<(), RepositoryError>;

    async fn copy_cell_format(
        &self,
        sheet: &SheetRef,
        from: CellAddress,
        to: CellAddress,
    ) -> Result<(), RepositoryError>;

    /// Create a new tab and return its reference.
    async fn add_sheet(&self, document_id: &str, title: &str) -> Result<SheetRef, RepositoryError>;
}

/// Builds repositories bound to one credential. One repository is created per request;
/// nothing credential-bearing is shared between requests.
pub trait RepositoryConnector: Send + Sync {
    fn connect(&self, credential: Arc<dyn CredentialProvider>) -> Arc<dyn SpreadsheetRepository>;
}
