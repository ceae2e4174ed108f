//! In-process repository over plain grids, used for offline snapshots and tests.

use super::a1::CellAddress;
use super::{CellUpdate, CredentialProvider, RepositoryConnector, SheetRef, SpreadsheetRepository};
use crate::errors::RepositoryError;
use crate::model::{AuthType, CellFormat, RawDocument, RawSheet};
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// On-disk snapshot format accepted by `--fixture`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sheets: Vec<FixtureSheet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureSheet {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<i64>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Default)]
struct MemorySheet {
    sheet_id: i64,
    title: String,
    values: Vec<Vec<String>>,
    formats: HashMap<CellAddress, CellFormat>,
}

impl MemorySheet {
    fn cell_mut(&mut self, cell: CellAddress) -> &mut String {
        let row = cell.row as usize - 1;
        let column = cell.column as usize;
        if self.values.len() <= row {
            self.values.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.values[row];
        if cells.len() <= column {
            cells.resize(column + 1, String::new());
        }
        &mut cells[column]
    }

    fn header_width(&self) -> u32 {
        self.values
            .first()
            .and_then(|header| header.iter().rposition(|cell| !cell.trim().is_empty()))
            .map(|idx| idx as u32 + 1)
            .unwrap_or(0)
    }

    fn last_filled_row(&self) -> usize {
        self.values
            .iter()
            .rposition(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .map(|idx| idx + 1)
            .unwrap_or(0)
    }

    fn to_raw(&self) -> RawSheet {
        RawSheet {
            sheet_id: self.sheet_id,
            title: self.title.clone(),
            values: self.values.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryDocument {
    title: String,
    sheets: Vec<MemorySheet>,
}

impl MemoryDocument {
    fn next_sheet_id(&self) -> i64 {
        self.sheets
            .iter()
            .map(|sheet| sheet.sheet_id)
            .max()
            .map(|max| max + 1)
            .unwrap_or(0)
    }
}

#[derive(Debug, Default)]
struct StoreState {
    documents: HashMap<String, MemoryDocument>,
    denied: HashSet<(String, AuthType)>,
    failing_sheets: HashSet<(String, String)>,
}

/// Shared backing store; every repository handed out by a [`MemoryConnector`] sees the
/// same documents.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document whose sheets are `(title, grid)` pairs; sheet ids follow order.
    pub fn insert_document<S: Into<String>>(
        &self,
        document_id: &str,
        title: &str,
        sheets: impl IntoIterator<Item = (S, Vec<Vec<String>>)>,
    ) {
        let sheets = sheets
            .into_iter()
            .enumerate()
            .map(|(idx, (sheet_title, values))| MemorySheet {
                sheet_id: idx as i64,
                title: sheet_title.into(),
                values,
                formats: HashMap::new(),
            })
            .collect();
        self.state.write().documents.insert(
            document_id.to_string(),
            MemoryDocument {
                title: title.to_string(),
                sheets,
            },
        );
    }

    pub fn insert_fixture(&self, fixture: Fixture) {
        let mut document = MemoryDocument {
            title: fixture.title,
            sheets: Vec::new(),
        };
        for sheet in fixture.sheets {
            let sheet_id = sheet.sheet_id.unwrap_or_else(|| document.next_sheet_id());
            document.sheets.push(MemorySheet {
                sheet_id,
                title: sheet.title,
                values: sheet.rows,
                formats: HashMap::new(),
            });
        }
        self.state.write().documents.insert(fixture.id, document);
    }

    /// Read a `.json`, `.yaml` or `.yml` snapshot into a fresh store.
    pub fn from_fixture_file(path: &Path) -> Result<(Self, String)> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        let fixture: Fixture = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)
                .with_context(|| format!("failed to parse YAML fixture {}", path.display()))?,
            _ => serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse JSON fixture {}", path.display()))?,
        };
        let document_id = fixture.id.clone();
        let store = Self::new();
        store.insert_fixture(fixture);
        Ok((store, document_id))
    }

    /// Current contents in fixture form, for writing a repaired snapshot back out.
    pub fn fixture(&self, document_id: &str) -> Option<Fixture> {
        let state = self.state.read();
        let document = state.documents.get(document_id)?;
        Some(Fixture {
            id: document_id.to_string(),
            title: document.title.clone(),
            sheets: document
                .sheets
                .iter()
                .map(|sheet| FixtureSheet {
                    title: sheet.title.clone(),
                    sheet_id: Some(sheet.sheet_id),
                    rows: sheet.values.clone(),
                })
                .collect(),
        })
    }

    /// Make reads and writes with `auth_type` fail with `PermissionDenied`.
    pub fn deny(&self, document_id: &str, auth_type: AuthType) {
        self.state
            .write()
            .denied
            .insert((document_id.to_string(), auth_type));
    }

    /// Make every mutation of one sheet fail with an API error.
    pub fn fail_writes(&self, document_id: &str, sheet_title: &str) {
        self.state
            .write()
            .failing_sheets
            .insert((document_id.to_string(), sheet_title.to_string()));
    }

    pub fn snapshot(&self, document_id: &str) -> Option<RawDocument> {
        let state = self.state.read();
        let document = state.documents.get(document_id)?;
        Some(RawDocument {
            id: document_id.to_string(),
            title: document.title.clone(),
            sheets: document.sheets.iter().map(MemorySheet::to_raw).collect(),
        })
    }

    pub fn cell_format(&self, document_id: &str, sheet_title: &str, cell: CellAddress) -> Option<CellFormat> {
        let state = self.state.read();
        state
            .documents
            .get(document_id)?
            .sheets
            .iter()
            .find(|sheet| sheet.title == sheet_title)?
            .formats
            .get(&cell)
            .copied()
    }

    pub fn header_format(&self, document_id: &str, sheet_title: &str, column: u32) -> Option<CellFormat> {
        self.cell_format(document_id, sheet_title, CellAddress::header(column))
    }

    fn check_access(&self, document_id: &str, auth_type: AuthType) -> Result<(), RepositoryError> {
        let state = self.state.read();
        if !state.documents.contains_key(document_id) {
            return Err(RepositoryError::NotFound {
                document_id: document_id.to_string(),
            });
        }
        if state.denied.contains(&(document_id.to_string(), auth_type)) {
            return Err(RepositoryError::PermissionDenied {
                document_id: document_id.to_string(),
                auth_type,
            });
        }
        Ok(())
    }

    fn with_sheet<T>(
        &self,
        sheet: &SheetRef,
        auth_type: AuthType,
        mutate: impl FnOnce(&mut MemorySheet) -> T,
    ) -> Result<T, RepositoryError> {
        self.check_access(&sheet.document_id, auth_type)?;
        let mut state = self.state.write();
        if state
            .failing_sheets
            .contains(&(sheet.document_id.clone(), sheet.title.clone()))
        {
            return Err(RepositoryError::Api {
                status: 400,
                message: format!("writes to '{}' are rejected", sheet.title),
            });
        }
        let target = state
            .documents
            .get_mut(&sheet.document_id)
            .and_then(|document| {
                document
                    .sheets
                    .iter_mut()
                    .find(|candidate| candidate.sheet_id == sheet.sheet_id)
            })
            .ok_or_else(|| RepositoryError::SheetNotFound {
                document_id: sheet.document_id.clone(),
                title: sheet.title.clone(),
            })?;
        Ok(mutate(target))
    }
}

/// Repository view of a [`MemoryStore`] bound to one credential type.
pub struct MemoryRepository {
    store: Arc<MemoryStore>,
    auth_type: AuthType,
}

impl MemoryRepository {
    pub fn new(store: Arc<MemoryStore>, auth_type: AuthType) -> Self {
        Self { store, auth_type }
    }
}

#[async_trait]
impl SpreadsheetRepository for MemoryRepository {
    fn auth_type(&self) -> AuthType {
        self.auth_type
    }

    async fn load(&self, document_id: &str) -> Result<RawDocument, RepositoryError> {
        self.store.check_access(document_id, self.auth_type)?;
        self.store
            .snapshot(document_id)
            .ok_or_else(|| RepositoryError::NotFound {
                document_id: document_id.to_string(),
            })
    }

    async fn set_headers(&self, sheet: &SheetRef, headers: &[String]) -> Result<(), RepositoryError> {
        self.store.with_sheet(sheet, self.auth_type, |target| {
            for (column, header) in headers.iter().enumerate() {
                *target.cell_mut(CellAddress::header(column as u32)) = header.clone();
            }
        })
    }

    async fn insert_column(&self, sheet: &SheetRef, index: u32) -> Result<(), RepositoryError> {
        self.store.with_sheet(sheet, self.auth_type, |target| {
            let index = index as usize;
            for row in target.values.iter_mut() {
                if row.len() > index {
                    row.insert(index, String::new());
                }
            }
            target.formats = std::mem::take(&mut target.formats)
                .into_iter()
                .map(|(cell, format)| {
                    if cell.column as usize >= index {
                        (CellAddress::new(cell.row, cell.column + 1), format)
                    } else {
                        (cell, format)
                    }
                })
                .collect();
        })
    }

    async fn append_column(
        &self,
        sheet: &SheetRef,
        name: &str,
        format_from: Option<u32>,
    ) -> Result<u32, RepositoryError> {
        self.store.with_sheet(sheet, self.auth_type, |target| {
            let column = target.header_width();
            *target.cell_mut(CellAddress::header(column)) = name.to_string();
            if let Some(format) = format_from
                .and_then(|source| target.formats.get(&CellAddress::header(source)))
                .copied()
            {
                target.formats.insert(CellAddress::header(column), format);
            }
            column
        })
    }

    async fn add_row(&self, sheet: &SheetRef, values: &[String]) -> Result<(), RepositoryError> {
        self.store.with_sheet(sheet, self.auth_type, |target| {
            let at = target.last_filled_row();
            target.values.truncate(at);
            target.values.push(values.to_vec());
        })
    }

    async fn update_row(
        &self,
        sheet: &SheetRef,
        row_number: u32,
        values: &[String],
    ) -> Result<(), RepositoryError> {
        if row_number == 0 {
            return Err(RepositoryError::Api {
                status: 400,
                message: "row numbers start at 1".to_string(),
            });
        }
        self.store.with_sheet(sheet, self.auth_type, |target| {
            for (column, value) in values.iter().enumerate() {
                *target.cell_mut(CellAddress::new(row_number, column as u32)) = value.clone();
            }
        })
    }

    async fn write_cells(&self, sheet: &SheetRef, updates: &[CellUpdate]) -> Result<(), RepositoryError> {
        self.store.with_sheet(sheet, self.auth_type, |target| {
            for update in updates {
                *target.cell_mut(update.cell) = update.value.clone();
            }
        })
    }

    async fn set_cell_format(
        &self,
        sheet: &SheetRef,
        cell: CellAddress,
        format: &CellFormat,
    ) -> Result<(), RepositoryError> {
        self.store.with_sheet(sheet, self.auth_type, |target| {
            target.formats.insert(cell, *format);
        })
    }

    async fn copy_cell_format(
        &self,
        sheet: &SheetRef,
        from: CellAddress,
        to: CellAddress,
    ) -> Result<(), RepositoryError> {
        self.store.with_sheet(sheet, self.auth_type, |target| {
            match target.formats.get(&from).copied() {
                Some(format) => {
                    target.formats.insert(to, format);
                }
                None => {
                    target.formats.remove(&to);
                }
            }
        })
    }

    async fn add_sheet(&self, document_id: &str, title: &str) -> Result<SheetRef, RepositoryError> {
        self.store.check_access(document_id, self.auth_type)?;
        let mut state = self.store.state.write();
        let document = state
            .documents
            .get_mut(document_id)
            .ok_or_else(|| RepositoryError::NotFound {
                document_id: document_id.to_string(),
            })?;
        if document.sheets.iter().any(|sheet| sheet.title == title) {
            return Err(RepositoryError::Api {
                status: 400,
                message: format!("a sheet with the name \"{title}\" already exists"),
            });
        }
        let sheet_id = document.next_sheet_id();
        document.sheets.push(MemorySheet {
            sheet_id,
            title: title.to_string(),
            ..MemorySheet::default()
        });
        Ok(SheetRef::new(document_id, sheet_id, title))
    }
}

/// Hands out [`MemoryRepository`] views keyed by the credential's type.
#[derive(Clone)]
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}

impl RepositoryConnector for MemoryConnector {
    fn connect(&self, credential: Arc<dyn CredentialProvider>) -> Arc<dyn SpreadsheetRepository> {
        Arc::new(MemoryRepository::new(self.store.clone(), credential.auth_type()))
    }
}
