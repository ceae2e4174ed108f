#![allow(dead_code)]

use sheets_i18n::config::{CliArgs, ServerConfig};
use sheets_i18n::model::{AuthType, CellFormat};
use sheets_i18n::repository::{
    CellAddress, MemoryConnector, MemoryRepository, MemoryStore, SheetRef, SpreadsheetRepository,
};
use sheets_i18n::state::{AppState, Session};
use std::sync::Arc;

pub const DOC: &str = "1AbCdEfGhIjKlMnOpQrStUvWxYz0123456789";
pub const SERVICE_EMAIL: &str = "translator@demo-project.iam.gserviceaccount.com";
pub const USER_TOKEN: &str = "ya29.user-token";

pub fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

/// In-memory document with the given `(title, rows)` sheets.
pub struct TestDocument {
    pub store: Arc<MemoryStore>,
    pub state: Arc<AppState>,
}

impl TestDocument {
    pub fn new(sheets: &[(&str, &[&[&str]])]) -> Self {
        let store = Arc::new(MemoryStore::new());
        store.insert_document(
            DOC,
            "Translations",
            sheets
                .iter()
                .map(|(title, rows)| (title.to_string(), grid(rows))),
        );
        let state = Arc::new(app_state(store.clone()));
        Self { store, state }
    }

    pub fn user_session(&self) -> Session {
        self.state.session(Some(USER_TOKEN.to_string()))
    }

    pub fn service_session(&self) -> Session {
        self.state.session(None)
    }

    pub fn deny(&self, auth_type: AuthType) {
        self.store.deny(DOC, auth_type);
    }

    /// Format one header cell directly in the store.
    pub async fn style_header(&self, sheet_title: &str, column: u32, format: CellFormat) {
        let sheet_id = self
            .store
            .snapshot(DOC)
            .and_then(|doc| doc.sheet_by_title(sheet_title).map(|sheet| sheet.sheet_id))
            .expect("sheet exists");
        MemoryRepository::new(self.store.clone(), AuthType::User)
            .set_cell_format(
                &SheetRef::new(DOC, sheet_id, sheet_title),
                CellAddress::header(column),
                &format,
            )
            .await
            .expect("style header cell");
    }

    /// Current cell values of one sheet.
    pub fn values(&self, sheet_title: &str) -> Vec<Vec<String>> {
        self.store
            .snapshot(DOC)
            .and_then(|doc| doc.sheet_by_title(sheet_title).cloned())
            .map(|sheet| sheet.values)
            .unwrap_or_default()
    }

    pub fn headers(&self, sheet_title: &str) -> Vec<String> {
        self.values(sheet_title)
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .filter(|header| !header.is_empty())
            .collect()
    }
}

pub fn config() -> ServerConfig {
    let args = CliArgs {
        service_account_email: Some(SERVICE_EMAIL.to_string()),
        rate_limit_requests: Some(0),
        ..CliArgs::default()
    };
    ServerConfig::from_args(args).expect("default config")
}

pub fn app_state(store: Arc<MemoryStore>) -> AppState {
    AppState::new_with_connector(Arc::new(config()), Arc::new(MemoryConnector::new(store)))
}
