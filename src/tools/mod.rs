//! Boundary operations. Each takes a per-request [`Session`] and typed params and returns
//! a payload or a structured [`ServiceError`].

pub mod export;
pub mod fixes;
pub mod rows;
pub mod structure;

pub use export::{ExportParams, export_to_i18n};
pub use fixes::{ApplyFixParams, BatchApplyFixParams, apply_fix, batch_apply_fix};
pub use rows::{
    AddRowParams, SaveRowParams, SyncResponse, SyncSpreadsheetParams, UpdateRowParams,
    UpdateRowResponse, add_row, save_row, sync_spreadsheet, update_row,
};
pub use structure::{AddLanguageColumnParams, AddSheetParams, add_language_column, add_sheet};

use crate::document_id::extract_document_id;
use crate::errors::ServiceError;
use crate::model::{BatchFixResponse, LoadAndValidateResponse, RawDocument, Spreadsheet};
use crate::repository::SpreadsheetRepository;
use crate::state::Session;
use crate::table::parse_sheet;
use crate::validate::validate_document;
use crate::transform::I18nDocuments;
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentParams {
    /// Spreadsheet id or browser URL.
    #[serde(alias = "document_id", alias = "url")]
    pub document_id: String,
}

pub async fn load_and_validate(
    session: &Session,
    params: DocumentParams,
) -> Result<LoadAndValidateResponse, ServiceError> {
    let document_id = extract_document_id(&params.document_id)?;
    tracing::info!(document_id = %document_id, "load and validate");
    let loaded = session.load(&document_id).await?;
    validated(&loaded.document)
}

/// The parsed spreadsheet, or a format error when any sheet is invalid.
pub async fn get_spreadsheet(
    session: &Session,
    params: DocumentParams,
) -> Result<Spreadsheet, ServiceError> {
    let document_id = extract_document_id(&params.document_id)?;
    tracing::info!(document_id = %document_id, "get spreadsheet");
    let loaded = session.load(&document_id).await?;
    require_valid(validated(&loaded.document)?)
}

/// Validate a raw document and, only when every sheet passes, parse it.
pub(crate) fn validated(raw: &RawDocument) -> Result<LoadAndValidateResponse, ServiceError> {
    let validation = validate_document(raw);
    if !validation.is_valid {
        return Ok(LoadAndValidateResponse {
            is_valid: false,
            spreadsheet: None,
            validation_issues: validation.issues,
        });
    }

    let sheets = raw
        .sheets
        .iter()
        .map(parse_sheet)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| ServiceError::internal(format!("validated sheet failed to parse: {err}")))?;

    Ok(LoadAndValidateResponse {
        is_valid: true,
        spreadsheet: Some(Spreadsheet {
            id: raw.id.clone(),
            title: raw.title.clone(),
            sheets,
        }),
        validation_issues: Vec::new(),
    })
}

pub(crate) fn require_valid(response: LoadAndValidateResponse) -> Result<Spreadsheet, ServiceError> {
    match response.spreadsheet {
        Some(spreadsheet) if response.is_valid => Ok(spreadsheet),
        _ => Err(ServiceError::format(response.validation_issues)),
    }
}

/// Re-read through the repository that performed the write.
pub(crate) async fn reload(
    session: &Session,
    repository: &Arc<dyn SpreadsheetRepository>,
    document_id: &str,
) -> Result<LoadAndValidateResponse, ServiceError> {
    let raw = repository
        .load(document_id)
        .await
        .map_err(|err| session.map_error(err))?;
    validated(&raw)
}

/// Request and response JSON Schemas for every operation, keyed by route name.
pub fn operation_schemas() -> Value {
    fn entry<P: JsonSchema, R: JsonSchema>() -> Value {
        json!({ "params": schema_for!(P), "result": schema_for!(R) })
    }

    json!({
        "load-and-validate": entry::<DocumentParams, LoadAndValidateResponse>(),
        "get-spreadsheet": entry::<DocumentParams, Spreadsheet>(),
        "add-row": entry::<AddRowParams, Spreadsheet>(),
        "update-row": entry::<UpdateRowParams, UpdateRowResponse>(),
        "save-row": entry::<SaveRowParams, Spreadsheet>(),
        "sync": entry::<SyncSpreadsheetParams, SyncResponse>(),
        "add-sheet": entry::<AddSheetParams, Spreadsheet>(),
        "add-language": entry::<AddLanguageColumnParams, Spreadsheet>(),
        "apply-fix": entry::<ApplyFixParams, LoadAndValidateResponse>(),
        "batch-apply-fix": entry::<BatchApplyFixParams, BatchFixResponse>(),
        "export": entry::<ExportParams, I18nDocuments>(),
    })
}
