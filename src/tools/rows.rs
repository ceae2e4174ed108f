use super::{reload, require_valid, validated};
use crate::document_id::extract_document_id;
use crate::errors::{InvalidParamsError, ServiceError};
use crate::merge::{merge_row, plan_sync};
use crate::model::{RawSheet, SheetRow, Spreadsheet, ValidationIssue, normalize_key};
use crate::repository::SheetRef;
use crate::state::Session;
use crate::table::{HeaderIndex, Row, is_key_header};
use crate::validate::validate_raw_sheet;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddRowParams {
    pub document_id: String,
    pub sheet_id: i64,
    pub key: String,
    #[serde(default)]
    pub data: IndexMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRowParams {
    pub document_id: String,
    pub sheet_id: i64,
    pub row_number: u32,
    #[serde(default)]
    pub data: IndexMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveRowParams {
    /// The caller's current local model; its id names the document.
    pub spreadsheet: Spreadsheet,
    pub sheet_id: i64,
    pub row: SheetRow,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncSpreadsheetParams {
    pub spreadsheet: Spreadsheet,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct UpdateRowResponse {
    pub updated: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub rows_written: usize,
}

/// Append a new key to one sheet and return the reloaded spreadsheet.
pub async fn add_row(session: &Session, params: AddRowParams) -> Result<Spreadsheet, ServiceError> {
    let document_id = extract_document_id(&params.document_id)?;
    let key = params.key.trim().to_string();
    if key.is_empty() {
        return Err(InvalidParamsError::new("add_row", "key must not be empty")
            .with_path("key")
            .into());
    }
    reject_key_in_data("add_row", &params.data)?;
    tracing::info!(document_id = %document_id, sheet_id = params.sheet_id, key = %key, "add row");

    let loaded = session.load(&document_id).await?;
    let spreadsheet = require_valid(validated(&loaded.document)?)?;
    let table = spreadsheet
        .sheet(params.sheet_id)
        .ok_or_else(|| sheet_missing(params.sheet_id))?;
    if table.find_row(&key).is_some() {
        return Err(InvalidParamsError::new(
            "add_row",
            format!("key '{key}' already exists in sheet '{}'", table.title),
        )
        .with_path("key")
        .into());
    }

    let raw = raw_sheet(&loaded.document.sheets, params.sheet_id)?;
    let index = header_index(raw)?;
    let mut row = index.empty_row();
    row.set_key(key.as_str());
    for (language, value) in &params.data {
        set_cell(&mut row, "add_row", language, value)?;
    }

    let sheet = SheetRef::new(document_id.clone(), raw.sheet_id, raw.title.clone());
    loaded
        .repository
        .add_row(&sheet, &row.into_cells())
        .await
        .map_err(|err| session.map_error(err))?;

    require_valid(reload(session, &loaded.repository, &document_id).await?)
}

/// Overwrite the given languages of one existing row. Cells not named in `data` keep
/// their current value.
pub async fn update_row(session: &Session, params: UpdateRowParams) -> Result<(), ServiceError> {
    let document_id = extract_document_id(&params.document_id)?;
    if params.row_number < 2 {
        return Err(InvalidParamsError::new(
            "update_row",
            "row numbers start at 2; row 1 is the header",
        )
        .with_path("rowNumber")
        .into());
    }
    reject_key_in_data("update_row", &params.data)?;
    tracing::info!(
        document_id = %document_id,
        sheet_id = params.sheet_id,
        row = params.row_number,
        "update row"
    );

    let loaded = session.load(&document_id).await?;
    let raw = raw_sheet(&loaded.document.sheets, params.sheet_id)?;
    let index = header_index(raw)?;
    let current = raw
        .values
        .get(params.row_number as usize - 1)
        .filter(|cells| !index.row(cells.as_slice()).key().trim().is_empty())
        .ok_or_else(|| {
            let mut err = ServiceError::not_found(format!(
                "row {} of sheet '{}' has no key to update",
                params.row_number, raw.title
            ));
            err.details.path = Some("rowNumber".to_string());
            err
        })?;
    let mut row = index.row_from(current);
    for (language, value) in &params.data {
        set_cell(&mut row, "update_row", language, value)?;
    }

    let sheet = SheetRef::new(document_id, raw.sheet_id, raw.title.clone());
    loaded
        .repository
        .update_row(&sheet, params.row_number, &row.into_cells())
        .await
        .map_err(|err| session.map_error(err))
}

/// Write one edited row (update when the key exists remotely, append otherwise), then
/// fold it into the caller's local model.
pub async fn save_row(session: &Session, params: SaveRowParams) -> Result<Spreadsheet, ServiceError> {
    let SaveRowParams {
        spreadsheet: local,
        sheet_id,
        mut row,
    } = params;
    let document_id = extract_document_id(&local.id)?;
    row.key = row.key.trim().to_string();
    if row.key.is_empty() {
        return Err(InvalidParamsError::new("save_row", "key must not be empty")
            .with_path("row.key")
            .into());
    }
    reject_key_in_data("save_row", &row.data)?;
    tracing::info!(document_id = %document_id, sheet_id, key = %row.key, "save row");

    let loaded = session.load(&document_id).await?;
    let raw = raw_sheet(&loaded.document.sheets, sheet_id)?;
    let index = header_index(raw)?;
    let sheet = SheetRef::new(document_id, raw.sheet_id, raw.title.clone());

    let wanted = normalize_key(&row.key);
    let existing = raw
        .data_rows()
        .iter()
        .enumerate()
        .find(|(_, cells)| normalize_key(index.row(cells).key()) == wanted)
        .map(|(offset, cells)| (offset as u32 + 2, cells));

    match existing {
        Some((row_number, cells)) => {
            let mut cells_row = index.row_from(cells);
            for (language, value) in &row.data {
                set_cell(&mut cells_row, "save_row", language, value)?;
            }
            loaded
                .repository
                .update_row(&sheet, row_number, &cells_row.into_cells())
                .await
                .map_err(|err| session.map_error(err))?;
            row.row_number = row_number;
        }
        None => {
            let mut cells_row = index.empty_row();
            cells_row.set_key(row.key.as_str());
            for (language, value) in &row.data {
                set_cell(&mut cells_row, "save_row", language, value)?;
            }
            loaded
                .repository
                .add_row(&sheet, &cells_row.into_cells())
                .await
                .map_err(|err| session.map_error(err))?;
            row.row_number = 0;
        }
    }

    Ok(merge_row(local, sheet_id, row))
}

/// Push every local row whose key already exists remotely. Never creates rows. Sheets
/// and rows are written one at a time, in order.
pub async fn sync_spreadsheet(
    session: &Session,
    params: SyncSpreadsheetParams,
) -> Result<SyncResponse, ServiceError> {
    let document_id = extract_document_id(&params.spreadsheet.id)?;
    tracing::info!(document_id = %document_id, "sync spreadsheet");

    let loaded = session.load(&document_id).await?;
    let writes = plan_sync(&params.spreadsheet, &loaded.document);
    for write in &writes {
        loaded
            .repository
            .update_row(&write.sheet, write.row_number, &write.values)
            .await
            .map_err(|err| session.map_error(err))?;
    }
    tracing::info!(document_id = %document_id, rows = writes.len(), "sync finished");

    Ok(SyncResponse {
        rows_written: writes.len(),
    })
}

fn sheet_missing(sheet_id: i64) -> ServiceError {
    ServiceError::not_found(format!("sheet {sheet_id} was not found"))
}

fn raw_sheet(sheets: &[RawSheet], sheet_id: i64) -> Result<&RawSheet, ServiceError> {
    sheets
        .iter()
        .find(|sheet| sheet.sheet_id == sheet_id)
        .ok_or_else(|| sheet_missing(sheet_id))
}

fn header_index(raw: &RawSheet) -> Result<HeaderIndex, ServiceError> {
    HeaderIndex::parse(raw.headers()).map_err(|_| {
        let validation = validate_raw_sheet(raw);
        ServiceError::format(vec![ValidationIssue {
            sheet_title: raw.title.clone(),
            errors: validation.errors,
            fixes: validation.fixes,
        }])
    })
}

/// `data` names languages only; the key travels in its own parameter.
fn reject_key_in_data(
    operation: &'static str,
    data: &IndexMap<String, String>,
) -> Result<(), ServiceError> {
    match data.keys().find(|header| is_key_header(header)) {
        Some(header) => Err(InvalidParamsError::new(
            operation,
            format!("'{header}' is the key column, not a language; pass the key separately"),
        )
        .with_path(format!("data.{header}"))
        .into()),
        None => Ok(()),
    }
}

fn set_cell(
    row: &mut Row<'_>,
    operation: &'static str,
    header: &str,
    value: &str,
) -> Result<(), ServiceError> {
    row.set_language(header, value).map_err(|err| {
        ServiceError::from(
            InvalidParamsError::new(operation, err.to_string()).with_path(format!("data.{header}")),
        )
    })
}
