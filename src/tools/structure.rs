use super::{reload, require_valid};
use crate::document_id::extract_document_id;
use crate::errors::{InvalidParamsError, ServiceError};
use crate::fixes::DEFAULT_LANGUAGE;
use crate::model::{CellFormat, Spreadsheet};
use crate::repository::{CellAddress, SheetRef};
use crate::state::Session;
use crate::table::{HeaderIndex, KEY_HEADER, is_key_header};
use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddSheetParams {
    pub document_id: String,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddLanguageColumnParams {
    pub document_id: String,
    #[serde(alias = "languageName")]
    pub language: String,
}

/// Create a tab whose header copies the first valid sheet's KEY and language columns.
pub async fn add_sheet(session: &Session, params: AddSheetParams) -> Result<Spreadsheet, ServiceError> {
    let document_id = extract_document_id(&params.document_id)?;
    let title = params.title.trim().to_string();
    if title.is_empty() {
        return Err(InvalidParamsError::new("add_sheet", "sheet title must not be empty")
            .with_path("title")
            .into());
    }
    tracing::info!(document_id = %document_id, sheet = %title, "add sheet");

    let loaded = session.load(&document_id).await?;
    if loaded
        .document
        .sheets
        .iter()
        .any(|sheet| sheet.title.eq_ignore_ascii_case(&title))
    {
        return Err(InvalidParamsError::new(
            "add_sheet",
            format!("a sheet named '{title}' already exists"),
        )
        .with_path("title")
        .into());
    }

    let headers: Vec<String> = loaded
        .document
        .sheets
        .iter()
        .find_map(|sheet| HeaderIndex::parse(sheet.headers()).ok())
        .map(|index| {
            std::iter::once(KEY_HEADER.to_string())
                .chain(index.language_names())
                .collect()
        })
        .unwrap_or_else(|| vec![KEY_HEADER.to_string(), DEFAULT_LANGUAGE.to_string()]);

    let repository = &loaded.repository;
    let sheet = repository
        .add_sheet(&document_id, &title)
        .await
        .map_err(|err| session.map_error(err))?;
    repository
        .set_headers(&sheet, &headers)
        .await
        .map_err(|err| session.map_error(err))?;
    let style = CellFormat::header();
    for column in 0..headers.len() as u32 {
        repository
            .set_cell_format(&sheet, CellAddress::header(column), &style)
            .await
            .map_err(|err| session.map_error(err))?;
    }

    require_valid(reload(session, repository, &document_id).await?)
}

/// Append a language column to every sheet, copying the KEY header's formatting.
pub async fn add_language_column(
    session: &Session,
    params: AddLanguageColumnParams,
) -> Result<Spreadsheet, ServiceError> {
    let document_id = extract_document_id(&params.document_id)?;
    let language = params.language.trim().to_string();
    if language.is_empty() || is_key_header(&language) {
        return Err(InvalidParamsError::new(
            "add_language_column",
            "language name must be non-empty and not KEY",
        )
        .with_path("language")
        .into());
    }
    tracing::info!(document_id = %document_id, language = %language, "add language column");

    let loaded = session.load(&document_id).await?;
    let exists = loaded.document.sheets.iter().any(|sheet| {
        sheet
            .headers()
            .iter()
            .any(|header| header.trim().eq_ignore_ascii_case(&language))
    });
    if exists {
        return Err(InvalidParamsError::new(
            "add_language_column",
            format!("language '{language}' already exists"),
        )
        .with_path("language")
        .into());
    }

    for raw in &loaded.document.sheets {
        let Some(key_column) = raw.headers().iter().position(|h| is_key_header(h)) else {
            tracing::warn!(sheet = %raw.title, "sheet has no KEY column, language not added");
            continue;
        };
        let sheet = SheetRef::new(document_id.clone(), raw.sheet_id, raw.title.clone());
        loaded
            .repository
            .append_column(&sheet, &language, Some(key_column as u32))
            .await
            .map_err(|err| session.map_error(err))?;
    }

    require_valid(reload(session, &loaded.repository, &document_id).await?)
}
