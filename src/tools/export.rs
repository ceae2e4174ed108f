use crate::errors::{InvalidParamsError, ServiceError};
use crate::model::Spreadsheet;
use crate::transform::{I18nDocuments, fill_from_fallback, to_i18n};
use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportParams {
    pub spreadsheet: Spreadsheet,
    #[serde(default)]
    pub fallback_language: Option<String>,
}

/// One nested document per language. With a fallback language, blank values are filled
/// from it first.
pub fn export_to_i18n(params: ExportParams) -> Result<I18nDocuments, ServiceError> {
    let ExportParams {
        spreadsheet,
        fallback_language,
    } = params;
    tracing::info!(
        document_id = %spreadsheet.id,
        fallback = fallback_language.as_deref().unwrap_or(""),
        "export to i18n"
    );

    let fallback = fallback_language
        .map(|language| language.trim().to_string())
        .filter(|language| !language.is_empty());

    let Some(fallback) = fallback else {
        return Ok(to_i18n(&spreadsheet));
    };

    let known = spreadsheet
        .languages()
        .iter()
        .any(|language| language.eq_ignore_ascii_case(&fallback));
    if !known {
        return Err(InvalidParamsError::new(
            "export_to_i18n",
            format!("fallback language '{fallback}' is not a column of this spreadsheet"),
        )
        .with_path("fallbackLanguage")
        .into());
    }

    Ok(to_i18n(&fill_from_fallback(&spreadsheet, &fallback)))
}
