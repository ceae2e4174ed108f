use super::reload;
use crate::document_id::extract_document_id;
use crate::errors::{InvalidParamsError, ServiceError};
use crate::fixes::{FixRequest, apply_fix_to_sheet, batch_apply_fixes};
use crate::model::{BatchFixResponse, FixSummary, FixType, LoadAndValidateResponse};
use crate::state::Session;
use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyFixParams {
    pub document_id: String,
    pub sheet_title: String,
    pub fix_type: FixType,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchApplyFixParams {
    pub document_id: String,
    pub fixes: Vec<FixRequest>,
}

/// Apply one fix and return the re-validated document.
pub async fn apply_fix(
    session: &Session,
    params: ApplyFixParams,
) -> Result<LoadAndValidateResponse, ServiceError> {
    let document_id = extract_document_id(&params.document_id)?;
    let loaded = session.load(&document_id).await?;
    let raw = loaded
        .document
        .sheet_by_title(&params.sheet_title)
        .ok_or_else(|| {
            ServiceError::not_found(format!("sheet '{}' was not found", params.sheet_title))
        })?;

    apply_fix_to_sheet(
        loaded.repository.as_ref(),
        &document_id,
        raw,
        params.fix_type,
    )
    .await
    .map_err(|err| session.map_fix_error(err))?;

    reload(session, &loaded.repository, &document_id).await
}

/// Apply fixes concurrently, collect every outcome, then reload once.
pub async fn batch_apply_fix(
    session: &Session,
    params: BatchApplyFixParams,
) -> Result<BatchFixResponse, ServiceError> {
    let document_id = extract_document_id(&params.document_id)?;
    if params.fixes.is_empty() {
        return Err(
            InvalidParamsError::new("batch_apply_fix", "at least one fix is required")
                .with_path("fixes")
                .into(),
        );
    }
    tracing::info!(document_id = %document_id, count = params.fixes.len(), "batch apply fixes");

    let loaded = session.load(&document_id).await?;
    let results = batch_apply_fixes(loaded.repository.clone(), &loaded.document, &params.fixes).await;

    let successful = results.iter().filter(|result| result.success).count();
    let summary = FixSummary {
        total: results.len(),
        successful,
        failed: results.len() - successful,
    };

    let spreadsheet = match reload(session, &loaded.repository, &document_id).await {
        Ok(response) => Some(response),
        Err(err) => {
            tracing::warn!(document_id = %document_id, error = %err, "reload after fixes failed");
            None
        }
    };

    Ok(BatchFixResponse {
        results,
        summary,
        spreadsheet,
    })
}
