use crate::cli::Backend;
use crate::fixes::FixRequest;
use crate::model::{BatchFixResponse, FixResult, FixSummary, FixType, LoadAndValidateResponse};
use crate::tools::{
    self, AddLanguageColumnParams, AddSheetParams, ApplyFixParams, BatchApplyFixParams,
    DocumentParams,
};
use anyhow::{Result, bail};
use serde_json::Value;

/// Upper bound on repair rounds for `fix --all`; one fix type per sheet per round.
const MAX_FIX_ROUNDS: usize = 5;

pub async fn validate(backend: &Backend) -> Result<Value> {
    let session = backend.session();
    let response = tools::load_and_validate(
        &session,
        DocumentParams {
            document_id: backend.document_id()?,
        },
    )
    .await?;
    Ok(serde_json::to_value(response)?)
}

pub async fn fix(
    backend: &Backend,
    sheet: Option<String>,
    fix_type: Option<FixType>,
    all: bool,
) -> Result<Value> {
    if all {
        return fix_all(backend).await;
    }
    let (Some(sheet_title), Some(fix_type)) = (sheet, fix_type) else {
        bail!("pass --sheet and --fix-type, or --all");
    };

    let session = backend.session();
    let response = tools::apply_fix(
        &session,
        ApplyFixParams {
            document_id: backend.document_id()?,
            sheet_title,
            fix_type,
        },
    )
    .await?;
    backend.persist()?;
    Ok(serde_json::to_value(response)?)
}

/// Apply suggested fixes round by round until the document validates or a round
/// repairs nothing. Fixes within a round touch different sheets.
async fn fix_all(backend: &Backend) -> Result<Value> {
    let session = backend.session();
    let document_id = backend.document_id()?;
    let mut current = tools::load_and_validate(
        &session,
        DocumentParams {
            document_id: document_id.clone(),
        },
    )
    .await?;
    let mut results: Vec<FixResult> = Vec::new();

    for _ in 0..MAX_FIX_ROUNDS {
        let fixes = next_round(&current);
        if fixes.is_empty() {
            break;
        }
        let batch = tools::batch_apply_fix(
            &session,
            BatchApplyFixParams {
                document_id: document_id.clone(),
                fixes,
            },
        )
        .await?;
        let progressed = batch.summary.successful > 0;
        results.extend(batch.results);
        backend.persist()?;

        current = match batch.spreadsheet {
            Some(response) => response,
            None => {
                tools::load_and_validate(
                    &session,
                    DocumentParams {
                        document_id: document_id.clone(),
                    },
                )
                .await?
            }
        };
        if !progressed {
            break;
        }
    }

    let successful = results.iter().filter(|result| result.success).count();
    let response = BatchFixResponse {
        summary: FixSummary {
            total: results.len(),
            successful,
            failed: results.len() - successful,
        },
        results,
        spreadsheet: Some(current),
    };
    Ok(serde_json::to_value(response)?)
}

fn next_round(response: &LoadAndValidateResponse) -> Vec<FixRequest> {
    response
        .validation_issues
        .iter()
        .filter_map(|issue| {
            issue.fixes.first().map(|fix| FixRequest {
                sheet_title: issue.sheet_title.clone(),
                fix_type: fix.fix_type,
            })
        })
        .collect()
}

pub async fn add_language(backend: &Backend, language: String) -> Result<Value> {
    let session = backend.session();
    let spreadsheet = tools::add_language_column(
        &session,
        AddLanguageColumnParams {
            document_id: backend.document_id()?,
            language,
        },
    )
    .await?;
    backend.persist()?;
    Ok(serde_json::to_value(spreadsheet)?)
}

pub async fn add_sheet(backend: &Backend, title: String) -> Result<Value> {
    let session = backend.session();
    let spreadsheet = tools::add_sheet(
        &session,
        AddSheetParams {
            document_id: backend.document_id()?,
            title,
        },
    )
    .await?;
    backend.persist()?;
    Ok(serde_json::to_value(spreadsheet)?)
}
