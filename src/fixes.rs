//! Automated repairs for the defects reported by [`crate::validate`].
//!
//! Planning is pure and works on the key column of a raw grid; application turns a plan
//! into repository calls.

use crate::errors::RepositoryError;
use crate::model::{CellFormat, FixResult, FixType, RawDocument, RawSheet, normalize_key};
use crate::repository::{CellAddress, CellUpdate, SheetRef, SpreadsheetRepository};
use crate::table::{HeaderIndex, KEY_HEADER, is_blank_row, is_key_header};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

pub const DEFAULT_LANGUAGE: &str = "English";

#[derive(Debug, Error)]
pub enum FixError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("{fix_type} cannot be applied to sheet '{sheet}': {reason}")]
    NotApplicable {
        fix_type: FixType,
        sheet: String,
        reason: String,
    },
}

impl FixError {
    fn not_applicable(fix_type: FixType, sheet: &str, reason: impl Into<String>) -> Self {
        Self::NotApplicable {
            fix_type,
            sheet: sheet.to_string(),
            reason: reason.into(),
        }
    }
}

/// One `(sheet, fix)` pair of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FixRequest {
    pub sheet_title: String,
    pub fix_type: FixType,
}

/// A key cell to rewrite, addressed by sheet row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAssignment {
    pub row_number: u32,
    pub key: String,
}

/// Rename every repeated key after its first occurrence to `<key>_<n>`.
///
/// `n` starts at 2 for each duplicate group and skips any candidate that is already a
/// key in the sheet or was produced by an earlier rename.
pub fn plan_duplicate_key_renames(keys: &[(u32, String)]) -> Vec<KeyAssignment> {
    let mut taken: HashSet<String> = keys
        .iter()
        .map(|(_, key)| normalize_key(key))
        .filter(|key| !key.is_empty())
        .collect();
    let mut kept: HashSet<String> = HashSet::new();
    let mut counters: HashMap<String, u32> = HashMap::new();
    let mut plan = Vec::new();

    for (row_number, key) in keys {
        let original = key.trim();
        let normalized = normalize_key(original);
        if normalized.is_empty() {
            continue;
        }
        if kept.insert(normalized.clone()) {
            continue;
        }

        let counter = counters.entry(normalized).or_insert(1);
        let renamed = loop {
            *counter += 1;
            let candidate = format!("{original}_{counter}");
            if !taken.contains(&normalize_key(&candidate)) {
                break candidate;
            }
        };
        taken.insert(normalize_key(&renamed));
        plan.push(KeyAssignment {
            row_number: *row_number,
            key: renamed,
        });
    }

    plan
}

/// `auto_key_<i>` for every empty key, `i` counting empty rows only.
pub fn plan_empty_key_fills(keys: &[(u32, String)]) -> Vec<KeyAssignment> {
    keys.iter()
        .filter(|(_, key)| key.trim().is_empty())
        .enumerate()
        .map(|(idx, (row_number, _))| KeyAssignment {
            row_number: *row_number,
            key: format!("auto_key_{}", idx + 1),
        })
        .collect()
}

/// `(row_number, trimmed key)` for every non-blank data row.
fn key_cells(raw: &RawSheet, index: &HeaderIndex) -> Vec<(u32, String)> {
    raw.data_rows()
        .iter()
        .enumerate()
        .filter(|(_, cells)| !is_blank_row(cells))
        .map(|(offset, cells)| {
            (
                offset as u32 + 2,
                index.row(cells).key().trim().to_string(),
            )
        })
        .collect()
}

fn key_updates(column: usize, plan: Vec<KeyAssignment>) -> Vec<CellUpdate> {
    plan.into_iter()
        .map(|assignment| {
            CellUpdate::new(
                CellAddress::new(assignment.row_number, column as u32),
                assignment.key,
            )
        })
        .collect()
}

/// Load the document, then repair one sheet.
pub async fn apply_fix(
    repository: &dyn SpreadsheetRepository,
    document_id: &str,
    sheet_title: &str,
    fix_type: FixType,
) -> Result<(), FixError> {
    let document = repository.load(document_id).await?;
    let raw = document
        .sheet_by_title(sheet_title)
        .ok_or_else(|| RepositoryError::SheetNotFound {
            document_id: document_id.to_string(),
            title: sheet_title.to_string(),
        })?;
    apply_fix_to_sheet(repository, document_id, raw, fix_type).await
}

/// Repair one sheet given its current contents.
pub async fn apply_fix_to_sheet(
    repository: &dyn SpreadsheetRepository,
    document_id: &str,
    raw: &RawSheet,
    fix_type: FixType,
) -> Result<(), FixError> {
    let sheet = SheetRef::new(document_id, raw.sheet_id, raw.title.clone());
    tracing::info!(document_id, sheet = %raw.title, fix = %fix_type, "applying fix");

    match fix_type {
        FixType::NoHeaders => {
            if !is_blank_row(raw.headers()) {
                return Err(FixError::not_applicable(
                    fix_type,
                    &raw.title,
                    "the header row is not empty",
                ));
            }
            let headers = vec![KEY_HEADER.to_string(), DEFAULT_LANGUAGE.to_string()];
            repository.set_headers(&sheet, &headers).await?;
            let style = CellFormat::header();
            for column in 0..headers.len() as u32 {
                repository
                    .set_cell_format(&sheet, CellAddress::header(column), &style)
                    .await?;
            }
        }
        FixType::MissingKey => {
            if raw.headers().iter().any(|h| is_key_header(h)) {
                return Err(FixError::not_applicable(
                    fix_type,
                    &raw.title,
                    "a KEY column already exists",
                ));
            }
            let has_neighbour = raw
                .headers()
                .first()
                .is_some_and(|header| !header.trim().is_empty());

            repository.insert_column(&sheet, 0).await?;

            let mut updates = vec![CellUpdate::new(CellAddress::header(0), KEY_HEADER)];
            let filled = raw
                .data_rows()
                .iter()
                .enumerate()
                .filter(|(_, cells)| !is_blank_row(cells));
            for (position, (offset, _)) in filled.enumerate() {
                updates.push(CellUpdate::new(
                    CellAddress::new(offset as u32 + 2, 0),
                    format!("item_{}", position + 1),
                ));
            }
            repository.write_cells(&sheet, &updates).await?;

            if has_neighbour {
                repository
                    .copy_cell_format(&sheet, CellAddress::header(1), CellAddress::header(0))
                    .await?;
            } else {
                repository
                    .set_cell_format(&sheet, CellAddress::header(0), &CellFormat::header())
                    .await?;
            }
        }
        FixType::DuplicateKeys | FixType::EmptyKeys => {
            let index = HeaderIndex::parse(raw.headers())
                .map_err(|err| FixError::not_applicable(fix_type, &raw.title, err.to_string()))?;
            let keys = key_cells(raw, &index);
            let plan = if fix_type == FixType::DuplicateKeys {
                plan_duplicate_key_renames(&keys)
            } else {
                plan_empty_key_fills(&keys)
            };
            if plan.is_empty() {
                tracing::debug!(sheet = %raw.title, fix = %fix_type, "nothing to repair");
                return Ok(());
            }
            let updates = key_updates(index.key_column(), plan);
            repository.write_cells(&sheet, &updates).await?;
        }
        FixType::NoLanguages => {
            let key_column = raw
                .headers()
                .iter()
                .position(|h| is_key_header(h))
                .ok_or_else(|| {
                    FixError::not_applicable(fix_type, &raw.title, "the sheet has no KEY column")
                })?;
            repository
                .append_column(&sheet, DEFAULT_LANGUAGE, Some(key_column as u32))
                .await?;
        }
    }

    Ok(())
}

/// Apply every request concurrently. One failure never affects the others; results come
/// back in request order.
pub async fn batch_apply_fixes(
    repository: Arc<dyn SpreadsheetRepository>,
    document: &RawDocument,
    requests: &[FixRequest],
) -> Vec<FixResult> {
    let mut results: Vec<FixResult> = requests
        .iter()
        .map(|request| FixResult {
            sheet_title: request.sheet_title.clone(),
            fix_type: request.fix_type,
            success: false,
            error: Some("fix task did not complete".to_string()),
        })
        .collect();

    let mut tasks = JoinSet::new();
    for (idx, request) in requests.iter().enumerate() {
        let repository = repository.clone();
        let document_id = document.id.clone();
        let raw = document.sheet_by_title(&request.sheet_title).cloned();
        let request = request.clone();
        tasks.spawn(async move {
            let outcome = match raw {
                Some(raw) => {
                    apply_fix_to_sheet(repository.as_ref(), &document_id, &raw, request.fix_type).await
                }
                None => Err(FixError::Repository(RepositoryError::SheetNotFound {
                    document_id,
                    title: request.sheet_title.clone(),
                })),
            };
            (idx, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, Ok(()))) => {
                results[idx].success = true;
                results[idx].error = None;
            }
            Ok((idx, Err(err))) => {
                tracing::warn!(
                    sheet = %results[idx].sheet_title,
                    fix = %results[idx].fix_type,
                    error = %err,
                    "fix failed"
                );
                results[idx].error = Some(err.to_string());
            }
            Err(join_error) => {
                tracing::error!(error = %join_error, "fix task aborted");
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: &[&str]) -> Vec<(u32, String)> {
        items
            .iter()
            .enumerate()
            .map(|(idx, key)| (idx as u32 + 2, key.to_string()))
            .collect()
    }

    #[test]
    fn duplicates_get_numbered_suffixes_per_group() {
        let plan = plan_duplicate_key_renames(&keys(&["hello", "bye", "Hello", "hello", "bye"]));
        assert_eq!(
            plan,
            vec![
                KeyAssignment { row_number: 4, key: "Hello_2".to_string() },
                KeyAssignment { row_number: 5, key: "hello_3".to_string() },
                KeyAssignment { row_number: 6, key: "bye_2".to_string() },
            ]
        );
    }

    #[test]
    fn renames_never_collide_with_existing_keys() {
        let input = keys(&["a", "a", "a_2", "a", "a_2"]);
        let plan = plan_duplicate_key_renames(&input);

        let mut final_keys: Vec<String> = input.iter().map(|(_, k)| k.clone()).collect();
        for assignment in &plan {
            final_keys[assignment.row_number as usize - 2] = assignment.key.clone();
        }
        let unique: HashSet<String> = final_keys.iter().map(|k| normalize_key(k)).collect();
        assert_eq!(unique.len(), final_keys.len(), "{final_keys:?}");
        assert_eq!(final_keys[1], "a_3");
    }

    #[test]
    fn empty_keys_are_counted_over_empty_rows_only() {
        let plan = plan_empty_key_fills(&keys(&["a", "", "b", "   "]));
        assert_eq!(
            plan,
            vec![
                KeyAssignment { row_number: 3, key: "auto_key_1".to_string() },
                KeyAssignment { row_number: 5, key: "auto_key_2".to_string() },
            ]
        );
    }

    #[test]
    fn duplicate_planning_ignores_empty_keys() {
        assert!(plan_duplicate_key_renames(&keys(&["", "", "x"])).is_empty());
    }
}
