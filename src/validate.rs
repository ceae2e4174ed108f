use crate::model::{FixDescriptor, FixType, RawDocument, RawSheet, ValidationIssue, normalize_key};
use crate::table::{HeaderError, HeaderIndex, is_blank_row};
use serde::Serialize;
use std::collections::HashMap;

/// Outcome of validating one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub fixes: Vec<FixDescriptor>,
}

impl SheetValidation {
    fn from_parts(errors: Vec<String>, fixes: Vec<FixDescriptor>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            fixes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentValidation {
    pub is_valid: bool,
    pub issues: Vec<ValidationIssue>,
}

/// Validate a header row and its data rows.
///
/// Header problems are fatal: the first one found is reported and row checks are
/// skipped. Rows that are entirely blank are ignored.
pub fn validate_sheet(title: &str, headers: &[String], rows: &[Vec<String>]) -> SheetValidation {
    let index = match HeaderIndex::parse(headers) {
        Ok(index) => index,
        Err(err) => {
            let (message, fix) = header_failure(&err);
            return SheetValidation::from_parts(vec![message], fix.into_iter().collect());
        }
    };

    let mut errors = Vec::new();
    let mut fixes = Vec::new();

    let mut empty_keys = 0usize;
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut duplicates: Vec<String> = Vec::new();

    for (offset, cells) in rows.iter().enumerate() {
        if is_blank_row(cells) {
            continue;
        }
        let view = index.row(cells);
        let key = view.key().trim();
        if key.is_empty() {
            empty_keys += 1;
            continue;
        }

        let count = counts.entry(normalize_key(key)).or_insert(0);
        *count += 1;
        if *count == 2 {
            duplicates.push(key.to_string());
        }

        let untranslated = view.values().values().all(|value| value.trim().is_empty());
        if untranslated {
            tracing::warn!(
                sheet = title,
                row = offset + 2,
                key,
                "row has no translations"
            );
        }
    }

    if empty_keys > 0 {
        errors.push(format!("{empty_keys} row(s) have empty keys"));
        fixes.push(descriptor(
            FixType::EmptyKeys,
            format!("{empty_keys} row(s) have no key. Generates auto_key_N keys for them."),
        ));
    }

    if !duplicates.is_empty() {
        let listed = duplicates.join(", ");
        errors.push(format!("Duplicate keys found: {listed}"));
        fixes.push(descriptor(
            FixType::DuplicateKeys,
            format!("Keys used more than once: {listed}. Later occurrences get a numeric suffix."),
        ));
    }

    SheetValidation::from_parts(errors, fixes)
}

pub fn validate_raw_sheet(sheet: &RawSheet) -> SheetValidation {
    validate_sheet(&sheet.title, sheet.headers(), sheet.data_rows())
}

/// Validate every sheet; the document is valid only when all sheets are.
pub fn validate_document(document: &RawDocument) -> DocumentValidation {
    let issues: Vec<ValidationIssue> = document
        .sheets
        .iter()
        .filter_map(|sheet| {
            let result = validate_raw_sheet(sheet);
            if result.is_valid {
                None
            } else {
                Some(ValidationIssue {
                    sheet_title: sheet.title.clone(),
                    errors: result.errors,
                    fixes: result.fixes,
                })
            }
        })
        .collect();

    DocumentValidation {
        is_valid: issues.is_empty(),
        issues,
    }
}

fn header_failure(error: &HeaderError) -> (String, Option<FixDescriptor>) {
    match error {
        HeaderError::Empty => (
            "Sheet has no header row".to_string(),
            Some(descriptor(
                FixType::NoHeaders,
                "The first row is empty. Adds KEY and English header columns.".to_string(),
            )),
        ),
        HeaderError::MissingKey => (
            "Missing KEY column in header row".to_string(),
            Some(descriptor(
                FixType::MissingKey,
                "No column is named KEY. Inserts a KEY column first and generates item_N keys."
                    .to_string(),
            )),
        ),
        HeaderError::NoLanguages => (
            "No language columns found in header row".to_string(),
            Some(descriptor(
                FixType::NoLanguages,
                "Only the KEY column exists. Appends an English column.".to_string(),
            )),
        ),
        // No automated repair for duplicate headers.
        HeaderError::Duplicate(names) => (format!("Duplicate header names: {names}"), None),
        HeaderError::Unknown(name) => (format!("Unknown header '{name}'"), None),
    }
}

/// Catalog entry for a fix type.
pub fn descriptor(fix_type: FixType, description: String) -> FixDescriptor {
    let (title, action) = match fix_type {
        FixType::NoHeaders => ("Add header row", "Add headers"),
        FixType::MissingKey => ("Add KEY column", "Add KEY column"),
        FixType::DuplicateKeys => ("Rename duplicate keys", "Rename duplicates"),
        FixType::EmptyKeys => ("Generate missing keys", "Generate keys"),
        FixType::NoLanguages => ("Add language column", "Add English column"),
    };
    FixDescriptor {
        fix_type,
        title: title.to_string(),
        description,
        action: action.to_string(),
    }
}
