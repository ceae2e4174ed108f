use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::Display;

/// One translation entry: a key plus one value per language header.
///
/// `row_number` is the 1-based spreadsheet row; the header occupies row 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SheetRow {
    pub row_number: u32,
    pub key: String,
    pub data: IndexMap<String, String>,
}

/// One tab of the document, i.e. one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SheetTable {
    pub sheet_id: i64,
    pub title: String,
    /// Language headers in column order.
    #[serde(default)]
    pub languages: Vec<String>,
    pub rows: Vec<SheetRow>,
}

impl SheetTable {
    pub fn find_row(&self, key: &str) -> Option<&SheetRow> {
        let wanted = normalize_key(key);
        self.rows.iter().find(|row| normalize_key(&row.key) == wanted)
    }
}

/// Parsed document. Rebuilt from the store on every load and never treated as the
/// authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Spreadsheet {
    pub id: String,
    pub title: String,
    pub sheets: Vec<SheetTable>,
}

impl Spreadsheet {
    pub fn sheet(&self, sheet_id: i64) -> Option<&SheetTable> {
        self.sheets.iter().find(|sheet| sheet.sheet_id == sheet_id)
    }

    pub fn sheet_by_title(&self, title: &str) -> Option<&SheetTable> {
        self.sheets.iter().find(|sheet| sheet.title == title)
    }

    /// Union of language headers across all sheets, first-seen order.
    pub fn languages(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for sheet in &self.sheets {
            for language in &sheet.languages {
                if !out
                    .iter()
                    .any(|existing| existing.eq_ignore_ascii_case(language))
                {
                    out.push(language.clone());
                }
            }
        }
        out
    }
}

/// Unvalidated grid for one tab as returned by a repository. `values[0]` is the header
/// row when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSheet {
    pub sheet_id: i64,
    pub title: String,
    #[serde(default)]
    pub values: Vec<Vec<String>>,
}

impl RawSheet {
    pub fn headers(&self) -> &[String] {
        self.values.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn data_rows(&self) -> &[Vec<String>] {
        self.values.get(1..).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocument {
    pub id: String,
    pub title: String,
    pub sheets: Vec<RawSheet>,
}

impl RawDocument {
    pub fn sheet_by_title(&self, title: &str) -> Option<&RawSheet> {
        self.sheets.iter().find(|sheet| sheet.title == title)
    }

    pub fn sheet(&self, sheet_id: i64) -> Option<&RawSheet> {
        self.sheets.iter().find(|sheet| sheet.sheet_id == sheet_id)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum FixType {
    NoHeaders,
    MissingKey,
    DuplicateKeys,
    EmptyKeys,
    NoLanguages,
}

/// Pointer to a repair operation. Applying it needs the document id and sheet title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FixDescriptor {
    #[serde(rename = "type")]
    pub fix_type: FixType,
    pub title: String,
    pub description: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub sheet_title: String,
    pub errors: Vec<String>,
    pub fixes: Vec<FixDescriptor>,
}

/// RGB channels in `0.0..=1.0`, the representation the Sheets API uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellFormat {
    pub bold: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Color>,
}

impl CellFormat {
    /// Bold text on a light blue fill.
    pub fn header() -> Self {
        Self {
            bold: true,
            background: Some(Color {
                red: 0.81,
                green: 0.89,
                blue: 0.95,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    User,
    ServiceAccount,
}

impl AuthType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::ServiceAccount => "service_account",
        }
    }
}

impl std::fmt::Display for AuthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadAndValidateResponse {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spreadsheet: Option<Spreadsheet>,
    pub validation_issues: Vec<ValidationIssue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FixResult {
    pub sheet_title: String,
    pub fix_type: FixType,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FixSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchFixResponse {
    pub results: Vec<FixResult>,
    pub summary: FixSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spreadsheet: Option<LoadAndValidateResponse>,
}

/// Trimmed, lower-cased form used for key uniqueness.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}
