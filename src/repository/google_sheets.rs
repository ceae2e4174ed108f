//! Google Sheets API v4 backend.

use super::a1::{self, CellAddress};
use super::{
    CellUpdate, CredentialProvider, RepositoryConnector, SheetRef, SpreadsheetRepository, Throttle,
};
use crate::errors::RepositoryError;
use crate::model::{AuthType, CellFormat, Color, RawDocument, RawSheet};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, Response, Url};
use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::{Value, json};
use std::sync::Arc;

const META_FIELDS: &str = "spreadsheetId,properties.title,sheets.properties(sheetId,title)";

/// Shared HTTP plumbing; hands out one repository per credential.
pub struct GoogleSheetsConnector {
    client: Client,
    base_url: Url,
    throttle: Arc<Throttle>,
}

impl GoogleSheetsConnector {
    pub fn new(client: Client, base_url: &str, throttle: Arc<Throttle>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("invalid spreadsheet API base url '{base_url}'"))?;
        anyhow::ensure!(
            !base_url.cannot_be_a_base(),
            "spreadsheet API base url '{base_url}' cannot carry a path"
        );
        Ok(Self {
            client,
            base_url,
            throttle,
        })
    }
}

impl RepositoryConnector for GoogleSheetsConnector {
    fn connect(&self, credential: Arc<dyn CredentialProvider>) -> Arc<dyn SpreadsheetRepository> {
        Arc::new(GoogleSheetsRepository {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            throttle: self.throttle.clone(),
            credential,
        })
    }
}

pub struct GoogleSheetsRepository {
    client: Client,
    base_url: Url,
    throttle: Arc<Throttle>,
    credential: Arc<dyn CredentialProvider>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpreadsheetMeta {
    spreadsheet_id: String,
    properties: DocumentProperties,
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct DocumentProperties {
    #[serde(default)]
    title: String,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    title: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    value_ranges: Vec<ValueRange>,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct BatchUpdateResponse {
    #[serde(default)]
    replies: Vec<Value>,
}

impl GoogleSheetsRepository {
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RepositoryError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| RepositoryError::Decode("base url cannot carry a path".to_string()))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        document_id: &str,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T, RepositoryError> {
        let this = self;
        self.throttle
            .run(operation, move || {
                let mut request = this.client.request(method.clone(), url.clone()).query(query);
                if let Some(body) = body {
                    request = request.json(body);
                }
                let request = this.credential.attach(request);
                let auth_type = this.credential.auth_type();
                async move {
                    let response = request.send().await?;
                    decode(response, document_id, auth_type).await
                }
            })
            .await
    }

    async fn read_ranges(
        &self,
        operation: &'static str,
        document_id: &str,
        ranges: Vec<String>,
    ) -> Result<Vec<ValueRange>, RepositoryError> {
        if ranges.is_empty() {
            return Ok(Vec::new());
        }
        let mut query: Vec<(&str, String)> = ranges.into_iter().map(|r| ("ranges", r)).collect();
        query.push(("majorDimension", "ROWS".to_string()));
        let url = self.endpoint(&["spreadsheets", document_id, "values:batchGet"])?;
        let response: BatchGetResponse = self
            .execute(operation, document_id, Method::GET, url, &query, None)
            .await?;
        Ok(response.value_ranges)
    }

    async fn write_ranges(
        &self,
        operation: &'static str,
        document_id: &str,
        data: Vec<(String, Vec<Vec<String>>)>,
    ) -> Result<(), RepositoryError> {
        if data.is_empty() {
            return Ok(());
        }
        let body = json!({
            "valueInputOption": "RAW",
            "data": data
                .into_iter()
                .map(|(range, values)| json!({
                    "range": range,
                    "majorDimension": "ROWS",
                    "values": values,
                }))
                .collect::<Vec<_>>(),
        });
        let url = self.endpoint(&["spreadsheets", document_id, "values:batchUpdate"])?;
        let _: IgnoredAny = self
            .execute(operation, document_id, Method::POST, url, &[], Some(&body))
            .await?;
        Ok(())
    }

    async fn batch_update(
        &self,
        operation: &'static str,
        document_id: &str,
        requests: Vec<Value>,
    ) -> Result<BatchUpdateResponse, RepositoryError> {
        let body = json!({ "requests": requests });
        let segment = format!("{document_id}:batchUpdate");
        let url = self.endpoint(&["spreadsheets", &segment])?;
        self.execute(operation, document_id, Method::POST, url, &[], Some(&body))
            .await
    }

    async fn header_width(&self, sheet: &SheetRef) -> Result<u32, RepositoryError> {
        let ranges = self
            .read_ranges(
                "read_headers",
                &sheet.document_id,
                vec![format!("{}!1:1", a1::quote_sheet_title(&sheet.title))],
            )
            .await?;
        let header = ranges
            .into_iter()
            .next()
            .and_then(|range| range.values.into_iter().next())
            .unwrap_or_default();
        let width = header
            .iter()
            .rposition(|cell| !cell_text(cell).trim().is_empty())
            .map(|idx| idx + 1)
            .unwrap_or(0);
        Ok(width as u32)
    }
}

#[async_trait]
impl SpreadsheetRepository for GoogleSheetsRepository {
    fn auth_type(&self) -> AuthType {
        self.credential.auth_type()
    }

    async fn load(&self, document_id: &str) -> Result<RawDocument, RepositoryError> {
        let url = self.endpoint(&["spreadsheets", document_id])?;
        let meta: SpreadsheetMeta = self
            .execute(
                "load",
                document_id,
                Method::GET,
                url,
                &[("fields", META_FIELDS.to_string())],
                None,
            )
            .await?;

        let ranges = meta
            .sheets
            .iter()
            .map(|sheet| a1::sheet_range(&sheet.properties.title))
            .collect();
        let mut value_ranges = self.read_ranges("load", document_id, ranges).await?.into_iter();

        let sheets = meta
            .sheets
            .into_iter()
            .map(|sheet| {
                let values = value_ranges
                    .next()
                    .map(|range| {
                        range
                            .values
                            .iter()
                            .map(|row| row.iter().map(cell_text).collect())
                            .collect()
                    })
                    .unwrap_or_default();
                RawSheet {
                    sheet_id: sheet.properties.sheet_id,
                    title: sheet.properties.title,
                    values,
                }
            })
            .collect();

        Ok(RawDocument {
            id: meta.spreadsheet_id,
            title: meta.properties.title,
            sheets,
        })
    }

    async fn set_headers(&self, sheet: &SheetRef, headers: &[String]) -> Result<(), RepositoryError> {
        self.write_ranges(
            "set_headers",
            &sheet.document_id,
            vec![(
                a1::row_range(&sheet.title, 1, headers.len()),
                vec![headers.to_vec()],
            )],
        )
        .await
    }

    async fn insert_column(&self, sheet: &SheetRef, index: u32) -> Result<(), RepositoryError> {
        let request = json!({
            "insertDimension": {
                "range": {
                    "sheetId": sheet.sheet_id,
                    "dimension": "COLUMNS",
                    "startIndex": index,
                    "endIndex": index + 1,
                },
                "inheritFromBefore": index > 0,
            }
        });
        self.batch_update("insert_column", &sheet.document_id, vec![request])
            .await?;
        Ok(())
    }

    async fn append_column(
        &self,
        sheet: &SheetRef,
        name: &str,
        format_from: Option<u32>,
    ) -> Result<u32, RepositoryError> {
        let column = self.header_width(sheet).await?;
        let mut requests = vec![json!({
            "appendDimension": {
                "sheetId": sheet.sheet_id,
                "dimension": "COLUMNS",
                "length": 1,
            }
        })];
        if let Some(source) = format_from {
            requests.push(copy_format_request(
                sheet.sheet_id,
                CellAddress::header(source),
                CellAddress::header(column),
            ));
        }
        self.batch_update("append_column", &sheet.document_id, requests)
            .await?;
        self.write_ranges(
            "append_column",
            &sheet.document_id,
            vec![(
                a1::cell_range(&sheet.title, CellAddress::header(column)),
                vec![vec![name.to_string()]],
            )],
        )
        .await?;
        Ok(column)
    }

    async fn add_row(&self, sheet: &SheetRef, values: &[String]) -> Result<(), RepositoryError> {
        let segment = format!("{}!A1:append", a1::quote_sheet_title(&sheet.title));
        let url = self.endpoint(&["spreadsheets", &sheet.document_id, "values", &segment])?;
        let body = json!({ "majorDimension": "ROWS", "values": [values] });
        let query = [
            ("valueInputOption", "RAW".to_string()),
            ("insertDataOption", "INSERT_ROWS".to_string()),
        ];
        let _: IgnoredAny = self
            .execute(
                "add_row",
                &sheet.document_id,
                Method::POST,
                url,
                &query,
                Some(&body),
            )
            .await?;
        Ok(())
    }

    async fn update_row(
        &self,
        sheet: &SheetRef,
        row_number: u32,
        values: &[String],
    ) -> Result<(), RepositoryError> {
        self.write_ranges(
            "update_row",
            &sheet.document_id,
            vec![(
                a1::row_range(&sheet.title, row_number, values.len()),
                vec![values.to_vec()],
            )],
        )
        .await
    }

    async fn write_cells(&self, sheet: &SheetRef, updates: &[CellUpdate]) -> Result<(), RepositoryError> {
        let data = updates
            .iter()
            .map(|update| {
                (
                    a1::cell_range(&sheet.title, update.cell),
                    vec![vec![update.value.clone()]],
                )
            })
            .collect();
        self.write_ranges("write_cells", &sheet.document_id, data)
            .await
    }

    async fn set_cell_format(
        &self,
        sheet: &SheetRef,
        cell: CellAddress,
        format: &CellFormat,
    ) -> Result<(), RepositoryError> {
        let mut user_format = json!({ "textFormat": { "bold": format.bold } });
        let mut fields = "userEnteredFormat.textFormat.bold".to_string();
        if let Some(color) = format.background {
            user_format["backgroundColor"] = color_json(color);
            fields.push_str(",userEnteredFormat.backgroundColor");
        }
        let request = json!({
            "repeatCell": {
                "range": grid_range(sheet.sheet_id, cell),
                "cell": { "userEnteredFormat": user_format },
                "fields": fields,
            }
        });
        self.batch_update("set_cell_format", &sheet.document_id, vec![request])
            .await?;
        Ok(())
    }

    async fn copy_cell_format(
        &self,
        sheet: &SheetRef,
        from: CellAddress,
        to: CellAddress,
    ) -> Result<(), RepositoryError> {
        let request = copy_format_request(sheet.sheet_id, from, to);
        self.batch_update("copy_cell_format", &sheet.document_id, vec![request])
            .await?;
        Ok(())
    }

    async fn add_sheet(&self, document_id: &str, title: &str) -> Result<SheetRef, RepositoryError> {
        let request = json!({ "addSheet": { "properties": { "title": title } } });
        let response = self
            .batch_update("add_sheet", document_id, vec![request])
            .await?;
        let sheet_id = response
            .replies
            .first()
            .and_then(|reply| reply.pointer("/addSheet/properties/sheetId"))
            .and_then(Value::as_i64)
            .ok_or_else(|| RepositoryError::Decode("addSheet reply has no sheetId".to_string()))?;
        Ok(SheetRef::new(document_id, sheet_id, title))
    }
}

async fn decode<T: DeserializeOwned>(
    response: Response,
    document_id: &str,
    auth_type: AuthType,
) -> Result<T, RepositoryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RepositoryError::from_status(
        document_id,
        auth_type,
        status.as_u16(),
        api_error_message(&body),
    ))
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn grid_range(sheet_id: i64, cell: CellAddress) -> Value {
    json!({
        "sheetId": sheet_id,
        "startRowIndex": cell.row - 1,
        "endRowIndex": cell.row,
        "startColumnIndex": cell.column,
        "endColumnIndex": cell.column + 1,
    })
}

fn copy_format_request(sheet_id: i64, from: CellAddress, to: CellAddress) -> Value {
    json!({
        "copyPaste": {
            "source": grid_range(sheet_id, from),
            "destination": grid_range(sheet_id, to),
            "pasteType": "PASTE_FORMAT",
        }
    })
}

fn color_json(color: Color) -> Value {
    json!({ "red": color.red, "green": color.green, "blue": color.blue })
}
