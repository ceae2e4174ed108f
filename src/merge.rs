use crate::model::{RawDocument, SheetRow, Spreadsheet, normalize_key};
use crate::repository::SheetRef;
use crate::table::{HeaderIndex, is_blank_row};
use indexmap::IndexMap;

/// Fold a row the store has accepted back into the local model.
///
/// The row is matched by key inside the sheet with `sheet_id`. A match has only the
/// languages present in `edited` replaced; otherwise the row is appended. Every other
/// sheet and row is returned untouched.
pub fn merge_row(mut spreadsheet: Spreadsheet, sheet_id: i64, edited: SheetRow) -> Spreadsheet {
    let Some(sheet) = spreadsheet
        .sheets
        .iter_mut()
        .find(|sheet| sheet.sheet_id == sheet_id)
    else {
        tracing::debug!(sheet_id, key = %edited.key, "merge target sheet not in local model");
        return spreadsheet;
    };

    let wanted = normalize_key(&edited.key);
    match sheet
        .rows
        .iter_mut()
        .find(|row| normalize_key(&row.key) == wanted)
    {
        Some(existing) => {
            for (language, value) in edited.data {
                existing.data.insert(language, value);
            }
        }
        None => {
            let mut row = edited;
            if row.row_number == 0 {
                row.row_number = sheet
                    .rows
                    .iter()
                    .map(|row| row.row_number)
                    .max()
                    .unwrap_or(1)
                    + 1;
            }
            sheet.rows.push(row);
        }
    }

    spreadsheet
}

/// A full-row overwrite produced by [`plan_sync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncWrite {
    pub sheet: SheetRef,
    pub row_number: u32,
    pub values: Vec<String>,
}

/// Work out the row writes that push `local` onto the current remote contents.
///
/// Sheets are matched by id and visited in local order. Within a sheet the last local
/// row for a key wins. Only keys that already exist remotely produce a write, and only
/// languages the remote header knows are written.
pub fn plan_sync(local: &Spreadsheet, remote: &RawDocument) -> Vec<SyncWrite> {
    let mut writes = Vec::new();

    for sheet in &local.sheets {
        let Some(raw) = remote.sheet(sheet.sheet_id) else {
            tracing::warn!(sheet = %sheet.title, "sheet no longer exists remotely, skipping");
            continue;
        };
        let index = match HeaderIndex::parse(raw.headers()) {
            Ok(index) => index,
            Err(err) => {
                tracing::warn!(sheet = %raw.title, error = %err, "remote header is invalid, skipping");
                continue;
            }
        };

        let mut edits: IndexMap<String, &SheetRow> = IndexMap::new();
        for row in &sheet.rows {
            edits.insert(normalize_key(&row.key), row);
        }

        let mut remote_rows: IndexMap<String, (u32, &Vec<String>)> = IndexMap::new();
        for (offset, cells) in raw.data_rows().iter().enumerate() {
            if is_blank_row(cells) {
                continue;
            }
            let key = normalize_key(index.row(cells).key());
            if key.is_empty() {
                continue;
            }
            remote_rows
                .entry(key)
                .or_insert((offset as u32 + 2, cells));
        }

        let target = SheetRef::new(remote.id.clone(), raw.sheet_id, raw.title.clone());
        for (key, edit) in edits {
            let Some((row_number, cells)) = remote_rows.get(&key) else {
                continue;
            };
            let mut row = index.row_from(cells);
            for (language, value) in &edit.data {
                if row.set_language(language, value.clone()).is_err() {
                    tracing::debug!(sheet = %raw.title, language = %language, "language not in remote header");
                }
            }
            writes.push(SyncWrite {
                sheet: target.clone(),
                row_number: *row_number,
                values: row.into_cells(),
            });
        }
    }

    writes
}
