//! Typed access to a translation grid.
//!
//! [`HeaderIndex`] resolves a raw header row once; [`Row`] then writes the key cell and
//! language cells by name, rejecting names that are not language headers.

use crate::model::{RawSheet, SheetRow, SheetTable};
use indexmap::IndexMap;
use thiserror::Error;

pub const KEY_HEADER: &str = "KEY";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("sheet has no header row")]
    Empty,
    #[error("header row has no KEY column")]
    MissingKey,
    #[error("header row has no language columns")]
    NoLanguages,
    #[error("duplicate header names: {0}")]
    Duplicate(String),
    #[error("unknown header '{0}'")]
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderIndex {
    key_column: usize,
    /// (header name, column index) in column order, KEY excluded.
    languages: Vec<(String, usize)>,
    width: usize,
}

impl HeaderIndex {
    /// Resolve a header row. Blank header cells are ignored.
    pub fn parse(headers: &[String]) -> Result<Self, HeaderError> {
        let named: Vec<(usize, &str)> = headers
            .iter()
            .enumerate()
            .map(|(idx, h)| (idx, h.trim()))
            .filter(|(_, h)| !h.is_empty())
            .collect();
        if named.is_empty() {
            return Err(HeaderError::Empty);
        }

        let mut seen: Vec<String> = Vec::new();
        let mut duplicates: Vec<String> = Vec::new();
        for (_, name) in &named {
            let lowered = name.to_lowercase();
            if seen.contains(&lowered) {
                if !duplicates.contains(&lowered) {
                    duplicates.push(lowered);
                }
            } else {
                seen.push(lowered);
            }
        }

        let key_columns: Vec<usize> = named
            .iter()
            .filter(|(_, name)| is_key_header(name))
            .map(|(idx, _)| *idx)
            .collect();
        let Some(&key_column) = key_columns.first() else {
            return Err(HeaderError::MissingKey);
        };

        let languages: Vec<(String, usize)> = named
            .iter()
            .filter(|(_, name)| !is_key_header(name))
            .map(|(idx, name)| (name.to_string(), *idx))
            .collect();
        if languages.is_empty() {
            return Err(HeaderError::NoLanguages);
        }
        if !duplicates.is_empty() {
            return Err(HeaderError::Duplicate(duplicates.join(", ")));
        }

        Ok(Self {
            key_column,
            languages,
            width: headers.len(),
        })
    }

    pub fn key_column(&self) -> usize {
        self.key_column
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.languages.iter().map(|(name, _)| name.as_str())
    }

    pub fn language_names(&self) -> Vec<String> {
        self.languages().map(str::to_string).collect()
    }

    /// Column of a language header, matched case-insensitively. KEY is not a language.
    pub fn language_column(&self, header: &str) -> Option<usize> {
        let header = header.trim();
        self.languages
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(header))
            .map(|(_, idx)| *idx)
    }

    /// View an existing grid row.
    pub fn row<'a>(&'a self, cells: &'a [String]) -> RowRef<'a> {
        RowRef {
            index: self,
            cells,
        }
    }

    /// Blank row sized to the header.
    pub fn empty_row(&self) -> Row<'_> {
        Row {
            index: self,
            cells: vec![String::new(); self.width],
        }
    }

    /// Row populated from an existing grid row, for editing.
    pub fn row_from(&self, cells: &[String]) -> Row<'_> {
        let mut owned = cells.to_vec();
        owned.resize(self.width.max(cells.len()), String::new());
        Row { index: self, cells: owned }
    }
}

/// Read-only typed view over one grid row.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    index: &'a HeaderIndex,
    cells: &'a [String],
}

impl<'a> RowRef<'a> {
    pub fn key(&self) -> &'a str {
        self.cells
            .get(self.index.key_column)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn values(&self) -> IndexMap<String, String> {
        self.index
            .languages
            .iter()
            .map(|(name, idx)| (name.clone(), self.cells.get(*idx).cloned().unwrap_or_default()))
            .collect()
    }
}

/// Owned, editable row aligned with a header.
#[derive(Debug, Clone)]
pub struct Row<'a> {
    index: &'a HeaderIndex,
    cells: Vec<String>,
}

impl Row<'_> {
    pub fn set_key(&mut self, key: impl Into<String>) {
        let column = self.index.key_column;
        self.put(column, key.into());
    }

    /// Write one language cell. KEY and headers outside the row are rejected.
    pub fn set_language(&mut self, header: &str, value: impl Into<String>) -> Result<(), HeaderError> {
        let column = self
            .index
            .language_column(header)
            .ok_or_else(|| HeaderError::Unknown(header.to_string()))?;
        self.put(column, value.into());
        Ok(())
    }

    fn put(&mut self, column: usize, value: String) {
        if self.cells.len() <= column {
            self.cells.resize(column + 1, String::new());
        }
        self.cells[column] = value;
    }

    pub fn into_cells(self) -> Vec<String> {
        self.cells
    }
}

pub fn is_key_header(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case("key")
}

/// A row with no non-whitespace cell is not a translation entry.
pub fn is_blank_row(cells: &[String]) -> bool {
    cells.iter().all(|cell| cell.trim().is_empty())
}

/// Parse a grid whose header already passed validation.
pub fn parse_sheet(raw: &RawSheet) -> Result<SheetTable, HeaderError> {
    let index = HeaderIndex::parse(raw.headers())?;
    let rows = raw
        .data_rows()
        .iter()
        .enumerate()
        .filter(|(_, cells)| !is_blank_row(cells))
        .map(|(offset, cells)| {
            let view = index.row(cells);
            SheetRow {
                row_number: offset as u32 + 2,
                key: view.key().trim().to_string(),
                data: view.values(),
            }
        })
        .collect();

    Ok(SheetTable {
        sheet_id: raw.sheet_id,
        title: raw.title.clone(),
        languages: index.language_names(),
        rows,
    })
}
