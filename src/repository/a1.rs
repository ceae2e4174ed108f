/// Cell position: `row` is 1-based (the header is row 1), `column` is 0-based (A = 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    pub row: u32,
    pub column: u32,
}

impl CellAddress {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    pub fn header(column: u32) -> Self {
        Self { row: 1, column }
    }

    pub fn to_a1(self) -> String {
        format!("{}{}", column_letters(self.column), self.row)
    }
}

/// Letters for a 0-based column index.
pub fn column_letters(column: u32) -> String {
    let mut n = column + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    out.iter().rev().collect()
}

/// Quote a sheet title for use in an A1 range (`'It''s'`).
pub fn quote_sheet_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

pub fn sheet_range(title: &str) -> String {
    quote_sheet_title(title)
}

pub fn cell_range(title: &str, cell: CellAddress) -> String {
    format!("{}!{}", quote_sheet_title(title), cell.to_a1())
}

/// Range covering `width` cells of one row, starting at column A.
pub fn row_range(title: &str, row: u32, width: usize) -> String {
    let last = column_letters(width.saturating_sub(1) as u32);
    format!("{}!A{row}:{last}{row}", quote_sheet_title(title))
}
