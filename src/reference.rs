//! Reference name codec.
//!
//! Converts between textual cell references as they appear in formulas
//! (`A1`, `ab12`, `Sheet2!C3`, `'Q1 Budget'!B7`) and [`CellAddress`] values.
//!
//! Columns use bijective base-26: there is no letter for zero, so `A` is the
//! first column (index 0), `Z` is index 25 and `AA` is index 26. Row digits
//! are taken as a zero-based index directly, without any offset.

use crate::core::WorksheetTable;
use crate::error::{CellGraphError, CellGraphResult};
use crate::types::CellAddress;

/// A reference split into its textual parts, not yet bound to a sheet handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReference {
    /// Sheet qualifier as written (quotes removed), if any
    pub sheet: Option<String>,
    pub row: usize,
    pub col: usize,
}

/// Convert a zero-based column index to its letter run: 0=A, 25=Z, 26=AA.
pub fn column_to_letters(col: usize) -> String {
    let mut letters = Vec::new();
    let mut n = col;
    loop {
        letters.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Decode a letter run to a zero-based column index.
///
/// Case-insensitive. Returns `None` for an empty run, any non-letter, or a
/// run too long to fit in `usize`.
pub fn letters_to_column(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut value: usize = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        value = value.checked_mul(26)?.checked_add(digit)?;
    }
    Some(value - 1)
}

/// Split `[SheetName!]ColumnLetters Digits` into its parts.
pub fn parse_reference(name: &str) -> CellGraphResult<ParsedReference> {
    let invalid = || CellGraphError::InvalidReference(name.to_string());

    let (sheet, cell_part) = match name.rsplit_once('!') {
        Some((sheet, cell)) => {
            let sheet = sheet
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .unwrap_or(sheet);
            if sheet.is_empty() {
                return Err(invalid());
            }
            (Some(sheet.to_string()), cell)
        }
        None => (None, name),
    };

    let split = cell_part
        .find(|c: char| !c.is_ascii_alphabetic())
        .ok_or_else(invalid)?;
    let (letters, digits) = cell_part.split_at(split);

    let col = letters_to_column(letters).ok_or_else(invalid)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let row = digits.parse::<usize>().map_err(|_| invalid())?;

    Ok(ParsedReference { sheet, row, col })
}

/// Resolve a variable name from a formula defined at `defining` into the
/// address it reads.
///
/// Unqualified names stay on the defining cell's sheet. Qualified names are
/// looked up case-insensitively in the worksheet table.
pub fn resolve(
    name: &str,
    defining: CellAddress,
    worksheets: &WorksheetTable,
) -> CellGraphResult<CellAddress> {
    let parsed = parse_reference(name)?;
    let sheet = match &parsed.sheet {
        None => defining.sheet,
        Some(sheet_name) => {
            worksheets
                .lookup(sheet_name)
                .ok_or_else(|| CellGraphError::UnresolvedSheet {
                    sheet: WorksheetTable::normalize(sheet_name),
                    reference: name.to_string(),
                })?
        }
    };
    Ok(CellAddress::new(sheet, parsed.row, parsed.col))
}

/// Render an address back to reference text, qualified with `sheet_name`
/// when one is given. Names that are not plain identifiers are quoted.
pub fn format_reference(address: CellAddress, sheet_name: Option<&str>) -> String {
    let cell = format!("{}{}", column_to_letters(address.col), address.row);
    match sheet_name {
        None => cell,
        Some(name) if is_plain_sheet_name(name) => format!("{name}!{cell}"),
        Some(name) => format!("'{name}'!{cell}"),
    }
}

fn is_plain_sheet_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
