use serde::{Deserialize, Serialize};
use std::fmt;

use crate::reference::column_to_letters;

//==============================================================================
// Cell Identity
//==============================================================================

/// Opaque handle for a worksheet registered with a workbook.
///
/// Allocated by the workbook on `add_worksheet`, never reused after the
/// worksheet is removed, so a stale address can never alias a new sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SheetId(u32);

impl SheetId {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Address of one cell: owning sheet plus zero-based row and column.
///
/// Equality and hashing cover all three fields at full width.
/// Ordering is (sheet, row, column), which keeps diagnostics deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    pub sheet: SheetId,
    pub row: usize,
    pub col: usize,
}

impl CellAddress {
    #[inline]
    pub fn new(sheet: SheetId, row: usize, col: usize) -> Self {
        Self { sheet, row, col }
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}{}", self.sheet, column_to_letters(self.col), self.row)
    }
}

//==============================================================================
// Cell Values
//==============================================================================

/// Scalar value readable from a cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Error marker such as `#ERROR#` or `#REF!`
    Error(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Parse raw user input the way a grid editor would.
    ///
    /// Numbers and `TRUE`/`FALSE` are recognised, everything else stays text
    /// (formula-shaped text included).
    pub fn parse_input(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return CellValue::Number(n);
            }
        }
        match trimmed.to_ascii_uppercase().as_str() {
            "TRUE" => CellValue::Boolean(true),
            "FALSE" => CellValue::Boolean(false),
            _ => CellValue::Text(input.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Error(marker) => write!(f, "{marker}"),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

//==============================================================================
// Cell Contents
//==============================================================================

/// Content of one grid slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    /// Raw content entered by the host
    Literal(CellValue),
    /// Installed formula (source without sigil) and its last computed value
    Formula { source: String, value: CellValue },
    /// Formula whose value was replaced by an error sentinel
    Error { source: String, marker: String },
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Literal(CellValue::Empty)
    }
}

impl Cell {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The value other formulas see when they read this cell.
    pub fn value(&self) -> CellValue {
        match self {
            Cell::Literal(v) => v.clone(),
            Cell::Formula { value, .. } => value.clone(),
            Cell::Error { marker, .. } => CellValue::Error(marker.clone()),
        }
    }

    /// Formula text (sigil stripped) if this content denotes a formula.
    pub fn formula_source(&self, sigil: char) -> Option<&str> {
        match self {
            Cell::Literal(CellValue::Text(text)) => text.strip_prefix(sigil),
            Cell::Literal(_) => None,
            Cell::Formula { source, .. } | Cell::Error { source, .. } => Some(source),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Literal(CellValue::Empty))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Cell::Error { .. })
    }
}

impl From<CellValue> for Cell {
    fn from(value: CellValue) -> Self {
        Cell::Literal(value)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Literal(CellValue::Number(n))
    }
}

impl From<&str> for Cell {
    fn from(input: &str) -> Self {
        Cell::Literal(CellValue::parse_input(input))
    }
}

impl From<String> for Cell {
    fn from(input: String) -> Self {
        Cell::from(input.as_str())
    }
}
