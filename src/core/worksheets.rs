use std::collections::HashMap;

use crate::error::{CellGraphError, CellGraphResult};
use crate::types::SheetId;

/// Worksheet name table: normalized sheet name -> sheet handle.
///
/// Holds no cell storage. Names compare case-insensitively; handles are
/// allocated monotonically and never handed out twice.
#[derive(Debug, Default)]
pub struct WorksheetTable {
    by_name: HashMap<String, SheetId>,
    display_names: HashMap<SheetId, String>,
    next_id: u32,
}

impl WorksheetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-fold a sheet name for lookup.
    pub fn normalize(name: &str) -> String {
        name.trim().to_uppercase()
    }

    /// Register `name` and allocate a fresh handle for it.
    pub fn insert(&mut self, name: &str) -> CellGraphResult<SheetId> {
        let key = Self::normalize(name);
        if key.is_empty() {
            return Err(CellGraphError::InvalidWorksheetName(name.to_string()));
        }
        if self.by_name.contains_key(&key) {
            return Err(CellGraphError::DuplicateWorksheet(name.to_string()));
        }
        self.next_id += 1;
        let id = SheetId::from_raw(self.next_id);
        self.by_name.insert(key, id);
        self.display_names.insert(id, name.trim().to_string());
        Ok(id)
    }

    pub fn remove(&mut self, name: &str) -> CellGraphResult<SheetId> {
        let id = self
            .by_name
            .remove(&Self::normalize(name))
            .ok_or_else(|| CellGraphError::UnknownWorksheet(name.to_string()))?;
        self.display_names.remove(&id);
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Option<SheetId> {
        self.by_name.get(&Self::normalize(name)).copied()
    }

    /// Name as it was registered (original casing).
    pub fn name_of(&self, id: SheetId) -> Option<&str> {
        self.display_names.get(&id).map(String::as_str)
    }

    pub fn contains(&self, id: SheetId) -> bool {
        self.display_names.contains_key(&id)
    }

    /// Registered names, ordered by handle (registration order).
    pub fn names(&self) -> Vec<&str> {
        let mut entries: Vec<(&SheetId, &String)> = self.display_names.iter().collect();
        entries.sort_by_key(|(id, _)| **id);
        entries.into_iter().map(|(_, name)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut table = WorksheetTable::new();
        let id = table.insert("Sheet1").unwrap();

        assert_eq!(table.lookup("SHEET1"), Some(id));
        assert_eq!(table.lookup("sheet1"), Some(id));
        assert_eq!(table.name_of(id), Some("Sheet1"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut table = WorksheetTable::new();
        table.insert("Budget").unwrap();
        assert!(matches!(
            table.insert("BUDGET"),
            Err(CellGraphError::DuplicateWorksheet(_))
        ));
        assert!(matches!(
            table.insert("  "),
            Err(CellGraphError::InvalidWorksheetName(_))
        ));
    }

    #[test]
    fn test_handles_not_reused() {
        let mut table = WorksheetTable::new();
        let first = table.insert("Sheet1").unwrap();
        table.remove("sheet1").unwrap();
        let second = table.insert("Sheet1").unwrap();

        assert_ne!(first, second);
        assert!(!table.contains(first));
        assert!(table.contains(second));
    }

    #[test]
    fn test_remove_unknown() {
        let mut table = WorksheetTable::new();
        assert!(matches!(
            table.remove("Nope"),
            Err(CellGraphError::UnknownWorksheet(_))
        ));
    }

    #[test]
    fn test_names_in_registration_order() {
        let mut table = WorksheetTable::new();
        table.insert("Zeta").unwrap();
        table.insert("Alpha").unwrap();
        assert_eq!(table.names(), vec!["Zeta", "Alpha"]);
    }
}
