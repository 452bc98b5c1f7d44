//! In-memory manifest sheet, optionally loaded from a spreadsheet file.

use std::collections::BTreeMap;
use std::path::Path;

use bundlebot_shared::{BundleError, CellRef, Result};
use calamine::{Data, Reader, open_workbook_auto};
use tracing::{info, instrument};

use crate::ManifestStore;

/// Populated cells keyed by 1-based `(row, column)`.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    cells: BTreeMap<(u32, u32), String>,
}

impl Sheet {
    /// Build a sheet from literal rows; `rows[0]` becomes manifest row 1.
    pub fn from_rows(rows: &[&[&str]]) -> Self {
        let mut sheet = Self::default();
        for (r, row) in rows.iter().enumerate() {
            for (c, text) in row.iter().enumerate() {
                sheet.set(r as u32 + 1, c as u32 + 1, text);
            }
        }
        sheet
    }

    /// Set a cell; empty or blank text clears it.
    pub fn set(&mut self, row: u32, column: u32, text: &str) {
        if text.trim().is_empty() {
            self.cells.remove(&(row, column));
        } else {
            self.cells.insert((row, column), text.to_string());
        }
    }

    /// Number of populated cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Load a worksheet from an `.xlsx`, `.xlsm`, `.xls` or `.ods` file.
    ///
    /// Uses the named worksheet, or the first one when `sheet_name` is `None`.
    /// Any failure is a [`BundleError::ManifestUnreadable`].
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path, sheet_name: Option<&str>) -> Result<Self> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| BundleError::manifest(path, format!("cannot open workbook: {e}")))?;

        let range = match sheet_name {
            Some(name) => workbook.worksheet_range(name).map_err(|e| {
                BundleError::manifest(path, format!("cannot read worksheet '{name}': {e}"))
            })?,
            None => workbook
                .worksheet_range_at(0)
                .ok_or_else(|| BundleError::manifest(path, "workbook has no worksheets"))?
                .map_err(|e| BundleError::manifest(path, format!("cannot read worksheet: {e}")))?,
        };

        let mut sheet = Self::default();
        // Range coordinates are relative to its first used cell, 0-based.
        if let Some((start_row, start_col)) = range.start() {
            for (r, c, value) in range.used_cells() {
                let text = cell_text(value);
                sheet.set(start_row + r as u32 + 1, start_col + c as u32 + 1, &text);
            }
        }

        info!(cells = sheet.len(), "manifest loaded");
        Ok(sheet)
    }
}

/// Render a spreadsheet value the way it is displayed.
fn cell_text(value: &Data) -> String {
    match value {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

impl ManifestStore for Sheet {
    fn cell_text(&self, cell: &CellRef) -> Option<String> {
        self.cells.get(&(cell.row, cell.column)).cloned()
    }

    fn column_cells(&self, column: u32) -> Vec<(String, u32)> {
        self.cells
            .iter()
            .filter(|((_, c), _)| *c == column)
            .map(|((r, _), text)| (text.clone(), *r))
            .collect()
    }

    fn row_cells(&self, row: u32) -> Vec<(String, u32)> {
        self.cells
            .range((row, 0)..(row + 1, 0))
            .map(|((_, c), text)| (text.clone(), *c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = "../../../fixtures/manifest/data.xlsx";

    #[test]
    fn store_accessors() {
        let sheet = Sheet::from_rows(&[&["Status", "Doc"], &["Pendente", "c1", "c2"]]);

        assert_eq!(
            sheet.cell_text(&CellRef::new(1, 2)).as_deref(),
            Some("Pendente")
        );
        assert_eq!(sheet.cell_text(&CellRef::new(4, 2)), None);
        assert_eq!(
            sheet.column_cells(1),
            vec![("Status".to_string(), 1), ("Pendente".to_string(), 2)]
        );
        assert_eq!(
            sheet.row_cells(2),
            vec![
                ("Pendente".to_string(), 1),
                ("c1".to_string(), 2),
                ("c2".to_string(), 3)
            ]
        );
    }

    #[test]
    fn whole_numbers_render_without_fraction() {
        assert_eq!(cell_text(&Data::Float(12345.0)), "12345");
        assert_eq!(cell_text(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_text(&Data::Int(42)), "42");
        assert_eq!(cell_text(&Data::String("abc".into())), "abc");
        assert_eq!(cell_text(&Data::Empty), "");
    }

    #[test]
    fn open_missing_file_is_manifest_error() {
        let err = Sheet::open(Path::new("/nonexistent/bundlebot/data.xlsx"), None).unwrap_err();
        assert!(matches!(err, BundleError::ManifestUnreadable { .. }));
    }

    #[test]
    fn open_garbage_file_is_manifest_error() {
        let path = std::env::temp_dir().join(format!("bb-garbage-{}.xlsx", std::process::id()));
        std::fs::write(&path, b"definitely not a zip archive").unwrap();

        let err = Sheet::open(&path, None).unwrap_err();
        assert!(matches!(err, BundleError::ManifestUnreadable { .. }));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn open_fixture_workbook() {
        let sheet = Sheet::open(Path::new(FIXTURE), None).expect("open fixture");
        let rows = crate::read_work_rows(&sheet);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].status_ref.to_string(), "A2");
        let codes: Vec<&str> = rows[0].codes.iter().map(|c| c.as_str()).collect();
        assert_eq!(codes, vec!["1234", "5678"]);

        assert_eq!(
            sheet.cell_text(&rows[1].status_ref).as_deref(),
            Some("Concluido")
        );
        assert_eq!(rows[2].codes.len(), 1);
    }

    #[test]
    fn open_fixture_unknown_sheet_fails() {
        let err = Sheet::open(Path::new(FIXTURE), Some("Nope")).unwrap_err();
        assert!(err.to_string().contains("Nope"));
    }
}
