//! Work manifest access and parsing.
//!
//! The manifest is a table of rows: column A holds each row's processing
//! status, the remaining populated cells hold the document codes to bundle.
//! Row 1 is always a header.
//!
//! - [`ManifestStore`]: cell-level read access to any tabular source
//! - [`Sheet`]: in-memory store, loadable from a spreadsheet file
//! - [`read_work_rows`]: turns a store into ordered [`WorkRow`]s

mod sheet;

use bundlebot_shared::{CellRef, DocumentCode, WorkRow};
use tracing::debug;

pub use sheet::Sheet;

/// Column holding the per-row status.
pub const STATUS_COLUMN: u32 = 1;

/// Row holding the column headers.
pub const HEADER_ROW: u32 = 1;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Read access to a tabular manifest keyed by 1-based `(row, column)`.
///
/// "Populated" means the cell's text is non-empty after trimming.
pub trait ManifestStore: Send + Sync {
    /// Text of a single cell, `None` when the cell is not populated.
    fn cell_text(&self, cell: &CellRef) -> Option<String>;

    /// Populated cells of a column as `(text, row)`, ascending by row.
    fn column_cells(&self, column: u32) -> Vec<(String, u32)>;

    /// Populated cells of a row as `(text, column)`, ascending by column.
    fn row_cells(&self, row: u32) -> Vec<(String, u32)>;
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Build the ordered list of work rows from a manifest.
///
/// Every row with a populated status cell (except the header) becomes a
/// [`WorkRow`]; its codes are the row's other populated cells in column
/// order, without sorting or deduplication.
pub fn read_work_rows(store: &dyn ManifestStore) -> Vec<WorkRow> {
    let rows: Vec<WorkRow> = store
        .column_cells(STATUS_COLUMN)
        .into_iter()
        .filter(|(_, row)| *row != HEADER_ROW)
        .map(|(_, row)| {
            let codes = store
                .row_cells(row)
                .into_iter()
                .filter(|(_, column)| *column != STATUS_COLUMN)
                .map(|(text, _)| DocumentCode::new(text))
                .collect();

            WorkRow {
                status_ref: CellRef::new(STATUS_COLUMN, row),
                codes,
            }
        })
        .collect();

    debug!(rows = rows.len(), "manifest parsed into work rows");
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_row_is_excluded() {
        let sheet = Sheet::from_rows(&[
            &["Status", "Doc 1", "Doc 2"],
            &["Pendente", "c1", "c2"],
        ]);
        let rows = read_work_rows(&sheet);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status_ref.to_string(), "A2");
        assert_eq!(rows[0].row_number(), 2);
        assert_eq!(
            rows[0].codes,
            vec![DocumentCode::new("c1"), DocumentCode::new("c2")]
        );
    }

    #[test]
    fn codes_keep_column_order_and_duplicates() {
        let sheet = Sheet::from_rows(&[
            &["Status"],
            &["Pendente", "z9", "a1", "z9", "m5"],
        ]);
        let rows = read_work_rows(&sheet);
        let codes: Vec<&str> = rows[0].codes.iter().map(DocumentCode::as_str).collect();
        assert_eq!(codes, vec!["z9", "a1", "z9", "m5"]);
    }

    #[test]
    fn gaps_in_data_columns_are_skipped() {
        let sheet = Sheet::from_rows(&[&["Status"], &["Pendente", "c1", "", "  ", "c4"]]);
        let rows = read_work_rows(&sheet);
        let codes: Vec<&str> = rows[0].codes.iter().map(DocumentCode::as_str).collect();
        assert_eq!(codes, vec!["c1", "c4"]);
    }

    #[test]
    fn rows_without_status_are_not_work_rows() {
        let sheet = Sheet::from_rows(&[
            &["Status", "Doc"],
            &["Pendente", "c1"],
            &["", "orphan"],
            &["Concluido", "c3"],
        ]);
        let rows = read_work_rows(&sheet);

        let numbers: Vec<u32> = rows.iter().map(WorkRow::row_number).collect();
        assert_eq!(numbers, vec![2, 4]);
    }

    #[test]
    fn status_only_row_has_no_codes() {
        let sheet = Sheet::from_rows(&[&["Status"], &["Pendente"]]);
        let rows = read_work_rows(&sheet);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].codes.is_empty());
    }

    #[test]
    fn empty_manifest_yields_no_rows() {
        let sheet = Sheet::from_rows(&[&["Status", "Doc"]]);
        assert!(read_work_rows(&sheet).is_empty());
        assert!(read_work_rows(&Sheet::default()).is_empty());
    }
}
