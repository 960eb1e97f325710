//! Generic list view.
//!
//! Turns any record set into rows of display strings using the columns of a
//! [`HasColumns`] source. Each row keeps its record id so callers can offer
//! edit and delete on it.

use std::fmt;

use serde::Serialize;

use crate::record::{display_value, lookup_path, MasterRecord};
use crate::schema::HasColumns;

/// Message shown for an empty dataset.
pub const EMPTY_MESSAGE: &str = "No records found.";

/// One rendered row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListRow {
    /// Id of the record behind the row; the handle for edit and delete.
    pub id: String,
    /// Cell text, one per column.
    pub cells: Vec<String>,
}

/// A rendered table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListView {
    headers: Vec<String>,
    rows: Vec<ListRow>,
}

impl ListView {
    /// Render `records` through the columns of `source`.
    #[must_use]
    pub fn new<C: HasColumns + ?Sized>(source: &C, records: &[MasterRecord]) -> Self {
        let columns = source.columns();
        let headers = columns.iter().map(|c| c.label.clone()).collect();
        let rows = records
            .iter()
            .map(|record| {
                let value = record.to_value();
                let cells = columns
                    .iter()
                    .map(|column| {
                        lookup_path(&value, &column.key)
                            .map(display_value)
                            .unwrap_or_default()
                    })
                    .collect();
                ListRow {
                    id: record.id.clone(),
                    cells,
                }
            })
            .collect();
        Self { headers, rows }
    }

    /// Column headers.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Rendered rows.
    #[must_use]
    pub fn rows(&self) -> &[ListRow] {
        &self.rows
    }

    /// Whether there is nothing to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Tab-separated output, one row per line with the id first.
    #[must_use]
    pub fn to_plain(&self) -> String {
        if self.is_empty() {
            return format!("{EMPTY_MESSAGE}\n");
        }
        self.rows
            .iter()
            .map(|row| format!("{}\t{}\n", row.id, row.cells.join("\t")))
            .collect()
    }
}

/// Aligned table with an `ID` column first.
impl fmt::Display for ListView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header: Vec<&str> = std::iter::once("ID")
            .chain(self.headers.iter().map(String::as_str))
            .collect();
        let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            widths[0] = widths[0].max(row.id.chars().count());
            for (i, cell) in row.cells.iter().enumerate() {
                widths[i + 1] = widths[i + 1].max(cell.chars().count());
            }
        }

        let line = |cells: &[&str]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        writeln!(f, "{}", line(&header))?;
        writeln!(
            f,
            "{}",
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  ")
        )?;
        if self.rows.is_empty() {
            return writeln!(f, "{EMPTY_MESSAGE}");
        }
        for row in &self.rows {
            let cells: Vec<&str> = std::iter::once(row.id.as_str())
                .chain(row.cells.iter().map(String::as_str))
                .collect();
            writeln!(f, "{}", line(&cells))?;
        }
        Ok(())
    }
}
