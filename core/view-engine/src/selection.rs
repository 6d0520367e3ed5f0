//! FILENAME: core/view-engine/src/selection.rs
//! PURPOSE: Selection state - active cell, ranges, fill-handle semantics.
//! CONTEXT: The active cell is tracked by stable (row id, column key) so it
//! survives re-sorts; ranges are tracked in visible grid coordinates where
//! rectangle math is natural. The select-all corner uses the "__all__"
//! sentinel for both halves of the address.

use serde::{Deserialize, Serialize};

use engine::{parse_integer, parse_number, CellValue, ColumnSchema, ColumnType, RowId};

/// Sentinel row/column key meaning "everything" (the corner click).
pub const SELECT_ALL: &str = "__all__";

/// The focused cell, or the select-all corner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveCell {
    Cell { row_id: RowId, col_key: String },
    All,
}

impl ActiveCell {
    /// The row half of the address ("__all__" for the corner).
    pub fn row_key(&self) -> String {
        match self {
            ActiveCell::Cell { row_id, .. } => row_id.0.to_string(),
            ActiveCell::All => SELECT_ALL.to_string(),
        }
    }

    /// The column half of the address ("__all__" for the corner).
    pub fn col_key(&self) -> String {
        match self {
            ActiveCell::Cell { col_key, .. } => col_key.clone(),
            ActiveCell::All => SELECT_ALL.to_string(),
        }
    }
}

/// A selected region in visible grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionRange {
    /// A rectangle of cells, inclusive on both ends.
    Cells {
        start_row: usize,
        start_col: usize,
        end_row: usize,
        end_col: usize,
    },
    /// A band of whole rows, inclusive.
    Rows { start_row: usize, end_row: usize },
}

impl SelectionRange {
    /// Normalize so start <= end on both axes.
    pub fn normalized(self) -> SelectionRange {
        match self {
            SelectionRange::Cells {
                start_row,
                start_col,
                end_row,
                end_col,
            } => SelectionRange::Cells {
                start_row: start_row.min(end_row),
                start_col: start_col.min(end_col),
                end_row: start_row.max(end_row),
                end_col: start_col.max(end_col),
            },
            SelectionRange::Rows { start_row, end_row } => SelectionRange::Rows {
                start_row: start_row.min(end_row),
                end_row: start_row.max(end_row),
            },
        }
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        match self.normalized() {
            SelectionRange::Cells {
                start_row,
                start_col,
                end_row,
                end_col,
            } => row >= start_row && row <= end_row && col >= start_col && col <= end_col,
            SelectionRange::Rows { start_row, end_row } => row >= start_row && row <= end_row,
        }
    }

    /// True when the range covers exactly one cell.
    pub fn is_single_cell(&self) -> bool {
        match self.normalized() {
            SelectionRange::Cells {
                start_row,
                start_col,
                end_row,
                end_col,
            } => start_row == end_row && start_col == end_col,
            SelectionRange::Rows { .. } => false,
        }
    }
}

/// The full selection: one active cell plus the ranges.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionState {
    pub active: Option<ActiveCell>,
    pub ranges: Vec<SelectionRange>,
}

impl SelectionState {
    pub fn new() -> Self {
        SelectionState::default()
    }

    /// Select a single cell, replacing previous ranges.
    pub fn select_cell(&mut self, row_id: RowId, col_key: impl Into<String>, row: usize, col: usize) {
        self.active = Some(ActiveCell::Cell {
            row_id,
            col_key: col_key.into(),
        });
        self.ranges = vec![SelectionRange::Cells {
            start_row: row,
            start_col: col,
            end_row: row,
            end_col: col,
        }];
    }

    /// Extend the last range toward a cell, keeping the active cell.
    pub fn extend_to(&mut self, row: usize, col: usize) {
        if let Some(last) = self.ranges.last_mut() {
            match last {
                SelectionRange::Cells {
                    end_row, end_col, ..
                } => {
                    *end_row = row;
                    *end_col = col;
                }
                SelectionRange::Rows { end_row, .. } => {
                    *end_row = row;
                }
            }
        }
    }

    /// Select a band of whole rows.
    pub fn select_rows(&mut self, row_id: RowId, first_col_key: impl Into<String>, start_row: usize, end_row: usize) {
        self.active = Some(ActiveCell::Cell {
            row_id,
            col_key: first_col_key.into(),
        });
        self.ranges = vec![SelectionRange::Rows { start_row, end_row }];
    }

    /// The corner click: everything is selected, the active address is the
    /// sentinel pair.
    pub fn select_all(&mut self, row_count: usize, col_count: usize) {
        self.active = Some(ActiveCell::All);
        self.ranges = if row_count == 0 || col_count == 0 {
            Vec::new()
        } else {
            vec![SelectionRange::Cells {
                start_row: 0,
                start_col: 0,
                end_row: row_count - 1,
                end_col: col_count - 1,
            }]
        };
    }

    pub fn clear(&mut self) {
        self.active = None;
        self.ranges.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_none() && self.ranges.is_empty()
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.ranges.iter().any(|r| r.contains(row, col))
    }

    /// Fill-handle visibility: a single-cell selection on an editable,
    /// non-formula column.
    pub fn fill_handle_visible(&self, column: Option<&ColumnSchema>) -> bool {
        let single = self
            .ranges
            .last()
            .map(|r| r.is_single_cell())
            .unwrap_or(false);
        let editable = column.map(|c| !c.is_readonly()).unwrap_or(false);
        single && editable && !matches!(self.active, Some(ActiveCell::All) | None)
    }
}

// ============================================================================
// FILL & PASTE COERCION
// ============================================================================

/// Coerce a source value (from the fill handle or the clipboard) into the
/// target column's type. Unparseable input falls back to plain text so the
/// validation stage can flag it.
pub fn coerce_for_column(value: &CellValue, column: &ColumnSchema) -> CellValue {
    let text = value.display_label();

    match column.column_type {
        ColumnType::Number => match value {
            CellValue::Number(_) => value.clone(),
            _ => parse_number(&text)
                .map(CellValue::Number)
                .unwrap_or_else(|| CellValue::Text(text)),
        },
        ColumnType::Int | ColumnType::Uint => match value {
            CellValue::Number(_) => value.clone(),
            _ => parse_integer(&text)
                .map(|n| CellValue::Number(n as f64))
                .unwrap_or_else(|| CellValue::Text(text)),
        },
        ColumnType::Boolean => match value {
            CellValue::Bool(_) => value.clone(),
            _ => match text.to_lowercase().as_str() {
                "true" | "1" | "yes" | "☑" => CellValue::Bool(true),
                "false" | "0" | "no" | "☐" => CellValue::Bool(false),
                _ => CellValue::Text(text),
            },
        },
        ColumnType::Date => match value {
            CellValue::Date(_) | CellValue::DateTime(_) => value.clone(),
            _ => engine::date_format::parse_date(&text)
                .map(CellValue::Date)
                .unwrap_or_else(|| CellValue::Text(text)),
        },
        ColumnType::Time => match value {
            CellValue::Time(_) => value.clone(),
            _ => engine::date_format::parse_time(&text)
                .map(CellValue::Time)
                .unwrap_or_else(|| CellValue::Text(text)),
        },
        ColumnType::DateTime => match value {
            CellValue::DateTime(_) => value.clone(),
            _ => engine::date_format::parse_datetime(&text)
                .map(CellValue::DateTime)
                .unwrap_or_else(|| CellValue::Text(text)),
        },
        ColumnType::Enum => CellValue::Enum(text),
        ColumnType::Tags => match value {
            CellValue::Tags(_) => value.clone(),
            _ => CellValue::Tags(
                text.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect(),
            ),
        },
        _ => match value {
            CellValue::Null => CellValue::Null,
            _ => CellValue::Text(text),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::ColumnSchema;

    fn editable_column() -> ColumnSchema {
        ColumnSchema::new("name", ColumnType::String)
    }

    fn formula_column() -> ColumnSchema {
        ColumnSchema::new("total", ColumnType::Number)
            .with_formula(|_row| Ok(engine::FormulaOutcome::Value(CellValue::Number(0.0))))
    }

    #[test]
    fn test_select_all_uses_sentinel() {
        let mut selection = SelectionState::new();
        selection.select_all(10, 3);

        let active = selection.active.clone().unwrap();
        assert_eq!(active.row_key(), SELECT_ALL);
        assert_eq!(active.col_key(), SELECT_ALL);
        assert!(selection.contains(9, 2));
    }

    #[test]
    fn test_extend_normalizes_backwards_drag() {
        let mut selection = SelectionState::new();
        selection.select_cell(RowId(5), "b", 5, 1);
        selection.extend_to(2, 0);

        assert!(selection.contains(3, 0));
        assert!(selection.contains(5, 1));
        assert!(!selection.contains(6, 1));
    }

    #[test]
    fn test_fill_handle_rules() {
        let mut selection = SelectionState::new();
        selection.select_cell(RowId(1), "name", 0, 0);
        assert!(selection.fill_handle_visible(Some(&editable_column())));
        // Formula column: no fill handle.
        assert!(!selection.fill_handle_visible(Some(&formula_column())));

        // Multi-cell selection: no fill handle.
        selection.extend_to(3, 0);
        assert!(!selection.fill_handle_visible(Some(&editable_column())));
    }

    #[test]
    fn test_row_band_contains_every_column() {
        let mut selection = SelectionState::new();
        selection.select_rows(RowId(1), "a", 1, 3);
        assert!(selection.contains(2, 0));
        assert!(selection.contains(2, 99));
        assert!(!selection.contains(0, 0));
    }

    #[test]
    fn test_coercion_for_fill() {
        let number = ColumnSchema::new("n", ColumnType::Number);
        assert_eq!(
            coerce_for_column(&"42".into(), &number),
            CellValue::Number(42.0)
        );
        assert_eq!(
            coerce_for_column(&"nope".into(), &number),
            CellValue::Text("nope".into())
        );

        let boolean = ColumnSchema::new("b", ColumnType::Boolean);
        assert_eq!(coerce_for_column(&"true".into(), &boolean), CellValue::Bool(true));

        let tags = ColumnSchema::new("t", ColumnType::Tags);
        assert_eq!(
            coerce_for_column(&"a, b".into(), &tags),
            CellValue::Tags(vec!["a".into(), "b".into()])
        );
    }
}
