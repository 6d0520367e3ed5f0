//! FILENAME: sheetgrid/src/address.rs
//! PURPOSE: Flexible cell addressing normalized to (row id, column key).
//! CONTEXT: The public API accepts {rowId,colKey}, {rowIndex,colIndex} or
//! mixed forms. Indices refer to the current visible ordering on both
//! axes - filtered/sorted rows and non-hidden columns - so a sorted,
//! filtered or column-hidden table addresses what the user sees.

use thiserror::Error;

use engine::{RowId, Schema};
use view_engine::{TableView, VisibleRows};

/// A cell address in any of its accepted shapes. Unset halves fall back to
/// the other form; at least one half per axis must be present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellAddress {
    pub row_id: Option<RowId>,
    pub row_index: Option<usize>,
    pub col_key: Option<String>,
    pub col_index: Option<usize>,
}

impl CellAddress {
    /// Address by stable identity.
    pub fn by_id(row_id: RowId, col_key: impl Into<String>) -> Self {
        CellAddress {
            row_id: Some(row_id),
            col_key: Some(col_key.into()),
            ..Default::default()
        }
    }

    /// Address by visible position.
    pub fn by_index(row_index: usize, col_index: usize) -> Self {
        CellAddress {
            row_index: Some(row_index),
            col_index: Some(col_index),
            ..Default::default()
        }
    }

    /// Mixed form: visible row position plus column key.
    pub fn row_index_col_key(row_index: usize, col_key: impl Into<String>) -> Self {
        CellAddress {
            row_index: Some(row_index),
            col_key: Some(col_key.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AddressError {
    #[error("address has no row component")]
    MissingRow,
    #[error("address has no column component")]
    MissingColumn,
    #[error("row index {0} is out of range")]
    RowOutOfRange(usize),
    #[error("column index {0} is out of range")]
    ColumnOutOfRange(usize),
    #[error("unknown row id {0:?}")]
    UnknownRowId(RowId),
    #[error("unknown column key {0}")]
    UnknownColumnKey(String),
}

/// Resolve an address against the current visible ordering and schema.
/// Column indices count visible (non-hidden) columns, matching what
/// hit-testing and the renderers report.
pub fn normalize(
    address: &CellAddress,
    visible: &VisibleRows,
    schema: &Schema,
    view: &TableView,
) -> Result<(RowId, String), AddressError> {
    let row_id = match (address.row_id, address.row_index) {
        (Some(id), _) => {
            // An explicit id wins; it does not need to be visible.
            id
        }
        (None, Some(index)) => *visible
            .order
            .get(index)
            .ok_or(AddressError::RowOutOfRange(index))?,
        (None, None) => return Err(AddressError::MissingRow),
    };

    let col_key = match (&address.col_key, address.col_index) {
        (Some(key), _) => {
            // An explicit key wins; it may name a hidden column.
            if schema.column(key).is_none() {
                return Err(AddressError::UnknownColumnKey(key.clone()));
            }
            key.clone()
        }
        (None, Some(index)) => schema
            .columns()
            .iter()
            .filter(|c| !view.is_column_hidden(&c.key))
            .nth(index)
            .map(|c| c.key.clone())
            .ok_or(AddressError::ColumnOutOfRange(index))?,
        (None, None) => return Err(AddressError::MissingColumn),
    };

    Ok((row_id, col_key))
}
