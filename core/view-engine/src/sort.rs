//! FILENAME: core/view-engine/src/sort.rs
//! PURPOSE: Sort specifications and typed value comparison.
//! CONTEXT: Sorting compares cell values by their tag (numbers numerically,
//! dates by timestamp, text case-insensitively); nulls always collate last
//! regardless of direction so empty rows stay out of the way.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use engine::CellValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One entry of an ordered multi-column sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub col_key: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn ascending(col_key: impl Into<String>) -> Self {
        SortSpec {
            col_key: col_key.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(col_key: impl Into<String>) -> Self {
        SortSpec {
            col_key: col_key.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Cycle for header clicks: none → asc → desc → none.
    pub fn next_state(current: Option<SortDirection>, col_key: &str) -> Option<SortSpec> {
        match current {
            None => Some(SortSpec::ascending(col_key)),
            Some(SortDirection::Ascending) => Some(SortSpec::descending(col_key)),
            Some(SortDirection::Descending) => None,
        }
    }
}

/// Compare two cell values for sorting. Nulls collate last; mixed tags
/// fall back to display-text comparison.
pub fn compare_values(a: &CellValue, b: &CellValue) -> Ordering {
    use CellValue::*;

    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Greater,
        (_, Null) => Ordering::Less,
        (Number(x), Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Bool(x), Bool(y)) => x.cmp(y),
        (Date(x), Date(y)) => x.cmp(y),
        (Time(x), Time(y)) => x.cmp(y),
        (DateTime(x), DateTime(y)) => x.cmp(y),
        (Date(x), DateTime(y)) => match x.and_hms_opt(0, 0, 0) {
            Some(dt) => dt.cmp(y),
            None => Ordering::Equal,
        },
        (DateTime(x), Date(y)) => match y.and_hms_opt(0, 0, 0) {
            Some(dt) => x.cmp(&dt),
            None => Ordering::Equal,
        },
        (Tags(x), Tags(y)) => x.len().cmp(&y.len()).then_with(|| x.cmp(y)),
        _ => {
            let left = a.display_label().to_lowercase();
            let right = b.display_label().to_lowercase();
            left.cmp(&right)
        }
    }
}

/// Apply a direction to an ascending ordering. Null-last is preserved in
/// both directions.
pub fn directed(ordering: Ordering, direction: SortDirection, a: &CellValue, b: &CellValue) -> Ordering {
    if a.is_null() || b.is_null() {
        return ordering;
    }
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}
