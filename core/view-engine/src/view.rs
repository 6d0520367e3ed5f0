//! FILENAME: core/view-engine/src/view.rs
//! PURPOSE: The view state - filters, sorts, hidden columns, sizing.
//! CONTEXT: `TableView` is the component's only persistable surface. It
//! serializes to opaque camelCase JSON and carries a version counter used
//! as a derivation-cache key, so every change must bump it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use engine::{RowId, Schema};

use crate::filter::FilterCriteria;
use crate::sort::SortSpec;

/// Default column width in logical pixels when neither the view nor the
/// schema sets one.
pub const DEFAULT_COLUMN_WIDTH: f32 = 120.0;

/// Default row height in logical pixels.
pub const DEFAULT_ROW_HEIGHT: f32 = 24.0;

/// User-adjustable presentation state, persisted as opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TableView {
    pub filters: BTreeMap<String, FilterCriteria>,
    pub sorts: Vec<SortSpec>,
    pub hidden_columns: BTreeSet<String>,
    pub column_widths: BTreeMap<String, f32>,
    /// Per-column wrap toggles overriding the schema's wrapText.
    pub wrap_overrides: BTreeMap<String, bool>,
    /// Explicit per-row height overrides.
    pub row_heights: BTreeMap<RowId, f32>,
    /// Bumped on every change; a derivation-cache key.
    pub version: u64,
}

impl TableView {
    pub fn new() -> Self {
        TableView::default()
    }

    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    // ========================================================================
    // FILTERS & SORTS
    // ========================================================================

    pub fn set_filter(&mut self, col_key: impl Into<String>, criteria: FilterCriteria) {
        self.filters.insert(col_key.into(), criteria);
        self.bump_version();
    }

    pub fn clear_filter(&mut self, col_key: &str) {
        if self.filters.remove(col_key).is_some() {
            self.bump_version();
        }
    }

    pub fn has_filter(&self, col_key: &str) -> bool {
        self.filters.contains_key(col_key)
    }

    pub fn set_sorts(&mut self, sorts: Vec<SortSpec>) {
        self.sorts = sorts;
        self.bump_version();
    }

    /// Cycle the sort on one column: none → ascending → descending → none.
    /// Replaces any existing multi-column sort.
    pub fn cycle_sort(&mut self, col_key: &str) {
        let current = self
            .sorts
            .first()
            .filter(|s| s.col_key == col_key)
            .map(|s| s.direction);
        self.sorts = match SortSpec::next_state(current, col_key) {
            Some(spec) => vec![spec],
            None => Vec::new(),
        };
        self.bump_version();
    }

    pub fn sort_for(&self, col_key: &str) -> Option<&SortSpec> {
        self.sorts.iter().find(|s| s.col_key == col_key)
    }

    // ========================================================================
    // COLUMN PRESENTATION
    // ========================================================================

    pub fn hide_column(&mut self, col_key: impl Into<String>) {
        if self.hidden_columns.insert(col_key.into()) {
            self.bump_version();
        }
    }

    pub fn show_column(&mut self, col_key: &str) {
        if self.hidden_columns.remove(col_key) {
            self.bump_version();
        }
    }

    pub fn is_column_hidden(&self, col_key: &str) -> bool {
        self.hidden_columns.contains(col_key)
    }

    pub fn set_column_width(&mut self, col_key: impl Into<String>, width: f32) {
        self.column_widths.insert(col_key.into(), width.max(10.0));
        self.bump_version();
    }

    /// The effective width: view override, then schema width, then default.
    pub fn column_width(&self, schema: &Schema, col_key: &str) -> f32 {
        if let Some(width) = self.column_widths.get(col_key) {
            return *width;
        }
        schema
            .column(col_key)
            .and_then(|c| c.width)
            .unwrap_or(DEFAULT_COLUMN_WIDTH)
    }

    pub fn set_wrap_override(&mut self, col_key: impl Into<String>, wrap: bool) {
        self.wrap_overrides.insert(col_key.into(), wrap);
        self.bump_version();
    }

    /// The effective wrap flag: view override, then schema wrapText.
    pub fn wrap_enabled(&self, schema: &Schema, col_key: &str) -> bool {
        if let Some(wrap) = self.wrap_overrides.get(col_key) {
            return *wrap;
        }
        schema.column(col_key).map(|c| c.wrap_text).unwrap_or(false)
    }

    /// True while any visible column has wrap enabled - the gate for the
    /// incremental measurement schedule.
    pub fn any_wrap_enabled(&self, schema: &Schema) -> bool {
        schema
            .columns()
            .iter()
            .filter(|c| !self.is_column_hidden(&c.key))
            .any(|c| self.wrap_enabled(schema, &c.key))
    }

    // ========================================================================
    // ROW HEIGHTS
    // ========================================================================

    pub fn set_row_height(&mut self, row_id: RowId, height: f32) {
        self.row_heights.insert(row_id, height.max(1.0));
        self.bump_version();
    }

    pub fn clear_row_height(&mut self, row_id: RowId) {
        if self.row_heights.remove(&row_id).is_some() {
            self.bump_version();
        }
    }

    pub fn row_height(&self, row_id: RowId) -> f32 {
        self.row_heights
            .get(&row_id)
            .copied()
            .unwrap_or(DEFAULT_ROW_HEIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::SortDirection;
    use engine::{ColumnSchema, ColumnType};

    fn schema() -> Schema {
        Schema::new(vec![
            ColumnSchema::new("a", ColumnType::String).with_width(80.0),
            ColumnSchema::new("b", ColumnType::String).with_wrap_text(true),
        ])
        .unwrap()
    }

    #[test]
    fn test_every_change_bumps_version() {
        let mut view = TableView::new();
        let v0 = view.version;
        view.set_column_width("a", 100.0);
        assert!(view.version > v0);

        let v1 = view.version;
        view.hide_column("b");
        assert!(view.version > v1);

        let v2 = view.version;
        view.cycle_sort("a");
        assert!(view.version > v2);
    }

    #[test]
    fn test_effective_width_precedence() {
        let schema = schema();
        let mut view = TableView::new();
        assert_eq!(view.column_width(&schema, "a"), 80.0);
        assert_eq!(view.column_width(&schema, "b"), DEFAULT_COLUMN_WIDTH);

        view.set_column_width("a", 200.0);
        assert_eq!(view.column_width(&schema, "a"), 200.0);
    }

    #[test]
    fn test_wrap_override_beats_schema() {
        let schema = schema();
        let mut view = TableView::new();
        assert!(view.wrap_enabled(&schema, "b"));
        assert!(view.any_wrap_enabled(&schema));

        view.set_wrap_override("b", false);
        assert!(!view.wrap_enabled(&schema, "b"));
        assert!(!view.any_wrap_enabled(&schema));
    }

    #[test]
    fn test_sort_cycle() {
        let mut view = TableView::new();
        view.cycle_sort("a");
        assert_eq!(view.sorts[0].direction, SortDirection::Ascending);
        view.cycle_sort("a");
        assert_eq!(view.sorts[0].direction, SortDirection::Descending);
        view.cycle_sort("a");
        assert!(view.sorts.is_empty());
    }

    #[test]
    fn test_round_trips_as_json() {
        let mut view = TableView::new();
        view.set_column_width("a", 90.0);
        view.hide_column("b");
        view.set_row_height(RowId(3), 40.0);

        let json = serde_json::to_string(&view).unwrap();
        let back: TableView = serde_json::from_str(&json).unwrap();
        assert_eq!(view, back);
    }
}
