//! FILENAME: tests/test_view.rs
//! Filters, sorts, hidden columns, and the persisted view surface.

mod common;

use common::TestHarness;
use sheetgrid::{FilterCondition, FilterCriteria, FilterOp, SortSpec, TableView};

#[test]
fn test_sort_reorders_visible_rows() {
    let mut harness = TestHarness::with_sample_data();

    harness
        .grid
        .update_view(|view| view.set_sorts(vec![SortSpec::ascending("age")]));

    let table = harness.grid.get_table_data();
    let names: Vec<&str> = table.iter().map(|row| row[0].as_str()).collect();
    assert_eq!(names, vec!["Bob", "Diana", "Alice", "Eve", "Charlie"]);
}

#[test]
fn test_filter_hides_rows_and_reports_count() {
    let mut harness = TestHarness::with_sample_data();

    harness.grid.update_view(|view| {
        view.set_filter(
            "age",
            FilterCriteria::Condition(FilterCondition::new(FilterOp::GreaterThanOrEqual, "30")),
        )
    });

    assert_eq!(harness.grid.visible_rows().len(), 3);
    assert_eq!(harness.grid.visible_rows().hidden_count, 2);

    let table = harness.grid.get_table_data();
    let names: Vec<&str> = table.iter().map(|row| row[0].as_str()).collect();
    assert_eq!(names, vec!["Alice", "Charlie", "Eve"]);
}

#[test]
fn test_filter_reads_pending_values() {
    let mut harness = TestHarness::with_sample_data();
    harness.grid.set_edit_mode(sheetgrid::EditMode::Commit);

    harness.grid.update_view(|view| {
        view.set_filter("city", FilterCriteria::values(["Chicago"]))
    });
    assert_eq!(harness.grid.visible_rows().len(), 1);

    // A pending edit moves a row out of the filter immediately.
    let charlie = harness.grid.visible_rows().order[0];
    harness
        .grid
        .set_cell_value(
            &sheetgrid::CellAddress::by_id(charlie, "city"),
            "Boston".into(),
        )
        .unwrap();
    assert_eq!(harness.grid.visible_rows().len(), 0);
}

#[test]
fn test_hidden_columns_drop_from_table_data() {
    let mut harness = TestHarness::with_sample_data();

    let before = harness.grid.get_table_data();
    assert_eq!(before[0].len(), 5);

    harness.grid.update_view(|view| view.hide_column("salary"));
    let after = harness.grid.get_table_data();
    assert_eq!(after[0].len(), 4);
}

#[test]
fn test_index_addressing_skips_hidden_columns() {
    let mut harness = TestHarness::with_sample_data();
    harness.grid.update_view(|view| view.hide_column("age"));

    // Visible column 1 is now "city"; index addressing must agree with
    // what hit-testing and the renderers report.
    harness
        .grid
        .select_cell(&sheetgrid::CellAddress::by_index(0, 1))
        .unwrap();
    let snapshot = harness.grid.get_selection_snapshot();
    assert_eq!(snapshot.col_key.as_deref(), Some("city"));
    assert_eq!(snapshot.display, "New York");
}

#[test]
fn test_view_round_trips_through_json() {
    let mut harness = TestHarness::with_sample_data();

    harness.grid.update_view(|view| {
        view.set_sorts(vec![SortSpec::descending("salary")]);
        view.set_column_width("name", 200.0);
        view.hide_column("active");
    });

    // The view is the persistable surface: opaque JSON out, same view in.
    let json = serde_json::to_string(harness.grid.view()).unwrap();
    let restored: TableView = serde_json::from_str(&json).unwrap();

    let mut second = TestHarness::with_sample_data();
    second.grid.set_view(restored);

    assert_eq!(
        harness.grid.get_table_data(),
        second.grid.get_table_data()
    );
}

#[test]
fn test_sort_cycle_through_view() {
    let mut harness = TestHarness::with_sample_data();

    harness.grid.update_view(|view| view.cycle_sort("age"));
    let ascending = harness.grid.get_table_data();
    assert_eq!(ascending[0][0], "Bob");

    harness.grid.update_view(|view| view.cycle_sort("age"));
    let descending = harness.grid.get_table_data();
    assert_eq!(descending[0][0], "Charlie");

    harness.grid.update_view(|view| view.cycle_sort("age"));
    let unsorted = harness.grid.get_table_data();
    assert_eq!(unsorted[0][0], "Alice");
}

#[test]
fn test_row_height_overrides_persist_in_view() {
    let mut harness = TestHarness::with_sample_data();
    let row_id = harness.row_id(0);

    harness
        .grid
        .update_view(|view| view.set_row_height(row_id, 60.0));
    assert_eq!(harness.grid.view().row_height(row_id), 60.0);

    let json = serde_json::to_string(harness.grid.view()).unwrap();
    let restored: TableView = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.row_height(row_id), 60.0);
}
