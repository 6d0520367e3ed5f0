//! FILENAME: tests/test_data_model.rs
//! Data-model invariants through the controller: versions, pending
//! overlay, display indices, insert/delete symmetry.

mod common;

use common::{record, TestHarness};
use engine::CellValue;
use sheetgrid::{CellAddress, EditMode};

#[test]
fn test_versions_strictly_increase_on_every_mutation() {
    let mut harness = TestHarness::with_sample_data();

    let v0 = harness.version(0);
    harness.set_cell(0, "name", "Ada".into());
    let v1 = harness.version(0);
    assert!(v1 > v0, "committed write must bump the version");

    harness.grid.set_edit_mode(EditMode::Commit);
    harness.set_cell(0, "name", "Augusta".into());
    let v2 = harness.version(0);
    assert!(v2 > v1, "pending write must bump the version");

    harness.grid.discard_pending();
    let v3 = harness.version(0);
    assert!(v3 > v2, "pending clear must bump the version");
}

#[test]
fn test_pending_present_iff_differs_from_raw() {
    let mut harness = TestHarness::with_sample_data();
    harness.grid.set_edit_mode(EditMode::Commit);

    harness.set_cell(1, "city", "San Diego".into());
    assert_eq!(harness.grid.get_pending_cell_count(), 1);

    // Writing the raw value back self-heals the overlay.
    harness.set_cell(1, "city", "Los Angeles".into());
    assert_eq!(harness.grid.get_pending_cell_count(), 0);
    assert!(harness.grid.get_pending_row_ids().is_empty());
}

#[test]
fn test_set_data_clears_pending_and_reindexes() {
    let mut harness = TestHarness::with_sample_data();
    harness.grid.set_edit_mode(EditMode::Commit);
    harness.set_cell(0, "name", "Pending".into());
    assert_eq!(harness.grid.get_pending_cell_count(), 1);

    harness.grid.set_data(vec![
        record(&[("name", "One".into())]),
        record(&[("name", "Two".into())]),
        record(&[("name", "Three".into())]),
    ]);

    assert_eq!(harness.grid.get_pending_cell_count(), 0);
    let rows = harness.grid.get_all_rows();
    assert_eq!(rows.len(), 3);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.display_index as usize, i + 1);
        assert_eq!(row.version, 0);
    }
}

#[test]
fn test_insert_then_delete_restores_row_list() {
    let mut harness = TestHarness::with_sample_data();
    let before: Vec<_> = harness.grid.get_all_rows().iter().map(|r| r.id).collect();

    let id = harness
        .grid
        .insert_row_at(record(&[("name", "Frank".into()), ("age", 40.0.into())]), 2)
        .unwrap();

    // Give the new row pending + style footprints that must be purged.
    harness.grid.set_edit_mode(EditMode::Commit);
    let index = harness.grid.visible_rows().position(id).unwrap();
    harness.set_cell(index, "name", "Franklin".into());
    harness.grid.set_edit_mode(EditMode::Direct);

    harness.grid.delete_row(id).unwrap();

    let after: Vec<_> = harness.grid.get_all_rows().iter().map(|r| r.id).collect();
    assert_eq!(before, after);
    assert!(harness.grid.get_pending_row_ids().is_empty());
    for (i, row) in harness.grid.get_all_rows().iter().enumerate() {
        assert_eq!(row.display_index as usize, i + 1);
    }
}

#[test]
fn test_row_readonly_flag_blocks_writes() {
    let mut harness = TestHarness::new();
    harness
        .grid
        .set_schema(common::EmployeeFixture::schema())
        .unwrap();
    harness.grid.set_data(vec![
        record(&[("name", "Locked".into()), ("_readonly", true.into())]),
        record(&[("name", "Open".into())]),
    ]);

    let locked = harness
        .grid
        .set_cell_value(&CellAddress::row_index_col_key(0, "name"), "X".into());
    assert!(locked.is_err());

    let open = harness
        .grid
        .set_cell_value(&CellAddress::row_index_col_key(1, "name"), "X".into());
    assert!(open.is_ok());
}

#[test]
fn test_dataset_generation_discards_stale_load() {
    let mut harness = TestHarness::with_sample_data();

    let stale = harness.grid.begin_load(true);
    let fresh = harness.grid.begin_load(true);
    assert_ne!(stale, fresh);

    // The stale completion must be ignored.
    assert!(!harness
        .grid
        .complete_load(stale, vec![record(&[("name", "stale".into())])]));
    assert_eq!(
        harness.grid.dataset_state(),
        sheetgrid::DatasetState::Loading
    );

    assert!(harness
        .grid
        .complete_load(fresh, vec![record(&[("name", "fresh".into())])]));
    assert_eq!(harness.grid.dataset_state(), sheetgrid::DatasetState::Rows);
    assert_eq!(harness.raw(0, "name"), CellValue::Text("fresh".into()));
}

#[test]
fn test_get_column_data_uses_pending_values() {
    let mut harness = TestHarness::with_sample_data();
    harness.grid.set_edit_mode(EditMode::Commit);
    harness.set_cell(0, "age", 31.0.into());

    let ages = harness.grid.get_column_data("age");
    assert_eq!(ages[0], CellValue::Number(31.0));
    // Raw stays untouched until commit.
    assert_eq!(harness.raw(0, "age"), CellValue::Number(30.0));
}
