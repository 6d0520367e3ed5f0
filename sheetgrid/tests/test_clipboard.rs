//! FILENAME: tests/test_clipboard.rs
//! Clipboard parsing parity and paste/copy through the controller.

mod common;

use common::{assert_raw, TestHarness};
use engine::CellValue;
use sheetgrid::{parse_html_table, parse_tsv, CellAddress, ClipboardPayload};

#[test]
fn test_tsv_equals_html_when_unmerged() {
    let html = "<table>\
        <tr><td>Name</td><td>Age</td></tr>\
        <tr><td>Ada</td><td>36</td></tr>\
        <tr><td>Grace</td><td>49</td></tr>\
        </table>";
    let tsv = "Name\tAge\nAda\t36\nGrace\t49";

    assert_eq!(parse_html_table(html).unwrap(), parse_tsv(tsv));
}

#[test]
fn test_merged_html_returns_none() {
    assert_eq!(
        parse_html_table("<table><tr><td rowspan=\"2\">a</td></tr></table>"),
        None
    );
    assert_eq!(
        parse_html_table("<table><tr><td colspan='3'>a</td></tr></table>"),
        None
    );
}

#[test]
fn test_paste_anchors_at_active_cell() {
    let mut harness = TestHarness::with_sample_data();
    harness
        .grid
        .select_cell(&CellAddress::row_index_col_key(1, "name"))
        .unwrap();

    let payload = ClipboardPayload {
        html: None,
        tsv: Some("X\t40\nY\t41".to_string()),
        text: None,
    };
    harness.grid.paste(&payload).unwrap();

    assert_raw(&harness, 1, "name", &CellValue::Text("X".into()));
    assert_raw(&harness, 1, "age", &CellValue::Number(40.0));
    assert_raw(&harness, 2, "name", &CellValue::Text("Y".into()));
    assert_raw(&harness, 2, "age", &CellValue::Number(41.0));

    // One batch: one undo restores everything.
    assert!(harness.grid.undo());
    assert_raw(&harness, 1, "name", &CellValue::Text("Bob".into()));
    assert_raw(&harness, 2, "age", &CellValue::Number(35.0));
}

#[test]
fn test_paste_prefers_tsv_over_merged_html() {
    let mut harness = TestHarness::with_sample_data();
    harness
        .grid
        .select_cell(&CellAddress::row_index_col_key(0, "name"))
        .unwrap();

    let payload = ClipboardPayload {
        html: Some("<table><tr><td colspan=\"2\">merged</td></tr></table>".to_string()),
        tsv: Some("Solo".to_string()),
        text: None,
    };
    harness.grid.paste(&payload).unwrap();
    assert_raw(&harness, 0, "name", &CellValue::Text("Solo".into()));
}

#[test]
fn test_copy_selection_produces_tsv() {
    let mut harness = TestHarness::with_sample_data();

    harness
        .grid
        .select_cell(&CellAddress::row_index_col_key(0, "name"))
        .unwrap();
    harness.grid.extend_selection_to(1, 1);

    let tsv = harness.grid.copy_selection();
    assert_eq!(tsv, "Alice\t30\nBob\t25");
}

#[test]
fn test_paste_skips_readonly_cells() {
    let mut harness = TestHarness::new();
    harness
        .grid
        .set_schema(vec![
            engine::ColumnSchema::new("a", engine::ColumnType::String),
            engine::ColumnSchema::new("b", engine::ColumnType::String).with_readonly(true),
        ])
        .unwrap();
    harness.grid.set_data(vec![common::record(&[
        ("a", "old-a".into()),
        ("b", "old-b".into()),
    ])]);

    harness
        .grid
        .select_cell(&CellAddress::row_index_col_key(0, "a"))
        .unwrap();
    let payload = ClipboardPayload {
        html: None,
        tsv: Some("new-a\tnew-b".to_string()),
        text: None,
    };
    harness.grid.paste(&payload).unwrap();

    assert_raw(&harness, 0, "a", &CellValue::Text("new-a".into()));
    // The readonly column kept its value.
    assert_raw(&harness, 0, "b", &CellValue::Text("old-b".into()));
}
