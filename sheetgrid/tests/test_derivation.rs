//! FILENAME: tests/test_derivation.rs
//! The derivation pipeline end to end: formulas, conditional styles,
//! uniqueness, validation, and the aggregated error surface.

mod common;

use common::{record, TestHarness};
use engine::{
    CellValue, ColumnSchema, ColumnType, Record, StyleDelta, StyleOutcome,
    FormulaOutcome,
};
use engine::style::Color;
use sheetgrid::{CellAddress, EditMode};

fn price_qty_schema() -> Vec<ColumnSchema> {
    vec![
        ColumnSchema::new("price", ColumnType::Number),
        ColumnSchema::new("qty", ColumnType::Number),
        ColumnSchema::new("total", ColumnType::Number).with_formula(|row: &Record| {
            let price = row.get("price").and_then(|v| v.as_number()).unwrap_or(0.0);
            let qty = row.get("qty").and_then(|v| v.as_number()).unwrap_or(0.0);
            Ok(FormulaOutcome::Value(CellValue::Number(price * qty)))
        }),
    ]
}

#[test]
fn test_computed_column_displays_and_is_readonly() {
    let mut harness = TestHarness::new();
    harness.grid.set_schema(price_qty_schema()).unwrap();
    harness
        .grid
        .set_data(vec![record(&[("price", 10.0.into()), ("qty", 2.0.into())])]);

    assert_eq!(harness.display(0, "total"), "20");

    // The formula column rejects writes.
    let result = harness
        .grid
        .set_cell_value(&CellAddress::row_index_col_key(0, "total"), 99.0.into());
    assert!(result.is_err());
}

#[test]
fn test_computed_column_follows_pending_edits() {
    let mut harness = TestHarness::new();
    harness.grid.set_schema(price_qty_schema()).unwrap();
    harness
        .grid
        .set_data(vec![record(&[("price", 10.0.into()), ("qty", 2.0.into())])]);

    harness.grid.set_edit_mode(EditMode::Commit);
    harness.set_cell(0, "qty", 5.0.into());
    assert_eq!(harness.display(0, "total"), "50");
}

#[test]
fn test_formula_error_yields_error_text_and_diagnostic() {
    let mut harness = TestHarness::new();
    harness
        .grid
        .set_schema(vec![ColumnSchema::new("e", ColumnType::Number)
            .with_formula(|_row: &Record| Err("boom".to_string()))])
        .unwrap();
    harness.grid.set_data(vec![record(&[])]);

    assert_eq!(harness.display(0, "e"), "#ERROR");

    let errors = harness.grid.get_table_state().active_errors;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "boom");
    assert_eq!(errors[0].col_key, "e");
}

#[test]
fn test_formula_warning_keeps_value() {
    let mut harness = TestHarness::new();
    harness
        .grid
        .set_schema(vec![ColumnSchema::new("w", ColumnType::Number).with_formula(
            |_row: &Record| Ok(FormulaOutcome::Warning(CellValue::Number(123.0), "warn".into())),
        )])
        .unwrap();
    harness.grid.set_data(vec![record(&[])]);

    assert_eq!(harness.display(0, "w"), "123");
    // Warnings do not surface in the error aggregation.
    assert!(harness.grid.get_table_state().active_errors.is_empty());
}

#[test]
fn test_conditional_style_reaches_selection_snapshot() {
    let mut harness = TestHarness::new();
    harness
        .grid
        .set_schema(vec![ColumnSchema::new("n", ColumnType::Number)
            .with_conditional_style(|row: &Record| {
                let n = row.get("n").and_then(|v| v.as_number()).unwrap_or(0.0);
                if n < 0.0 {
                    Ok(StyleOutcome::Delta(
                        StyleDelta::new().with_text_color(Color::red()),
                    ))
                } else {
                    Ok(StyleOutcome::None)
                }
            })])
        .unwrap();
    harness
        .grid
        .set_data(vec![record(&[("n", (-7.0).into())])]);

    harness
        .grid
        .select_cell(&CellAddress::row_index_col_key(0, "n"))
        .unwrap();
    let snapshot = harness.grid.get_selection_snapshot();
    assert_eq!(snapshot.display, "-7");
    assert_eq!(snapshot.resolved_style.text_color, Some(Color::red()));
    // No user cell style was applied.
    assert_eq!(snapshot.cell_style, None);
}

#[test]
fn test_style_precedence_cell_over_conditional() {
    let mut harness = TestHarness::new();
    harness
        .grid
        .set_schema(vec![ColumnSchema::new("n", ColumnType::Number)
            .with_conditional_style(|_row: &Record| {
                Ok(StyleOutcome::Delta(
                    StyleDelta::new().with_text_color(Color::red()),
                ))
            })])
        .unwrap();
    harness.grid.set_data(vec![record(&[("n", 1.0.into())])]);

    harness
        .grid
        .select_cell(&CellAddress::row_index_col_key(0, "n"))
        .unwrap();
    harness
        .grid
        .apply_style_to_selection(&StyleDelta::new().with_text_color(Color::black()));

    let snapshot = harness.grid.get_selection_snapshot();
    // The user cell style wins over the conditional delta.
    assert_eq!(snapshot.resolved_style.text_color, Some(Color::black()));
}

#[test]
fn test_unique_column_marks_all_duplicates() {
    let mut harness = TestHarness::new();
    harness
        .grid
        .set_schema(vec![
            ColumnSchema::new("code", ColumnType::String).with_unique(true),
        ])
        .unwrap();
    harness.grid.set_data(vec![
        record(&[("code", "A".into())]),
        record(&[("code", "B".into())]),
        record(&[("code", "A".into())]),
        record(&[("code", CellValue::Null)]),
        record(&[("code", CellValue::Null)]),
    ]);

    let errors = harness.grid.get_table_state().active_errors;
    // Both "A" cells and only those; empty values are ignored.
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.col_key == "code"));
}

#[test]
fn test_unique_errors_track_edits_on_other_rows() {
    let mut harness = TestHarness::new();
    harness
        .grid
        .set_schema(vec![
            ColumnSchema::new("code", ColumnType::String).with_unique(true),
        ])
        .unwrap();
    harness.grid.set_data(vec![
        record(&[("code", "A".into())]),
        record(&[("code", "A".into())]),
    ]);

    // Both duplicates reported (and now cached).
    assert_eq!(harness.grid.get_table_state().active_errors.len(), 2);

    // Fixing one row must clear the other row's diagnostic too, even
    // though only the edited row's version moved.
    harness.set_cell(1, "code", "B".into());
    assert!(harness.grid.get_table_state().active_errors.is_empty());

    // And re-creating the duplicate lights both rows back up.
    harness.set_cell(1, "code", "A".into());
    assert_eq!(harness.grid.get_table_state().active_errors.len(), 2);
}

#[test]
fn test_validation_messages_surface() {
    let mut harness = TestHarness::new();
    harness
        .grid
        .set_schema(vec![ColumnSchema::new("age", ColumnType::Uint)])
        .unwrap();
    harness
        .grid
        .set_data(vec![record(&[("age", (-3.0).into())])]);

    let errors = harness.grid.get_table_state().active_errors;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Expected a non-negative number");
}

#[test]
fn test_unique_boolean_commit_dots() {
    let mut harness = TestHarness::new();
    harness
        .grid
        .set_schema(vec![
            ColumnSchema::new("name", ColumnType::String),
            ColumnSchema::new("primary", ColumnType::Boolean).with_unique(true),
        ])
        .unwrap();
    harness.grid.set_data(vec![
        record(&[("name", "A".into()), ("primary", true.into())]),
        record(&[("name", "B".into()), ("primary", false.into())]),
    ]);

    let row_a = harness.row_id(0);
    let row_b = harness.row_id(1);

    harness.grid.set_edit_mode(EditMode::Commit);
    harness.set_cell(0, "primary", false.into());
    harness.set_cell(1, "primary", true.into());

    let state = harness.grid.boolean_commit_state("primary");
    assert_eq!(state.current_row_id, Some(row_b));
    assert_eq!(state.previous_row_id, Some(row_a));

    // Commit applies both flips in one batch.
    harness.grid.commit();
    assert_eq!(harness.raw(0, "primary"), CellValue::Bool(false));
    assert_eq!(harness.raw(1, "primary"), CellValue::Bool(true));
}
