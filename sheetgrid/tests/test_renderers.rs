//! FILENAME: tests/test_renderers.rs
//! The two renderer back-ends over identical inputs: canvas display list,
//! DOM tree markers, shared hit-testing, and the fill-handle rules.

mod common;

use common::{record, TestHarness};
use engine::{CellValue, ColumnSchema, ColumnType, Record, FormulaOutcome};
use sheetgrid::{
    CellAddress, EditMode, HitTarget, LogicalEvent, RenderMode, SortSpec, Viewport,
};

const VIEWPORT: Viewport = Viewport {
    scroll_top: 0.0,
    scroll_left: 0.0,
    width: 800.0,
    height: 400.0,
};

#[test]
fn test_corner_click_selects_all_regardless_of_scroll() {
    let mut harness = TestHarness::with_sample_data();
    harness
        .grid
        .render(VIEWPORT.scrolled(48.0, 120.0));

    let event = harness.grid.click_at(10.0, 10.0);
    assert!(event.is_none());

    let snapshot = harness.grid.get_selection_snapshot();
    assert_eq!(snapshot.row_key.as_deref(), Some("__all__"));
    assert_eq!(snapshot.col_key.as_deref(), Some("__all__"));
}

#[test]
fn test_cell_click_sets_active_cell() {
    let mut harness = TestHarness::with_sample_data();
    harness.grid.render(VIEWPORT);

    // First body cell: just right of the row header, below the header row.
    let event = harness.grid.click_at(60.0, 40.0);
    assert!(event.is_none());

    let snapshot = harness.grid.get_selection_snapshot();
    assert_eq!(snapshot.row_index, Some(0));
    assert_eq!(snapshot.col_index, Some(0));
    assert_eq!(snapshot.display, "Alice");
}

#[test]
fn test_header_icon_emits_filter_sort_open() {
    let mut harness = TestHarness::with_sample_data();
    // Sorting makes the icon visible and hit-testable.
    harness
        .grid
        .update_view(|view| view.set_sorts(vec![SortSpec::ascending("name")]));
    harness.grid.render(VIEWPORT);

    // The icon sits right-aligned inside the first header.
    let hit = harness.grid.hit_test(48.0 + 120.0 - 12.0, 14.0);
    assert_eq!(hit, HitTarget::HeaderIcon { col_index: 0 });

    let event = harness.grid.click_at(48.0 + 120.0 - 12.0, 14.0);
    assert_eq!(
        event,
        Some(LogicalEvent::FilterSortOpen {
            col_key: "name".into()
        })
    );
}

#[test]
fn test_row_header_hit_uses_height_index() {
    let mut harness = TestHarness::with_sample_data();
    harness.grid.render(VIEWPORT);

    // Default row height is 24: y = 28 (header) + 24*2 + 1 lands on row 2.
    let hit = harness.grid.hit_test(10.0, 28.0 + 48.0 + 1.0);
    assert_eq!(hit, HitTarget::RowHeader { row_index: 2 });
}

#[test]
fn test_fill_handle_rules() {
    let mut harness = TestHarness::new();
    harness
        .grid
        .set_schema(vec![
            ColumnSchema::new("name", ColumnType::String),
            ColumnSchema::new("total", ColumnType::Number).with_formula(|_row: &Record| {
                Ok(FormulaOutcome::Value(CellValue::Number(1.0)))
            }),
        ])
        .unwrap();
    harness.grid.set_data(vec![
        record(&[("name", "a".into())]),
        record(&[("name", "b".into())]),
    ]);

    // Editable column, single-cell selection: the handle is painted and
    // hit-testable at the cell's bottom-right corner.
    harness
        .grid
        .select_cell(&CellAddress::row_index_col_key(0, "name"))
        .unwrap();
    harness.grid.render(VIEWPORT);
    let handle_hit = harness.grid.hit_test(48.0 + 120.0, 28.0 + 24.0);
    assert_eq!(handle_hit, HitTarget::FillHandle);

    // Formula column: no fill handle.
    harness
        .grid
        .select_cell(&CellAddress::row_index_col_key(0, "total"))
        .unwrap();
    harness.grid.render(VIEWPORT);
    let no_handle = harness.grid.hit_test(48.0 + 240.0, 28.0 + 24.0);
    assert_ne!(no_handle, HitTarget::FillHandle);
}

#[test]
fn test_cursor_policy_forced_cell_in_readonly_mode() {
    let mut harness = TestHarness::with_sample_data();
    harness.grid.render(VIEWPORT);

    harness.grid.set_edit_mode(EditMode::Readonly);
    let cursor = harness.grid.cursor_at(60.0, 40.0);
    assert_eq!(cursor, sheetgrid::CursorKind::Cell);
}

// ============================================================================
// DOM RENDERER
// ============================================================================

#[test]
fn test_dom_cells_carry_markers() {
    use sheetgrid::{DomRenderer, RenderContext, Renderer};

    let mut harness = TestHarness::with_sample_data();
    harness.grid.set_edit_mode(EditMode::Commit);
    harness.set_cell(0, "city", "Albany".into());
    harness
        .grid
        .select_cell(&CellAddress::row_index_col_key(0, "name"))
        .unwrap();

    // Drive a DOM renderer with the controller's state.
    let mut dom = DomRenderer::new();
    dom.mount();
    dom.set_active_cell(harness.grid.selection().active.clone());
    dom.set_selection(harness.grid.selection().clone());

    let mut resolver = engine::Resolver::new();
    let schema = harness.grid.schema().clone();
    let view = harness.grid.view().clone();
    let visible = harness.grid.visible_rows().clone();
    let selection = harness.grid.selection().clone();
    let mut ctx = RenderContext {
        model: harness.grid.model(),
        schema: &schema,
        schema_version: 1,
        view: &view,
        visible: &visible,
        selection: &selection,
        resolver: &mut resolver,
    };
    dom.render(&mut ctx, VIEWPORT);

    let root = dom.root();
    assert_eq!(root.tag, "table");

    // The pending cell carries data attributes and the pending marker.
    let pending_cell = root
        .find(&|n| n.tag == "td" && n.has_class("pending"))
        .expect("pending cell rendered");
    assert_eq!(
        pending_cell.attrs.get("data-col-key").map(String::as_str),
        Some("city")
    );
    assert_eq!(
        pending_cell.attrs.get("data-raw").map(String::as_str),
        Some("New York")
    );

    // The active cell is marked.
    let active = root
        .find(&|n| n.has_class("active-cell"))
        .expect("active cell rendered");
    assert_eq!(
        active.attrs.get("data-col-key").map(String::as_str),
        Some("name")
    );

    // Boolean cells resolve to checkbox glyphs.
    let bool_cell = root
        .find(&|n| {
            n.tag == "td" && n.attrs.get("data-col-key").map(String::as_str) == Some("active")
        })
        .expect("boolean cell rendered");
    assert_eq!(bool_cell.text.as_deref(), Some("☑"));
}

#[test]
fn test_dom_and_canvas_show_same_text() {
    let mut harness = TestHarness::with_sample_data();

    // Canvas mode: table data is the logical output both backends share.
    let canvas_table = harness.grid.get_table_data();

    harness.grid.set_render_mode(RenderMode::Dom);
    let dom_table = harness.grid.get_table_data();
    assert_eq!(canvas_table, dom_table);
}
