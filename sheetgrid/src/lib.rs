//! FILENAME: sheetgrid/src/lib.rs
//! PURPOSE: Public entry point for the sheetgrid table component.
//! CONTEXT: A schema-driven, uncontrolled, in-memory spreadsheet-style
//! table: typed columns with formulas, conditional styling and validation;
//! direct/commit/readonly editing with undo; filtering, sorting and
//! selection; and two interchangeable renderers (immediate-mode canvas
//! display list, retained DOM tree) over the same model.
//!
//! The host constructs a [`GridController`], feeds it a schema and data,
//! and drives rendering and input through it:
//!
//! ```
//! use engine::{CellValue, ColumnSchema, ColumnType};
//! use sheetgrid::{CellAddress, GridController};
//!
//! let mut grid = GridController::new();
//! grid.set_schema(vec![
//!     ColumnSchema::new("name", ColumnType::String),
//!     ColumnSchema::new("age", ColumnType::Number),
//! ])
//! .unwrap();
//! grid.set_data(vec![
//!     [
//!         ("name".to_string(), CellValue::from("Ada")),
//!         ("age".to_string(), CellValue::from(36.0)),
//!     ]
//!     .into_iter()
//!     .collect(),
//! ]);
//!
//! grid.set_cell_value(&CellAddress::row_index_col_key(0, "age"), CellValue::from(37.0))
//!     .unwrap();
//! assert!(grid.get_table_state().undo_redo.can_undo);
//! ```

pub mod address;
pub mod clipboard;
pub mod controller;
pub mod modes;
pub mod render;
pub mod scheduler;

pub use address::{normalize, AddressError, CellAddress};
pub use clipboard::{parse_html_table, parse_payload, parse_tsv, to_tsv, ClipboardPayload};
pub use controller::{
    ActiveError, ChangeReason, ControllerError, DatasetState, GridController, RowStates,
    SelectionSnapshot, SubscriptionId, TableState, UndoRedoState,
};
pub use modes::{EditMode, LockMode, RenderMode};
pub use render::canvas::{CanvasRenderer, DrawOp, IconKind, RadioState, TextAnchor};
pub use render::dom::{DomRenderer, Node};
pub use render::{
    ActionHit, CursorKind, GridLayout, HitTarget, LogicalEvent, Rect, RenderContext, Renderer,
    StaticHtmlEmitter, Viewport,
};
pub use scheduler::{
    Clock, ManualClock, ManualScheduler, MeasurePump, Scheduler, TaskHandle, CURSOR_DEBOUNCE_MS,
    MEASURE_BUDGET_MS, MEASURE_CHUNK_ROWS,
};

// The engine and view-engine types most hosts need.
pub use engine::{
    CellValue, ColumnSchema, ColumnType, Diagnostic, DiagnosticLevel, DiagnosticSource, Record,
    RowId, StyleDelta,
};
pub use view_engine::{
    ActiveCell, FilterCondition, FilterCriteria, FilterOp, SelectionRange, SortDirection,
    SortSpec, TableView,
};
