//! FILENAME: core/engine/src/lib.rs
//! PURPOSE: Main library entry point for the table engine.
//! CONTEXT: Re-exports public types and modules for use by other crates.

pub mod cache;
pub mod date_format;
pub mod model;
pub mod number_format;
pub mod resolve;
pub mod schema;
pub mod style;
pub mod undo;
pub mod validation;
pub mod value;

// Re-export commonly used types at the crate root
pub use cache::LruCache;
pub use date_format::{DateKind, DateToken};
pub use model::{DataChange, DataModel, ModelError, Row, RowId, SubscriberId, READONLY_FLAG_KEY};
pub use number_format::{
    format_general, format_integer, format_number, parse_integer, parse_number, FormattedText,
    IntegerFormat, IntegerStyle, NumberFormat, NumberStyle,
};
pub use resolve::{boolean_commit_state, BooleanCommitState, ResolvedCell, Resolver, ERROR_TEXT};
pub use schema::{
    BooleanFormat, ColumnFormat, ColumnSchema, ColumnType, ConditionalStyleFn, DatePattern,
    EnumFormat, EnumOption, FormulaFn, FormulaOutcome, Record, Schema, SchemaError, StyleOutcome,
    TagsFormat, TextFormat,
};
pub use style::{Color, StyleDelta, TextAlign};
pub use undo::{Batch, BatchSummary, Command, CommandQueue, HistorySnapshot};
pub use validation::{
    boolean_text, validate_cell, Diagnostic, DiagnosticLevel, DiagnosticSource,
};
pub use value::{ButtonValue, CellValue, LinkValue};
