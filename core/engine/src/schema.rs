//! FILENAME: core/engine/src/schema.rs
//! PURPOSE: Typed column definitions - the serializable description of a table.
//! CONTEXT: A `Schema` is an immutable snapshot of column configuration,
//! replaced wholesale by `set_schema`. Columns carry a type, per-type format
//! options, base styling, and the host-supplied formula / conditional-style
//! callables. Formulas make a column implicitly readonly.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::date_format::DateKind;
use crate::number_format::{IntegerFormat, NumberFormat};
use crate::style::StyleDelta;
use crate::value::CellValue;

/// The record a row exposes to formulas and conditional styles: column key
/// to (pending-applied) value.
pub type Record = HashMap<String, CellValue>;

/// What a formula call produced. The warning variant keeps the computed
/// value but attaches a warning diagnostic to the cell.
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaOutcome {
    Value(CellValue),
    Warning(CellValue, String),
}

/// What a conditional-style call produced. `Warning` is the error-sentinel
/// return: the cell keeps its value but gets a warning diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleOutcome {
    None,
    Delta(StyleDelta),
    Warning(String),
}

/// Host-supplied pure function computing a cell value from the row record.
/// An `Err` return becomes an error diagnostic with "#ERROR" display text.
pub type FormulaFn = Rc<dyn Fn(&Record) -> Result<FormulaOutcome, String>>;

/// Host-supplied pure function computing a style delta from the row record.
pub type ConditionalStyleFn = Rc<dyn Fn(&Record) -> Result<StyleOutcome, String>>;

/// The type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnType {
    String,
    Number,
    Int,
    Uint,
    Boolean,
    Date,
    Time,
    DateTime,
    Enum,
    Tags,
    Button,
    Link,
}

impl ColumnType {
    /// The temporal kind for date-family columns.
    pub fn date_kind(&self) -> Option<DateKind> {
        match self {
            ColumnType::Date => Some(DateKind::Date),
            ColumnType::Time => Some(DateKind::Time),
            ColumnType::DateTime => Some(DateKind::DateTime),
            _ => None,
        }
    }
}

// ============================================================================
// PER-TYPE FORMAT OPTIONS
// ============================================================================

/// Formatting constraints for string columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TextFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Regex the full value must match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// How boolean cells render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BooleanFormat {
    /// Checkbox glyphs (the default).
    Checkbox,
    /// A single label, shown only when the value is true.
    TrueLabel(String),
    /// A [true, false] label pair.
    Labels(String, String),
}

impl Default for BooleanFormat {
    fn default() -> Self {
        BooleanFormat::Checkbox
    }
}

/// Pattern-or-preset for date-family columns. Unknown patterns coerce to
/// the kind's ISO preset at resolve time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DatePattern {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// Allowed options for enum columns. Options may carry a display label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnumFormat {
    pub options: Vec<EnumOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumOption {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl EnumOption {
    pub fn plain(value: impl Into<String>) -> Self {
        EnumOption {
            value: value.into(),
            label: None,
        }
    }

    pub fn labeled(value: impl Into<String>, label: impl Into<String>) -> Self {
        EnumOption {
            value: value.into(),
            label: Some(label.into()),
        }
    }
}

/// Allowed tags for tag-list columns. An empty list allows any tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TagsFormat {
    pub options: Vec<String>,
}

/// The per-type format configuration union.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ColumnFormat {
    #[default]
    None,
    Text(TextFormat),
    Number(NumberFormat),
    Integer(IntegerFormat),
    Boolean(BooleanFormat),
    Date(DatePattern),
    Enum(EnumFormat),
    Tags(TagsFormat),
}

// ============================================================================
// COLUMN SCHEMA
// ============================================================================

/// A single column definition.
#[derive(Clone)]
pub struct ColumnSchema {
    pub key: String,
    pub column_type: ColumnType,
    pub header: Option<String>,
    pub readonly: bool,
    pub unique: bool,
    pub nullable: bool,
    pub width: Option<f32>,
    pub wrap_text: bool,
    pub format: ColumnFormat,
    pub style: Option<StyleDelta>,
    pub formula: Option<FormulaFn>,
    pub conditional_style: Option<ConditionalStyleFn>,
}

impl ColumnSchema {
    pub fn new(key: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnSchema {
            key: key.into(),
            column_type,
            header: None,
            readonly: false,
            unique: false,
            nullable: true,
            width: None,
            wrap_text: false,
            format: ColumnFormat::None,
            style: None,
            formula: None,
            conditional_style: None,
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    pub fn with_readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_wrap_text(mut self, wrap: bool) -> Self {
        self.wrap_text = wrap;
        self
    }

    pub fn with_format(mut self, format: ColumnFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_style(mut self, style: StyleDelta) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_formula<F>(mut self, formula: F) -> Self
    where
        F: Fn(&Record) -> Result<FormulaOutcome, String> + 'static,
    {
        self.formula = Some(Rc::new(formula));
        self
    }

    pub fn with_conditional_style<F>(mut self, conditional: F) -> Self
    where
        F: Fn(&Record) -> Result<StyleOutcome, String> + 'static,
    {
        self.conditional_style = Some(Rc::new(conditional));
        self
    }

    /// The label shown in the header row: explicit header, else the key.
    pub fn header_label(&self) -> &str {
        self.header.as_deref().unwrap_or(&self.key)
    }

    /// Formula columns and action buttons never accept direct edits.
    pub fn is_readonly(&self) -> bool {
        self.readonly || self.formula.is_some() || self.column_type == ColumnType::Button
    }
}

impl fmt::Debug for ColumnSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnSchema")
            .field("key", &self.key)
            .field("column_type", &self.column_type)
            .field("header", &self.header)
            .field("readonly", &self.readonly)
            .field("unique", &self.unique)
            .field("nullable", &self.nullable)
            .field("width", &self.width)
            .field("wrap_text", &self.wrap_text)
            .field("format", &self.format)
            .field("style", &self.style)
            .field("formula", &self.formula.as_ref().map(|_| "<fn>"))
            .field(
                "conditional_style",
                &self.conditional_style.as_ref().map(|_| "<fn>"),
            )
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate column key: {0}")]
    DuplicateKey(String),
}

/// An immutable set of column definitions plus a key lookup index.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    columns: Vec<ColumnSchema>,
    by_key: HashMap<String, usize>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSchema>) -> Result<Self, SchemaError> {
        let mut by_key = HashMap::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            if by_key.insert(column.key.clone(), index).is_some() {
                return Err(SchemaError::DuplicateKey(column.key.clone()));
            }
        }
        Ok(Schema { columns, by_key })
    }

    pub fn empty() -> Self {
        Schema::default()
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn column(&self, key: &str) -> Option<&ColumnSchema> {
        self.by_key.get(key).map(|&i| &self.columns[i])
    }

    pub fn column_at(&self, index: usize) -> Option<&ColumnSchema> {
        self.columns.get(index)
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.by_key.get(key).copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns marked unique, for the uniqueness pass.
    pub fn unique_columns(&self) -> impl Iterator<Item = &ColumnSchema> {
        self.columns.iter().filter(|c| c.unique)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_keys_rejected() {
        let result = Schema::new(vec![
            ColumnSchema::new("a", ColumnType::String),
            ColumnSchema::new("a", ColumnType::Number),
        ]);
        assert_eq!(result.unwrap_err(), SchemaError::DuplicateKey("a".into()));
    }

    #[test]
    fn test_formula_column_is_readonly() {
        let column = ColumnSchema::new("total", ColumnType::Number)
            .with_formula(|_row| Ok(FormulaOutcome::Value(CellValue::Number(0.0))));
        assert!(column.is_readonly());

        let plain = ColumnSchema::new("qty", ColumnType::Number);
        assert!(!plain.is_readonly());
    }

    #[test]
    fn test_header_label_falls_back_to_key() {
        let column = ColumnSchema::new("name", ColumnType::String);
        assert_eq!(column.header_label(), "name");
        let with_header = column.with_header("Full name");
        assert_eq!(with_header.header_label(), "Full name");
    }

    #[test]
    fn test_key_lookup() {
        let schema = Schema::new(vec![
            ColumnSchema::new("a", ColumnType::String),
            ColumnSchema::new("b", ColumnType::Number),
        ])
        .unwrap();
        assert_eq!(schema.index_of("b"), Some(1));
        assert!(schema.column("c").is_none());
        assert_eq!(schema.len(), 2);
    }
}
