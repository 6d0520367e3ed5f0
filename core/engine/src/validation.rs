//! FILENAME: core/engine/src/validation.rs
//! PURPOSE: Type validation for cell values, producing cell diagnostics.
//! CONTEXT: Validation runs last in the derivation pipeline. Null is always
//! valid (non-required semantics). The message strings are fixed - tests
//! and host UIs key off them verbatim.

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::date_format::{parse_date, parse_datetime, parse_time};
use crate::schema::{BooleanFormat, ColumnFormat, ColumnSchema, ColumnType};
use crate::value::CellValue;

/// Severity of a cell diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticLevel {
    Warning,
    Error,
}

/// Which pipeline stage attached the diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticSource {
    Formula,
    ConditionalStyle,
    Validation,
    Unique,
}

/// A problem attached to a single cell by the derivation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub source: DiagnosticSource,
    pub message: String,
}

impl Diagnostic {
    pub fn error(source: DiagnosticSource, message: impl Into<String>) -> Self {
        Diagnostic {
            level: DiagnosticLevel::Error,
            source,
            message: message.into(),
        }
    }

    pub fn warning(source: DiagnosticSource, message: impl Into<String>) -> Self {
        Diagnostic {
            level: DiagnosticLevel::Warning,
            source,
            message: message.into(),
        }
    }
}

/// Compiled regex cache for string-pattern validation. Patterns come from
/// schema configuration, so the population is small and stable.
static PATTERN_CACHE: Lazy<Mutex<HashMap<String, Option<Regex>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn pattern_matches(pattern: &str, text: &str) -> bool {
    let mut cache = match PATTERN_CACHE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let compiled = cache
        .entry(pattern.to_string())
        .or_insert_with(|| Regex::new(pattern).ok());
    match compiled {
        Some(regex) => regex.is_match(text),
        // An uncompilable pattern never matches; the schema author sees
        // the validation failure immediately.
        None => false,
    }
}

fn error(message: impl Into<String>) -> Option<Diagnostic> {
    Some(Diagnostic::error(DiagnosticSource::Validation, message))
}

/// Validate a value against its column. Returns None when valid.
pub fn validate_cell(value: &CellValue, column: &ColumnSchema) -> Option<Diagnostic> {
    // Null/undefined are always valid.
    if value.is_null() {
        return None;
    }

    match column.column_type {
        ColumnType::String => validate_string(value, column),
        ColumnType::Number => match value {
            CellValue::Number(n) if n.is_finite() => None,
            _ => error("Expected a number"),
        },
        ColumnType::Int => match value {
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 => None,
            _ => error("Expected an integer"),
        },
        ColumnType::Uint => match value {
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 && *n >= 0.0 => None,
            CellValue::Number(n) if n.is_finite() && *n < 0.0 => {
                error("Expected a non-negative number")
            }
            _ => error("Expected a non-negative integer"),
        },
        ColumnType::Boolean => match value {
            CellValue::Bool(_) => None,
            _ => error("Expected a boolean"),
        },
        ColumnType::Enum => validate_enum(value, column),
        ColumnType::Tags => validate_tags(value, column),
        ColumnType::Date => match value {
            CellValue::Date(_) | CellValue::DateTime(_) => None,
            CellValue::Text(s) => {
                if parse_date(s).is_some() {
                    None
                } else {
                    error("Invalid date")
                }
            }
            _ => error("Expected a date/time string"),
        },
        ColumnType::Time => match value {
            CellValue::Time(_) => None,
            CellValue::Text(s) => {
                if parse_time(s).is_some() {
                    None
                } else {
                    error("Invalid date/time")
                }
            }
            _ => error("Expected a date/time string"),
        },
        ColumnType::DateTime => match value {
            CellValue::DateTime(_) | CellValue::Date(_) => None,
            CellValue::Text(s) => {
                if parse_datetime(s).is_some() {
                    None
                } else {
                    error("Invalid date/time")
                }
            }
            _ => error("Expected a date/time string"),
        },
        // Action cells accept their dedicated shape or the string shorthand.
        ColumnType::Button => match value {
            CellValue::Button(_) | CellValue::Text(_) => None,
            _ => error("Expected a string"),
        },
        ColumnType::Link => match value {
            CellValue::Link(_) | CellValue::Text(_) => None,
            _ => error("Expected a string"),
        },
    }
}

fn validate_string(value: &CellValue, column: &ColumnSchema) -> Option<Diagnostic> {
    let text = match value {
        CellValue::Text(s) => s,
        _ => return error("Expected a string"),
    };

    if let ColumnFormat::Text(format) = &column.format {
        if let Some(max) = format.max_length {
            if text.chars().count() > max {
                return error(format!("Too long (max {})", max));
            }
        }
        if let Some(pattern) = &format.pattern {
            if !pattern_matches(pattern, text) {
                return error("Does not match pattern");
            }
        }
    }

    None
}

fn validate_enum(value: &CellValue, column: &ColumnSchema) -> Option<Diagnostic> {
    // Both the wrapped enum shape and a plain string are tolerated.
    let selected = match value {
        CellValue::Enum(s) | CellValue::Text(s) => s,
        CellValue::Lookup { value, .. } => value,
        _ => return error("Expected an enum value"),
    };

    if let ColumnFormat::Enum(format) = &column.format {
        if !format.options.is_empty()
            && !format.options.iter().any(|o| o.value == *selected)
        {
            return error("Not in allowed options");
        }
    }

    None
}

fn validate_tags(value: &CellValue, column: &ColumnSchema) -> Option<Diagnostic> {
    let tags = match value {
        CellValue::Tags(tags) => tags,
        _ => return error("Expected a list of tags"),
    };

    if let ColumnFormat::Tags(format) = &column.format {
        if !format.options.is_empty() {
            for tag in tags {
                if !format.options.contains(tag) {
                    return error("Contains an unknown tag");
                }
            }
        }
    }

    None
}

/// The display text for a boolean value under a boolean format.
pub fn boolean_text(value: bool, format: &BooleanFormat) -> String {
    match format {
        BooleanFormat::Checkbox => if value { "☑" } else { "☐" }.to_string(),
        BooleanFormat::TrueLabel(label) => {
            if value {
                label.clone()
            } else {
                String::new()
            }
        }
        BooleanFormat::Labels(true_label, false_label) => {
            if value {
                true_label.clone()
            } else {
                false_label.clone()
            }
        }
    }
}
