//! FILENAME: core/engine/src/value.rs
//! PURPOSE: Defines the tagged value union stored in table cells.
//! CONTEXT: Every cell holds a `CellValue`. The variants cover the primitive
//! types plus the wrapped shapes (enum choices, tag lists, labeled lookups)
//! and the action values (buttons, links). The derivation pipeline and the
//! codecs switch on the tag explicitly.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A button action value. `command` and `command_for` travel together:
/// either both are present or neither is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonValue {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_for: Option<String>,
}

impl ButtonValue {
    /// A plain labeled button with no command wiring.
    pub fn label_only(label: impl Into<String>) -> Self {
        ButtonValue {
            label: label.into(),
            command: None,
            command_for: None,
        }
    }

    /// A button carrying a command invocation. Returns None if only one of
    /// the command halves is supplied.
    pub fn with_command(
        label: impl Into<String>,
        command: Option<String>,
        command_for: Option<String>,
    ) -> Option<Self> {
        match (&command, &command_for) {
            (Some(_), Some(_)) | (None, None) => Some(ButtonValue {
                label: label.into(),
                command,
                command_for,
            }),
            _ => None,
        }
    }
}

/// A hyperlink action value. A bare string cell value is shorthand for
/// label == href == value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkValue {
    pub label: String,
    pub href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl LinkValue {
    pub fn from_text(value: impl Into<String>) -> Self {
        let value = value.into();
        LinkValue {
            label: value.clone(),
            href: value,
            target: None,
        }
    }
}

/// The value stored in a single cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CellValue {
    Null,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    /// A selected enum option, stored as its plain string form.
    Enum(String),
    /// An ordered list of tag strings.
    Tags(Vec<String>),
    /// A lookup value whose display label differs from the stored value.
    Lookup { value: String, label: String },
    Button(ButtonValue),
    Link(LinkValue),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// True for the values uniqueness ignores: null and empty strings.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) | CellValue::Enum(s) => s.is_empty(),
            CellValue::Tags(tags) => tags.is_empty(),
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) | CellValue::Enum(s) => Some(s),
            CellValue::Lookup { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Unwraps the wrapped shapes to their display label. Enum and lookup
    /// values resolve to their label text; tags join with ", ".
    pub fn display_label(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{:.0}", n)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            CellValue::Time(t) => t.format("%H:%M:%S").to_string(),
            CellValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            CellValue::Enum(s) => s.clone(),
            CellValue::Tags(tags) => tags.join(", "),
            CellValue::Lookup { label, .. } => label.clone(),
            CellValue::Button(b) => b.label.clone(),
            CellValue::Link(l) => l.label.clone(),
        }
    }

    /// Value-semantic equality used by the pending overlay: dates compare
    /// by their timestamp, enum/lookup values compare by their underlying
    /// string against plain text, everything else by structural equality.
    pub fn loosely_equals(&self, other: &CellValue) -> bool {
        use CellValue::*;
        match (self, other) {
            (Date(a), Date(b)) => a == b,
            (Time(a), Time(b)) => a == b,
            (DateTime(a), DateTime(b)) => a.and_utc().timestamp() == b.and_utc().timestamp(),
            (Date(a), DateTime(b)) | (DateTime(b), Date(a)) => {
                a.and_hms_opt(0, 0, 0).map(|dt| dt == *b).unwrap_or(false)
            }
            (Enum(a), Text(b)) | (Text(a), Enum(b)) => a == b,
            (Lookup { value, .. }, Text(t)) | (Text(t), Lookup { value, .. }) => value == t,
            (Number(a), Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (a, b) => a == b,
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Null
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loose_equality_dates_by_timestamp() {
        let d = NaiveDate::from_ymd_opt(2026, 2, 9).unwrap();
        let midnight = d.and_hms_opt(0, 0, 0).unwrap();
        assert!(CellValue::Date(d).loosely_equals(&CellValue::DateTime(midnight)));
        assert!(CellValue::Date(d).loosely_equals(&CellValue::Date(d)));
    }

    #[test]
    fn test_loose_equality_enum_vs_text() {
        assert!(CellValue::Enum("red".into()).loosely_equals(&CellValue::Text("red".into())));
        assert!(!CellValue::Enum("red".into()).loosely_equals(&CellValue::Text("blue".into())));
    }

    #[test]
    fn test_button_command_halves_travel_together() {
        assert!(ButtonValue::with_command("Run", Some("go".into()), None).is_none());
        assert!(ButtonValue::with_command("Run", None, None).is_some());
        assert!(ButtonValue::with_command("Run", Some("go".into()), Some("t".into())).is_some());
    }

    #[test]
    fn test_display_label_unwraps() {
        let lookup = CellValue::Lookup {
            value: "us-east-1".into(),
            label: "US East".into(),
        };
        assert_eq!(lookup.display_label(), "US East");
        assert_eq!(CellValue::Tags(vec!["a".into(), "b".into()]).display_label(), "a, b");
        assert_eq!(CellValue::Number(20.0).display_label(), "20");
    }

    #[test]
    fn test_is_empty() {
        assert!(CellValue::Null.is_empty());
        assert!(CellValue::Text(String::new()).is_empty());
        assert!(!CellValue::Number(0.0).is_empty());
        assert!(!CellValue::Bool(false).is_empty());
    }
}
