//! FILENAME: core/view-engine/src/filter.rs
//! PURPOSE: Per-column filter criteria and their evaluation.
//! CONTEXT: A column is filtered either by a set of allowed display values
//! or by a single condition (comparison, substring, blank checks).
//! Conditions compare numerically when both sides parse as numbers and
//! fall back to case-insensitive text comparison otherwise.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use engine::parse_number;

/// Comparison/matching operator for a condition filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOp {
    Equals,
    NotEquals,
    Contains,
    BeginsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    /// Inclusive range between operand and operand2.
    Between,
    Blank,
    NotBlank,
}

/// A single condition applied to a column's resolved display value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCondition {
    pub op: FilterOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operand: Option<String>,
    /// Second operand, used with Between.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operand2: Option<String>,
}

impl FilterCondition {
    pub fn new(op: FilterOp, operand: impl Into<String>) -> Self {
        FilterCondition {
            op,
            operand: Some(operand.into()),
            operand2: None,
        }
    }

    pub fn between(low: impl Into<String>, high: impl Into<String>) -> Self {
        FilterCondition {
            op: FilterOp::Between,
            operand: Some(low.into()),
            operand2: Some(high.into()),
        }
    }

    pub fn blank() -> Self {
        FilterCondition {
            op: FilterOp::Blank,
            operand: None,
            operand2: None,
        }
    }

    pub fn not_blank() -> Self {
        FilterCondition {
            op: FilterOp::NotBlank,
            operand: None,
            operand2: None,
        }
    }
}

/// The filter state for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterCriteria {
    /// Keep rows whose display value is in the set. An empty set keeps
    /// everything (no effective filter).
    Values { values: BTreeSet<String> },
    Condition(FilterCondition),
}

impl FilterCriteria {
    pub fn values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterCriteria::Values {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a row's resolved display value passes this filter.
    pub fn matches(&self, display: &str) -> bool {
        match self {
            FilterCriteria::Values { values } => values.is_empty() || values.contains(display),
            FilterCriteria::Condition(condition) => condition_matches(condition, display),
        }
    }
}

fn condition_matches(condition: &FilterCondition, display: &str) -> bool {
    let operand = condition.operand.as_deref().unwrap_or("");

    match condition.op {
        FilterOp::Blank => display.trim().is_empty(),
        FilterOp::NotBlank => !display.trim().is_empty(),
        FilterOp::Equals => compare(display, operand) == Some(std::cmp::Ordering::Equal),
        FilterOp::NotEquals => compare(display, operand) != Some(std::cmp::Ordering::Equal),
        FilterOp::Contains => lower(display).contains(&lower(operand)),
        FilterOp::BeginsWith => lower(display).starts_with(&lower(operand)),
        FilterOp::EndsWith => lower(display).ends_with(&lower(operand)),
        FilterOp::GreaterThan => matches!(compare(display, operand), Some(std::cmp::Ordering::Greater)),
        FilterOp::LessThan => matches!(compare(display, operand), Some(std::cmp::Ordering::Less)),
        FilterOp::GreaterThanOrEqual => matches!(
            compare(display, operand),
            Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
        ),
        FilterOp::LessThanOrEqual => matches!(
            compare(display, operand),
            Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
        ),
        FilterOp::Between => {
            let high = condition.operand2.as_deref().unwrap_or("");
            let above = matches!(
                compare(display, operand),
                Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
            );
            let below = matches!(
                compare(display, high),
                Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
            );
            above && below
        }
    }
}

fn lower(s: &str) -> String {
    s.to_lowercase()
}

/// Numeric comparison when both sides parse as numbers, otherwise
/// case-insensitive lexicographic.
fn compare(left: &str, right: &str) -> Option<std::cmp::Ordering> {
    match (parse_number(left), parse_number(right)) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => Some(lower(left).cmp(&lower(right))),
    }
}
