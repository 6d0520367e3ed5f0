//! FILENAME: core/engine/src/number_format.rs
//! PURPOSE: Number and integer codecs - parsing and display formatting.
//! CONTEXT: This module converts raw numeric values to formatted display
//! strings (decimal, scientific, and the radix forms for integer columns)
//! and parses user input back. Parsing NFKC-normalizes its input first so
//! full-width digits behave like ASCII.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::style::Color;

/// Display format for floating-point number columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum NumberStyle {
    #[default]
    Decimal,
    Scientific,
}

/// Display format for integer columns. The radix forms emit a signed
/// prefixed string ("-0x1a", "0b101", "0o10").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum IntegerStyle {
    #[default]
    Decimal,
    Scientific,
    Binary,
    Octal,
    Hex,
}

/// Formatting options for number columns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NumberFormat {
    #[serde(default)]
    pub format: NumberStyle,
    /// Significant digits to round to, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,
    /// Fixed count of decimal places, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<u8>,
    #[serde(default)]
    pub thousand_separator: bool,
    #[serde(default)]
    pub negative_red: bool,
    #[serde(default)]
    pub signed: bool,
}

/// Formatting options for int/uint columns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IntegerFormat {
    #[serde(default)]
    pub format: IntegerStyle,
    #[serde(default)]
    pub thousand_separator: bool,
    #[serde(default)]
    pub negative_red: bool,
    #[serde(default)]
    pub signed: bool,
}

/// A formatted value plus an optional color override (negativeRed).
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedText {
    pub text: String,
    pub color: Option<Color>,
}

impl FormattedText {
    fn plain(text: String) -> Self {
        FormattedText { text, color: None }
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

/// Format a floating-point value according to the column's number format.
pub fn format_number(value: f64, format: &NumberFormat) -> FormattedText {
    let rounded = match format.precision {
        Some(p) if p > 0 => round_significant(value, p as i32),
        _ => value,
    };

    let mut text = match format.format {
        NumberStyle::Decimal => match format.scale {
            Some(scale) => format!("{:.prec$}", rounded, prec = scale as usize),
            None => format_general(rounded),
        },
        NumberStyle::Scientific => {
            let scale = format.scale.unwrap_or(6) as usize;
            format!("{:.prec$e}", rounded, prec = scale)
        }
    };

    if format.thousand_separator && format.format == NumberStyle::Decimal {
        text = add_thousands_separator(&text);
    }

    if format.signed && rounded > 0.0 {
        text = format!("+{}", text);
    }

    let color = if format.negative_red && rounded < 0.0 {
        Some(Color::red())
    } else {
        None
    };

    FormattedText { text, color }
}

/// Format an integer according to the column's integer format.
pub fn format_integer(value: i64, format: &IntegerFormat) -> FormattedText {
    let magnitude = value.unsigned_abs();
    let sign = if value < 0 {
        "-"
    } else if format.signed && value > 0 {
        "+"
    } else {
        ""
    };

    let text = match format.format {
        IntegerStyle::Decimal => {
            let digits = magnitude.to_string();
            let digits = if format.thousand_separator {
                add_thousands_separator(&digits)
            } else {
                digits
            };
            format!("{}{}", sign, digits)
        }
        IntegerStyle::Scientific => {
            return format_number(
                value as f64,
                &NumberFormat {
                    format: NumberStyle::Scientific,
                    precision: None,
                    scale: None,
                    thousand_separator: false,
                    negative_red: format.negative_red,
                    signed: format.signed,
                },
            );
        }
        IntegerStyle::Binary => format!("{}0b{:b}", sign, magnitude),
        IntegerStyle::Octal => format!("{}0o{:o}", sign, magnitude),
        IntegerStyle::Hex => format!("{}0x{:x}", sign, magnitude),
    };

    let color = if format.negative_red && value < 0 {
        Some(Color::red())
    } else {
        None
    };

    FormattedText { text, color }
}

/// Format a number in general format (auto-detect best representation).
pub fn format_general(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }

    let abs_value = value.abs();

    // Use scientific notation for very large or very small numbers
    if abs_value >= 1e10 || (abs_value < 1e-4 && abs_value > 0.0) {
        return format!("{:.5e}", value)
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string();
    }

    // For integers, don't show decimal point
    if value.fract() == 0.0 && abs_value < 1e15 {
        return format!("{:.0}", value);
    }

    // For decimals, show up to 10 significant digits but trim trailing zeros
    let formatted = format!("{:.10}", value);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Round to `digits` significant digits.
fn round_significant(value: f64, digits: i32) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }
    let magnitude = value.abs().log10().floor() as i32;
    let factor = 10f64.powi(digits - magnitude - 1);
    (value * factor).round() / factor
}

/// Add thousands separators to a numeric string.
pub fn add_thousands_separator(s: &str) -> String {
    let parts: Vec<&str> = s.split('.').collect();
    let integer_part = parts[0];
    let decimal_part = parts.get(1);

    let negative = integer_part.starts_with('-');
    let digits: String = integer_part.chars().filter(|c| c.is_ascii_digit()).collect();

    let mut result = String::new();
    let len = digits.len();

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    if negative {
        result = format!("-{}", result);
    }

    if let Some(decimal) = decimal_part {
        result.push('.');
        result.push_str(decimal);
    }

    result
}

// ============================================================================
// PARSING
// ============================================================================

/// Parse a floating-point number. Rejects Infinity/NaN spellings and any
/// trailing garbage; accepts scientific notation and thousands separators.
pub fn parse_number(input: &str) -> Option<f64> {
    let normalized: String = input.nfkc().collect();
    let trimmed = normalized.trim();
    if trimmed.is_empty() {
        return None;
    }

    // `f64::from_str` would happily accept "inf"/"NaN"; only digits,
    // separators, sign and exponent characters are legal here.
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | ',' | 'e' | 'E'))
    {
        return None;
    }

    let without_separators = trimmed.replace(',', "");
    match without_separators.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => None,
    }
}

/// Parse an integer with an optional sign and an optional radix prefix
/// (`0b`, `0o`, `0x`). Returns None for empty digits, digits outside the
/// radix, or anything that is not a pure integer literal.
pub fn parse_integer(input: &str) -> Option<i64> {
    let normalized: String = input.nfkc().collect();
    let trimmed = normalized.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let (radix, digits) = if let Some(d) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        (2, d)
    } else if let Some(d) = rest.strip_prefix("0o").or_else(|| rest.strip_prefix("0O")) {
        (8, d)
    } else if let Some(d) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        (16, d)
    } else {
        (10, rest)
    };

    if digits.is_empty() {
        return None;
    }

    let magnitude = i64::from_str_radix(digits, radix).ok()?;
    if negative {
        magnitude.checked_neg()
    } else {
        Some(magnitude)
    }
}
