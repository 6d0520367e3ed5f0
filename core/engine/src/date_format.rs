//! FILENAME: core/engine/src/date_format.rs
//! PURPOSE: Date/time/datetime codecs - token patterns, presets, coercion.
//! CONTEXT: Patterns use the token subset yyyy MM dd HH hh mm ss a with
//! '...' literal escapes. Each column kind (date, time, datetime) has named
//! presets; an unknown pattern, or one using tokens the kind disallows, is
//! coerced to the kind's ISO preset rather than rejected.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Which temporal kind a column carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateKind {
    Date,
    Time,
    DateTime,
}

/// A parsed token from a date pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum DateToken {
    /// yyyy — 4-digit year
    Year4,
    /// MM — 2-digit month
    Month2,
    /// dd — 2-digit day
    Day2,
    /// HH — 2-digit hour, 24-hour clock
    Hour24,
    /// hh — 2-digit hour, 12-hour clock
    Hour12,
    /// mm — 2-digit minute
    Minute2,
    /// ss — 2-digit second
    Second2,
    /// a — AM/PM marker
    AmPm,
    /// Passthrough text (separators and '...'-quoted runs)
    Literal(String),
}

impl DateToken {
    fn is_date_part(&self) -> bool {
        matches!(self, DateToken::Year4 | DateToken::Month2 | DateToken::Day2)
    }

    fn is_time_part(&self) -> bool {
        matches!(
            self,
            DateToken::Hour24
                | DateToken::Hour12
                | DateToken::Minute2
                | DateToken::Second2
                | DateToken::AmPm
        )
    }
}

// ============================================================================
// PRESETS
// ============================================================================

/// Resolve a named preset to its pattern, if the name is known for the kind.
pub fn preset_pattern(kind: DateKind, name: &str) -> Option<&'static str> {
    match kind {
        DateKind::Date => match name {
            "iso" => Some("yyyy-MM-dd"),
            "us" => Some("MM/dd/yyyy"),
            "eu" => Some("dd/MM/yyyy"),
            _ => None,
        },
        DateKind::Time => match name {
            "iso" => Some("HH:mm:ss"),
            "24h" => Some("HH:mm"),
            "12h" => Some("hh:mm a"),
            _ => None,
        },
        DateKind::DateTime => match name {
            "iso" => Some("yyyy-MM-dd HH:mm:ss"),
            "iso-24h" => Some("yyyy-MM-dd HH:mm"),
            "iso-12h" => Some("yyyy-MM-dd hh:mm a"),
            "us" => Some("MM/dd/yyyy HH:mm:ss"),
            "us-24h" => Some("MM/dd/yyyy HH:mm"),
            "us-12h" => Some("MM/dd/yyyy hh:mm a"),
            "eu" => Some("dd/MM/yyyy HH:mm:ss"),
            "eu-24h" => Some("dd/MM/yyyy HH:mm"),
            "eu-12h" => Some("dd/MM/yyyy hh:mm a"),
            _ => None,
        },
    }
}

/// The ISO preset every kind coerces to.
pub fn iso_pattern(kind: DateKind) -> &'static str {
    match kind {
        DateKind::Date => "yyyy-MM-dd",
        DateKind::Time => "HH:mm:ss",
        DateKind::DateTime => "yyyy-MM-dd HH:mm:ss",
    }
}

// ============================================================================
// PATTERN PARSING
// ============================================================================

/// Tokenize a pattern string. Returns None if the pattern contains a letter
/// run that is not one of the documented tokens.
fn tokenize(pattern: &str) -> Option<Vec<DateToken>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        // '...' quoted literal; everything inside passes through untouched.
        if c == '\'' {
            let mut literal = String::new();
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                literal.push(chars[i]);
                i += 1;
            }
            if i >= chars.len() {
                return None; // Unterminated quote
            }
            i += 1; // Closing quote
            tokens.push(DateToken::Literal(literal));
            continue;
        }

        if c.is_ascii_alphabetic() {
            let start = i;
            while i < chars.len() && chars[i] == c {
                i += 1;
            }
            let run: String = chars[start..i].iter().collect();
            let token = match run.as_str() {
                "yyyy" => DateToken::Year4,
                "MM" => DateToken::Month2,
                "dd" => DateToken::Day2,
                "HH" => DateToken::Hour24,
                "hh" => DateToken::Hour12,
                "mm" => DateToken::Minute2,
                "ss" => DateToken::Second2,
                "a" => DateToken::AmPm,
                _ => return None,
            };
            tokens.push(token);
            continue;
        }

        // Separator characters collect into one literal run.
        let start = i;
        while i < chars.len() && !chars[i].is_ascii_alphabetic() && chars[i] != '\'' {
            i += 1;
        }
        tokens.push(DateToken::Literal(chars[start..i].iter().collect()));
    }

    Some(tokens)
}

fn tokens_allowed(kind: DateKind, tokens: &[DateToken]) -> bool {
    match kind {
        DateKind::Date => tokens.iter().all(|t| !t.is_time_part()),
        DateKind::Time => tokens.iter().all(|t| !t.is_date_part()),
        DateKind::DateTime => true,
    }
}

/// Resolve a column's configured pattern-or-preset for its kind. Unknown
/// patterns and kind-disallowed tokens coerce to the ISO preset.
pub fn resolve_pattern(kind: DateKind, configured: Option<&str>) -> Vec<DateToken> {
    let pattern = match configured {
        None => iso_pattern(kind),
        Some(name_or_pattern) => match preset_pattern(kind, name_or_pattern) {
            Some(preset) => preset,
            None => name_or_pattern,
        },
    };

    match tokenize(pattern) {
        Some(tokens) if tokens_allowed(kind, &tokens) => tokens,
        _ => tokenize(iso_pattern(kind)).unwrap_or_default(),
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

fn push_token(out: &mut String, token: &DateToken, date: Option<NaiveDate>, time: Option<NaiveTime>) {
    match token {
        DateToken::Year4 => {
            if let Some(d) = date {
                out.push_str(&d.format("%Y").to_string());
            }
        }
        DateToken::Month2 => {
            if let Some(d) = date {
                out.push_str(&d.format("%m").to_string());
            }
        }
        DateToken::Day2 => {
            if let Some(d) = date {
                out.push_str(&d.format("%d").to_string());
            }
        }
        DateToken::Hour24 => {
            if let Some(t) = time {
                out.push_str(&format!("{:02}", t.hour()));
            }
        }
        DateToken::Hour12 => {
            if let Some(t) = time {
                let hour = (t.hour() + 11) % 12 + 1;
                out.push_str(&format!("{:02}", hour));
            }
        }
        DateToken::Minute2 => {
            if let Some(t) = time {
                out.push_str(&format!("{:02}", t.minute()));
            }
        }
        DateToken::Second2 => {
            if let Some(t) = time {
                out.push_str(&format!("{:02}", t.second()));
            }
        }
        DateToken::AmPm => {
            if let Some(t) = time {
                out.push_str(if t.hour() < 12 { "AM" } else { "PM" });
            }
        }
        DateToken::Literal(s) => out.push_str(s),
    }
}

pub fn format_date(date: NaiveDate, tokens: &[DateToken]) -> String {
    let mut out = String::new();
    for token in tokens {
        push_token(&mut out, token, Some(date), None);
    }
    out
}

pub fn format_time(time: NaiveTime, tokens: &[DateToken]) -> String {
    let mut out = String::new();
    for token in tokens {
        push_token(&mut out, token, None, Some(time));
    }
    out
}

pub fn format_datetime(datetime: NaiveDateTime, tokens: &[DateToken]) -> String {
    let mut out = String::new();
    for token in tokens {
        push_token(&mut out, token, Some(datetime.date()), Some(datetime.time()));
    }
    out
}

// ============================================================================
// PARSING
// ============================================================================

/// Parse a date string: ISO "yyyy-MM-dd" or any RFC 3339 timestamp
/// (the date part is kept).
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(d);
    }
    parse_datetime(trimmed).map(|dt| dt.date())
}

/// Parse a time string: "HH:mm" or "HH:mm:ss".
pub fn parse_time(input: &str) -> Option<NaiveTime> {
    let trimmed = input.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .ok()
}

/// Parse a datetime string: RFC 3339 (normalized to UTC) or a local
/// "yyyy-MM-dd HH:mm[:ss]" / "yyyy-MM-ddTHH:mm[:ss]" form.
pub fn parse_datetime(input: &str) -> Option<NaiveDateTime> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }

    for pattern in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return Some(dt);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_format_with_explicit_pattern() {
        let tokens = resolve_pattern(DateKind::Date, Some("yyyy/MM/dd"));
        assert_eq!(format_date(date(2026, 2, 9), &tokens), "2026/02/09");
    }

    #[test]
    fn test_unknown_pattern_coerces_to_iso() {
        let tokens = resolve_pattern(DateKind::DateTime, Some("QQ-what"));
        let dt = date(2026, 2, 9).and_hms_opt(10, 11, 12).unwrap();
        assert_eq!(format_datetime(dt, &tokens), "2026-02-09 10:11:12");
    }

    #[test]
    fn test_disallowed_tokens_coerce_to_iso() {
        // A time token inside a date pattern is not allowed for the kind.
        let tokens = resolve_pattern(DateKind::Date, Some("yyyy-MM-dd HH"));
        assert_eq!(format_date(date(2026, 2, 9), &tokens), "2026-02-09");
    }

    #[test]
    fn test_presets() {
        let us = resolve_pattern(DateKind::Date, Some("us"));
        assert_eq!(format_date(date(2026, 2, 9), &us), "02/09/2026");

        let t12 = resolve_pattern(DateKind::Time, Some("12h"));
        let afternoon = NaiveTime::from_hms_opt(13, 5, 0).unwrap();
        assert_eq!(format_time(afternoon, &t12), "01:05 PM");
    }

    #[test]
    fn test_quoted_literals_pass_through() {
        let tokens = resolve_pattern(DateKind::Date, Some("yyyy' of 'MM"));
        assert_eq!(format_date(date(2026, 2, 9), &tokens), "2026 of 02");
    }

    #[test]
    fn test_parse_rfc3339_keeps_utc_instant() {
        let dt = parse_datetime("2026-02-09T10:11:12Z").unwrap();
        assert_eq!(dt, date(2026, 2, 9).and_hms_opt(10, 11, 12).unwrap());

        let tokens = resolve_pattern(DateKind::Date, Some("yyyy/MM/dd"));
        assert_eq!(format_date(dt.date(), &tokens), "2026/02/09");
    }

    #[test]
    fn test_parse_time_forms() {
        assert_eq!(parse_time("10:30"), NaiveTime::from_hms_opt(10, 30, 0));
        assert_eq!(parse_time("10:30:45"), NaiveTime::from_hms_opt(10, 30, 45));
        assert_eq!(parse_time("later"), None);
    }
}
