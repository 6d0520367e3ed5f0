//! FILENAME: core/engine/src/resolve.rs
//! PURPOSE: The derivation pipeline - from (row, column) to a rendered cell.
//! CONTEXT: Resolution runs formula, conditional style, uniqueness,
//! validation, style merge and formatting in that fixed order. Individual
//! cell problems become diagnostics; nothing here ever propagates an error
//! out of the pipeline. Results are memoized keyed by the row/schema/view
//! versions - plus a dataset fingerprint for unique columns, whose
//! duplicates depend on every row - so a stale entry can never be served.

use std::collections::{HashMap, HashSet};

use crate::cache::LruCache;
use crate::date_format::{self, DateKind};
use crate::model::{DataModel, RowId};
use crate::number_format;
use crate::schema::{ColumnFormat, ColumnSchema, FormulaOutcome, Schema, StyleOutcome};
use crate::style::StyleDelta;
use crate::validation::{self, boolean_text, Diagnostic, DiagnosticSource};
use crate::value::CellValue;

/// Display text used when a formula or conditional style raises.
pub const ERROR_TEXT: &str = "#ERROR";

/// Bound on the memoized derivation results.
const DERIVATION_CACHE_CAPACITY: usize = 4096;

/// The fully derived state of one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCell {
    /// The value after formula evaluation and unwrapping.
    pub value: CellValue,
    /// Display text override ("#ERROR"); wins over formatted text.
    pub text_override: Option<String>,
    /// The formatted display text (already accounts for the override).
    pub text: String,
    /// column-base ⊕ conditional ⊕ cell style, plus codec color overrides.
    pub style: StyleDelta,
    pub diagnostic: Option<Diagnostic>,
}

/// Pending commit transition for a boolean unique column, used by the
/// renderers to paint radio dots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BooleanCommitState {
    /// The row whose pending flip is false → true.
    pub current_row_id: Option<RowId>,
    /// The row whose pending flip is true → false.
    pub previous_row_id: Option<RowId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    row_id: RowId,
    col_key: String,
    row_version: u64,
    schema_version: u64,
    view_version: u64,
    /// Dataset fingerprint for unique columns, zero otherwise. The
    /// uniqueness pass reads every row, so any edit anywhere must miss
    /// the cache for these cells - a row's own version is not enough.
    data_fingerprint: u64,
}

/// Duplicate bookkeeping for one unique column, cached against a dataset
/// fingerprint so any row mutation invalidates it.
#[derive(Debug)]
struct UniqueColumnState {
    fingerprint: u64,
    duplicate_rows: HashSet<RowId>,
}

/// Memoizing resolver over a data model + schema.
pub struct Resolver {
    cache: LruCache<CacheKey, ResolvedCell>,
    unique: HashMap<String, UniqueColumnState>,
}

impl Default for Resolver {
    fn default() -> Self {
        Resolver::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Resolver {
            cache: LruCache::new(DERIVATION_CACHE_CAPACITY),
            unique: HashMap::new(),
        }
    }

    /// Drop all memoized state (schema replacement, dataset reset).
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
        self.unique.clear();
    }

    /// Resolve one cell, serving a memoized result when the version keys
    /// still match.
    pub fn resolve_cell(
        &mut self,
        model: &DataModel,
        schema: &Schema,
        schema_version: u64,
        view_version: u64,
        row_id: RowId,
        col_key: &str,
    ) -> ResolvedCell {
        let row_version = model.get_row_version(row_id).unwrap_or(0);
        // Unique cells derive from the whole column, not just their row.
        let data_fingerprint = if schema.column(col_key).map(|c| c.unique).unwrap_or(false) {
            dataset_fingerprint(model)
        } else {
            0
        };
        let key = CacheKey {
            row_id,
            col_key: col_key.to_string(),
            row_version,
            schema_version,
            view_version,
            data_fingerprint,
        };

        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }

        let resolved = self.compute(model, schema, row_id, col_key);
        self.cache.insert(key, resolved.clone());
        resolved
    }

    fn compute(
        &mut self,
        model: &DataModel,
        schema: &Schema,
        row_id: RowId,
        col_key: &str,
    ) -> ResolvedCell {
        let column = match schema.column(col_key) {
            Some(c) => c,
            None => {
                // Unknown column: show whatever the record holds, unstyled.
                let value = model
                    .get_cell(row_id, col_key)
                    .cloned()
                    .unwrap_or(CellValue::Null);
                let text = value.display_label();
                return ResolvedCell {
                    value,
                    text_override: None,
                    text,
                    style: StyleDelta::default(),
                    diagnostic: None,
                };
            }
        };

        let record = model.pending_applied_record(row_id).unwrap_or_default();

        let mut diagnostic: Option<Diagnostic> = None;
        let mut text_override: Option<String> = None;

        // Step 1: formula, or the pending-or-raw value.
        let value = match &column.formula {
            Some(formula) => match formula(&record) {
                Ok(FormulaOutcome::Value(v)) => v,
                Ok(FormulaOutcome::Warning(v, message)) => {
                    diagnostic = Some(Diagnostic::warning(DiagnosticSource::Formula, message));
                    v
                }
                Err(message) => {
                    diagnostic = Some(Diagnostic::error(DiagnosticSource::Formula, message));
                    text_override = Some(ERROR_TEXT.to_string());
                    CellValue::Null
                }
            },
            None => record.get(col_key).cloned().unwrap_or(CellValue::Null),
        };

        // Step 2: conditional style.
        let mut conditional_delta = StyleDelta::default();
        if let Some(conditional) = &column.conditional_style {
            match conditional(&record) {
                Ok(StyleOutcome::None) => {}
                Ok(StyleOutcome::Delta(delta)) => conditional_delta = delta,
                Ok(StyleOutcome::Warning(message)) => {
                    if diagnostic.is_none() {
                        diagnostic = Some(Diagnostic::warning(
                            DiagnosticSource::ConditionalStyle,
                            message,
                        ));
                    }
                }
                Err(message) => {
                    if diagnostic.is_none() {
                        diagnostic = Some(Diagnostic::error(
                            DiagnosticSource::ConditionalStyle,
                            message,
                        ));
                    }
                    if text_override.is_none() {
                        text_override = Some(ERROR_TEXT.to_string());
                    }
                }
            }
        }

        // Step 3: uniqueness.
        if column.unique && diagnostic.is_none() && !value.is_empty() {
            let duplicates = self.duplicate_rows(model, schema, column);
            if duplicates.contains(&row_id) {
                diagnostic = Some(Diagnostic::error(
                    DiagnosticSource::Unique,
                    "Duplicate value",
                ));
            }
        }

        // Step 4: type validation.
        if diagnostic.is_none() {
            diagnostic = validation::validate_cell(&value, column);
        }

        // Step 5: style merge (column base, then conditional; the cell-level
        // user delta stacks on top).
        let base = column.style.clone().unwrap_or_default();
        let cell = model.cell_style(row_id, col_key).cloned().unwrap_or_default();
        let mut style = StyleDelta::stack(&[&base, &conditional_delta, &cell]);

        // Step 6: format.
        let text = match &text_override {
            Some(override_text) => override_text.clone(),
            None => format_value(&value, column, &mut style),
        };

        ResolvedCell {
            value,
            text_override,
            text,
            style,
            diagnostic,
        }
    }

    // ========================================================================
    // UNIQUENESS
    // ========================================================================

    /// Rows holding a duplicated non-empty value in the given unique column.
    pub fn duplicate_rows(
        &mut self,
        model: &DataModel,
        schema: &Schema,
        column: &ColumnSchema,
    ) -> HashSet<RowId> {
        let fingerprint = dataset_fingerprint(model);
        if let Some(state) = self.unique.get(&column.key) {
            if state.fingerprint == fingerprint {
                return state.duplicate_rows.clone();
            }
        }

        let duplicate_rows = compute_duplicates(model, schema, column);
        self.unique.insert(
            column.key.clone(),
            UniqueColumnState {
                fingerprint,
                duplicate_rows: duplicate_rows.clone(),
            },
        );
        duplicate_rows
    }
}

/// Fold of (row id, version) pairs plus the row count; any mutation or
/// structural change produces a different fingerprint.
fn dataset_fingerprint(model: &DataModel) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for row in model.rows() {
        hash = hash
            .wrapping_mul(0x100_0000_01b3)
            .wrapping_add(row.id.0)
            .wrapping_mul(0x100_0000_01b3)
            .wrapping_add(row.version);
    }
    hash.wrapping_add(model.len() as u64)
}

fn compute_duplicates(
    model: &DataModel,
    schema: &Schema,
    column: &ColumnSchema,
) -> HashSet<RowId> {
    let mut first_seen: HashMap<String, RowId> = HashMap::new();
    let mut duplicates: HashSet<RowId> = HashSet::new();

    for row in model.rows() {
        let value = step_one_value(model, schema, row.id, column);
        if value.is_empty() {
            continue;
        }
        let key = canonical_key(&value);
        match first_seen.get(&key) {
            Some(&first) => {
                duplicates.insert(first);
                duplicates.insert(row.id);
            }
            None => {
                first_seen.insert(key, row.id);
            }
        }
    }

    duplicates
}

/// The value uniqueness compares: the formula result when the column has
/// one, otherwise pending-or-raw. Formula errors count as empty.
fn step_one_value(
    model: &DataModel,
    _schema: &Schema,
    row_id: RowId,
    column: &ColumnSchema,
) -> CellValue {
    match &column.formula {
        Some(formula) => {
            let record = model.pending_applied_record(row_id).unwrap_or_default();
            match formula(&record) {
                Ok(FormulaOutcome::Value(v)) | Ok(FormulaOutcome::Warning(v, _)) => v,
                Err(_) => CellValue::Null,
            }
        }
        None => model
            .get_cell(row_id, &column.key)
            .cloned()
            .unwrap_or(CellValue::Null),
    }
}

fn canonical_key(value: &CellValue) -> String {
    match value {
        CellValue::Number(n) => number_format::format_general(*n),
        CellValue::Bool(b) => b.to_string(),
        other => other.display_label(),
    }
}

/// Pending commit transitions for a boolean unique column.
pub fn boolean_commit_state(model: &DataModel, col_key: &str) -> BooleanCommitState {
    let mut state = BooleanCommitState::default();
    for row in model.rows() {
        let raw = model
            .get_raw_cell(row.id, col_key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let pending = model.pending_cell(row.id, col_key).and_then(|v| v.as_bool());
        match pending {
            Some(true) if !raw => state.current_row_id = Some(row.id),
            Some(false) if raw => state.previous_row_id = Some(row.id),
            _ => {}
        }
    }
    state
}

// ============================================================================
// FORMATTING
// ============================================================================

/// Produce display text for a resolved value, folding codec color
/// overrides (negativeRed) into the style when nothing above set a color.
fn format_value(value: &CellValue, column: &ColumnSchema, style: &mut StyleDelta) -> String {
    match (&column.format, value) {
        (ColumnFormat::Number(format), CellValue::Number(n)) => {
            apply_formatted(number_format::format_number(*n, format), style)
        }
        (ColumnFormat::Integer(format), CellValue::Number(n)) => {
            if n.fract() == 0.0 && n.abs() < 9.3e18 {
                apply_formatted(number_format::format_integer(*n as i64, format), style)
            } else {
                value.display_label()
            }
        }
        (ColumnFormat::Boolean(format), CellValue::Bool(b)) => boolean_text(*b, format),
        (_, CellValue::Bool(b)) if column.column_type == crate::schema::ColumnType::Boolean => {
            boolean_text(*b, &crate::schema::BooleanFormat::Checkbox)
        }
        (ColumnFormat::Enum(format), CellValue::Enum(s) | CellValue::Text(s)) => format
            .options
            .iter()
            .find(|o| o.value == *s)
            .and_then(|o| o.label.clone())
            .unwrap_or_else(|| s.clone()),
        (ColumnFormat::Date(config), _) => format_temporal(value, column, config.pattern.as_deref()),
        _ => match column.column_type.date_kind() {
            Some(_) => format_temporal(value, column, None),
            None => value.display_label(),
        },
    }
}

fn apply_formatted(formatted: number_format::FormattedText, style: &mut StyleDelta) -> String {
    if style.text_color.is_none() {
        style.text_color = formatted.color;
    }
    formatted.text
}

fn format_temporal(value: &CellValue, column: &ColumnSchema, pattern: Option<&str>) -> String {
    let kind = match column.column_type.date_kind() {
        Some(kind) => kind,
        None => return value.display_label(),
    };
    let tokens = date_format::resolve_pattern(kind, pattern);

    match (kind, value) {
        (DateKind::Date, CellValue::Date(d)) => date_format::format_date(*d, &tokens),
        (DateKind::Date, CellValue::DateTime(dt)) => date_format::format_date(dt.date(), &tokens),
        (DateKind::Date, CellValue::Text(s)) => match date_format::parse_date(s) {
            Some(d) => date_format::format_date(d, &tokens),
            None => s.clone(),
        },
        (DateKind::Time, CellValue::Time(t)) => date_format::format_time(*t, &tokens),
        (DateKind::Time, CellValue::Text(s)) => match date_format::parse_time(s) {
            Some(t) => date_format::format_time(t, &tokens),
            None => s.clone(),
        },
        (DateKind::DateTime, CellValue::DateTime(dt)) => date_format::format_datetime(*dt, &tokens),
        (DateKind::DateTime, CellValue::Date(d)) => match d.and_hms_opt(0, 0, 0) {
            Some(dt) => date_format::format_datetime(dt, &tokens),
            None => value.display_label(),
        },
        (DateKind::DateTime, CellValue::Text(s)) => match date_format::parse_datetime(s) {
            Some(dt) => date_format::format_datetime(dt, &tokens),
            None => s.clone(),
        },
        _ => value.display_label(),
    }
}

/// Convenience for hosts that only need the display text of a raw value
/// under a column's configuration. Skips the style stages entirely; the
/// text matches `resolve_cell` output for cells without a text override.
pub fn format_cell_text(value: &CellValue, column: &ColumnSchema) -> String {
    let mut scratch = StyleDelta::default();
    format_value(value, column, &mut scratch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSchema, ColumnType, Record};
    use crate::validation::DiagnosticLevel;

    fn record(pairs: &[(&str, CellValue)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn setup(columns: Vec<ColumnSchema>, records: Vec<Record>) -> (DataModel, Schema, Resolver) {
        let mut model = DataModel::new();
        model.set_data(records);
        let schema = Schema::new(columns).unwrap();
        (model, schema, Resolver::new())
    }

    #[test]
    fn test_computed_column() {
        let (model, schema, mut resolver) = setup(
            vec![
                ColumnSchema::new("price", ColumnType::Number),
                ColumnSchema::new("qty", ColumnType::Number),
                ColumnSchema::new("total", ColumnType::Number).with_formula(|row: &Record| {
                    let price = row.get("price").and_then(|v| v.as_number()).unwrap_or(0.0);
                    let qty = row.get("qty").and_then(|v| v.as_number()).unwrap_or(0.0);
                    Ok(FormulaOutcome::Value(CellValue::Number(price * qty)))
                }),
            ],
            vec![record(&[("price", 10.0.into()), ("qty", 2.0.into())])],
        );

        let row_id = model.rows()[0].id;
        let resolved = resolver.resolve_cell(&model, &schema, 0, 0, row_id, "total");
        assert_eq!(resolved.text, "20");
        assert!(resolved.diagnostic.is_none());
        assert!(schema.column("total").unwrap().is_readonly());
    }

    #[test]
    fn test_formula_error_yields_error_text() {
        let (model, schema, mut resolver) = setup(
            vec![ColumnSchema::new("e", ColumnType::Number)
                .with_formula(|_row: &Record| Err("boom".to_string()))],
            vec![record(&[])],
        );

        let row_id = model.rows()[0].id;
        let resolved = resolver.resolve_cell(&model, &schema, 0, 0, row_id, "e");
        assert_eq!(resolved.text, ERROR_TEXT);
        let diag = resolved.diagnostic.unwrap();
        assert_eq!(diag.level, DiagnosticLevel::Error);
        assert_eq!(diag.source, DiagnosticSource::Formula);
        assert_eq!(diag.message, "boom");
    }

    #[test]
    fn test_formula_warning_keeps_value() {
        let (model, schema, mut resolver) = setup(
            vec![ColumnSchema::new("w", ColumnType::Number).with_formula(|_row: &Record| {
                Ok(FormulaOutcome::Warning(CellValue::Number(123.0), "warn".into()))
            })],
            vec![record(&[])],
        );

        let row_id = model.rows()[0].id;
        let resolved = resolver.resolve_cell(&model, &schema, 0, 0, row_id, "w");
        assert_eq!(resolved.text, "123");
        let diag = resolved.diagnostic.unwrap();
        assert_eq!(diag.level, DiagnosticLevel::Warning);
        assert_eq!(diag.source, DiagnosticSource::Formula);
        assert_eq!(diag.message, "warn");
    }

    #[test]
    fn test_conditional_style_merges_delta() {
        use crate::style::Color;

        let (model, schema, mut resolver) = setup(
            vec![ColumnSchema::new("n", ColumnType::Number).with_conditional_style(
                |row: &Record| {
                    let n = row.get("n").and_then(|v| v.as_number()).unwrap_or(0.0);
                    if n < 0.0 {
                        Ok(StyleOutcome::Delta(
                            StyleDelta::new().with_text_color(Color::red()),
                        ))
                    } else {
                        Ok(StyleOutcome::None)
                    }
                },
            )],
            vec![
                record(&[("n", (-5.0).into())]),
                record(&[("n", 5.0.into())]),
            ],
        );

        let negative = model.rows()[0].id;
        let positive = model.rows()[1].id;

        let styled = resolver.resolve_cell(&model, &schema, 0, 0, negative, "n");
        assert_eq!(styled.style.text_color, Some(Color::red()));

        let plain = resolver.resolve_cell(&model, &schema, 0, 0, positive, "n");
        assert_eq!(plain.style.text_color, None);
        // The text itself is identical in shape either way.
        assert_eq!(styled.text, "-5");
        assert_eq!(plain.text, "5");
    }

    #[test]
    fn test_uniqueness_marks_all_duplicates() {
        let (model, schema, mut resolver) = setup(
            vec![ColumnSchema::new("code", ColumnType::String).with_unique(true)],
            vec![
                record(&[("code", "A".into())]),
                record(&[("code", "B".into())]),
                record(&[("code", "A".into())]),
                record(&[("code", CellValue::Null)]),
                record(&[("code", CellValue::Null)]),
            ],
        );

        let ids: Vec<RowId> = model.rows().iter().map(|r| r.id).collect();

        for (index, expect_dup) in [true, false, true, false, false].iter().enumerate() {
            let resolved = resolver.resolve_cell(&model, &schema, 0, 0, ids[index], "code");
            let is_dup = resolved
                .diagnostic
                .as_ref()
                .map(|d| d.source == DiagnosticSource::Unique)
                .unwrap_or(false);
            assert_eq!(is_dup, *expect_dup, "row {}", index);
        }
    }

    #[test]
    fn test_unique_cache_invalidated_by_edit() {
        let (mut model, schema, mut resolver) = setup(
            vec![ColumnSchema::new("code", ColumnType::String).with_unique(true)],
            vec![
                record(&[("code", "A".into())]),
                record(&[("code", "A".into())]),
            ],
        );

        let ids: Vec<RowId> = model.rows().iter().map(|r| r.id).collect();
        // Both duplicates cached with their diagnostics.
        for &id in &ids {
            let before = resolver.resolve_cell(&model, &schema, 0, 0, id, "code");
            assert!(before.diagnostic.is_some());
        }

        model.set_cell(ids[1], "code", "B".into(), true).unwrap();
        let edited = resolver.resolve_cell(&model, &schema, 0, 0, ids[1], "code");
        assert!(edited.diagnostic.is_none());
        // The untouched row's version never moved, but its duplicate
        // status derives from the whole column: it must clear too.
        let other = resolver.resolve_cell(&model, &schema, 0, 0, ids[0], "code");
        assert!(other.diagnostic.is_none());
    }

    #[test]
    fn test_unique_cache_sees_new_duplicate_on_other_row() {
        let (mut model, schema, mut resolver) = setup(
            vec![ColumnSchema::new("code", ColumnType::String).with_unique(true)],
            vec![
                record(&[("code", "A".into())]),
                record(&[("code", "B".into())]),
            ],
        );

        let ids: Vec<RowId> = model.rows().iter().map(|r| r.id).collect();
        assert!(resolver
            .resolve_cell(&model, &schema, 0, 0, ids[0], "code")
            .diagnostic
            .is_none());

        // Editing the other row creates the duplicate; the cached clean
        // result for the first row must not survive.
        model.set_cell(ids[1], "code", "A".into(), true).unwrap();
        let lit_up = resolver.resolve_cell(&model, &schema, 0, 0, ids[0], "code");
        assert_eq!(
            lit_up.diagnostic.map(|d| d.source),
            Some(DiagnosticSource::Unique)
        );
    }

    #[test]
    fn test_boolean_commit_transitions() {
        let (mut model, _schema, _resolver) = setup(
            vec![ColumnSchema::new("primary", ColumnType::Boolean).with_unique(true)],
            vec![
                record(&[("primary", true.into())]),
                record(&[("primary", false.into())]),
            ],
        );

        let row_a = model.rows()[0].id;
        let row_b = model.rows()[1].id;

        model.set_cell(row_a, "primary", false.into(), false).unwrap();
        model.set_cell(row_b, "primary", true.into(), false).unwrap();

        let state = boolean_commit_state(&model, "primary");
        assert_eq!(state.current_row_id, Some(row_b));
        assert_eq!(state.previous_row_id, Some(row_a));
    }

    #[test]
    fn test_cache_not_served_stale() {
        let (mut model, schema, mut resolver) = setup(
            vec![ColumnSchema::new("n", ColumnType::Number)],
            vec![record(&[("n", 1.0.into())])],
        );

        let row_id = model.rows()[0].id;
        let first = resolver.resolve_cell(&model, &schema, 0, 0, row_id, "n");
        assert_eq!(first.text, "1");

        model.set_cell(row_id, "n", 2.0.into(), true).unwrap();
        let second = resolver.resolve_cell(&model, &schema, 0, 0, row_id, "n");
        assert_eq!(second.text, "2");
    }

    #[test]
    fn test_pending_value_feeds_formula() {
        let (mut model, schema, mut resolver) = setup(
            vec![
                ColumnSchema::new("base", ColumnType::Number),
                ColumnSchema::new("double", ColumnType::Number).with_formula(|row: &Record| {
                    let base = row.get("base").and_then(|v| v.as_number()).unwrap_or(0.0);
                    Ok(FormulaOutcome::Value(CellValue::Number(base * 2.0)))
                }),
            ],
            vec![record(&[("base", 3.0.into())])],
        );

        let row_id = model.rows()[0].id;
        model.set_cell(row_id, "base", 10.0.into(), false).unwrap();

        let resolved = resolver.resolve_cell(&model, &schema, 0, 0, row_id, "double");
        assert_eq!(resolved.text, "20");
    }
}
