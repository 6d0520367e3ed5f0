//! FILENAME: core/view-engine/src/visible.rs
//! PURPOSE: Computes the visible row ordering from data + view state.
//! CONTEXT: Filters produce a visibility mask over the resolved display
//! values; sorts then order the surviving rows with a stable multi-key
//! comparison. The result is recomputed whenever the data or view version
//! changes - the ids are stable, so renderers key off them.

use std::collections::HashSet;

use engine::{DataModel, Resolver, RowId, Schema};

use crate::sort::{compare_values, directed};
use crate::view::TableView;

/// The filtered, ordered set of rows the renderers iterate.
#[derive(Debug, Clone, Default)]
pub struct VisibleRows {
    /// Row ids in display order after filter + sort.
    pub order: Vec<RowId>,
    /// Rows removed by filters.
    pub hidden_count: usize,
}

impl VisibleRows {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn position(&self, row_id: RowId) -> Option<usize> {
        self.order.iter().position(|&id| id == row_id)
    }
}

/// Visible column keys in schema order.
pub fn visible_columns<'a>(schema: &'a Schema, view: &TableView) -> Vec<&'a str> {
    schema
        .columns()
        .iter()
        .filter(|c| !view.is_column_hidden(&c.key))
        .map(|c| c.key.as_str())
        .collect()
}

/// Compute the visible ordering. Filtering reads resolved display text so
/// formula columns filter on what the user sees.
pub fn compute_visible(
    model: &DataModel,
    schema: &Schema,
    view: &TableView,
    resolver: &mut Resolver,
    schema_version: u64,
) -> VisibleRows {
    let total = model.len();

    // Filter pass: collect surviving row ids.
    let mut survivors: Vec<RowId> = Vec::with_capacity(total);
    let mut dropped: HashSet<RowId> = HashSet::new();

    for row in model.rows() {
        let mut keep = true;
        for (col_key, criteria) in &view.filters {
            let resolved = resolver.resolve_cell(
                model,
                schema,
                schema_version,
                view.version,
                row.id,
                col_key,
            );
            if !criteria.matches(&resolved.text) {
                keep = false;
                break;
            }
        }
        if keep {
            survivors.push(row.id);
        } else {
            dropped.insert(row.id);
        }
    }

    // Sort pass: stable multi-key comparison over the pending-applied
    // values (what the user sees mid-edit).
    if !view.sorts.is_empty() {
        let specs = view.sorts.clone();
        survivors.sort_by(|&a, &b| {
            for spec in &specs {
                let left = model
                    .get_cell(a, &spec.col_key)
                    .cloned()
                    .unwrap_or_default();
                let right = model
                    .get_cell(b, &spec.col_key)
                    .cloned()
                    .unwrap_or_default();
                let ordering = directed(
                    compare_values(&left, &right),
                    spec.direction,
                    &left,
                    &right,
                );
                if ordering != std::cmp::Ordering::Equal {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
    }

    VisibleRows {
        order: survivors,
        hidden_count: dropped.len(),
    }
}
