//! FILENAME: core/engine/src/model.rs
//! PURPOSE: The row store - raw records, pending overlay, versions, styles.
//! CONTEXT: Rows have stable ids that are never reused, a 1-based display
//! index kept consistent across inserts/deletes, and a monotonic version
//! counter bumped on every write (raw, pending, pending-clear, style). The
//! pending overlay holds uncommitted edits and self-heals: writing a value
//! equal to the raw value removes the entry.

use std::collections::HashMap;

use thiserror::Error;

use crate::schema::Record;
use crate::style::StyleDelta;
use crate::value::CellValue;

/// Stable opaque row identifier. Generated on insert, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

/// The record key carrying the per-row readonly flag.
pub const READONLY_FLAG_KEY: &str = "_readonly";

/// A single table row.
#[derive(Debug, Clone)]
pub struct Row {
    pub id: RowId,
    pub record: Record,
    /// 1-based position in the underlying row list.
    pub display_index: u32,
    /// Bumped on every mutation that touches this row.
    pub version: u64,
    /// Row-level readonly flag (the `_readonly` record key).
    pub readonly: bool,
}

/// What changed, delivered synchronously to subscribers after the mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum DataChange {
    /// The whole dataset was replaced.
    Reset,
    /// A cell was written (raw or pending).
    Cell { row_id: RowId, col_key: String },
    /// Pending edits for a row (or all rows) were applied or discarded.
    Pending { row_id: Option<RowId> },
    Inserted { row_id: RowId, index: usize },
    Removed { row_id: RowId },
    Style { row_id: RowId, col_key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

type ChangeListener = Box<dyn Fn(&DataChange)>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown row id {0:?}")]
    UnknownRow(RowId),
}

/// Owns the rows, the pending overlay, the per-cell style map, and the
/// change-notification bus.
#[derive(Default)]
pub struct DataModel {
    rows: Vec<Row>,
    row_index: HashMap<RowId, usize>,
    pending: HashMap<RowId, HashMap<String, CellValue>>,
    cell_styles: HashMap<(RowId, String), StyleDelta>,
    next_row_id: u64,
    next_subscriber_id: u64,
    subscribers: Vec<(SubscriberId, ChangeListener)>,
}

impl DataModel {
    pub fn new() -> Self {
        DataModel::default()
    }

    // ========================================================================
    // SUBSCRIPTIONS
    // ========================================================================

    /// Register a change listener. Listeners run synchronously after each
    /// mutation, in subscription order, and must not re-enter the model.
    pub fn subscribe(&mut self, listener: ChangeListener) -> SubscriberId {
        self.next_subscriber_id += 1;
        let id = SubscriberId(self.next_subscriber_id);
        self.subscribers.push((id, listener));
        id
    }

    /// Idempotent: unsubscribing twice is a no-op.
    pub fn unsubscribe(&mut self, id: SubscriberId) {
        self.subscribers.retain(|(sid, _)| *sid != id);
    }

    fn notify(&mut self, change: DataChange) {
        // Listeners are taken out for the duration of the call so they can
        // read the model through the controller without aliasing issues.
        let subscribers = std::mem::take(&mut self.subscribers);
        for (_, listener) in &subscribers {
            listener(&change);
        }
        // New subscriptions made during notification land after the
        // existing ones.
        let mut restored = subscribers;
        restored.append(&mut self.subscribers);
        self.subscribers = restored;
    }

    // ========================================================================
    // DATASET
    // ========================================================================

    /// Replace the whole dataset. Clears pending and styles, assigns fresh
    /// ids and display indices, resets versions, notifies once.
    pub fn set_data(&mut self, records: Vec<Record>) {
        self.rows.clear();
        self.row_index.clear();
        self.pending.clear();
        self.cell_styles.clear();

        for (i, mut record) in records.into_iter().enumerate() {
            let readonly = matches!(
                record.remove(READONLY_FLAG_KEY),
                Some(CellValue::Bool(true))
            );
            self.next_row_id += 1;
            let id = RowId(self.next_row_id);
            self.row_index.insert(id, i);
            self.rows.push(Row {
                id,
                record,
                display_index: (i + 1) as u32,
                version: 0,
                readonly,
            });
        }

        self.notify(DataChange::Reset);
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.row_index.get(&id).map(|&i| &self.rows[i])
    }

    pub fn row_at(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn row_position(&self, id: RowId) -> Option<usize> {
        self.row_index.get(&id).copied()
    }

    pub fn get_row_version(&self, id: RowId) -> Option<u64> {
        self.row(id).map(|r| r.version)
    }

    pub fn is_row_readonly(&self, id: RowId) -> bool {
        self.row(id).map(|r| r.readonly).unwrap_or(false)
    }

    // ========================================================================
    // CELL ACCESS
    // ========================================================================

    /// Pending value if present, else raw.
    pub fn get_cell(&self, id: RowId, col_key: &str) -> Option<&CellValue> {
        if let Some(pending) = self.pending.get(&id).and_then(|p| p.get(col_key)) {
            return Some(pending);
        }
        self.get_raw_cell(id, col_key)
    }

    /// The committed value, ignoring any pending edit.
    pub fn get_raw_cell(&self, id: RowId, col_key: &str) -> Option<&CellValue> {
        self.row(id).and_then(|r| r.record.get(col_key))
    }

    /// The row record with pending edits applied - what formulas see.
    pub fn pending_applied_record(&self, id: RowId) -> Option<Record> {
        let row = self.row(id)?;
        let mut record = row.record.clone();
        if let Some(overlay) = self.pending.get(&id) {
            for (key, value) in overlay {
                record.insert(key.clone(), value.clone());
            }
        }
        Some(record)
    }

    /// Write a cell. Committed writes go to the raw record and clear any
    /// pending entry for the cell; uncommitted writes go to the pending
    /// overlay, which self-heals when the value equals raw. Either way the
    /// row version is bumped and subscribers are notified.
    pub fn set_cell(
        &mut self,
        id: RowId,
        col_key: &str,
        value: CellValue,
        committed: bool,
    ) -> Result<(), ModelError> {
        let index = *self.row_index.get(&id).ok_or(ModelError::UnknownRow(id))?;

        if committed {
            self.rows[index].record.insert(col_key.to_string(), value);
            if let Some(overlay) = self.pending.get_mut(&id) {
                overlay.remove(col_key);
                if overlay.is_empty() {
                    self.pending.remove(&id);
                }
            }
        } else {
            let raw = self.rows[index].record.get(col_key);
            let equals_raw = raw.map(|r| r.loosely_equals(&value)).unwrap_or(value.is_null());
            let overlay = self.pending.entry(id).or_default();
            if equals_raw {
                overlay.remove(col_key);
            } else {
                overlay.insert(col_key.to_string(), value);
            }
            if overlay.is_empty() {
                self.pending.remove(&id);
            }
        }

        self.rows[index].version += 1;
        self.notify(DataChange::Cell {
            row_id: id,
            col_key: col_key.to_string(),
        });
        Ok(())
    }

    // ========================================================================
    // PENDING OVERLAY
    // ========================================================================

    /// Commit every pending field of the row into the raw record.
    pub fn apply_pending(&mut self, id: RowId) -> Result<(), ModelError> {
        let index = *self.row_index.get(&id).ok_or(ModelError::UnknownRow(id))?;
        if let Some(overlay) = self.pending.remove(&id) {
            for (key, value) in overlay {
                self.rows[index].record.insert(key, value);
            }
            self.rows[index].version += 1;
            self.notify(DataChange::Pending { row_id: Some(id) });
        }
        Ok(())
    }

    /// Discard pending edits for one row.
    pub fn clear_pending(&mut self, id: RowId) -> Result<(), ModelError> {
        let index = *self.row_index.get(&id).ok_or(ModelError::UnknownRow(id))?;
        if self.pending.remove(&id).is_some() {
            self.rows[index].version += 1;
            self.notify(DataChange::Pending { row_id: Some(id) });
        }
        Ok(())
    }

    /// Discard pending edits for every row.
    pub fn clear_all_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let ids: Vec<RowId> = self.pending.keys().copied().collect();
        self.pending.clear();
        for id in ids {
            if let Some(&index) = self.row_index.get(&id) {
                self.rows[index].version += 1;
            }
        }
        self.notify(DataChange::Pending { row_id: None });
    }

    pub fn pending_for(&self, id: RowId) -> Option<&HashMap<String, CellValue>> {
        self.pending.get(&id)
    }

    pub fn pending_cell(&self, id: RowId, col_key: &str) -> Option<&CellValue> {
        self.pending.get(&id).and_then(|p| p.get(col_key))
    }

    pub fn has_pending(&self, id: RowId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending_row_ids(&self) -> Vec<RowId> {
        let mut ids: Vec<RowId> = self.pending.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn pending_cell_count(&self) -> usize {
        self.pending.values().map(|p| p.len()).sum()
    }

    // ========================================================================
    // ROW LIFECYCLE
    // ========================================================================

    /// Insert a row. The index is clamped into [0, N]. A forced id is
    /// accepted so undo can re-insert a deleted row under its old identity;
    /// the id counter advances past it to keep ids unique forever.
    pub fn insert_row_at(
        &mut self,
        mut record: Record,
        index: usize,
        forced_id: Option<RowId>,
    ) -> RowId {
        let index = index.min(self.rows.len());
        let readonly = matches!(
            record.remove(READONLY_FLAG_KEY),
            Some(CellValue::Bool(true))
        );

        let id = match forced_id {
            Some(forced) => {
                self.next_row_id = self.next_row_id.max(forced.0);
                forced
            }
            None => {
                self.next_row_id += 1;
                RowId(self.next_row_id)
            }
        };

        self.rows.insert(
            index,
            Row {
                id,
                record,
                display_index: 0, // Fixed by reindex below
                version: 0,
                readonly,
            },
        );
        self.reindex();
        self.notify(DataChange::Inserted { row_id: id, index });
        id
    }

    /// Remove a row, purging its pending edits and cell styles.
    pub fn remove_row(&mut self, id: RowId) -> Result<Row, ModelError> {
        let index = *self.row_index.get(&id).ok_or(ModelError::UnknownRow(id))?;
        let row = self.rows.remove(index);
        self.pending.remove(&id);
        self.cell_styles.retain(|(rid, _), _| *rid != id);
        self.reindex();
        self.notify(DataChange::Removed { row_id: id });
        Ok(row)
    }

    /// Rebuild display indices and the id lookup after a structural change.
    fn reindex(&mut self) {
        self.row_index.clear();
        for (i, row) in self.rows.iter_mut().enumerate() {
            row.display_index = (i + 1) as u32;
            self.row_index.insert(row.id, i);
        }
    }

    // ========================================================================
    // CELL STYLES
    // ========================================================================

    /// Set or clear the user style delta for a cell. Bumps the row version.
    pub fn set_cell_style(
        &mut self,
        id: RowId,
        col_key: &str,
        style: Option<StyleDelta>,
    ) -> Result<(), ModelError> {
        let index = *self.row_index.get(&id).ok_or(ModelError::UnknownRow(id))?;
        match style {
            Some(delta) if !delta.is_empty() => {
                self.cell_styles.insert((id, col_key.to_string()), delta);
            }
            _ => {
                self.cell_styles.remove(&(id, col_key.to_string()));
            }
        }
        self.rows[index].version += 1;
        self.notify(DataChange::Style {
            row_id: id,
            col_key: col_key.to_string(),
        });
        Ok(())
    }

    pub fn cell_style(&self, id: RowId, col_key: &str) -> Option<&StyleDelta> {
        self.cell_styles.get(&(id, col_key.to_string()))
    }

    pub fn has_cell_styles(&self, id: RowId) -> bool {
        self.cell_styles.keys().any(|(rid, _)| *rid == id)
    }

    /// All style entries for a row, used when a delete command snapshots
    /// its inverse.
    pub fn cell_styles_for(&self, id: RowId) -> Vec<(String, StyleDelta)> {
        self.cell_styles
            .iter()
            .filter(|((rid, _), _)| *rid == id)
            .map(|((_, key), delta)| (key.clone(), delta.clone()))
            .collect()
    }
}
