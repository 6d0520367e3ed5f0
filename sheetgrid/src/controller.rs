//! FILENAME: sheetgrid/src/controller.rs
//! PURPOSE: The controller - orchestrates model, view, queue and renderers.
//! CONTEXT: Owns every subsystem and exposes the public uncontrolled API.
//! All mutation flows through here: edit-mode policy, readonly/lock checks,
//! command recording, cache invalidation, view recompute, renderer sync,
//! and the two observable snapshots (table state, selection state). A
//! single mutating call emits exactly one table-state notification;
//! the selection snapshot follows the data snapshot when both change.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use engine::{
    CellValue, Command, CommandQueue, DataModel, Diagnostic, DiagnosticLevel,
    HistorySnapshot, ModelError, Record, Resolver, Row, RowId, Schema, SchemaError, StyleDelta,
    READONLY_FLAG_KEY,
};
use view_engine::{
    coerce_for_column, compute_visible, visible_columns, ActiveCell, SelectionRange,
    SelectionState, TableView, VisibleRows,
};

use crate::address::{normalize, AddressError, CellAddress};
use crate::clipboard::{self, ClipboardPayload};
use crate::modes::{EditMode, LockMode, RenderMode};
use crate::render::canvas::CanvasRenderer;
use crate::render::dom::DomRenderer;
use crate::render::{
    CursorKind, HitTarget, LogicalEvent, RenderContext, Renderer, Viewport,
};
use crate::scheduler::Clock;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ControllerError {
    /// The write was rejected: readonly mode, readonly column/row, or an
    /// active lock.
    #[error("cell is not editable")]
    Readonly,
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

// ============================================================================
// SNAPSHOTS
// ============================================================================

/// Why a selection snapshot was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ChangeReason {
    Selection,
    Edit,
    Style,
    Schema,
    View,
    Data,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UndoRedoState {
    pub can_undo: bool,
    pub can_redo: bool,
    pub undo_description: Option<String>,
    pub redo_description: Option<String>,
}

/// One aggregated error-level diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveError {
    pub row_id: RowId,
    pub col_key: String,
    pub message: String,
}

/// The table-level observable snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableState {
    pub can_commit: bool,
    pub pending_command_count: usize,
    pub pending_cell_count: usize,
    pub undo_redo: UndoRedoState,
    pub render_mode: RenderMode,
    pub search_panel_open: bool,
    pub active_errors: Vec<ActiveError>,
}

/// The selection-level observable snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionSnapshot {
    pub row_index: Option<usize>,
    pub col_index: Option<usize>,
    pub row_key: Option<String>,
    pub col_key: Option<String>,
    /// The resolved display string of the active cell.
    pub display: String,
    pub raw: Option<CellValue>,
    pub column_style: Option<StyleDelta>,
    pub cell_style: Option<StyleDelta>,
    pub resolved_style: StyleDelta,
    pub diagnostic: Option<Diagnostic>,
    pub change_reason: ChangeReason,
}

/// Row-level observable state (pending and locked rows).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RowStates {
    pub pending_row_ids: Vec<RowId>,
    pub locked_row_ids: Vec<RowId>,
}

/// Async dataset loading state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetState {
    Loading,
    Empty,
    Rows,
}

/// Opaque subscription token; unsubscribe is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

type TableListener = Box<dyn FnMut(&TableState)>;
type SelectionListener = Box<dyn FnMut(&SelectionSnapshot)>;
type RowStateListener = Box<dyn FnMut(&RowStates)>;

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct GridController {
    model: DataModel,
    schema: Rc<Schema>,
    schema_version: u64,
    view: TableView,
    queue: CommandQueue,
    resolver: Resolver,
    selection: SelectionState,
    visible: VisibleRows,
    edit_mode: EditMode,
    lock_mode: LockMode,
    locked_rows: HashSet<RowId>,
    render_mode: RenderMode,
    renderer: Box<dyn Renderer>,
    dataset: DatasetState,
    generation: u64,
    search_panel_open: bool,
    last_change_reason: ChangeReason,
    table_subscribers: Vec<(SubscriptionId, TableListener)>,
    selection_subscribers: Vec<(SubscriptionId, SelectionListener)>,
    row_subscribers: Vec<(SubscriptionId, RowStateListener)>,
}

impl Default for GridController {
    fn default() -> Self {
        GridController::new()
    }
}

impl GridController {
    pub fn new() -> Self {
        let mut renderer: Box<dyn Renderer> = Box::new(CanvasRenderer::new());
        renderer.mount();
        GridController {
            model: DataModel::new(),
            schema: Rc::new(Schema::empty()),
            schema_version: 0,
            view: TableView::new(),
            queue: CommandQueue::new(),
            resolver: Resolver::new(),
            selection: SelectionState::new(),
            visible: VisibleRows::default(),
            edit_mode: EditMode::Direct,
            lock_mode: LockMode::None,
            locked_rows: HashSet::new(),
            render_mode: RenderMode::Canvas,
            renderer,
            dataset: DatasetState::Empty,
            generation: 0,
            search_panel_open: false,
            last_change_reason: ChangeReason::Unknown,
            table_subscribers: Vec::new(),
            selection_subscribers: Vec::new(),
            row_subscribers: Vec::new(),
        }
    }

    // ========================================================================
    // DATASET & SCHEMA
    // ========================================================================

    /// Replace the dataset. Clears pending edits, styles and history.
    pub fn set_data(&mut self, records: Vec<Record>) {
        self.dataset = if records.is_empty() {
            DatasetState::Empty
        } else {
            DatasetState::Rows
        };
        self.model.set_data(records);
        self.queue.clear();
        self.resolver.invalidate_all();
        self.selection.clear();
        self.refresh_visible();
        self.sync_renderer_selection();
        self.last_change_reason = ChangeReason::Data;
        self.emit_table_state();
        self.emit_row_states();
        self.emit_selection(ChangeReason::Data);
    }

    /// Enter the loading state. `switch_dataset` marks a dataset change:
    /// the generation advances so a stale completion is discarded, and the
    /// view resets. A reload into the same dataset keeps the view.
    pub fn begin_load(&mut self, switch_dataset: bool) -> u64 {
        self.generation += 1;
        if switch_dataset {
            self.view = TableView::new();
        }
        self.dataset = DatasetState::Loading;
        self.emit_table_state();
        self.generation
    }

    /// Complete an async load. Returns false (and changes nothing) when
    /// the generation no longer matches.
    pub fn complete_load(&mut self, generation: u64, records: Vec<Record>) -> bool {
        if generation != self.generation {
            log::warn!(
                "discarding stale dataset load (generation {} != {})",
                generation,
                self.generation
            );
            return false;
        }
        self.set_data(records);
        true
    }

    pub fn dataset_state(&self) -> DatasetState {
        self.dataset
    }

    /// Replace the schema wholesale.
    pub fn set_schema(&mut self, columns: Vec<engine::ColumnSchema>) -> Result<(), ControllerError> {
        let schema = Schema::new(columns)?;
        self.schema = Rc::new(schema);
        self.schema_version += 1;
        self.resolver.invalidate_all();
        self.selection.clear();
        self.refresh_visible();
        self.sync_renderer_selection();
        self.last_change_reason = ChangeReason::Schema;
        self.emit_table_state();
        self.emit_selection(ChangeReason::Schema);
        Ok(())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Read access to the data model for renderers and hosts.
    pub fn model(&self) -> &DataModel {
        &self.model
    }

    /// Replace the view wholesale (e.g. restoring persisted state). Not
    /// undoable - partial updates go through `update_view`.
    pub fn set_view(&mut self, mut view: TableView) {
        view.version = self.view.version + 1;
        self.view = view;
        self.refresh_visible();
        self.last_change_reason = ChangeReason::View;
        self.emit_table_state();
        self.emit_selection(ChangeReason::View);
    }

    /// Apply a partial view change as an undoable command.
    pub fn update_view<F>(&mut self, mutate: F)
    where
        F: FnOnce(&mut TableView),
    {
        let previous = serde_json::to_string(&self.view).unwrap_or_default();
        mutate(&mut self.view);
        self.view.bump_version();
        let next = serde_json::to_string(&self.view).unwrap_or_default();
        self.queue.record(Command::UpdateView { previous, next });
        self.refresh_visible();
        self.last_change_reason = ChangeReason::View;
        self.emit_table_state();
        self.emit_selection(ChangeReason::View);
    }

    pub fn view(&self) -> &TableView {
        &self.view
    }

    // ========================================================================
    // MODES
    // ========================================================================

    pub fn set_edit_mode(&mut self, mode: EditMode) {
        self.edit_mode = mode;
        self.emit_table_state();
    }

    pub fn edit_mode(&self) -> EditMode {
        self.edit_mode
    }

    pub fn set_lock_mode(&mut self, mode: LockMode) {
        self.lock_mode = mode;
        self.emit_table_state();
        self.emit_row_states();
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        if mode == self.render_mode {
            return;
        }
        self.renderer.destroy();
        self.renderer = match mode {
            RenderMode::Canvas => Box::new(CanvasRenderer::new()),
            RenderMode::Dom => Box::new(DomRenderer::new()),
        };
        self.renderer.mount();
        self.render_mode = mode;
        self.sync_renderer_selection();
        self.emit_table_state();
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    // ========================================================================
    // EDITABILITY
    // ========================================================================

    /// Union of column readonly, row readonly and the advisory lock mask.
    pub fn is_readonly(&self, row_id: RowId, col_key: &str) -> bool {
        let column_readonly = self
            .schema
            .column(col_key)
            .map(|c| c.is_readonly())
            .unwrap_or(true);
        let row_locked = self.lock_mode == LockMode::Row && self.locked_rows.contains(&row_id);
        column_readonly || self.model.is_row_readonly(row_id) || row_locked
    }

    /// Lock a row (advisory; effective while lock mode is Row).
    pub fn lock_row(&mut self, row_id: RowId) {
        if self.locked_rows.insert(row_id) {
            self.queue.record(Command::Lock { row_id });
            self.emit_table_state();
            self.emit_row_states();
        }
    }

    pub fn unlock_row(&mut self, row_id: RowId) {
        if self.locked_rows.remove(&row_id) {
            self.queue.record(Command::Unlock { row_id });
            self.emit_table_state();
            self.emit_row_states();
        }
    }

    // ========================================================================
    // CELL WRITES
    // ========================================================================

    /// Write one cell under the current edit mode.
    pub fn set_cell_value(
        &mut self,
        address: &CellAddress,
        value: CellValue,
    ) -> Result<(), ControllerError> {
        let (row_id, col_key) = self.write_cell(address, value)?;
        self.last_change_reason = ChangeReason::Edit;
        self.emit_table_state();
        self.emit_row_states();
        // Data snapshot first, then selection when the edit touched the
        // active cell.
        if self.active_is(row_id, &col_key) {
            self.emit_selection(ChangeReason::Edit);
        }
        Ok(())
    }

    /// The write path shared by edits, paste and fill: applies the edit
    /// mode, records the command, but emits nothing.
    fn write_cell(
        &mut self,
        address: &CellAddress,
        value: CellValue,
    ) -> Result<(RowId, String), ControllerError> {
        if self.edit_mode == EditMode::Readonly {
            return Err(ControllerError::Readonly);
        }

        let (row_id, col_key) = normalize(address, &self.visible, &self.schema, &self.view)?;
        if self.is_readonly(row_id, &col_key) {
            return Err(ControllerError::Readonly);
        }

        let column = self
            .schema
            .column(&col_key)
            .ok_or_else(|| AddressError::UnknownColumnKey(col_key.clone()))?;
        let value = coerce_for_column(&value, column);

        let committed = self.edit_mode == EditMode::Direct;
        let previous = if committed {
            self.model
                .get_raw_cell(row_id, &col_key)
                .cloned()
                .unwrap_or(CellValue::Null)
        } else {
            // Undo of a pending edit restores the prior pending state
            // (which self-heals away if it equals raw).
            self.model
                .get_cell(row_id, &col_key)
                .cloned()
                .unwrap_or(CellValue::Null)
        };

        self.model
            .set_cell(row_id, &col_key, value.clone(), committed)?;
        self.queue.record(Command::Edit {
            row_id,
            col_key: col_key.clone(),
            previous,
            next: value,
            committed,
        });

        self.refresh_visible_if_ordering_depends_on(&col_key);
        Ok((row_id, col_key))
    }

    /// Drain pending edits into committed commands, one batch.
    pub fn commit(&mut self) {
        let pending_rows = self.model.pending_row_ids();
        if pending_rows.is_empty() {
            return;
        }

        let cell_count = self.model.pending_cell_count();
        self.queue.begin_batch(format!("Commit {} cells", cell_count));
        for row_id in pending_rows {
            let overlay: Vec<(String, CellValue)> = self
                .model
                .pending_for(row_id)
                .map(|p| p.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();
            for (col_key, next) in overlay {
                let previous = self
                    .model
                    .get_raw_cell(row_id, &col_key)
                    .cloned()
                    .unwrap_or(CellValue::Null);
                if self
                    .model
                    .set_cell(row_id, &col_key, next.clone(), true)
                    .is_ok()
                {
                    self.queue.record(Command::Edit {
                        row_id,
                        col_key,
                        previous,
                        next,
                        committed: true,
                    });
                }
            }
        }
        self.queue.commit_batch();
        self.queue.mark_committed();
        self.refresh_visible();
        self.last_change_reason = ChangeReason::Edit;
        self.emit_table_state();
        self.emit_row_states();
        self.emit_selection(ChangeReason::Edit);
    }

    /// Discard pending edits without committing.
    pub fn discard_pending(&mut self) {
        self.model.clear_all_pending();
        self.queue.mark_committed();
        self.emit_table_state();
        self.emit_row_states();
    }

    // ========================================================================
    // ROW LIFECYCLE
    // ========================================================================

    pub fn insert_row(&mut self, record: Record) -> Result<RowId, ControllerError> {
        let index = self.model.len();
        self.insert_row_at(record, index)
    }

    pub fn insert_row_at(
        &mut self,
        record: Record,
        index: usize,
    ) -> Result<RowId, ControllerError> {
        if self.edit_mode == EditMode::Readonly {
            return Err(ControllerError::Readonly);
        }

        let row_id = self.model.insert_row_at(record.clone(), index, None);
        let index = self.model.row_position(row_id).unwrap_or(index);
        self.queue.record(Command::InsertRow {
            row_id,
            record,
            index,
        });
        self.refresh_visible();
        self.last_change_reason = ChangeReason::Data;
        self.emit_table_state();
        self.emit_row_states();
        self.emit_selection(ChangeReason::Data);
        Ok(row_id)
    }

    pub fn delete_row(&mut self, row_id: RowId) -> Result<(), ControllerError> {
        if self.edit_mode == EditMode::Readonly {
            return Err(ControllerError::Readonly);
        }

        let index = self
            .model
            .row_position(row_id)
            .ok_or(ModelError::UnknownRow(row_id))?;
        let pending: Record = self
            .model
            .pending_for(row_id)
            .map(|p| p.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        let styles = self.model.cell_styles_for(row_id);
        let readonly = self.model.is_row_readonly(row_id);

        let row = self.model.remove_row(row_id)?;
        self.queue.record(Command::DeleteRow {
            row_id,
            record: row.record,
            index,
            pending,
            styles,
            readonly,
        });

        self.refresh_visible();
        if self.active_row_is(row_id) {
            self.selection.clear();
            self.sync_renderer_selection();
        }
        self.last_change_reason = ChangeReason::Data;
        self.emit_table_state();
        self.emit_row_states();
        self.emit_selection(ChangeReason::Data);
        Ok(())
    }

    // ========================================================================
    // STYLES
    // ========================================================================

    /// Merge a delta into the cell style of every selected cell, as one
    /// undoable batch.
    pub fn apply_style_to_selection(&mut self, delta: &StyleDelta) {
        self.apply_style_to_selection_with(|current| current.merged(delta));
    }

    /// Closure form: compute each cell's next style from its current one.
    pub fn apply_style_to_selection_with<F>(&mut self, next_for: F)
    where
        F: Fn(&StyleDelta) -> StyleDelta,
    {
        let cells = self.selected_cells();
        if cells.is_empty() {
            return;
        }

        self.queue.begin_batch(format!("Style {} cells", cells.len()));
        for (row_id, col_key) in cells {
            let previous = self.model.cell_style(row_id, &col_key).cloned();
            let next = next_for(previous.as_ref().unwrap_or(&StyleDelta::default()));
            let next = if next.is_empty() { None } else { Some(next) };
            if self
                .model
                .set_cell_style(row_id, &col_key, next.clone())
                .is_ok()
            {
                self.queue.record(Command::SetCellStyle {
                    row_id,
                    col_key,
                    previous,
                    next,
                });
            }
        }
        self.queue.commit_batch();
        self.last_change_reason = ChangeReason::Style;
        self.emit_table_state();
        self.emit_selection(ChangeReason::Style);
    }

    /// The (row id, column key) pairs the current selection covers.
    fn selected_cells(&self) -> Vec<(RowId, String)> {
        let columns = visible_columns(&self.schema, &self.view);
        let mut cells = Vec::new();

        for range in &self.selection.ranges {
            match range.normalized() {
                SelectionRange::Cells {
                    start_row,
                    start_col,
                    end_row,
                    end_col,
                } => {
                    for row_index in start_row..=end_row.min(self.visible.len().saturating_sub(1)) {
                        let Some(&row_id) = self.visible.order.get(row_index) else {
                            continue;
                        };
                        for col_index in start_col..=end_col.min(columns.len().saturating_sub(1)) {
                            cells.push((row_id, columns[col_index].to_string()));
                        }
                    }
                }
                SelectionRange::Rows { start_row, end_row } => {
                    for row_index in start_row..=end_row.min(self.visible.len().saturating_sub(1)) {
                        let Some(&row_id) = self.visible.order.get(row_index) else {
                            continue;
                        };
                        for col_key in &columns {
                            cells.push((row_id, col_key.to_string()));
                        }
                    }
                }
            }
        }

        cells
    }

    // ========================================================================
    // UNDO / REDO
    // ========================================================================

    pub fn undo(&mut self) -> bool {
        let batch = match self.queue.pop_undo() {
            Some(batch) => batch,
            None => return false,
        };
        log::debug!("undo: {}", batch.label);
        for command in batch.commands.iter().rev() {
            self.apply_command(command, false);
        }
        self.queue.push_redo(batch);
        self.finish_history_step();
        true
    }

    pub fn redo(&mut self) -> bool {
        let batch = match self.queue.pop_redo() {
            Some(batch) => batch,
            None => return false,
        };
        log::debug!("redo: {}", batch.label);
        for command in batch.commands.iter() {
            self.apply_command(command, true);
        }
        self.queue.push_undo_for_redo(batch);
        self.finish_history_step();
        true
    }

    fn finish_history_step(&mut self) {
        self.refresh_visible();
        self.last_change_reason = ChangeReason::Edit;
        self.emit_table_state();
        self.emit_row_states();
        self.emit_selection(ChangeReason::Edit);
    }

    /// Apply one command in the forward (redo) or inverse (undo) direction.
    /// Commands carry both sides, so no model state is consulted.
    fn apply_command(&mut self, command: &Command, forward: bool) {
        match command {
            Command::Edit {
                row_id,
                col_key,
                previous,
                next,
                committed,
            } => {
                let value = if forward { next } else { previous };
                if let Err(error) = self.model.set_cell(*row_id, col_key, value.clone(), *committed)
                {
                    log::warn!("history replay skipped edit: {}", error);
                }
            }
            Command::InsertRow {
                row_id,
                record,
                index,
            } => {
                if forward {
                    self.model.insert_row_at(record.clone(), *index, Some(*row_id));
                } else if let Err(error) = self.model.remove_row(*row_id) {
                    log::warn!("history replay skipped row removal: {}", error);
                }
            }
            Command::DeleteRow {
                row_id,
                record,
                index,
                pending,
                styles,
                readonly,
            } => {
                if forward {
                    if let Err(error) = self.model.remove_row(*row_id) {
                        log::warn!("history replay skipped row removal: {}", error);
                    }
                } else {
                    let mut restored = record.clone();
                    if *readonly {
                        restored.insert(READONLY_FLAG_KEY.to_string(), CellValue::Bool(true));
                    }
                    self.model.insert_row_at(restored, *index, Some(*row_id));
                    for (col_key, value) in pending {
                        let _ = self.model.set_cell(*row_id, col_key, value.clone(), false);
                    }
                    for (col_key, delta) in styles {
                        let _ = self
                            .model
                            .set_cell_style(*row_id, col_key, Some(delta.clone()));
                    }
                }
            }
            Command::SetCellStyle {
                row_id,
                col_key,
                previous,
                next,
            } => {
                let style = if forward { next } else { previous };
                let _ = self.model.set_cell_style(*row_id, col_key, style.clone());
            }
            Command::UpdateView { previous, next } => {
                let json = if forward { next } else { previous };
                match serde_json::from_str::<TableView>(json) {
                    Ok(mut view) => {
                        view.version = self.view.version + 1;
                        self.view = view;
                    }
                    Err(error) => log::warn!("history replay skipped view change: {}", error),
                }
            }
            Command::Lock { row_id } => {
                if forward {
                    self.locked_rows.insert(*row_id);
                } else {
                    self.locked_rows.remove(row_id);
                }
            }
            Command::Unlock { row_id } => {
                if forward {
                    self.locked_rows.remove(row_id);
                } else {
                    self.locked_rows.insert(*row_id);
                }
            }
        }
    }

    pub fn get_undo_redo_history(&self) -> HistorySnapshot {
        self.queue.history()
    }

    // ========================================================================
    // SELECTION
    // ========================================================================

    pub fn select_cell(&mut self, address: &CellAddress) -> Result<(), ControllerError> {
        let (row_id, col_key) = normalize(address, &self.visible, &self.schema, &self.view)?;
        let row_index = self.visible.position(row_id).unwrap_or(0);
        let columns = visible_columns(&self.schema, &self.view);
        let col_index = columns.iter().position(|k| *k == col_key).unwrap_or(0);

        self.selection
            .select_cell(row_id, col_key, row_index, col_index);
        self.sync_renderer_selection();
        self.emit_selection(ChangeReason::Selection);
        Ok(())
    }

    pub fn extend_selection_to(&mut self, row_index: usize, col_index: usize) {
        self.selection.extend_to(row_index, col_index);
        self.sync_renderer_selection();
        self.emit_selection(ChangeReason::Selection);
    }

    pub fn select_all(&mut self) {
        let columns = visible_columns(&self.schema, &self.view);
        self.selection.select_all(self.visible.len(), columns.len());
        self.sync_renderer_selection();
        self.emit_selection(ChangeReason::Selection);
    }

    pub fn select_row_band(&mut self, start_row: usize, end_row: usize) {
        let Some(&row_id) = self.visible.order.get(start_row) else {
            return;
        };
        let columns = visible_columns(&self.schema, &self.view);
        let first_col = columns.first().map(|k| k.to_string()).unwrap_or_default();
        self.selection
            .select_rows(row_id, first_col, start_row, end_row);
        self.sync_renderer_selection();
        self.emit_selection(ChangeReason::Selection);
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    fn active_is(&self, row_id: RowId, col_key: &str) -> bool {
        matches!(
            &self.selection.active,
            Some(ActiveCell::Cell { row_id: ar, col_key: ac }) if *ar == row_id && ac == col_key
        )
    }

    fn active_row_is(&self, row_id: RowId) -> bool {
        matches!(
            &self.selection.active,
            Some(ActiveCell::Cell { row_id: ar, .. }) if *ar == row_id
        )
    }

    fn sync_renderer_selection(&mut self) {
        self.renderer.set_active_cell(self.selection.active.clone());
        self.renderer.set_selection(self.selection.clone());
    }

    // ========================================================================
    // FILL & CLIPBOARD
    // ========================================================================

    /// Drag the fill handle: repeat the active cell's value down (or up)
    /// to the target visible row, coerced per column type.
    pub fn fill_from_active(&mut self, target_row_index: usize) -> Result<(), ControllerError> {
        let (row_id, col_key) = match &self.selection.active {
            Some(ActiveCell::Cell { row_id, col_key }) => (*row_id, col_key.clone()),
            _ => return Ok(()),
        };
        let source_value = self
            .model
            .get_cell(row_id, &col_key)
            .cloned()
            .unwrap_or(CellValue::Null);
        let Some(active_index) = self.visible.position(row_id) else {
            return Ok(());
        };

        let (from, to) = if target_row_index >= active_index {
            (active_index + 1, target_row_index)
        } else {
            (target_row_index, active_index.saturating_sub(1))
        };
        if from > to {
            return Ok(());
        }

        self.queue.begin_batch(format!("Fill {} rows", to - from + 1));
        for row_index in from..=to {
            let address = CellAddress::row_index_col_key(row_index, col_key.clone());
            if let Err(error) = self.write_cell(&address, source_value.clone()) {
                log::debug!("fill skipped a cell: {}", error);
            }
        }
        self.queue.commit_batch();

        self.refresh_visible();
        self.last_change_reason = ChangeReason::Edit;
        self.emit_table_state();
        self.emit_row_states();
        self.emit_selection(ChangeReason::Edit);
        Ok(())
    }

    /// Paste a clipboard payload with the active cell as the anchor.
    pub fn paste(&mut self, payload: &ClipboardPayload) -> Result<(), ControllerError> {
        let grid = match clipboard::parse_payload(payload) {
            Some(grid) => grid,
            None => return Ok(()),
        };
        let (anchor_row, anchor_col) = match &self.selection.active {
            Some(ActiveCell::Cell { row_id, col_key }) => {
                let row = self.visible.position(*row_id).unwrap_or(0);
                let columns = visible_columns(&self.schema, &self.view);
                let col = columns.iter().position(|k| k == col_key).unwrap_or(0);
                (row, col)
            }
            _ => (0, 0),
        };

        let columns: Vec<String> = visible_columns(&self.schema, &self.view)
            .iter()
            .map(|k| k.to_string())
            .collect();

        self.queue.begin_batch(format!(
            "Paste {}x{} cells",
            grid.len(),
            grid.first().map(|r| r.len()).unwrap_or(0)
        ));
        for (dy, row_values) in grid.iter().enumerate() {
            let row_index = anchor_row + dy;
            if row_index >= self.visible.len() {
                break;
            }
            for (dx, text) in row_values.iter().enumerate() {
                let col_index = anchor_col + dx;
                let Some(col_key) = columns.get(col_index) else {
                    break;
                };
                let address = CellAddress::row_index_col_key(row_index, col_key.clone());
                if let Err(error) = self.write_cell(&address, CellValue::Text(text.clone())) {
                    log::debug!("paste skipped a cell: {}", error);
                }
            }
        }
        self.queue.commit_batch();

        self.refresh_visible();
        self.last_change_reason = ChangeReason::Edit;
        self.emit_table_state();
        self.emit_row_states();
        self.emit_selection(ChangeReason::Edit);
        Ok(())
    }

    /// Copy the selection as TSV of resolved display text.
    pub fn copy_selection(&mut self) -> String {
        let cells = self.selected_cells();
        if cells.is_empty() {
            return String::new();
        }

        // Group by row in visible order.
        let mut rows: Vec<(usize, Vec<(usize, String)>)> = Vec::new();
        let columns = visible_columns(&self.schema, &self.view);
        let columns: Vec<String> = columns.iter().map(|k| k.to_string()).collect();

        for (row_id, col_key) in cells {
            let Some(row_index) = self.visible.position(row_id) else {
                continue;
            };
            let Some(col_index) = columns.iter().position(|k| *k == col_key) else {
                continue;
            };
            let resolved = self.resolver.resolve_cell(
                &self.model,
                &self.schema,
                self.schema_version,
                self.view.version,
                row_id,
                &col_key,
            );
            match rows.iter_mut().find(|(r, _)| *r == row_index) {
                Some((_, cols)) => cols.push((col_index, resolved.text)),
                None => rows.push((row_index, vec![(col_index, resolved.text)])),
            }
        }

        rows.sort_by_key(|(r, _)| *r);
        let grid: Vec<Vec<String>> = rows
            .into_iter()
            .map(|(_, mut cols)| {
                cols.sort_by_key(|(c, _)| *c);
                cols.into_iter().map(|(_, text)| text).collect()
            })
            .collect();
        clipboard::to_tsv(&grid)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn get_cell(&self, address: &CellAddress) -> Result<CellValue, ControllerError> {
        let (row_id, col_key) = normalize(address, &self.visible, &self.schema, &self.view)?;
        Ok(self
            .model
            .get_cell(row_id, &col_key)
            .cloned()
            .unwrap_or(CellValue::Null))
    }

    pub fn get_raw_data(&self) -> Vec<Record> {
        self.model.rows().iter().map(|r| r.record.clone()).collect()
    }

    pub fn get_all_rows(&self) -> &[Row] {
        self.model.rows()
    }

    pub fn get_pending(&self) -> HashMap<RowId, Record> {
        self.model
            .pending_row_ids()
            .into_iter()
            .filter_map(|id| {
                self.model
                    .pending_for(id)
                    .map(|p| (id, p.iter().map(|(k, v)| (k.clone(), v.clone())).collect()))
            })
            .collect()
    }

    pub fn get_pending_row_ids(&self) -> Vec<RowId> {
        self.model.pending_row_ids()
    }

    pub fn get_pending_cell_count(&self) -> usize {
        self.model.pending_cell_count()
    }

    /// Resolved display text for the visible grid.
    pub fn get_table_data(&mut self) -> Vec<Vec<String>> {
        let columns: Vec<String> = visible_columns(&self.schema, &self.view)
            .iter()
            .map(|k| k.to_string())
            .collect();
        let order = self.visible.order.clone();

        order
            .iter()
            .map(|&row_id| {
                columns
                    .iter()
                    .map(|col_key| {
                        self.resolver
                            .resolve_cell(
                                &self.model,
                                &self.schema,
                                self.schema_version,
                                self.view.version,
                                row_id,
                                col_key,
                            )
                            .text
                    })
                    .collect()
            })
            .collect()
    }

    /// Pending-applied values of one column, in visible order.
    pub fn get_column_data(&self, col_key: &str) -> Vec<CellValue> {
        self.visible
            .order
            .iter()
            .map(|&row_id| {
                self.model
                    .get_cell(row_id, col_key)
                    .cloned()
                    .unwrap_or(CellValue::Null)
            })
            .collect()
    }

    pub fn visible_rows(&self) -> &VisibleRows {
        &self.visible
    }

    /// Pending commit transition of a boolean unique column, for radio
    /// rendering.
    pub fn boolean_commit_state(&self, col_key: &str) -> engine::BooleanCommitState {
        engine::boolean_commit_state(&self.model, col_key)
    }

    // ========================================================================
    // SNAPSHOTS & SUBSCRIPTIONS
    // ========================================================================

    pub fn get_table_state(&mut self) -> TableState {
        TableState {
            can_commit: self.model.pending_cell_count() > 0,
            pending_command_count: self.queue.pending_command_count(),
            pending_cell_count: self.model.pending_cell_count(),
            undo_redo: UndoRedoState {
                can_undo: self.queue.can_undo(),
                can_redo: self.queue.can_redo(),
                undo_description: self.queue.undo_description().map(String::from),
                redo_description: self.queue.redo_description().map(String::from),
            },
            render_mode: self.render_mode,
            search_panel_open: self.search_panel_open,
            active_errors: self.collect_active_errors(),
        }
    }

    fn collect_active_errors(&mut self) -> Vec<ActiveError> {
        let columns: Vec<String> = self.schema.keys().map(String::from).collect();
        let order = self.visible.order.clone();
        let mut errors = Vec::new();

        for row_id in order {
            for col_key in &columns {
                let resolved = self.resolver.resolve_cell(
                    &self.model,
                    &self.schema,
                    self.schema_version,
                    self.view.version,
                    row_id,
                    col_key,
                );
                if let Some(diagnostic) = resolved.diagnostic {
                    if diagnostic.level == DiagnosticLevel::Error {
                        errors.push(ActiveError {
                            row_id,
                            col_key: col_key.clone(),
                            message: diagnostic.message,
                        });
                    }
                }
            }
        }

        errors
    }

    pub fn get_selection_snapshot(&mut self) -> SelectionSnapshot {
        self.build_selection_snapshot(self.last_change_reason)
    }

    fn build_selection_snapshot(&mut self, reason: ChangeReason) -> SelectionSnapshot {
        let columns: Vec<String> = visible_columns(&self.schema, &self.view)
            .iter()
            .map(|k| k.to_string())
            .collect();

        match self.selection.active.clone() {
            Some(ActiveCell::Cell { row_id, col_key }) => {
                let resolved = self.resolver.resolve_cell(
                    &self.model,
                    &self.schema,
                    self.schema_version,
                    self.view.version,
                    row_id,
                    &col_key,
                );
                SelectionSnapshot {
                    row_index: self.visible.position(row_id),
                    col_index: columns.iter().position(|k| *k == col_key),
                    row_key: Some(row_id.0.to_string()),
                    col_key: Some(col_key.clone()),
                    display: resolved.text,
                    raw: self.model.get_raw_cell(row_id, &col_key).cloned(),
                    column_style: self
                        .schema
                        .column(&col_key)
                        .and_then(|c| c.style.clone()),
                    cell_style: self.model.cell_style(row_id, &col_key).cloned(),
                    resolved_style: resolved.style,
                    diagnostic: resolved.diagnostic,
                    change_reason: reason,
                }
            }
            Some(ActiveCell::All) => SelectionSnapshot {
                row_index: None,
                col_index: None,
                row_key: Some(view_engine::SELECT_ALL.to_string()),
                col_key: Some(view_engine::SELECT_ALL.to_string()),
                display: String::new(),
                raw: None,
                column_style: None,
                cell_style: None,
                resolved_style: StyleDelta::default(),
                diagnostic: None,
                change_reason: reason,
            },
            None => SelectionSnapshot {
                row_index: None,
                col_index: None,
                row_key: None,
                col_key: None,
                display: String::new(),
                raw: None,
                column_style: None,
                cell_style: None,
                resolved_style: StyleDelta::default(),
                diagnostic: None,
                change_reason: reason,
            },
        }
    }

    pub fn subscribe_table_state(&mut self, mut listener: TableListener) -> SubscriptionId {
        let snapshot = self.get_table_state();
        listener(&snapshot);
        let id = SubscriptionId(Uuid::new_v4());
        self.table_subscribers.push((id, listener));
        id
    }

    pub fn unsubscribe_table_state(&mut self, id: SubscriptionId) {
        self.table_subscribers.retain(|(sid, _)| *sid != id);
    }

    pub fn subscribe_selection(&mut self, mut listener: SelectionListener) -> SubscriptionId {
        let snapshot = self.build_selection_snapshot(self.last_change_reason);
        listener(&snapshot);
        let id = SubscriptionId(Uuid::new_v4());
        self.selection_subscribers.push((id, listener));
        id
    }

    pub fn unsubscribe_selection(&mut self, id: SubscriptionId) {
        self.selection_subscribers.retain(|(sid, _)| *sid != id);
    }

    pub fn subscribe_row_state(&mut self, mut listener: RowStateListener) -> SubscriptionId {
        let snapshot = self.row_states();
        listener(&snapshot);
        let id = SubscriptionId(Uuid::new_v4());
        self.row_subscribers.push((id, listener));
        id
    }

    pub fn unsubscribe_row_state(&mut self, id: SubscriptionId) {
        self.row_subscribers.retain(|(sid, _)| *sid != id);
    }

    fn row_states(&self) -> RowStates {
        let mut locked: Vec<RowId> = self.locked_rows.iter().copied().collect();
        locked.sort();
        RowStates {
            pending_row_ids: self.model.pending_row_ids(),
            locked_row_ids: locked,
        }
    }

    fn emit_table_state(&mut self) {
        let snapshot = self.get_table_state();
        let mut subscribers = std::mem::take(&mut self.table_subscribers);
        for (_, listener) in subscribers.iter_mut() {
            listener(&snapshot);
        }
        subscribers.append(&mut self.table_subscribers);
        self.table_subscribers = subscribers;
    }

    fn emit_selection(&mut self, reason: ChangeReason) {
        let snapshot = self.build_selection_snapshot(reason);
        let mut subscribers = std::mem::take(&mut self.selection_subscribers);
        for (_, listener) in subscribers.iter_mut() {
            listener(&snapshot);
        }
        subscribers.append(&mut self.selection_subscribers);
        self.selection_subscribers = subscribers;
    }

    fn emit_row_states(&mut self) {
        let snapshot = self.row_states();
        let mut subscribers = std::mem::take(&mut self.row_subscribers);
        for (_, listener) in subscribers.iter_mut() {
            listener(&snapshot);
        }
        subscribers.append(&mut self.row_subscribers);
        self.row_subscribers = subscribers;
    }

    // ========================================================================
    // UI INTENTS
    // ========================================================================

    pub fn toggle_search_panel(&mut self) {
        self.search_panel_open = !self.search_panel_open;
        self.emit_table_state();
    }

    pub fn show_search_panel(&mut self) {
        if !self.search_panel_open {
            self.search_panel_open = true;
            self.emit_table_state();
        }
    }

    // ========================================================================
    // RENDERING & INPUT
    // ========================================================================

    pub fn render(&mut self, viewport: Viewport) {
        self.renderer.set_active_cell(self.selection.active.clone());
        self.renderer.set_selection(self.selection.clone());
        let mut ctx = RenderContext {
            model: &self.model,
            schema: &self.schema,
            schema_version: self.schema_version,
            view: &self.view,
            visible: &self.visible,
            selection: &self.selection,
            resolver: &mut self.resolver,
        };
        self.renderer.render(&mut ctx, viewport);
    }

    /// One wrap-measurement tick; re-arm on the next frame while true.
    pub fn measure_tick(&mut self, clock: &dyn Clock) -> bool {
        let mut ctx = RenderContext {
            model: &self.model,
            schema: &self.schema,
            schema_version: self.schema_version,
            view: &self.view,
            visible: &self.visible,
            selection: &self.selection,
            resolver: &mut self.resolver,
        };
        self.renderer.measure_tick(&mut ctx, clock)
    }

    pub fn set_pointer_hover(&mut self, position: Option<(f32, f32)>) {
        self.renderer.set_hover(position);
    }

    pub fn hit_test(&self, x: f32, y: f32) -> HitTarget {
        self.renderer.hit_test(x, y)
    }

    pub fn hit_test_action(&self, x: f32, y: f32) -> Option<crate::render::ActionHit> {
        self.renderer.hit_test_action(x, y)
    }

    pub fn cursor_at(&mut self, x: f32, y: f32) -> CursorKind {
        let readonly_mode = self.edit_mode == EditMode::Readonly;
        let ctx = RenderContext {
            model: &self.model,
            schema: &self.schema,
            schema_version: self.schema_version,
            view: &self.view,
            visible: &self.visible,
            selection: &self.selection,
            resolver: &mut self.resolver,
        };
        self.renderer.cursor_at(x, y, &ctx, readonly_mode)
    }

    /// Route a primary click through hit-testing to selection.
    pub fn click_at(&mut self, x: f32, y: f32) -> Option<LogicalEvent> {
        let hit = self.renderer.hit_test(x, y);
        match hit {
            HitTarget::Corner => {
                self.select_all();
                None
            }
            HitTarget::HeaderIcon { col_index } => {
                let columns = visible_columns(&self.schema, &self.view);
                columns.get(col_index).map(|key| LogicalEvent::FilterSortOpen {
                    col_key: key.to_string(),
                })
            }
            HitTarget::RowHeader { row_index } => {
                self.select_row_band(row_index, row_index);
                None
            }
            HitTarget::Cell {
                row_index,
                col_index,
            } => {
                let _ = self.select_cell(&CellAddress::by_index(row_index, col_index));
                None
            }
            _ => None,
        }
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn refresh_visible(&mut self) {
        self.visible = compute_visible(
            &self.model,
            &self.schema,
            &self.view,
            &mut self.resolver,
            self.schema_version,
        );
    }

    /// Re-run filter/sort only when the edited column participates in the
    /// current ordering.
    fn refresh_visible_if_ordering_depends_on(&mut self, col_key: &str) {
        let affects = self.view.filters.contains_key(col_key)
            || self.view.sorts.iter().any(|s| s.col_key == col_key);
        if affects {
            self.refresh_visible();
        } else {
            // Row set unchanged; keep the ordering but pick up inserts.
            if self.visible.order.len() != self.model.len() {
                self.refresh_visible();
            }
        }
    }
}
