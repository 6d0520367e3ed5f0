//! FILENAME: core/engine/src/undo.rs
//! PURPOSE: Undo/Redo history over typed commands using the Command Pattern.
//! CONTEXT: Every command records enough inverse information to undo without
//! consulting current model state. Commands group into batches; undo/redo
//! move whole batches. The applied list is bounded - overflow silently drops
//! the oldest batch and with it the ability to undo that far back.

use std::collections::VecDeque;

use serde::Serialize;

use crate::model::RowId;
use crate::schema::Record;
use crate::style::StyleDelta;
use crate::value::CellValue;

/// Maximum number of undoable batches to keep in history.
const MAX_HISTORY_SIZE: usize = 100;

/// A single undoable operation with its inverse data baked in.
#[derive(Debug, Clone)]
pub enum Command {
    /// A cell write. `committed` distinguishes direct-mode raw writes from
    /// commit-mode pending writes.
    Edit {
        row_id: RowId,
        col_key: String,
        previous: CellValue,
        next: CellValue,
        committed: bool,
    },
    /// A row insertion; undo removes the row again.
    InsertRow {
        row_id: RowId,
        record: Record,
        index: usize,
    },
    /// A row deletion carrying everything needed to resurrect it: the raw
    /// record, its position, and the purged pending/style entries.
    DeleteRow {
        row_id: RowId,
        record: Record,
        index: usize,
        pending: Record,
        styles: Vec<(String, StyleDelta)>,
        readonly: bool,
    },
    /// A style delta applied to one cell.
    SetCellStyle {
        row_id: RowId,
        col_key: String,
        previous: Option<StyleDelta>,
        next: Option<StyleDelta>,
    },
    /// A view change. The view is the persistable JSON surface, so the
    /// snapshots are stored in their serialized form.
    UpdateView { previous: String, next: String },
    /// Advisory row locks.
    Lock { row_id: RowId },
    Unlock { row_id: RowId },
}

impl Command {
    /// True for commit-mode edits that have not been committed yet.
    pub fn is_pending_edit(&self) -> bool {
        matches!(self, Command::Edit { committed: false, .. })
    }
}

/// A batch groups several commands into one user-visible undo step.
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: u64,
    /// Human-readable description (e.g., "Paste 10 cells", "Delete row")
    pub label: String,
    /// The individual commands in this batch (in order applied)
    pub commands: Vec<Command>,
}

impl Batch {
    fn new(id: u64, label: impl Into<String>) -> Self {
        Batch {
            id,
            label: label.into(),
            commands: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// One line of the history listing shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub label: String,
    pub command_count: usize,
}

/// The undo/redo history as the UI sees it: newest first on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub undo: Vec<BatchSummary>,
    pub redo: Vec<BatchSummary>,
}

/// The history stack for undo/redo operations.
#[derive(Debug)]
pub struct CommandQueue {
    /// Completed batches that can be undone (most recent at back)
    undo_stack: VecDeque<Batch>,
    /// Batches that were undone and can be redone (most recent at back)
    redo_stack: VecDeque<Batch>,
    /// Currently open batch being built (for grouping)
    current_batch: Option<Batch>,
    /// Maximum size of undo history
    max_size: usize,
    next_batch_id: u64,
    /// Commit-mode edits applied but not yet drained by commit().
    uncommitted_edits: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        CommandQueue::with_max_size(MAX_HISTORY_SIZE)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        CommandQueue {
            undo_stack: VecDeque::with_capacity(max_size),
            redo_stack: VecDeque::with_capacity(max_size),
            current_batch: None,
            max_size,
            next_batch_id: 0,
            uncommitted_edits: 0,
        }
    }

    /// Begin a new batch for grouping multiple commands.
    /// If a batch is already open, this is a no-op (nested calls ignored).
    pub fn begin_batch(&mut self, label: impl Into<String>) {
        if self.current_batch.is_none() {
            self.next_batch_id += 1;
            self.current_batch = Some(Batch::new(self.next_batch_id, label));
        }
    }

    /// Commit the current batch to the undo stack.
    /// If no batch is open or it's empty, this is a no-op.
    pub fn commit_batch(&mut self) {
        if let Some(batch) = self.current_batch.take() {
            if !batch.is_empty() {
                self.push_batch(batch);
            }
        }
    }

    /// Cancel the current batch without saving it.
    pub fn cancel_batch(&mut self) {
        self.current_batch = None;
    }

    /// Record a command. If a batch is open, add to it. Otherwise, create a
    /// single-command batch labeled after the command.
    pub fn record(&mut self, command: Command) {
        if command.is_pending_edit() {
            self.uncommitted_edits += 1;
        }

        if let Some(ref mut batch) = self.current_batch {
            batch.commands.push(command);
        } else {
            self.next_batch_id += 1;
            let mut batch = Batch::new(self.next_batch_id, label_for(&command));
            batch.commands.push(command);
            self.push_batch(batch);
        }
    }

    /// Push a completed batch onto the undo stack.
    fn push_batch(&mut self, batch: Batch) {
        // Clear redo stack when new action is performed
        self.redo_stack.clear();

        // Enforce max size: the oldest batch loses its undo forever.
        while self.undo_stack.len() >= self.max_size {
            self.undo_stack.pop_front();
        }

        self.undo_stack.push_back(batch);
    }

    /// Push a batch to the undo stack without clearing redo.
    /// Used internally by the redo operation.
    pub fn push_undo_for_redo(&mut self, batch: Batch) {
        while self.undo_stack.len() >= self.max_size {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(batch);
    }

    /// Pop the most recent batch for undo. Returns None if nothing to undo.
    pub fn pop_undo(&mut self) -> Option<Batch> {
        let batch = self.undo_stack.pop_back();
        if let Some(ref b) = batch {
            let pending = b.commands.iter().filter(|c| c.is_pending_edit()).count();
            self.uncommitted_edits = self.uncommitted_edits.saturating_sub(pending);
        }
        batch
    }

    /// Push a batch onto the redo stack (after undo).
    pub fn push_redo(&mut self, batch: Batch) {
        while self.redo_stack.len() >= self.max_size {
            self.redo_stack.pop_front();
        }
        self.redo_stack.push_back(batch);
    }

    /// Pop the most recent batch for redo. Returns None if nothing to redo.
    pub fn pop_redo(&mut self) -> Option<Batch> {
        let batch = self.redo_stack.pop_back();
        if let Some(ref b) = batch {
            let pending = b.commands.iter().filter(|c| c.is_pending_edit()).count();
            self.uncommitted_edits += pending;
        }
        batch
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get description of next undo action (for UI).
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|b| b.label.as_str())
    }

    /// Get description of next redo action (for UI).
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|b| b.label.as_str())
    }

    /// Commit-mode edit commands applied and not yet drained by commit().
    pub fn pending_command_count(&self) -> usize {
        self.uncommitted_edits
    }

    /// Called when commit() drains the pending overlay: the queued
    /// commit-mode edits are no longer awaiting anything.
    pub fn mark_committed(&mut self) {
        self.uncommitted_edits = 0;
    }

    /// Enumerate both stacks newest-first for the history UI.
    pub fn history(&self) -> HistorySnapshot {
        HistorySnapshot {
            undo: self
                .undo_stack
                .iter()
                .rev()
                .map(|b| BatchSummary {
                    label: b.label.clone(),
                    command_count: b.commands.len(),
                })
                .collect(),
            redo: self
                .redo_stack
                .iter()
                .rev()
                .map(|b| BatchSummary {
                    label: b.label.clone(),
                    command_count: b.commands.len(),
                })
                .collect(),
        }
    }

    /// Clear all history.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current_batch = None;
        self.uncommitted_edits = 0;
    }

    /// Get current stack sizes (for debugging).
    pub fn stack_sizes(&self) -> (usize, usize) {
        (self.undo_stack.len(), self.redo_stack.len())
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn label_for(command: &Command) -> String {
    match command {
        Command::Edit { col_key, .. } => format!("Edit {}", col_key),
        Command::InsertRow { index, .. } => format!("Insert row at {}", index + 1),
        Command::DeleteRow { index, .. } => format!("Delete row {}", index + 1),
        Command::SetCellStyle { col_key, .. } => format!("Style {}", col_key),
        Command::UpdateView { .. } => "Change view".to_string(),
        Command::Lock { .. } => "Lock row".to_string(),
        Command::Unlock { .. } => "Unlock row".to_string(),
    }
}
