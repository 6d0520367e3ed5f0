//! FILENAME: sheetgrid/src/modes.rs
//! PURPOSE: The component's mode switches - edit, lock, render.

use serde::{Deserialize, Serialize};

/// How cell writes behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum EditMode {
    /// Every cell write is an immediate committed command.
    #[default]
    Direct,
    /// Writes go to the pending overlay until an explicit commit().
    Commit,
    /// Writes are rejected at the controller boundary; selection and copy
    /// still work.
    Readonly,
}

/// Advisory row locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum LockMode {
    #[default]
    None,
    /// The lock mask applies: locked rows reject writes.
    Row,
}

/// Which renderer back-end is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum RenderMode {
    #[default]
    Canvas,
    Dom,
}
