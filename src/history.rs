//! Undo/redo history over the command stream.
//!
//! Owns the undo and redo stacks, coalesces rapid consecutive compatible
//! commands into one undo step, and wraps batch transactions into a single
//! atomic composite. History depth is bounded; the oldest entries fall
//! off the bottom.

use anyhow::{bail, Result};
use tracing::debug;

use crate::command::{Command, MergeWindows};
use crate::store::{DocumentStore, Outcome};

/// Default maximum history depth
const DEFAULT_MAX_DEPTH: usize = 100;

/// Undo/redo manager: the only path through which commands reach the
/// store
pub struct History {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    /// Open batch transaction, if any: description plus buffered commands
    batch: Option<(String, Vec<Command>)>,
    windows: MergeWindows,
    max_depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            batch: None,
            windows: MergeWindows::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_windows(mut self, windows: MergeWindows) -> Self {
        self.windows = windows;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Execute a command and record it.
    ///
    /// Inside an open batch the command is executed and buffered. Outside
    /// a batch it is executed, merged into the stack top when compatible,
    /// otherwise pushed; either way the redo stack is invalidated.
    /// Rejected commands are never recorded.
    pub fn execute(&mut self, mut cmd: Command, store: &mut DocumentStore) -> Result<Outcome> {
        let outcome = cmd.execute(store)?;
        if !outcome.is_applied() {
            return Ok(outcome);
        }

        if let Some((_, buffer)) = self.batch.as_mut() {
            buffer.push(cmd);
            return Ok(outcome);
        }

        let mergeable = self
            .undo_stack
            .last()
            .is_some_and(|top| top.can_merge(&cmd, &self.windows));
        if mergeable {
            if let Some(top) = self.undo_stack.pop() {
                self.undo_stack.push(top.merge(cmd)?);
            }
        } else {
            self.undo_stack.push(cmd);
        }
        self.redo_stack.clear();
        self.trim();
        Ok(outcome)
    }

    /// Open a batch transaction: subsequent commands execute immediately
    /// but are recorded as one atomic undo unit when the batch ends
    pub fn begin_batch(&mut self, description: impl Into<String>) -> Result<()> {
        if self.batch.is_some() {
            bail!("batch transaction already open");
        }
        self.batch = Some((description.into(), Vec::new()));
        Ok(())
    }

    /// Close the open batch and push it as a single composite command.
    /// An empty batch leaves no undo obligation. Batches never merge with
    /// earlier commands.
    pub fn end_batch(&mut self) -> Result<()> {
        let Some((description, commands)) = self.batch.take() else {
            bail!("no batch transaction open");
        };
        if commands.is_empty() {
            return Ok(());
        }
        debug!(
            description = %description,
            commands = commands.len(),
            "closing batch transaction"
        );
        self.undo_stack.push(Command::Batch {
            description,
            commands,
        });
        self.redo_stack.clear();
        self.trim();
        Ok(())
    }

    /// Undo the most recent command. Returns false if there is nothing to
    /// undo.
    pub fn undo(&mut self, store: &mut DocumentStore) -> Result<bool> {
        let Some(cmd) = self.undo_stack.pop() else {
            return Ok(false);
        };
        cmd.undo(store)?;
        self.redo_stack.push(cmd);
        Ok(true)
    }

    /// Re-apply the most recently undone command. Returns false if there
    /// is nothing to redo.
    pub fn redo(&mut self, store: &mut DocumentStore) -> Result<bool> {
        let Some(mut cmd) = self.redo_stack.pop() else {
            return Ok(false);
        };
        cmd.redo(store)?;
        self.undo_stack.push(cmd);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Description of the command the next undo would revert
    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.last().map(Command::describe)
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.last().map(Command::describe)
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    fn trim(&mut self) {
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
    }
}
