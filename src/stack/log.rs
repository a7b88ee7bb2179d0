//! Per-stack history of finalized transactions, used by undo and redo.
//!
//! Every finalized transaction appends one entry holding the state it
//! produced. Undo and redo entries also remember which earlier entry they
//! restored, so repeated undos walk further back instead of flipping
//! between two states.

use super::stack::StackState;
use crate::errors::{Result, StackError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    Command,
    Undo,
    Redo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic sequence number within the stack
    pub seq: u64,
    pub id: Uuid,
    /// Purpose label of the transaction that wrote this entry
    pub purpose: String,
    pub kind: LogKind,
    /// Sequence number of the entry whose state was restored
    pub restores: Option<u64>,
    /// State after the transaction
    pub state: StackState,
    pub created_at: DateTime<Utc>,
}

impl LogEntry {
    /// Position in command history this entry stands for
    pub fn effective_seq(&self) -> u64 {
        self.restores.unwrap_or(self.seq)
    }
}

/// What a transaction records in the log when it finalizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecord {
    pub kind: LogKind,
    pub restores: Option<u64>,
}

impl LogRecord {
    pub fn command() -> Self {
        Self {
            kind: LogKind::Command,
            restores: None,
        }
    }

    pub fn undo(restores: u64) -> Self {
        Self {
            kind: LogKind::Undo,
            restores: Some(restores),
        }
    }

    pub fn redo(restores: u64) -> Self {
        Self {
            kind: LogKind::Redo,
            restores: Some(restores),
        }
    }
}

/// Append an entry, dropping the oldest ones beyond `max_entries`
pub fn append(
    log: &mut Vec<LogEntry>,
    purpose: &str,
    record: LogRecord,
    state: StackState,
    max_entries: usize,
) -> u64 {
    let seq = log.last().map(|e| e.seq + 1).unwrap_or(1);
    log.push(LogEntry {
        seq,
        id: Uuid::new_v4(),
        purpose: purpose.to_string(),
        kind: record.kind,
        restores: record.restores,
        state,
        created_at: Utc::now(),
    });

    let max_entries = max_entries.max(1);
    if log.len() > max_entries {
        let excess = log.len() - max_entries;
        log.drain(..excess);
    }
    seq
}

fn find(log: &[LogEntry], seq: u64) -> Option<&LogEntry> {
    log.iter().find(|e| e.seq == seq)
}

/// Entry whose state `undo steps` restores
pub fn undo_target(log: &[LogEntry], steps: usize) -> Result<&LogEntry> {
    if steps < 1 {
        return Err(StackError::validation("Bad number of commands to undo"));
    }
    let last = log
        .last()
        .ok_or_else(|| StackError::validation("Not enough undo information"))?;

    last.effective_seq()
        .checked_sub(steps as u64)
        .and_then(|seq| find(log, seq))
        .ok_or_else(|| StackError::validation("Not enough undo information"))
}

/// Entry whose state `redo steps` restores
pub fn redo_target(log: &[LogEntry], steps: usize) -> Result<&LogEntry> {
    if steps < 1 {
        return Err(StackError::validation("Bad number of commands to redo"));
    }
    let last = log
        .last()
        .ok_or_else(|| StackError::validation("Nothing to redo"))?;
    if last.kind == LogKind::Command {
        return Err(StackError::validation(
            "The last command was not an undo; nothing to redo",
        ));
    }

    // Redo cannot go past the command the trailing undo/redo run started from
    let limit = log
        .iter()
        .rev()
        .find(|e| e.kind == LogKind::Command)
        .map(|e| e.seq)
        .ok_or_else(|| StackError::validation("Nothing to redo"))?;

    let target = last.effective_seq() + steps as u64;
    if target > limit {
        return Err(StackError::validation("Not enough redo information"));
    }

    find(log, target).ok_or_else(|| StackError::validation("Not enough redo information"))
}
