//! Stack management module
//!
//! This module implements the patch stack:
//! - Stack record and its persistence under a lock
//! - Transactions that push, pop and fold patches
//! - Patch selection rules and the undo log

pub mod fold;
pub mod log;
pub mod manager;
pub mod selection;
pub mod stack;
pub mod transaction;

pub use fold::{commit_to_base, plan_fold, FoldPlan, FoldReport};
pub use log::{LogEntry, LogKind, LogRecord};
pub use manager::StackManager;
pub use selection::PatchSelection;
pub use stack::{PatchOrder, PatchRecord, Stack, StackState};
pub use transaction::{
    Flow, PushStatus, StackTransaction, TransactionOp, TransactionOutcome, TransactionStatus,
};

#[cfg(test)]
pub(crate) mod test_support;
