pub mod commit;
pub mod completions;
pub mod config;
pub mod init;
pub mod new;
pub mod pop;
pub mod push;
pub mod rebase;
pub mod refresh;
pub mod series;
pub mod uncommit;
pub mod undo;
pub mod validate;

use crate::cli::output::Output;
use crate::errors::Result;
use crate::stack::TransactionOutcome;

/// Report a finished transaction; a halt becomes the halt error
pub(crate) fn report_outcome(outcome: TransactionOutcome) -> Result<()> {
    if let TransactionOutcome::Halted { reason, conflicts } = &outcome {
        Output::halted(reason, conflicts);
    }
    outcome.into_result()
}

pub(crate) fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}es")
    }
}
