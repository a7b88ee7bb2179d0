//! Folding patches into the stack base with as few pops and pushes as
//! possible.

use super::transaction::StackTransaction;
use crate::errors::Result;
use crate::git::Worktree;
use tracing::debug;

/// Moves needed before a set of patches can be folded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldPlan {
    /// Length of the positional prefix shared by applied and target
    pub common_prefix: usize,
    /// Applied patches to pop, top to bottom
    pub to_pop: Vec<String>,
    /// Target patches to push, bottom to top
    pub to_push: Vec<String>,
}

/// Summary of a fold, for reporting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoldReport {
    pub folded: Vec<String>,
    pub popped: Vec<String>,
    pub pushed: Vec<String>,
    pub repushed: Vec<String>,
    pub halted: bool,
}

pub fn plan_fold(applied: &[String], target: &[String]) -> FoldPlan {
    let common_prefix = applied
        .iter()
        .zip(target.iter())
        .take_while(|(a, t)| a == t)
        .count();

    FoldPlan {
        common_prefix,
        to_pop: applied[common_prefix..].iter().rev().cloned().collect(),
        to_push: target[common_prefix..].to_vec(),
    }
}

/// Fold `patches` into the base.
///
/// Patches above the shared prefix are popped, the rest of the target is
/// pushed, the target is folded and the popped patches that were not folded
/// are pushed back in their original order. A halt before the fold folds
/// nothing; a halt while pushing back keeps the fold.
pub fn commit_to_base(
    trans: &mut StackTransaction<'_>,
    patches: &[String],
    iw: &mut dyn Worktree,
) -> Result<FoldReport> {
    let plan = plan_fold(trans.applied(), patches);
    debug!(
        "Fold plan: prefix {}, pop {:?}, push {:?}",
        plan.common_prefix, plan.to_pop, plan.to_push
    );

    let mut report = FoldReport::default();

    if !plan.to_pop.is_empty() {
        report.popped = trans.pop_patches(|name| plan.to_pop.iter().any(|p| p == name));
    }

    for name in &plan.to_push {
        if trans.push_patch(name, iw)?.is_halted() {
            report.halted = true;
            return Ok(report);
        }
        report.pushed.push(name.clone());
    }

    trans.fold_into_base(patches)?;
    report.folded = patches.to_vec();

    for name in report.popped.clone().iter().rev() {
        if patches.contains(name) {
            continue;
        }
        if trans.push_patch(name, iw)?.is_halted() {
            report.halted = true;
            break;
        }
        report.repushed.push(name.clone());
    }

    Ok(report)
}
