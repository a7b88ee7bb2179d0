use super::stack::PatchOrder;
use crate::errors::{Result, StackError};
use std::collections::BTreeSet;

/// How a command picked its patches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchSelection {
    /// Explicit names or `a..b` ranges
    Names(Vec<String>),
    /// A number of patches
    Count(usize),
    /// Every candidate patch
    All,
    /// Nothing given on the command line
    Default,
}

impl PatchSelection {
    /// Build a selection from command-line arguments; at most one mode may be used
    pub fn from_args(names: Vec<String>, count: Option<usize>, all: bool) -> Result<Self> {
        let modes = [!names.is_empty(), count.is_some(), all]
            .iter()
            .filter(|used| **used)
            .count();
        if modes > 1 {
            return Err(StackError::validation("too many options"));
        }

        Ok(match (names.is_empty(), count, all) {
            (false, _, _) => PatchSelection::Names(names),
            (_, Some(n), _) => PatchSelection::Count(n),
            (_, _, true) => PatchSelection::All,
            _ => PatchSelection::Default,
        })
    }

    /// Patches to fold into the base, bottom first
    pub fn resolve_for_commit(&self, order: &PatchOrder) -> Result<Vec<String>> {
        let patches = match self {
            PatchSelection::Names(args) => {
                let series: Vec<String> = order.all().cloned().collect();
                let wanted = expand_patch_names(args, &series)?;
                let patches: Vec<String> = series
                    .iter()
                    .filter(|name| wanted.contains(*name))
                    .cloned()
                    .collect();
                check_bad_names(&wanted, &patches)?;
                patches
            }
            PatchSelection::Count(n) => {
                if *n > order.applied.len() {
                    return Err(StackError::validation(
                        "There are not that many applied patches",
                    ));
                }
                order.applied[..*n].to_vec()
            }
            PatchSelection::All => order.applied.clone(),
            PatchSelection::Default => order.applied.iter().take(1).cloned().collect(),
        };

        if patches.is_empty() {
            return Err(StackError::validation("No patches to commit"));
        }
        Ok(patches)
    }

    /// Unapplied patches to push, in push order
    pub fn resolve_for_push(&self, order: &PatchOrder) -> Result<Vec<String>> {
        let patches = match self {
            PatchSelection::Names(args) => {
                let series: Vec<String> = order.all().cloned().collect();
                let wanted = expand_patch_names(args, &series)?;
                check_bad_names(&wanted, &series)?;

                if let Some(applied) = wanted.iter().find(|name| order.is_applied(name)) {
                    return Err(StackError::validation(format!(
                        "Patch '{applied}' is already applied"
                    )));
                }
                wanted
            }
            PatchSelection::Count(n) => {
                if *n > order.unapplied.len() {
                    return Err(StackError::validation(
                        "There are not that many unapplied patches",
                    ));
                }
                order.unapplied[..*n].to_vec()
            }
            PatchSelection::All => order.unapplied.clone(),
            PatchSelection::Default => order.unapplied.iter().take(1).cloned().collect(),
        };

        if patches.is_empty() {
            return Err(StackError::validation("No patches to push"));
        }
        Ok(patches)
    }

    /// Applied patches to pop, bottom first
    pub fn resolve_for_pop(&self, order: &PatchOrder) -> Result<Vec<String>> {
        let applied = &order.applied;
        let patches = match self {
            PatchSelection::Names(args) => {
                let series: Vec<String> = order.all().cloned().collect();
                let wanted = expand_patch_names(args, &series)?;
                check_bad_names(&wanted, &series)?;

                if let Some(unapplied) = wanted.iter().find(|name| !order.is_applied(name)) {
                    return Err(StackError::validation(format!(
                        "Patch '{unapplied}' is not applied"
                    )));
                }
                applied
                    .iter()
                    .filter(|name| wanted.contains(*name))
                    .cloned()
                    .collect()
            }
            PatchSelection::Count(n) => {
                if *n > applied.len() {
                    return Err(StackError::validation(
                        "There are not that many applied patches",
                    ));
                }
                applied[applied.len() - n..].to_vec()
            }
            PatchSelection::All => applied.clone(),
            PatchSelection::Default => applied.last().cloned().into_iter().collect(),
        };

        if patches.is_empty() {
            return Err(StackError::validation("No patches applied"));
        }
        Ok(patches)
    }
}

fn check_bad_names(wanted: &[String], found: &[String]) -> Result<()> {
    let bad: BTreeSet<&String> = wanted.iter().filter(|n| !found.contains(n)).collect();
    if bad.is_empty() {
        return Ok(());
    }
    let bad: Vec<&str> = bad.into_iter().map(String::as_str).collect();
    Err(StackError::validation(format!(
        "Bad patch names: {}",
        bad.join(", ")
    )))
}

/// Expand `a..b`, `a..` and `..b` ranges against the series; plain names
/// are passed through unchanged, duplicates dropped
pub fn expand_patch_names(args: &[String], series: &[String]) -> Result<Vec<String>> {
    let mut expanded: Vec<String> = Vec::new();
    let mut bad = BTreeSet::new();

    let position = |name: &str, bad: &mut BTreeSet<String>| {
        let found = series.iter().position(|n| n == name);
        if found.is_none() {
            bad.insert(name.to_string());
        }
        found
    };

    for arg in args {
        let names: Vec<String> = match arg.split_once("..") {
            Some((from, to)) => {
                let start = if from.is_empty() {
                    Some(0)
                } else {
                    position(from, &mut bad)
                };
                let end = if to.is_empty() {
                    series.len().checked_sub(1)
                } else {
                    position(to, &mut bad)
                };
                match (start, end) {
                    (Some(start), Some(end)) if start <= end => series[start..=end].to_vec(),
                    (Some(_), Some(_)) => {
                        return Err(StackError::validation(format!("Bad patch range: {arg}")))
                    }
                    _ => Vec::new(),
                }
            }
            None => vec![arg.clone()],
        };

        for name in names {
            if !expanded.contains(&name) {
                expanded.push(name);
            }
        }
    }

    if !bad.is_empty() {
        let bad: Vec<String> = bad.into_iter().collect();
        return Err(StackError::validation(format!(
            "Bad patch names: {}",
            bad.join(", ")
        )));
    }
    Ok(expanded)
}
