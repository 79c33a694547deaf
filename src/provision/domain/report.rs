use crate::{
    core::domain::{error::ProxmoxError, model::observed_vm::ObservedVm, value_object::VmId},
    provision::domain::plan::PlannedAction,
};
use std::fmt;

/// How far a convergence pass got.
#[derive(Debug)]
pub enum Outcome {
    /// Every planned call succeeded.
    Converged,
    /// The cluster already matched; nothing was sent.
    Unchanged,
    /// Some calls succeeded before `failed` did. Nothing is rolled back.
    Incomplete {
        failed: PlannedAction,
        error: ProxmoxError,
    },
}

impl Outcome {
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Outcome::Incomplete { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Converged => f.write_str("converged"),
            Outcome::Unchanged => f.write_str("unchanged"),
            Outcome::Incomplete { failed, error } => {
                write!(f, "incomplete ({} failed: {})", failed, error)
            }
        }
    }
}

/// Result of converging one VM.
#[derive(Debug)]
pub struct ConvergenceReport {
    pub vmid: VmId,
    /// Calls that succeeded, in order.
    pub applied: Vec<PlannedAction>,
    pub outcome: Outcome,
    /// State read back after applying, or the pre-apply state when nothing
    /// was applied. `None` when the VM could not be found.
    pub observed: Option<ObservedVm>,
}

impl ConvergenceReport {
    /// `true` when at least one mutating call went through.
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}
