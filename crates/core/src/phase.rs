//! Task phase and the permitted transition graph (§3, §8).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub enum Phase {
    Pending,
    Running,
    Waiting,
    Retrying,
    Completed,
    Failed,
    TimedOut,
    BudgetExceeded,
    Cancelled,
}

crate::simple_display! {
    Phase {
        Pending => "Pending",
        Running => "Running",
        Waiting => "Waiting",
        Retrying => "Retrying",
        Completed => "Completed",
        Failed => "Failed",
        TimedOut => "TimedOut",
        BudgetExceeded => "BudgetExceeded",
        Cancelled => "Cancelled",
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Pending
    }
}

impl Phase {
    /// Terminal phases never transition further except to deletion (§3, §8).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Phase::Completed | Phase::Failed | Phase::TimedOut | Phase::BudgetExceeded | Phase::Cancelled
        )
    }

    /// Whether `self -> next` is a permitted phase adjacency.
    ///
    /// Progression is monotonic toward terminal, except the
    /// Running<->Waiting<->Pending loop used by reincarnation and the
    /// explicit Retrying->Pending re-entry (§3 invariants).
    pub fn can_transition_to(self, next: Phase) -> bool {
        if self == next {
            return true; // idempotent re-application of the same phase
        }
        if self.is_terminal() {
            return false;
        }
        use Phase::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Running, Waiting)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, TimedOut)
                | (Running, BudgetExceeded)
                | (Running, Retrying)
                | (Running, Cancelled)
                | (Waiting, Pending)
                | (Waiting, Cancelled)
                | (Waiting, Failed)
                | (Retrying, Pending)
                | (Retrying, Failed)
                | (Retrying, Cancelled)
        )
    }
}

#[cfg(test)]
#[path = "phase_tests.rs"]
mod tests;
