//! Transaction submission: fee estimation, operator confirmation and the
//! per-action workflow that ties them to the chain client

mod gas;
mod gate;
mod workflow;

pub use gas::FeeEstimator;
pub use gate::ConfirmationGate;
pub use workflow::{ActionOutcome, TransactionWorkflow};

#[cfg(test)]
pub use gate::MockConfirmationGate;

use crate::config::OperationNames;
use std::fmt;

/// State-changing actions the console can submit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Activate,
    Deactivate,
    Withdraw,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Activate => "Activate",
            ActionKind::Deactivate => "Deactivate",
            ActionKind::Withdraw => "Withdraw",
        }
    }

    /// What confirming the action does, shown above the cost preview
    pub fn consequence(&self) -> &'static str {
        match self {
            ActionKind::Activate => {
                "Activate the contract. It will start operating with the funds it holds."
            }
            ActionKind::Deactivate => "Deactivate the contract. It will stop operating.",
            ActionKind::Withdraw => {
                "Withdraw the contract balance to the signing address. This moves funds."
            }
        }
    }

    /// Contract operation backing this action
    pub fn operation<'a>(&self, names: &'a OperationNames) -> &'a str {
        match self {
            ActionKind::Activate => &names.activate,
            ActionKind::Deactivate => &names.deactivate,
            ActionKind::Withdraw => &names.withdraw,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
