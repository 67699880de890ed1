//! Per-action transaction workflow
//!
//! Each invocation walks
//! `Idle -> Guarding -> Pricing -> AwaitingConfirmation -> Submitting -> AwaitingInclusion`
//! and ends in `Succeeded` or `Failed` before returning to `Idle`.
//!
//! Guard outcomes, operator cancellation, submission rejection and lost
//! confirmations are reported through [`ActionOutcome`]. Only transport
//! failures before broadcast and rejections while reading state escape as
//! errors. Nothing is ever retried: once a transaction is broadcast the only
//! safe report on a lost observation is the hash.

use super::gas::{FeeEstimator, FeeQuote};
use super::gate::ConfirmationGate;
use super::ActionKind;
use crate::chain::{BlockInfo, SubmissionStatus, SubmitParams};
use crate::error::{ConsoleError, ConsoleResult};
use crate::session::SessionContext;

use ethers::types::{H256, U256};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Guarding,
    Pricing,
    AwaitingConfirmation,
    Submitting,
    AwaitingInclusion,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Activation attempted with no strategy selected
    StrategyUnset,
    /// Contract balance read exactly zero
    ZeroBalance,
    /// Operator did not approve at the gate
    CancelledByOperator,
    /// Node or contract refused the submission before broadcast
    Rejected { reason: Option<String> },
    /// Included but execution reverted
    Reverted {
        tx_hash: H256,
        block: Option<BlockInfo>,
    },
    /// Broadcast, but the outcome could not be observed
    ConfirmationLost { tx_hash: H256, detail: String },
}

impl FailureReason {
    /// Expected guard outcomes, reported as information rather than errors
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            FailureReason::StrategyUnset
                | FailureReason::ZeroBalance
                | FailureReason::CancelledByOperator
        )
    }

    pub fn tx_hash(&self) -> Option<H256> {
        match self {
            FailureReason::Reverted { tx_hash, .. }
            | FailureReason::ConfirmationLost { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Succeeded {
        tx_hash: H256,
        block: Option<BlockInfo>,
    },
    Failed(FailureReason),
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Succeeded { .. })
    }
}

/// Final status of one workflow invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReport {
    pub kind: ActionKind,
    /// Quote presented to the operator, if pricing was reached
    pub quote: Option<FeeQuote>,
    pub outcome: ActionOutcome,
}

impl ActionReport {
    fn new(kind: ActionKind, quote: Option<FeeQuote>, outcome: ActionOutcome) -> Self {
        Self {
            kind,
            quote,
            outcome,
        }
    }

    fn failed(kind: ActionKind, quote: Option<FeeQuote>, reason: FailureReason) -> Self {
        Self::new(kind, quote, ActionOutcome::Failed(reason))
    }

    /// Operator-facing summary
    pub fn summary(&self) -> String {
        let kind = self.kind;
        match &self.outcome {
            ActionOutcome::Succeeded { tx_hash, block } => match block {
                Some(block) => format!("{} confirmed: {:?} in {}", kind, tx_hash, block),
                None => format!("{} confirmed: {:?}", kind, tx_hash),
            },
            ActionOutcome::Failed(reason) => match reason {
                FailureReason::StrategyUnset => {
                    format!("{} skipped: select a strategy first.", kind)
                }
                FailureReason::ZeroBalance => {
                    format!("{} skipped: the contract balance is zero.", kind)
                }
                FailureReason::CancelledByOperator => {
                    format!("{} cancelled. No transaction was sent.", kind)
                }
                FailureReason::Rejected { reason } => format!(
                    "{} rejected: {}",
                    kind,
                    reason.as_deref().unwrap_or("no reason given")
                ),
                FailureReason::Reverted { tx_hash, block } => match block {
                    Some(block) => format!("{} reverted: {:?} in {}", kind, tx_hash, block),
                    None => format!("{} reverted: {:?}", kind, tx_hash),
                },
                FailureReason::ConfirmationLost { tx_hash, detail } => format!(
                    "{} outcome UNKNOWN: transaction {:?} was broadcast but its inclusion \
                     could not be observed ({}). It may still execute. Verify it on a block \
                     explorer before trying again.",
                    kind, tx_hash, detail
                ),
            },
        }
    }
}

/// Drives one action at a time through its stages
pub struct TransactionWorkflow {
    estimator: FeeEstimator,
    stage: Stage,
    /// Stages visited by the most recent invocation
    trace: Vec<Stage>,
    /// Hash broadcast by the most recent invocation, if it got that far
    broadcast: Option<H256>,
}

impl TransactionWorkflow {
    pub fn new(estimator: FeeEstimator) -> Self {
        Self {
            estimator,
            stage: Stage::Idle,
            trace: Vec::new(),
            broadcast: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn last_trace(&self) -> &[Stage] {
        &self.trace
    }

    pub fn last_broadcast(&self) -> Option<H256> {
        self.broadcast
    }

    /// Run one action to a final status
    pub async fn run(
        &mut self,
        kind: ActionKind,
        ctx: &SessionContext,
        gate: &mut dyn ConfirmationGate,
    ) -> ConsoleResult<ActionReport> {
        self.trace.clear();
        self.broadcast = None;
        let result = self.drive(kind, ctx, gate).await;

        let terminal = match &result {
            Ok(report) if report.outcome.is_success() => Stage::Succeeded,
            _ => Stage::Failed,
        };
        self.enter(kind, terminal);

        match &result {
            Ok(report) => match &report.outcome {
                ActionOutcome::Succeeded { tx_hash, .. } => {
                    info!("{} succeeded: {:?}", kind, tx_hash)
                }
                ActionOutcome::Failed(reason) if reason.is_informational() => {
                    info!("{} stopped: {:?}", kind, reason)
                }
                ActionOutcome::Failed(reason) => warn!("{} failed: {:?}", kind, reason),
            },
            Err(e) => match self.broadcast {
                Some(tx_hash) => warn!(
                    "{} aborted after broadcasting {:?}, outcome unknown: {}",
                    kind, tx_hash, e
                ),
                None => warn!("{} aborted: {}", kind, e),
            },
        }

        self.stage = Stage::Idle;
        result
    }

    async fn drive(
        &mut self,
        kind: ActionKind,
        ctx: &SessionContext,
        gate: &mut dyn ConfirmationGate,
    ) -> ConsoleResult<ActionReport> {
        if let Some(reason) = self.guard(kind, ctx).await? {
            return Ok(ActionReport::failed(kind, None, reason));
        }

        self.enter(kind, Stage::Pricing);
        let quote = self.estimator.quote(ctx.client.as_ref(), kind).await?;

        self.enter(kind, Stage::AwaitingConfirmation);
        let preview = format!("{}\n{}", kind.consequence(), quote.render());
        if !gate.confirm(&preview).await? {
            return Ok(ActionReport::failed(
                kind,
                Some(quote),
                FailureReason::CancelledByOperator,
            ));
        }

        self.enter(kind, Stage::Submitting);
        let params = SubmitParams {
            gas_limit: quote.gas_limit,
            price: quote.price,
            value: U256::zero(),
        };
        let operation = kind.operation(&ctx.operations);
        let pending = match ctx.client.submit(operation, Vec::new(), params).await {
            Ok(pending) => pending,
            Err(ConsoleError::RemoteRejection { reason }) => {
                return Ok(ActionReport::failed(
                    kind,
                    Some(quote),
                    FailureReason::Rejected { reason },
                ));
            }
            Err(e) => return Err(e),
        };
        let tx_hash = pending.hash;
        self.broadcast = Some(tx_hash);
        info!("{} broadcast: {:?}", kind, tx_hash);

        gate.announce(&format!(
            "Transaction submitted: {:?}\nWaiting for inclusion...",
            tx_hash
        ))
        .await?;

        self.enter(kind, Stage::AwaitingInclusion);
        let outcome = match ctx.client.await_confirmation(&pending).await {
            Ok(inclusion) => {
                let done = pending.resolve(inclusion.status);
                match done.status {
                    SubmissionStatus::Confirmed => ActionOutcome::Succeeded {
                        tx_hash,
                        block: inclusion.block,
                    },
                    _ => ActionOutcome::Failed(FailureReason::Reverted {
                        tx_hash,
                        block: inclusion.block,
                    }),
                }
            }
            Err(e) => ActionOutcome::Failed(FailureReason::ConfirmationLost {
                tx_hash,
                detail: e.to_string(),
            }),
        };

        Ok(ActionReport::new(kind, Some(quote), outcome))
    }

    /// Fast-fail checks. Deactivation has none.
    async fn guard(
        &mut self,
        kind: ActionKind,
        ctx: &SessionContext,
    ) -> ConsoleResult<Option<FailureReason>> {
        if kind == ActionKind::Deactivate {
            return Ok(None);
        }

        self.enter(kind, Stage::Guarding);
        if kind == ActionKind::Activate && !ctx.strategy.is_set() {
            return Ok(Some(FailureReason::StrategyUnset));
        }
        if ctx.contract_balance().await?.is_zero() {
            return Ok(Some(FailureReason::ZeroBalance));
        }
        Ok(None)
    }

    fn enter(&mut self, kind: ActionKind, stage: Stage) {
        debug!("{}: {:?} -> {:?}", kind, self.stage, stage);
        self.stage = stage;
        self.trace.push(stage);
    }
}
