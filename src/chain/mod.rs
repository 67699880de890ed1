//! Chain module - the console's capability over a remote node
//!
//! This module provides:
//! - The `ChainClient` trait the transaction workflow is written against
//! - An ethers-backed implementation over HTTP JSON-RPC
//! - Contract interface loading and operation descriptors

pub mod contract;
pub mod provider;

pub use contract::{ContractInterface, ContractReference};
pub use provider::EthersChainClient;

use crate::error::ConsoleResult;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::abi::Token;
use ethers::types::{Address, H256, U256};
use std::fmt;

/// Pricing data as reported by the node. Either field is absent when the node
/// does not report it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeParameters {
    pub legacy_price: Option<U256>,
    pub priority_price: Option<U256>,
}

/// Unit gas price chosen for a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitPrice {
    /// Priority fee per gas on a fee-market transaction
    Priority(U256),
    /// Single gas price on a legacy transaction
    Legacy(U256),
}

impl UnitPrice {
    pub fn value(&self) -> U256 {
        match self {
            UnitPrice::Priority(price) | UnitPrice::Legacy(price) => *price,
        }
    }
}

/// Parameters for a state-changing submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitParams {
    pub gas_limit: U256,
    /// `None` leaves pricing to the node
    pub price: Option<UnitPrice>,
    pub value: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Handle to an in-flight transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    pub hash: H256,
    pub submitted_at: DateTime<Utc>,
    pub status: SubmissionStatus,
}

impl PendingSubmission {
    pub fn new(hash: H256) -> Self {
        Self {
            hash,
            submitted_at: Utc::now(),
            status: SubmissionStatus::Pending,
        }
    }

    /// Move to a final status. Consumes the handle so it can only happen once.
    pub fn resolve(self, status: SubmissionStatus) -> Self {
        debug_assert_eq!(self.status, SubmissionStatus::Pending);
        Self { status, ..self }
    }
}

/// Block in which a submission was included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub number: u64,
    pub gas_used: Option<U256>,
}

impl fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.gas_used {
            Some(gas) => write!(f, "block {} (gas used {})", self.number, gas),
            None => write!(f, "block {}", self.number),
        }
    }
}

/// Result of waiting for inclusion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InclusionReport {
    pub status: SubmissionStatus,
    pub block: Option<BlockInfo>,
}

/// Capability over the remote node. No operation retries internally.
///
/// Failures are `ConsoleError::Transport` when the node could not be reached
/// or answered nonsense, and `ConsoleError::RemoteRejection` when it refused
/// the request.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Address of the signing identity
    fn signer_address(&self) -> Address;

    /// Address of the managed contract
    fn contract_address(&self) -> Address;

    async fn read_balance(&self, address: Address) -> ConsoleResult<U256>;

    async fn read_fee_parameters(&self) -> ConsoleResult<FeeParameters>;

    /// Invoke a read-only contract operation
    async fn call(&self, operation: &str, args: Vec<Token>) -> ConsoleResult<Vec<Token>>;

    /// Sign and broadcast a state-changing contract operation
    async fn submit(
        &self,
        operation: &str,
        args: Vec<Token>,
        params: SubmitParams,
    ) -> ConsoleResult<PendingSubmission>;

    /// Block until the submission is included. Has no timeout.
    async fn await_confirmation(
        &self,
        pending: &PendingSubmission,
    ) -> ConsoleResult<InclusionReport>;
}
