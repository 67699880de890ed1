//! Chain client backed by an ethers HTTP provider and a local signing key

use super::{
    BlockInfo, ChainClient, ContractReference, FeeParameters, InclusionReport, PendingSubmission,
    SubmissionStatus, SubmitParams, UnitPrice,
};
use crate::config::NodeConfig;
use crate::error::{ConsoleError, ConsoleResult};

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::prelude::*;
use ethers::providers::MiddlewareError;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::time::Duration;
use tracing::{debug, info, warn};

type SigningClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// The session's single connection to the node, holding the signing identity
pub struct EthersChainClient {
    /// Signing middleware over the HTTP provider
    client: SigningClient,
    /// Managed contract
    contract: ContractReference,
    /// Node configuration
    config: NodeConfig,
}

impl EthersChainClient {
    /// Connect to the node and bind the wallet to its chain id
    pub async fn connect(
        config: NodeConfig,
        wallet: LocalWallet,
        contract: ContractReference,
    ) -> ConsoleResult<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| {
                ConsoleError::Config(format!("Invalid RPC url {}: {}", config.rpc_url, e))
            })?
            .interval(Duration::from_millis(config.poll_interval_ms));

        let chain_id = provider
            .get_chainid()
            .await
            .map_err(classify_provider_error)?
            .as_u64();

        let wallet = wallet.with_chain_id(chain_id);
        info!(
            "Connected to chain {} via {} as {:?}",
            chain_id,
            config.rpc_url,
            wallet.address()
        );

        Ok(Self {
            client: SignerMiddleware::new(provider, wallet),
            contract,
            config,
        })
    }

    fn provider(&self) -> &Provider<Http> {
        self.client.inner()
    }

    async fn latest_base_fee(&self) -> ConsoleResult<Option<U256>> {
        let block = self
            .provider()
            .get_block(BlockNumber::Latest)
            .await
            .map_err(classify_provider_error)?;
        Ok(block.and_then(|b| b.base_fee_per_gas))
    }

    fn encode(&self, operation: &str, args: &[Token]) -> ConsoleResult<Bytes> {
        let function = self.contract.function(operation)?;
        function
            .encode_input(args)
            .map(Bytes::from)
            .map_err(|e| {
                ConsoleError::Config(format!("Cannot encode arguments for {}: {}", operation, e))
            })
    }
}

#[async_trait]
impl ChainClient for EthersChainClient {
    fn signer_address(&self) -> Address {
        self.client.address()
    }

    fn contract_address(&self) -> Address {
        self.contract.address
    }

    async fn read_balance(&self, address: Address) -> ConsoleResult<U256> {
        self.provider()
            .get_balance(address, None)
            .await
            .map_err(classify_provider_error)
    }

    async fn read_fee_parameters(&self) -> ConsoleResult<FeeParameters> {
        let legacy_price = optional_price("eth_gasPrice", self.provider().get_gas_price().await)?;
        let priority_price = optional_price(
            "eth_maxPriorityFeePerGas",
            self.provider()
                .request::<_, U256>("eth_maxPriorityFeePerGas", ())
                .await,
        )?;

        let params = FeeParameters {
            legacy_price,
            priority_price,
        };
        debug!("Fee parameters from node: {:?}", params);
        Ok(params)
    }

    async fn call(&self, operation: &str, args: Vec<Token>) -> ConsoleResult<Vec<Token>> {
        let data = self.encode(operation, &args)?;
        let tx: TypedTransaction = TransactionRequest::new()
            .from(self.signer_address())
            .to(self.contract.address)
            .data(data)
            .into();

        let output = self
            .provider()
            .call(&tx, None)
            .await
            .map_err(classify_provider_error)?;

        self.contract
            .function(operation)?
            .decode_output(&output)
            .map_err(|e| {
                ConsoleError::Transport(format!("Malformed result from {}: {}", operation, e))
            })
    }

    async fn submit(
        &self,
        operation: &str,
        args: Vec<Token>,
        params: SubmitParams,
    ) -> ConsoleResult<PendingSubmission> {
        let data = self.encode(operation, &args)?;
        let base_fee = match params.price {
            Some(UnitPrice::Priority(_)) => self.latest_base_fee().await?,
            _ => None,
        };
        let tx = build_transaction(
            self.signer_address(),
            self.contract.address,
            data,
            &params,
            base_fee,
        );

        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(classify_middleware_error)?;

        let hash = pending.tx_hash();
        info!(
            "Transaction sent: {:?} ({} with gas limit {})",
            hash, operation, params.gas_limit
        );
        Ok(PendingSubmission::new(hash))
    }

    async fn await_confirmation(
        &self,
        pending: &PendingSubmission,
    ) -> ConsoleResult<InclusionReport> {
        let watcher = PendingTransaction::new(pending.hash, self.provider())
            .interval(Duration::from_millis(self.config.poll_interval_ms))
            .confirmations(self.config.confirmations);

        match watcher.await {
            Ok(Some(receipt)) => {
                // Pre-byzantium receipts carry no status field
                let succeeded = receipt.status.map(|s| s.as_u64() == 1).unwrap_or(true);
                let block = receipt.block_number.map(|number| BlockInfo {
                    number: number.as_u64(),
                    gas_used: receipt.gas_used,
                });
                Ok(InclusionReport {
                    status: if succeeded {
                        SubmissionStatus::Confirmed
                    } else {
                        SubmissionStatus::Failed
                    },
                    block,
                })
            }
            Ok(None) => {
                warn!("Transaction {:?} dropped before inclusion", pending.hash);
                Err(ConsoleError::Transport(format!(
                    "Transaction {:?} was dropped from the mempool",
                    pending.hash
                )))
            }
            Err(e) => Err(ConsoleError::Transport(e.to_string())),
        }
    }
}

/// Build a typed transaction carrying the quote's price, if any
fn build_transaction(
    from: Address,
    to: Address,
    data: Bytes,
    params: &SubmitParams,
    base_fee: Option<U256>,
) -> TypedTransaction {
    match params.price {
        Some(UnitPrice::Priority(priority)) => Eip1559TransactionRequest::new()
            .from(from)
            .to(to)
            .data(data)
            .value(params.value)
            .gas(params.gas_limit)
            .max_priority_fee_per_gas(priority)
            .max_fee_per_gas(fee_cap(priority, base_fee))
            .into(),
        Some(UnitPrice::Legacy(price)) => TransactionRequest::new()
            .from(from)
            .to(to)
            .data(data)
            .value(params.value)
            .gas(params.gas_limit)
            .gas_price(price)
            .into(),
        None => TransactionRequest::new()
            .from(from)
            .to(to)
            .data(data)
            .value(params.value)
            .gas(params.gas_limit)
            .into(),
    }
}

/// Twice the latest base fee plus the tip, so the cap is never below the tip
fn fee_cap(priority: U256, base_fee: Option<U256>) -> U256 {
    base_fee
        .unwrap_or_default()
        .saturating_mul(U256::from(2u64))
        .saturating_add(priority)
}

/// A JSON-RPC error response means the node refused; anything else is transport
fn classify_provider_error(err: ProviderError) -> ConsoleError {
    classify_middleware_error(err)
}

fn classify_middleware_error<E: MiddlewareError>(err: E) -> ConsoleError {
    match err.as_error_response() {
        Some(response) => ConsoleError::rejection(response.message.clone()),
        None => ConsoleError::Transport(err.to_string()),
    }
}

/// Nodes that do not implement a pricing method answer with an error
/// response; that makes the field absent rather than failing the read.
fn optional_price(
    method: &str,
    result: Result<U256, ProviderError>,
) -> ConsoleResult<Option<U256>> {
    match result {
        Ok(price) => Ok(Some(price)),
        Err(err) => match MiddlewareError::as_error_response(&err) {
            Some(response) => {
                debug!("Node does not report {}: {}", method, response.message);
                Ok(None)
            }
            None => Err(ConsoleError::Transport(err.to_string())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::providers::{HttpClientError, JsonRpcError};

    fn rpc_error(message: &str) -> ProviderError {
        ProviderError::JsonRpcClientError(Box::new(HttpClientError::JsonRpcError(
            JsonRpcError {
                code: -32601,
                message: message.to_string(),
                data: None,
            },
        )))
    }

    fn params(price: Option<UnitPrice>) -> SubmitParams {
        SubmitParams {
            gas_limit: U256::from(300_000u64),
            price,
            value: U256::zero(),
        }
    }

    #[test]
    fn test_priority_price_builds_fee_market_tx() {
        let tx = build_transaction(
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            Bytes::from(vec![0xbe, 0x9a, 0x65, 0x55]),
            &params(Some(UnitPrice::Priority(U256::from(2_000_000_000u64)))),
            Some(U256::from(10_000_000_000u64)),
        );

        match tx {
            TypedTransaction::Eip1559(inner) => {
                assert_eq!(
                    inner.max_priority_fee_per_gas,
                    Some(U256::from(2_000_000_000u64))
                );
                assert_eq!(inner.max_fee_per_gas, Some(U256::from(22_000_000_000u64)));
                assert_eq!(inner.gas, Some(U256::from(300_000u64)));
            }
            other => panic!("expected EIP-1559 transaction, got {:?}", other),
        }
    }

    #[test]
    fn test_legacy_price_builds_legacy_tx() {
        let tx = build_transaction(
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            Bytes::default(),
            &params(Some(UnitPrice::Legacy(U256::from(30_000_000_000u64)))),
            None,
        );

        assert!(matches!(tx, TypedTransaction::Legacy(_)));
        assert_eq!(tx.gas_price(), Some(U256::from(30_000_000_000u64)));
        assert_eq!(tx.gas(), Some(&U256::from(300_000u64)));
    }

    #[test]
    fn test_absent_price_leaves_pricing_to_node() {
        let tx = build_transaction(
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            Bytes::default(),
            &params(None),
            None,
        );

        assert!(matches!(tx, TypedTransaction::Legacy(_)));
        assert_eq!(tx.gas_price(), None);
        assert_eq!(tx.gas(), Some(&U256::from(300_000u64)));
    }

    #[test]
    fn test_fee_cap_never_below_priority_price() {
        let priority = U256::from(3_000_000_000u64);
        assert_eq!(fee_cap(priority, None), priority);
        assert_eq!(fee_cap(priority, Some(U256::zero())), priority);
        assert_eq!(
            fee_cap(priority, Some(U256::from(1_000_000_000u64))),
            U256::from(5_000_000_000u64)
        );
        assert_eq!(fee_cap(priority, Some(U256::MAX)), U256::MAX);

        let tx = build_transaction(
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            Bytes::default(),
            &params(Some(UnitPrice::Priority(priority))),
            None,
        );
        match tx {
            TypedTransaction::Eip1559(inner) => {
                assert!(inner.max_fee_per_gas >= inner.max_priority_fee_per_gas);
                assert_eq!(inner.max_fee_per_gas, Some(priority));
            }
            other => panic!("expected EIP-1559 transaction, got {:?}", other),
        }
    }

    #[test]
    fn test_error_response_is_rejection() {
        let err = classify_provider_error(rpc_error("execution reverted: not owner"));
        match err {
            ConsoleError::RemoteRejection { reason } => {
                assert_eq!(reason.as_deref(), Some("execution reverted: not owner"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_other_provider_errors_are_transport() {
        let err = classify_provider_error(ProviderError::CustomError(
            "connection refused".to_string(),
        ));
        assert!(matches!(err, ConsoleError::Transport(_)));
    }

    #[test]
    fn test_unsupported_pricing_method_is_absent() {
        let price = optional_price("eth_maxPriorityFeePerGas", Err(rpc_error("method not found")))
            .unwrap();
        assert_eq!(price, None);

        let price = optional_price("eth_gasPrice", Ok(U256::from(7u64))).unwrap();
        assert_eq!(price, Some(U256::from(7u64)));

        let err = optional_price(
            "eth_gasPrice",
            Err(ProviderError::CustomError("timed out".to_string())),
        )
        .unwrap_err();
        assert!(matches!(err, ConsoleError::Transport(_)));
    }
}
