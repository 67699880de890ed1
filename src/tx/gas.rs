//! Fee estimation for console actions

use super::ActionKind;
use crate::chain::{ChainClient, FeeParameters, UnitPrice};
use crate::config::GasConfig;
use crate::error::ConsoleResult;

use ethers::types::U256;
use ethers::utils::{format_ether, format_units};
use tracing::debug;

/// Point-in-time pricing for one action. Never reused across actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeQuote {
    pub kind: ActionKind,
    /// `None` when the node reported no pricing data
    pub price: Option<UnitPrice>,
    pub gas_limit: U256,
}

impl FeeQuote {
    /// Upper bound on the fee, when a price is known
    pub fn max_cost(&self) -> Option<U256> {
        self.price
            .map(|price| FeeEstimator::calculate_cost(self.gas_limit, price))
    }

    /// Human-readable cost preview
    pub fn render(&self) -> String {
        let price = match self.price {
            Some(UnitPrice::Priority(p)) => format!("{} gwei (priority fee)", gwei(p)),
            Some(UnitPrice::Legacy(p)) => format!("{} gwei (gas price)", gwei(p)),
            None => "unknown".to_string(),
        };
        let cost = match self.max_cost() {
            Some(cost) => format!("{} ETH", format_ether(cost)),
            None => "unknown".to_string(),
        };

        format!(
            "  Action:     {}\n  Gas limit:  {}\n  Unit price: {}\n  Max cost:   {}",
            self.kind, self.gas_limit, price, cost
        )
    }
}

fn gwei(amount: U256) -> String {
    format_units(amount, "gwei").unwrap_or_else(|_| format!("{} wei", amount))
}

/// Fee estimator using a fixed gas ceiling per action kind
pub struct FeeEstimator {
    ceilings: GasConfig,
}

impl FeeEstimator {
    pub fn new(ceilings: GasConfig) -> Self {
        Self { ceilings }
    }

    /// Fixed gas ceiling for an action kind
    pub fn gas_limit(&self, kind: ActionKind) -> U256 {
        let limit = match kind {
            ActionKind::Activate => self.ceilings.activate_limit,
            ActionKind::Deactivate => self.ceilings.deactivate_limit,
            ActionKind::Withdraw => self.ceilings.withdraw_limit,
        };
        U256::from(limit)
    }

    /// Prefer a priority fee, else a legacy price, else nothing
    pub fn select_price(params: &FeeParameters) -> Option<UnitPrice> {
        params
            .priority_price
            .map(UnitPrice::Priority)
            .or(params.legacy_price.map(UnitPrice::Legacy))
    }

    /// Read fee parameters from the node and quote the action
    pub async fn quote(
        &self,
        client: &dyn ChainClient,
        kind: ActionKind,
    ) -> ConsoleResult<FeeQuote> {
        let params = client.read_fee_parameters().await?;
        let quote = FeeQuote {
            kind,
            price: Self::select_price(&params),
            gas_limit: self.gas_limit(kind),
        };

        debug!("Fee quote for {}: {:?}", kind, quote);
        Ok(quote)
    }

    /// Calculate total cost in wei
    pub fn calculate_cost(gas_limit: U256, price: UnitPrice) -> U256 {
        gas_limit.saturating_mul(price.value())
    }
}

impl Default for FeeEstimator {
    fn default() -> Self {
        Self::new(GasConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainClient;
    use crate::error::ConsoleError;

    const GWEI: u64 = 1_000_000_000;

    fn params(legacy: Option<u64>, priority: Option<u64>) -> FeeParameters {
        FeeParameters {
            legacy_price: legacy.map(U256::from),
            priority_price: priority.map(U256::from),
        }
    }

    #[test]
    fn test_priority_price_preferred() {
        let price = FeeEstimator::select_price(&params(Some(30 * GWEI), Some(2 * GWEI)));
        assert_eq!(price, Some(UnitPrice::Priority(U256::from(2 * GWEI))));
    }

    #[test]
    fn test_legacy_price_fallback() {
        let price = FeeEstimator::select_price(&params(Some(30 * GWEI), None));
        assert_eq!(price, Some(UnitPrice::Legacy(U256::from(30 * GWEI))));
    }

    #[test]
    fn test_no_price_data() {
        assert_eq!(FeeEstimator::select_price(&params(None, None)), None);
    }

    #[test]
    fn test_gas_limit_per_kind() {
        let estimator = FeeEstimator::new(GasConfig {
            activate_limit: 300_000,
            deactivate_limit: 120_000,
            withdraw_limit: 90_000,
        });
        assert_eq!(estimator.gas_limit(ActionKind::Activate), U256::from(300_000u64));
        assert_eq!(estimator.gas_limit(ActionKind::Deactivate), U256::from(120_000u64));
        assert_eq!(estimator.gas_limit(ActionKind::Withdraw), U256::from(90_000u64));
    }

    #[test]
    fn test_render_known_price() {
        let quote = FeeQuote {
            kind: ActionKind::Activate,
            price: Some(UnitPrice::Legacy(U256::from(20 * GWEI))),
            gas_limit: U256::from(300_000u64),
        };
        assert_eq!(quote.max_cost(), Some(U256::from(6_000_000u64 * GWEI)));

        let preview = quote.render();
        assert!(preview.contains("300000"));
        assert!(preview.contains("20.000000000 gwei (gas price)"));
        assert!(preview.contains(&format_ether(U256::from(6_000_000u64 * GWEI))));
    }

    #[test]
    fn test_render_unknown_price() {
        let quote = FeeQuote {
            kind: ActionKind::Withdraw,
            price: None,
            gas_limit: U256::from(300_000u64),
        };
        assert_eq!(quote.max_cost(), None);

        let preview = quote.render();
        assert!(preview.contains("Unit price: unknown"));
        assert!(preview.contains("Max cost:   unknown"));
    }

    #[tokio::test]
    async fn test_quote_reads_node() {
        let mut client = MockChainClient::new();
        client
            .expect_read_fee_parameters()
            .times(1)
            .returning(|| Ok(params(Some(15 * GWEI), Some(GWEI))));

        let quote = FeeEstimator::default()
            .quote(&client, ActionKind::Deactivate)
            .await
            .unwrap();
        assert_eq!(quote.price, Some(UnitPrice::Priority(U256::from(GWEI))));
        assert_eq!(quote.gas_limit, U256::from(300_000u64));
    }

    #[tokio::test]
    async fn test_quote_propagates_transport_failure() {
        let mut client = MockChainClient::new();
        client
            .expect_read_fee_parameters()
            .returning(|| Err(ConsoleError::Transport("connection reset".to_string())));

        let err = FeeEstimator::default()
            .quote(&client, ActionKind::Activate)
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Transport(_)));
    }
}
