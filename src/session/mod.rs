//! Operator session: shared context and the menu loop
//!
//! The loop is single-threaded and awaits exactly one operation at a time.
//! Each menu is a state; `dispatch` maps a raw input line to the next state.

pub mod console;
pub mod menu;

pub use console::{Console, StdConsole};
pub use menu::MenuId;

use crate::chain::ChainClient;
use crate::config::OperationNames;
use crate::error::{ConsoleError, ConsoleResult};
use crate::feed::PriceFeed;
use crate::strategy::StrategySelector;
use crate::tx::{ActionKind, ActionOutcome, ConfirmationGate, TransactionWorkflow};

use ethers::types::U256;
use menu::{MainChoice, QuotesChoice, StrategyChoice};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{info, warn};

/// Session-wide state handed to the workflow
pub struct SessionContext {
    /// Node connection holding the signing identity
    pub client: Box<dyn ChainClient>,
    pub operations: OperationNames,
    pub strategy: StrategySelector,
}

/// Balances read for display only. `None` when the read failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub contract: Option<U256>,
    pub signer: Option<U256>,
}

impl SessionContext {
    pub fn new(client: Box<dyn ChainClient>, operations: OperationNames) -> Self {
        Self {
            client,
            operations,
            strategy: StrategySelector::new(),
        }
    }

    /// Contract balance, from the configured read-only operation or the
    /// native balance of the contract address
    pub async fn contract_balance(&self) -> ConsoleResult<U256> {
        match &self.operations.balance {
            Some(operation) => self
                .client
                .call(operation, Vec::new())
                .await?
                .into_iter()
                .next()
                .and_then(|token| token.into_uint())
                .ok_or_else(|| {
                    ConsoleError::Transport(format!("{} did not return an amount", operation))
                }),
            None => {
                self.client
                    .read_balance(self.client.contract_address())
                    .await
            }
        }
    }

    /// Read both balances independently
    pub async fn snapshot(&self) -> BalanceSnapshot {
        let contract = match self.contract_balance().await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!("Failed to read contract balance: {}", e);
                None
            }
        };
        let signer = match self.client.read_balance(self.client.signer_address()).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!("Failed to read signer balance: {}", e);
                None
            }
        };
        BalanceSnapshot { contract, signer }
    }
}

/// The interactive menu loop
pub struct Session<R, W> {
    ctx: SessionContext,
    workflow: TransactionWorkflow,
    feed: Box<dyn PriceFeed>,
    currency: String,
    console: Console<R, W>,
}

impl<R, W> Session<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(
        ctx: SessionContext,
        workflow: TransactionWorkflow,
        feed: Box<dyn PriceFeed>,
        currency: impl Into<String>,
        console: Console<R, W>,
    ) -> Self {
        Self {
            ctx,
            workflow,
            feed,
            currency: currency.into(),
            console,
        }
    }

    /// Run until the operator exits or input ends
    pub async fn run(&mut self) -> ConsoleResult<()> {
        let mut menu = MenuId::Main;
        while menu != MenuId::Exit {
            let prompt = self.render(menu).await;
            let Some(input) = self.console.prompt(&prompt).await? else {
                info!("End of operator input");
                break;
            };
            menu = self.dispatch(menu, &input).await?;
        }
        self.console.writeln("Goodbye.").await?;
        Ok(())
    }

    /// Handle one input line in the given menu and return the next menu.
    /// Recoverable failures are reported and keep the current menu.
    pub async fn dispatch(&mut self, menu: MenuId, input: &str) -> ConsoleResult<MenuId> {
        match self.handle(menu, input).await {
            Ok(next) => Ok(next),
            Err(e) if e.is_recoverable() => {
                warn!("Operation failed in {:?} menu: {}", menu, e);
                self.console.writeln(&format!("Error: {}", e)).await?;
                Ok(menu)
            }
            Err(e) => Err(e),
        }
    }

    async fn render(&self, menu: MenuId) -> String {
        match menu {
            MenuId::Main => {
                let snapshot = self.ctx.snapshot().await;
                let header = menu::render_header(
                    self.ctx.client.signer_address(),
                    self.ctx.client.contract_address(),
                    &snapshot,
                    self.ctx.strategy.current(),
                );
                format!("{}\n{}", header, menu::MAIN_MENU)
            }
            MenuId::Strategy => format!(
                "\nSelect a strategy:\n{}",
                menu::render_strategy_menu(self.ctx.strategy.current())
            ),
            MenuId::Quotes => format!("\n{}", menu::QUOTES_MENU),
            MenuId::Exit => String::new(),
        }
    }

    async fn handle(&mut self, menu: MenuId, input: &str) -> ConsoleResult<MenuId> {
        match menu {
            MenuId::Main => match MainChoice::parse(input) {
                Some(MainChoice::Action(kind)) => {
                    self.run_action(kind).await?;
                    Ok(MenuId::Main)
                }
                Some(MainChoice::SelectStrategy) => Ok(MenuId::Strategy),
                Some(MainChoice::RefreshInfo) => {
                    self.console.writeln("Refreshing...").await?;
                    Ok(MenuId::Main)
                }
                Some(MainChoice::Quotes) => {
                    self.show_quotes().await?;
                    Ok(MenuId::Quotes)
                }
                Some(MainChoice::Instructions) => {
                    self.console.writeln(menu::INSTRUCTIONS).await?;
                    Ok(MenuId::Main)
                }
                Some(MainChoice::Exit) => Ok(MenuId::Exit),
                None => self.invalid(MenuId::Main).await,
            },
            MenuId::Strategy => match StrategyChoice::parse(input) {
                Some(StrategyChoice::Select(strategy)) => {
                    self.ctx.strategy.select(strategy);
                    self.console
                        .writeln(&format!("Strategy set: {}", strategy.describe()))
                        .await?;
                    Ok(MenuId::Main)
                }
                Some(StrategyChoice::Back) => Ok(MenuId::Main),
                None => self.invalid(MenuId::Strategy).await,
            },
            MenuId::Quotes => match QuotesChoice::parse(input) {
                Some(QuotesChoice::Refresh) => {
                    self.show_quotes().await?;
                    Ok(MenuId::Quotes)
                }
                Some(QuotesChoice::Back) => Ok(MenuId::Main),
                None => self.invalid(MenuId::Quotes).await,
            },
            MenuId::Exit => Ok(MenuId::Exit),
        }
    }

    async fn invalid(&mut self, menu: MenuId) -> ConsoleResult<MenuId> {
        self.console.writeln("Invalid choice.").await?;
        Ok(menu)
    }

    async fn run_action(&mut self, kind: ActionKind) -> ConsoleResult<()> {
        let report = self
            .workflow
            .run(kind, &self.ctx, &mut self.console as &mut dyn ConfirmationGate)
            .await?;

        if let ActionOutcome::Failed(reason) = &report.outcome {
            if let Some(tx_hash) = reason.tx_hash() {
                warn!("{} did not succeed, transaction {:?}", kind, tx_hash);
            }
        }
        self.console.writeln(&report.summary()).await
    }

    async fn show_quotes(&mut self) -> ConsoleResult<()> {
        let text = match self.feed.top_assets().await {
            Ok(assets) => menu::render_quotes(&assets, &self.currency),
            Err(ConsoleError::FeedUnreachable(detail)) => {
                format!("Price feed is unreachable, try again later ({}).", detail)
            }
            Err(ConsoleError::FeedMalformed(detail)) => {
                format!("Price feed returned data that could not be read ({}).", detail)
            }
            Err(e) => return Err(e),
        };
        self.console.writeln(&text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::contract::tests::SAMPLE_INTERFACE;
    use crate::chain::{ContractInterface, FeeParameters, MockChainClient};
    use crate::config::GasConfig;
    use crate::feed::{AssetQuote, MockPriceFeed};
    use crate::strategy::Strategy;
    use crate::tx::FeeEstimator;
    use ethers::abi::Token;
    use ethers::types::Address;

    type TestSession = Session<&'static [u8], Vec<u8>>;

    fn signer() -> Address {
        Address::repeat_byte(0x51)
    }

    fn contract() -> Address {
        Address::repeat_byte(0xc0)
    }

    fn client(contract_balance: u64) -> MockChainClient {
        let mut client = MockChainClient::new();
        client.expect_signer_address().return_const(signer());
        client.expect_contract_address().return_const(contract());
        client.expect_read_balance().returning(move |address| {
            if address == contract() {
                Ok(U256::from(contract_balance))
            } else {
                Ok(U256::exp10(18))
            }
        });
        client
    }

    fn session(client: MockChainClient, feed: MockPriceFeed, input: &'static [u8]) -> TestSession {
        Session::new(
            SessionContext::new(Box::new(client), OperationNames::default()),
            TransactionWorkflow::new(FeeEstimator::new(GasConfig::default())),
            Box::new(feed),
            "usd",
            Console::new(input, Vec::new()),
        )
    }

    fn output(session: &TestSession) -> String {
        session.console.output()
    }

    #[tokio::test]
    async fn test_strategy_selection_has_no_chain_effect() {
        let mut client = MockChainClient::new();
        client.expect_submit().never();
        client.expect_read_fee_parameters().never();
        let mut session = session(client, MockPriceFeed::new(), b"");

        assert_eq!(
            session.dispatch(MenuId::Main, "4").await.unwrap(),
            MenuId::Strategy
        );
        assert_eq!(
            session.dispatch(MenuId::Strategy, "1").await.unwrap(),
            MenuId::Main
        );
        assert_eq!(session.ctx.strategy.current(), Some(Strategy::Light));

        session.dispatch(MenuId::Main, "4").await.unwrap();
        session.dispatch(MenuId::Strategy, "3").await.unwrap();
        assert_eq!(session.ctx.strategy.current(), Some(Strategy::Aggressive));
        assert!(!output(&session).contains("Proceed?"));
    }

    #[tokio::test]
    async fn test_menu_transitions() {
        let mut session = session(MockChainClient::new(), MockPriceFeed::new(), b"");

        assert_eq!(session.dispatch(MenuId::Main, "9").await.unwrap(), MenuId::Main);
        assert_eq!(session.dispatch(MenuId::Main, "7").await.unwrap(), MenuId::Main);
        assert_eq!(session.dispatch(MenuId::Main, "8").await.unwrap(), MenuId::Exit);
        assert_eq!(
            session.dispatch(MenuId::Strategy, "4").await.unwrap(),
            MenuId::Main
        );
        assert_eq!(
            session.dispatch(MenuId::Strategy, "x").await.unwrap(),
            MenuId::Strategy
        );
        assert_eq!(session.dispatch(MenuId::Quotes, "2").await.unwrap(), MenuId::Main);

        let out = output(&session);
        assert!(out.contains("Invalid choice."));
        assert!(out.contains("How to operate the contract"));
    }

    #[tokio::test]
    async fn test_quotes_report_feed_failures_distinctly() {
        let mut feed = MockPriceFeed::new();
        let mut calls = 0;
        feed.expect_top_assets().times(3).returning(move || {
            calls += 1;
            match calls {
                1 => Err(ConsoleError::FeedUnreachable("dns error".to_string())),
                2 => Err(ConsoleError::FeedMalformed("expected array".to_string())),
                _ => Ok(vec![AssetQuote {
                    rank: Some(1),
                    symbol: "btc".to_string(),
                    name: "Bitcoin".to_string(),
                    price: Some(67012.0),
                    change_24h_pct: Some(-0.5),
                }]),
            }
        });
        let mut session = session(MockChainClient::new(), feed, b"");

        assert_eq!(
            session.dispatch(MenuId::Main, "6").await.unwrap(),
            MenuId::Quotes
        );
        assert_eq!(
            session.dispatch(MenuId::Quotes, "1").await.unwrap(),
            MenuId::Quotes
        );
        session.dispatch(MenuId::Quotes, "1").await.unwrap();

        let out = output(&session);
        assert!(out.contains("Price feed is unreachable"));
        assert!(out.contains("could not be read"));
        assert!(out.contains("BTC"));
    }

    #[tokio::test]
    async fn test_transport_error_is_reported_and_session_continues() {
        let mut client = MockChainClient::new();
        client.expect_contract_address().return_const(contract());
        client
            .expect_read_balance()
            .returning(|_| Err(ConsoleError::Transport("node unreachable".to_string())));
        client.expect_submit().never();
        let mut session = session(client, MockPriceFeed::new(), b"");
        session.ctx.strategy.select(Strategy::Light);

        let next = session.dispatch(MenuId::Main, "3").await.unwrap();
        assert_eq!(next, MenuId::Main);
        assert!(output(&session).contains("Error: Transport error: node unreachable"));
    }

    #[tokio::test]
    async fn test_balance_from_read_only_operation() {
        let mut client = MockChainClient::new();
        client
            .expect_call()
            .withf(|operation, args| operation.to_string() == "getBalance" && args.is_empty())
            .returning(|_, _| Ok(vec![Token::Uint(U256::from(77u64))]));
        client.expect_read_balance().never();

        let interface = ContractInterface::parse(SAMPLE_INTERFACE).unwrap();
        let operations = OperationNames {
            balance: Some("getBalance".to_string()),
            ..OperationNames::default()
        };
        interface.check_operations(&operations).unwrap();

        let ctx = SessionContext::new(Box::new(client), operations);
        assert_eq!(ctx.contract_balance().await.unwrap(), U256::from(77u64));
    }

    #[tokio::test]
    async fn test_full_session_scenario_a() {
        // Activate with no strategy, then exit
        let mut client = client(10u64.pow(18));
        client.expect_submit().never();
        let mut session = session(client, MockPriceFeed::new(), b"1\n8\n");

        session.run().await.unwrap();

        let out = output(&session);
        assert!(out.contains("Activate skipped: select a strategy first."));
        assert!(out.contains("Strategy:          not selected"));
        assert!(out.contains("Goodbye."));
        assert!(!out.contains("Proceed?"));
    }

    #[tokio::test]
    async fn test_full_session_cancelled_activation() {
        // Pick Medium, activate, decline at the gate, exit
        let mut client = client(10u64.pow(18));
        client.expect_read_fee_parameters().returning(|| {
            Ok(FeeParameters {
                legacy_price: Some(U256::from(1_000_000_000u64)),
                priority_price: None,
            })
        });
        client.expect_submit().never();
        let mut session = session(client, MockPriceFeed::new(), b"4\n2\n1\nn\n8\n");

        session.run().await.unwrap();

        let out = output(&session);
        assert!(out.contains("Strategy set: Medium"));
        assert!(out.contains("Strategy:          Medium"));
        assert!(out.contains("Proceed? [y/N]"));
        assert!(out.contains("Activate cancelled. No transaction was sent."));
    }

    #[tokio::test]
    async fn test_end_of_input_exits() {
        let mut session = session(client(0), MockPriceFeed::new(), b"");
        session.run().await.unwrap();
        assert!(output(&session).contains("Goodbye."));
    }
}
