//! Menu identifiers, choice parsing and rendering
//!
//! Parsing is kept free of I/O so menu transitions can be tested directly.

use super::BalanceSnapshot;
use crate::feed::AssetQuote;
use crate::strategy::Strategy;
use crate::tx::ActionKind;

use ethers::types::{Address, U256};
use ethers::utils::format_ether;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuId {
    Main,
    Strategy,
    Quotes,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainChoice {
    Action(ActionKind),
    SelectStrategy,
    RefreshInfo,
    Quotes,
    Instructions,
    Exit,
}

impl MainChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MainChoice::Action(ActionKind::Activate)),
            "2" => Some(MainChoice::Action(ActionKind::Deactivate)),
            "3" => Some(MainChoice::Action(ActionKind::Withdraw)),
            "4" => Some(MainChoice::SelectStrategy),
            "5" => Some(MainChoice::RefreshInfo),
            "6" => Some(MainChoice::Quotes),
            "7" => Some(MainChoice::Instructions),
            "8" => Some(MainChoice::Exit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyChoice {
    Select(Strategy),
    Back,
}

impl StrategyChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(StrategyChoice::Select(Strategy::Light)),
            "2" => Some(StrategyChoice::Select(Strategy::Medium)),
            "3" => Some(StrategyChoice::Select(Strategy::Aggressive)),
            "4" => Some(StrategyChoice::Back),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotesChoice {
    Refresh,
    Back,
}

impl QuotesChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(QuotesChoice::Refresh),
            "2" => Some(QuotesChoice::Back),
            _ => None,
        }
    }
}

pub const MAIN_MENU: &str = "\
 1) Activate
 2) Deactivate
 3) Withdraw
 4) Select strategy
 5) Refresh info
 6) Market quotes
 7) Instructions
 8) Exit
> ";

pub const QUOTES_MENU: &str = "\
 1) Refresh
 2) Back
> ";

pub const INSTRUCTIONS: &str = "\
How to operate the contract:
 1. Fund the contract address shown in the header from your wallet.
 2. Pick a strategy (menu 4). It is a record of intent only and is not sent on-chain.
 3. Activate (menu 1). Activation needs a strategy and a non-zero contract balance.
 4. Deactivate (menu 2) at any time to stop the contract.
 5. Withdraw (menu 3) moves the contract balance back to the signing address.
Every transaction shows its gas ceiling and maximum cost and waits for 'y' before it
is sent. If the console loses track of a sent transaction it prints the hash; check it
on a block explorer before trying again.";

pub fn render_strategy_menu(current: Option<Strategy>) -> String {
    let mut out = String::new();
    for (i, strategy) in Strategy::ALL.iter().enumerate() {
        let marker = if current == Some(*strategy) { "*" } else { " " };
        let _ = writeln!(out, "{}{}) {}", marker, i + 1, strategy.describe());
    }
    out.push_str(" 4) Back\n> ");
    out
}

fn amount(value: Option<U256>) -> String {
    value
        .map(|v| format!("{} ETH", format_ether(v)))
        .unwrap_or_else(|| "unavailable".to_string())
}

/// Status block shown above the main menu
pub fn render_header(
    signer: Address,
    contract: Address,
    snapshot: &BalanceSnapshot,
    strategy: Option<Strategy>,
) -> String {
    format!(
        "\n==== Operator Console ====\n\
         Signer:            {:?}\n\
         Contract:          {:?}\n\
         Contract balance:  {}\n\
         Signer balance:    {}\n\
         Strategy:          {}\n",
        signer,
        contract,
        amount(snapshot.contract),
        amount(snapshot.signer),
        strategy.map(|s| s.name()).unwrap_or("not selected"),
    )
}

pub fn render_quotes(assets: &[AssetQuote], currency: &str) -> String {
    let mut out = format!(
        "{:>4}  {:<8} {:<20} {:>16} {:>9}\n",
        "#",
        "Symbol",
        "Name",
        format!("Price ({})", currency.to_uppercase()),
        "24h"
    );
    for asset in assets {
        let rank = asset
            .rank
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());
        let price = asset
            .price
            .map(|p| format!("{:.4}", p))
            .unwrap_or_else(|| "n/a".to_string());
        let change = asset
            .change_24h_pct
            .map(|c| format!("{:+.2}%", c))
            .unwrap_or_else(|| "n/a".to_string());
        let _ = writeln!(
            out,
            "{:>4}  {:<8} {:<20} {:>16} {:>9}",
            rank,
            asset.symbol.to_uppercase(),
            asset.name,
            price,
            change
        );
    }
    out
}
