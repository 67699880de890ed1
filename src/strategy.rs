//! Operating strategies
//!
//! A strategy is an operator-facing policy record. Selecting one has no
//! on-chain effect; activation only requires that some strategy is set.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Light,
    Medium,
    Aggressive,
}

/// Fixed descriptive parameters of a strategy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyProfile {
    /// Number of assets monitored
    pub asset_universe: u32,
    /// Maximum tolerated slippage in percent
    pub slippage_ceiling_pct: f64,
    pub risk: &'static str,
    pub profit: &'static str,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Light, Strategy::Medium, Strategy::Aggressive];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Light => "Light",
            Strategy::Medium => "Medium",
            Strategy::Aggressive => "Aggressive",
        }
    }

    pub fn profile(&self) -> StrategyProfile {
        match self {
            Strategy::Light => StrategyProfile {
                asset_universe: 50,
                slippage_ceiling_pct: 0.5,
                risk: "Low",
                profit: "Low",
            },
            Strategy::Medium => StrategyProfile {
                asset_universe: 150,
                slippage_ceiling_pct: 1.0,
                risk: "Moderate",
                profit: "Moderate",
            },
            Strategy::Aggressive => StrategyProfile {
                asset_universe: 300,
                slippage_ceiling_pct: 3.0,
                risk: "High",
                profit: "High",
            },
        }
    }

    /// One-line summary for menus
    pub fn describe(&self) -> String {
        let p = self.profile();
        format!(
            "{:<10} {} assets, max slippage {:.1}%, risk {}, profit {}",
            self.name(),
            p.asset_universe,
            p.slippage_ceiling_pct,
            p.risk,
            p.profit
        )
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Session-scoped strategy selection. Starts unset.
#[derive(Debug, Clone, Default)]
pub struct StrategySelector {
    current: Option<Strategy>,
}

impl StrategySelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a strategy, overwriting any previous choice
    pub fn select(&mut self, strategy: Strategy) -> Option<Strategy> {
        let previous = self.current.replace(strategy);
        tracing::info!(
            "Strategy set to {} (was {})",
            strategy,
            previous.map(|s| s.name()).unwrap_or("unset")
        );
        previous
    }

    pub fn current(&self) -> Option<Strategy> {
        self.current
    }

    pub fn is_set(&self) -> bool {
        self.current.is_some()
    }
}
