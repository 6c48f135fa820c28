//! Inbound alert payloads
//!
//! [`Alert`] is the JSON body exactly as the charting tool sent it; it is
//! what the dedup window fingerprints. [`ParsedAlert`] is the same alert
//! decoded once into typed values, so nothing downstream branches on raw
//! strings again.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::intent::Action;
use super::ledger::PositionKey;
use crate::common::errors::{Result, TradeError};
use crate::common::serde_helpers::{
    deserialize_decimal, deserialize_flexible_bool, deserialize_optional_decimal,
    deserialize_optional_u32,
};
use crate::common::types::Exchange;
use crate::exchange::symbols::unified_symbol;

/// Strategy name used when the alert does not carry one
pub const DEFAULT_STRATEGY: &str = "default";

/// Raw alert body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// e.g. "buy", "sell", "add", "buy_long", "sell_short", "update_stop"
    pub action: String,
    /// Raw instrument identifier, e.g. "BTCUSDT"
    pub symbol: String,
    /// Order quantity; ignored by `update_stop`, which uses the tracked size
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub qty: Decimal,
    /// Exchange identifier, case-insensitive
    pub exchange: String,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub stop_loss: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_u32")]
    pub leverage: Option<u32>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_bool")]
    pub partial: bool,
    /// Reference price used when the venue reports no fill price
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub price: Option<Decimal>,
    /// Target stop for `update_stop`
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub new_stop_loss: Option<Decimal>,
}

impl Alert {
    /// Strategy name with the default applied
    pub fn strategy_name(&self) -> &str {
        self.strategy
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_STRATEGY)
    }

    /// Decode and validate the alert
    pub fn parse(&self) -> Result<ParsedAlert> {
        let action: Action = self.action.parse()?;
        let exchange: Exchange = self.exchange.parse()?;

        if action != Action::UpdateStop && self.qty <= Decimal::ZERO {
            return Err(TradeError::InvalidAlert(format!(
                "qty must be positive, got {}",
                self.qty
            )));
        }

        let raw_symbol = self.symbol.trim();
        if raw_symbol.is_empty() {
            return Err(TradeError::InvalidAlert("symbol is required".to_string()));
        }

        Ok(ParsedAlert {
            action,
            raw_action: self.action.clone(),
            raw_symbol: raw_symbol.to_string(),
            symbol: unified_symbol(raw_symbol),
            quantity: self.qty,
            exchange,
            stop_loss: self.stop_loss,
            leverage: self.leverage,
            strategy: self.strategy_name().to_string(),
            partial: self.partial,
            reference_price: self.price,
            new_stop_loss: self.new_stop_loss,
        })
    }
}

/// Alert decoded into typed values
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAlert {
    pub action: Action,
    pub raw_action: String,
    pub raw_symbol: String,
    /// Unified symbol, e.g. `BTC/USDT:USDT`
    pub symbol: String,
    pub quantity: Decimal,
    pub exchange: Exchange,
    pub stop_loss: Option<Decimal>,
    pub leverage: Option<u32>,
    pub strategy: String,
    pub partial: bool,
    pub reference_price: Option<Decimal>,
    pub new_stop_loss: Option<Decimal>,
}

impl ParsedAlert {
    pub fn position_key(&self) -> PositionKey {
        PositionKey::new(self.exchange, &self.symbol, &self.strategy)
    }
}
