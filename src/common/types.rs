//! Unified types shared by the engine, gateways and HTTP layer

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::errors::TradeError;

/// Supported exchange variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Binance,
    Okx,
    Bybit,
    Gate,
    Bitget,
    Kucoin,
}

impl Exchange {
    /// Every variant, in display order
    pub const ALL: [Exchange; 6] = [
        Exchange::Binance,
        Exchange::Okx,
        Exchange::Bybit,
        Exchange::Gate,
        Exchange::Bitget,
        Exchange::Kucoin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Binance => "binance",
            Exchange::Okx => "okx",
            Exchange::Bybit => "bybit",
            Exchange::Gate => "gate",
            Exchange::Bitget => "bitget",
            Exchange::Kucoin => "kucoin",
        }
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Exchange::ALL
            .into_iter()
            .find(|exchange| exchange.as_str() == normalized)
            .ok_or_else(|| TradeError::Configuration(format!("unsupported exchange: {}", s)))
    }
}

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Which exposure an order targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionType {
    Long,
    Short,
}

impl PositionType {
    /// Side of the order that opens or adds to this exposure
    pub fn opening_side(&self) -> Side {
        match self {
            PositionType::Long => Side::Buy,
            PositionType::Short => Side::Sell,
        }
    }

    /// Side of the order that reduces or closes this exposure
    pub fn closing_side(&self) -> Side {
        self.opening_side().opposite()
    }
}

impl std::fmt::Display for PositionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionType::Long => write!(f, "long"),
            PositionType::Short => write!(f, "short"),
        }
    }
}

/// Position mode of a trading pair
///
/// Starts `Unset`; the only transitions are `Unset -> OneWay`,
/// `Unset -> Hedge` and `OneWay -> Hedge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionMode {
    #[default]
    Unset,
    #[serde(rename = "oneway")]
    OneWay,
    Hedge,
}

impl PositionMode {
    pub fn is_hedge(&self) -> bool {
        matches!(self, PositionMode::Hedge)
    }
}

impl std::fmt::Display for PositionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionMode::Unset => write!(f, "unset"),
            PositionMode::OneWay => write!(f, "oneway"),
            PositionMode::Hedge => write!(f, "hedge"),
        }
    }
}

/// Ledger operation derived from a resolved intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Open,
    Add,
    Close,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Open => write!(f, "open"),
            Operation::Add => write!(f, "add"),
            Operation::Close => write!(f, "close"),
        }
    }
}

/// Resolved trading intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Intent {
    pub side: Side,
    pub reduce_only: bool,
    pub position_type: PositionType,
}

impl Intent {
    pub fn new(side: Side, reduce_only: bool, position_type: PositionType) -> Self {
        Self {
            side,
            reduce_only,
            position_type,
        }
    }
}

/// Side attribute a hedge-mode venue expects for an order
///
/// A buy that opens targets Long and a buy that reduces targets Short,
/// mirrored for sells.
pub fn hedge_target(side: Side, reduce_only: bool) -> PositionType {
    match (side, reduce_only) {
        (Side::Buy, false) | (Side::Sell, true) => PositionType::Long,
        (Side::Buy, true) | (Side::Sell, false) => PositionType::Short,
    }
}
