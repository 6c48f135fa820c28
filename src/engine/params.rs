//! Exchange-specific order parameters
//!
//! Each venue spells margin mode, reduce-only and the hedge-mode position
//! side differently. [`ParamRegistry`] maps an exchange to a pure builder
//! function; supporting a new venue means registering one more builder.
//!
//! In hedge mode the position-side attribute follows
//! [`hedge_target`](crate::common::types::hedge_target): an opening buy
//! targets Long, a reducing buy targets Short, mirrored for sells. In
//! one-way mode (and before any mode is known) it is the venue's neutral
//! value.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::common::errors::{Result, TradeError};
use crate::common::types::{hedge_target, Exchange, PositionMode, PositionType, Side};

/// Venue parameters attached to an order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, Value>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Inputs every builder sees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderContext {
    pub side: Side,
    pub reduce_only: bool,
    pub mode: PositionMode,
    pub leverage: Option<u32>,
}

impl OrderContext {
    fn hedge_target(&self) -> Option<PositionType> {
        self.mode
            .is_hedge()
            .then(|| hedge_target(self.side, self.reduce_only))
    }
}

/// Pure parameter builder for one venue
pub type ParamBuilder = fn(&OrderContext) -> ParamSet;

/// Exchange variant to builder table
#[derive(Debug, Clone)]
pub struct ParamRegistry {
    builders: HashMap<Exchange, ParamBuilder>,
}

impl ParamRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Registry with every built-in venue
    pub fn with_defaults() -> Self {
        Self::new()
            .register(Exchange::Binance, binance_params)
            .register(Exchange::Okx, okx_params)
            .register(Exchange::Bybit, bybit_params)
            .register(Exchange::Gate, gate_params)
            .register(Exchange::Bitget, bitget_params)
            .register(Exchange::Kucoin, kucoin_params)
    }

    pub fn register(mut self, exchange: Exchange, builder: ParamBuilder) -> Self {
        self.builders.insert(exchange, builder);
        self
    }

    pub fn supports(&self, exchange: Exchange) -> bool {
        self.builders.contains_key(&exchange)
    }

    pub fn build(&self, exchange: Exchange, ctx: &OrderContext) -> Result<ParamSet> {
        let builder = self.builders.get(&exchange).ok_or_else(|| {
            TradeError::Configuration(format!("no parameter builder registered for {}", exchange))
        })?;
        Ok(builder(ctx))
    }
}

impl Default for ParamRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Binance USDⓈ-M futures
///
/// `reduceOnly` is rejected in hedge mode, where `positionSide` alone
/// determines whether an order opens or closes.
pub fn binance_params(ctx: &OrderContext) -> ParamSet {
    let mut params = ParamSet::new();
    match ctx.hedge_target() {
        Some(PositionType::Long) => params.insert("positionSide", "LONG"),
        Some(PositionType::Short) => params.insert("positionSide", "SHORT"),
        None => {
            params.insert("positionSide", "BOTH");
            if ctx.reduce_only {
                params.insert("reduceOnly", true);
            }
        }
    }
    params
}

/// OKX perpetual swaps
pub fn okx_params(ctx: &OrderContext) -> ParamSet {
    let mut params = ParamSet::new().with("tdMode", "cross");
    if ctx.reduce_only {
        params.insert("reduceOnly", true);
    }
    let pos_side = match ctx.hedge_target() {
        Some(PositionType::Long) => "long",
        Some(PositionType::Short) => "short",
        None => "net",
    };
    params.insert("posSide", pos_side);
    params
}

/// Bybit v5 linear contracts
pub fn bybit_params(ctx: &OrderContext) -> ParamSet {
    let mut params = ParamSet::new();
    if ctx.reduce_only {
        params.insert("reduceOnly", true);
    }
    let position_idx = match ctx.hedge_target() {
        Some(PositionType::Long) => 1,
        Some(PositionType::Short) => 2,
        None => 0,
    };
    params.insert("positionIdx", position_idx);
    params
}

/// Gate USDT futures; market orders are immediate-or-cancel
pub fn gate_params(ctx: &OrderContext) -> ParamSet {
    let mut params = ParamSet::new().with("tif", "ioc");
    if ctx.reduce_only {
        params.insert("reduce_only", true);
    }
    params
}

/// Bitget v2 mix contracts
///
/// One-way orders carry `reduceOnly`; hedge orders carry `tradeSide`
/// (open/close) and the side of the position being traded.
pub fn bitget_params(ctx: &OrderContext) -> ParamSet {
    let mut params = ParamSet::new().with("marginMode", "crossed");
    match ctx.hedge_target() {
        Some(target) => {
            params.insert("tradeSide", if ctx.reduce_only { "close" } else { "open" });
            params.insert("holdSide", target.to_string());
        }
        None => {
            params.insert("reduceOnly", if ctx.reduce_only { "YES" } else { "NO" });
        }
    }
    params
}

/// KuCoin futures; leverage travels with the order
pub fn kucoin_params(ctx: &OrderContext) -> ParamSet {
    let mut params = ParamSet::new().with("marginMode", "CROSS");
    if ctx.reduce_only {
        params.insert("closeOrder", true);
    }
    if let Some(leverage) = ctx.leverage {
        params.insert("leverage", leverage);
    }
    params
}
