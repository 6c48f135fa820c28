//! Trait definitions for the external collaborators
//!
//! The engine only talks to exchanges and chat channels through these
//! seams, so tests can swap in mocks and new venues plug in without
//! touching the orchestration logic.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use super::errors::Result;
use super::types::{Exchange, Side};
use crate::engine::params::ParamSet;
use crate::notify::Notification;

/// Fully resolved market order handed to the gateway
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub exchange: Exchange,
    /// Unified symbol (`BTC/USDT:USDT`)
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub reduce_only: bool,
    /// Venue-specific parameters built by the parameter adapter
    pub params: ParamSet,
}

/// Protective stop-market order placed on the closing side of a position
#[derive(Debug, Clone, PartialEq)]
pub struct StopLossRequest {
    pub exchange: Exchange,
    pub symbol: String,
    /// Closing side (sell for a long, buy for a short)
    pub side: Side,
    pub quantity: Decimal,
    pub stop_price: Decimal,
    pub params: ParamSet,
}

/// Outcome of a successful order placement
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub order_id: Option<String>,
    /// Average fill price, when the venue reports one
    pub average_price: Option<Decimal>,
    /// Raw venue response body
    pub raw: serde_json::Value,
}

/// Places orders on an exchange and reports the outcome
///
/// Implementations must not retry on their own: a failed call is reported
/// upward and the caller decides what to do.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Whether credentials for this venue are present
    fn is_configured(&self, exchange: Exchange) -> bool;

    /// Set leverage for an instrument
    async fn set_leverage(&self, exchange: Exchange, symbol: &str, leverage: u32) -> Result<()>;

    /// Place a market order
    async fn place_order(&self, order: &OrderRequest) -> Result<ExecutionReport>;

    /// Place a stop-market order protecting a freshly opened position
    async fn place_stop_loss(&self, order: &StopLossRequest) -> Result<ExecutionReport>;

    /// Cancel existing stop orders for the instrument and place a new one
    async fn replace_stop_loss(&self, order: &StopLossRequest) -> Result<ExecutionReport>;
}

/// Delivers human-readable trade summaries
///
/// Returns `Ok(false)` when the notifier is not configured for the venue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<bool>;
}
