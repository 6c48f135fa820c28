//! Signal orchestration
//!
//! Per alert: dedup, decode, resolve intent against the ledger, build venue
//! parameters, execute through the gateway, then record the fill and queue a
//! notification. The per-key lock is held from the ledger snapshot until the
//! ledger update so concurrent alerts for one key are applied in order.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use super::alert::{Alert, ParsedAlert};
use super::dedup::DedupWindow;
use super::intent::{resolve, Action};
use super::ledger::{Ledger, LedgerUpdate, PositionState};
use super::params::{OrderContext, ParamRegistry};
use crate::common::errors::{Result, TradeError};
use crate::common::traits::{ExecutionGateway, OrderRequest, StopLossRequest};
use crate::common::types::{Exchange, Intent, Operation, PositionMode, PositionType, Side};
use crate::notify::{Notification, NotificationEvent};

/// Default upper bound for one gateway call
pub const DEFAULT_ORDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a successfully handled order alert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionSummary {
    pub exchange: Exchange,
    pub symbol: String,
    pub side: Side,
    pub reduce_only: bool,
    pub position_type: PositionType,
    pub operation: Operation,
    pub quantity: Decimal,
    /// Fill price, or the alert's reference price when the venue reported none
    pub price: Option<Decimal>,
    pub order_id: Option<String>,
    pub mode: PositionMode,
    /// Open quantity on the traded side after the update
    pub position_quantity: Decimal,
    pub strategy: String,
    /// Raw venue response
    pub exchange_response: serde_json::Value,
}

/// Result of a successful `update_stop`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopUpdate {
    pub exchange: Exchange,
    pub symbol: String,
    pub position_type: PositionType,
    pub stop_loss: Decimal,
    pub quantity: Decimal,
    pub order_id: Option<String>,
    pub strategy: String,
}

/// What happened to an alert
#[derive(Debug, Clone, PartialEq)]
pub enum AlertOutcome {
    Duplicate,
    Executed(ExecutionSummary),
    StopUpdated(StopUpdate),
}

/// Drives an alert from dedup to notification
pub struct SignalOrchestrator {
    dedup: DedupWindow,
    ledger: Arc<Ledger>,
    registry: ParamRegistry,
    gateway: Arc<dyn ExecutionGateway>,
    notifications: mpsc::Sender<Notification>,
    order_timeout: Duration,
}

impl SignalOrchestrator {
    pub fn new(gateway: Arc<dyn ExecutionGateway>, notifications: mpsc::Sender<Notification>) -> Self {
        Self {
            dedup: DedupWindow::default(),
            ledger: Arc::new(Ledger::new()),
            registry: ParamRegistry::with_defaults(),
            gateway,
            notifications,
            order_timeout: DEFAULT_ORDER_TIMEOUT,
        }
    }

    pub fn with_dedup(mut self, dedup: DedupWindow) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<Ledger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn with_registry(mut self, registry: ParamRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_order_timeout(mut self, timeout: Duration) -> Self {
        self.order_timeout = timeout;
        self
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Whether alerts for a venue can be executed
    pub fn is_enabled(&self, exchange: Exchange) -> bool {
        self.gateway.is_configured(exchange) && self.registry.supports(exchange)
    }

    /// Handle one inbound alert
    pub async fn handle(&self, alert: Alert) -> Result<AlertOutcome> {
        info!(
            action = %alert.action,
            symbol = %alert.symbol,
            exchange = %alert.exchange,
            qty = %alert.qty,
            strategy = alert.strategy_name(),
            "Alert received"
        );

        if self.dedup.is_duplicate(&alert).await {
            info!(action = %alert.action, symbol = %alert.symbol, "Duplicate alert ignored");
            return Ok(AlertOutcome::Duplicate);
        }

        let parsed = alert.parse()?;
        if !self.is_enabled(parsed.exchange) {
            return Err(TradeError::Configuration(format!(
                "exchange {} is not configured",
                parsed.exchange
            )));
        }

        match parsed.action {
            Action::UpdateStop => self.update_stop(&parsed).await.map(AlertOutcome::StopUpdated),
            _ => self.execute(&parsed).await.map(AlertOutcome::Executed),
        }
    }

    async fn execute(&self, alert: &ParsedAlert) -> Result<ExecutionSummary> {
        let key = alert.position_key();
        let _guard = self.ledger.lock_key(&key).await;

        let state = self.ledger.snapshot(&key).await;
        let intent = resolve(&alert.action, &state)?;
        let operation = alert.action.operation(&intent);
        info!(
            key = %key,
            side = %intent.side,
            reduce_only = intent.reduce_only,
            position_type = %intent.position_type,
            operation = %operation,
            mode = %state.mode,
            "Intent resolved"
        );

        let params = self.registry.build(
            alert.exchange,
            &OrderContext {
                side: intent.side,
                reduce_only: intent.reduce_only,
                mode: state.mode,
                leverage: alert.leverage,
            },
        )?;

        if let Some(leverage) = alert.leverage {
            let result = self
                .bounded(
                    "set leverage",
                    self.gateway.set_leverage(alert.exchange, &alert.symbol, leverage),
                )
                .await;
            if let Err(e) = result {
                warn!(key = %key, leverage, error = %e, "Failed to set leverage, placing order anyway");
            }
        }

        let order = OrderRequest {
            exchange: alert.exchange,
            symbol: alert.symbol.clone(),
            side: intent.side,
            quantity: alert.quantity,
            reduce_only: intent.reduce_only,
            params,
        };
        let report = match self.bounded("order placement", self.gateway.place_order(&order)).await {
            Ok(report) => report,
            Err(e) => {
                warn!(key = %key, error = %e, "Order failed, ledger left untouched");
                return Err(e);
            }
        };
        info!(
            key = %key,
            order_id = report.order_id.as_deref().unwrap_or("-"),
            average_price = ?report.average_price,
            "Order executed"
        );

        let price = report
            .average_price
            .filter(|p| *p > Decimal::ZERO)
            .or(alert.reference_price);
        // An unknown price must not drag an existing average toward zero
        let held_average = state
            .side(intent.position_type)
            .as_open()
            .map(|open| open.average_price);
        let ledger_price = match (price, held_average) {
            (Some(price), _) => price,
            (None, Some(average)) => {
                warn!(key = %key, %average, "No fill price or reference price, keeping current average");
                average
            }
            (None, None) => {
                warn!(key = %key, "No fill price or reference price, recording 0");
                Decimal::ZERO
            }
        };

        if !intent.reduce_only {
            if let Some(stop_price) = alert.stop_loss {
                self.place_protective_stop(alert, &intent, state.mode, stop_price).await;
            }
        }

        let update = LedgerUpdate {
            position_type: intent.position_type,
            quantity: alert.quantity,
            price: ledger_price,
            stop_loss: alert.stop_loss,
            operation,
            partial: alert.partial,
        };
        let state = match self.ledger.update_position(&key, &update).await {
            Ok(state) => state,
            Err(e) => {
                error!(
                    key = %key,
                    order_id = report.order_id.as_deref().unwrap_or("-"),
                    error = %e,
                    "Order executed but ledger update failed; tracked exposure no longer matches the exchange"
                );
                self.ledger.snapshot(&key).await
            }
        };
        let position_quantity = state.side(intent.position_type).quantity();

        self.enqueue(Notification {
            exchange: alert.exchange,
            symbol: alert.raw_symbol.clone(),
            event: NotificationEvent::from_operation(operation, alert.partial),
            position_type: intent.position_type,
            quantity: alert.quantity,
            price,
            mode: state.mode,
            stop_loss: alert.stop_loss,
            leverage: alert.leverage,
            position_quantity,
            strategy: alert.strategy.clone(),
            timestamp: Utc::now(),
        });

        Ok(ExecutionSummary {
            exchange: alert.exchange,
            symbol: alert.symbol.clone(),
            side: intent.side,
            reduce_only: intent.reduce_only,
            position_type: intent.position_type,
            operation,
            quantity: alert.quantity,
            price,
            order_id: report.order_id,
            mode: state.mode,
            position_quantity,
            strategy: alert.strategy.clone(),
            exchange_response: report.raw,
        })
    }

    /// Best-effort stop-market on the closing side of a fresh fill
    async fn place_protective_stop(
        &self,
        alert: &ParsedAlert,
        intent: &Intent,
        mode: PositionMode,
        stop_price: Decimal,
    ) {
        let side = intent.position_type.closing_side();
        let params = match self.registry.build(
            alert.exchange,
            &OrderContext {
                side,
                reduce_only: true,
                mode,
                leverage: alert.leverage,
            },
        ) {
            Ok(params) => params,
            Err(e) => {
                warn!(error = %e, "Cannot build stop-loss parameters");
                return;
            }
        };

        let request = StopLossRequest {
            exchange: alert.exchange,
            symbol: alert.symbol.clone(),
            side,
            quantity: alert.quantity,
            stop_price,
            params,
        };
        match self.bounded("stop-loss placement", self.gateway.place_stop_loss(&request)).await {
            Ok(_) => info!(exchange = %alert.exchange, symbol = %alert.symbol, %stop_price, "Stop loss set"),
            Err(e) => warn!(
                exchange = %alert.exchange,
                symbol = %alert.symbol,
                %stop_price,
                error = %e,
                "Failed to place stop loss"
            ),
        }
    }

    async fn update_stop(&self, alert: &ParsedAlert) -> Result<StopUpdate> {
        let stop_price = alert.new_stop_loss.or(alert.stop_loss).ok_or_else(|| {
            TradeError::InvalidAlert("update_stop requires new_stop_loss".to_string())
        })?;

        let key = alert.position_key();
        let _guard = self.ledger.lock_key(&key).await;
        let state = self.ledger.snapshot(&key).await;
        let (position_type, quantity) = open_side(&state)
            .ok_or_else(|| TradeError::Ledger(format!("no such position: {}", key)))?;

        let side = position_type.closing_side();
        let params = self.registry.build(
            alert.exchange,
            &OrderContext {
                side,
                reduce_only: true,
                mode: state.mode,
                leverage: alert.leverage,
            },
        )?;
        let request = StopLossRequest {
            exchange: alert.exchange,
            symbol: alert.symbol.clone(),
            side,
            quantity,
            stop_price,
            params,
        };

        let report = self
            .bounded("stop-loss replacement", self.gateway.replace_stop_loss(&request))
            .await
            .map_err(|e| {
                warn!(key = %key, error = %e, "Failed to move stop loss");
                e
            })?;
        let state = self.ledger.set_stop_loss(&key, position_type, stop_price).await?;

        self.enqueue(Notification {
            exchange: alert.exchange,
            symbol: alert.raw_symbol.clone(),
            event: NotificationEvent::StopMoved,
            position_type,
            quantity,
            price: None,
            mode: state.mode,
            stop_loss: Some(stop_price),
            leverage: alert.leverage,
            position_quantity: quantity,
            strategy: alert.strategy.clone(),
            timestamp: Utc::now(),
        });

        Ok(StopUpdate {
            exchange: alert.exchange,
            symbol: alert.symbol.clone(),
            position_type,
            stop_loss: stop_price,
            quantity,
            order_id: report.order_id,
            strategy: alert.strategy.clone(),
        })
    }

    async fn bounded<T>(&self, what: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.order_timeout, call)
            .await
            .map_err(|_| {
                TradeError::Timeout(format!(
                    "{} exceeded {}ms",
                    what,
                    self.order_timeout.as_millis()
                ))
            })?
    }

    fn enqueue(&self, notification: Notification) {
        match self.notifications.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => {
                warn!(exchange = %n.exchange, symbol = %n.symbol, "Notification queue full, dropping")
            }
            Err(TrySendError::Closed(_)) => debug!("Notification dispatcher stopped"),
        }
    }
}

/// Side whose stop an `update_stop` moves; long wins when both are open
fn open_side(state: &PositionState) -> Option<(PositionType, Decimal)> {
    [PositionType::Long, PositionType::Short]
        .into_iter()
        .find(|position_type| state.side(*position_type).is_open())
        .map(|position_type| (position_type, state.side(position_type).quantity()))
}
