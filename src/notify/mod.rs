//! Trade notifications
//!
//! The orchestrator never waits on a chat API. It pushes a [`Notification`]
//! onto a bounded channel and [`run_dispatcher`] delivers it in the
//! background, bounded by a timeout. Delivery failures are logged and
//! otherwise ignored.

pub mod telegram;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::common::traits::Notifier;
use crate::common::types::{Exchange, Operation, PositionMode, PositionType};

pub use telegram::TelegramNotifier;

/// What happened to the position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    Opened,
    Added,
    Reduced,
    Closed,
    StopMoved,
}

impl NotificationEvent {
    pub fn from_operation(operation: Operation, partial: bool) -> Self {
        match operation {
            Operation::Open => NotificationEvent::Opened,
            Operation::Add => NotificationEvent::Added,
            Operation::Close if partial => NotificationEvent::Reduced,
            Operation::Close => NotificationEvent::Closed,
        }
    }
}

/// Structured trade summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub exchange: Exchange,
    /// Symbol as the alert spelled it
    pub symbol: String,
    pub event: NotificationEvent,
    pub position_type: PositionType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub mode: PositionMode,
    pub stop_loss: Option<Decimal>,
    pub leverage: Option<u32>,
    /// Quantity left on the traded side after the ledger update
    pub position_quantity: Decimal,
    pub strategy: String,
    pub timestamp: DateTime<Utc>,
}

/// Deliver notifications until every sender is dropped
pub async fn run_dispatcher(
    mut receiver: mpsc::Receiver<Notification>,
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
) {
    while let Some(notification) = receiver.recv().await {
        match tokio::time::timeout(timeout, notifier.notify(&notification)).await {
            Ok(Ok(true)) => debug!(exchange = %notification.exchange, "Notification delivered"),
            Ok(Ok(false)) => debug!(exchange = %notification.exchange, "Notifier not configured, skipped"),
            Ok(Err(e)) => warn!(exchange = %notification.exchange, error = %e, "Notification failed"),
            Err(_) => warn!(
                exchange = %notification.exchange,
                timeout_ms = timeout.as_millis() as u64,
                "Notification timed out"
            ),
        }
    }
    debug!("Notification channel closed, dispatcher exiting");
}

/// Spawn [`run_dispatcher`] on the current runtime
pub fn spawn_dispatcher(
    receiver: mpsc::Receiver<Notification>,
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(run_dispatcher(receiver, notifier, timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::channels::create_notification_channel;
    use crate::common::errors::TradeError;
    use crate::common::traits::MockNotifier;
    use rust_decimal_macros::dec;

    pub(crate) fn sample() -> Notification {
        Notification {
            exchange: Exchange::Binance,
            symbol: "BTCUSDT".to_string(),
            event: NotificationEvent::Opened,
            position_type: PositionType::Long,
            quantity: dec!(1),
            price: Some(dec!(100)),
            mode: PositionMode::OneWay,
            stop_loss: None,
            leverage: Some(10),
            position_quantity: dec!(1),
            strategy: "default".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_event_from_operation() {
        assert_eq!(NotificationEvent::from_operation(Operation::Open, false), NotificationEvent::Opened);
        assert_eq!(NotificationEvent::from_operation(Operation::Add, true), NotificationEvent::Added);
        assert_eq!(NotificationEvent::from_operation(Operation::Close, true), NotificationEvent::Reduced);
        assert_eq!(NotificationEvent::from_operation(Operation::Close, false), NotificationEvent::Closed);
    }

    #[tokio::test]
    async fn test_dispatcher_survives_failures() {
        let mut notifier = MockNotifier::new();
        let mut calls = 0;
        notifier.expect_notify().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(TradeError::Internal("chat api down".to_string()))
            } else {
                Ok(true)
            }
        });

        let (sender, receiver) = create_notification_channel();
        let handle = spawn_dispatcher(receiver, Arc::new(notifier), Duration::from_secs(1));

        sender.send(sample()).await.unwrap();
        sender.send(sample()).await.unwrap();
        drop(sender);

        handle.await.unwrap();
    }
}
