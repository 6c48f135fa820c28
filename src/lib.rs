//! WebhookTrader Library
//!
//! Turns charting-tool webhook alerts into exchange-safe futures orders and
//! keeps per-strategy long/short exposure in memory.

pub mod api;
pub mod common;
pub mod config;
pub mod engine;
pub mod exchange;
pub mod notify;

// Re-export commonly used types
pub use common::errors::{Result, TradeError};
pub use common::traits::{ExecutionGateway, ExecutionReport, Notifier, OrderRequest, StopLossRequest};
pub use common::types::{Exchange, Intent, Operation, PositionMode, PositionType, Side};
pub use config::types::AppConfig;
pub use engine::{Alert, AlertOutcome, Ledger, ParamRegistry, PositionKey, SignalOrchestrator};
pub use exchange::RestGateway;
pub use notify::{Notification, TelegramNotifier};
