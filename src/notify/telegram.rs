//! Telegram notifier

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{instrument, warn};

use super::{Notification, NotificationEvent};
use crate::common::errors::{Result, TradeError};
use crate::common::traits::Notifier;
use crate::common::types::PositionType;
use crate::config::types::TelegramConfig;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Sends trade summaries through the Telegram Bot API
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        Self::with_timeout(config, Duration::from_secs(10))
    }

    pub fn with_timeout(config: TelegramConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TradeError::Internal(e.to_string()))?;

        Ok(Self { client, config })
    }
}

/// Render a notification as Telegram HTML
pub fn format_message(notification: &Notification) -> String {
    let (marker, title) = match (notification.event, notification.position_type) {
        (NotificationEvent::Opened, PositionType::Long) => ("🟢", "Opened"),
        (NotificationEvent::Opened, PositionType::Short) => ("🔴", "Opened"),
        (NotificationEvent::Added, PositionType::Long) => ("🔵", "Added"),
        (NotificationEvent::Added, PositionType::Short) => ("🟠", "Added"),
        (NotificationEvent::Reduced, _) => ("⚪", "Reduced"),
        (NotificationEvent::Closed, _) => ("⚪", "Closed"),
        (NotificationEvent::StopMoved, _) => ("📈", "Stop moved"),
    };

    let price = notification
        .price
        .map(|p| p.normalize().to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let stop_loss = notification
        .stop_loss
        .map(|s| s.normalize().to_string())
        .unwrap_or_else(|| "not set".to_string());
    let leverage = notification
        .leverage
        .map(|l| format!("{}x", l))
        .unwrap_or_else(|| "-".to_string());
    let side = notification.position_type.to_string().to_uppercase();

    format!(
        "{marker} <b>{title} ({side})</b>\n\
         ━━━━━━━━━━━━━━━━\n\
         🏦 Exchange: <b>{exchange}</b>\n\
         💰 Symbol: <b>{symbol}</b>\n\
         📦 Quantity: <b>{quantity}</b>\n\
         💵 Price: <b>{price}</b>\n\
         📊 Mode: <b>{mode}</b>\n\
         🎯 Stop loss: <b>{stop_loss}</b>\n\
         ⚡ Leverage: <b>{leverage}</b>\n\
         📈 Open {side_lower}: <b>{position_quantity}</b>\n\
         📋 Strategy: <b>{strategy}</b>\n\
         ━━━━━━━━━━━━━━━━\n\
         ⏰ {time}",
        exchange = notification.exchange.as_str().to_uppercase(),
        symbol = notification.symbol,
        quantity = notification.quantity.normalize(),
        mode = notification.mode.to_string().to_uppercase(),
        side_lower = notification.position_type,
        position_quantity = notification.position_quantity.normalize(),
        strategy = notification.strategy,
        time = notification.timestamp.format("%Y-%m-%d %H:%M:%S"),
    )
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip(self, notification), fields(exchange = %notification.exchange))]
    async fn notify(&self, notification: &Notification) -> Result<bool> {
        let target = match self.config.target_for(notification.exchange) {
            Some(target) => target,
            None => return Ok(false),
        };
        let (Some(token), Some(chat_id)) = (target.bot_token, target.chat_id) else {
            return Ok(false);
        };

        let url = format!(
            "{}/bot{}/sendMessage",
            self.config.api_url.trim_end_matches('/'),
            token
        );
        let text = format_message(notification);
        let body = SendMessage {
            chat_id: &chat_id,
            text: &text,
            parse_mode: "HTML",
        };

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Telegram rejected message");
            return Err(TradeError::InvalidResponse(format!(
                "Telegram returned status {}: {}",
                status, body
            )));
        }

        Ok(true)
    }
}
