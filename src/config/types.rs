//! Configuration types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::common::types::Exchange;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Per-venue API credentials
    #[serde(default)]
    pub exchanges: ExchangesConfig,
    /// Telegram notification settings
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// HTTP listener
    #[serde(default)]
    pub server: ServerConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

/// Credentials for every supported venue; a missing entry means the venue is disabled
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangesConfig {
    #[serde(default)]
    pub binance: Option<ExchangeConfig>,
    #[serde(default)]
    pub okx: Option<ExchangeConfig>,
    #[serde(default)]
    pub bybit: Option<ExchangeConfig>,
    #[serde(default)]
    pub gate: Option<ExchangeConfig>,
    #[serde(default)]
    pub bitget: Option<ExchangeConfig>,
    #[serde(default)]
    pub kucoin: Option<ExchangeConfig>,
}

impl ExchangesConfig {
    pub fn get(&self, exchange: Exchange) -> Option<&ExchangeConfig> {
        match exchange {
            Exchange::Binance => self.binance.as_ref(),
            Exchange::Okx => self.okx.as_ref(),
            Exchange::Bybit => self.bybit.as_ref(),
            Exchange::Gate => self.gate.as_ref(),
            Exchange::Bitget => self.bitget.as_ref(),
            Exchange::Kucoin => self.kucoin.as_ref(),
        }
    }

    pub fn set(&mut self, exchange: Exchange, config: Option<ExchangeConfig>) {
        let slot = match exchange {
            Exchange::Binance => &mut self.binance,
            Exchange::Okx => &mut self.okx,
            Exchange::Bybit => &mut self.bybit,
            Exchange::Gate => &mut self.gate,
            Exchange::Bitget => &mut self.bitget,
            Exchange::Kucoin => &mut self.kucoin,
        };
        *slot = config;
    }

    /// Credentials for a venue, if it has a non-empty key and secret
    pub fn credentials(&self, exchange: Exchange) -> Option<ApiCredentials> {
        self.get(exchange).and_then(ExchangeConfig::credentials)
    }
}

/// Single venue configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// API key for authenticated requests
    #[serde(default)]
    pub api_key: String,
    /// API secret for signing requests
    #[serde(default)]
    pub api_secret: String,
    /// API passphrase (OKX, Bitget, KuCoin)
    #[serde(default)]
    pub api_passphrase: Option<String>,
    /// Override for the REST base URL
    #[serde(default)]
    pub rest_url: Option<String>,
}

impl ExchangeConfig {
    pub fn credentials(&self) -> Option<ApiCredentials> {
        if self.api_key.trim().is_empty() || self.api_secret.trim().is_empty() {
            return None;
        }
        Some(ApiCredentials::new(
            self.api_key.clone(),
            self.api_secret.clone(),
            self.api_passphrase.clone().unwrap_or_default(),
        ))
    }
}

/// Telegram bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Default bot token
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Default chat id
    #[serde(default)]
    pub chat_id: Option<String>,
    /// Bot API base URL
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
    /// Per-exchange bot/chat overrides, keyed by lowercase exchange name
    #[serde(default)]
    pub overrides: HashMap<String, TelegramTarget>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_url: default_telegram_api_url(),
            overrides: HashMap::new(),
        }
    }
}

impl TelegramConfig {
    /// Resolve the bot token and chat id for a venue.
    ///
    /// Each half falls back to the default independently.
    pub fn target_for(&self, exchange: Exchange) -> Option<TelegramTarget> {
        let specific = self.overrides.get(exchange.as_str());
        let pick = |specific: Option<&String>, default: &Option<String>| {
            specific
                .filter(|v| !v.trim().is_empty())
                .or(default.as_ref().filter(|v| !v.trim().is_empty()))
                .cloned()
        };

        let bot_token = pick(specific.and_then(|t| t.bot_token.as_ref()), &self.bot_token)?;
        let chat_id = pick(specific.and_then(|t| t.chat_id.as_ref()), &self.chat_id)?;

        Some(TelegramTarget {
            bot_token: Some(bot_token),
            chat_id: Some(chat_id),
        })
    }
}

/// Bot token and chat id pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramTarget {
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Route every venue to its testnet / demo environment
    #[serde(default)]
    pub use_sandbox: bool,
    /// Upper bound for a single gateway call, in seconds
    #[serde(default = "default_order_timeout")]
    pub order_timeout_seconds: u64,
    /// Upper bound for a single notification, in seconds
    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_seconds: u64,
    /// Width of a dedup time bucket, in seconds
    #[serde(default = "default_dedup_bucket")]
    pub dedup_bucket_seconds: i64,
    /// Number of fingerprints remembered by the dedup window
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    /// Pending notifications buffered before new ones are dropped
    #[serde(default = "default_notification_buffer")]
    pub notification_buffer: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            use_sandbox: false,
            order_timeout_seconds: default_order_timeout(),
            notify_timeout_seconds: default_notify_timeout(),
            dedup_bucket_seconds: default_dedup_bucket(),
            dedup_capacity: default_dedup_capacity(),
            notification_buffer: default_notification_buffer(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_order_timeout() -> u64 {
    10
}

fn default_notify_timeout() -> u64 {
    10
}

fn default_dedup_bucket() -> i64 {
    10
}

fn default_dedup_capacity() -> usize {
    200
}

fn default_notification_buffer() -> usize {
    256
}

/// API credentials for authenticated requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
}

impl ApiCredentials {
    pub fn new(api_key: String, api_secret: String, passphrase: String) -> Self {
        Self {
            api_key,
            api_secret,
            passphrase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_is_not_configured() {
        let config = ExchangeConfig {
            api_key: "".to_string(),
            api_secret: "secret".to_string(),
            ..Default::default()
        };
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_telegram_override_falls_back_per_field() {
        let mut telegram = TelegramConfig {
            bot_token: Some("default-token".to_string()),
            chat_id: Some("default-chat".to_string()),
            ..Default::default()
        };
        telegram.overrides.insert(
            "okx".to_string(),
            TelegramTarget {
                bot_token: Some("okx-token".to_string()),
                chat_id: None,
            },
        );

        let okx = telegram.target_for(Exchange::Okx).unwrap();
        assert_eq!(okx.bot_token.as_deref(), Some("okx-token"));
        assert_eq!(okx.chat_id.as_deref(), Some("default-chat"));

        let binance = telegram.target_for(Exchange::Binance).unwrap();
        assert_eq!(binance.bot_token.as_deref(), Some("default-token"));
    }

    #[test]
    fn test_telegram_unconfigured() {
        assert!(TelegramConfig::default().target_for(Exchange::Gate).is_none());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = AppSettings::default();
        assert_eq!(settings.dedup_bucket_seconds, 10);
        assert_eq!(settings.dedup_capacity, 200);
        assert!(!settings.use_sandbox);
    }
}
