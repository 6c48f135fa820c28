//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::{AppConfig, ExchangeConfig, TelegramTarget};
use crate::common::errors::{Result, TradeError};
use crate::common::types::Exchange;

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Flat operator variables (`BINANCE_API_KEY`, `TELEGRAM_BOT_TOKEN`, `PORT`, ...)
/// 2. Environment variables (prefixed with APP__)
/// 3. Configuration file (TOML format)
/// 4. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| TradeError::Configuration(e.to_string()))?;

    let mut app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| TradeError::Configuration(e.to_string()))?;

    apply_flat_env(&mut app_config, |name| std::env::var(name).ok());
    Ok(app_config)
}

/// Load configuration from environment variables only
pub fn load_from_env() -> Result<AppConfig> {
    // Try to load from .env file
    dotenvy::dotenv().ok();

    let mut config = AppConfig::default();
    apply_flat_env(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

/// Overlay the flat variable names onto a config tree
///
/// Only non-empty values override; an exchange whose key variable is
/// present gets a fresh entry built from its `<EXCHANGE>_*` variables.
pub fn apply_flat_env<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    for exchange in Exchange::ALL {
        let prefix = exchange.as_str().to_uppercase();
        if let Some(api_key) = get(&format!("{}_API_KEY", prefix)) {
            let existing = config.exchanges.get(exchange).cloned().unwrap_or_default();
            config.exchanges.set(
                exchange,
                Some(ExchangeConfig {
                    api_key,
                    api_secret: get(&format!("{}_SECRET", prefix)).unwrap_or(existing.api_secret),
                    api_passphrase: get(&format!("{}_PASSPHRASE", prefix))
                        .or(existing.api_passphrase),
                    rest_url: get(&format!("{}_REST_URL", prefix)).or(existing.rest_url),
                }),
            );
        }

        let bot_token = get(&format!("TELEGRAM_BOT_TOKEN_{}", prefix));
        let chat_id = get(&format!("TELEGRAM_CHAT_ID_{}", prefix));
        if bot_token.is_some() || chat_id.is_some() {
            config
                .telegram
                .overrides
                .insert(exchange.as_str().to_string(), TelegramTarget { bot_token, chat_id });
        }
    }

    if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
        config.telegram.bot_token = Some(token);
    }
    if let Some(chat_id) = get("TELEGRAM_CHAT_ID") {
        config.telegram.chat_id = Some(chat_id);
    }
    if let Some(sandbox) = get("USE_SANDBOX") {
        config.settings.use_sandbox = sandbox.trim().eq_ignore_ascii_case("true");
    }
    if let Some(port) = get("PORT").and_then(|p| p.trim().parse().ok()) {
        config.server.port = port;
    }
}
