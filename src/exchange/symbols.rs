//! Instrument naming
//!
//! Alerts name instruments the way charting tools do (`BTCUSDT`). The
//! ledger keys on the unified perpetual form `BTC/USDT:USDT`, and each venue
//! has its own native id on the wire.

use crate::common::types::Exchange;

const QUOTE: &str = "USDT";

/// Unified perpetual symbol for a raw alert symbol
pub fn unified_symbol(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    if upper.contains('/') {
        return upper;
    }

    let compact: String = upper.chars().filter(|c| *c != '-' && *c != '_').collect();
    match compact.strip_suffix(QUOTE) {
        Some(base) if !base.is_empty() => format!("{}/{}:{}", base, QUOTE, QUOTE),
        _ => upper,
    }
}

/// Base and quote of a unified symbol
pub fn split_unified(unified: &str) -> Option<(&str, &str)> {
    let (pair, _settle) = unified.split_once(':').unwrap_or((unified, ""));
    let (base, quote) = pair.split_once('/')?;
    if base.is_empty() || quote.is_empty() {
        return None;
    }
    Some((base, quote))
}

/// Native instrument id on a venue
///
/// Symbols that are not in unified form are passed through unchanged.
pub fn venue_symbol(exchange: Exchange, unified: &str) -> String {
    let Some((base, quote)) = split_unified(unified) else {
        return unified.to_string();
    };

    match exchange {
        Exchange::Binance | Exchange::Bybit | Exchange::Bitget => format!("{}{}", base, quote),
        Exchange::Okx => format!("{}-{}-SWAP", base, quote),
        Exchange::Gate => format!("{}_{}", base, quote),
        Exchange::Kucoin => {
            let base = if base == "BTC" { "XBT" } else { base };
            format!("{}{}M", base, quote)
        }
    }
}
