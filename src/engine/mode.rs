//! Position mode detection
//!
//! A key starts `Unset`. The first evaluation assigns `Hedge` when both
//! sides are open and `OneWay` otherwise; a `OneWay` key that later holds
//! both sides is promoted to `Hedge`. `Hedge` is terminal.

use tracing::info;

use super::ledger::PositionKey;
use crate::common::types::PositionMode;

/// Next mode for a key given the post-mutation side flags
pub fn detect_mode(
    key: &PositionKey,
    current: PositionMode,
    has_long: bool,
    has_short: bool,
) -> PositionMode {
    let both = has_long && has_short;

    match current {
        PositionMode::Unset if both => {
            info!(key = %key, "Detected hedge position mode");
            PositionMode::Hedge
        }
        PositionMode::Unset => {
            info!(key = %key, "Detected one-way position mode");
            PositionMode::OneWay
        }
        PositionMode::OneWay if both => {
            info!(key = %key, "Promoting to hedge position mode");
            PositionMode::Hedge
        }
        mode => mode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Exchange;

    fn key() -> PositionKey {
        PositionKey::new(Exchange::Binance, "BTC/USDT:USDT", "default")
    }

    #[test]
    fn test_unset_assignment() {
        assert_eq!(detect_mode(&key(), PositionMode::Unset, true, false), PositionMode::OneWay);
        assert_eq!(detect_mode(&key(), PositionMode::Unset, false, true), PositionMode::OneWay);
        assert_eq!(detect_mode(&key(), PositionMode::Unset, true, true), PositionMode::Hedge);
    }

    #[test]
    fn test_oneway_promotion() {
        assert_eq!(detect_mode(&key(), PositionMode::OneWay, true, false), PositionMode::OneWay);
        assert_eq!(detect_mode(&key(), PositionMode::OneWay, true, true), PositionMode::Hedge);
    }

    #[test]
    fn test_hedge_never_demotes() {
        for (has_long, has_short) in [(false, false), (true, false), (false, true), (true, true)] {
            assert_eq!(
                detect_mode(&key(), PositionMode::Hedge, has_long, has_short),
                PositionMode::Hedge
            );
        }
    }
}
