//! Intent resolution
//!
//! Turns an action token plus the current ledger state into
//! (side, reduce_only, position type).
//!
//! | action     | side | reduce_only | position |
//! |------------|------|-------------|----------|
//! | buy_long   | Buy  | false       | Long     |
//! | sell_long  | Sell | true        | Long     |
//! | sell_short | Sell | false       | Short    |
//! | buy_short  | Buy  | true        | Short    |
//! | add_long   | Buy  | false       | Long     |
//! | add_short  | Sell | false       | Short    |
//!
//! Bare `buy` / `sell` close the opposite exposure first if one is open,
//! otherwise they open; bare `add` adds to whichever side is open.

use std::str::FromStr;

use super::ledger::PositionState;
use crate::common::errors::{Result, TradeError};
use crate::common::types::{Intent, Operation, PositionType, Side};

/// Action verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Buy,
    Sell,
    Add,
}

impl FromStr for Verb {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "buy" => Ok(Verb::Buy),
            "sell" => Ok(Verb::Sell),
            "add" => Ok(Verb::Add),
            _ => Err(unrecognized()),
        }
    }
}

/// Decoded action token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// `verb_position`, e.g. `buy_long`
    Explicit { verb: Verb, position: PositionType },
    /// `buy`, `sell` or `add`, inferred from the ledger
    Implicit(Verb),
    /// Move the protective stop of the open position
    UpdateStop,
}

impl Action {
    /// Whether this action adds to an existing position
    pub fn is_add(&self) -> bool {
        matches!(
            self,
            Action::Explicit { verb: Verb::Add, .. } | Action::Implicit(Verb::Add)
        )
    }

    /// Ledger operation implied by a resolved intent
    pub fn operation(&self, intent: &Intent) -> Operation {
        if intent.reduce_only {
            Operation::Close
        } else if self.is_add() {
            Operation::Add
        } else {
            Operation::Open
        }
    }
}

impl FromStr for Action {
    type Err = TradeError;

    /// Tokens are matched case-insensitively; for `verb_position` forms only
    /// the first two underscore-separated parts are significant.
    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim().to_lowercase();

        if token == "update_stop" {
            return Ok(Action::UpdateStop);
        }

        if token.contains('_') {
            let mut parts = token.split('_');
            let verb = parts.next().unwrap_or_default().parse::<Verb>()?;
            let position = match parts.next() {
                Some("long") => PositionType::Long,
                Some("short") => PositionType::Short,
                _ => return Err(unrecognized()),
            };
            return Ok(Action::Explicit { verb, position });
        }

        Ok(Action::Implicit(token.parse()?))
    }
}

fn unrecognized() -> TradeError {
    TradeError::Intent("unrecognized action".to_string())
}

/// Resolve an action against a ledger snapshot
pub fn resolve(action: &Action, state: &PositionState) -> Result<Intent> {
    let intent = match *action {
        Action::Explicit { verb, position } => match (verb, position) {
            (Verb::Buy, PositionType::Long) => Intent::new(Side::Buy, false, PositionType::Long),
            (Verb::Sell, PositionType::Long) => Intent::new(Side::Sell, true, PositionType::Long),
            (Verb::Sell, PositionType::Short) => {
                Intent::new(Side::Sell, false, PositionType::Short)
            }
            (Verb::Buy, PositionType::Short) => Intent::new(Side::Buy, true, PositionType::Short),
            (Verb::Add, PositionType::Long) => Intent::new(Side::Buy, false, PositionType::Long),
            (Verb::Add, PositionType::Short) => {
                Intent::new(Side::Sell, false, PositionType::Short)
            }
        },
        Action::Implicit(Verb::Buy) => {
            if state.short.is_open() {
                Intent::new(Side::Buy, true, PositionType::Short)
            } else {
                Intent::new(Side::Buy, false, PositionType::Long)
            }
        }
        Action::Implicit(Verb::Sell) => {
            if state.long.is_open() {
                Intent::new(Side::Sell, true, PositionType::Long)
            } else {
                Intent::new(Side::Sell, false, PositionType::Short)
            }
        }
        Action::Implicit(Verb::Add) => {
            if state.long.is_open() {
                Intent::new(Side::Buy, false, PositionType::Long)
            } else if state.short.is_open() {
                Intent::new(Side::Sell, false, PositionType::Short)
            } else {
                return Err(TradeError::Intent("no position to add to".to_string()));
            }
        }
        Action::UpdateStop => {
            return Err(TradeError::Intent(
                "update_stop does not place a trade".to_string(),
            ))
        }
    };

    Ok(intent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ledger::{OpenPosition, PositionSide};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn open_side() -> PositionSide {
        PositionSide::Open(OpenPosition {
            quantity: dec!(1),
            average_price: dec!(100),
            stop_loss: None,
            entry_time: Utc::now(),
        })
    }

    fn with_long() -> PositionState {
        PositionState {
            long: open_side(),
            ..Default::default()
        }
    }

    fn with_short() -> PositionState {
        PositionState {
            short: open_side(),
            ..Default::default()
        }
    }

    fn resolve_str(action: &str, state: &PositionState) -> Result<Intent> {
        resolve(&action.parse()?, state)
    }

    #[test]
    fn test_explicit_table_ignores_ledger() {
        let table = [
            ("buy_long", Side::Buy, false, PositionType::Long),
            ("sell_long", Side::Sell, true, PositionType::Long),
            ("sell_short", Side::Sell, false, PositionType::Short),
            ("buy_short", Side::Buy, true, PositionType::Short),
            ("add_long", Side::Buy, false, PositionType::Long),
            ("add_short", Side::Sell, false, PositionType::Short),
        ];

        for state in [PositionState::default(), with_long(), with_short()] {
            for (action, side, reduce_only, position) in table {
                let intent = resolve_str(action, &state).unwrap();
                assert_eq!(intent, Intent::new(side, reduce_only, position), "{}", action);
            }
        }
    }

    #[test]
    fn test_unrecognized_explicit() {
        for action in ["close_long", "buy_flat", "buy_", "hold"] {
            let err = resolve_str(action, &PositionState::default()).unwrap_err();
            assert!(
                matches!(&err, TradeError::Intent(msg) if msg == "unrecognized action"),
                "{}: {:?}",
                action,
                err
            );
        }
    }

    #[test]
    fn test_implicit_buy() {
        assert_eq!(
            resolve_str("buy", &PositionState::default()).unwrap(),
            Intent::new(Side::Buy, false, PositionType::Long)
        );
        assert_eq!(
            resolve_str("buy", &with_short()).unwrap(),
            Intent::new(Side::Buy, true, PositionType::Short)
        );
        assert_eq!(
            resolve_str("buy", &with_long()).unwrap(),
            Intent::new(Side::Buy, false, PositionType::Long)
        );
    }

    #[test]
    fn test_implicit_sell() {
        assert_eq!(
            resolve_str("sell", &PositionState::default()).unwrap(),
            Intent::new(Side::Sell, false, PositionType::Short)
        );
        assert_eq!(
            resolve_str("sell", &with_long()).unwrap(),
            Intent::new(Side::Sell, true, PositionType::Long)
        );
    }

    #[test]
    fn test_implicit_add() {
        assert_eq!(
            resolve_str("add", &with_long()).unwrap(),
            Intent::new(Side::Buy, false, PositionType::Long)
        );
        assert_eq!(
            resolve_str("add", &with_short()).unwrap(),
            Intent::new(Side::Sell, false, PositionType::Short)
        );

        let err = resolve_str("add", &PositionState::default()).unwrap_err();
        assert!(matches!(&err, TradeError::Intent(msg) if msg == "no position to add to"));
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("BUY_LONG".parse::<Action>().unwrap(), Action::Explicit {
            verb: Verb::Buy,
            position: PositionType::Long,
        });
        assert_eq!("update_stop".parse::<Action>().unwrap(), Action::UpdateStop);
        assert_eq!(" sell ".parse::<Action>().unwrap(), Action::Implicit(Verb::Sell));
    }

    #[test]
    fn test_operation_derivation() {
        let add: Action = "add_long".parse().unwrap();
        let open: Action = "buy_long".parse().unwrap();
        let close: Action = "sell_long".parse().unwrap();

        assert_eq!(add.operation(&resolve(&add, &with_long()).unwrap()), Operation::Add);
        assert_eq!(open.operation(&resolve(&open, &with_long()).unwrap()), Operation::Open);
        assert_eq!(close.operation(&resolve(&close, &with_long()).unwrap()), Operation::Close);
    }
}
