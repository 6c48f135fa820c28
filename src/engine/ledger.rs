//! Position ledger
//!
//! In-memory map from (exchange, symbol, strategy) to long/short exposure.
//! Entries are created on first touch and never removed; a fully closed
//! key stays behind as a zeroed record.
//!
//! Two locks are involved:
//! - `states` guards the map itself and is only held for the duration of a
//!   single read or mutation.
//! - `key_locks` hands out one async mutex per key. The orchestrator holds
//!   it from intent resolution until the ledger update, so two alerts for
//!   the same key cannot interleave around the gateway call.
//!
//! Neither map is pruned. Every well-formed alert adds a lock entry for its
//! key, including alerts that later fail intent resolution, so memory grows
//! with the number of distinct (exchange, symbol, strategy) triples seen
//! since startup.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

use super::mode::detect_mode;
use crate::common::errors::{Result, TradeError};
use crate::common::types::{Exchange, Operation, PositionMode, PositionType};

/// Ledger lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey {
    pub exchange: Exchange,
    pub symbol: String,
    pub strategy: String,
}

impl PositionKey {
    pub fn new(exchange: Exchange, symbol: impl Into<String>, strategy: impl Into<String>) -> Self {
        Self {
            exchange,
            symbol: symbol.into(),
            strategy: strategy.into(),
        }
    }
}

impl std::fmt::Display for PositionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{}", self.exchange, self.symbol, self.strategy)
    }
}

/// Open exposure on one side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenPosition {
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub entry_time: DateTime<Utc>,
}

/// One side of a position; `Open` always carries a positive quantity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PositionSide {
    #[default]
    Empty,
    Open(OpenPosition),
}

impl PositionSide {
    pub fn is_open(&self) -> bool {
        matches!(self, PositionSide::Open(p) if p.quantity > Decimal::ZERO)
    }

    pub fn as_open(&self) -> Option<&OpenPosition> {
        match self {
            PositionSide::Open(p) => Some(p),
            PositionSide::Empty => None,
        }
    }

    /// Open quantity, zero when empty
    pub fn quantity(&self) -> Decimal {
        self.as_open().map(|p| p.quantity).unwrap_or_default()
    }
}

/// Long and short exposure plus detected mode for one key
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PositionState {
    pub long: PositionSide,
    pub short: PositionSide,
    pub mode: PositionMode,
}

/// A single ledger mutation
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerUpdate {
    pub position_type: PositionType,
    pub quantity: Decimal,
    pub price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub operation: Operation,
    pub partial: bool,
}

impl PositionState {
    pub fn side(&self, position_type: PositionType) -> &PositionSide {
        match position_type {
            PositionType::Long => &self.long,
            PositionType::Short => &self.short,
        }
    }

    fn side_mut(&mut self, position_type: PositionType) -> &mut PositionSide {
        match position_type {
            PositionType::Long => &mut self.long,
            PositionType::Short => &mut self.short,
        }
    }

    /// Whether either side holds exposure
    pub fn has_exposure(&self) -> bool {
        self.long.is_open() || self.short.is_open()
    }

    /// Apply a mutation and re-evaluate the mode
    pub fn apply(&mut self, key: &PositionKey, update: &LedgerUpdate, now: DateTime<Utc>) -> Result<()> {
        if update.quantity <= Decimal::ZERO {
            return Err(TradeError::Ledger(format!(
                "quantity must be positive, got {}",
                update.quantity
            )));
        }

        let position_type = update.position_type;
        let side = self.side_mut(position_type);

        match update.operation {
            Operation::Open | Operation::Add => match side {
                PositionSide::Open(existing) if existing.quantity > Decimal::ZERO => {
                    let old_quantity = existing.quantity;
                    let new_quantity = old_quantity + update.quantity;
                    existing.average_price = (old_quantity * existing.average_price
                        + update.quantity * update.price)
                        / new_quantity;
                    existing.quantity = new_quantity;
                    if update.stop_loss.is_some() {
                        existing.stop_loss = update.stop_loss;
                    }
                    info!(
                        key = %key,
                        side = %position_type,
                        from = %old_quantity,
                        to = %new_quantity,
                        average_price = %existing.average_price,
                        "Added to position"
                    );
                }
                _ => {
                    *side = PositionSide::Open(OpenPosition {
                        quantity: update.quantity,
                        average_price: update.price,
                        stop_loss: update.stop_loss,
                        entry_time: now,
                    });
                    info!(
                        key = %key,
                        side = %position_type,
                        quantity = %update.quantity,
                        price = %update.price,
                        "Opened position"
                    );
                }
            },
            Operation::Close => {
                let current = match side {
                    PositionSide::Open(existing) if existing.quantity > Decimal::ZERO => existing,
                    _ => {
                        return Err(TradeError::Ledger(format!(
                            "no such position: {} {}",
                            key, position_type
                        )))
                    }
                };

                let current_quantity = current.quantity;
                if update.partial && update.quantity < current_quantity {
                    current.quantity -= update.quantity;
                    info!(
                        key = %key,
                        side = %position_type,
                        closed = %update.quantity,
                        remaining = %current.quantity,
                        "Partially closed position"
                    );
                } else {
                    *side = PositionSide::Empty;
                    info!(
                        key = %key,
                        side = %position_type,
                        requested = %update.quantity,
                        held = %current_quantity,
                        "Closed position"
                    );
                }
            }
        }

        let (has_long, has_short) = (self.long.is_open(), self.short.is_open());
        self.mode = detect_mode(key, self.mode, has_long, has_short);
        Ok(())
    }
}

/// Shared position ledger
#[derive(Debug, Default)]
pub struct Ledger {
    states: Mutex<HashMap<PositionKey, PositionState>>,
    key_locks: Mutex<HashMap<PositionKey, Arc<Mutex<()>>>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the critical section for a key
    ///
    /// Hold the guard across read-decide-execute-update sequences.
    pub async fn lock_key(&self, key: &PositionKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.key_locks.lock().await;
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Current state for a key, creating a zeroed record on first touch
    pub async fn snapshot(&self, key: &PositionKey) -> PositionState {
        let mut states = self.states.lock().await;
        states.entry(key.clone()).or_default().clone()
    }

    /// Apply an open/add/close to a key and return the resulting state
    pub async fn update_position(&self, key: &PositionKey, update: &LedgerUpdate) -> Result<PositionState> {
        let mut states = self.states.lock().await;
        let state = states.entry(key.clone()).or_default();
        state.apply(key, update, Utc::now())?;
        Ok(state.clone())
    }

    /// Replace the stop-loss of an open side
    pub async fn set_stop_loss(
        &self,
        key: &PositionKey,
        position_type: PositionType,
        stop_loss: Decimal,
    ) -> Result<PositionState> {
        let mut states = self.states.lock().await;
        let state = states.entry(key.clone()).or_default();
        match state.side_mut(position_type) {
            PositionSide::Open(existing) => {
                existing.stop_loss = Some(stop_loss);
                info!(key = %key, side = %position_type, stop_loss = %stop_loss, "Updated stop loss");
                Ok(state.clone())
            }
            PositionSide::Empty => Err(TradeError::Ledger(format!(
                "no such position: {} {}",
                key, position_type
            ))),
        }
    }

    #[cfg(test)]
    async fn lock_count(&self) -> usize {
        self.key_locks.lock().await.len()
    }

    /// Keys holding exposure on at least one side, ordered by key
    pub async fn open_positions(&self) -> Vec<(PositionKey, PositionState)> {
        let states = self.states.lock().await;
        let mut open: Vec<_> = states
            .iter()
            .filter(|(_, state)| state.has_exposure())
            .map(|(key, state)| (key.clone(), state.clone()))
            .collect();
        open.sort_by(|a, b| a.0.cmp(&b.0));
        open
    }

    /// Number of keys holding exposure
    pub async fn position_count(&self) -> usize {
        let states = self.states.lock().await;
        states.values().filter(|state| state.has_exposure()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn key() -> PositionKey {
        PositionKey::new(Exchange::Binance, "BTC/USDT:USDT", "default")
    }

    fn update(
        position_type: PositionType,
        operation: Operation,
        quantity: Decimal,
        price: Decimal,
    ) -> LedgerUpdate {
        LedgerUpdate {
            position_type,
            quantity,
            price,
            stop_loss: None,
            operation,
            partial: false,
        }
    }

    #[tokio::test]
    async fn test_open_then_add_weighted_average() {
        let ledger = Ledger::new();
        ledger
            .update_position(&key(), &update(PositionType::Long, Operation::Open, dec!(1), dec!(100)))
            .await
            .unwrap();
        let state = ledger
            .update_position(&key(), &update(PositionType::Long, Operation::Add, dec!(1), dec!(110)))
            .await
            .unwrap();

        let long = state.long.as_open().unwrap();
        assert_eq!(long.quantity, dec!(2));
        assert_eq!(long.average_price, dec!(105));
        assert_eq!(state.mode, PositionMode::OneWay);
    }

    #[test]
    fn test_weighted_average_uneven() {
        let mut state = PositionState::default();
        let now = Utc::now();
        state
            .apply(&key(), &update(PositionType::Short, Operation::Open, dec!(3), dec!(200)), now)
            .unwrap();
        state
            .apply(&key(), &update(PositionType::Short, Operation::Add, dec!(1), dec!(100)), now)
            .unwrap();

        let short = state.short.as_open().unwrap();
        assert_eq!(short.quantity, dec!(4));
        assert_eq!(short.average_price, dec!(175));
    }

    #[test]
    fn test_stop_loss_only_overwritten_when_supplied() {
        let mut state = PositionState::default();
        let now = Utc::now();
        let mut open = update(PositionType::Long, Operation::Open, dec!(1), dec!(100));
        open.stop_loss = Some(dec!(90));
        state.apply(&key(), &open, now).unwrap();

        state
            .apply(&key(), &update(PositionType::Long, Operation::Add, dec!(1), dec!(100)), now)
            .unwrap();
        assert_eq!(state.long.as_open().unwrap().stop_loss, Some(dec!(90)));

        let mut add = update(PositionType::Long, Operation::Add, dec!(1), dec!(100));
        add.stop_loss = Some(dec!(95));
        state.apply(&key(), &add, now).unwrap();
        assert_eq!(state.long.as_open().unwrap().stop_loss, Some(dec!(95)));
    }

    #[test]
    fn test_partial_close() {
        let mut state = PositionState::default();
        let now = Utc::now();
        let mut open = update(PositionType::Long, Operation::Open, dec!(5), dec!(100));
        open.stop_loss = Some(dec!(90));
        state.apply(&key(), &open, now).unwrap();

        let mut close = update(PositionType::Long, Operation::Close, dec!(2), dec!(120));
        close.partial = true;
        state.apply(&key(), &close, now).unwrap();

        let long = state.long.as_open().unwrap();
        assert_eq!(long.quantity, dec!(3));
        assert_eq!(long.average_price, dec!(100));
        assert_eq!(long.stop_loss, Some(dec!(90)));
    }

    #[test]
    fn test_partial_overshoot_closes_fully() {
        for quantity in [dec!(5), dec!(7)] {
            let mut state = PositionState::default();
            let now = Utc::now();
            state
                .apply(&key(), &update(PositionType::Long, Operation::Open, dec!(5), dec!(100)), now)
                .unwrap();

            let mut close = update(PositionType::Long, Operation::Close, quantity, dec!(100));
            close.partial = true;
            state.apply(&key(), &close, now).unwrap();
            assert_eq!(state.long, PositionSide::Empty);
        }
    }

    #[test]
    fn test_non_partial_close_clears_side() {
        let mut state = PositionState::default();
        let now = Utc::now();
        state
            .apply(&key(), &update(PositionType::Long, Operation::Open, dec!(5), dec!(100)), now)
            .unwrap();
        state
            .apply(&key(), &update(PositionType::Long, Operation::Close, dec!(1), dec!(100)), now)
            .unwrap();
        assert_eq!(state.long, PositionSide::Empty);
        assert_eq!(state.long.quantity(), Decimal::ZERO);
    }

    #[test]
    fn test_close_missing_side_fails() {
        let mut state = PositionState::default();
        let err = state
            .apply(
                &key(),
                &update(PositionType::Short, Operation::Close, dec!(1), dec!(100)),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, TradeError::Ledger(_)));
        assert_eq!(state, PositionState::default());
    }

    #[test]
    fn test_reopen_after_close() {
        let mut state = PositionState::default();
        let now = Utc::now();
        state
            .apply(&key(), &update(PositionType::Long, Operation::Open, dec!(1), dec!(100)), now)
            .unwrap();
        state
            .apply(&key(), &update(PositionType::Long, Operation::Close, dec!(1), dec!(100)), now)
            .unwrap();
        state
            .apply(&key(), &update(PositionType::Long, Operation::Open, dec!(2), dec!(50)), now)
            .unwrap();

        let long = state.long.as_open().unwrap();
        assert_eq!(long.quantity, dec!(2));
        assert_eq!(long.average_price, dec!(50));
    }

    #[test]
    fn test_hedge_is_sticky() {
        let mut state = PositionState::default();
        let now = Utc::now();
        state
            .apply(&key(), &update(PositionType::Long, Operation::Open, dec!(1), dec!(100)), now)
            .unwrap();
        assert_eq!(state.mode, PositionMode::OneWay);

        state
            .apply(&key(), &update(PositionType::Short, Operation::Open, dec!(1), dec!(101)), now)
            .unwrap();
        assert_eq!(state.mode, PositionMode::Hedge);

        state
            .apply(&key(), &update(PositionType::Long, Operation::Close, dec!(1), dec!(100)), now)
            .unwrap();
        state
            .apply(&key(), &update(PositionType::Short, Operation::Close, dec!(1), dec!(100)), now)
            .unwrap();
        state
            .apply(&key(), &update(PositionType::Long, Operation::Open, dec!(1), dec!(100)), now)
            .unwrap();
        assert_eq!(state.mode, PositionMode::Hedge);
    }

    #[tokio::test]
    async fn test_key_locks_outlive_their_guards() {
        let ledger = Ledger::new();
        let other = PositionKey::new(Exchange::Binance, "ETH/USDT:USDT", "default");

        drop(ledger.lock_key(&key()).await);
        drop(ledger.lock_key(&other).await);
        drop(ledger.lock_key(&key()).await);

        assert_eq!(ledger.lock_count().await, 2);
        assert_eq!(ledger.position_count().await, 0);
    }

    #[tokio::test]
    async fn test_emptied_key_is_kept_but_not_listed() {
        let ledger = Ledger::new();
        ledger
            .update_position(&key(), &update(PositionType::Long, Operation::Open, dec!(1), dec!(100)))
            .await
            .unwrap();
        assert_eq!(ledger.position_count().await, 1);

        ledger
            .update_position(&key(), &update(PositionType::Long, Operation::Close, dec!(1), dec!(100)))
            .await
            .unwrap();
        assert_eq!(ledger.position_count().await, 0);
        assert!(ledger.open_positions().await.is_empty());

        let snapshot = ledger.snapshot(&key()).await;
        assert_eq!(snapshot.mode, PositionMode::OneWay);
        assert_eq!(snapshot.long, PositionSide::Empty);
    }

    #[tokio::test]
    async fn test_set_stop_loss_requires_open_side() {
        let ledger = Ledger::new();
        assert!(ledger
            .set_stop_loss(&key(), PositionType::Long, dec!(90))
            .await
            .is_err());

        ledger
            .update_position(&key(), &update(PositionType::Long, Operation::Open, dec!(1), dec!(100)))
            .await
            .unwrap();
        let state = ledger
            .set_stop_loss(&key(), PositionType::Long, dec!(95))
            .await
            .unwrap();
        assert_eq!(state.long.as_open().unwrap().stop_loss, Some(dec!(95)));
    }

    #[tokio::test]
    async fn test_concurrent_adds_do_not_lose_updates() {
        let ledger = Arc::new(Ledger::new());
        ledger
            .update_position(&key(), &update(PositionType::Long, Operation::Open, dec!(1), dec!(100)))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                let _guard = ledger.lock_key(&key()).await;
                ledger
                    .update_position(&key(), &update(PositionType::Long, Operation::Add, dec!(1), dec!(100)))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let long = ledger.snapshot(&key()).await.long;
        assert_eq!(long.quantity(), dec!(21));
        assert_eq!(long.as_open().unwrap().average_price, dec!(100));
    }
}
