//! Common test utilities and fixtures

#![allow(dead_code)]

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use webhook_trader::common::types::{Exchange, PositionMode, PositionType, Side};
use webhook_trader::common::traits::{OrderRequest, StopLossRequest};
use webhook_trader::config::types::{ExchangeConfig, ExchangesConfig};
use webhook_trader::engine::params::{OrderContext, ParamRegistry};
use webhook_trader::notify::{Notification, NotificationEvent};

pub const UNIFIED_BTC: &str = "BTC/USDT:USDT";

/// Credentials for one venue pointed at a mock server
pub fn exchange_config(base_url: &str) -> ExchangeConfig {
    ExchangeConfig {
        api_key: "test_api_key".to_string(),
        api_secret: "test_api_secret".to_string(),
        api_passphrase: Some("test_passphrase".to_string()),
        rest_url: Some(base_url.to_string()),
    }
}

/// Exchanges config with a single venue enabled
pub fn exchanges_with(exchange: Exchange, base_url: &str) -> ExchangesConfig {
    let mut config = ExchangesConfig::default();
    config.set(exchange, Some(exchange_config(base_url)));
    config
}

/// Market order carrying the default venue parameters
pub fn market_order(exchange: Exchange, side: Side, quantity: Decimal, reduce_only: bool) -> OrderRequest {
    let params = ParamRegistry::with_defaults()
        .build(
            exchange,
            &OrderContext {
                side,
                reduce_only,
                mode: PositionMode::OneWay,
                leverage: None,
            },
        )
        .expect("builder registered");

    OrderRequest {
        exchange,
        symbol: UNIFIED_BTC.to_string(),
        side,
        quantity,
        reduce_only,
        params,
    }
}

/// Stop protecting a one-way long
pub fn long_stop(exchange: Exchange, quantity: Decimal, stop_price: Decimal) -> StopLossRequest {
    let order = market_order(exchange, Side::Sell, quantity, true);
    StopLossRequest {
        exchange,
        symbol: order.symbol,
        side: Side::Sell,
        quantity,
        stop_price,
        params: order.params,
    }
}

/// Alert body as a charting tool would send it
pub fn alert_json(action: &str, qty: &str, exchange: &str) -> Value {
    json!({
        "action": action,
        "symbol": "BTCUSDT",
        "qty": qty,
        "exchange": exchange,
        "strategy": "trend"
    })
}

pub fn opened_long() -> Notification {
    Notification {
        exchange: Exchange::Okx,
        symbol: "BTCUSDT".to_string(),
        event: NotificationEvent::Opened,
        position_type: PositionType::Long,
        quantity: dec!(0.5),
        price: Some(dec!(65000)),
        mode: PositionMode::OneWay,
        stop_loss: Some(dec!(64000)),
        leverage: Some(5),
        position_quantity: dec!(0.5),
        strategy: "trend".to_string(),
        timestamp: Utc::now(),
    }
}

/// Venue response bodies
pub mod responses {
    use serde_json::{json, Value};

    pub fn binance_filled(order_id: i64, avg_price: &str) -> Value {
        json!({
            "orderId": order_id,
            "symbol": "BTCUSDT",
            "status": "FILLED",
            "avgPrice": avg_price,
            "executedQty": "1",
            "type": "MARKET"
        })
    }

    pub fn binance_error(code: i64, msg: &str) -> Value {
        json!({ "code": code, "msg": msg })
    }

    pub fn okx_accepted(ord_id: &str) -> Value {
        json!({
            "code": "0",
            "msg": "",
            "data": [{ "ordId": ord_id, "clOrdId": "", "sCode": "0", "sMsg": "Order placed" }]
        })
    }

    pub fn okx_order_detail(avg_px: &str) -> Value {
        json!({
            "code": "0",
            "msg": "",
            "data": [{ "ordId": "312269865356374016", "instId": "BTC-USDT-SWAP", "avgPx": avg_px, "state": "filled" }]
        })
    }

    pub fn bybit(ret_code: i64, ret_msg: &str, result: Value) -> Value {
        json!({ "retCode": ret_code, "retMsg": ret_msg, "result": result, "time": 1700000000000i64 })
    }

    pub fn gate_filled(id: i64, fill_price: &str) -> Value {
        json!({ "id": id, "contract": "BTC_USDT", "size": -2, "fill_price": fill_price, "status": "finished" })
    }

    pub fn telegram_ok() -> Value {
        json!({ "ok": true, "result": { "message_id": 1 } })
    }
}
