//! Venue response bodies
//!
//! Binance and Gate answer with the order itself and signal errors through
//! the HTTP status. OKX, Bybit, Bitget and KuCoin wrap everything in an
//! envelope whose `code` must be checked even on HTTP 200. Their placement
//! acks carry no fill price, so the average fill comes from a follow-up
//! order-detail query parsed by [`parse_fill_detail`].

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::common::errors::{Result, TradeError};
use crate::common::serde_helpers::deserialize_optional_decimal;
use crate::common::traits::ExecutionReport;
use crate::common::types::Exchange;

/// Binance futures order
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceOrder {
    pub order_id: i64,
    #[serde(default)]
    pub avg_price: Option<String>,
}

/// Gate futures order
#[derive(Debug, Clone, Deserialize)]
pub struct GateOrder {
    pub id: i64,
    #[serde(default)]
    pub fill_price: Option<String>,
}

/// OKX `{code, msg, data: [..]}` envelope
#[derive(Debug, Clone, Deserialize)]
pub struct OkxEnvelope<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Per-order result inside an OKX envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxOrderAck {
    #[serde(default)]
    pub ord_id: Option<String>,
    #[serde(default)]
    pub algo_id: Option<String>,
    #[serde(default)]
    pub s_code: Option<String>,
    #[serde(default)]
    pub s_msg: Option<String>,
}

/// Bybit v5 `{retCode, retMsg, result}` envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitEnvelope {
    pub ret_code: i64,
    #[serde(default)]
    pub ret_msg: String,
    #[serde(default)]
    pub result: Value,
}

/// Bitget `{code: "00000"}` and KuCoin `{code: "200000"}` envelopes
#[derive(Debug, Clone, Deserialize)]
pub struct CodeEnvelope {
    pub code: String,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderIdData {
    #[serde(default)]
    order_id: Option<String>,
}

/// Parse a price string, treating zero and empty as "not reported"
pub fn parse_fill_price(raw: Option<&str>) -> Option<Decimal> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<Decimal>().ok())
        .filter(|p| *p > Decimal::ZERO)
}

fn rejected(exchange: Exchange, code: impl std::fmt::Display, message: &str) -> TradeError {
    TradeError::Execution(format!("{} rejected request ({}): {}", exchange, code, message))
}

fn decode<T: for<'de> Deserialize<'de>>(exchange: Exchange, raw: &Value) -> Result<T> {
    serde_json::from_value(raw.clone()).map_err(|e| {
        TradeError::InvalidResponse(format!("unexpected {} response: {} ({})", exchange, e, raw))
    })
}

/// Fail when a 200 response still carries a venue error code
pub fn check_ack(exchange: Exchange, raw: &Value) -> Result<()> {
    match exchange {
        Exchange::Binance | Exchange::Gate => Ok(()),
        Exchange::Okx => {
            let envelope: OkxEnvelope<OkxOrderAck> = decode(exchange, raw)?;
            if envelope.code != "0" {
                let detail = envelope
                    .data
                    .first()
                    .and_then(|ack| ack.s_msg.clone())
                    .filter(|m| !m.is_empty())
                    .unwrap_or(envelope.msg);
                return Err(rejected(exchange, envelope.code, &detail));
            }
            Ok(())
        }
        Exchange::Bybit => {
            let envelope: BybitEnvelope = decode(exchange, raw)?;
            if envelope.ret_code != 0 {
                return Err(rejected(exchange, envelope.ret_code, &envelope.ret_msg));
            }
            Ok(())
        }
        Exchange::Bitget | Exchange::Kucoin => {
            let envelope: CodeEnvelope = decode(exchange, raw)?;
            let ok = if exchange == Exchange::Bitget { "00000" } else { "200000" };
            if envelope.code != ok {
                return Err(rejected(
                    exchange,
                    &envelope.code,
                    envelope.msg.as_deref().unwrap_or_default(),
                ));
            }
            Ok(())
        }
    }
}

/// Turn an order placement response into an [`ExecutionReport`]
pub fn parse_order_response(exchange: Exchange, raw: Value) -> Result<ExecutionReport> {
    check_ack(exchange, &raw)?;

    let (order_id, average_price) = match exchange {
        Exchange::Binance => {
            let order: BinanceOrder = decode(exchange, &raw)?;
            (Some(order.order_id.to_string()), parse_fill_price(order.avg_price.as_deref()))
        }
        Exchange::Gate => {
            let order: GateOrder = decode(exchange, &raw)?;
            (Some(order.id.to_string()), parse_fill_price(order.fill_price.as_deref()))
        }
        Exchange::Okx => {
            let envelope: OkxEnvelope<OkxOrderAck> = decode(exchange, &raw)?;
            let order_id = envelope
                .data
                .into_iter()
                .next()
                .and_then(|ack| ack.ord_id.or(ack.algo_id));
            (order_id, None)
        }
        Exchange::Bybit => {
            let envelope: BybitEnvelope = decode(exchange, &raw)?;
            let data: OrderIdData = decode(exchange, &envelope.result)?;
            (data.order_id, None)
        }
        Exchange::Bitget | Exchange::Kucoin => {
            let envelope: CodeEnvelope = decode(exchange, &raw)?;
            let data: OrderIdData = decode(exchange, &envelope.data)?;
            (data.order_id, None)
        }
    };

    Ok(ExecutionReport {
        order_id,
        average_price,
        raw,
    })
}

/// OKX `GET /api/v5/trade/order` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxOrderDetail {
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub avg_px: Option<Decimal>,
}

/// Bybit `GET /v5/order/realtime` result
#[derive(Debug, Clone, Deserialize)]
pub struct BybitOrderList {
    #[serde(default)]
    pub list: Vec<BybitOrderDetail>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitOrderDetail {
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub avg_price: Option<Decimal>,
}

/// Bitget `GET /api/v2/mix/order/detail` data
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetOrderDetail {
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub price_avg: Option<Decimal>,
}

/// KuCoin `GET /api/v1/orders/{id}` data
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KucoinOrderDetail {
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub avg_deal_price: Option<Decimal>,
}

/// Average fill price from an order-detail response
///
/// `None` while the order has no fills yet. Binance and Gate report the
/// fill on placement and have no detail format here.
pub fn parse_fill_detail(exchange: Exchange, raw: &Value) -> Result<Option<Decimal>> {
    check_ack(exchange, raw)?;

    let price = match exchange {
        Exchange::Binance | Exchange::Gate => None,
        Exchange::Okx => {
            let envelope: OkxEnvelope<OkxOrderDetail> = decode(exchange, raw)?;
            envelope.data.into_iter().next().and_then(|d| d.avg_px)
        }
        Exchange::Bybit => {
            let envelope: BybitEnvelope = decode(exchange, raw)?;
            let orders: BybitOrderList = decode(exchange, &envelope.result)?;
            orders.list.into_iter().next().and_then(|d| d.avg_price)
        }
        Exchange::Bitget => {
            let envelope: CodeEnvelope = decode(exchange, raw)?;
            decode::<BitgetOrderDetail>(exchange, &envelope.data)?.price_avg
        }
        Exchange::Kucoin => {
            let envelope: CodeEnvelope = decode(exchange, raw)?;
            decode::<KucoinOrderDetail>(exchange, &envelope.data)?.avg_deal_price
        }
    };

    Ok(price.filter(|p| *p > Decimal::ZERO))
}
