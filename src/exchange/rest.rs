//! REST execution gateway for the supported futures venues

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::auth::{binance_signature, sign_request, SigningInput, RECV_WINDOW_MS};
use super::messages::{check_ack, parse_fill_detail, parse_order_response, BybitEnvelope};
use super::symbols::venue_symbol;
use crate::common::errors::{Result, TradeError};
use crate::common::traits::{ExecutionGateway, ExecutionReport, OrderRequest, StopLossRequest};
use crate::common::types::{Exchange, Side};
use crate::config::types::{ApiCredentials, ExchangesConfig};
use crate::engine::params::ParamSet;

/// Bybit: leverage already at the requested value
const BYBIT_LEVERAGE_NOT_MODIFIED: i64 = 110043;

/// Production or sandbox REST root for a venue
pub fn default_base_url(exchange: Exchange, sandbox: bool) -> &'static str {
    match (exchange, sandbox) {
        (Exchange::Binance, false) => "https://fapi.binance.com",
        (Exchange::Binance, true) => "https://testnet.binancefuture.com",
        // OKX and Bitget route demo trading by header, not host
        (Exchange::Okx, _) => "https://www.okx.com",
        (Exchange::Bitget, _) => "https://api.bitget.com",
        (Exchange::Bybit, false) => "https://api.bybit.com",
        (Exchange::Bybit, true) => "https://api-testnet.bybit.com",
        (Exchange::Gate, false) => "https://api.gateio.ws",
        (Exchange::Gate, true) => "https://fx-api-testnet.gateio.ws",
        (Exchange::Kucoin, false) => "https://api-futures.kucoin.com",
        (Exchange::Kucoin, true) => "https://api-sandbox-futures.kucoin.com",
    }
}

#[derive(Debug, Clone)]
struct Venue {
    base_url: String,
    credentials: ApiCredentials,
}

/// A request before signing
struct VenueRequest<'a> {
    method: Method,
    path: &'a str,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl<'a> VenueRequest<'a> {
    fn new(method: Method, path: &'a str) -> Self {
        Self {
            method,
            path,
            query: Vec::new(),
            body: None,
        }
    }

    fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    fn params_as_query(mut self, params: &ParamSet) -> Self {
        for (key, value) in params.iter() {
            self.query.push((key.clone(), param_string(value)));
        }
        self
    }

    fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

fn param_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// JSON object with the venue parameters merged over the base fields
fn merge_params(base: Value, params: &ParamSet) -> Value {
    let mut object = match base {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (key, value) in params.iter() {
        object.insert(key.clone(), value.clone());
    }
    Value::Object(object)
}

fn decimal_string(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Gate and KuCoin trade whole contracts
fn whole_contracts(exchange: Exchange, quantity: Decimal) -> Result<i64> {
    if quantity.fract() != Decimal::ZERO || quantity < Decimal::ONE {
        return Err(TradeError::Execution(format!(
            "{} sizes are whole contracts, got {}",
            exchange, quantity
        )));
    }
    quantity
        .to_i64()
        .ok_or_else(|| TradeError::Execution(format!("contract size out of range: {}", quantity)))
}

fn unsupported(exchange: Exchange, what: &str) -> TradeError {
    TradeError::Execution(format!("{} is not supported on {}", what, exchange))
}

/// Signed REST client for every configured venue
#[derive(Debug, Clone)]
pub struct RestGateway {
    client: Client,
    venues: HashMap<Exchange, Venue>,
    sandbox: bool,
}

impl RestGateway {
    /// Create a gateway for every venue with credentials
    pub fn new(config: &ExchangesConfig, sandbox: bool) -> Result<Self> {
        Self::with_timeout(config, sandbox, Duration::from_secs(10))
    }

    /// Create a gateway with a custom HTTP timeout
    pub fn with_timeout(config: &ExchangesConfig, sandbox: bool, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TradeError::Internal(e.to_string()))?;

        let venues = Exchange::ALL
            .into_iter()
            .filter_map(|exchange| {
                let credentials = config.credentials(exchange)?;
                let base_url = config
                    .get(exchange)
                    .and_then(|c| c.rest_url.clone())
                    .unwrap_or_else(|| default_base_url(exchange, sandbox).to_string());
                Some((
                    exchange,
                    Venue {
                        base_url: base_url.trim_end_matches('/').to_string(),
                        credentials,
                    },
                ))
            })
            .collect();

        Ok(Self {
            client,
            venues,
            sandbox,
        })
    }

    /// Venues with credentials, in display order
    pub fn configured(&self) -> Vec<Exchange> {
        Exchange::ALL
            .into_iter()
            .filter(|exchange| self.venues.contains_key(exchange))
            .collect()
    }

    pub fn is_sandbox(&self) -> bool {
        self.sandbox
    }

    fn venue(&self, exchange: Exchange) -> Result<&Venue> {
        self.venues.get(&exchange).ok_or_else(|| {
            TradeError::Configuration(format!("exchange {} is not configured", exchange))
        })
    }

    /// Sign and send a request, returning the decoded JSON body
    async fn send(&self, exchange: Exchange, request: VenueRequest<'_>) -> Result<Value> {
        let venue = self.venue(exchange)?;
        let now = Utc::now();
        let body = match &request.body {
            Some(body) => serde_json::to_string(body)?,
            None => String::new(),
        };

        let mut query_pairs = request.query;
        if exchange == Exchange::Binance {
            query_pairs.push(("recvWindow".to_string(), RECV_WINDOW_MS.to_string()));
            query_pairs.push(("timestamp".to_string(), now.timestamp_millis().to_string()));
        }
        let mut query = serde_urlencoded::to_string(&query_pairs)
            .map_err(|e| TradeError::Internal(format!("Failed to encode query: {}", e)))?;
        if exchange == Exchange::Binance {
            let signature = binance_signature(&venue.credentials.api_secret, &query)?;
            query = format!("{}&signature={}", query, signature);
        }

        let headers = sign_request(
            exchange,
            &venue.credentials,
            &SigningInput {
                method: request.method.as_str(),
                path: request.path,
                query: &query,
                body: &body,
                now,
            },
        )?;

        let url = if query.is_empty() {
            format!("{}{}", venue.base_url, request.path)
        } else {
            format!("{}{}?{}", venue.base_url, request.path, query)
        };
        debug!(method = %request.method, path = request.path, "Sending {} request", exchange);

        let mut builder = headers.apply_to_request(self.client.request(request.method, &url));
        if !body.is_empty() {
            builder = builder.header(CONTENT_TYPE, "application/json").body(body);
        }
        if self.sandbox {
            builder = match exchange {
                Exchange::Okx => builder.header("x-simulated-trading", "1"),
                Exchange::Bitget => builder.header("paptrading", "1"),
                _ => builder,
            };
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TradeError::Authentication(
                    format!("{} returned status {}: {}", exchange, status, body),
                ),
                _ => TradeError::Execution(format!(
                    "{} returned status {}: {}",
                    exchange, status, body
                )),
            });
        }

        Ok(response.json().await?)
    }

    fn order_request<'a>(&self, order: &'a OrderRequest) -> Result<VenueRequest<'a>> {
        let symbol = venue_symbol(order.exchange, &order.symbol);
        let quantity = decimal_string(order.quantity);

        let request = match order.exchange {
            Exchange::Binance => VenueRequest::new(Method::POST, "/fapi/v1/order")
                .query("symbol", symbol)
                .query("side", order.side.to_string().to_uppercase())
                .query("type", "MARKET")
                .query("quantity", quantity)
                .query("newOrderRespType", "RESULT")
                .params_as_query(&order.params),
            Exchange::Okx => VenueRequest::new(Method::POST, "/api/v5/trade/order").json(merge_params(
                json!({
                    "instId": symbol,
                    "side": order.side.to_string(),
                    "ordType": "market",
                    "sz": quantity,
                }),
                &order.params,
            )),
            Exchange::Bybit => VenueRequest::new(Method::POST, "/v5/order/create").json(merge_params(
                json!({
                    "category": "linear",
                    "symbol": symbol,
                    "side": bybit_side(order.side),
                    "orderType": "Market",
                    "qty": quantity,
                }),
                &order.params,
            )),
            Exchange::Gate => {
                let contracts = whole_contracts(order.exchange, order.quantity)?;
                let size = match order.side {
                    Side::Buy => contracts,
                    Side::Sell => -contracts,
                };
                VenueRequest::new(Method::POST, "/api/v4/futures/usdt/orders").json(merge_params(
                    json!({
                        "contract": symbol,
                        "size": size,
                        "price": "0",
                    }),
                    &order.params,
                ))
            }
            Exchange::Bitget => {
                VenueRequest::new(Method::POST, "/api/v2/mix/order/place-order").json(merge_params(
                    json!({
                        "symbol": symbol,
                        "productType": "USDT-FUTURES",
                        "marginCoin": "USDT",
                        "size": quantity,
                        "side": order.side.to_string(),
                        "orderType": "market",
                    }),
                    &order.params,
                ))
            }
            Exchange::Kucoin => {
                let mut body = merge_params(
                    json!({
                        "clientOid": client_order_id(),
                        "symbol": symbol,
                        "side": order.side.to_string(),
                        "type": "market",
                        "size": whole_contracts(order.exchange, order.quantity)?,
                    }),
                    &order.params,
                );
                if let Value::Object(map) = &mut body {
                    map.entry("leverage").or_insert_with(|| json!(1));
                }
                VenueRequest::new(Method::POST, "/api/v1/orders").json(body)
            }
        };

        Ok(request)
    }

    fn stop_loss_request<'a>(&self, order: &'a StopLossRequest) -> Result<VenueRequest<'a>> {
        let symbol = venue_symbol(order.exchange, &order.symbol);
        let quantity = decimal_string(order.quantity);
        let stop_price = decimal_string(order.stop_price);

        match order.exchange {
            Exchange::Binance => Ok(VenueRequest::new(Method::POST, "/fapi/v1/order")
                .query("symbol", symbol)
                .query("side", order.side.to_string().to_uppercase())
                .query("type", "STOP_MARKET")
                .query("quantity", quantity)
                .query("stopPrice", stop_price)
                .query("newOrderRespType", "RESULT")
                .params_as_query(&order.params)),
            Exchange::Bybit => {
                // A sell stop protects a long and fires on a falling price
                let trigger_direction = match order.side {
                    Side::Buy => 1,
                    Side::Sell => 2,
                };
                Ok(VenueRequest::new(Method::POST, "/v5/order/create").json(merge_params(
                    json!({
                        "category": "linear",
                        "symbol": symbol,
                        "side": bybit_side(order.side),
                        "orderType": "Market",
                        "qty": quantity,
                        "triggerPrice": stop_price,
                        "triggerDirection": trigger_direction,
                        "reduceOnly": true,
                    }),
                    &order.params,
                )))
            }
            Exchange::Okx => Ok(VenueRequest::new(Method::POST, "/api/v5/trade/order-algo").json(
                merge_params(
                    json!({
                        "instId": symbol,
                        "side": order.side.to_string(),
                        "ordType": "conditional",
                        "sz": quantity,
                        "slTriggerPx": stop_price,
                        "slOrdPx": "-1",
                    }),
                    &order.params,
                ),
            )),
            other => Err(unsupported(other, "stop-loss order")),
        }
    }
}

impl RestGateway {
    /// Average fill of a placed order, for venues whose ack omits it
    ///
    /// Best effort: a failed lookup is logged and reported as unknown.
    async fn fetch_fill_price(&self, exchange: Exchange, symbol: &str, order_id: &str) -> Option<Decimal> {
        let instrument = venue_symbol(exchange, symbol);
        let kucoin_path;
        let request = match exchange {
            Exchange::Okx => VenueRequest::new(Method::GET, "/api/v5/trade/order")
                .query("instId", &instrument)
                .query("ordId", order_id),
            Exchange::Bybit => VenueRequest::new(Method::GET, "/v5/order/realtime")
                .query("category", "linear")
                .query("symbol", &instrument)
                .query("orderId", order_id),
            Exchange::Bitget => VenueRequest::new(Method::GET, "/api/v2/mix/order/detail")
                .query("symbol", &instrument)
                .query("productType", "USDT-FUTURES")
                .query("orderId", order_id),
            Exchange::Kucoin => {
                kucoin_path = format!("/api/v1/orders/{}", order_id);
                VenueRequest::new(Method::GET, &kucoin_path)
            }
            Exchange::Binance | Exchange::Gate => return None,
        };

        let detail = match self.send(exchange, request).await {
            Ok(raw) => parse_fill_detail(exchange, &raw),
            Err(e) => Err(e),
        };
        match detail {
            Ok(price) => price,
            Err(e) => {
                warn!(%exchange, order_id, error = %e, "Failed to fetch fill price");
                None
            }
        }
    }
}

fn bybit_side(side: Side) -> &'static str {
    match side {
        Side::Buy => "Buy",
        Side::Sell => "Sell",
    }
}

fn client_order_id() -> String {
    format!("wt{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

#[async_trait]
impl ExecutionGateway for RestGateway {
    fn is_configured(&self, exchange: Exchange) -> bool {
        self.venues.contains_key(&exchange)
    }

    #[instrument(skip(self))]
    async fn set_leverage(&self, exchange: Exchange, symbol: &str, leverage: u32) -> Result<()> {
        let instrument = venue_symbol(exchange, symbol);

        let request = match exchange {
            Exchange::Binance => VenueRequest::new(Method::POST, "/fapi/v1/leverage")
                .query("symbol", &instrument)
                .query("leverage", leverage),
            Exchange::Okx => VenueRequest::new(Method::POST, "/api/v5/account/set-leverage").json(json!({
                "instId": instrument,
                "lever": leverage.to_string(),
                "mgnMode": "cross",
            })),
            Exchange::Bybit => VenueRequest::new(Method::POST, "/v5/position/set-leverage").json(json!({
                "category": "linear",
                "symbol": instrument,
                "buyLeverage": leverage.to_string(),
                "sellLeverage": leverage.to_string(),
            })),
            Exchange::Gate => {
                let path = format!("/api/v4/futures/usdt/positions/{}/leverage", instrument);
                let raw = self
                    .send(
                        exchange,
                        VenueRequest::new(Method::POST, &path).query("leverage", leverage),
                    )
                    .await?;
                check_ack(exchange, &raw)?;
                info!(leverage, "Leverage set");
                return Ok(());
            }
            Exchange::Bitget => {
                VenueRequest::new(Method::POST, "/api/v2/mix/account/set-leverage").json(json!({
                    "symbol": instrument,
                    "productType": "USDT-FUTURES",
                    "marginCoin": "USDT",
                    "leverage": leverage.to_string(),
                }))
            }
            Exchange::Kucoin => {
                debug!("KuCoin leverage is sent with each order");
                return Ok(());
            }
        };

        let raw = self.send(exchange, request).await?;
        if exchange == Exchange::Bybit {
            if let Ok(envelope) = serde_json::from_value::<BybitEnvelope>(raw.clone()) {
                if envelope.ret_code == BYBIT_LEVERAGE_NOT_MODIFIED {
                    debug!(leverage, "Leverage already set");
                    return Ok(());
                }
            }
        }
        check_ack(exchange, &raw)?;
        info!(leverage, "Leverage set");
        Ok(())
    }

    #[instrument(skip(self, order), fields(exchange = %order.exchange, symbol = %order.symbol, side = %order.side))]
    async fn place_order(&self, order: &OrderRequest) -> Result<ExecutionReport> {
        let request = self.order_request(order)?;
        let raw = self.send(order.exchange, request).await?;
        let mut report = parse_order_response(order.exchange, raw)?;
        if report.average_price.is_none() {
            if let Some(order_id) = report.order_id.as_deref() {
                report.average_price = self.fetch_fill_price(order.exchange, &order.symbol, order_id).await;
            }
        }
        info!(
            order_id = report.order_id.as_deref().unwrap_or("-"),
            quantity = %order.quantity,
            reduce_only = order.reduce_only,
            "Order placed"
        );
        Ok(report)
    }

    #[instrument(skip(self, order), fields(exchange = %order.exchange, symbol = %order.symbol))]
    async fn place_stop_loss(&self, order: &StopLossRequest) -> Result<ExecutionReport> {
        let request = self.stop_loss_request(order)?;
        let raw = self.send(order.exchange, request).await?;
        let report = parse_order_response(order.exchange, raw)?;
        info!(stop_price = %order.stop_price, "Stop loss placed");
        Ok(report)
    }

    #[instrument(skip(self, order), fields(exchange = %order.exchange, symbol = %order.symbol))]
    async fn replace_stop_loss(&self, order: &StopLossRequest) -> Result<ExecutionReport> {
        if order.exchange != Exchange::Binance {
            return Err(unsupported(order.exchange, "stop-loss replacement"));
        }

        let symbol = venue_symbol(order.exchange, &order.symbol);
        let raw = self
            .send(
                order.exchange,
                VenueRequest::new(Method::DELETE, "/fapi/v1/allOpenOrders").query("symbol", symbol),
            )
            .await?;
        check_ack(order.exchange, &raw)?;
        debug!("Cancelled open orders before replacing stop");

        self.place_stop_loss(order).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::ExchangeConfig;
    use rust_decimal_macros::dec;

    fn config_with(exchange: Exchange) -> ExchangesConfig {
        let mut config = ExchangesConfig::default();
        config.set(
            exchange,
            Some(ExchangeConfig {
                api_key: "key".to_string(),
                api_secret: "secret".to_string(),
                api_passphrase: Some("pass".to_string()),
                rest_url: None,
            }),
        );
        config
    }

    #[test]
    fn test_only_credentialed_venues_are_configured() {
        let gateway = RestGateway::new(&config_with(Exchange::Bybit), false).unwrap();
        assert!(gateway.is_configured(Exchange::Bybit));
        assert!(!gateway.is_configured(Exchange::Binance));
        assert_eq!(gateway.configured(), vec![Exchange::Bybit]);
    }

    #[test]
    fn test_sandbox_urls() {
        assert_eq!(default_base_url(Exchange::Binance, true), "https://testnet.binancefuture.com");
        assert_eq!(default_base_url(Exchange::Bybit, true), "https://api-testnet.bybit.com");
        assert_eq!(default_base_url(Exchange::Okx, true), default_base_url(Exchange::Okx, false));

        let gateway = RestGateway::new(&config_with(Exchange::Gate), true).unwrap();
        assert!(gateway.is_sandbox());
        assert_eq!(
            gateway.venue(Exchange::Gate).unwrap().base_url,
            "https://fx-api-testnet.gateio.ws"
        );
    }

    #[test]
    fn test_whole_contracts() {
        assert_eq!(whole_contracts(Exchange::Gate, dec!(3)).unwrap(), 3);
        assert_eq!(whole_contracts(Exchange::Gate, dec!(3.00)).unwrap(), 3);
        assert!(whole_contracts(Exchange::Gate, dec!(0.5)).is_err());
        assert!(whole_contracts(Exchange::Kucoin, dec!(1.5)).is_err());
    }

    #[test]
    fn test_merge_params_overrides_base() {
        let params = ParamSet::new().with("reduceOnly", true).with("qty", "2");
        let merged = merge_params(json!({"qty": "1", "symbol": "BTCUSDT"}), &params);
        assert_eq!(merged, json!({"qty": "2", "symbol": "BTCUSDT", "reduceOnly": true}));
    }

    #[tokio::test]
    async fn test_unsupported_stop_replacement() {
        let gateway = RestGateway::new(&config_with(Exchange::Gate), false).unwrap();
        let err = gateway
            .replace_stop_loss(&StopLossRequest {
                exchange: Exchange::Gate,
                symbol: "BTC/USDT:USDT".to_string(),
                side: Side::Sell,
                quantity: dec!(1),
                stop_price: dec!(90),
                params: ParamSet::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::Execution(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_venue_is_configuration_error() {
        let gateway = RestGateway::new(&ExchangesConfig::default(), false).unwrap();
        let err = gateway.set_leverage(Exchange::Okx, "BTC/USDT:USDT", 5).await.unwrap_err();
        assert!(matches!(err, TradeError::Configuration(_)));
    }
}
