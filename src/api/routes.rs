//! HTTP routes
//!
//! - `POST /webhook` - execute an alert
//! - `GET /positions` - open positions keyed `exchange_symbol_strategy`
//! - `GET /health` - liveness, sandbox flag and configured venues
//! - `GET /` - plain-text banner

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use crate::common::errors::TradeError;
use crate::common::types::Exchange;
use crate::engine::alert::Alert;
use crate::engine::ledger::PositionState;
use crate::engine::orchestrator::{AlertOutcome, SignalOrchestrator};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SignalOrchestrator>,
    pub sandbox: bool,
}

impl AppState {
    pub fn new(orchestrator: Arc<SignalOrchestrator>, sandbox: bool) -> Self {
        Self {
            orchestrator,
            sandbox,
        }
    }

    fn mode_label(&self) -> &'static str {
        if self.sandbox {
            "testnet"
        } else {
            "production"
        }
    }

    fn enabled_exchanges(&self) -> BTreeMap<String, bool> {
        Exchange::ALL
            .into_iter()
            .map(|exchange| (exchange.to_string(), self.orchestrator.is_enabled(exchange)))
            .collect()
    }
}

/// Body of a handled alert
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Body of `GET /health`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub mode: String,
    pub time: DateTime<Utc>,
    pub exchanges: BTreeMap<String, bool>,
    pub positions: usize,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/webhook", post(webhook))
        .route("/positions", get(positions))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn webhook(
    State(state): State<AppState>,
    payload: Result<Json<Alert>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(alert) = payload.map_err(|rejection| TradeError::InvalidAlert(rejection.body_text()))?;

    let response = match state.orchestrator.handle(alert).await? {
        AlertOutcome::Duplicate => {
            return Ok((StatusCode::OK, Json(json!({ "message": "Duplicate ignored" }))));
        }
        AlertOutcome::Executed(summary) => WebhookResponse {
            success: true,
            price: summary.price,
            order_id: summary.order_id.clone(),
            data: Some(serde_json::to_value(&summary).map_err(TradeError::from)?),
        },
        AlertOutcome::StopUpdated(update) => WebhookResponse {
            success: true,
            price: None,
            order_id: update.order_id.clone(),
            data: Some(serde_json::to_value(&update).map_err(TradeError::from)?),
        },
    };

    let body = serde_json::to_value(response).map_err(TradeError::from)?;
    Ok((StatusCode::OK, Json(body)))
}

async fn positions(State(state): State<AppState>) -> Json<BTreeMap<String, PositionState>> {
    let open = state.orchestrator.ledger().open_positions().await;
    Json(
        open.into_iter()
            .map(|(key, position)| (key.to_string(), position))
            .collect(),
    )
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "running".to_string(),
        mode: state.mode_label().to_string(),
        time: Utc::now(),
        exchanges: state.enabled_exchanges(),
        positions: state.orchestrator.ledger().position_count().await,
    })
}

async fn index(State(state): State<AppState>) -> String {
    let venues: Vec<String> = state
        .enabled_exchanges()
        .into_iter()
        .filter(|(_, enabled)| *enabled)
        .map(|(name, _)| name)
        .collect();
    let venues = if venues.is_empty() {
        "none".to_string()
    } else {
        venues.join(", ")
    };

    format!(
        "Webhook trader is running ({mode})\n\
         Exchanges: {venues}\n\
         \n\
         POST /webhook    execute an alert\n\
         GET  /positions  open positions\n\
         GET  /health     service status\n",
        mode = state.mode_label(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::channels::create_notification_channel;
    use crate::common::traits::{ExecutionReport, MockExecutionGateway};
    use axum::{
        body::Body,
        http::{header, Request},
    };
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    fn app(gateway: MockExecutionGateway) -> Router {
        let (sender, _receiver) = create_notification_channel();
        let orchestrator = SignalOrchestrator::new(Arc::new(gateway), sender);
        create_router(AppState::new(Arc::new(orchestrator), true))
    }

    fn binance_only() -> MockExecutionGateway {
        let mut gateway = MockExecutionGateway::new();
        gateway
            .expect_is_configured()
            .returning(|exchange| exchange == Exchange::Binance);
        gateway
    }

    fn post_json(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_webhook_success_and_duplicate() {
        let mut gateway = binance_only();
        gateway.expect_place_order().times(1).returning(|_| {
            Ok(ExecutionReport {
                order_id: Some("42".to_string()),
                average_price: Some(dec!(100.5)),
                raw: json!({"orderId": 42}),
            })
        });
        let app = app(gateway);
        let alert = json!({"action": "buy_long", "symbol": "BTCUSDT", "qty": 1, "exchange": "binance"});

        let response = app.clone().oneshot(post_json(alert.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["price"], json!(100.5));
        assert_eq!(body["order_id"], json!("42"));
        assert_eq!(body["data"]["position_type"], json!("long"));

        let response = app.clone().oneshot(post_json(alert)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"message": "Duplicate ignored"}));

        let response = app
            .oneshot(Request::builder().uri("/positions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        let position = &body["binance_BTC/USDT:USDT_default"];
        assert_eq!(position["mode"], json!("oneway"));
        assert_eq!(position["short"], Value::Null);
        assert_eq!(position["long"]["quantity"], json!("1"));
    }

    #[tokio::test]
    async fn test_client_errors_are_400() {
        let app = app(binance_only());

        let response = app
            .clone()
            .oneshot(post_json(json!({"action": "hold", "symbol": "BTCUSDT", "qty": 1, "exchange": "binance"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({"error": "unrecognized action"}));

        let response = app
            .clone()
            .oneshot(post_json(json!({"action": "buy", "symbol": "BTCUSDT", "qty": 1, "exchange": "okx"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_execution_failure_is_500() {
        let mut gateway = binance_only();
        gateway
            .expect_place_order()
            .returning(|_| Err(TradeError::Execution("margin is insufficient".to_string())));
        let app = app(gateway);

        let response = app
            .oneshot(post_json(json!({"action": "sell", "symbol": "BTCUSDT", "qty": 1, "exchange": "binance"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({"success": false, "error": "margin is insufficient"})
        );
    }

    #[tokio::test]
    async fn test_health_and_index() {
        let app = app(binance_only());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let health: HealthResponse = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(health.status, "running");
        assert_eq!(health.mode, "testnet");
        assert_eq!(health.exchanges.get("binance"), Some(&true));
        assert_eq!(health.exchanges.get("kucoin"), Some(&false));
        assert_eq!(health.positions, 0);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("Exchanges: binance"));
        assert!(text.contains("POST /webhook"));
    }
}
