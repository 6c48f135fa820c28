//! Request signing for the supported futures venues

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};

use crate::common::errors::{Result, TradeError};
use crate::common::types::Exchange;
use crate::config::types::ApiCredentials;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Receive window sent with Binance and Bybit requests, in milliseconds
pub const RECV_WINDOW_MS: u64 = 5000;

fn hmac_sha256(secret: &str, message: &str) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| TradeError::Authentication(format!("Failed to create HMAC: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Hex HMAC-SHA256 (Binance, Bybit)
pub fn hmac_sha256_hex(secret: &str, message: &str) -> Result<String> {
    Ok(hex::encode(hmac_sha256(secret, message)?))
}

/// Base64 HMAC-SHA256 (OKX, Bitget, KuCoin)
pub fn hmac_sha256_base64(secret: &str, message: &str) -> Result<String> {
    Ok(BASE64.encode(hmac_sha256(secret, message)?))
}

/// Hex HMAC-SHA512 (Gate)
pub fn hmac_sha512_hex(secret: &str, message: &str) -> Result<String> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| TradeError::Authentication(format!("Failed to create HMAC: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Binance signs the full query string and sends the result as `signature`
pub fn binance_signature(secret: &str, query: &str) -> Result<String> {
    hmac_sha256_hex(secret, query)
}

/// The parts of a request that go into a signature
#[derive(Debug, Clone, Copy)]
pub struct SigningInput<'a> {
    pub method: &'a str,
    pub path: &'a str,
    /// Query string without the leading `?`, empty when absent
    pub query: &'a str,
    pub body: &'a str,
    pub now: DateTime<Utc>,
}

impl SigningInput<'_> {
    fn path_with_query(&self) -> String {
        if self.query.is_empty() {
            self.path.to_string()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }
}

/// Authentication headers for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedHeaders {
    headers: Vec<(&'static str, String)>,
}

impl SignedHeaders {
    fn push(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.headers.iter().map(|(key, value)| (*key, value.as_str()))
    }

    /// Add the headers to a reqwest RequestBuilder
    pub fn apply_to_request(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (name, value) in &self.headers {
            request = request.header(*name, value);
        }
        request
    }
}

/// Build the authentication headers a venue expects
///
/// Binance only gets its key header here; its signature is part of the
/// query string, see [`binance_signature`].
pub fn sign_request(
    exchange: Exchange,
    credentials: &ApiCredentials,
    input: &SigningInput<'_>,
) -> Result<SignedHeaders> {
    let method = input.method.to_uppercase();
    let millis = input.now.timestamp_millis().to_string();

    let headers = match exchange {
        Exchange::Binance => SignedHeaders::default().push("X-MBX-APIKEY", &credentials.api_key),
        Exchange::Bybit => {
            let payload = if method == "GET" { input.query } else { input.body };
            let message = format!("{}{}{}{}", millis, credentials.api_key, RECV_WINDOW_MS, payload);
            let signature = hmac_sha256_hex(&credentials.api_secret, &message)?;
            SignedHeaders::default()
                .push("X-BAPI-API-KEY", &credentials.api_key)
                .push("X-BAPI-TIMESTAMP", millis)
                .push("X-BAPI-RECV-WINDOW", RECV_WINDOW_MS.to_string())
                .push("X-BAPI-SIGN", signature)
        }
        Exchange::Okx => {
            let timestamp = input.now.to_rfc3339_opts(SecondsFormat::Millis, true);
            let message = format!("{}{}{}{}", timestamp, method, input.path_with_query(), input.body);
            let signature = hmac_sha256_base64(&credentials.api_secret, &message)?;
            SignedHeaders::default()
                .push("OK-ACCESS-KEY", &credentials.api_key)
                .push("OK-ACCESS-SIGN", signature)
                .push("OK-ACCESS-TIMESTAMP", timestamp)
                .push("OK-ACCESS-PASSPHRASE", &credentials.passphrase)
        }
        Exchange::Bitget => {
            let message = format!("{}{}{}{}", millis, method, input.path_with_query(), input.body);
            let signature = hmac_sha256_base64(&credentials.api_secret, &message)?;
            SignedHeaders::default()
                .push("ACCESS-KEY", &credentials.api_key)
                .push("ACCESS-SIGN", signature)
                .push("ACCESS-TIMESTAMP", millis)
                .push("ACCESS-PASSPHRASE", &credentials.passphrase)
                .push("locale", "en-US")
        }
        Exchange::Kucoin => {
            let message = format!("{}{}{}{}", millis, method, input.path_with_query(), input.body);
            let signature = hmac_sha256_base64(&credentials.api_secret, &message)?;
            let passphrase = hmac_sha256_base64(&credentials.api_secret, &credentials.passphrase)?;
            SignedHeaders::default()
                .push("KC-API-KEY", &credentials.api_key)
                .push("KC-API-SIGN", signature)
                .push("KC-API-TIMESTAMP", millis)
                .push("KC-API-PASSPHRASE", passphrase)
                .push("KC-API-KEY-VERSION", "2")
        }
        Exchange::Gate => {
            let seconds = input.now.timestamp().to_string();
            let body_hash = hex::encode(Sha512::digest(input.body.as_bytes()));
            let message = format!(
                "{}\n{}\n{}\n{}\n{}",
                method, input.path, input.query, body_hash, seconds
            );
            let signature = hmac_sha512_hex(&credentials.api_secret, &message)?;
            SignedHeaders::default()
                .push("KEY", &credentials.api_key)
                .push("SIGN", signature)
                .push("Timestamp", seconds)
        }
    };

    Ok(headers)
}
