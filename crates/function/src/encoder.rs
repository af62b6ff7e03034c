//! Fetch-and-encode routine for the account balance.

use crate::ApiCredentials;
use alloy::{
    primitives::U256,
    sol,
    sol_types::SolType,
};
use serde::{Deserialize, Deserializer};
use tracing::info;

/// Production balance-query endpoint.
pub const ALPACA_ACCOUNT_URL: &str = "https://paper-api.alpaca.markets/v2/account";

/// Header carrying the API key id.
const HEADER_KEY_ID: &str = "APCA-API-KEY-ID";
/// Header carrying the API secret.
const HEADER_SECRET_KEY: &str = "APCA-API-SECRET-KEY";

/// The onchain integer is denominated in cents.
const CENTS_PER_UNIT: f64 = 100.0;

/// Errors from the balance function. Every error is fatal for the
/// invocation; nothing here is retried.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// a credential was empty; raised before any request is made
    #[error("alpaca api key and secret are required")]
    MissingCredentials,
    /// transport-level failure reaching the balance endpoint
    #[error("balance request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// the balance endpoint answered with a non-success status
    #[error("balance endpoint returned status {0}")]
    Status(reqwest::StatusCode),
    /// the response body did not match the expected shape
    #[error("malformed balance response: {0}")]
    MalformedResponse(String),
    /// the balance does not fit the cents encoding
    #[error("balance {0} cannot be encoded as cents")]
    UnencodableBalance(f64),
    /// ABI decode failure
    #[error(transparent)]
    Abi(#[from] alloy::sol_types::Error),
}

type Uint256 = sol! {
    uint256
};

#[derive(Debug, Deserialize)]
struct AccountResponse {
    data: AccountData,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    #[serde(deserialize_with = "numeric_or_string")]
    portfolio_value: f64,
}

// The live API stringifies numbers; accept either form, reject anything else.
fn numeric_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("non-numeric portfolio_value {text:?}"))),
    }
}

/// Fetch the account balance from the brokerage API.
///
/// Fails with [`Error::MissingCredentials`] before any I/O if either
/// credential is empty.
pub async fn fetch_balance(
    client: &reqwest::Client,
    endpoint: &str,
    credentials: &ApiCredentials,
) -> Result<f64, Error> {
    if !credentials.is_complete() {
        return Err(Error::MissingCredentials);
    }

    let response = client
        .get(endpoint)
        .header(reqwest::header::ACCEPT, "application/json")
        .header(HEADER_KEY_ID, credentials.key())
        .header(HEADER_SECRET_KEY, credentials.secret())
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Status(status));
    }

    let body = response.bytes().await?;
    let account: AccountResponse =
        serde_json::from_slice(&body).map_err(|e| Error::MalformedResponse(e.to_string()))?;

    let balance = account.data.portfolio_value;
    if !balance.is_finite() || balance < 0.0 {
        return Err(Error::MalformedResponse(format!("portfolio_value out of range: {balance}")));
    }

    info!(portfolio_value = balance, "alpaca portfolio balance");

    Ok(balance)
}

/// Scale the balance to cents and ABI-encode it as a `uint256` word.
///
/// Rounding is half-away-from-zero: `0.005` units becomes `1` cent.
pub fn encode_balance(balance: f64) -> Result<Vec<u8>, Error> {
    let cents = (balance * CENTS_PER_UNIT).round();
    if !(0.0..=u128::MAX as f64).contains(&cents) {
        return Err(Error::UnencodableBalance(balance));
    }

    Ok(Uint256::abi_encode(&U256::from(cents as u128)))
}

/// Decode a `uint256` word produced by [`encode_balance`].
pub fn decode_balance(bytes: &[u8]) -> Result<U256, Error> {
    Uint256::abi_decode(bytes, true).map_err(Into::into)
}

/// Run the whole balance function: fetch, scale, encode.
pub async fn run(
    client: &reqwest::Client,
    endpoint: &str,
    credentials: &ApiCredentials,
) -> Result<Vec<u8>, Error> {
    let balance = fetch_balance(client, endpoint, credentials).await?;
    encode_balance(balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use feed_test_utils::{portfolio_body, spawn_broker, test_tracing};
    use serde_json::json;

    fn creds() -> ApiCredentials {
        ApiCredentials::new("key", "secret")
    }

    #[test]
    fn encodes_balance_as_cents() {
        let encoded = encode_balance(1234.5).unwrap();
        assert_eq!(encoded.len(), 32);
        assert_eq!(decode_balance(&encoded).unwrap(), U256::from(123450u64));
    }

    #[test]
    fn encodes_zero_balance() {
        let encoded = encode_balance(0.0).unwrap();
        assert_eq!(decode_balance(&encoded).unwrap(), U256::ZERO);
    }

    #[test]
    fn rounds_half_away_from_zero() {
        // 0.005 units is exactly half a cent.
        let half = encode_balance(0.005).unwrap();
        assert_eq!(decode_balance(&half).unwrap(), U256::from(1u64));

        let below = encode_balance(0.004).unwrap();
        assert_eq!(decode_balance(&below).unwrap(), U256::ZERO);
    }

    #[test]
    fn rejects_unencodable_balances() {
        assert!(matches!(encode_balance(f64::INFINITY), Err(Error::UnencodableBalance(_))));
        assert!(matches!(encode_balance(-1.0), Err(Error::UnencodableBalance(_))));
    }

    #[tokio::test]
    async fn missing_credentials_skip_the_network() {
        test_tracing();
        let broker = spawn_broker(200, portfolio_body(1234.5)).await;
        let client = reqwest::Client::new();

        let err = run(&client, &broker.url, &ApiCredentials::new("", "secret")).await.unwrap_err();
        assert!(matches!(err, Error::MissingCredentials));

        let err = run(&client, &broker.url, &ApiCredentials::new("key", "")).await.unwrap_err();
        assert!(matches!(err, Error::MissingCredentials));

        assert_eq!(broker.hits(), 0);
    }

    #[tokio::test]
    async fn fetches_and_encodes_the_balance() {
        let broker = spawn_broker(200, portfolio_body(1234.5)).await;

        let response = run(&reqwest::Client::new(), &broker.url, &creds()).await.unwrap();

        assert_eq!(decode_balance(&response).unwrap(), U256::from(123450u64));
        assert_eq!(broker.hits(), 1);
    }

    #[tokio::test]
    async fn sends_the_fixed_auth_headers() {
        let broker = spawn_broker(200, portfolio_body(1.0)).await;

        run(&reqwest::Client::new(), &broker.url, &creds()).await.unwrap();

        let headers = broker.last_headers();
        assert_eq!(headers.get("accept").map(String::as_str), Some("application/json"));
        assert_eq!(headers.get("apca-api-key-id").map(String::as_str), Some("key"));
        assert_eq!(headers.get("apca-api-secret-key").map(String::as_str), Some("secret"));
    }

    #[tokio::test]
    async fn accepts_a_string_typed_portfolio_value() {
        let broker = spawn_broker(200, json!({"data": {"portfolio_value": "1234.5"}})).await;

        let balance =
            fetch_balance(&reqwest::Client::new(), &broker.url, &creds()).await.unwrap();

        assert_eq!(balance, 1234.5);
    }

    #[tokio::test]
    async fn rejects_a_missing_portfolio_value() {
        let broker = spawn_broker(200, json!({"data": {}})).await;

        let err =
            fetch_balance(&reqwest::Client::new(), &broker.url, &creds()).await.unwrap_err();

        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn rejects_a_non_numeric_portfolio_value() {
        let broker = spawn_broker(200, json!({"data": {"portfolio_value": "lots"}})).await;

        let err =
            fetch_balance(&reqwest::Client::new(), &broker.url, &creds()).await.unwrap_err();

        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn rejects_a_negative_balance() {
        let broker = spawn_broker(200, portfolio_body(-1.0)).await;

        let err =
            fetch_balance(&reqwest::Client::new(), &broker.url, &creds()).await.unwrap_err();

        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn surfaces_a_non_success_status() {
        let broker = spawn_broker(403, json!({"message": "forbidden"})).await;

        let err =
            fetch_balance(&reqwest::Client::new(), &broker.url, &creds()).await.unwrap_err();

        match err {
            Error::Status(status) => assert_eq!(status.as_u16(), 403),
            other => panic!("expected status error, got {other:?}"),
        }
    }
}
