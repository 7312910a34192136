use crate::{
    address::Address,
    feed::{
        FeedSource,
        Transaction,
    },
    game::{
        GameResult,
        GameService,
        PlayResponse,
    },
};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.fauceteagame.xyz/api";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("game service request failed: {0}")]
    Request(String),
    #[error("game service responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid game service payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Request(err.to_string())
    }
}

/// HTTP client for the game service's `/play` and `/recent-transactions` routes.
#[derive(Clone)]
pub struct GameApiClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct PlayRequestDto<'a> {
    address: &'a Address,
}

impl GameApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder().build()?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn post_play(&self, address: &Address) -> Result<PlayResponse, ApiError> {
        let url = format!("{}/play", self.base_url);
        let res = self
            .http
            .post(url)
            .json(&PlayRequestDto { address })
            .send()
            .await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        debug!(%status, len = bytes.len(), "play response received");
        parse_play_response(status, &bytes)
    }

    pub async fn recent_transactions(&self) -> Result<Vec<Transaction>, ApiError> {
        let url = format!("{}/recent-transactions", self.base_url);
        let res = self.http.get(url).send().await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        if !status.is_success() {
            return Err(status_error(status, &bytes));
        }
        serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

impl GameService for GameApiClient {
    async fn play(&self, address: &Address) -> Result<PlayResponse, ApiError> {
        self.post_play(address).await
    }
}

impl FeedSource for GameApiClient {
    async fn fetch(&self) -> Result<Vec<Transaction>, ApiError> {
        self.recent_transactions().await
    }
}

impl fmt::Display for GameApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url)
    }
}

/// An `error` field wins over everything else, whatever the HTTP status. Without
/// one, a non-success status is a transport failure and a success status must carry
/// a full game result.
pub(crate) fn parse_play_response(
    status: StatusCode,
    bytes: &[u8],
) -> Result<PlayResponse, ApiError> {
    let body: Option<Value> = serde_json::from_slice(bytes).ok();
    if let Some(message) = body.as_ref().and_then(service_error) {
        return Ok(PlayResponse::Rejected(message));
    }
    if !status.is_success() {
        return Err(status_error(status, bytes));
    }
    let body = body.ok_or_else(|| {
        ApiError::Decode(format!(
            "play response is not JSON: {}",
            String::from_utf8_lossy(bytes)
        ))
    })?;
    let result: GameResult =
        serde_json::from_value(body).map_err(|err| ApiError::Decode(err.to_string()))?;
    Ok(PlayResponse::Accepted(result))
}

fn service_error(body: &Value) -> Option<String> {
    match body.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(message) if message.is_empty() => None,
        Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}

fn status_error(status: StatusCode, bytes: &[u8]) -> ApiError {
    ApiError::Status {
        status: status.as_u16(),
        body: String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::game::Outcome;

    #[test]
    fn parse_play_response__error_field__rejected_with_message() {
        // given
        let body = br#"{"error":"insufficient funds"}"#;

        // when
        let actual = parse_play_response(StatusCode::OK, body).unwrap();

        // then
        assert_eq!(
            actual,
            PlayResponse::Rejected("insufficient funds".to_string())
        );
    }

    #[test]
    fn parse_play_response__error_field_on_failure_status__still_rejected() {
        // given
        let body = br#"{"error":"cooldown active"}"#;

        // when
        let actual = parse_play_response(StatusCode::TOO_MANY_REQUESTS, body).unwrap();

        // then
        assert_eq!(actual, PlayResponse::Rejected("cooldown active".to_string()));
    }

    #[test]
    fn parse_play_response__result_body__accepted() {
        // given
        let body = br#"{"result":"lose","reward":0,"targetAddresses":["0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"]}"#;

        // when
        let actual = parse_play_response(StatusCode::OK, body).unwrap();

        // then
        let PlayResponse::Accepted(result) = actual else {
            panic!("expected an accepted response");
        };
        assert_eq!(result.result, Outcome::Lose);
        assert_eq!(result.reward, 0.0);
        assert_eq!(result.target_addresses.len(), 1);
    }

    #[test]
    fn parse_play_response__failure_status_without_error__status_error() {
        // when
        let actual = parse_play_response(StatusCode::BAD_GATEWAY, b"upstream down");

        // then
        assert_eq!(
            actual,
            Err(ApiError::Status {
                status: 502,
                body: "upstream down".to_string(),
            })
        );
    }

    #[test]
    fn parse_play_response__malformed_body__decode_error() {
        let not_json = parse_play_response(StatusCode::OK, b"<html>");
        let missing_fields = parse_play_response(StatusCode::OK, br#"{"result":"win"}"#);

        assert!(matches!(not_json, Err(ApiError::Decode(_))));
        assert!(matches!(missing_fields, Err(ApiError::Decode(_))));
    }

    #[test]
    fn parse_play_response__empty_error_field__treated_as_absent() {
        // given
        let body = br#"{"error":"","result":"win","reward":5,"targetAddresses":[]}"#;

        // when
        let actual = parse_play_response(StatusCode::OK, body).unwrap();

        // then
        assert!(matches!(actual, PlayResponse::Accepted(_)));
    }

    #[test]
    fn parse_play_response__zero_error_field__treated_as_absent() {
        // given
        let body = br#"{"error":0,"result":"lose","reward":0,"targetAddresses":[]}"#;
        let nonzero = br#"{"error":42}"#;

        // when
        let actual = parse_play_response(StatusCode::OK, body).unwrap();
        let rejected = parse_play_response(StatusCode::OK, nonzero).unwrap();

        // then
        assert!(matches!(actual, PlayResponse::Accepted(_)));
        assert_eq!(rejected, PlayResponse::Rejected("42".to_string()));
    }

    #[test]
    fn new__trailing_slash__trimmed() {
        let client = GameApiClient::new("http://localhost:8080/api/").unwrap();

        assert_eq!(client.base_url(), "http://localhost:8080/api");
    }
}
