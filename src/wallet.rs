use crate::address::Address;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    Value,
    json,
};
use std::sync::Arc;
use tracing::{
    debug,
    error,
    info,
};

pub const REWARD_TOKEN_ADDRESS: &str = "0xC9C14dF451f31FF882Af20ab1C0fC48Bb853e3Cc";
pub const REWARD_TOKEN_SYMBOL: &str = "FGT";
pub const REWARD_TOKEN_DECIMALS: u8 = 18;
pub const WATCH_ASSET_METHOD: &str = "wallet_watchAsset";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    pub image: String,
}

impl TokenMetadata {
    pub fn reward_token() -> Self {
        Self {
            address: Address::new(REWARD_TOKEN_ADDRESS),
            symbol: REWARD_TOKEN_SYMBOL.to_string(),
            decimals: REWARD_TOKEN_DECIMALS,
            image: String::new(),
        }
    }
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self::reward_token()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WalletRequest {
    pub method: String,
    pub params: Value,
}

impl WalletRequest {
    pub fn watch_asset(token: &TokenMetadata) -> Self {
        Self {
            method: WATCH_ASSET_METHOD.to_string(),
            params: json!({
                "type": "ERC20",
                "options": token,
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("no wallet provider is configured")]
    Unavailable,
    #[error("wallet request failed: {0}")]
    Transport(String),
    #[error("wallet rejected the request ({code}): {message}")]
    Rejected { code: i64, message: String },
    #[error("invalid wallet response: {0}")]
    Decode(String),
}

/// The injected wallet capability: one request in, one JSON value out.
pub trait WalletProvider: Send + Sync + 'static {
    fn request(
        &self,
        request: WalletRequest,
    ) -> impl Future<Output = Result<Value, WalletError>> + Send;
}

/// Talks JSON-RPC 2.0 over HTTP to a local wallet bridge.
#[derive(Clone)]
pub struct JsonRpcWalletProvider {
    url: String,
    http: reqwest::Client,
}

impl JsonRpcWalletProvider {
    pub fn new(url: impl Into<String>) -> Result<Self, WalletError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| WalletError::Transport(err.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }
}

impl WalletProvider for JsonRpcWalletProvider {
    async fn request(&self, request: WalletRequest) -> Result<Value, WalletError> {
        let envelope = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": request.method,
            "params": request.params,
        });
        let res = self
            .http
            .post(&self.url)
            .json(&envelope)
            .send()
            .await
            .map_err(|err| WalletError::Transport(err.to_string()))?;
        let body: Value = res
            .json()
            .await
            .map_err(|err| WalletError::Decode(err.to_string()))?;
        parse_rpc_response(body)
    }
}

fn parse_rpc_response(mut body: Value) -> Result<Value, WalletError> {
    if let Some(err) = body.get("error").filter(|err| !err.is_null()) {
        let code = err.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(WalletError::Rejected { code, message });
    }
    body.get_mut("result")
        .map(Value::take)
        .ok_or_else(|| WalletError::Decode(format!("missing result in {body}")))
}

/// The wallet backends the application can be configured with.
pub enum WalletBackend {
    JsonRpc(JsonRpcWalletProvider),
    Unavailable,
}

impl WalletProvider for WalletBackend {
    async fn request(&self, request: WalletRequest) -> Result<Value, WalletError> {
        match self {
            WalletBackend::JsonRpc(provider) => provider.request(request).await,
            WalletBackend::Unavailable => Err(WalletError::Unavailable),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Added,
    Declined,
    Failed(String),
}

/// Asks the wallet to track the reward token. Failures are logged, never raised.
pub struct WalletTokenRegistrar<P> {
    provider: Arc<P>,
    token: TokenMetadata,
}

impl<P> Clone for WalletTokenRegistrar<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            token: self.token.clone(),
        }
    }
}

impl<P: WalletProvider> WalletTokenRegistrar<P> {
    pub fn new(provider: P, token: TokenMetadata) -> Self {
        Self {
            provider: Arc::new(provider),
            token,
        }
    }

    pub fn token(&self) -> &TokenMetadata {
        &self.token
    }

    pub async fn register_token(&self) -> RegistrationOutcome {
        let request = WalletRequest::watch_asset(&self.token);
        debug!(symbol = %self.token.symbol, "requesting wallet to watch token");
        match self.provider.request(request).await {
            Ok(Value::Bool(false)) => {
                info!(symbol = %self.token.symbol, "wallet declined to add token");
                RegistrationOutcome::Declined
            }
            Ok(value) => {
                info!(symbol = %self.token.symbol, %value, "token added to wallet");
                RegistrationOutcome::Added
            }
            Err(err) => {
                error!(symbol = %self.token.symbol, %err, "error adding token to wallet");
                RegistrationOutcome::Failed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use std::sync::Mutex;

    struct FakeWallet {
        requests: Arc<Mutex<Vec<WalletRequest>>>,
        reply: Result<Value, WalletError>,
    }

    impl FakeWallet {
        fn replying(reply: Result<Value, WalletError>) -> (Self, Arc<Mutex<Vec<WalletRequest>>>) {
            let requests = Arc::new(Mutex::new(Vec::new()));
            let wallet = Self {
                requests: requests.clone(),
                reply,
            };
            (wallet, requests)
        }
    }

    impl WalletProvider for FakeWallet {
        async fn request(&self, request: WalletRequest) -> Result<Value, WalletError> {
            self.requests.lock().unwrap().push(request);
            self.reply.clone()
        }
    }

    #[tokio::test]
    async fn register_token__wallet_accepts__single_watch_asset_request() {
        // given
        let (wallet, requests) = FakeWallet::replying(Ok(Value::Bool(true)));
        let registrar = WalletTokenRegistrar::new(wallet, TokenMetadata::reward_token());

        // when
        let actual = registrar.register_token().await;

        // then
        assert_eq!(actual, RegistrationOutcome::Added);
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let expected = json!({
            "method": "wallet_watchAsset",
            "params": {
                "type": "ERC20",
                "options": {
                    "address": "0xC9C14dF451f31FF882Af20ab1C0fC48Bb853e3Cc",
                    "symbol": "FGT",
                    "decimals": 18,
                    "image": "",
                },
            },
        });
        assert_eq!(serde_json::to_value(&requests[0]).unwrap(), expected);
    }

    #[tokio::test]
    async fn register_token__wallet_declines__declined() {
        // given
        let (wallet, _) = FakeWallet::replying(Ok(Value::Bool(false)));
        let registrar = WalletTokenRegistrar::new(wallet, TokenMetadata::reward_token());

        // when
        let actual = registrar.register_token().await;

        // then
        assert_eq!(actual, RegistrationOutcome::Declined);
    }

    #[tokio::test]
    async fn register_token__wallet_errors__failure_contained() {
        // given
        let (wallet, _) = FakeWallet::replying(Err(WalletError::Rejected {
            code: 4001,
            message: "User rejected the request.".to_string(),
        }));
        let registrar = WalletTokenRegistrar::new(wallet, TokenMetadata::reward_token());

        // when
        let actual = registrar.register_token().await;

        // then
        assert!(matches!(actual, RegistrationOutcome::Failed(reason) if reason.contains("4001")));
    }

    #[tokio::test]
    async fn register_token__no_backend__failed_unavailable() {
        // given
        let registrar =
            WalletTokenRegistrar::new(WalletBackend::Unavailable, TokenMetadata::default());

        // when
        let actual = registrar.register_token().await;

        // then
        assert_eq!(
            actual,
            RegistrationOutcome::Failed(WalletError::Unavailable.to_string())
        );
    }

    #[test]
    fn parse_rpc_response__result__returned() {
        let actual = parse_rpc_response(json!({"jsonrpc": "2.0", "id": 1, "result": true}));

        assert_eq!(actual, Ok(Value::Bool(true)));
    }

    #[test]
    fn parse_rpc_response__error_object__rejected() {
        let actual = parse_rpc_response(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32601, "message": "method not found"},
        }));

        assert_eq!(
            actual,
            Err(WalletError::Rejected {
                code: -32601,
                message: "method not found".to_string(),
            })
        );
    }

    #[test]
    fn parse_rpc_response__neither_result_nor_error__decode_error() {
        let actual = parse_rpc_response(json!({"jsonrpc": "2.0", "id": 1}));

        assert!(matches!(actual, Err(WalletError::Decode(_))));
    }
}
