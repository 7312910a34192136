use crate::{
    address::Address,
    api_client::ApiError,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::watch,
    time,
};
use tracing::{
    debug,
    info,
    warn,
};

pub const INVALID_ADDRESS_MESSAGE: &str = "Please enter a valid ETH address";
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to play the game. Please try again.";
pub const REWARD_SYMBOL: &str = "FGT";
pub const WIN_CONTINUE_AMOUNT: u64 = 1000;
pub const LOSE_CONTINUE_AMOUNT: u64 = 500;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Choice {
    #[default]
    Rock,
    Paper,
    Scissors,
}

impl Choice {
    pub const ALL: [Choice; 3] = [Choice::Rock, Choice::Paper, Choice::Scissors];

    pub fn label(self) -> &'static str {
        match self {
            Choice::Rock => "Rock",
            Choice::Paper => "Paper",
            Choice::Scissors => "Scissors",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Choice::Rock => Choice::Paper,
            Choice::Paper => Choice::Scissors,
            Choice::Scissors => Choice::Rock,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Choice::Rock => Choice::Scissors,
            Choice::Paper => Choice::Rock,
            Choice::Scissors => Choice::Paper,
        }
    }
}

/// Outcome string reported by the game service. Anything other than `win` or `lose`
/// is kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Outcome {
    Win,
    Lose,
    Other(String),
}

impl From<String> for Outcome {
    fn from(value: String) -> Self {
        match value.as_str() {
            "win" => Outcome::Win,
            "lose" => Outcome::Lose,
            _ => Outcome::Other(value),
        }
    }
}

impl From<Outcome> for String {
    fn from(value: Outcome) -> Self {
        match value {
            Outcome::Win => "win".to_string(),
            Outcome::Lose => "lose".to_string(),
            Outcome::Other(other) => other,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win => f.write_str("win"),
            Outcome::Lose => f.write_str("lose"),
            Outcome::Other(other) => f.write_str(other),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    pub result: Outcome,
    pub reward: f64,
    pub target_addresses: Vec<Address>,
}

impl GameResult {
    pub fn is_win(&self) -> bool {
        self.result == Outcome::Win
    }

    /// Amount the player has to send to keep playing; only a win raises it.
    pub fn continue_amount(&self) -> u64 {
        if self.is_win() {
            WIN_CONTINUE_AMOUNT
        } else {
            LOSE_CONTINUE_AMOUNT
        }
    }

    pub fn continue_instruction(&self) -> String {
        format!(
            "Send {} {REWARD_SYMBOL} to address",
            self.continue_amount()
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum PlayState {
    #[default]
    Idle,
    Loading,
    Result(GameResult),
    Error(String),
}

impl PlayState {
    pub fn is_loading(&self) -> bool {
        matches!(self, PlayState::Loading)
    }

    pub fn result(&self) -> Option<&GameResult> {
        match self {
            PlayState::Result(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PlayState::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// The two mutually exclusive bodies of a `/play` response.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayResponse {
    Accepted(GameResult),
    Rejected(String),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PlayError {
    #[error("a game is already in progress")]
    AlreadyPlaying,
    #[error("Please enter a valid ETH address")]
    InvalidAddress,
    #[error("{0}")]
    Rejected(String),
    #[error("play request failed: {0}")]
    Transport(String),
    #[error("play request timed out after {0:?}")]
    TimedOut(Duration),
}

impl PlayError {
    /// Text shown to the player for this failure.
    pub fn user_message(&self) -> String {
        match self {
            PlayError::InvalidAddress => INVALID_ADDRESS_MESSAGE.to_string(),
            PlayError::Rejected(message) => message.clone(),
            PlayError::Transport(_) | PlayError::TimedOut(_) => {
                GENERIC_FAILURE_MESSAGE.to_string()
            }
            PlayError::AlreadyPlaying => self.to_string(),
        }
    }
}

pub trait GameService: Send + Sync + 'static {
    fn play(
        &self,
        address: &Address,
    ) -> impl Future<Output = Result<PlayResponse, ApiError>> + Send;
}

/// Drives a single play attempt at a time and owns the resulting [`PlayState`].
pub struct GameClient<S> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    service: S,
    state: watch::Sender<PlayState>,
    timeout: Option<Duration>,
}

impl<S> Clone for GameClient<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: GameService> GameClient<S> {
    pub fn new(service: S, timeout: Option<Duration>) -> Self {
        let (state, _) = watch::channel(PlayState::Idle);
        Self {
            inner: Arc::new(Inner {
                service,
                state,
                timeout,
            }),
        }
    }

    pub fn state(&self) -> PlayState {
        self.inner.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayState> {
        self.inner.state.subscribe()
    }

    /// Plays one round for `candidate`.
    ///
    /// Returns [`PlayError::AlreadyPlaying`] without touching state or the network
    /// while another attempt is in flight. An invalid address moves the state to
    /// `Error` and never reaches the service.
    pub async fn play(&self, candidate: &str) -> Result<GameResult, PlayError> {
        let address = self.enter_loading(candidate)?;
        debug!(%address, "sending play request");

        let outcome = match self.request(&address).await {
            Ok(PlayResponse::Accepted(result)) => Ok(result),
            Ok(PlayResponse::Rejected(message)) => Err(PlayError::Rejected(message)),
            Err(err) => Err(err),
        };

        match &outcome {
            Ok(result) => {
                info!(%address, outcome = %result.result, reward = result.reward, "game played");
                self.inner.state.send_replace(PlayState::Result(result.clone()));
            }
            Err(err) => {
                warn!(%address, %err, "game play failed");
                self.inner
                    .state
                    .send_replace(PlayState::Error(err.user_message()));
            }
        }
        outcome
    }

    fn enter_loading(&self, candidate: &str) -> Result<Address, PlayError> {
        let mut entered = Err(PlayError::AlreadyPlaying);
        self.inner.state.send_if_modified(|state| {
            if state.is_loading() {
                return false;
            }
            match Address::parse(candidate) {
                Some(address) => {
                    *state = PlayState::Loading;
                    entered = Ok(address);
                }
                None => {
                    *state = PlayState::Error(INVALID_ADDRESS_MESSAGE.to_string());
                    entered = Err(PlayError::InvalidAddress);
                }
            }
            true
        });
        entered
    }

    async fn request(&self, address: &Address) -> Result<PlayResponse, PlayError> {
        let call = self.inner.service.play(address);
        let response = match self.inner.timeout {
            Some(limit) => time::timeout(limit, call)
                .await
                .map_err(|_| PlayError::TimedOut(limit))?,
            None => call.await,
        };
        response.map_err(|err| PlayError::Transport(err.to_string()))
    }
}
