use crate::{
    api_client::DEFAULT_API_URL,
    copy_feedback::COPY_FEEDBACK_DURATION,
    feed::DEFAULT_POLL_INTERVAL,
    wallet::TokenMetadata,
};
use std::{
    path::PathBuf,
    time::Duration,
};

pub const DEFAULT_PLAY_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LOG_DIR: &str = "~/.faucet-game/logs";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_url: String,
    pub feed_poll_interval: Duration,
    /// `None` waits for the game service indefinitely.
    pub play_timeout: Option<Duration>,
    pub copy_feedback_duration: Duration,
    pub wallet_rpc_url: Option<String>,
    pub token: TokenMetadata,
    pub log_dir: PathBuf,
    pub initial_address: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            feed_poll_interval: DEFAULT_POLL_INTERVAL,
            play_timeout: Some(DEFAULT_PLAY_TIMEOUT),
            copy_feedback_duration: COPY_FEEDBACK_DURATION,
            wallet_rpc_url: None,
            token: TokenMetadata::reward_token(),
            log_dir: resolve_log_dir(None),
            initial_address: String::new(),
        }
    }
}

/// Expands `~` in a user supplied log directory, falling back to the default one.
pub fn resolve_log_dir(dir: Option<&str>) -> PathBuf {
    let raw = dir.unwrap_or(DEFAULT_LOG_DIR);
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Seconds from the command line; zero turns the timeout off.
pub fn play_timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
