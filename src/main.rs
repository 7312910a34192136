use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use faucet_game::{
    api_client::DEFAULT_API_URL,
    client,
    config::{
        self,
        AppConfig,
    },
};
use std::{
    path::Path,
    sync::OnceLock,
    time::Duration,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "faucet-game", about = "Play the FauceTea game from your terminal")]
struct Args {
    /// Base URL of the game API.
    #[arg(long, env = "FAUCET_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Seconds between recent transaction refreshes.
    #[arg(long, default_value_t = 10)]
    poll_interval_secs: u64,

    /// Seconds to wait for a play request; 0 waits forever.
    #[arg(long, default_value_t = 30)]
    play_timeout_secs: u64,

    /// JSON-RPC endpoint of a wallet bridge used to add the reward token.
    #[arg(long, env = "FAUCET_WALLET_RPC_URL")]
    wallet_rpc_url: Option<String>,

    /// Directory for log files.
    #[arg(long)]
    log_dir: Option<String>,

    /// Address to pre-fill the input with.
    #[arg(long)]
    address: Option<String>,
}

impl Args {
    fn into_config(self) -> AppConfig {
        AppConfig {
            api_url: self.api_url,
            feed_poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            play_timeout: config::play_timeout_from_secs(self.play_timeout_secs),
            wallet_rpc_url: self.wallet_rpc_url,
            log_dir: config::resolve_log_dir(self.log_dir.as_deref()),
            initial_address: self.address.unwrap_or_default(),
            ..AppConfig::default()
        }
    }
}

// The terminal is owned by the UI, so logs go to a daily file.
fn init_tracing(log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("creating log directory {}", log_dir.display()))?;
    let appender = rolling::daily(log_dir, "faucet-game.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let app_config = Args::parse().into_config();
    init_tracing(&app_config.log_dir)?;
    tracing::info!(api_url = %app_config.api_url, "starting faucet-game client");
    client::run_app(app_config).await
}
