use crate::{
    address::Address,
    api_client::GameApiClient,
    config::AppConfig,
    copy_feedback::{
        CopyFeedbackTimer,
        Osc52Clipboard,
    },
    feed::{
        FeedHandle,
        TransactionFeedPoller,
    },
    game::{
        Choice,
        GameClient,
        PlayError,
    },
    ui,
    wallet::{
        JsonRpcWalletProvider,
        WalletBackend,
        WalletTokenRegistrar,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use tracing::{
    debug,
    info,
    warn,
};

pub struct AppController {
    game: GameClient<GameApiClient>,
    feed: FeedHandle,
    copy: CopyFeedbackTimer<Osc52Clipboard>,
    registrar: WalletTokenRegistrar<WalletBackend>,
    wallet_available: bool,
    played_choice: Option<Choice>,
    status: String,
}

impl AppController {
    /// Builds every component and starts the transaction feed. Needs a running
    /// tokio runtime.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let api = GameApiClient::new(&config.api_url)
            .wrap_err("building game API client failed")?;
        let game = GameClient::new(api.clone(), config.play_timeout);
        let feed = TransactionFeedPoller::new(api, config.feed_poll_interval).start();
        let copy =
            CopyFeedbackTimer::new(Osc52Clipboard::stdout(), config.copy_feedback_duration);

        let backend = match &config.wallet_rpc_url {
            Some(url) => WalletBackend::JsonRpc(
                JsonRpcWalletProvider::new(url.clone())
                    .wrap_err("building wallet provider failed")?,
            ),
            None => WalletBackend::Unavailable,
        };
        let wallet_available = matches!(backend, WalletBackend::JsonRpc(_));
        let registrar = WalletTokenRegistrar::new(backend, config.token.clone());

        info!(api_url = %config.api_url, wallet_available, "controller ready");
        Ok(Self {
            game,
            feed,
            copy,
            registrar,
            wallet_available,
            played_choice: None,
            status: String::from("Ready"),
        })
    }

    pub fn snapshot(&self) -> ui::AppSnapshot {
        ui::AppSnapshot {
            play: self.game.state(),
            played_choice: self.played_choice,
            feed: self.feed.snapshot(),
            copied: self.copy.highlighted(),
            token_symbol: self.registrar.token().symbol.clone(),
            wallet_available: self.wallet_available,
            status: self.status.clone(),
        }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Starts a play request in the background. The outcome arrives through the
    /// game state channel.
    pub fn play(&mut self, address: &str, choice: Choice) {
        if self.game.is_loading() {
            self.set_status("A game is already in progress");
            return;
        }
        self.played_choice = Some(choice);
        self.set_status(format!("Playing {}...", choice.label()));
        let game = self.game.clone();
        let address = address.to_string();
        tokio::spawn(async move {
            match game.play(&address).await {
                Ok(result) => debug!(outcome = %result.result, "play finished"),
                Err(PlayError::AlreadyPlaying) => debug!("play ignored, already loading"),
                Err(err) => debug!(%err, "play finished with error"),
            }
        });
    }

    pub fn target_count(&self) -> usize {
        self.game
            .state()
            .result()
            .map_or(0, |result| result.target_addresses.len())
    }

    fn target_at(&self, idx: usize) -> Option<Address> {
        self.game
            .state()
            .result()
            .and_then(|result| result.target_addresses.get(idx).cloned())
    }

    pub fn copy_target(&mut self, idx: usize) {
        let Some(address) = self.target_at(idx) else {
            self.set_status("No address to copy");
            return;
        };
        match self.copy.mark_copied(&address) {
            Ok(()) => self.set_status(format!("Copied {}", address.shortened())),
            Err(err) => self.set_status(format!("Copy failed: {err}")),
        }
    }

    /// Fire-and-forget; the registrar logs the outcome.
    pub fn register_token(&mut self) {
        let registrar = self.registrar.clone();
        tokio::spawn(async move {
            registrar.register_token().await;
        });
        let symbol = self.registrar.token().symbol.clone();
        self.set_status(format!("Asked wallet to add {symbol}"));
    }

    pub fn refresh_feed(&mut self) {
        self.feed.refresh_now();
        self.set_status("Refreshing recent transactions...");
    }

    pub async fn shutdown(self) {
        self.feed.shutdown().await;
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let mut controller = AppController::new(&config)?;
    let mut ui_state = ui::UiState::new(config.initial_address.clone());
    let mut input_events = ui::input_event_stream();

    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(&mut controller, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    controller.shutdown().await;
    res
}

async fn run_loop(
    controller: &mut AppController,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    let mut play_updates = controller.game.subscribe();
    let mut feed_updates = controller.feed.subscribe();
    let mut copy_updates = controller.copy.subscribe();
    let mut feed_worker_closed = false;

    ui::draw(ui_state, &controller.snapshot()).wrap_err("initial draw failed")?;
    loop {
        tokio::select! {
            changed = play_updates.changed() => {
                if changed.is_err() {
                    warn!("game state channel closed");
                    break;
                }
                if !play_updates.borrow_and_update().is_loading() {
                    ui_state.reset_target();
                    controller.set_status("Ready");
                }
            }
            changed = feed_updates.changed(), if !feed_worker_closed => {
                if changed.is_err() {
                    warn!("transaction feed worker channel closed");
                    feed_worker_closed = true;
                }
            }
            _ = copy_updates.changed() => {}
            _ = tokio::signal::ctrl_c() => break,
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::Play => {
                        let address = ui_state.address_input().to_string();
                        controller.play(&address, ui_state.choice());
                    }
                    ui::UserEvent::NextTarget => {
                        ui_state.step_target(true, controller.target_count());
                    }
                    ui::UserEvent::PrevTarget => {
                        ui_state.step_target(false, controller.target_count());
                    }
                    ui::UserEvent::CopyTarget => controller.copy_target(ui_state.target_idx()),
                    ui::UserEvent::RegisterToken => controller.register_token(),
                    ui::UserEvent::RefreshFeed => controller.refresh_feed(),
                }
            }
        }
        ui::draw(ui_state, &controller.snapshot()).wrap_err("redraw failed")?;
    }
    info!("leaving app loop");
    Ok(())
}
