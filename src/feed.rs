use crate::{
    address::Address,
    api_client::ApiError,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    ops::ControlFlow,
    pin::pin,
    time::Duration,
};
use tokio::{
    sync::{
        mpsc,
        watch,
    },
    task::JoinHandle,
    time::{
        self,
        Instant,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    info,
    warn,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: Address,
    pub to: Address,
    pub amount: f64,
}

/// What the feed currently shows. `refreshed_at` is the time of the last
/// successful fetch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeedSnapshot {
    pub transactions: Vec<Transaction>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

pub trait FeedSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<Vec<Transaction>, ApiError>> + Send;
}

pub struct TransactionFeedPoller<F> {
    source: F,
    period: Duration,
}

impl<F: FeedSource> TransactionFeedPoller<F> {
    pub fn new(source: F, period: Duration) -> Self {
        Self { source, period }
    }

    /// Spawns the polling worker. The first fetch happens right away, the next ones
    /// every `period` after activation.
    pub fn start(self) -> FeedHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(FeedSnapshot::default());
        info!(period = ?self.period, "starting transaction feed");
        let worker =
            tokio::spawn(feed_worker(self.source, self.period, cmd_rx, snapshot_tx));
        FeedHandle {
            commands: cmd_tx,
            snapshots: snapshot_rx,
            worker: Some(worker),
        }
    }
}

enum FeedCommand {
    FetchNow,
    Shutdown,
}

/// Owner of a running feed worker. Dropping it cancels the worker.
pub struct FeedHandle {
    commands: mpsc::UnboundedSender<FeedCommand>,
    snapshots: watch::Receiver<FeedSnapshot>,
    worker: Option<JoinHandle<()>>,
}

impl FeedHandle {
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.snapshots.borrow().transactions.clone()
    }

    pub fn refresh_now(&self) {
        if self.commands.send(FeedCommand::FetchNow).is_err() {
            warn!("transaction feed worker is gone; refresh ignored");
        }
    }

    /// Stops the worker and waits for it to finish. No fetch is issued afterwards.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(FeedCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                warn!(?err, "transaction feed worker ended abnormally");
            }
        }
        info!("transaction feed stopped");
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

async fn feed_worker<F: FeedSource>(
    source: F,
    period: Duration,
    mut commands: mpsc::UnboundedReceiver<FeedCommand>,
    snapshots: watch::Sender<FeedSnapshot>,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    if refresh_unless_shutdown(&source, &snapshots, &mut commands)
        .await
        .is_break()
    {
        return;
    }

    loop {
        let flow = tokio::select! {
            _ = ticker.tick() => {
                refresh_unless_shutdown(&source, &snapshots, &mut commands).await
            }
            cmd = commands.recv() => match cmd {
                Some(FeedCommand::FetchNow) => {
                    refresh_unless_shutdown(&source, &snapshots, &mut commands).await
                }
                Some(FeedCommand::Shutdown) | None => ControlFlow::Break(()),
            },
        };
        if flow.is_break() {
            break;
        }
    }
}

/// Runs one refresh while still listening for commands, so a stalled fetch is
/// dropped as soon as shutdown is requested.
async fn refresh_unless_shutdown<F: FeedSource>(
    source: &F,
    snapshots: &watch::Sender<FeedSnapshot>,
    commands: &mut mpsc::UnboundedReceiver<FeedCommand>,
) -> ControlFlow<()> {
    let mut fetch = pin!(refresh(source, snapshots));
    loop {
        tokio::select! {
            () = &mut fetch => return ControlFlow::Continue(()),
            cmd = commands.recv() => match cmd {
                Some(FeedCommand::FetchNow) => debug!("refresh already in flight"),
                Some(FeedCommand::Shutdown) | None => {
                    debug!("fetch abandoned on shutdown");
                    return ControlFlow::Break(());
                }
            },
        }
    }
}

async fn refresh<F: FeedSource>(source: &F, snapshots: &watch::Sender<FeedSnapshot>) {
    match source.fetch().await {
        Ok(transactions) => {
            debug!(count = transactions.len(), "recent transactions refreshed");
            snapshots.send_replace(FeedSnapshot {
                transactions,
                refreshed_at: Some(Utc::now()),
            });
        }
        Err(err) => warn!(%err, "recent transactions fetch failed"),
    }
}
