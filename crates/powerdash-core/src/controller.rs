// ── Controller abstraction ──
//
// Async facade over the engine. Owns the websocket feed, runs the engine
// on one task, routes commands to it and publishes immutable snapshots.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use powerdash_feed::{FeedEvent, FeedHandle, ReconnectConfig, TopologyFeed};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::CoreError;
use crate::snapshot::TopologySnapshot;
use crate::stream::SnapshotStream;
use crate::sync::SyncState;

const COMMAND_CHANNEL_SIZE: usize = 64;

// ── Controller ───────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Every clone talks to the
/// same engine task.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: EngineConfig,
    snapshot: watch::Sender<Arc<TopologySnapshot>>,
    sync_state: watch::Sender<SyncState>,
    command_tx: Mutex<mpsc::Sender<CommandEnvelope>>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    /// Child token for the current connection, replaced on reconnect.
    cancel_child: Mutex<CancellationToken>,
    feed: Mutex<Option<Arc<dyn TopologyFeed>>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    /// Create a controller. Does NOT connect; call
    /// [`connect()`](Self::connect) to start the feed and the engine.
    pub fn new(config: EngineConfig) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(TopologySnapshot::default()));
        let (sync_state, _) = watch::channel(SyncState::Disconnected);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(ControllerInner {
                config,
                snapshot,
                sync_state,
                command_tx: Mutex::new(command_tx),
                command_rx: Mutex::new(Some(command_rx)),
                cancel,
                cancel_child: Mutex::new(cancel_child),
                feed: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Start the websocket feed and the engine task.
    ///
    /// Returns once both are spawned; the first snapshot arrives later
    /// (see [`wait_for_sync`](Self::wait_for_sync)).
    pub async fn connect(&self) -> Result<(), CoreError> {
        if self.inner.feed.lock().await.is_some() {
            debug!("already connected");
            return Ok(());
        }
        let child = self.inner.cancel.child_token();
        let reconnect = ReconnectConfig {
            delay: self.inner.config.reconnect_delay,
        };
        let handle = FeedHandle::connect(self.inner.config.url.clone(), reconnect, child.clone())
            .map_err(|e| CoreError::ConnectionFailed {
                url: self.inner.config.url.to_string(),
                reason: e.to_string(),
            })?;

        let handle = Arc::new(handle);
        let feed: Arc<dyn TopologyFeed> = handle.clone();
        self.start(feed, child).await;
        // Joined by `disconnect()` so queued requests are flushed first.
        self.inner
            .task_handles
            .lock()
            .await
            .push(tokio::spawn(async move { handle.join().await }));
        info!(url = %self.inner.config.url, "controller started");
        Ok(())
    }

    /// Run the engine against an already constructed feed.
    pub async fn connect_feed(&self, feed: Arc<dyn TopologyFeed>) {
        if self.inner.feed.lock().await.is_some() {
            debug!("already connected");
            return;
        }
        let child = self.inner.cancel.child_token();
        self.start(feed, child).await;
    }

    async fn start(&self, feed: Arc<dyn TopologyFeed>, child: CancellationToken) {
        *self.inner.cancel_child.lock().await = child.clone();

        // Subscribe before anything can be published.
        let events = feed.subscribe();
        let engine = Engine::new(Arc::clone(&feed), self.inner.config.ports.clone())
            .with_subscribe(self.inner.config.subscribe);

        let mut handles = self.inner.task_handles.lock().await;
        if let Some(rx) = self.inner.command_rx.lock().await.take() {
            let ctrl = self.clone();
            handles.push(tokio::spawn(engine_task(ctrl, engine, events, rx, child)));
        } else {
            warn!("engine already running");
        }

        *self.inner.feed.lock().await = Some(feed);
    }

    /// Stop the feed and the engine task. The last snapshot stays
    /// available; [`connect()`](Self::connect) may be called again.
    pub async fn disconnect(&self) {
        self.inner.cancel_child.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        *self.inner.feed.lock().await = None;

        // Fresh command channel for the next connect; the previous
        // receiver was consumed by the engine task.
        {
            let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
            *self.inner.command_tx.lock().await = tx;
            *self.inner.command_rx.lock().await = Some(rx);
        }

        self.inner.sync_state.send_replace(SyncState::Disconnected);
        self.inner.snapshot.send_modify(|snap| {
            *snap = Arc::new(snap.with_sync(SyncState::Disconnected));
        });
        debug!("disconnected");
    }

    // ── Command execution ────────────────────────────────────────────

    /// Hand a command to the engine task and await its result.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if self.inner.feed.lock().await.is_none() {
            return Err(CoreError::ControllerDisconnected);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        let command_tx = self.inner.command_tx.lock().await.clone();

        command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::ControllerDisconnected)?;

        rx.await.map_err(|_| CoreError::ControllerDisconnected)?
    }

    // ── State observation ────────────────────────────────────────────

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<TopologySnapshot> {
        self.inner.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<TopologySnapshot>> {
        self.inner.snapshot.subscribe()
    }

    pub fn stream(&self) -> SnapshotStream {
        SnapshotStream::new(self.inner.snapshot.subscribe())
    }

    pub fn sync_state(&self) -> watch::Receiver<SyncState> {
        self.inner.sync_state.subscribe()
    }

    /// Wait until a topology snapshot has been applied.
    pub async fn wait_for_sync(&self, timeout: Duration) -> Result<SyncState, CoreError> {
        let mut rx = self.inner.sync_state.subscribe();
        let wait = async move {
            rx.wait_for(|s| s.is_synced())
                .await
                .map(|state| *state)
                .map_err(|_| CoreError::ControllerDisconnected)
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| CoreError::Timeout {
                timeout_secs: timeout.as_secs(),
            })?
    }
}

// ── Engine task ──────────────────────────────────────────────────────

impl Controller {
    fn publish(&self, engine: &Engine) {
        self.inner.snapshot.send_replace(Arc::new(engine.snapshot()));
        let state = engine.sync_state();
        self.inner.sync_state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }
}

async fn engine_task(
    controller: Controller,
    mut engine: Engine,
    mut events: broadcast::Receiver<Arc<FeedEvent>>,
    mut commands: mpsc::Receiver<CommandEnvelope>,
    cancel: CancellationToken,
) {
    // The feed may have opened before we subscribed.
    if engine.is_online() {
        engine.handle_event(FeedEvent::Opened);
    }
    controller.publish(&engine);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    engine.handle_event(Arc::unwrap_or_clone(event));
                    controller.publish(&engine);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "engine fell behind the feed, requesting full status");
                    if let Err(e) = engine.request_status() {
                        warn!(error = %e, "status request failed");
                    }
                }
                Err(RecvError::Closed) => {
                    debug!("feed event channel closed");
                    break;
                }
            },
            envelope = commands.recv() => {
                let Some(envelope) = envelope else { break };
                let publish = !matches!(envelope.command, Command::MoveAsset { .. });
                let result = route_command(&mut engine, envelope.command);
                if publish {
                    controller.publish(&engine);
                }
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────────

fn route_command(engine: &mut Engine, cmd: Command) -> Result<CommandResult, CoreError> {
    match cmd {
        Command::Select { key } => Ok(CommandResult::Selection(engine.select(key))),
        Command::ClearSelection => {
            engine.clear_selection();
            Ok(CommandResult::Ok)
        }
        Command::MoveAsset { key, x, y } => {
            let ids = engine.move_asset(&key, x, y)?;
            let wiring = engine.wiring();
            Ok(CommandResult::Moved(
                ids.iter().filter_map(|id| wiring.get(id).cloned()).collect(),
            ))
        }
        Command::SetStage(stage) => {
            engine.set_stage(stage);
            Ok(CommandResult::Ok)
        }
        Command::SaveLayout => engine.save_layout().map(CommandResult::Sent),
        Command::TogglePower { key, hard } => engine.toggle_power(&key, hard).map(CommandResult::Sent),
        Command::SetPower { key, on, hard } => {
            engine.set_power(&key, on, hard).map(CommandResult::Sent)
        }
        Command::SetMains { on } => engine.set_mains(on).map(CommandResult::Sent),
        Command::ExecPlay { name } => engine.exec_play(&name).map(CommandResult::Sent),
        Command::SetRecorder { enabled } => engine.set_recorder(enabled).map(CommandResult::Sent),
        Command::RequestRecorderStatus => engine.request_recorder_status().map(CommandResult::Sent),
        Command::RequestActions { range } => engine.request_actions(range).map(CommandResult::Sent),
        Command::ReplayActions { range } => engine.replay_actions(range).map(CommandResult::Sent),
        Command::ClearActions { range } => engine.clear_actions(range).map(CommandResult::Sent),
        Command::RequestStatus => engine.request_status().map(CommandResult::Sent),
    }
}
