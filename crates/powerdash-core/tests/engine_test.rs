#![allow(clippy::unwrap_used)]

// Integration tests for the Controller: a scripted in-memory feed stands in
// for the simulator, and assertions read the published snapshots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::broadcast;

use powerdash_core::{
    AssetKey, Command, CommandResult, Controller, CoreError, EngineConfig, SyncState,
    TopologySnapshot,
};
use powerdash_feed::{ClientRequest, Error, FeedEvent, ServerMessage, TopologyFeed};

const WAIT: Duration = Duration::from_secs(5);

// ── Scripted feed ────────────────────────────────────────────────────

struct ScriptedFeed {
    online: AtomicBool,
    events: broadcast::Sender<Arc<FeedEvent>>,
    sent: Mutex<Vec<ClientRequest>>,
}

impl ScriptedFeed {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(false),
            events: broadcast::channel(64).0,
            sent: Mutex::new(Vec::new()),
        })
    }

    fn open(&self) {
        self.online.store(true, Ordering::SeqCst);
        self.events.send(Arc::new(FeedEvent::Opened)).unwrap();
    }

    fn close(&self) {
        self.online.store(false, Ordering::SeqCst);
        self.events
            .send(Arc::new(FeedEvent::Closed {
                reason: "server went away".into(),
            }))
            .unwrap();
    }

    fn push(&self, value: serde_json::Value) {
        let message = ServerMessage::from_json(&value.to_string()).unwrap();
        self.events.send(Arc::new(FeedEvent::Message(message))).unwrap();
    }

    fn sent_names(&self) -> Vec<&'static str> {
        self.sent.lock().unwrap().iter().map(ClientRequest::name).collect()
    }
}

impl TopologyFeed for ScriptedFeed {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn send(&self, request: ClientRequest) -> Result<(), Error> {
        if !self.is_online() {
            return Err(Error::Offline);
        }
        self.sent.lock().unwrap().push(request);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Arc<FeedEvent>> {
        self.events.subscribe()
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn pdu_topology() -> serde_json::Value {
    let outlets: serde_json::Map<_, _> = (11111..=11118)
        .map(|key| (key.to_string(), json!({ "key": key, "type": "outlet", "status": 0 })))
        .collect();
    json!({
        "request": "sys_layout",
        "payload": {
            "assets": {
                "1111": {
                    "key": 1111, "type": "pdu", "status": 0,
                    "x": 100, "y": 40,
                    "children": outlets
                },
                "2": {
                    "key": 2, "type": "lamp", "status": 0,
                    "x": 300, "y": 300,
                    "parent": [{ "key": 11112 }]
                }
            },
            "stageLayout": { "x": 0, "y": 0, "scale": 1 }
        }
    })
}

async fn controller_with(feed: &Arc<ScriptedFeed>) -> Controller {
    let controller = Controller::new(EngineConfig::new("ws://127.0.0.1:1/simengine".parse().unwrap()));
    controller.connect_feed(feed.clone()).await;
    controller
}

async fn wait_until(
    controller: &Controller,
    pred: impl Fn(&TopologySnapshot) -> bool,
) -> Arc<TopologySnapshot> {
    let mut rx = controller.subscribe();
    tokio::time::timeout(WAIT, rx.wait_for(|snap| pred(snap)))
        .await
        .expect("timed out waiting for snapshot")
        .unwrap()
        .clone()
}

fn key(k: &str) -> AssetKey {
    AssetKey::from(k)
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn outlet_delta_end_to_end() {
    let feed = ScriptedFeed::new();
    let controller = controller_with(&feed).await;

    feed.open();
    feed.push(pdu_topology());
    let state = controller.wait_for_sync(WAIT).await.unwrap();
    assert_eq!(state, SyncState::Synced { empty: false });
    assert_eq!(feed.sent_names(), vec!["subscribe", "get_sys_status"]);

    let snap = controller.snapshot();
    assert_eq!(snap.assets.len(), 2);
    assert_eq!(snap.component_count(), 8);
    assert_eq!(snap.is_powered(&key("11111")), Some(false));

    feed.push(json!({ "request": "asset_upd", "payload": { "key": 11111, "status": 1 } }));
    let snap = wait_until(&controller, |s| {
        s.get(&key("11111")).is_some_and(|a| a.status)
    })
    .await;

    assert!(!snap.get(&key("1111")).unwrap().status);
    assert_eq!(snap.is_powered(&key("11111")), Some(false));

    feed.push(json!({ "request": "asset_upd", "payload": { "key": 1111, "status": 1 } }));
    let snap = wait_until(&controller, |s| s.get(&key("1111")).is_some_and(|a| a.status)).await;
    assert_eq!(snap.is_powered(&key("11111")), Some(true));
    assert_eq!(snap.is_powered(&key("11118")), Some(true));

    controller.disconnect().await;
}

#[tokio::test]
async fn empty_topology_is_synced() {
    let feed = ScriptedFeed::new();
    let controller = controller_with(&feed).await;

    feed.open();
    feed.push(json!({ "request": "topology", "payload": { "assets": null } }));

    let state = controller.wait_for_sync(WAIT).await.unwrap();
    assert_eq!(state, SyncState::Synced { empty: true });
    controller.disconnect().await;
}

#[tokio::test]
async fn move_returns_recomputed_wires() {
    let feed = ScriptedFeed::new();
    let controller = controller_with(&feed).await;
    feed.open();
    feed.push(pdu_topology());
    controller.wait_for_sync(WAIT).await.unwrap();

    let result = controller
        .execute(Command::MoveAsset {
            key: key("2"),
            x: 10.0,
            y: 10.0,
        })
        .await
        .unwrap();

    let CommandResult::Moved(wires) = result else {
        panic!("expected Moved, got {result:?}");
    };
    assert_eq!(wires.len(), 1);
    assert_eq!(wires[0].source_key, key("11112"));
    assert_eq!(wires[0].dest_key, key("2"));

    // Moving a component is rejected.
    let err = controller
        .execute(Command::MoveAsset {
            key: key("11112"),
            x: 0.0,
            y: 0.0,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotTopLevel { .. }));

    controller.disconnect().await;
}

#[tokio::test]
async fn offline_commands_are_not_sent() {
    let feed = ScriptedFeed::new();
    let controller = controller_with(&feed).await;
    feed.open();
    feed.push(pdu_topology());
    controller.wait_for_sync(WAIT).await.unwrap();

    feed.close();
    wait_until(&controller, |s| s.sync == SyncState::Disconnected).await;

    let result = controller
        .execute(Command::TogglePower {
            key: key("1111"),
            hard: false,
        })
        .await
        .unwrap();
    assert_eq!(result, CommandResult::Sent(false));
    assert_eq!(feed.sent_names(), vec!["subscribe", "get_sys_status"]);

    // Last known topology survives the close.
    assert_eq!(controller.snapshot().assets.len(), 2);

    controller.disconnect().await;
}

#[tokio::test]
async fn reopen_resubscribes_and_replaces_topology() {
    let feed = ScriptedFeed::new();
    let controller = controller_with(&feed).await;
    feed.open();
    feed.push(pdu_topology());
    controller.wait_for_sync(WAIT).await.unwrap();

    feed.close();
    feed.open();
    feed.push(json!({
        "request": "sys_layout",
        "payload": { "assets": { "7": { "key": 7, "type": "outlet", "status": 1 } } }
    }));
    let snap = wait_until(&controller, |s| s.generation == 2).await;

    assert_eq!(snap.assets.len(), 1);
    assert!(snap.connections.is_empty());
    assert_eq!(
        feed.sent_names(),
        vec!["subscribe", "get_sys_status", "subscribe", "get_sys_status"]
    );
    controller.disconnect().await;
}

#[tokio::test]
async fn selection_toggles_through_commands() {
    let feed = ScriptedFeed::new();
    let controller = controller_with(&feed).await;
    feed.open();
    feed.push(pdu_topology());
    controller.wait_for_sync(WAIT).await.unwrap();

    let first = controller
        .execute(Command::Select { key: key("11113") })
        .await
        .unwrap();
    assert_eq!(first, CommandResult::Selection(Some(key("11113"))));
    assert_eq!(controller.snapshot().selected_asset().unwrap().key, key("11113"));

    let second = controller
        .execute(Command::Select { key: key("11113") })
        .await
        .unwrap();
    assert_eq!(second, CommandResult::Selection(None));

    controller.disconnect().await;
}

#[tokio::test]
async fn execute_requires_connection() {
    let controller = Controller::new(EngineConfig::new("ws://127.0.0.1:1/".parse().unwrap()));
    let err = controller.execute(Command::RequestStatus).await.unwrap_err();
    assert!(matches!(err, CoreError::ControllerDisconnected));
}

#[tokio::test]
async fn wait_for_sync_times_out() {
    let feed = ScriptedFeed::new();
    let controller = controller_with(&feed).await;
    feed.open();

    let err = controller
        .wait_for_sync(Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Timeout { .. }));
    controller.disconnect().await;
}

#[tokio::test]
async fn snapshot_stream_yields_published_topology() {
    use futures_util::StreamExt;

    let feed = ScriptedFeed::new();
    let controller = controller_with(&feed).await;
    let mut stream = controller.stream().into_stream();

    // WatchStream yields the current value first.
    let first = tokio::time::timeout(WAIT, stream.next()).await.unwrap().unwrap();
    assert_eq!(first.sync, SyncState::Disconnected);

    feed.open();
    feed.push(pdu_topology());

    let synced = tokio::time::timeout(WAIT, async {
        while let Some(snap) = stream.next().await {
            if snap.sync.is_synced() {
                return Some(snap);
            }
        }
        None
    })
    .await
    .unwrap()
    .unwrap();
    assert_eq!(synced.assets.len(), 2);

    controller.disconnect().await;
}
