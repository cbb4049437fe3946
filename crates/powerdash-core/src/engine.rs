//! Single-threaded topology engine.
//!
//! [`Engine`] owns the graph, the wiring, the selection and the
//! environment, and applies feed events and operator actions to them one
//! at a time. It never blocks and never awaits; the controller drives it
//! from a single task.

use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use powerdash_feed::{
    ActionRange, ClientRequest, FeedEvent, LayoutPosition, ServerMessage, TopologyFeed,
};

use crate::convert::Topology;
use crate::error::CoreError;
use crate::graph::AssetGraph;
use crate::model::{AssetKey, Environment, StageLayout};
use crate::power;
use crate::selection::SelectionController;
use crate::snapshot::TopologySnapshot;
use crate::sync::SyncState;
use crate::wiring::{ConnectionId, PortOffsets, PortTable, WiringModel};

pub struct Engine {
    feed: Arc<dyn TopologyFeed>,
    graph: AssetGraph,
    wiring: WiringModel,
    selection: SelectionController,
    ports: PortTable,
    sync: SyncState,
    environment: Environment,
    subscribe: bool,
}

impl Engine {
    pub fn new(feed: Arc<dyn TopologyFeed>, ports: PortTable) -> Self {
        Self {
            feed,
            graph: AssetGraph::new(),
            wiring: WiringModel::new(),
            selection: SelectionController::new(),
            ports,
            sync: SyncState::Disconnected,
            environment: Environment::default(),
            subscribe: true,
        }
    }

    /// Whether to send `subscribe` + `get_sys_status` on open.
    pub fn with_subscribe(mut self, subscribe: bool) -> Self {
        self.subscribe = subscribe;
        self
    }

    // ── Feed events ──────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Opened => {
                self.sync = SyncState::Connected;
                info!("feed online, awaiting topology");
                if self.subscribe {
                    for request in [ClientRequest::Subscribe {}, ClientRequest::GetSysStatus {}] {
                        if let Err(e) = self.send(request) {
                            warn!(error = %e, "initial request failed");
                        }
                    }
                }
            }
            FeedEvent::Closed { reason } => {
                self.sync = SyncState::Disconnected;
                info!(reason = %reason, "feed offline, keeping last known topology");
            }
            FeedEvent::Message(message) => {
                let tag = message.tag();
                if let Err(e) = self.apply_message(message) {
                    warn!(request = tag, error = %e, "discarding message");
                }
            }
        }
    }

    /// Apply one inbound message. Errors leave the state untouched.
    pub fn apply_message(&mut self, message: ServerMessage) -> Result<(), CoreError> {
        match message {
            ServerMessage::SysLayout(payload) => {
                self.load_topology(Topology::from(payload));
            }
            ServerMessage::AssetUpdate(delta) => {
                if self.graph.generation() == 0 {
                    debug!(key = %delta.key, "delta before first snapshot dropped");
                    return Ok(());
                }
                let key = AssetKey::from(delta.key);
                let outcome = self.graph.apply_delta(&key, delta.patch)?;
                for relinked in &outcome.relinked {
                    self.wiring.relink(&self.graph, &self.ports, relinked);
                }
                if outcome.moved {
                    self.wiring.refresh(&self.graph, &self.ports, &key);
                }
                debug!(key = %key, "delta applied");
            }
            ServerMessage::Ambient(ambient) => {
                self.environment.ambient = Some(ambient.ambient);
                self.environment.ambient_rising = ambient.rising;
                self.environment.touch();
            }
            ServerMessage::Mains(mains) => {
                self.environment.mains = Some(mains.mains);
                self.environment.touch();
                debug!(mains = mains.mains, "mains updated");
            }
            ServerMessage::PlayList(list) => {
                self.environment.plays = list.plays;
                self.environment.touch();
            }
            ServerMessage::ActionList(list) => {
                self.environment.actions = list.actions;
                self.environment.touch();
            }
            ServerMessage::RecorderStatus(status) => {
                self.environment.recorder = Some(status);
                self.environment.touch();
            }
        }
        Ok(())
    }

    fn load_topology(&mut self, topology: Topology) {
        let Topology {
            assets,
            stage,
            rejected,
        } = topology;
        self.graph.load_snapshot(assets, stage);
        self.wiring.rebuild(&self.graph, &self.ports);

        for (key, parent) in self.graph.unresolved_parents() {
            warn!(key = %key, parent = %parent, "asset references missing parent");
        }
        if self.selection.selected_asset(&self.graph).is_none() {
            self.selection.clear();
        }

        let empty = self.graph.is_empty();
        self.sync = SyncState::Synced { empty };
        info!(
            assets = self.graph.len(),
            components = self.graph.component_count(),
            connections = self.wiring.len(),
            rejected,
            empty,
            "topology synced"
        );
    }

    // ── Local operations ─────────────────────────────────────────────

    pub fn select(&mut self, key: AssetKey) -> Option<AssetKey> {
        self.selection.select(key).cloned()
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Move a top-level asset using the configured port offsets.
    pub fn move_asset(
        &mut self,
        key: &AssetKey,
        x: f64,
        y: f64,
    ) -> Result<Vec<ConnectionId>, CoreError> {
        let offsets = self
            .graph
            .top_level_asset(key)
            .map(|asset| self.ports.offsets_for(asset))
            .unwrap_or_default();
        self.move_asset_with(key, x, y, &offsets)
    }

    /// Move a top-level asset with caller-measured port offsets.
    pub fn move_asset_with(
        &mut self,
        key: &AssetKey,
        x: f64,
        y: f64,
        offsets: &PortOffsets,
    ) -> Result<Vec<ConnectionId>, CoreError> {
        self.wiring
            .on_asset_moved(&mut self.graph, key, x, y, offsets)
    }

    pub fn set_stage(&mut self, stage: StageLayout) {
        self.graph.set_stage(stage);
    }

    pub fn is_powered(&self, key: &AssetKey) -> Result<bool, CoreError> {
        let asset = self
            .graph
            .resolve(key)
            .ok_or_else(|| CoreError::UnknownAsset { key: key.clone() })?;
        power::is_powered(&self.graph, asset)
    }

    pub fn powered_map(&self) -> IndexMap<AssetKey, bool> {
        power::powered_map(&self.graph)
    }

    // ── Outbound requests ────────────────────────────────────────────
    //
    // Each returns `Ok(false)` without sending when the feed is offline.

    /// Flip the current status of `key`.
    pub fn toggle_power(&self, key: &AssetKey, hard: bool) -> Result<bool, CoreError> {
        if !self.online_or_warn("set_power") {
            return Ok(false);
        }
        let asset = self
            .graph
            .resolve(key)
            .ok_or_else(|| CoreError::UnknownAsset { key: key.clone() })?;
        self.set_power(key, !asset.status, hard)
    }

    pub fn set_power(&self, key: &AssetKey, on: bool, hard: bool) -> Result<bool, CoreError> {
        if !self.online_or_warn("set_power") {
            return Ok(false);
        }
        if self.graph.resolve(key).is_none() {
            return Err(CoreError::UnknownAsset { key: key.clone() });
        }
        self.send(ClientRequest::SetPower {
            key: key.to_string(),
            status: on,
            hard,
        })
    }

    pub fn set_mains(&self, on: bool) -> Result<bool, CoreError> {
        self.send(ClientRequest::SetMains { mains: on })
    }

    /// Send the current positions and stage for persistence.
    pub fn save_layout(&self) -> Result<bool, CoreError> {
        if !self.online_or_warn("set_layout") {
            return Ok(false);
        }
        let layout = self.graph.layout();
        self.send(ClientRequest::SetLayout {
            stage: layout.stage,
            assets: layout
                .assets
                .into_iter()
                .map(|(key, p)| (key.into(), LayoutPosition { x: p.x, y: p.y }))
                .collect(),
        })
    }

    pub fn exec_play(&self, name: &str) -> Result<bool, CoreError> {
        self.send(ClientRequest::ExecPlay {
            name: name.to_owned(),
        })
    }

    pub fn set_recorder(&self, enabled: bool) -> Result<bool, CoreError> {
        self.send(ClientRequest::SetRecorderStatus { enabled })
    }

    pub fn request_recorder_status(&self) -> Result<bool, CoreError> {
        self.send(ClientRequest::GetRecorderStatus {})
    }

    pub fn request_actions(&self, range: ActionRange) -> Result<bool, CoreError> {
        self.send(ClientRequest::GetActions { range })
    }

    pub fn replay_actions(&self, range: ActionRange) -> Result<bool, CoreError> {
        self.send(ClientRequest::ReplayActions { range })
    }

    pub fn clear_actions(&self, range: ActionRange) -> Result<bool, CoreError> {
        self.send(ClientRequest::ClearActions { range })
    }

    /// Ask for the full topology again.
    pub fn request_status(&self) -> Result<bool, CoreError> {
        self.send(ClientRequest::GetSysStatus {})
    }

    fn online_or_warn(&self, request: &str) -> bool {
        let online = self.feed.is_online();
        if !online {
            warn!(request, "feed offline, request not sent");
        }
        online
    }

    fn send(&self, request: ClientRequest) -> Result<bool, CoreError> {
        let name = request.name();
        if !self.online_or_warn(name) {
            return Ok(false);
        }
        match self.feed.send(request) {
            Ok(()) => {
                debug!(request = name, "request sent");
                Ok(true)
            }
            Err(powerdash_feed::Error::Offline) => {
                warn!(request = name, "feed went offline, request not sent");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    // ── Views ────────────────────────────────────────────────────────

    pub fn graph(&self) -> &AssetGraph {
        &self.graph
    }

    pub fn wiring(&self) -> &WiringModel {
        &self.wiring
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync
    }

    pub fn is_online(&self) -> bool {
        self.feed.is_online()
    }

    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            sync: self.sync,
            assets: self
                .graph
                .top_level()
                .map(|a| (a.key.clone(), a.clone()))
                .collect(),
            powered: self.powered_map(),
            connections: self.wiring.connections().cloned().collect(),
            stage: self.graph.stage(),
            selected: self.selection.selected().cloned(),
            environment: self.environment.clone(),
            generation: self.graph.generation(),
            taken_at: Utc::now(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::sync::broadcast;

    #[derive(Default)]
    struct RecordingFeed {
        online: AtomicBool,
        sent: Mutex<Vec<ClientRequest>>,
    }

    impl TopologyFeed for RecordingFeed {
        fn is_online(&self) -> bool {
            self.online.load(Ordering::SeqCst)
        }

        fn send(&self, request: ClientRequest) -> Result<(), powerdash_feed::Error> {
            self.sent.lock().unwrap().push(request);
            Ok(())
        }

        fn subscribe(&self) -> broadcast::Receiver<Arc<FeedEvent>> {
            broadcast::channel(1).1
        }
    }

    fn engine(online: bool) -> (Engine, Arc<RecordingFeed>) {
        let feed = Arc::new(RecordingFeed::default());
        feed.online.store(online, Ordering::SeqCst);
        (Engine::new(feed.clone(), PortTable::default()), feed)
    }

    fn message(value: serde_json::Value) -> ServerMessage {
        ServerMessage::from_json(&value.to_string()).unwrap()
    }

    fn pdu_snapshot() -> ServerMessage {
        let outlets: serde_json::Map<_, _> = (1..=8)
            .map(|i| {
                let key = 11110 + i;
                (key.to_string(), json!({ "key": key, "type": "outlet", "status": 0 }))
            })
            .collect();
        message(json!({
            "request": "sys_layout",
            "payload": {
                "assets": {
                    "1111": {
                        "key": 1111, "type": "pdu", "status": 0,
                        "x": 10, "y": 20,
                        "children": outlets
                    },
                    "5": { "key": 5, "type": "lamp", "status": 0, "parent": [{ "key": 11113 }] }
                }
            }
        }))
    }

    #[test]
    fn open_sends_subscribe_then_status() {
        let (mut engine, feed) = engine(true);
        engine.handle_event(FeedEvent::Opened);

        let names: Vec<_> = feed.sent.lock().unwrap().iter().map(ClientRequest::name).collect();
        assert_eq!(names, vec!["subscribe", "get_sys_status"]);
        assert_eq!(engine.sync_state(), SyncState::Connected);
    }

    #[test]
    fn snapshot_moves_to_synced() {
        let (mut engine, _) = engine(true);
        engine.handle_event(FeedEvent::Opened);
        engine.handle_event(FeedEvent::Message(pdu_snapshot()));

        assert_eq!(engine.sync_state(), SyncState::Synced { empty: false });
        assert_eq!(engine.wiring().len(), 1);
    }

    #[test]
    fn empty_snapshot_is_a_valid_state() {
        let (mut engine, _) = engine(true);
        engine.handle_event(FeedEvent::Message(message(json!({
            "request": "sys_layout", "payload": { "assets": {} }
        }))));
        assert_eq!(engine.sync_state(), SyncState::Synced { empty: true });
    }

    #[test]
    fn outlet_delta_leaves_pdu_alone() {
        let (mut engine, _) = engine(true);
        engine.handle_event(FeedEvent::Message(pdu_snapshot()));
        engine.handle_event(FeedEvent::Message(message(json!({
            "request": "asset_upd", "payload": { "key": 11111, "status": 1 }
        }))));

        let outlet = engine.graph().resolve(&"11111".into()).unwrap();
        assert!(outlet.status);
        assert!(!engine.graph().resolve(&"1111".into()).unwrap().status);
        assert!(!engine.is_powered(&"11111".into()).unwrap());
    }

    #[test]
    fn delta_before_snapshot_is_dropped() {
        let (mut engine, _) = engine(true);
        engine
            .apply_message(message(json!({
                "request": "asset_upd", "payload": { "key": 11111, "status": 1 }
            })))
            .unwrap();
        assert!(engine.graph().is_empty());
    }

    #[test]
    fn parent_delta_rewires_consumer() {
        let (mut engine, _) = engine(true);
        engine.handle_event(FeedEvent::Message(pdu_snapshot()));
        engine
            .apply_message(message(json!({
                "request": "asset", "payload": { "key": 5, "parent": [{ "key": 11114 }, { "key": 11115 }] }
            })))
            .unwrap();

        assert_eq!(engine.wiring().len(), 2);
        let sources: Vec<_> = engine
            .wiring()
            .connections()
            .map(|c| c.source_key.to_string())
            .collect();
        assert_eq!(sources, vec!["11114", "11115"]);
    }

    #[test]
    fn close_keeps_last_topology() {
        let (mut engine, _) = engine(true);
        engine.handle_event(FeedEvent::Message(pdu_snapshot()));
        engine.handle_event(FeedEvent::Closed {
            reason: "gone".into(),
        });

        assert_eq!(engine.sync_state(), SyncState::Disconnected);
        assert_eq!(engine.graph().len(), 2);
        assert_eq!(engine.snapshot().connections.len(), 1);
    }

    #[test]
    fn offline_actions_are_noops() {
        let (mut engine, feed) = engine(false);
        engine.handle_event(FeedEvent::Message(pdu_snapshot()));

        assert!(!engine.toggle_power(&"1111".into(), false).unwrap());
        assert!(!engine.set_mains(true).unwrap());
        assert!(!engine.save_layout().unwrap());
        assert!(!engine.exec_play("outage").unwrap());
        assert!(!engine.replay_actions(ActionRange::all()).unwrap());
        assert!(feed.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn toggle_flips_current_status() {
        let (mut engine, feed) = engine(true);
        engine.handle_event(FeedEvent::Message(pdu_snapshot()));

        assert!(engine.toggle_power(&"1111".into(), true).unwrap());
        assert_eq!(
            feed.sent.lock().unwrap()[0],
            ClientRequest::SetPower {
                key: "1111".into(),
                status: true,
                hard: true
            }
        );
    }

    #[test]
    fn power_on_unknown_asset_fails() {
        let (engine, _) = engine(true);
        let err = engine.set_power(&"404".into(), true, false).unwrap_err();
        assert!(matches!(err, CoreError::UnknownAsset { .. }));
    }

    #[test]
    fn save_layout_sends_positions() {
        let (mut engine, feed) = engine(true);
        engine.handle_event(FeedEvent::Message(pdu_snapshot()));
        engine.move_asset(&"5".into(), 3.5, 4.5).unwrap();

        assert!(engine.save_layout().unwrap());
        let sent = feed.sent.lock().unwrap();
        let ClientRequest::SetLayout { assets, .. } = &sent[0] else {
            panic!("expected set_layout, got {:?}", sent[0]);
        };
        assert_eq!(assets.len(), 2);
        assert_eq!(assets["5"], LayoutPosition { x: 3.5, y: 4.5 });
    }

    #[test]
    fn moving_the_pdu_recomputes_the_lamp_wire() {
        let (mut engine, _) = engine(true);
        engine.handle_event(FeedEvent::Message(pdu_snapshot()));

        let moved = engine.move_asset(&"1111".into(), 0.0, 0.0).unwrap();
        assert_eq!(
            moved,
            vec![ConnectionId {
                dest: "5".into(),
                port: 0
            }]
        );
    }

    #[test]
    fn environment_messages_update_scalars() {
        let (mut engine, _) = engine(true);
        for value in [
            json!({ "request": "ambient_upd", "payload": { "ambient": 21.5, "rising": true } }),
            json!({ "request": "mains", "payload": { "mains": 0 } }),
            json!({ "request": "play_list", "payload": { "plays": ["outage"] } }),
            json!({ "request": "recorder_status", "payload": { "status": { "enabled": true, "replaying": false } } }),
        ] {
            engine.apply_message(message(value)).unwrap();
        }

        let env = engine.environment();
        assert_eq!(env.ambient, Some(21.5));
        assert!(env.ambient_rising);
        assert_eq!(env.mains, Some(false));
        assert_eq!(env.plays, vec!["outage".to_owned()]);
        assert!(env.recorder.unwrap().enabled);
        assert!(env.updated_at.is_some());
    }

    #[test]
    fn selection_cleared_when_asset_disappears() {
        let (mut engine, _) = engine(true);
        engine.handle_event(FeedEvent::Message(pdu_snapshot()));
        engine.select("5".into());
        engine.handle_event(FeedEvent::Message(message(json!({
            "request": "sys_layout", "payload": { "assets": {} }
        }))));
        assert!(engine.selection().selected().is_none());
    }
}
