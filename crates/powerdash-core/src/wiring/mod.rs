//! Derived wire geometry between assets.
//!
//! Every parent entry of every asset or component becomes one
//! [`Connection`], running from the feed's output socket to the consumer's
//! input socket. Connections are indexed by the top-level asset at each end
//! so a drag only recomputes the wires attached to the dragged asset.

mod ports;

pub use ports::{KindPorts, PortOffsets, PortTable, SlotPattern};

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::error::CoreError;
use crate::graph::{AssetGraph, Location};
use crate::model::{AssetKey, Point};

/// One connection per `(consumer, parent slot)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionId {
    pub dest: AssetKey,
    pub port: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connection {
    pub id: ConnectionId,
    /// Feeding asset or component.
    pub source_key: AssetKey,
    /// Consuming asset or component (same as `id.dest`).
    pub dest_key: AssetKey,
    pub source: Point,
    pub dest: Point,
    /// Top-level asset that carries the source socket.
    pub source_owner: AssetKey,
    /// Top-level asset that carries the destination socket.
    pub dest_owner: AssetKey,
}

// ── Endpoint resolution ──────────────────────────────────────────────

/// Offsets per top-level asset, computed at most once per derivation.
struct OffsetCache<'a> {
    graph: &'a AssetGraph,
    table: &'a PortTable,
    cache: HashMap<AssetKey, PortOffsets>,
}

impl<'a> OffsetCache<'a> {
    fn new(graph: &'a AssetGraph, table: &'a PortTable) -> Self {
        Self {
            graph,
            table,
            cache: HashMap::new(),
        }
    }

    fn offsets(&mut self, owner: &AssetKey) -> Option<&PortOffsets> {
        if !self.cache.contains_key(owner) {
            let asset = self.graph.top_level_asset(owner)?;
            self.cache
                .insert(owner.clone(), self.table.offsets_for(asset));
        }
        self.cache.get(owner)
    }

    fn origin(&self, owner: &AssetKey) -> Point {
        self.graph
            .top_level_asset(owner)
            .and_then(|a| a.position)
            .unwrap_or(Point::ORIGIN)
    }

    /// `(owner, point)` of the output socket of `source`.
    fn source(&mut self, source: &AssetKey) -> Option<(AssetKey, Point)> {
        let (owner, component) = split(self.graph, source)?;
        let origin = self.origin(&owner);
        let offsets = self.offsets(&owner)?;
        let offset = if component {
            offsets.child(source)
        } else {
            offsets.output
        };
        Some((owner, origin + offset))
    }

    /// `(owner, point)` of input `port` of `dest`.
    fn dest(&mut self, dest: &AssetKey, port: usize) -> Option<(AssetKey, Point)> {
        let (owner, component) = split(self.graph, dest)?;
        let origin = self.origin(&owner);
        let offsets = self.offsets(&owner)?;
        let offset = if component {
            offsets.child(dest)
        } else {
            offsets.input(port)
        };
        Some((owner, origin + offset))
    }
}

/// Top-level owner of `key` and whether `key` is a component.
fn split(graph: &AssetGraph, key: &AssetKey) -> Option<(AssetKey, bool)> {
    match graph.locate(key)? {
        Location::TopLevel => Some((key.clone(), false)),
        Location::Component { owner } => Some((owner, true)),
    }
}

// ── WiringModel ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct WiringModel {
    connections: IndexMap<ConnectionId, Connection>,
    by_source_owner: HashMap<AssetKey, IndexSet<ConnectionId>>,
    by_dest_owner: HashMap<AssetKey, IndexSet<ConnectionId>>,
}

impl WiringModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive every connection from scratch. Only used at snapshot time.
    pub fn rebuild(&mut self, graph: &AssetGraph, table: &PortTable) {
        self.clear();
        let mut offsets = OffsetCache::new(graph, table);
        let mut skipped = 0usize;

        for asset in graph.iter_all() {
            for (port, parent) in asset.parent.iter().enumerate() {
                match link(&mut offsets, parent, &asset.key, port) {
                    Some(conn) => self.insert(conn),
                    None => {
                        skipped += 1;
                        warn!(key = %asset.key, parent = %parent, "skipping wire to unresolved parent");
                    }
                }
            }
        }

        debug!(
            connections = self.connections.len(),
            skipped, "wiring rebuilt"
        );
    }

    /// Re-derive the connections that terminate at `key`, after its parent
    /// list changed.
    pub fn relink(&mut self, graph: &AssetGraph, table: &PortTable, key: &AssetKey) {
        let stale: Vec<ConnectionId> = match split(graph, key) {
            Some((owner, _)) => self
                .by_dest_owner
                .get(&owner)
                .into_iter()
                .flatten()
                .filter(|id| &id.dest == key)
                .cloned()
                .collect(),
            None => self
                .connections
                .keys()
                .filter(|id| &id.dest == key)
                .cloned()
                .collect(),
        };
        for id in &stale {
            self.remove(id);
        }

        let Some(asset) = graph.resolve(key) else {
            return;
        };
        let mut offsets = OffsetCache::new(graph, table);
        for (port, parent) in asset.parent.iter().enumerate() {
            match link(&mut offsets, parent, key, port) {
                Some(conn) => self.insert(conn),
                None => warn!(key = %key, parent = %parent, "skipping wire to unresolved parent"),
            }
        }
        debug!(key = %key, removed = stale.len(), added = asset.parent.len(), "wiring relinked");
    }

    /// Move a top-level asset and recompute the wires attached to it.
    ///
    /// Only connections whose source or destination sits on `key` (the
    /// asset itself or one of its components) are touched. Returns the ids
    /// that were recomputed.
    pub fn on_asset_moved(
        &mut self,
        graph: &mut AssetGraph,
        key: &AssetKey,
        x: f64,
        y: f64,
        offsets: &PortOffsets,
    ) -> Result<Vec<ConnectionId>, CoreError> {
        graph.set_position(key, x, y)?;
        Ok(self.update_endpoints(key, Point::new(x, y), offsets))
    }

    /// Recompute the wires attached to `key` from its stored position,
    /// e.g. after a delta moved it.
    pub fn refresh(
        &mut self,
        graph: &AssetGraph,
        table: &PortTable,
        key: &AssetKey,
    ) -> Vec<ConnectionId> {
        let Some(asset) = graph.top_level_asset(key) else {
            return Vec::new();
        };
        let origin = asset.position.unwrap_or(Point::ORIGIN);
        self.update_endpoints(key, origin, &table.offsets_for(asset))
    }

    fn update_endpoints(
        &mut self,
        owner: &AssetKey,
        origin: Point,
        offsets: &PortOffsets,
    ) -> Vec<ConnectionId> {
        let mut touched = Vec::new();

        if let Some(ids) = self.by_source_owner.get(owner) {
            for id in ids {
                if let Some(conn) = self.connections.get_mut(id) {
                    let offset = if &conn.source_key == owner {
                        offsets.output
                    } else {
                        offsets.child(&conn.source_key)
                    };
                    conn.source = origin + offset;
                    touched.push(id.clone());
                }
            }
        }

        if let Some(ids) = self.by_dest_owner.get(owner) {
            for id in ids {
                if let Some(conn) = self.connections.get_mut(id) {
                    let offset = if &conn.dest_key == owner {
                        offsets.input(id.port)
                    } else {
                        offsets.child(&conn.dest_key)
                    };
                    conn.dest = origin + offset;
                    if !touched.contains(id) {
                        touched.push(id.clone());
                    }
                }
            }
        }

        trace!(key = %owner, connections = touched.len(), "wires moved");
        touched
    }

    // ── Access ───────────────────────────────────────────────────────

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    /// Ids of every connection with an end on `owner` or its components.
    pub fn touching(&self, owner: &AssetKey) -> IndexSet<ConnectionId> {
        let empty = IndexSet::new();
        let src = self.by_source_owner.get(owner).unwrap_or(&empty);
        let dst = self.by_dest_owner.get(owner).unwrap_or(&empty);
        src.union(dst).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn clear(&mut self) {
        self.connections.clear();
        self.by_source_owner.clear();
        self.by_dest_owner.clear();
    }

    // ── Index maintenance ────────────────────────────────────────────

    fn insert(&mut self, conn: Connection) {
        self.by_source_owner
            .entry(conn.source_owner.clone())
            .or_default()
            .insert(conn.id.clone());
        self.by_dest_owner
            .entry(conn.dest_owner.clone())
            .or_default()
            .insert(conn.id.clone());
        self.connections.insert(conn.id.clone(), conn);
    }

    fn remove(&mut self, id: &ConnectionId) {
        let Some(conn) = self.connections.shift_remove(id) else {
            return;
        };
        if let Some(ids) = self.by_source_owner.get_mut(&conn.source_owner) {
            ids.shift_remove(id);
        }
        if let Some(ids) = self.by_dest_owner.get_mut(&conn.dest_owner) {
            ids.shift_remove(id);
        }
    }
}

fn link(
    offsets: &mut OffsetCache<'_>,
    source_key: &AssetKey,
    dest_key: &AssetKey,
    port: usize,
) -> Option<Connection> {
    let (source_owner, source) = offsets.source(source_key)?;
    let (dest_owner, dest) = offsets.dest(dest_key, port)?;
    Some(Connection {
        id: ConnectionId {
            dest: dest_key.clone(),
            port,
        },
        source_key: source_key.clone(),
        dest_key: dest_key.clone(),
        source,
        dest,
        source_owner,
        dest_owner,
    })
}

// ── Tests ────────────────────────────────────────────────────────────
