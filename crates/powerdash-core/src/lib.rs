// powerdash-core: topology state, power derivation and wiring between powerdash-feed and consumers (CLI).

pub mod command;
pub mod config;
pub mod controller;
pub mod convert;
pub mod engine;
pub mod error;
pub mod graph;
pub mod model;
pub mod power;
pub mod selection;
pub mod snapshot;
pub mod stream;
pub mod sync;
pub mod wiring;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult};
pub use config::EngineConfig;
pub use controller::Controller;
pub use engine::Engine;
pub use error::CoreError;
pub use graph::{AssetGraph, LayoutSnapshot, Location};
pub use selection::SelectionController;
pub use snapshot::TopologySnapshot;
pub use stream::SnapshotStream;
pub use sync::SyncState;
pub use wiring::{Connection, ConnectionId, KindPorts, PortOffsets, PortTable, SlotPattern, WiringModel};

pub use model::{Asset, AssetKey, AssetKind, Environment, Point, RecorderStatus, StageLayout};
pub use powerdash_feed::ActionRange;
