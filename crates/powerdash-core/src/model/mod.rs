// ── Domain model ──

pub mod asset;
pub mod environment;
pub mod key;

pub use asset::{Asset, AssetKind, Point};
pub use environment::Environment;
pub use key::AssetKey;
pub use powerdash_feed::{RecorderStatus, StageLayout};
