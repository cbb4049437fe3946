// powerdash-feed: websocket transport and wire protocol for the power topology simulator

pub mod error;
pub mod feed;
pub mod protocol;
pub mod record;
pub mod request;
pub mod websocket;

pub use error::Error;
pub use feed::{FeedEvent, TopologyFeed};
pub use protocol::{
    ActionListPayload, AmbientPayload, AssetDelta, MainsPayload, PlayListPayload, RecorderStatus,
    ServerMessage, StageLayout, TopologyPayload,
};
pub use record::{AssetPatch, AssetRecord, ParentRef};
pub use request::{ActionRange, ClientRequest, LayoutPosition};
pub use websocket::{FeedHandle, ReconnectConfig};
