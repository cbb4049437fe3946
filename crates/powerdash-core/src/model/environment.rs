// ── Process-wide environment state ──
//
// Scalars pushed by the simulator independently of the asset graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use powerdash_feed::RecorderStatus;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    /// Ambient temperature, °C.
    pub ambient: Option<f64>,
    pub ambient_rising: bool,

    /// Wall power. `None` until the simulator reports it.
    pub mains: Option<bool>,

    /// Named scenario scripts available on the simulator.
    pub plays: Vec<String>,

    pub recorder: Option<RecorderStatus>,

    /// Last action list received from the recorder.
    pub actions: Vec<Value>,

    pub updated_at: Option<DateTime<Utc>>,
}

impl Environment {
    pub(crate) fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}
