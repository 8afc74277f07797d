//! Broker identity section

use serde::Deserialize;

/// `[broker]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    /// Human-readable broker name, used in logs and stats
    pub name: String,

    /// Numeric id stamped as `source_id` on locally-originated events
    pub broker_id: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            name: "vigil".into(),
            broker_id: 0,
        }
    }
}
