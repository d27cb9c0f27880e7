use crate::{gateway::OpCode, intents::Intents};
use serde::{Deserialize, Serialize};

/// The `properties` object IDENTIFY sends to describe the connecting client.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl IdentifyProperties {
    pub fn new(os: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            browser: "discatcore".into(),
            device: "discatcore".into(),
        }
    }
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self::new(std::env::consts::OS)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IdentifyInfo {
    pub token: String,
    pub intents: Intents,
    pub properties: IdentifyProperties,
    pub large_threshold: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,
}

/// Outbound opcode-2 payload, sent on first connect (as opposed to RESUME).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Identify {
    pub op: OpCode,
    pub d: IdentifyInfo,
}

impl Identify {
    pub fn new(token: impl Into<String>, intents: Intents) -> Self {
        Self {
            op: OpCode::Identify,
            d: IdentifyInfo {
                token: token.into(),
                intents,
                properties: IdentifyProperties::default(),
                large_threshold: 250,
                shard: None,
            },
        }
    }
}
