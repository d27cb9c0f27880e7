use crate::gateway::OpCode;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UpdatePresenceInfo {
    pub since: Option<u64>,
    pub afk: bool,
    pub status: String,
    pub activities: Vec<serde_json::Value>,
}

/// Outbound opcode-3 payload.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UpdatePresence {
    pub op: OpCode,
    pub d: UpdatePresenceInfo,
}

impl UpdatePresence {
    pub fn new(status: impl Into<String>, afk: bool, since: Option<u64>) -> Self {
        Self {
            op: OpCode::PresenceUpdate,
            d: UpdatePresenceInfo {
                since,
                afk,
                status: status.into(),
                activities: Vec::new(),
            },
        }
    }
}
