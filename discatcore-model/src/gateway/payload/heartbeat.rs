use crate::gateway::OpCode;
use serde::{Deserialize, Serialize};

/// Outbound opcode-1 payload, carrying the last sequence number seen (or
/// `None` if no dispatch has been received yet this session).
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Heartbeat {
    pub op: OpCode,
    pub d: Option<u64>,
}

impl Heartbeat {
    pub fn new(seq: Option<u64>) -> Self {
        Self {
            op: OpCode::Heartbeat,
            d: seq,
        }
    }
}
