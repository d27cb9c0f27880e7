use serde::{Deserialize, Serialize};

/// Inbound opcode-10 payload data, the very first frame of any connection.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Hello {
    /// Milliseconds between required heartbeats.
    pub heartbeat_interval: u64,
}
