use crate::gateway::OpCode;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ResumeInfo {
    pub token: String,
    pub session_id: String,
    pub seq: u64,
}

/// Outbound opcode-6 payload, sent instead of IDENTIFY when the session is
/// resumable.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Resume {
    pub op: OpCode,
    pub d: ResumeInfo,
}

impl Resume {
    pub fn new(token: impl Into<String>, session_id: impl Into<String>, seq: u64) -> Self {
        Self {
            op: OpCode::Resume,
            d: ResumeInfo {
                token: token.into(),
                session_id: session_id.into(),
                seq,
            },
        }
    }
}
