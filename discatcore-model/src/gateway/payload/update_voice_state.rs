use crate::{gateway::OpCode, id::Id};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct UpdateVoiceStateInfo {
    pub guild_id: Id,
    pub channel_id: Option<Id>,
    pub self_mute: bool,
    pub self_deaf: bool,
}

/// Outbound opcode-4 payload.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct UpdateVoiceState {
    pub op: OpCode,
    pub d: UpdateVoiceStateInfo,
}

impl UpdateVoiceState {
    pub fn new(guild_id: Id, channel_id: Option<Id>, self_mute: bool, self_deaf: bool) -> Self {
        Self {
            op: OpCode::VoiceStateUpdate,
            d: UpdateVoiceStateInfo {
                guild_id,
                channel_id,
                self_mute,
                self_deaf,
            },
        }
    }
}
