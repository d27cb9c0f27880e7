use crate::{gateway::OpCode, id::Id};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RequestGuildMembersInfo {
    pub guild_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ids: Option<Vec<Id>>,
}

/// Outbound opcode-8 payload.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RequestGuildMembers {
    pub op: OpCode,
    pub d: RequestGuildMembersInfo,
}

impl RequestGuildMembers {
    pub fn builder(guild_id: Id) -> RequestGuildMembersInfo {
        RequestGuildMembersInfo {
            guild_id,
            query: Some(String::new()),
            limit: 0,
            user_ids: None,
        }
    }
}

impl From<RequestGuildMembersInfo> for RequestGuildMembers {
    fn from(d: RequestGuildMembersInfo) -> Self {
        Self {
            op: OpCode::RequestGuildMembers,
            d,
        }
    }
}
