mod heartbeat;
mod hello;
mod identify;
mod request_guild_members;
mod resume;
mod update_presence;
mod update_voice_state;

pub use self::{
    heartbeat::Heartbeat,
    hello::Hello,
    identify::{Identify, IdentifyInfo, IdentifyProperties},
    request_guild_members::{RequestGuildMembers, RequestGuildMembersInfo},
    resume::Resume,
    update_presence::UpdatePresence,
    update_voice_state::UpdateVoiceState,
};
