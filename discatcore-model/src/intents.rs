use bitflags::bitflags;
use serde::{
    de::{Deserialize, Deserializer},
    ser::{Serialize, Serializer},
};

bitflags! {
    /// Privileged and unprivileged gateway intents, declared on IDENTIFY to
    /// select which dispatch event categories the connection subscribes to.
    pub struct Intents: u64 {
        const GUILDS = 1;
        const GUILD_MEMBERS = 1 << 1;
        const GUILD_BANS = 1 << 2;
        const GUILD_EMOJIS_AND_STICKERS = 1 << 3;
        const GUILD_INTEGRATIONS = 1 << 4;
        const GUILD_WEBHOOKS = 1 << 5;
        const GUILD_INVITES = 1 << 6;
        const GUILD_VOICE_STATES = 1 << 7;
        const GUILD_PRESENCES = 1 << 8;
        const GUILD_MESSAGES = 1 << 9;
        const GUILD_MESSAGE_REACTIONS = 1 << 10;
        const GUILD_MESSAGE_TYPING = 1 << 11;
        const DIRECT_MESSAGES = 1 << 12;
        const DIRECT_MESSAGE_REACTIONS = 1 << 13;
        const DIRECT_MESSAGE_TYPING = 1 << 14;
        const MESSAGE_CONTENT = 1 << 15;
        const GUILD_SCHEDULED_EVENTS = 1 << 16;
    }
}

impl Intents {
    /// The set of intents that Discord requires prior opt-in for.
    pub const fn privileged() -> Self {
        Self::from_bits_truncate(
            Self::GUILD_MEMBERS.bits() | Self::GUILD_PRESENCES.bits() | Self::MESSAGE_CONTENT.bits(),
        )
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u64::deserialize(deserializer)?;
        let intents = Self::from_bits_truncate(bits);

        #[cfg(feature = "tracing")]
        if intents.bits() != bits {
            tracing::debug!(raw = bits, truncated = intents.bits(), "unknown intent bits truncated");
        }

        Ok(intents)
    }
}

impl Serialize for Intents {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::Intents;

    #[test]
    fn privileged_set_matches_known_flags() {
        let privileged = Intents::privileged();
        assert!(privileged.contains(Intents::GUILD_MEMBERS));
        assert!(privileged.contains(Intents::GUILD_PRESENCES));
        assert!(privileged.contains(Intents::MESSAGE_CONTENT));
        assert!(!privileged.contains(Intents::GUILDS));
    }

    #[test]
    fn truncates_unknown_bits_on_deserialize() {
        let value = serde_json::json!(1 << 62);
        let intents: Intents = serde_json::from_value(value).unwrap();
        assert_eq!(intents, Intents::empty());
    }
}
