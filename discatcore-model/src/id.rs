use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A Discord snowflake id.
///
/// This is a bare newtype around the wire representation rather than a
/// decomposed `{timestamp, worker_id, process_id, increment}` value: nothing
/// in this runtime needs to look inside an id, only to carry it around and
/// compare it for equality.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Id(#[serde(with = "id_as_str")] u64);

impl Id {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.0, f)
    }
}

impl From<u64> for Id {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

/// Discord represents snowflakes as JSON strings to dodge precision loss in
/// languages whose numbers can't hold a full u64; mirror that on the wire.
mod id_as_str {
    use serde::{de::Error as DeError, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = <&str>::deserialize(deserializer)?;
        raw.parse().map_err(DeError::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::Id;
    use serde_test::{assert_tokens, Token};

    #[test]
    fn serializes_as_string() {
        let id = Id::new(123_456_789_012_345_678);
        assert_tokens(&id, &[Token::Str("123456789012345678")]);
    }
}
