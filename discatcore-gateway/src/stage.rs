//! The connection stage a [`Shard`](crate::Shard) is currently in.
//!
//! Grounded on `twilight-gateway`'s `shard/stage.rs` (`repr(u8)` enum plus a
//! `TryFrom<u8>` parser for the atomically-stored representation), extended
//! with the full `Connecting -> AwaitingHello -> Handshaking -> Running ->
//! Closing -> (Reconnecting | Terminated)` state table.

use std::{
    convert::TryFrom,
    error::Error,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// Reason a raw `u8` failed to convert into a [`Stage`].
#[derive(Clone, Copy, Debug)]
pub struct StageConversionError {
    pub value: u8,
}

impl Display for StageConversionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} is not a valid Stage", self.value)
    }
}

impl Error for StageConversionError {}

/// The current connection stage of a [`Shard`](crate::Shard).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u8)]
pub enum Stage {
    /// No connection has been attempted yet.
    Disconnected,
    /// The WebSocket handshake is in flight.
    Connecting,
    /// Connected, waiting for the first frame to be HELLO.
    AwaitingHello,
    /// HELLO was received; IDENTIFY/RESUME is being sent and the heartbeat
    /// and send-rate-limiter tasks are starting.
    Handshaking,
    /// Steady state: the receive loop is processing frames.
    Running,
    /// A close has been initiated, locally or by the peer.
    Closing,
    /// Closed with `reconnect = true`; the caller should re-enter `connect`.
    Reconnecting,
    /// Closed with `reconnect = false`; this shard will not run again.
    Terminated,
}

impl Default for Stage {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::AwaitingHello => "AwaitingHello",
            Self::Handshaking => "Handshaking",
            Self::Running => "Running",
            Self::Closing => "Closing",
            Self::Reconnecting => "Reconnecting",
            Self::Terminated => "Terminated",
        })
    }
}

impl TryFrom<u8> for Stage {
    type Error = StageConversionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Disconnected,
            1 => Self::Connecting,
            2 => Self::AwaitingHello,
            3 => Self::Handshaking,
            4 => Self::Running,
            5 => Self::Closing,
            6 => Self::Reconnecting,
            7 => Self::Terminated,
            _ => return Err(StageConversionError { value }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Stage;
    use static_assertions::assert_impl_all;
    use std::{convert::TryFrom, fmt::Debug};

    assert_impl_all!(Stage: Clone, Copy, Debug, Send, Sync);

    #[test]
    fn round_trips_every_variant_through_u8() {
        for stage in [
            Stage::Disconnected,
            Stage::Connecting,
            Stage::AwaitingHello,
            Stage::Handshaking,
            Stage::Running,
            Stage::Closing,
            Stage::Reconnecting,
            Stage::Terminated,
        ] {
            assert_eq!(Stage::try_from(stage as u8).unwrap(), stage);
        }
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(Stage::try_from(8).is_err());
    }
}
