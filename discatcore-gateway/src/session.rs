//! Per-connection mutable state shared between the receive loop, the
//! heartbeat task, and the send-rate limiter.
//!
//! Grounded on `twilight-gateway`'s `shard/processor/session.rs` atomic-field
//! shape (`AtomicU64` sequence, `AtomicU8` stage via `TryFrom`), generalized
//! to also carry `resume_url`/`can_resume`/`last_heartbeat_ack_at` per the
//! Gateway session state data model.

use crate::stage::Stage;
use std::{
    convert::TryFrom,
    sync::{
        atomic::{AtomicU64, AtomicU8, Ordering},
        Mutex,
    },
    time::Instant,
};

const NO_SEQUENCE: u64 = u64::MAX;

#[derive(Debug)]
pub struct Session {
    stage: AtomicU8,
    sequence: AtomicU64,
    heartbeat_interval_millis: AtomicU64,
    session_id: Mutex<Option<Box<str>>>,
    resume_url: Mutex<Option<Box<str>>>,
    can_resume: Mutex<bool>,
    last_heartbeat_ack_at: Mutex<Option<Instant>>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            stage: AtomicU8::new(Stage::Disconnected as u8),
            sequence: AtomicU64::new(NO_SEQUENCE),
            heartbeat_interval_millis: AtomicU64::new(0),
            session_id: Mutex::new(None),
            resume_url: Mutex::new(None),
            can_resume: Mutex::new(false),
            last_heartbeat_ack_at: Mutex::new(None),
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        Stage::try_from(self.stage.load(Ordering::Acquire)).unwrap_or_default()
    }

    pub fn set_stage(&self, stage: Stage) {
        self.stage.store(stage as u8, Ordering::Release);
    }

    pub fn sequence(&self) -> Option<u64> {
        let value = self.sequence.load(Ordering::Acquire);
        (value != NO_SEQUENCE).then_some(value)
    }

    /// Replaces `sequence` with `s` from a received frame, per invariant 3 —
    /// only called when the frame actually carried a non-null `s`.
    pub fn set_sequence(&self, sequence: u64) {
        self.sequence.store(sequence, Ordering::Release);
    }

    pub fn heartbeat_interval_millis(&self) -> u64 {
        self.heartbeat_interval_millis.load(Ordering::Acquire)
    }

    pub fn set_heartbeat_interval_millis(&self, millis: u64) {
        self.heartbeat_interval_millis.store(millis, Ordering::Release);
    }

    pub fn session_id(&self) -> Option<Box<str>> {
        self.session_id.lock().expect("session poisoned").clone()
    }

    pub fn set_session_id(&self, id: impl Into<Box<str>>) {
        *self.session_id.lock().expect("session poisoned") = Some(id.into());
    }

    pub fn resume_url(&self) -> Option<Box<str>> {
        self.resume_url.lock().expect("session poisoned").clone()
    }

    pub fn set_resume_url(&self, url: impl Into<Box<str>>) {
        *self.resume_url.lock().expect("session poisoned") = Some(url.into());
    }

    pub fn can_resume(&self) -> bool {
        *self.can_resume.lock().expect("session poisoned")
    }

    pub fn set_can_resume(&self, can_resume: bool) {
        *self.can_resume.lock().expect("session poisoned") = can_resume;
    }

    pub fn record_heartbeat_ack(&self) {
        self.last_heartbeat_ack_at
            .lock()
            .expect("session poisoned")
            .replace(Instant::now());
    }

    /// `true` once `last_heartbeat_ack_at` is set and older than `timeout` —
    /// the zombie-connection signal the receive loop checks every iteration.
    pub fn is_zombied(&self, timeout: std::time::Duration) -> bool {
        self.last_heartbeat_ack_at
            .lock()
            .expect("session poisoned")
            .map_or(false, |at| at.elapsed() > timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::Session;
    use static_assertions::assert_impl_all;
    use std::{fmt::Debug, time::Duration};

    assert_impl_all!(Session: Send, Sync, Debug);

    #[test]
    fn sequence_starts_unset() {
        let session = Session::new();
        assert_eq!(session.sequence(), None);
        session.set_sequence(5);
        assert_eq!(session.sequence(), Some(5));
    }

    #[test]
    fn not_zombied_until_timeout_elapses_since_last_ack() {
        let session = Session::new();
        assert!(!session.is_zombied(Duration::from_secs(30)));

        session.record_heartbeat_ack();
        assert!(!session.is_zombied(Duration::from_secs(30)));
        assert!(session.is_zombied(Duration::from_nanos(0)));
    }
}
