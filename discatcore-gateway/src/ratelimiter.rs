//! The Gateway's outbound send-rate limiter: Discord allows 120 commands per
//! 60 seconds, heartbeats excluded.
//!
//! Grounded on `original_source/discatcore/gateway/ratelimiter.py`'s
//! `Ratelimiter` (a counter plus a reset task that clears an
//! `asyncio.Event` gate every `reset_after` seconds), not
//! `twilight-gateway`'s `ratelimiter.rs` `CommandRatelimiter`: the teacher's
//! version reserves heartbeat capacity inside the same leaky bucket, while
//! spec §4.3.4 requires heartbeats to bypass the limiter entirely, which
//! is exactly what the Python source's `acquire` (only gates when
//! `commands_used == limit - 1`, and heartbeats never call it) already does.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::Notify;

const DEFAULT_LIMIT: u64 = 120;
const DEFAULT_RESET_AFTER_MILLIS: u64 = 60_000;

/// A counter-driven send-rate limiter. `acquire` only waits once the
/// counter has reached `limit - 1`; a background task resets the counter to
/// zero and wakes any waiters every `reset_after`.
#[derive(Debug)]
pub struct CommandRatelimiter {
    commands_used: AtomicU64,
    limit: u64,
    reset_after: std::time::Duration,
    notify: Notify,
}

impl CommandRatelimiter {
    pub fn new() -> Arc<Self> {
        Self::with_limit(DEFAULT_LIMIT, std::time::Duration::from_millis(DEFAULT_RESET_AFTER_MILLIS))
    }

    pub fn with_limit(limit: u64, reset_after: std::time::Duration) -> Arc<Self> {
        let this = Arc::new(Self {
            commands_used: AtomicU64::new(0),
            limit,
            reset_after,
            notify: Notify::new(),
        });

        let spawned = Arc::clone(&this);
        tokio::spawn(async move { spawned.reset_loop().await });

        this
    }

    async fn reset_loop(self: Arc<Self>) {
        loop {
            tokio::time::sleep(self.reset_after).await;
            self.commands_used.store(0, Ordering::Release);
            self.notify.notify_waiters();
        }
    }

    fn is_ratelimited(&self) -> bool {
        self.commands_used.load(Ordering::Acquire) >= self.limit.saturating_sub(1)
    }

    /// Waits until a command is safe to send, then records its usage.
    /// Heartbeats never call this — they bypass the limiter entirely by
    /// going straight to the socket.
    pub async fn acquire(&self) {
        while self.is_ratelimited() {
            let notified = self.notify.notified();
            if self.is_ratelimited() {
                notified.await;
            }
        }

        self.commands_used.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::CommandRatelimiter;
    use static_assertions::assert_impl_all;
    use std::{fmt::Debug, time::Duration};

    assert_impl_all!(CommandRatelimiter: Send, Sync, Debug);

    #[tokio::test(start_paused = true)]
    async fn acquire_blocks_once_the_limit_is_reached() {
        let limiter = CommandRatelimiter::with_limit(3, Duration::from_secs(60));

        limiter.acquire().await;
        assert!(!limiter.is_ratelimited());
        limiter.acquire().await;
        assert!(limiter.is_ratelimited());

        let waiter = {
            let limiter = std::sync::Arc::clone(&limiter);
            tokio::spawn(async move { limiter.acquire().await })
        };

        tokio::time::advance(Duration::from_secs(60)).await;
        waiter.await.unwrap();
    }
}
