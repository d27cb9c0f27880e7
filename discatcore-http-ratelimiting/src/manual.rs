use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tokio::sync::Notify;

/// A lock-with-timed-release primitive: no counters, just `acquire` (wait
/// until unlocked) and `lock_for` (lock now, auto-unlock after a delay).
///
/// Used directly as the HTTP global bucket, and as the base every burst
/// [`Bucket`](crate::bucket::Bucket) layers counter-driven auto-locking on
/// top of.
#[derive(Debug, Default)]
pub struct ManualRatelimiter {
    locked: AtomicBool,
    notify: Notify,
}

impl ManualRatelimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Idempotent: a no-op if already locked, matching the source
    /// ratelimiter's `lock_for` (callers racing to re-lock an
    /// already-locked bucket shouldn't each schedule their own unlock).
    pub fn lock_for(self: &std::sync::Arc<Self>, delay: Duration) {
        if self.locked.swap(true, Ordering::AcqRel) {
            return;
        }

        let this = std::sync::Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.locked.store(false, Ordering::Release);
            this.notify.notify_waiters();
        });
    }

    /// Waits until unlocked. Returns immediately if already unlocked.
    pub async fn acquire(&self) {
        loop {
            if !self.is_locked() {
                return;
            }

            let notified = self.notify.notified();
            if self.is_locked() {
                notified.await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ManualRatelimiter;
    use static_assertions::assert_impl_all;
    use std::{fmt::Debug, sync::Arc, time::Duration};

    assert_impl_all!(ManualRatelimiter: Debug, Send, Sync);

    #[tokio::test(start_paused = true)]
    async fn lock_for_blocks_acquire_until_elapsed() {
        let limiter = Arc::new(ManualRatelimiter::new());
        limiter.lock_for(Duration::from_secs(2));
        assert!(limiter.is_locked());

        let waiter = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move {
                limiter.acquire().await;
            })
        };

        tokio::time::advance(Duration::from_secs(2)).await;
        waiter.await.unwrap();
        assert!(!limiter.is_locked());
    }

    #[tokio::test]
    async fn lock_for_is_idempotent() {
        let limiter = Arc::new(ManualRatelimiter::new());
        limiter.lock_for(Duration::from_secs(60));
        limiter.lock_for(Duration::from_millis(1));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(limiter.is_locked(), "second lock_for must not shorten the first");
    }
}
