use crate::{headers::RatelimitHeaders, manual::ManualRatelimiter};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

/// A single Discord ratelimit bucket: burst counter accounting
/// (`limit`/`remaining`/`reset_after`) layered on top of the
/// [`ManualRatelimiter`] lock primitive every bucket shares with the global
/// bucket.
///
/// `remaining`/`limit` are stored as atomics so reads don't need to take the
/// `hash`/`reset_at` mutex; `update_from_response` still serializes its own
/// read-modify-write of the hash/reset_at fields under that mutex to avoid
/// racing concurrent responses for the same route.
#[derive(Debug)]
pub struct Bucket {
    limit: AtomicU64,
    remaining: AtomicU64,
    reset_after: AtomicU64,
    inner: Mutex<Inner>,
    first_update: AtomicBool,
    migrated: AtomicBool,
    lock: Arc<ManualRatelimiter>,
}

#[derive(Debug, Default)]
struct Inner {
    reset_at: Option<f64>,
    server_hash: Option<Box<str>>,
}

const UNSET: u64 = u64::MAX;

impl Default for Bucket {
    fn default() -> Self {
        Self {
            limit: AtomicU64::new(UNSET),
            remaining: AtomicU64::new(UNSET),
            reset_after: AtomicU64::new(0),
            inner: Mutex::new(Inner::default()),
            first_update: AtomicBool::new(true),
            migrated: AtomicBool::new(false),
            lock: Arc::new(ManualRatelimiter::new()),
        }
    }
}

impl Bucket {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn limit(&self) -> Option<u64> {
        unset_to_option(self.limit.load(Ordering::Acquire))
    }

    pub fn remaining(&self) -> Option<u64> {
        unset_to_option(self.remaining.load(Ordering::Acquire))
    }

    pub fn reset_after(&self) -> Option<Duration> {
        let millis = self.reset_after.load(Ordering::Acquire);
        (millis > 0).then(|| Duration::from_millis(millis))
    }

    pub fn reset_at(&self) -> Option<f64> {
        self.inner.lock().expect("bucket poisoned").reset_at
    }

    pub fn server_hash(&self) -> Option<Box<str>> {
        self.inner.lock().expect("bucket poisoned").server_hash.clone()
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// `true` once a response has told this bucket its hash differs from
    /// one already recorded; the registry checks this after every update to
    /// decide whether the caller needs to re-resolve its bucket handle.
    pub fn migrated(&self) -> bool {
        self.migrated.load(Ordering::Acquire)
    }

    /// Records `hash` as this bucket's server-assigned hash if unset.
    /// Flags [`Bucket::migrated`] if a *different* hash than the one
    /// already recorded comes in, rather than silently overwriting it.
    fn record_hash(&self, hash: &str) {
        let mut inner = self.inner.lock().expect("bucket poisoned");
        match &inner.server_hash {
            None => inner.server_hash = Some(hash.into()),
            Some(existing) if existing.as_ref() == hash => {}
            Some(_) => self.migrated.store(true, Ordering::Release),
        }
    }

    /// Updates bucket accounting from response headers, mirroring Discord's
    /// documented precedence rules: `remaining` only ever shrinks within a
    /// bucket lifetime (racing responses can arrive out of order),
    /// `reset_after` only ever grows (prefer the longer estimate), and a
    /// 429 status forces `remaining` to 0 regardless of what the header
    /// said. Auto-locks for `reset_after` if this update exhausts the
    /// bucket.
    pub fn update_from_response(&self, headers: &RatelimitHeaders, status: u16) {
        let first_update = self.first_update.swap(false, Ordering::AcqRel);

        self.limit
            .store(headers.limit.unwrap_or(1), Ordering::Release);

        let remaining = if status == 429 {
            Some(0)
        } else {
            headers.remaining
        };

        match remaining {
            None => {
                self.remaining.store(1, Ordering::Release);
            }
            Some(parsed) => {
                if first_update {
                    self.remaining.store(parsed, Ordering::Release);
                } else {
                    let current = self.remaining.load(Ordering::Acquire);
                    if current == UNSET || parsed < current {
                        self.remaining.store(parsed, Ordering::Release);
                    }
                }
            }
        }

        if let Some(reset_after_secs) = headers.reset_after {
            let parsed_millis = (reset_after_secs * 1000.0).ceil() as u64;
            let current = self.reset_after.load(Ordering::Acquire);
            if parsed_millis > current {
                self.reset_after.store(parsed_millis, Ordering::Release);
            }
        }

        if let Some(reset_at) = headers.reset_at {
            self.inner.lock().expect("bucket poisoned").reset_at = Some(reset_at);
        }

        if let Some(hash) = &headers.bucket {
            self.record_hash(hash);
        }

        let reset_after = self.reset_after.load(Ordering::Acquire);
        if self.remaining() == Some(0) && reset_after > 0 && !self.is_locked() {
            self.lock_for(Duration::from_millis(reset_after));
        }
    }

    /// Locks first if the bucket is already known to be exhausted, then
    /// waits for the lock to clear.
    pub async fn acquire(&self) {
        if let Some(reset_after) = self.reset_after() {
            if self.remaining() == Some(0) && !self.is_locked() {
                self.lock_for(reset_after);
            }
        }

        self.lock.acquire().await;
    }

    pub fn lock_for(&self, delay: Duration) {
        self.lock.lock_for(delay);
    }
}

fn unset_to_option(value: u64) -> Option<u64> {
    (value != UNSET).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::Bucket;
    use crate::headers::RatelimitHeaders;
    use static_assertions::assert_impl_all;
    use std::{fmt::Debug, time::Duration};

    assert_impl_all!(Bucket: Debug, Send, Sync);

    fn headers(
        limit: Option<u64>,
        remaining: Option<u64>,
        reset_after: Option<f64>,
        bucket: Option<&str>,
    ) -> RatelimitHeaders {
        RatelimitHeaders {
            bucket: bucket.map(Into::into),
            limit,
            remaining,
            reset_at: None,
            reset_after,
            scope: None,
            retry_after: None,
            via_present: true,
        }
    }

    #[test]
    fn first_update_sets_remaining_exactly() {
        let bucket = Bucket::default();
        bucket.update_from_response(&headers(Some(5), Some(4), Some(1.0), Some("abc")), 200);
        assert_eq!(bucket.limit(), Some(5));
        assert_eq!(bucket.remaining(), Some(4));
        assert_eq!(bucket.server_hash().as_deref(), Some("abc"));
    }

    #[test]
    fn remaining_is_monotonically_non_increasing() {
        let bucket = Bucket::default();
        bucket.update_from_response(&headers(Some(5), Some(4), Some(1.0), None), 200);
        // A later response reporting a *higher* remaining (arrived out of
        // order) must not move the counter backward.
        bucket.update_from_response(&headers(Some(5), Some(5), Some(1.0), None), 200);
        assert_eq!(bucket.remaining(), Some(4));

        bucket.update_from_response(&headers(Some(5), Some(2), Some(1.0), None), 200);
        assert_eq!(bucket.remaining(), Some(2));
    }

    #[test]
    fn reset_after_prefers_the_longer_estimate() {
        let bucket = Bucket::default();
        bucket.update_from_response(&headers(Some(5), Some(4), Some(1.0), None), 200);
        bucket.update_from_response(&headers(Some(5), Some(3), Some(0.5), None), 200);
        assert_eq!(bucket.reset_after(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn status_429_forces_remaining_to_zero() {
        let bucket = Bucket::default();
        bucket.update_from_response(&headers(Some(5), None, Some(1.0), None), 429);
        assert_eq!(bucket.remaining(), Some(0));
    }

    #[test]
    fn missing_remaining_header_defaults_to_one() {
        let bucket = Bucket::default();
        bucket.update_from_response(&headers(Some(5), None, None, None), 200);
        assert_eq!(bucket.remaining(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_remaining_auto_locks_for_reset_after() {
        let bucket = Bucket::default();
        bucket.update_from_response(&headers(Some(1), Some(0), Some(2.0), None), 200);
        assert!(bucket.is_locked());

        let start = tokio::time::Instant::now();
        bucket.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[test]
    fn differing_hash_flags_migrated_without_overwriting() {
        let bucket = Bucket::default();
        bucket.update_from_response(&headers(Some(5), Some(4), Some(1.0), Some("abc")), 200);
        bucket.update_from_response(&headers(Some(5), Some(3), Some(1.0), Some("xyz")), 200);
        assert!(bucket.migrated());
        assert_eq!(bucket.server_hash().as_deref(), Some("abc"));
    }
}
