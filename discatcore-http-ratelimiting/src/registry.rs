//! The ratelimiter registry: the two-tier pseudo-bucket/hash bucket index
//! plus the global lock.
//!
//! Grounded on `discatcore`'s original Python `Ratelimiter`
//! (`discord_buckets`/`url_buckets`/`url_to_discord_hash`), translated from
//! "raise `BucketMigrated` as control flow" to a `migrated: bool` return
//! value a caller checks and acts on.

use crate::{bucket::Bucket, manual::ManualRatelimiter};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex as AsyncMutex;

/// Returned by [`Ratelimiter::migrate_bucket`]. `true` means the caller's
/// bucket handle is stale and must be re-resolved via
/// [`Ratelimiter::get_bucket`] before being used again — either because it
/// was just promoted into the hash map under a new key, or because another
/// pseudo-bucket got there first and the caller's instance was discarded in
/// favor of the winning shared one.
pub type Migrated = bool;

#[derive(Debug, Default)]
struct Buckets {
    /// Keyed by pseudo-bucket, for routes whose server hash isn't known yet.
    by_pseudo: HashMap<Box<str>, Arc<Bucket>>,
    /// Keyed by server-assigned hash, the canonical long-lived store.
    by_hash: HashMap<Box<str>, Arc<Bucket>>,
    /// pseudo-bucket -> hash, once resolved.
    aliases: HashMap<Box<str>, Box<str>>,
}

/// Holds every [`Bucket`] this client has discovered, plus the
/// [`ManualRatelimiter`] used for Discord's global 429 lock.
#[derive(Debug)]
pub struct Ratelimiter {
    buckets: AsyncMutex<Buckets>,
    global_bucket: Arc<ManualRatelimiter>,
}

impl Default for Ratelimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Ratelimiter {
    pub fn new() -> Self {
        Self {
            buckets: AsyncMutex::new(Buckets::default()),
            global_bucket: Arc::new(ManualRatelimiter::new()),
        }
    }

    /// Cloned rather than borrowed: [`ManualRatelimiter::lock_for`] needs
    /// its own `Arc` to spawn the delayed-unlock task from.
    pub fn global_bucket(&self) -> Arc<ManualRatelimiter> {
        Arc::clone(&self.global_bucket)
    }

    /// Returns the canonical [`Bucket`] for `pseudo_bucket`, resolving
    /// through the alias map to the hash-keyed instance if one exists, or
    /// creating (and registering) a fresh unconfigured bucket otherwise.
    pub async fn get_bucket(&self, pseudo_bucket: &str) -> Arc<Bucket> {
        let mut buckets = self.buckets.lock().await;

        if let Some(hash) = buckets.aliases.get(pseudo_bucket) {
            if let Some(bucket) = buckets.by_hash.get(hash) {
                return Arc::clone(bucket);
            }
        }

        if let Some(bucket) = buckets.by_pseudo.get(pseudo_bucket) {
            return Arc::clone(bucket);
        }

        let bucket = Bucket::new();
        buckets
            .by_pseudo
            .insert(pseudo_bucket.into(), Arc::clone(&bucket));
        bucket
    }

    /// Promotes the bucket registered under `pseudo_bucket` into the
    /// hash-keyed map under `server_hash`. If another pseudo-bucket already
    /// resolved to this hash, that bucket wins: the caller's instance is
    /// discarded and the alias points at the winner instead.
    ///
    /// Always returns `true` (the bucket-migrated signal) — the caller must
    /// re-resolve via [`Ratelimiter::get_bucket`] before continuing to use
    /// its handle, whether or not it turned out to be the winning instance.
    pub async fn migrate_bucket(&self, pseudo_bucket: &str, server_hash: &str) -> Migrated {
        let mut buckets = self.buckets.lock().await;

        if !buckets.by_hash.contains_key(server_hash) {
            if let Some(bucket) = buckets.by_pseudo.remove(pseudo_bucket) {
                buckets.by_hash.insert(server_hash.into(), bucket);
            }
        } else {
            buckets.by_pseudo.remove(pseudo_bucket);
        }

        buckets
            .aliases
            .insert(pseudo_bucket.into(), server_hash.into());

        true
    }
}

#[cfg(test)]
mod tests {
    use super::Ratelimiter;
    use crate::headers::RatelimitHeaders;
    use static_assertions::assert_impl_all;
    use std::{fmt::Debug, sync::Arc};

    assert_impl_all!(Ratelimiter: Debug, Send, Sync);

    fn headers_with_hash(hash: &str) -> RatelimitHeaders {
        RatelimitHeaders {
            bucket: Some(hash.into()),
            limit: Some(5),
            remaining: Some(4),
            reset_at: None,
            reset_after: None,
            scope: None,
            retry_after: None,
            via_present: true,
        }
    }

    #[tokio::test]
    async fn migrating_a_bucket_moves_it_to_the_hash_map() {
        let ratelimiter = Ratelimiter::new();
        let bucket = ratelimiter.get_bucket("GET:/foo").await;
        bucket.update_from_response(&headers_with_hash("abc"), 200);

        let migrated = ratelimiter.migrate_bucket("GET:/foo", "abc").await;
        assert!(migrated);

        let resolved = ratelimiter.get_bucket("GET:/foo").await;
        assert!(Arc::ptr_eq(&bucket, &resolved));

        let by_hash = ratelimiter.get_bucket("anything-else-but-aliased-to-abc").await;
        // Not yet aliased, so this is a *new* bucket, confirming the
        // pseudo-bucket key was actually removed rather than left dangling.
        assert!(!Arc::ptr_eq(&bucket, &by_hash));
    }

    #[tokio::test]
    async fn two_pseudo_buckets_resolving_to_the_same_hash_share_one_instance() {
        let ratelimiter = Ratelimiter::new();
        let first = ratelimiter.get_bucket("GET:/a").await;
        let second = ratelimiter.get_bucket("GET:/b").await;

        ratelimiter.migrate_bucket("GET:/a", "shared").await;
        ratelimiter.migrate_bucket("GET:/b", "shared").await;

        let resolved_a = ratelimiter.get_bucket("GET:/a").await;
        let resolved_b = ratelimiter.get_bucket("GET:/b").await;
        assert!(Arc::ptr_eq(&resolved_a, &resolved_b));
        assert!(Arc::ptr_eq(&first, &resolved_a) || Arc::ptr_eq(&second, &resolved_a));
    }
}
