//! Per-address cooldown gate for chat messages

use lru::LruCache;
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Admits at most one message per identity per cooldown window
pub struct MessageRateLimiter {
    last_accepted: Mutex<LruCache<IpAddr, Instant>>,
    cooldown: Duration,
}

impl MessageRateLimiter {
    /// `max_tracked` bounds memory; a zero value is treated as one
    pub fn new(cooldown: Duration, max_tracked: usize) -> Self {
        let capacity = NonZeroUsize::new(max_tracked).unwrap_or(NonZeroUsize::MIN);
        Self {
            last_accepted: Mutex::new(LruCache::new(capacity)),
            cooldown,
        }
    }

    /// Check-and-set under one lock. A rejected call leaves the window untouched.
    /// A live window is never evicted: when the table is full of them, new
    /// identities are refused until one expires.
    pub async fn allow(&self, identity: IpAddr) -> bool {
        let now = Instant::now();
        let mut last_accepted = self.last_accepted.lock().await;

        if let Some(previous) = last_accepted.peek(&identity) {
            if now.duration_since(*previous) < self.cooldown {
                return false;
            }
        }

        if last_accepted.len() == last_accepted.cap().get() && !last_accepted.contains(&identity) {
            let purged = Self::purge_locked(&mut last_accepted, now, self.cooldown);
            if purged == 0 {
                log::warn!(
                    "Rate limiter full ({} live windows), refusing {}",
                    last_accepted.len(),
                    identity
                );
                return false;
            }
        }

        last_accepted.put(identity, now);
        true
    }

    fn purge_locked(cache: &mut LruCache<IpAddr, Instant>, now: Instant, cooldown: Duration) -> usize {
        let expired: Vec<IpAddr> = cache
            .iter()
            .filter(|(_, accepted)| now.duration_since(**accepted) >= cooldown)
            .map(|(identity, _)| *identity)
            .collect();
        for identity in &expired {
            cache.pop(identity);
        }
        expired.len()
    }

    /// Drop identities whose window has already closed
    pub async fn purge_expired(&self) -> usize {
        let mut last_accepted = self.last_accepted.lock().await;
        Self::purge_locked(&mut last_accepted, Instant::now(), self.cooldown)
    }

    /// Get number of tracked identities
    pub async fn tracked_identities(&self) -> usize {
        self.last_accepted.lock().await.len()
    }

    /// Start cleanup task for expired windows
    pub fn start_cleanup_task(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let purged = self.purge_expired().await;
                if purged > 0 {
                    log::debug!("Purged {} expired rate limit entries", purged);
                }
            }
        })
    }
}
