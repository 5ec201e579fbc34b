//! Per-domain request spacing
//!
//! Each domain gets its own direct rate limiter with a burst of one, so the
//! first request to a domain passes immediately and every following request
//! waits until the domain's delay has elapsed since the previous one. The
//! limiter's check-and-record step is a single atomic operation, which keeps
//! concurrent callers for the same domain from both passing the gate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio::sync::Mutex;
use tracing::{Instrument, debug, debug_span};
use url::Url;

use super::session::domain_key;

/// Minimum-spacing gate keyed by domain
#[derive(Default)]
pub struct Throttle {
    limiters: Mutex<HashMap<String, Option<Arc<DefaultDirectRateLimiter>>>>,
}

impl Throttle {
    /// Create an empty throttle; unseen domains never wait
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until a request to the domain of `url` may be issued.
    ///
    /// `delay` is the domain's minimum spacing. It is read once, the first
    /// time the domain is seen; a zero delay disables spacing for the domain.
    pub async fn wait(&self, url: &Url, delay: Duration) {
        let domain = domain_key(url);
        let limiter = {
            let mut limiters = self.limiters.lock().await;
            limiters
                .entry(domain.clone())
                .or_insert_with(|| {
                    Quota::with_period(delay).map(|quota| Arc::new(RateLimiter::direct(quota)))
                })
                .clone()
        };

        let Some(limiter) = limiter else {
            return;
        };

        if limiter.check().is_ok() {
            return;
        }

        debug!(domain = %domain, delay_ms = delay.as_millis() as u64, "Throttling request");
        limiter
            .until_ready()
            .instrument(debug_span!("throttle", domain = %domain))
            .await;
    }

    /// Number of domains the throttle has seen
    pub async fn domain_count(&self) -> usize {
        self.limiters.lock().await.len()
    }
}
