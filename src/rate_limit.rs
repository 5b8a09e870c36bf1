// src/rate_limit.rs
// C12: per-source-IP sliding-window admission control in front of
// `POST /api/scan`. Generalizes this codebase's unkeyed `governor`-based
// RateLimiter into a keyed limiter, one bucket per client IP.

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter as GovRateLimiter};

pub struct IpRateLimiter {
    limiter: Arc<GovRateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>>,
    clock: DefaultClock,
}

/// Outcome of an admission check, carrying enough to populate the
/// `Retry-After` header on a 429.
pub struct Admission {
    pub allowed: bool,
    pub retry_after_secs: u64,
}

impl IpRateLimiter {
    pub fn new(requests_per_hour: u32) -> Self {
        let per_hour = NonZeroU32::new(requests_per_hour.max(1)).unwrap();
        let quota = Quota::per_hour(per_hour);
        Self {
            limiter: Arc::new(GovRateLimiter::keyed(quota)),
            clock: DefaultClock::default(),
        }
    }

    pub fn check(&self, ip: IpAddr) -> Admission {
        match self.limiter.check_key(&ip) {
            Ok(_) => Admission {
                allowed: true,
                retry_after_secs: 0,
            },
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                Admission {
                    allowed: false,
                    retry_after_secs: wait.as_secs().max(1),
                }
            }
        }
    }
}

impl Clone for IpRateLimiter {
    fn clone(&self) -> Self {
        Self {
            limiter: self.limiter.clone(),
            clock: self.clock.clone(),
        }
    }
}
