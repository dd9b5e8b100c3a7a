//! Aggregate request limiting toward the search provider.
//!
//! One token bucket is shared by every query worker of every track, so the
//! configured rate holds for the whole playlist run. Cache hits never touch it.

use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::config::ResolverConfig;
use crate::error::{Cancelled, ConfigError};

/// Longest single wait between bucket checks
const MAX_WAIT_SLICE: Duration = Duration::from_millis(250);

pub struct RequestLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    clock: DefaultClock,
}

impl RequestLimiter {
    pub fn new(requests_per_second: u32, burst: u32) -> Result<Self, ConfigError> {
        let rate = NonZeroU32::new(requests_per_second).ok_or(ConfigError::Zero {
            field: "requests_per_second",
        })?;
        let burst = NonZeroU32::new(burst).ok_or(ConfigError::Zero { field: "rate_burst" })?;
        Ok(Self {
            limiter: RateLimiter::direct(Quota::per_second(rate).allow_burst(burst)),
            clock: DefaultClock::default(),
        })
    }

    pub fn from_config(config: &ResolverConfig) -> Result<Self, ConfigError> {
        Self::new(config.requests_per_second, config.rate_burst)
    }

    /// Take one request token without waiting.
    #[cfg(test)]
    fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Block until a request token is available or `cancel` fires.
    pub fn acquire(&self, cancel: &CancelToken) -> Result<(), Cancelled> {
        loop {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }
            match self.limiter.check() {
                Ok(()) => return Ok(()),
                Err(not_until) => {
                    let wait = not_until.wait_time_from(self.clock.now()).min(MAX_WAIT_SLICE);
                    if !cancel.sleep(wait) {
                        return Err(Cancelled);
                    }
                }
            }
        }
    }
}
