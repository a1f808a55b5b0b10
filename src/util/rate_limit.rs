//! Rate limiting for inbound sync traffic

use governor::{
    clock::DefaultClock,
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::game::PlayerId;

/// Keyed limiter type alias
pub type KeyedLimiter = RateLimiter<PlayerId, DefaultKeyedStateStore<PlayerId>, DefaultClock>;

/// Create a keyed rate limiter with the specified events per second per key
pub fn create_keyed_limiter(per_second: u32) -> Arc<KeyedLimiter> {
    let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::keyed(quota))
}

/// Max movement updates accepted per remote player per second.
/// Honest peers publish at most 10/s; this leaves headroom for bursts after reconnects.
pub const INBOUND_MOVE_RATE_LIMIT: u32 = 30;

/// Per-remote-player guard against movement floods
#[derive(Clone)]
pub struct InboundRateLimiter {
    moves: Arc<KeyedLimiter>,
}

impl InboundRateLimiter {
    pub fn new() -> Self {
        Self::with_rate(INBOUND_MOVE_RATE_LIMIT)
    }

    pub fn with_rate(per_second: u32) -> Self {
        Self {
            moves: create_keyed_limiter(per_second),
        }
    }

    /// Check if a movement update from `player` is allowed (returns true if allowed)
    pub fn check_move(&self, player: PlayerId) -> bool {
        self.moves.check_key(&player).is_ok()
    }

    /// Drop limiter state for players that left
    pub fn forget_stale(&self) {
        self.moves.retain_recent();
    }
}

impl Default for InboundRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
