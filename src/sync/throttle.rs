//! Outbound publish throttling

use std::collections::HashMap;

use crate::game::PlayerId;

/// Allows at most one publish per interval per player, whatever the tick rate
#[derive(Debug, Clone)]
pub struct PublishThrottle {
    interval_ms: u64,
    last_sent: HashMap<PlayerId, u64>,
}

impl PublishThrottle {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_sent: HashMap::new(),
        }
    }

    /// Check if `player` may publish at `now_ms`, recording the publish if so
    pub fn should_send(&mut self, player: PlayerId, now_ms: u64) -> bool {
        match self.last_sent.get(&player) {
            Some(&last) if now_ms.saturating_sub(last) < self.interval_ms => false,
            _ => {
                self.last_sent.insert(player, now_ms);
                true
            }
        }
    }

    /// Let the next update through regardless of the interval
    pub fn force_next(&mut self, player: PlayerId) {
        self.last_sent.remove(&player);
    }

    pub fn clear(&mut self) {
        self.last_sent.clear();
    }
}
