//! Deterministic timers for deferred game effects
//!
//! Every timer is keyed by the entity it affects and the effect kind. Arming a
//! key that is already pending replaces the earlier deadline, so a key can
//! never fire twice for one arming.

use std::collections::HashMap;
use uuid::Uuid;

use super::catalog::PowerUpKind;

/// What a timer does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Refill after the magazine ran dry
    AutoReload,
    /// Manual reload completes
    Reload,
    Respawn,
    /// Revert a timed power-up effect
    EffectExpiry(PowerUpKind),
    /// Room leaves the Starting phase
    RoomSettle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub entity: Uuid,
    pub kind: TimerKind,
}

impl TimerKey {
    pub fn new(entity: impl Into<Uuid>, kind: TimerKind) -> Self {
        Self {
            entity: entity.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    due_ms: u64,
    seq: u64,
}

/// Timer queue polled by the simulation tick
#[derive(Debug, Default)]
pub struct Scheduler {
    pending: HashMap<TimerKey, Pending>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `key` to fire at `due_ms`, replacing any pending deadline for it.
    /// Returns true when an earlier arming was replaced.
    pub fn schedule(&mut self, key: TimerKey, due_ms: u64) -> bool {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(key, Pending { due_ms, seq }).is_some()
    }

    pub fn cancel(&mut self, key: &TimerKey) -> bool {
        self.pending.remove(key).is_some()
    }

    /// Cancel every timer for one entity
    pub fn cancel_entity(&mut self, entity: Uuid) -> usize {
        let before = self.pending.len();
        self.pending.retain(|key, _| key.entity != entity);
        before - self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, key: &TimerKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn due_at(&self, key: &TimerKey) -> Option<u64> {
        self.pending.get(key).map(|p| p.due_ms)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return the earliest timer due at or before `now_ms`.
    /// Ties fire in arming order.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<(TimerKey, u64)> {
        let (key, pending) = self
            .pending
            .iter()
            .filter(|(_, p)| p.due_ms <= now_ms)
            .min_by_key(|(_, p)| (p.due_ms, p.seq))
            .map(|(k, p)| (*k, *p))?;
        self.pending.remove(&key);
        Some((key, pending.due_ms))
    }
}
