//! Sync feed wire types
//!
//! Payloads carry absolute values (resulting health, counters, positions) so
//! applying a duplicate delivery leaves state unchanged.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::{PlayerId, PowerUp, PowerUpKind, SimEvent};
use crate::lobby::{RoomId, RoomPhase};
use crate::util::time::unix_millis;

/// One entry in a room's event feed. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub id: Uuid,
    pub room_id: RoomId,
    /// Participant that published the event
    pub origin: PlayerId,
    /// Unix millis at publish
    pub timestamp: u64,
    pub payload: EventPayload,
}

impl GameEvent {
    pub fn new(room_id: RoomId, origin: PlayerId, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id,
            origin,
            timestamp: unix_millis(),
            payload,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    PlayerMove {
        position: Vec3,
        rotation: Vec3,
    },
    PlayerShoot {
        weapon_id: String,
        origin: Vec3,
        direction: Vec3,
    },
    /// Resulting health and shield of the target. `life` is the target's
    /// death count when the hit landed; hits on an earlier life are stale.
    PlayerHit {
        target: PlayerId,
        damage: f32,
        health: f32,
        shield: f32,
        life: u32,
    },
    PlayerDied {
        victim: PlayerId,
        killer: Option<PlayerId>,
        deaths: u32,
        killer_kills: Option<u32>,
    },
    PlayerRespawn {
        position: Vec3,
        health: f32,
    },
    PlayerReload {
        completes_at_ms: u64,
    },
    PowerUpSpawned {
        power_up: PowerUp,
    },
    PowerUpCollected {
        power_up_id: Uuid,
        kind: PowerUpKind,
    },
    RoomState {
        phase: RoomPhase,
    },
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::PlayerMove { .. } => "player_move",
            EventPayload::PlayerShoot { .. } => "player_shoot",
            EventPayload::PlayerHit { .. } => "player_hit",
            EventPayload::PlayerDied { .. } => "player_died",
            EventPayload::PlayerRespawn { .. } => "player_respawn",
            EventPayload::PlayerReload { .. } => "player_reload",
            EventPayload::PowerUpSpawned { .. } => "power_up_spawned",
            EventPayload::PowerUpCollected { .. } => "power_up_collected",
            EventPayload::RoomState { .. } => "room_state",
        }
    }

    /// Movement is the only throttled kind
    pub fn is_throttled(&self) -> bool {
        matches!(self, EventPayload::PlayerMove { .. })
    }

    /// Wire payload for a local simulation event published by `local`.
    /// Local-only bookkeeping (reload completion, effect expiry, settle) and
    /// events about other players' timers map to `None`.
    pub fn from_sim(event: &SimEvent, local: PlayerId) -> Option<Self> {
        let payload = match event {
            SimEvent::Moved { player, pose } if *player == local => EventPayload::PlayerMove {
                position: pose.position,
                rotation: pose.rotation,
            },
            SimEvent::Shot(shot) if shot.shooter == local => EventPayload::PlayerShoot {
                weapon_id: shot.weapon_id.clone(),
                origin: shot.ray.origin,
                direction: shot.ray.direction,
            },
            SimEvent::Hit(hit) if hit.shooter == local => EventPayload::PlayerHit {
                target: hit.target,
                damage: hit.damage,
                health: hit.health_after,
                shield: hit.shield_after,
                life: hit.life,
            },
            SimEvent::Died {
                victim,
                killer,
                victim_deaths,
                killer_kills,
            } if *killer == Some(local) || *victim == local => EventPayload::PlayerDied {
                victim: *victim,
                killer: *killer,
                deaths: *victim_deaths,
                killer_kills: *killer_kills,
            },
            SimEvent::Respawned {
                player,
                position,
                health,
            } if *player == local => EventPayload::PlayerRespawn {
                position: *position,
                health: *health,
            },
            SimEvent::ReloadStarted {
                player,
                completes_at_ms,
            } if *player == local => EventPayload::PlayerReload {
                completes_at_ms: *completes_at_ms,
            },
            SimEvent::PowerUpSpawned(power_up) => EventPayload::PowerUpSpawned {
                power_up: power_up.clone(),
            },
            SimEvent::PowerUpCollected {
                player, power_up, ..
            } if *player == local => EventPayload::PowerUpCollected {
                power_up_id: power_up.id,
                kind: power_up.kind(),
            },
            _ => return None,
        };
        Some(payload)
    }
}
