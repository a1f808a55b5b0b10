//! Room document and its lifecycle transitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::game::{Player, PlayerId};

use super::SessionError;

pub const MIN_PLAYERS_TO_START: usize = 2;
pub const DEFAULT_MAX_PLAYERS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub Uuid);

impl RoomId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<RoomId> for Uuid {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

/// Room lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomPhase {
    /// Lobby, accepting players
    Waiting,
    /// Start requested, settling before play
    Starting,
    Playing,
    /// Terminal
    Ended,
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoomPhase::Waiting => "waiting",
            RoomPhase::Starting => "starting",
            RoomPhase::Playing => "playing",
            RoomPhase::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Where in the world the room plays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameLocation {
    pub city: String,
    pub lat: f64,
    pub lng: f64,
    pub heading: f32,
    pub pitch: f32,
}

/// What happened when a member left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    NotMember,
    Left,
    /// The host left before play began
    RoomEnded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRoom {
    pub id: RoomId,
    pub name: String,
    pub join_code: String,
    pub host_id: PlayerId,
    pub players: HashMap<PlayerId, Player>,
    pub max_players: usize,
    pub location: GameLocation,
    pub phase: RoomPhase,
    pub created_at: DateTime<Utc>,
}

impl GameRoom {
    /// New Waiting room with the host as its only member
    pub fn new(
        name: impl Into<String>,
        join_code: impl Into<String>,
        host: Player,
        max_players: usize,
        location: GameLocation,
    ) -> Self {
        let host_id = host.id;
        let mut players = HashMap::new();
        players.insert(host_id, host);
        Self {
            id: RoomId::new(),
            name: name.into(),
            join_code: join_code.into(),
            host_id,
            players,
            max_players: max_players.max(1),
            location,
            phase: RoomPhase::Waiting,
            created_at: Utc::now(),
        }
    }

    pub fn member_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_member(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    pub fn is_host(&self, id: &PlayerId) -> bool {
        self.host_id == *id
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    pub fn is_active(&self) -> bool {
        self.phase != RoomPhase::Ended
    }

    /// Add a member. Re-adding an existing member is a no-op returning `false`.
    pub fn add_member(&mut self, player: Player) -> Result<bool, SessionError> {
        if self.phase == RoomPhase::Ended {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                action: "join",
            });
        }
        if self.players.contains_key(&player.id) {
            return Ok(false);
        }
        if self.is_full() {
            return Err(SessionError::Full {
                max: self.max_players,
            });
        }
        self.players.insert(player.id, player);
        Ok(true)
    }

    /// Replace a member's state. Unknown players are ignored.
    pub fn update_member(&mut self, player: Player) -> bool {
        match self.players.get_mut(&player.id) {
            Some(existing) => {
                *existing = player;
                true
            }
            None => false,
        }
    }

    pub fn remove_member(&mut self, id: &PlayerId) -> LeaveOutcome {
        if self.players.remove(id).is_none() {
            return LeaveOutcome::NotMember;
        }
        let pre_game = matches!(self.phase, RoomPhase::Waiting | RoomPhase::Starting);
        if self.is_host(id) && pre_game {
            self.phase = RoomPhase::Ended;
            return LeaveOutcome::RoomEnded;
        }
        LeaveOutcome::Left
    }

    /// Waiting -> Starting, host only, needs at least two members
    pub fn start(&mut self, caller: &PlayerId) -> Result<(), SessionError> {
        if !self.is_host(caller) {
            return Err(SessionError::NotHost);
        }
        if self.phase != RoomPhase::Waiting {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                action: "start",
            });
        }
        let have = self.member_count();
        if have < MIN_PLAYERS_TO_START {
            return Err(SessionError::NotEnoughPlayers {
                have,
                need: MIN_PLAYERS_TO_START,
            });
        }
        self.phase = RoomPhase::Starting;
        Ok(())
    }

    /// Starting -> Playing. Returns `false` if already playing.
    pub fn begin_play(&mut self) -> Result<bool, SessionError> {
        match self.phase {
            RoomPhase::Starting => {
                self.phase = RoomPhase::Playing;
                Ok(true)
            }
            RoomPhase::Playing => Ok(false),
            from => Err(SessionError::InvalidTransition {
                from,
                action: "begin play",
            }),
        }
    }

    /// Any phase -> Ended, host only. Returns `false` if already ended.
    pub fn end(&mut self, caller: &PlayerId) -> Result<bool, SessionError> {
        if !self.is_host(caller) {
            return Err(SessionError::NotHost);
        }
        if self.phase == RoomPhase::Ended {
            return Ok(false);
        }
        self.phase = RoomPhase::Ended;
        Ok(true)
    }
}
