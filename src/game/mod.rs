//! Game simulation modules

pub mod catalog;
pub mod combat;
pub mod input;
pub mod movement;
pub mod player;
pub mod powerup;
pub mod scheduler;
pub mod simulation;

pub use catalog::{Catalog, PowerUp, PowerUpKind, Weapon};
pub use input::{InputSource, InputState};
pub use player::{Player, Pose};
pub use simulation::{GameTuning, SimEvent, Simulation};

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable player identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<PlayerId> for Uuid {
    fn from(id: PlayerId) -> Self {
        id.0
    }
}
