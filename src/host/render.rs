//! Renderer seam. The core pushes scene changes one way; failures are logged
//! and never stop the simulation.

use glam::Vec3;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::game::{Player, PlayerId, PowerUpKind};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Scene not ready")]
    NotReady,

    #[error("Unknown scene object {0}")]
    UnknownObject(Uuid),

    #[error("Renderer failure: {0}")]
    Backend(String),
}

pub trait Renderer {
    fn add_player(&mut self, player: &Player) -> Result<(), RenderError>;
    fn update_player(&mut self, player: &Player) -> Result<(), RenderError>;
    fn remove_player(&mut self, id: PlayerId) -> Result<(), RenderError>;
    fn add_power_up(&mut self, id: Uuid, kind: PowerUpKind, position: Vec3) -> Result<(), RenderError>;
    fn collect_power_up(&mut self, id: Uuid) -> Result<(), RenderError>;
    fn fire_weapon_visual(&mut self, weapon_id: &str) -> Result<(), RenderError>;
}

/// Log a failed render call and carry on
pub fn report(result: Result<(), RenderError>, call: &'static str) {
    if let Err(e) = result {
        warn!(call, error = %e, "Render call failed");
    }
}

/// Draws nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn add_player(&mut self, _player: &Player) -> Result<(), RenderError> {
        Ok(())
    }

    fn update_player(&mut self, _player: &Player) -> Result<(), RenderError> {
        Ok(())
    }

    fn remove_player(&mut self, _id: PlayerId) -> Result<(), RenderError> {
        Ok(())
    }

    fn add_power_up(&mut self, _id: Uuid, _kind: PowerUpKind, _position: Vec3) -> Result<(), RenderError> {
        Ok(())
    }

    fn collect_power_up(&mut self, _id: Uuid) -> Result<(), RenderError> {
        Ok(())
    }

    fn fire_weapon_visual(&mut self, _weapon_id: &str) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Headless renderer that traces scene changes
#[derive(Debug, Default)]
pub struct LogRenderer {
    frames: u64,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scene mutations seen so far
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Renderer for LogRenderer {
    fn add_player(&mut self, player: &Player) -> Result<(), RenderError> {
        self.frames += 1;
        debug!(player_id = %player.id, name = %player.name, "Scene: add player");
        Ok(())
    }

    fn update_player(&mut self, player: &Player) -> Result<(), RenderError> {
        self.frames += 1;
        debug!(
            player_id = %player.id,
            x = player.position.x,
            y = player.position.y,
            z = player.position.z,
            health = player.health,
            alive = player.alive,
            "Scene: update player"
        );
        Ok(())
    }

    fn remove_player(&mut self, id: PlayerId) -> Result<(), RenderError> {
        self.frames += 1;
        debug!(player_id = %id, "Scene: remove player");
        Ok(())
    }

    fn add_power_up(&mut self, id: Uuid, kind: PowerUpKind, position: Vec3) -> Result<(), RenderError> {
        self.frames += 1;
        debug!(power_up_id = %id, kind = ?kind, ?position, "Scene: add power-up");
        Ok(())
    }

    fn collect_power_up(&mut self, id: Uuid) -> Result<(), RenderError> {
        self.frames += 1;
        debug!(power_up_id = %id, "Scene: collect power-up");
        Ok(())
    }

    fn fire_weapon_visual(&mut self, weapon_id: &str) -> Result<(), RenderError> {
        self.frames += 1;
        debug!(weapon_id, "Scene: muzzle flash");
        Ok(())
    }
}
