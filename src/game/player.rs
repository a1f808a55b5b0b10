//! Player entity

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::catalog::Weapon;
use super::PlayerId;

/// Default maximum health
pub const MAX_HEALTH: f32 = 100.0;

/// Position plus orientation.
///
/// `rotation` uses the x = pitch, y = yaw, z = roll convention, in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Vec3,
}

/// Cosmetic appearance, carried opaquely for the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterLook {
    pub skin_color: String,
    pub hair_color: String,
    pub outfit: String,
    pub accessories: Vec<String>,
}

impl Default for CharacterLook {
    fn default() -> Self {
        Self {
            skin_color: "#f1c27d".to_string(),
            hair_color: "#4a3728".to_string(),
            outfit: "casual".to_string(),
            accessories: Vec::new(),
        }
    }
}

/// Temporary modifiers granted by power-ups
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Modifiers {
    /// Movement speed multiplier
    pub speed: f32,
    /// Outgoing damage multiplier
    pub damage: f32,
    /// Shield points absorbed before health
    pub shield: f32,
    pub invisible: bool,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            speed: 1.0,
            damage: 1.0,
            shield: 0.0,
            invisible: false,
        }
    }
}

/// Result of applying damage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageOutcome {
    /// Health actually removed (after shield)
    pub health_lost: f32,
    pub shield_lost: f32,
    /// True only on the hit that crossed zero
    pub killed: bool,
}

/// A room member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub health: f32,
    pub max_health: f32,
    pub weapon: Weapon,
    #[serde(default)]
    pub look: CharacterLook,
    pub alive: bool,
    pub kills: u32,
    pub deaths: u32,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, weapon: Weapon, spawn: Vec3) -> Self {
        Self {
            id,
            name: name.into(),
            position: spawn,
            rotation: Vec3::ZERO,
            health: MAX_HEALTH,
            max_health: MAX_HEALTH,
            weapon,
            look: CharacterLook::default(),
            alive: true,
            kills: 0,
            deaths: 0,
            modifiers: Modifiers::default(),
        }
    }

    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position,
            rotation: self.rotation,
        }
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.position = pose.position;
        self.rotation = pose.rotation;
    }

    /// Apply incoming damage. Shield absorbs first and health floors at 0.
    /// Dead players take no damage, so a kill is reported exactly once.
    pub fn apply_damage(&mut self, amount: f32) -> DamageOutcome {
        let mut outcome = DamageOutcome {
            health_lost: 0.0,
            shield_lost: 0.0,
            killed: false,
        };
        if !self.alive || !amount.is_finite() || amount <= 0.0 {
            return outcome;
        }

        let absorbed = amount.min(self.modifiers.shield.max(0.0));
        self.modifiers.shield -= absorbed;
        outcome.shield_lost = absorbed;

        let remaining = amount - absorbed;
        let before = self.health;
        self.health = (self.health - remaining).max(0.0);
        outcome.health_lost = before - self.health;

        if self.health <= 0.0 {
            self.alive = false;
            self.deaths += 1;
            outcome.killed = true;
        }
        outcome
    }

    /// Restore health without exceeding the maximum
    pub fn heal(&mut self, amount: f32) {
        if self.alive && amount.is_finite() && amount > 0.0 {
            self.health = (self.health + amount).min(self.max_health);
        }
    }

    /// Bring the player back at `spawn` with full health
    pub fn respawn(&mut self, spawn: Vec3) {
        self.health = self.max_health;
        self.alive = true;
        self.position = spawn;
    }

    /// Clamp values a caller bug may have pushed out of range
    pub fn sanitize(&mut self) {
        if !self.health.is_finite() || self.health < 0.0 || self.health > self.max_health {
            warn!(player_id = %self.id, health = self.health, "Health out of range, clamping");
            self.health = if self.health.is_finite() {
                self.health.clamp(0.0, self.max_health)
            } else {
                0.0
            };
        }
        if self.weapon.ammo > self.weapon.spec.max_ammo {
            warn!(player_id = %self.id, ammo = self.weapon.ammo, "Ammo above magazine size, clamping");
            self.weapon.ammo = self.weapon.spec.max_ammo;
        }
        if !self.position.is_finite() {
            warn!(player_id = %self.id, "Non-finite position, resetting to origin");
            self.position = Vec3::ZERO;
        }
        if !self.rotation.is_finite() {
            self.rotation = Vec3::ZERO;
        }
    }
}
