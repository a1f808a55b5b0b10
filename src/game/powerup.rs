//! Power-up spawning, pickup and timed effects
//!
//! Timed effects follow a replace policy: collecting a second power-up of the
//! same kind overwrites the modifier and re-arms the expiry for the same
//! (player, kind) key, so the later activation decides when it wears off.

use glam::Vec3;
use rand::Rng;
use tracing::debug;

use super::catalog::{Catalog, Effect, PowerUp, PowerUpKind};
use super::player::{Modifiers, Player};
use super::scheduler::{Scheduler, TimerKey, TimerKind};

/// Power-up tuning
#[derive(Debug, Clone, Copy)]
pub struct PowerUpConfig {
    /// Distance within which a player collects a power-up
    pub pickup_radius: f32,
}

impl Default for PowerUpConfig {
    fn default() -> Self {
        Self { pickup_radius: 2.0 }
    }
}

/// An effect applied to a player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedEffect {
    pub kind: PowerUpKind,
    /// When a timed effect reverts; `None` for instant effects
    pub expires_at_ms: Option<u64>,
}

pub struct PowerUpSystem;

impl PowerUpSystem {
    /// Spawn an active power-up of `kind`, or a uniformly random kind
    pub fn spawn<R: Rng + ?Sized>(
        catalog: &Catalog,
        kind: Option<PowerUpKind>,
        position: Vec3,
        rng: &mut R,
    ) -> Option<PowerUp> {
        let spec = match kind {
            Some(kind) => catalog.power_up_by_kind(kind),
            None => catalog.random_power_up(rng),
        }?;
        Some(catalog.create_power_up(spec, position))
    }

    /// Remove and return every active power-up within reach of `position`.
    /// Returned instances are deactivated.
    pub fn check_collection(
        position: Vec3,
        active: &mut Vec<PowerUp>,
        config: &PowerUpConfig,
    ) -> Vec<PowerUp> {
        let mut collected = Vec::new();
        let radius_sq = config.pickup_radius * config.pickup_radius;
        active.retain(|power_up| {
            let reached = power_up.active && power_up.position.distance_squared(position) <= radius_sq;
            if reached {
                let mut taken = power_up.clone();
                taken.active = false;
                collected.push(taken);
            }
            !reached && power_up.active
        });
        collected
    }

    /// Apply an effect to `player`, arming the expiry for timed kinds
    pub fn apply_effect(
        player: &mut Player,
        effect: &Effect,
        now_ms: u64,
        scheduler: &mut Scheduler,
    ) -> AppliedEffect {
        match effect.kind {
            PowerUpKind::Health => player.heal(effect.magnitude),
            PowerUpKind::Ammo => {
                player.weapon.refill();
                scheduler.cancel(&TimerKey::new(player.id, TimerKind::Reload));
                scheduler.cancel(&TimerKey::new(player.id, TimerKind::AutoReload));
            }
            PowerUpKind::Speed => player.modifiers.speed = effect.magnitude,
            PowerUpKind::Damage => player.modifiers.damage = effect.magnitude,
            PowerUpKind::Shield => player.modifiers.shield = effect.magnitude,
            PowerUpKind::Invisibility => player.modifiers.invisible = true,
        }

        let expires_at_ms = (effect.is_timed()).then(|| {
            let due = now_ms + effect.duration_ms;
            let replaced = scheduler.schedule(
                TimerKey::new(player.id, TimerKind::EffectExpiry(effect.kind)),
                due,
            );
            debug!(player_id = %player.id, kind = ?effect.kind, due, replaced, "Timed effect armed");
            due
        });

        AppliedEffect {
            kind: effect.kind,
            expires_at_ms,
        }
    }

    /// Put one modifier back to baseline
    pub fn revert_effect(player: &mut Player, kind: PowerUpKind) {
        let baseline = Modifiers::default();
        match kind {
            PowerUpKind::Speed => player.modifiers.speed = baseline.speed,
            PowerUpKind::Damage => player.modifiers.damage = baseline.damage,
            PowerUpKind::Shield => player.modifiers.shield = baseline.shield,
            PowerUpKind::Invisibility => player.modifiers.invisible = baseline.invisible,
            PowerUpKind::Health | PowerUpKind::Ammo => {}
        }
    }
}
