//! Combat system - fire gating, hitscan resolution, damage, death and respawn

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::movement::view_direction;
use super::player::Player;
use super::scheduler::{Scheduler, TimerKey, TimerKind};
use super::PlayerId;

/// Combat tuning
#[derive(Debug, Clone, Copy)]
pub struct CombatConfig {
    /// Max distance between a target and the shot ray that still counts as a hit
    pub hit_radius: f32,
    /// Delay between death and respawn (ms)
    pub respawn_delay_ms: u64,
    /// Delay between emptying the magazine and the automatic refill (ms)
    pub auto_reload_delay_ms: u64,
    /// Where dead players come back
    pub spawn_point: Vec3,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            hit_radius: 5.0,
            respawn_delay_ms: 5_000,
            auto_reload_delay_ms: 100,
            spawn_point: Vec3::new(0.0, 1.8, 0.0),
        }
    }
}

/// A shot ray from the shooter's eye
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length
    pub direction: Vec3,
}

impl Ray {
    /// Distance along the ray to the point closest to `point`, and the
    /// perpendicular distance from `point` to the ray at that spot
    pub fn project(&self, point: Vec3) -> (f32, f32) {
        let along = (point - self.origin).dot(self.direction);
        let closest = self.origin + self.direction * along;
        (along, point.distance(closest))
    }
}

/// A successful trigger pull
#[derive(Debug, Clone, PartialEq)]
pub struct Shot {
    pub shooter: PlayerId,
    pub weapon_id: String,
    pub ray: Ray,
    /// Base weapon damage times the shooter's damage modifier
    pub damage: f32,
    pub range: f32,
    pub ammo_left: u32,
}

/// Why a reload request did or didn't start a reload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Started { completes_at_ms: u64 },
    AlreadyFull,
    AlreadyReloading,
}

/// Damage applied to one target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    pub shooter: PlayerId,
    pub target: PlayerId,
    pub damage: f32,
    pub health_after: f32,
    pub shield_after: f32,
    pub killed: bool,
    /// Target's death count before this hit, identifying the life it landed on
    pub life: u32,
}

/// Combat system for managing weapons and damage
pub struct CombatSystem;

impl CombatSystem {
    /// Check if a weapon can fire at `now_ms`
    pub fn can_fire(player: &Player, now_ms: u64) -> bool {
        let weapon = &player.weapon;
        let cooled = weapon
            .last_fire_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= weapon.spec.fire_interval_ms);
        player.alive && cooled && weapon.ammo > 0
    }

    /// Pull the trigger. Denied pulls change nothing and return `None`.
    pub fn fire(
        shooter: &mut Player,
        now_ms: u64,
        scheduler: &mut Scheduler,
        config: &CombatConfig,
    ) -> Option<Shot> {
        if !Self::can_fire(shooter, now_ms) {
            return None;
        }

        shooter.weapon.last_fire_ms = Some(now_ms);
        shooter.weapon.ammo -= 1;

        if shooter.weapon.ammo == 0 {
            scheduler.schedule(
                TimerKey::new(shooter.id, TimerKind::AutoReload),
                now_ms + config.auto_reload_delay_ms,
            );
        }

        let direction = view_direction(shooter.rotation);
        Some(Shot {
            shooter: shooter.id,
            weapon_id: shooter.weapon.spec.id.clone(),
            ray: Ray {
                origin: shooter.position,
                direction: if direction == Vec3::ZERO {
                    Vec3::NEG_Z
                } else {
                    direction
                },
            },
            damage: shooter.weapon.spec.damage * shooter.modifiers.damage.max(0.0),
            range: shooter.weapon.spec.range,
            ammo_left: shooter.weapon.ammo,
        })
    }

    /// Start a manual reload. A second request while one is pending is a no-op.
    pub fn reload(player: &Player, now_ms: u64, scheduler: &mut Scheduler) -> ReloadOutcome {
        if player.weapon.is_full() {
            return ReloadOutcome::AlreadyFull;
        }
        let manual = TimerKey::new(player.id, TimerKind::Reload);
        let auto = TimerKey::new(player.id, TimerKind::AutoReload);
        if scheduler.is_pending(&manual) || scheduler.is_pending(&auto) {
            return ReloadOutcome::AlreadyReloading;
        }

        let completes_at_ms = now_ms + player.weapon.spec.reload_ms;
        scheduler.schedule(manual, completes_at_ms);
        ReloadOutcome::Started { completes_at_ms }
    }

    /// Refill the magazine (reload timer fired)
    pub fn complete_reload(player: &mut Player) {
        player.weapon.refill();
        debug!(player_id = %player.id, ammo = player.weapon.ammo, "Reload complete");
    }

    /// Find the nearest living player, other than the shooter, within the hit
    /// radius of the ray and inside the weapon's range.
    pub fn resolve_hit<'a>(
        shot: &Shot,
        candidates: impl IntoIterator<Item = &'a Player>,
        config: &CombatConfig,
    ) -> Option<PlayerId> {
        candidates
            .into_iter()
            .filter(|p| p.alive && p.id != shot.shooter)
            .filter_map(|p| {
                let (along, off_axis) = shot.ray.project(p.position);
                let inside = along >= 0.0 && along <= shot.range && off_axis <= config.hit_radius;
                inside.then_some((p.id, along))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Apply shot damage to `target`, scheduling a respawn if it died
    pub fn apply_hit(
        shooter: PlayerId,
        target: &mut Player,
        damage: f32,
        now_ms: u64,
        scheduler: &mut Scheduler,
        config: &CombatConfig,
    ) -> HitResult {
        let life = target.deaths;
        let outcome = target.apply_damage(damage);
        if outcome.killed {
            scheduler.schedule(
                TimerKey::new(target.id, TimerKind::Respawn),
                now_ms + config.respawn_delay_ms,
            );
        }
        HitResult {
            shooter,
            target: target.id,
            damage: outcome.health_lost + outcome.shield_lost,
            health_after: target.health,
            shield_after: target.modifiers.shield,
            killed: outcome.killed,
            life,
        }
    }

    /// Respawn timer fired
    pub fn respawn(player: &mut Player, config: &CombatConfig) {
        player.respawn(config.spawn_point);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog::{Catalog, WeaponSpec};
    use crate::game::catalog::{Weapon, WeaponKind};

    fn armed(weapon: &str, at: Vec3) -> Player {
        let weapon = Catalog::standard().create_weapon(weapon).unwrap();
        Player::new(PlayerId::new(), "p", weapon, at)
    }

    fn one_round_pistol() -> Player {
        let spec = WeaponSpec {
            id: "test".into(),
            name: "Test".into(),
            kind: WeaponKind::Pistol,
            damage: 25.0,
            range: 50.0,
            fire_interval_ms: 300,
            max_ammo: 5,
            reload_ms: 2_000,
        };
        let mut weapon = Weapon::from_spec(&spec);
        weapon.ammo = 1;
        Player::new(PlayerId::new(), "p", weapon, Vec3::new(0.0, 1.8, 0.0))
    }

    #[test]
    fn second_fire_inside_interval_is_denied() {
        let config = CombatConfig::default();
        let mut scheduler = Scheduler::new();
        let mut p = armed("pistol", Vec3::new(0.0, 1.8, 0.0));

        assert!(CombatSystem::fire(&mut p, 1_000, &mut scheduler, &config).is_some());
        assert_eq!(p.weapon.ammo, 11);
        assert!(CombatSystem::fire(&mut p, 1_299, &mut scheduler, &config).is_none());
        assert_eq!(p.weapon.ammo, 11);
        assert!(CombatSystem::fire(&mut p, 1_300, &mut scheduler, &config).is_some());
        assert_eq!(p.weapon.ammo, 10);
    }

    #[test]
    fn emptying_the_magazine_arms_auto_reload() {
        let config = CombatConfig::default();
        let mut scheduler = Scheduler::new();
        let mut p = one_round_pistol();

        let shot = CombatSystem::fire(&mut p, 0, &mut scheduler, &config).unwrap();
        assert_eq!(shot.ammo_left, 0);
        assert_eq!(
            scheduler.due_at(&TimerKey::new(p.id, TimerKind::AutoReload)),
            Some(100)
        );
        assert!(CombatSystem::fire(&mut p, 50, &mut scheduler, &config).is_none());
        // Empty and cooled down is still denied
        assert!(CombatSystem::fire(&mut p, 400, &mut scheduler, &config).is_none());
    }

    #[test]
    fn dead_players_cannot_fire() {
        let config = CombatConfig::default();
        let mut scheduler = Scheduler::new();
        let mut p = armed("rifle", Vec3::ZERO);
        p.apply_damage(1_000.0);
        assert!(CombatSystem::fire(&mut p, 0, &mut scheduler, &config).is_none());
        assert_eq!(p.weapon.ammo, 30);
    }

    #[test]
    fn reload_is_idempotent_and_skips_full_magazines() {
        let mut scheduler = Scheduler::new();
        let mut p = armed("pistol", Vec3::ZERO);
        assert_eq!(
            CombatSystem::reload(&p, 0, &mut scheduler),
            ReloadOutcome::AlreadyFull
        );

        p.weapon.ammo = 4;
        assert_eq!(
            CombatSystem::reload(&p, 10, &mut scheduler),
            ReloadOutcome::Started {
                completes_at_ms: 2_010
            }
        );
        assert_eq!(
            CombatSystem::reload(&p, 500, &mut scheduler),
            ReloadOutcome::AlreadyReloading
        );
        assert_eq!(
            scheduler.due_at(&TimerKey::new(p.id, TimerKind::Reload)),
            Some(2_010)
        );
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn shot_uses_damage_modifier_and_view_direction() {
        let config = CombatConfig::default();
        let mut scheduler = Scheduler::new();
        let mut p = armed("pistol", Vec3::new(0.0, 1.8, 0.0));
        p.modifiers.damage = 2.0;

        let shot = CombatSystem::fire(&mut p, 0, &mut scheduler, &config).unwrap();
        assert_eq!(shot.damage, 50.0);
        assert!((shot.ray.direction - Vec3::NEG_Z).length() < 1e-6);
        assert_eq!(shot.ray.origin, Vec3::new(0.0, 1.8, 0.0));
    }

    #[test]
    fn nearest_target_inside_radius_and_range_is_hit() {
        let config = CombatConfig::default();
        let mut scheduler = Scheduler::new();
        let mut shooter = armed("pistol", Vec3::new(0.0, 1.8, 0.0));
        let near = armed("pistol", Vec3::new(3.0, 1.8, -10.0));
        let far = armed("pistol", Vec3::new(0.0, 1.8, -20.0));
        let wide = armed("pistol", Vec3::new(6.0, 1.8, -5.0));
        let behind = armed("pistol", Vec3::new(0.0, 1.8, 5.0));
        let out_of_range = armed("pistol", Vec3::new(0.0, 1.8, -60.0));

        let shot = CombatSystem::fire(&mut shooter, 0, &mut scheduler, &config).unwrap();
        let candidates = [&shooter, &far, &wide, &behind, &out_of_range, &near];
        assert_eq!(
            CombatSystem::resolve_hit(&shot, candidates, &config),
            Some(near.id)
        );
        assert_eq!(
            CombatSystem::resolve_hit(&shot, [&wide, &behind, &out_of_range], &config),
            None
        );
    }

    #[test]
    fn dead_candidates_are_skipped() {
        let config = CombatConfig::default();
        let mut scheduler = Scheduler::new();
        let mut shooter = armed("pistol", Vec3::new(0.0, 1.8, 0.0));
        let mut corpse = armed("pistol", Vec3::new(0.0, 1.8, -5.0));
        corpse.apply_damage(500.0);

        let shot = CombatSystem::fire(&mut shooter, 0, &mut scheduler, &config).unwrap();
        assert_eq!(CombatSystem::resolve_hit(&shot, [&corpse], &config), None);
    }

    #[test]
    fn lethal_hit_schedules_respawn_once() {
        let config = CombatConfig::default();
        let mut scheduler = Scheduler::new();
        let shooter = PlayerId::new();
        let mut target = armed("pistol", Vec3::new(10.0, 1.8, 10.0));

        let first = CombatSystem::apply_hit(shooter, &mut target, 80.0, 0, &mut scheduler, &config);
        assert!(!first.killed);
        assert_eq!(first.health_after, 20.0);

        let lethal = CombatSystem::apply_hit(shooter, &mut target, 80.0, 40, &mut scheduler, &config);
        let again = CombatSystem::apply_hit(shooter, &mut target, 80.0, 40, &mut scheduler, &config);
        assert!(lethal.killed);
        assert!(!again.killed);
        assert_eq!(target.deaths, 1);
        assert_eq!(target.health, 0.0);
        assert_eq!(
            scheduler.due_at(&TimerKey::new(target.id, TimerKind::Respawn)),
            Some(5_040)
        );

        CombatSystem::respawn(&mut target, &config);
        assert!(target.alive);
        assert_eq!(target.health, target.max_health);
        assert_eq!(target.position, config.spawn_point);
    }
}
