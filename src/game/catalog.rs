//! Weapon and power-up catalog
//!
//! Templates are immutable and built once at startup. Components receive the
//! catalog behind an `Arc` and clone per-player or per-spawn instances from it.

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Weapon classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    Pistol,
    Rifle,
    Shotgun,
    Sniper,
    MachineGun,
}

/// Immutable weapon definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponSpec {
    pub id: String,
    pub name: String,
    pub kind: WeaponKind,
    /// Damage per hit
    pub damage: f32,
    /// Maximum hit distance along the view ray
    pub range: f32,
    /// Minimum time between shots (ms)
    pub fire_interval_ms: u64,
    /// Magazine size
    pub max_ammo: u32,
    /// Manual reload duration (ms)
    pub reload_ms: u64,
}

/// A player's weapon. Only `ammo` and the fire timestamp change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub spec: WeaponSpec,
    pub ammo: u32,
    #[serde(skip)]
    pub last_fire_ms: Option<u64>,
}

impl Weapon {
    /// Fresh instance with a full magazine
    pub fn from_spec(spec: &WeaponSpec) -> Self {
        Self {
            spec: spec.clone(),
            ammo: spec.max_ammo,
            last_fire_ms: None,
        }
    }

    pub fn is_full(&self) -> bool {
        self.ammo >= self.spec.max_ammo
    }

    pub fn refill(&mut self) {
        self.ammo = self.spec.max_ammo;
    }
}

/// Power-up kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    Health,
    Ammo,
    Speed,
    Damage,
    Shield,
    Invisibility,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 6] = [
        PowerUpKind::Health,
        PowerUpKind::Ammo,
        PowerUpKind::Speed,
        PowerUpKind::Damage,
        PowerUpKind::Shield,
        PowerUpKind::Invisibility,
    ];
}

/// What a power-up does when collected
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub kind: PowerUpKind,
    /// Heal amount, speed/damage multiplier, or shield points depending on kind
    pub magnitude: f32,
    /// 0 for instantaneous effects
    pub duration_ms: u64,
}

impl Effect {
    pub fn is_timed(&self) -> bool {
        self.duration_ms > 0
    }
}

/// Immutable power-up definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerUpSpec {
    pub id: String,
    pub effect: Effect,
}

/// A spawned power-up in the world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerUp {
    pub id: Uuid,
    pub spec_id: String,
    pub effect: Effect,
    pub position: Vec3,
    pub active: bool,
}

impl PowerUp {
    pub fn kind(&self) -> PowerUpKind {
        self.effect.kind
    }
}

/// Registry of weapon and power-up templates
#[derive(Debug, Clone)]
pub struct Catalog {
    weapons: BTreeMap<String, WeaponSpec>,
    power_ups: BTreeMap<String, PowerUpSpec>,
}

/// Weapon every player starts with
pub const DEFAULT_WEAPON: &str = "pistol";

impl Catalog {
    /// Build a catalog from explicit definitions
    pub fn new(
        weapons: impl IntoIterator<Item = WeaponSpec>,
        power_ups: impl IntoIterator<Item = PowerUpSpec>,
    ) -> Self {
        Self {
            weapons: weapons.into_iter().map(|w| (w.id.clone(), w)).collect(),
            power_ups: power_ups.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// The stock arsenal and pickups
    pub fn standard() -> Self {
        let weapon = |id: &str, name: &str, kind, damage, range, fire_interval_ms, max_ammo, reload_ms| {
            WeaponSpec {
                id: id.to_string(),
                name: name.to_string(),
                kind,
                damage,
                range,
                fire_interval_ms,
                max_ammo,
                reload_ms,
            }
        };
        let power_up = |id: &str, kind, magnitude, duration_ms| PowerUpSpec {
            id: id.to_string(),
            effect: Effect {
                kind,
                magnitude,
                duration_ms,
            },
        };

        Self::new(
            [
                weapon("pistol", "Pistol", WeaponKind::Pistol, 25.0, 50.0, 300, 12, 2000),
                weapon("rifle", "Assault Rifle", WeaponKind::Rifle, 35.0, 100.0, 150, 30, 2500),
                weapon("shotgun", "Shotgun", WeaponKind::Shotgun, 80.0, 25.0, 800, 8, 3000),
                weapon("sniper", "Sniper Rifle", WeaponKind::Sniper, 100.0, 200.0, 1500, 5, 4000),
                weapon("machine_gun", "Machine Gun", WeaponKind::MachineGun, 20.0, 80.0, 100, 100, 5000),
            ],
            [
                power_up("health_pack", PowerUpKind::Health, 50.0, 0),
                power_up("ammo_pack", PowerUpKind::Ammo, 1.0, 0),
                power_up("speed_boost", PowerUpKind::Speed, 1.5, 10_000),
                power_up("damage_boost", PowerUpKind::Damage, 2.0, 15_000),
                power_up("shield", PowerUpKind::Shield, 50.0, 20_000),
                power_up("invisibility", PowerUpKind::Invisibility, 1.0, 8_000),
            ],
        )
    }

    pub fn weapon(&self, id: &str) -> Option<&WeaponSpec> {
        self.weapons.get(id)
    }

    pub fn weapon_by_kind(&self, kind: WeaponKind) -> Option<&WeaponSpec> {
        self.weapons.values().find(|w| w.kind == kind)
    }

    pub fn weapons(&self) -> impl Iterator<Item = &WeaponSpec> {
        self.weapons.values()
    }

    /// Clone a weapon template into a fresh, fully loaded instance
    pub fn create_weapon(&self, id: &str) -> Option<Weapon> {
        self.weapon(id).map(Weapon::from_spec)
    }

    pub fn power_up(&self, id: &str) -> Option<&PowerUpSpec> {
        self.power_ups.get(id)
    }

    pub fn power_up_by_kind(&self, kind: PowerUpKind) -> Option<&PowerUpSpec> {
        self.power_ups.values().find(|p| p.effect.kind == kind)
    }

    pub fn power_ups(&self) -> impl Iterator<Item = &PowerUpSpec> {
        self.power_ups.values()
    }

    /// Uniformly pick a power-up template
    pub fn random_power_up<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&PowerUpSpec> {
        if self.power_ups.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.power_ups.len());
        self.power_ups.values().nth(index)
    }

    /// Place an active instance of a template in the world
    pub fn create_power_up(&self, spec: &PowerUpSpec, position: Vec3) -> PowerUp {
        PowerUp {
            id: Uuid::new_v4(),
            spec_id: spec.id.clone(),
            effect: spec.effect,
            position,
            active: true,
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn weapon_instances_are_independent_of_template() {
        let catalog = Catalog::standard();
        let mut a = catalog.create_weapon("rifle").unwrap();
        let b = catalog.create_weapon("rifle").unwrap();

        a.ammo = 3;
        a.last_fire_ms = Some(10);

        assert_eq!(b.ammo, 30);
        assert_eq!(catalog.weapon("rifle").unwrap().max_ammo, 30);
        assert!(b.last_fire_ms.is_none());
    }

    #[test]
    fn lookups_by_kind() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.weapon_by_kind(WeaponKind::Sniper).unwrap().id, "sniper");
        assert_eq!(
            catalog.power_up_by_kind(PowerUpKind::Speed).unwrap().effect.duration_ms,
            10_000
        );
        assert!(catalog.create_weapon("railgun").is_none());
    }

    #[test]
    fn random_pick_covers_every_kind() {
        let catalog = Catalog::standard();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(catalog.random_power_up(&mut rng).unwrap().effect.kind);
        }
        assert_eq!(seen.len(), PowerUpKind::ALL.len());
    }

    #[test]
    fn spawned_power_up_is_active_at_position() {
        let catalog = Catalog::standard();
        let spec = catalog.power_up("shield").unwrap();
        let position = Vec3::new(1.0, 0.5, -4.0);
        let a = catalog.create_power_up(spec, position);
        let b = catalog.create_power_up(spec, Vec3::ZERO);

        assert!(a.active);
        assert_eq!(a.position, position);
        assert_ne!(a.id, b.id);
    }
}
