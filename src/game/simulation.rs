//! Per-tick simulation for one participant
//!
//! Owns every entity the participant knows about and the timer queue. All
//! mutation happens inside `tick` or the explicit apply methods, on the
//! caller's thread.

use glam::Vec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::util::time::{clamp_delta, SimClock};

use super::catalog::{Catalog, Effect, PowerUp, PowerUpKind};
use super::combat::{CombatConfig, CombatSystem, HitResult, ReloadOutcome, Shot};
use super::input::InputSource;
use super::movement::{MovementConfig, MovementIntent, MovementState, MovementSystem};
use super::player::{Player, Pose};
use super::powerup::{AppliedEffect, PowerUpConfig, PowerUpSystem};
use super::scheduler::{Scheduler, TimerKey, TimerKind};
use super::PlayerId;

/// All gameplay tuning in one place
#[derive(Debug, Clone, Copy, Default)]
pub struct GameTuning {
    pub movement: MovementConfig,
    pub combat: CombatConfig,
    pub power_ups: PowerUpConfig,
}

/// Things that happened during a tick
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Moved {
        player: PlayerId,
        pose: Pose,
    },
    Shot(Shot),
    Hit(HitResult),
    Died {
        victim: PlayerId,
        killer: Option<PlayerId>,
        victim_deaths: u32,
        killer_kills: Option<u32>,
    },
    Respawned {
        player: PlayerId,
        position: Vec3,
        health: f32,
    },
    ReloadStarted {
        player: PlayerId,
        completes_at_ms: u64,
    },
    Reloaded {
        player: PlayerId,
        ammo: u32,
    },
    PowerUpSpawned(PowerUp),
    PowerUpCollected {
        player: PlayerId,
        power_up: PowerUp,
        expires_at_ms: Option<u64>,
    },
    EffectExpired {
        player: PlayerId,
        kind: PowerUpKind,
    },
    /// A room's Starting phase has settled
    RoomSettled {
        room: Uuid,
    },
}

/// Simulation state for the local participant's view of a room
pub struct Simulation {
    local_id: PlayerId,
    players: HashMap<PlayerId, Player>,
    motion: MovementState,
    power_ups: Vec<PowerUp>,
    scheduler: Scheduler,
    clock: SimClock,
    catalog: Arc<Catalog>,
    tuning: GameTuning,
    rng: ChaCha8Rng,
}

impl Simulation {
    pub fn new(catalog: Arc<Catalog>, tuning: GameTuning, local: Player, seed: u64) -> Self {
        let local_id = local.id;
        let mut players = HashMap::new();
        players.insert(local_id, local);
        Self {
            local_id,
            players,
            motion: MovementState::default(),
            power_ups: Vec::new(),
            scheduler: Scheduler::new(),
            clock: SimClock::new(),
            catalog,
            tuning,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn local_id(&self) -> PlayerId {
        self.local_id
    }

    pub fn local_player(&self) -> Option<&Player> {
        self.players.get(&self.local_id)
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    /// Add a member. Returns false if they were already present.
    pub fn add_player(&mut self, player: Player) -> bool {
        if self.players.contains_key(&player.id) {
            return false;
        }
        info!(player_id = %player.id, name = %player.name, "Player added to simulation");
        self.players.insert(player.id, player);
        true
    }

    /// Remove a member along with every pending timer that targets them
    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Player> {
        let removed = self.players.remove(id)?;
        let cancelled = self.scheduler.cancel_entity(id.0);
        info!(player_id = %id, cancelled, "Player removed from simulation");
        Some(removed)
    }

    pub fn power_ups(&self) -> &[PowerUp] {
        &self.power_ups
    }

    /// Track a power-up spawned elsewhere. Duplicates are ignored.
    pub fn insert_power_up(&mut self, power_up: PowerUp) -> bool {
        if !power_up.active || self.power_ups.iter().any(|p| p.id == power_up.id) {
            return false;
        }
        self.power_ups.push(power_up);
        true
    }

    pub fn remove_power_up(&mut self, id: Uuid) -> Option<PowerUp> {
        let index = self.power_ups.iter().position(|p| p.id == id)?;
        Some(self.power_ups.remove(index))
    }

    /// Spawn a power-up of `kind` (random when `None`) at `position`
    pub fn spawn_power_up(&mut self, kind: Option<PowerUpKind>, position: Vec3) -> Option<SimEvent> {
        let power_up = PowerUpSystem::spawn(&self.catalog, kind, position, &mut self.rng)?;
        debug!(power_up_id = %power_up.id, kind = ?power_up.kind(), "Power-up spawned");
        self.power_ups.push(power_up.clone());
        Some(SimEvent::PowerUpSpawned(power_up))
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn tuning(&self) -> &GameTuning {
        &self.tuning
    }

    pub fn movement_state(&self) -> &MovementState {
        &self.motion
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Arm an arbitrary timer relative to now
    pub fn schedule_in(&mut self, key: TimerKey, delay_ms: u64) {
        self.scheduler.schedule(key, self.clock.now_ms() + delay_ms);
    }

    pub fn cancel_timer(&mut self, key: &TimerKey) -> bool {
        self.scheduler.cancel(key)
    }

    /// Drop every pending timer (room left or torn down)
    pub fn shutdown(&mut self) {
        let pending = self.scheduler.len();
        self.scheduler.clear();
        self.power_ups.clear();
        debug!(pending, "Simulation timers cancelled");
    }

    /// Run one tick: due timers, local movement, reload, fire, pickups.
    pub fn tick<I: InputSource + ?Sized>(&mut self, dt: f32, input: &mut I) -> Vec<SimEvent> {
        let dt = clamp_delta(dt);
        let now = self.clock.advance(dt);

        let mut events = self.fire_due_timers(now);

        let look = input.take_look_delta();
        let intent = MovementIntent {
            forward: input.forward(),
            back: input.back(),
            left: input.left(),
            right: input.right(),
            sprint: input.sprint(),
            aiming: input.aiming(),
            jump: input.take_jump(),
        };
        let wants_reload = input.take_reload();
        let wants_fire = input.take_fire();

        if !self.local_player().is_some_and(|p| p.alive) {
            return events;
        }

        if let Some(player) = self.players.get_mut(&self.local_id) {
            MovementSystem::apply_look(&mut player.rotation, look, &self.tuning.movement);
            let mut pose = player.pose();
            let moved = MovementSystem::integrate(
                &mut pose,
                &mut self.motion,
                &intent,
                dt,
                player.modifiers.speed,
                &self.tuning.movement,
            );
            player.set_pose(pose);
            if let Some(pose) = moved {
                events.push(SimEvent::Moved {
                    player: player.id,
                    pose,
                });
            }
        }

        if wants_reload {
            events.extend(self.reload());
        }
        if wants_fire {
            events.extend(self.fire());
        }

        events.extend(self.collect_power_ups(now));

        if let Some(player) = self.players.get_mut(&self.local_id) {
            player.sanitize();
        }

        events
    }

    /// Pull the local player's trigger
    pub fn fire(&mut self) -> Vec<SimEvent> {
        let now = self.clock.now_ms();
        let Some(shooter) = self.players.get_mut(&self.local_id) else {
            return Vec::new();
        };
        let Some(shot) = CombatSystem::fire(shooter, now, &mut self.scheduler, &self.tuning.combat) else {
            return Vec::new();
        };

        let mut events = vec![SimEvent::Shot(shot.clone())];
        if let Some(target) = CombatSystem::resolve_hit(&shot, self.players.values(), &self.tuning.combat) {
            events.extend(self.damage_player(shot.shooter, target, shot.damage));
        }
        events
    }

    /// Request a manual reload for the local player
    pub fn reload(&mut self) -> Option<SimEvent> {
        let now = self.clock.now_ms();
        let player = self.players.get(&self.local_id)?;
        match CombatSystem::reload(player, now, &mut self.scheduler) {
            ReloadOutcome::Started { completes_at_ms } => Some(SimEvent::ReloadStarted {
                player: self.local_id,
                completes_at_ms,
            }),
            ReloadOutcome::AlreadyFull | ReloadOutcome::AlreadyReloading => None,
        }
    }

    /// Damage `target` on behalf of `shooter`, crediting the kill if it dies
    pub fn damage_player(&mut self, shooter: PlayerId, target: PlayerId, damage: f32) -> Vec<SimEvent> {
        let now = self.clock.now_ms();
        let Some(victim) = self.players.get_mut(&target) else {
            return Vec::new();
        };
        let hit = CombatSystem::apply_hit(
            shooter,
            victim,
            damage,
            now,
            &mut self.scheduler,
            &self.tuning.combat,
        );
        let victim_deaths = victim.deaths;

        let mut events = vec![SimEvent::Hit(hit)];
        if hit.killed {
            let killer_kills = if shooter != target {
                self.players.get_mut(&shooter).map(|killer| {
                    killer.kills += 1;
                    killer.kills
                })
            } else {
                None
            };
            info!(victim = %target, killer = %shooter, "Player killed");
            events.push(SimEvent::Died {
                victim: target,
                killer: Some(shooter),
                victim_deaths,
                killer_kills,
            });
        }
        events
    }

    /// Arm a respawn for a player whose death was reported by a peer.
    /// Re-arming for a duplicate report keeps a single timer.
    pub fn schedule_respawn(&mut self, player: PlayerId) {
        let delay = self.tuning.combat.respawn_delay_ms;
        self.schedule_in(TimerKey::new(player, TimerKind::Respawn), delay);
    }

    /// Apply a power-up effect to any member, e.g. a pickup reported by a
    /// peer. Timed kinds arm their expiry on this participant's clock.
    pub fn apply_effect(&mut self, player: &PlayerId, effect: &Effect) -> Option<AppliedEffect> {
        let now = self.clock.now_ms();
        let player = self.players.get_mut(player)?;
        Some(PowerUpSystem::apply_effect(player, effect, now, &mut self.scheduler))
    }

    fn collect_power_ups(&mut self, now: u64) -> Vec<SimEvent> {
        let mut events = Vec::new();
        let Some(player) = self.players.get_mut(&self.local_id) else {
            return events;
        };
        if !player.alive {
            return events;
        }

        let collected =
            PowerUpSystem::check_collection(player.position, &mut self.power_ups, &self.tuning.power_ups);
        for power_up in collected {
            let applied = PowerUpSystem::apply_effect(player, &power_up.effect, now, &mut self.scheduler);
            info!(player_id = %player.id, kind = ?power_up.kind(), "Power-up collected");
            events.push(SimEvent::PowerUpCollected {
                player: player.id,
                power_up,
                expires_at_ms: applied.expires_at_ms,
            });
        }
        events
    }

    fn fire_due_timers(&mut self, now: u64) -> Vec<SimEvent> {
        let mut events = Vec::new();
        while let Some((key, _due)) = self.scheduler.pop_due(now) {
            if key.kind == TimerKind::RoomSettle {
                events.push(SimEvent::RoomSettled { room: key.entity });
                continue;
            }

            let id = PlayerId(key.entity);
            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };
            match key.kind {
                TimerKind::AutoReload | TimerKind::Reload => {
                    CombatSystem::complete_reload(player);
                    events.push(SimEvent::Reloaded {
                        player: id,
                        ammo: player.weapon.ammo,
                    });
                }
                TimerKind::Respawn => {
                    CombatSystem::respawn(player, &self.tuning.combat);
                    if id == self.local_id {
                        self.motion = MovementState::default();
                    }
                    info!(player_id = %id, "Player respawned");
                    events.push(SimEvent::Respawned {
                        player: id,
                        position: player.position,
                        health: player.health,
                    });
                }
                TimerKind::EffectExpiry(kind) => {
                    PowerUpSystem::revert_effect(player, kind);
                    events.push(SimEvent::EffectExpired { player: id, kind });
                }
                TimerKind::RoomSettle => {}
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog::{Weapon, WeaponKind, WeaponSpec};
    use crate::game::input::InputState;

    const STEP: f32 = 0.025;

    fn sim_with(weapon: Weapon) -> Simulation {
        let local = Player::new(PlayerId::new(), "local", weapon, Vec3::new(0.0, 1.8, 0.0));
        Simulation::new(Arc::new(Catalog::standard()), GameTuning::default(), local, 42)
    }

    fn sim() -> Simulation {
        sim_with(Catalog::standard().create_weapon("pistol").unwrap())
    }

    fn remote(at: Vec3) -> Player {
        let weapon = Catalog::standard().create_weapon("rifle").unwrap();
        Player::new(PlayerId::new(), "remote", weapon, at)
    }

    fn run_ticks(sim: &mut Simulation, input: &mut InputState, n: usize) -> Vec<SimEvent> {
        (0..n).flat_map(|_| sim.tick(STEP, input)).collect()
    }

    #[test]
    fn single_round_weapon_auto_refills_at_100ms() {
        let spec = WeaponSpec {
            id: "single".into(),
            name: "Single".into(),
            kind: WeaponKind::Pistol,
            damage: 25.0,
            range: 50.0,
            fire_interval_ms: 300,
            max_ammo: 12,
            reload_ms: 2_000,
        };
        let mut weapon = Weapon::from_spec(&spec);
        weapon.ammo = 1;
        let mut sim = sim_with(weapon);
        let mut input = InputState::new();

        input.request_fire();
        let events = sim.tick(0.0, &mut input);
        assert!(events.iter().any(|e| matches!(e, SimEvent::Shot(_))));
        assert_eq!(sim.local_player().unwrap().weapon.ammo, 0);

        run_ticks(&mut sim, &mut input, 2);
        assert_eq!(sim.now_ms(), 50);
        input.request_fire();
        let events = sim.tick(0.0, &mut input);
        assert!(!events.iter().any(|e| matches!(e, SimEvent::Shot(_))));
        assert_eq!(sim.local_player().unwrap().weapon.ammo, 0);

        let events = run_ticks(&mut sim, &mut input, 2);
        assert_eq!(sim.now_ms(), 100);
        assert!(events.iter().any(|e| matches!(e, SimEvent::Reloaded { ammo: 12, .. })));
        assert_eq!(sim.local_player().unwrap().weapon.ammo, 12);
    }

    #[test]
    fn killed_player_respawns_after_exactly_five_seconds() {
        let mut sim = sim();
        let mut input = InputState::new();
        let target = remote(Vec3::new(20.0, 1.8, 20.0));
        let target_id = target.id;
        sim.add_player(target);

        let events = sim.damage_player(sim.local_id(), target_id, 500.0);
        assert!(events.iter().any(|e| matches!(e, SimEvent::Died { killer_kills: Some(1), .. })));
        // A second lethal hit in the same tick changes nothing
        let again = sim.damage_player(sim.local_id(), target_id, 500.0);
        assert!(!again.iter().any(|e| matches!(e, SimEvent::Died { .. })));
        assert_eq!(sim.local_player().unwrap().kills, 1);

        run_ticks(&mut sim, &mut input, 199);
        assert_eq!(sim.now_ms(), 4_975);
        assert!(!sim.player(&target_id).unwrap().alive);

        let events = run_ticks(&mut sim, &mut input, 1);
        assert_eq!(sim.now_ms(), 5_000);
        assert!(events.iter().any(|e| matches!(e, SimEvent::Respawned { .. })));
        let target = sim.player(&target_id).unwrap();
        assert!(target.alive);
        assert_eq!(target.health, target.max_health);
        assert_eq!(target.position, Vec3::new(0.0, 1.8, 0.0));
        assert_eq!(target.deaths, 1);
    }

    #[test]
    fn firing_hits_player_in_front() {
        let mut sim = sim();
        let mut input = InputState::new();
        let target = remote(Vec3::new(0.5, 1.8, -15.0));
        let target_id = target.id;
        sim.add_player(target);

        input.request_fire();
        let events = sim.tick(STEP, &mut input);

        assert!(events
            .iter()
            .any(|e| matches!(e, SimEvent::Hit(hit) if hit.target == target_id && hit.health_after == 75.0)));
    }

    #[test]
    fn movement_is_emitted_only_while_keys_are_held() {
        let mut sim = sim();
        let mut input = InputState::new();

        assert!(!run_ticks(&mut sim, &mut input, 5)
            .iter()
            .any(|e| matches!(e, SimEvent::Moved { .. })));

        input.set_movement(true, false, false, false);
        let events = run_ticks(&mut sim, &mut input, 5);
        assert_eq!(
            events.iter().filter(|e| matches!(e, SimEvent::Moved { .. })).count(),
            5
        );
        assert!(sim.local_player().unwrap().position.z < 0.0);
    }

    #[test]
    fn overlapping_speed_boosts_expire_with_the_later_one() {
        let mut sim = sim();
        let mut input = InputState::new();
        let here = sim.local_player().unwrap().position;

        sim.spawn_power_up(Some(PowerUpKind::Speed), here).unwrap();
        let events = sim.tick(0.0, &mut input);
        assert!(events.iter().any(|e| matches!(
            e,
            SimEvent::PowerUpCollected { expires_at_ms: Some(10_000), .. }
        )));

        run_ticks(&mut sim, &mut input, 200);
        assert_eq!(sim.now_ms(), 5_000);
        sim.spawn_power_up(Some(PowerUpKind::Speed), here).unwrap();
        sim.tick(0.0, &mut input);

        run_ticks(&mut sim, &mut input, 200);
        assert_eq!(sim.now_ms(), 10_000);
        assert_eq!(sim.local_player().unwrap().modifiers.speed, 1.5);

        let events = run_ticks(&mut sim, &mut input, 200);
        assert_eq!(sim.now_ms(), 15_000);
        assert!(events.iter().any(|e| matches!(
            e,
            SimEvent::EffectExpired { kind: PowerUpKind::Speed, .. }
        )));
        assert_eq!(sim.local_player().unwrap().modifiers.speed, 1.0);
    }

    #[test]
    fn manual_reload_completes_after_reload_duration() {
        let mut sim = sim();
        let mut input = InputState::new();
        input.request_fire();
        sim.tick(0.0, &mut input);

        input.request_reload();
        let events = sim.tick(0.0, &mut input);
        assert!(events.iter().any(|e| matches!(e, SimEvent::ReloadStarted { completes_at_ms: 2_000, .. })));
        input.request_reload();
        assert!(sim.tick(0.0, &mut input).is_empty());

        run_ticks(&mut sim, &mut input, 79);
        assert_eq!(sim.local_player().unwrap().weapon.ammo, 11);
        run_ticks(&mut sim, &mut input, 1);
        assert_eq!(sim.local_player().unwrap().weapon.ammo, 12);
    }

    #[test]
    fn removing_a_player_cancels_their_timers() {
        let mut sim = sim();
        let target = remote(Vec3::new(3.0, 1.8, 3.0));
        let target_id = target.id;
        sim.add_player(target);
        sim.damage_player(sim.local_id(), target_id, 500.0);
        assert_eq!(sim.scheduler().len(), 1);

        sim.remove_player(&target_id);
        assert!(sim.scheduler().is_empty());
    }

    #[test]
    fn dead_local_player_ignores_input() {
        let mut sim = sim();
        let mut input = InputState::new();
        let local = sim.local_id();
        sim.player_mut(&local).unwrap().apply_damage(1_000.0);

        input.set_movement(true, false, false, false);
        input.request_fire();
        let events = sim.tick(STEP, &mut input);
        assert!(events.is_empty());
        assert_eq!(sim.local_player().unwrap().position, Vec3::new(0.0, 1.8, 0.0));
    }
}
