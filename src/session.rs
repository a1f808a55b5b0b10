//! One participant's live session in a room
//!
//! Owns the simulation, the sync gateway and the renderer handle. The host
//! layer feeds input through the setters and calls [`GameSession::tick`] once
//! per frame; network results queued since the previous tick are applied
//! first, then the simulation advances.

use glam::Vec3;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::game::scheduler::{TimerKey, TimerKind};
use crate::game::{Catalog, GameTuning, InputState, PlayerId, PowerUpKind, SimEvent, Simulation};
use crate::host::render::report;
use crate::host::Renderer;
use crate::lobby::{GameRoom, LeaveOutcome, RoomPhase, RoomService, SessionError};
use crate::store::RoomStore;
use crate::sync::{Applied, SyncGateway};

/// Starting -> Playing delay once Starting has been observed
pub const SETTLE_DELAY_MS: u64 = 1_000;

type ShootFn = Box<dyn FnMut(Vec3) + Send>;
type ReloadFn = Box<dyn FnMut() + Send>;
type MoveFn = Box<dyn FnMut(Vec3, Vec3) + Send>;

#[derive(Default)]
struct Callbacks {
    on_shoot: Option<ShootFn>,
    on_reload: Option<ReloadFn>,
    on_player_move: Option<MoveFn>,
}

/// What one tick did
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub events: Vec<SimEvent>,
    /// Inbound events that changed local state
    pub applied: usize,
    pub phase: Option<RoomPhase>,
}

pub struct GameSession<R: Renderer> {
    room: GameRoom,
    local_id: PlayerId,
    sim: Simulation,
    input: InputState,
    gateway: SyncGateway,
    renderer: R,
    callbacks: Callbacks,
    settle_armed: bool,
    closed: bool,
}

impl<R: Renderer> GameSession<R> {
    /// Enter `room` as `local_id`, who must already be a member
    pub fn new(
        room: GameRoom,
        local_id: PlayerId,
        catalog: Arc<Catalog>,
        tuning: GameTuning,
        gateway: SyncGateway,
        renderer: R,
        seed: u64,
    ) -> Result<Self, SessionError> {
        let local = room.players.get(&local_id).cloned().ok_or(SessionError::NotFound)?;
        let mut sim = Simulation::new(catalog, tuning, local, seed);
        for player in room.players.values() {
            sim.add_player(player.clone());
        }

        let mut session = Self {
            room,
            local_id,
            sim,
            input: InputState::new(),
            gateway,
            renderer,
            callbacks: Callbacks::default(),
            settle_armed: false,
            closed: false,
        };
        for player in session.sim.players() {
            report(session.renderer.add_player(player), "add_player");
        }
        if session.room.phase == RoomPhase::Starting {
            session.arm_settle();
        }

        info!(
            room_id = %session.room.id,
            player_id = %local_id,
            phase = %session.room.phase,
            "Session started"
        );
        Ok(session)
    }

    pub fn room(&self) -> &GameRoom {
        &self.room
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn local_id(&self) -> PlayerId {
        self.local_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn on_shoot(&mut self, callback: impl FnMut(Vec3) + Send + 'static) {
        self.callbacks.on_shoot = Some(Box::new(callback));
    }

    pub fn on_reload(&mut self, callback: impl FnMut() + Send + 'static) {
        self.callbacks.on_reload = Some(Box::new(callback));
    }

    pub fn on_player_move(&mut self, callback: impl FnMut(Vec3, Vec3) + Send + 'static) {
        self.callbacks.on_player_move = Some(Box::new(callback));
    }

    pub fn set_movement(&mut self, forward: bool, back: bool, left: bool, right: bool) {
        self.input.set_movement(forward, back, left, right);
    }

    pub fn set_sprint(&mut self, sprint: bool) {
        self.input.set_sprint(sprint);
    }

    pub fn set_aiming(&mut self, aiming: bool) {
        self.input.set_aiming(aiming);
    }

    pub fn jump(&mut self) {
        self.input.request_jump();
    }

    pub fn fire(&mut self) {
        self.input.request_fire();
    }

    pub fn reload(&mut self) {
        self.input.request_reload();
    }

    pub fn look(&mut self, dx: f32, dy: f32) {
        self.input.add_look_delta(dx, dy);
    }

    /// Advance one frame
    pub fn tick(&mut self, dt: f32) -> TickReport {
        if self.closed {
            return TickReport::default();
        }

        let applied = self.apply_inbound();
        if self.closed {
            return TickReport {
                applied,
                phase: Some(self.room.phase),
                ..TickReport::default()
            };
        }

        let events = self.sim.tick(dt, &mut self.input);
        for event in &events {
            self.handle_sim_event(event);
        }
        let now = self.sim.now_ms();
        self.gateway.publish_sim_events(&events, now);

        TickReport {
            events,
            applied,
            phase: Some(self.room.phase),
        }
    }

    /// Spawn a power-up for everyone in the room
    pub fn spawn_power_up(&mut self, kind: Option<PowerUpKind>, position: Vec3) -> bool {
        let Some(event) = self.sim.spawn_power_up(kind, position) else {
            return false;
        };
        self.handle_sim_event(&event);
        let now = self.sim.now_ms();
        self.gateway.publish_sim_events(std::slice::from_ref(&event), now);
        true
    }

    /// Host asks the room to start. The settle timer arms once the store
    /// reflects Starting back.
    pub fn request_start(&mut self) -> Result<(), SessionError> {
        self.room.start(&self.local_id)?;
        self.gateway.publish_phase(RoomPhase::Starting);
        info!(room_id = %self.room.id, "Start requested");
        Ok(())
    }

    /// Host ends the room for everyone
    pub fn end_room(&mut self) -> Result<(), SessionError> {
        if self.room.end(&self.local_id)? {
            self.gateway.publish_phase(RoomPhase::Ended);
        }
        self.teardown();
        Ok(())
    }

    /// Tear down locally, then remove the local player from the stored room
    pub async fn leave_room<S: RoomStore>(
        &mut self,
        service: &RoomService<S>,
    ) -> Result<LeaveOutcome, SessionError> {
        let connected = self.gateway.is_connected();
        self.teardown();
        if !connected {
            return Ok(LeaveOutcome::Left);
        }
        service.leave(self.room.id, self.local_id).await
    }

    /// Cancel every timer and subscription and clear the scene.
    /// Nothing mutates this session afterwards.
    pub fn teardown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.input.release_all();
        self.sim.shutdown();
        self.gateway.close();
        let ids: Vec<PlayerId> = self.sim.players().map(|p| p.id).collect();
        for id in ids {
            report(self.renderer.remove_player(id), "remove_player");
        }
        info!(room_id = %self.room.id, player_id = %self.local_id, "Session closed");
    }

    fn render_player(&mut self, id: PlayerId) {
        if let Some(player) = self.sim.player(&id) {
            report(self.renderer.update_player(player), "update_player");
        }
    }

    fn arm_settle(&mut self) {
        if self.settle_armed {
            return;
        }
        self.settle_armed = true;
        self.sim
            .schedule_in(TimerKey::new(self.room.id, TimerKind::RoomSettle), SETTLE_DELAY_MS);
        debug!(room_id = %self.room.id, delay_ms = SETTLE_DELAY_MS, "Settle armed");
    }

    fn observe_phase(&mut self, phase: RoomPhase) {
        match phase {
            RoomPhase::Waiting => {}
            RoomPhase::Starting => {
                if self.room.phase == RoomPhase::Waiting {
                    self.room.phase = RoomPhase::Starting;
                }
                if self.room.phase == RoomPhase::Starting {
                    self.arm_settle();
                }
            }
            RoomPhase::Playing => {
                if matches!(self.room.phase, RoomPhase::Waiting | RoomPhase::Starting) {
                    self.room.phase = RoomPhase::Playing;
                    self.sim
                        .cancel_timer(&TimerKey::new(self.room.id, TimerKind::RoomSettle));
                    info!(room_id = %self.room.id, "Room playing");
                }
            }
            RoomPhase::Ended => {
                self.room.phase = RoomPhase::Ended;
                info!(room_id = %self.room.id, "Room ended");
                self.teardown();
            }
        }
    }

    fn finish_settle(&mut self) {
        match self.room.begin_play() {
            Ok(true) => {
                if self.room.is_host(&self.local_id) {
                    self.gateway.publish_phase(RoomPhase::Playing);
                }
                info!(room_id = %self.room.id, "Settled, room playing");
            }
            Ok(false) => {}
            Err(e) => warn!(room_id = %self.room.id, error = %e, "Settle ignored"),
        }
    }

    /// Reconcile membership and phase with the latest room document
    fn apply_room(&mut self, doc: GameRoom) {
        for player in doc.players.values() {
            if !self.sim.contains(&player.id) && self.sim.add_player(player.clone()) {
                report(self.renderer.add_player(player), "add_player");
            }
        }
        let departed: Vec<PlayerId> = self
            .sim
            .players()
            .map(|p| p.id)
            .filter(|id| *id != self.local_id && !doc.players.contains_key(id))
            .collect();
        for id in departed {
            self.sim.remove_player(&id);
            report(self.renderer.remove_player(id), "remove_player");
        }

        self.room.host_id = doc.host_id;
        self.room.players = doc.players;
        self.observe_phase(doc.phase);
    }

    fn apply_inbound(&mut self) -> usize {
        let inbound = self.gateway.poll_inbound();
        if let Some(doc) = inbound.room {
            self.apply_room(doc);
        }

        let mut applied = 0;
        for event in &inbound.events {
            if self.closed {
                break;
            }
            match self.gateway.apply_event(&mut self.sim, event) {
                Applied::Ignored(reason) => {
                    trace!(kind = event.kind(), ?reason, "Inbound event ignored");
                    continue;
                }
                Applied::Player(id) => self.render_player(id),
                Applied::Shot { weapon_id, .. } => {
                    report(self.renderer.fire_weapon_visual(&weapon_id), "fire_weapon_visual");
                }
                Applied::PowerUpAdded(power_up) => report(
                    self.renderer
                        .add_power_up(power_up.id, power_up.kind(), power_up.position),
                    "add_power_up",
                ),
                Applied::PowerUpCollected { player, power_up } => {
                    if let Some(id) = power_up {
                        report(self.renderer.collect_power_up(id), "collect_power_up");
                    }
                    self.render_player(player);
                }
                Applied::Phase(phase) => self.observe_phase(phase),
            }
            applied += 1;
        }
        applied
    }

    fn handle_sim_event(&mut self, event: &SimEvent) {
        match event {
            SimEvent::Moved { player, pose } => {
                if let Some(callback) = self.callbacks.on_player_move.as_mut() {
                    callback(pose.position, pose.rotation);
                }
                self.render_player(*player);
            }
            SimEvent::Shot(shot) => {
                if let Some(callback) = self.callbacks.on_shoot.as_mut() {
                    callback(shot.ray.direction);
                }
                report(self.renderer.fire_weapon_visual(&shot.weapon_id), "fire_weapon_visual");
            }
            SimEvent::Hit(hit) => self.render_player(hit.target),
            SimEvent::Died { victim, .. } => {
                self.render_player(*victim);
                self.publish_local_member(*victim);
            }
            SimEvent::Respawned { player, .. } => {
                self.render_player(*player);
                self.publish_local_member(*player);
            }
            SimEvent::ReloadStarted { .. } => {
                if let Some(callback) = self.callbacks.on_reload.as_mut() {
                    callback();
                }
            }
            SimEvent::Reloaded { player, .. } | SimEvent::EffectExpired { player, .. } => {
                self.render_player(*player);
            }
            SimEvent::PowerUpSpawned(power_up) => report(
                self.renderer
                    .add_power_up(power_up.id, power_up.kind(), power_up.position),
                "add_power_up",
            ),
            SimEvent::PowerUpCollected { player, power_up, .. } => {
                report(self.renderer.collect_power_up(power_up.id), "collect_power_up");
                self.render_player(*player);
                self.publish_local_member(*player);
            }
            SimEvent::RoomSettled { room } => {
                if *room == self.room.id.0 {
                    self.finish_settle();
                }
            }
        }
    }

    fn publish_local_member(&mut self, id: PlayerId) {
        if id != self.local_id {
            return;
        }
        if let Some(player) = self.sim.local_player() {
            self.gateway.publish_member(player);
        }
    }
}

impl<R: Renderer> Drop for GameSession<R> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Player;
    use crate::host::render::RenderError;
    use crate::host::NullRenderer;
    use crate::lobby::GameLocation;
    use crate::store::MemoryStore;
    use crate::sync::SyncConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    const STEP: f32 = 0.025;

    /// Renderer that fails every call
    struct BrokenRenderer;

    impl Renderer for BrokenRenderer {
        fn add_player(&mut self, _: &Player) -> Result<(), RenderError> {
            Err(RenderError::NotReady)
        }
        fn update_player(&mut self, _: &Player) -> Result<(), RenderError> {
            Err(RenderError::NotReady)
        }
        fn remove_player(&mut self, _: PlayerId) -> Result<(), RenderError> {
            Err(RenderError::NotReady)
        }
        fn add_power_up(&mut self, id: Uuid, _: PowerUpKind, _: Vec3) -> Result<(), RenderError> {
            Err(RenderError::UnknownObject(id))
        }
        fn collect_power_up(&mut self, id: Uuid) -> Result<(), RenderError> {
            Err(RenderError::UnknownObject(id))
        }
        fn fire_weapon_visual(&mut self, w: &str) -> Result<(), RenderError> {
            Err(RenderError::Backend(w.to_string()))
        }
    }

    fn player(name: &str, at: Vec3) -> Player {
        let weapon = Catalog::standard().create_weapon("pistol").unwrap();
        Player::new(PlayerId::new(), name, weapon, at)
    }

    fn location() -> GameLocation {
        GameLocation {
            city: "Berlin".into(),
            lat: 52.52,
            lng: 13.405,
            heading: 0.0,
            pitch: 0.0,
        }
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    struct Pair {
        store: Arc<MemoryStore>,
        service: RoomService<MemoryStore>,
        host: GameSession<NullRenderer>,
        guest: GameSession<NullRenderer>,
    }

    async fn pair() -> Pair {
        let store = Arc::new(MemoryStore::new());
        let service = RoomService::new(store.clone(), 4, Some(9));
        let alice = player("alice", Vec3::new(0.0, 1.8, 0.0));
        let bob = player("bob", Vec3::new(0.0, 1.8, -10.0));
        let (alice_id, bob_id) = (alice.id, bob.id);

        let room = service.create_room("Pair", alice, location()).await.unwrap();
        let room = service.join_by_code(&room.join_code, bob).await.unwrap();

        let mut sessions = Vec::new();
        for (id, seed) in [(alice_id, 1), (bob_id, 2)] {
            let gateway = SyncGateway::connect(store.clone(), room.id, id, SyncConfig::default())
                .await
                .unwrap();
            let session = GameSession::new(
                room.clone(),
                id,
                Arc::new(Catalog::standard()),
                GameTuning::default(),
                gateway,
                NullRenderer,
                seed,
            )
            .unwrap();
            sessions.push(session);
        }
        let guest = sessions.pop().unwrap();
        let host = sessions.pop().unwrap();
        Pair {
            store,
            service,
            host,
            guest,
        }
    }

    #[tokio::test]
    async fn shot_lands_on_peer_through_the_store() {
        let Pair {
            mut host, mut guest, ..
        } = pair().await;
        let guest_id = guest.local_id();

        let shots = Arc::new(AtomicUsize::new(0));
        let counter = shots.clone();
        host.on_shoot(move |direction| {
            assert_eq!(direction, Vec3::NEG_Z);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        host.fire();
        let report = host.tick(STEP);
        assert!(report.events.iter().any(|e| matches!(e, SimEvent::Hit(_))));
        assert_eq!(shots.load(Ordering::SeqCst), 1);
        settle().await;

        let report = guest.tick(STEP);
        assert!(report.applied >= 2);
        assert_eq!(guest.simulation().local_player().unwrap().health, 75.0);
        assert_eq!(
            guest.simulation().player(&guest_id).unwrap().health,
            host.simulation().player(&guest_id).unwrap().health
        );
    }

    #[tokio::test]
    async fn peer_shield_absorbs_shots_from_the_host() {
        let Pair {
            mut host, mut guest, ..
        } = pair().await;
        let guest_id = guest.local_id();
        let guest_spot = guest.simulation().local_player().unwrap().position;

        assert!(guest.spawn_power_up(Some(PowerUpKind::Shield), guest_spot));
        guest.tick(STEP);
        assert_eq!(guest.simulation().local_player().unwrap().modifiers.shield, 50.0);
        settle().await;

        host.tick(STEP);
        assert_eq!(host.simulation().player(&guest_id).unwrap().modifiers.shield, 50.0);
        assert!(host.simulation().power_ups().is_empty());

        host.fire();
        host.tick(STEP);
        settle().await;
        guest.tick(STEP);

        let me = guest.simulation().local_player().unwrap();
        assert_eq!(me.health, 100.0);
        assert_eq!(me.modifiers.shield, 25.0);
    }

    #[tokio::test]
    async fn start_settles_into_playing_for_everyone() {
        let Pair {
            store,
            mut host,
            mut guest,
            ..
        } = pair().await;
        let room_id = host.room().id;

        assert!(matches!(guest.request_start(), Err(SessionError::NotHost)));
        host.request_start().unwrap();
        settle().await;
        host.tick(0.0);
        guest.tick(0.0);
        assert_eq!(guest.room().phase, RoomPhase::Starting);

        for _ in 0..39 {
            host.tick(STEP);
            guest.tick(STEP);
        }
        assert_eq!(host.room().phase, RoomPhase::Starting);

        host.tick(STEP);
        guest.tick(STEP);
        assert_eq!(host.room().phase, RoomPhase::Playing);
        assert_eq!(guest.room().phase, RoomPhase::Playing);

        settle().await;
        let stored = store.get(room_id).await.unwrap().unwrap();
        assert_eq!(stored.phase, RoomPhase::Playing);
    }

    #[tokio::test]
    async fn leaving_cancels_timers_and_feeds() {
        let Pair {
            service,
            mut host,
            mut guest,
            ..
        } = pair().await;
        let guest_id = guest.local_id();

        host.fire();
        host.tick(STEP);
        guest.fire();
        guest.tick(STEP);
        guest.reload();
        guest.tick(STEP);
        assert_eq!(guest.simulation().scheduler().len(), 1);
        settle().await;

        let outcome = guest.leave_room(&service).await.unwrap();
        assert_eq!(outcome, LeaveOutcome::Left);
        assert!(guest.is_closed());
        assert!(guest.simulation().scheduler().is_empty());
        assert!(guest.tick(STEP).events.is_empty());

        settle().await;
        host.tick(STEP);
        assert!(!host.simulation().contains(&guest_id));
    }

    #[tokio::test]
    async fn host_leaving_lobby_ends_room_for_guest() {
        let Pair {
            service,
            mut host,
            mut guest,
            ..
        } = pair().await;

        assert_eq!(
            host.leave_room(&service).await.unwrap(),
            LeaveOutcome::RoomEnded
        );
        settle().await;
        guest.tick(STEP);
        assert_eq!(guest.room().phase, RoomPhase::Ended);
        assert!(guest.is_closed());
    }

    #[tokio::test]
    async fn render_failures_do_not_stop_the_tick() {
        let solo = player("solo", Vec3::new(0.0, 1.8, 0.0));
        let solo_id = solo.id;
        let service = RoomService::new(Arc::new(MemoryStore::new()), 4, Some(1));
        let room = service.single_player_room(solo, location());
        let gateway = SyncGateway::offline(room.id, solo_id, SyncConfig::default());
        let mut session = GameSession::new(
            room,
            solo_id,
            Arc::new(Catalog::standard()),
            GameTuning::default(),
            gateway,
            BrokenRenderer,
            5,
        )
        .unwrap();

        let moves = Arc::new(AtomicUsize::new(0));
        let counter = moves.clone();
        session.on_player_move(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(session.spawn_power_up(Some(PowerUpKind::Health), Vec3::new(0.0, 1.8, -30.0)));
        session.set_movement(true, false, false, false);
        session.fire();
        for _ in 0..10 {
            session.tick(STEP);
        }
        assert_eq!(moves.load(Ordering::SeqCst), 10);
        assert!(session.simulation().local_player().unwrap().position.z < 0.0);
        assert_eq!(session.room().phase, RoomPhase::Playing);
        assert_eq!(session.leave_room(&service).await.unwrap(), LeaveOutcome::Left);
    }
}
