//! Sync gateway - the seam between one participant's simulation and the store
//!
//! Outbound publishes go through a channel to a writer task so the tick never
//! waits on the network. Inbound events and room changes queue in store
//! subscriptions until [`SyncGateway::poll_inbound`] drains them at the start
//! of a tick.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::game::scheduler::{TimerKey, TimerKind};
use crate::game::{Player, PlayerId, PowerUp, SimEvent, Simulation};
use crate::lobby::{GameRoom, RoomId, RoomPhase};
use crate::store::{RoomStore, StoreError, Subscription};
use crate::util::rate_limit::{InboundRateLimiter, INBOUND_MOVE_RATE_LIMIT};

use super::protocol::{EventPayload, GameEvent};
use super::throttle::PublishThrottle;

/// Sync tuning
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    /// Minimum gap between movement publishes per player
    pub publish_interval_ms: u64,
    /// How many recent event ids are remembered for dedupe
    pub seen_capacity: usize,
    /// Inbound movement updates accepted per remote player per second
    pub inbound_move_rate: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            publish_interval_ms: 100,
            seen_capacity: 1024,
            inbound_move_rate: INBOUND_MOVE_RATE_LIMIT,
        }
    }
}

/// Work for the writer task
#[derive(Debug)]
enum Outbound {
    Event(GameEvent),
    Member(Player),
    Phase(RoomPhase),
}

/// Why an inbound event changed nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    Duplicate,
    OtherRoom,
    OwnEcho,
    UnknownPlayer,
    UnknownPowerUp,
    RateLimited,
    /// Hit on a life that already ended
    Stale,
}

/// Effect of applying one inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// A player's state changed and should be re-rendered
    Player(PlayerId),
    Shot { shooter: PlayerId, weapon_id: String },
    PowerUpAdded(PowerUp),
    /// A peer picked up a power-up. `power_up` is set when it was still in
    /// the scene here.
    PowerUpCollected {
        player: PlayerId,
        power_up: Option<Uuid>,
    },
    Phase(RoomPhase),
    Ignored(Ignored),
}

/// Everything that arrived since the last poll
#[derive(Debug, Default)]
pub struct Inbound {
    pub events: Vec<GameEvent>,
    /// Latest room document, if it changed
    pub room: Option<GameRoom>,
}

/// Bounded memory of event ids already applied
#[derive(Debug)]
struct SeenSet {
    capacity: usize,
    order: VecDeque<Uuid>,
    ids: HashSet<Uuid>,
}

impl SeenSet {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            ids: HashSet::new(),
        }
    }

    /// Record `id`. Returns false if it was already seen.
    fn insert(&mut self, id: Uuid) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        true
    }
}

pub struct SyncGateway {
    room_id: RoomId,
    local_id: PlayerId,
    throttle: PublishThrottle,
    seen: SeenSet,
    limiter: InboundRateLimiter,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    writer: Option<JoinHandle<()>>,
    events: Option<Subscription<GameEvent>>,
    room_feed: Option<Subscription<GameRoom>>,
}

impl SyncGateway {
    /// Subscribe to the room's feeds and start the writer task
    pub async fn connect<S: RoomStore>(
        store: Arc<S>,
        room_id: RoomId,
        local_id: PlayerId,
        config: SyncConfig,
    ) -> Result<Self, StoreError> {
        let events = store.subscribe_events(room_id).await?;
        let room_feed = store.subscribe(room_id).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(run_writer(store, room_id, rx));

        info!(room_id = %room_id, player_id = %local_id, "Sync gateway connected");

        let mut gateway = Self::offline(room_id, local_id, config);
        gateway.outbound = Some(tx);
        gateway.writer = Some(writer);
        gateway.events = Some(events);
        gateway.room_feed = Some(room_feed);
        Ok(gateway)
    }

    /// Gateway with no store behind it (solo play). Publishes are dropped.
    pub fn offline(room_id: RoomId, local_id: PlayerId, config: SyncConfig) -> Self {
        Self {
            room_id,
            local_id,
            throttle: PublishThrottle::new(config.publish_interval_ms),
            seen: SeenSet::new(config.seen_capacity),
            limiter: InboundRateLimiter::with_rate(config.inbound_move_rate),
            outbound: None,
            writer: None,
            events: None,
            room_feed: None,
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn is_connected(&self) -> bool {
        self.outbound.is_some()
    }

    fn send(&self, job: Outbound) {
        let Some(tx) = &self.outbound else {
            return;
        };
        if tx.send(job).is_err() {
            warn!(room_id = %self.room_id, "Writer task gone, dropping publish");
        }
    }

    /// Publish one event immediately
    pub fn publish(&mut self, payload: EventPayload) {
        let event = GameEvent::new(self.room_id, self.local_id, payload);
        // Our own echo must not be applied back
        self.seen.insert(event.id);
        trace!(kind = event.kind(), "Publishing event");
        self.send(Outbound::Event(event));
    }

    /// Publish the sync-worthy events of one tick. Movement is throttled; every
    /// other kind goes out once per occurrence. Returns how many were queued.
    pub fn publish_sim_events(&mut self, events: &[SimEvent], now_ms: u64) -> usize {
        let mut queued = 0;
        for event in events {
            let Some(payload) = EventPayload::from_sim(event, self.local_id) else {
                continue;
            };
            if payload.is_throttled() && !self.throttle.should_send(self.local_id, now_ms) {
                continue;
            }
            if matches!(payload, EventPayload::PlayerRespawn { .. }) {
                self.throttle.force_next(self.local_id);
            }
            self.publish(payload);
            queued += 1;
        }
        queued
    }

    /// Persist the local player's document state (health, counters, weapon)
    pub fn publish_member(&mut self, player: &Player) {
        self.send(Outbound::Member(player.clone()));
    }

    /// Write a phase change to the room document and announce it on the feed
    pub fn publish_phase(&mut self, phase: RoomPhase) {
        self.send(Outbound::Phase(phase));
        self.publish(EventPayload::RoomState { phase });
    }

    /// Drain everything queued by the subscriptions
    pub fn poll_inbound(&mut self) -> Inbound {
        let events = self
            .events
            .as_mut()
            .map(|sub| sub.drain())
            .unwrap_or_default();
        let room = self
            .room_feed
            .as_mut()
            .and_then(|sub| sub.drain().pop());
        Inbound { events, room }
    }

    /// Apply one inbound event to the simulation
    pub fn apply_event(&mut self, sim: &mut Simulation, event: &GameEvent) -> Applied {
        if event.room_id != self.room_id {
            return Applied::Ignored(Ignored::OtherRoom);
        }
        if !self.seen.insert(event.id) {
            return Applied::Ignored(Ignored::Duplicate);
        }
        if event.origin == self.local_id {
            return Applied::Ignored(Ignored::OwnEcho);
        }
        if !sim.contains(&event.origin) {
            debug!(origin = %event.origin, kind = event.kind(), "Event from non-member discarded");
            return Applied::Ignored(Ignored::UnknownPlayer);
        }

        match &event.payload {
            EventPayload::PlayerMove { position, rotation } => {
                if !self.limiter.check_move(event.origin) {
                    return Applied::Ignored(Ignored::RateLimited);
                }
                match sim.player_mut(&event.origin) {
                    Some(player) => {
                        player.position = *position;
                        player.rotation = *rotation;
                        player.sanitize();
                        Applied::Player(event.origin)
                    }
                    None => Applied::Ignored(Ignored::UnknownPlayer),
                }
            }
            EventPayload::PlayerShoot { weapon_id, .. } => Applied::Shot {
                shooter: event.origin,
                weapon_id: weapon_id.clone(),
            },
            EventPayload::PlayerHit {
                target,
                health,
                shield,
                life,
                ..
            } => match sim.player_mut(target) {
                Some(player) => {
                    // Reordered after the death, or after the respawn that followed it
                    if !player.alive || *life < player.deaths {
                        debug!(player_id = %target, life, deaths = player.deaths, "Stale hit dropped");
                        return Applied::Ignored(Ignored::Stale);
                    }
                    player.health = (*health).clamp(0.0, player.max_health);
                    player.modifiers.shield = (*shield).max(0.0);
                    Applied::Player(*target)
                }
                None => Applied::Ignored(Ignored::UnknownPlayer),
            },
            EventPayload::PlayerDied {
                victim,
                killer,
                deaths,
                killer_kills,
            } => {
                let Some(player) = sim.player_mut(victim) else {
                    return Applied::Ignored(Ignored::UnknownPlayer);
                };
                let was_alive = player.alive;
                player.alive = false;
                player.health = 0.0;
                player.deaths = player.deaths.max(*deaths);

                if let (Some(killer), Some(kills)) = (killer, killer_kills) {
                    if let Some(killer) = sim.player_mut(killer) {
                        killer.kills = killer.kills.max(*kills);
                    }
                }
                if was_alive {
                    sim.schedule_respawn(*victim);
                }
                Applied::Player(*victim)
            }
            EventPayload::PlayerRespawn { position, health } => {
                sim.cancel_timer(&TimerKey::new(event.origin, TimerKind::Respawn));
                match sim.player_mut(&event.origin) {
                    Some(player) => {
                        player.respawn(*position);
                        player.health = (*health).clamp(0.0, player.max_health);
                        Applied::Player(event.origin)
                    }
                    None => Applied::Ignored(Ignored::UnknownPlayer),
                }
            }
            EventPayload::PlayerReload { .. } => Applied::Player(event.origin),
            EventPayload::PowerUpSpawned { power_up } => {
                if sim.insert_power_up(power_up.clone()) {
                    Applied::PowerUpAdded(power_up.clone())
                } else {
                    Applied::Ignored(Ignored::Duplicate)
                }
            }
            EventPayload::PowerUpCollected { power_up_id, kind } => {
                let removed = sim.remove_power_up(*power_up_id);
                let effect = match &removed {
                    Some(power_up) => Some(power_up.effect),
                    None => sim.catalog().power_up_by_kind(*kind).map(|spec| spec.effect),
                };
                let Some(effect) = effect else {
                    warn!(kind = ?kind, "Pickup of a power-up kind missing from the catalog");
                    return Applied::Ignored(Ignored::UnknownPowerUp);
                };
                match sim.apply_effect(&event.origin, &effect) {
                    Some(applied) => {
                        debug!(
                            player_id = %event.origin,
                            kind = ?applied.kind,
                            expires_at_ms = ?applied.expires_at_ms,
                            "Peer pickup applied"
                        );
                        Applied::PowerUpCollected {
                            player: event.origin,
                            power_up: removed.map(|power_up| power_up.id),
                        }
                    }
                    None => Applied::Ignored(Ignored::UnknownPlayer),
                }
            }
            EventPayload::RoomState { phase } => Applied::Phase(*phase),
        }
    }

    /// Stop both subscriptions and let the writer flush what is queued.
    /// Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(events) = self.events.take() {
            events.unsubscribe();
        }
        if let Some(room_feed) = self.room_feed.take() {
            room_feed.unsubscribe();
        }
        // Dropping the sender ends the writer after its backlog
        if self.outbound.take().is_some() {
            info!(room_id = %self.room_id, "Sync gateway closed");
        }
        self.writer = None;
        self.throttle.clear();
        self.limiter.forget_stale();
    }
}

impl Drop for SyncGateway {
    fn drop(&mut self) {
        self.close();
    }
}

/// Performs store writes in order. Failures are logged, not retried.
async fn run_writer<S: RoomStore>(
    store: Arc<S>,
    room_id: RoomId,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(job) = rx.recv().await {
        let (what, result) = match job {
            Outbound::Event(event) => (event.kind(), store.publish_event(room_id, &event).await),
            Outbound::Member(player) => ("member", store.update_member(room_id, &player).await),
            Outbound::Phase(phase) => ("phase", store.set_phase(room_id, phase).await),
        };
        if let Err(e) = result {
            warn!(room_id = %room_id, what, error = %e, "Store write failed");
        }
    }
    debug!(room_id = %room_id, "Writer task finished");
}
