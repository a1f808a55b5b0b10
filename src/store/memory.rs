//! In-process room store
//!
//! Backs single-process sessions and tests. Room documents live in a DashMap,
//! changes fan out over per-room broadcast channels.

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::game::{Player, PlayerId};
use crate::lobby::{GameRoom, RoomId, RoomPhase};
use crate::sync::GameEvent;

use super::{forward_broadcast, RoomStore, StoreError, Subscription};

const FEED_CAPACITY: usize = 256;

#[derive(Default)]
pub struct MemoryStore {
    rooms: DashMap<RoomId, GameRoom>,
    /// Join code -> room, active rooms only
    join_codes: DashMap<String, RoomId>,
    room_feeds: DashMap<RoomId, broadcast::Sender<GameRoom>>,
    event_feeds: DashMap<RoomId, broadcast::Sender<GameEvent>>,
    event_log: Mutex<Vec<GameEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Every event published to `id`, in publish order
    pub fn events(&self, id: RoomId) -> Vec<GameEvent> {
        self.event_log
            .lock()
            .iter()
            .filter(|e| e.room_id == id)
            .cloned()
            .collect()
    }

    fn room_feed(&self, id: RoomId) -> broadcast::Sender<GameRoom> {
        self.room_feeds
            .entry(id)
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .clone()
    }

    fn event_feed(&self, id: RoomId) -> broadcast::Sender<GameEvent> {
        self.event_feeds
            .entry(id)
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .clone()
    }

    /// Apply `change` to a stored room and notify subscribers
    fn mutate<F>(&self, id: RoomId, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut GameRoom),
    {
        let snapshot = {
            let mut room = self.rooms.get_mut(&id).ok_or(StoreError::RoomMissing(id))?;
            change(&mut room);
            room.clone()
        };
        if !snapshot.is_active() {
            self.join_codes.remove(&snapshot.join_code);
        }
        // No subscribers is fine
        let _ = self.room_feed(id).send(snapshot);
        Ok(())
    }
}

impl RoomStore for MemoryStore {
    async fn create(&self, room: &GameRoom) -> Result<RoomId, StoreError> {
        if room.is_active() {
            self.join_codes.insert(room.join_code.clone(), room.id);
        }
        self.rooms.insert(room.id, room.clone());
        debug!(room_id = %room.id, join_code = %room.join_code, "Room stored");
        Ok(room.id)
    }

    async fn get(&self, id: RoomId) -> Result<Option<GameRoom>, StoreError> {
        Ok(self.rooms.get(&id).map(|r| r.clone()))
    }

    async fn get_by_join_code(&self, code: &str) -> Result<Option<GameRoom>, StoreError> {
        let Some(id) = self.join_codes.get(code).map(|r| *r) else {
            return Ok(None);
        };
        Ok(self.rooms.get(&id).map(|r| r.clone()))
    }

    async fn join(&self, id: RoomId, player: &Player) -> Result<(), StoreError> {
        self.mutate(id, |room| {
            room.players.entry(player.id).or_insert_with(|| player.clone());
        })
    }

    async fn leave(&self, id: RoomId, player: PlayerId) -> Result<(), StoreError> {
        if !self.rooms.contains_key(&id) {
            return Ok(());
        }
        self.mutate(id, |room| {
            room.players.remove(&player);
        })
    }

    async fn update_member(&self, id: RoomId, player: &Player) -> Result<(), StoreError> {
        self.mutate(id, |room| {
            room.update_member(player.clone());
        })
    }

    async fn set_phase(&self, id: RoomId, phase: RoomPhase) -> Result<(), StoreError> {
        self.mutate(id, |room| room.phase = phase)
    }

    async fn subscribe(&self, id: RoomId) -> Result<Subscription<GameRoom>, StoreError> {
        if !self.rooms.contains_key(&id) {
            return Err(StoreError::RoomMissing(id));
        }
        Ok(forward_broadcast(self.room_feed(id).subscribe()))
    }

    async fn publish_event(&self, id: RoomId, event: &GameEvent) -> Result<(), StoreError> {
        if !self.rooms.contains_key(&id) {
            return Err(StoreError::RoomMissing(id));
        }
        self.event_log.lock().push(event.clone());
        let _ = self.event_feed(id).send(event.clone());
        Ok(())
    }

    async fn subscribe_events(&self, id: RoomId) -> Result<Subscription<GameEvent>, StoreError> {
        if !self.rooms.contains_key(&id) {
            return Err(StoreError::RoomMissing(id));
        }
        Ok(forward_broadcast(self.event_feed(id).subscribe()))
    }
}
