//! Room service - creates rooms and drives their lifecycle through the store

use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::game::{Player, PlayerId};
use crate::store::RoomStore;

use super::join_code;
use super::room::{GameLocation, GameRoom, LeaveOutcome, RoomId, RoomPhase};
use super::SessionError;

const JOIN_CODE_ATTEMPTS: usize = 8;

/// Lifecycle operations on rooms held in a [`RoomStore`]
pub struct RoomService<S: RoomStore> {
    store: Arc<S>,
    rng: Mutex<ChaCha8Rng>,
    max_players: usize,
}

impl<S: RoomStore> RoomService<S> {
    pub fn new(store: Arc<S>, max_players: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            store,
            rng: Mutex::new(rng),
            max_players,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn next_code(&self) -> String {
        join_code::generate(&mut *self.rng.lock())
    }

    /// A code no active room carries
    async fn unique_join_code(&self) -> Result<String, SessionError> {
        for attempt in 1..=JOIN_CODE_ATTEMPTS {
            let code = self.next_code();
            if self.store.get_by_join_code(&code).await?.is_none() {
                return Ok(code);
            }
            debug!(attempt, code = %code, "Join code already taken");
        }
        Err(SessionError::JoinCodeExhausted {
            attempts: JOIN_CODE_ATTEMPTS,
        })
    }

    /// Create a Waiting room with `host` as its only member
    pub async fn create_room(
        &self,
        name: impl Into<String>,
        host: Player,
        location: GameLocation,
    ) -> Result<GameRoom, SessionError> {
        let code = self.unique_join_code().await?;
        let room = GameRoom::new(name, code, host, self.max_players, location);
        self.store.create(&room).await?;
        info!(
            room_id = %room.id,
            join_code = %room.join_code,
            host_id = %room.host_id,
            city = %room.location.city,
            "Room created"
        );
        Ok(room)
    }

    /// Local room for solo play. Starts in Playing and never touches the store.
    pub fn single_player_room(&self, host: Player, location: GameLocation) -> GameRoom {
        let mut room = GameRoom::new("Single Player", self.next_code(), host, 1, location);
        room.phase = RoomPhase::Playing;
        room
    }

    /// Resolve user-entered code. A well-formed code nobody uses is `Ok(None)`.
    pub async fn find_by_code(&self, input: &str) -> Result<Option<GameRoom>, SessionError> {
        let code = join_code::normalize(input).ok_or(SessionError::InvalidJoinCode)?;
        Ok(self.store.get_by_join_code(&code).await?)
    }

    pub async fn join_by_code(&self, input: &str, player: Player) -> Result<GameRoom, SessionError> {
        let mut room = self
            .find_by_code(input)
            .await?
            .ok_or(SessionError::NotFound)?;

        let player_id = player.id;
        match room.add_member(player.clone()) {
            Ok(true) => {
                self.store.join(room.id, &player).await?;
                info!(room_id = %room.id, player_id = %player_id, "Player joined room");
            }
            Ok(false) => debug!(room_id = %room.id, player_id = %player_id, "Already a member"),
            Err(e) => {
                warn!(room_id = %room.id, player_id = %player_id, error = %e, "Join rejected");
                return Err(e);
            }
        }
        Ok(room)
    }

    async fn load(&self, id: RoomId) -> Result<GameRoom, SessionError> {
        self.store.get(id).await?.ok_or(SessionError::NotFound)
    }

    /// Remove `player`. The host leaving before play ends the room.
    pub async fn leave(&self, id: RoomId, player: PlayerId) -> Result<LeaveOutcome, SessionError> {
        let Some(mut room) = self.store.get(id).await? else {
            return Ok(LeaveOutcome::NotMember);
        };
        let outcome = room.remove_member(&player);
        match outcome {
            LeaveOutcome::NotMember => {}
            LeaveOutcome::Left => {
                self.store.leave(id, player).await?;
                info!(room_id = %id, player_id = %player, "Player left room");
            }
            LeaveOutcome::RoomEnded => {
                self.store.leave(id, player).await?;
                self.store.set_phase(id, RoomPhase::Ended).await?;
                info!(room_id = %id, host_id = %player, "Host left, room ended");
            }
        }
        Ok(outcome)
    }

    /// Waiting -> Starting
    pub async fn start(&self, id: RoomId, caller: PlayerId) -> Result<GameRoom, SessionError> {
        let mut room = self.load(id).await?;
        room.start(&caller)?;
        self.store.set_phase(id, RoomPhase::Starting).await?;
        info!(room_id = %id, players = room.member_count(), "Room starting");
        Ok(room)
    }

    /// Starting -> Playing, once the settle delay has passed
    pub async fn begin_play(&self, id: RoomId) -> Result<GameRoom, SessionError> {
        let mut room = self.load(id).await?;
        if room.begin_play()? {
            self.store.set_phase(id, RoomPhase::Playing).await?;
            info!(room_id = %id, "Room playing");
        }
        Ok(room)
    }

    pub async fn end(&self, id: RoomId, caller: PlayerId) -> Result<GameRoom, SessionError> {
        let mut room = self.load(id).await?;
        if room.end(&caller)? {
            self.store.set_phase(id, RoomPhase::Ended).await?;
            info!(room_id = %id, "Room ended by host");
        }
        Ok(room)
    }
}
