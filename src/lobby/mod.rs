//! Rooms, join codes and the room lifecycle

pub mod join_code;
pub mod room;
pub mod service;

pub use room::{GameLocation, GameRoom, LeaveOutcome, RoomId, RoomPhase};
pub use service::RoomService;

use crate::store::StoreError;

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Room not found")]
    NotFound,

    #[error("Room is full ({max} players)")]
    Full { max: usize },

    #[error("Only the host can do that")]
    NotHost,

    #[error("Not enough players to start ({have}/{need})")]
    NotEnoughPlayers { have: usize, need: usize },

    #[error("Cannot {action} while room is {from}")]
    InvalidTransition { from: RoomPhase, action: &'static str },

    #[error("Invalid join code")]
    InvalidJoinCode,

    #[error("No free join code after {attempts} attempts")]
    JoinCodeExhausted { attempts: usize },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
