//! Street Strike - simulation core for a multiplayer street-view shooter
//!
//! - `game`: movement, combat, power-ups and the per-tick simulation
//! - `lobby`: rooms, join codes and the room lifecycle
//! - `sync`: event feed protocol and the gateway to the room store
//! - `store`: room storage backends (in-memory, PostgREST)
//! - `host`: renderer and location collaborators
//! - `session`: ties one participant's simulation to a room

pub mod config;
pub mod game;
pub mod host;
pub mod lobby;
pub mod session;
pub mod store;
pub mod sync;
pub mod util;

pub use config::Config;
pub use session::GameSession;
