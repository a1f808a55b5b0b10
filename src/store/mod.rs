//! Room document storage and pub/sub
//!
//! Every call is asynchronous and may fail. Lookup misses are `Ok(None)`.
//! Subscriptions forward changes through a channel the simulation drains at
//! the start of a tick; dropping a [`Subscription`] stops its forwarding task.

pub mod memory;
pub mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

use std::future::Future;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::game::{Player, PlayerId};
use crate::lobby::{GameRoom, RoomId, RoomPhase};
use crate::sync::GameEvent;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),

    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("No row returned from insert")]
    NoRowReturned,

    #[error("Room {0} does not exist")]
    RoomMissing(RoomId),

    #[error("Store backend closed")]
    Closed,
}

/// Storage and pub/sub collaborator for rooms and their event feeds
pub trait RoomStore: Send + Sync + 'static {
    fn create(&self, room: &GameRoom) -> impl Future<Output = Result<RoomId, StoreError>> + Send;

    fn get(&self, id: RoomId) -> impl Future<Output = Result<Option<GameRoom>, StoreError>> + Send;

    /// Active rooms only; ended rooms release their code
    fn get_by_join_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<GameRoom>, StoreError>> + Send;

    /// Idempotent add to the member set
    fn join(&self, id: RoomId, player: &Player) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Idempotent remove from the member set
    fn leave(&self, id: RoomId, player: PlayerId) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn update_member(
        &self,
        id: RoomId,
        player: &Player,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn set_phase(&self, id: RoomId, phase: RoomPhase) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Room document changes
    fn subscribe(
        &self,
        id: RoomId,
    ) -> impl Future<Output = Result<Subscription<GameRoom>, StoreError>> + Send;

    fn publish_event(
        &self,
        id: RoomId,
        event: &GameEvent,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Events published to the room after the call
    fn subscribe_events(
        &self,
        id: RoomId,
    ) -> impl Future<Output = Result<Subscription<GameEvent>, StoreError>> + Send;
}

/// Live feed from the store. Unsubscribes when dropped.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
    task: JoinHandle<()>,
}

impl<T> Subscription<T> {
    pub fn new(rx: mpsc::UnboundedReceiver<T>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }

    /// Next queued item without waiting
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Everything queued so far
    pub fn drain(&mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            items.push(item);
        }
        items
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Pipe a broadcast feed into a [`Subscription`]
pub(crate) fn forward_broadcast<T>(mut feed: broadcast::Receiver<T>) -> Subscription<T>
where
    T: Clone + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(item) => {
                    if tx.send(item).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Subscription lagged behind store feed");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    Subscription::new(rx, task)
}
