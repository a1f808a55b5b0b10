//! PostgREST room store
//!
//! Tables: `game_rooms` (one row per room document) and `game_events` (append
//! only, with a store-assigned `seq bigserial` column). Subscriptions poll and
//! forward changes until dropped. Event polls page by `seq`, never by the
//! publisher's wall clock.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::game::{Player, PlayerId};
use crate::lobby::{GameRoom, RoomId, RoomPhase};
use crate::sync::GameEvent;

use super::{RoomStore, StoreError, Subscription};

const ROOMS_TABLE: &str = "game_rooms";
const EVENTS_TABLE: &str = "game_events";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// HTTP-backed store. Member updates are read-modify-write on the room row.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
    }

    async fn check(response: Response) -> Result<Response, StoreError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Api { status, body })
    }

    async fn get_rows<T: DeserializeOwned>(&self, table: &str, query: &str) -> Result<Vec<T>, StoreError> {
        let url = format!("{}?{}", self.rest_url(table), query);
        let response = self.authed(self.client.get(&url)).send().await?;
        Self::check(response).await?.json().await.map_err(StoreError::Parse)
    }

    async fn get_one<T: DeserializeOwned>(&self, table: &str, query: &str) -> Result<Option<T>, StoreError> {
        let url = format!("{}?{}", self.rest_url(table), query);
        let response = self
            .authed(self.client.get(&url))
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await?;

        // PostgREST answers 406 when the single-object query matched no row
        if response.status() == StatusCode::NOT_ACCEPTABLE {
            return Ok(None);
        }
        Self::check(response).await?.json().await.map(Some).map_err(StoreError::Parse)
    }

    async fn insert<T: Serialize>(&self, table: &str, data: &T) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.post(self.rest_url(table)))
            .header("Prefer", "return=minimal")
            .json(data)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn update<T: Serialize>(&self, table: &str, query: &str, data: &T) -> Result<(), StoreError> {
        let url = format!("{}?{}", self.rest_url(table), query);
        let response = self.authed(self.client.patch(&url)).json(data).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn load(&self, id: RoomId) -> Result<GameRoom, StoreError> {
        RoomStore::get(self, id).await?.ok_or(StoreError::RoomMissing(id))
    }

    async fn write_players(&self, room: &GameRoom) -> Result<(), StoreError> {
        let players = serde_json::to_value(&room.players)?;
        self.update(ROOMS_TABLE, &room_query(room.id), &json!({ "players": players }))
            .await
    }
}

fn room_query(id: RoomId) -> String {
    format!("id=eq.{}", id)
}

fn active_code_query(code: &str) -> String {
    format!("join_code=eq.{}&phase=neq.ended", code)
}

fn events_after_query(id: RoomId, after_seq: i64) -> String {
    format!("room_id=eq.{}&seq=gt.{}&order=seq.asc", id, after_seq)
}

fn latest_seq_query(id: RoomId) -> String {
    format!("room_id=eq.{}&select=seq&order=seq.desc&limit=1", id)
}

#[derive(Debug, Deserialize)]
struct SeqRow {
    seq: i64,
}

/// An event row as stored, with its feed position
#[derive(Debug, Deserialize)]
struct EventRow {
    seq: i64,
    #[serde(flatten)]
    event: GameEvent,
}

impl RoomStore for RestStore {
    async fn create(&self, room: &GameRoom) -> Result<RoomId, StoreError> {
        self.insert(ROOMS_TABLE, room).await?;
        debug!(room_id = %room.id, "Room row inserted");
        Ok(room.id)
    }

    async fn get(&self, id: RoomId) -> Result<Option<GameRoom>, StoreError> {
        self.get_one(ROOMS_TABLE, &room_query(id)).await
    }

    async fn get_by_join_code(&self, code: &str) -> Result<Option<GameRoom>, StoreError> {
        self.get_one(ROOMS_TABLE, &active_code_query(code)).await
    }

    async fn join(&self, id: RoomId, player: &Player) -> Result<(), StoreError> {
        let mut room = self.load(id).await?;
        if room.players.contains_key(&player.id) {
            return Ok(());
        }
        room.players.insert(player.id, player.clone());
        self.write_players(&room).await
    }

    async fn leave(&self, id: RoomId, player: PlayerId) -> Result<(), StoreError> {
        let Some(mut room) = RoomStore::get(self, id).await? else {
            return Ok(());
        };
        if room.players.remove(&player).is_none() {
            return Ok(());
        }
        self.write_players(&room).await
    }

    async fn update_member(&self, id: RoomId, player: &Player) -> Result<(), StoreError> {
        let mut room = self.load(id).await?;
        if room.update_member(player.clone()) {
            self.write_players(&room).await?;
        }
        Ok(())
    }

    async fn set_phase(&self, id: RoomId, phase: RoomPhase) -> Result<(), StoreError> {
        self.update(ROOMS_TABLE, &room_query(id), &json!({ "phase": phase }))
            .await
    }

    async fn subscribe(&self, id: RoomId) -> Result<Subscription<GameRoom>, StoreError> {
        let mut last = self.load(id).await?;
        let store = self.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.poll_interval);
            loop {
                ticker.tick().await;
                match RoomStore::get(&store, id).await {
                    Ok(Some(room)) if room != last => {
                        last = room.clone();
                        if tx.send(room).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!(room_id = %id, error = %e, "Room poll failed"),
                }
            }
        });
        Ok(Subscription::new(rx, task))
    }

    async fn publish_event(&self, _id: RoomId, event: &GameEvent) -> Result<(), StoreError> {
        self.insert(EVENTS_TABLE, event).await
    }

    async fn subscribe_events(&self, id: RoomId) -> Result<Subscription<GameEvent>, StoreError> {
        // Start after whatever the feed already holds
        let mut after = self
            .get_rows::<SeqRow>(EVENTS_TABLE, &latest_seq_query(id))
            .await?
            .first()
            .map_or(0, |row| row.seq);
        let store = self.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.poll_interval);
            loop {
                ticker.tick().await;
                let query = events_after_query(id, after);
                match store.get_rows::<EventRow>(EVENTS_TABLE, &query).await {
                    Ok(rows) => {
                        for row in rows {
                            after = after.max(row.seq);
                            if tx.send(row.event).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => warn!(room_id = %id, error = %e, "Event poll failed"),
                }
            }
        });
        Ok(Subscription::new(rx, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_and_queries_follow_postgrest_syntax() {
        let store = RestStore::new("https://db.example.com/", "key");
        assert_eq!(store.rest_url(ROOMS_TABLE), "https://db.example.com/rest/v1/game_rooms");

        let id = RoomId::new();
        assert_eq!(room_query(id), format!("id=eq.{}", id));
        assert_eq!(active_code_query("ABC123"), "join_code=eq.ABC123&phase=neq.ended");
        assert_eq!(
            latest_seq_query(id),
            format!("room_id=eq.{}&select=seq&order=seq.desc&limit=1", id)
        );
    }

    #[test]
    fn event_polls_page_by_store_sequence() {
        let id = RoomId::new();
        let query = events_after_query(id, 42);
        assert_eq!(query, format!("room_id=eq.{}&seq=gt.42&order=seq.asc", id));
        assert!(!query.contains("timestamp"));
    }

    #[test]
    fn event_rows_carry_their_sequence() {
        let event = GameEvent::new(
            RoomId::new(),
            PlayerId::new(),
            crate::sync::EventPayload::RoomState {
                phase: RoomPhase::Playing,
            },
        );
        let mut row = serde_json::to_value(&event).unwrap();
        // Publisher clock far behind the reader's must not matter
        row["timestamp"] = json!(1);
        row["seq"] = json!(7);

        let parsed: EventRow = serde_json::from_value(row).unwrap();
        assert_eq!(parsed.seq, 7);
        assert_eq!(parsed.event.id, event.id);
        assert_eq!(parsed.event.timestamp, 1);
    }

    #[test]
    fn poll_interval_is_configurable() {
        let store = RestStore::new("http://localhost", "key").with_poll_interval(Duration::from_secs(1));
        assert_eq!(store.poll_interval, Duration::from_secs(1));
    }
}
