use crate::error::Result;
use crate::game::Duel;
use crate::types::{LobbyInfo, PlayerInfo};
use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Wire-level message shapes for the relay channels. Frames are JSON text; the relay forwards
// them untouched to every other peer on the same channel.

/// The host's canonical view of an online match, sent whole on every change.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OnlineState {
    pub game_id: String,
    pub host_id: String,
    pub guest_id: Option<String>,
    pub players: BTreeMap<String, PlayerInfo>,
    pub duel: Duel,
    pub last_update: u64,
}

impl OnlineState {
    pub fn pseudonym_of(&self, id: Option<&str>) -> Option<&str> {
        id.and_then(|id| self.players.get(id))
            .map(|p| p.pseudonym.as_str())
    }

    pub fn host_pseudonym(&self) -> Option<&str> {
        self.pseudonym_of(Some(&self.host_id))
    }

    pub fn guest_pseudonym(&self) -> Option<&str> {
        self.pseudonym_of(self.guest_id.as_deref())
    }
}

/// Intents a guest may send. The host is the only peer that acts on them.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuestAction {
    Join(PlayerInfo),
    EmojiSelect(String),
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Heartbeat {
    Ping,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum GameFrame {
    State { state: Box<OnlineState> },
    Action { action: GuestAction },
    Heartbeat(Heartbeat),
}

impl GameFrame {
    pub fn state(state: OnlineState) -> Self {
        GameFrame::State {
            state: Box::new(state),
        }
    }

    pub fn action(action: GuestAction) -> Self {
        GameFrame::Action { action }
    }

    pub fn ping() -> Self {
        GameFrame::Heartbeat(Heartbeat::Ping)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct LobbyBroadcast {
    pub lobbies: Vec<LobbyInfo>,
}

pub fn encode<T: Serialize>(frame: &T) -> Result<String> {
    Ok(serde_json::to_string(frame)?)
}

/// Parses a game channel frame. Anything unrecognised is logged and dropped.
pub fn decode_game_frame(text: &str) -> Option<GameFrame> {
    match serde_json::from_str(text) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!("dropping malformed game frame: {}", e);
            None
        }
    }
}

pub fn decode_lobby_frame(text: &str) -> Option<LobbyBroadcast> {
    if serde_json::from_str::<Heartbeat>(text).is_ok() {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!("dropping malformed lobby frame: {}", e);
            None
        }
    }
}

/// Short random match id like `g-k3x9a`.
pub fn new_game_id(rng: &mut impl Rng) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let suffix: String = (0..5)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("g-{}", suffix)
}

pub fn game_channel_url(prefix: &str, game_id: &str) -> String {
    format!("{}{}", prefix, game_id)
}
