use serde::{Deserialize, Serialize};

// Shared data types for cards, duel sides and history records. Card templates stay immutable;
// the duel engine owns all per-match mutation through `BattleCard`.

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Player,
    Opponent,
}

impl Side {
    pub fn other(&self) -> Side {
        match self {
            Side::Player => Side::Opponent,
            Side::Opponent => Side::Player,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Side::Player => "Player 1",
            Side::Opponent => "Player 2",
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub name: String,
    pub ability: String,
    pub power: u32,
    pub energy: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Card {
    pub fn summon_key(&self) -> Option<&str> {
        self.combination.as_deref().filter(|c| !c.is_empty())
    }

    /// Copy of the card without its image reference, the shape kept in history and on the wire.
    pub fn without_image(&self) -> Card {
        Card {
            image: None,
            ..self.clone()
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BattleCard {
    pub card: Card,
    pub current_energy: u32,
}

impl BattleCard {
    pub fn summon(card: &Card) -> Self {
        Self {
            card: card.without_image(),
            current_energy: card.energy,
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Phase {
    AwaitingInput,
    Resolving,
    RoundEnd,
    MatchEnd,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BattleMode {
    Simulator,
    Mellee,
    Solo,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub fighter1: Card,
    pub fighter2: Card,
    pub winner_id: Option<String>,
    pub mode: BattleMode,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BattleRecord {
    pub id: String,
    pub fighter1: Card,
    pub fighter2: Card,
    pub winner_id: Option<String>,
    #[serde(default = "default_record_mode")]
    pub mode: BattleMode,
}

// Records written before modes existed were simulator fights.
fn default_record_mode() -> BattleMode {
    BattleMode::Simulator
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct PlayerInfo {
    pub id: String,
    pub pseudonym: String,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LobbyStatus {
    Waiting,
    InProgress,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LobbyInfo {
    pub game_id: String,
    pub host_display_name: String,
    pub status: LobbyStatus,
    pub last_update: u64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct StateHash {
    pub round: u32,
    pub hash: String,
}

pub fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
