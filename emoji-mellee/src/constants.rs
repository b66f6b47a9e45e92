// Core tuning constants for the duel, the album and the relay. Kept in one place so the
// state machine, the scheduler and the sync layer agree on them.
pub const GAME_NAME: &str = "Emoji Mellee";
pub const STARTING_HP: u32 = 2000;
pub const TURN_SECONDS: u32 = 60;
pub const MAX_SYMBOLS: usize = 3;
pub const MAX_DECK_SIZE: usize = 50;

// Presentation delays, in milliseconds.
pub const TICK_MS: u64 = 1000;
pub const COMBAT_LEAD_MS: u64 = 1500;
pub const ROUND_DISPLAY_MS: u64 = 3000;
pub const TIMEOUT_DISPLAY_MS: u64 = 2500;
pub const CPU_THINK_MIN_MS: u64 = 1500;
pub const CPU_THINK_MAX_MS: u64 = 3000;

// Relay defaults.
pub const GAME_WS_URL_PREFIX: &str = "wss://pico-db.fly.dev/emoji-mellee-game-v4-";
pub const LOBBY_WS_URL: &str = "wss://pico-db.fly.dev/emoji-mellee-lobby-v4";
pub const HEARTBEAT_SECS: u64 = 25;
pub const LOBBY_STALE_MS: u64 = 30_000;
pub const RECONNECT_BASE_MS: u64 = 1000;
pub const RECONNECT_MAX_MS: u64 = 30_000;
pub const RECONNECT_MAX_ATTEMPTS: u32 = 5;

// Local store keys.
pub const KEY_SAVED_CARDS: &str = "savedCards";
pub const KEY_CARD_ENERGIES: &str = "cardEnergies";
pub const KEY_DECK: &str = "deck";
pub const KEY_BATTLE_HISTORY: &str = "battleHistory";
pub const KEY_PSEUDONYM: &str = "pseudonym";
