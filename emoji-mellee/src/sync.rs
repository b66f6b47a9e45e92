use crate::driver::DuelDriver;
use crate::error::Result;
use crate::game::DuelEvent;
use crate::history::RoundResultSink;
use crate::net::{decode_game_frame, encode, GameFrame, GuestAction, OnlineState};
use crate::rng::DuelRng;
use crate::types::{unix_millis, BattleMode, Card, LobbyInfo, LobbyStatus, PlayerInfo, Side};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::time::Instant;

// Host-authoritative sync for online duels. The host runs every transition and sends the full
// state after each change; the guest only sends intents and mirrors whatever state arrives.

/// Outbound half of a relay connection.
pub trait Channel {
    fn send_text(&mut self, text: String) -> Result<()>;
}

impl Channel for Vec<String> {
    fn send_text(&mut self, text: String) -> Result<()> {
        self.push(text);
        Ok(())
    }
}

pub struct HostSession {
    game_id: String,
    me: PlayerInfo,
    guest: Option<PlayerInfo>,
    driver: DuelDriver,
    last_update: u64,
}

impl HostSession {
    /// The host always plays the player side and uses its own album as the summon catalog.
    pub fn new(game_id: impl Into<String>, me: PlayerInfo, cards: Vec<Card>, rng: DuelRng) -> Self {
        Self {
            game_id: game_id.into(),
            me,
            guest: None,
            driver: DuelDriver::new(BattleMode::Mellee, cards, rng),
            last_update: unix_millis(),
        }
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn guest(&self) -> Option<&PlayerInfo> {
        self.guest.as_ref()
    }

    pub fn driver(&self) -> &DuelDriver {
        &self.driver
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.driver.next_deadline()
    }

    pub fn state(&self) -> OnlineState {
        let mut players = BTreeMap::new();
        players.insert(self.me.id.clone(), self.me.clone());
        if let Some(guest) = &self.guest {
            players.insert(guest.id.clone(), guest.clone());
        }
        OnlineState {
            game_id: self.game_id.clone(),
            host_id: self.me.id.clone(),
            guest_id: self.guest.as_ref().map(|g| g.id.clone()),
            players,
            duel: self.driver.duel().clone(),
            last_update: self.last_update,
        }
    }

    /// This match as it should appear on the matchmaking board.
    pub fn listing(&self) -> LobbyInfo {
        LobbyInfo {
            game_id: self.game_id.clone(),
            host_display_name: self.me.pseudonym.clone(),
            status: if self.guest.is_some() {
                LobbyStatus::InProgress
            } else {
                LobbyStatus::Waiting
            },
            last_update: self.last_update,
        }
    }

    /// Announces the empty match once the channel is open.
    pub fn open(&mut self, channel: &mut dyn Channel) -> Result<()> {
        info!("hosting {}", self.game_id);
        self.broadcast(channel)
    }

    pub fn handle_text(
        &mut self,
        text: &str,
        now: Instant,
        channel: &mut dyn Channel,
    ) -> Result<Vec<DuelEvent>> {
        match decode_game_frame(text) {
            Some(GameFrame::Action { action }) => self.apply(action, now, channel),
            Some(GameFrame::State { .. }) => {
                debug!("host ignores foreign state frames");
                Ok(vec![])
            }
            Some(GameFrame::Heartbeat(_)) | None => Ok(vec![]),
        }
    }

    pub fn apply(
        &mut self,
        action: GuestAction,
        now: Instant,
        channel: &mut dyn Channel,
    ) -> Result<Vec<DuelEvent>> {
        let events = match action {
            GuestAction::Join(player) => {
                if self.guest.is_some() {
                    debug!("{} tried to join a full match", player.pseudonym);
                    return Ok(vec![]);
                }
                info!("{} joined {}", player.pseudonym, self.game_id);
                self.guest = Some(player);
                let events = self.driver.start(now);
                self.touch();
                self.broadcast(channel)?;
                return Ok(events);
            }
            GuestAction::EmojiSelect(symbol) => {
                self.driver.select_symbol(Side::Opponent, &symbol, now)
            }
        };
        self.commit(events, channel)
    }

    pub fn select_symbol(
        &mut self,
        symbol: &str,
        now: Instant,
        channel: &mut dyn Channel,
    ) -> Result<Vec<DuelEvent>> {
        let events = self.driver.select_symbol(Side::Player, symbol, now);
        self.commit(events, channel)
    }

    pub fn clear_symbols(&mut self, now: Instant, channel: &mut dyn Channel) -> Result<Vec<DuelEvent>> {
        let events = self.driver.clear_symbols(Side::Player, now);
        self.commit(events, channel)
    }

    /// Fires due callbacks (countdown, staged resolution, round reset) and shares the result.
    pub fn advance(
        &mut self,
        now: Instant,
        sink: &mut dyn RoundResultSink,
        channel: &mut dyn Channel,
    ) -> Result<Vec<DuelEvent>> {
        let events = self.driver.advance(now, sink);
        self.commit(events, channel)
    }

    fn touch(&mut self) {
        self.last_update = unix_millis().max(self.last_update + 1);
    }

    fn commit(&mut self, events: Vec<DuelEvent>, channel: &mut dyn Channel) -> Result<Vec<DuelEvent>> {
        if events.is_empty() {
            return Ok(events);
        }
        self.touch();
        self.broadcast(channel)?;
        Ok(events)
    }

    fn broadcast(&self, channel: &mut dyn Channel) -> Result<()> {
        let state = self.state();
        debug!("broadcast {} digest {}", self.game_id, state.duel.state_hash().hash);
        channel.send_text(encode(&GameFrame::state(state))?)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuestStatus {
    Joining,
    Playing,
    Disconnected,
}

pub struct GuestSession {
    game_id: String,
    me: PlayerInfo,
    view: Option<OnlineState>,
    status: GuestStatus,
}

impl GuestSession {
    pub fn new(game_id: impl Into<String>, me: PlayerInfo) -> Self {
        Self {
            game_id: game_id.into(),
            me,
            view: None,
            status: GuestStatus::Joining,
        }
    }

    /// The guest always plays the opponent side.
    pub fn side(&self) -> Side {
        Side::Opponent
    }

    pub fn status(&self) -> GuestStatus {
        self.status
    }

    pub fn view(&self) -> Option<&OnlineState> {
        self.view.as_ref()
    }

    pub fn join(&mut self, channel: &mut dyn Channel) -> Result<()> {
        info!("joining {} as {}", self.game_id, self.me.pseudonym);
        channel.send_text(encode(&GameFrame::action(GuestAction::Join(self.me.clone())))?)
    }

    pub fn is_my_turn(&self) -> bool {
        self.status == GuestStatus::Playing
            && self
                .view
                .as_ref()
                .is_some_and(|v| v.duel.accepts_input_from(self.side()))
    }

    /// Sends a symbol intent when the mirrored state says it is our move. Returns whether it was
    /// sent; the host still has the final say.
    pub fn submit_symbol(&mut self, symbol: &str, channel: &mut dyn Channel) -> Result<bool> {
        if !self.is_my_turn() {
            debug!("not our turn, keeping {:?}", symbol);
            return Ok(false);
        }
        channel.send_text(encode(&GameFrame::action(GuestAction::EmojiSelect(
            symbol.to_string(),
        )))?)?;
        Ok(true)
    }

    /// Replaces the whole view with any state frame received. Returns true when it changed.
    pub fn handle_text(&mut self, text: &str) -> bool {
        if self.status == GuestStatus::Disconnected {
            return false;
        }
        let Some(GameFrame::State { state }) = decode_game_frame(text) else {
            return false;
        };
        if state.game_id != self.game_id {
            warn!("state for {} arrived on {}", state.game_id, self.game_id);
            return false;
        }
        if let Some(guest) = state.guest_id.as_deref() {
            if guest != self.me.id {
                warn!("{} already has a guest", self.game_id);
            }
        }
        debug!(
            "mirrored round {} digest {}",
            state.duel.round,
            state.duel.state_hash().hash
        );
        if state.guest_id.as_deref() == Some(self.me.id.as_str()) {
            self.status = GuestStatus::Playing;
        }
        self.view = Some(*state);
        true
    }

    /// Losing the match channel ends the match for the guest.
    pub fn on_close(&mut self) {
        if self.status != GuestStatus::Disconnected {
            warn!("lost connection to {}", self.game_id);
        }
        self.status = GuestStatus::Disconnected;
    }
}
