use crate::catalog::{find_by_combination, symbol_count};
use crate::constants::{MAX_SYMBOLS, STARTING_HP, TURN_SECONDS};
use crate::rng::DuelRng;
use crate::types::*;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// Duel state and its transitions. Every transition is instantaneous and returns the events it
// produced; staging them on screen (lunges, banners, round pauses) belongs to the scheduler.

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Duel {
    pub mode: BattleMode,
    pub player_hp: u32,
    pub opponent_hp: u32,
    pub player_symbols: String,
    pub opponent_symbols: String,
    pub player_card: Option<BattleCard>,
    pub opponent_card: Option<BattleCard>,
    pub active_side: Option<Side>,
    pub countdown: u32,
    pub phase: Phase,
    pub running: bool,
    pub paused: bool,
    pub round: u32,
    pub message: Option<String>,
    pub winner: Option<Side>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DuelEvent {
    Started { active: Side },
    Paused,
    Resumed,
    Tick { remaining: u32 },
    TurnPassed { active: Side },
    SymbolAccepted { side: Side, symbols: String },
    SymbolsCleared { side: Side },
    CardSummoned { side: Side, card_id: String },
    CombatReady,
    RoundResolved(RoundResult),
    TimeoutAttack { attacker: Side, damage: u32, remaining_hp: u32 },
    RoundReset { active: Side },
    MatchEnded { winner: Side },
    Reset,
}

/// Outcome of two energies meeting. The survivor keeps the difference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Clash {
    FirstWins(u32),
    SecondWins(u32),
    Draw,
}

pub fn clash(first: u32, second: u32) -> Clash {
    if first > second {
        Clash::FirstWins(first - second)
    } else if second > first {
        Clash::SecondWins(second - first)
    } else {
        Clash::Draw
    }
}

impl Duel {
    pub fn new(mode: BattleMode) -> Self {
        Self {
            mode,
            player_hp: STARTING_HP,
            opponent_hp: STARTING_HP,
            player_symbols: String::new(),
            opponent_symbols: String::new(),
            player_card: None,
            opponent_card: None,
            active_side: None,
            countdown: TURN_SECONDS,
            phase: Phase::AwaitingInput,
            running: false,
            paused: false,
            round: 1,
            message: None,
            winner: None,
        }
    }

    pub fn hp(&self, side: Side) -> u32 {
        match side {
            Side::Player => self.player_hp,
            Side::Opponent => self.opponent_hp,
        }
    }

    fn hp_mut(&mut self, side: Side) -> &mut u32 {
        match side {
            Side::Player => &mut self.player_hp,
            Side::Opponent => &mut self.opponent_hp,
        }
    }

    pub fn symbols(&self, side: Side) -> &str {
        match side {
            Side::Player => &self.player_symbols,
            Side::Opponent => &self.opponent_symbols,
        }
    }

    fn symbols_mut(&mut self, side: Side) -> &mut String {
        match side {
            Side::Player => &mut self.player_symbols,
            Side::Opponent => &mut self.opponent_symbols,
        }
    }

    pub fn card(&self, side: Side) -> Option<&BattleCard> {
        match side {
            Side::Player => self.player_card.as_ref(),
            Side::Opponent => self.opponent_card.as_ref(),
        }
    }

    fn card_slot(&mut self, side: Side) -> &mut Option<BattleCard> {
        match side {
            Side::Player => &mut self.player_card,
            Side::Opponent => &mut self.opponent_card,
        }
    }

    pub fn is_over(&self) -> bool {
        self.phase == Phase::MatchEnd
    }

    /// True while `side` may add symbols or summon: its turn, clock live, nothing summoned yet.
    pub fn accepts_input_from(&self, side: Side) -> bool {
        self.running
            && !self.paused
            && self.phase == Phase::AwaitingInput
            && self.active_side == Some(side)
            && self.card(side).is_none()
    }

    pub fn start(&mut self, rng: &mut DuelRng) -> Vec<DuelEvent> {
        if self.running || self.is_over() {
            return vec![];
        }
        let active = rng.side();
        self.running = true;
        self.paused = false;
        self.active_side = Some(active);
        self.countdown = TURN_SECONDS;
        info!("duel started, {} moves first", active.label());
        vec![DuelEvent::Started { active }]
    }

    pub fn pause(&mut self) -> Vec<DuelEvent> {
        if !self.running || self.paused {
            return vec![];
        }
        self.paused = true;
        vec![DuelEvent::Paused]
    }

    pub fn resume(&mut self) -> Vec<DuelEvent> {
        if !self.running || !self.paused {
            return vec![];
        }
        self.paused = false;
        vec![DuelEvent::Resumed]
    }

    /// Single start/pause/resume control.
    pub fn toggle(&mut self, rng: &mut DuelRng) -> Vec<DuelEvent> {
        if !self.running {
            self.start(rng)
        } else if self.paused {
            self.resume()
        } else {
            self.pause()
        }
    }

    pub fn new_match(&mut self) -> Vec<DuelEvent> {
        *self = Duel::new(self.mode);
        vec![DuelEvent::Reset]
    }

    pub fn tick(&mut self) -> Vec<DuelEvent> {
        if !self.running || self.paused || self.phase != Phase::AwaitingInput {
            return vec![];
        }
        let Some(active) = self.active_side else {
            return vec![];
        };
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown > 0 {
            return vec![DuelEvent::Tick {
                remaining: self.countdown,
            }];
        }
        let mut events = vec![DuelEvent::Tick { remaining: 0 }];
        events.extend(self.handle_timeout(active));
        events
    }

    fn handle_timeout(&mut self, timed_out: Side) -> Vec<DuelEvent> {
        let attacker = timed_out.other();
        let waiting = match (self.card(timed_out), self.card(attacker)) {
            (None, Some(card)) => Some(card.clone()),
            _ => None,
        };
        let Some(card) = waiting else {
            self.active_side = Some(attacker);
            self.countdown = TURN_SECONDS;
            debug!("{} timed out with no card waiting, turn passes", timed_out.label());
            return vec![DuelEvent::TurnPassed { active: attacker }];
        };

        let damage = card.current_energy;
        let hp = self.hp_mut(timed_out);
        *hp = hp.saturating_sub(damage);
        let remaining_hp = *hp;
        info!(
            "{} attacks on time for {}, {} left at {}",
            card.card.name,
            damage,
            timed_out.label(),
            remaining_hp
        );
        self.message = Some(format!("{} attacks on time!", card.card.name));
        let mut events = vec![DuelEvent::TimeoutAttack {
            attacker,
            damage,
            remaining_hp,
        }];
        if remaining_hp == 0 {
            events.extend(self.end_match(attacker));
        } else {
            self.phase = Phase::RoundEnd;
        }
        events
    }

    pub fn select_symbol(&mut self, side: Side, symbol: &str, cards: &[Card]) -> Vec<DuelEvent> {
        if !self.accepts_input_from(side) {
            debug!("ignoring symbol from {} out of turn", side.label());
            return vec![];
        }
        if symbol.is_empty() || symbol_count(self.symbols(side)) + symbol_count(symbol) > MAX_SYMBOLS
        {
            debug!("ignoring symbol {:?} from {}, sequence full", symbol, side.label());
            return vec![];
        }
        self.symbols_mut(side).push_str(symbol);
        let symbols = self.symbols(side).to_string();
        let mut events = vec![DuelEvent::SymbolAccepted {
            side,
            symbols: symbols.clone(),
        }];
        if let Some(card) = find_by_combination(cards, &symbols) {
            events.extend(self.place_card(side, card));
        }
        events
    }

    pub fn clear_symbols(&mut self, side: Side) -> Vec<DuelEvent> {
        if !self.accepts_input_from(side) || self.symbols(side).is_empty() {
            return vec![];
        }
        self.symbols_mut(side).clear();
        vec![DuelEvent::SymbolsCleared { side }]
    }

    /// Direct summon used by the CPU, skipping symbol entry.
    pub fn summon(&mut self, side: Side, card: &Card) -> Vec<DuelEvent> {
        if !self.accepts_input_from(side) {
            return vec![];
        }
        *self.symbols_mut(side) = card.summon_key().unwrap_or("???").to_string();
        self.place_card(side, card)
    }

    fn place_card(&mut self, side: Side, card: &Card) -> Vec<DuelEvent> {
        *self.card_slot(side) = Some(BattleCard::summon(card));
        let mut events = vec![DuelEvent::CardSummoned {
            side,
            card_id: card.id.clone(),
        }];
        if self.card(side.other()).is_some() {
            self.phase = Phase::Resolving;
            events.push(DuelEvent::CombatReady);
        } else {
            let next = side.other();
            self.active_side = Some(next);
            self.countdown = TURN_SECONDS;
            events.push(DuelEvent::TurnPassed { active: next });
        }
        events
    }

    pub fn resolve(&mut self) -> Vec<DuelEvent> {
        if self.phase != Phase::Resolving {
            return vec![];
        }
        let (Some(first), Some(second)) = (self.player_card.clone(), self.opponent_card.clone())
        else {
            return vec![];
        };

        let winner_id = match clash(first.current_energy, second.current_energy) {
            Clash::FirstWins(left) => {
                self.player_card = Some(BattleCard {
                    current_energy: left,
                    ..first.clone()
                });
                self.opponent_card = None;
                self.message = Some(format!("{} wins the round!", first.card.name));
                Some(first.card.id.clone())
            }
            Clash::SecondWins(left) => {
                self.opponent_card = Some(BattleCard {
                    current_energy: left,
                    ..second.clone()
                });
                self.player_card = None;
                self.message = Some(format!("{} wins the round!", second.card.name));
                Some(second.card.id.clone())
            }
            Clash::Draw => {
                self.player_card = None;
                self.opponent_card = None;
                self.message = Some("Draw! Both cards are destroyed.".to_string());
                None
            }
        };
        self.phase = Phase::RoundEnd;
        info!(
            "round {} resolved: {} ({}) vs {} ({})",
            self.round,
            first.card.name,
            first.current_energy,
            second.card.name,
            second.current_energy
        );
        vec![DuelEvent::RoundResolved(RoundResult {
            fighter1: first.card,
            fighter2: second.card,
            winner_id,
            mode: self.mode,
        })]
    }

    pub fn finish_round(&mut self, rng: &mut DuelRng) -> Vec<DuelEvent> {
        if self.phase != Phase::RoundEnd {
            return vec![];
        }
        if self.player_hp == 0 {
            return self.end_match(Side::Opponent);
        }
        if self.opponent_hp == 0 {
            return self.end_match(Side::Player);
        }
        let active = rng.side();
        self.player_symbols.clear();
        self.opponent_symbols.clear();
        self.player_card = None;
        self.opponent_card = None;
        self.message = None;
        self.phase = Phase::AwaitingInput;
        self.running = true;
        self.paused = false;
        self.active_side = Some(active);
        self.countdown = TURN_SECONDS;
        self.round += 1;
        vec![DuelEvent::RoundReset { active }]
    }

    fn end_match(&mut self, winner: Side) -> Vec<DuelEvent> {
        self.phase = Phase::MatchEnd;
        self.winner = Some(winner);
        self.running = false;
        self.active_side = None;
        self.message = Some(format!("{} is the Supreme Winner!", winner.label()));
        info!("match over after {} rounds, {} wins", self.round, winner.label());
        vec![DuelEvent::MatchEnded { winner }]
    }

    pub fn state_hash(&self) -> StateHash {
        let mut hasher = Sha256::new();
        let data = serde_json::to_vec(self).unwrap_or_default();
        hasher.update(data);
        StateHash {
            round: self.round,
            hash: format!("{:x}", hasher.finalize()),
        }
    }
}

/// Simulator fight between two album cards at their current energies.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulatedFight {
    pub fighter1: BattleCard,
    pub fighter2: BattleCard,
    pub winner_id: Option<String>,
}

pub fn simulate(fighter1: &BattleCard, fighter2: &BattleCard) -> SimulatedFight {
    let (first_left, second_left, winner_id) =
        match clash(fighter1.current_energy, fighter2.current_energy) {
            Clash::FirstWins(left) => (left, 0, Some(fighter1.card.id.clone())),
            Clash::SecondWins(left) => (0, left, Some(fighter2.card.id.clone())),
            Clash::Draw => (0, 0, None),
        };
    SimulatedFight {
        fighter1: BattleCard {
            current_energy: first_left,
            ..fighter1.clone()
        },
        fighter2: BattleCard {
            current_energy: second_left,
            ..fighter2.clone()
        },
        winner_id,
    }
}

pub fn validate_state_hash(duel: &Duel, remote: &StateHash) -> bool {
    let local = duel.state_hash();
    local.round == remote.round && local.hash == remote.hash
}
