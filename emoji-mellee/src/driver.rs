use crate::cpu::CpuPlayer;
use crate::game::{Duel, DuelEvent};
use crate::history::RoundResultSink;
use crate::rng::DuelRng;
use crate::schedule::{Deferred, Delays, Schedule};
use crate::types::{BattleMode, Card, Phase, Side};
use log::{debug, warn};
use std::time::Instant;

// Runs a duel against a clock. The driver owns the duel, its randomness and the schedule of
// deferred callbacks; callers feed it input and call `advance` whenever a deadline passes.
// Time is always passed in, so tests drive it with synthetic instants.

pub struct DuelDriver {
    duel: Duel,
    rng: DuelRng,
    cards: Vec<Card>,
    cpu: Option<CpuPlayer>,
    schedule: Schedule,
    delays: Delays,
}

impl DuelDriver {
    pub fn new(mode: BattleMode, cards: Vec<Card>, rng: DuelRng) -> Self {
        Self {
            duel: Duel::new(mode),
            rng,
            cards,
            cpu: None,
            schedule: Schedule::new(),
            delays: Delays::default(),
        }
    }

    pub fn with_cpu(mut self, cpu: CpuPlayer) -> Self {
        self.cpu = Some(cpu);
        self
    }

    pub fn with_delays(mut self, delays: Delays) -> Self {
        self.delays = delays;
        self
    }

    pub fn duel(&self) -> &Duel {
        &self.duel
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn rng(&self) -> &DuelRng {
        &self.rng
    }

    pub fn cpu_side(&self) -> Option<Side> {
        self.cpu.as_ref().map(|c| c.side())
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.schedule.next_due()
    }

    pub fn start(&mut self, now: Instant) -> Vec<DuelEvent> {
        let events = self.duel.start(&mut self.rng);
        self.after(events, now)
    }

    pub fn toggle(&mut self, now: Instant) -> Vec<DuelEvent> {
        let events = self.duel.toggle(&mut self.rng);
        self.after(events, now)
    }

    pub fn select_symbol(&mut self, side: Side, symbol: &str, now: Instant) -> Vec<DuelEvent> {
        if self.cpu_side() == Some(side) {
            debug!("ignoring typed symbol for the cpu side");
            return vec![];
        }
        let events = self.duel.select_symbol(side, symbol, &self.cards);
        self.after(events, now)
    }

    pub fn clear_symbols(&mut self, side: Side, now: Instant) -> Vec<DuelEvent> {
        let events = self.duel.clear_symbols(side);
        self.after(events, now)
    }

    /// Hard reset. Every pending callback from the old match is dropped.
    pub fn new_match(&mut self, now: Instant) -> Vec<DuelEvent> {
        self.schedule.cancel_all();
        let events = self.duel.new_match();
        self.after(events, now)
    }

    /// Fires every callback due at `now`, in deadline order. Resolved rounds go to `sink`.
    pub fn advance(&mut self, now: Instant, sink: &mut dyn RoundResultSink) -> Vec<DuelEvent> {
        let mut events = Vec::new();
        while let Some(pending) = self.schedule.pop_due(now) {
            let produced = match pending.action {
                Deferred::Tick => self.duel.tick(),
                Deferred::CpuSummon => self.cpu_summon(),
                Deferred::Resolve => self.duel.resolve(),
                Deferred::FinishRound => self.duel.finish_round(&mut self.rng),
            };
            for event in &produced {
                if let DuelEvent::RoundResolved(result) = event {
                    if let Err(e) = sink.record_round(result.clone()) {
                        warn!("round result not recorded: {}", e);
                    }
                }
            }
            events.extend(self.after(produced, pending.due));
        }
        events
    }

    fn cpu_summon(&mut self) -> Vec<DuelEvent> {
        let Some(cpu) = &self.cpu else {
            return vec![];
        };
        let side = cpu.side();
        let Some(card) = cpu.choose(&mut self.rng).cloned() else {
            return vec![];
        };
        self.duel.summon(side, &card)
    }

    fn after(&mut self, events: Vec<DuelEvent>, now: Instant) -> Vec<DuelEvent> {
        for event in &events {
            // A fresh turn gets a full first second.
            if matches!(event, DuelEvent::TurnPassed { .. }) {
                self.schedule.disarm(Deferred::Tick);
            }
            if let Some((delay, action)) = self.delays.follow_up(event) {
                self.schedule.arm(now, delay, action);
            }
        }
        self.reconcile(now);
        events
    }

    // Keeps the countdown and the cpu's think callback armed exactly while they can act.
    fn reconcile(&mut self, now: Instant) {
        let clock_live =
            self.duel.running && !self.duel.paused && self.duel.phase == Phase::AwaitingInput;
        if clock_live {
            if !self.schedule.is_armed(Deferred::Tick) {
                self.schedule.arm(now, self.delays.tick, Deferred::Tick);
            }
        } else {
            self.schedule.disarm(Deferred::Tick);
        }

        if let Some(cpu) = &self.cpu {
            if self.duel.accepts_input_from(cpu.side()) && !cpu.pool().is_empty() {
                if !self.schedule.is_armed(Deferred::CpuSummon) {
                    let delay = cpu.think_delay(&mut self.rng);
                    debug!("cpu thinking for {:?}", delay);
                    self.schedule.arm(now, delay, Deferred::CpuSummon);
                }
            } else {
                self.schedule.disarm(Deferred::CpuSummon);
            }
        }
    }
}
