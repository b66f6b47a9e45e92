use crate::constants::*;
use crate::game::DuelEvent;
use std::time::{Duration, Instant};

// Deferred callbacks around the duel: the one-second countdown, CPU thinking, and the pauses
// that let a clash or a timeout banner stay on screen before the next transition.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deferred {
    Tick,
    CpuSummon,
    Resolve,
    FinishRound,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pending {
    pub due: Instant,
    pub generation: u64,
    pub action: Deferred,
}

/// Timings between a transition and the follow-up it needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delays {
    pub tick: Duration,
    pub combat_lead: Duration,
    pub round_display: Duration,
    pub timeout_display: Duration,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(TICK_MS),
            combat_lead: Duration::from_millis(COMBAT_LEAD_MS),
            round_display: Duration::from_millis(ROUND_DISPLAY_MS),
            timeout_display: Duration::from_millis(TIMEOUT_DISPLAY_MS),
        }
    }
}

impl Delays {
    pub fn follow_up(&self, event: &DuelEvent) -> Option<(Duration, Deferred)> {
        match event {
            DuelEvent::CombatReady => Some((self.combat_lead, Deferred::Resolve)),
            DuelEvent::RoundResolved(_) => Some((self.round_display, Deferred::FinishRound)),
            DuelEvent::TimeoutAttack { remaining_hp, .. } if *remaining_hp > 0 => {
                Some((self.timeout_display, Deferred::FinishRound))
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Schedule {
    generation: u64,
    pending: Vec<Pending>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, now: Instant, delay: Duration, action: Deferred) -> Pending {
        let pending = Pending {
            due: now + delay,
            generation: self.generation,
            action,
        };
        self.pending.push(pending);
        pending
    }

    pub fn is_armed(&self, action: Deferred) -> bool {
        self.pending.iter().any(|p| p.action == action)
    }

    pub fn disarm(&mut self, action: Deferred) {
        self.pending.retain(|p| p.action != action);
    }

    /// Drops everything and invalidates callbacks armed before this call.
    pub fn cancel_all(&mut self) {
        self.generation += 1;
        self.pending.clear();
    }

    pub fn is_current(&self, pending: &Pending) -> bool {
        pending.generation == self.generation
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.due).min()
    }

    /// Removes and returns the earliest callback due at `now`, if any.
    pub fn pop_due(&mut self, now: Instant) -> Option<Pending> {
        let (index, _) = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= now)
            .min_by_key(|(_, p)| p.due)?;
        let pending = self.pending.remove(index);
        if self.is_current(&pending) {
            Some(pending)
        } else {
            self.pop_due(now)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_callbacks_pop_in_deadline_order() {
        let start = Instant::now();
        let mut schedule = Schedule::new();
        schedule.arm(start, Duration::from_millis(3000), Deferred::FinishRound);
        schedule.arm(start, Duration::from_millis(1000), Deferred::Tick);
        schedule.arm(start, Duration::from_millis(1500), Deferred::Resolve);
        assert_eq!(schedule.next_due(), Some(start + Duration::from_millis(1000)));

        let now = start + Duration::from_millis(2000);
        assert_eq!(schedule.pop_due(now).map(|p| p.action), Some(Deferred::Tick));
        assert_eq!(schedule.pop_due(now).map(|p| p.action), Some(Deferred::Resolve));
        assert!(schedule.pop_due(now).is_none());
        assert!(schedule.is_armed(Deferred::FinishRound));
    }

    #[test]
    fn cancel_invalidates_armed_callbacks() {
        let start = Instant::now();
        let mut schedule = Schedule::new();
        let stale = schedule.arm(start, Duration::from_millis(10), Deferred::CpuSummon);
        schedule.cancel_all();
        assert!(!schedule.is_current(&stale));
        assert!(schedule.next_due().is_none());
        assert!(schedule.pop_due(start + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn follow_ups_match_presentation_delays() {
        let delays = Delays::default();
        assert_eq!(
            delays.follow_up(&DuelEvent::CombatReady),
            Some((Duration::from_millis(COMBAT_LEAD_MS), Deferred::Resolve))
        );
        let lethal = DuelEvent::TimeoutAttack {
            attacker: crate::types::Side::Player,
            damage: 2000,
            remaining_hp: 0,
        };
        assert_eq!(delays.follow_up(&lethal), None);
        assert_eq!(delays.follow_up(&DuelEvent::Paused), None);
    }
}
