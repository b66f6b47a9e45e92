use crate::rng::DuelRng;
use crate::types::{Card, Side};
use log::debug;
use std::time::Duration;

// Computer opponent for solo duels. It never enters symbols; after a short think it summons a
// random card straight from its pool.

#[derive(Clone, Debug)]
pub struct CpuPlayer {
    side: Side,
    pool: Vec<Card>,
}

impl CpuPlayer {
    pub fn new(side: Side, pool: Vec<Card>) -> Self {
        Self { side, pool }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn pool(&self) -> &[Card] {
        &self.pool
    }

    pub fn think_delay(&self, rng: &mut DuelRng) -> Duration {
        Duration::from_millis(rng.think_delay_ms())
    }

    /// Uniform pick from the pool. An empty pool means the CPU never acts.
    pub fn choose(&self, rng: &mut DuelRng) -> Option<&Card> {
        let card = rng.pick_index(self.pool.len()).map(|i| &self.pool[i]);
        if let Some(card) = card {
            debug!("cpu picks {}", card.name);
        }
        card
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_roster;
    use crate::constants::{CPU_THINK_MAX_MS, CPU_THINK_MIN_MS};

    #[test]
    fn think_delay_stays_in_window() {
        let cpu = CpuPlayer::new(Side::Opponent, default_roster());
        let mut rng = DuelRng::new(11);
        for _ in 0..200 {
            let delay = cpu.think_delay(&mut rng).as_millis() as u64;
            assert!((CPU_THINK_MIN_MS..=CPU_THINK_MAX_MS).contains(&delay));
        }
    }

    #[test]
    fn picks_from_pool_or_nothing() {
        let roster = default_roster();
        let cpu = CpuPlayer::new(Side::Opponent, roster.clone());
        let mut rng = DuelRng::new(3);
        let card = cpu.choose(&mut rng).unwrap();
        assert!(roster.iter().any(|c| c.id == card.id));

        let idle = CpuPlayer::new(Side::Opponent, vec![]);
        assert!(idle.choose(&mut rng).is_none());
    }
}
