use crate::constants::{CPU_THINK_MAX_MS, CPU_THINK_MIN_MS};
use crate::types::Side;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// All duel randomness flows through one seedable PCG stream: turn order, CPU card choice and
// CPU thinking time. Draws are logged so a seeded match can be replayed and checked.

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum RandomEventKind {
    ActiveSide,
    CpuCard,
    CpuDelay,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RandomEvent {
    pub draw: u64,
    pub bound: u64,
    pub result: u64,
    pub kind: RandomEventKind,
}

#[derive(Clone, Debug)]
pub struct DuelRng {
    seed: u64,
    rng: Pcg64Mcg,
    draws: u64,
    history: Vec<RandomEvent>,
}

impl DuelRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: pcg_from_seed(derive_seed(seed, "duel")),
            draws: 0,
            history: Vec::new(),
        }
    }

    pub fn from_entropy() -> Self {
        Self::new(rand::thread_rng().gen::<u64>())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn history(&self) -> &[RandomEvent] {
        &self.history
    }

    pub fn generate(&mut self, bound: u64, kind: RandomEventKind) -> u64 {
        if bound == 0 {
            return 0;
        }
        let result = self.rng.gen_range(0..bound);
        self.draws += 1;
        self.history.push(RandomEvent {
            draw: self.draws,
            bound,
            result,
            kind,
        });
        result
    }

    /// Fair coin between the two sides.
    pub fn side(&mut self) -> Side {
        if self.generate(2, RandomEventKind::ActiveSide) == 0 {
            Side::Player
        } else {
            Side::Opponent
        }
    }

    pub fn pick_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(self.generate(len as u64, RandomEventKind::CpuCard) as usize)
    }

    pub fn think_delay_ms(&mut self) -> u64 {
        let span = CPU_THINK_MAX_MS - CPU_THINK_MIN_MS;
        CPU_THINK_MIN_MS + self.generate(span + 1, RandomEventKind::CpuDelay)
    }
}

pub fn derive_seed(base: u64, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(base.to_le_bytes());
    hasher.update(label.as_bytes());
    let hash = hasher.finalize();
    let mut seed_bytes = [0u8; 8];
    seed_bytes.copy_from_slice(&hash[..8]);
    u64::from_le_bytes(seed_bytes)
}

pub fn pcg_from_seed(seed: u64) -> Pcg64Mcg {
    // Expand the u64 into 16 bytes to seed the PCG generator deterministically.
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    let digest = hasher.finalize();
    let mut seed_bytes = [0u8; 16];
    seed_bytes.copy_from_slice(&digest[..16]);
    Pcg64Mcg::from_seed(seed_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = DuelRng::new(7);
        let mut b = DuelRng::new(7);
        let sides_a: Vec<Side> = (0..16).map(|_| a.side()).collect();
        let sides_b: Vec<Side> = (0..16).map(|_| b.side()).collect();
        assert_eq!(sides_a, sides_b);
        assert_eq!(a.history(), b.history());
    }

    #[test]
    fn think_delay_stays_in_window() {
        let mut rng = DuelRng::new(3);
        for _ in 0..200 {
            let delay = rng.think_delay_ms();
            assert!((CPU_THINK_MIN_MS..=CPU_THINK_MAX_MS).contains(&delay));
        }
    }

    #[test]
    fn pick_index_handles_empty_pool() {
        let mut rng = DuelRng::new(1);
        assert_eq!(rng.pick_index(0), None);
        assert!(rng.history().is_empty());
        assert!(rng.pick_index(4).unwrap() < 4);
    }

    #[test]
    fn both_sides_come_up() {
        let mut rng = DuelRng::new(11);
        let sides: Vec<Side> = (0..64).map(|_| rng.side()).collect();
        assert!(sides.contains(&Side::Player));
        assert!(sides.contains(&Side::Opponent));
    }
}
