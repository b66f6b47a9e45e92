use crate::constants::KEY_BATTLE_HISTORY;
use crate::error::Result;
use crate::store::{load_json, save_json, Storage};
use crate::types::{BattleMode, BattleRecord, RoundResult};

// Battle history: every resolved combat lands here, newest first.

/// Receiver for resolved combats. The duel engine never persists results itself.
pub trait RoundResultSink {
    fn record_round(&mut self, result: RoundResult) -> Result<BattleRecord>;
}

#[derive(Clone, Debug, Default)]
pub struct BattleHistory {
    records: Vec<BattleRecord>,
    last_stamp: u64,
    same_stamp: u32,
}

impl BattleHistory {
    pub fn load(store: &dyn Storage) -> Result<Self> {
        let records: Vec<BattleRecord> = load_json(store, KEY_BATTLE_HISTORY)?.unwrap_or_default();
        Ok(Self {
            records,
            ..Self::default()
        })
    }

    pub fn records(&self) -> &[BattleRecord] {
        &self.records
    }

    pub fn by_mode(&self, mode: BattleMode) -> impl Iterator<Item = &BattleRecord> {
        self.records.iter().filter(move |r| r.mode == mode)
    }

    pub fn wins_for(&self, card_id: &str) -> usize {
        self.records
            .iter()
            .filter(|r| r.winner_id.as_deref() == Some(card_id))
            .count()
    }

    /// Prepends a record stamped with `now_ms`; ids stay unique within one millisecond.
    pub fn push(&mut self, result: RoundResult, now_ms: u64) -> BattleRecord {
        let id = if now_ms == self.last_stamp {
            self.same_stamp += 1;
            format!("battle-{}-{}", now_ms, self.same_stamp)
        } else {
            self.last_stamp = now_ms;
            self.same_stamp = 0;
            format!("battle-{}", now_ms)
        };
        let record = BattleRecord {
            id,
            fighter1: result.fighter1.without_image(),
            fighter2: result.fighter2.without_image(),
            winner_id: result.winner_id,
            mode: result.mode,
        };
        self.records.insert(0, record.clone());
        record
    }

    pub fn save(&self, store: &mut dyn Storage) -> Result<()> {
        save_json(store, KEY_BATTLE_HISTORY, &self.records)
    }

    pub fn clear(&mut self, store: &mut dyn Storage) -> Result<()> {
        store.remove(KEY_BATTLE_HISTORY)?;
        self.records.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;
    use crate::types::Card;

    fn card(id: &str) -> Card {
        Card {
            id: id.into(),
            name: id.to_uppercase(),
            ability: String::new(),
            power: 1,
            energy: 100,
            combination: None,
            image: Some("blob:x".into()),
        }
    }

    fn result(winner: Option<&str>, mode: BattleMode) -> RoundResult {
        RoundResult {
            fighter1: card("a"),
            fighter2: card("b"),
            winner_id: winner.map(str::to_string),
            mode,
        }
    }

    #[test]
    fn newest_first_with_unique_ids() {
        let mut history = BattleHistory::default();
        let first = history.push(result(Some("a"), BattleMode::Mellee), 10);
        let second = history.push(result(None, BattleMode::Solo), 10);
        let third = history.push(result(Some("b"), BattleMode::Solo), 11);
        assert_eq!(first.id, "battle-10");
        assert_eq!(second.id, "battle-10-1");
        assert_eq!(third.id, "battle-11");
        assert_eq!(history.records()[0].id, "battle-11");
        assert!(history.records().iter().all(|r| r.fighter1.image.is_none()));
        assert_eq!(history.by_mode(BattleMode::Solo).count(), 2);
        assert_eq!(history.wins_for("a"), 1);
    }

    #[test]
    fn persists_and_clears() {
        let mut store = MemoryStorage::new();
        let mut history = BattleHistory::default();
        history.push(result(Some("a"), BattleMode::Mellee), 1);
        history.save(&mut store).unwrap();

        let mut reloaded = BattleHistory::load(&store).unwrap();
        assert_eq!(reloaded.records().len(), 1);
        reloaded.clear(&mut store).unwrap();
        assert!(BattleHistory::load(&store).unwrap().records().is_empty());
    }

    #[test]
    fn old_records_without_mode_read_as_simulator() {
        let mut store = MemoryStorage::new();
        let raw = serde_json::json!([{
            "id": "battle-1",
            "fighter1": card("a").without_image(),
            "fighter2": card("b").without_image(),
            "winnerId": null,
        }]);
        store.set(KEY_BATTLE_HISTORY, &raw.to_string()).unwrap();
        let history = BattleHistory::load(&store).unwrap();
        assert_eq!(history.records()[0].mode, BattleMode::Simulator);
    }
}
