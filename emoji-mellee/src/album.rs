use crate::catalog::{default_roster, find_card, validate_combination};
use crate::constants::*;
use crate::error::{Error, Result};
use crate::game::{simulate, SimulatedFight};
use crate::history::{BattleHistory, RoundResultSink};
use crate::store::{load_json, save_json, Storage};
use crate::types::{unix_millis, BattleCard, BattleRecord, Card, RoundResult};
use log::{info, warn};
use std::collections::BTreeMap;

// The player's collection: saved cards, per-card energy overrides, the deck and the battle
// history, all persisted through the injected store.

pub struct Album<S: Storage> {
    store: S,
    cards: Vec<Card>,
    energies: BTreeMap<String, u32>,
    deck: Vec<String>,
    history: BattleHistory,
    pseudonym: Option<String>,
}

impl<S: Storage> Album<S> {
    /// Loads everything from `store`, seeding the starter roster into an empty album.
    pub fn open(mut store: S) -> Result<Self> {
        let stored: Option<Vec<Card>> = load_json(&store, KEY_SAVED_CARDS)?;
        let stored_energies: BTreeMap<String, u32> =
            load_json(&store, KEY_CARD_ENERGIES)?.unwrap_or_default();
        let (cards, seeded) = match stored {
            Some(cards) => (cards, false),
            None => (default_roster(), true),
        };
        let mut energies: BTreeMap<String, u32> =
            cards.iter().map(|c| (c.id.clone(), c.energy)).collect();
        if seeded {
            info!("empty album, seeding {} starter cards", cards.len());
            save_json(&mut store, KEY_SAVED_CARDS, &cards)?;
            save_json(&mut store, KEY_CARD_ENERGIES, &energies)?;
        } else {
            energies.extend(stored_energies);
        }
        let deck: Vec<String> = load_json(&store, KEY_DECK)?.unwrap_or_default();
        let history = BattleHistory::load(&store)?;
        let pseudonym = store.get(KEY_PSEUDONYM)?;
        Ok(Self {
            store,
            cards,
            energies,
            deck,
            history,
            pseudonym,
        })
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn card(&self, id: &str) -> Option<&Card> {
        find_card(&self.cards, id)
    }

    pub fn deck_ids(&self) -> &[String] {
        &self.deck
    }

    pub fn history(&self) -> &BattleHistory {
        &self.history
    }

    pub fn pseudonym(&self) -> Option<&str> {
        self.pseudonym.as_deref()
    }

    pub fn set_pseudonym(&mut self, pseudonym: &str) -> Result<()> {
        let trimmed = pseudonym.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation("pseudonym cannot be empty".into()));
        }
        self.store.set(KEY_PSEUDONYM, trimmed)?;
        self.pseudonym = Some(trimmed.to_string());
        Ok(())
    }

    /// Inserts or updates a card. Returns true when an existing card was replaced. Nothing in
    /// memory changes until every write has landed; a new card's image is removed again if a
    /// later write fails.
    pub fn save_card(&mut self, mut card: Card, image: Option<&[u8]>) -> Result<bool> {
        if card.name.trim().is_empty() {
            return Err(Error::Validation("card needs a name".into()));
        }
        if let Some(key) = card.combination.as_deref() {
            validate_combination(&self.cards, &card.id, key)?;
        }
        let existing = self.cards.iter().position(|c| c.id == card.id);
        if let Some(bytes) = image {
            self.store.put_blob(&card.id, bytes)?;
            card.image = Some(card.id.clone());
        } else if let Some(index) = existing {
            card.image = self.cards[index].image.clone();
        }

        let mut cards = self.cards.clone();
        match existing {
            Some(index) => cards[index] = card.clone(),
            None => cards.push(card.clone()),
        }
        let mut energies = self.energies.clone();
        energies.insert(card.id.clone(), card.energy);
        if let Err(e) = self.persist_cards(&cards, &energies) {
            if image.is_some() && existing.is_none() {
                if let Err(cleanup) = self.store.delete_blob(&card.id) {
                    warn!("could not drop image for unsaved {}: {}", card.id, cleanup);
                }
            }
            return Err(e);
        }
        self.cards = cards;
        self.energies = energies;
        let updated = existing.is_some();
        info!("{} card {}", if updated { "updated" } else { "saved" }, card.name);
        Ok(updated)
    }

    pub fn delete_card(&mut self, id: &str) -> Result<()> {
        if self.card(id).is_none() {
            return Err(Error::CardNotFound(id.to_string()));
        }
        let mut cards = self.cards.clone();
        cards.retain(|c| c.id != id);
        let mut energies = self.energies.clone();
        energies.remove(id);
        self.persist_cards(&cards, &energies)?;

        let mut deck = self.deck.clone();
        deck.retain(|d| d != id);
        if deck.len() != self.deck.len() {
            if let Err(e) = save_json(&mut self.store, KEY_DECK, &deck) {
                self.restore_cards();
                return Err(e);
            }
        }
        self.cards = cards;
        self.energies = energies;
        self.deck = deck;
        if let Err(e) = self.store.delete_blob(id) {
            warn!("could not delete image for {}: {}", id, e);
        }
        Ok(())
    }

    // Writes cards then energies. A failed energy write puts the stored card list back.
    fn persist_cards(&mut self, cards: &[Card], energies: &BTreeMap<String, u32>) -> Result<()> {
        save_json(&mut self.store, KEY_SAVED_CARDS, cards)?;
        if let Err(e) = save_json(&mut self.store, KEY_CARD_ENERGIES, energies) {
            self.restore_cards();
            return Err(e);
        }
        Ok(())
    }

    fn restore_cards(&mut self) {
        let restored = save_json(&mut self.store, KEY_SAVED_CARDS, &self.cards)
            .and_then(|_| save_json(&mut self.store, KEY_CARD_ENERGIES, &self.energies));
        if let Err(e) = restored {
            warn!("could not restore saved cards: {}", e);
        }
    }

    pub fn image(&self, id: &str) -> Result<Option<Vec<u8>>> {
        self.store.get_blob(id)
    }

    /// Adds a card to the deck. Duplicates are a no-op and return false.
    pub fn add_to_deck(&mut self, id: &str) -> Result<bool> {
        if self.deck.iter().any(|d| d == id) {
            return Ok(false);
        }
        if self.deck.len() >= MAX_DECK_SIZE {
            return Err(Error::Validation(format!(
                "deck is full ({} cards)",
                MAX_DECK_SIZE
            )));
        }
        if self.card(id).is_none() {
            return Err(Error::CardNotFound(id.to_string()));
        }
        let mut deck = self.deck.clone();
        deck.push(id.to_string());
        save_json(&mut self.store, KEY_DECK, &deck)?;
        self.deck = deck;
        Ok(true)
    }

    pub fn remove_from_deck(&mut self, id: &str) -> Result<()> {
        if !self.deck.iter().any(|d| d == id) {
            return Ok(());
        }
        let deck: Vec<String> = self.deck.iter().filter(|d| d.as_str() != id).cloned().collect();
        save_json(&mut self.store, KEY_DECK, &deck)?;
        self.deck = deck;
        Ok(())
    }

    pub fn current_energy(&self, id: &str) -> Option<u32> {
        let card = self.card(id)?;
        Some(self.energies.get(id).copied().unwrap_or(card.energy))
    }

    /// Stores an energy override, clamped at zero.
    pub fn set_energy(&mut self, id: &str, energy: i64) -> Result<()> {
        if self.card(id).is_none() {
            return Err(Error::CardNotFound(id.to_string()));
        }
        let clamped = energy.clamp(0, u32::MAX as i64) as u32;
        self.store_energy(id, clamped)
    }

    pub fn reset_energy(&mut self, id: &str) -> Result<()> {
        let base = self
            .card(id)
            .map(|c| c.energy)
            .ok_or_else(|| Error::CardNotFound(id.to_string()))?;
        self.store_energy(id, base)
    }

    fn store_energy(&mut self, id: &str, energy: u32) -> Result<()> {
        let mut energies = self.energies.clone();
        energies.insert(id.to_string(), energy);
        save_json(&mut self.store, KEY_CARD_ENERGIES, &energies)?;
        self.energies = energies;
        Ok(())
    }

    fn with_energy(&self, card: &Card) -> BattleCard {
        BattleCard {
            card: card.clone(),
            current_energy: self.energies.get(&card.id).copied().unwrap_or(card.energy),
        }
    }

    pub fn all_cards_with_energy(&self) -> Vec<BattleCard> {
        self.cards.iter().map(|c| self.with_energy(c)).collect()
    }

    /// Deck cards in deck order; ids whose card was deleted are skipped.
    pub fn deck_cards(&self) -> Vec<BattleCard> {
        self.deck
            .iter()
            .filter_map(|id| self.card(id))
            .map(|c| self.with_energy(c))
            .collect()
    }

    pub fn total_power(&self) -> u32 {
        self.deck_cards().iter().map(|c| c.card.power).sum()
    }

    /// Free-form fight between two album cards at their current energies.
    pub fn simulate(&self, first: &str, second: &str) -> Result<SimulatedFight> {
        let a = self
            .card(first)
            .ok_or_else(|| Error::CardNotFound(first.to_string()))?;
        let b = self
            .card(second)
            .ok_or_else(|| Error::CardNotFound(second.to_string()))?;
        Ok(simulate(&self.with_energy(a), &self.with_energy(b)))
    }

    pub fn clear_history(&mut self) -> Result<()> {
        self.history.clear(&mut self.store)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }
}

impl<S: Storage> RoundResultSink for Album<S> {
    fn record_round(&mut self, result: RoundResult) -> Result<BattleRecord> {
        let mut history = self.history.clone();
        let record = history.push(result, unix_millis());
        if let Err(e) = history.save(&mut self.store) {
            warn!("failed to persist battle history: {}", e);
            return Err(e);
        }
        self.history = history;
        Ok(record)
    }
}
