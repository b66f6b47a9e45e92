use crate::constants::LOBBY_STALE_MS;
use crate::net::LobbyBroadcast;
use crate::types::{LobbyInfo, LobbyStatus};
use log::debug;
use std::collections::BTreeMap;

// Matchmaking board. Every peer on the listing channel gossips the listings it knows about;
// entries merge by game id and fall off once nobody has refreshed them for a while.

#[derive(Clone, Debug)]
pub struct LobbyBoard {
    listings: BTreeMap<String, LobbyInfo>,
    stale_after_ms: u64,
}

impl Default for LobbyBoard {
    fn default() -> Self {
        Self::new(LOBBY_STALE_MS)
    }
}

impl LobbyBoard {
    pub fn new(stale_after_ms: u64) -> Self {
        Self {
            listings: BTreeMap::new(),
            stale_after_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    /// Merges one listing; the newer `last_update` wins. Returns true if the board changed.
    pub fn upsert(&mut self, info: LobbyInfo) -> bool {
        match self.listings.get(&info.game_id) {
            Some(current) if current.last_update >= info.last_update => false,
            _ => {
                self.listings.insert(info.game_id.clone(), info);
                true
            }
        }
    }

    pub fn merge(&mut self, broadcast: LobbyBroadcast) -> usize {
        let mut changed = 0;
        for info in broadcast.lobbies {
            if self.upsert(info) {
                changed += 1;
            }
        }
        changed
    }

    /// Drops listings older than the staleness window.
    pub fn prune(&mut self, now_ms: u64) -> usize {
        let cutoff = now_ms.saturating_sub(self.stale_after_ms);
        let before = self.listings.len();
        self.listings.retain(|_, info| info.last_update >= cutoff);
        let removed = before - self.listings.len();
        if removed > 0 {
            debug!("pruned {} stale listings", removed);
        }
        removed
    }

    /// Joinable matches, newest first.
    pub fn open_matches(&self) -> Vec<&LobbyInfo> {
        let mut open: Vec<&LobbyInfo> = self
            .listings
            .values()
            .filter(|info| info.status == LobbyStatus::Waiting)
            .collect();
        open.sort_by(|a, b| b.last_update.cmp(&a.last_update));
        open
    }

    /// Refreshes our own listing and returns the whole board for broadcast.
    pub fn publish(&mut self, mut own: LobbyInfo, now_ms: u64) -> LobbyBroadcast {
        own.last_update = now_ms;
        self.listings.insert(own.game_id.clone(), own);
        self.prune(now_ms);
        LobbyBroadcast {
            lobbies: self.listings.values().cloned().collect(),
        }
    }
}
