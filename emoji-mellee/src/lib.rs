// Emoji Mellee: card album, the timed symbol duel, and the host-authoritative online layer.
// The duel core in `game` is shared by local, solo and online play; everything that waits on
// a clock lives in `driver` and `schedule`.

pub mod album;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod cpu;
pub mod driver;
pub mod error;
pub mod game;
pub mod history;
pub mod lobby;
pub mod net;
pub mod relay;
pub mod rng;
pub mod schedule;
pub mod store;
pub mod sync;
pub mod types;

pub use album::Album;
pub use config::MelleeConfig;
pub use driver::DuelDriver;
pub use error::{Error, Result};
pub use game::{Duel, DuelEvent};
pub use history::{BattleHistory, RoundResultSink};
pub use rng::DuelRng;
pub use store::{FileStorage, MemoryStorage, Storage};
pub use sync::{Channel, GuestSession, GuestStatus, HostSession};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use game::validate_state_hash;

    fn card(id: &str, energy: u32, combination: &str) -> Card {
        Card {
            id: id.into(),
            name: id.to_uppercase(),
            ability: "None".into(),
            power: 2,
            energy,
            combination: Some(combination.into()),
            image: None,
        }
    }

    fn cards() -> Vec<Card> {
        vec![
            card("fire", 900, "🔥"),
            card("dragon", 600, "🐉"),
            card("wall", 400, "🧱"),
            card("star", 900, "⭐"),
            card("wave", 500, "🌊🌊"),
            card("storm", 700, "🌀🐉"),
        ]
    }

    fn running_duel(active: Side) -> (Duel, DuelRng) {
        let mut rng = DuelRng::new(1);
        let mut duel = Duel::new(BattleMode::Mellee);
        duel.start(&mut rng);
        duel.active_side = Some(active);
        (duel, rng)
    }

    fn play(duel: &mut Duel, side: Side, symbols: &[&str]) -> Vec<DuelEvent> {
        let catalog = cards();
        let mut events = Vec::new();
        for symbol in symbols {
            events.extend(duel.select_symbol(side, symbol, &catalog));
        }
        events
    }

    fn run_clock(duel: &mut Duel, seconds: u32) -> Vec<DuelEvent> {
        (0..seconds).flat_map(|_| duel.tick()).collect()
    }

    #[test]
    fn new_duel_waits_for_start() {
        let duel = Duel::new(BattleMode::Solo);
        assert_eq!((duel.player_hp, duel.opponent_hp), (2000, 2000));
        assert_eq!(duel.countdown, 60);
        assert_eq!(duel.phase, Phase::AwaitingInput);
        assert!(duel.active_side.is_none());
        assert!(!duel.running);
    }

    #[test]
    fn stronger_card_survives_with_difference() {
        let (mut duel, mut rng) = running_duel(Side::Player);
        play(&mut duel, Side::Player, &["🔥"]);
        assert_eq!(duel.active_side, Some(Side::Opponent));
        let events = play(&mut duel, Side::Opponent, &["🐉"]);
        assert_eq!(events.last(), Some(&DuelEvent::CombatReady));
        assert_eq!(duel.phase, Phase::Resolving);

        let events = duel.resolve();
        let DuelEvent::RoundResolved(result) = &events[0] else {
            panic!("expected a resolved round, got {:?}", events);
        };
        assert_eq!(result.fighter1.id, "fire");
        assert_eq!(result.fighter2.id, "dragon");
        assert_eq!(result.winner_id.as_deref(), Some("fire"));
        assert_eq!(duel.player_card.as_ref().unwrap().current_energy, 300);
        assert!(duel.opponent_card.is_none());
        assert_eq!((duel.player_hp, duel.opponent_hp), (2000, 2000));
        assert_eq!(duel.phase, Phase::RoundEnd);
        assert_eq!(duel.message.as_deref(), Some("FIRE wins the round!"));

        let events = duel.finish_round(&mut rng);
        assert!(matches!(events.as_slice(), [DuelEvent::RoundReset { .. }]));
        assert!(duel.player_card.is_none());
        assert!(duel.player_symbols.is_empty());
        assert_eq!(duel.round, 2);
    }

    #[test]
    fn weaker_player_card_loses() {
        let (mut duel, _) = running_duel(Side::Opponent);
        play(&mut duel, Side::Opponent, &["🔥"]);
        play(&mut duel, Side::Player, &["🧱"]);
        duel.resolve();
        assert!(duel.player_card.is_none());
        assert_eq!(duel.opponent_card.as_ref().unwrap().current_energy, 500);
    }

    #[test]
    fn equal_energy_is_a_draw() {
        let (mut duel, _) = running_duel(Side::Player);
        play(&mut duel, Side::Player, &["🔥"]);
        play(&mut duel, Side::Opponent, &["⭐"]);
        let events = duel.resolve();
        let DuelEvent::RoundResolved(result) = &events[0] else {
            panic!("expected a resolved round");
        };
        assert!(result.winner_id.is_none());
        assert!(duel.player_card.is_none());
        assert!(duel.opponent_card.is_none());
        assert_eq!((duel.player_hp, duel.opponent_hp), (2000, 2000));
    }

    #[test]
    fn timeout_attack_hits_once_then_round_resets() {
        let (mut duel, mut rng) = running_duel(Side::Player);
        play(&mut duel, Side::Player, &["🧱"]);
        assert_eq!(duel.active_side, Some(Side::Opponent));

        let events = run_clock(&mut duel, 60);
        let attacks: Vec<&DuelEvent> = events
            .iter()
            .filter(|e| matches!(e, DuelEvent::TimeoutAttack { .. }))
            .collect();
        assert_eq!(
            attacks,
            vec![&DuelEvent::TimeoutAttack {
                attacker: Side::Player,
                damage: 400,
                remaining_hp: 1600,
            }]
        );
        assert_eq!(duel.opponent_hp, 1600);
        assert_eq!(duel.player_hp, 2000);
        assert_eq!(duel.phase, Phase::RoundEnd);
        assert_eq!(duel.message.as_deref(), Some("WALL attacks on time!"));

        assert!(run_clock(&mut duel, 30).is_empty());
        assert_eq!(duel.opponent_hp, 1600);

        duel.finish_round(&mut rng);
        assert_eq!(duel.phase, Phase::AwaitingInput);
        assert_eq!(duel.countdown, 60);
        assert!(duel.player_card.is_none() && duel.opponent_card.is_none());
        assert!(duel.player_symbols.is_empty() && duel.opponent_symbols.is_empty());
        assert!(duel.active_side.is_some());
    }

    #[test]
    fn timeout_without_waiting_card_passes_turn() {
        let (mut duel, _) = running_duel(Side::Player);
        let events = run_clock(&mut duel, 60);
        assert_eq!(
            events.last(),
            Some(&DuelEvent::TurnPassed {
                active: Side::Opponent
            })
        );
        assert_eq!(duel.countdown, 60);
        assert_eq!((duel.player_hp, duel.opponent_hp), (2000, 2000));
    }

    #[test]
    fn hp_only_falls_and_match_ends_at_zero() {
        let (mut duel, mut rng) = running_duel(Side::Player);
        let mut last_hp = duel.opponent_hp;
        let mut ended = Vec::new();
        for _ in 0..3 {
            duel.active_side = Some(Side::Player);
            play(&mut duel, Side::Player, &["🔥"]);
            let events = run_clock(&mut duel, 60);
            assert!(duel.opponent_hp <= last_hp);
            last_hp = duel.opponent_hp;
            ended.extend(
                events
                    .into_iter()
                    .filter(|e| matches!(e, DuelEvent::MatchEnded { .. })),
            );
            if duel.is_over() {
                break;
            }
            duel.finish_round(&mut rng);
        }
        assert_eq!(duel.opponent_hp, 0);
        assert_eq!(ended, vec![DuelEvent::MatchEnded { winner: Side::Player }]);
        assert_eq!(duel.phase, Phase::MatchEnd);
        assert_eq!(duel.winner, Some(Side::Player));
        assert!(!duel.running);
        assert!(duel.active_side.is_none());
        assert_eq!(duel.message.as_deref(), Some("Player 1 is the Supreme Winner!"));

        assert!(duel.tick().is_empty());
        assert!(duel.start(&mut rng).is_empty());
        assert!(duel.finish_round(&mut rng).is_empty());
        assert!(play(&mut duel, Side::Opponent, &["🐉"]).is_empty());

        assert_eq!(duel.new_match(), vec![DuelEvent::Reset]);
        assert_eq!(duel.opponent_hp, 2000);
        assert_eq!(duel.phase, Phase::AwaitingInput);
    }

    #[test]
    fn summoning_needs_exact_sequence() {
        let (mut duel, _) = running_duel(Side::Player);
        play(&mut duel, Side::Player, &["🌊"]);
        assert!(duel.player_card.is_none());
        play(&mut duel, Side::Player, &["🌊"]);
        assert_eq!(duel.player_card.as_ref().unwrap().card.id, "wave");

        let (mut duel, _) = running_duel(Side::Player);
        play(&mut duel, Side::Player, &["🌊", "🌀"]);
        assert!(duel.player_card.is_none());
        assert_eq!(duel.player_symbols, "🌊🌀");
        play(&mut duel, Side::Player, &["🐉"]);
        assert!(duel.player_card.is_none());
        assert_eq!(duel.player_symbols, "🌊🌀🐉");
        assert!(play(&mut duel, Side::Player, &["🔥"]).is_empty());
        assert_eq!(duel.player_symbols, "🌊🌀🐉");

        assert_eq!(
            duel.clear_symbols(Side::Player),
            vec![DuelEvent::SymbolsCleared { side: Side::Player }]
        );
        play(&mut duel, Side::Player, &["🌀", "🐉"]);
        assert_eq!(duel.player_card.as_ref().unwrap().card.id, "storm");
    }

    #[test]
    fn input_is_ignored_out_of_turn_or_while_paused() {
        let catalog = cards();
        let mut idle = Duel::new(BattleMode::Mellee);
        assert!(idle.select_symbol(Side::Player, "🔥", &catalog).is_empty());
        assert!(idle.tick().is_empty());

        let (mut duel, mut rng) = running_duel(Side::Player);
        assert!(play(&mut duel, Side::Opponent, &["🐉"]).is_empty());
        assert!(duel.opponent_symbols.is_empty());

        assert_eq!(duel.toggle(&mut rng), vec![DuelEvent::Paused]);
        assert!(play(&mut duel, Side::Player, &["🔥"]).is_empty());
        assert!(duel.tick().is_empty());
        assert_eq!(duel.countdown, 60);
        assert_eq!(duel.toggle(&mut rng), vec![DuelEvent::Resumed]);

        play(&mut duel, Side::Player, &["🔥"]);
        duel.active_side = Some(Side::Player);
        assert!(play(&mut duel, Side::Player, &["🐉"]).is_empty());
        assert_eq!(duel.player_card.as_ref().unwrap().card.id, "fire");
    }

    #[test]
    fn countdown_freezes_while_resolving() {
        let (mut duel, _) = running_duel(Side::Player);
        play(&mut duel, Side::Player, &["🔥"]);
        run_clock(&mut duel, 10);
        play(&mut duel, Side::Opponent, &["🐉"]);
        assert!(run_clock(&mut duel, 90).is_empty());
        assert_eq!(duel.phase, Phase::Resolving);
        assert_eq!((duel.player_hp, duel.opponent_hp), (2000, 2000));
    }

    #[test]
    fn cpu_summon_uses_combination_or_placeholder() {
        let (mut duel, _) = running_duel(Side::Opponent);
        let mut blank = card("blank", 100, "");
        blank.combination = None;
        duel.summon(Side::Opponent, &blank);
        assert_eq!(duel.opponent_symbols, "???");
        duel.summon(Side::Player, &cards()[0]);
        assert_eq!(duel.player_symbols, "🔥");
        assert_eq!(duel.phase, Phase::Resolving);
    }

    #[test]
    fn state_hash_tracks_changes() {
        let (mut duel, _) = running_duel(Side::Player);
        let before = duel.state_hash();
        assert!(validate_state_hash(&duel, &before));
        duel.tick();
        assert!(!validate_state_hash(&duel, &before));
    }
}
