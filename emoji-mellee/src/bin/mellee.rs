use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use emoji_mellee::catalog::parse_energy;
use emoji_mellee::constants::GAME_NAME;
use emoji_mellee::cpu::CpuPlayer;
use emoji_mellee::game::{Duel, DuelEvent};
use emoji_mellee::lobby::LobbyBoard;
use emoji_mellee::net::{decode_lobby_frame, encode, game_channel_url, new_game_id, OnlineState};
use emoji_mellee::relay::{Reconnector, RelayConnection};
use emoji_mellee::sync::{Channel, GuestSession, GuestStatus, HostSession};
use emoji_mellee::{
    unix_millis, Album, BattleMode, Card, DuelDriver, DuelRng, FileStorage, MelleeConfig,
    PlayerInfo, Side,
};
use log::{info, warn};
use rand::Rng;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::io::{stdin, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::oneshot;

// Terminal front end: album management, local and solo duels, and online host/join.

#[derive(Parser, Debug)]
#[command(name = "mellee", version, about = "Emoji Mellee card duels in the terminal")]
struct Cli {
    /// JSON config file; missing keys fall back to defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the data directory from the config.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Seed for turn order and CPU choices.
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage saved cards.
    #[command(subcommand)]
    Cards(CardsCommand),
    /// Manage the deck.
    #[command(subcommand)]
    Deck(DeckCommand),
    /// Show or clear the battle history.
    History {
        #[arg(long)]
        mode: Option<String>,
        #[arg(long)]
        clear: bool,
    },
    /// Fight two album cards at their current energies.
    Simulate { first: String, second: String },
    /// Set the name shown to online opponents.
    Pseudonym { name: String },
    /// Local duel on one keyboard, or against the CPU with --cpu.
    Play {
        #[arg(long)]
        cpu: bool,
    },
    /// Host an online duel.
    Host,
    /// Join an online duel by id.
    Join { game_id: String },
    /// List open online matches.
    Lobby {
        #[arg(long, default_value_t = 5)]
        listen_secs: u64,
    },
}

#[derive(Subcommand, Debug)]
enum CardsCommand {
    List,
    Add(CardArgs),
    Delete { id: String },
    Energy {
        id: String,
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },
    ResetEnergy { id: String },
}

#[derive(Args, Debug)]
struct CardArgs {
    /// Existing id to update; a new id is generated otherwise.
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "")]
    ability: String,
    #[arg(long, default_value_t = 1)]
    power: u32,
    #[arg(long)]
    energy: String,
    #[arg(long)]
    combination: Option<String>,
    #[arg(long)]
    image: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum DeckCommand {
    Show,
    Add { id: String },
    Remove { id: String },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut config = MelleeConfig::load_or_default(cli.config.as_deref())
        .context("could not read config")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    let store = FileStorage::open(&config.data_dir)
        .with_context(|| format!("could not open store at {}", config.data_dir.display()))?;
    let mut album = Album::open(store)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(cli.command, &mut album, &config))?;
    album.flush()?;
    Ok(())
}

async fn run(command: Command, album: &mut Album<FileStorage>, config: &MelleeConfig) -> Result<()> {
    match command {
        Command::Cards(cmd) => cards(cmd, album),
        Command::Deck(cmd) => deck(cmd, album),
        Command::History { mode, clear } => history(album, mode, clear),
        Command::Simulate { first, second } => {
            let fight = album.simulate(&first, &second)?;
            println!(
                "{} ends at {}, {} ends at {}",
                fight.fighter1.card.name,
                fight.fighter1.current_energy,
                fight.fighter2.card.name,
                fight.fighter2.current_energy
            );
            match fight.winner_id {
                Some(id) => println!("winner: {}", id),
                None => println!("draw"),
            }
            Ok(())
        }
        Command::Pseudonym { name } => {
            album.set_pseudonym(&name)?;
            println!("you are now {}", name.trim());
            Ok(())
        }
        Command::Play { cpu } => play(album, config, cpu).await,
        Command::Host => host(album, config).await,
        Command::Join { game_id } => join(album, config, &game_id).await,
        Command::Lobby { listen_secs } => lobby(config, listen_secs).await,
    }
}

fn cards(cmd: CardsCommand, album: &mut Album<FileStorage>) -> Result<()> {
    match cmd {
        CardsCommand::List => {
            for card in album.all_cards_with_energy() {
                println!(
                    "{:<28} {:<24} {:>5}/{:<5} {}",
                    card.card.id,
                    card.card.name,
                    card.current_energy,
                    card.card.energy,
                    card.card.summon_key().unwrap_or("-")
                );
            }
        }
        CardsCommand::Add(args) => {
            let image = match &args.image {
                Some(path) => Some(
                    std::fs::read(path)
                        .with_context(|| format!("could not read {}", path.display()))?,
                ),
                None => None,
            };
            let card = Card {
                id: args
                    .id
                    .unwrap_or_else(|| format!("card-{}", unix_millis())),
                name: args.name,
                ability: args.ability,
                power: args.power,
                energy: parse_energy(&args.energy),
                combination: args.combination.filter(|c| !c.is_empty()),
                image: None,
            };
            let id = card.id.clone();
            let updated = album.save_card(card, image.as_deref())?;
            println!("{} {}", if updated { "updated" } else { "saved" }, id);
        }
        CardsCommand::Delete { id } => {
            album.delete_card(&id)?;
            println!("deleted {}", id);
        }
        CardsCommand::Energy { id, value } => {
            album.set_energy(&id, value)?;
            println!("{} energy is now {}", id, album.current_energy(&id).unwrap_or(0));
        }
        CardsCommand::ResetEnergy { id } => {
            album.reset_energy(&id)?;
            println!("{} energy reset to {}", id, album.current_energy(&id).unwrap_or(0));
        }
    }
    Ok(())
}

fn deck(cmd: DeckCommand, album: &mut Album<FileStorage>) -> Result<()> {
    match cmd {
        DeckCommand::Show => {
            for card in album.deck_cards() {
                println!("{:<24} energy {:>5} power {}", card.card.name, card.current_energy, card.card.power);
            }
            println!("{} cards, total power {}", album.deck_ids().len(), album.total_power());
        }
        DeckCommand::Add { id } => {
            if !album.add_to_deck(&id)? {
                println!("{} is already in the deck", id);
            }
        }
        DeckCommand::Remove { id } => album.remove_from_deck(&id)?,
    }
    Ok(())
}

fn history(album: &mut Album<FileStorage>, mode: Option<String>, clear: bool) -> Result<()> {
    if clear {
        album.clear_history()?;
        println!("history cleared");
        return Ok(());
    }
    let filter: Option<BattleMode> = match mode {
        Some(raw) => Some(
            serde_json::from_value(serde_json::Value::String(raw.clone()))
                .with_context(|| format!("unknown mode {}", raw))?,
        ),
        None => None,
    };
    let records = album.history().records();
    for record in records.iter().filter(|r| filter.map_or(true, |m| r.mode == m)) {
        let winner = match record.winner_id.as_deref() {
            Some(id) if id == record.fighter1.id => record.fighter1.name.as_str(),
            Some(_) => record.fighter2.name.as_str(),
            None => "draw",
        };
        println!(
            "{:<24} {:?} {} vs {} -> {}",
            record.id, record.mode, record.fighter1.name, record.fighter2.name, winner
        );
    }
    let history = album.history();
    let mut standings: Vec<(&str, usize)> = album
        .cards()
        .iter()
        .map(|c| (c.name.as_str(), history.wins_for(&c.id)))
        .filter(|(_, wins)| *wins > 0)
        .collect();
    standings.sort_by(|a, b| b.1.cmp(&a.1));
    for (name, wins) in standings {
        println!("{:<24} {} wins", name, wins);
    }
    Ok(())
}

fn duel_rng(config: &MelleeConfig) -> DuelRng {
    match config.seed {
        Some(seed) => DuelRng::new(seed),
        None => DuelRng::from_entropy(),
    }
}

fn me(album: &Album<FileStorage>) -> PlayerInfo {
    PlayerInfo {
        id: format!("p-{:x}", rand::thread_rng().gen::<u32>()),
        pseudonym: album.pseudonym().unwrap_or("Player").to_string(),
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

fn input() -> Lines<BufReader<Stdin>> {
    BufReader::new(stdin()).lines()
}

fn show_status(duel: &Duel) {
    let turn = duel.active_side.map(|s| s.label()).unwrap_or("-");
    println!(
        "[round {}] P1 {} HP [{}] {} | P2 {} HP [{}] {} | turn {} {}s{}",
        duel.round,
        duel.player_hp,
        duel.player_symbols,
        duel.player_card
            .as_ref()
            .map(|c| format!("{} ({})", c.card.name, c.current_energy))
            .unwrap_or_default(),
        duel.opponent_hp,
        duel.opponent_symbols,
        duel.opponent_card
            .as_ref()
            .map(|c| format!("{} ({})", c.card.name, c.current_energy))
            .unwrap_or_default(),
        turn,
        duel.countdown,
        if duel.paused { " (paused)" } else { "" }
    );
}

fn show_events(events: &[DuelEvent], duel: &Duel) {
    for event in events {
        match event {
            DuelEvent::Started { active } | DuelEvent::RoundReset { active } => {
                println!("{} to move", active.label());
                show_status(duel);
            }
            DuelEvent::Paused => println!("paused"),
            DuelEvent::Resumed => println!("resumed"),
            DuelEvent::Tick { remaining } if *remaining % 10 == 0 || *remaining <= 5 => {
                println!("{}s", remaining)
            }
            DuelEvent::TurnPassed { active } => println!("turn passes to {}", active.label()),
            DuelEvent::CardSummoned { side, .. } => {
                if let Some(card) = duel.card(*side) {
                    println!("{} summons {} ({})", side.label(), card.card.name, card.current_energy);
                }
            }
            DuelEvent::CombatReady => println!("clash!"),
            DuelEvent::RoundResolved(_) | DuelEvent::TimeoutAttack { .. } => {
                if let Some(message) = &duel.message {
                    println!("{}", message);
                }
                show_status(duel);
            }
            DuelEvent::MatchEnded { .. } => {
                if let Some(message) = &duel.message {
                    println!("{}", message);
                }
            }
            DuelEvent::Reset => println!("new match, type start"),
            _ => {}
        }
    }
}

async fn play(album: &mut Album<FileStorage>, config: &MelleeConfig, cpu: bool) -> Result<()> {
    let cards = album.cards().to_vec();
    let mode = if cpu { BattleMode::Solo } else { BattleMode::Mellee };
    let mut driver = DuelDriver::new(mode, cards.clone(), duel_rng(config)).with_delays(config.delays());
    if cpu {
        driver = driver.with_cpu(CpuPlayer::new(Side::Opponent, cards));
    }
    println!("{} ({:?}). Commands: start, new, status, clear p1|p2, p1 <symbols>, p2 <symbols>, quit", GAME_NAME, mode);
    if cpu {
        println!("against the CPU you play p1; bare symbols go to p1");
    }

    let mut lines = input();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let now = Instant::now();
                let line = line.trim();
                let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
                let events = match command {
                    "quit" | "q" => break,
                    "start" | "pause" | "s" => driver.toggle(now),
                    "new" => driver.new_match(now),
                    "status" => {
                        show_status(driver.duel());
                        continue;
                    }
                    "clear" => match rest.trim() {
                        "p2" => driver.clear_symbols(Side::Opponent, now),
                        _ => driver.clear_symbols(Side::Player, now),
                    },
                    "p1" => type_symbols(&mut driver, Side::Player, rest, now),
                    "p2" => type_symbols(&mut driver, Side::Opponent, rest, now),
                    _ if cpu => type_symbols(&mut driver, Side::Player, line, now),
                    _ => {
                        println!("unknown command {:?}", line);
                        continue;
                    }
                };
                if events.is_empty() && !line.is_empty() {
                    println!("ignored");
                }
                show_events(&events, driver.duel());
            }
            _ = wait_until(driver.next_deadline()) => {
                let events = driver.advance(Instant::now(), &mut *album);
                show_events(&events, driver.duel());
            }
        }
    }
    Ok(())
}

fn type_symbols(driver: &mut DuelDriver, side: Side, text: &str, now: Instant) -> Vec<DuelEvent> {
    let mut events = Vec::new();
    for symbol in text.trim().chars().filter(|c| !c.is_whitespace()) {
        events.extend(driver.select_symbol(side, &symbol.to_string(), now));
    }
    events
}

async fn connect_lobby(config: &MelleeConfig) -> Option<RelayConnection> {
    let mut reconnector = Reconnector::new(config.reconnect_policy());
    let url = config.lobby_ws_url.clone();
    let heartbeat = config.heartbeat();
    let result = reconnector
        .run(|| RelayConnection::connect(&url, heartbeat))
        .await;
    match result {
        Ok(connection) => Some(connection),
        Err(e) => {
            warn!("matchmaking board {:?}: {}", reconnector.status(), e);
            None
        }
    }
}

type PendingLobby = oneshot::Receiver<emoji_mellee::Result<RelayConnection>>;

fn connect_lobby_in_background(config: &MelleeConfig) -> PendingLobby {
    let url = config.lobby_ws_url.clone();
    let heartbeat = config.heartbeat();
    Reconnector::new(config.reconnect_policy()).spawn(move || {
        let url = url.clone();
        async move { RelayConnection::connect(&url, heartbeat).await }
    })
}

async fn recv_or_pending(connection: &mut Option<RelayConnection>) -> Option<String> {
    match connection {
        Some(connection) => connection.recv().await,
        None => std::future::pending().await,
    }
}

async fn reconnected(pending: &mut Option<PendingLobby>) -> emoji_mellee::Result<RelayConnection> {
    match pending {
        Some(receiver) => receiver
            .await
            .unwrap_or_else(|_| Err(emoji_mellee::Error::ChannelClosed)),
        None => std::future::pending().await,
    }
}

async fn host(album: &mut Album<FileStorage>, config: &MelleeConfig) -> Result<()> {
    let game_id = new_game_id(&mut rand::thread_rng());
    let url = game_channel_url(&config.game_ws_prefix, &game_id);
    let mut connection = RelayConnection::connect(&url, config.heartbeat()).await?;
    let mut session = HostSession::new(game_id.clone(), me(album), album.cards().to_vec(), duel_rng(config));
    session.open(&mut connection)?;
    println!("hosting {}; share this id. Type symbols on your turn, quit to leave.", game_id);

    let mut lobby: Option<RelayConnection> = None;
    let mut pending_lobby = Some(connect_lobby_in_background(config));
    let mut board = LobbyBoard::new(config.lobby_stale_ms);
    let mut publish = tokio::time::interval(Duration::from_secs(5));
    let mut lines = input();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line == "quit" || line == "q" {
                    break;
                }
                let now = Instant::now();
                let mut events = Vec::new();
                for symbol in line.chars().filter(|c| !c.is_whitespace()) {
                    events.extend(session.select_symbol(&symbol.to_string(), now, &mut connection)?);
                }
                show_events(&events, session.driver().duel());
            }
            frame = connection.recv() => {
                let Some(text) = frame else {
                    println!("match channel closed, back to matchmaking");
                    break;
                };
                let had_guest = session.guest().is_some();
                let events = session.handle_text(&text, Instant::now(), &mut connection)?;
                if !had_guest {
                    if let Some(guest) = session.guest() {
                        println!("{} joined", guest.pseudonym);
                    }
                }
                show_events(&events, session.driver().duel());
            }
            _ = wait_until(session.next_deadline()) => {
                let events = session.advance(Instant::now(), &mut *album, &mut connection)?;
                show_events(&events, session.driver().duel());
            }
            _ = publish.tick() => {
                if let Some(channel) = lobby.as_mut() {
                    let now_ms = unix_millis();
                    let broadcast = board.publish(session.listing(), now_ms);
                    if channel.send_text(encode(&broadcast)?).is_err() {
                        warn!("lost the matchmaking board, reconnecting");
                        lobby = None;
                        pending_lobby = Some(connect_lobby_in_background(config));
                    }
                }
            }
            frame = recv_or_pending(&mut lobby) => {
                match frame {
                    Some(text) => {
                        if let Some(broadcast) = decode_lobby_frame(&text) {
                            board.merge(broadcast);
                        }
                    }
                    None => {
                        warn!("matchmaking board closed, reconnecting");
                        lobby = None;
                        pending_lobby = Some(connect_lobby_in_background(config));
                    }
                }
            }
            result = reconnected(&mut pending_lobby) => {
                pending_lobby = None;
                match result {
                    Ok(channel) => {
                        info!("listing {} on {}", game_id, channel.url());
                        lobby = Some(channel);
                    }
                    Err(e) => warn!("matchmaking board unavailable: {}", e),
                }
            }
        }
    }
    if let Some(channel) = lobby {
        channel.close();
    }
    connection.close();
    Ok(())
}

fn show_view(view: &OnlineState) {
    println!(
        "{} vs {}",
        view.host_pseudonym().unwrap_or("?"),
        view.guest_pseudonym().unwrap_or("waiting")
    );
    show_status(&view.duel);
    if let Some(message) = &view.duel.message {
        println!("{}", message);
    }
}

async fn join(album: &mut Album<FileStorage>, config: &MelleeConfig, game_id: &str) -> Result<()> {
    let url = game_channel_url(&config.game_ws_prefix, game_id);
    let mut connection = RelayConnection::connect(&url, config.heartbeat()).await?;
    let mut guest = GuestSession::new(game_id, me(album));
    guest.join(&mut connection)?;
    println!("joining {}; you play P2. Type symbols on your turn, quit to leave.", game_id);

    let mut lines = input();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line == "quit" || line == "q" {
                    break;
                }
                for symbol in line.chars().filter(|c| !c.is_whitespace()) {
                    if !guest.submit_symbol(&symbol.to_string(), &mut connection)? {
                        println!("not your turn");
                        break;
                    }
                }
            }
            frame = connection.recv() => {
                match frame {
                    Some(text) => {
                        if guest.handle_text(&text) {
                            if let Some(view) = guest.view() {
                                show_view(view);
                            }
                        }
                    }
                    None => {
                        guest.on_close();
                        break;
                    }
                }
            }
        }
    }
    if guest.status() == GuestStatus::Disconnected {
        bail!("disconnected from {}", game_id);
    }
    connection.close();
    Ok(())
}

async fn lobby(config: &MelleeConfig, listen_secs: u64) -> Result<()> {
    let Some(mut connection) = connect_lobby(config).await else {
        bail!("could not reach the matchmaking board");
    };
    let mut board = LobbyBoard::new(config.lobby_stale_ms);
    let listen = tokio::time::sleep(Duration::from_secs(listen_secs));
    tokio::pin!(listen);
    loop {
        tokio::select! {
            _ = &mut listen => break,
            frame = connection.recv() => match frame {
                Some(text) => {
                    if let Some(broadcast) = decode_lobby_frame(&text) {
                        board.merge(broadcast);
                    }
                }
                None => {
                    warn!("matchmaking board closed, reconnecting");
                    tokio::select! {
                        _ = &mut listen => break,
                        retry = connect_lobby(config) => match retry {
                            Some(fresh) => connection = fresh,
                            None => break,
                        },
                    }
                }
            },
        }
    }
    connection.close();
    board.prune(unix_millis());
    let open = board.open_matches();
    if open.is_empty() {
        println!("no open matches");
    }
    for listing in open {
        println!("{}  hosted by {}", listing.game_id, listing.host_display_name);
    }
    info!("{} listings seen", board.len());
    Ok(())
}
