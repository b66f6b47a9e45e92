use crate::constants::MAX_SYMBOLS;
use crate::error::{Error, Result};
use crate::types::Card;
use std::collections::HashSet;

// Card roster and summon-key helpers. The starter roster is generated once for an empty album;
// balance tweaks stay here, away from the duel engine.

// Single-codepoint symbols only, so every generated key stays within the three-symbol limit.
const SYMBOL_POOL: &[char] = &[
    '✨', '🔮', '🔥', '🐉', '💀', '💎', '🌀', '👑', '💥', '⭐', '🍀', '💰', '📜', '💣', '⏳', '🪄',
    '🔱', '💯', '💢', '💨', '💫', '💦', '😀', '😇', '😈', '👿', '👹', '👺', '🤡', '💩', '👻', '👽',
    '👾', '🤖', '🎃', '😺', '🐵', '🐶', '🐺', '🦊', '🐱', '🦁', '🐯', '🐴', '🦄', '🐮', '🐷', '🐗',
    '🐭', '🐹', '🐰', '🐻', '🐼', '🐸', '🐍', '🐲', '🐳', '🐬', '🐟', '🐠', '🦋', '🐛', '🐜', '🐝',
    '🐞', '🌍', '🌕', '🌙', '🌟', '🪐', '💧', '🌊', '🌈', '🌸', '🌹', '🌺', '🌻', '🌼', '🌷', '🌱',
    '🌲', '🌳', '🌴', '🌵', '🌾', '🌿', '🍁', '🍄', '🍇', '🍉', '🍌', '🍍', '🍎', '🍏', '🍑', '🍒',
    '🍓', '🥝', '🍅', '🥥', '🥑', '🍆', '🍔', '🍕', '🎂', '🏀', '🏈', '🎾', '🏐', '🎱', '🎯', '🎲',
    '🎮', '🧩', '🎨', '🎵', '🎤', '🎧', '🎸', '🎺', '🥁', '🎬', '🏆', '🥇', '🥈', '🥉', '🎁', '🎉',
    '🎈', '💡',
];

// (name, energy, power, ability)
const STARTER_ROSTER: &[(&str, u32, u32, &str)] = &[
    ("Christopher", 1000, 4, "Aumenta o BP de todos os personagens aliados em 100."),
    ("Eliza Maria", 800, 3, "Compra 1 carta."),
    ("Ana Clara", 700, 3, "Reduz o SP do oponente em 1."),
    ("Lucas", 600, 3, "Aumenta o SP em 1."),
    ("Thais", 900, 3, "Ignora o estado de congelamento ao atacar."),
    ("Alana", 700, 3, "Compra 1 carta se causar dano direto."),
    ("Antunis", 600, 3, "Pode atacar diretamente o HP do oponente."),
    ("Carlinha", 400, 2, "Reduz o BP de 1 personagem inimigo em 300."),
    ("Deyse", 500, 3, "Troca o HP com o personagem oponente que atacar."),
    ("Edilson", 800, 3, "Destrói o personagem inimigo com menor BP."),
    ("Evanessa", 700, 3, "Devolve 1 personagem do oponente à mão."),
    ("Evania", 800, 3, "Causa 300 de dano direto ao HP do oponente."),
    ("Felipe (MJ)", 900, 3, "Destrói um personagem com 700 BP ou menos."),
    ("Frank", 800, 3, "Recupera 300 de HP."),
    ("Gabi", 700, 3, "Causa 200 de dano a todos os personagens inimigos."),
    ("Gabriel (Cris)", 800, 3, "Ignora o estado de congelamento e aumenta 200 de BP ao atacar."),
    ("Gabrielzinho", 900, 4, "Ataca todos os personagens do oponente."),
    ("João Paulo", 600, 3, "Tem 50% de chance de causar dano dobrado."),
    ("Juliane", 900, 4, "Causa 200 de dano a todos os personagens."),
    ("Kenny", 500, 3, "Destrói um personagem com suporte."),
    ("Maria Clara", 800, 3, "Causa 300 de dano a todos os personagens, inclusive os seus."),
    ("Marlon", 700, 3, "Pode atacar personagens em modo de suporte (back-up)."),
    ("Milena", 500, 3, "Reduz o BP de 1 personagem inimigo em 500."),
    ("Manu", 600, 3, "Aumenta o BP de um aliado em 500."),
    ("Nathan", 800, 3, "Causa 300 de dano ao personagem com maior BP do oponente."),
    ("Rai", 1000, 4, "Ignora congelamento e pode atacar diretamente."),
    ("Renato", 500, 2, "Ataca diretamente o HP do oponente se não houver personagens."),
    ("Rodrigo (Deise)", 900, 3, "Compra 2 cartas ao causar dano."),
    ("Samuel", 700, 3, "Aumenta o SP em 2."),
    ("Chico", 700, 3, "Destrói 1 personagem com SP menor que 2."),
    ("Celly", 1000, 4, "Aumenta 300 de BP ao atacar."),
    ("Fatima", 800, 3, "Reduz o SP do oponente em 2."),
    ("Eudemir", 700, 3, "Ignora personagens de suporte ao atacar diretamente."),
    ("Sidney", 1000, 4, "Ignora congelamento e ataca direto o HP se possível."),
    ("Taciani", 800, 3, "Descarta 1 carta da mão do oponente aleatoriamente."),
    ("Téia", 800, 3, "Descarta 2 cartas do topo do baralho do oponente."),
    ("Nicolas", 900, 4, "Descarta sua mão e compra +1 carta a mais que o total descartado."),
    ("Guilhermy", 700, 3, "Se derrotar um personagem, compra 2 cartas."),
    ("Tauã", 1000, 4, "Destrói qualquer personagem com 700 BP ou menos."),
    ("Thaynara", 800, 3, "Olha a mão do oponente e descarta uma carta de ação."),
    ("Thasyla", 1200, 5, "Destrói todos os personagens com 700 BP ou menos."),
    ("Valeria", 700, 3, "Se destruída, causa 300 de dano ao HP do oponente."),
    ("Johnatan", 700, 3, "Reduz o SP do oponente em 1 ao entrar em campo."),
    ("Evelyn", 1000, 4, "Causa 400 de dano ao personagem com menor HP."),
    ("Derick", 800, 3, "Recupera 300 de HP do jogador."),
    ("Jhonny", 700, 3, "Aumenta o BP de Athena em 300 se estiver em campo."),
    ("Andrew", 400, 3, "Diminui o BP de todos os personagens inimigos em 100."),
    ("Andressa", 600, 3, "Compra 1 carta ao entrar em campo."),
    ("Isabela", 1000, 4, "Se derrotar um personagem, ganha 1 SP."),
    ("Neni Kelly", 700, 3, "Impede o uso de cartas Action no próximo turno."),
];

/// Builds the starter album with a stable, unique summon key per card.
pub fn default_roster() -> Vec<Card> {
    let mut taken = HashSet::new();
    STARTER_ROSTER
        .iter()
        .enumerate()
        .map(|(index, (name, energy, power, ability))| {
            let combination = unique_combination(name, &mut taken);
            Card {
                id: format!("default-card-{}", index),
                name: name.to_string(),
                ability: ability.to_string(),
                power: *power,
                energy: *energy,
                combination: Some(combination),
                image: None,
            }
        })
        .collect()
}

/// 32-bit rolling string hash (`h * 31 + unit` over UTF-16 units), folded to a positive value.
pub fn name_hash(name: &str) -> u64 {
    let mut hash: i32 = 0;
    for unit in name.encode_utf16() {
        hash = (hash << 5).wrapping_sub(hash).wrapping_add(unit as i32);
    }
    (hash as i64).unsigned_abs()
}

fn unique_combination(name: &str, taken: &mut HashSet<String>) -> String {
    let len = SYMBOL_POOL.len() as u64;
    let hash = name_hash(name);
    let i1 = (hash % len) as usize;
    let mut i2 = ((hash >> 8) % len) as usize;
    if i2 == i1 {
        i2 = (i2 + 1) % SYMBOL_POOL.len();
    }
    let mut i3 = ((hash >> 16) % len) as usize;
    while i3 == i1 || i3 == i2 {
        i3 = (i3 + 1) % SYMBOL_POOL.len();
    }

    let mut combination: String = [SYMBOL_POOL[i1], SYMBOL_POOL[i2], SYMBOL_POOL[i3]]
        .iter()
        .collect();
    let mut offset = 1;
    while taken.contains(&combination) {
        let next = (i3 + offset) % SYMBOL_POOL.len();
        offset += 1;
        if next == i1 || next == i2 {
            continue;
        }
        combination = [SYMBOL_POOL[i1], SYMBOL_POOL[i2], SYMBOL_POOL[next]]
            .iter()
            .collect();
    }
    taken.insert(combination.clone());
    combination
}

pub fn symbol_count(sequence: &str) -> usize {
    sequence.chars().count()
}

/// Exact sequence match against a card's summon key. Prefixes and supersets never match.
pub fn find_by_combination<'a>(cards: &'a [Card], sequence: &str) -> Option<&'a Card> {
    if sequence.is_empty() {
        return None;
    }
    cards.iter().find(|c| c.summon_key() == Some(sequence))
}

pub fn find_card<'a>(cards: &'a [Card], id: &str) -> Option<&'a Card> {
    cards.iter().find(|c| c.id == id)
}

/// Reads an editor energy field: leading digits count, anything else (or a minus sign) is 0.
pub fn parse_energy(raw: &str) -> u32 {
    let digits: String = raw.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Editor-side validation of a summon key: at most three symbols and not used by another card.
pub fn validate_combination(cards: &[Card], card_id: &str, combination: &str) -> Result<()> {
    let count = symbol_count(combination);
    if count > MAX_SYMBOLS {
        return Err(Error::Validation(format!(
            "combination has {} symbols, at most {} allowed",
            count, MAX_SYMBOLS
        )));
    }
    if count == 0 {
        return Ok(());
    }
    if let Some(owner) = cards
        .iter()
        .find(|c| c.id != card_id && c.summon_key() == Some(combination))
    {
        return Err(Error::Validation(format!(
            "combination {} already belongs to {}",
            combination, owner.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_keys_are_unique_and_short() {
        let roster = default_roster();
        assert_eq!(roster.len(), STARTER_ROSTER.len());
        let keys: HashSet<&str> = roster.iter().filter_map(|c| c.summon_key()).collect();
        assert_eq!(keys.len(), roster.len());
        for card in &roster {
            let key = card.summon_key().unwrap();
            assert_eq!(symbol_count(key), 3);
            let symbols: HashSet<char> = key.chars().collect();
            assert_eq!(symbols.len(), 3, "{} repeats a symbol", card.name);
        }
    }

    #[test]
    fn roster_is_stable() {
        assert_eq!(default_roster(), default_roster());
    }

    #[test]
    fn name_hash_matches_rolling_hash() {
        assert_eq!(name_hash(""), 0);
        assert_eq!(name_hash("a"), 97);
        assert_eq!(name_hash("ab"), 97 * 31 + 98);
    }

    #[test]
    fn matching_is_exact() {
        let roster = default_roster();
        let card = &roster[0];
        let key = card.summon_key().unwrap().to_string();
        let prefix: String = key.chars().take(2).collect();
        assert_eq!(find_by_combination(&roster, &key).map(|c| &c.id), Some(&card.id));
        assert!(find_by_combination(&roster, &prefix)
            .map(|c| c.id != card.id)
            .unwrap_or(true));
        assert!(find_by_combination(&roster, "").is_none());
        assert!(find_by_combination(&roster, &format!("{}✨", key)).is_none());
    }

    #[test]
    fn energy_text_is_read_leniently() {
        assert_eq!(parse_energy("800"), 800);
        assert_eq!(parse_energy(" 950 BP"), 950);
        assert_eq!(parse_energy("-300"), 0);
        assert_eq!(parse_energy("lots"), 0);
    }

    #[test]
    fn validation_rejects_long_and_taken_keys() {
        let roster = default_roster();
        let taken = roster[1].summon_key().unwrap().to_string();
        assert!(validate_combination(&roster, "new", "🔥🔥🔥🔥").is_err());
        assert!(validate_combination(&roster, "new", &taken).is_err());
        assert!(validate_combination(&roster, &roster[1].id, &taken).is_ok());
        assert!(validate_combination(&roster, "new", "").is_ok());
    }
}
