//! Game-state readout from console memory
//!
//! Reads the well-known WRAM offsets of the Gen-1 cartridge: current map,
//! badge bitmap, player coordinates, party roster with HP/level, and the
//! BCD-encoded money counter. Species come back as cartridge-internal ids
//! and are mapped to canonical pokedex numbers here.

use indexer_types::{GameState, PartyMember};

const ADDR_PARTY_COUNT: usize = 0xD163;
const ADDR_PARTY_DATA: usize = 0xD16B;
const ADDR_MONEY: usize = 0xD347;
const ADDR_BADGES: usize = 0xD356;
const ADDR_MAP_ID: usize = 0xD35E;
const ADDR_PLAYER_Y: usize = 0xD361;
const ADDR_PLAYER_X: usize = 0xD362;

/// One party entry in WRAM.
const PARTY_ENTRY_LEN: usize = 44;
const ENTRY_SPECIES: usize = 0;
const ENTRY_HP: usize = 1;
const ENTRY_LEVEL: usize = 0x21;
const ENTRY_MAX_HP: usize = 0x22;

const MAX_PARTY: usize = 6;

/// Lowest memory length that covers every offset we touch.
const MIN_MEMORY_LEN: usize = ADDR_PLAYER_X + 1;

/// Cartridge-internal species id -> pokedex number. Index 0 and glitch slots
/// map to 0.
const SPECIES_DEX: [u16; 191] = [
    0, 112, 115, 32, 35, 21, 100, 34, 80, 2, 103, 108, 102, 88, 94, 29, 31, 104, 111, 131, 59,
    151, 130, 90, 72, 92, 123, 120, 9, 127, 114, 0, 0, 58, 95, 22, 16, 79, 64, 75, 113, 67, 122,
    106, 107, 24, 47, 54, 96, 76, 0, 126, 0, 125, 82, 109, 0, 56, 86, 50, 128, 0, 0, 0, 83, 48,
    149, 0, 0, 0, 84, 60, 124, 146, 144, 145, 132, 52, 98, 0, 0, 0, 37, 38, 25, 26, 0, 0, 147,
    148, 140, 141, 116, 117, 0, 0, 27, 28, 138, 139, 39, 40, 133, 136, 135, 134, 66, 41, 23, 46,
    61, 62, 13, 14, 15, 0, 85, 57, 51, 49, 87, 0, 0, 10, 11, 12, 68, 0, 55, 97, 42, 150, 143,
    129, 0, 0, 89, 0, 99, 91, 0, 101, 36, 110, 53, 105, 0, 93, 63, 65, 17, 18, 121, 1, 3, 73, 0,
    118, 119, 0, 0, 0, 0, 77, 78, 19, 20, 33, 30, 74, 137, 142, 0, 81, 0, 0, 4, 7, 5, 8, 6, 0,
    0, 0, 0, 43, 44, 45, 69, 70, 71,
];

/// Map a cartridge-internal species id to its pokedex number (0 if glitch).
pub fn species_dex(internal_id: u8) -> u16 {
    SPECIES_DEX
        .get(internal_id as usize)
        .copied()
        .unwrap_or(0)
}

/// Human location name for a map id.
pub fn location_name(map_id: u8) -> String {
    let name = match map_id {
        0 => "Pallet Town",
        1 => "Viridian City",
        2 => "Pewter City",
        3 => "Cerulean City",
        4 => "Lavender Town",
        5 => "Vermilion City",
        6 => "Celadon City",
        7 => "Fuchsia City",
        8 => "Cinnabar Island",
        9 => "Indigo Plateau",
        10 => "Saffron City",
        12 => "Route 1",
        13 => "Route 2",
        14 => "Route 3",
        15 => "Route 4",
        16 => "Route 5",
        17 => "Route 6",
        18 => "Route 7",
        19 => "Route 8",
        20 => "Route 9",
        21 => "Route 10",
        22 => "Route 11",
        23 => "Route 12",
        24 => "Route 13",
        25 => "Route 14",
        26 => "Route 15",
        27 => "Route 16",
        28 => "Route 17",
        29 => "Route 18",
        30 => "Sea Route 19",
        31 => "Sea Route 20",
        32 => "Sea Route 21",
        33 => "Route 22",
        34 => "Route 23",
        35 => "Route 24",
        36 => "Route 25",
        37 => "Red's House 1F",
        38 => "Red's House 2F",
        39 => "Blue's House",
        40 => "Oak's Lab",
        45 => "Viridian Gym",
        51 => "Viridian Forest",
        54 => "Pewter Gym",
        59 => "Mt. Moon 1F",
        60 => "Mt. Moon B1F",
        61 => "Mt. Moon B2F",
        65 => "Cerulean Gym",
        92 => "Vermilion Gym",
        _ => return format!("Unknown Area ({map_id})"),
    };
    name.to_string()
}

/// Decode three packed-BCD bytes into a decimal value (up to 999999).
pub fn decode_bcd(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, byte| {
        let hi = (byte >> 4) as u32;
        let lo = (byte & 0x0f) as u32;
        acc * 100 + hi * 10 + lo
    })
}

/// Read a full game snapshot. Returns None if the memory view is too short
/// to cover the fixed offsets (core not initialized yet).
pub fn read_game_state(memory: &[u8]) -> Option<GameState> {
    if memory.len() < MIN_MEMORY_LEN {
        return None;
    }

    let badges = memory[ADDR_BADGES];
    let party_count = memory[ADDR_PARTY_COUNT].min(MAX_PARTY as u8);

    let mut party = Vec::with_capacity(party_count as usize);
    for slot in 0..party_count as usize {
        let base = ADDR_PARTY_DATA + slot * PARTY_ENTRY_LEN;
        if base + PARTY_ENTRY_LEN > memory.len() {
            break;
        }
        party.push(PartyMember {
            species: species_dex(memory[base + ENTRY_SPECIES]),
            current_hp: u16::from_be_bytes([memory[base + ENTRY_HP], memory[base + ENTRY_HP + 1]]),
            max_hp: u16::from_be_bytes([
                memory[base + ENTRY_MAX_HP],
                memory[base + ENTRY_MAX_HP + 1],
            ]),
            level: memory[base + ENTRY_LEVEL],
        });
    }

    Some(GameState {
        location: location_name(memory[ADDR_MAP_ID]),
        badges,
        badge_count: badges.count_ones() as u8,
        player_x: memory[ADDR_PLAYER_X],
        player_y: memory[ADDR_PLAYER_Y],
        party_count,
        party,
        money: decode_bcd(&memory[ADDR_MONEY..ADDR_MONEY + 3]),
    })
}
