//! Team balancing and cosmetic match payloads
//!
//! Solo and chaos drafts are split into two sides by sorting the six
//! players by rating ascending and alternating assignment, which keeps the
//! side averages close without stacking the two strongest players together.
//! Fixed-team drafts pass through unchanged: team composition is a player
//! commitment, not a matchmaking decision.
//!
//! The cosmetic payloads (map suggestions, chaos draws) are display-only
//! and never consulted by settlement logic.

use crate::types::{CosmeticPayload, PlayerId, RatedPlayer, Team, MATCH_SIZE, SIDE_SIZE};
use rand::seq::{IndexedRandom, SliceRandom};

/// Maps suggested for solo and fixed-team matches
pub const STANDARD_MAPS: &[&str] = &[
    "Hard Rock Mine",
    "Gem Fort",
    "Undermine",
    "Triple Dribble",
    "Center Stage",
    "Junior League",
    "Shooting Star",
    "Layer Cake",
    "Secret Hideout",
    "Hot Potato",
    "Safe Zone",
    "Bridge Too Far",
    "Open Business",
    "Ring of Fire",
    "Belle's Rock",
    "Goldarm Gulch",
];

/// Map pool for chaos matches
pub const CHAOS_MAPS: &[&str] = &[
    "Hard Rock Mine",
    "Gem Fort",
    "Undermine",
    "Double Swoosh",
    "Triple Dribble",
    "Center Stage",
    "Shooting Star",
    "Canal Grande",
    "Backyard Bowl",
    "Super Stadium",
    "Sneaky Fields",
    "Pinball Dreams",
    "Penalty Kick",
    "Kaboom Canyon",
    "Pit Stop",
    "Safe Zone",
    "Belle's Rock",
    "Goldarm Gulch",
    "Island Invasion",
    "Out in the Open",
    "Flaring Phoenix",
    "Skull Creek",
    "Dry Season",
    "Parallel Plays",
    "Dueling Beetles",
    "Split",
];

/// Brawler pool for the chaos one-per-participant draw
pub const BRAWLERS: &[&str] = &[
    "Shelly", "Nita", "Colt", "Bull", "Jessie", "Brock", "Dynamike", "Bo", "Tick", "8-Bit",
    "Emz", "El Primo", "Barley", "Poco", "Rosa", "Penny", "Carl", "Jacky", "Rico", "Darryl",
    "Piper", "Pam", "Frank", "Bibi", "Bea", "Nani", "Edgar", "Griff", "Grom", "Mortis",
    "Tara", "Gene", "Max", "Sprout", "Byron", "Squeak", "Lou", "Belle", "Buzz", "Ash",
    "Lola", "Eve", "Janet", "Fang", "Spike", "Crow", "Leon", "Sandy", "Amber", "Meg",
];

/// Modifier pool for chaos matches
pub const MODIFIERS: &[&str] = &[
    "Double Speed",
    "Double Damage",
    "Double Health",
    "Fast Reload",
    "Fast Super Charge",
    "Random Invisibility",
    "Permanent Shield",
    "Bouncing Projectiles",
    "Constant Healing",
    "Random Teleports",
    "Low Gravity",
    "Giant Size",
    "Tiny Size",
    "Homing Missiles",
    "Death Explosion",
    "Double Jump",
    "Moving Walls",
    "Lava Floor",
    "Fog of War",
    "Energy Boost",
    "Night Vision",
    "Rage Mode",
    "Total Chaos",
];

/// Number of map suggestions attached to non-chaos matches
const MAP_SUGGESTIONS: usize = 3;

/// Partition six rated players into two sides by the snake rule
///
/// Panics if the input size is wrong; that is an upstream bug, not a
/// user-facing condition.
pub fn split_sides(rated: &[RatedPlayer]) -> (Vec<PlayerId>, Vec<PlayerId>) {
    assert_eq!(
        rated.len(),
        MATCH_SIZE,
        "side split requires exactly {} players",
        MATCH_SIZE
    );

    let mut ordered: Vec<&RatedPlayer> = rated.iter().collect();
    // Stable sort keeps join order among equal ratings
    ordered.sort_by_key(|p| p.rating);

    let mut side_a = Vec::with_capacity(SIDE_SIZE);
    let mut side_b = Vec::with_capacity(SIDE_SIZE);
    for (index, player) in ordered.iter().enumerate() {
        if index % 2 == 0 {
            side_a.push(player.id.clone());
        } else {
            side_b.push(player.id.clone());
        }
    }

    (side_a, side_b)
}

/// Two pre-formed teams become the two sides unchanged
///
/// Panics if either team is not a full 3-player roster.
pub fn team_sides(first: &Team, second: &Team) -> (Vec<PlayerId>, Vec<PlayerId>) {
    assert_eq!(
        first.members.len(),
        SIDE_SIZE,
        "side assignment requires full {}-player teams",
        SIDE_SIZE
    );
    assert_eq!(
        second.members.len(),
        SIDE_SIZE,
        "side assignment requires full {}-player teams",
        SIDE_SIZE
    );

    (first.members.clone(), second.members.clone())
}

/// Draw map suggestions without replacement
pub fn map_suggestions() -> CosmeticPayload {
    let mut pool: Vec<&str> = STANDARD_MAPS.to_vec();
    pool.shuffle(&mut rand::rng());
    pool.truncate(MAP_SUGGESTIONS);

    CosmeticPayload::MapSuggestions {
        maps: pool.into_iter().map(String::from).collect(),
    }
}

/// Draw the chaos payload: one map, six distinct brawlers, one modifier
pub fn chaos_draw() -> CosmeticPayload {
    let mut rng = rand::rng();

    let map = CHAOS_MAPS
        .choose(&mut rng)
        .expect("chaos map pool is non-empty")
        .to_string();
    let modifier = MODIFIERS
        .choose(&mut rng)
        .expect("modifier pool is non-empty")
        .to_string();

    let mut pool: Vec<&str> = BRAWLERS.to_vec();
    pool.shuffle(&mut rng);
    pool.truncate(MATCH_SIZE);

    CosmeticPayload::ChaosDraw {
        map,
        brawlers: pool.into_iter().map(String::from).collect(),
        modifier,
    }
}
