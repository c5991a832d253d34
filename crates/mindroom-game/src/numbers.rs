//! Dealing: splits a random subset of the number range into sorted hands.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::GameError;

/// Every number that can be dealt.
pub const NUMBER_RANGE: RangeInclusive<u8> = 1..=100;

/// Count of values in [`NUMBER_RANGE`].
pub const RANGE_SIZE: usize = 100;

/// Checks that `player_count` hands of `numbers_per_player` fit in the range.
///
/// Returns the total count of numbers that would be dealt.
pub fn check_capacity(
    numbers_per_player: u8,
    player_count: usize,
) -> Result<usize, GameError> {
    let requested = usize::from(numbers_per_player) * player_count;
    if requested > RANGE_SIZE {
        return Err(GameError::CapacityExceeded {
            requested,
            available: RANGE_SIZE,
        });
    }
    Ok(requested)
}

/// Deals hands using the thread-local RNG.
pub fn generate_all_player_numbers(
    numbers_per_player: u8,
    player_count: usize,
) -> Result<Vec<Vec<u8>>, GameError> {
    generate_all_player_numbers_with(
        &mut rand::rng(),
        numbers_per_player,
        player_count,
    )
}

/// Deals `player_count` disjoint hands of `numbers_per_player` numbers.
///
/// Unique values are sampled from [`NUMBER_RANGE`] until enough are
/// collected, shuffled, cut into consecutive chunks, and each chunk is
/// sorted. Hands are sorted internally; there is no ordering between hands.
pub fn generate_all_player_numbers_with<R: Rng>(
    rng: &mut R,
    numbers_per_player: u8,
    player_count: usize,
) -> Result<Vec<Vec<u8>>, GameError> {
    let needed = check_capacity(numbers_per_player, player_count)?;
    let hand_size = usize::from(numbers_per_player);
    if hand_size == 0 {
        return Ok(vec![Vec::new(); player_count]);
    }

    let mut seen = HashSet::with_capacity(needed);
    let mut pool = Vec::with_capacity(needed);
    while pool.len() < needed {
        let candidate = rng.random_range(NUMBER_RANGE);
        if seen.insert(candidate) {
            pool.push(candidate);
        }
    }
    pool.shuffle(rng);

    let hands = pool
        .chunks(hand_size)
        .map(|chunk| {
            let mut hand = chunk.to_vec();
            hand.sort_unstable();
            hand
        })
        .collect();
    Ok(hands)
}
