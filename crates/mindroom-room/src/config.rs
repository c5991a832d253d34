//! Limits applied to room settings and seating.

use std::ops::RangeInclusive;

use mindroom_game::RoomConfig;

use crate::RoomError;

/// Server-side bounds on what a `create-room` request may ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomLimits {
    /// Allowed values for `maxLives`.
    pub max_lives: RangeInclusive<u8>,
    /// Allowed values for `numbersPerPlayer`.
    pub numbers_per_player: RangeInclusive<u8>,
    /// Seats per room.
    pub max_players: usize,
}

impl Default for RoomLimits {
    fn default() -> Self {
        Self {
            max_lives: 1..=10,
            numbers_per_player: 1..=20,
            max_players: 10,
        }
    }
}

impl RoomLimits {
    /// Fills missing settings with defaults and checks them against the
    /// limits. Nothing is created when this fails.
    pub fn resolve(
        &self,
        max_lives: Option<u8>,
        numbers_per_player: Option<u8>,
    ) -> Result<RoomConfig, RoomError> {
        let defaults = RoomConfig::default();
        let config = RoomConfig {
            max_lives: max_lives.unwrap_or(defaults.max_lives),
            numbers_per_player: numbers_per_player.unwrap_or(defaults.numbers_per_player),
        };

        if !self.max_lives.contains(&config.max_lives) {
            return Err(RoomError::InvalidConfig(format!(
                "maxLives must be between {} and {}, got {}",
                self.max_lives.start(),
                self.max_lives.end(),
                config.max_lives
            )));
        }
        if !self.numbers_per_player.contains(&config.numbers_per_player) {
            return Err(RoomError::InvalidConfig(format!(
                "numbersPerPlayer must be between {} and {}, got {}",
                self.numbers_per_player.start(),
                self.numbers_per_player.end(),
                config.numbers_per_player
            )));
        }
        Ok(config)
    }
}
