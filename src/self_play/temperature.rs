use std::str::FromStr;

use itertools::Itertools;

use crate::error::{Error, Result};

/// Move selection temperature as a function of the move number.
#[derive(Clone, Debug, PartialEq)]
pub struct TemperaturePolicy {
    temperatures: Vec<(usize, f32)>,
    last_temperature: f32,
}

impl Default for TemperaturePolicy {
    /// Proportional sampling for the first 30 moves, arg-max after that
    fn default() -> Self {
        Self {
            temperatures: vec![(30, 1.0)],
            last_temperature: 0.0,
        }
    }
}

impl TemperaturePolicy {
    pub fn constant(temperature: f32) -> Self {
        assert!(temperature >= 0.0);
        Self {
            temperatures: Vec::new(),
            last_temperature: temperature,
        }
    }

    /// Temperatures for the moves before each threshold, then `last_temperature` for the rest of the game
    pub fn scheduled(temperatures: Vec<(usize, f32)>, last_temperature: f32) -> Result<Self> {
        let valid_temperature = |t: f32| t.is_finite() && t >= 0.0;
        if !temperatures.iter().all(|(_n, t)| valid_temperature(*t)) || !valid_temperature(last_temperature) {
            return Err(Error::InvalidConfig("temperatures must be non negative numbers".to_string()));
        }
        if !temperatures.windows(2).all(|w| w[0].0 < w[1].0) {
            return Err(Error::InvalidConfig("move thresholds must be strictly increasing".to_string()));
        }
        Ok(Self {
            temperatures,
            last_temperature,
        })
    }

    pub fn get_temperature(&self, move_num: usize) -> f32 {
        self.temperatures
            .iter()
            .find(|(threshold, _t)| move_num < *threshold)
            .map(|(_n, t)| *t)
            .unwrap_or(self.last_temperature)
    }
}

impl FromStr for TemperaturePolicy {
    type Err = Error;

    /// Parse a temperature policy from a string
    ///
    /// The string should contain an odd number of numbers, with a ',' between them. It is split into pairs of
    /// (moves_num, temperature) followed by a final temperature. Each pair assigns its temperature to the moves
    /// before moves_num that were not covered by a previous pair, and the pairs must be ordered by moves_num.
    ///
    /// # Examples
    ///
    /// "1.0" means a constant temperature of 1
    /// "30,1.0,0.0" means a temperature of 1.0 for the first 30 moves, and temperature of zero after that
    /// "15,2.0,30,0.5,0.1" means a temperature of 2.0 for the first 15 moves, 0.5 in the moves 16 up to 30, and 0.1
    /// after that
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = |reason: &str| Error::InvalidConfig(format!("temperature policy {:?}: {}", s, reason));

        let parts = s.split(',').map(str::trim).collect_vec();
        if parts.len() % 2 != 1 {
            return Err(invalid("expected an odd number of values"));
        }
        let parse_temperature = |t: &str| t.parse::<f32>().map_err(|_| invalid("temperatures must be numbers"));

        let mut temperatures = Vec::new();
        for (threshold, temperature) in parts[..parts.len() - 1].iter().tuples() {
            let threshold = threshold
                .parse::<usize>()
                .map_err(|_| invalid("move thresholds must be non negative integers"))?;
            temperatures.push((threshold, parse_temperature(*temperature)?));
        }
        let last_temperature = parse_temperature(parts[parts.len() - 1])?;

        Self::scheduled(temperatures, last_temperature).map_err(|e| invalid(&e.to_string()))
    }
}
