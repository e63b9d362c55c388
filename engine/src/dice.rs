use indexmap::IndexMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use thiserror::Error;

use crate::i18n::Translator;

/// Die types offered by the tray, in display order.
pub const DIE_TYPES: [u32; 7] = [4, 6, 8, 10, 12, 20, 100];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiceError {
    #[error("unsupported die: d{0}")]
    UnsupportedDie(u32),
    #[error("invalid dice notation (expected XdY), got: {0}")]
    BadNotation(String),
}

enum Source {
    Rng(ChaCha8Rng),
    Scripted { values: Vec<u32>, next: usize },
}

pub struct Dice {
    source: Source,
}

impl Dice {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            source: Source::Rng(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            source: Source::Rng(ChaCha8Rng::from_entropy()),
        }
    }

    /// Replays `values` in order (cycling), clamped to each die's range.
    pub fn from_scripted(values: Vec<u32>) -> Self {
        Self {
            source: Source::Scripted { values, next: 0 },
        }
    }

    /// Uniform in `1..=sides`.
    pub fn roll(&mut self, sides: u32) -> u32 {
        let sides = sides.max(1);
        match &mut self.source {
            Source::Rng(rng) => rng.gen_range(1..=sides),
            Source::Scripted { values, next } => {
                if values.is_empty() {
                    return 1;
                }
                let v = values[*next % values.len()];
                *next += 1;
                v.clamp(1, sides)
            }
        }
    }
}

/// Parse `XdY` (case-insensitive), e.g. `2d6` or `1D20`.
pub fn parse_notation(s: &str) -> Result<(u32, u32), DiceError> {
    let bad = || DiceError::BadNotation(s.to_string());
    let lowered = s.trim().to_lowercase();
    let (count, sides) = lowered.split_once('d').ok_or_else(bad)?;
    let count: u32 = count.parse().map_err(|_| bad())?;
    let sides: u32 = sides.parse().map_err(|_| bad())?;
    if count == 0 {
        return Err(bad());
    }
    if !DIE_TYPES.contains(&sides) {
        return Err(DiceError::UnsupportedDie(sides));
    }
    Ok((count, sides))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollGroup {
    pub sides: u32,
    pub results: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrayRoll {
    pub groups: Vec<RollGroup>,
    pub total: u32,
}

impl TrayRoll {
    /// The localized results block. Rendering again in another language shows
    /// the same results.
    pub fn render(&self, tr: &Translator) -> String {
        let mut out = tr.t("dice_results");
        for g in &self.groups {
            let values = g
                .results
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("\n{}D{}: {}", g.results.len(), g.sides, values));
        }
        out.push_str(&format!("\n{}: {}", tr.t("dice_total"), self.total));
        out
    }
}

/// How many of each die to throw on the next roll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceTray {
    counters: IndexMap<u32, u32>,
}

impl Default for DiceTray {
    fn default() -> Self {
        Self {
            counters: DIE_TYPES.iter().map(|&d| (d, 0)).collect(),
        }
    }
}

impl DiceTray {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&mut self, sides: u32) -> Result<&mut u32, DiceError> {
        self.counters
            .get_mut(&sides)
            .ok_or(DiceError::UnsupportedDie(sides))
    }

    pub fn add(&mut self, sides: u32) -> Result<u32, DiceError> {
        let c = self.counter(sides)?;
        *c += 1;
        Ok(*c)
    }

    pub fn set(&mut self, sides: u32, count: u32) -> Result<(), DiceError> {
        *self.counter(sides)? = count;
        Ok(())
    }

    /// Add the dice of an `XdY` term.
    pub fn add_notation(&mut self, notation: &str) -> Result<(), DiceError> {
        let (count, sides) = parse_notation(notation)?;
        *self.counter(sides)? += count;
        Ok(())
    }

    pub fn count(&self, sides: u32) -> u32 {
        self.counters.get(&sides).copied().unwrap_or(0)
    }

    pub fn reset(&mut self, sides: u32) -> Result<(), DiceError> {
        self.set(sides, 0)
    }

    pub fn reset_all(&mut self) {
        self.counters.values_mut().for_each(|c| *c = 0);
    }

    pub fn is_empty(&self) -> bool {
        self.counters.values().all(|&c| c == 0)
    }

    /// Roll every non-zero counter in die order. `None` when the tray is empty.
    pub fn roll(&self, dice: &mut Dice) -> Option<TrayRoll> {
        if self.is_empty() {
            return None;
        }
        let groups: Vec<RollGroup> = self
            .counters
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(&sides, &count)| RollGroup {
                sides,
                results: (0..count).map(|_| dice.roll(sides)).collect(),
            })
            .collect();
        let total = groups.iter().flat_map(|g| g.results.iter()).sum();
        Some(TrayRoll { groups, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_values_are_clamped_to_the_die() {
        let mut dice = Dice::from_scripted(vec![9, 0]);
        assert_eq!(dice.roll(6), 6);
        assert_eq!(dice.roll(6), 1);
        assert_eq!(dice.roll(20), 9);
    }

    #[test]
    fn notation_parsing() {
        assert_eq!(parse_notation("2d6"), Ok((2, 6)));
        assert_eq!(parse_notation(" 1D100 "), Ok((1, 100)));
        assert_eq!(parse_notation("3d7"), Err(DiceError::UnsupportedDie(7)));
        assert!(matches!(parse_notation("0d6"), Err(DiceError::BadNotation(_))));
        assert!(matches!(parse_notation("d6"), Err(DiceError::BadNotation(_))));
        assert!(matches!(parse_notation("2x6"), Err(DiceError::BadNotation(_))));
    }
}
