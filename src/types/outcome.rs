use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PredictorError;

/// Number of distinct outcomes (and classifier classes).
pub const NUM_OUTCOMES: usize = 3;

/// Result of a single round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Banker,
    Player,
    Tie,
}

impl Outcome {
    /// All outcomes in code order.
    pub const ALL: [Outcome; NUM_OUTCOMES] = [Outcome::Banker, Outcome::Player, Outcome::Tie];

    pub fn code(&self) -> u8 {
        match self {
            Outcome::Banker => 0,
            Outcome::Player => 1,
            Outcome::Tie => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Outcome::Banker),
            1 => Some(Outcome::Player),
            2 => Some(Outcome::Tie),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Banker => "Banker",
            Outcome::Player => "Player",
            Outcome::Tie => "Tie",
        }
    }

    /// Parse a user-submitted label.
    ///
    /// Surrounding whitespace is stripped and the label is capitalised
    /// ("  bAnKeR " becomes "Banker") before matching the canonical names.
    pub fn parse_label(raw: &str) -> Result<Self, PredictorError> {
        let normalized = capitalize(raw.trim());
        match normalized.as_str() {
            "Banker" => Ok(Outcome::Banker),
            "Player" => Ok(Outcome::Player),
            "Tie" => Ok(Outcome::Tie),
            _ => Err(PredictorError::InvalidOutcomeLabel(raw.to_string())),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

impl FromStr for Outcome {
    type Err = PredictorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Outcome::parse_label(s)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
