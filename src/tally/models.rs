use crate::error::PollError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three sentiment signals a participant can send.
///
/// The legacy `green` / `yellow` / `red` names are still accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// "With you"
    #[serde(alias = "green")]
    Agree,
    /// "Somewhat"
    #[serde(alias = "yellow")]
    Neutral,
    /// "Not with you"
    #[serde(alias = "red")]
    Disagree,
}

impl Color {
    pub const ALL: [Color; 3] = [Color::Agree, Color::Neutral, Color::Disagree];

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Agree => "agree",
            Color::Neutral => "neutral",
            Color::Disagree => "disagree",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Color {
    type Err = PollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agree" | "green" => Ok(Color::Agree),
            "neutral" | "yellow" => Ok(Color::Neutral),
            "disagree" | "red" => Ok(Color::Disagree),
            other => Err(PollError::InvalidColor(other.to_string())),
        }
    }
}

/// Snapshot of the three counters. Clients only ever hold copies of this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub agree: u64,
    pub neutral: u64,
    pub disagree: u64,
}

impl Tally {
    pub fn total(&self) -> u64 {
        self.agree + self.neutral + self.disagree
    }

    pub fn count(&self, color: Color) -> u64 {
        match color {
            Color::Agree => self.agree,
            Color::Neutral => self.neutral,
            Color::Disagree => self.disagree,
        }
    }

    pub(crate) fn increment(&mut self, color: Color) {
        let counter = match color {
            Color::Agree => &mut self.agree,
            Color::Neutral => &mut self.neutral,
            Color::Disagree => &mut self.disagree,
        };
        *counter = counter.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_and_legacy_names() {
        assert_eq!("agree".parse::<Color>().unwrap(), Color::Agree);
        assert_eq!("yellow".parse::<Color>().unwrap(), Color::Neutral);
        assert_eq!("red".parse::<Color>().unwrap(), Color::Disagree);
    }

    #[test]
    fn rejects_unknown_color() {
        let err = "blue".parse::<Color>().unwrap_err();
        assert!(matches!(err, PollError::InvalidColor(ref c) if c == "blue"));
    }

    #[test]
    fn tally_serializes_as_three_counters() {
        let tally = Tally {
            agree: 1,
            neutral: 0,
            disagree: 2,
        };
        let value = serde_json::to_value(tally).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"agree": 1, "neutral": 0, "disagree": 2})
        );
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn legacy_color_serializes_canonically() {
        let color: Color = serde_json::from_str("\"green\"").unwrap();
        assert_eq!(serde_json::to_string(&color).unwrap(), "\"agree\"");
    }
}
