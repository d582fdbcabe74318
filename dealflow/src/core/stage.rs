//! Funnel stages a deal moves through.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the five ordered funnel stages.
///
/// The derived `Ord` follows funnel order, which is presentational only:
/// stage transitions are governed by [`TransitionPolicy`](super::TransitionPolicy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DealStage {
    /// A new opportunity that has not been qualified yet.
    Lead,
    /// The opportunity has been qualified.
    Qualified,
    /// A proposal has been sent.
    Proposal,
    /// Terms are being negotiated.
    Negotiation,
    /// The deal was won.
    #[serde(rename = "Closed Won")]
    ClosedWon,
}

/// Error returned when a string does not name a funnel stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown deal stage: '{0}'")]
pub struct UnknownStageError(pub String);

impl Default for DealStage {
    fn default() -> Self {
        Self::Lead
    }
}

impl fmt::Display for DealStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DealStage {
    type Err = UnknownStageError;

    /// Accepts the display label ("Closed Won") or its snake_case form
    /// ("closed_won"), ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', " ");
        Self::ALL
            .into_iter()
            .find(|stage| stage.label().to_ascii_lowercase() == normalized)
            .ok_or_else(|| UnknownStageError(s.to_string()))
    }
}

impl DealStage {
    /// All stages in funnel order.
    pub const ALL: [Self; 5] = [
        Self::Lead,
        Self::Qualified,
        Self::Proposal,
        Self::Negotiation,
        Self::ClosedWon,
    ];

    /// Number of funnel stages.
    pub const COUNT: usize = Self::ALL.len();

    /// Returns the display label used on the wire and in the UI.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Lead => "Lead",
            Self::Qualified => "Qualified",
            Self::Proposal => "Proposal",
            Self::Negotiation => "Negotiation",
            Self::ClosedWon => "Closed Won",
        }
    }

    /// Returns the win probability implied by this stage.
    #[must_use]
    pub const fn probability(self) -> u8 {
        match self {
            Self::Lead => 20,
            Self::Qualified => 40,
            Self::Proposal => 65,
            Self::Negotiation => 80,
            Self::ClosedWon => 100,
        }
    }

    /// Returns the zero-based position in the funnel.
    #[must_use]
    pub const fn position(self) -> usize {
        match self {
            Self::Lead => 0,
            Self::Qualified => 1,
            Self::Proposal => 2,
            Self::Negotiation => 3,
            Self::ClosedWon => 4,
        }
    }

    /// Returns true unless the deal has been won.
    #[must_use]
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::ClosedWon)
    }

    /// The next stage in funnel order, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.position() + 1).copied()
    }

    /// The previous stage in funnel order, if any.
    #[must_use]
    pub fn previous(self) -> Option<Self> {
        self.position().checked_sub(1).map(|i| Self::ALL[i])
    }
}
