//! The fixed catalogue of project stages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a stage code is not one of `S1`..`S7`.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown stage code: {0}")]
pub struct UnknownStage(pub String);

/// Stage identifier carried in callback data and session files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageCode {
    S1,
    S2,
    S3,
    S4,
    S5,
    S6,
    S7,
}

impl StageCode {
    /// All stages in display order.
    pub const ALL: [Self; 7] = [
        Self::S1,
        Self::S2,
        Self::S3,
        Self::S4,
        Self::S5,
        Self::S6,
        Self::S7,
    ];

    /// Short code used in callback data.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::S1 => "S1",
            Self::S2 => "S2",
            Self::S3 => "S3",
            Self::S4 => "S4",
            Self::S5 => "S5",
            Self::S6 => "S6",
            Self::S7 => "S7",
        }
    }

    /// Human-readable stage name, also the row key in project sheets.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::S1 => "Etap 1",
            Self::S2 => "Etap 2",
            Self::S3 => "Etap 3",
            Self::S4 => "Etap 4",
            Self::S5 => "Etap 5",
            Self::S6 => "Etap 6",
            Self::S7 => "Prace dodatkowe",
        }
    }

    /// Last word of the name, used in the compact progress line.
    #[must_use]
    pub fn short_label(self) -> &'static str {
        self.name().rsplit(' ').next().unwrap_or(self.name())
    }
}

impl FromStr for StageCode {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.code() == s)
            .ok_or_else(|| UnknownStage(s.to_owned()))
    }
}

impl fmt::Display for StageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
