use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use snafu::OptionExt;

use super::error::{TypesError, TypesResult, UnknownStageSnafu};

/// Guided ideation stage, in workflow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Problem,
    Market,
    Tech,
    Report,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Problem, Stage::Market, Stage::Tech, Stage::Report];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Problem => "problem",
            Self::Market => "market",
            Self::Tech => "tech",
            Self::Report => "report",
        }
    }

    pub fn next(&self) -> Option<Stage> {
        match self {
            Self::Problem => Some(Self::Market),
            Self::Market => Some(Self::Tech),
            Self::Tech => Some(Self::Report),
            Self::Report => None,
        }
    }

    /// Stages driven by conversation; the report stage only renders output.
    pub fn is_conversational(&self) -> bool {
        !matches!(self, Self::Report)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = TypesError;

    fn from_str(raw: &str) -> TypesResult<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == normalized)
            .context(UnknownStageSnafu {
                stage: "parse-stage",
                raw: raw.to_string(),
            })
    }
}
