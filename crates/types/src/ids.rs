use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use uuid::Uuid;

use super::error::{InvalidCorrelationIdSnafu, TypesError, TypesResult};

/// Client-minted id attached to an outgoing message so the server's echo can be
/// matched back to the optimistic entry without comparing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    pub fn new(raw: Uuid) -> Self {
        Self(raw)
    }

    /// Time-ordered ids keep two sends issued in the same millisecond distinct.
    pub fn new_v7() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn parse(raw: &str) -> TypesResult<Self> {
        let parsed = Uuid::parse_str(raw.trim()).context(InvalidCorrelationIdSnafu {
            stage: "parse-correlation-id",
            raw: raw.to_string(),
        })?;
        Ok(Self(parsed))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(value: Uuid) -> Self {
        Self::new(value)
    }
}

impl FromStr for CorrelationId {
    type Err = TypesError;

    fn from_str(raw: &str) -> TypesResult<Self> {
        Self::parse(raw)
    }
}
