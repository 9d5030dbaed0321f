//! Request identity - prefixed ULIDs for HR requests

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// Prefix carried by every HR request id
pub const REQUEST_PREFIX: &str = "HRQ";

/// Unique identifier for an HR request (e.g. `HRQ-01KCWY20F01B21V0G4E835NW3J`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(Ulid);

impl RequestId {
    /// Generate a fresh id
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Wrap an existing ULID
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn ulid(&self) -> Ulid {
        self.0
    }

    /// Short display form: prefix plus the first 8 ULID characters
    pub fn short(&self) -> String {
        let body = self.0.to_string();
        format!("{}-{}", REQUEST_PREFIX, &body[..8])
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", REQUEST_PREFIX, self.0)
    }
}

/// Errors from parsing a request id
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error("missing '{REQUEST_PREFIX}-' prefix in id: {0}")]
    MissingPrefix(String),

    #[error("invalid ULID in id {id}: {reason}")]
    InvalidUlid { id: String, reason: String },
}

impl FromStr for RequestId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let body = s
            .split_once('-')
            .filter(|(prefix, _)| prefix.eq_ignore_ascii_case(REQUEST_PREFIX))
            .map(|(_, body)| body)
            .ok_or_else(|| IdParseError::MissingPrefix(s.to_string()))?;

        let ulid = Ulid::from_string(body).map_err(|e| IdParseError::InvalidUlid {
            id: s.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self(ulid))
    }
}

impl Serialize for RequestId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
