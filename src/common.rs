// == Std
use std::{borrow::Borrow, fmt::Display, str::FromStr};

// == External crates
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with Urn
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrnError {
    #[error("A urn cannot be empty or whitespace only")]
    Empty,
}

/// Newtype for the opaque identifier of a folder or subfolder node, as supplied by the backend.
/// Urns received from the backend are kept verbatim, whitespace included, so they can be sent back unchanged. Urns
/// typed by a user go through `new`, which trims them and rejects blank input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Urn(String);

impl Display for Urn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Urn {
    /// Creates a new Urn from user input, trimming surrounding whitespace
    pub fn new(urn: impl AsRef<str>) -> Result<Self, UrnError> {
        let trimmed = urn.as_ref().trim();
        if trimmed.is_empty() {
            return Err(UrnError::Empty);
        }

        Ok(Urn(trimmed.to_string()))
    }

    /// Returns the string representation of the urn
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the urn is empty or whitespace only. Only possible for urns that came from the backend.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl FromStr for Urn {
    type Err = UrnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Urn::new(s)
    }
}

impl Borrow<str> for Urn {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Urn {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Urn {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
