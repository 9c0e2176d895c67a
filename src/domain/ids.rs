//! Domain identifier types
//!
//! Newtype wrappers keep the two identities of a card apart: the internal
//! [`CardId`] assigned locally at first insertion, and the external
//! [`OracleId`] supplied by the dataset and used only for diffing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Internal card identity
///
/// Assigned once when a card is first inserted and stable for the card's
/// lifetime in local storage. Unrelated to any identifier in the source.
///
/// # Examples
///
/// ```
/// use cardsync::domain::ids::CardId;
///
/// let a = CardId::new();
/// let b = CardId::new();
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(Uuid);

impl CardId {
    /// Generates a fresh random identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID (e.g. loaded from storage)
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External key of a card
///
/// Scryfall's `oracle_id`, shared by every printing of the same card.
///
/// # Examples
///
/// ```
/// use cardsync::domain::ids::OracleId;
/// use std::str::FromStr;
///
/// let key = OracleId::from_str("0004ebd0-dfd6-4276-b4a6-de0003e94237").unwrap();
/// assert_eq!(key.to_string(), "0004ebd0-dfd6-4276-b4a6-de0003e94237");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OracleId(Uuid);

impl OracleId {
    /// Wraps an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for OracleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OracleId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| format!("Invalid oracle id '{s}': {e}"))
    }
}

/// Synchronization run identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a fresh run identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| format!("Invalid run id '{s}': {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_id_parse() {
        let key = OracleId::from_str("0004ebd0-dfd6-4276-b4a6-de0003e94237").unwrap();
        assert_eq!(key.to_string(), "0004ebd0-dfd6-4276-b4a6-de0003e94237");
    }

    #[test]
    fn test_oracle_id_rejects_garbage() {
        assert!(OracleId::from_str("not-a-uuid").is_err());
        assert!(OracleId::from_str("").is_err());
    }

    #[test]
    fn test_oracle_id_serde_transparent() {
        let json = "\"0004ebd0-dfd6-4276-b4a6-de0003e94237\"";
        let key: OracleId = serde_json::from_str(json).unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), json);
    }

    #[test]
    fn test_card_ids_are_unique() {
        assert_ne!(CardId::new(), CardId::new());
    }

    #[test]
    fn test_run_id_round_trip_through_str() {
        let id = RunId::new();
        let parsed = RunId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }
}
