//! Diff engine
//!
//! Classifies incoming records against the key index loaded once before the
//! stream is consumed.

use crate::adapters::database::{CardStore, KeyIndex};
use crate::domain::ids::{CardId, OracleId};
use crate::domain::{CardRecord, Result};
use std::collections::HashSet;

/// Outcome of classifying one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Not stored yet
    Insert,
    /// Stored under `card_id`
    Update { card_id: CardId },
    /// Key already seen earlier in this run
    Skip,
}

/// Per-run diff state
///
/// Holds the key index of stored cards and the keys consumed so far. Both
/// are sized by the stored population and the distinct keys of the source,
/// never by the number of records pulled.
pub struct DiffEngine {
    existing: KeyIndex,
    seen: HashSet<OracleId>,
}

impl DiffEngine {
    pub fn new(existing: KeyIndex) -> Self {
        Self {
            existing,
            seen: HashSet::new(),
        }
    }

    /// Loads the key index from storage in one read
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub async fn load(store: &dyn CardStore) -> Result<Self> {
        let existing = store.load_key_index().await?;
        tracing::debug!(existing = existing.len(), "Loaded card key index");
        Ok(Self::new(existing))
    }

    /// Number of stored cards known to the index
    pub fn known_keys(&self) -> usize {
        self.existing.len()
    }

    /// Classifies a record and marks its key as consumed
    ///
    /// A record without an external key is always new.
    pub fn classify(&mut self, record: &CardRecord) -> Classification {
        let Some(key) = record.oracle_id else {
            return Classification::Insert;
        };

        if !self.seen.insert(key) {
            return Classification::Skip;
        }

        match self.existing.get(&key) {
            Some(existing) => Classification::Update {
                card_id: existing.id,
            },
            None => Classification::Insert,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::fixtures::card;
    use crate::domain::ExistingCard;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_classification_scenario() {
        let key_a = Uuid::new_v4();
        let key_b = Uuid::new_v4();
        let key_c = Uuid::new_v4();
        let stored_a = CardId::new();

        let mut index = KeyIndex::new();
        index.insert(
            OracleId::from_uuid(key_a),
            ExistingCard {
                id: stored_a,
                last_updated_on: Utc::now() - chrono::Duration::days(7),
            },
        );
        let mut engine = DiffEngine::new(index);

        assert_eq!(
            engine.classify(&card(Some(key_a), "A")),
            Classification::Update { card_id: stored_a }
        );
        assert_eq!(engine.classify(&card(Some(key_b), "B")), Classification::Insert);
        assert_eq!(engine.classify(&card(Some(key_c), "C")), Classification::Insert);
        assert_eq!(engine.classify(&card(Some(key_b), "B")), Classification::Skip);
    }

    #[test]
    fn test_missing_key_is_always_insert() {
        let mut engine = DiffEngine::new(KeyIndex::new());
        assert_eq!(engine.classify(&card(None, "Treasure")), Classification::Insert);
        assert_eq!(engine.classify(&card(None, "Treasure")), Classification::Insert);
    }

    #[test]
    fn test_repeated_existing_key_updates_once() {
        let key = Uuid::new_v4();
        let id = CardId::new();
        let mut index = KeyIndex::new();
        index.insert(
            OracleId::from_uuid(key),
            ExistingCard {
                id,
                last_updated_on: Utc::now(),
            },
        );
        let mut engine = DiffEngine::new(index);

        assert_eq!(engine.known_keys(), 1);
        assert_eq!(
            engine.classify(&card(Some(key), "Forest")),
            Classification::Update { card_id: id }
        );
        assert_eq!(engine.classify(&card(Some(key), "Forest")), Classification::Skip);
    }
}
