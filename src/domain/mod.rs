//! Domain models and types for cardsync.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`CardId`], [`OracleId`], [`RunId`])
//! - **The card model** ([`CardRecord`] as decoded, plus storage-facing wrappers)
//! - **Error types** ([`CardSyncError`], [`ProviderError`], [`DecodeError`])
//! - **Result type alias** ([`Result`])
//!
//! # Two identities
//!
//! A card is diffed by its external key and stored under its internal identity.
//! The newtypes keep the two from being mixed up:
//!
//! ```rust
//! use cardsync::domain::{CardId, OracleId};
//! use std::str::FromStr;
//!
//! let key = OracleId::from_str("0004ebd0-dfd6-4276-b4a6-de0003e94237").unwrap();
//! let id = CardId::new();
//!
//! // This won't compile - the types are distinct
//! // let wrong: CardId = key;
//! # let _ = (key, id);
//! ```

pub mod card;
pub mod errors;
pub mod ids;
pub mod result;

// Re-export commonly used types for convenience
pub use card::{
    CardFace, CardRecord, CardUpdate, ExistingCard, ImageUris, Legalities, Legality, NewCard,
    Prices, RelatedCard, StoredCard,
};
pub use errors::{CardSyncError, DecodeError, ProviderError};
pub use ids::{CardId, OracleId, RunId};
pub use result::Result;
