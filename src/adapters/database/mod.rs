//! Storage abstraction layer
//!
//! This module provides trait-based storage for cards and run history,
//! allowing cardsync to work with PostgreSQL or a process-local store.

pub mod factory;
pub mod traits;

pub use factory::{create_stores, Stores};
pub use traits::{CardStore, KeyIndex, RunStore};
