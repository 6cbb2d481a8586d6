//! Profile store for the habit tracker.
//!
//! Owns the flat JSON profile file that the sync job later mirrors into the
//! relational store: registration with Argon2id credential hashing, login,
//! profile CRUD, and appending scheduled habits or history entries.

#![forbid(unsafe_code)]

pub mod error;
pub mod password;
pub mod repository;
pub mod service;

pub use error::{RepositoryError, StoreError, StoreResult};
pub use password::{hash_password, verify_password};
pub use repository::{InMemoryRepository, JsonFileRepository, ProfileRepository};
pub use service::{
    DEFAULT_CATEGORY, NewHistoryEntry, NewProfile, NewScheduledHabit, ProfileService,
    ProfileUpdate,
};
