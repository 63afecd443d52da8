//! storyfork-core library.
//!
//! Stories grow as trees of contributions. Readers like branches, and each
//! like may move the "main canon" flag among the children of one parent.
//!
//! # Conventions
//!
//! - **Errors**: library operations return [`error::StoreError`]; setup paths
//!   (opening databases, loading config) use `anyhow::Result` with context.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `debug!`).
//! - **Transactions**: everything that reads then writes goes through
//!   [`store::StoryStore::run_transaction`].

pub mod branches;
pub mod canon;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod rank;
pub mod store;
pub mod stories;

pub use canon::{LikeOutcome, PromotionPolicy, record_like, record_like_with};
pub use db::SqliteStore;
pub use error::{ErrorCode, StoreError};
pub use store::{MemoryStore, StoryStore};
