//! Typed key/value storage over SQLite.
//!
//! # Intention
//!
//! - Persist values by key without writing connection plumbing per type.
//! - Keys are turned into text by a [`KeyResolver`] chosen by the key's type;
//!   `String`, `Uuid` and the common integer types are built in.
//! - Each value type gets a [`ValueResolver`] that owns its table and SQL.
//!   [`JsonValueResolver`] covers any serde type.
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/database code belongs here.
//! - Database work runs on blocking worker threads; the async API never
//!   blocks the runtime.
//!
//! # Example
//!
//! ```rust,no_run
//! use database_storage::{JsonValueResolver, Storage, StorageConfig};
//!
//! # async fn demo() -> database_storage::Result<()> {
//! let storage = Storage::builder(StorageConfig::file("profiles.db"))
//!     .value_resolver(JsonValueResolver::<Vec<String>>::new("friends")?)
//!     .open()
//!     .await?;
//!
//! storage.save(&"tofpu".to_string(), vec!["alex".to_string()]).await?;
//! let friends: Option<Vec<String>> = storage.retrieve(&"tofpu".to_string()).await?;
//! assert_eq!(friends.map(|f| f.len()), Some(1));
//! storage.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod key;
pub mod logging;
pub mod repository;
pub mod sqlite;
pub mod storage;
pub mod value;

pub use config::StorageConfig;
pub use error::{Result, StorageError};
pub use key::{KeyResolver, KeyResolvers, NumberKeyResolver, StringKeyResolver, UuidKeyResolver};
pub use repository::{Repository, TypedRepository};
pub use storage::{Storage, StorageBuilder};
pub use value::{JsonValueResolver, ValueResolver, ValueResolvers};
