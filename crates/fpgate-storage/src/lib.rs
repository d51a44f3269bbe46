//! Record store for the fingerprint access workflow.
//!
//! SQLite persistence via sqlx for two tables:
//!
//! - `enrolled_identities`: one row per sensor slot holding a template
//! - `access_logs`: append-only audit trail of verify and delete outcomes
//!
//! The workflow controller talks to the store through the [`RecordStore`]
//! trait. [`SqliteRecordStore`] implements it on top of the repositories
//! and runs the two-table updates inside a transaction.
//!
//! # Examples
//!
//! ```no_run
//! use fpgate_storage::{Database, DatabaseConfig, RecordStore, SqliteRecordStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("fpgate.db")).await?;
//! let store = SqliteRecordStore::new(db);
//!
//! for identity in store.list_identities().await? {
//!     println!("{:>3}  {}", identity.id, identity.name);
//! }
//!
//! for entry in store.list_recent_logs(20).await? {
//!     println!("{} {} {}", entry.timestamp, entry.name, entry.status);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Consistency
//!
//! A row in `enrolled_identities` is written only after the sensor confirmed
//! the enrollment. The store cannot enforce that on its own; a crash between
//! the sensor step and the store step leaves the two out of sync.

pub mod connection;
pub mod error;
pub mod models;
pub mod repositories;
pub mod store;
pub mod transaction;

pub use connection::{Database, DatabaseConfig};
pub use error::{StoreError, StoreResult};
pub use models::{AccessLogEntry, AccessStatus, EnrolledIdentity};
pub use repositories::{
    AccessLogRepository, IdentityRepository, SqliteAccessLogRepository, SqliteIdentityRepository,
};
pub use store::{RecordStore, SqliteRecordStore};
