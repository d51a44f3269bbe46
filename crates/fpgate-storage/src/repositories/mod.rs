pub mod access_log;
pub mod identity;

pub use access_log::{AccessLogRepository, SqliteAccessLogRepository};
pub use identity::{IdentityRepository, SqliteIdentityRepository};
