pub mod access_log;
pub mod identity;

pub use access_log::{AccessLogEntry, AccessStatus};
pub use identity::EnrolledIdentity;
