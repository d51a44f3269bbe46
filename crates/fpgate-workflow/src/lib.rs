//! Transactional workflow over the fingerprint sensor and the record store.
//!
//! [`AccessController`] sequences each operation as a sensor command
//! followed, only on success, by the matching store update. Errors report
//! which side failed; [`WorkflowError::is_inconsistent`] flags the case
//! where the sensor changed and the store did not.

pub mod controller;
pub mod error;

pub use controller::{AccessController, DeleteOutcome, VerifiedAccess};
pub use error::{Operation, WorkflowError, WorkflowResult};
