//! `usersync-recon`: reconciles user identities between a tabular export
//! and a line-delimited document snapshot.
//!
//! Pure engine crate: loads both sources, indexes and matches them, and
//! writes the linked, unmatched and report artifacts. No CLI dependencies.

pub mod artifact;
pub mod assemble;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod loader;
pub mod matcher;
pub mod model;
pub mod stats;

pub use config::SyncConfig;
pub use engine::{run, SyncOutcome};
pub use error::{ErrorKind, SyncError};
pub use model::{IdentityKey, LinkedUserRecord, RawRecord, SyncReport, UnmatchedUserRecord};
