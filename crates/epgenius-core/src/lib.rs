//! `EPGenius` Core Library
//!
//! Status and eligibility core for the `EPGenius` assistant:
//! - Registry caches with graceful degradation (live, memory, disk)
//! - Fuzzy owner resolution and registry lookups
//! - Update-eligibility rules over heterogeneous timestamps
//! - Edge-triggered availability monitoring and notifications
//! - Configuration resolution and common error types
//!
//! Network and filesystem access go through the collaborator traits in
//! [`source`], [`records`], [`monitor`] and [`notify`]; the daemon crate
//! provides the HTTP implementations.

pub mod cache;
pub mod clock;
pub mod config;
pub mod drive;
pub mod eligibility;
pub mod error;
pub mod lookup;
pub mod monitor;
pub mod notify;
pub mod records;
pub mod registry;
pub mod resolver;
pub mod sentinel;
pub mod snapshot;
pub mod source;
pub mod status;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod timestamp;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, FetchError, PersistError, Result};
pub use registry::{RegistryEntry, RegistrySnapshot};
