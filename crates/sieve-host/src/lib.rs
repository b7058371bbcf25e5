//! Sieve Host Runtime
//!
//! Owns the live filter state for an embedding application:
//!
//! - `config`: engine configuration file
//! - `loader`: reading filter lists from disk
//! - `engine`: [`FilterEngine`], the shared index and settings with atomic swaps
//! - `listener`: applying settings changes pushed by the host
//! - `flush`: periodic persistence of the blocked-request count
//! - `store`: JSON file [`sieve_core::CountStore`]

pub mod config;
pub mod engine;
pub mod flush;
pub mod listener;
pub mod loader;
pub mod store;

pub use config::{ConfigError, EngineConfig};
pub use engine::{FilterEngine, ReloadError};
pub use flush::{spawn_count_flusher, FlusherHandle};
pub use listener::spawn_settings_listener;
pub use loader::{load_lists, read_list, LoadError, LoadedLists};
pub use store::JsonCountStore;
