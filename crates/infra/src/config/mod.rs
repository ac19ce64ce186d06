//! Configuration loading
//!
//! Reads [`spillway_domain::QueueOptions`] from environment variables and
//! config files. Validation stays with the options type itself.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, load_from_lookup, probe_config_paths};
