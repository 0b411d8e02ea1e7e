//! Shared utilities for stencil crates
//!
//! - [`logging`]: tracing subscriber initialisation and error cause-chain formatting
//! - [`json_store`]: JSON persistence with case-insensitive key loading
//! - [`collection`]: mutex-guarded map with snapshot reads

pub mod collection;
pub mod json_store;
pub mod logging;

pub use collection::SyncMap;
pub use json_store::{
    load_json, load_json_with_keys, save_json_atomic, JsonStoreError, JsonStoreResult, KeyMap,
};
pub use logging::{format_error, init as init_logging, LogLevel, LogOptions, LoggingError};
