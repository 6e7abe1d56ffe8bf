pub mod args;
mod cache;
pub mod commands;
mod config;
mod error;
pub mod model;
mod registry;
pub mod store;
pub mod sync;
mod utils;
pub mod voice;

pub use cache::LocalCache;
pub use config::{BackendKind, Config};
pub use error::{Result, StoreError, SyncError};
pub use registry::Registry;
