pub mod cli;
pub mod config;
pub mod debug;
pub mod form;
pub mod models;
pub mod store;
pub mod tui;

// Re-export commonly used types for tests and external use
pub use models::*;
pub use store::{EntryStore, StoreError};
