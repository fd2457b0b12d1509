// Decoda SCC - source control command dispatcher for the Decoda Lua debugger
//
// This is the library crate containing the provider binding, the worker thread
// dispatcher and the synchronous facade. The binary crate (main.rs) provides a
// command line driver over the same facade.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use models::{ProjectContext, Provider, SccCaps, SccCode, SccConfig, Status, WindowHandle};
pub use services::{SourceControl, SourceControlOptions};
pub use state::{Phase, SessionChange, SessionManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
