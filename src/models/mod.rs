//! Data models for the source control dispatcher.
//!
//! - [`Provider`]: an installed provider (name plus module path)
//! - [`ProjectContext`]: the identity of an open source control project
//! - [`Status`]: per-file state, derived from the provider's raw bitmask
//! - [`SccCode`] / [`SccCaps`]: provider result codes and capability mask
//! - [`SccConfig`]: user settings loaded from `Decoda SCC.yaml`

pub mod config;
pub mod provider;
pub mod status;

pub use config::{ProviderManifest, SccConfig, SccSettings};
pub use provider::{ProjectContext, Provider, WindowHandle};
pub use status::{SccCaps, SccCode, Status, raw};
