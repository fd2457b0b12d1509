//! Services module - the source control command dispatcher.
//!
//! Source control providers (MSSCCI plugins) are frequently not thread safe
//! and expect every call to arrive on the thread that initialized them. The
//! dispatcher therefore routes every provider call through one dedicated
//! worker thread, while presenting a blocking, synchronous API to the rest
//! of the debugger.
//!
//! # Components
//!
//! - [`registry`]: discovers installed providers once per process
//! - [`plugin`]: the [`SccApi`] binding seam and its result types
//! - [`native`]: [`NativePlugin`], a provider module loaded with `libloading`
//! - [`boundary`]: contains faults raised inside provider calls
//! - [`command`]: one [`Command`] variant per provider operation
//! - [`queue`]: the FIFO [`CommandQueue`] shared by producers and the worker
//! - [`worker`]: the worker thread that owns the binding
//! - [`source_control`]: [`SourceControl`], the synchronous facade
//!
//! # Flow
//!
//! 1. A caller invokes e.g. [`SourceControl::check_out`]
//! 2. The facade builds a [`Command`] and pushes it onto the queue
//! 3. The caller blocks on that command's own completion channel
//! 4. The worker pops commands in FIFO order and executes each one inside
//!    the call boundary
//! 5. The worker sends the [`CommandOutput`] back and the caller maps the
//!    provider result code to a `bool` or [`Status`](crate::models::Status)
//!
//! # Usage Example
//!
//! ```ignore
//! use decoda_scc::services::SourceControl;
//! use decoda_scc::models::WindowHandle;
//!
//! let scc = SourceControl::new();
//! if scc.initialize_name("Perforce", WindowHandle::NONE) {
//!     scc.check_out(&["scripts/main.lua"], "");
//! }
//! scc.shutdown();
//! ```

pub mod boundary;
pub mod command;
pub mod native;
pub mod plugin;
pub mod queue;
pub mod registry;
pub mod source_control;
pub mod worker;

pub use boundary::PluginFault;
pub use command::{Command, CommandOutput};
pub use native::NativePlugin;
pub use plugin::{BindError, PluginInfo, ProjectPathResult, QueryResult, SccApi};
pub use queue::CommandQueue;
pub use registry::{ProviderRegistry, num_providers, provider_name};
pub use source_control::{SourceControl, SourceControlOptions};
pub use worker::{DispatchError, PluginLoader};
