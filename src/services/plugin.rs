//! Binding seam between the dispatcher and a source control provider.
//!
//! [`SccApi`] mirrors the provider entry points one method per call, in
//! Rust types. [`NativePlugin`](super::native::NativePlugin) implements it
//! on top of a dynamically loaded MSSCCI module; tests implement it with
//! recording fakes.

use crate::models::{ProjectContext, SccCaps, SccCode, WindowHandle};
use camino::Utf8PathBuf;
use thiserror::Error;

/// `SccOpenProject` flag: create the project if it does not exist.
pub const SCC_OP_CREATEIFNEW: i32 = 0x0000_0001;
/// `SccCheckin` flag: keep the file checked out after checking in.
pub const SCC_KEEP_CHECKEDOUT: i32 = 0x0000_1000;
/// Extended capability: `SccQueryInfo` may be called from any thread.
pub const SCC_EXCAP_THREADSAFE_QUERY_INFO: i32 = 8;

/// What the provider reported from its initialize entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginInfo {
    pub code: SccCode,
    pub provider_name: String,
    pub capabilities: SccCaps,
    pub aux_path_label: String,
    pub checkout_comment_len: i32,
    pub comment_len: i32,
    /// Whether `SccQueryInfo` may run concurrently with the worker.
    pub threadsafe_query_info: bool,
}

/// Result of `SccQueryInfo`: one raw status mask per requested file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub code: SccCode,
    pub raw: Vec<i32>,
}

/// Result of `SccGetProjPath`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPathResult {
    pub code: SccCode,
    pub project: ProjectContext,
    pub is_new: bool,
}

/// Errors binding a provider module.
#[derive(Error, Debug)]
pub enum BindError {
    #[error("Failed to load provider module {path}: {source}")]
    Load {
        path: Utf8PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("Provider module {path} is missing entry point {symbol}")]
    MissingEntryPoint { path: Utf8PathBuf, symbol: &'static str },

    #[error("Provider index {0} is out of range")]
    UnknownProvider(usize),

    #[error("Provider {0} is not installed")]
    ProviderNotFound(String),

    #[error("Failed to spawn source control worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Source control worker exited before the provider was bound")]
    WorkerExited,

    #[error(transparent)]
    Fault(#[from] super::boundary::PluginFault),
}

/// One method per provider entry point.
///
/// Implementations are only ever called from the dispatcher's worker
/// thread, except [`query_info`](SccApi::query_info) when
/// [`threadsafe_query_info`](SccApi::threadsafe_query_info) reports true.
#[cfg_attr(test, mockall::automock)]
pub trait SccApi: Send + Sync {
    fn initialize(&self, window: WindowHandle, caller_name: &str) -> PluginInfo;

    fn uninitialize(&self) -> SccCode;

    /// `SCC_EXCAP_THREADSAFE_QUERY_INFO` extended capability.
    fn threadsafe_query_info(&self) -> bool;

    fn open_project(
        &self,
        window: WindowHandle,
        project: &ProjectContext,
        comment: &str,
        flags: i32,
    ) -> SccCode;

    fn close_project(&self) -> SccCode;

    fn get_project_path(
        &self,
        window: WindowHandle,
        project: &ProjectContext,
        allow_change_path: bool,
    ) -> ProjectPathResult;

    fn checkout(&self, window: WindowHandle, files: &[String], comment: &str) -> SccCode;

    fn uncheckout(&self, window: WindowHandle, files: &[String]) -> SccCode;

    fn checkin(&self, window: WindowHandle, files: &[String], comment: &str, flags: i32) -> SccCode;

    fn add(&self, window: WindowHandle, files: &[String], comment: &str) -> SccCode;

    fn remove(&self, window: WindowHandle, files: &[String], comment: &str) -> SccCode;

    fn diff(&self, window: WindowHandle, file: &str) -> SccCode;

    fn history(&self, window: WindowHandle, files: &[String]) -> SccCode;

    fn properties(&self, window: WindowHandle, file: &str) -> SccCode;

    fn query_info(&self, files: &[String]) -> QueryResult;
}
