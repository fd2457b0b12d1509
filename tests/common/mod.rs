//! Shared fixtures for the dispatcher integration tests.

#![allow(dead_code)]

use decoda_scc::models::{ProjectContext, SccCaps, SccCode, WindowHandle, raw};
use decoda_scc::services::{PluginInfo, PluginLoader, ProjectPathResult, QueryResult, SccApi};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: String,
    pub files: Vec<String>,
    pub thread: ThreadId,
}

/// Behaviour switches for [`FakePlugin`].
#[derive(Debug, Clone)]
pub struct FakeBehavior {
    /// Result code returned from initialize.
    pub init_code: SccCode,
    /// Result code returned from every file operation.
    pub op_code: SccCode,
    pub threadsafe_query_info: bool,
    /// Operation that panics instead of returning.
    pub fault_on: Option<&'static str>,
    /// Operation that writes to an unmapped address instead of returning.
    pub crash_on: Option<&'static str>,
    /// How long every call takes.
    pub delay: Duration,
    /// Raw status mask reported for every file.
    pub status_bits: i32,
}

impl Default for FakeBehavior {
    fn default() -> Self {
        Self {
            init_code: SccCode::OK,
            op_code: SccCode::OK,
            threadsafe_query_info: false,
            fault_on: None,
            crash_on: None,
            delay: Duration::ZERO,
            status_bits: raw::CONTROLLED,
        }
    }
}

/// A provider double that records every call and the thread it ran on.
#[derive(Debug, Default)]
pub struct FakePlugin {
    pub behavior: FakeBehavior,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakePlugin {
    pub fn new(behavior: FakeBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn operations(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.operation).collect()
    }

    /// Highest number of calls ever running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// A loader that hands this fake to the worker.
    pub fn loader(self: &Arc<Self>) -> PluginLoader {
        let plugin = Arc::clone(self);
        Box::new(move || {
            let plugin: Arc<dyn SccApi> = plugin;
            Ok(plugin)
        })
    }

    fn record(&self, operation: &str, files: &[String]) {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Call {
                operation: operation.to_string(),
                files: files.to_vec(),
                thread: thread::current().id(),
            });

        if !self.behavior.delay.is_zero() {
            thread::sleep(self.behavior.delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.behavior.fault_on == Some(operation) {
            panic!("fake provider fault in {operation}");
        }
        if self.behavior.crash_on == Some(operation) {
            write_unmapped_memory();
        }
    }

    fn op(&self, operation: &str, files: &[String]) -> SccCode {
        self.record(operation, files);
        self.behavior.op_code
    }
}

impl SccApi for FakePlugin {
    fn initialize(&self, _window: WindowHandle, _caller_name: &str) -> PluginInfo {
        self.record("initialize", &[]);
        PluginInfo {
            code: self.behavior.init_code,
            provider_name: "Fake Provider".to_string(),
            capabilities: SccCaps::QUERYINFO | SccCaps::DIFF | SccCaps::HISTORY,
            ..PluginInfo::default()
        }
    }

    fn uninitialize(&self) -> SccCode {
        self.op("uninitialize", &[])
    }

    fn threadsafe_query_info(&self) -> bool {
        self.record("threadsafe_query_info", &[]);
        self.behavior.threadsafe_query_info
    }

    fn open_project(
        &self,
        _window: WindowHandle,
        project: &ProjectContext,
        _comment: &str,
        _flags: i32,
    ) -> SccCode {
        self.op("open_project", &[project.project_name.clone()])
    }

    fn close_project(&self) -> SccCode {
        self.op("close_project", &[])
    }

    fn get_project_path(
        &self,
        _window: WindowHandle,
        project: &ProjectContext,
        _allow_change_path: bool,
    ) -> ProjectPathResult {
        self.record("get_project_path", &[]);
        ProjectPathResult {
            code: self.behavior.op_code,
            project: ProjectContext {
                project_name: format!("{}/selected", project.project_name),
                ..project.clone()
            },
            is_new: false,
        }
    }

    fn checkout(&self, _window: WindowHandle, files: &[String], _comment: &str) -> SccCode {
        self.op("checkout", files)
    }

    fn uncheckout(&self, _window: WindowHandle, files: &[String]) -> SccCode {
        self.op("uncheckout", files)
    }

    fn checkin(&self, _window: WindowHandle, files: &[String], _comment: &str, _flags: i32) -> SccCode {
        self.op("checkin", files)
    }

    fn add(&self, _window: WindowHandle, files: &[String], _comment: &str) -> SccCode {
        self.op("add", files)
    }

    fn remove(&self, _window: WindowHandle, files: &[String], _comment: &str) -> SccCode {
        self.op("remove", files)
    }

    fn diff(&self, _window: WindowHandle, file: &str) -> SccCode {
        self.op("diff", &[file.to_string()])
    }

    fn history(&self, _window: WindowHandle, files: &[String]) -> SccCode {
        self.op("history", files)
    }

    fn properties(&self, _window: WindowHandle, file: &str) -> SccCode {
        self.op("properties", &[file.to_string()])
    }

    fn query_info(&self, files: &[String]) -> QueryResult {
        self.record("query_info", files);
        QueryResult {
            code: self.behavior.op_code,
            raw: vec![self.behavior.status_bits; files.len()],
        }
    }
}

/// A native access violation, like a provider dereferencing a bad pointer.
#[inline(never)]
pub extern "C" fn write_unmapped_memory() {
    unsafe { std::ptr::write_volatile(8usize as *mut u32, 0xdead) };
}
