//! Synchronous source control facade.
//!
//! [`SourceControl`] is what the rest of the debugger talks to. Every call
//! builds a [`Command`], hands it to the worker thread that owns the
//! provider, blocks until the worker has run it, and translates the
//! provider's signed result code into a `bool` or [`Status`]. Errors never
//! escape as `Err`; they are logged and reported as failure values.
//!
//! Calls block the calling thread with a synchronous wait, so they must not
//! be made from inside an async runtime context.

use super::command::{Command, CommandOutput};
use super::native::NativePlugin;
use super::plugin::{
    BindError, PluginInfo, SCC_KEEP_CHECKEDOUT, SCC_OP_CREATEIFNEW, SccApi,
};
use super::registry::ProviderRegistry;
use super::worker::{PluginLoader, Worker, WorkerContext};
use crate::metrics::DispatchMetrics;
use crate::models::{ProjectContext, Provider, SccCaps, SccSettings, Status, WindowHandle};
use crate::state::{Phase, SessionManager};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};
use std::thread::ThreadId;

/// Options that shape how the facade talks to a provider.
#[derive(Debug, Clone)]
pub struct SourceControlOptions {
    pub caller_name: String,
    pub create_missing_projects: bool,
    pub concurrent_status_queries: bool,
}

impl Default for SourceControlOptions {
    fn default() -> Self {
        Self {
            caller_name: "Decoda".to_string(),
            create_missing_projects: true,
            concurrent_status_queries: true,
        }
    }
}

impl From<&SccSettings> for SourceControlOptions {
    fn from(settings: &SccSettings) -> Self {
        Self {
            caller_name: settings.caller_name.clone(),
            create_missing_projects: settings.create_missing_projects,
            concurrent_status_queries: settings.concurrent_status_queries,
        }
    }
}

/// A live provider binding.
struct Binding {
    worker: Worker,
    info: PluginInfo,
    window: WindowHandle,
    /// Shared handle for direct status queries, present only when the
    /// provider declared `SccQueryInfo` thread safe.
    concurrent: Option<Arc<dyn SccApi>>,
}

/// Source control front end for one provider at a time.
///
/// All methods take `&self` and may be called from any thread.
pub struct SourceControl {
    options: SourceControlOptions,
    binding: RwLock<Option<Binding>>,
    project: Mutex<Option<ProjectContext>>,
    selected: Mutex<Option<ProjectContext>>,
    session: Arc<SessionManager>,
    metrics: Arc<DispatchMetrics>,
}

impl SourceControl {
    pub fn new() -> Self {
        Self::with_options(SourceControlOptions::default())
    }

    pub fn with_options(options: SourceControlOptions) -> Self {
        Self {
            options,
            binding: RwLock::new(None),
            project: Mutex::new(None),
            selected: Mutex::new(None),
            session: Arc::new(SessionManager::new()),
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    // Provider enumeration

    pub fn num_providers() -> usize {
        ProviderRegistry::global().len()
    }

    pub fn provider_name(index: usize) -> Option<&'static str> {
        ProviderRegistry::global().name(index)
    }

    // Lifecycle

    /// Bind the installed provider at `index`.
    pub fn initialize_index(&self, index: usize, window: WindowHandle) -> bool {
        match ProviderRegistry::global().get(index) {
            Some(provider) => self.initialize(provider, window),
            None => {
                tracing::warn!("{}", BindError::UnknownProvider(index));
                false
            }
        }
    }

    /// Bind the installed provider called `name`.
    pub fn initialize_name(&self, name: &str, window: WindowHandle) -> bool {
        match ProviderRegistry::global().find(name) {
            Some(provider) => self.initialize(provider, window),
            None => {
                tracing::warn!("{}", BindError::ProviderNotFound(name.to_string()));
                false
            }
        }
    }

    /// Load `provider`'s module on a new worker thread and initialize it.
    pub fn initialize(&self, provider: &Provider, window: WindowHandle) -> bool {
        let path = provider.binary_path.clone();
        let loader: PluginLoader = Box::new(move || {
            let plugin: Arc<dyn SccApi> = Arc::new(NativePlugin::load(&path)?);
            Ok(plugin)
        });
        self.initialize_with(&provider.name, loader, window)
    }

    /// Initialize with a custom binding. `loader` runs on the worker thread.
    ///
    /// Any existing binding is shut down first. Returns false if the binding
    /// cannot be created or the provider's initialize call fails.
    pub fn initialize_with(&self, name: &str, loader: PluginLoader, window: WindowHandle) -> bool {
        self.shutdown();

        let mut slot = self.binding.write().unwrap_or_else(PoisonError::into_inner);
        tracing::info!("Initializing source control provider {}", name);
        self.session.set_phase(Phase::Loading);

        let context = WorkerContext {
            metrics: Arc::clone(&self.metrics),
            session: Arc::clone(&self.session),
            allow_concurrent: self.options.concurrent_status_queries,
        };
        let worker = match Worker::spawn(loader, context) {
            Ok(worker) => worker,
            Err(err) => {
                tracing::error!("Failed to bind source control provider {}: {}", name, err);
                self.session.reset();
                return false;
            }
        };

        let output = worker.dispatch(Command::Initialize {
            window,
            caller_name: self.options.caller_name.clone(),
        });
        let (info, concurrent) = match output {
            Ok(CommandOutput::Initialized { info, concurrent }) if info.code.is_ok() => {
                (info, concurrent)
            }
            Ok(other) => {
                tracing::error!(
                    "Source control provider {} failed to initialize: {}",
                    name,
                    other.code()
                );
                worker.shutdown();
                self.session.reset();
                return false;
            }
            Err(err) => {
                tracing::error!("Source control provider {} failed to initialize: {}", name, err);
                worker.shutdown();
                self.session.reset();
                return false;
            }
        };

        tracing::info!(
            "Source control provider {} ready ({}; caps {:?}; concurrent status queries: {})",
            name,
            info.provider_name,
            info.capabilities,
            concurrent.is_some()
        );
        self.session.provider_bound(name);
        *slot = Some(Binding {
            worker,
            info,
            window,
            concurrent,
        });
        true
    }

    /// Close any open project, uninitialize the provider, drain the worker
    /// and unload the module. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let mut slot = self.binding.write().unwrap_or_else(PoisonError::into_inner);
        let Some(mut binding) = slot.take() else {
            return;
        };

        tracing::info!("Shutting down source control provider");
        self.session.set_phase(Phase::Unloading);

        // The module must be released on the worker thread
        binding.concurrent = None;

        self.lock_selected().take();
        let open_project = self.lock_project().take();
        if open_project.is_some() {
            self.run(&binding.worker, Command::CloseProject);
        }
        self.run(&binding.worker, Command::Uninitialize);

        binding.worker.shutdown();
        self.session.reset();
        self.metrics.log_summary();
    }

    pub fn is_initialized(&self) -> bool {
        self.read_binding().is_some()
    }

    /// Information the provider reported at initialization.
    pub fn plugin_info(&self) -> Option<PluginInfo> {
        self.read_binding().as_ref().map(|b| b.info.clone())
    }

    pub fn capabilities(&self) -> SccCaps {
        self.read_binding()
            .as_ref()
            .map(|b| b.info.capabilities)
            .unwrap_or_default()
    }

    /// Identity of the worker thread, if a provider is bound.
    pub fn worker_thread_id(&self) -> Option<ThreadId> {
        self.read_binding().as_ref().map(|b| b.worker.thread_id())
    }

    /// True when status queries run on the calling thread.
    pub fn has_concurrent_status_queries(&self) -> bool {
        self.read_binding()
            .as_ref()
            .is_some_and(|b| b.concurrent.is_some())
    }

    // Projects

    /// Let the provider choose (or browse for) a project.
    ///
    /// The chosen context is remembered as [`selected_project`](Self::selected_project)
    /// and returned. It is not opened; pass it to [`open_project`](Self::open_project).
    pub fn select_project(&self, initial: &ProjectContext) -> Option<ProjectContext> {
        let guard = self.read_binding();
        let binding = guard.as_ref()?;
        let output = self.run(
            &binding.worker,
            Command::SelectProject {
                window: binding.window,
                project: initial.clone(),
                allow_change_path: true,
            },
        )?;
        match output {
            CommandOutput::ProjectPath(result) if result.code.is_ok() => {
                tracing::info!(
                    "Selected project {} (new: {})",
                    result.project.project_name,
                    result.is_new
                );
                *self.lock_selected() = Some(result.project.clone());
                Some(result.project)
            }
            _ => None,
        }
    }

    /// Open `project`, closing any currently open project first.
    pub fn open_project(&self, project: &ProjectContext) -> bool {
        let guard = self.read_binding();
        let Some(binding) = guard.as_ref() else {
            return false;
        };

        let mut open = self.lock_project();
        if open.take().is_some() {
            self.run(&binding.worker, Command::CloseProject);
            self.session.project_closed();
        }

        let flags = if self.options.create_missing_projects {
            SCC_OP_CREATEIFNEW
        } else {
            0
        };
        let opened = succeeded(self.run(
            &binding.worker,
            Command::OpenProject {
                window: binding.window,
                project: project.clone(),
                comment: String::new(),
                flags,
            },
        ));

        if opened {
            tracing::info!("Opened source control project {}", project.project_name);
            *open = Some(project.clone());
            self.session.project_opened(project.clone());
        }
        opened
    }

    /// Close the open project. Returns true if there was nothing to close.
    pub fn close_project(&self) -> bool {
        let guard = self.read_binding();
        let Some(binding) = guard.as_ref() else {
            return false;
        };

        let mut open = self.lock_project();
        if open.take().is_none() {
            return true;
        }
        let closed = succeeded(self.run(&binding.worker, Command::CloseProject));
        self.session.project_closed();
        closed
    }

    /// The project most recently chosen through [`select_project`](Self::select_project).
    pub fn selected_project(&self) -> Option<ProjectContext> {
        self.lock_selected().clone()
    }

    pub fn is_project_open(&self) -> bool {
        self.lock_project().is_some()
    }

    pub fn project(&self) -> Option<ProjectContext> {
        self.lock_project().clone()
    }

    // File operations

    pub fn check_out<S: AsRef<str>>(&self, files: &[S], comment: &str) -> bool {
        self.file_command(files, |window, files| Command::CheckOut {
            window,
            files,
            comment: comment.to_string(),
        })
    }

    pub fn check_in<S: AsRef<str>>(&self, files: &[S], comment: &str) -> bool {
        self.file_command(files, |window, files| Command::CheckIn {
            window,
            files,
            comment: comment.to_string(),
            flags: 0,
        })
    }

    /// Check the files in but leave them checked out.
    pub fn check_in_keep<S: AsRef<str>>(&self, files: &[S], comment: &str) -> bool {
        self.file_command(files, |window, files| Command::CheckIn {
            window,
            files,
            comment: comment.to_string(),
            flags: SCC_KEEP_CHECKEDOUT,
        })
    }

    pub fn undo_check_out<S: AsRef<str>>(&self, files: &[S]) -> bool {
        self.file_command(files, |window, files| Command::UndoCheckOut { window, files })
    }

    pub fn add_files<S: AsRef<str>>(&self, files: &[S], comment: &str) -> bool {
        self.file_command(files, |window, files| Command::Add {
            window,
            files,
            comment: comment.to_string(),
        })
    }

    pub fn remove_files<S: AsRef<str>>(&self, files: &[S], comment: &str) -> bool {
        self.file_command(files, |window, files| Command::Remove {
            window,
            files,
            comment: comment.to_string(),
        })
    }

    pub fn show_history<S: AsRef<str>>(&self, files: &[S]) -> bool {
        self.file_command(files, |window, files| Command::History { window, files })
    }

    /// Show the provider's diff UI. Blocks until the provider returns.
    pub fn show_diff(&self, file: &str) -> bool {
        let guard = self.read_binding();
        let Some(binding) = guard.as_ref() else {
            return false;
        };
        succeeded(self.run(
            &binding.worker,
            Command::Diff {
                window: binding.window,
                file: file.to_string(),
            },
        ))
    }

    pub fn show_properties(&self, file: &str) -> bool {
        let guard = self.read_binding();
        let Some(binding) = guard.as_ref() else {
            return false;
        };
        succeeded(self.run(
            &binding.worker,
            Command::Properties {
                window: binding.window,
                file: file.to_string(),
            },
        ))
    }

    // Status

    pub fn get_file_status(&self, file: &str) -> Status {
        self.get_files_status(&[file])
            .into_iter()
            .next()
            .unwrap_or(Status::Error)
    }

    /// Status of each file, in order. Every entry is [`Status::Error`] when
    /// the query fails.
    pub fn get_files_status<S: AsRef<str>>(&self, files: &[S]) -> Vec<Status> {
        if files.is_empty() {
            return Vec::new();
        }
        let count = files.len();
        let failed = || vec![Status::Error; count];

        let guard = self.read_binding();
        let Some(binding) = guard.as_ref() else {
            return failed();
        };
        let files = to_owned(files);

        let result = match &binding.concurrent {
            Some(plugin) => {
                self.metrics.record_direct_status_query();
                let output = super::command::execute(
                    plugin,
                    Command::QueryStatus { files },
                    false,
                );
                if let CommandOutput::Faulted(fault) = &output {
                    self.metrics.record_fault();
                    self.session.record_fault(fault);
                }
                Some(output)
            }
            None => self.run(&binding.worker, Command::QueryStatus { files }),
        };

        match result {
            Some(CommandOutput::Status(query)) if query.code.is_ok() => {
                let mut statuses: Vec<Status> =
                    query.raw.iter().map(|&bits| Status::from_raw(bits)).collect();
                statuses.resize(count, Status::Error);
                statuses
            }
            Some(other) => {
                tracing::warn!("Status query failed: {}", other.code());
                failed()
            }
            None => failed(),
        }
    }

    // Internals

    fn read_binding(&self) -> RwLockReadGuard<'_, Option<Binding>> {
        self.binding.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_project(&self) -> std::sync::MutexGuard<'_, Option<ProjectContext>> {
        self.project.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_selected(&self) -> std::sync::MutexGuard<'_, Option<ProjectContext>> {
        self.selected.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Dispatch through the worker, logging transport failures.
    fn run(&self, worker: &Worker, command: Command) -> Option<CommandOutput> {
        let name = command.name();
        match worker.dispatch(command) {
            Ok(output) => Some(output),
            Err(err) => {
                tracing::error!("Could not run {}: {}", name, err);
                None
            }
        }
    }

    fn file_command<S, F>(&self, files: &[S], build: F) -> bool
    where
        S: AsRef<str>,
        F: FnOnce(WindowHandle, Vec<String>) -> Command,
    {
        if files.is_empty() {
            return true;
        }
        let guard = self.read_binding();
        let Some(binding) = guard.as_ref() else {
            return false;
        };
        let command = build(binding.window, to_owned(files));
        succeeded(self.run(&binding.worker, command))
    }
}

impl Default for SourceControl {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SourceControl {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn succeeded(output: Option<CommandOutput>) -> bool {
    output.is_some_and(|output| !output.is_fault() && output.code().is_ok())
}

fn to_owned<S: AsRef<str>>(files: &[S]) -> Vec<String> {
    files.iter().map(|file| file.as_ref().to_string()).collect()
}
