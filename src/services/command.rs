//! Units of work executed by the source control worker.
//!
//! Each [`Command`] variant carries the inputs of exactly one provider call.
//! [`execute`] runs it against a binding inside the call boundary and
//! produces the matching [`CommandOutput`].

use super::boundary::{PluginFault, guarded};
use super::plugin::{PluginInfo, ProjectPathResult, QueryResult, SccApi};
use crate::models::{ProjectContext, SccCode, WindowHandle};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Initialize {
        window: WindowHandle,
        caller_name: String,
    },
    Uninitialize,
    SelectProject {
        window: WindowHandle,
        project: ProjectContext,
        allow_change_path: bool,
    },
    OpenProject {
        window: WindowHandle,
        project: ProjectContext,
        comment: String,
        flags: i32,
    },
    CloseProject,
    QueryStatus {
        files: Vec<String>,
    },
    CheckOut {
        window: WindowHandle,
        files: Vec<String>,
        comment: String,
    },
    CheckIn {
        window: WindowHandle,
        files: Vec<String>,
        comment: String,
        flags: i32,
    },
    UndoCheckOut {
        window: WindowHandle,
        files: Vec<String>,
    },
    Add {
        window: WindowHandle,
        files: Vec<String>,
        comment: String,
    },
    Remove {
        window: WindowHandle,
        files: Vec<String>,
        comment: String,
    },
    Diff {
        window: WindowHandle,
        file: String,
    },
    History {
        window: WindowHandle,
        files: Vec<String>,
    },
    Properties {
        window: WindowHandle,
        file: String,
    },
}

impl Command {
    /// Operation name used in logs and fault reports.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Initialize { .. } => "initialize",
            Command::Uninitialize => "uninitialize",
            Command::SelectProject { .. } => "select project",
            Command::OpenProject { .. } => "open project",
            Command::CloseProject => "close project",
            Command::QueryStatus { .. } => "query status",
            Command::CheckOut { .. } => "check out",
            Command::CheckIn { .. } => "check in",
            Command::UndoCheckOut { .. } => "undo check out",
            Command::Add { .. } => "add",
            Command::Remove { .. } => "remove",
            Command::Diff { .. } => "diff",
            Command::History { .. } => "history",
            Command::Properties { .. } => "properties",
        }
    }
}

/// What a command produced.
pub enum CommandOutput {
    Code(SccCode),
    /// Result of [`Command::Initialize`]. `concurrent` holds a shared handle
    /// to the binding only when the provider allows concurrent status queries.
    Initialized {
        info: PluginInfo,
        concurrent: Option<Arc<dyn SccApi>>,
    },
    Status(QueryResult),
    ProjectPath(ProjectPathResult),
    Faulted(PluginFault),
}

impl CommandOutput {
    /// The provider result code, with faults reported as errors.
    pub fn code(&self) -> SccCode {
        match self {
            CommandOutput::Code(code) => *code,
            CommandOutput::Initialized { info, .. } => info.code,
            CommandOutput::Status(result) => result.code,
            CommandOutput::ProjectPath(result) => result.code,
            CommandOutput::Faulted(_) => SccCode::UNKNOWN_ERROR,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, CommandOutput::Faulted(_))
    }
}

impl std::fmt::Debug for CommandOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandOutput::Code(code) => f.debug_tuple("Code").field(code).finish(),
            CommandOutput::Initialized { info, concurrent } => f
                .debug_struct("Initialized")
                .field("info", info)
                .field("concurrent", &concurrent.is_some())
                .finish(),
            CommandOutput::Status(result) => f.debug_tuple("Status").field(result).finish(),
            CommandOutput::ProjectPath(result) => {
                f.debug_tuple("ProjectPath").field(result).finish()
            }
            CommandOutput::Faulted(fault) => f.debug_tuple("Faulted").field(fault).finish(),
        }
    }
}

/// Execute one command against `plugin`.
///
/// `allow_concurrent` decides whether a provider reporting thread-safe
/// status queries gets its handle shared with the caller.
pub fn execute(plugin: &Arc<dyn SccApi>, command: Command, allow_concurrent: bool) -> CommandOutput {
    let operation = command.name();
    let result = guarded(operation, || run(plugin, command, allow_concurrent));
    match result {
        Ok(output) => output,
        Err(fault) => CommandOutput::Faulted(fault),
    }
}

fn run(plugin: &Arc<dyn SccApi>, command: Command, allow_concurrent: bool) -> CommandOutput {
    match command {
        Command::Initialize {
            window,
            caller_name,
        } => {
            let mut info = plugin.initialize(window, &caller_name);
            if info.code.is_ok() {
                info.threadsafe_query_info = plugin.threadsafe_query_info();
            }
            let concurrent = (allow_concurrent && info.threadsafe_query_info)
                .then(|| Arc::clone(plugin));
            CommandOutput::Initialized { info, concurrent }
        }
        Command::Uninitialize => CommandOutput::Code(plugin.uninitialize()),
        Command::SelectProject {
            window,
            project,
            allow_change_path,
        } => CommandOutput::ProjectPath(plugin.get_project_path(
            window,
            &project,
            allow_change_path,
        )),
        Command::OpenProject {
            window,
            project,
            comment,
            flags,
        } => CommandOutput::Code(plugin.open_project(window, &project, &comment, flags)),
        Command::CloseProject => CommandOutput::Code(plugin.close_project()),
        Command::QueryStatus { files } => CommandOutput::Status(plugin.query_info(&files)),
        Command::CheckOut {
            window,
            files,
            comment,
        } => CommandOutput::Code(plugin.checkout(window, &files, &comment)),
        Command::CheckIn {
            window,
            files,
            comment,
            flags,
        } => CommandOutput::Code(plugin.checkin(window, &files, &comment, flags)),
        Command::UndoCheckOut { window, files } => {
            CommandOutput::Code(plugin.uncheckout(window, &files))
        }
        Command::Add {
            window,
            files,
            comment,
        } => CommandOutput::Code(plugin.add(window, &files, &comment)),
        Command::Remove {
            window,
            files,
            comment,
        } => CommandOutput::Code(plugin.remove(window, &files, &comment)),
        Command::Diff { window, file } => CommandOutput::Code(plugin.diff(window, &file)),
        Command::History { window, files } => CommandOutput::Code(plugin.history(window, &files)),
        Command::Properties { window, file } => {
            CommandOutput::Code(plugin.properties(window, &file))
        }
    }
}
