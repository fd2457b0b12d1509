use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An installed source control provider.
///
/// Discovered once per process from the system provider registry (or a
/// provider manifest) and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    pub name: String,
    pub binary_path: Utf8PathBuf,
}

impl Provider {
    pub fn new(name: impl Into<String>, binary_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            name: name.into(),
            binary_path: binary_path.into(),
        }
    }

    pub fn binary_path(&self) -> &Utf8Path {
        &self.binary_path
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.binary_path)
    }
}

/// Identity of a source control project as understood by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContext {
    #[serde(rename = "User", default)]
    pub user: String,
    #[serde(rename = "Project Name", default)]
    pub project_name: String,
    #[serde(rename = "Local Path", default)]
    pub local_path: String,
    #[serde(rename = "Aux Project Path", default)]
    pub aux_project_path: String,
}

impl ProjectContext {
    pub fn new(
        user: impl Into<String>,
        project_name: impl Into<String>,
        local_path: impl Into<String>,
        aux_project_path: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            project_name: project_name.into(),
            local_path: local_path.into(),
            aux_project_path: aux_project_path.into(),
        }
    }

    /// True when no project has been chosen.
    pub fn is_empty(&self) -> bool {
        self.project_name.is_empty() && self.local_path.is_empty()
    }
}

/// Opaque native window handle passed through to the provider so it can
/// parent its own dialogs. Zero means "no owner window".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub const NONE: WindowHandle = WindowHandle(0);

    pub fn as_ptr(self) -> *mut std::ffi::c_void {
        self.0 as *mut std::ffi::c_void
    }
}
