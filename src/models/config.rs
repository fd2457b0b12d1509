use crate::models::ProjectContext;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// User configuration from `Decoda SCC.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SccConfig {
    #[serde(rename = "Source_Control")]
    pub source_control: SccSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SccSettings {
    /// Name of the provider to bind. Empty disables source control.
    #[serde(rename = "Provider", default)]
    pub provider: String,

    /// Caller name handed to the provider's initialize entry point.
    #[serde(rename = "Caller Name", default = "default_caller_name")]
    pub caller_name: String,

    /// Ask the provider to create the project when it does not exist yet.
    #[serde(rename = "Create Missing Projects", default = "default_true")]
    pub create_missing_projects: bool,

    /// Allow status queries to bypass the worker when the provider reports
    /// thread-safe `SccQueryInfo`.
    #[serde(rename = "Concurrent Status Queries", default = "default_true")]
    pub concurrent_status_queries: bool,

    #[serde(rename = "Log Directory", default = "default_log_dir")]
    pub log_dir: String,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,

    #[serde(rename = "Project", default)]
    pub project: ProjectContext,

    /// Providers that are not registered with the system, name -> binary path.
    #[serde(rename = "Extra Providers", default)]
    pub extra_providers: IndexMap<String, String>,
}

impl Default for SccSettings {
    fn default() -> Self {
        Self {
            provider: String::new(),
            caller_name: default_caller_name(),
            create_missing_projects: true,
            concurrent_status_queries: true,
            log_dir: default_log_dir(),
            debug_mode: false,
            project: ProjectContext::default(),
            extra_providers: IndexMap::new(),
        }
    }
}

fn default_caller_name() -> String {
    "Decoda".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_true() -> bool {
    true
}

/// Provider manifest file, used where no system provider registry exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderManifest {
    #[serde(rename = "Providers", default)]
    pub providers: IndexMap<String, String>,
}
