// Session state module
//
// This module provides the SessionManager which tracks where a SourceControl
// instance is in its lifecycle and emits change events, including the
// plugin fault notifications the front end shows to the user.

use crate::models::ProjectContext;
use crate::services::PluginFault;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Lifecycle of a provider binding.
///
/// `Unloaded -> Loading -> Ready <-> ProjectOpen -> Unloading -> Unloaded`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Unloaded,
    Loading,
    Ready,
    ProjectOpen,
    Unloading,
}

/// Snapshot of a source control session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    pub phase: Phase,
    pub provider: Option<String>,
    pub project: Option<ProjectContext>,
    pub faults: usize,
}

/// Change events emitted when the session is modified
#[derive(Clone, Debug, PartialEq)]
pub enum SessionChange {
    PhaseChanged { from: Phase, to: Phase },

    ProviderBound { name: String },

    ProjectOpened { project_name: String },

    ProjectClosed,

    /// A provider call faulted. The worker keeps running.
    PluginFaulted { operation: String, message: String },
}

/// Thread-safe session tracker with event emission
///
/// - [`read()`](Self::read) for reading the session under a read lock
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to session changes
pub struct SessionManager {
    state: Arc<RwLock<SessionState>>,

    /// Multiple subscribers can listen for session changes
    change_tx: broadcast::Sender<SessionChange>,
}

impl SessionManager {
    /// Create a new SessionManager with a broadcast buffer of 100 events
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(SessionState::default())),
            change_tx,
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.read(|state| state.clone())
    }

    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SessionState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Update the session and emit change events
    ///
    /// # Returns
    /// The events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<SessionChange>
    where
        F: FnOnce(&mut SessionState),
    {
        let changes = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let old_state = state.clone();
            update_fn(&mut state);
            detect_changes(&old_state, &state)
        };

        for change in &changes {
            // Nobody listening is fine
            let _ = self.change_tx.send(change.clone());
        }

        changes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.change_tx.subscribe()
    }

    pub fn phase(&self) -> Phase {
        self.read(|state| state.phase)
    }

    pub fn set_phase(&self, phase: Phase) -> Vec<SessionChange> {
        self.update(|state| state.phase = phase)
    }

    pub fn provider_bound(&self, name: &str) -> Vec<SessionChange> {
        self.update(|state| {
            state.phase = Phase::Ready;
            state.provider = Some(name.to_string());
        })
    }

    pub fn project_opened(&self, project: ProjectContext) -> Vec<SessionChange> {
        self.update(|state| {
            state.phase = Phase::ProjectOpen;
            state.project = Some(project);
        })
    }

    pub fn project_closed(&self) -> Vec<SessionChange> {
        self.update(|state| {
            if state.phase == Phase::ProjectOpen {
                state.phase = Phase::Ready;
            }
            state.project = None;
        })
    }

    /// Record a contained provider fault and notify subscribers
    pub fn record_fault(&self, fault: &PluginFault) -> Vec<SessionChange> {
        let mut changes = self.update(|state| state.faults += 1);

        let event = SessionChange::PluginFaulted {
            operation: fault.operation.to_string(),
            message: fault.message.clone(),
        };
        let _ = self.change_tx.send(event.clone());
        changes.push(event);

        changes
    }

    /// Return to the unloaded state, keeping the fault count
    pub fn reset(&self) -> Vec<SessionChange> {
        self.update(|state| {
            state.phase = Phase::Unloaded;
            state.provider = None;
            state.project = None;
        })
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn detect_changes(old: &SessionState, new: &SessionState) -> Vec<SessionChange> {
    let mut changes = Vec::new();

    if old.phase != new.phase {
        changes.push(SessionChange::PhaseChanged {
            from: old.phase,
            to: new.phase,
        });
    }

    if old.provider != new.provider {
        if let Some(name) = &new.provider {
            changes.push(SessionChange::ProviderBound { name: name.clone() });
        }
    }

    if old.project != new.project {
        match &new.project {
            Some(project) => changes.push(SessionChange::ProjectOpened {
                project_name: project.project_name.clone(),
            }),
            None => changes.push(SessionChange::ProjectClosed),
        }
    }

    changes
}
