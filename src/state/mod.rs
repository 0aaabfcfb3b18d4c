// State management module
//
// StateManager wraps AppState in Arc<RwLock<T>> and broadcasts change events
// so the GUI can react without polling.

use crate::models::app_state::STATUS_RUNNING;
use crate::models::{AppState, InferenceResult, ModelKind};
use camino::Utf8PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when state is modified
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// The dropdown selection changed
    ModelSelected { model: ModelKind, info_text: String },

    /// A run was accepted and is in flight
    RunStarted { model: ModelKind },

    /// The in-flight run finished
    RunFinished { succeeded: bool },

    /// Status line text changed
    StatusChanged { status: String },

    /// A line was appended to the output log
    OutputAppended { line: String },

    /// The output log was emptied
    OutputCleared,

    /// The last image reference changed
    LastImageChanged { path: Option<Utf8PathBuf> },

    /// A run failed; the GUI raises an error dialog
    RunFailed { message: String },

    /// "Clear" was pressed
    StateReset,
}

/// Thread-safe state manager with event emission
///
/// - [`read()`](Self::read) for reading state under the read lock
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to state changes
///
/// The run flag lives here, so [`begin_run()`](Self::begin_run) is the single
/// place that decides whether a new inference may start.
pub struct StateManager {
    state: Arc<RwLock<AppState>>,
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with default state and a 100-event buffer
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(AppState::default())),
            state_tx,
        }
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> AppState {
        self.state.read().unwrap().clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let running = state_manager.read(|state| state.is_running);
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.state.read().unwrap();
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// Returns the events that were emitted.
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut AppState),
    {
        let mut state = self.state.write().unwrap();
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = Self::detect_changes(&old_state, &state);

        for change in &changes {
            // No subscribers is fine
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn detect_changes(old: &AppState, new: &AppState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.selected_model != new.selected_model || old.info_text != new.info_text {
            changes.push(StateChange::ModelSelected {
                model: new.selected_model,
                info_text: new.info_text.clone(),
            });
        }

        if old.is_running != new.is_running {
            if new.is_running {
                changes.push(StateChange::RunStarted {
                    model: new.active_model.unwrap_or(new.selected_model),
                });
            } else {
                changes.push(StateChange::RunFinished {
                    succeeded: new.runs_failed == old.runs_failed,
                });
            }
        }

        if old.status != new.status {
            changes.push(StateChange::StatusChanged {
                status: new.status.clone(),
            });
        }

        if new.output_log.len() < old.output_log.len() {
            changes.push(StateChange::OutputCleared);
        } else {
            for line in &new.output_log[old.output_log.len()..] {
                changes.push(StateChange::OutputAppended { line: line.clone() });
            }
        }

        if old.last_image_path != new.last_image_path {
            changes.push(StateChange::LastImageChanged {
                path: new.last_image_path.clone(),
            });
        }

        changes
    }

    // Convenience methods for common state updates

    /// Change the selected model and its info text
    pub fn select_model(&self, model: ModelKind) -> Vec<StateChange> {
        self.update(|state| {
            state.selected_model = model;
            state.info_text = model.description().to_string();
        })
    }

    /// Try to mark a run as in flight.
    ///
    /// Returns `false` without touching state if another run is in flight.
    pub fn begin_run(&self, model: ModelKind) -> bool {
        let mut started = false;
        self.update(|state| {
            if state.can_run() {
                state.is_running = true;
                state.active_model = Some(model);
                state.status = STATUS_RUNNING.to_string();
                started = true;
            }
        });
        started
    }

    pub fn set_status(&self, status: impl Into<String>) -> Vec<StateChange> {
        let status = status.into();
        self.update(|state| {
            state.status = status;
        })
    }

    pub fn append_output(&self, line: impl Into<String>) -> Vec<StateChange> {
        let line = line.into();
        self.update(|state| {
            state.append_output(line);
        })
    }

    /// Record a successful run and release the run flag
    pub fn complete_run(&self, result: &InferenceResult) -> Vec<StateChange> {
        self.update(|state| {
            state.record_success(result);
        })
    }

    /// Record a failed run, release the run flag and emit [`StateChange::RunFailed`]
    pub fn fail_run(&self, message: &str) -> Vec<StateChange> {
        let mut changes = self.update(|state| {
            state.record_failure(message);
        });

        let failed = StateChange::RunFailed {
            message: message.to_string(),
        };
        let _ = self.state_tx.send(failed.clone());
        changes.push(failed);

        changes
    }

    /// Clear the output log and the last image reference
    pub fn clear_outputs(&self) -> Vec<StateChange> {
        let mut changes = self.update(|state| {
            state.clear_outputs();
        });

        let reset_event = StateChange::StateReset;
        let _ = self.state_tx.send(reset_event.clone());
        changes.push(reset_event);

        changes
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}
