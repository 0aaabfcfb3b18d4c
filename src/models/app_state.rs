use crate::models::{InferenceResult, ModelKind};
use camino::Utf8PathBuf;

/// Status text shown before anything has happened
pub const STATUS_READY: &str = "Ready";
pub const STATUS_RUNNING: &str = "Running model...";
pub const STATUS_DONE: &str = "Done.";
pub const STATUS_ERROR: &str = "Error occurred.";
pub const STATUS_CLEARED: &str = "Cleared.";

/// Info panel text before a model has been picked explicitly
pub const DEFAULT_INFO_TEXT: &str = "Select a model and enter input text.";

/// Single source of truth for all application state.
///
/// `AppState` is wrapped in `Arc<RwLock<AppState>>` by [`crate::state::StateManager`].
/// Never mutate it directly; go through the manager so change events are emitted.
#[derive(Clone, Debug)]
pub struct AppState {
    // Selection
    pub selected_model: ModelKind,
    pub info_text: String,

    // Runtime state
    pub is_running: bool,
    pub active_model: Option<ModelKind>,
    pub status: String,

    // Results
    pub output_log: Vec<String>,
    pub last_image_path: Option<Utf8PathBuf>,

    // Session counters
    pub runs_succeeded: usize,
    pub runs_failed: usize,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            selected_model: ModelKind::default(),
            info_text: DEFAULT_INFO_TEXT.to_string(),

            is_running: false,
            active_model: None,
            status: STATUS_READY.to_string(),

            output_log: Vec::new(),
            last_image_path: None,

            runs_succeeded: 0,
            runs_failed: 0,
        }
    }
}

impl AppState {
    /// A new run may start only when none is in flight.
    pub fn can_run(&self) -> bool {
        !self.is_running
    }

    /// Contents of the output text widget.
    pub fn output_text(&self) -> String {
        self.output_log.join("\n")
    }

    pub fn append_output(&mut self, line: impl Into<String>) {
        self.output_log.push(line.into());
    }

    /// Record a successful run.
    ///
    /// Image results replace the last image reference used by "save as".
    pub fn record_success(&mut self, result: &InferenceResult) {
        if let Some(path) = result.image_path() {
            self.last_image_path = Some(path.clone());
        }
        self.output_log.extend(result.output_lines());
        self.runs_succeeded += 1;
        self.finish_run(STATUS_DONE);
    }

    /// Record a failed run. The previous image reference is kept.
    pub fn record_failure(&mut self, message: &str) {
        self.append_output(format!("Error: {}", message));
        self.runs_failed += 1;
        self.finish_run(STATUS_ERROR);
    }

    fn finish_run(&mut self, status: &str) {
        self.is_running = false;
        self.active_model = None;
        self.status = status.to_string();
    }

    /// Reset everything the "Clear" button clears.
    ///
    /// Session counters and the model selection survive.
    pub fn clear_outputs(&mut self) {
        self.output_log.clear();
        self.last_image_path = None;
        self.status = STATUS_CLEARED.to_string();
    }
}
