// GUI Controller - Bridges the Slint window with the model runner
//
// This module contains the GuiController which coordinates between:
// - Slint UI (MainWindow)
// - StateManager (application state)
// - ModelRunner (background inference)
// - EventLoopBridge (async/GUI coordination)
//
// It handles:
// - Setting up UI callbacks -> runner tasks
// - Subscribing to state changes -> UI updates
// - Showing generated images in the canvas
// - Save-as dialogs for the last output

use crate::metrics::Metrics;
use crate::models::ModelKind;
use crate::services::output::{SaveTarget, save_target, save_to, with_default_extension};
use crate::services::runner::{ImagePresenter, ModelRunner, RunError};
use crate::state::{StateChange, StateManager};
use crate::ui::bridge::{EventLoopBridge, EventLoopBridgeHandle};
use crate::ui::image_display::{self, CanvasSize, DEFAULT_CANVAS, ThumbnailPresenter};
use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use slint::{ModelRc, SharedString, VecModel};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;

// Include the generated Slint code
slint::include_modules!();

/// Status shown when settings could not be loaded at startup
pub const STATUS_CONFIG_ERROR: &str = "Configuration error - see popup";

/// GUI Controller that wires the Slint window to application state and the runner
///
/// - Creates the EventLoopBridge for tokio/Slint coordination
/// - Turns button clicks into runner tasks on the tokio runtime
/// - Subscribes to StateManager events and mirrors them into the window
/// - Shows native save dialogs using the `rfd` crate
///
/// # Example
/// ```ignore
/// let controller = GuiController::new(state, runner, metrics, runtime.handle().clone())?;
/// controller.run()?;  // Blocks until the window is closed
/// ```
pub struct GuiController {
    ui: MainWindow,
    _bridge: EventLoopBridge<MainWindow>,
    state_manager: Arc<StateManager>,
}

impl GuiController {
    pub fn new(
        state_manager: Arc<StateManager>,
        runner: Arc<ModelRunner>,
        metrics: Arc<Metrics>,
        tokio_handle: tokio::runtime::Handle,
    ) -> Result<Self> {
        let ui = MainWindow::new().context("Failed to create Slint UI")?;
        let bridge = EventLoopBridge::new(&ui, tokio_handle, metrics);
        let canvas_size: CanvasSize = Arc::new(Mutex::new(DEFAULT_CANVAS));

        // Generated images are decoded on the inference worker; only the
        // pixel buffer crosses into the event loop
        let image_handle = bridge.clone_handle();
        let presenter: Arc<dyn ImagePresenter> = Arc::new(ThumbnailPresenter::new(
            Arc::clone(&canvas_size),
            move |buffer| {
                image_handle.update_ui(move |ui| {
                    ui.set_output_image(slint::Image::from_rgba8(buffer));
                    ui.set_has_image(true);
                });
            },
        ));
        runner.set_presenter(Arc::clone(&presenter));

        Self::sync_ui_with_state(&ui, &state_manager);
        Self::setup_callbacks(&ui, &bridge, &state_manager, &runner, &canvas_size);
        Self::setup_state_subscription(&bridge, &state_manager, presenter);

        tracing::info!("GUI controller initialized");

        Ok(Self {
            ui,
            _bridge: bridge,
            state_manager,
        })
    }

    /// Run the GUI (blocks until the window is closed)
    pub fn run(self) -> Result<(), slint::PlatformError> {
        tracing::info!("Starting GUI event loop");
        self.ui.run()
    }

    /// Report a settings load failure.
    ///
    /// The app keeps running on default settings.
    pub fn report_config_error(&self, error: &anyhow::Error) {
        tracing::error!("Configuration error: {:#}", error);
        self.state_manager.set_status(STATUS_CONFIG_ERROR);
        self.ui.set_status_message(STATUS_CONFIG_ERROR.into());
        Self::show_error_dialog(
            &self.ui.as_weak(),
            "Configuration Error",
            "Settings could not be loaded. Default settings are in use.",
            format!("{:#}", error),
        );
    }

    /// Initialize the window from the current state
    fn sync_ui_with_state(ui: &MainWindow, state_manager: &StateManager) {
        let state = state_manager.snapshot();

        let options: Vec<SharedString> = ModelKind::ALL
            .iter()
            .map(|kind| SharedString::from(kind.display_name()))
            .collect();
        ui.set_model_options(ModelRc::new(VecModel::from(options)));
        ui.set_selected_model_index(state.selected_model.index());
        ui.set_info_text(state.info_text.clone().into());

        ui.set_is_running(state.is_running);
        ui.set_status_message(state.status.clone().into());
        ui.set_output_text(state.output_text().into());
        ui.set_has_image(false);

        tracing::debug!("UI synchronized with initial state");
    }

    fn setup_callbacks(
        ui: &MainWindow,
        bridge: &EventLoopBridge<MainWindow>,
        state_manager: &Arc<StateManager>,
        runner: &Arc<ModelRunner>,
        canvas_size: &CanvasSize,
    ) {
        let bridge_handle = bridge.clone_handle();
        let runner_clone = Arc::clone(runner);
        let canvas = Arc::clone(canvas_size);
        let ui_weak = ui.as_weak();

        // Run Model
        ui.on_run_model(move |index, input| {
            let Some(model) = ModelKind::from_index(index) else {
                tracing::error!("Run requested for unknown model index {}", index);
                return;
            };
            tracing::info!("Run Model clicked: {}", model.display_name());

            if let Some(ui) = ui_weak.upgrade() {
                let size = image_display::canvas_box(ui.get_canvas_width(), ui.get_canvas_height());
                if let Ok(mut slot) = canvas.lock() {
                    *slot = size;
                }
            }

            let runner = Arc::clone(&runner_clone);
            let input = input.to_string();
            bridge_handle.spawn_async(move || async move {
                match runner.run(model, input).await {
                    Ok(_) => {}
                    Err(RunError::AlreadyRunning) => {
                        tracing::debug!("Run click ignored while busy");
                    }
                    // Failures are already in state and raise the error dialog
                    Err(e) => tracing::debug!("Run ended with error: {}", e),
                }
            });
        });

        let state = Arc::clone(state_manager);

        ui.on_model_selected(move |index| {
            if let Some(model) = ModelKind::from_index(index) {
                tracing::debug!("Model selected: {}", model.id());
                state.select_model(model);
            }
        });

        let state = Arc::clone(state_manager);
        let ui_weak = ui.as_weak();

        // Clear
        ui.on_clear_output(move || {
            tracing::info!("Clear clicked");
            state.clear_outputs();
            if let Some(ui) = ui_weak.upgrade() {
                ui.set_input_text(SharedString::new());
            }
        });

        let state = Arc::clone(state_manager);
        let ui_weak = ui.as_weak();

        // Save Last Output As...
        ui.on_save_output(move || {
            let (last_image, output_text) =
                state.read(|s| (s.last_image_path.clone(), s.output_text()));
            let target = save_target(last_image.as_deref(), &output_text);

            if target == SaveTarget::Nothing {
                Self::show_message_dialog(&ui_weak, "Nothing to save", "No output to save.");
                return;
            }

            let Some(dest) = Self::show_save_picker(&target) else {
                tracing::debug!("Save dialog cancelled");
                return;
            };

            match save_to(&target, &dest) {
                Ok(message) => Self::show_message_dialog(&ui_weak, "Saved", message),
                Err(e) => {
                    tracing::error!("Save failed: {:#}", e);
                    Self::show_error_dialog(
                        &ui_weak,
                        "Save Failed",
                        "The output could not be saved.",
                        format!("{:#}", e),
                    );
                }
            }
        });

        let ui_weak = ui.as_weak();

        // Exit
        ui.on_exit_app(move || {
            tracing::info!("Exit clicked");
            if let Some(ui) = ui_weak.upgrade() {
                ui.hide().ok();
            }
        });

        let ui_weak = ui.as_weak();

        ui.on_error_dialog_dismissed(move || {
            if let Some(ui) = ui_weak.upgrade() {
                ui.set_show_error_dialog(false);
            }
        });

        let ui_weak = ui.as_weak();

        ui.on_message_dialog_dismissed(move || {
            if let Some(ui) = ui_weak.upgrade() {
                ui.set_show_message_dialog(false);
            }
        });

        tracing::debug!("UI callbacks configured");
    }

    /// Mirror state change events into the window.
    ///
    /// Runs on its own thread; every widget update goes through the bridge.
    fn setup_state_subscription(
        bridge: &EventLoopBridge<MainWindow>,
        state_manager: &Arc<StateManager>,
        presenter: Arc<dyn ImagePresenter>,
    ) {
        let bridge_handle = bridge.clone_handle();
        let state = Arc::clone(state_manager);
        let mut rx = state_manager.subscribe();

        let spawned = std::thread::Builder::new()
            .name("state-listener".to_string())
            .spawn(move || {
                tracing::debug!("State subscription thread started");

                loop {
                    match rx.blocking_recv() {
                        Ok(change) => {
                            tracing::trace!("State change received: {:?}", change);
                            Self::apply_change(change, &bridge_handle, &state);
                        }
                        Err(RecvError::Closed) => {
                            tracing::info!("State broadcast channel closed");
                            break;
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!("State subscription lagged - {} events skipped", skipped);
                            Self::resync(&bridge_handle, &state, presenter.as_ref());
                        }
                    }
                }

                tracing::debug!("State subscription thread terminated");
            });

        if let Err(e) = spawned {
            tracing::error!("Failed to start state subscription thread: {}", e);
        }
    }

    /// Rebuild every state-driven widget from a snapshot after missed events
    fn resync(
        bridge: &EventLoopBridgeHandle<MainWindow>,
        state: &StateManager,
        presenter: &dyn ImagePresenter,
    ) {
        let snapshot = state.snapshot();
        let last_image = snapshot.last_image_path.clone();
        let has_image = last_image.is_some();

        bridge.update_ui(move |ui| {
            ui.set_selected_model_index(snapshot.selected_model.index());
            ui.set_info_text(snapshot.info_text.clone().into());
            ui.set_is_running(snapshot.is_running);
            ui.set_status_message(snapshot.status.clone().into());
            ui.set_output_text(snapshot.output_text().into());
            if !has_image {
                ui.set_has_image(false);
                ui.set_output_image(slint::Image::default());
            }
        });

        if let Some(path) = last_image {
            if let Err(e) = presenter.present(&path) {
                tracing::warn!("Could not redisplay {}: {:#}", path, e);
            }
        }
    }

    fn apply_change(
        change: StateChange,
        bridge: &EventLoopBridgeHandle<MainWindow>,
        state: &StateManager,
    ) {
        match change {
            StateChange::ModelSelected { model, info_text } => {
                bridge.update_ui(move |ui| {
                    ui.set_selected_model_index(model.index());
                    ui.set_info_text(info_text.into());
                });
            }
            StateChange::RunStarted { .. } => {
                bridge.update_ui(|ui| ui.set_is_running(true));
            }
            StateChange::RunFinished { .. } => {
                bridge.update_ui(|ui| ui.set_is_running(false));
            }
            StateChange::StatusChanged { status } => {
                bridge.update_ui(move |ui| ui.set_status_message(status.into()));
            }
            StateChange::OutputAppended { .. } | StateChange::OutputCleared => {
                let text = state.read(|s| s.output_text());
                bridge.update_ui(move |ui| ui.set_output_text(text.into()));
            }
            // Already on the canvas: the runner presents it before logging the path
            StateChange::LastImageChanged { path: Some(_) } => {}
            StateChange::LastImageChanged { path: None } | StateChange::StateReset => {
                bridge.update_ui(|ui| {
                    ui.set_has_image(false);
                    ui.set_output_image(slint::Image::default());
                });
            }
            StateChange::RunFailed { message } => {
                bridge.update_ui(move |ui| {
                    Self::show_error_dialog(&ui.as_weak(), "Model Error", message, "");
                });
            }
        }
    }

    fn show_error_dialog(
        ui_weak: &slint::Weak<MainWindow>,
        title: impl Into<SharedString>,
        message: impl Into<SharedString>,
        details: impl Into<SharedString>,
    ) {
        if let Some(ui) = ui_weak.upgrade() {
            ui.set_error_title(title.into());
            ui.set_error_message(message.into());
            ui.set_error_details(details.into());
            ui.set_show_error_dialog(true);
        }
    }

    fn show_message_dialog(
        ui_weak: &slint::Weak<MainWindow>,
        title: impl Into<SharedString>,
        message: impl Into<SharedString>,
    ) {
        if let Some(ui) = ui_weak.upgrade() {
            ui.set_message_title(title.into());
            ui.set_message_text(message.into());
            ui.set_show_message_dialog(true);
        }
    }

    /// Ask where to save `target`. Returns `None` when cancelled.
    fn show_save_picker(target: &SaveTarget) -> Option<Utf8PathBuf> {
        use rfd::FileDialog;

        let (filter_name, default_name) = match target {
            SaveTarget::Image { .. } => ("PNG image", "output.png"),
            SaveTarget::Text { .. } => ("Text file", "output.txt"),
            SaveTarget::Nothing => return None,
        };
        let extension = target.default_extension()?;

        let dialog = FileDialog::new()
            .set_title("Save Last Output As...")
            .set_file_name(default_name)
            .add_filter(filter_name, &[extension])
            .add_filter("All files", &["*"]);

        let path = dialog.save_file()?;
        let path = Utf8PathBuf::try_from(path)
            .map_err(|e| {
                tracing::error!("Failed to convert path to UTF-8: {}", e);
                e
            })
            .ok()?;

        Some(with_default_extension(path, extension))
    }
}
