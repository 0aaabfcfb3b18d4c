//! Model Demo - GUI entry point
//!
//! Sets up and runs the application:
//! - Settings ([`ConfigManager`], `Model Demo Data/settings.yaml`)
//! - Logging (daily rotating file + optional console output)
//! - Tokio runtime hosting the inference workers
//! - State management ([`StateManager`]) and the model cache
//! - GUI controller ([`GuiController`] - bridges Slint with the runner)
//!
//! Threading model:
//! - **Main thread**: Slint event loop
//! - **Tokio blocking pool**: model loading and inference, one worker per run
//! - **State listener**: std::thread mirroring state events into the window
//!
//! # Execution Flow
//!
//! 1. Load settings, falling back to defaults if the file is invalid
//! 2. Initialize logging -> logs/model-demo.<date>
//! 3. Create the tokio runtime
//! 4. Create StateManager, Metrics, ModelCache and ModelRunner
//! 5. Create GuiController and report any settings error in a dialog
//! 6. Run the Slint event loop (blocks until the window is closed)
//! 7. Shut down the runtime with a timeout and log metrics

use anyhow::Result;
use model_demo::ui::GuiController;
use model_demo::{
    APP_NAME, ConfigManager, HubModelLoader, Metrics, ModelCache, ModelRunner, Settings,
    StateManager, VERSION,
};
use std::sync::Arc;
use std::time::Duration;

/// Directory holding `settings.yaml`
const CONFIG_DIR: &str = "Model Demo Data";

const WORKER_THREADS: usize = 2;

fn main() -> Result<()> {
    let (settings, config_error) = match load_settings() {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };

    // Held until main returns so buffered log lines are flushed
    let _log_guard = model_demo::logging::setup_from_settings(&settings)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    if let Some(e) = &config_error {
        tracing::warn!("Using default settings: {:#}", e);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(WORKER_THREADS)
        .thread_name("model-demo-worker")
        .build()?;

    tracing::info!(
        "Tokio runtime initialized with {} worker threads",
        WORKER_THREADS
    );

    let state_manager = Arc::new(StateManager::new());
    let metrics = Arc::new(Metrics::new());
    let cache = Arc::new(ModelCache::new(Arc::new(HubModelLoader::new(
        settings.clone(),
    ))));
    let runner = Arc::new(ModelRunner::new(
        cache,
        Arc::clone(&state_manager),
        Arc::clone(&metrics),
        settings.output_dir.as_str(),
    ));

    let gui_controller = GuiController::new(
        Arc::clone(&state_manager),
        runner,
        Arc::clone(&metrics),
        runtime.handle().clone(),
    )?;

    if let Some(e) = &config_error {
        gui_controller.report_config_error(e);
    }

    tracing::info!("GUI controller initialized, launching window");

    let result = gui_controller.run();

    tracing::info!("GUI closed, shutting down");

    if state_manager.read(|s| s.is_running) {
        // Blocking inference cannot be interrupted; the process exits without it
        tracing::warn!("Window closed while a model was running");
    }

    runtime.shutdown_timeout(Duration::from_secs(5));
    metrics.log_summary();

    tracing::info!("Application shutdown complete");

    result.map_err(|e| {
        tracing::error!("GUI error: {}", e);
        anyhow::anyhow!("GUI error: {}", e)
    })
}

fn load_settings() -> Result<Settings> {
    let config_manager = ConfigManager::new(CONFIG_DIR)?;
    config_manager.load_settings()
}
