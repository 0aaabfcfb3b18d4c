// Model Demo - desktop front-end for two pretrained models
//
// This is the library crate containing the inference, state and GUI plumbing.
// The binary crate (main.rs) provides the GUI entry point.

pub mod config;
pub mod inference;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use inference::{HubModelLoader, InferenceError, ModelCache, ModelLoader};
pub use metrics::Metrics;
pub use models::{AppState, InferenceResult, ModelKind, Settings};
pub use services::{ModelRunner, RunError};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
