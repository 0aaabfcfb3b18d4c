//! Data models for the model demo application.
//!
//! - [`AppState`]: the central state container (selection, run flag, status, output log)
//! - [`ModelKind`]: which of the two pretrained models to run
//! - [`InferenceResult`]: what a successful run produced
//! - [`Settings`]: user settings loaded from `settings.yaml`
//!
//! `AppState` is wrapped in `Arc<RwLock<>>` by [`StateManager`](crate::state::StateManager);
//! updates go through its `update()` method so change events stay consistent.

pub mod app_state;
pub mod config;
pub mod inference_result;
pub mod model_kind;

pub use app_state::AppState;
pub use config::{Settings, TextClassificationSettings, TextToImageSettings};
pub use inference_result::{Classification, InferenceResult, round_confidence};
pub use model_kind::ModelKind;
