//! Services module - running models and persisting their output.
//!
//! These services know nothing about Slint. They talk to the rest of the app
//! through [`StateManager`](crate::state::StateManager) events, which keeps
//! them testable without a display.
//!
//! # Components
//!
//! - [`ModelRunner`]: validates input, runs one inference on a blocking worker
//!   and records the outcome (status line, output log, last image) in state.
//! - [`ImagePresenter`]: shows a generated image before its path is logged.
//! - [`output`]: output file naming and the "Save Last Output As..." logic:
//!   - [`SaveTarget`]: copy the last image, write the output text, or nothing
//!   - [`save_to`]: perform the save and build the confirmation message
//!
//! # Usage Example
//!
//! ```ignore
//! use model_demo::services::ModelRunner;
//!
//! let runner = ModelRunner::new(cache, state, metrics, "outputs");
//! let result = runner.run(ModelKind::TextClassification, "I love it".into()).await?;
//! ```

pub mod output;
pub mod runner;

pub use output::{SaveTarget, save_target, save_to};
pub use runner::{ImagePresenter, ModelRunner, RunError};
