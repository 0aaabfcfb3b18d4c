use crate::inference::{InferenceError, ModelCache};
use crate::metrics::Metrics;
use crate::models::{InferenceResult, ModelKind};
use crate::services::output::prepare_image_output;
use crate::state::StateManager;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use thiserror::Error;

/// Errors that end a run
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Input box is empty.")]
    EmptyInput,

    #[error("A model run is already in progress.")]
    AlreadyRunning,

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("{0:#}")]
    Output(anyhow::Error),

    #[error("Inference worker failed: {0}")]
    Worker(String),
}

/// Log line after a generated image reached the canvas
pub const IMAGE_DISPLAYED: &str = "Image displayed in GUI.";

/// Shows a freshly generated image.
///
/// Called on the inference worker before the image's path is logged.
pub trait ImagePresenter: Send + Sync {
    fn present(&self, path: &Utf8Path) -> anyhow::Result<()>;
}

/// Runs one inference per request on a blocking worker thread.
///
/// The runner owns the whole life cycle of a run in [`StateManager`]: it marks
/// the run as started, reports loading status, and records the outcome whether
/// the run succeeds or fails. Callers only need to react to state events.
pub struct ModelRunner {
    cache: Arc<ModelCache>,
    state: Arc<StateManager>,
    metrics: Arc<Metrics>,
    output_dir: Utf8PathBuf,
    presenter: OnceLock<Arc<dyn ImagePresenter>>,
}

impl ModelRunner {
    pub fn new(
        cache: Arc<ModelCache>,
        state: Arc<StateManager>,
        metrics: Arc<Metrics>,
        output_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            cache,
            state,
            metrics,
            output_dir: output_dir.into(),
            presenter: OnceLock::new(),
        }
    }

    /// Install the presenter used for generated images. Only the first call wins.
    pub fn set_presenter(&self, presenter: Arc<dyn ImagePresenter>) {
        if self.presenter.set(presenter).is_err() {
            tracing::warn!("Image presenter already installed; ignoring replacement");
        }
    }

    /// Trimmed input, or [`RunError::EmptyInput`]
    pub fn validate_input(input: &str) -> Result<&str, RunError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            Err(RunError::EmptyInput)
        } else {
            Ok(trimmed)
        }
    }

    /// Run `model` on `input`.
    ///
    /// Returns [`RunError::AlreadyRunning`] without touching state when another
    /// run is in flight. Every other outcome is recorded in state before
    /// returning, and the run flag is always released.
    pub async fn run(&self, model: ModelKind, input: String) -> Result<InferenceResult, RunError> {
        if !self.state.begin_run(model) {
            tracing::warn!("Ignoring run request for {}: a run is in flight", model.id());
            return Err(RunError::AlreadyRunning);
        }

        tracing::info!("Run started: model={}", model.id());
        self.metrics.record_run_started();
        let started = Instant::now();

        let result = self.execute(model, input).await;

        match &result {
            Ok(outcome) => {
                tracing::info!(
                    "Run finished: model={} in {:.1}s",
                    model.id(),
                    started.elapsed().as_secs_f64()
                );
                self.state.complete_run(outcome);
            }
            Err(e) => {
                tracing::error!("Run failed: model={}: {}", model.id(), e);
                self.state.fail_run(&e.to_string());
            }
        }
        self.metrics
            .record_run_finished(result.is_ok(), started.elapsed());

        result
    }

    async fn execute(&self, model: ModelKind, input: String) -> Result<InferenceResult, RunError> {
        let text = Self::validate_input(&input)?.to_string();

        let cache = Arc::clone(&self.cache);
        let state = Arc::clone(&self.state);
        let metrics = Arc::clone(&self.metrics);
        let output_dir = self.output_dir.clone();
        let presenter = self.presenter.get().cloned();

        // Fresh blocking worker per run; the UI thread never waits on inference
        tokio::task::spawn_blocking(move || {
            Self::infer_blocking(
                &cache,
                &state,
                &metrics,
                presenter.as_deref(),
                &output_dir,
                model,
                &text,
            )
        })
        .await
        .map_err(|e| RunError::Worker(e.to_string()))?
    }

    fn infer_blocking(
        cache: &ModelCache,
        state: &StateManager,
        metrics: &Metrics,
        presenter: Option<&dyn ImagePresenter>,
        output_dir: &Utf8Path,
        model: ModelKind,
        text: &str,
    ) -> Result<InferenceResult, RunError> {
        let needs_load = cache.needs_load(model);
        if needs_load {
            state.set_status(format!("Loading {} model...", model.wrapper_name()));
        }

        let result = match model {
            ModelKind::TextToImage => {
                let generator = cache.image_generator()?;
                if needs_load {
                    metrics.record_model_load(model);
                }
                let save_path = prepare_image_output(output_dir).map_err(RunError::Output)?;
                let path = generator.generate_image(text, &save_path)?;
                if let Some(presenter) = presenter {
                    Self::present_image(state, presenter, &path);
                }
                InferenceResult::Image { path }
            }
            ModelKind::TextClassification => {
                let classifier = cache.classifier()?;
                if needs_load {
                    metrics.record_model_load(model);
                }
                InferenceResult::Classification(classifier.classify(text)?)
            }
        };

        Ok(result)
    }

    /// Show the image and log the outcome. A display failure does not fail the run.
    fn present_image(state: &StateManager, presenter: &dyn ImagePresenter, path: &Utf8Path) {
        match presenter.present(path) {
            Ok(()) => {
                state.append_output(IMAGE_DISPLAYED);
            }
            Err(e) => {
                tracing::warn!("Could not display {}: {:#}", path, e);
                state.append_output(format!("Failed to open generated image: {:#}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{ImageGenerator, MockModelLoader, SentimentClassifier};
    use crate::models::Classification;
    use crate::state::StateChange;

    struct EchoClassifier;

    impl SentimentClassifier for EchoClassifier {
        fn classify(&self, text: &str) -> Result<Classification, InferenceError> {
            let label = if text.contains("love") { "POSITIVE" } else { "NEGATIVE" };
            Ok(Classification::new(label, 0.99))
        }
    }

    struct FailingGenerator;

    impl ImageGenerator for FailingGenerator {
        fn generate_image(
            &self,
            _prompt: &str,
            _save_path: &Utf8Path,
        ) -> Result<Utf8PathBuf, InferenceError> {
            Err(InferenceError::Invalid("CUDA out of memory".to_string()))
        }
    }

    struct SavedPathGenerator;

    impl ImageGenerator for SavedPathGenerator {
        fn generate_image(
            &self,
            _prompt: &str,
            save_path: &Utf8Path,
        ) -> Result<Utf8PathBuf, InferenceError> {
            Ok(save_path.to_path_buf())
        }
    }

    /// Presenter that fails with a fixed message, or succeeds when `None`
    struct FixedPresenter(Option<&'static str>);

    impl ImagePresenter for FixedPresenter {
        fn present(&self, _path: &Utf8Path) -> anyhow::Result<()> {
            match self.0 {
                Some(message) => anyhow::bail!(message),
                None => Ok(()),
            }
        }
    }

    fn image_runner(presenter: FixedPresenter) -> (ModelRunner, Arc<StateManager>, tempfile::TempDir) {
        let mut loader = MockModelLoader::new();
        loader
            .expect_load_image_generator()
            .returning(|| Ok(Arc::new(SavedPathGenerator)));
        let temp_dir = tempfile::TempDir::new().unwrap();
        let output_dir = Utf8PathBuf::try_from(temp_dir.path().join("outputs")).unwrap();

        let state = Arc::new(StateManager::new());
        let cache = Arc::new(ModelCache::new(Arc::new(loader)));
        let runner = ModelRunner::new(cache, Arc::clone(&state), Arc::new(Metrics::new()), output_dir);
        runner.set_presenter(Arc::new(presenter));
        (runner, state, temp_dir)
    }

    #[tokio::test]
    async fn test_displayed_line_precedes_saved_line() {
        let (runner, state, _temp_dir) = image_runner(FixedPresenter(None));

        let result = runner
            .run(ModelKind::TextToImage, "a red fox".to_string())
            .await
            .unwrap();

        let path = result.image_path().unwrap().clone();
        assert_eq!(
            state.read(|s| s.output_log.clone()),
            vec![
                "Image displayed in GUI.".to_string(),
                format!("Image saved to: {}", path),
            ]
        );
    }

    #[tokio::test]
    async fn test_display_failure_is_logged_and_run_succeeds() {
        let (runner, state, _temp_dir) = image_runner(FixedPresenter(Some("unsupported format")));

        let result = runner
            .run(ModelKind::TextToImage, "a red fox".to_string())
            .await
            .unwrap();

        let path = result.image_path().unwrap().clone();
        let snapshot = state.snapshot();
        assert_eq!(
            snapshot.output_log,
            vec![
                "Failed to open generated image: unsupported format".to_string(),
                format!("Image saved to: {}", path),
            ]
        );
        assert_eq!(snapshot.status, "Done.");
        assert_eq!(snapshot.last_image_path, Some(path));
    }

    fn runner_with(loader: MockModelLoader) -> (ModelRunner, Arc<StateManager>, Arc<Metrics>) {
        let state = Arc::new(StateManager::new());
        let metrics = Arc::new(Metrics::new());
        let cache = Arc::new(ModelCache::new(Arc::new(loader)));
        let runner = ModelRunner::new(cache, Arc::clone(&state), Arc::clone(&metrics), "outputs");
        (runner, state, metrics)
    }

    #[test]
    fn test_validate_input() {
        assert_eq!(ModelRunner::validate_input("  hi ").unwrap(), "hi");
        assert!(matches!(
            ModelRunner::validate_input("\n \t"),
            Err(RunError::EmptyInput)
        ));
    }

    #[tokio::test]
    async fn test_empty_input_never_loads_a_model() {
        let mut loader = MockModelLoader::new();
        loader.expect_load_classifier().never();
        loader.expect_load_image_generator().never();
        let (runner, state, _metrics) = runner_with(loader);

        let result = runner
            .run(ModelKind::TextClassification, "   ".to_string())
            .await;

        assert!(matches!(result, Err(RunError::EmptyInput)));
        let snapshot = state.snapshot();
        assert!(!snapshot.is_running);
        assert_eq!(snapshot.status, "Error occurred.");
        assert_eq!(snapshot.output_log, vec!["Error: Input box is empty.".to_string()]);
    }

    #[tokio::test]
    async fn test_classification_loads_once() {
        let mut loader = MockModelLoader::new();
        loader
            .expect_load_classifier()
            .times(1)
            .returning(|| Ok(Arc::new(EchoClassifier)));
        let (runner, state, metrics) = runner_with(loader);

        let first = runner
            .run(ModelKind::TextClassification, "I love this".to_string())
            .await
            .unwrap();
        let second = runner
            .run(ModelKind::TextClassification, "meh".to_string())
            .await
            .unwrap();

        assert_eq!(
            first,
            InferenceResult::Classification(Classification::new("POSITIVE", 0.99))
        );
        assert_eq!(
            second,
            InferenceResult::Classification(Classification::new("NEGATIVE", 0.99))
        );
        assert_eq!(metrics.model_loads(ModelKind::TextClassification), 1);
        assert_eq!(state.read(|s| s.status.clone()), "Done.");
        assert_eq!(state.read(|s| s.runs_succeeded), 2);
    }

    #[tokio::test]
    async fn test_first_run_reports_loading_status() {
        let mut loader = MockModelLoader::new();
        loader
            .expect_load_classifier()
            .returning(|| Ok(Arc::new(EchoClassifier)));
        let (runner, state, _metrics) = runner_with(loader);
        let mut rx = state.subscribe();

        runner
            .run(ModelKind::TextClassification, "great".to_string())
            .await
            .unwrap();

        let mut statuses = Vec::new();
        while let Ok(change) = rx.try_recv() {
            if let StateChange::StatusChanged { status } = change {
                statuses.push(status);
            }
        }
        assert_eq!(
            statuses,
            vec![
                "Running model...".to_string(),
                "Loading TextClassifier model...".to_string(),
                "Done.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_inference_failure_releases_run_flag() {
        let mut loader = MockModelLoader::new();
        loader
            .expect_load_image_generator()
            .returning(|| Ok(Arc::new(FailingGenerator)));
        let temp_dir = tempfile::TempDir::new().unwrap();
        let output_dir = Utf8PathBuf::try_from(temp_dir.path().join("out")).unwrap();

        let state = Arc::new(StateManager::new());
        let metrics = Arc::new(Metrics::new());
        let cache = Arc::new(ModelCache::new(Arc::new(loader)));
        let runner = ModelRunner::new(cache, Arc::clone(&state), Arc::clone(&metrics), output_dir);

        let err = runner
            .run(ModelKind::TextToImage, "a red fox".to_string())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "CUDA out of memory");
        assert!(state.read(|s| s.can_run()));
        assert_eq!(state.read(|s| s.last_image_path.clone()), None);
        assert_eq!(
            metrics.runs_failed.load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn test_rejects_concurrent_run() {
        let loader = MockModelLoader::new();
        let (runner, state, _metrics) = runner_with(loader);
        assert!(state.begin_run(ModelKind::TextToImage));

        // Rejected before any worker is spawned, so no runtime is needed
        let result = tokio_test::block_on(
            runner.run(ModelKind::TextClassification, "hello".to_string()),
        );

        assert!(matches!(result, Err(RunError::AlreadyRunning)));
        // The in-flight run still owns the flag
        assert!(state.read(|s| s.is_running));
        assert!(state.read(|s| s.output_log.is_empty()));
    }
}
