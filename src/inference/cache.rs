use super::{ImageGenerator, InferenceError, ModelLoader, SentimentClassifier};
use crate::models::ModelKind;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// At most one live instance of each wrapper per session.
///
/// Instances are created on first use and kept until the cache is dropped.
/// A failed load leaves the slot empty, so the next request loads again.
/// Loading happens under the slot's lock; concurrent callers wait for the
/// first load instead of starting a second one.
pub struct ModelCache {
    loader: Arc<dyn ModelLoader>,
    image_generator: Mutex<Option<Arc<dyn ImageGenerator>>>,
    classifier: Mutex<Option<Arc<dyn SentimentClassifier>>>,
}

impl ModelCache {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            image_generator: Mutex::new(None),
            classifier: Mutex::new(None),
        }
    }

    /// Whether the wrapper for `kind` is already in memory
    pub fn is_loaded(&self, kind: ModelKind) -> bool {
        match kind {
            ModelKind::TextToImage => self
                .image_generator
                .lock()
                .map(|slot| slot.is_some())
                .unwrap_or(false),
            ModelKind::TextClassification => self
                .classifier
                .lock()
                .map(|slot| slot.is_some())
                .unwrap_or(false),
        }
    }

    /// Whether the next request for `kind` will have to load it first
    pub fn needs_load(&self, kind: ModelKind) -> bool {
        !self.is_loaded(kind)
    }

    pub fn image_generator(&self) -> Result<Arc<dyn ImageGenerator>, InferenceError> {
        get_or_load(&self.image_generator, ModelKind::TextToImage, || {
            self.loader.load_image_generator()
        })
    }

    pub fn classifier(&self) -> Result<Arc<dyn SentimentClassifier>, InferenceError> {
        get_or_load(&self.classifier, ModelKind::TextClassification, || {
            self.loader.load_classifier()
        })
    }
}

fn get_or_load<T: ?Sized>(
    slot: &Mutex<Option<Arc<T>>>,
    kind: ModelKind,
    load: impl FnOnce() -> Result<Arc<T>, InferenceError>,
) -> Result<Arc<T>, InferenceError> {
    let mut guard = slot.lock().map_err(|_| InferenceError::LockPoisoned)?;
    if let Some(model) = guard.as_ref() {
        return Ok(Arc::clone(model));
    }

    tracing::info!("Loading {} model", kind.wrapper_name());
    let started = Instant::now();

    let model = load().inspect_err(|e| {
        tracing::error!("Failed to load {} model: {}", kind.wrapper_name(), e);
    })?;

    tracing::info!(
        "{} model loaded in {:.1}s",
        kind.wrapper_name(),
        started.elapsed().as_secs_f64()
    );
    *guard = Some(Arc::clone(&model));
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::MockModelLoader;
    use crate::models::Classification;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClassifier;

    impl SentimentClassifier for FixedClassifier {
        fn classify(&self, _text: &str) -> Result<Classification, InferenceError> {
            Ok(Classification::new("POSITIVE", 0.9))
        }
    }

    #[test]
    fn test_loads_once() {
        let mut loader = MockModelLoader::new();
        loader
            .expect_load_classifier()
            .times(1)
            .returning(|| Ok(Arc::new(FixedClassifier)));

        let cache = ModelCache::new(Arc::new(loader));
        assert!(cache.needs_load(ModelKind::TextClassification));

        let first = cache.classifier().unwrap();
        let second = cache.classifier().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.is_loaded(ModelKind::TextClassification));
        assert!(!cache.is_loaded(ModelKind::TextToImage));
    }

    #[test]
    fn test_failed_load_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);

        let mut loader = MockModelLoader::new();
        loader.expect_load_classifier().times(2).returning(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(InferenceError::Invalid("hub unreachable".to_string()))
            } else {
                Ok(Arc::new(FixedClassifier))
            }
        });

        let cache = ModelCache::new(Arc::new(loader));

        let err = cache.classifier().err().unwrap();
        assert_eq!(err.to_string(), "hub unreachable");
        assert!(!cache.is_loaded(ModelKind::TextClassification));

        assert!(cache.classifier().is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_image_generator_load_error_propagates() {
        let mut loader = MockModelLoader::new();
        loader
            .expect_load_image_generator()
            .times(1)
            .returning(|| Err(InferenceError::Invalid("no weights".to_string())));

        let cache = ModelCache::new(Arc::new(loader));
        assert!(cache.image_generator().is_err());
    }
}
