// EventLoopBridge - hands work between the tokio runtime and the Slint event loop
//
// Slint owns the main thread; model runs live on tokio. Background code never
// touches the window directly: it queues closures that run on the event loop.

use crate::metrics::Metrics;
use slint::ComponentHandle;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Capacity of the pending UI update queue
const UI_QUEUE_CAPACITY: usize = 100;

type UiUpdate<T> = Box<dyn FnOnce(&T) + Send>;

/// Coordinates between the tokio runtime and the Slint event loop
///
/// The bridge owns the forwarding thread; callbacks and workers use the
/// cloneable [`EventLoopBridgeHandle`]:
/// - [`update_ui`](EventLoopBridgeHandle::update_ui) queues a closure for the event loop thread
/// - [`spawn_async`](EventLoopBridgeHandle::spawn_async) starts a task on tokio from a Slint callback
///
/// # Example
/// ```ignore
/// let bridge = EventLoopBridge::new(&ui, runtime.handle().clone(), metrics);
/// let handle = bridge.clone_handle();
/// let ui_handle = handle.clone();
/// handle.spawn_async(move || async move {
///     ui_handle.update_ui(|ui| ui.set_status_message("Done.".into()));
/// });
/// ```
pub struct EventLoopBridge<T: ComponentHandle> {
    handle: EventLoopBridgeHandle<T>,
}

impl<T: ComponentHandle + 'static> EventLoopBridge<T> {
    /// Create the bridge and its forwarding thread.
    ///
    /// The forwarding thread drains the update queue into
    /// `upgrade_in_event_loop` and exits once the event loop is gone.
    pub fn new(ui: &T, tokio_handle: tokio::runtime::Handle, metrics: Arc<Metrics>) -> Self {
        let ui_weak = ui.as_weak();
        let (ui_update_tx, mut ui_update_rx) = mpsc::channel::<UiUpdate<T>>(UI_QUEUE_CAPACITY);

        let forward_metrics = Arc::clone(&metrics);
        std::thread::Builder::new()
            .name("ui-bridge".to_string())
            .spawn(move || {
                tracing::debug!("EventLoopBridge handler thread started");

                while let Some(update_fn) = ui_update_rx.blocking_recv() {
                    let result = ui_weak.upgrade_in_event_loop(move |ui| {
                        update_fn(&ui);
                    });

                    match result {
                        Ok(()) => forward_metrics.record_ui_update(),
                        Err(e) => {
                            // Event loop has stopped; nothing left to update
                            tracing::warn!("Failed to queue UI update to event loop: {:?}", e);
                            break;
                        }
                    }
                }

                tracing::debug!("EventLoopBridge handler thread terminated");
            })
            .map_err(|e| tracing::error!("Failed to start UI bridge thread: {}", e))
            .ok();

        Self {
            handle: EventLoopBridgeHandle {
                tokio_handle,
                ui_update_tx,
                metrics,
            },
        }
    }

    /// Cloneable handle for capturing in callbacks and worker threads
    pub fn clone_handle(&self) -> EventLoopBridgeHandle<T> {
        self.handle.clone()
    }
}

/// Cloneable half of [`EventLoopBridge`]
pub struct EventLoopBridgeHandle<T: ComponentHandle> {
    tokio_handle: tokio::runtime::Handle,
    ui_update_tx: mpsc::Sender<UiUpdate<T>>,
    metrics: Arc<Metrics>,
}

// Manual Clone implementation to avoid requiring T: Clone
impl<T: ComponentHandle> Clone for EventLoopBridgeHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tokio_handle: self.tokio_handle.clone(),
            ui_update_tx: self.ui_update_tx.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<T: ComponentHandle + 'static> EventLoopBridgeHandle<T> {
    /// Queue a UI update from any thread.
    ///
    /// The queue is bounded; when it is full the update is dropped and counted.
    pub fn update_ui<F>(&self, update: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        match self.ui_update_tx.try_send(Box::new(update)) {
            Ok(_) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.record_ui_update_dropped();
                tracing::warn!("UI update channel full - skipping update");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("Failed to send UI update - handler thread has stopped");
            }
        }
    }

    /// Spawn an async task on the tokio runtime from a Slint callback.
    pub fn spawn_async<F, Fut>(&self, future_factory: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.tokio_handle.spawn(async move {
            future_factory().await;
        });
    }
}
