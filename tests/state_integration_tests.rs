//! Integration tests for StateManager with state change events
//!
//! These tests verify that the StateManager correctly:
//! - Emits state change events on mutations
//! - Supports multiple subscribers
//! - Allows only one run in flight, even under concurrent requests
//! - Walks the status line through a run's life cycle

use camino::Utf8PathBuf;
use model_demo::models::Classification;
use model_demo::{InferenceResult, ModelKind, StateChange, StateManager};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast::Receiver;
use tokio::time::{Duration, timeout};

fn drain(rx: &mut Receiver<StateChange>) -> Vec<StateChange> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn statuses(events: &[StateChange]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            StateChange::StatusChanged { status } => Some(status.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_run_started_event_emitted() {
    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    assert!(state.begin_run(ModelKind::TextClassification));

    let event = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed");

    assert!(
        matches!(
            event,
            StateChange::RunStarted {
                model: ModelKind::TextClassification
            }
        ),
        "Expected RunStarted event, got: {:?}",
        event
    );
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let state = Arc::new(StateManager::new());
    let mut rx1 = state.subscribe();
    let mut rx2 = state.subscribe();
    let mut rx3 = state.subscribe();

    state.select_model(ModelKind::TextClassification);

    for rx in [&mut rx1, &mut rx2, &mut rx3] {
        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("Timeout")
            .expect("Channel closed");
        assert!(matches!(
            event,
            StateChange::ModelSelected {
                model: ModelKind::TextClassification,
                ..
            }
        ));
    }
}

#[test]
fn test_classification_run_life_cycle() {
    let state = StateManager::new();
    let mut rx = state.subscribe();

    assert_eq!(state.read(|s| s.status.clone()), "Ready");
    assert!(state.begin_run(ModelKind::TextClassification));
    state.set_status("Loading TextClassifier model...");
    state.complete_run(&InferenceResult::Classification(Classification::new(
        "POSITIVE", 0.9987,
    )));

    let events = drain(&mut rx);
    assert_eq!(
        statuses(&events),
        vec!["Running model...", "Loading TextClassifier model...", "Done."]
    );
    assert!(events.contains(&StateChange::RunFinished { succeeded: true }));
    assert!(events.contains(&StateChange::OutputAppended {
        line: "Label: POSITIVE\nConfidence: 1.0".to_string()
    }));

    let snapshot = state.snapshot();
    assert!(!snapshot.is_running);
    assert_eq!(snapshot.last_image_path, None);
}

#[test]
fn test_image_run_sets_last_image() {
    let state = StateManager::new();
    let mut rx = state.subscribe();
    let path = Utf8PathBuf::from("outputs/tti_output_1700000000.png");

    assert!(state.begin_run(ModelKind::TextToImage));
    state.complete_run(&InferenceResult::Image { path: path.clone() });

    let events = drain(&mut rx);
    assert!(events.contains(&StateChange::LastImageChanged {
        path: Some(path.clone())
    }));
    assert_eq!(
        state.read(|s| s.output_text()),
        "Image saved to: outputs/tti_output_1700000000.png"
    );
}

#[test]
fn test_failed_run_keeps_previous_image() {
    let state = StateManager::new();
    let path = Utf8PathBuf::from("outputs/tti_output_1.png");

    assert!(state.begin_run(ModelKind::TextToImage));
    state.complete_run(&InferenceResult::Image { path: path.clone() });

    let mut rx = state.subscribe();
    assert!(state.begin_run(ModelKind::TextToImage));
    state.fail_run("out of memory");

    let events = drain(&mut rx);
    assert!(events.contains(&StateChange::RunFailed {
        message: "out of memory".to_string()
    }));
    assert!(events.contains(&StateChange::RunFinished { succeeded: false }));
    assert_eq!(statuses(&events), vec!["Running model...", "Error occurred."]);

    let snapshot = state.snapshot();
    assert_eq!(snapshot.last_image_path, Some(path));
    assert_eq!(snapshot.output_log.last().unwrap(), "Error: out of memory");
    assert_eq!(snapshot.runs_failed, 1);
    assert_eq!(snapshot.runs_succeeded, 1);
}

#[test]
fn test_clear_resets_outputs() {
    let state = StateManager::new();
    assert!(state.begin_run(ModelKind::TextToImage));
    state.complete_run(&InferenceResult::Image {
        path: "outputs/tti_output_2.png".into(),
    });

    let mut rx = state.subscribe();
    state.clear_outputs();

    let events = drain(&mut rx);
    assert!(events.contains(&StateChange::OutputCleared));
    assert!(events.contains(&StateChange::LastImageChanged { path: None }));
    assert_eq!(events.last(), Some(&StateChange::StateReset));

    let snapshot = state.snapshot();
    assert!(snapshot.output_log.is_empty());
    assert_eq!(snapshot.status, "Cleared.");
    assert_eq!(snapshot.last_image_path, None);
}

#[test]
fn test_concurrent_begin_run_admits_one() {
    let state = Arc::new(StateManager::new());
    let admitted = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let state = Arc::clone(&state);
            let admitted = Arc::clone(&admitted);
            std::thread::spawn(move || {
                let model = if i % 2 == 0 {
                    ModelKind::TextToImage
                } else {
                    ModelKind::TextClassification
                };
                if state.begin_run(model) {
                    admitted.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(admitted.load(Ordering::SeqCst), 1);
    assert!(state.read(|s| s.is_running));
}

#[test]
fn test_run_flag_released_for_next_run() {
    let state = StateManager::new();

    assert!(state.begin_run(ModelKind::TextClassification));
    assert!(!state.begin_run(ModelKind::TextClassification));
    state.fail_run("Input box is empty.");

    assert!(state.begin_run(ModelKind::TextClassification));
}
