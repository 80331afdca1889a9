//! Dependent option loading driven through `FormSession` with a source
//! whose responses are released by hand, so completion order is scripted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dynform_engine::{
    FieldPath, FormEngine, FormSession, OptionKey, OptionSource, OptionsView, RecordingTransport,
    TransportError,
};
use dynform_schema::Form;
use serde_json::json;
use tokio::sync::Notify;

// ──────────────────────────────────────────────
// Gated source
// ──────────────────────────────────────────────

/// Each fetch blocks until its dependency value is released.
#[derive(Default)]
struct GatedSource {
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
}

impl GatedSource {
    fn gate(&self, value: &str) -> Arc<Notify> {
        let mut gates = self.gates.lock().unwrap();
        gates
            .entry(value.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    fn release(&self, value: &str) {
        self.gate(value).notify_one();
    }

    fn calls_for(&self, value: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|v| *v == value)
            .count()
    }
}

#[async_trait]
impl OptionSource for GatedSource {
    async fn fetch_options(&self, key: &OptionKey) -> Result<Vec<String>, TransportError> {
        self.calls.lock().unwrap().push(key.value.clone());
        let gate = self.gate(&key.value);
        gate.notified().await;
        match key.value.as_str() {
            "US" => Ok(vec!["California".into(), "New York".into()]),
            "CA" => Ok(vec!["Ontario".into(), "Quebec".into()]),
            "DOWN" => Err(TransportError::Status {
                url: key.endpoint.clone(),
                status: 503,
                message: None,
            }),
            other => Ok(vec![format!("{}-1", other)]),
        }
    }
}

fn address_form() -> FormEngine {
    let loaded = Form::from_json(&json!({
        "formId": "address",
        "title": "Address",
        "fields": [
            {"id": "country", "label": "Country", "type": "text", "required": true},
            {"id": "state", "label": "State", "type": "select", "required": true,
             "dynamicOptions": {"dependsOn": "country", "endpoint": "/api/getStates", "method": "GET"}}
        ]
    }))
    .unwrap();
    FormEngine::new(loaded)
}

fn session(source: Arc<GatedSource>) -> FormSession {
    FormSession::new(
        address_form(),
        source,
        Arc::new(RecordingTransport::accepting()),
    )
}

fn country() -> FieldPath {
    FieldPath::new("country")
}

fn state() -> FieldPath {
    FieldPath::new("state")
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[tokio::test]
async fn late_response_for_old_country_is_not_shown() {
    let source = Arc::new(GatedSource::default());
    let mut s = session(source.clone());

    s.set_answer(&country(), "US".into()).unwrap();
    s.set_answer(&country(), "CA".into()).unwrap();
    assert_eq!(s.outstanding(), 2);

    source.release("CA");
    assert!(s.next_completion().await);
    assert_eq!(
        s.engine().options(&state()).unwrap().options(),
        ["Ontario".to_string(), "Quebec".to_string()]
    );
    s.set_answer(&state(), "Quebec".into()).unwrap();

    source.release("US");
    s.settle().await;
    assert_eq!(
        s.engine().options(&state()).unwrap().options(),
        ["Ontario".to_string(), "Quebec".to_string()]
    );
    assert_eq!(s.engine().answer(&state()), Some(&"Quebec".into()));
    assert_eq!(source.calls_for("US"), 1);

    // The late US result was cached: going back needs no second fetch.
    s.set_answer(&country(), "US".into()).unwrap();
    assert_eq!(s.outstanding(), 0);
    assert_eq!(
        s.engine().options(&state()).unwrap(),
        OptionsView::Ready(vec!["California".into(), "New York".into()])
    );
    assert_eq!(source.calls_for("US"), 1);
}

#[tokio::test]
async fn rapid_changes_settle_on_last_value() {
    let source = Arc::new(GatedSource::default());
    let mut s = session(source.clone());

    for value in ["A", "B", "C"] {
        s.set_answer(&country(), value.into()).unwrap();
    }
    source.release("C");
    source.release("A");
    source.release("B");
    s.settle().await;

    assert_eq!(
        s.engine().options(&state()).unwrap(),
        OptionsView::Ready(vec!["C-1".into()])
    );
}

#[tokio::test]
async fn dependent_answer_is_cleared_before_new_options_arrive() {
    let source = Arc::new(GatedSource::default());
    let mut s = session(source.clone());

    s.set_answer(&country(), "US".into()).unwrap();
    source.release("US");
    s.settle().await;
    s.set_answer(&state(), "California".into()).unwrap();

    s.set_answer(&country(), "CA".into()).unwrap();
    assert_eq!(s.engine().answer(&state()), None);
    assert!(s.engine().options(&state()).unwrap().is_pending());
    assert!(s.set_answer(&state(), "California".into()).is_err());

    source.release("CA");
    s.settle().await;
    assert_eq!(s.engine().answer(&state()), None);
}

#[tokio::test]
async fn same_value_does_not_refetch() {
    let source = Arc::new(GatedSource::default());
    let mut s = session(source.clone());

    s.set_answer(&country(), "US".into()).unwrap();
    s.set_answer(&country(), "US".into()).unwrap();
    assert_eq!(s.outstanding(), 1);
    source.release("US");
    s.settle().await;
    assert_eq!(source.calls_for("US"), 1);
}

#[tokio::test]
async fn failed_fetch_can_be_retried() {
    let source = Arc::new(GatedSource::default());
    let mut s = session(source.clone());

    s.set_answer(&country(), "DOWN".into()).unwrap();
    source.release("DOWN");
    s.settle().await;
    match s.engine().options(&state()).unwrap() {
        OptionsView::Failed(err) => assert_eq!(err.endpoint, "/api/getStates"),
        other => panic!("expected failure, got {:?}", other),
    }

    s.retry_options(&state()).unwrap();
    assert_eq!(s.outstanding(), 1);
    assert!(s.engine().options(&state()).unwrap().is_pending());
    source.release("DOWN");
    s.settle().await;
    assert_eq!(source.calls_for("DOWN"), 2);

    // The form stays editable while options are unavailable.
    s.set_answer(&country(), "US".into()).unwrap();
    assert_eq!(s.outstanding(), 1);
    assert!(s.retry_options(&country()).is_err());
}

#[tokio::test]
async fn clearing_dependency_resets_select() {
    let source = Arc::new(GatedSource::default());
    let mut s = session(source.clone());

    s.set_answer(&country(), "US".into()).unwrap();
    source.release("US");
    s.settle().await;
    s.set_answer(&state(), "New York".into()).unwrap();

    s.clear_answer(&country()).unwrap();
    assert_eq!(s.engine().answer(&state()), None);
    assert_eq!(s.engine().options(&state()).unwrap(), OptionsView::Idle);
    assert_eq!(s.outstanding(), 0);
}

#[tokio::test]
async fn reselecting_same_value_retries_failed_fetch() {
    let source = Arc::new(GatedSource::default());
    let mut s = session(source.clone());

    s.set_answer(&country(), "DOWN".into()).unwrap();
    source.release("DOWN");
    s.settle().await;
    assert!(matches!(
        s.engine().options(&state()),
        Some(OptionsView::Failed(_))
    ));

    s.set_answer(&country(), "DOWN".into()).unwrap();
    assert_eq!(s.outstanding(), 1);
    source.release("DOWN");
    s.settle().await;
    assert_eq!(source.calls_for("DOWN"), 2);
}
