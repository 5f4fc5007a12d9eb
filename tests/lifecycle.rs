//! Lifecycle tests for the dispatcher and driver
//!
//! A scripted `Widget` handler records every call it receives and fails on
//! demand, so the ordering and tracker guarantees can be checked without a
//! provider.

use apigw_provisioner::dispatch::{Dispatcher, Outcome};
use apigw_provisioner::driver::Driver;
use apigw_provisioner::error::{ApiError, ApiErrorKind, ProvisionError};
use apigw_provisioner::event::{ChangeRequest, RequestType};
use apigw_provisioner::resource::{EventParams, Handler, HandlerSet};
use apigw_provisioner::response::{CompletionResponse, ReportError, Reporter, Status};
use apigw_provisioner::retry::RetryPolicy;
use apigw_provisioner::tracker::{MemoryTracker, ResourceTracker, TrackedEntry};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const IDENTITY: &str = "Widget-0123456789ab";

#[derive(Debug, Clone, Copy)]
enum Fault {
    RateLimit(u64),
    Throttled,
    Conflict,
}

impl Fault {
    fn into_error(self) -> ProvisionError {
        match self {
            Fault::RateLimit(secs) => ProvisionError::Provisioning(ApiError::rejected(
                ApiErrorKind::TooManyRequests,
                429,
                "Too Many Requests",
                Some(Duration::from_secs(secs)),
            )),
            Fault::Throttled => ProvisionError::Provisioning(ApiError::rejected(
                ApiErrorKind::TooManyRequests,
                429,
                "Too Many Requests",
                None,
            )),
            Fault::Conflict => ProvisionError::Provisioning(ApiError::rejected(
                ApiErrorKind::Conflict,
                409,
                "Widget already exists",
                None,
            )),
        }
    }
}

#[derive(Default)]
struct WidgetHandler {
    calls: Mutex<Vec<&'static str>>,
    create_faults: Mutex<VecDeque<Fault>>,
    delete_faults: Mutex<VecDeque<Fault>>,
    read_faults: Mutex<VecDeque<Fault>>,
    created: AtomicUsize,
    in_place: bool,
}

impl WidgetHandler {
    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn fail_create(&self, fault: Fault) {
        self.create_faults.lock().unwrap().push_back(fault);
    }

    fn fail_delete(&self, fault: Fault) {
        self.delete_faults.lock().unwrap().push_back(fault);
    }

    fn fail_read(&self, fault: Fault) {
        self.read_faults.lock().unwrap().push_back(fault);
    }

    fn step(&self, name: &'static str, faults: &Mutex<VecDeque<Fault>>) -> Result<(), ProvisionError> {
        self.calls.lock().unwrap().push(name);
        match faults.lock().unwrap().pop_front() {
            Some(fault) => Err(fault.into_error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Handler for WidgetHandler {
    fn name(&self) -> &'static str {
        "Widget"
    }

    fn extract_parameters(&self, request: &ChangeRequest) -> Result<EventParams, ProvisionError> {
        EventParams::from_request(request, &["name", "size"])
    }

    async fn create(&self, params: &EventParams) -> Result<TrackedEntry, ProvisionError> {
        self.step("create", &self.create_faults)?;
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TrackedEntry::new("Widget")
            .with("widgetId", format!("w-{}", n))
            .with("name", params.require_str("name")?))
    }

    fn supports_in_place_update(&self, _params: &EventParams) -> bool {
        self.in_place
    }

    async fn update(
        &self,
        entry: &TrackedEntry,
        _params: &EventParams,
    ) -> Result<TrackedEntry, ProvisionError> {
        self.calls.lock().unwrap().push("update");
        Ok(entry.clone())
    }

    async fn delete(&self, _entry: &TrackedEntry) -> Result<(), ProvisionError> {
        self.step("delete", &self.delete_faults)
    }

    async fn read_for_response(
        &self,
        _params: &EventParams,
        entry: &TrackedEntry,
    ) -> Result<Value, ProvisionError> {
        self.step("read", &self.read_faults)?;
        Ok(json!({ "widgetId": entry.identifier("widgetId")? }))
    }
}

#[derive(Default)]
struct Widgets {
    handler: WidgetHandler,
}

impl HandlerSet for Widgets {
    fn resolve(&self, tag: &str) -> Option<&dyn Handler> {
        (tag == "Widget").then_some(&self.handler as &dyn Handler)
    }
}

#[derive(Clone, Default)]
struct CapturingReporter {
    sent: Arc<Mutex<Vec<CompletionResponse>>>,
}

#[async_trait]
impl Reporter for CapturingReporter {
    async fn send(
        &self,
        _request: &ChangeRequest,
        response: &CompletionResponse,
    ) -> Result<(), ReportError> {
        self.sent.lock().unwrap().push(response.clone());
        Ok(())
    }
}

struct Fixture {
    widgets: Arc<Widgets>,
    tracker: Arc<MemoryTracker>,
    dispatcher: Dispatcher<Arc<Widgets>, Arc<MemoryTracker>>,
}

fn fixture() -> Fixture {
    fixture_with(WidgetHandler::default())
}

fn fixture_with(handler: WidgetHandler) -> Fixture {
    let widgets = Arc::new(Widgets { handler });
    let tracker = Arc::new(MemoryTracker::new());
    let dispatcher = Dispatcher::new(widgets.clone(), tracker.clone(), RetryPolicy::default());
    Fixture {
        widgets,
        tracker,
        dispatcher,
    }
}

fn request(request_type: RequestType, resource_type: &str, properties: Value) -> ChangeRequest {
    ChangeRequest {
        request_type,
        resource_type: resource_type.to_string(),
        physical_id: IDENTITY.to_string(),
        properties: properties.as_object().cloned().unwrap_or_default(),
        old_properties: None,
        stack_id: "stack".to_string(),
        request_id: "req-1".to_string(),
        logical_resource_id: "Widget".to_string(),
        response_url: None,
    }
}

fn widget(request_type: RequestType) -> ChangeRequest {
    request(
        request_type,
        "Custom::Widget",
        json!({ "name": "sprocket", "size": "3" }),
    )
}

async fn seed(f: &Fixture, widget_id: &str) {
    let entry = TrackedEntry::new("Widget").with("widgetId", widget_id);
    f.tracker.put(IDENTITY, &entry).await.unwrap();
}

async fn tracked_id(f: &Fixture) -> Option<String> {
    f.tracker
        .get(IDENTITY)
        .await
        .unwrap()
        .map(|entry| entry.identifiers["widgetId"].clone())
}

mod create {
    use super::*;

    #[tokio::test]
    async fn test_create_tracks_entry_and_returns_read_back() {
        let f = fixture();
        match f.dispatcher.process(&widget(RequestType::Create)).await {
            Outcome::Success { data } => assert_eq!(data, json!({ "widgetId": "w-1" })),
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(tracked_id(&f).await.as_deref(), Some("w-1"));
        assert_eq!(f.widgets.handler.calls(), vec!["create", "read"]);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_no_entry() {
        let f = fixture();
        f.widgets.handler.fail_create(Fault::Conflict);

        let outcome = f.dispatcher.process(&widget(RequestType::Create)).await;
        assert!(matches!(
            outcome,
            Outcome::Failure {
                error: ProvisionError::Provisioning(_)
            }
        ));
        assert!(f.tracker.is_empty().await);
        assert_eq!(f.widgets.handler.calls(), vec!["create"]);
    }

    #[tokio::test]
    async fn test_failed_read_back_leaves_no_entry() {
        let f = fixture();
        f.widgets.handler.fail_read(Fault::Conflict);

        let outcome = f.dispatcher.process(&widget(RequestType::Create)).await;
        assert!(!outcome.is_success());
        assert!(f.tracker.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_properties_reported_together() {
        let f = fixture();
        let outcome = f
            .dispatcher
            .process(&request(RequestType::Create, "Custom::Widget", json!({})))
            .await;

        match outcome {
            Outcome::Failure {
                error: ProvisionError::Validation(validation),
            } => assert_eq!(validation.fields(), vec!["name", "size"]),
            other => panic!("expected validation failure, got {:?}", other),
        }
        assert!(f.widgets.handler.calls().is_empty());
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn test_untracked_delete_is_trivial_success() {
        let f = fixture();
        let outcome = f.dispatcher.process(&widget(RequestType::Delete)).await;
        assert!(outcome.is_success());
        assert!(f.widgets.handler.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_entry() {
        let f = fixture();
        seed(&f, "w-0").await;
        f.widgets.handler.fail_delete(Fault::Conflict);

        let outcome = f.dispatcher.process(&widget(RequestType::Delete)).await;
        assert!(matches!(outcome, Outcome::Failure { .. }));
        assert_eq!(tracked_id(&f).await.as_deref(), Some("w-0"));
    }

    #[tokio::test]
    async fn test_delete_skips_validation() {
        let f = fixture();
        seed(&f, "w-0").await;
        let outcome = f
            .dispatcher
            .process(&request(RequestType::Delete, "Custom::Widget", json!({})))
            .await;
        assert!(outcome.is_success());
        assert!(f.tracker.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_then_delete_twice() {
        let f = fixture();
        assert!(f.dispatcher.process(&widget(RequestType::Create)).await.is_success());
        assert!(f.dispatcher.process(&widget(RequestType::Delete)).await.is_success());
        assert!(f.tracker.is_empty().await);

        assert!(f.dispatcher.process(&widget(RequestType::Delete)).await.is_success());
        assert_eq!(f.widgets.handler.calls(), vec!["create", "read", "delete"]);
    }
}

mod update {
    use super::*;

    #[tokio::test]
    async fn test_update_deletes_before_creating() {
        let f = fixture();
        seed(&f, "w-0").await;

        let outcome = f.dispatcher.process(&widget(RequestType::Update)).await;
        assert!(outcome.is_success());
        assert_eq!(f.widgets.handler.calls(), vec!["delete", "create", "read"]);
        assert_eq!(tracked_id(&f).await.as_deref(), Some("w-1"));
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_previous_entry() {
        let f = fixture();
        seed(&f, "w-0").await;
        f.widgets.handler.fail_delete(Fault::Conflict);

        let outcome = f.dispatcher.process(&widget(RequestType::Update)).await;
        assert!(!outcome.is_success());
        assert_eq!(f.widgets.handler.calls(), vec!["delete"]);
        assert_eq!(tracked_id(&f).await.as_deref(), Some("w-0"));
    }

    #[tokio::test]
    async fn test_failed_create_after_delete_leaves_no_stale_entry() {
        let f = fixture();
        seed(&f, "w-0").await;
        f.widgets.handler.fail_create(Fault::Conflict);

        let outcome = f.dispatcher.process(&widget(RequestType::Update)).await;
        assert!(!outcome.is_success());
        assert!(f.tracker.get(IDENTITY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_untracked_update_creates() {
        let f = fixture();
        assert!(f.dispatcher.process(&widget(RequestType::Update)).await.is_success());
        assert_eq!(f.widgets.handler.calls(), vec!["create", "read"]);
        assert_eq!(tracked_id(&f).await.as_deref(), Some("w-1"));
    }

    #[tokio::test]
    async fn test_in_place_update_skips_replacement() {
        let f = fixture_with(WidgetHandler {
            in_place: true,
            ..WidgetHandler::default()
        });
        seed(&f, "w-0").await;

        assert!(f.dispatcher.process(&widget(RequestType::Update)).await.is_success());
        assert_eq!(f.widgets.handler.calls(), vec!["update", "read"]);
        assert_eq!(tracked_id(&f).await.as_deref(), Some("w-0"));
    }
}

mod unknown_type {
    use super::*;

    #[tokio::test]
    async fn test_delete_of_unknown_type_succeeds() {
        let f = fixture();
        let reporter = CapturingReporter::default();
        let driver = Driver::new(f.dispatcher, reporter.clone());

        let request = request(RequestType::Delete, "Custom::ApiImport", json!({}));
        let outcome = driver.run(&request).await.unwrap();
        assert!(outcome.is_success());

        let sent = reporter.sent.lock().unwrap();
        assert_eq!(sent[0].status, Status::Success);
        assert_eq!(sent[0].physical_resource_id, IDENTITY);
    }

    #[tokio::test]
    async fn test_create_of_unknown_type_fails() {
        let f = fixture();
        let outcome = f
            .dispatcher
            .process(&request(RequestType::Create, "Custom::ApiImport", json!({})))
            .await;
        assert!(matches!(
            outcome,
            Outcome::Failure {
                error: ProvisionError::UnknownResourceType(_)
            }
        ));
    }
}

mod rate_limit {
    use super::*;

    #[tokio::test]
    async fn test_rate_limit_defers_with_margin() {
        let f = fixture();
        f.widgets.handler.fail_create(Fault::RateLimit(3));

        match f.dispatcher.process(&widget(RequestType::Create)).await {
            Outcome::Deferred { delay } => assert_eq!(delay, Duration::from_secs(8)),
            other => panic!("expected deferral, got {:?}", other),
        }
        assert!(f.tracker.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_replays_after_delay() {
        let f = fixture();
        f.widgets.handler.fail_create(Fault::RateLimit(3));
        let tracker = f.tracker.clone();
        let reporter = CapturingReporter::default();
        let driver = Driver::new(f.dispatcher, reporter.clone());

        let started = tokio::time::Instant::now();
        let outcome = driver.run(&widget(RequestType::Create)).await.unwrap();

        assert!(outcome.is_success());
        assert!(started.elapsed() >= Duration::from_secs(8));
        assert_eq!(f.widgets.handler.calls(), vec!["create", "create", "read"]);
        assert!(tracker.get(IDENTITY).await.unwrap().is_some());

        let sent = reporter.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].status, Status::Success);
        assert_eq!(sent[0].physical_resource_id, IDENTITY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_cap_reports_failure() {
        let f = fixture();
        for _ in 0..5 {
            f.widgets.handler.fail_create(Fault::RateLimit(1));
        }
        let reporter = CapturingReporter::default();
        let driver = Driver::new(f.dispatcher, reporter.clone()).with_max_reschedules(2);

        let outcome = driver.run(&widget(RequestType::Create)).await.unwrap();
        assert!(matches!(
            outcome,
            Outcome::Failure {
                error: ProvisionError::RescheduleLimit { attempts: 3 }
            }
        ));
        assert_eq!(f.widgets.handler.calls(), vec!["create", "create", "create"]);

        let sent = reporter.sent.lock().unwrap();
        assert_eq!(sent[0].status, Status::Failed);
    }

    #[tokio::test]
    async fn test_rate_limit_without_delay_is_terminal() {
        let f = fixture();
        f.widgets.handler.fail_delete(Fault::Throttled);
        seed(&f, "w-0").await;

        let outcome = f.dispatcher.process(&widget(RequestType::Delete)).await;
        assert!(outcome.is_terminal());
        assert!(!outcome.is_success());
        assert_eq!(tracked_id(&f).await.as_deref(), Some("w-0"));
    }
}

mod unusable_event {
    use super::*;
    use apigw_provisioner::event::CloudFormationEvent;

    fn event(request_type: &str) -> CloudFormationEvent {
        serde_json::from_value(json!({
            "RequestType": request_type,
            "ResourceType": "Custom::ApiAuthorizer",
            "ResponseURL": "http://127.0.0.1:9/x",
            "StackId": "stack",
            "RequestId": "req-1",
            "LogicalResourceId": "Authorizer",
            "ResourceProperties": {}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_delete_without_identity_still_reports_success() {
        let f = fixture();
        let reporter = CapturingReporter::default();
        let driver = Driver::new(f.dispatcher, reporter.clone());

        let outcome = driver.run_event(event("Delete")).await.unwrap();
        assert!(outcome.is_success());
        assert!(f.widgets.handler.calls().is_empty());

        let sent = reporter.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].status, Status::Success);
        assert_eq!(sent[0].physical_resource_id, "Authorizer");
        assert_eq!(sent[0].request_id, "req-1");
    }

    #[tokio::test]
    async fn test_update_without_identity_reports_failure() {
        let f = fixture();
        let reporter = CapturingReporter::default();
        let driver = Driver::new(f.dispatcher, reporter.clone());

        let outcome = driver.run_event(event("Update")).await.unwrap();
        assert!(matches!(
            outcome,
            Outcome::Failure {
                error: ProvisionError::InvalidEvent(_)
            }
        ));

        let sent = reporter.sent.lock().unwrap();
        assert_eq!(sent[0].status, Status::Failed);
        assert!(sent[0].reason.contains("PhysicalResourceId"));
    }

    #[tokio::test]
    async fn test_convertible_event_runs_normally() {
        let f = fixture();
        let reporter = CapturingReporter::default();
        let driver = Driver::new(f.dispatcher, reporter.clone());

        let mut raw = event("Create");
        raw.resource_type = "Custom::Widget".to_string();
        raw.resource_properties = json!({ "name": "sprocket", "size": "3" })
            .as_object()
            .cloned()
            .unwrap();

        let outcome = driver.run_event(raw).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(f.widgets.handler.calls(), vec!["create", "read"]);
        assert!(reporter.sent.lock().unwrap()[0]
            .physical_resource_id
            .starts_with("Authorizer-"));
    }
}

mod tracker_failure {
    use super::*;
    use apigw_provisioner::error::TrackerError;

    /// Tracker whose reads or writes fail on demand
    #[derive(Default)]
    struct BrokenTracker {
        inner: MemoryTracker,
        fail_get: bool,
        fail_put: bool,
    }

    fn unavailable() -> TrackerError {
        TrackerError::Io(std::io::Error::other("tracker unavailable"))
    }

    #[async_trait]
    impl ResourceTracker for BrokenTracker {
        async fn get(&self, identity: &str) -> Result<Option<TrackedEntry>, TrackerError> {
            if self.fail_get {
                return Err(unavailable());
            }
            self.inner.get(identity).await
        }

        async fn put(&self, identity: &str, entry: &TrackedEntry) -> Result<(), TrackerError> {
            if self.fail_put {
                return Err(unavailable());
            }
            self.inner.put(identity, entry).await
        }

        async fn delete(&self, identity: &str) -> Result<(), TrackerError> {
            self.inner.delete(identity).await
        }
    }

    fn dispatcher(
        tracker: BrokenTracker,
    ) -> (Arc<Widgets>, Dispatcher<Arc<Widgets>, BrokenTracker>) {
        let widgets = Arc::new(Widgets::default());
        let dispatcher = Dispatcher::new(widgets.clone(), tracker, RetryPolicy::default());
        (widgets, dispatcher)
    }

    fn assert_tracker_failure(outcome: Outcome, expected: &str) {
        match outcome {
            Outcome::Failure {
                error: ProvisionError::Tracker { operation, .. },
            } => assert_eq!(operation, expected),
            other => panic!("expected tracker failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_with_unreadable_tracker_touches_nothing() {
        let (widgets, dispatcher) = dispatcher(BrokenTracker {
            fail_get: true,
            ..BrokenTracker::default()
        });

        let outcome = dispatcher.process(&widget(RequestType::Delete)).await;
        assert_tracker_failure(outcome, "get");
        assert!(widgets.handler.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_with_unreadable_tracker_touches_nothing() {
        let (widgets, dispatcher) = dispatcher(BrokenTracker {
            fail_get: true,
            ..BrokenTracker::default()
        });

        let outcome = dispatcher.process(&widget(RequestType::Update)).await;
        assert_tracker_failure(outcome, "get");
        assert!(widgets.handler.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_with_unwritable_tracker_fails() {
        let (widgets, dispatcher) = dispatcher(BrokenTracker {
            fail_put: true,
            ..BrokenTracker::default()
        });

        let outcome = dispatcher.process(&widget(RequestType::Create)).await;
        assert!(outcome.is_terminal());
        assert_tracker_failure(outcome, "put");
        assert_eq!(widgets.handler.calls(), vec!["create", "read"]);
    }
}
