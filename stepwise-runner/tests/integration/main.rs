// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests: device log lines in, report records out.

use camino_tempfile::Utf8TempDir;
use chrono::{DateTime, FixedOffset};
use indoc::indoc;
use maplit::btreemap;
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use stepwise_report::{Status, StepRecord};
use stepwise_runner::{
    attachment::{ArtifactOrigin, ArtifactStore, AttachmentCollector},
    config::{DEFAULT_METRICS_KEY, StepsCaptureConfig},
    logcat::{FileLogWriter, LogcatListener},
    metadata::{MetadataIndex, TestMetadata},
    reporter::{
        DeviceInfo, DevicePoolId, ExecutionReport, Reporter, ReportSummary, TestExecutionAttempt,
        TestIdentity, TestStatus, history_id, junit::build_junit_report,
    },
    steps::TestMetrics,
};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    Layer,
    layer::{Context, SubscriberExt},
};
use uuid::Uuid;

struct Device {
    pool_id: DevicePoolId,
    info: DeviceInfo,
    listener: LogcatListener,
}

impl Device {
    fn new(serial: &str, log_dir: &Utf8TempDir, store: &Arc<ArtifactStore>) -> Self {
        let pool_id = DevicePoolId::new("omni");
        let info = DeviceInfo::new(serial).with_model("sdk_gphone64_x86_64");
        let collector = AttachmentCollector::new()
            .with_attachment_listener(store.clone())
            .with_steps_listener(store.clone());
        let listener = LogcatListener::new(
            pool_id.clone(),
            info.clone(),
            &StepsCaptureConfig::default(),
            Box::new(FileLogWriter::new(log_dir.path())),
            collector,
        );
        Self {
            pool_id,
            info,
            listener,
        }
    }

    /// Runs a test on this device, feeding `log` as its output.
    fn run(
        &mut self,
        store: &ArtifactStore,
        test: &TestIdentity,
        status: TestStatus,
        start: &str,
        log: &str,
    ) -> TestExecutionAttempt {
        self.run_with_metrics(store, test, status, start, log, &TestMetrics::new())
    }

    fn run_with_metrics(
        &mut self,
        store: &ArtifactStore,
        test: &TestIdentity,
        status: TestStatus,
        start: &str,
        log: &str,
        metrics: &TestMetrics,
    ) -> TestExecutionAttempt {
        self.listener.test_started(test);
        for line in log.lines() {
            self.listener.on_line(line);
        }
        self.listener.test_ended(test, metrics);

        let start = timestamp(start);
        let origin = ArtifactOrigin::new(test, &self.pool_id, &self.info);
        TestExecutionAttempt::new(
            test.clone(),
            self.pool_id.clone(),
            self.info.clone(),
            status,
            start,
            start + chrono::Duration::seconds(2),
        )
        .with_artifacts(store.take(&origin))
    }
}

/// Records the level of every event, so tests can count diagnostics.
#[derive(Clone, Default)]
struct LevelRecorder {
    levels: Arc<Mutex<Vec<Level>>>,
}

impl LevelRecorder {
    fn count(&self, level: Level) -> usize {
        let levels = self.levels.lock().expect("recorder lock is not poisoned");
        levels.iter().filter(|&&recorded| recorded == level).count()
    }
}

impl<S: Subscriber> Layer<S> for LevelRecorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.levels
            .lock()
            .expect("recorder lock is not poisoned")
            .push(*event.metadata().level());
    }
}

fn timestamp(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).expect("timestamp is valid")
}

static FLAKY_FAILED_LOG: &str = indoc! {r#"
    I/TestRunner( 4321): started: login(com.example.LoginTest)
    I/KASPRESSO( 4321): TEST STEP: "1. Open login screen" in LoginTest succeeded
    I/KASPRESSO: #AllureStepsInfoJson#:[{"name":"1. Open login screen","status":"passed",
    "stage":"finished","steps":[]},
    D/Choreographer( 4321): Skipped 31 frames!  The application may be doing too much work.
    I/KASPRESSO: #AllureStepsInfoJson#:{"name":"2. Check greeting","status":"failed","stage":"finished","steps":[]}]
    E/TestRunner( 4321): failed: login(com.example.LoginTest)
    I/TestRunner( 4321): TestRunner: failed: login(com.example.LoginTest)
"#};

static FLAKY_PASSED_LOG: &str = indoc! {r#"
    I/TestRunner( 5555): started: login(com.example.LoginTest)
    I/KASPRESSO: #AllureStepsInfoJson#:[{"name":"1. Open login screen","status":"passed","stage":"finished"},
    I/KASPRESSO: #AllureStepsInfoJson#:{"name":"2. Check greeting","status":"passed","stage":"teleported"}]
    I/TestRunner( 5555): TestRunner: finished: login(com.example.LoginTest)
"#};

static CORRUPT_LOG: &str = indoc! {r#"
    I/KASPRESSO: #AllureStepsInfoJson#:[{"name":"1. Add to cart","status":
    I/TestRunner( 4321): TestRunner: finished: checkout(com.example.CartTest)
"#};

#[test]
fn flaky_and_corrupt_tests() {
    let log_dir = Utf8TempDir::new().expect("temp dir created");
    let store = Arc::new(ArtifactStore::new());
    let mut first = Device::new("emulator-5554", &log_dir, &store);
    let mut second = Device::new("emulator-5556", &log_dir, &store);

    let login = TestIdentity::new("com.example", "LoginTest", "login");
    let checkout = TestIdentity::new("com.example", "CartTest", "checkout");

    first.listener.test_run_started();
    second.listener.test_run_started();
    let mut report = ExecutionReport::new();
    report.push(first.run(
        &store,
        &login,
        TestStatus::Failure,
        "2023-11-14T22:13:20Z",
        FLAKY_FAILED_LOG,
    ));
    report.push(first.run(
        &store,
        &checkout,
        TestStatus::Passed,
        "2023-11-14T22:13:30Z",
        CORRUPT_LOG,
    ));
    report.push(second.run(
        &store,
        &login,
        TestStatus::Passed,
        "2023-11-14T22:13:40Z",
        FLAKY_PASSED_LOG,
    ));
    first.listener.test_run_ended();
    second.listener.test_run_ended();

    let mut metadata = MetadataIndex::new();
    metadata.insert(
        login.clone(),
        [("Feature", "Authentication"), ("Severity", "blocker")]
            .into_iter()
            .collect::<TestMetadata>(),
    );

    let mut records = Vec::new();
    let summary = Reporter::with_uuid_source(Uuid::nil)
        .generate(&report, &metadata, &mut records)
        .expect("reporting succeeds");
    assert_eq!(
        summary,
        ReportSummary {
            tests: 2,
            records_written: 2,
            suppressed_attempts: 1,
        }
    );

    // The passing retry on the second device is reported for login.
    let login_record = &records[0];
    assert_eq!(login_record.status, Status::Passed);
    assert_eq!(login_record.label("host"), Some("emulator-5556"));
    assert_eq!(login_record.label("feature"), Some("Authentication"));
    assert_eq!(login_record.label("severity"), Some("blocker"));
    assert_eq!(login_record.history_id.as_deref(), Some(history_id(&login).as_str()));
    let step_names: Vec<_> = login_record
        .steps
        .iter()
        .map(|step: &StepRecord| (step.name.as_deref(), step.status, step.stage.as_str()))
        .collect();
    assert_eq!(
        step_names,
        vec![
            (Some("1. Open login screen"), Status::Passed, "finished"),
            (Some("2. Check greeting"), Status::Passed, "unknown"),
        ]
    );
    assert_eq!(login_record.attachments.len(), 1);
    assert_eq!(
        login_record.attachments[0].source,
        log_dir
            .path()
            .join("omni/emulator-5556/com.example.LoginTest#login.log")
            .as_str()
    );

    // A corrupt step payload fails the test even though the instrumentation said it passed.
    let checkout_record = &records[1];
    assert_eq!(checkout_record.status, Status::Failed);
    assert!(checkout_record.steps.is_empty());

    let junit = build_junit_report("android", &report).expect("groups are well-formed");
    assert_eq!(junit.tests, 2);
    assert_eq!(junit.failures, 1);
}

#[test]
fn flaky_failed_log_payload() {
    let log_dir = Utf8TempDir::new().expect("temp dir created");
    let store = Arc::new(ArtifactStore::new());
    let mut device = Device::new("emulator-5554", &log_dir, &store);
    let login = TestIdentity::new("com.example", "LoginTest", "login");

    let attempt = device.run(
        &store,
        &login,
        TestStatus::Failure,
        "2023-11-14T22:13:20Z",
        FLAKY_FAILED_LOG,
    );
    let payload = attempt.step_payload().expect("payload was logged");
    let steps = stepwise_runner::steps::try_decode_steps(payload.json())
        .expect("interleaved lines were removed");
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[1].status, Status::Failed);
}

#[test]
fn malformed_payload_is_reported_once() {
    let recorder = LevelRecorder::default();
    let subscriber = tracing_subscriber::registry().with(recorder.clone());

    tracing::subscriber::with_default(subscriber, || {
        let log_dir = Utf8TempDir::new().expect("temp dir created");
        let store = Arc::new(ArtifactStore::new());
        let mut device = Device::new("emulator-5554", &log_dir, &store);
        let checkout = TestIdentity::new("com.example", "CartTest", "checkout");

        let report: ExecutionReport = [device.run(
            &store,
            &checkout,
            TestStatus::Passed,
            "2023-11-14T22:13:30Z",
            CORRUPT_LOG,
        )]
        .into_iter()
        .collect();
        assert!(report.attempts()[0].steps().is_malformed());

        let mut records = Vec::new();
        Reporter::with_uuid_source(Uuid::nil)
            .generate(&report, &MetadataIndex::new(), &mut records)
            .expect("reporting succeeds");
        let junit = build_junit_report("android", &report).expect("groups are well-formed");

        assert_eq!(records[0].status, Status::Failed);
        assert_eq!(junit.failures, 1);
    });

    assert_eq!(recorder.count(Level::ERROR), 1, "one diagnostic per malformed payload");
}

#[test]
fn metrics_payload_is_logged_by_device_listener() {
    let recorder = LevelRecorder::default();
    let subscriber = tracing_subscriber::registry().with(recorder.clone());

    tracing::subscriber::with_default(subscriber, || {
        let log_dir = Utf8TempDir::new().expect("temp dir created");
        let store = Arc::new(ArtifactStore::new());
        let mut device = Device::new("emulator-5554", &log_dir, &store);
        let login = TestIdentity::new("com.example", "LoginTest", "login");

        let metrics = btreemap! {
            DEFAULT_METRICS_KEY.to_owned() => r#"[{"name":"from metrics","status":"passed"}]"#.to_owned(),
        };
        let attempt = device.run_with_metrics(
            &store,
            &login,
            TestStatus::Passed,
            "2023-11-14T22:13:20Z",
            FLAKY_PASSED_LOG,
            &metrics,
        );
        assert_eq!(attempt.steps().steps()[0].name.as_deref(), Some("from metrics"));
    });

    assert_eq!(recorder.count(Level::INFO), 1, "metrics payload found");
}
