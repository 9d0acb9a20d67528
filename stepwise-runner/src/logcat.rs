// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capture of device log output, and extraction of step payloads from it.
//!
//! A [`LogcatListener`] is attached to a single device. The log capture feeds it lines and test
//! boundary events in order. Lines for one test must be fully delivered, and the test's end
//! signalled, before lines for the next test begin.

mod classify;
mod parser;

pub use classify::*;
pub use parser::*;

use crate::{
    attachment::{ArtifactOrigin, Attachment, AttachmentCollector, AttachmentKind},
    config::StepsCaptureConfig,
    errors::{DisplayErrorChain, LogWriteError},
    reporter::{DeviceInfo, DevicePoolId, TestIdentity},
    steps::{DecodedSteps, TestMetrics, decode_steps, resolve_payload},
};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, warn};

/// Persists the raw device log of a test.
pub trait LogWriter: Send {
    /// Saves `contents` as the log of the test in `origin`, returning the path written to.
    fn save_logs(
        &mut self,
        origin: &ArtifactOrigin<'_>,
        contents: &str,
    ) -> Result<Utf8PathBuf, LogWriteError>;
}

/// Writes logs to `<dir>/<pool>/<device serial>/<test full name>.log`.
///
/// The pool and serial are sanitized so that each is a single path component under `dir`. For
/// example, the serial `192.168.0.2:5555` of a device attached over TCP becomes
/// `192.168.0.2_5555`.
#[derive(Clone, Debug)]
pub struct FileLogWriter {
    dir: Utf8PathBuf,
}

impl FileLogWriter {
    /// Creates a new writer under `dir`.
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the directory logs are written under.
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }
}

impl LogWriter for FileLogWriter {
    fn save_logs(
        &mut self,
        origin: &ArtifactOrigin<'_>,
        contents: &str,
    ) -> Result<Utf8PathBuf, LogWriteError> {
        let device_dir = self
            .dir
            .join(path_component(origin.pool_id.as_str()))
            .join(path_component(origin.device.serial_number()));
        std::fs::create_dir_all(&device_dir)
            .map_err(|err| LogWriteError::new(&device_dir, err))?;

        let path = device_dir.join(format!("{}.log", origin.test.full_name()));
        std::fs::write(&path, contents).map_err(|err| LogWriteError::new(&path, err))?;
        Ok(path)
    }
}

/// Replaces characters other than ASCII alphanumerics and `._-` with `_`. A result made up only
/// of dots, such as `..`, has them replaced too.
fn path_component(name: &str) -> String {
    let component: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "._-".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect();
    if component.chars().all(|c| c == '.') {
        "_".repeat(component.len().max(1))
    } else {
        component
    }
}

/// Listens to the log output of one device.
///
/// For each test, the raw log is saved with a [`LogWriter`], and the step payload is extracted,
/// decoded and published together with the log attachment.
pub struct LogcatListener {
    pool_id: DevicePoolId,
    device: DeviceInfo,
    metrics_key: String,
    parser: StepPayloadParser,
    raw_log: String,
    log_writer: Box<dyn LogWriter>,
    collector: AttachmentCollector,
}

impl LogcatListener {
    /// Creates a new listener for `device`.
    pub fn new(
        pool_id: DevicePoolId,
        device: DeviceInfo,
        config: &StepsCaptureConfig,
        log_writer: Box<dyn LogWriter>,
        collector: AttachmentCollector,
    ) -> Self {
        Self {
            pool_id,
            device,
            metrics_key: config.metrics_key.clone(),
            parser: StepPayloadParser::from_config(config),
            raw_log: String::new(),
            log_writer,
            collector,
        }
    }

    /// Called when the instrumentation run starts on this device.
    pub fn test_run_started(&mut self) {
        debug!("[{}] test run started", self.device.serial_number());
        self.reset();
    }

    /// Called when a test starts.
    ///
    /// Output that arrived before this is not attributed to the test.
    pub fn test_started(&mut self, test: &TestIdentity) {
        debug!("[{}] `{test}` started", self.device.serial_number());
        self.reset();
    }

    /// Called with each line of device log output, in order.
    pub fn on_line(&mut self, line: &str) {
        let line = line.trim_end_matches(['\r', '\n']);
        self.parser.feed(line);
        self.raw_log.push_str(line);
        self.raw_log.push('\n');
    }

    /// Called when a test finishes, with the metrics it reported.
    ///
    /// Saves the test's log, then publishes its steps followed by the log attachment. If the log
    /// can't be saved, the failure is logged and only the log attachment is skipped.
    pub fn test_ended(&mut self, test: &TestIdentity, metrics: &TestMetrics) {
        debug!("[{}] `{test}` ended", self.device.serial_number());
        let origin = ArtifactOrigin::new(test, &self.pool_id, &self.device);

        let log_attachment = match self.log_writer.save_logs(&origin, &self.raw_log) {
            Ok(path) => Some(Attachment::new(AttachmentKind::Log, path)),
            Err(err) => {
                warn!(
                    "for `{test}`, failed to save device log: {}",
                    DisplayErrorChain::new(&err)
                );
                None
            }
        };

        let payload =
            resolve_payload(test, metrics, &self.metrics_key, self.parser.take_payload());
        let steps = match &payload {
            Some(payload) => decode_steps(test, payload.json()),
            None => DecodedSteps::default(),
        };
        self.collector.publish_steps(&origin, payload.as_ref(), &steps);
        if let Some(attachment) = &log_attachment {
            self.collector.attach(&origin, attachment);
        }

        self.raw_log.clear();
    }

    /// Called when the instrumentation run finishes on this device.
    pub fn test_run_ended(&mut self) {
        debug!("[{}] test run ended", self.device.serial_number());
        self.reset();
    }

    /// Called when the instrumentation run fails on this device.
    pub fn test_run_failed(&mut self, message: &str) {
        warn!(
            "[{}] test run failed: {message}",
            self.device.serial_number()
        );
        self.reset();
    }

    fn reset(&mut self) {
        self.parser.reset();
        self.raw_log.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        attachment::ArtifactStore,
        config::DEFAULT_METRICS_KEY,
        steps::{PayloadSource, StepPayload},
    };
    use camino_tempfile::Utf8TempDir;
    use maplit::btreemap;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use test_case::test_case;

    struct BrokenWriter;

    impl LogWriter for BrokenWriter {
        fn save_logs(
            &mut self,
            _origin: &ArtifactOrigin<'_>,
            _contents: &str,
        ) -> Result<Utf8PathBuf, LogWriteError> {
            Err(LogWriteError::new(
                "/dev/full/log",
                std::io::Error::other("read-only file system"),
            ))
        }
    }

    fn listener(
        log_writer: Box<dyn LogWriter>,
        store: &Arc<ArtifactStore>,
    ) -> LogcatListener {
        let collector = AttachmentCollector::new()
            .with_attachment_listener(store.clone())
            .with_steps_listener(store.clone());
        LogcatListener::new(
            DevicePoolId::new("omni"),
            DeviceInfo::new("emulator-5554"),
            &StepsCaptureConfig::default(),
            log_writer,
            collector,
        )
    }

    fn take(store: &ArtifactStore, test: &TestIdentity) -> crate::attachment::TestArtifacts {
        let pool_id = DevicePoolId::new("omni");
        let device = DeviceInfo::new("emulator-5554");
        store.take(&ArtifactOrigin::new(test, &pool_id, &device))
    }

    #[test]
    fn saves_log_and_publishes_steps() {
        let temp_dir = Utf8TempDir::new().expect("temp dir created");
        let store = Arc::new(ArtifactStore::new());
        let mut listener = listener(Box::new(FileLogWriter::new(temp_dir.path())), &store);

        let test = TestIdentity::new("com.example", "LoginTest", "login");
        listener.test_run_started();
        listener.on_line("I/ActivityManager: Start proc com.example");
        listener.test_started(&test);
        listener.on_line("I/TestRunner( 4321): started: login(com.example.LoginTest)\n");
        listener.on_line("I/KASPRESSO: #AllureStepsInfoJson#:[{\"name\":\"Open\",");
        listener.on_line("D/Choreographer( 4321): Skipped 31 frames!");
        listener.on_line("I/KASPRESSO: #AllureStepsInfoJson#:\"status\":\"passed\"}]");
        listener.on_line("I/TestRunner( 4321): TestRunner: finished: login(com.example.LoginTest)");
        listener.test_ended(&test, &TestMetrics::new());

        let artifacts = take(&store, &test);
        assert_eq!(
            artifacts.step_payload(),
            Some(&StepPayload::new(
                PayloadSource::LogStream,
                r#"[{"name":"Open","status":"passed"}]"#
            ))
        );

        let [log] = artifacts.attachments() else {
            panic!("expected one attachment, found {:?}", artifacts.attachments());
        };
        assert_eq!(log.kind(), AttachmentKind::Log);
        assert_eq!(
            log.file(),
            temp_dir
                .path()
                .join("omni/emulator-5554/com.example.LoginTest#login.log")
        );
        let contents = std::fs::read_to_string(log.file()).expect("log file exists");
        assert_eq!(contents.lines().count(), 5, "only lines after test start");
        assert!(!contents.contains("ActivityManager"));
    }

    #[test_case("emulator-5554", "emulator-5554"; "emulator")]
    #[test_case("192.168.0.2:5555", "192.168.0.2_5555"; "tcp serial")]
    #[test_case("../escape", ".._escape"; "parent prefix")]
    #[test_case("..", "__"; "parent")]
    #[test_case("", "_"; "empty")]
    fn path_components(name: &str, expected: &str) {
        assert_eq!(path_component(name), expected);
    }

    #[test]
    fn log_paths_stay_under_dir() {
        let temp_dir = Utf8TempDir::new().expect("temp dir created");
        let mut writer = FileLogWriter::new(temp_dir.path().join("logs"));

        let test = TestIdentity::new("com.example", "LoginTest", "login");
        let pool_id = DevicePoolId::new("..");
        let device = DeviceInfo::new("192.168.0.2:5555");
        let path = writer
            .save_logs(&ArtifactOrigin::new(&test, &pool_id, &device), "log\n")
            .expect("log is written");

        assert_eq!(
            path,
            temp_dir
                .path()
                .join("logs/__/192.168.0.2_5555/com.example.LoginTest#login.log")
        );
        assert!(path.starts_with(writer.dir()));
    }

    #[test]
    fn metrics_payload_takes_precedence() {
        let temp_dir = Utf8TempDir::new().expect("temp dir created");
        let store = Arc::new(ArtifactStore::new());
        let mut listener = listener(Box::new(FileLogWriter::new(temp_dir.path())), &store);

        let test = TestIdentity::new("com.example", "LoginTest", "login");
        listener.test_started(&test);
        listener.on_line("I/KASPRESSO: #AllureStepsInfoJson#:[{\"name\":\"from log\"}]");
        let metrics = btreemap! {
            DEFAULT_METRICS_KEY.to_owned() => r#"[{"name":"from metrics"}]"#.to_owned(),
        };
        listener.test_ended(&test, &metrics);

        let artifacts = take(&store, &test);
        assert_eq!(
            artifacts.step_payload().map(StepPayload::source),
            Some(PayloadSource::Metrics)
        );
    }

    #[test]
    fn log_writer_failure_skips_only_the_log() {
        let store = Arc::new(ArtifactStore::new());
        let mut listener = listener(Box::new(BrokenWriter), &store);

        let test = TestIdentity::new("com.example", "LoginTest", "login");
        listener.test_started(&test);
        listener.on_line("I/KASPRESSO: #AllureStepsInfoJson#:[]");
        listener.test_ended(&test, &TestMetrics::new());

        let artifacts = take(&store, &test);
        assert!(artifacts.attachments().is_empty());
        assert_eq!(
            artifacts.step_payload().map(StepPayload::json),
            Some("[]")
        );
    }

    #[test]
    fn run_failure_discards_partial_payload() {
        let store = Arc::new(ArtifactStore::new());
        let mut listener = listener(Box::new(BrokenWriter), &store);

        let test = TestIdentity::new("com.example", "LoginTest", "login");
        listener.test_started(&test);
        listener.on_line("I/KASPRESSO: #AllureStepsInfoJson#:[{\"name\":");
        listener.test_run_failed("Process crashed.");
        listener.test_ended(&test, &TestMetrics::new());

        assert_eq!(take(&store, &test).step_payload(), None);
    }
}
