// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Artifacts produced while tests run, and the listeners they are published to.
//!
//! An [`AttachmentCollector`] owns an ordered list of listeners, registered when it is built.
//! Publishing calls every listener synchronously, in registration order. A listener that fails is
//! logged and skipped, and does not stop the listeners after it.

use crate::{
    errors::{DisplayErrorChain, ListenerError},
    reporter::{DeviceInfo, DevicePoolId, TestIdentity},
    steps::{DecodedSteps, StepPayload, StepsListener},
};
use camino::{Utf8Path, Utf8PathBuf};
use debug_ignore::DebugIgnore;
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::warn;

/// The kind of an attached file.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum AttachmentKind {
    /// A device log.
    Log,

    /// A screenshot.
    Screenshot,

    /// A screen recording.
    Video,

    /// A profiling trace.
    Trace,
}

impl AttachmentKind {
    /// Returns the MIME type of files of this kind.
    pub fn mime_type(self) -> &'static str {
        match self {
            AttachmentKind::Log => "text/plain",
            AttachmentKind::Screenshot => "image/png",
            AttachmentKind::Video => "video/mp4",
            AttachmentKind::Trace => "application/octet-stream",
        }
    }

    /// Returns the name shown for attachments of this kind.
    pub fn display_name(self) -> &'static str {
        match self {
            AttachmentKind::Log => "Log",
            AttachmentKind::Screenshot => "Screenshot",
            AttachmentKind::Video => "Video",
            AttachmentKind::Trace => "Trace",
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A file produced while a test ran.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attachment {
    kind: AttachmentKind,
    file: Utf8PathBuf,
}

impl Attachment {
    /// Creates a new attachment.
    pub fn new(kind: AttachmentKind, file: impl Into<Utf8PathBuf>) -> Self {
        Self {
            kind,
            file: file.into(),
        }
    }

    /// The kind of file.
    pub fn kind(&self) -> AttachmentKind {
        self.kind
    }

    /// The path to the file.
    pub fn file(&self) -> &Utf8Path {
        &self.file
    }

    /// The MIME type of the file, derived from its kind.
    pub fn mime_type(&self) -> &'static str {
        self.kind.mime_type()
    }
}

/// The test, pool and device an artifact was produced by.
#[derive(Copy, Clone, Debug)]
pub struct ArtifactOrigin<'a> {
    /// The test that was running.
    pub test: &'a TestIdentity,

    /// The pool the device belongs to.
    pub pool_id: &'a DevicePoolId,

    /// The device the test ran on.
    pub device: &'a DeviceInfo,
}

impl<'a> ArtifactOrigin<'a> {
    /// Creates a new `ArtifactOrigin`.
    pub fn new(
        test: &'a TestIdentity,
        pool_id: &'a DevicePoolId,
        device: &'a DeviceInfo,
    ) -> Self {
        Self {
            test,
            pool_id,
            device,
        }
    }
}

/// Receives files attached to tests.
pub trait AttachmentListener: Send + Sync {
    /// Called once per attached file.
    fn on_attachment(
        &self,
        origin: &ArtifactOrigin<'_>,
        attachment: &Attachment,
    ) -> Result<(), ListenerError>;
}

/// Fans artifacts out to registered listeners.
#[derive(Clone, Debug, Default)]
pub struct AttachmentCollector {
    attachment_listeners: DebugIgnore<Vec<Arc<dyn AttachmentListener>>>,
    steps_listeners: DebugIgnore<Vec<Arc<dyn StepsListener>>>,
}

impl AttachmentCollector {
    /// Creates a collector with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for attached files.
    pub fn with_attachment_listener(mut self, listener: Arc<dyn AttachmentListener>) -> Self {
        self.attachment_listeners.push(listener);
        self
    }

    /// Registers a listener for decoded steps.
    pub fn with_steps_listener(mut self, listener: Arc<dyn StepsListener>) -> Self {
        self.steps_listeners.push(listener);
        self
    }

    /// Publishes an attached file to every attachment listener.
    pub fn attach(&self, origin: &ArtifactOrigin<'_>, attachment: &Attachment) {
        for listener in self.attachment_listeners.iter() {
            if let Err(err) = listener.on_attachment(origin, attachment) {
                warn!(
                    "for `{}`, failed to publish {} attachment: {}",
                    origin.test,
                    attachment.kind(),
                    DisplayErrorChain::new(&err),
                );
            }
        }
    }

    /// Publishes decoded steps to every steps listener.
    pub fn publish_steps(
        &self,
        origin: &ArtifactOrigin<'_>,
        payload: Option<&StepPayload>,
        steps: &DecodedSteps,
    ) {
        for listener in self.steps_listeners.iter() {
            if let Err(err) = listener.on_steps(origin, payload, steps) {
                warn!(
                    "for `{}`, failed to publish steps: {}",
                    origin.test,
                    DisplayErrorChain::new(&err),
                );
            }
        }
    }
}

/// Artifacts recorded for one test attempt.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TestArtifacts {
    attachments: Vec<Attachment>,
    step_payload: Option<StepPayload>,
    steps: DecodedSteps,
}

impl TestArtifacts {
    /// Files attached to the attempt, in the order they were published.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// The step payload reported by the attempt, if any.
    pub fn step_payload(&self) -> Option<&StepPayload> {
        self.step_payload.as_ref()
    }

    /// The steps decoded from the payload when they were published.
    pub fn steps(&self) -> &DecodedSteps {
        &self.steps
    }

    pub(crate) fn into_parts(self) -> (Vec<Attachment>, Option<StepPayload>, DecodedSteps) {
        (self.attachments, self.step_payload, self.steps)
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct ArtifactKey {
    test: TestIdentity,
    pool_id: DevicePoolId,
    serial_number: String,
}

impl ArtifactKey {
    fn new(origin: &ArtifactOrigin<'_>) -> Self {
        Self {
            test: origin.test.clone(),
            pool_id: origin.pool_id.clone(),
            serial_number: origin.device.serial_number().to_owned(),
        }
    }
}

/// Records artifacts per test attempt until they are taken to build a
/// [`TestExecutionAttempt`](crate::reporter::TestExecutionAttempt).
///
/// Shared between devices, so it may be published to concurrently.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    artifacts: Mutex<HashMap<ArtifactKey, TestArtifacts>>,
}

impl ArtifactStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the artifacts recorded for `origin`.
    ///
    /// Returns empty artifacts if nothing was recorded.
    pub fn take(&self, origin: &ArtifactOrigin<'_>) -> TestArtifacts {
        self.lock()
            .remove(&ArtifactKey::new(origin))
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ArtifactKey, TestArtifacts>> {
        // Every update is a single map operation, so a poisoned map is still consistent.
        self.artifacts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AttachmentListener for ArtifactStore {
    fn on_attachment(
        &self,
        origin: &ArtifactOrigin<'_>,
        attachment: &Attachment,
    ) -> Result<(), ListenerError> {
        self.lock()
            .entry(ArtifactKey::new(origin))
            .or_default()
            .attachments
            .push(attachment.clone());
        Ok(())
    }
}

impl StepsListener for ArtifactStore {
    fn on_steps(
        &self,
        origin: &ArtifactOrigin<'_>,
        payload: Option<&StepPayload>,
        steps: &DecodedSteps,
    ) -> Result<(), ListenerError> {
        let mut artifacts = self.lock();
        let entry = artifacts.entry(ArtifactKey::new(origin)).or_default();
        entry.step_payload = payload.cloned();
        entry.steps = steps.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{PayloadSource, decode_steps};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Failing;

    impl AttachmentListener for Failing {
        fn on_attachment(
            &self,
            _origin: &ArtifactOrigin<'_>,
            _attachment: &Attachment,
        ) -> Result<(), ListenerError> {
            Err(ListenerError::new("failing", "disk full"))
        }
    }

    impl StepsListener for Failing {
        fn on_steps(
            &self,
            _origin: &ArtifactOrigin<'_>,
            _payload: Option<&StepPayload>,
            _steps: &DecodedSteps,
        ) -> Result<(), ListenerError> {
            Err(ListenerError::new("failing", "disk full"))
        }
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl AttachmentListener for Counting {
        fn on_attachment(
            &self,
            _origin: &ArtifactOrigin<'_>,
            _attachment: &Attachment,
        ) -> Result<(), ListenerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn attachment_kinds() {
        let attachment = Attachment::new(AttachmentKind::Video, "out/video.mp4");
        assert_eq!(attachment.mime_type(), "video/mp4");
        assert_eq!(AttachmentKind::Log.mime_type(), "text/plain");
        assert_eq!(AttachmentKind::Screenshot.to_string(), "Screenshot");
    }

    #[test]
    fn failing_listener_does_not_stop_fan_out() {
        let counting = Arc::new(Counting::default());
        let store = Arc::new(ArtifactStore::new());
        let collector = AttachmentCollector::new()
            .with_attachment_listener(Arc::new(Failing))
            .with_attachment_listener(counting.clone())
            .with_attachment_listener(store.clone())
            .with_steps_listener(Arc::new(Failing))
            .with_steps_listener(store.clone());

        let test = TestIdentity::new("com.example", "LoginTest", "login");
        let pool_id = DevicePoolId::new("omni");
        let device = DeviceInfo::new("emulator-5554");
        let origin = ArtifactOrigin::new(&test, &pool_id, &device);

        let log = Attachment::new(AttachmentKind::Log, "logs/login.log");
        collector.attach(&origin, &log);
        let payload = StepPayload::new(PayloadSource::LogStream, r#"[{"name":"Open"}]"#);
        let steps = decode_steps(&test, payload.json());
        collector.publish_steps(&origin, Some(&payload), &steps);

        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
        let artifacts = store.take(&origin);
        assert_eq!(artifacts.attachments(), [log]);
        assert_eq!(artifacts.step_payload(), Some(&payload));
        assert_eq!(artifacts.steps(), &steps, "decoded steps are kept");
        assert_eq!(store.take(&origin), TestArtifacts::default(), "take drains");
    }

    #[test]
    fn store_keys_by_device() {
        let store = ArtifactStore::new();
        let test = TestIdentity::new("com.example", "LoginTest", "login");
        let pool_id = DevicePoolId::new("omni");
        let first = DeviceInfo::new("emulator-5554");
        let second = DeviceInfo::new("emulator-5556");

        let log = Attachment::new(AttachmentKind::Log, "logs/5554.log");
        store
            .on_attachment(&ArtifactOrigin::new(&test, &pool_id, &first), &log)
            .expect("store accepts attachments");

        let other = store.take(&ArtifactOrigin::new(&test, &pool_id, &second));
        assert!(other.attachments().is_empty());
        let artifacts = store.take(&ArtifactOrigin::new(&test, &pool_id, &first));
        assert_eq!(artifacts.attachments().len(), 1);
    }
}
