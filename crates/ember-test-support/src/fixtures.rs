//! Engine-context fixtures for integration suites.

use std::sync::Arc;

use anyhow::Result;

use ember_core::{
    BuildManifest, DeviceCaps, EngineContext, EngineSettings, EngineState, FatalHandler,
    NullRecoveryHook, RealTimeClock, RecoveryHook, SessionIdentity, ThreadRegistry,
};
use ember_telemetry::{LogSink, Metrics};

use crate::mocks::ManualTicks;

/// An assembled engine context plus the handles a test needs to drive it.
pub struct ContextFixture {
    /// The assembled context under test.
    pub context: Arc<EngineContext>,
    /// The tick source feeding the context's clock.
    pub ticks: Arc<ManualTicks>,
}

/// Builder for [`ContextFixture`] with test-friendly defaults: a release
/// manifest without an embedded hash, a never-recovering hook, and a manual
/// tick source starting at zero.
pub struct ContextBuilder {
    settings: EngineSettings,
    manifest: BuildManifest,
    hook: Box<dyn RecoveryHook>,
    device_id: String,
    start_ticks: u64,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            settings: EngineSettings::default(),
            manifest: BuildManifest {
                debug: false,
                embedded_hash: None,
                custom_script_dir: false,
            },
            hook: Box::new(NullRecoveryHook),
            device_id: "test-device".to_string(),
            start_ticks: 0,
        }
    }
}

impl ContextBuilder {
    /// Start from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use these launch settings.
    #[must_use]
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use this build manifest.
    #[must_use]
    pub fn manifest(mut self, manifest: BuildManifest) -> Self {
        self.manifest = manifest;
        self
    }

    /// Use this recovery hook.
    #[must_use]
    pub fn hook(mut self, hook: Box<dyn RecoveryHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Use this device identifier for the session identity.
    #[must_use]
    pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    /// Start the manual tick source at this raw reading.
    #[must_use]
    pub const fn start_ticks(mut self, start: u64) -> Self {
        self.start_ticks = start;
        self
    }

    /// Assemble the fixture.
    ///
    /// # Errors
    ///
    /// Returns an error when the metrics registry cannot be constructed.
    pub fn build(self) -> Result<ContextFixture> {
        let metrics = Metrics::new()?;
        let sink = Arc::new(LogSink::new(metrics.clone()));
        let state = Arc::new(EngineState::new(
            &self.settings,
            &DeviceCaps {
                logical_cpus: 2,
                stdin_is_terminal: false,
            },
        ));
        let ticks = Arc::new(ManualTicks::new(self.start_ticks));
        let fatal = Arc::new(FatalHandler::new(self.hook, sink.clone(), metrics.clone()));
        let context = EngineContext::new(
            state,
            RealTimeClock::new(ticks.clone(), metrics.clone()),
            SessionIdentity::new(self.device_id),
            ThreadRegistry::new(metrics.clone()),
            fatal,
            self.manifest,
            sink,
            metrics,
        );
        Ok(ContextFixture { context, ticks })
    }
}
