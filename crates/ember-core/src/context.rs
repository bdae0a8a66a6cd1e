//! The engine context.
//!
//! One `EngineContext` is assembled during bootstrap and shared as `Arc` with
//! every subsystem. It is the public query surface of the core: filtered
//! time, session identity, thread affinity, build classification, and the
//! fatal-error entry point all route through here. Nothing in this module is
//! a global; ownership of the context is explicit in every signature that
//! needs it.

use std::sync::Arc;

use tracing::warn;

use ember_telemetry::{LogSink, Metrics};

use crate::clock::RealTimeClock;
use crate::error::{CoreError, CoreResult};
use crate::fatal::{FatalHandler, FatalOutcome, FatalTrigger};
use crate::integrity::{BuildManifest, is_unmodified_blessed_build};
use crate::module::ModuleKind;
use crate::registry::ThreadRegistry;
use crate::session::SessionIdentity;
use crate::state::{EngineState, UiScale};
use crate::thread::ThreadId;

/// Shared coordination surface assembled during bootstrap.
pub struct EngineContext {
    state: Arc<EngineState>,
    clock: RealTimeClock,
    session: SessionIdentity,
    registry: ThreadRegistry,
    fatal: Arc<FatalHandler>,
    manifest: BuildManifest,
    sink: Arc<LogSink>,
    metrics: Metrics,
}

impl EngineContext {
    /// Assemble the context from its already-constructed parts.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        state: Arc<EngineState>,
        clock: RealTimeClock,
        session: SessionIdentity,
        registry: ThreadRegistry,
        fatal: Arc<FatalHandler>,
        manifest: BuildManifest,
        sink: Arc<LogSink>,
        metrics: Metrics,
    ) -> Arc<Self> {
        Arc::new(Self {
            state,
            clock,
            session,
            registry,
            fatal,
            manifest,
            sink,
            metrics,
        })
    }

    /// Process-wide state registry.
    #[must_use]
    pub const fn state(&self) -> &Arc<EngineState> {
        &self.state
    }

    /// Thread/module registry.
    #[must_use]
    pub const fn registry(&self) -> &ThreadRegistry {
        &self.registry
    }

    /// Fatal-error handler.
    #[must_use]
    pub const fn fatal_handler(&self) -> &Arc<FatalHandler> {
        &self.fatal
    }

    /// Structured log sink.
    #[must_use]
    pub const fn sink(&self) -> &Arc<LogSink> {
        &self.sink
    }

    /// Metrics handle.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Static facts about the running build.
    #[must_use]
    pub const fn manifest(&self) -> &BuildManifest {
        &self.manifest
    }

    /// Filtered milliseconds since engine start. Non-decreasing; a single
    /// step never exceeds the clock's configured cap.
    pub fn real_time_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Process-lifetime-unique session identifier, computed on first demand.
    pub fn session_id(&self) -> &str {
        self.session.id()
    }

    /// Whether bootstrap has completed.
    #[must_use]
    pub fn is_bootstrapped(&self) -> bool {
        self.state.is_bootstrapped()
    }

    /// Whether the running build is classified as pristine and official,
    /// given everything known at this moment.
    #[must_use]
    pub fn is_unmodified_blessed_build(&self) -> bool {
        is_unmodified_blessed_build(&self.manifest, Some(&self.state))
    }

    /// Whether the process runs in VR mode.
    #[must_use]
    pub fn vr_mode(&self) -> bool {
        self.state.vr_mode()
    }

    /// Current interface scale.
    #[must_use]
    pub fn ui_scale(&self) -> UiScale {
        self.state.ui_scale()
    }

    /// Whether the caller is on the process main thread.
    #[must_use]
    pub fn is_main_thread(&self) -> bool {
        self.state.is_main_thread()
    }

    /// Whether the caller is on the game logic module's home thread.
    #[must_use]
    pub fn in_game_thread(&self) -> bool {
        self.registry.in_module_thread(ModuleKind::Game)
    }

    /// Whether the caller is on the audio server module's home thread.
    #[must_use]
    pub fn in_audio_thread(&self) -> bool {
        self.registry.in_module_thread(ModuleKind::AudioServer)
    }

    /// Whether the caller is on the media server module's home thread.
    #[must_use]
    pub fn in_media_thread(&self) -> bool {
        self.registry.in_module_thread(ModuleKind::MediaServer)
    }

    /// Whether the caller is on the graphics server module's home thread.
    #[must_use]
    pub fn in_graphics_thread(&self) -> bool {
        self.registry.in_module_thread(ModuleKind::GraphicsServer)
    }

    /// Whether the caller is on the network writer module's home thread.
    #[must_use]
    pub fn in_network_write_thread(&self) -> bool {
        self.registry.in_module_thread(ModuleKind::NetworkWriter)
    }

    /// Whether the caller is on the background-simulation module's home
    /// thread.
    #[must_use]
    pub fn in_bg_simulation_thread(&self) -> bool {
        self.registry.in_module_thread(ModuleKind::BgSimulation)
    }

    /// Display name of the registry thread the caller is executing on.
    #[must_use]
    pub fn current_thread_name(&self) -> String {
        self.registry.current_thread_name()
    }

    /// Emit a diagnostic message through the log sink.
    pub fn log(&self, message: &str, to_console: bool, to_server: bool) {
        self.sink.emit(message, to_console, to_server);
    }

    /// Display a message to the user.
    ///
    /// Routed to the game logic module's home thread, which owns user-facing
    /// presentation. Before that module is attached the message cannot be
    /// displayed; it falls back to the console log and is counted.
    pub fn screen_message(&self, message: &str) {
        if let Some(home) = self.registry.module_thread(ModuleKind::Game) {
            if let Some(thread) = self.registry.thread(home) {
                let sink = self.sink.clone();
                let message = message.to_string();
                if thread.post(move || sink.emit(&message, true, false)).is_ok() {
                    return;
                }
            }
        }
        self.metrics.inc_screen_message_fallback();
        warn!("screen message before game module (will be lost): '{message}'");
    }

    /// Report a fatal error and resolve it.
    ///
    /// The message is always logged and queued for the diagnostic server.
    /// If the recovery hook handles the error this returns and execution may
    /// resume; on a blessed build the process exits quietly; otherwise the
    /// panic machinery runs so native crash capture sees the failure.
    pub fn fatal_error(&self, message: &str) {
        self.fatal.report(message, FatalTrigger::Explicit);
        let blessed = self.is_unmodified_blessed_build();
        match self.fatal.resolve(blessed, FatalTrigger::Explicit) {
            FatalOutcome::Recovered => (),
            FatalOutcome::Exit(code) => std::process::exit(code),
            FatalOutcome::Escalate => panic!("fatal error: {message}"),
        }
    }

    /// Ask the engine to leave its main event loop with the given exit code.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ThreadMissing`] when the main thread was never
    /// registered, or [`CoreError::MailboxClosed`] when it has shut down.
    pub fn request_quit(&self, return_value: i32) -> CoreResult<()> {
        self.state.set_return_value(return_value);
        let main = self
            .registry
            .thread(ThreadId::Main)
            .ok_or(CoreError::ThreadMissing { id: ThreadId::Main })?;
        main.post_quit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::clock::SystemTicks;
    use crate::fatal::RecoveryHook;
    use crate::module::Module;
    use crate::state::{DeviceCaps, EngineSettings};

    struct TestModule {
        kind: ModuleKind,
    }

    impl Module for TestModule {
        fn kind(&self) -> ModuleKind {
            self.kind
        }
    }

    struct RecordingHook {
        calls: Mutex<Vec<(bool, FatalTrigger)>>,
    }

    impl RecoveryHook for RecordingHook {
        fn try_recover(&self, clean_exit: bool, trigger: FatalTrigger) -> bool {
            self.calls
                .lock()
                .expect("hook call mutex poisoned")
                .push((clean_exit, trigger));
            true
        }
    }

    fn test_manifest() -> BuildManifest {
        BuildManifest {
            debug: false,
            embedded_hash: None,
            custom_script_dir: false,
        }
    }

    fn test_context(manifest: BuildManifest) -> Result<Arc<EngineContext>> {
        let metrics = Metrics::new()?;
        let sink = Arc::new(LogSink::new(metrics.clone()));
        let state = Arc::new(EngineState::new(
            &EngineSettings::default(),
            &DeviceCaps {
                logical_cpus: 2,
                stdin_is_terminal: false,
            },
        ));
        let hook = Box::new(RecordingHook {
            calls: Mutex::new(Vec::new()),
        });
        let fatal = Arc::new(FatalHandler::new(hook, sink.clone(), metrics.clone()));
        Ok(EngineContext::new(
            state,
            RealTimeClock::new(Arc::new(SystemTicks::new()), metrics.clone()),
            SessionIdentity::new("test-device"),
            ThreadRegistry::new(metrics.clone()),
            fatal,
            manifest,
            sink,
            metrics,
        ))
    }

    #[test]
    fn affinity_predicates_are_false_before_attachment() -> Result<()> {
        let ctx = test_context(test_manifest())?;
        assert!(ctx.is_main_thread());
        assert!(!ctx.in_game_thread());
        assert!(!ctx.in_audio_thread());
        assert!(!ctx.in_media_thread());
        assert!(!ctx.in_graphics_thread());
        assert!(!ctx.in_network_write_thread());
        assert!(!ctx.in_bg_simulation_thread());
        Ok(())
    }

    #[test]
    fn session_id_is_stable_across_calls() -> Result<()> {
        let ctx = test_context(test_manifest())?;
        let first = ctx.session_id().to_string();
        assert_eq!(ctx.session_id(), first);
        assert!(first.starts_with("test-device"));
        Ok(())
    }

    #[test]
    fn real_time_is_non_decreasing() -> Result<()> {
        let ctx = test_context(test_manifest())?;
        let earlier = ctx.real_time_ms();
        let later = ctx.real_time_ms();
        assert!(later >= earlier);
        Ok(())
    }

    #[test]
    fn vr_mode_comes_from_launch_settings() -> Result<()> {
        let ctx = test_context(test_manifest())?;
        assert!(!ctx.vr_mode());
        Ok(())
    }

    #[test]
    fn no_embedded_hash_means_unblessed() -> Result<()> {
        let ctx = test_context(test_manifest())?;
        assert!(!ctx.is_unmodified_blessed_build());
        Ok(())
    }

    #[test]
    fn screen_message_routes_to_game_thread() -> Result<()> {
        let ctx = test_context(test_manifest())?;
        let main = ctx.registry().adopt_current_thread(ThreadId::Main)?;
        ctx.registry().attach_module(
            Arc::new(TestModule {
                kind: ModuleKind::Game,
            }),
            &main,
        )?;
        // Drain the on_attach hook first.
        main.pump_until_idle(Duration::from_millis(10))?;
        ctx.screen_message("hello there");
        let handled = main.pump_until_idle(Duration::from_millis(10))?;
        assert_eq!(handled, 1);
        assert_eq!(ctx.metrics().snapshot().screen_message_fallbacks_total, 0);
        Ok(())
    }

    #[test]
    fn screen_message_before_game_module_is_counted() -> Result<()> {
        let ctx = test_context(test_manifest())?;
        ctx.screen_message("too early");
        assert_eq!(ctx.metrics().snapshot().screen_message_fallbacks_total, 1);
        Ok(())
    }

    #[test]
    fn recovered_fatal_error_returns() -> Result<()> {
        let ctx = test_context(test_manifest())?;
        // The recording hook always recovers, so this must come back.
        ctx.fatal_error("synthetic failure");
        let remote = ctx.sink().drain_remote();
        assert_eq!(remote.len(), 1);
        assert!(remote[0].message.contains("synthetic failure"));
        Ok(())
    }

    #[test]
    fn request_quit_posts_to_main_and_sets_return_value() -> Result<()> {
        let ctx = test_context(test_manifest())?;
        assert!(matches!(
            ctx.request_quit(0),
            Err(CoreError::ThreadMissing { id: ThreadId::Main })
        ));
        let main = ctx.registry().adopt_current_thread(ThreadId::Main)?;
        ctx.request_quit(3)?;
        assert_eq!(ctx.state().return_value(), 3);
        // The quit message terminates the event loop immediately.
        main.run_event_loop()?;
        Ok(())
    }
}
