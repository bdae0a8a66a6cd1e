//! Phased boot sequence.
//!
//! # Design
//! - Phase 1 provisions everything: process state, session identity, clock,
//!   the engine context, threads and modules; the bootstrapped flag is
//!   published only after every required module has a home.
//! - Phase 2 sets the engine in motion: the apply-config message is posted
//!   to the game thread first, then the completion hooks run synchronously
//!   on the calling thread.
//! - Phase 3 is screen creation, driven from phase 2's message on the
//!   graphics server's thread; nothing to do here beyond having provisioned.
//! - Phase 4 is steady state: either the engine owns the main-thread event
//!   loop or the host pumps it.
//!
//! An error escaping the sequence is routed through the fatal protocol; the
//! resolution is matched here, making process exit versus native escalation
//! explicit at the one place it happens.

use std::sync::Arc;

use clap::Parser;
use tracing::{debug, info};

use ember_core::{
    BuildManifest, CoreError, DeviceCaps, EngineContext, EngineState, EngineThread, FatalHandler,
    FatalOutcome, FatalTrigger, Module, NullRecoveryHook, RealTimeClock, RecoveryHook,
    SessionIdentity, SystemTicks, ThreadId, ThreadRegistry, is_unmodified_blessed_build,
};
use ember_telemetry::{LogSink, Metrics, init_logging};

use crate::application::{Application, StandaloneApplication};
use crate::cli::LaunchOptions;
use crate::error::{AppError, AppResult};
use crate::modules::{
    AudioServerModule, GameModule, GraphicsServerModule, MediaServerModule, NetworkWriterModule,
};
use crate::platform::{NativePlatform, PlatformAdapter};

/// Environment variable requesting a deliberate fatal error at startup, used
/// to verify the fatal reporting path end to end before any engine state
/// exists.
pub const CRASH_TEST_ENV: &str = "EMBER_CRASH_TEST";

/// Dependencies required to boot the engine.
pub struct BootstrapDependencies {
    /// Parsed launch options.
    pub options: LaunchOptions,
    /// Host environment adapter.
    pub platform: Arc<dyn PlatformAdapter>,
    /// Event-loop ownership of the hosting application.
    pub application: Arc<dyn Application>,
    /// Device capabilities probed at startup.
    pub caps: DeviceCaps,
    /// Recovery hook consulted by the fatal protocol.
    pub hook: Box<dyn RecoveryHook>,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary
    /// entrypoint.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            options: LaunchOptions::parse(),
            platform: Arc::new(NativePlatform::new()),
            application: Arc::new(StandaloneApplication),
            caps: DeviceCaps::detect(),
            hook: Box::new(NullRecoveryHook),
        }
    }
}

/// Entry point for the engine boot sequence. Returns the process exit code
/// on normal termination.
///
/// # Errors
///
/// Returns an error if dependency construction or the boot sequence fails
/// and the recovery hook handles the failure.
pub fn run_app() -> AppResult<i32> {
    run_app_with(BootstrapDependencies::from_env())
}

/// Boot sequence that relies entirely on injected dependencies to simplify
/// testing.
///
/// # Errors
///
/// Returns an error if the boot sequence fails and the recovery hook handles
/// the failure.
///
/// # Panics
///
/// Panics when an unrecovered fatal error on a non-blessed build escalates
/// to the native crash machinery; a startup fatal test requested via
/// [`CRASH_TEST_ENV`] escalates the same way.
pub fn run_app_with(deps: BootstrapDependencies) -> AppResult<i32> {
    let BootstrapDependencies {
        options,
        platform,
        application,
        caps,
        hook,
    } = deps;

    init_logging(&options.logging())
        .map_err(|source| AppError::telemetry("telemetry.init", source))?;
    let metrics = Metrics::new().map_err(|source| AppError::telemetry("telemetry.metrics", source))?;
    let sink = Arc::new(LogSink::new(metrics.clone()));
    let handler = Arc::new(FatalHandler::new(hook, sink.clone(), metrics.clone()));
    let manifest = BuildManifest::current(options.scripts.is_some());

    // Checked before any engine state exists: the fatal protocol must be
    // callable this early, and the test exercises exactly that.
    if crash_test_requested(std::env::var(CRASH_TEST_ENV).ok().as_deref()) {
        match crash_test_outcome(&handler, &manifest) {
            FatalOutcome::Recovered => (),
            FatalOutcome::Exit(code) => std::process::exit(code),
            FatalOutcome::Escalate => {
                panic!("fatal-error test requested via {CRASH_TEST_ENV}")
            }
        }
    }

    info!(application = application.name(), "engine bootstrap starting");

    let mut ctx_slot: Option<Arc<EngineContext>> = None;
    let booted = boot(
        &options,
        &platform,
        &application,
        &caps,
        &metrics,
        &sink,
        &handler,
        &manifest,
        &mut ctx_slot,
    );
    match booted {
        Ok(code) => {
            platform.will_exit_main(true);
            Ok(code)
        }
        Err(err) => {
            let message = format!("error escaped the boot sequence: {err}");
            handler.report(&message, FatalTrigger::EscapedError);
            // Blessing is judged on whatever state exists at the moment of
            // failure; very early failures have no context yet.
            let blessed = ctx_slot.as_ref().map_or_else(
                || is_unmodified_blessed_build(&manifest, None),
                |ctx| ctx.is_unmodified_blessed_build(),
            );
            platform.will_exit_main(false);
            match handler.resolve(blessed, FatalTrigger::EscapedError) {
                FatalOutcome::Recovered => Err(AppError::Fatal {
                    message,
                    trigger: FatalTrigger::EscapedError,
                }),
                FatalOutcome::Exit(code) => std::process::exit(code),
                FatalOutcome::Escalate => panic!("{message}"),
            }
        }
    }
}

fn crash_test_requested(value: Option<&str>) -> bool {
    matches!(value, Some("1"))
}

/// Report-then-resolve a deliberate startup fatal. Runs before any engine
/// state exists, so blessing is judged from the build manifest alone.
fn crash_test_outcome(handler: &FatalHandler, manifest: &BuildManifest) -> FatalOutcome {
    handler.report(
        &format!("fatal-error test requested via {CRASH_TEST_ENV}"),
        FatalTrigger::Explicit,
    );
    handler.resolve(
        is_unmodified_blessed_build(manifest, None),
        FatalTrigger::Explicit,
    )
}

#[allow(clippy::too_many_arguments)]
fn boot(
    options: &LaunchOptions,
    platform: &Arc<dyn PlatformAdapter>,
    application: &Arc<dyn Application>,
    caps: &DeviceCaps,
    metrics: &Metrics,
    sink: &Arc<LogSink>,
    handler: &Arc<FatalHandler>,
    manifest: &BuildManifest,
    ctx_slot: &mut Option<Arc<EngineContext>>,
) -> AppResult<i32> {
    // Phase 1: provisioning. Process state first, then the platform's
    // post-construction init, then everything that builds on them.
    let settings = options.engine_settings();
    let state = Arc::new(EngineState::new(&settings, caps));
    platform.post_init();
    let session = SessionIdentity::new(platform.device_identifier());
    let clock = RealTimeClock::new(Arc::new(SystemTicks::new()), metrics.clone());
    let registry = ThreadRegistry::new(metrics.clone());
    let ctx = EngineContext::new(
        state.clone(),
        clock,
        session,
        registry,
        handler.clone(),
        manifest.clone(),
        sink.clone(),
        metrics.clone(),
    );
    *ctx_slot = Some(ctx.clone());

    let main = ctx
        .registry()
        .adopt_current_thread(ThreadId::Main)
        .map_err(|source| AppError::core("registry.adopt_main", source))?;
    let game = create_worker(&ctx, ThreadId::Game)?;
    let audio = create_worker(&ctx, ThreadId::Audio)?;
    let media = create_worker(&ctx, ThreadId::Media)?;
    let network = create_worker(&ctx, ThreadId::NetworkWrite)?;

    attach(&ctx, Arc::new(GameModule), &game)?;
    attach(&ctx, Arc::new(AudioServerModule), &audio)?;
    attach(&ctx, Arc::new(MediaServerModule), &media)?;
    attach(&ctx, Arc::new(NetworkWriterModule), &network)?;
    attach(&ctx, Arc::new(GraphicsServerModule), &main)?;

    platform.create_auxiliary_modules(&ctx, caps)?;

    if let Some(kind) = ctx.registry().missing_required_module() {
        return Err(AppError::core(
            "registry.verify_modules",
            CoreError::MissingModule { kind },
        ));
    }
    state
        .mark_bootstrapped()
        .map_err(|source| AppError::core("state.mark_bootstrapped", source))?;
    info!(
        session_id = ctx.session_id(),
        thread = %ctx.current_thread_name(),
        "bootstrap complete"
    );

    // Phase 2: set in motion. The apply-config message goes out first; the
    // completion hooks then run synchronously on the calling thread.
    GameModule::push_apply_config(&ctx)?;
    application.on_bootstrap_complete(&ctx)?;
    platform.on_bootstrap_complete(&ctx)?;

    // Phase 3 (screen creation) is driven by phase 2's message on the
    // graphics server's thread; nothing to sequence here.

    // Phase 4: steady state.
    if application.uses_event_loop() {
        main.run_event_loop()
            .map_err(|source| AppError::core("main.run_event_loop", source))?;
    } else {
        let handled = application.prime_event_pump(&main)?;
        debug!(handled, "event pump primed for the host-driven main loop");
    }

    ctx.registry().shutdown_workers();
    Ok(state.return_value())
}

fn create_worker(ctx: &Arc<EngineContext>, id: ThreadId) -> AppResult<Arc<EngineThread>> {
    let thread = ctx
        .registry()
        .create_thread(id)
        .map_err(|source| AppError::core("registry.create_thread", source))?;
    ctx.registry().mark_pausable(id);
    Ok(thread)
}

fn attach(
    ctx: &Arc<EngineContext>,
    module: Arc<dyn Module>,
    thread: &Arc<EngineThread>,
) -> AppResult<()> {
    ctx.registry()
        .attach_module(module, thread)
        .map_err(|source| AppError::core("registry.attach_module", source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    use ember_test_support::mocks::RecordingHook;

    struct ForwardingHook(Arc<RecordingHook>);

    impl RecoveryHook for ForwardingHook {
        fn try_recover(&self, clean_exit: bool, trigger: FatalTrigger) -> bool {
            self.0.try_recover(clean_exit, trigger)
        }
    }

    #[test]
    fn crash_test_requires_exactly_one() {
        assert!(crash_test_requested(Some("1")));
        assert!(!crash_test_requested(Some("0")));
        assert!(!crash_test_requested(Some("true")));
        assert!(!crash_test_requested(Some("")));
        assert!(!crash_test_requested(None));
    }

    #[test]
    fn startup_fatal_test_runs_the_full_protocol() -> Result<()> {
        let metrics = Metrics::new()?;
        let sink = Arc::new(LogSink::new(metrics.clone()));
        let hook = Arc::new(RecordingHook::new(true));
        let handler = FatalHandler::new(
            Box::new(ForwardingHook(hook.clone())),
            sink.clone(),
            metrics,
        );
        let manifest = BuildManifest {
            debug: false,
            embedded_hash: None,
            custom_script_dir: false,
        };

        assert_eq!(
            crash_test_outcome(&handler, &manifest),
            FatalOutcome::Recovered
        );

        // Report happened: the message was queued for the remote server.
        let remote = sink.drain_remote();
        assert_eq!(remote.len(), 1);
        assert!(remote[0].message.contains("fatal-error test"));
        // Recover-or-terminate happened: the hook saw the explicit trigger
        // with a clean exit (no embedded hash means unblessed).
        assert_eq!(hook.calls(), vec![(true, FatalTrigger::Explicit)]);
        Ok(())
    }
}
