//! Subsystem modules provided by the host.
//!
//! The coordination core only needs modules to be addressable by kind;
//! subsystem internals stay behind the [`Module`] seam. The stdin reader is
//! the one module with real behavior here: it watches an interactive
//! terminal for commands and marks the session as user-modified.

use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};

use ember_core::{CoreError, EngineContext, EngineState, Module, ModuleKind, ThreadId};
use ember_telemetry::LogSink;

use crate::error::{AppError, AppResult};

/// Game logic module.
#[derive(Debug, Clone, Copy, Default)]
pub struct GameModule;

impl GameModule {
    /// Set the engine in motion: the game thread applies its initial
    /// configuration, the thread owning the graphics server realizes the
    /// first surface, and completion is confirmed back on the game thread.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Core`] when the game or main thread is missing or
    /// its mailbox has shut down.
    pub fn push_apply_config(ctx: &Arc<EngineContext>) -> AppResult<()> {
        let game = ctx
            .registry()
            .thread(ThreadId::Game)
            .cloned()
            .ok_or(AppError::Core {
                operation: "push_apply_config.game",
                source: CoreError::ThreadMissing { id: ThreadId::Game },
            })?;
        let main = ctx
            .registry()
            .thread(ThreadId::Main)
            .cloned()
            .ok_or(AppError::Core {
                operation: "push_apply_config.main",
                source: CoreError::ThreadMissing { id: ThreadId::Main },
            })?;

        let ctx_on_game = ctx.clone();
        let game_for_completion = game.clone();
        game.post(move || {
            debug!(
                real_time_ms = ctx_on_game.real_time_ms(),
                "applying initial configuration"
            );
            let relay = move || {
                debug!("realizing initial surface");
                let done = || info!("engine set in motion");
                if game_for_completion.post(done).is_err() {
                    warn!("game thread unavailable for set-in-motion completion");
                }
            };
            if main.post(relay).is_err() {
                warn!("main thread unavailable for surface realization");
            }
        })
        .map_err(|source| AppError::Core {
            operation: "game.push_apply_config",
            source,
        })
    }
}

impl Module for GameModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Game
    }

    fn on_attach(&self) {
        debug!("game module attached");
    }
}

/// Audio server module.
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioServerModule;

impl Module for AudioServerModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::AudioServer
    }
}

/// Media asset server module.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaServerModule;

impl Module for MediaServerModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::MediaServer
    }
}

/// Graphics server module; homed on the main thread on standard platforms.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphicsServerModule;

impl Module for GraphicsServerModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::GraphicsServer
    }
}

/// Outbound network writer module.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkWriterModule;

impl Module for NetworkWriterModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::NetworkWriter
    }
}

/// Background dynamics simulation module.
#[derive(Debug, Clone, Copy, Default)]
pub struct BgSimulationModule;

impl Module for BgSimulationModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::BgSimulation
    }
}

/// Interactive stdin command reader.
///
/// Attached only when stdin is a terminal. Line reads block, so the reading
/// itself runs on a detached helper thread; the module's mailbox thread stays
/// responsive for shutdown.
pub struct StdinReaderModule {
    state: Arc<EngineState>,
    sink: Arc<LogSink>,
}

impl StdinReaderModule {
    /// Construct the reader around the process state and log sink.
    #[must_use]
    pub const fn new(state: Arc<EngineState>, sink: Arc<LogSink>) -> Self {
        Self { state, sink }
    }
}

impl Module for StdinReaderModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::StdinReader
    }

    fn on_attach(&self) {
        let state = self.state.clone();
        let sink = self.sink.clone();
        let spawned = thread::Builder::new()
            .name("stdin-reader".to_string())
            .spawn(move || read_commands(&state, &sink, io::stdin().lock()));
        if spawned.is_err() {
            warn!("failed to spawn the stdin reader");
        }
    }
}

/// Consume command lines until EOF or a read error. Every non-empty line
/// marks the session as user-modified, which voids the blessed-build
/// classification for the rest of the process lifetime.
fn read_commands(state: &EngineState, sink: &LogSink, reader: impl BufRead) {
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        state.set_user_ran_commands();
        sink.emit(&format!("> {command}"), true, false);
    }
    debug!("stdin reader finished");
}
