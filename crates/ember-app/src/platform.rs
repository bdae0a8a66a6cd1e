//! Host environment adapter.
//!
//! Everything the boot sequence needs from the surrounding OS or embedder
//! goes through [`PlatformAdapter`]: device identity, optional threads and
//! modules, and the post-bootstrap integrity calculation. Tests drive the
//! boot sequence with scripted adapters.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use ember_core::{DeviceCaps, EngineContext, Module, ThreadId};

use crate::error::{AppError, AppResult};
use crate::modules::{BgSimulationModule, StdinReaderModule};

/// Host environment seam used by the boot sequence.
pub trait PlatformAdapter: Send + Sync {
    /// Stable identifier of the device this process runs on.
    fn device_identifier(&self) -> String;

    /// Hook run before any engine state exists.
    fn post_init(&self) {}

    /// Create platform-optional threads and modules.
    ///
    /// # Errors
    ///
    /// Returns an error when a platform thread or module cannot be created.
    fn create_auxiliary_modules(
        &self,
        _ctx: &Arc<EngineContext>,
        _caps: &DeviceCaps,
    ) -> AppResult<()> {
        Ok(())
    }

    /// Hook run once the bootstrapped flag is published.
    ///
    /// # Errors
    ///
    /// Returns an error when post-bootstrap platform work fails.
    fn on_bootstrap_complete(&self, _ctx: &Arc<EngineContext>) -> AppResult<()> {
        Ok(())
    }

    /// Last call before the process leaves its entry point. `clean` is false
    /// when an error escaped the boot sequence.
    fn will_exit_main(&self, _clean: bool) {}
}

/// Adapter for a plain desktop or server host.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePlatform;

impl NativePlatform {
    /// Construct the native adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl PlatformAdapter for NativePlatform {
    fn device_identifier(&self) -> String {
        if let Ok(machine_id) = std::fs::read_to_string("/etc/machine-id") {
            let machine_id = machine_id.trim();
            if !machine_id.is_empty() {
                return machine_id.to_string();
            }
        }
        std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-device".to_string())
    }

    fn create_auxiliary_modules(
        &self,
        ctx: &Arc<EngineContext>,
        caps: &DeviceCaps,
    ) -> AppResult<()> {
        if ctx.state().stdin_is_terminal() {
            let stdin = ctx
                .registry()
                .create_thread(ThreadId::Stdin)
                .map_err(|source| AppError::core("registry.create_stdin", source))?;
            let module: Arc<dyn Module> = Arc::new(StdinReaderModule::new(
                ctx.state().clone(),
                ctx.sink().clone(),
            ));
            ctx.registry()
                .attach_module(module, &stdin)
                .map_err(|source| AppError::core("registry.attach_stdin", source))?;
        }

        // Background dynamics earn their own thread only on multi-core hosts.
        if caps.logical_cpus >= 2 {
            let bg = ctx
                .registry()
                .create_thread(ThreadId::BgSimulation)
                .map_err(|source| AppError::core("registry.create_bg_simulation", source))?;
            ctx.registry().mark_pausable(ThreadId::BgSimulation);
            ctx.registry()
                .attach_module(Arc::new(BgSimulationModule), &bg)
                .map_err(|source| AppError::core("registry.attach_bg_simulation", source))?;
        }
        Ok(())
    }

    fn on_bootstrap_complete(&self, ctx: &Arc<EngineContext>) -> AppResult<()> {
        let exe = std::env::current_exe()
            .map_err(|source| AppError::io("platform.current_exe", None, source))?;
        let bytes = std::fs::read(&exe)
            .map_err(|source| AppError::io("platform.read_exe", Some(exe.clone()), source))?;
        let digest = Sha256::digest(&bytes);
        if !ctx
            .state()
            .set_calculated_integrity_hash(format!("{digest:x}"))
        {
            debug!("integrity hash already published");
        }
        Ok(())
    }

    fn will_exit_main(&self, clean: bool) {
        info!(clean, "leaving main");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_identifier_is_never_empty() {
        assert!(!NativePlatform::new().device_identifier().is_empty());
    }
}
