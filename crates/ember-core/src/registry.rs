//! Thread/module registry.
//!
//! # Design
//! - One write-once slot per thread identifier; slots are filled during
//!   bootstrap phase 1 and lock-free for readers thereafter.
//! - Module homes are write-once as well: a module binds to its thread
//!   permanently, and the binding is the subsystem's affinity anchor.
//! - Affinity predicates are total: querying a thread or module that was
//!   never created returns false, never an error.

use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;

use ember_telemetry::Metrics;

use crate::error::{CoreError, CoreResult};
use crate::module::{Module, ModuleKind, REQUIRED_MODULES};
use crate::thread::{EngineThread, ThreadId};

/// Registry of the fixed set of engine threads and their modules.
pub struct ThreadRegistry {
    slots: [OnceCell<Arc<EngineThread>>; ThreadId::COUNT],
    module_homes: [OnceCell<ThreadId>; ModuleKind::COUNT],
    modules: Mutex<Vec<Arc<dyn Module>>>,
    pausable: Mutex<Vec<ThreadId>>,
    metrics: Metrics,
}

impl ThreadRegistry {
    /// Construct an empty registry.
    #[must_use]
    pub fn new(metrics: Metrics) -> Self {
        Self {
            slots: std::array::from_fn(|_| OnceCell::new()),
            module_homes: std::array::from_fn(|_| OnceCell::new()),
            modules: Mutex::new(Vec::new()),
            pausable: Mutex::new(Vec::new()),
            metrics,
        }
    }

    /// Spawn a named worker thread and register it under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ThreadExists`] if a thread with this identifier
    /// was already created, or [`CoreError::ThreadSpawn`] on OS failure.
    pub fn create_thread(&self, id: ThreadId) -> CoreResult<Arc<EngineThread>> {
        let slot = &self.slots[id.index()];
        if slot.get().is_some() {
            return Err(CoreError::ThreadExists { id });
        }
        let thread = EngineThread::spawn(id)?;
        slot.set(thread.clone())
            .map_err(|_| CoreError::ThreadExists { id })?;
        self.metrics.inc_thread_spawned(id.display_name());
        Ok(thread)
    }

    /// Wrap the calling thread and register it under `id` (used for main).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ThreadExists`] if a thread with this identifier
    /// was already created.
    pub fn adopt_current_thread(&self, id: ThreadId) -> CoreResult<Arc<EngineThread>> {
        let slot = &self.slots[id.index()];
        if slot.get().is_some() {
            return Err(CoreError::ThreadExists { id });
        }
        let thread = EngineThread::adopt_current(id);
        slot.set(thread.clone())
            .map_err(|_| CoreError::ThreadExists { id })?;
        Ok(thread)
    }

    /// The registered thread for `id`, if it was created.
    #[must_use]
    pub fn thread(&self, id: ThreadId) -> Option<&Arc<EngineThread>> {
        self.slots[id.index()].get()
    }

    /// Whether the calling execution context is the thread registered under
    /// `id`. False (never an error) when that thread was never created.
    #[must_use]
    pub fn is_current(&self, id: ThreadId) -> bool {
        self.thread(id).is_some_and(|thread| thread.is_current())
    }

    /// Permanently bind a module to a thread and record the module's home.
    /// The module's `on_attach` hook is posted to the owning thread.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ModuleAlreadyAttached`] if a module of the same
    /// kind already has a home, or [`CoreError::MailboxClosed`] if the
    /// owning thread has shut down.
    pub fn attach_module(
        &self,
        module: Arc<dyn Module>,
        thread: &Arc<EngineThread>,
    ) -> CoreResult<()> {
        let kind = module.kind();
        self.module_homes[kind.index()]
            .set(thread.id())
            .map_err(|_| CoreError::ModuleAlreadyAttached { kind })?;
        self.modules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(module.clone());
        thread.post(move || module.on_attach())?;
        Ok(())
    }

    /// Home thread of the module of kind `kind`, if it was attached.
    #[must_use]
    pub fn module_thread(&self, kind: ModuleKind) -> Option<ThreadId> {
        self.module_homes[kind.index()].get().copied()
    }

    /// Whether the calling execution context is the thread owning the module
    /// of kind `kind`. False when that module was never attached.
    #[must_use]
    pub fn in_module_thread(&self, kind: ModuleKind) -> bool {
        self.module_thread(kind)
            .is_some_and(|id| self.is_current(id))
    }

    /// Kinds attached so far, in attachment order.
    #[must_use]
    pub fn attached_modules(&self) -> Vec<ModuleKind> {
        self.modules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|module| module.kind())
            .collect()
    }

    /// First required module kind without a home, if any.
    #[must_use]
    pub fn missing_required_module(&self) -> Option<ModuleKind> {
        REQUIRED_MODULES
            .into_iter()
            .find(|kind| self.module_thread(*kind).is_none())
    }

    /// Whether every required module kind has a home thread.
    #[must_use]
    pub fn required_modules_attached(&self) -> bool {
        self.missing_required_module().is_none()
    }

    /// Record a thread as pausable.
    pub fn mark_pausable(&self, id: ThreadId) {
        self.pausable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
    }

    /// Threads registered as pausable, in registration order.
    #[must_use]
    pub fn pausable_threads(&self) -> Vec<ThreadId> {
        self.pausable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Display name of the registry thread the caller is executing on,
    /// falling back to the OS thread name.
    #[must_use]
    pub fn current_thread_name(&self) -> String {
        for id in ThreadId::ALL {
            if self.is_current(id) {
                return id.display_name().to_string();
            }
        }
        std::thread::current()
            .name()
            .unwrap_or("unnamed")
            .to_string()
    }

    /// Stop and join every spawned worker. Adopted threads are untouched.
    pub fn shutdown_workers(&self) {
        for slot in &self.slots {
            if let Some(thread) = slot.get() {
                thread.shutdown();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    struct TestModule {
        kind: ModuleKind,
    }

    impl Module for TestModule {
        fn kind(&self) -> ModuleKind {
            self.kind
        }
    }

    fn test_registry() -> Result<ThreadRegistry> {
        Ok(ThreadRegistry::new(Metrics::new()?))
    }

    #[test]
    fn duplicate_thread_creation_is_rejected() -> Result<()> {
        let registry = test_registry()?;
        let _game = registry.create_thread(ThreadId::Game)?;
        assert!(matches!(
            registry.create_thread(ThreadId::Game),
            Err(CoreError::ThreadExists { id: ThreadId::Game })
        ));
        registry.shutdown_workers();
        Ok(())
    }

    #[test]
    fn affinity_for_missing_thread_is_false() -> Result<()> {
        let registry = test_registry()?;
        assert!(!registry.is_current(ThreadId::BgSimulation));
        assert!(!registry.in_module_thread(ModuleKind::BgSimulation));
        assert!(registry.thread(ThreadId::Graphics).is_none());
        Ok(())
    }

    #[test]
    fn adopted_thread_answers_affinity() -> Result<()> {
        let registry = test_registry()?;
        let _main = registry.adopt_current_thread(ThreadId::Main)?;
        assert!(registry.is_current(ThreadId::Main));
        assert_eq!(registry.current_thread_name(), "main");
        Ok(())
    }

    #[test]
    fn module_home_is_write_once() -> Result<()> {
        let registry = test_registry()?;
        let game = registry.create_thread(ThreadId::Game)?;
        registry.attach_module(
            Arc::new(TestModule {
                kind: ModuleKind::Game,
            }),
            &game,
        )?;
        let duplicate = registry.attach_module(
            Arc::new(TestModule {
                kind: ModuleKind::Game,
            }),
            &game,
        );
        assert!(matches!(
            duplicate,
            Err(CoreError::ModuleAlreadyAttached {
                kind: ModuleKind::Game
            })
        ));
        registry.shutdown_workers();
        Ok(())
    }

    #[test]
    fn module_affinity_follows_home_thread() -> Result<()> {
        let registry = Arc::new(test_registry()?);
        let _main = registry.adopt_current_thread(ThreadId::Main)?;
        let main = registry.thread(ThreadId::Main).expect("main slot").clone();
        registry.attach_module(
            Arc::new(TestModule {
                kind: ModuleKind::GraphicsServer,
            }),
            &main,
        )?;
        // The graphics server is homed on main, so the predicate is answered
        // from the calling (main) thread.
        assert!(registry.in_module_thread(ModuleKind::GraphicsServer));
        assert_eq!(
            registry.module_thread(ModuleKind::GraphicsServer),
            Some(ThreadId::Main)
        );

        let game = registry.create_thread(ThreadId::Game)?;
        registry.attach_module(
            Arc::new(TestModule {
                kind: ModuleKind::Game,
            }),
            &game,
        )?;
        assert!(!registry.in_module_thread(ModuleKind::Game));
        let (sender, receiver) = unbounded::<bool>();
        let shared = registry.clone();
        game.post(move || {
            let _ = sender.send(shared.in_module_thread(ModuleKind::Game));
        })?;
        assert!(receiver.recv_timeout(Duration::from_secs(2))?);
        registry.shutdown_workers();
        Ok(())
    }

    #[test]
    fn required_modules_tracking() -> Result<()> {
        let registry = test_registry()?;
        let main = registry.adopt_current_thread(ThreadId::Main)?;
        assert!(!registry.required_modules_attached());
        for kind in REQUIRED_MODULES {
            assert!(!registry.required_modules_attached());
            registry.attach_module(Arc::new(TestModule { kind }), &main)?;
        }
        assert!(registry.required_modules_attached());
        assert_eq!(registry.missing_required_module(), None);
        assert_eq!(registry.attached_modules().len(), REQUIRED_MODULES.len());
        Ok(())
    }

    #[test]
    fn pausable_list_preserves_order() -> Result<()> {
        let registry = test_registry()?;
        registry.mark_pausable(ThreadId::Media);
        registry.mark_pausable(ThreadId::Audio);
        assert_eq!(
            registry.pausable_threads(),
            vec![ThreadId::Media, ThreadId::Audio]
        );
        Ok(())
    }
}
