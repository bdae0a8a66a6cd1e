//! Thread-affined execution units.
//!
//! Each `EngineThread` wraps either the adopted calling thread (main) or a
//! spawned, named OS thread running a mailbox loop. Inter-thread concurrency
//! in this core is message passing: work is posted as boxed closures and
//! executed in order on the owning thread. Affinity queries are O(1)
//! OS-thread-identity comparisons.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};

use crate::error::{CoreError, CoreResult};

/// Stable identifiers for the fixed set of engine threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadId {
    /// The adopted process main thread.
    Main,
    /// Game logic thread.
    Game,
    /// Audio thread.
    Audio,
    /// Media asset thread.
    Media,
    /// Outbound network writer thread.
    NetworkWrite,
    /// Dedicated graphics thread (not created on standard platforms; the
    /// graphics server is homed on the main thread).
    Graphics,
    /// Background dynamics simulation thread (platform-dependent).
    BgSimulation,
    /// Interactive stdin reader thread (platform-dependent).
    Stdin,
}

impl ThreadId {
    /// Number of thread identifiers.
    pub const COUNT: usize = 8;

    /// Every thread identifier, in declaration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Main,
        Self::Game,
        Self::Audio,
        Self::Media,
        Self::NetworkWrite,
        Self::Graphics,
        Self::BgSimulation,
        Self::Stdin,
    ];

    /// Display name used for OS thread naming and logs.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Game => "game",
            Self::Audio => "audio",
            Self::Media => "media",
            Self::NetworkWrite => "network-write",
            Self::Graphics => "graphics",
            Self::BgSimulation => "bg-simulation",
            Self::Stdin => "stdin",
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Main => 0,
            Self::Game => 1,
            Self::Audio => 2,
            Self::Media => 3,
            Self::NetworkWrite => 4,
            Self::Graphics => 5,
            Self::BgSimulation => 6,
            Self::Stdin => 7,
        }
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Messages consumed by a thread's mailbox loop.
pub enum ThreadMessage {
    /// Run the closure on the owning thread.
    Run(Box<dyn FnOnce() + Send>),
    /// Stop the mailbox loop.
    Quit,
}

/// One OS-level unit of concurrency with a stable identifier and a mailbox.
pub struct EngineThread {
    id: ThreadId,
    os_id: thread::ThreadId,
    sender: Sender<ThreadMessage>,
    // Present only on adopted threads until the event loop or pump takes it;
    // spawned workers consume their receiver inside the worker loop.
    receiver: Mutex<Option<Receiver<ThreadMessage>>>,
    join: Mutex<Option<thread::JoinHandle<()>>>,
}

impl EngineThread {
    /// Spawn a named worker thread running the mailbox loop. Blocks until the
    /// worker has published its OS identity, so affinity queries are valid as
    /// soon as this returns.
    pub(crate) fn spawn(id: ThreadId) -> CoreResult<Arc<Self>> {
        let (sender, receiver) = unbounded::<ThreadMessage>();
        let (ready_sender, ready_receiver) = bounded::<thread::ThreadId>(1);
        let join = thread::Builder::new()
            .name(id.display_name().to_string())
            .spawn(move || {
                let _ = ready_sender.send(thread::current().id());
                worker_loop(&receiver);
            })
            .map_err(|source| CoreError::ThreadSpawn { id, source })?;
        let os_id = ready_receiver
            .recv()
            .map_err(|_| CoreError::MailboxClosed { id })?;
        Ok(Arc::new(Self {
            id,
            os_id,
            sender,
            receiver: Mutex::new(None),
            join: Mutex::new(Some(join)),
        }))
    }

    /// Wrap the calling thread. Its mailbox is drained by
    /// [`EngineThread::run_event_loop`] or [`EngineThread::pump_until_idle`].
    pub(crate) fn adopt_current(id: ThreadId) -> Arc<Self> {
        let (sender, receiver) = unbounded::<ThreadMessage>();
        Arc::new(Self {
            id,
            os_id: thread::current().id(),
            sender,
            receiver: Mutex::new(Some(receiver)),
            join: Mutex::new(None),
        })
    }

    /// Stable identifier of this thread.
    #[must_use]
    pub const fn id(&self) -> ThreadId {
        self.id
    }

    /// Display name of this thread.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.id.display_name()
    }

    /// Whether the calling execution context is this thread.
    #[must_use]
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.os_id
    }

    /// Post a closure to run on this thread.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MailboxClosed`] when the thread has shut down.
    pub fn post(&self, work: impl FnOnce() + Send + 'static) -> CoreResult<()> {
        self.sender
            .send(ThreadMessage::Run(Box::new(work)))
            .map_err(|_| CoreError::MailboxClosed { id: self.id })
    }

    /// Post a quit message, stopping the mailbox loop after pending work.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MailboxClosed`] when the thread has shut down.
    pub fn post_quit(&self) -> CoreResult<()> {
        self.sender
            .send(ThreadMessage::Quit)
            .map_err(|_| CoreError::MailboxClosed { id: self.id })
    }

    /// Run the mailbox loop on the calling thread until quit. Only valid on
    /// an adopted thread that still holds its receiver.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EventLoopUnavailable`] when the receiver was
    /// already taken or this is a spawned worker.
    pub fn run_event_loop(&self) -> CoreResult<()> {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(CoreError::EventLoopUnavailable { id: self.id })?;
        worker_loop(&receiver);
        Ok(())
    }

    /// Process pending mailbox messages until none arrive within `idle`.
    /// Returns the number of closures executed. Used to prime the event pump
    /// on hosts whose main loop is driven externally.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EventLoopUnavailable`] when the receiver was
    /// already taken or this is a spawned worker.
    pub fn pump_until_idle(&self, idle: Duration) -> CoreResult<usize> {
        let mut slot = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        let receiver = slot
            .take()
            .ok_or(CoreError::EventLoopUnavailable { id: self.id })?;
        drop(slot);

        let mut handled = 0;
        loop {
            match receiver.recv_timeout(idle) {
                Ok(ThreadMessage::Run(work)) => {
                    work();
                    handled += 1;
                }
                Ok(ThreadMessage::Quit) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => break,
            }
        }

        let mut slot = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(receiver);
        drop(slot);
        Ok(handled)
    }

    /// Stop the worker and join it. No-op on adopted threads and after the
    /// first call.
    pub fn shutdown(&self) {
        let handle = self
            .join
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = self.post_quit();
            let _ = handle.join();
        }
    }
}

fn worker_loop(receiver: &Receiver<ThreadMessage>) {
    while let Ok(message) = receiver.recv() {
        match message {
            ThreadMessage::Run(work) => work(),
            ThreadMessage::Quit => break,
        }
    }
}
