//! Subsystem modules.
//!
//! A module is a functional unit permanently bound to exactly one thread at
//! attachment; it never migrates. The core only needs modules to be
//! addressable by kind and attachable; subsystem internals (rendering, audio
//! mixing, media loading, network transport) live behind this seam.

use std::fmt;

/// Fixed enumeration of subsystem module kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// Game logic.
    Game,
    /// Audio server.
    AudioServer,
    /// Media asset server.
    MediaServer,
    /// Graphics server (homed on the main thread on standard platforms).
    GraphicsServer,
    /// Outbound network writer.
    NetworkWriter,
    /// Background dynamics simulation (platform-dependent).
    BgSimulation,
    /// Interactive stdin reader (platform-dependent).
    StdinReader,
}

/// Module kinds that must be attached before bootstrap may complete.
pub const REQUIRED_MODULES: [ModuleKind; 5] = [
    ModuleKind::Game,
    ModuleKind::AudioServer,
    ModuleKind::MediaServer,
    ModuleKind::GraphicsServer,
    ModuleKind::NetworkWriter,
];

impl ModuleKind {
    /// Number of module kinds.
    pub const COUNT: usize = 7;

    /// Every module kind, in declaration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Game,
        Self::AudioServer,
        Self::MediaServer,
        Self::GraphicsServer,
        Self::NetworkWriter,
        Self::BgSimulation,
        Self::StdinReader,
    ];

    /// Display name used in logs and thread bookkeeping.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::AudioServer => "audio-server",
            Self::MediaServer => "media-server",
            Self::GraphicsServer => "graphics-server",
            Self::NetworkWriter => "network-writer",
            Self::BgSimulation => "bg-simulation",
            Self::StdinReader => "stdin-reader",
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Game => 0,
            Self::AudioServer => 1,
            Self::MediaServer => 2,
            Self::GraphicsServer => 3,
            Self::NetworkWriter => 4,
            Self::BgSimulation => 5,
            Self::StdinReader => 6,
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A functional unit permanently bound to one thread.
pub trait Module: Send + Sync {
    /// Which subsystem this module implements.
    fn kind(&self) -> ModuleKind;

    /// Hook invoked on the owning thread once the module is attached.
    fn on_attach(&self) {}
}
