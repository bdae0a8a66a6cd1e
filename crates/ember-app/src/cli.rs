//! Launch options.
//!
//! The command line is the only configuration surface of the host binary;
//! everything else the engine needs is probed from the device or injected by
//! the platform adapter.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use ember_core::{EngineSettings, UiScale};
use ember_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha};

/// Command-line options of the engine host.
#[derive(Debug, Parser)]
#[command(name = "ember", about = "Ember engine host", version)]
pub struct LaunchOptions {
    /// Run in VR mode.
    #[arg(long)]
    pub vr: bool,

    /// Interface scale override.
    #[arg(long, value_enum, value_name = "SCALE")]
    pub ui_scale: Option<UiScaleArg>,

    /// Load application scripts from this directory instead of the default.
    #[arg(long, value_name = "DIR")]
    pub scripts: Option<PathBuf>,

    /// Log level filter.
    #[arg(long, env = "EMBER_LOG", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    /// Log output format; inferred from the build profile when omitted.
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormatArg>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            vr: false,
            ui_scale: None,
            scripts: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: None,
        }
    }
}

impl LaunchOptions {
    /// Engine settings derived from these options.
    #[must_use]
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            vr_mode: self.vr,
            ui_scale: self.ui_scale.map(Into::into),
            custom_script_dir: self.scripts.is_some(),
        }
    }

    /// Logging configuration derived from these options.
    #[must_use]
    pub fn logging(&self) -> LoggingConfig<'_> {
        LoggingConfig {
            level: &self.log_level,
            format: self.log_format.map_or_else(LogFormat::infer, Into::into),
            build_sha: build_sha(),
        }
    }
}

/// Interface scale as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UiScaleArg {
    /// Phone-sized interfaces.
    Small,
    /// Tablet-sized interfaces.
    Medium,
    /// Desktop-sized interfaces.
    Large,
}

impl From<UiScaleArg> for UiScale {
    fn from(value: UiScaleArg) -> Self {
        match value {
            UiScaleArg::Small => Self::Small,
            UiScaleArg::Medium => Self::Medium,
            UiScaleArg::Large => Self::Large,
        }
    }
}

/// Log output format as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    /// Structured JSON objects.
    Json,
    /// Human-readable, pretty-printed logs.
    Pretty,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Json => Self::Json,
            LogFormatArg::Pretty => Self::Pretty,
        }
    }
}
