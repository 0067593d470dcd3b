//! JSON configuration file.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::host::HostSlot;
use crate::switch::SwitchOptions;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// User configuration. Every key is optional and unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Slot of the machine running the tool.
    pub this_host_id: HostSlot,
    /// Delay between two devices, in milliseconds.
    pub device_pacing_ms: u64,
    /// Delay after the pre-switch hook, in milliseconds.
    pub settle_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let strict = SwitchOptions::strict();
        Self {
            this_host_id: HostSlot::default(),
            device_pacing_ms: strict.device_pacing.as_millis() as u64,
            settle_delay_ms: strict.settle_delay.as_millis() as u64,
        }
    }
}

impl Config {
    /// Read and parse `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::Config(format!("{}: {e}", path.display()))),
        };

        serde_json::from_str(&text).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Like [`Config::load`], but an unreadable or malformed file only logs a
    /// warning and falls back to the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring config file");
            Self::default()
        })
    }

    /// Switch delays described by this configuration.
    pub fn switch_options(&self) -> SwitchOptions {
        SwitchOptions {
            device_pacing: Duration::from_millis(self.device_pacing_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }
}
