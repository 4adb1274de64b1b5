//! Durability mode configuration
//!
//! Controls whether committed batches are logged and when the log is synced.

use std::fmt;

/// Durability mode for the batch log
///
/// # Modes
///
/// | Mode | Log file | fsync | Data Loss Window |
/// |------|----------|-------|------------------|
/// | Ephemeral | No | Never | Everything |
/// | Always | Yes | Every commit | Zero |
/// | Buffered | Yes | On `sync()` and drop | Since last sync |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// In-memory only; nothing survives a restart
    Ephemeral,

    /// fsync after every appended record
    #[default]
    Always,

    /// Flush to the OS after every record, fsync only on `sync()` and drop
    Buffered,
}

impl DurabilityMode {
    /// Whether this mode keeps a log file at all
    pub fn requires_log(&self) -> bool {
        !matches!(self, DurabilityMode::Ephemeral)
    }

    /// Whether every append is followed by an fsync
    pub fn requires_immediate_fsync(&self) -> bool {
        matches!(self, DurabilityMode::Always)
    }

    /// Name used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            DurabilityMode::Ephemeral => "ephemeral",
            DurabilityMode::Always => "always",
            DurabilityMode::Buffered => "buffered",
        }
    }

    /// Parse the configuration name of a mode
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "ephemeral" => Some(DurabilityMode::Ephemeral),
            "always" => Some(DurabilityMode::Always),
            "buffered" => Some(DurabilityMode::Buffered),
            _ => None,
        }
    }
}

impl fmt::Display for DurabilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
