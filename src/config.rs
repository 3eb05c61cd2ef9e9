// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Settings for the catalog sync engine.
//!
//! Settings live in the host's configuration store; the engine only reads
//! them, through a [`SettingsSource`], on every call.
//!
//! # Example
//!
//! ```
//! use catalog_sync::{Mode, SyncSettings};
//!
//! // Minimal settings (uses defaults)
//! let settings = SyncSettings::default();
//! assert_eq!(settings.mode, Mode::Disable);
//! assert!(settings.auto_flush);
//!
//! // Loaded from the host's JSON settings record
//! let settings: SyncSettings = serde_json::from_str(
//!     r#"{"mode": "dual", "hosts": ["http://search-1:9200"], "timeout": 2.0}"#,
//! ).unwrap();
//! assert_eq!(settings.mode, Mode::Dual);
//! assert_eq!(settings.connection().hosts, vec!["http://search-1:9200".to_string()]);
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Deserialize;

use crate::mode::Mode;

/// Process-visible settings for the engine.
///
/// All fields have defaults. At minimum, `mode` and `hosts` should be set
/// for anything but legacy-only operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SyncSettings {
    /// Configured mode (only effective once the catalog has been migrated)
    #[serde(default)]
    pub mode: Mode,

    /// Backend hosts (e.g., "http://localhost:9200")
    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// Discover cluster nodes when the connection is created
    #[serde(default)]
    pub sniff_on_start: bool,

    /// Re-discover cluster nodes after a connection failure
    #[serde(default)]
    pub sniff_on_connection_fail: bool,

    /// Sniffer timeout in seconds
    #[serde(default = "default_sniffer_timeout")]
    pub sniffer_timeout: f64,

    /// Retry remote calls that time out
    #[serde(default)]
    pub retry_on_timeout: bool,

    /// Refresh the remote index after every write (read-after-write visibility)
    #[serde(default = "default_auto_flush")]
    pub auto_flush: bool,

    /// When remote writes are applied relative to the owning transaction
    #[serde(default)]
    pub write_policy: WritePolicy,

    /// Read order under dual mode
    #[serde(default)]
    pub dual_read: DualRead,
}

fn default_hosts() -> Vec<String> { vec!["127.0.0.1:9200".to_string()] }
fn default_timeout() -> f64 { 0.5 }
fn default_sniffer_timeout() -> f64 { 0.1 }
fn default_auto_flush() -> bool { true }

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            hosts: default_hosts(),
            timeout: default_timeout(),
            sniff_on_start: false,
            sniff_on_connection_fail: false,
            sniffer_timeout: default_sniffer_timeout(),
            retry_on_timeout: false,
            auto_flush: default_auto_flush(),
            write_policy: WritePolicy::default(),
            dual_read: DualRead::default(),
        }
    }
}

impl SyncSettings {
    /// Settings with the given mode and defaults for everything else.
    #[must_use]
    pub fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Connection parameters handed to the backend connector.
    #[must_use]
    pub fn connection(&self) -> ConnectionSettings {
        ConnectionSettings {
            hosts: self.hosts.clone(),
            timeout: secs(self.timeout),
            sniff_on_start: self.sniff_on_start,
            sniff_on_connection_fail: self.sniff_on_connection_fail,
            sniffer_timeout: secs(self.sniffer_timeout),
            retry_on_timeout: self.retry_on_timeout,
        }
    }
}

// Negative or NaN values from a hand-edited settings record mean "no wait".
fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

/// Backend connection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub hosts: Vec<String>,
    pub timeout: Duration,
    pub sniff_on_start: bool,
    pub sniff_on_connection_fail: bool,
    pub sniffer_timeout: Duration,
    pub retry_on_timeout: bool,
}

/// When pending remote writes hit the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Write at call time; the transaction buffer is an audit log only.
    /// An aborted legacy transaction can leave a committed remote write.
    #[default]
    Immediate,
    /// Queue writes in the transaction buffer, flush on commit, discard on abort.
    Deferred,
}

/// Which store answers reads first under dual mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DualRead {
    /// Remote backend first, legacy catalog on failure
    #[default]
    RemoteFirst,
    /// Legacy catalog first, remote backend on failure
    LegacyFirst,
}

/// Read-only view of the host's configuration store.
///
/// `None` means the settings record is unavailable, which forces
/// [`Mode::Disable`].
pub trait SettingsSource: Send + Sync {
    fn current(&self) -> Option<SyncSettings>;
}

/// Settings held in process memory, swappable at runtime.
#[derive(Debug, Default, Clone)]
pub struct SharedSettings {
    inner: Arc<RwLock<Option<SyncSettings>>>,
}

impl SharedSettings {
    /// Create a source holding `settings`.
    #[must_use]
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(settings))),
        }
    }

    /// Create a source whose settings are unavailable.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Replace the current settings.
    pub fn set(&self, settings: SyncSettings) {
        *self.inner.write() = Some(settings);
    }

    /// Apply an in-place change to the current settings (no-op if unavailable).
    pub fn update(&self, f: impl FnOnce(&mut SyncSettings)) {
        if let Some(settings) = self.inner.write().as_mut() {
            f(settings);
        }
    }

    /// Drop the settings record.
    pub fn clear(&self) {
        *self.inner.write() = None;
    }
}

impl SettingsSource for SharedSettings {
    fn current(&self) -> Option<SyncSettings> {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SyncSettings::default();
        assert_eq!(settings.mode, Mode::Disable);
        assert_eq!(settings.timeout, 0.5);
        assert_eq!(settings.sniffer_timeout, 0.1);
        assert!(settings.auto_flush);
        assert!(!settings.retry_on_timeout);
        assert_eq!(settings.write_policy, WritePolicy::Immediate);
        assert_eq!(settings.dual_read, DualRead::RemoteFirst);
    }

    #[test]
    fn test_deserialize_partial() {
        let settings: SyncSettings = serde_json::from_str(
            r#"{"mode": "search_only", "auto_flush": false, "write_policy": "deferred"}"#,
        )
        .unwrap();
        assert_eq!(settings.mode, Mode::SearchOnly);
        assert!(!settings.auto_flush);
        assert_eq!(settings.write_policy, WritePolicy::Deferred);
        // untouched fields keep their defaults
        assert_eq!(settings.hosts, default_hosts());
    }

    #[test]
    fn test_connection_settings() {
        let settings = SyncSettings {
            timeout: 2.5,
            sniffer_timeout: -1.0,
            retry_on_timeout: true,
            ..Default::default()
        };
        let conn = settings.connection();
        assert_eq!(conn.timeout, Duration::from_millis(2500));
        assert_eq!(conn.sniffer_timeout, Duration::ZERO);
        assert!(conn.retry_on_timeout);
    }

    #[test]
    fn test_shared_settings_roundtrip() {
        let source = SharedSettings::unavailable();
        assert!(source.current().is_none());

        source.set(SyncSettings::with_mode(Mode::Dual));
        assert_eq!(source.current().unwrap().mode, Mode::Dual);

        source.update(|s| s.mode = Mode::SearchOnly);
        assert_eq!(source.current().unwrap().mode, Mode::SearchOnly);

        source.clear();
        assert!(source.current().is_none());
    }
}
