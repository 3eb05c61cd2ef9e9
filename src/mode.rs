// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Operating mode.
//!
//! The mode is never stored by the engine. It is recomputed on every call
//! from two external signals so configuration changes apply without a
//! restart:
//!
//! ```text
//! converted? ──no──→ Disable
//!     │yes
//! settings?  ──no──→ Disable
//!     │yes
//!     └────────────→ settings.mode
//! ```
//!
//! # Example
//!
//! ```
//! use catalog_sync::{Mode, SyncSettings};
//! use catalog_sync::mode::resolve;
//!
//! let settings = SyncSettings::with_mode(Mode::Dual);
//! assert_eq!(resolve(false, Some(&settings)), Mode::Disable);
//! assert_eq!(resolve(true, None), Mode::Disable);
//! assert_eq!(resolve(true, Some(&settings)), Mode::Dual);
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::SyncSettings;

/// Which stores the engine touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Legacy catalog only; remote store untouched and unread
    #[default]
    Disable,
    /// Write both stores; read with fallback between them
    Dual,
    /// Legacy catalog bypassed; remote store authoritative
    SearchOnly,
}

impl Mode {
    /// Whether index/unindex calls reach the legacy catalog.
    #[must_use]
    pub fn writes_legacy(self) -> bool {
        matches!(self, Mode::Disable | Mode::Dual)
    }

    /// Whether index/unindex calls reach the remote backend.
    #[must_use]
    pub fn writes_remote(self) -> bool {
        matches!(self, Mode::Dual | Mode::SearchOnly)
    }

    /// Short label used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Disable => "disable",
            Mode::Dual => "dual",
            Mode::SearchOnly => "search_only",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "disable" | "disabled" => Ok(Mode::Disable),
            "dual" => Ok(Mode::Dual),
            "search_only" => Ok(Mode::SearchOnly),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

/// Derive the effective mode.
#[must_use]
pub fn resolve(converted: bool, settings: Option<&SyncSettings>) -> Mode {
    if !converted {
        return Mode::Disable;
    }
    match settings {
        Some(settings) => settings.mode,
        None => Mode::Disable,
    }
}
