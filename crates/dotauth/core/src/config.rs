// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Runtime configuration of the authority

use serde::{Deserialize, Serialize};
use std::env;

/// Configuration for an [`AuthorizationService`](crate::AuthorizationService)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Memoize decisions per user
    pub cache_enabled: bool,

    /// Checks slower than this are logged at warn level
    pub slow_check_threshold_ms: u64,

    /// Maximum number of audit events kept in memory (0 disables retention)
    pub audit_max_events: usize,

    /// Record every permission check in the audit log, not just denials
    pub audit_checks: bool,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            slow_check_threshold_ms: 5,
            audit_max_events: 10_000,
            audit_checks: true,
        }
    }
}

impl AuthorityConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup, falling back to
    /// defaults for missing or unparsable values
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            cache_enabled: lookup("DOTAUTH_CACHE_ENABLED").and_then(|v| v.parse().ok()).unwrap_or(defaults.cache_enabled),

            slow_check_threshold_ms: lookup("DOTAUTH_SLOW_CHECK_MS").and_then(|v| v.parse().ok()).unwrap_or(defaults.slow_check_threshold_ms),

            audit_max_events: lookup("DOTAUTH_AUDIT_MAX_EVENTS").and_then(|v| v.parse().ok()).unwrap_or(defaults.audit_max_events),

            audit_checks: lookup("DOTAUTH_AUDIT_CHECKS").and_then(|v| v.parse().ok()).unwrap_or(defaults.audit_checks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_unset() {
        let config = AuthorityConfig::from_lookup(|_| None);
        assert_eq!(config, AuthorityConfig::default());
        assert!(config.cache_enabled);
        assert_eq!(config.slow_check_threshold_ms, 5);
        assert_eq!(config.audit_max_events, 10_000);
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let vars = HashMap::from([
            ("DOTAUTH_CACHE_ENABLED", "false"),
            ("DOTAUTH_SLOW_CHECK_MS", "not-a-number"),
            ("DOTAUTH_AUDIT_MAX_EVENTS", "25"),
        ]);
        let config = AuthorityConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert!(!config.cache_enabled);
        assert_eq!(config.slow_check_threshold_ms, 5);
        assert_eq!(config.audit_max_events, 25);
        assert!(config.audit_checks);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AuthorityConfig = serde_json::from_str(r#"{"cache_enabled": false}"#).unwrap();
        assert!(!config.cache_enabled);
        assert_eq!(config.audit_max_events, 10_000);
    }
}
