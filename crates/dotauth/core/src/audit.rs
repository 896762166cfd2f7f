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

//! Audit trail for authorization decisions and administrative changes

use chrono::{DateTime, Utc};
use dotauth_common::{AccessQuery, UserId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{info, warn};

/// Audit event types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AuditEventType {
    /// Permission check performed
    PermissionCheck,
    /// Enforcement rejected a request
    PermissionDenied,
    RoleCreated,
    RoleUpdated,
    RoleDeleted,
    PermissionCreated,
    PermissionUpdated,
    PermissionDeleted,
    /// Role permission set changed (single link or set replace)
    RolePermissionsChanged,
    /// Permission granted directly to a user
    UserPermissionGranted,
    /// Direct user grant removed
    UserPermissionRevoked,
    /// Decision cache wiped administratively
    CacheCleared,
}

/// Audit event result
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditResult {
    /// Operation succeeded
    Success,
    /// Operation failed
    Failure,
    /// Operation was denied
    Denied,
}

/// Audit event entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: String,

    /// Event type
    pub event_type: AuditEventType,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,

    /// User the event concerns (if applicable)
    pub user_id: Option<UserId>,

    /// Resource type being accessed
    pub resource: Option<String>,

    /// Action being performed
    pub action: Option<String>,

    /// Event result
    pub result: AuditResult,

    /// Additional event details
    pub details: HashMap<String, String>,
}

impl AuditEvent {
    /// Create a new audit event
    pub fn new(event_type: AuditEventType, result: AuditResult) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            timestamp: Utc::now(),
            user_id: None,
            resource: None,
            action: None,
            result,
            details: HashMap::new(),
        }
    }

    /// Set the user the event concerns
    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Set resource and action
    pub fn with_resource_action(mut self, resource: impl Into<String>, action: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self.action = Some(action.into());
        self
    }

    /// Add detail
    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.insert(key.into(), value.to_string());
        self
    }
}

/// Bounded in-memory audit log, mirrored to `tracing`
#[derive(Debug)]
pub struct AuditLogger {
    events: RwLock<VecDeque<AuditEvent>>,

    /// Maximum number of events to keep in memory
    max_events: usize,
}

impl AuditLogger {
    /// Create a new audit logger
    pub fn new() -> Self {
        Self::with_max_events(10_000)
    }

    /// Create audit logger with custom max events
    pub fn with_max_events(max_events: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::new()),
            max_events,
        }
    }

    /// Log an audit event
    pub fn log_event(&self, event: AuditEvent) {
        match event.result {
            AuditResult::Success => {
                info!(
                    event_type = ?event.event_type,
                    user_id = ?event.user_id,
                    resource = ?event.resource,
                    action = ?event.action,
                    "Audit event: {:?}", event.event_type
                );
            }
            AuditResult::Failure | AuditResult::Denied => {
                warn!(
                    event_type = ?event.event_type,
                    user_id = ?event.user_id,
                    resource = ?event.resource,
                    action = ?event.action,
                    result = ?event.result,
                    "Audit event: {:?} - {:?}", event.event_type, event.result
                );
            }
        }

        if self.max_events == 0 {
            return;
        }

        let mut events = self.events.write();
        events.push_back(event);
        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    /// Log permission check
    pub fn log_permission_check(&self, query: &AccessQuery, granted: bool, cached: bool) {
        let result = if granted { AuditResult::Success } else { AuditResult::Denied };

        let mut event = AuditEvent::new(AuditEventType::PermissionCheck, result)
            .with_user(query.user_id)
            .with_resource_action(query.resource_type.as_str(), query.action.as_str())
            .with_detail("cached", cached);
        if let Some(resource_id) = query.resource_id {
            event = event.with_detail("resource_id", resource_id);
        }

        self.log_event(event);
    }

    /// Log an enforcement rejection
    pub fn log_permission_denied(&self, query: &AccessQuery) {
        let mut event = AuditEvent::new(AuditEventType::PermissionDenied, AuditResult::Denied)
            .with_user(query.user_id)
            .with_resource_action(query.resource_type.as_str(), query.action.as_str());
        if let Some(resource_id) = query.resource_id {
            event = event.with_detail("resource_id", resource_id);
        }

        self.log_event(event);
    }

    /// Log a successful administrative change to a role or permission
    pub fn log_change(&self, event_type: AuditEventType, entity_key: &str, entity_id: i64) {
        self.log_event(AuditEvent::new(event_type, AuditResult::Success).with_detail(entity_key, entity_id));
    }

    /// Get the most recent events, newest first
    pub fn recent(&self, limit: Option<usize>) -> Vec<AuditEvent> {
        let events = self.events.read();
        events.iter().rev().take(limit.unwrap_or(usize::MAX)).cloned().collect()
    }

    /// Get events for a specific user, newest first
    pub fn user_events(&self, user_id: UserId, limit: Option<usize>) -> Vec<AuditEvent> {
        let events = self.events.read();
        events
            .iter()
            .rev()
            .filter(|event| event.user_id == Some(user_id))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Get audit statistics
    pub fn statistics(&self) -> AuditStatistics {
        let events = self.events.read();

        let mut stats = AuditStatistics {
            total_events: events.len(),
            ..Default::default()
        };

        for event in events.iter() {
            match event.result {
                AuditResult::Success => stats.successful_events += 1,
                AuditResult::Failure => stats.failed_events += 1,
                AuditResult::Denied => stats.denied_events += 1,
            }

            *stats.events_by_type.entry(event.event_type).or_insert(0) += 1;
        }

        stats
    }
}

/// Audit statistics
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AuditStatistics {
    /// Total number of events
    pub total_events: usize,

    /// Number of successful events
    pub successful_events: usize,

    /// Number of failed events
    pub failed_events: usize,

    /// Number of denied events
    pub denied_events: usize,

    /// Events by type
    pub events_by_type: HashMap<AuditEventType, usize>,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_creation() {
        let event = AuditEvent::new(AuditEventType::PermissionCheck, AuditResult::Success)
            .with_user(7)
            .with_resource_action("invoice", "view")
            .with_detail("resource_id", 42);

        assert_eq!(event.event_type, AuditEventType::PermissionCheck);
        assert_eq!(event.user_id, Some(7));
        assert_eq!(event.resource.as_deref(), Some("invoice"));
        assert_eq!(event.action.as_deref(), Some("view"));
        assert_eq!(event.details.get("resource_id").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_audit_logger() {
        let logger = AuditLogger::new();

        logger.log_permission_check(&AccessQuery::new(7, "invoice", "view"), true, false);
        logger.log_permission_denied(&AccessQuery::new(7, "invoice", "delete").on(42));
        logger.log_change(AuditEventType::RoleCreated, "role_id", 1);

        assert_eq!(logger.recent(None).len(), 3);
        assert_eq!(logger.recent(Some(1))[0].event_type, AuditEventType::RoleCreated);
        assert_eq!(logger.user_events(7, None).len(), 2);

        let stats = logger.statistics();
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.successful_events, 2);
        assert_eq!(stats.denied_events, 1);
        assert_eq!(stats.events_by_type.get(&AuditEventType::PermissionDenied), Some(&1));
    }

    #[test]
    fn test_audit_logger_limits() {
        let logger = AuditLogger::with_max_events(2);

        for user_id in 0..5 {
            logger.log_permission_check(&AccessQuery::new(user_id, "invoice", "view"), true, true);
        }

        let events = logger.recent(None);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].user_id, Some(4));
    }

    #[test]
    fn test_disabled_audit_log_keeps_nothing() {
        let logger = AuditLogger::with_max_events(0);
        logger.log_change(AuditEventType::CacheCleared, "scope", 0);
        assert!(logger.recent(None).is_empty());
    }
}
