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

//! Authorization service: decisions, administration and cache coherence

use crate::audit::{AuditEvent, AuditEventType, AuditLogger, AuditResult};
use crate::cache::{CacheStats, DecisionCache};
use crate::config::AuthorityConfig;
use crate::store::PermissionStore;
use chrono::{DateTime, Utc};
use dotauth_common::{
    AccessQuery, AssignUserPermissionInput, AuthzError, AuthzResult, CreatePermissionInput, CreateRoleInput, GrantDetail, LinkId, Permission, PermissionId, PermissionWithRoleName, Role,
    RoleId, UpdatePermissionInput, UpdateRoleInput, UserId, UserPermission,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Entry point of the authority. Cheap to clone; clones share the store,
/// the decision cache and the audit log.
#[derive(Clone)]
pub struct AuthorizationService {
    store: Arc<dyn PermissionStore>,
    cache: Arc<DecisionCache>,
    audit_logger: Arc<AuditLogger>,
    config: AuthorityConfig,
}

impl fmt::Debug for AuthorizationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationService")
            .field("cache", &self.cache.stats())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AuthorizationService {
    /// Create a service over `store` with a fresh cache and audit log
    pub fn new(store: Arc<dyn PermissionStore>, config: AuthorityConfig) -> Self {
        let cache = Arc::new(DecisionCache::with_enabled(config.cache_enabled));
        let audit_logger = Arc::new(AuditLogger::with_max_events(config.audit_max_events));
        Self::with_components(store, cache, audit_logger, config)
    }

    /// Create a service from explicitly shared components
    pub fn with_components(store: Arc<dyn PermissionStore>, cache: Arc<DecisionCache>, audit_logger: Arc<AuditLogger>, config: AuthorityConfig) -> Self {
        Self { store, cache, audit_logger, config }
    }

    /// Decide whether a user may perform an action. A missing permission is
    /// `Ok(false)`; only store failures are errors, and those are never cached.
    pub async fn check_permission(&self, query: &AccessQuery) -> AuthzResult<bool> {
        let start_time = Instant::now();

        if let Some(allowed) = self.cache.get(query) {
            self.record_check(query, allowed, true);
            return Ok(allowed);
        }

        let epoch = self.cache.epoch();
        let allowed = match self.store.has_permission(query).await {
            Ok(allowed) => allowed,
            Err(err) => {
                error!(
                    user_id = %query.user_id,
                    resource_type = %query.resource_type,
                    action = %query.action,
                    resource_id = ?query.resource_id,
                    error = %err,
                    "Permission check failed"
                );
                return Err(err);
            }
        };
        self.cache.insert(query, allowed, epoch);

        let duration = start_time.elapsed();
        if duration > Duration::from_millis(self.config.slow_check_threshold_ms) {
            warn!(
                user_id = %query.user_id,
                resource_type = %query.resource_type,
                action = %query.action,
                duration_ms = %duration.as_millis(),
                "Slow permission check detected"
            );
        }

        debug!(
            user_id = %query.user_id,
            resource_type = %query.resource_type,
            action = %query.action,
            allowed = %allowed,
            duration_ms = %duration.as_millis(),
            "Permission check completed"
        );

        self.record_check(query, allowed, false);
        Ok(allowed)
    }

    /// Like [`check_permission`](Self::check_permission), but a denial is an `Unauthorized` error
    pub async fn enforce_permission(&self, query: &AccessQuery) -> AuthzResult<()> {
        if self.check_permission(query).await? {
            return Ok(());
        }

        counter!("dotauth_enforcement_denied_total", 1);
        warn!(
            user_id = %query.user_id,
            resource_type = %query.resource_type,
            action = %query.action,
            resource_id = ?query.resource_id,
            "Permission denied"
        );
        self.audit_logger.log_permission_denied(query);

        let target = match query.resource_id {
            Some(resource_id) => format!("{} {}", query.resource_type, resource_id),
            None => query.resource_type.clone(),
        };
        Err(AuthzError::unauthorized(format!("user {} does not have {} permission for {}", query.user_id, query.action, target)))
    }

    fn record_check(&self, query: &AccessQuery, allowed: bool, cached: bool) {
        let result = if allowed { "granted" } else { "denied" };
        counter!("dotauth_checks_total", 1, "result" => result);

        if self.config.audit_checks || !allowed {
            self.audit_logger.log_permission_check(query, allowed, cached);
        }
    }

    // Roles

    pub async fn list_roles(&self) -> AuthzResult<Vec<Role>> {
        self.store.list_roles().await
    }

    pub async fn get_role(&self, id: RoleId) -> AuthzResult<Role> {
        self.require_role(id).await
    }

    pub async fn create_role(&self, input: CreateRoleInput) -> AuthzResult<Role> {
        validate_required(&input.name, "role name")?;

        let role = self.store.create_role(input).await.inspect_err(|err| log_store_failure(err, "create_role", "role", None))?;
        self.cache.clear();

        info!(role_id = %role.id, name = %role.name, "Role created");
        self.audit_logger.log_change(AuditEventType::RoleCreated, "role_id", role.id);
        Ok(role)
    }

    pub async fn update_role(&self, id: RoleId, input: UpdateRoleInput) -> AuthzResult<Role> {
        validate_optional(input.name.as_deref(), "role name")?;
        self.require_role(id).await?;

        let role = self.store.update_role(id, input).await.inspect_err(|err| log_store_failure(err, "update_role", "role", Some(id)))?;
        self.cache.clear();

        info!(role_id = %role.id, name = %role.name, "Role updated");
        self.audit_logger.log_change(AuditEventType::RoleUpdated, "role_id", role.id);
        Ok(role)
    }

    /// Delete a role; its permission links go with it and its users lose the role
    pub async fn delete_role(&self, id: RoleId) -> AuthzResult<()> {
        self.require_role(id).await?;

        self.store.delete_role(id).await.inspect_err(|err| log_store_failure(err, "delete_role", "role", Some(id)))?;
        self.cache.clear();

        info!(role_id = %id, "Role deleted");
        self.audit_logger.log_change(AuditEventType::RoleDeleted, "role_id", id);
        Ok(())
    }

    // Permissions

    pub async fn list_permissions(&self) -> AuthzResult<Vec<Permission>> {
        self.store.list_permissions().await
    }

    pub async fn list_permissions_by_resource_type(&self, resource_type: &str) -> AuthzResult<Vec<Permission>> {
        self.store.list_permissions_by_resource_type(resource_type).await
    }

    pub async fn get_permission(&self, id: PermissionId) -> AuthzResult<Permission> {
        self.require_permission(id).await
    }

    pub async fn create_permission(&self, input: CreatePermissionInput) -> AuthzResult<Permission> {
        validate_required(&input.name, "permission name")?;
        validate_required(&input.resource_type, "resource type")?;
        validate_required(&input.action, "action")?;

        let permission = self.store.create_permission(input).await.inspect_err(|err| log_store_failure(err, "create_permission", "permission", None))?;
        self.cache.clear();

        info!(permission_id = %permission.id, key = %permission.key(), "Permission created");
        self.audit_logger.log_change(AuditEventType::PermissionCreated, "permission_id", permission.id);
        Ok(permission)
    }

    pub async fn update_permission(&self, id: PermissionId, input: UpdatePermissionInput) -> AuthzResult<Permission> {
        validate_optional(input.name.as_deref(), "permission name")?;
        validate_optional(input.resource_type.as_deref(), "resource type")?;
        validate_optional(input.action.as_deref(), "action")?;
        self.require_permission(id).await?;

        let permission = self.store.update_permission(id, input).await.inspect_err(|err| log_store_failure(err, "update_permission", "permission", Some(id)))?;
        self.cache.clear();

        info!(permission_id = %permission.id, key = %permission.key(), "Permission updated");
        self.audit_logger.log_change(AuditEventType::PermissionUpdated, "permission_id", permission.id);
        Ok(permission)
    }

    /// Delete a permission together with every role and user link to it
    pub async fn delete_permission(&self, id: PermissionId) -> AuthzResult<()> {
        self.require_permission(id).await?;

        self.store.delete_permission(id).await.inspect_err(|err| log_store_failure(err, "delete_permission", "permission", Some(id)))?;
        self.cache.clear();

        info!(permission_id = %id, "Permission deleted");
        self.audit_logger.log_change(AuditEventType::PermissionDeleted, "permission_id", id);
        Ok(())
    }

    // Role permissions

    pub async fn get_role_permissions(&self, role_id: RoleId) -> AuthzResult<Vec<Permission>> {
        self.require_role(role_id).await?;
        self.store.list_role_permissions(role_id).await.inspect_err(|err| log_store_failure(err, "list_role_permissions", "role", Some(role_id)))
    }

    pub async fn assign_permission_to_role(&self, role_id: RoleId, permission_id: PermissionId) -> AuthzResult<()> {
        self.require_role(role_id).await?;
        self.require_permission(permission_id).await?;

        self
            .store
            .link_role_permission(role_id, permission_id)
            .await
            .inspect_err(|err| log_store_failure(err, "link_role_permission", "role", Some(role_id)))?;
        self.cache.clear();

        info!(role_id = %role_id, permission_id = %permission_id, "Permission assigned to role");
        self.log_role_permissions_changed(role_id, "assign", permission_id);
        Ok(())
    }

    pub async fn remove_permission_from_role(&self, role_id: RoleId, permission_id: PermissionId) -> AuthzResult<()> {
        self
            .store
            .unlink_role_permission(role_id, permission_id)
            .await
            .inspect_err(|err| log_store_failure(err, "unlink_role_permission", "role", Some(role_id)))?;
        self.cache.clear();

        info!(role_id = %role_id, permission_id = %permission_id, "Permission removed from role");
        self.log_role_permissions_changed(role_id, "remove", permission_id);
        Ok(())
    }

    /// Replace the permission set of a role. Every requested permission must
    /// exist before anything is written. A failing link or unlink aborts the
    /// rest without rolling back what was already applied.
    pub async fn update_role_permissions(&self, role_id: RoleId, permission_ids: &[PermissionId]) -> AuthzResult<()> {
        self.require_role(role_id).await?;

        let requested: BTreeSet<PermissionId> = permission_ids.iter().copied().collect();
        for permission_id in &requested {
            self.require_permission(*permission_id).await?;
        }

        let current: BTreeSet<PermissionId> = self
            .store
            .list_role_permissions(role_id)
            .await
            .inspect_err(|err| log_store_failure(err, "list_role_permissions", "role", Some(role_id)))?
            .into_iter().map(|permission| permission.id).collect();
        let to_remove: Vec<PermissionId> = current.difference(&requested).copied().collect();
        let to_add: Vec<PermissionId> = requested.difference(&current).copied().collect();

        let mut writes_issued = false;
        let outcome = self.apply_role_permission_changes(role_id, &to_remove, &to_add, &mut writes_issued).await;
        if writes_issued {
            self.cache.clear();
        }
        outcome?;

        info!(role_id = %role_id, added = to_add.len(), removed = to_remove.len(), "Role permissions replaced");
        self.audit_logger.log_event(
            AuditEvent::new(AuditEventType::RolePermissionsChanged, AuditResult::Success)
                .with_detail("role_id", role_id)
                .with_detail("operation", "replace")
                .with_detail("added", to_add.len())
                .with_detail("removed", to_remove.len()),
        );
        Ok(())
    }

    async fn apply_role_permission_changes(&self, role_id: RoleId, to_remove: &[PermissionId], to_add: &[PermissionId], writes_issued: &mut bool) -> AuthzResult<()> {
        for permission_id in to_remove {
            *writes_issued = true;
            self
                .store
                .unlink_role_permission(role_id, *permission_id)
                .await
                .inspect_err(|err| log_store_failure(err, "unlink_role_permission", "role", Some(role_id)))?;
        }
        for permission_id in to_add {
            *writes_issued = true;
            self
                .store
                .link_role_permission(role_id, *permission_id)
                .await
                .inspect_err(|err| log_store_failure(err, "link_role_permission", "role", Some(role_id)))?;
        }
        Ok(())
    }

    fn log_role_permissions_changed(&self, role_id: RoleId, operation: &str, permission_id: PermissionId) {
        self.audit_logger.log_event(
            AuditEvent::new(AuditEventType::RolePermissionsChanged, AuditResult::Success)
                .with_detail("role_id", role_id)
                .with_detail("operation", operation)
                .with_detail("permission_id", permission_id),
        );
    }

    // User permissions

    /// Direct and role-inherited grants of a user
    pub async fn get_user_permissions(&self, user_id: UserId) -> AuthzResult<Vec<GrantDetail>> {
        self.store.list_user_permissions(user_id).await
    }

    pub async fn get_user_direct_permissions(&self, user_id: UserId) -> AuthzResult<Vec<GrantDetail>> {
        self.store.list_user_direct_permissions(user_id).await
    }

    pub async fn get_user_role_permissions(&self, user_id: UserId) -> AuthzResult<Vec<PermissionWithRoleName>> {
        self.store.list_user_role_permissions(user_id).await
    }

    pub async fn get_user_permission(&self, link_id: LinkId) -> AuthzResult<UserPermission> {
        self
            .store
            .get_user_permission(link_id)
            .await?
            .ok_or_else(|| AuthzError::not_found(format!("user permission with ID {link_id} not found")))
    }

    /// Grant a permission directly to a user, optionally scoped to one resource
    pub async fn assign_permission_to_user(&self, input: AssignUserPermissionInput) -> AuthzResult<UserPermission> {
        self.require_permission(input.permission_id).await?;
        let user_id = input.user_id;

        let link = self
            .store
            .link_user_permission(input)
            .await
            .inspect_err(|err| log_store_failure(err, "link_user_permission", "user", Some(user_id)))?;
        self.cache.invalidate_user(link.user_id);

        info!(user_id = %link.user_id, permission_id = %link.permission_id, resource_id = ?link.resource_id, link_id = %link.id, "Permission assigned to user");
        let mut event = AuditEvent::new(AuditEventType::UserPermissionGranted, AuditResult::Success)
            .with_user(link.user_id)
            .with_detail("permission_id", link.permission_id)
            .with_detail("link_id", link.id);
        if let Some(resource_id) = link.resource_id {
            event = event.with_detail("resource_id", resource_id);
        }
        self.audit_logger.log_event(event);

        Ok(link)
    }

    /// Remove a direct grant by link ID
    pub async fn remove_permission_from_user(&self, link_id: LinkId) -> AuthzResult<()> {
        let owner = self
            .store
            .unlink_user_permission(link_id)
            .await
            .inspect_err(|err| log_store_failure(err, "unlink_user_permission", "user_permission", Some(link_id)))?;

        let mut event = AuditEvent::new(AuditEventType::UserPermissionRevoked, AuditResult::Success).with_detail("link_id", link_id);
        match owner {
            Some(user_id) => {
                self.cache.invalidate_user(user_id);
                event = event.with_user(user_id);
                info!(user_id = %user_id, link_id = %link_id, "Permission removed from user");
            }
            None => {
                self.cache.clear();
                info!(link_id = %link_id, "Permission removed from unknown user, cleared decision cache");
            }
        }
        self.audit_logger.log_event(event);

        Ok(())
    }

    // Cache

    /// Drop every cached decision
    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("Decision cache cleared");
        self.audit_logger.log_event(AuditEvent::new(AuditEventType::CacheCleared, AuditResult::Success).with_detail("scope", "all"));
    }

    /// Drop the cached decisions of one user, e.g. after changing their role
    pub fn invalidate_user(&self, user_id: UserId) {
        self.cache.invalidate_user(user_id);
        self.audit_logger.log_event(
            AuditEvent::new(AuditEventType::CacheCleared, AuditResult::Success)
                .with_user(user_id)
                .with_detail("scope", "user"),
        );
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Name of the role currently held by a user
    pub async fn user_role_name(&self, user_id: UserId) -> AuthzResult<Option<String>> {
        let Some(role_id) = self.store.user_role(user_id).await? else {
            return Ok(None);
        };
        Ok(self.store.get_role(role_id).await?.map(|role| role.name))
    }

    /// Get authority health status
    pub async fn health_status(&self) -> AuthorityHealthStatus {
        let cache_stats = self.cache.stats();
        let audit_stats = self.audit_logger.statistics();

        let (is_healthy, roles_count) = match self.store.list_roles().await {
            Ok(roles) => (true, roles.len()),
            Err(err) => {
                error!(error = %err, "Health check could not reach the permission store");
                (false, 0)
            }
        };

        AuthorityHealthStatus {
            is_healthy,
            cache_enabled: self.cache.is_enabled(),
            cache_hit_ratio: cache_stats.hit_ratio(),
            cache_size: cache_stats.cached_decisions,
            total_audit_events: audit_stats.total_events,
            roles_count,
            last_check: Utc::now(),
        }
    }

    /// Get the audit logger
    pub fn audit_logger(&self) -> &Arc<AuditLogger> {
        &self.audit_logger
    }

    /// Get the decision cache
    pub fn cache(&self) -> &Arc<DecisionCache> {
        &self.cache
    }

    /// Get the permission store
    pub fn store(&self) -> &Arc<dyn PermissionStore> {
        &self.store
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    async fn require_role(&self, id: RoleId) -> AuthzResult<Role> {
        self
            .store
            .get_role(id)
            .await
            .inspect_err(|err| log_store_failure(err, "get_role", "role", Some(id)))?
            .ok_or_else(|| AuthzError::not_found(format!("role with ID {id} not found")))
    }

    async fn require_permission(&self, id: PermissionId) -> AuthzResult<Permission> {
        self
            .store
            .get_permission(id)
            .await
            .inspect_err(|err| log_store_failure(err, "get_permission", "permission", Some(id)))?
            .ok_or_else(|| AuthzError::not_found(format!("permission with ID {id} not found")))
    }
}

/// Log a persistence failure with the entity it concerned. Client errors
/// (not found, invalid input) are the caller's to report.
fn log_store_failure(err: &AuthzError, operation: &str, entity: &str, entity_id: Option<i64>) {
    if let AuthzError::Store(source) = err {
        error!(
            operation = %operation,
            entity = %entity,
            entity_id = ?entity_id,
            error = %source,
            "Permission store operation failed"
        );
    }
}

fn validate_required(value: &str, field: &str) -> AuthzResult<()> {
    if value.trim().is_empty() {
        return Err(AuthzError::invalid_input(format!("{field} is required")));
    }
    Ok(())
}

fn validate_optional(value: Option<&str>, field: &str) -> AuthzResult<()> {
    match value {
        Some(value) => validate_required(value, field),
        None => Ok(()),
    }
}

/// Authority health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityHealthStatus {
    /// Whether the store answered
    pub is_healthy: bool,

    pub cache_enabled: bool,

    /// Cache hit ratio
    pub cache_hit_ratio: f64,

    /// Number of cached decisions
    pub cache_size: usize,

    /// Total audit events retained
    pub total_audit_events: usize,

    /// Number of roles in the store
    pub roles_count: usize,

    /// Last health check timestamp
    pub last_check: DateTime<Utc>,
}
