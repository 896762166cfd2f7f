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

//! Persistence boundary of the authority
//!
//! The store owns roles, permissions and the grant links between them and
//! users. The authority only needs simple keyed lookups from it; anything
//! fancier (SQL, pooling, schema) stays behind this trait.

pub mod memory;

pub use memory::MemoryStore;

use crate::resolver;
use async_trait::async_trait;
use dotauth_common::{
    AccessQuery, AssignUserPermissionInput, AuthzResult, CreatePermissionInput, CreateRoleInput, GrantDetail, LinkId, Permission, PermissionId, PermissionWithRoleName, Role, RoleId,
    UpdatePermissionInput, UpdateRoleInput, UserId, UserPermission,
};

/// Storage contract for roles, permissions and grants
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Get role by ID
    async fn get_role(&self, id: RoleId) -> AuthzResult<Option<Role>>;

    /// List all roles ordered by ID
    async fn list_roles(&self) -> AuthzResult<Vec<Role>>;

    /// Create a role; the name must be non-empty and unused
    async fn create_role(&self, input: CreateRoleInput) -> AuthzResult<Role>;

    /// Apply a partial update to a role
    async fn update_role(&self, id: RoleId, input: UpdateRoleInput) -> AuthzResult<Role>;

    /// Delete a role together with its permission links
    async fn delete_role(&self, id: RoleId) -> AuthzResult<()>;

    /// Get permission by ID
    async fn get_permission(&self, id: PermissionId) -> AuthzResult<Option<Permission>>;

    /// List all permissions ordered by ID
    async fn list_permissions(&self) -> AuthzResult<Vec<Permission>>;

    /// List permissions for one resource type ordered by ID
    async fn list_permissions_by_resource_type(&self, resource_type: &str) -> AuthzResult<Vec<Permission>>;

    /// Create a permission; name, resource type and action must be non-empty
    async fn create_permission(&self, input: CreatePermissionInput) -> AuthzResult<Permission>;

    /// Apply a partial update to a permission
    async fn update_permission(&self, id: PermissionId, input: UpdatePermissionInput) -> AuthzResult<Permission>;

    /// Delete a permission together with every link referencing it
    async fn delete_permission(&self, id: PermissionId) -> AuthzResult<()>;

    /// Permissions granted to a role, ordered by permission ID
    async fn list_role_permissions(&self, role_id: RoleId) -> AuthzResult<Vec<Permission>>;

    /// Grant a permission to a role; linking an existing pair is a no-op
    async fn link_role_permission(&self, role_id: RoleId, permission_id: PermissionId) -> AuthzResult<()>;

    /// Revoke a permission from a role; fails `NotFound` if the pair is absent
    async fn unlink_role_permission(&self, role_id: RoleId, permission_id: PermissionId) -> AuthzResult<()>;

    /// Role currently held by a user, if any
    async fn user_role(&self, user_id: UserId) -> AuthzResult<Option<RoleId>>;

    /// Role-inherited and direct grants of a user, direct rows winning on duplicates
    async fn list_user_permissions(&self, user_id: UserId) -> AuthzResult<Vec<GrantDetail>>;

    /// Direct grants of a user ordered by link ID
    async fn list_user_direct_permissions(&self, user_id: UserId) -> AuthzResult<Vec<GrantDetail>>;

    /// Permissions a user inherits from their role
    async fn list_user_role_permissions(&self, user_id: UserId) -> AuthzResult<Vec<PermissionWithRoleName>>;

    /// Get a user-permission link by ID
    async fn get_user_permission(&self, link_id: LinkId) -> AuthzResult<Option<UserPermission>>;

    /// Grant a permission directly to a user; an identical existing grant is returned as is
    async fn link_user_permission(&self, input: AssignUserPermissionInput) -> AuthzResult<UserPermission>;

    /// Remove a direct grant by link ID, reporting the owning user when known
    async fn unlink_user_permission(&self, link_id: LinkId) -> AuthzResult<Option<UserId>>;

    /// Decide a query. Engines may push this down as long as the three-tier
    /// contract of [`resolver::resolve`] holds.
    async fn has_permission(&self, query: &AccessQuery) -> AuthzResult<bool> {
        Ok(resolver::resolve(self, query).await?.is_granted())
    }
}
