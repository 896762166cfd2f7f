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

//! In-memory permission store with JSON snapshots

use crate::store::PermissionStore;
use async_trait::async_trait;
use chrono::Utc;
use dotauth_common::{
    AssignUserPermissionInput, AuthzError, AuthzResult, CreatePermissionInput, CreateRoleInput, GrantDetail, LinkId, Permission, PermissionId, PermissionWithRoleName, Role, RoleId,
    RolePermission, StoreError, UpdatePermissionInput, UpdateRoleInput, UserId, UserPermission,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Identifier sequences, one per table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Sequences {
    role: i64,
    permission: i64,
    role_permission: i64,
    user_permission: i64,
}

/// Everything the store persists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    roles: BTreeMap<RoleId, Role>,
    permissions: BTreeMap<PermissionId, Permission>,
    role_permissions: Vec<RolePermission>,
    user_permissions: BTreeMap<LinkId, UserPermission>,
    /// Role reference of each user; stands in for the external user table
    user_roles: BTreeMap<UserId, RoleId>,
    sequences: Sequences,
}

fn next_id(sequence: &mut i64) -> i64 {
    *sequence += 1;
    *sequence
}

fn require_non_empty(value: &str, field: &str) -> AuthzResult<()> {
    if value.trim().is_empty() {
        return Err(AuthzError::invalid_input(format!("{field} is required")));
    }
    Ok(())
}

impl StoreState {
    fn role_name_taken(&self, name: &str, except: Option<RoleId>) -> bool {
        self.roles.values().any(|role| role.name == name && Some(role.id) != except)
    }

    fn permission_name_taken(&self, name: &str, except: Option<PermissionId>) -> bool {
        self.permissions.values().any(|permission| permission.name == name && Some(permission.id) != except)
    }

    fn role_permissions_of(&self, role_id: RoleId) -> AuthzResult<Vec<Permission>> {
        let mut permissions = self
            .role_permissions
            .iter()
            .filter(|link| link.role_id == role_id)
            .map(|link| {
                self.permissions.get(&link.permission_id).cloned().ok_or_else(|| {
                    AuthzError::from(StoreError::MalformedRow {
                        entity: "role_permission",
                        id: link.id,
                        message: format!("references missing permission {}", link.permission_id),
                    })
                })
            })
            .collect::<AuthzResult<Vec<_>>>()?;

        permissions.sort_by_key(|permission| permission.id);
        Ok(permissions)
    }

    fn direct_grants_of(&self, user_id: UserId) -> AuthzResult<Vec<GrantDetail>> {
        self.user_permissions
            .values()
            .filter(|link| link.user_id == user_id)
            .map(|link| {
                let permission = self.permissions.get(&link.permission_id).ok_or_else(|| {
                    AuthzError::from(StoreError::MalformedRow {
                        entity: "user_permission",
                        id: link.id,
                        message: format!("references missing permission {}", link.permission_id),
                    })
                })?;
                Ok(GrantDetail::direct(link, permission))
            })
            .collect()
    }
}

/// Permission store kept entirely in memory.
///
/// Every operation takes the state lock for the duration of a single
/// synchronous step, so the lock is never held across an `.await`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a JSON snapshot
    pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let state: StoreState = serde_json::from_str(&content)?;

        info!(
            path = %path.as_ref().display(),
            roles = %state.roles.len(),
            permissions = %state.permissions.len(),
            "Loaded permission store snapshot"
        );

        Ok(Self { state: RwLock::new(state) })
    }

    /// Load a snapshot if the file exists, otherwise start empty
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if path.as_ref().exists() {
            Self::load_snapshot(path)
        } else {
            debug!(path = %path.as_ref().display(), "No snapshot found, starting with an empty store");
            Ok(Self::new())
        }
    }

    /// Write the current state to a JSON snapshot, replacing the file atomically
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let path = path.as_ref();
        let json = {
            let state = self.state.read();
            serde_json::to_string_pretty(&*state)?
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;

        debug!(path = %path.display(), "Saved permission store snapshot");
        Ok(())
    }

    /// Set or clear the role of a user. This is the user directory side of
    /// the store; callers holding a live service must invalidate the user's
    /// cached decisions afterwards.
    pub fn set_user_role(&self, user_id: UserId, role_id: Option<RoleId>) -> AuthzResult<()> {
        let mut state = self.state.write();

        match role_id {
            Some(role_id) => {
                if !state.roles.contains_key(&role_id) {
                    return Err(AuthzError::not_found(format!("role with ID {role_id} not found")));
                }
                state.user_roles.insert(user_id, role_id);
            }
            None => {
                state.user_roles.remove(&user_id);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn get_role(&self, id: RoleId) -> AuthzResult<Option<Role>> {
        Ok(self.state.read().roles.get(&id).cloned())
    }

    async fn list_roles(&self) -> AuthzResult<Vec<Role>> {
        Ok(self.state.read().roles.values().cloned().collect())
    }

    async fn create_role(&self, input: CreateRoleInput) -> AuthzResult<Role> {
        require_non_empty(&input.name, "role name")?;
        let mut state = self.state.write();

        if state.role_name_taken(&input.name, None) {
            return Err(AuthzError::invalid_input(format!("role name '{}' already exists", input.name)));
        }

        let now = Utc::now();
        let role = Role {
            id: next_id(&mut state.sequences.role),
            name: input.name,
            description: input.description,
            created_at: now,
            updated_at: now,
        };
        state.roles.insert(role.id, role.clone());

        Ok(role)
    }

    async fn update_role(&self, id: RoleId, input: UpdateRoleInput) -> AuthzResult<Role> {
        if let Some(name) = &input.name {
            require_non_empty(name, "role name")?;
        }

        let mut state = self.state.write();
        if let Some(name) = &input.name {
            if state.role_name_taken(name, Some(id)) {
                return Err(AuthzError::invalid_input(format!("role name '{name}' already exists")));
            }
        }

        let role = state.roles.get_mut(&id).ok_or_else(|| AuthzError::not_found(format!("role with ID {id} not found")))?;
        if let Some(name) = input.name {
            role.name = name;
        }
        if let Some(description) = input.description {
            role.description = description;
        }
        role.updated_at = Utc::now();

        Ok(role.clone())
    }

    async fn delete_role(&self, id: RoleId) -> AuthzResult<()> {
        let mut state = self.state.write();

        if state.roles.remove(&id).is_none() {
            return Err(AuthzError::not_found(format!("role with ID {id} not found")));
        }

        state.role_permissions.retain(|link| link.role_id != id);
        state.user_roles.retain(|_, role_id| *role_id != id);

        Ok(())
    }

    async fn get_permission(&self, id: PermissionId) -> AuthzResult<Option<Permission>> {
        Ok(self.state.read().permissions.get(&id).cloned())
    }

    async fn list_permissions(&self) -> AuthzResult<Vec<Permission>> {
        Ok(self.state.read().permissions.values().cloned().collect())
    }

    async fn list_permissions_by_resource_type(&self, resource_type: &str) -> AuthzResult<Vec<Permission>> {
        Ok(self
            .state
            .read()
            .permissions
            .values()
            .filter(|permission| permission.resource_type == resource_type)
            .cloned()
            .collect())
    }

    async fn create_permission(&self, input: CreatePermissionInput) -> AuthzResult<Permission> {
        require_non_empty(&input.name, "permission name")?;
        require_non_empty(&input.resource_type, "resource_type")?;
        require_non_empty(&input.action, "action")?;

        let mut state = self.state.write();
        if state.permission_name_taken(&input.name, None) {
            return Err(AuthzError::invalid_input(format!("permission name '{}' already exists", input.name)));
        }

        let now = Utc::now();
        let permission = Permission {
            id: next_id(&mut state.sequences.permission),
            name: input.name,
            description: input.description,
            resource_type: input.resource_type,
            action: input.action,
            created_at: now,
            updated_at: now,
        };
        state.permissions.insert(permission.id, permission.clone());

        Ok(permission)
    }

    async fn update_permission(&self, id: PermissionId, input: UpdatePermissionInput) -> AuthzResult<Permission> {
        for (value, field) in [(&input.name, "permission name"), (&input.resource_type, "resource_type"), (&input.action, "action")] {
            if let Some(value) = value {
                require_non_empty(value, field)?;
            }
        }

        let mut state = self.state.write();
        if let Some(name) = &input.name {
            if state.permission_name_taken(name, Some(id)) {
                return Err(AuthzError::invalid_input(format!("permission name '{name}' already exists")));
            }
        }

        let permission = state
            .permissions
            .get_mut(&id)
            .ok_or_else(|| AuthzError::not_found(format!("permission with ID {id} not found")))?;
        if let Some(name) = input.name {
            permission.name = name;
        }
        if let Some(description) = input.description {
            permission.description = description;
        }
        if let Some(resource_type) = input.resource_type {
            permission.resource_type = resource_type;
        }
        if let Some(action) = input.action {
            permission.action = action;
        }
        permission.updated_at = Utc::now();

        Ok(permission.clone())
    }

    async fn delete_permission(&self, id: PermissionId) -> AuthzResult<()> {
        let mut state = self.state.write();

        if state.permissions.remove(&id).is_none() {
            return Err(AuthzError::not_found(format!("permission with ID {id} not found")));
        }

        state.role_permissions.retain(|link| link.permission_id != id);
        state.user_permissions.retain(|_, link| link.permission_id != id);

        Ok(())
    }

    async fn list_role_permissions(&self, role_id: RoleId) -> AuthzResult<Vec<Permission>> {
        self.state.read().role_permissions_of(role_id)
    }

    async fn link_role_permission(&self, role_id: RoleId, permission_id: PermissionId) -> AuthzResult<()> {
        let mut state = self.state.write();

        if !state.roles.contains_key(&role_id) {
            return Err(AuthzError::not_found(format!("role with ID {role_id} not found")));
        }
        if !state.permissions.contains_key(&permission_id) {
            return Err(AuthzError::not_found(format!("permission with ID {permission_id} not found")));
        }
        if state.role_permissions.iter().any(|link| link.role_id == role_id && link.permission_id == permission_id) {
            return Ok(());
        }

        let link = RolePermission {
            id: next_id(&mut state.sequences.role_permission),
            role_id,
            permission_id,
            created_at: Utc::now(),
        };
        state.role_permissions.push(link);

        Ok(())
    }

    async fn unlink_role_permission(&self, role_id: RoleId, permission_id: PermissionId) -> AuthzResult<()> {
        let mut state = self.state.write();
        let before = state.role_permissions.len();

        state.role_permissions.retain(|link| !(link.role_id == role_id && link.permission_id == permission_id));

        if state.role_permissions.len() == before {
            return Err(AuthzError::not_found(format!("role {role_id} does not have permission {permission_id}")));
        }

        Ok(())
    }

    async fn user_role(&self, user_id: UserId) -> AuthzResult<Option<RoleId>> {
        Ok(self.state.read().user_roles.get(&user_id).copied())
    }

    async fn list_user_permissions(&self, user_id: UserId) -> AuthzResult<Vec<GrantDetail>> {
        let state = self.state.read();
        let mut merged: BTreeMap<(PermissionId, Option<i64>), GrantDetail> = BTreeMap::new();

        if let Some(role_id) = state.user_roles.get(&user_id) {
            for permission in state.role_permissions_of(*role_id)? {
                merged.insert((permission.id, None), GrantDetail::inherited(user_id, &permission));
            }
        }

        // Direct rows replace inherited rows with the same key
        for grant in state.direct_grants_of(user_id)? {
            merged.insert((grant.permission_id, grant.resource_id), grant);
        }

        Ok(merged.into_values().collect())
    }

    async fn list_user_direct_permissions(&self, user_id: UserId) -> AuthzResult<Vec<GrantDetail>> {
        self.state.read().direct_grants_of(user_id)
    }

    async fn list_user_role_permissions(&self, user_id: UserId) -> AuthzResult<Vec<PermissionWithRoleName>> {
        let state = self.state.read();

        let Some(role) = state.user_roles.get(&user_id).and_then(|role_id| state.roles.get(role_id)) else {
            return Ok(Vec::new());
        };

        Ok(state
            .role_permissions_of(role.id)?
            .into_iter()
            .map(|permission| PermissionWithRoleName {
                permission,
                role_name: role.name.clone(),
            })
            .collect())
    }

    async fn get_user_permission(&self, link_id: LinkId) -> AuthzResult<Option<UserPermission>> {
        Ok(self.state.read().user_permissions.get(&link_id).cloned())
    }

    async fn link_user_permission(&self, input: AssignUserPermissionInput) -> AuthzResult<UserPermission> {
        let mut state = self.state.write();

        if !state.permissions.contains_key(&input.permission_id) {
            return Err(AuthzError::not_found(format!("permission with ID {} not found", input.permission_id)));
        }

        if let Some(existing) = state
            .user_permissions
            .values()
            .find(|link| link.user_id == input.user_id && link.permission_id == input.permission_id && link.resource_id == input.resource_id)
        {
            return Ok(existing.clone());
        }

        let link = UserPermission {
            id: next_id(&mut state.sequences.user_permission),
            user_id: input.user_id,
            permission_id: input.permission_id,
            resource_id: input.resource_id,
            created_at: Utc::now(),
        };
        state.user_permissions.insert(link.id, link.clone());

        Ok(link)
    }

    async fn unlink_user_permission(&self, link_id: LinkId) -> AuthzResult<Option<UserId>> {
        self.state
            .write()
            .user_permissions
            .remove(&link_id)
            .map(|link| Some(link.user_id))
            .ok_or_else(|| AuthzError::not_found(format!("user permission with ID {link_id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dotauth_common::AccessQuery;

    async fn seeded_store() -> (MemoryStore, Role, Permission, Permission) {
        let store = MemoryStore::new();
        let clerk = store.create_role(CreateRoleInput::new("Clerk", "Front office")).await.unwrap();
        let view = store.create_permission(CreatePermissionInput::new("invoice.view", "invoice", "view")).await.unwrap();
        let delete = store.create_permission(CreatePermissionInput::new("invoice.delete", "invoice", "delete")).await.unwrap();
        (store, clerk, view, delete)
    }

    #[tokio::test]
    async fn test_role_crud() {
        let store = MemoryStore::new();

        let role = store.create_role(CreateRoleInput::new("Clerk", "")).await.unwrap();
        assert_eq!(role.id, 1);

        let updated = store
            .update_role(
                role.id,
                UpdateRoleInput {
                    name: None,
                    description: Some("Handles invoices".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Clerk");
        assert_eq!(updated.description, "Handles invoices");

        store.delete_role(role.id).await.unwrap();
        assert!(store.get_role(role.id).await.unwrap().is_none());
        assert!(store.delete_role(role.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_unique_and_required_names() {
        let store = MemoryStore::new();
        store.create_role(CreateRoleInput::new("Clerk", "")).await.unwrap();

        assert!(matches!(store.create_role(CreateRoleInput::new("Clerk", "")).await, Err(AuthzError::InvalidInput { .. })));
        assert!(matches!(store.create_role(CreateRoleInput::new("  ", "")).await, Err(AuthzError::InvalidInput { .. })));
        assert!(matches!(
            store.create_permission(CreatePermissionInput::new("invoice.view", "invoice", "")).await,
            Err(AuthzError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_missing_role() {
        let store = MemoryStore::new();
        let result = store.update_role(42, UpdateRoleInput::default()).await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_role_link_idempotent() {
        let (store, clerk, view, _) = seeded_store().await;

        store.link_role_permission(clerk.id, view.id).await.unwrap();
        store.link_role_permission(clerk.id, view.id).await.unwrap();
        assert_eq!(store.list_role_permissions(clerk.id).await.unwrap(), vec![view.clone()]);

        store.unlink_role_permission(clerk.id, view.id).await.unwrap();
        assert!(store.unlink_role_permission(clerk.id, view.id).await.unwrap_err().is_not_found());
        assert!(store.list_role_permissions(clerk.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_link_requires_existing_entities() {
        let (store, clerk, view, _) = seeded_store().await;

        assert!(store.link_role_permission(99, view.id).await.unwrap_err().is_not_found());
        assert!(store.link_role_permission(clerk.id, 99).await.unwrap_err().is_not_found());
        assert!(store.link_user_permission(AssignUserPermissionInput::general(1, 99)).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_role_cascades() {
        let (store, clerk, view, _) = seeded_store().await;
        store.link_role_permission(clerk.id, view.id).await.unwrap();
        store.set_user_role(1, Some(clerk.id)).unwrap();

        store.delete_role(clerk.id).await.unwrap();

        assert!(store.list_role_permissions(clerk.id).await.unwrap().is_empty());
        assert_eq!(store.user_role(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_permission_cascades() {
        let (store, clerk, view, _) = seeded_store().await;
        store.link_role_permission(clerk.id, view.id).await.unwrap();
        store.link_user_permission(AssignUserPermissionInput::general(1, view.id)).await.unwrap();

        store.delete_permission(view.id).await.unwrap();

        assert!(store.list_role_permissions(clerk.id).await.unwrap().is_empty());
        assert!(store.list_user_direct_permissions(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_permissions_prefer_direct_rows() {
        let (store, clerk, view, delete) = seeded_store().await;
        store.link_role_permission(clerk.id, view.id).await.unwrap();
        store.set_user_role(1, Some(clerk.id)).unwrap();

        let direct = store.link_user_permission(AssignUserPermissionInput::general(1, view.id)).await.unwrap();
        store.link_user_permission(AssignUserPermissionInput::scoped(1, delete.id, 42)).await.unwrap();

        let all = store.list_user_permissions(1).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].permission_id, view.id);
        assert_eq!(all[0].id, direct.id);
        assert_eq!(all[1].resource_id, Some(42));

        let inherited = store.list_user_role_permissions(1).await.unwrap();
        assert_eq!(inherited.len(), 1);
        assert_eq!(inherited[0].role_name, "Clerk");
    }

    #[tokio::test]
    async fn test_user_link_idempotent_and_removable() {
        let (store, _, view, _) = seeded_store().await;

        let first = store.link_user_permission(AssignUserPermissionInput::scoped(1, view.id, 42)).await.unwrap();
        let second = store.link_user_permission(AssignUserPermissionInput::scoped(1, view.id, 42)).await.unwrap();
        assert_eq!(first.id, second.id);

        assert_eq!(store.unlink_user_permission(first.id).await.unwrap(), Some(1));
        assert!(store.unlink_user_permission(first.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_default_has_permission_uses_resolver() {
        let (store, clerk, view, _) = seeded_store().await;
        store.link_role_permission(clerk.id, view.id).await.unwrap();
        store.set_user_role(1, Some(clerk.id)).unwrap();

        assert!(store.has_permission(&AccessQuery::new(1, "invoice", "view")).await.unwrap());
        assert!(!store.has_permission(&AccessQuery::new(2, "invoice", "view")).await.unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authority.json");

        let (store, clerk, view, _) = seeded_store().await;
        store.link_role_permission(clerk.id, view.id).await.unwrap();
        store.set_user_role(5, Some(clerk.id)).unwrap();
        store.save_snapshot(&path).unwrap();

        let restored = MemoryStore::open(&path).unwrap();
        assert_eq!(restored.list_roles().await.unwrap(), vec![clerk.clone()]);
        assert_eq!(restored.user_role(5).await.unwrap(), Some(clerk.id));

        // Sequences survive the round trip
        let next = restored.create_role(CreateRoleInput::new("Auditor", "")).await.unwrap();
        assert_eq!(next.id, clerk.id + 1);
    }

    #[tokio::test]
    async fn test_dangling_role_link_is_malformed() {
        let (store, clerk, view, _) = seeded_store().await;
        store.link_role_permission(clerk.id, view.id).await.unwrap();
        store.set_user_role(1, Some(clerk.id)).unwrap();
        store.state.write().role_permissions.push(RolePermission {
            id: 77,
            role_id: clerk.id,
            permission_id: 99,
            created_at: Utc::now(),
        });

        let is_dangling_link = |err: AuthzError| matches!(err, AuthzError::Store(StoreError::MalformedRow { entity: "role_permission", id: 77, .. }));
        assert!(is_dangling_link(store.list_role_permissions(clerk.id).await.unwrap_err()));
        assert!(is_dangling_link(store.list_user_permissions(1).await.unwrap_err()));
        assert!(is_dangling_link(store.list_user_role_permissions(1).await.unwrap_err()));
        assert!(is_dangling_link(store.has_permission(&AccessQuery::new(1, "invoice", "view")).await.unwrap_err()));
    }

    #[test]
    fn test_open_missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("missing.json")).unwrap();
        assert!(store.state.read().roles.is_empty());
    }
}
