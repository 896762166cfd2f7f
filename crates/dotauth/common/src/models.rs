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

//! Access-control data model shared by the authority and its callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// User identifier (the user entity itself lives outside the authority)
pub type UserId = i64;

/// Role identifier
pub type RoleId = i64;

/// Permission identifier
pub type PermissionId = i64;

/// Identifier of a protected resource instance
pub type ResourceId = i64;

/// Identifier of a user-permission link
pub type LinkId = i64;

/// Well-known action verbs
pub mod actions {
    pub const VIEW: &str = "view";
    /// Wildcard action, satisfies any requested action on the same resource type
    pub const ALL: &str = "all";
}

/// Coarse-grained role held by a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    /// Unique role identifier
    pub id: RoleId,

    /// Unique role name
    pub name: String,

    /// Role description
    pub description: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Permission to perform an action on a type of resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    /// Unique permission identifier
    pub id: PermissionId,

    /// Unique permission name
    pub name: String,

    /// Permission description
    pub description: String,

    /// Resource type tag (e.g. "invoice")
    pub resource_type: String,

    /// Action verb, or the wildcard "all"
    pub action: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    /// Check if this permission covers an action on a resource type
    pub fn grants(&self, resource_type: &str, action: &str) -> bool {
        self.resource_type == resource_type && (self.action == action || self.action == actions::ALL)
    }

    /// Get the permission key used for display and comparison
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.action)
    }
}

/// Link granting a permission to every member of a role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RolePermission {
    pub id: i64,
    pub role_id: RoleId,
    pub permission_id: PermissionId,
    pub created_at: DateTime<Utc>,
}

/// Link granting a permission directly to a user, optionally for one resource instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserPermission {
    /// Link identifier
    pub id: LinkId,

    /// User receiving the grant
    pub user_id: UserId,

    /// Granted permission
    pub permission_id: PermissionId,

    /// Resource instance the grant is scoped to; `None` covers every instance
    pub resource_id: Option<ResourceId>,

    /// Grant timestamp
    pub created_at: DateTime<Utc>,
}

/// Grant joined with the permission it refers to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrantDetail {
    /// User-permission link id, `0` for role-inherited rows
    pub id: LinkId,
    pub user_id: UserId,
    pub permission_id: PermissionId,
    pub permission_name: String,
    pub resource_type: String,
    pub action: String,
    pub resource_id: Option<ResourceId>,
}

impl GrantDetail {
    /// Build a detail row for a direct grant
    pub fn direct(link: &UserPermission, permission: &Permission) -> Self {
        Self {
            id: link.id,
            user_id: link.user_id,
            permission_id: permission.id,
            permission_name: permission.name.clone(),
            resource_type: permission.resource_type.clone(),
            action: permission.action.clone(),
            resource_id: link.resource_id,
        }
    }

    /// Build a detail row for a permission inherited through the user's role
    pub fn inherited(user_id: UserId, permission: &Permission) -> Self {
        Self {
            id: 0,
            user_id,
            permission_id: permission.id,
            permission_name: permission.name.clone(),
            resource_type: permission.resource_type.clone(),
            action: permission.action.clone(),
            resource_id: None,
        }
    }

    /// Whether this row came from a direct grant
    pub fn is_direct(&self) -> bool {
        self.id != 0
    }

    /// Check if this grant covers an action on a resource type
    pub fn grants(&self, resource_type: &str, action: &str) -> bool {
        self.resource_type == resource_type && (self.action == action || self.action == actions::ALL)
    }
}

/// Permission annotated with the name of the role granting it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionWithRoleName {
    #[serde(flatten)]
    pub permission: Permission,
    pub role_name: String,
}

/// Input for creating a role
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRoleInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl CreateRoleInput {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Partial role update; `None` fields keep their current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRoleInput {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Input for creating a permission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePermissionInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub resource_type: String,
    pub action: String,
}

impl CreatePermissionInput {
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            resource_type: resource_type.into(),
            action: action.into(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Partial permission update; `None` fields keep their current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePermissionInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub resource_type: Option<String>,
    pub action: Option<String>,
}

/// Input for granting a permission directly to a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssignUserPermissionInput {
    pub user_id: UserId,
    pub permission_id: PermissionId,
    #[serde(default)]
    pub resource_id: Option<ResourceId>,
}

impl AssignUserPermissionInput {
    /// General grant covering every instance of the permission's resource type
    pub fn general(user_id: UserId, permission_id: PermissionId) -> Self {
        Self {
            user_id,
            permission_id,
            resource_id: None,
        }
    }

    /// Grant scoped to a single resource instance
    pub fn scoped(user_id: UserId, permission_id: PermissionId, resource_id: ResourceId) -> Self {
        Self {
            user_id,
            permission_id,
            resource_id: Some(resource_id),
        }
    }
}

/// A single authorization question: may `user_id` perform `action` on `resource_type`?
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessQuery {
    pub user_id: UserId,
    pub resource_type: String,
    pub action: String,
    pub resource_id: Option<ResourceId>,
}

impl AccessQuery {
    /// Query covering every instance of a resource type
    pub fn new(user_id: UserId, resource_type: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            user_id,
            resource_type: resource_type.into(),
            action: action.into(),
            resource_id: None,
        }
    }

    /// Narrow the query to a single resource instance
    pub fn on(mut self, resource_id: ResourceId) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    /// Set the resource instance, if any
    pub fn with_resource(mut self, resource_id: Option<ResourceId>) -> Self {
        self.resource_id = resource_id;
        self
    }

    /// Key of this query within the user's cached decisions
    pub fn decision_key(&self) -> DecisionKey {
        DecisionKey {
            resource_type: self.resource_type.clone(),
            action: self.action.clone(),
            resource_id: self.resource_id,
        }
    }
}

/// Structured cache key; fields are compared individually so no two distinct
/// queries of one user can collide
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecisionKey {
    pub resource_type: String,
    pub action: String,
    pub resource_id: Option<ResourceId>,
}

impl fmt::Display for AccessQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user {} {} on {}", self.user_id, self.action, self.resource_type)?;
        if let Some(resource_id) = self.resource_id {
            write!(f, " #{resource_id}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permission(resource_type: &str, action: &str) -> Permission {
        let now = Utc::now();
        Permission {
            id: 1,
            name: format!("{resource_type}.{action}"),
            description: String::new(),
            resource_type: resource_type.to_string(),
            action: action.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_permission_matching() {
        let permission = permission("invoice", "view");

        assert!(permission.grants("invoice", "view"));
        assert!(!permission.grants("invoice", "delete"));
        assert!(!permission.grants("customer", "view"));
    }

    #[test]
    fn test_wildcard_action() {
        let permission = permission("invoice", actions::ALL);

        assert!(permission.grants("invoice", "view"));
        assert!(permission.grants("invoice", "delete"));
        assert!(permission.grants("invoice", actions::ALL));
        assert!(!permission.grants("customer", "view"));
    }

    #[test]
    fn test_requested_wildcard_is_literal() {
        let permission = permission("invoice", "view");
        assert!(!permission.grants("invoice", actions::ALL));
    }

    #[test]
    fn test_decision_keys_do_not_collide() {
        let scoped = AccessQuery::new(7, "invoice", "delete").on(42);
        let embedded = AccessQuery::new(7, "invoice", "delete:42");
        let shifted = AccessQuery::new(7, "invoice:delete", "42");

        assert_ne!(scoped.decision_key(), embedded.decision_key());
        assert_ne!(embedded.decision_key(), shifted.decision_key());
        assert_eq!(scoped.decision_key(), AccessQuery::new(9, "invoice", "delete").on(42).decision_key());
    }

    #[test]
    fn test_grant_detail_direction() {
        let permission = permission("invoice", "view");
        let link = UserPermission {
            id: 9,
            user_id: 3,
            permission_id: permission.id,
            resource_id: Some(42),
            created_at: Utc::now(),
        };

        let direct = GrantDetail::direct(&link, &permission);
        assert!(direct.is_direct());
        assert_eq!(direct.resource_id, Some(42));

        let inherited = GrantDetail::inherited(3, &permission);
        assert!(!inherited.is_direct());
        assert_eq!(inherited.resource_id, None);
    }

    #[test]
    fn test_role_permission_row_serializes_flat() {
        let row = PermissionWithRoleName {
            permission: permission("invoice", "view"),
            role_name: "Clerk".to_string(),
        };

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["resource_type"], "invoice");
        assert_eq!(json["role_name"], "Clerk");
    }
}
