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

//! Enforcement gates for route guards
//!
//! The HTTP layer resolves the caller into a [`Principal`] and hands it to a
//! gate together with whatever identifies the target resource. Gates turn
//! that into an [`AccessQuery`] and enforce it through the service.

use crate::service::AuthorizationService;
use dotauth_common::{AccessQuery, AuthzError, AuthzResult, ResourceId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Authenticated caller as seen by a route guard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub username: String,
    #[serde(default)]
    pub role_name: Option<String>,
}

impl Principal {
    pub fn new(user_id: UserId, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            role_name: None,
        }
    }

    /// Set the name of the role the caller authenticated with
    pub fn with_role(mut self, role_name: impl Into<String>) -> Self {
        self.role_name = Some(role_name.into());
        self
    }
}

fn authenticated(principal: Option<&Principal>) -> AuthzResult<&Principal> {
    principal.ok_or_else(|| AuthzError::unauthenticated("authentication required"))
}

/// Guard requiring one action on one resource type
#[derive(Debug, Clone)]
pub struct PermissionGate {
    service: AuthorizationService,
    resource_type: String,
    action: String,
}

impl PermissionGate {
    pub fn require(service: AuthorizationService, resource_type: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            service,
            resource_type: resource_type.into(),
            action: action.into(),
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Query this gate asks on behalf of `user_id`
    pub fn query_for(&self, user_id: UserId, resource_id: Option<ResourceId>) -> AccessQuery {
        AccessQuery::new(user_id, self.resource_type.as_str(), self.action.as_str()).with_resource(resource_id)
    }

    /// Enforce using the route's `id` parameter. A parameter that is not an
    /// integer is ignored and the check falls back to the general tiers.
    pub async fn enforce(&self, principal: Option<&Principal>, resource_param: Option<&str>) -> AuthzResult<()> {
        let principal = authenticated(principal)?;

        let resource_id = resource_param.and_then(|param| match param.trim().parse::<ResourceId>() {
            Ok(id) => Some(id),
            Err(_) => {
                debug!(param = %param, "Ignoring non-numeric resource parameter");
                None
            }
        });

        self.service.enforce_permission(&self.query_for(principal.user_id, resource_id)).await
    }

    /// Enforce with a resource ID supplied by the caller
    pub async fn enforce_with<F>(&self, principal: Option<&Principal>, resource_id: F) -> AuthzResult<()>
    where
        F: FnOnce() -> Option<ResourceId>,
    {
        let principal = authenticated(principal)?;
        self.service.enforce_permission(&self.query_for(principal.user_id, resource_id())).await
    }
}

/// Field names a [`BodyPermissionGate`] reads the requirement from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyRequirement {
    pub resource_type_field: String,
    pub action_field: String,
    /// Optional field carrying a numeric resource ID
    pub resource_id_field: Option<String>,
}

impl Default for BodyRequirement {
    fn default() -> Self {
        Self {
            resource_type_field: "resource_type".to_string(),
            action_field: "action".to_string(),
            resource_id_field: Some("resource_id".to_string()),
        }
    }
}

/// Guard whose requirement is carried by a JSON request body
#[derive(Debug, Clone)]
pub struct BodyPermissionGate {
    service: AuthorizationService,
    requirement: BodyRequirement,
}

impl BodyPermissionGate {
    pub fn new(service: AuthorizationService, requirement: BodyRequirement) -> Self {
        Self { service, requirement }
    }

    /// Build the query described by `body`
    pub fn query_from_body(&self, user_id: UserId, body: &Value) -> AuthzResult<AccessQuery> {
        let object = body.as_object().ok_or_else(|| AuthzError::invalid_input("invalid request body"))?;

        let field = |name: &str, label: &str| -> AuthzResult<String> {
            match object.get(name) {
                None => Err(AuthzError::invalid_input(format!("{label} not specified"))),
                Some(Value::String(value)) if !value.trim().is_empty() => Ok(value.clone()),
                Some(_) => Err(AuthzError::invalid_input(format!("invalid {label}"))),
            }
        };

        let resource_type = field(&self.requirement.resource_type_field, "resource type")?;
        let action = field(&self.requirement.action_field, "action")?;
        // Only whole numbers name an instance; 42.0 is accepted, 42.9 is not.
        let resource_id = match self.requirement.resource_id_field.as_deref().and_then(|name| object.get(name)) {
            None | Some(Value::Null) => None,
            Some(value) => {
                let id = value
                    .as_i64()
                    .or_else(|| value.as_f64().filter(|id| id.fract() == 0.0).map(|id| id as ResourceId))
                    .ok_or_else(|| AuthzError::invalid_input("invalid resource id"))?;
                Some(id)
            }
        };

        Ok(AccessQuery::new(user_id, resource_type, action).with_resource(resource_id))
    }

    /// Enforce the requirement read from `body`, returning the query that passed
    pub async fn enforce(&self, principal: Option<&Principal>, body: &Value) -> AuthzResult<AccessQuery> {
        let principal = authenticated(principal)?;
        let query = self.query_from_body(principal.user_id, body)?;
        self.service.enforce_permission(&query).await?;
        Ok(query)
    }
}

/// Guard requiring the caller to hold a named role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGate {
    role_name: String,
}

impl RoleGate {
    pub const ADMIN_ROLE: &'static str = "Admin";

    pub fn require(role_name: impl Into<String>) -> Self {
        Self { role_name: role_name.into() }
    }

    pub fn admin() -> Self {
        Self::require(Self::ADMIN_ROLE)
    }

    pub fn role_name(&self) -> &str {
        &self.role_name
    }

    /// Check the role the principal authenticated with
    pub fn check(&self, principal: Option<&Principal>) -> AuthzResult<()> {
        let principal = authenticated(principal)?;
        self.matches(principal.user_id, principal.role_name.as_deref())
    }

    /// Check the role currently recorded for the user in the store
    pub async fn check_user(&self, service: &AuthorizationService, user_id: UserId) -> AuthzResult<()> {
        let role_name = service.user_role_name(user_id).await?;
        self.matches(user_id, role_name.as_deref())
    }

    fn matches(&self, user_id: UserId, role_name: Option<&str>) -> AuthzResult<()> {
        if role_name == Some(self.role_name.as_str()) {
            return Ok(());
        }

        warn!(user_id = %user_id, required_role = %self.role_name, actual_role = ?role_name, "Insufficient role privileges");
        Err(AuthzError::unauthorized(format!("user {user_id} does not hold role {}", self.role_name)))
    }
}
