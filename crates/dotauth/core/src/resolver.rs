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

//! Three-tier permission resolution
//!
//! A query is granted by the first tier that matches:
//!
//! 1. a direct grant scoped to the requested resource instance,
//! 2. a general direct grant for the resource type,
//! 3. a permission inherited through the user's role.
//!
//! Grants are additive only. Missing a scoped grant never denies, it just
//! falls through to the broader tiers. The wildcard action `all` satisfies
//! any requested action in every tier.

use crate::store::PermissionStore;
use dotauth_common::{AccessQuery, AuthzResult, GrantDetail, Permission};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Tier that granted a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantTier {
    /// Direct grant scoped to the requested resource instance
    ScopedDirect,
    /// Direct grant covering every instance of the resource type
    GeneralDirect,
    /// Permission inherited through the user's role
    Role,
}

impl fmt::Display for GrantTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantTier::ScopedDirect => write!(f, "scoped_direct"),
            GrantTier::GeneralDirect => write!(f, "general_direct"),
            GrantTier::Role => write!(f, "role"),
        }
    }
}

/// Outcome of resolving a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Tier that matched, `None` when every tier failed
    pub granted_by: Option<GrantTier>,
}

impl Resolution {
    pub fn granted(tier: GrantTier) -> Self {
        Self { granted_by: Some(tier) }
    }

    pub fn denied() -> Self {
        Self { granted_by: None }
    }

    pub fn is_granted(&self) -> bool {
        self.granted_by.is_some()
    }
}

/// Match a query against a user's direct grants (tiers 1 and 2)
pub fn match_direct(query: &AccessQuery, direct_grants: &[GrantDetail]) -> Option<GrantTier> {
    let covers = |grant: &GrantDetail| grant.grants(&query.resource_type, &query.action);

    if let Some(resource_id) = query.resource_id {
        if direct_grants.iter().any(|grant| grant.resource_id == Some(resource_id) && covers(grant)) {
            return Some(GrantTier::ScopedDirect);
        }
    }

    if direct_grants.iter().any(|grant| grant.resource_id.is_none() && covers(grant)) {
        return Some(GrantTier::GeneralDirect);
    }

    None
}

/// Match a query against the permissions of the user's role (tier 3)
pub fn match_role(query: &AccessQuery, role_permissions: &[Permission]) -> Option<GrantTier> {
    role_permissions
        .iter()
        .any(|permission| permission.grants(&query.resource_type, &query.action))
        .then_some(GrantTier::Role)
}

/// Decide a query from already fetched grant data
pub fn decide(query: &AccessQuery, direct_grants: &[GrantDetail], role_permissions: &[Permission]) -> Resolution {
    Resolution {
        granted_by: match_direct(query, direct_grants).or_else(|| match_role(query, role_permissions)),
    }
}

/// Resolve a query against a store. Role grants are only fetched when the
/// direct tiers fail; a user without a role skips tier 3.
pub async fn resolve<S>(store: &S, query: &AccessQuery) -> AuthzResult<Resolution>
where
    S: PermissionStore + ?Sized,
{
    let direct_grants = store.list_user_direct_permissions(query.user_id).await?;

    if let Some(tier) = match_direct(query, &direct_grants) {
        debug!(user_id = %query.user_id, resource_type = %query.resource_type, action = %query.action, tier = %tier, "Permission resolved");
        return Ok(Resolution::granted(tier));
    }

    let Some(role_id) = store.user_role(query.user_id).await? else {
        debug!(user_id = %query.user_id, "User has no role, skipping role tier");
        return Ok(Resolution::denied());
    };

    let role_permissions = store.list_role_permissions(role_id).await?;
    let resolution = Resolution {
        granted_by: match_role(query, &role_permissions),
    };

    debug!(
        user_id = %query.user_id,
        role_id = %role_id,
        resource_type = %query.resource_type,
        action = %query.action,
        granted = %resolution.is_granted(),
        "Permission resolved"
    );

    Ok(resolution)
}
