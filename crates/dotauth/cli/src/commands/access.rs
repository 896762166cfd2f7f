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

use super::CommandContext;
use anyhow::Result;
use dotauth_common::{AccessQuery, ResourceId, UserId};

pub async fn check(ctx: &CommandContext, user_id: UserId, resource_type: String, action: String, resource_id: Option<ResourceId>) -> Result<()> {
    let query = AccessQuery::new(user_id, resource_type, action).with_resource(resource_id);
    let allowed = ctx.service.check_permission(&query).await?;

    if ctx.json {
        println!("{}", serde_json::json!({ "query": query, "allowed": allowed }));
    } else {
        println!("{query}: {}", if allowed { "allowed" } else { "denied" });
    }
    Ok(())
}

/// Fails with the service's `Unauthorized` error when denied
pub async fn enforce(ctx: &CommandContext, user_id: UserId, resource_type: String, action: String, resource_id: Option<ResourceId>) -> Result<()> {
    let query = AccessQuery::new(user_id, resource_type, action).with_resource(resource_id);
    ctx.service.enforce_permission(&query).await?;
    println!("{query}: allowed");
    Ok(())
}
