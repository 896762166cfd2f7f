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
use crate::UserCommands;
use anyhow::Result;
use dotauth_common::{AssignUserPermissionInput, GrantDetail, PermissionWithRoleName};

pub async fn handle_user_command(ctx: &CommandContext, command: UserCommands) -> Result<()> {
    match command {
        UserCommands::SetRole { user_id, role_id } => {
            ctx.store.set_user_role(user_id, role_id)?;
            ctx.service.invalidate_user(user_id);
            ctx.save()?;
            match role_id {
                Some(role_id) => println!("User {user_id} now holds role {role_id}."),
                None => println!("User {user_id} no longer holds a role."),
            }
            Ok(())
        }
        UserCommands::Permissions { user_id, direct, role } => {
            if role {
                let permissions = ctx.service.get_user_role_permissions(user_id).await?;
                return ctx.emit(&permissions, |permissions| print_role_permissions(permissions));
            }

            let grants = if direct {
                ctx.service.get_user_direct_permissions(user_id).await?
            } else {
                ctx.service.get_user_permissions(user_id).await?
            };
            ctx.emit(&grants, |grants| print_grants(grants))
        }
        UserCommands::Grant {
            user_id,
            permission_id,
            resource_id,
        } => {
            let input = AssignUserPermissionInput {
                user_id,
                permission_id,
                resource_id,
            };
            let link = ctx.service.assign_permission_to_user(input).await?;
            ctx.save()?;
            ctx.emit(&link, |link| match link.resource_id {
                Some(resource_id) => println!("Permission {} granted to user {} on resource {} (link {})", link.permission_id, link.user_id, resource_id, link.id),
                None => println!("Permission {} granted to user {} (link {})", link.permission_id, link.user_id, link.id),
            })
        }
        UserCommands::Revoke { link_id } => {
            let link = ctx.service.get_user_permission(link_id).await?;
            ctx.service.remove_permission_from_user(link_id).await?;
            ctx.save()?;
            println!("Permission {} revoked from user {}.", link.permission_id, link.user_id);
            Ok(())
        }
    }
}

fn print_grants(grants: &[GrantDetail]) {
    if grants.is_empty() {
        println!("No permissions.");
        return;
    }

    println!("{:<8} {:<28} {:<16} {:<10} {:<10} {:<8}", "Link", "Permission", "Resource", "Action", "Scope", "Source");
    println!("{}", "-".repeat(84));
    for grant in grants {
        let scope = grant.resource_id.map_or_else(|| "*".to_string(), |id| id.to_string());
        let source = if grant.is_direct() { "direct" } else { "role" };
        println!(
            "{:<8} {:<28} {:<16} {:<10} {:<10} {:<8}",
            grant.id, grant.permission_name, grant.resource_type, grant.action, scope, source
        );
    }
}

fn print_role_permissions(permissions: &[PermissionWithRoleName]) {
    if permissions.is_empty() {
        println!("No role permissions.");
        return;
    }

    println!("{:<8} {:<28} {:<16} {:<10} {:<20}", "ID", "Permission", "Resource", "Action", "Role");
    println!("{}", "-".repeat(86));
    for entry in permissions {
        let permission = &entry.permission;
        println!(
            "{:<8} {:<28} {:<16} {:<10} {:<20}",
            permission.id, permission.name, permission.resource_type, permission.action, entry.role_name
        );
    }
}
