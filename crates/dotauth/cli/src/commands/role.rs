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
use crate::RoleCommands;
use anyhow::Result;
use dotauth_common::{CreateRoleInput, Permission, Role, UpdateRoleInput};

pub async fn handle_role_command(ctx: &CommandContext, command: RoleCommands) -> Result<()> {
    match command {
        RoleCommands::List => {
            let roles = ctx.service.list_roles().await?;
            ctx.emit(&roles, |roles| print_roles(roles))
        }
        RoleCommands::Get { role_id } => {
            let role = ctx.service.get_role(role_id).await?;
            ctx.emit(&role, |role| print_roles(std::slice::from_ref(role)))
        }
        RoleCommands::Create { name, description } => {
            let role = ctx.service.create_role(CreateRoleInput::new(name, description.unwrap_or_default())).await?;
            ctx.save()?;
            ctx.emit(&role, |role| println!("Role {} created with ID {}", role.name, role.id))
        }
        RoleCommands::Update { role_id, name, description } => {
            let role = ctx.service.update_role(role_id, UpdateRoleInput { name, description }).await?;
            ctx.save()?;
            ctx.emit(&role, |role| println!("Role {} updated", role.id))
        }
        RoleCommands::Delete { role_id } => {
            ctx.service.delete_role(role_id).await?;
            ctx.save()?;
            println!("Role {role_id} deleted.");
            Ok(())
        }
        RoleCommands::Permissions { role_id } => {
            let permissions = ctx.service.get_role_permissions(role_id).await?;
            ctx.emit(&permissions, |permissions| print_permissions(permissions))
        }
        RoleCommands::SetPermissions { role_id, permission_ids } => {
            ctx.service.update_role_permissions(role_id, &permission_ids).await?;
            ctx.save()?;
            println!("Role {role_id} now has {} permission(s).", ctx.service.get_role_permissions(role_id).await?.len());
            Ok(())
        }
        RoleCommands::Grant { role_id, permission_id } => {
            ctx.service.assign_permission_to_role(role_id, permission_id).await?;
            ctx.save()?;
            println!("Permission {permission_id} granted to role {role_id}.");
            Ok(())
        }
        RoleCommands::Revoke { role_id, permission_id } => {
            ctx.service.remove_permission_from_role(role_id, permission_id).await?;
            ctx.save()?;
            println!("Permission {permission_id} revoked from role {role_id}.");
            Ok(())
        }
    }
}

fn print_roles(roles: &[Role]) {
    if roles.is_empty() {
        println!("No roles defined.");
        return;
    }

    println!("{:<8} {:<24} {:<40} {:<20}", "ID", "Name", "Description", "Updated");
    println!("{}", "-".repeat(92));
    for role in roles {
        println!("{:<8} {:<24} {:<40} {:<20}", role.id, role.name, role.description, role.updated_at.format("%Y-%m-%d %H:%M:%S"));
    }
}

pub(crate) fn print_permissions(permissions: &[Permission]) {
    if permissions.is_empty() {
        println!("No permissions.");
        return;
    }

    println!("{:<8} {:<28} {:<16} {:<10} {:<30}", "ID", "Name", "Resource", "Action", "Description");
    println!("{}", "-".repeat(92));
    for permission in permissions {
        println!(
            "{:<8} {:<28} {:<16} {:<10} {:<30}",
            permission.id, permission.name, permission.resource_type, permission.action, permission.description
        );
    }
}
