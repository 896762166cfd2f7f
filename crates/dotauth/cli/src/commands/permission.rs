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
use super::role::print_permissions;
use crate::PermissionCommands;
use anyhow::Result;
use dotauth_common::{CreatePermissionInput, UpdatePermissionInput};

pub async fn handle_permission_command(ctx: &CommandContext, command: PermissionCommands) -> Result<()> {
    match command {
        PermissionCommands::List { resource_type } => {
            let permissions = match resource_type {
                Some(resource_type) => ctx.service.list_permissions_by_resource_type(&resource_type).await?,
                None => ctx.service.list_permissions().await?,
            };
            ctx.emit(&permissions, |permissions| print_permissions(permissions))
        }
        PermissionCommands::Get { permission_id } => {
            let permission = ctx.service.get_permission(permission_id).await?;
            ctx.emit(&permission, |permission| print_permissions(std::slice::from_ref(permission)))
        }
        PermissionCommands::Create {
            name,
            resource_type,
            action,
            description,
        } => {
            let input = CreatePermissionInput::new(name, resource_type, action).with_description(description.unwrap_or_default());
            let permission = ctx.service.create_permission(input).await?;
            ctx.save()?;
            ctx.emit(&permission, |permission| println!("Permission {} created with ID {}", permission.key(), permission.id))
        }
        PermissionCommands::Update {
            permission_id,
            name,
            description,
            resource_type,
            action,
        } => {
            let input = UpdatePermissionInput {
                name,
                description,
                resource_type,
                action,
            };
            let permission = ctx.service.update_permission(permission_id, input).await?;
            ctx.save()?;
            ctx.emit(&permission, |permission| println!("Permission {} updated ({})", permission.id, permission.key()))
        }
        PermissionCommands::Delete { permission_id } => {
            ctx.service.delete_permission(permission_id).await?;
            ctx.save()?;
            println!("Permission {permission_id} deleted.");
            Ok(())
        }
    }
}
