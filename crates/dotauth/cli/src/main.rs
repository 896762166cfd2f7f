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

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod config;

use crate::commands::CommandContext;
use crate::config::CliConfig;
use anyhow::Result;
use dotauth_common::{LinkId, PermissionId, ResourceId, RoleId, UserId};
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "dotauth", about = "Role-based access control administration")]
pub struct Cli {
    /// Path to configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Authority snapshot location (overrides $DOTAUTH_DATA_FILE)
    #[arg(long)]
    pub data_file: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for role management
#[derive(Subcommand, Debug)]
#[command(about = "Manage roles and their permissions")]
pub enum RoleCommands {
    /// List all roles
    List,
    /// Show a role by ID
    Get { role_id: RoleId },
    /// Create a new role
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Update name and/or description of a role
    Update {
        role_id: RoleId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a role and its permission links
    Delete { role_id: RoleId },
    /// List the permissions granted to a role
    Permissions { role_id: RoleId },
    /// Replace the permission set of a role
    SetPermissions { role_id: RoleId, permission_ids: Vec<PermissionId> },
    /// Grant one permission to a role
    Grant { role_id: RoleId, permission_id: PermissionId },
    /// Revoke one permission from a role
    Revoke { role_id: RoleId, permission_id: PermissionId },
}

/// Subcommands for permission management
#[derive(Subcommand, Debug)]
#[command(about = "Manage permissions")]
pub enum PermissionCommands {
    /// List permissions, optionally for one resource type
    List {
        #[arg(long)]
        resource_type: Option<String>,
    },
    /// Show a permission by ID
    Get { permission_id: PermissionId },
    /// Create a permission for an action on a resource type
    Create {
        name: String,
        resource_type: String,
        action: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Update fields of a permission
    Update {
        permission_id: PermissionId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        resource_type: Option<String>,
        #[arg(long)]
        action: Option<String>,
    },
    /// Delete a permission and every grant of it
    Delete { permission_id: PermissionId },
}

/// Subcommands for user roles and direct grants
#[derive(Subcommand, Debug)]
#[command(about = "Manage user roles and direct grants")]
pub enum UserCommands {
    /// Set or clear the role of a user
    SetRole {
        user_id: UserId,
        /// Role to assign; omit to clear
        #[arg(long)]
        role_id: Option<RoleId>,
    },
    /// List the effective grants of a user
    Permissions {
        user_id: UserId,
        /// Only direct grants
        #[arg(long, conflicts_with = "role")]
        direct: bool,
        /// Only permissions inherited through the role
        #[arg(long)]
        role: bool,
    },
    /// Grant a permission directly to a user
    Grant {
        user_id: UserId,
        permission_id: PermissionId,
        /// Limit the grant to one resource instance
        #[arg(long)]
        resource_id: Option<ResourceId>,
    },
    /// Remove a direct grant by link ID
    Revoke { link_id: LinkId },
}

/// Top-level commands for dotauth
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage roles
    Role {
        #[command(subcommand)]
        command: RoleCommands,
    },

    /// Manage permissions
    Permission {
        #[command(subcommand)]
        command: PermissionCommands,
    },

    /// Manage user roles and grants
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Report whether a user may perform an action
    Check {
        user_id: UserId,
        resource_type: String,
        action: String,
        #[arg(long)]
        resource_id: Option<ResourceId>,
    },

    /// Like check, but exit non-zero when denied
    Enforce {
        user_id: UserId,
        resource_type: String,
        action: String,
        #[arg(long)]
        resource_id: Option<ResourceId>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration
    let config = match CliConfig::resolve_config(cli.config, cli.data_file) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("dotauth: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt().with_max_level(config.max_level()).with_writer(std::io::stderr).init();

    match run(config, cli.json, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: CliConfig, json: bool, command: Commands) -> Result<()> {
    let ctx = CommandContext::new(config, json)?;

    // Dispatch commands
    match command {
        Commands::Role { command } => commands::role::handle_role_command(&ctx, command).await,
        Commands::Permission { command } => commands::permission::handle_permission_command(&ctx, command).await,
        Commands::User { command } => commands::user::handle_user_command(&ctx, command).await,
        Commands::Check {
            user_id,
            resource_type,
            action,
            resource_id,
        } => commands::access::check(&ctx, user_id, resource_type, action, resource_id).await,
        Commands::Enforce {
            user_id,
            resource_type,
            action,
            resource_id,
        } => commands::access::enforce(&ctx, user_id, resource_type, action, resource_id).await,
    }
}
