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

pub mod access;
pub mod permission;
pub mod role;
pub mod user;

use crate::config::CliConfig;
use anyhow::Result;
use dotauth_core::{AuthorizationService, MemoryStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

pub struct CommandContext {
    pub config: CliConfig,
    pub store: Arc<MemoryStore>,
    pub service: AuthorizationService,
    pub json: bool,
}

impl CommandContext {
    pub fn new(config: CliConfig, json: bool) -> Result<Self> {
        let store = Arc::new(MemoryStore::open(&config.data_file)?);
        debug!(data_file = %config.data_file.display(), "Opened authority snapshot");

        let service = AuthorizationService::new(store.clone(), config.authority.clone());
        Ok(Self { config, store, service, json })
    }

    /// Persist the store after a mutating command
    pub fn save(&self) -> Result<()> {
        self.store.save_snapshot(&self.config.data_file)?;
        debug!(data_file = %self.config.data_file.display(), "Saved authority snapshot");
        Ok(())
    }

    /// Print `value` as JSON when requested, otherwise run the table printer
    pub fn emit<T: Serialize>(&self, value: &T, table: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            table(value);
        }
        Ok(())
    }
}
