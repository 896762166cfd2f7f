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

//! Role-based access-control authority
//!
//! Decides whether a user may perform an action on a resource type, or on one
//! instance of it, from direct grants and the permissions of the user's role.
//! Decisions are memoized per user and invalidated by every mutation that can
//! change them.

pub mod audit;
pub mod cache;
pub mod config;
pub mod gate;
pub mod resolver;
pub mod service;
pub mod store;

pub use audit::{AuditEvent, AuditEventType, AuditLogger, AuditResult, AuditStatistics};
pub use cache::{CacheStats, DecisionCache};
pub use config::AuthorityConfig;
pub use gate::{BodyPermissionGate, BodyRequirement, PermissionGate, Principal, RoleGate};
pub use resolver::{GrantTier, Resolution};
pub use service::{AuthorityHealthStatus, AuthorizationService};
pub use store::{MemoryStore, PermissionStore};

pub use dotauth_common as common;
