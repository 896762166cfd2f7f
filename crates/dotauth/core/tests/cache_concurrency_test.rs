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

//! Decision cache behaviour under concurrent checks and mutations

use dotauth_core::common::{AccessQuery, AssignUserPermissionInput, CreatePermissionInput, CreateRoleInput};
use dotauth_core::{AuthorityConfig, AuthorizationService, MemoryStore, PermissionStore};
use futures::future::join_all;
use std::sync::Arc;

async fn clerk_service(users: i64) -> (AuthorizationService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let service = AuthorizationService::new(store.clone(), AuthorityConfig::default());

    let clerk = store.create_role(CreateRoleInput::new("Clerk", "")).await.unwrap();
    let view = store.create_permission(CreatePermissionInput::new("invoice.view", "invoice", "view")).await.unwrap();
    store.link_role_permission(clerk.id, view.id).await.unwrap();
    for user_id in 0..users {
        store.set_user_role(user_id, Some(clerk.id)).unwrap();
    }

    (service, store)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checks_agree() {
    let (service, _) = clerk_service(50).await;

    let handles: Vec<_> = (0..500)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                let user_id = i % 50;
                let view = service.check_permission(&AccessQuery::new(user_id, "invoice", "view")).await.unwrap();
                let delete = service.check_permission(&AccessQuery::new(user_id, "invoice", "delete")).await.unwrap();
                (view, delete)
            })
        })
        .collect();

    for result in join_all(handles).await {
        assert_eq!(result.unwrap(), (true, false));
    }

    let stats = service.cache_stats();
    assert_eq!(stats.cached_users, 50);
    assert_eq!(stats.cached_decisions, 100);
    assert_eq!(stats.hits + stats.misses, 1000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_grant_is_visible_after_concurrent_checks() {
    let (service, store) = clerk_service(10).await;
    let delete = store.create_permission(CreatePermissionInput::new("invoice.delete", "invoice", "delete")).await.unwrap();

    let readers: Vec<_> = (0..200)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move { service.check_permission(&AccessQuery::new(i % 10, "invoice", "delete").on(42)).await.unwrap() })
        })
        .collect();
    let writer = {
        let service = service.clone();
        tokio::spawn(async move { service.assign_permission_to_user(AssignUserPermissionInput::scoped(3, delete.id, 42)).await.unwrap() })
    };

    join_all(readers).await.into_iter().for_each(|result| {
        result.unwrap();
    });
    writer.await.unwrap();

    // Whatever interleaving happened, the decision after the write returns must reflect it.
    assert!(service.check_permission(&AccessQuery::new(3, "invoice", "delete").on(42)).await.unwrap());
    assert!(!service.check_permission(&AccessQuery::new(4, "invoice", "delete").on(42)).await.unwrap());
}

#[tokio::test]
async fn test_role_change_requires_user_invalidation() {
    let (service, store) = clerk_service(1).await;
    let auditor = store.create_role(CreateRoleInput::new("Auditor", "")).await.unwrap();
    let query = AccessQuery::new(0, "invoice", "view");
    assert!(service.check_permission(&query).await.unwrap());

    store.set_user_role(0, Some(auditor.id)).unwrap();
    service.invalidate_user(0);

    assert!(!service.check_permission(&query).await.unwrap());
}

#[tokio::test]
async fn test_clear_cache_forces_recompute() {
    let (service, _) = clerk_service(3).await;
    for user_id in 0..3 {
        service.check_permission(&AccessQuery::new(user_id, "invoice", "view")).await.unwrap();
    }
    assert_eq!(service.cache().len(), 3);

    service.clear_cache();
    assert!(service.cache().is_empty());

    service.check_permission(&AccessQuery::new(0, "invoice", "view")).await.unwrap();
    let stats = service.cache_stats();
    assert_eq!(stats.misses, 4);
    assert_eq!(stats.invalidations, 1);
}
