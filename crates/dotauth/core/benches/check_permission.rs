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

//! Benchmarks for permission checks with and without the decision cache

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use dotauth_core::common::{AccessQuery, AssignUserPermissionInput, CreatePermissionInput, CreateRoleInput};
use dotauth_core::{AuthorityConfig, AuthorizationService, MemoryStore, PermissionStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

const USERS: i64 = 1000;

fn create_benchmark_service(runtime: &Runtime, cache_enabled: bool) -> AuthorizationService {
    runtime.block_on(async {
        let store = Arc::new(MemoryStore::new());
        let clerk = store.create_role(CreateRoleInput::new("Clerk", "")).await.unwrap();

        for resource_type in ["customer", "container", "product", "invoice"] {
            for action in ["view", "create", "update", "delete"] {
                let permission = store.create_permission(CreatePermissionInput::new(format!("{resource_type}.{action}"), resource_type, action)).await.unwrap();
                if action == "view" {
                    store.link_role_permission(clerk.id, permission.id).await.unwrap();
                }
                if action == "delete" {
                    for user_id in (0..USERS).step_by(10) {
                        store.link_user_permission(AssignUserPermissionInput::scoped(user_id, permission.id, user_id)).await.unwrap();
                    }
                }
            }
        }
        for user_id in 0..USERS {
            store.set_user_role(user_id, Some(clerk.id)).unwrap();
        }

        let config = AuthorityConfig {
            cache_enabled,
            audit_checks: false,
            ..AuthorityConfig::default()
        };
        AuthorizationService::new(store, config)
    })
}

fn bench_check_permission(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();

    let mut group = c.benchmark_group("check_permission");
    group.measurement_time(Duration::from_secs(5));

    for cache_enabled in [true, false] {
        let service = create_benchmark_service(&runtime, cache_enabled);
        let label = if cache_enabled { "cached" } else { "uncached" };

        group.bench_with_input(BenchmarkId::new("role_tier", label), &service, |b, service| {
            let mut user_id = 0;
            b.to_async(&runtime).iter(|| {
                user_id = (user_id + 1) % USERS;
                let query = AccessQuery::new(user_id, "invoice", "view");
                async move { black_box(service.check_permission(&query).await.unwrap()) }
            });
        });

        group.bench_with_input(BenchmarkId::new("scoped_tier", label), &service, |b, service| {
            let mut user_id = 0;
            b.to_async(&runtime).iter(|| {
                user_id = (user_id + 10) % USERS;
                let query = AccessQuery::new(user_id, "invoice", "delete").on(user_id);
                async move { black_box(service.check_permission(&query).await.unwrap()) }
            });
        });
    }

    group.finish();
}

fn bench_invalidation(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let service = create_benchmark_service(&runtime, true);

    c.bench_function("check_after_user_invalidation", |b| {
        b.to_async(&runtime).iter(|| async {
            service.invalidate_user(1);
            black_box(service.check_permission(&AccessQuery::new(1, "customer", "view")).await.unwrap())
        });
    });
}

criterion_group!(benches, bench_check_permission, bench_invalidation);
criterion_main!(benches);
