// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::domain::permission::{resolve_permission, Permission, PermissionRepository};

/// Permission registry held in memory. Checks vastly outnumber
/// registrations, so reads share a lock and every critical section is a
/// single map operation.
#[derive(Default)]
pub struct InMemoryPermissionRepository {
    permissions: RwLock<HashMap<String, Permission>>,
}

impl InMemoryPermissionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionRepository for InMemoryPermissionRepository {
    async fn save(&self, permission: Permission) -> Result<Option<Permission>> {
        let mut guard = self.permissions.write();
        Ok(guard.insert(permission.resource.clone(), permission))
    }

    async fn find_by_resource(&self, resource: &str) -> Result<Option<Permission>> {
        Ok(self.permissions.read().get(resource).cloned())
    }

    async fn resolve(&self, action: &str) -> Result<Option<Permission>> {
        let guard = self.permissions.read();
        if let Some(exact) = guard.get(action) {
            return Ok(Some(exact.clone()));
        }
        Ok(resolve_permission(guard.values(), action).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Permission>> {
        let mut all: Vec<Permission> = self.permissions.read().values().cloned().collect();
        all.sort_by(|a, b| a.resource.cmp(&b.resource));
        Ok(all)
    }
}
