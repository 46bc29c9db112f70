// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Permission levels and the permission registry contract.
//!
//! A [`Permission`] binds a resource name (an action name such as
//! `write_file`, or a `prefix.*` pattern such as `deploy.*`) to the minimum
//! [`PermissionLevel`] required to run it. Lookups that match nothing resolve
//! to the configured fail-closed level.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::policy::SandboxMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    ReadOnly,
    Limited,
    Elevated,
    Full,
}

impl PermissionLevel {
    pub const ALL: [PermissionLevel; 4] = [
        PermissionLevel::ReadOnly,
        PermissionLevel::Limited,
        PermissionLevel::Elevated,
        PermissionLevel::Full,
    ];

    pub fn highest() -> Self {
        PermissionLevel::Full
    }

    pub fn lowest() -> Self {
        PermissionLevel::ReadOnly
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::ReadOnly => "read_only",
            PermissionLevel::Limited => "limited",
            PermissionLevel::Elevated => "elevated",
            PermissionLevel::Full => "full",
        }
    }
}

impl Default for PermissionLevel {
    fn default() -> Self {
        Self::highest()
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "read_only" | "readonly" => Ok(PermissionLevel::ReadOnly),
            "limited" => Ok(PermissionLevel::Limited),
            "elevated" => Ok(PermissionLevel::Elevated),
            "full" => Ok(PermissionLevel::Full),
            other => Err(format!("unknown permission level '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub resource: String,
    pub required_level: PermissionLevel,
    /// Restricted execution mode offered when the caller's level is too low.
    /// `None` means the action cannot be sandboxed and is blocked instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<SandboxMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Permission {
    pub fn new(resource: impl Into<String>, required_level: PermissionLevel) -> Self {
        Self {
            resource: resource.into(),
            required_level,
            sandbox: None,
            description: None,
        }
    }

    pub fn with_sandbox(mut self, mode: SandboxMode) -> Self {
        self.sandbox = Some(mode);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_pattern(&self) -> bool {
        self.resource.ends_with(".*")
    }

    /// Match specificity against an action name: exact matches beat every
    /// pattern, longer prefixes beat shorter ones.
    pub fn specificity(&self, action: &str) -> Option<usize> {
        if let Some(prefix) = self.resource.strip_suffix('*') {
            action.starts_with(prefix).then_some(prefix.len())
        } else {
            (self.resource == action).then_some(usize::MAX)
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let resource = self.resource.trim();
        if resource.is_empty() {
            return Err("resource name cannot be empty".to_string());
        }
        if resource.contains('*') && !(self.is_pattern() && resource.matches('*').count() == 1) {
            return Err(format!(
                "resource '{}' may only use a single trailing '.*' wildcard",
                self.resource
            ));
        }
        Ok(())
    }
}

/// Most specific permission covering `action`, if any.
pub fn resolve_permission<'a, I>(permissions: I, action: &str) -> Option<&'a Permission>
where
    I: IntoIterator<Item = &'a Permission>,
{
    permissions
        .into_iter()
        .filter_map(|p| p.specificity(action).map(|s| (s, p)))
        .max_by_key(|(s, _)| *s)
        .map(|(_, p)| p)
}

/// Registry of permissions, keyed by resource name. Saving replaces any
/// existing entry for the same resource.
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn save(&self, permission: Permission) -> Result<Option<Permission>>;
    async fn find_by_resource(&self, resource: &str) -> Result<Option<Permission>>;
    async fn resolve(&self, action: &str) -> Result<Option<Permission>>;
    async fn list_all(&self) -> Result<Vec<Permission>>;
}
