// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Governance Configuration Types
//
// Defines the configuration schema for the governance layer:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Uncertainty routing thresholds and the retry ceiling
// - Fail-closed permission level and sandbox resource limits
// - Skill extraction and memory retention settings

use praetor_cortex::application::memory_pruner::MAX_RETENTION_DAYS;
use praetor_cortex::application::{MemoryPrunerConfig, SkillRegistryConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::permission::PermissionLevel;
use super::policy::ResourceLimits;

pub const API_VERSION: &str = "100monkeys.ai/v1";
pub const KIND: &str = "GovernanceConfig";

/// Top-level Kubernetes-style governance configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfigManifest {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "GovernanceConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: GovernanceConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernanceConfigSpec {
    #[serde(default)]
    pub uncertainty: UncertaintyConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub skills: SkillsConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub approval: ApprovalConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UncertaintyConfig {
    /// Confidence at or above which a task proceeds directly
    pub acceptance_threshold: f64,
    /// Lower bound of the gather-context / conservative band
    pub decompose_threshold: f64,
    /// Below this confidence the router asks a human for clarification
    pub clarification_threshold: f64,
    /// Attempts at which escalation to a human becomes mandatory
    pub max_attempts: u32,
    /// Assessed risk at or above which human oversight is required
    pub high_risk_threshold: f64,
}

impl Default for UncertaintyConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.7,
            decompose_threshold: 0.5,
            clarification_threshold: 0.3,
            max_attempts: 3,
            high_risk_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Level required by actions with no registered permission
    pub fail_closed_level: PermissionLevel,
    /// Limits applied to sandboxed steps
    pub sandbox_limits: ResourceLimits,
    /// Seed the registry with the built-in permission table
    pub default_permissions: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            fail_closed_level: PermissionLevel::highest(),
            sandbox_limits: ResourceLimits::default(),
            default_permissions: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsConfig {
    pub registry: SkillRegistryConfig,
    /// Minimum verified quality for a success to become a skill
    pub extraction_quality_floor: f64,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            registry: SkillRegistryConfig::default(),
            extraction_quality_floor: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub pruner: MemoryPrunerConfig,
    /// Attempts at storing an experience before the loop gives up
    pub max_record_attempts: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            pruner: MemoryPrunerConfig::default(),
            max_record_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Seconds to wait for a human decision before rejecting
    pub timeout_seconds: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self { timeout_seconds: 300 }
    }
}

impl Default for GovernanceConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "praetor".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: GovernanceConfigSpec::default(),
        }
    }
}

impl GovernanceConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. PRAETOR_CONFIG_PATH environment variable
    /// 2. ./praetor-config.yaml (working directory)
    /// 3. ~/.praetor/config.yaml (user home)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("PRAETOR_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./praetor-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".praetor").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default.
    /// The result is validated after env overrides are applied.
    pub fn load_or_default(explicit_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            tracing::info!("Loading governance configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load governance config at {:?}: {}", path, e)
            })?
        } else if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading governance configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!("No governance configuration found in standard locations. Using defaults.");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Invalid values are
    /// logged and ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("PRAETOR_MIN_CONFIDENCE") {
            match val.trim().parse::<f64>() {
                Ok(threshold) if (0.0..=1.0).contains(&threshold) => {
                    tracing::info!("Environment override: PRAETOR_MIN_CONFIDENCE={}", threshold);
                    self.spec.uncertainty.acceptance_threshold = threshold;
                }
                _ => tracing::warn!(
                    "Invalid value for PRAETOR_MIN_CONFIDENCE: '{}'. Expected a number in [0, 1]. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("PRAETOR_MAX_ATTEMPTS") {
            match val.trim().parse::<u32>() {
                Ok(attempts) if attempts > 0 => {
                    tracing::info!("Environment override: PRAETOR_MAX_ATTEMPTS={}", attempts);
                    self.spec.uncertainty.max_attempts = attempts;
                }
                _ => tracing::warn!(
                    "Invalid value for PRAETOR_MAX_ATTEMPTS: '{}'. Expected a positive integer. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("PRAETOR_FAIL_CLOSED_LEVEL") {
            match val.parse::<PermissionLevel>() {
                Ok(level) => {
                    tracing::info!("Environment override: PRAETOR_FAIL_CLOSED_LEVEL={}", level);
                    self.spec.safety.fail_closed_level = level;
                }
                Err(e) => tracing::warn!(
                    "Invalid value for PRAETOR_FAIL_CLOSED_LEVEL: '{}' ({}). Ignoring.",
                    val,
                    e
                ),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let u = &self.spec.uncertainty;
        for (name, value) in [
            ("acceptance_threshold", u.acceptance_threshold),
            ("decompose_threshold", u.decompose_threshold),
            ("clarification_threshold", u.clarification_threshold),
            ("high_risk_threshold", u.high_risk_threshold),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                anyhow::bail!("spec.uncertainty.{} must be within [0, 1], got {}", name, value);
            }
        }

        if !(u.clarification_threshold <= u.decompose_threshold
            && u.decompose_threshold <= u.acceptance_threshold)
        {
            anyhow::bail!(
                "spec.uncertainty thresholds must satisfy clarification <= decompose <= acceptance"
            );
        }

        if u.max_attempts == 0 {
            anyhow::bail!("spec.uncertainty.max_attempts must be at least 1");
        }

        let floor = self.spec.skills.extraction_quality_floor;
        if !(0.0..=1.0).contains(&floor) {
            anyhow::bail!("spec.skills.extraction_quality_floor must be within [0, 1], got {}", floor);
        }

        if self.spec.skills.registry.max_conflict_retries == 0 {
            anyhow::bail!("spec.skills.registry.max_conflict_retries must be at least 1");
        }

        if self.spec.memory.max_record_attempts == 0 {
            anyhow::bail!("spec.memory.max_record_attempts must be at least 1");
        }

        if self.spec.memory.pruner.enabled && self.spec.memory.pruner.retention_days <= 0 {
            anyhow::bail!("spec.memory.pruner.retention_days must be positive when pruning is enabled");
        }

        if self.spec.memory.pruner.retention_days > MAX_RETENTION_DAYS {
            anyhow::bail!(
                "spec.memory.pruner.retention_days must not exceed {}",
                MAX_RETENTION_DAYS
            );
        }

        Ok(())
    }
}
