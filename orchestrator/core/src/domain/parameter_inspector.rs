// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Parameter Inspector Domain Service
//!
//! Scans action parameters for path traversal, protected system paths and
//! destructive shell or SQL payloads. This is a domain service because what
//! counts as a dangerous argument is a safety rule, not a technical concern.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Produces violation and warning strings for the safety guard

use std::path::{Component, Path};

use once_cell::sync::Lazy;
use regex::Regex;

static DESTRUCTIVE: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)\brm\s+-(?:[a-z]*r[a-z]*f|[a-z]*f[a-z]*r)[a-z]*\b", "recursive forced delete"),
        (r"(?i)\bmkfs(?:\.\w+)?\b", "filesystem format"),
        (r"(?i)\bdd\s+if=", "raw disk write"),
        (r":\(\)\s*\{\s*:\|:&\s*\};:", "fork bomb"),
        (r"(?i)\bdrop\s+(?:table|database|schema)\b", "destructive SQL"),
        (r"(?i)\btruncate\s+table\b", "destructive SQL"),
        (r"(?i)\bchmod\s+-R\s+777\b", "world-writable permissions"),
        (r"(?i)\b(?:shutdown|reboot|halt)\b(?:\s+-[a-z]+|\s+now)", "host power control"),
    ]
    .into_iter()
    .filter_map(|(pattern, label)| Regex::new(pattern).ok().map(|re| (re, label)))
    .collect()
});

const PATH_KEYS: [&str; 8] = [
    "path", "file", "dir", "directory", "target", "source", "destination", "dest",
];

/// Result of inspecting one parameter list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inspection {
    pub violations: Vec<String>,
    pub warnings: Vec<String>,
}

/// Parameter inspector domain service
///
/// # Guarantees
/// - Rejects path-like values containing `..` components or null bytes
/// - Rejects values under protected system prefixes
/// - Rejects values matching known destructive command patterns
/// - Warns on wildcards in path-like values
#[derive(Debug, Clone)]
pub struct ParameterInspector {
    /// Maximum allowed value length (default: 4096)
    max_value_len: usize,
    protected_prefixes: Vec<String>,
}

impl ParameterInspector {
    pub fn new() -> Self {
        Self {
            max_value_len: 4096,
            protected_prefixes: ["/etc", "/boot", "/proc", "/sys", "/dev", "/root", "~/.ssh"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }

    pub fn with_max_length(mut self, max_value_len: usize) -> Self {
        self.max_value_len = max_value_len;
        self
    }

    pub fn with_protected_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.protected_prefixes.push(prefix.into());
        self
    }

    /// Inspect parameters in order. Output order follows parameter order so
    /// identical inputs always yield identical results.
    pub fn inspect(&self, parameters: &[(String, String)]) -> Inspection {
        let mut inspection = Inspection::default();

        for (key, value) in parameters {
            if value.len() > self.max_value_len {
                inspection.violations.push(format!(
                    "parameter '{key}' exceeds maximum length of {} bytes",
                    self.max_value_len
                ));
                continue;
            }
            if value.contains('\0') {
                inspection
                    .violations
                    .push(format!("parameter '{key}' contains a null byte"));
                continue;
            }

            if Self::is_path_like(key, value) {
                self.inspect_path(key, value, &mut inspection);
            }

            for (pattern, label) in DESTRUCTIVE.iter() {
                if pattern.is_match(value) {
                    tracing::warn!(parameter = %key, pattern = label, "Destructive payload detected");
                    inspection
                        .violations
                        .push(format!("parameter '{key}' contains a {label} command"));
                }
            }
        }

        inspection
    }

    fn is_path_like(key: &str, value: &str) -> bool {
        let key = key.to_lowercase();
        PATH_KEYS.iter().any(|k| key == *k || key.ends_with(&format!("_{k}")))
            || value.starts_with('/')
            || value.starts_with("~/")
            || value.starts_with("./")
            || value.starts_with("../")
    }

    fn inspect_path(&self, key: &str, value: &str, inspection: &mut Inspection) {
        if Path::new(value)
            .components()
            .any(|c| c == Component::ParentDir)
        {
            tracing::warn!(parameter = %key, path = %value, "Path traversal attempt detected");
            inspection
                .violations
                .push(format!("parameter '{key}' contains path traversal: {value}"));
        }

        if let Some(prefix) = self
            .protected_prefixes
            .iter()
            .find(|p| value == p.as_str() || value.starts_with(&format!("{p}/")))
        {
            inspection
                .violations
                .push(format!("parameter '{key}' targets protected path {prefix}"));
        }

        if value == "/" {
            inspection
                .violations
                .push(format!("parameter '{key}' targets the filesystem root"));
        }

        if value.contains('*') || value.contains('?') {
            inspection
                .warnings
                .push(format!("parameter '{key}' contains a wildcard and may match many files"));
        }
    }
}

impl Default for ParameterInspector {
    fn default() -> Self {
        Self::new()
    }
}
