//! Admission rules configuration.
//!
//! Protected routes declare how many requests a caller may make within a
//! rolling window. Rules are loaded from YAML and looked up by route name
//! at the call site that guards the route.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{FloodgateError, Result};

/// A single admission rule: at most `limit` requests per `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Maximum admitted requests per window
    pub limit: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
}

impl RateLimitRule {
    /// Create a validated rule.
    pub fn new(limit: u32, window_ms: u64) -> Result<Self> {
        let rule = Self { limit, window_ms };
        rule.validate()?;
        Ok(rule)
    }

    /// The window as a [`Duration`].
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(FloodgateError::InvalidConfiguration(
                "limit must be positive".to_string(),
            ));
        }
        if self.window_ms == 0 {
            return Err(FloodgateError::InvalidConfiguration(
                "window must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A named collection of admission rules, keyed by route.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    /// Map of route name to its rule
    #[serde(default)]
    pub routes: HashMap<String, RateLimitRule>,
}

impl RuleSet {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load rules from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading admission rules");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load rules from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let rules: RuleSet = serde_yaml::from_str(yaml)
            .map_err(|e| FloodgateError::Config(format!("Failed to parse admission rules: {}", e)))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Get the rule for a route.
    pub fn get(&self, route: &str) -> Option<&RateLimitRule> {
        self.routes.get(route)
    }

    /// Add or replace the rule for a route.
    pub fn insert(&mut self, route: impl Into<String>, rule: RateLimitRule) {
        self.routes.insert(route.into(), rule);
    }

    fn validate(&self) -> Result<()> {
        for (route, rule) in &self.routes {
            rule.validate().map_err(|e| {
                FloodgateError::InvalidConfiguration(format!("route {}: {}", route, e))
            })?;
        }
        Ok(())
    }
}
