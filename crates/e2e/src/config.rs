//! Harness configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//! A few knobs can be overridden from the environment for CI runs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::appium::AppiumConfig;
use crate::error::{E2eError, E2eResult};
use crate::fixture::FixtureConfig;
use crate::poll::RetryBudget;
use crate::wait::WaitPolicy;

/// Multiplier applied to every wait tier
pub const ENV_WAIT_SCALE: &str = "ASSETOPS_WAIT_SCALE";
/// Navigation attempts per screen
pub const ENV_NAV_ATTEMPTS: &str = "ASSETOPS_NAV_ATTEMPTS";
/// Appium server URL
pub const ENV_APPIUM_URL: &str = "ASSETOPS_APPIUM_URL";
/// Results directory
pub const ENV_OUTPUT_DIR: &str = "ASSETOPS_OUTPUT_DIR";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub waits: WaitPolicy,
    pub navigation: RetryBudget,
    pub fixture: FixtureConfig,
    pub report: ReportConfig,
    pub driver: DriverConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory holding scenario YAML files
    pub scenarios_dir: PathBuf,
    /// Directory receiving test-results.json
    pub output_dir: PathBuf,
    /// Whether skipped verifications mark a case as degraded
    pub skips_degrade: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            scenarios_dir: PathBuf::from("scenarios"),
            output_dir: PathBuf::from("test-results"),
            skips_degrade: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// In-process simulated application
    #[default]
    Sim,
    /// Appium server over the WebDriver protocol
    Appium,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub kind: DriverKind,
    pub appium: AppiumConfig,
}

impl HarnessConfig {
    pub fn from_toml(content: &str) -> E2eResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, then apply environment overrides
    pub fn load(path: &Path) -> E2eResult<Self> {
        debug!("Loading config from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> E2eResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> E2eResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_WAIT_SCALE) {
            let factor: f64 = raw
                .parse()
                .map_err(|_| E2eError::Config(format!("{ENV_WAIT_SCALE}: not a number: {raw}")))?;
            self.waits = self.waits.scaled(factor);
        }
        if let Some(raw) = lookup(ENV_NAV_ATTEMPTS) {
            self.navigation.attempts = raw
                .parse()
                .map_err(|_| E2eError::Config(format!("{ENV_NAV_ATTEMPTS}: not a count: {raw}")))?;
        }
        if let Some(url) = lookup(ENV_APPIUM_URL) {
            self.driver.appium.url = url;
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.report.output_dir = PathBuf::from(dir);
        }
        self.validate()
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.navigation.attempts == 0 {
            return Err(E2eError::Config(
                "navigation.attempts must be at least 1".to_string(),
            ));
        }
        if !self.waits.is_ordered() {
            return Err(E2eError::Config(format!(
                "wait tiers must not decrease: short {} ms, medium {} ms, long {} ms",
                self.waits.short_ms, self.waits.medium_ms, self.waits.long_ms
            )));
        }
        if self.fixture.name_prefix.trim().is_empty() {
            return Err(E2eError::Config("fixture.name_prefix must not be empty".to_string()));
        }
        Ok(())
    }
}
