//! Error types for the E2E harness

use thiserror::Error;

use crate::fixture::FixtureStep;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Invalid dropdown option '{value}' for {field}")]
    InvalidOption { field: String, value: String },

    #[error("WebDriver session error: {0}")]
    Session(String),

    #[error("Scenario parse error: {0}")]
    ScenarioParse(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Hard check failed: {0}")]
    HardCheckFailed(String),

    #[error("Could not reach screen {0}")]
    ScreenUnreachable(String),

    #[error(
        "Fixture step {step} failed: {reason} (unresolved side effects: {})",
        format_unresolved(.unresolved)
    )]
    Fixture {
        step: FixtureStep,
        reason: String,
        unresolved: Vec<String>,
    },

    #[error("Dependency cycle between cases: {0}")]
    DependencyCycle(String),

    #[error("Case '{case}' depends on unknown case '{dependency}'")]
    UnknownDependency { case: String, dependency: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Domain error: {0}")]
    Domain(#[from] assetops_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

fn format_unresolved(effects: &[String]) -> String {
    if effects.is_empty() {
        "none".to_string()
    } else {
        effects.join(", ")
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
