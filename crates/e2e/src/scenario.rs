//! Declarative YAML scenarios
//!
//! One file per case. Steps run in order against a [`Harness`]; expectation
//! steps record into the case's [`ExpectationRecorder`] and a failed hard
//! expectation ends the case.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use assetops_common::{salted_term, AssetClass, Control, Field, Query, ScreenId, ScrollDirection};

use crate::driver::UiDriver;
use crate::error::{E2eError, E2eResult};
use crate::expect::{ExpectationRecorder, Severity};
use crate::fixture::ParentRef;
use crate::harness::Harness;
use crate::screen::Screen;
use crate::wait::WaitTier;

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique case name
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,

    /// Lower runs first among cases whose dependencies are met
    #[serde(default)]
    pub priority: i32,

    /// Cases that must pass before this one runs
    #[serde(default)]
    pub depends_on: Vec<String>,

    pub steps: Vec<ScenarioStep>,
}

/// A single scenario step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Navigate to a screen and record whether it was reached
    EnsureScreen {
        screen: ScreenId,
        #[serde(default)]
        severity: Severity,
    },

    /// Open an asset's details from the asset list
    OpenAsset { name: String },

    /// Run the link-setup fixture for a parent
    EnsureLinkable { parent: String, class: AssetClass },

    Tap {
        #[serde(with = "serde_yaml::with::singleton_map")]
        control: Control,
        /// Settle time after the tap
        #[serde(default)]
        wait: Option<WaitTier>,
    },

    EnterText {
        #[serde(with = "serde_yaml::with::singleton_map")]
        field: Field,
        value: String,
    },

    Select {
        #[serde(with = "serde_yaml::with::singleton_map")]
        field: Field,
        value: String,
    },

    Scroll { direction: ScrollDirection },

    Wait {
        #[serde(default)]
        tier: WaitTier,
    },

    /// Enter a search term on the asset list; `salt` makes it unmatchable
    Search {
        term: String,
        #[serde(default)]
        salt: bool,
    },

    ExpectScreen {
        screen: ScreenId,
        #[serde(default)]
        severity: Severity,
    },

    ExpectCount {
        query: Query,
        #[serde(default)]
        equals: Option<usize>,
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
        #[serde(default)]
        severity: Severity,
    },

    ExpectText {
        #[serde(with = "serde_yaml::with::singleton_map")]
        field: Field,
        #[serde(default)]
        equals: Option<String>,
        #[serde(default)]
        contains: Option<String>,
        #[serde(default)]
        severity: Severity,
    },

    /// The dropdown offers exactly these options, in any order
    ExpectOptions {
        #[serde(with = "serde_yaml::with::singleton_map")]
        field: Field,
        options: Vec<String>,
        #[serde(default)]
        severity: Severity,
    },

    /// Every declared sub-element of the screen is visible
    ExpectElements {
        screen: ScreenId,
        #[serde(default)]
        severity: Severity,
    },

    /// Stop the case with a skipped verification when too few rows exist
    SkipUnlessCount {
        query: Query,
        #[serde(default = "default_min_rows")]
        min: usize,
        reason: String,
    },

    Log { message: String },
}

fn default_min_rows() -> usize {
    1
}

/// Whether the case continues after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepFlow {
    Continue,
    Stop,
}

impl ScenarioStep {
    /// Short label used in logs and errors
    pub fn label(&self) -> String {
        match self {
            ScenarioStep::EnsureScreen { screen, .. } => format!("ensure_screen {screen}"),
            ScenarioStep::OpenAsset { name } => format!("open_asset {name}"),
            ScenarioStep::EnsureLinkable { parent, .. } => format!("ensure_linkable {parent}"),
            ScenarioStep::Tap { control, .. } => format!("tap {control}"),
            ScenarioStep::EnterText { field, .. } => format!("enter_text {field}"),
            ScenarioStep::Select { field, value } => format!("select {field}={value}"),
            ScenarioStep::Scroll { direction } => format!("scroll {direction:?}"),
            ScenarioStep::Wait { tier } => format!("wait {tier:?}"),
            ScenarioStep::Search { term, .. } => format!("search {term}"),
            ScenarioStep::ExpectScreen { screen, .. } => format!("expect_screen {screen}"),
            ScenarioStep::ExpectCount { query, .. } => format!("expect_count {query}"),
            ScenarioStep::ExpectText { field, .. } => format!("expect_text {field}"),
            ScenarioStep::ExpectOptions { field, .. } => format!("expect_options {field}"),
            ScenarioStep::ExpectElements { screen, .. } => format!("expect_elements {screen}"),
            ScenarioStep::SkipUnlessCount { query, .. } => format!("skip_unless_count {query}"),
            ScenarioStep::Log { .. } => "log".to_string(),
        }
    }

    pub async fn execute<D: UiDriver + ?Sized>(
        &self,
        harness: &Harness<D>,
        recorder: &mut ExpectationRecorder,
    ) -> E2eResult<StepFlow> {
        let driver = harness.driver();
        let nav = harness.navigator();

        match self {
            ScenarioStep::EnsureScreen { screen, severity } => {
                let reached = harness.ensure_on_screen(*screen).await?;
                recorder.record(format!("reached {screen}"), *severity, reached)?;
            }
            ScenarioStep::OpenAsset { name } => {
                nav.require(ScreenId::AssetList).await?;
                driver.open_asset(name).await?;
                harness.short_wait().await;
                nav.require(ScreenId::AssetDetails).await?;
            }
            ScenarioStep::EnsureLinkable { parent, class } => {
                let report = harness
                    .ensure_linkable_node_available(&ParentRef::new(parent.clone(), *class))
                    .await?;
                match report.linkable {
                    Some(n) => recorder.hard(format!("linkable nodes under {parent}"), n)?,
                    None => {
                        recorder.hard(format!("'{}' unlinked from {parent}", report.child), true)?
                    }
                }
            }
            ScenarioStep::Tap { control, wait } => {
                driver.tap(control).await?;
                if let Some(tier) = wait {
                    harness.wait(*tier).await;
                }
            }
            ScenarioStep::EnterText { field, value } => driver.enter_text(field, value).await?,
            ScenarioStep::Select { field, value } => {
                driver.select_from_dropdown(field, value).await?
            }
            ScenarioStep::Scroll { direction } => driver.scroll(*direction).await?,
            ScenarioStep::Wait { tier } => harness.wait(*tier).await,
            ScenarioStep::Search { term, salt } => {
                nav.require(ScreenId::AssetList).await?;
                let term = if *salt { salted_term(term) } else { term.clone() };
                debug!(%term, "Searching assets");
                driver.enter_text(&Field::Search, &term).await?;
                harness.short_wait().await;
            }
            ScenarioStep::ExpectScreen { screen, severity } => {
                let shown = driver.is_displayed(*screen).await?;
                recorder.record(format!("{screen} displayed"), *severity, shown)?;
            }
            ScenarioStep::ExpectCount {
                query,
                equals,
                min,
                max,
                severity,
            } => {
                let count = driver.count(*query).await?;
                let ok = equals.map_or(true, |n| count == n)
                    && min.map_or(true, |n| count >= n)
                    && max.map_or(true, |n| count <= n);
                recorder.record(
                    format!("{query} count {count} (equals {equals:?}, min {min:?}, max {max:?})"),
                    *severity,
                    ok,
                )?;
            }
            ScenarioStep::ExpectText {
                field,
                equals,
                contains,
                severity,
            } => {
                let text = driver.read_text(field).await?;
                let ok = match (equals, contains) {
                    (Some(expected), _) => &text == expected,
                    (None, Some(part)) => text.contains(part.as_str()),
                    (None, None) => !text.trim().is_empty(),
                };
                recorder.record(format!("{field} reads {text:?}"), *severity, ok)?;
            }
            ScenarioStep::ExpectOptions {
                field,
                options,
                severity,
            } => {
                let mut offered = driver.dropdown_options(field).await?;
                let mut expected = options.clone();
                offered.sort();
                expected.sort();
                recorder.record(
                    format!("{field} offers {offered:?}"),
                    *severity,
                    offered == expected,
                )?;
            }
            ScenarioStep::ExpectElements { screen, severity } => {
                let check = nav.verify(&Screen::of(*screen)).await?;
                recorder.record(
                    format!("{screen} elements (missing {:?})", check.missing),
                    *severity,
                    check.is_complete(),
                )?;
            }
            ScenarioStep::SkipUnlessCount { query, min, reason } => {
                let count = driver.count(*query).await?;
                if count < *min {
                    recorder.skip(format!("{query} count {count} below {min}"), reason.clone());
                    return Ok(StepFlow::Stop);
                }
            }
            ScenarioStep::Log { message } => info!(case = recorder.case(), "{}", message),
        }
        Ok(StepFlow::Continue)
    }
}

impl Scenario {
    /// Parse a scenario from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let scenario: Self = serde_yaml::from_str(yaml)?;
        if scenario.name.trim().is_empty() {
            return Err(E2eError::ScenarioParse("scenario name is empty".to_string()));
        }
        if scenario.depends_on.contains(&scenario.name) {
            return Err(E2eError::DependencyCycle(scenario.name));
        }
        Ok(scenario)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::ScenarioParse(format!("{}: {e}", path.display())))
    }

    /// Load all scenarios from a directory, sorted by file path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        let scenarios = paths
            .iter()
            .map(|path| Self::from_file(path))
            .collect::<E2eResult<Vec<_>>>()?;

        let mut seen = std::collections::HashSet::new();
        for scenario in &scenarios {
            if !seen.insert(scenario.name.as_str()) {
                return Err(E2eError::ScenarioParse(format!(
                    "duplicate scenario name '{}'",
                    scenario.name
                )));
            }
        }
        Ok(scenarios)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Run every step; the first error ends the case
    pub async fn run<D: UiDriver + ?Sized>(
        &self,
        harness: &Harness<D>,
        recorder: &mut ExpectationRecorder,
    ) -> E2eResult<()> {
        for (index, step) in self.steps.iter().enumerate() {
            debug!(case = %self.name, step = index + 1, action = %step.label(), "Executing step");
            match step.execute(harness, recorder).await {
                Ok(StepFlow::Continue) => {}
                Ok(StepFlow::Stop) => {
                    info!(case = %self.name, step = index + 1, "Case stopped early");
                    break;
                }
                Err(err @ (E2eError::HardCheckFailed(_) | E2eError::Fixture { .. })) => {
                    return Err(err)
                }
                Err(err) => {
                    return Err(E2eError::StepFailed {
                        step: format!("{} ({})", index + 1, step.label()),
                        reason: err.to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}
