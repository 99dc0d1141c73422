//! Suite runner: orders cases by dependency and priority, runs them against
//! one shared driver session and aggregates their statuses

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::driver::UiDriver;
use crate::error::{E2eError, E2eResult};
use crate::expect::{CaseStatus, Expectation, Outcome};
use crate::harness::Harness;
use crate::scenario::Scenario;

/// Result of running a single case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub name: String,
    pub status: CaseStatus,
    pub duration_ms: u64,
    pub checks: Vec<Expectation>,
    pub error: Option<String>,
}

impl CaseResult {
    fn skipped(name: &str, reason: String) -> Self {
        Self {
            name: name.to_string(),
            status: CaseStatus::Skipped,
            duration_ms: 0,
            checks: Vec::new(),
            error: Some(reason),
        }
    }

    /// Passed or degraded; dependents may run
    pub fn counts_as_passed(&self) -> bool {
        matches!(self.status, CaseStatus::Passed | CaseStatus::Degraded)
    }
}

/// Result of running all cases
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub degraded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<CaseResult>,
}

impl SuiteResult {
    fn push(&mut self, result: CaseResult) {
        self.total += 1;
        match result.status {
            CaseStatus::Passed => self.passed += 1,
            CaseStatus::Degraded => self.degraded += 1,
            CaseStatus::Failed => self.failed += 1,
            CaseStatus::Skipped => self.skipped += 1,
        }
        self.results.push(result);
    }

    pub fn result(&self, name: &str) -> Option<&CaseResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Keep cases matching the filters plus everything they depend on
pub fn select(scenarios: Vec<Scenario>, tag: Option<&str>, name: Option<&str>) -> Vec<Scenario> {
    if tag.is_none() && name.is_none() {
        return scenarios;
    }

    let by_name: HashMap<&str, &Scenario> =
        scenarios.iter().map(|s| (s.name.as_str(), s)).collect();
    let mut keep: HashSet<String> = HashSet::new();
    let mut pending: Vec<&Scenario> = scenarios
        .iter()
        .filter(|s| tag.map_or(true, |t| s.has_tag(t)) && name.map_or(true, |n| s.name == n))
        .collect();

    while let Some(scenario) = pending.pop() {
        if !keep.insert(scenario.name.clone()) {
            continue;
        }
        for dep in &scenario.depends_on {
            if let Some(dep) = by_name.get(dep.as_str()) {
                pending.push(*dep);
            }
        }
    }

    scenarios.into_iter().filter(|s| keep.contains(&s.name)).collect()
}

/// Topological order over `depends_on`, ties broken by priority then name
pub fn order(scenarios: &[Scenario]) -> E2eResult<Vec<&Scenario>> {
    let index: HashMap<&str, usize> = scenarios
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();

    let mut indegree = vec![0usize; scenarios.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); scenarios.len()];
    for (i, scenario) in scenarios.iter().enumerate() {
        for dep in &scenario.depends_on {
            let &d = index.get(dep.as_str()).ok_or_else(|| E2eError::UnknownDependency {
                case: scenario.name.clone(),
                dependency: dep.clone(),
            })?;
            indegree[i] += 1;
            dependents[d].push(i);
        }
    }

    let key = move |i: usize| (scenarios[i].priority, scenarios[i].name.as_str(), i);
    let mut ready: BTreeSet<(i32, &str, usize)> =
        (0..scenarios.len()).filter(|&i| indegree[i] == 0).map(key).collect();
    let mut ordered = Vec::with_capacity(scenarios.len());

    while let Some(next) = ready.pop_first() {
        let i = next.2;
        ordered.push(&scenarios[i]);
        for &j in &dependents[i] {
            indegree[j] -= 1;
            if indegree[j] == 0 {
                ready.insert(key(j));
            }
        }
    }

    if ordered.len() != scenarios.len() {
        let mut stuck: Vec<&str> = scenarios
            .iter()
            .enumerate()
            .filter(|(i, _)| indegree[*i] > 0)
            .map(|(_, s)| s.name.as_str())
            .collect();
        stuck.sort();
        return Err(E2eError::DependencyCycle(stuck.join(", ")));
    }
    Ok(ordered)
}

/// Runs scenarios sequentially on one harness
pub struct SuiteRunner<D: UiDriver + ?Sized> {
    harness: Harness<D>,
}

impl<D: UiDriver + ?Sized> SuiteRunner<D> {
    pub fn new(harness: Harness<D>) -> Self {
        Self { harness }
    }

    pub fn harness(&self) -> &Harness<D> {
        &self.harness
    }

    pub fn into_harness(self) -> Harness<D> {
        self.harness
    }

    /// Run every scenario in the configured scenarios directory
    pub async fn run_all(&self) -> E2eResult<SuiteResult> {
        let scenarios = Scenario::load_all(&self.harness.config().report.scenarios_dir)?;
        self.run(&scenarios).await
    }

    pub async fn run(&self, scenarios: &[Scenario]) -> E2eResult<SuiteResult> {
        let start = Instant::now();
        let ordered = order(scenarios)?;
        let mut suite = SuiteResult::default();

        info!("Running {} case(s)...", ordered.len());

        for scenario in ordered {
            let blocked = scenario
                .depends_on
                .iter()
                .find(|dep| !suite.result(dep).map_or(false, CaseResult::counts_as_passed));
            let result = match blocked {
                Some(dep) => {
                    let status = suite
                        .result(dep)
                        .map(|r| r.status.to_string())
                        .unwrap_or_default();
                    warn!(case = %scenario.name, dependency = %dep, %status, "Skipping case");
                    CaseResult::skipped(&scenario.name, format!("dependency '{dep}' {status}"))
                }
                None => self.run_case(scenario).await,
            };

            match result.status {
                CaseStatus::Passed => info!("✓ {} ({} ms)", result.name, result.duration_ms),
                CaseStatus::Degraded => warn!(
                    "~ {} ({} ms, {} soft failure(s))",
                    result.name,
                    result.duration_ms,
                    result.checks.iter().filter(|c| c.outcome != Outcome::Passed).count()
                ),
                CaseStatus::Failed => error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                ),
                CaseStatus::Skipped => info!("- {} skipped", result.name),
            }
            suite.push(result);
        }

        suite.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Results: {} passed, {} degraded, {} failed, {} skipped ({} ms)",
            suite.passed, suite.degraded, suite.failed, suite.skipped, suite.duration_ms
        );
        Ok(suite)
    }

    /// Run one case; failures land in the result, never in the return value
    pub async fn run_case(&self, scenario: &Scenario) -> CaseResult {
        let start = Instant::now();
        debug!(case = %scenario.name, steps = scenario.steps.len(), "Running case");

        let mut recorder = self.harness.recorder(&scenario.name);
        let error = match scenario.run(&self.harness, &mut recorder).await {
            Ok(()) => None,
            Err(err) => {
                recorder.abort(&err);
                Some(err.to_string())
            }
        };

        CaseResult {
            name: scenario.name.clone(),
            status: recorder.status(),
            duration_ms: start.elapsed().as_millis() as u64,
            checks: recorder.into_checks(),
            error,
        }
    }

    /// Write results to `test-results.json` in the configured output directory
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        write_results(&self.harness.config().report.output_dir, results)
    }
}

pub fn write_results(dir: &Path, results: &SuiteResult) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join("test-results.json");
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}
