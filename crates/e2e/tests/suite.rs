//! Suite runner against the simulated app
//!
//! Case ordering, dependency skips and status aggregation, plus a full run of
//! the bundled scenarios.

use std::path::Path;

use assetops_e2e::config::HarnessConfig;
use assetops_e2e::expect::Outcome;
use assetops_e2e::runner::SuiteRunner;
use assetops_e2e::{CaseStatus, Harness, Scenario, SimulatedApp, WaitPolicy};

fn runner(app: SimulatedApp, skips_degrade: bool) -> SuiteRunner<SimulatedApp> {
    let mut config = HarnessConfig::default();
    config.waits = WaitPolicy::immediate();
    config.report.skips_degrade = skips_degrade;
    SuiteRunner::new(Harness::new(Box::new(app), config))
}

fn scenario(yaml: &str) -> Scenario {
    Scenario::from_yaml(yaml).unwrap()
}

#[tokio::test]
async fn statuses_and_dependency_skips() {
    let scenarios = vec![
        scenario(
            r#"
name: list
priority: 1
steps:
  - action: ensure_screen
    screen: asset_list
"#,
        ),
        scenario(
            r#"
name: broken
priority: 2
steps:
  - action: expect_screen
    screen: task_list
  - action: log
    message: never reached
"#,
        ),
        scenario(
            r#"
name: after-broken
depends_on: [broken]
steps:
  - action: ensure_screen
    screen: asset_list
"#,
        ),
        scenario(
            r#"
name: soft
priority: 3
depends_on: [list]
steps:
  - action: expect_count
    query: search_results
    equals: 99
    severity: soft
  - action: expect_screen
    screen: asset_list
"#,
        ),
        scenario(
            r#"
name: after-soft
priority: 4
depends_on: [soft]
steps:
  - action: expect_screen
    screen: asset_list
"#,
        ),
    ];

    let suite = runner(SimulatedApp::demo().unwrap(), true).run(&scenarios).await.unwrap();

    let order: Vec<_> = suite.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(order, vec!["list", "broken", "after-broken", "soft", "after-soft"]);

    assert_eq!(suite.result("list").unwrap().status, CaseStatus::Passed);
    let broken = suite.result("broken").unwrap();
    assert_eq!(broken.status, CaseStatus::Failed);
    assert_eq!(broken.checks.len(), 1);
    assert!(broken.error.as_deref().unwrap().contains("task_list"));

    let skipped = suite.result("after-broken").unwrap();
    assert_eq!(skipped.status, CaseStatus::Skipped);
    assert!(skipped.error.as_deref().unwrap().contains("broken"));

    let soft = suite.result("soft").unwrap();
    assert_eq!(soft.status, CaseStatus::Degraded);
    assert_eq!(soft.checks.len(), 2);
    assert_eq!(soft.checks[0].outcome, Outcome::Failed);

    // degraded still unblocks dependents
    assert_eq!(suite.result("after-soft").unwrap().status, CaseStatus::Passed);

    assert_eq!(
        (suite.passed, suite.degraded, suite.failed, suite.skipped),
        (2, 1, 1, 1)
    );
    assert!(!suite.success());
}

#[tokio::test]
async fn driver_errors_fail_only_their_case() {
    let scenarios = vec![
        scenario(
            r#"
name: missing-asset
priority: 1
steps:
  - action: open_asset
    name: NOPE-1
"#,
        ),
        scenario(
            r#"
name: still-runs
priority: 2
steps:
  - action: ensure_screen
    screen: issue_list
"#,
        ),
    ];

    let suite = runner(SimulatedApp::demo().unwrap(), true).run(&scenarios).await.unwrap();

    let failed = suite.result("missing-asset").unwrap();
    assert_eq!(failed.status, CaseStatus::Failed);
    assert!(failed.error.as_deref().unwrap().contains("open_asset NOPE-1"));
    assert_eq!(suite.result("still-runs").unwrap().status, CaseStatus::Passed);
}

#[tokio::test]
async fn skip_policy_is_configurable() {
    let scenarios = vec![scenario(
        r#"
name: issues
steps:
  - action: ensure_screen
    screen: issue_list
  - action: skip_unless_count
    query: issues
    reason: no issues available
  - action: expect_count
    query: issues
    min: 1
"#,
    )];

    let strict = runner(SimulatedApp::demo().unwrap(), true).run(&scenarios).await.unwrap();
    assert_eq!(strict.result("issues").unwrap().status, CaseStatus::Degraded);

    let lenient = runner(SimulatedApp::demo().unwrap(), false).run(&scenarios).await.unwrap();
    let case = lenient.result("issues").unwrap();
    assert_eq!(case.status, CaseStatus::Passed);
    assert_eq!(case.checks.last().unwrap().outcome, Outcome::Skipped);
}

#[tokio::test]
async fn cycle_is_a_configuration_error() {
    let scenarios = vec![
        scenario("name: a\ndepends_on: [b]\nsteps: []\n"),
        scenario("name: b\ndepends_on: [a]\nsteps: []\n"),
    ];
    assert!(runner(SimulatedApp::new(), true).run(&scenarios).await.is_err());
}

#[tokio::test]
async fn bundled_scenarios_pass_on_demo_app() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios");
    let scenarios = Scenario::load_all(&dir).unwrap();
    assert!(!scenarios.is_empty());

    let runner = runner(SimulatedApp::demo().unwrap(), true);
    let suite = runner.run(&scenarios).await.unwrap();

    for result in &suite.results {
        assert_ne!(result.status, CaseStatus::Failed, "{} failed: {:?}", result.name, result.error);
    }
    assert_eq!(suite.result("issue-details").unwrap().status, CaseStatus::Degraded);
    assert_eq!(runner.harness().driver().linked_children_of("MCC-100").len(), 2);
    assert!(suite.success());
}
