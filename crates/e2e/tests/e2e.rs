//! E2E harness entry point
//!
//! This file is the test binary that runs scenarios from YAML files.
//! Run with: cargo test --package assetops-e2e --test e2e
//! Pass arguments after `--`, e.g. `-- --driver appium --tag ocp`.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use assetops_e2e::appium::AppiumDriver;
use assetops_e2e::config::DriverKind;
use assetops_e2e::runner::{self, SuiteRunner};
use assetops_e2e::{E2eError, E2eResult, Harness, HarnessConfig, Scenario, SimulatedApp, WaitPolicy};

#[derive(Parser, Debug)]
#[command(name = "assetops-e2e")]
#[command(about = "E2E harness for the asset-management app")]
struct Args {
    /// Harness config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to scenarios directory
    #[arg(short, long)]
    scenarios: Option<PathBuf>,

    /// Run only cases matching this tag (plus their dependencies)
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only a specific case by name (plus its dependencies)
    #[arg(short, long)]
    name: Option<String>,

    /// Driver to use (sim, appium)
    #[arg(long)]
    driver: Option<String>,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let registry = tracing_subscriber::registry().with(filter);
    if args.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

fn load_config(args: &Args) -> E2eResult<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::load(path)?,
        None => {
            let mut config = HarnessConfig::default();
            config.apply_env()?;
            config
        }
    };

    if let Some(dir) = &args.scenarios {
        config.report.scenarios_dir = dir.clone();
    }
    if let Some(dir) = &args.output {
        config.report.output_dir = dir.clone();
    }
    if let Some(driver) = &args.driver {
        config.driver.kind = match driver.as_str() {
            "sim" => DriverKind::Sim,
            "appium" => DriverKind::Appium,
            other => return Err(E2eError::Config(format!("unknown driver '{}'", other))),
        };
    }
    Ok(config)
}

async fn async_main(args: Args) -> E2eResult<bool> {
    let mut config = load_config(&args)?;

    let scenarios = Scenario::load_all(&config.report.scenarios_dir)?;
    let scenarios = runner::select(scenarios, args.tag.as_deref(), args.name.as_deref());
    if let Some(name) = &args.name {
        if !scenarios.iter().any(|s| &s.name == name) {
            return Err(E2eError::ScenarioParse(format!("Case not found: {}", name)));
        }
    }

    let output_dir = config.report.output_dir.clone();
    let results = match config.driver.kind {
        DriverKind::Sim => {
            // the simulated app renders synchronously
            config.waits = WaitPolicy::immediate();
            let app = SimulatedApp::demo()?;
            let runner = SuiteRunner::new(Harness::new(Box::new(app), config));
            let results = runner.run(&scenarios).await?;
            info!(stats = ?runner.harness().driver().stats(), "Simulated session finished");
            results
        }
        DriverKind::Appium => {
            let driver = AppiumDriver::connect(config.driver.appium.clone()).await?;
            let runner = SuiteRunner::new(Harness::new(Box::new(driver), config));
            let results = runner.run(&scenarios).await;
            let driver = *runner.into_harness().into_driver();
            driver.quit().await?;
            results?
        }
    };

    runner::write_results(&output_dir, &results)?;
    Ok(results.success())
}
