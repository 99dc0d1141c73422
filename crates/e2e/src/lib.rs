//! AssetOps E2E Harness
//!
//! Navigation and precondition layer for end-to-end checks of the mobile
//! asset-management app:
//! - Reaches named screens from any session state with a bounded,
//!   backoff-based poll
//! - Establishes the "linkable node available" precondition transactionally
//! - Records hard and soft expectations and aggregates them per case
//! - Runs declarative YAML scenarios in dependency order
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Suite Runner (Rust)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SuiteRunner                                                │
//! │    ├── order(scenarios) -> dependency/priority order        │
//! │    ├── run_case(scenario) -> CaseResult                     │
//! │    └── write_results(suite) -> test-results.json            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Harness<D: UiDriver>                                       │
//! │    ├── navigator() -> Navigator (poll_until + go_to)        │
//! │    ├── ensure_linkable_node_available -> LinkFixture        │
//! │    ├── short_wait / medium_wait / long_wait                 │
//! │    └── recorder(case) -> ExpectationRecorder                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  UiDriver                                                   │
//! │    ├── SimulatedApp   (in-memory app, fault injection)      │
//! │    └── AppiumDriver   (W3C WebDriver over HTTP)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod appium;
pub mod config;
pub mod driver;
pub mod error;
pub mod expect;
pub mod fixture;
pub mod harness;
pub mod navigator;
pub mod poll;
pub mod runner;
pub mod scenario;
pub mod screen;
pub mod sim;
pub mod wait;

pub use config::HarnessConfig;
pub use driver::UiDriver;
pub use error::{E2eError, E2eResult};
pub use expect::{CaseStatus, ExpectationRecorder, Severity};
pub use fixture::{FixtureReport, ParentRef};
pub use harness::Harness;
pub use navigator::Navigator;
pub use runner::{SuiteResult, SuiteRunner};
pub use scenario::{Scenario, ScenarioStep};
pub use sim::SimulatedApp;
pub use wait::{WaitPolicy, WaitTier};
