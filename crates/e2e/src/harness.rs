//! Test-case surface
//!
//! [`Harness`] bundles one driver session with the loaded configuration and
//! hands out the pieces a case needs: navigation, the link fixture, the wait
//! tiers and a fresh expectation recorder.

use assetops_common::ScreenId;

use crate::config::HarnessConfig;
use crate::driver::UiDriver;
use crate::error::E2eResult;
use crate::expect::ExpectationRecorder;
use crate::fixture::{FixtureReport, LinkFixture, ParentRef};
use crate::navigator::Navigator;
use crate::wait::{WaitPolicy, WaitTier};

pub struct Harness<D: UiDriver + ?Sized> {
    config: HarnessConfig,
    driver: Box<D>,
}

impl<D: UiDriver + ?Sized> Harness<D> {
    pub fn new(driver: Box<D>, config: HarnessConfig) -> Self {
        Self { config, driver }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn waits(&self) -> &WaitPolicy {
        &self.config.waits
    }

    pub fn navigator(&self) -> Navigator<'_, D> {
        Navigator::new(&*self.driver, self.config.waits, self.config.navigation)
    }

    pub async fn ensure_on_screen(&self, screen: ScreenId) -> E2eResult<bool> {
        self.navigator().ensure_on_screen(screen).await
    }

    pub async fn ensure_linkable_node_available(
        &self,
        parent: &ParentRef,
    ) -> E2eResult<FixtureReport> {
        LinkFixture::new(self.navigator(), self.config.fixture.clone())
            .ensure_linkable_node_available(parent)
            .await
    }

    pub async fn wait(&self, tier: WaitTier) {
        self.config.waits.wait(tier).await
    }

    pub async fn short_wait(&self) {
        self.config.waits.short_wait().await
    }

    pub async fn medium_wait(&self) {
        self.config.waits.medium_wait().await
    }

    pub async fn long_wait(&self) {
        self.config.waits.long_wait().await
    }

    pub fn recorder(&self, case: impl Into<String>) -> ExpectationRecorder {
        ExpectationRecorder::new(case).skips_degrade(self.config.report.skips_degrade)
    }

    /// Give the driver back, e.g. to end a remote session
    pub fn into_driver(self) -> Box<D> {
        self.driver
    }
}
