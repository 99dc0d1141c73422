//! Screen navigator
//!
//! Reaches a named screen from an unknown starting state. The predicate is
//! checked once without waiting; after that each attempt waits (linear
//! backoff), performs the driver's navigation action and checks again.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use assetops_common::ScreenId;

use crate::driver::UiDriver;
use crate::error::{E2eError, E2eResult};
use crate::poll::{poll_until, PollOutcome, RetryBudget};
use crate::screen::Screen;
use crate::wait::WaitPolicy;

/// Result of verifying a screen's sub-elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenCheck {
    pub screen: ScreenId,
    pub displayed: bool,
    pub missing: Vec<&'static str>,
}

impl ScreenCheck {
    pub fn is_complete(&self) -> bool {
        self.displayed && self.missing.is_empty()
    }
}

pub struct Navigator<'a, D: UiDriver + ?Sized> {
    driver: &'a D,
    waits: WaitPolicy,
    budget: RetryBudget,
}

impl<'a, D: UiDriver + ?Sized> Navigator<'a, D> {
    pub fn new(driver: &'a D, waits: WaitPolicy, budget: RetryBudget) -> Self {
        Self {
            driver,
            waits,
            budget,
        }
    }

    /// Same navigator with a different retry budget
    pub fn with_budget(&self, budget: RetryBudget) -> Self {
        Self {
            driver: self.driver,
            waits: self.waits,
            budget,
        }
    }

    pub fn budget(&self) -> RetryBudget {
        self.budget
    }

    pub fn waits(&self) -> &WaitPolicy {
        &self.waits
    }

    pub fn driver(&self) -> &'a D {
        self.driver
    }

    /// Poll toward `screen` and report exactly how it went
    pub async fn reach(&self, screen: ScreenId) -> E2eResult<PollOutcome> {
        let driver = self.driver;
        let outcome = poll_until(
            screen.as_str(),
            self.budget,
            &self.waits,
            || driver.is_displayed(screen),
            |attempt| {
                debug!(%screen, attempt, "Navigating");
                driver.go_to(screen)
            },
        )
        .await?;

        match &outcome {
            PollOutcome::Satisfied { attempts: 0 } => debug!(%screen, "Already on screen"),
            PollOutcome::Satisfied { attempts } => info!(%screen, attempts, "Reached screen"),
            PollOutcome::TimedOut { attempts } => warn!(%screen, attempts, "Screen not reached"),
            PollOutcome::ProbeFailed { attempt, error } => {
                error!(%screen, attempt, %error, "Screen predicate failed")
            }
        }
        Ok(outcome)
    }

    /// `true` once `screen` is displayed, `false` when the budget runs out.
    ///
    /// Never errors on a timeout; errors raised by the navigation action
    /// itself are returned as-is.
    pub async fn ensure_on_screen(&self, screen: ScreenId) -> E2eResult<bool> {
        Ok(self.reach(screen).await?.is_satisfied())
    }

    /// Like [`Self::ensure_on_screen`] but a miss is an error
    pub async fn require(&self, screen: ScreenId) -> E2eResult<()> {
        match self.reach(screen).await? {
            PollOutcome::Satisfied { .. } => Ok(()),
            PollOutcome::TimedOut { attempts } => Err(E2eError::ScreenUnreachable(format!(
                "{screen} after {attempts} attempt(s)"
            ))),
            PollOutcome::ProbeFailed { error, .. } => {
                Err(E2eError::ScreenUnreachable(format!("{screen}: {error}")))
            }
        }
    }

    /// Check the predicate and then every declared sub-element
    pub async fn verify(&self, screen: &Screen) -> E2eResult<ScreenCheck> {
        let displayed = self.driver.is_displayed(screen.id).await?;
        let mut missing = Vec::new();
        for element in screen.elements {
            if !displayed || !self.driver.is_element_visible(element).await? {
                missing.push(*element);
            }
        }
        if !missing.is_empty() {
            debug!(screen = %screen.id, ?missing, "Screen incomplete");
        }
        Ok(ScreenCheck {
            screen: screen.id,
            displayed,
            missing,
        })
    }
}
