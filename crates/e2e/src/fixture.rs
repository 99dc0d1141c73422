//! Hierarchical link-setup fixture
//!
//! Before a "link existing node" scenario can run, the parent's link picker
//! must offer at least one candidate. [`LinkFixture`] gets there from any
//! session state:
//!
//! - the parent has linked children: unlink the first one;
//! - the parent has none: create a child through the "add child" flow, then
//!   unlink it.
//!
//! Every step checks its own postcondition and fails with
//! [`E2eError::Fixture`] at the point of inconsistency. Mutations are
//! journaled as pending before the tap that applies them and confirmed once
//! their postcondition is observed. On failure the journal is unwound
//! newest-first: each revert first looks at the app to see whether the
//! mutation landed, and whatever could not be reverted is reported as
//! unresolved.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use tracing::{debug, info, warn};

use assetops_common::{
    unique_name, AssetClass, Control, Field, Query, ScreenId, SUBTYPE_NONE,
};

use crate::driver::UiDriver;
use crate::error::{E2eError, E2eResult};
use crate::navigator::Navigator;

/// Fixture tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    /// Prefix for generated child names
    pub name_prefix: String,
    /// Open the link picker afterwards and require at least one candidate
    pub verify_linkable: bool,
    /// Revert journaled side effects when a step fails
    pub rollback: bool,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            name_prefix: "e2e-ocp".to_string(),
            verify_linkable: true,
            rollback: true,
        }
    }
}

/// Steps of the fixture, used to locate a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureStep {
    OpenParent,
    OpenChildSection,
    ReadLinkedChildren,
    OpenAddChildMenu,
    OpenCreateForm,
    FillChildForm,
    SubmitChild,
    VerifyCreated,
    UnlinkChild,
    VerifyUnlinked,
    VerifyLinkable,
}

impl fmt::Display for FixtureStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FixtureStep::OpenParent => "open_parent",
            FixtureStep::OpenChildSection => "open_child_section",
            FixtureStep::ReadLinkedChildren => "read_linked_children",
            FixtureStep::OpenAddChildMenu => "open_add_child_menu",
            FixtureStep::OpenCreateForm => "open_create_form",
            FixtureStep::FillChildForm => "fill_child_form",
            FixtureStep::SubmitChild => "submit_child",
            FixtureStep::VerifyCreated => "verify_created",
            FixtureStep::UnlinkChild => "unlink_child",
            FixtureStep::VerifyUnlinked => "verify_unlinked",
            FixtureStep::VerifyLinkable => "verify_linkable",
        };
        f.write_str(name)
    }
}

/// A mutation the fixture applied to the live session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum SideEffect {
    Created { name: String, class: AssetClass },
    Unlinked { name: String, parent: String },
}

impl fmt::Display for SideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideEffect::Created { name, class } => write!(f, "created {class} '{name}'"),
            SideEffect::Unlinked { name, parent } => write!(f, "unlinked '{name}' from '{parent}'"),
        }
    }
}

/// Which route satisfied the precondition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixturePath {
    UnlinkedExisting,
    CreatedAndUnlinked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureReport {
    pub parent: String,
    pub path: FixturePath,
    /// The child that is now linkable
    pub child: String,
    pub linked_before: usize,
    pub linked_after: usize,
    /// Candidate count seen in the link picker, when verified
    pub linkable: Option<usize>,
    pub effects: Vec<SideEffect>,
}

impl FixtureReport {
    pub fn created_asset(&self) -> bool {
        self.effects
            .iter()
            .any(|effect| matches!(effect, SideEffect::Created { .. }))
    }
}

/// The parent asset a link scenario targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub name: String,
    pub class: AssetClass,
}

impl ParentRef {
    pub fn new(name: impl Into<String>, class: AssetClass) -> Self {
        Self {
            name: name.into(),
            class,
        }
    }
}

/// A journaled mutation; unconfirmed ones may or may not have landed
#[derive(Debug, Clone)]
struct Entry {
    effect: SideEffect,
    confirmed: bool,
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.confirmed {
            write!(f, "{}", self.effect)
        } else {
            write!(f, "possibly {}", self.effect)
        }
    }
}

#[derive(Debug, Default)]
struct Journal {
    entries: Vec<Entry>,
}

impl Journal {
    fn pending(&mut self, effect: SideEffect) {
        self.entries.push(Entry {
            effect,
            confirmed: false,
        });
    }

    fn confirm(&mut self, effect: &SideEffect) {
        if let Some(entry) = self.entries.iter_mut().rev().find(|e| &e.effect == effect) {
            entry.confirmed = true;
        }
    }

    fn effects(&self) -> Vec<SideEffect> {
        self.entries.iter().map(|e| e.effect.clone()).collect()
    }
}

fn fixture_error(step: FixtureStep, reason: impl Into<String>) -> E2eError {
    E2eError::Fixture {
        step,
        reason: reason.into(),
        unresolved: Vec::new(),
    }
}

/// Run `fut`, attributing any failure to `step`
async fn at<T>(step: FixtureStep, fut: impl Future<Output = E2eResult<T>>) -> E2eResult<T> {
    fut.await.map_err(|e| match e {
        E2eError::Fixture { .. } => e,
        other => fixture_error(step, other.to_string()),
    })
}

pub struct LinkFixture<'a, D: UiDriver + ?Sized> {
    nav: Navigator<'a, D>,
    config: FixtureConfig,
}

impl<'a, D: UiDriver + ?Sized> LinkFixture<'a, D> {
    pub fn new(nav: Navigator<'a, D>, config: FixtureConfig) -> Self {
        Self { nav, config }
    }

    /// Guarantee `parent`'s link picker offers at least one candidate.
    ///
    /// Leaves the session on the parent's child section.
    pub async fn ensure_linkable_node_available(
        &self,
        parent: &ParentRef,
    ) -> E2eResult<FixtureReport> {
        if !parent.class.accepts_children() {
            return Err(assetops_common::Error::NotLinkable {
                parent: parent.class.to_string(),
                child: "any".to_string(),
            }
            .into());
        }

        info!(parent = %parent.name, "Ensuring a linkable node is available");
        let mut journal = Journal::default();
        match self.run(parent, &mut journal).await {
            Ok(report) => {
                info!(
                    parent = %parent.name,
                    child = %report.child,
                    path = ?report.path,
                    "Linkable node available"
                );
                Ok(report)
            }
            Err(err) => Err(self.unwind(parent, journal, err).await),
        }
    }

    async fn run(&self, parent: &ParentRef, journal: &mut Journal) -> E2eResult<FixtureReport> {
        self.open_child_section(parent).await?;
        let linked = at(FixtureStep::ReadLinkedChildren, self.linked_children()).await?;
        let linked_before = linked.len();
        debug!(parent = %parent.name, linked_before, "Read linked children");

        let (path, child) = match linked.first() {
            Some(first) => {
                let child = first.clone();
                self.unlink(parent, &child, linked_before, journal).await?;
                (FixturePath::UnlinkedExisting, child)
            }
            None => {
                let child = self.create_child(parent, journal).await?;
                self.unlink(parent, &child, 1, journal).await?;
                (FixturePath::CreatedAndUnlinked, child)
            }
        };

        let linked_after = at(FixtureStep::VerifyUnlinked, self.linked_children()).await?.len();
        let linkable = if self.config.verify_linkable {
            Some(self.verify_linkable(&child).await?)
        } else {
            None
        };

        Ok(FixtureReport {
            parent: parent.name.clone(),
            path,
            child,
            linked_before,
            linked_after,
            linkable,
            effects: journal.effects(),
        })
    }

    async fn linked_children(&self) -> E2eResult<Vec<String>> {
        self.nav.driver().list(Query::LinkedChildren).await
    }

    async fn open_child_section(&self, parent: &ParentRef) -> E2eResult<()> {
        let driver = self.nav.driver();
        let waits = self.nav.waits();
        at(FixtureStep::OpenParent, async {
            self.nav.require(ScreenId::AssetList).await?;
            driver.open_asset(&parent.name).await?;
            waits.short_wait().await;
            self.nav.require(ScreenId::AssetDetails).await
        })
        .await?;
        at(FixtureStep::OpenChildSection, self.nav.require(ScreenId::ChildSection)).await
    }

    async fn create_child(&self, parent: &ParentRef, journal: &mut Journal) -> E2eResult<String> {
        let driver = self.nav.driver();
        let waits = self.nav.waits();

        at(FixtureStep::OpenAddChildMenu, async {
            driver.tap(&Control::AddChild).await?;
            waits.short_wait().await;
            self.nav.require(ScreenId::AddChildMenu).await
        })
        .await?;

        at(FixtureStep::OpenCreateForm, async {
            driver.tap(&Control::CreateNewChild).await?;
            waits.medium_wait().await;
            self.nav.require(ScreenId::CreateAsset).await
        })
        .await?;

        let name = unique_name(&self.config.name_prefix);
        let class = at(FixtureStep::FillChildForm, async {
            let class = self.choose_child_class(parent).await?;
            driver.enter_text(&Field::AssetName, &name).await?;
            driver.select_from_dropdown(&Field::AssetClass, class.label()).await?;
            waits.short_wait().await;
            driver.select_from_dropdown(&Field::AssetSubtype, SUBTYPE_NONE).await?;

            let entered = driver.read_text(&Field::AssetName).await?;
            if entered != name {
                return Err(fixture_error(
                    FixtureStep::FillChildForm,
                    format!("name field reads '{entered}', expected '{name}'"),
                ));
            }
            Ok(class)
        })
        .await?;

        let created = SideEffect::Created {
            name: name.clone(),
            class,
        };
        journal.pending(created.clone());
        at(FixtureStep::SubmitChild, async {
            driver.tap(&Control::Save).await?;
            waits.long_wait().await;
            // a rejected form stays open without any error
            if driver.is_displayed(ScreenId::CreateAsset).await? {
                return Err(fixture_error(
                    FixtureStep::SubmitChild,
                    "create form still displayed after save",
                ));
            }
            Ok(())
        })
        .await?;
        journal.confirm(&created);
        info!(parent = %parent.name, child = %name, %class, "Created child asset");

        self.open_child_section(parent).await?;
        let linked = at(FixtureStep::VerifyCreated, self.linked_children()).await?;
        if !linked.contains(&name) {
            return Err(fixture_error(
                FixtureStep::VerifyCreated,
                format!("'{name}' not listed under '{}'", parent.name),
            ));
        }
        Ok(name)
    }

    async fn choose_child_class(&self, parent: &ParentRef) -> E2eResult<AssetClass> {
        let offered = self.nav.driver().dropdown_options(&Field::AssetClass).await?;
        parent
            .class
            .linkable_child_classes()
            .iter()
            .copied()
            .find(|class| offered.iter().any(|option| option == class.label()))
            .ok_or_else(|| {
                fixture_error(
                    FixtureStep::FillChildForm,
                    format!("no class linkable under {} offered (got {offered:?})", parent.class),
                )
            })
    }

    async fn unlink(
        &self,
        parent: &ParentRef,
        child: &str,
        linked_before: usize,
        journal: &mut Journal,
    ) -> E2eResult<()> {
        let driver = self.nav.driver();
        let waits = self.nav.waits();

        at(FixtureStep::UnlinkChild, async {
            driver.tap(&Control::ChildOptions(child.to_string())).await?;
            waits.short_wait().await;
            driver.tap(&Control::RemoveLink).await?;
            waits.short_wait().await;
            Ok(())
        })
        .await?;

        let unlinked = SideEffect::Unlinked {
            name: child.to_string(),
            parent: parent.name.clone(),
        };
        journal.pending(unlinked.clone());
        at(FixtureStep::UnlinkChild, async {
            driver.tap(&Control::ConfirmRemoveLink).await?;
            waits.medium_wait().await;
            Ok(())
        })
        .await?;

        let linked = at(FixtureStep::VerifyUnlinked, async {
            self.nav.require(ScreenId::ChildSection).await?;
            self.linked_children().await
        })
        .await?;
        if linked.iter().any(|name| name == child) || linked.len() + 1 != linked_before {
            return Err(fixture_error(
                FixtureStep::VerifyUnlinked,
                format!(
                    "'{child}' still linked or count off: {} linked, expected {}",
                    linked.len(),
                    linked_before.saturating_sub(1)
                ),
            ));
        }

        journal.confirm(&unlinked);
        info!(parent = %parent.name, %child, "Unlinked child");
        Ok(())
    }

    async fn verify_linkable(&self, child: &str) -> E2eResult<usize> {
        let driver = self.nav.driver();
        let waits = self.nav.waits();

        at(FixtureStep::VerifyLinkable, async {
            driver.tap(&Control::AddChild).await?;
            waits.short_wait().await;
            self.nav.require(ScreenId::AddChildMenu).await?;
            driver.tap(&Control::LinkExistingChild).await?;
            waits.medium_wait().await;
            self.nav.require(ScreenId::LinkExistingNodes).await?;

            let candidates = driver.list(Query::LinkableNodes).await?;
            if candidates.is_empty() {
                return Err(fixture_error(FixtureStep::VerifyLinkable, "link picker is empty"));
            }
            if !candidates.iter().any(|name| name == child) {
                warn!(%child, "Unlinked child missing from link picker");
            }

            driver.tap(&Control::Back).await?;
            waits.short_wait().await;
            self.nav.require(ScreenId::ChildSection).await?;
            Ok(candidates.len())
        })
        .await
    }

    /// Revert journaled effects newest-first and fold what remains into `err`
    async fn unwind(&self, parent: &ParentRef, journal: Journal, err: E2eError) -> E2eError {
        warn!(
            parent = %parent.name,
            error = %err,
            effects = journal.entries.len(),
            "Fixture failed"
        );

        let mut unresolved = Vec::new();
        for entry in journal.entries.into_iter().rev() {
            if !self.config.rollback {
                unresolved.push(entry.to_string());
                continue;
            }
            let reverted = match &entry.effect {
                SideEffect::Created { name, .. } => self.delete_asset(name).await,
                SideEffect::Unlinked { name, .. } => self.relink(parent, name).await,
            };
            match reverted {
                Ok(true) => info!(effect = %entry, "Reverted side effect"),
                Ok(false) => debug!(effect = %entry, "Side effect never landed"),
                Err(e) => {
                    warn!(effect = %entry, error = %e, "Side effect left unresolved");
                    unresolved.push(entry.to_string());
                }
            }
        }

        match err {
            E2eError::Fixture { step, reason, .. } => E2eError::Fixture {
                step,
                reason,
                unresolved,
            },
            other => E2eError::Fixture {
                step: FixtureStep::OpenParent,
                reason: other.to_string(),
                unresolved,
            },
        }
    }

    /// Whether the asset list has a row named exactly `name`
    async fn asset_listed(&self, name: &str) -> E2eResult<bool> {
        let driver = self.nav.driver();

        self.nav.require(ScreenId::AssetList).await?;
        driver.enter_text(&Field::Search, name).await?;
        self.nav.waits().short_wait().await;
        let rows = driver.list(Query::SearchResults).await?;
        driver.enter_text(&Field::Search, "").await?;
        Ok(rows.iter().any(|row| row == name))
    }

    /// Delete `name` if it exists; `Ok(false)` when there was nothing to delete
    async fn delete_asset(&self, name: &str) -> E2eResult<bool> {
        let driver = self.nav.driver();
        let waits = self.nav.waits();

        if !self.asset_listed(name).await? {
            return Ok(false);
        }
        driver.open_asset(name).await?;
        waits.short_wait().await;
        self.nav.require(ScreenId::AssetDetails).await?;
        driver.tap(&Control::DeleteAsset).await?;
        waits.short_wait().await;
        driver.tap(&Control::ConfirmDelete).await?;
        waits.medium_wait().await;
        if self.asset_listed(name).await? {
            return Err(E2eError::StepFailed {
                step: "delete_asset".to_string(),
                reason: format!("'{name}' still listed after delete"),
            });
        }
        Ok(true)
    }

    /// Link `child` back under `parent` unless it already is
    async fn relink(&self, parent: &ParentRef, child: &str) -> E2eResult<bool> {
        let driver = self.nav.driver();
        let waits = self.nav.waits();

        self.open_child_section(parent).await?;
        if self.linked_children().await?.iter().any(|row| row == child) {
            return Ok(false);
        }
        driver.tap(&Control::AddChild).await?;
        waits.short_wait().await;
        driver.tap(&Control::LinkExistingChild).await?;
        waits.medium_wait().await;
        self.nav.require(ScreenId::LinkExistingNodes).await?;
        driver.tap(&Control::Candidate(child.to_string())).await?;
        driver.tap(&Control::LinkSelected).await?;
        waits.medium_wait().await;
        self.nav.require(ScreenId::ChildSection).await?;

        if !self.linked_children().await?.iter().any(|row| row == child) {
            return Err(E2eError::StepFailed {
                step: "relink".to_string(),
                reason: format!("'{child}' not listed under '{}'", parent.name),
            });
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_effect_display() {
        let created = SideEffect::Created {
            name: "e2e-ocp-1".into(),
            class: AssetClass::CircuitBreaker,
        };
        assert_eq!(created.to_string(), "created Circuit Breaker 'e2e-ocp-1'");
    }

    #[test]
    fn test_unconfirmed_entry_is_possibly_applied() {
        let effect = SideEffect::Unlinked {
            name: "CB-1".into(),
            parent: "MCC-1".into(),
        };
        let mut journal = Journal::default();
        journal.pending(effect.clone());
        assert_eq!(journal.entries[0].to_string(), "possibly unlinked 'CB-1' from 'MCC-1'");

        journal.confirm(&effect);
        assert_eq!(journal.entries[0].to_string(), "unlinked 'CB-1' from 'MCC-1'");
        assert_eq!(journal.effects(), vec![effect]);
    }

    #[test]
    fn test_fixture_error_lists_unresolved() {
        let err = E2eError::Fixture {
            step: FixtureStep::VerifyUnlinked,
            reason: "count off".into(),
            unresolved: vec!["created Fuse 'x'".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("verify_unlinked"));
        assert!(msg.contains("created Fuse 'x'"));
    }

    #[tokio::test]
    async fn test_at_wraps_foreign_errors() {
        let err = at::<()>(FixtureStep::SubmitChild, async {
            Err(E2eError::ElementNotFound("save".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, E2eError::Fixture { step: FixtureStep::SubmitChild, .. }));
    }

    #[test]
    fn test_report_created_asset() {
        let report = FixtureReport {
            parent: "MCC-1".into(),
            path: FixturePath::UnlinkedExisting,
            child: "CB-1".into(),
            linked_before: 2,
            linked_after: 1,
            linkable: Some(1),
            effects: vec![SideEffect::Unlinked {
                name: "CB-1".into(),
                parent: "MCC-1".into(),
            }],
        };
        assert!(!report.created_asset());
    }
}
