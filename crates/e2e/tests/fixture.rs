//! Link-setup fixture against the simulated app
//!
//! Covers both routes to a linkable node plus failure handling: rollback of
//! created assets and reporting of effects that could not be reverted.

use std::sync::atomic::{AtomicBool, Ordering};

use assetops_common::{AssetClass, Control, Field, Query, ScreenId, ScrollDirection};
use assetops_e2e::config::HarnessConfig;
use assetops_e2e::fixture::{FixturePath, FixtureStep, SideEffect};
use assetops_e2e::{E2eError, E2eResult, Harness, ParentRef, SimulatedApp, UiDriver, WaitPolicy};
use async_trait::async_trait;

fn harness(app: SimulatedApp) -> Harness<SimulatedApp> {
    harness_with(app, |_| {})
}

fn harness_with(
    app: SimulatedApp,
    tweak: impl FnOnce(&mut HarnessConfig),
) -> Harness<SimulatedApp> {
    let mut config = HarnessConfig::default();
    config.waits = WaitPolicy::immediate();
    tweak(&mut config);
    Harness::new(Box::new(app), config)
}

/// Simulated app whose first read after a tap on `trigger` fails, after the
/// tap itself has taken effect
struct StaleAfterTap {
    app: SimulatedApp,
    trigger: Control,
    armed: AtomicBool,
}

impl StaleAfterTap {
    fn new(app: SimulatedApp, trigger: Control) -> Self {
        Self {
            app,
            trigger,
            armed: AtomicBool::new(false),
        }
    }

    fn read(&self) -> E2eResult<()> {
        if self.armed.swap(false, Ordering::SeqCst) {
            return Err(E2eError::Session("stale element reference".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl UiDriver for StaleAfterTap {
    async fn is_displayed(&self, screen: ScreenId) -> E2eResult<bool> {
        self.read()?;
        self.app.is_displayed(screen).await
    }

    async fn go_to(&self, screen: ScreenId) -> E2eResult<()> {
        self.app.go_to(screen).await
    }

    async fn open_asset(&self, name: &str) -> E2eResult<()> {
        self.app.open_asset(name).await
    }

    async fn scroll(&self, direction: ScrollDirection) -> E2eResult<()> {
        self.app.scroll(direction).await
    }

    async fn tap(&self, control: &Control) -> E2eResult<()> {
        self.app.tap(control).await?;
        if *control == self.trigger {
            self.armed.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn enter_text(&self, field: &Field, value: &str) -> E2eResult<()> {
        self.app.enter_text(field, value).await
    }

    async fn select_from_dropdown(&self, field: &Field, value: &str) -> E2eResult<()> {
        self.app.select_from_dropdown(field, value).await
    }

    async fn dropdown_options(&self, field: &Field) -> E2eResult<Vec<String>> {
        self.read()?;
        self.app.dropdown_options(field).await
    }

    async fn read_text(&self, field: &Field) -> E2eResult<String> {
        self.read()?;
        self.app.read_text(field).await
    }

    async fn is_element_visible(&self, element: &str) -> E2eResult<bool> {
        self.read()?;
        self.app.is_element_visible(element).await
    }

    async fn list(&self, query: Query) -> E2eResult<Vec<String>> {
        self.read()?;
        self.app.list(query).await
    }
}

fn stale_harness(app: SimulatedApp, trigger: Control) -> Harness<StaleAfterTap> {
    let mut config = HarnessConfig::default();
    config.waits = WaitPolicy::immediate();
    Harness::new(Box::new(StaleAfterTap::new(app, trigger)), config)
}

fn mcc(name: &str) -> ParentRef {
    ParentRef::new(name, AssetClass::Mcc)
}

#[tokio::test]
async fn populated_parent_unlinks_first_child() {
    let h = harness(SimulatedApp::demo().unwrap());
    let assets_before = h.driver().asset_count();

    let report = h.ensure_linkable_node_available(&mcc("MCC-100")).await.unwrap();

    assert_eq!(report.path, FixturePath::UnlinkedExisting);
    assert_eq!(report.child, "CB-101");
    assert_eq!(report.linked_before, 2);
    assert_eq!(report.linked_after, 1);
    assert!(report.linkable.unwrap() >= 1);
    assert!(!report.created_asset());

    let app = h.driver();
    assert_eq!(app.asset_count(), assets_before);
    assert_eq!(app.stats().assets_created, 0);
    assert_eq!(app.linked_children_of("MCC-100"), vec!["CB-102"]);
    assert!(app.linkable_under("MCC-100").contains(&"CB-101".to_string()));
    assert_eq!(app.current_screen(), ScreenId::ChildSection);
}

#[tokio::test]
async fn empty_parent_gets_created_child() {
    let h = harness(SimulatedApp::demo().unwrap());
    let assets_before = h.driver().asset_count();

    let report = h.ensure_linkable_node_available(&mcc("MCC-200")).await.unwrap();

    assert_eq!(report.path, FixturePath::CreatedAndUnlinked);
    assert!(report.child.starts_with("e2e-ocp-"));
    assert_eq!(report.linked_before, 0);
    assert_eq!(report.linked_after, 0);
    assert!(report.created_asset());
    assert_eq!(
        report.effects,
        vec![
            SideEffect::Created {
                name: report.child.clone(),
                class: AssetClass::CircuitBreaker,
            },
            SideEffect::Unlinked {
                name: report.child.clone(),
                parent: "MCC-200".to_string(),
            },
        ]
    );

    let app = h.driver();
    assert_eq!(app.stats().assets_created, 1);
    assert_eq!(app.asset_count(), assets_before + 1);
    assert!(app.linked_children_of("MCC-200").is_empty());
    assert!(app.linkable_under("MCC-200").contains(&report.child));
}

#[tokio::test]
async fn repeated_runs_keep_draining_children() {
    let h = harness(SimulatedApp::demo().unwrap());

    let first = h.ensure_linkable_node_available(&mcc("MCC-100")).await.unwrap();
    let second = h.ensure_linkable_node_available(&mcc("MCC-100")).await.unwrap();
    let third = h.ensure_linkable_node_available(&mcc("MCC-100")).await.unwrap();

    assert_eq!(first.path, FixturePath::UnlinkedExisting);
    assert_eq!(second.path, FixturePath::UnlinkedExisting);
    assert_eq!(second.linked_after, 0);
    assert_eq!(third.path, FixturePath::CreatedAndUnlinked);
    assert_eq!(h.driver().stats().assets_created, 1);
}

#[tokio::test]
async fn starts_from_any_screen() {
    let app = SimulatedApp::demo().unwrap().with_render_lag(1);
    app.show(ScreenId::Connections);
    let h = harness(app);

    let report = h.ensure_linkable_node_available(&mcc("MCC-100")).await.unwrap();
    assert_eq!(report.linked_after, 1);
}

#[tokio::test]
async fn skipping_verification_leaves_picker_closed() {
    let h = harness_with(SimulatedApp::demo().unwrap(), |c| c.fixture.verify_linkable = false);

    let report = h.ensure_linkable_node_available(&mcc("MCC-100")).await.unwrap();
    assert_eq!(report.linkable, None);
}

#[tokio::test]
async fn parent_without_child_section_is_rejected() {
    let h = harness(SimulatedApp::demo().unwrap());

    let err = h
        .ensure_linkable_node_available(&ParentRef::new("JB-300", AssetClass::JunctionBox))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        E2eError::Domain(assetops_common::Error::NotLinkable { .. })
    ));
    assert_eq!(h.driver().stats().navigations, 0);
}

#[tokio::test]
async fn missing_parent_fails_at_open_parent() {
    let h = harness(SimulatedApp::demo().unwrap());

    let err = h.ensure_linkable_node_available(&mcc("MCC-999")).await.unwrap_err();
    assert!(matches!(
        err,
        E2eError::Fixture {
            step: FixtureStep::OpenParent,
            ref unresolved,
            ..
        } if unresolved.is_empty()
    ));
}

#[tokio::test]
async fn failed_unlink_rolls_back_created_child() {
    let app = SimulatedApp::demo()
        .unwrap()
        .with_silent_control(&Control::ConfirmRemoveLink);
    let h = harness(app);
    let assets_before = h.driver().asset_count();

    let err = h.ensure_linkable_node_available(&mcc("MCC-200")).await.unwrap_err();

    match err {
        E2eError::Fixture { step, unresolved, .. } => {
            assert_eq!(step, FixtureStep::VerifyUnlinked);
            assert!(unresolved.is_empty(), "unexpected unresolved effects: {unresolved:?}");
        }
        other => panic!("expected fixture error, got {other}"),
    }

    let app = h.driver();
    assert_eq!(app.stats().assets_created, 1);
    assert_eq!(app.stats().assets_deleted, 1);
    assert_eq!(app.asset_count(), assets_before);
}

#[tokio::test]
async fn disabled_rollback_reports_every_effect() {
    let app = SimulatedApp::demo()
        .unwrap()
        .with_silent_control(&Control::ConfirmRemoveLink);
    let h = harness_with(app, |c| c.fixture.rollback = false);
    let assets_before = h.driver().asset_count();

    let err = h.ensure_linkable_node_available(&mcc("MCC-200")).await.unwrap_err();

    match err {
        E2eError::Fixture { unresolved, .. } => {
            // the unlink was tapped but never confirmed
            assert_eq!(unresolved.len(), 2);
            assert!(unresolved[0].starts_with("possibly unlinked 'e2e-ocp-"));
            assert!(unresolved[1].starts_with("created Circuit Breaker 'e2e-ocp-"));
        }
        other => panic!("expected fixture error, got {other}"),
    }
    assert_eq!(h.driver().asset_count(), assets_before + 1);
}

#[tokio::test]
async fn failed_revert_is_unresolved() {
    let app = SimulatedApp::demo()
        .unwrap()
        .with_silent_control(&Control::ConfirmRemoveLink)
        .with_silent_control(&Control::ConfirmDelete);
    let h = harness(app);

    let err = h.ensure_linkable_node_available(&mcc("MCC-200")).await.unwrap_err();

    match err {
        E2eError::Fixture { unresolved, .. } => assert_eq!(unresolved.len(), 1),
        other => panic!("expected fixture error, got {other}"),
    }
    assert_eq!(h.driver().stats().assets_deleted, 0);
}

#[tokio::test]
async fn failed_relink_reports_unlinked_child() {
    let app = SimulatedApp::demo()
        .unwrap()
        .with_silent_control(&Control::LinkExistingChild)
        .with_unreachable(ScreenId::LinkExistingNodes);
    let h = harness(app);

    let err = h.ensure_linkable_node_available(&mcc("MCC-100")).await.unwrap_err();

    match err {
        E2eError::Fixture { step, unresolved, .. } => {
            assert_eq!(step, FixtureStep::VerifyLinkable);
            assert_eq!(unresolved, vec!["unlinked 'CB-101' from 'MCC-100'".to_string()]);
        }
        other => panic!("expected fixture error, got {other}"),
    }
    assert_eq!(h.driver().linked_children_of("MCC-100"), vec!["CB-102"]);
}

#[tokio::test]
async fn rejected_save_fails_at_submit() {
    let app = SimulatedApp::demo().unwrap().with_silent_control(&Control::Save);
    let h = harness(app);

    let err = h.ensure_linkable_node_available(&mcc("MCC-200")).await.unwrap_err();

    assert!(matches!(
        err,
        E2eError::Fixture {
            step: FixtureStep::SubmitChild,
            ref unresolved,
            ..
        } if unresolved.is_empty()
    ));
    assert_eq!(h.driver().stats().assets_created, 0);
}

#[tokio::test]
async fn unlink_that_landed_before_a_failed_read_is_relinked() {
    let h = stale_harness(SimulatedApp::demo().unwrap(), Control::ConfirmRemoveLink);

    let err = h.ensure_linkable_node_available(&mcc("MCC-100")).await.unwrap_err();

    match err {
        E2eError::Fixture { step, unresolved, .. } => {
            assert_eq!(step, FixtureStep::VerifyUnlinked);
            assert!(unresolved.is_empty(), "unexpected unresolved effects: {unresolved:?}");
        }
        other => panic!("expected fixture error, got {other}"),
    }

    let linked = h.driver().app.linked_children_of("MCC-100");
    assert_eq!(linked.len(), 2);
    assert!(linked.contains(&"CB-101".to_string()));
}

#[tokio::test]
async fn save_that_landed_before_a_failed_read_is_deleted() {
    let h = stale_harness(SimulatedApp::demo().unwrap(), Control::Save);
    let assets_before = h.driver().app.asset_count();

    let err = h.ensure_linkable_node_available(&mcc("MCC-200")).await.unwrap_err();

    match err {
        E2eError::Fixture { step, unresolved, .. } => {
            assert_eq!(step, FixtureStep::SubmitChild);
            assert!(unresolved.is_empty(), "unexpected unresolved effects: {unresolved:?}");
        }
        other => panic!("expected fixture error, got {other}"),
    }

    let app = &h.driver().app;
    assert_eq!(app.stats().assets_created, 1);
    assert_eq!(app.stats().assets_deleted, 1);
    assert_eq!(app.asset_count(), assets_before);
    assert!(app.linked_children_of("MCC-200").is_empty());
}

#[tokio::test]
async fn failed_read_without_rollback_reports_possible_effect() {
    let app = SimulatedApp::demo().unwrap();
    let mut config = HarnessConfig::default();
    config.waits = WaitPolicy::immediate();
    config.fixture.rollback = false;
    let h = Harness::new(
        Box::new(StaleAfterTap::new(app, Control::ConfirmRemoveLink)),
        config,
    );

    let err = h.ensure_linkable_node_available(&mcc("MCC-100")).await.unwrap_err();

    match err {
        E2eError::Fixture { unresolved, .. } => {
            assert_eq!(unresolved, vec!["possibly unlinked 'CB-101' from 'MCC-100'".to_string()]);
        }
        other => panic!("expected fixture error, got {other}"),
    }
    assert_eq!(h.driver().app.linked_children_of("MCC-100"), vec!["CB-102"]);
}
