//! In-process simulated asset-management app
//!
//! Implements [`UiDriver`] over an in-memory model of the app's screens and
//! data, with knobs for the timing and fault behaviour real devices show:
//! render lag after a transition, screens that never render, navigation
//! actions that raise, and controls whose taps silently do nothing.
//! Call counters make navigation and mutation behaviour observable.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, trace};

use assetops_common::{
    Asset, AssetClass, Control, Field, Issue, Query, ScreenId, ScrollDirection, SUBTYPE_NONE,
};

use crate::driver::UiDriver;
use crate::error::{E2eError, E2eResult};
use crate::screen::elements_of;

/// Counters of driver traffic and data mutations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimStats {
    /// `go_to` calls
    pub navigations: u32,
    /// `is_displayed` calls per screen
    pub checks: BTreeMap<ScreenId, u32>,
    pub assets_created: u32,
    pub assets_deleted: u32,
    pub links_added: u32,
    pub links_removed: u32,
    /// Saves rejected by form validation
    pub rejected_saves: u32,
    /// Taps swallowed by silent controls
    pub swallowed_taps: u32,
}

impl SimStats {
    pub fn checks_of(&self, screen: ScreenId) -> u32 {
        self.checks.get(&screen).copied().unwrap_or(0)
    }

    pub fn total_checks(&self) -> u32 {
        self.checks.values().sum()
    }
}

#[derive(Debug, Default)]
struct Form {
    name: String,
    class: Option<AssetClass>,
    subtype: String,
    /// Parent the new asset will be linked under
    parent: Option<String>,
    /// Asset being edited
    editing: Option<String>,
    issue_title: String,
}

#[derive(Debug)]
struct SimState {
    assets: Vec<Asset>,
    issues: Vec<Issue>,
    screen: ScreenId,
    open_asset: Option<String>,
    open_issue: Option<String>,
    search: Option<String>,
    form: Form,
    child_menu: Option<String>,
    confirm_unlink: bool,
    confirm_delete: bool,
    selection: Vec<String>,
    render_lag: u32,
    pending_lag: u32,
    unreachable: HashSet<ScreenId>,
    faults: HashMap<ScreenId, String>,
    silent_controls: HashSet<String>,
    stats: SimStats,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            assets: Vec::new(),
            issues: Vec::new(),
            screen: ScreenId::AssetList,
            open_asset: None,
            open_issue: None,
            search: None,
            form: Form::default(),
            child_menu: None,
            confirm_unlink: false,
            confirm_delete: false,
            selection: Vec::new(),
            render_lag: 0,
            pending_lag: 0,
            unreachable: HashSet::new(),
            faults: HashMap::new(),
            silent_controls: HashSet::new(),
            stats: SimStats::default(),
        }
    }
}

fn not_found(what: impl Into<String>) -> E2eError {
    E2eError::ElementNotFound(what.into())
}

impl SimState {
    fn transition(&mut self, screen: ScreenId) {
        if self.screen != screen {
            trace!(from = %self.screen, to = %screen, "Sim transition");
            self.screen = screen;
            self.pending_lag = self.render_lag;
        }
    }

    fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }

    fn asset_mut(&mut self, name: &str) -> Option<&mut Asset> {
        self.assets.iter_mut().find(|a| a.name == name)
    }

    fn open_parent(&self) -> E2eResult<&Asset> {
        self.open_asset
            .as_deref()
            .and_then(|name| self.asset(name))
            .ok_or_else(|| not_found("open asset"))
    }

    fn linked_under(&self, parent: &str) -> Vec<String> {
        self.assets
            .iter()
            .filter(|a| a.parent.as_deref() == Some(parent))
            .map(|a| a.name.clone())
            .collect()
    }

    fn linkable_under(&self, parent: &Asset) -> Vec<String> {
        self.assets
            .iter()
            .filter(|a| a.is_linkable_under(parent))
            .map(|a| a.name.clone())
            .collect()
    }

    fn on_form(&self) -> bool {
        matches!(self.screen, ScreenId::CreateAsset | ScreenId::EditAsset)
    }

    fn require_screen(&self, screen: ScreenId, what: &str) -> E2eResult<()> {
        if self.screen == screen {
            Ok(())
        } else {
            Err(not_found(format!("{what} (on {})", self.screen)))
        }
    }

    fn class_options(&self) -> Vec<String> {
        let parent_class = self
            .form
            .parent
            .as_deref()
            .and_then(|p| self.asset(p))
            .map(|p| p.class);
        match parent_class {
            Some(class) => class
                .linkable_child_classes()
                .iter()
                .map(|c| c.label().to_string())
                .collect(),
            None => AssetClass::ALL.iter().map(|c| c.label().to_string()).collect(),
        }
    }

    fn subtype_options(&self) -> Vec<String> {
        match self.form.class {
            Some(class) => class.subtypes().iter().map(|s| s.to_string()).collect(),
            None => vec![SUBTYPE_NONE.to_string()],
        }
    }

    fn back(&mut self) {
        let target = match self.screen {
            ScreenId::AssetDetails => {
                self.open_asset = None;
                ScreenId::AssetList
            }
            ScreenId::ChildSection | ScreenId::EditAsset | ScreenId::CreateIssue => {
                ScreenId::AssetDetails
            }
            ScreenId::AddChildMenu | ScreenId::LinkExistingNodes => ScreenId::ChildSection,
            ScreenId::CreateAsset if self.form.parent.is_some() => ScreenId::ChildSection,
            ScreenId::CreateAsset => ScreenId::AssetList,
            ScreenId::IssueDetails => ScreenId::IssueList,
            other => other,
        };
        self.child_menu = None;
        self.confirm_unlink = false;
        self.confirm_delete = false;
        self.transition(target);
    }

    fn save_asset(&mut self) -> E2eResult<()> {
        let Some(class) = self.form.class else {
            self.stats.rejected_saves += 1;
            debug!("Sim rejected save: no class");
            return Ok(());
        };
        let name = self.form.name.trim().to_string();
        let duplicate = self
            .assets
            .iter()
            .any(|a| a.name == name && self.form.editing.as_deref() != Some(a.name.as_str()));
        let subtype = if self.form.subtype.is_empty() {
            SUBTYPE_NONE.to_string()
        } else {
            self.form.subtype.clone()
        };
        if name.is_empty() || duplicate || !class.accepts_subtype(&subtype) {
            self.stats.rejected_saves += 1;
            debug!(%name, duplicate, "Sim rejected save");
            return Ok(());
        }

        if let Some(original) = self.form.editing.take() {
            for asset in self.assets.iter_mut() {
                if asset.parent.as_deref() == Some(original.as_str()) {
                    asset.parent = Some(name.clone());
                }
            }
            let asset = self
                .asset_mut(&original)
                .ok_or_else(|| not_found(format!("asset {original}")))?;
            asset.name = name.clone();
            asset.class = class;
            asset.subtype = subtype;
            self.open_asset = Some(name);
            self.transition(ScreenId::AssetDetails);
            return Ok(());
        }

        let mut asset = Asset::new(name.clone(), class, Some(&subtype))?;
        match self.form.parent.clone() {
            Some(parent_name) => {
                let parent = self
                    .asset(&parent_name)
                    .cloned()
                    .ok_or_else(|| not_found(format!("asset {parent_name}")))?;
                asset.link_to(&parent)?;
                self.stats.links_added += 1;
                self.open_asset = Some(parent_name);
            }
            None => self.open_asset = Some(name),
        }
        self.assets.push(asset);
        self.stats.assets_created += 1;
        self.transition(ScreenId::AssetDetails);
        Ok(())
    }

    fn save_issue(&mut self) -> E2eResult<()> {
        let title = self.form.issue_title.trim().to_string();
        if title.is_empty() {
            self.stats.rejected_saves += 1;
            return Ok(());
        }
        let asset = self.open_asset.clone().unwrap_or_default();
        self.issues.push(Issue::new(title.clone(), asset)?);
        self.open_issue = Some(title);
        self.transition(ScreenId::IssueDetails);
        Ok(())
    }

    fn tap(&mut self, control: &Control) -> E2eResult<()> {
        use ScreenId as S;

        match (control, self.screen) {
            (Control::AddChild, S::ChildSection) => self.transition(S::AddChildMenu),
            (Control::CreateNewChild, S::AddChildMenu) => {
                self.form = Form {
                    parent: self.open_asset.clone(),
                    ..Form::default()
                };
                self.transition(S::CreateAsset);
            }
            (Control::LinkExistingChild, S::AddChildMenu) => {
                self.selection.clear();
                self.transition(S::LinkExistingNodes);
            }
            (Control::Candidate(name), S::LinkExistingNodes) => {
                let parent = self.open_parent()?.clone();
                if !self.linkable_under(&parent).contains(name) {
                    return Err(not_found(control.name()));
                }
                if let Some(pos) = self.selection.iter().position(|s| s == name) {
                    self.selection.remove(pos);
                } else {
                    self.selection.push(name.clone());
                }
            }
            (Control::LinkSelected, S::LinkExistingNodes) => {
                let parent = self.open_parent()?.clone();
                for name in std::mem::take(&mut self.selection) {
                    if let Some(child) = self.asset_mut(&name) {
                        child.link_to(&parent)?;
                        self.stats.links_added += 1;
                    }
                }
                self.transition(S::ChildSection);
            }
            (Control::ChildOptions(name), S::ChildSection) => {
                let parent = self.open_parent()?.name.clone();
                if !self.linked_under(&parent).contains(name) {
                    return Err(not_found(control.name()));
                }
                self.child_menu = Some(name.clone());
            }
            (Control::RemoveLink, S::ChildSection) if self.child_menu.is_some() => {
                self.confirm_unlink = true;
            }
            (Control::ConfirmRemoveLink, S::ChildSection) if self.confirm_unlink => {
                self.confirm_unlink = false;
                if let Some(name) = self.child_menu.take() {
                    if let Some(child) = self.asset_mut(&name) {
                        child.unlink()?;
                        self.stats.links_removed += 1;
                    }
                }
            }
            (Control::CreateAsset, S::AssetList) => {
                self.form = Form::default();
                self.transition(S::CreateAsset);
            }
            (Control::EditAsset, S::AssetDetails) => {
                let asset = self.open_parent()?;
                self.form = Form {
                    name: asset.name.clone(),
                    class: Some(asset.class),
                    subtype: asset.subtype.clone(),
                    editing: Some(asset.name.clone()),
                    ..Form::default()
                };
                self.transition(S::EditAsset);
            }
            (Control::DeleteAsset, S::AssetDetails) => self.confirm_delete = true,
            (Control::ConfirmDelete, S::AssetDetails) if self.confirm_delete => {
                self.confirm_delete = false;
                if let Some(name) = self.open_asset.take() {
                    self.assets.retain(|a| a.name != name);
                    for asset in self.assets.iter_mut() {
                        if asset.parent.as_deref() == Some(name.as_str()) {
                            asset.parent = None;
                        }
                    }
                    self.stats.assets_deleted += 1;
                }
                self.transition(S::AssetList);
            }
            (Control::CreateIssue, S::AssetDetails) => {
                self.form.issue_title.clear();
                self.transition(S::CreateIssue);
            }
            (Control::Issue(title), S::IssueList) => {
                if !self.issues.iter().any(|i| &i.title == title) {
                    return Err(not_found(control.name()));
                }
                self.open_issue = Some(title.clone());
                self.transition(S::IssueDetails);
            }
            (Control::Save, S::CreateAsset | S::EditAsset) => self.save_asset()?,
            (Control::Save, S::CreateIssue) => self.save_issue()?,
            (Control::Cancel, S::CreateAsset | S::EditAsset | S::CreateIssue) => self.back(),
            (Control::Back, _) => self.back(),
            _ => return Err(not_found(format!("{} (on {})", control.name(), self.screen))),
        }
        Ok(())
    }
}

/// Simulated app session
#[derive(Debug, Default)]
pub struct SimulatedApp {
    state: Mutex<SimState>,
}

impl SimulatedApp {
    /// Empty app showing the asset list
    pub fn new() -> Self {
        Self::default()
    }

    /// App preloaded with a small plant: two MCCs (one with linked
    /// breakers, one empty) and a handful of unlinked assets
    pub fn demo() -> E2eResult<Self> {
        let app = Self::new();
        app.add_asset("MCC-100", AssetClass::Mcc, Some("Motor Control Equipment (<=1000V)"))?;
        app.add_asset("MCC-200", AssetClass::Mcc, None)?;
        app.add_asset("CB-101", AssetClass::CircuitBreaker, None)?;
        app.add_asset("CB-102", AssetClass::CircuitBreaker, None)?;
        app.add_asset("F-500", AssetClass::Fuse, None)?;
        app.add_asset("JB-300", AssetClass::JunctionBox, None)?;
        app.add_asset("M-400", AssetClass::Motor, None)?;
        app.add_asset("TX-600", AssetClass::Transformer, None)?;
        app.link("CB-101", "MCC-100")?;
        app.link("CB-102", "MCC-100")?;
        Ok(app)
    }

    /// Insert an asset directly, bypassing the UI
    pub fn add_asset(&self, name: &str, class: AssetClass, subtype: Option<&str>) -> E2eResult<()> {
        let mut state = self.state.lock();
        if state.asset(name).is_some() {
            return Err(assetops_common::Error::AlreadyExists {
                kind: "asset".to_string(),
                name: name.to_string(),
            }
            .into());
        }
        let asset = Asset::new(name, class, subtype)?;
        state.assets.push(asset);
        Ok(())
    }

    /// Link `child` under `parent` directly, bypassing the UI
    pub fn link(&self, child: &str, parent: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        let parent = state
            .asset(parent)
            .cloned()
            .ok_or_else(|| assetops_common::Error::NotFound {
                kind: "asset".to_string(),
                name: parent.to_string(),
            })?;
        let child_asset = state
            .asset_mut(child)
            .ok_or_else(|| assetops_common::Error::NotFound {
                kind: "asset".to_string(),
                name: child.to_string(),
            })?;
        child_asset.link_to(&parent)?;
        Ok(())
    }

    /// Number of `is_displayed` calls that return false after each transition
    pub fn with_render_lag(self, checks: u32) -> Self {
        self.state.lock().render_lag = checks;
        self
    }

    /// Navigation toward `screen` never takes effect
    pub fn with_unreachable(self, screen: ScreenId) -> Self {
        self.state.lock().unreachable.insert(screen);
        self
    }

    /// Navigation toward `screen` raises a driver error
    pub fn with_navigation_fault(self, screen: ScreenId, message: &str) -> Self {
        self.state.lock().faults.insert(screen, message.to_string());
        self
    }

    /// Taps on the named control are accepted but do nothing
    pub fn with_silent_control(self, control: &Control) -> Self {
        self.state.lock().silent_controls.insert(control.name());
        self
    }

    /// Stop swallowing taps on the named control
    pub fn restore_control(&self, control: &Control) {
        self.state.lock().silent_controls.remove(&control.name());
    }

    /// Jump to a screen without counting it as navigation
    pub fn show(&self, screen: ScreenId) {
        let mut state = self.state.lock();
        state.screen = screen;
        state.pending_lag = 0;
    }

    pub fn stats(&self) -> SimStats {
        self.state.lock().stats.clone()
    }

    pub fn reset_stats(&self) {
        self.state.lock().stats = SimStats::default();
    }

    pub fn current_screen(&self) -> ScreenId {
        self.state.lock().screen
    }

    pub fn asset_count(&self) -> usize {
        self.state.lock().assets.len()
    }

    pub fn has_asset(&self, name: &str) -> bool {
        self.state.lock().asset(name).is_some()
    }

    pub fn issue_count(&self) -> usize {
        self.state.lock().issues.len()
    }

    pub fn linked_children_of(&self, parent: &str) -> Vec<String> {
        self.state.lock().linked_under(parent)
    }

    pub fn linkable_under(&self, parent: &str) -> Vec<String> {
        let state = self.state.lock();
        match state.asset(parent) {
            Some(parent) => state.linkable_under(parent),
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl UiDriver for SimulatedApp {
    async fn is_displayed(&self, screen: ScreenId) -> E2eResult<bool> {
        let mut state = self.state.lock();
        *state.stats.checks.entry(screen).or_default() += 1;
        if state.pending_lag > 0 {
            state.pending_lag -= 1;
            return Ok(false);
        }
        Ok(state.screen == screen)
    }

    async fn go_to(&self, screen: ScreenId) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.stats.navigations += 1;

        if let Some(message) = state.faults.get(&screen) {
            return Err(E2eError::Driver(message.clone()));
        }
        if state.unreachable.contains(&screen) {
            return Ok(());
        }

        match screen {
            // only reachable through taps
            ScreenId::CreateAsset | ScreenId::CreateIssue | ScreenId::IssueDetails => Ok(()),
            ScreenId::AssetList
            | ScreenId::IssueList
            | ScreenId::TaskList
            | ScreenId::Connections => {
                state.open_asset = None;
                state.child_menu = None;
                state.transition(screen);
                Ok(())
            }
            _ => {
                let accepts_children = match state.open_parent() {
                    Ok(asset) => asset.class.accepts_children(),
                    Err(_) => return Ok(()),
                };
                let needs_children = matches!(
                    screen,
                    ScreenId::ChildSection | ScreenId::AddChildMenu | ScreenId::LinkExistingNodes
                );
                if needs_children && !accepts_children {
                    return Ok(());
                }
                if screen == ScreenId::LinkExistingNodes {
                    state.selection.clear();
                }
                state.transition(screen);
                Ok(())
            }
        }
    }

    async fn open_asset(&self, name: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.require_screen(ScreenId::AssetList, &format!("asset_row:{name}"))?;
        if state.asset(name).is_none() {
            return Err(not_found(format!("asset_row:{name}")));
        }
        state.open_asset = Some(name.to_string());
        state.transition(ScreenId::AssetDetails);
        Ok(())
    }

    async fn scroll(&self, direction: ScrollDirection) -> E2eResult<()> {
        let mut state = self.state.lock();
        match (direction, state.screen) {
            (ScrollDirection::Down, ScreenId::AssetDetails) => {
                if state.open_parent()?.class.accepts_children() {
                    state.transition(ScreenId::ChildSection);
                }
            }
            (ScrollDirection::Up, ScreenId::ChildSection) => {
                state.transition(ScreenId::AssetDetails)
            }
            _ => {}
        }
        Ok(())
    }

    async fn tap(&self, control: &Control) -> E2eResult<()> {
        let mut state = self.state.lock();
        if state.silent_controls.contains(&control.name()) {
            state.stats.swallowed_taps += 1;
            debug!(control = %control, "Sim swallowed tap");
            return Ok(());
        }
        state.tap(control)
    }

    async fn enter_text(&self, field: &Field, value: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        match (field, state.screen) {
            (Field::Search, ScreenId::AssetList) => {
                state.search = (!value.is_empty()).then(|| value.to_string());
            }
            (Field::AssetName, ScreenId::CreateAsset | ScreenId::EditAsset) => {
                state.form.name = value.to_string();
            }
            (Field::IssueTitle, ScreenId::CreateIssue) => {
                state.form.issue_title = value.to_string();
            }
            (Field::AssetClass | Field::AssetSubtype, _) => {
                return Err(E2eError::Driver(format!("{field} is a dropdown")));
            }
            _ => return Err(not_found(format!("{field} (on {})", state.screen))),
        }
        Ok(())
    }

    async fn select_from_dropdown(&self, field: &Field, value: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        if !state.on_form() {
            return Err(not_found(format!("{field} (on {})", state.screen)));
        }
        let options = match field {
            Field::AssetClass => state.class_options(),
            Field::AssetSubtype => state.subtype_options(),
            _ => return Err(E2eError::Driver(format!("{field} is not a dropdown"))),
        };
        if !options.iter().any(|o| o == value) {
            return Err(E2eError::InvalidOption {
                field: field.to_string(),
                value: value.to_string(),
            });
        }
        match field {
            Field::AssetClass => {
                state.form.class = Some(value.parse()?);
                state.form.subtype = SUBTYPE_NONE.to_string();
            }
            _ => state.form.subtype = value.to_string(),
        }
        Ok(())
    }

    async fn dropdown_options(&self, field: &Field) -> E2eResult<Vec<String>> {
        let state = self.state.lock();
        if !state.on_form() {
            return Err(not_found(format!("{field} (on {})", state.screen)));
        }
        match field {
            Field::AssetClass => Ok(state.class_options()),
            Field::AssetSubtype => Ok(state.subtype_options()),
            _ => Err(E2eError::Driver(format!("{field} is not a dropdown"))),
        }
    }

    async fn read_text(&self, field: &Field) -> E2eResult<String> {
        let state = self.state.lock();
        let text = match (field, state.screen) {
            (Field::AssetName, ScreenId::CreateAsset | ScreenId::EditAsset) => {
                state.form.name.clone()
            }
            (Field::AssetClass, ScreenId::CreateAsset | ScreenId::EditAsset) => state
                .form
                .class
                .map(|c| c.label().to_string())
                .unwrap_or_default(),
            (Field::AssetSubtype, ScreenId::CreateAsset | ScreenId::EditAsset) => {
                if state.form.subtype.is_empty() {
                    SUBTYPE_NONE.to_string()
                } else {
                    state.form.subtype.clone()
                }
            }
            (Field::AssetName, ScreenId::AssetDetails) => state.open_parent()?.name.clone(),
            (Field::AssetClass, ScreenId::AssetDetails) => state.open_parent()?.class.to_string(),
            (Field::AssetSubtype, ScreenId::AssetDetails) => state.open_parent()?.subtype.clone(),
            (Field::Search, ScreenId::AssetList) => state.search.clone().unwrap_or_default(),
            (Field::IssueTitle, ScreenId::CreateIssue) => state.form.issue_title.clone(),
            (Field::IssueTitle, ScreenId::IssueDetails) => {
                state.open_issue.clone().unwrap_or_default()
            }
            _ => return Err(not_found(format!("{field} (on {})", state.screen))),
        };
        Ok(text)
    }

    async fn is_element_visible(&self, element: &str) -> E2eResult<bool> {
        let state = self.state.lock();
        Ok(elements_of(state.screen).contains(&element))
    }

    async fn list(&self, query: Query) -> E2eResult<Vec<String>> {
        let state = self.state.lock();
        state.require_screen(query.screen(), &query.to_string())?;
        let rows = match query {
            Query::LinkedChildren => state.linked_under(&state.open_parent()?.name),
            Query::LinkableNodes => state.linkable_under(state.open_parent()?),
            Query::SearchResults => {
                let term = state.search.as_deref().map(str::to_lowercase);
                state
                    .assets
                    .iter()
                    .filter(|a| match &term {
                        Some(term) => a.name.to_lowercase().contains(term.as_str()),
                        None => true,
                    })
                    .map(|a| a.name.clone())
                    .collect()
            }
            Query::Issues => state.issues.iter().map(|i| i.title.clone()).collect(),
        };
        Ok(rows)
    }
}
