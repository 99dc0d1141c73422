//! Core types for the asset-management domain

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Subtype value every class accepts
pub const SUBTYPE_NONE: &str = "None";

/// Asset class as offered by the class dropdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetClass {
    #[serde(rename = "Busway")]
    Busway,
    #[serde(rename = "Circuit Breaker")]
    CircuitBreaker,
    #[serde(rename = "Fuse")]
    Fuse,
    #[serde(rename = "Junction Box")]
    JunctionBox,
    #[serde(rename = "MCC")]
    Mcc,
    #[serde(rename = "Motor")]
    Motor,
    #[serde(rename = "Panelboard")]
    Panelboard,
    #[serde(rename = "Transformer")]
    Transformer,
}

impl AssetClass {
    /// Every class, in dropdown order
    pub const ALL: [AssetClass; 8] = [
        AssetClass::Busway,
        AssetClass::CircuitBreaker,
        AssetClass::Fuse,
        AssetClass::JunctionBox,
        AssetClass::Mcc,
        AssetClass::Motor,
        AssetClass::Panelboard,
        AssetClass::Transformer,
    ];

    /// Label shown in the UI
    pub fn label(&self) -> &'static str {
        match self {
            AssetClass::Busway => "Busway",
            AssetClass::CircuitBreaker => "Circuit Breaker",
            AssetClass::Fuse => "Fuse",
            AssetClass::JunctionBox => "Junction Box",
            AssetClass::Mcc => "MCC",
            AssetClass::Motor => "Motor",
            AssetClass::Panelboard => "Panelboard",
            AssetClass::Transformer => "Transformer",
        }
    }

    /// Subtype domain for this class, in dropdown order.
    ///
    /// The first entry is always [`SUBTYPE_NONE`].
    pub fn subtypes(&self) -> &'static [&'static str] {
        match self {
            AssetClass::Mcc => &[
                SUBTYPE_NONE,
                "Motor Control Equipment (<=1000V)",
                "Motor Control Equipment (>1000V)",
            ],
            _ => &[SUBTYPE_NONE],
        }
    }

    /// Whether `subtype` belongs to this class's domain
    pub fn accepts_subtype(&self, subtype: &str) -> bool {
        self.subtypes().contains(&subtype)
    }

    /// Over-current protection classes
    pub fn is_ocp(&self) -> bool {
        matches!(self, AssetClass::CircuitBreaker | AssetClass::Fuse)
    }

    /// Classes that may be linked as children under this class
    pub fn linkable_child_classes(&self) -> &'static [AssetClass] {
        match self {
            AssetClass::Mcc => &[AssetClass::CircuitBreaker, AssetClass::Fuse],
            _ => &[],
        }
    }

    /// Whether this class owns a child section at all
    pub fn accepts_children(&self) -> bool {
        !self.linkable_child_classes().is_empty()
    }

    /// Whether `child` may be linked under this class
    pub fn can_link(&self, child: AssetClass) -> bool {
        self.linkable_child_classes().contains(&child)
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AssetClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AssetClass::ALL
            .iter()
            .copied()
            .find(|class| class.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownClass(s.to_string()))
    }
}

/// An asset record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub class: AssetClass,
    pub subtype: String,
    /// Name of the parent this asset is linked under
    #[serde(default)]
    pub parent: Option<String>,
    pub created_at: i64,
}

impl Asset {
    /// Create an unlinked asset, validating the name and subtype
    pub fn new(name: impl Into<String>, class: AssetClass, subtype: Option<&str>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::EmptyName);
        }
        let subtype = subtype.unwrap_or(SUBTYPE_NONE);
        if !class.accepts_subtype(subtype) {
            return Err(Error::InvalidSubtype {
                class: class.to_string(),
                subtype: subtype.to_string(),
            });
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            class,
            subtype: subtype.to_string(),
            parent: None,
            created_at: chrono::Utc::now().timestamp(),
        })
    }

    pub fn is_linked(&self) -> bool {
        self.parent.is_some()
    }

    /// Link this asset under `parent`
    pub fn link_to(&mut self, parent: &Asset) -> Result<()> {
        if let Some(existing) = &self.parent {
            return Err(Error::AlreadyLinked {
                child: self.name.clone(),
                parent: existing.clone(),
            });
        }
        if !parent.class.can_link(self.class) {
            return Err(Error::NotLinkable {
                parent: parent.class.to_string(),
                child: self.class.to_string(),
            });
        }
        self.parent = Some(parent.name.clone());
        Ok(())
    }

    /// Detach this asset from its parent
    pub fn unlink(&mut self) -> Result<String> {
        self.parent.take().ok_or_else(|| Error::NotLinked(self.name.clone()))
    }

    /// Whether this asset can be offered in `parent`'s link picker
    pub fn is_linkable_under(&self, parent: &Asset) -> bool {
        !self.is_linked() && self.name != parent.name && parent.class.can_link(self.class)
    }
}

/// An issue raised against an asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub asset: String,
    pub created_at: i64,
}

impl Issue {
    pub fn new(title: impl Into<String>, asset: impl Into<String>) -> Result<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(Error::EmptyName);
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            title,
            asset: asset.into(),
            created_at: chrono::Utc::now().timestamp(),
        })
    }
}

/// Candidates eligible to be linked under a parent, not already linked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkableNodeSet {
    pub parent: String,
    pub candidates: Vec<String>,
}

impl LinkableNodeSet {
    pub fn new(parent: impl Into<String>, candidates: Vec<String>) -> Self {
        Self {
            parent: parent.into(),
            candidates,
        }
    }

    pub fn cardinality(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.candidates.iter().any(|c| c == name)
    }
}

/// Named UI states of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenId {
    AssetList,
    AssetDetails,
    EditAsset,
    CreateAsset,
    /// The OCP child section of an opened parent asset
    ChildSection,
    AddChildMenu,
    LinkExistingNodes,
    IssueList,
    IssueDetails,
    CreateIssue,
    TaskList,
    Connections,
}

impl ScreenId {
    pub const ALL: [ScreenId; 12] = [
        ScreenId::AssetList,
        ScreenId::AssetDetails,
        ScreenId::EditAsset,
        ScreenId::CreateAsset,
        ScreenId::ChildSection,
        ScreenId::AddChildMenu,
        ScreenId::LinkExistingNodes,
        ScreenId::IssueList,
        ScreenId::IssueDetails,
        ScreenId::CreateIssue,
        ScreenId::TaskList,
        ScreenId::Connections,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenId::AssetList => "asset_list",
            ScreenId::AssetDetails => "asset_details",
            ScreenId::EditAsset => "edit_asset",
            ScreenId::CreateAsset => "create_asset",
            ScreenId::ChildSection => "child_section",
            ScreenId::AddChildMenu => "add_child_menu",
            ScreenId::LinkExistingNodes => "link_existing_nodes",
            ScreenId::IssueList => "issue_list",
            ScreenId::IssueDetails => "issue_details",
            ScreenId::CreateIssue => "create_issue",
            ScreenId::TaskList => "task_list",
            ScreenId::Connections => "connections",
        }
    }

    /// Screens that only exist in the context of an opened asset
    pub fn requires_open_asset(&self) -> bool {
        matches!(
            self,
            ScreenId::AssetDetails
                | ScreenId::EditAsset
                | ScreenId::ChildSection
                | ScreenId::AddChildMenu
                | ScreenId::LinkExistingNodes
                | ScreenId::CreateIssue
        )
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tappable controls
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    AddChild,
    CreateNewChild,
    LinkExistingChild,
    /// A row in the link picker
    Candidate(String),
    LinkSelected,
    /// The options menu of a linked child row
    ChildOptions(String),
    RemoveLink,
    ConfirmRemoveLink,
    CreateAsset,
    EditAsset,
    DeleteAsset,
    ConfirmDelete,
    CreateIssue,
    /// An issue row in the issue list
    Issue(String),
    Save,
    Cancel,
    Back,
    /// Any other control, addressed by its locator name
    Named(String),
}

impl Control {
    /// Locator-style name of this control
    pub fn name(&self) -> String {
        match self {
            Control::AddChild => "add_child".to_string(),
            Control::CreateNewChild => "create_new_child".to_string(),
            Control::LinkExistingChild => "link_existing_child".to_string(),
            Control::Candidate(name) => format!("candidate:{name}"),
            Control::LinkSelected => "link_selected".to_string(),
            Control::ChildOptions(name) => format!("child_options:{name}"),
            Control::RemoveLink => "remove_link".to_string(),
            Control::ConfirmRemoveLink => "confirm_remove_link".to_string(),
            Control::CreateAsset => "create_asset".to_string(),
            Control::EditAsset => "edit_asset".to_string(),
            Control::DeleteAsset => "delete_asset".to_string(),
            Control::ConfirmDelete => "confirm_delete".to_string(),
            Control::CreateIssue => "create_issue".to_string(),
            Control::Issue(title) => format!("issue:{title}"),
            Control::Save => "save".to_string(),
            Control::Cancel => "cancel".to_string(),
            Control::Back => "back".to_string(),
            Control::Named(name) => name.clone(),
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Data-entry fields
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    AssetName,
    AssetClass,
    AssetSubtype,
    Search,
    IssueTitle,
    Named(String),
}

impl Field {
    pub fn name(&self) -> &str {
        match self {
            Field::AssetName => "asset_name",
            Field::AssetClass => "asset_class",
            Field::AssetSubtype => "asset_subtype",
            Field::Search => "search",
            Field::IssueTitle => "issue_title",
            Field::Named(name) => name,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// List queries answered by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    /// Children listed in the open parent's child section
    LinkedChildren,
    /// Candidates listed in the link picker
    LinkableNodes,
    /// Rows of the asset list under the current search term
    SearchResults,
    /// Rows of the issue list
    Issues,
}

impl Query {
    /// Screen on which the query can be answered
    pub fn screen(&self) -> ScreenId {
        match self {
            Query::LinkedChildren => ScreenId::ChildSection,
            Query::LinkableNodes => ScreenId::LinkExistingNodes,
            Query::SearchResults => ScreenId::AssetList,
            Query::Issues => ScreenId::IssueList,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Query::LinkedChildren => "linked_children",
            Query::LinkableNodes => "linkable_nodes",
            Query::SearchResults => "search_results",
            Query::Issues => "issues",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Generate a name that no existing asset carries.
///
/// Millisecond timestamp plus a short random suffix, so two calls in the
/// same millisecond still differ.
pub fn unique_name(prefix: &str) -> String {
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S%3f");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{stamp}-{}", &suffix[..6])
}

/// A search term salted with the current timestamp so it cannot match any asset
pub fn salted_term(base: &str) -> String {
    format!("{base}~{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
}
