//! Screen descriptors

use serde::Serialize;

use assetops_common::ScreenId;

/// A named screen and the sub-elements that make up a full render of it.
///
/// Descriptors carry no state; whether a screen is showing is always asked
/// of the driver again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Screen {
    pub id: ScreenId,
    pub elements: &'static [&'static str],
}

impl Screen {
    pub fn of(id: ScreenId) -> Self {
        Self {
            id,
            elements: elements_of(id),
        }
    }

    /// Descriptors for every known screen
    pub fn catalog() -> Vec<Screen> {
        ScreenId::ALL.iter().copied().map(Screen::of).collect()
    }
}

impl From<ScreenId> for Screen {
    fn from(id: ScreenId) -> Self {
        Screen::of(id)
    }
}

/// Ordered sub-elements of each screen
pub fn elements_of(id: ScreenId) -> &'static [&'static str] {
    match id {
        ScreenId::AssetList => &["asset_search_box", "asset_list_rows", "create_asset_button"],
        ScreenId::AssetDetails => &["asset_title", "asset_class_label", "edit_asset_button"],
        ScreenId::EditAsset | ScreenId::CreateAsset => &[
            "asset_name_input",
            "asset_class_dropdown",
            "asset_subtype_dropdown",
            "save_button",
        ],
        ScreenId::ChildSection => &["ocp_section_header", "add_child_button"],
        ScreenId::AddChildMenu => &["create_new_child_option", "link_existing_child_option"],
        ScreenId::LinkExistingNodes => &["linkable_node_rows", "link_selected_button"],
        ScreenId::IssueList => &["issue_list_rows", "issue_filter"],
        ScreenId::IssueDetails => &["issue_title_label", "issue_asset_label"],
        ScreenId::CreateIssue => &["issue_title_input", "save_button"],
        ScreenId::TaskList => &["task_list_rows"],
        ScreenId::Connections => &["connection_rows"],
    }
}
