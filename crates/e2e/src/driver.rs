//! UI driver contract
//!
//! The harness never touches locators or gestures directly. Everything it
//! needs from the device session goes through [`UiDriver`], implemented by
//! [`crate::appium::AppiumDriver`] for real devices and
//! [`crate::sim::SimulatedApp`] for self-contained runs.

use async_trait::async_trait;

use assetops_common::{Control, Field, Query, ScreenId, ScrollDirection};

use crate::error::E2eResult;

#[async_trait]
pub trait UiDriver: Send + Sync {
    /// Whether `screen` is currently displayed
    async fn is_displayed(&self, screen: ScreenId) -> E2eResult<bool>;

    /// Perform the navigation action that should lead to `screen`.
    ///
    /// Success only means the action was performed, not that the screen
    /// has rendered.
    async fn go_to(&self, screen: ScreenId) -> E2eResult<()>;

    /// Open an asset's details from the asset list
    async fn open_asset(&self, name: &str) -> E2eResult<()>;

    async fn scroll(&self, direction: ScrollDirection) -> E2eResult<()>;

    async fn tap(&self, control: &Control) -> E2eResult<()>;

    async fn enter_text(&self, field: &Field, value: &str) -> E2eResult<()>;

    async fn select_from_dropdown(&self, field: &Field, value: &str) -> E2eResult<()>;

    /// Options currently offered by a dropdown
    async fn dropdown_options(&self, field: &Field) -> E2eResult<Vec<String>>;

    /// Displayed value of a field
    async fn read_text(&self, field: &Field) -> E2eResult<String>;

    /// Whether a named sub-element is visible on the current screen
    async fn is_element_visible(&self, element: &str) -> E2eResult<bool>;

    /// Row labels answering `query` on the current screen
    async fn list(&self, query: Query) -> E2eResult<Vec<String>>;

    async fn count(&self, query: Query) -> E2eResult<usize> {
        Ok(self.list(query).await?.len())
    }
}
