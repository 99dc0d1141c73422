//! Appium driver over the W3C WebDriver JSON protocol
//!
//! Every screen, control, field and list query is addressed by an
//! accessibility id. The ids default to the harness's own names
//! (`add_child`, `asset_name`, `child_options:CB-1`, ...) and can be
//! remapped per app build through [`AppiumConfig::locators`].

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use assetops_common::{Control, Field, Query, ScreenId, ScrollDirection};

use crate::driver::UiDriver;
use crate::error::{E2eError, E2eResult};

/// Key under which W3C drivers return element references
const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
/// Legacy JSON wire protocol key
const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppiumConfig {
    /// Appium server base URL
    pub url: String,
    /// Capabilities sent as `alwaysMatch`
    pub capabilities: Map<String, Value>,
    pub request_timeout_secs: u64,
    /// Screen name -> accessibility id of the element marking that screen
    pub screens: BTreeMap<String, String>,
    /// Screen name -> how to get there: a control id, `back`, or `scroll:up|down`
    pub routes: BTreeMap<String, String>,
    /// Harness name -> accessibility id overrides
    pub locators: BTreeMap<String, String>,
}

impl Default for AppiumConfig {
    fn default() -> Self {
        let mut capabilities = Map::new();
        capabilities.insert("platformName".to_string(), json!("Android"));
        capabilities.insert("appium:automationName".to_string(), json!("UiAutomator2"));
        capabilities.insert("appium:noReset".to_string(), json!(true));

        let screens = ScreenId::ALL
            .iter()
            .map(|screen| (screen.as_str().to_string(), format!("{screen}_screen")))
            .collect();

        let routes = [
            (ScreenId::AssetList, "tab_assets"),
            (ScreenId::AssetDetails, "back"),
            (ScreenId::ChildSection, "scroll:down"),
            (ScreenId::EditAsset, "edit_asset"),
            (ScreenId::AddChildMenu, "add_child"),
            (ScreenId::LinkExistingNodes, "link_existing_child"),
            (ScreenId::IssueList, "tab_issues"),
            (ScreenId::TaskList, "tab_tasks"),
            (ScreenId::Connections, "tab_connections"),
        ]
        .into_iter()
        .map(|(screen, route)| (screen.as_str().to_string(), route.to_string()))
        .collect();

        Self {
            url: "http://127.0.0.1:4723".to_string(),
            capabilities,
            request_timeout_secs: 30,
            screens,
            routes,
            locators: BTreeMap::new(),
        }
    }
}

impl AppiumConfig {
    /// Accessibility id for a harness name
    pub fn locator(&self, name: &str) -> String {
        self.locators
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    pub fn screen_marker(&self, screen: ScreenId) -> String {
        self.screens
            .get(screen.as_str())
            .cloned()
            .unwrap_or_else(|| format!("{screen}_screen"))
    }

    pub fn route(&self, screen: ScreenId) -> Option<&str> {
        self.routes.get(screen.as_str()).map(String::as_str)
    }
}

/// Row element name answering a list query
fn query_rows(query: Query) -> &'static str {
    match query {
        Query::LinkedChildren => "linked_child_row",
        Query::LinkableNodes => "linkable_node_row",
        Query::SearchResults => "asset_row",
        Query::Issues => "issue_row",
    }
}

/// Pull an element reference out of a find-element response value
fn element_id(value: &Value) -> Option<String> {
    value
        .get(W3C_ELEMENT_KEY)
        .or_else(|| value.get(LEGACY_ELEMENT_KEY))
        .and_then(Value::as_str)
        .map(String::from)
}

/// Map a W3C error payload (`{"value": {"error": ..., "message": ...}}`)
fn protocol_error(body: &Value) -> Option<E2eError> {
    let value = body.get("value")?;
    let code = value.get("error")?.as_str()?;
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Some(match code {
        "no such element" | "stale element reference" => {
            E2eError::ElementNotFound(message.to_string())
        }
        _ => E2eError::Session(format!("{code}: {message}")),
    })
}

pub struct AppiumDriver {
    http: reqwest::Client,
    config: AppiumConfig,
    session_id: String,
}

impl AppiumDriver {
    /// Open a new session. With `appium:noReset` the app keeps its data
    /// between sessions.
    pub async fn connect(config: AppiumConfig) -> E2eResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let body = json!({ "capabilities": { "alwaysMatch": config.capabilities } });
        let resp = http
            .post(format!("{}/session", config.url.trim_end_matches('/')))
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let payload: Value = resp.json().await?;
        if let Some(err) = protocol_error(&payload) {
            return Err(err);
        }
        if !status.is_success() {
            return Err(E2eError::Session(format!("session request returned {status}")));
        }

        let session_id = payload
            .pointer("/value/sessionId")
            .or_else(|| payload.get("sessionId"))
            .and_then(Value::as_str)
            .ok_or_else(|| E2eError::Session("no sessionId in response".to_string()))?
            .to_string();

        info!(session = %session_id, url = %config.url, "Appium session started");
        Ok(Self {
            http,
            config,
            session_id,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// End the session
    pub async fn quit(self) -> E2eResult<()> {
        self.command(Method::DELETE, "", None).await?;
        info!(session = %self.session_id, "Appium session closed");
        Ok(())
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> E2eResult<Value> {
        let url = format!(
            "{}/session/{}{}",
            self.config.url.trim_end_matches('/'),
            self.session_id,
            path
        );
        debug!(%method, %url, "WebDriver command");

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let resp = request.send().await?;
        let status = resp.status();
        let payload: Value = resp.json().await?;

        if let Some(err) = protocol_error(&payload) {
            return Err(err);
        }
        if !status.is_success() {
            return Err(E2eError::Session(format!("{url} returned {status}")));
        }
        Ok(payload.get("value").cloned().unwrap_or(Value::Null))
    }

    /// Find by accessibility id; `None` when absent
    async fn find(&self, name: &str) -> E2eResult<Option<String>> {
        let body = json!({ "using": "accessibility id", "value": self.config.locator(name) });
        match self.command(Method::POST, "/element", Some(body)).await {
            Ok(value) => Ok(element_id(&value)),
            Err(E2eError::ElementNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn find_required(&self, name: &str) -> E2eResult<String> {
        self.find(name)
            .await?
            .ok_or_else(|| E2eError::ElementNotFound(name.to_string()))
    }

    async fn find_all(&self, name: &str) -> E2eResult<Vec<String>> {
        let body = json!({ "using": "accessibility id", "value": self.config.locator(name) });
        let value = self.command(Method::POST, "/elements", Some(body)).await?;
        Ok(value
            .as_array()
            .map(|items| items.iter().filter_map(element_id).collect())
            .unwrap_or_default())
    }

    async fn click(&self, element: &str) -> E2eResult<()> {
        self.command(Method::POST, &format!("/element/{element}/click"), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn text_of(&self, element: &str) -> E2eResult<String> {
        let value = self
            .command(Method::GET, &format!("/element/{element}/text"), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn displayed(&self, element: &str) -> E2eResult<bool> {
        let value = self
            .command(Method::GET, &format!("/element/{element}/displayed"), None)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn tap_name(&self, name: &str) -> E2eResult<()> {
        let element = self.find_required(name).await?;
        self.click(&element).await
    }

    async fn back(&self) -> E2eResult<()> {
        self.command(Method::POST, "/back", Some(json!({}))).await?;
        Ok(())
    }

    async fn visible(&self, name: &str) -> E2eResult<bool> {
        match self.find(name).await? {
            Some(element) => self.displayed(&element).await,
            None => Ok(false),
        }
    }
}

#[async_trait]
impl UiDriver for AppiumDriver {
    async fn is_displayed(&self, screen: ScreenId) -> E2eResult<bool> {
        let marker = self.config.screen_marker(screen);
        self.visible(&marker).await
    }

    async fn go_to(&self, screen: ScreenId) -> E2eResult<()> {
        match self.config.route(screen) {
            Some("back") => self.back().await,
            Some("scroll:down") => self.scroll(ScrollDirection::Down).await,
            Some("scroll:up") => self.scroll(ScrollDirection::Up).await,
            Some(control) => self.tap_name(control).await,
            None => Err(E2eError::Driver(format!("no route configured for {screen}"))),
        }
    }

    async fn open_asset(&self, name: &str) -> E2eResult<()> {
        self.enter_text(&Field::Search, name).await?;
        self.tap_name(&format!("asset_row:{name}")).await
    }

    async fn scroll(&self, direction: ScrollDirection) -> E2eResult<()> {
        let direction = match direction {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
        };
        let body = json!({ "script": "mobile: scroll", "args": [{ "direction": direction }] });
        self.command(Method::POST, "/execute/sync", Some(body)).await?;
        Ok(())
    }

    async fn tap(&self, control: &Control) -> E2eResult<()> {
        if *control == Control::Back && !self.config.locators.contains_key("back") {
            return self.back().await;
        }
        self.tap_name(&control.name()).await
    }

    async fn enter_text(&self, field: &Field, value: &str) -> E2eResult<()> {
        let element = self.find_required(field.name()).await?;
        self.command(Method::POST, &format!("/element/{element}/clear"), Some(json!({})))
            .await?;
        self.command(
            Method::POST,
            &format!("/element/{element}/value"),
            Some(json!({ "text": value })),
        )
        .await?;
        Ok(())
    }

    async fn select_from_dropdown(&self, field: &Field, value: &str) -> E2eResult<()> {
        self.tap_name(field.name()).await?;
        match self.find(&format!("option:{value}")).await? {
            Some(option) => self.click(&option).await,
            None => {
                self.back().await?;
                Err(E2eError::InvalidOption {
                    field: field.to_string(),
                    value: value.to_string(),
                })
            }
        }
    }

    async fn dropdown_options(&self, field: &Field) -> E2eResult<Vec<String>> {
        self.tap_name(field.name()).await?;
        let mut options = Vec::new();
        for element in self.find_all("dropdown_option").await? {
            options.push(self.text_of(&element).await?);
        }
        self.back().await?;
        Ok(options)
    }

    async fn read_text(&self, field: &Field) -> E2eResult<String> {
        let element = self.find_required(field.name()).await?;
        self.text_of(&element).await
    }

    async fn is_element_visible(&self, element: &str) -> E2eResult<bool> {
        self.visible(element).await
    }

    async fn list(&self, query: Query) -> E2eResult<Vec<String>> {
        let mut rows = Vec::new();
        for element in self.find_all(query_rows(query)).await? {
            rows.push(self.text_of(&element).await?);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppiumConfig::default();
        assert_eq!(config.url, "http://127.0.0.1:4723");
        assert_eq!(config.capabilities["appium:noReset"], json!(true));
        assert_eq!(config.screen_marker(ScreenId::ChildSection), "child_section_screen");
        assert_eq!(config.route(ScreenId::ChildSection), Some("scroll:down"));
        assert_eq!(config.route(ScreenId::CreateAsset), None);
    }

    #[test]
    fn test_locator_overrides() {
        let mut config = AppiumConfig::default();
        config
            .locators
            .insert("add_child".to_string(), "btnAddOcp".to_string());
        assert_eq!(config.locator("add_child"), "btnAddOcp");
        assert_eq!(config.locator("save"), "save");
    }

    #[test]
    fn test_element_id_extraction() {
        let w3c = json!({ "element-6066-11e4-a52e-4f735466cecf": "abc" });
        let legacy = json!({ "ELEMENT": "def" });
        assert_eq!(element_id(&w3c).as_deref(), Some("abc"));
        assert_eq!(element_id(&legacy).as_deref(), Some("def"));
        assert_eq!(element_id(&json!({})), None);
    }

    #[test]
    fn test_protocol_error_mapping() {
        let missing = json!({ "value": { "error": "no such element", "message": "add_child" } });
        assert!(matches!(protocol_error(&missing), Some(E2eError::ElementNotFound(_))));

        let crashed = json!({ "value": { "error": "unknown error", "message": "app crashed" } });
        match protocol_error(&crashed) {
            Some(E2eError::Session(msg)) => assert!(msg.contains("app crashed")),
            other => panic!("unexpected: {other:?}"),
        }

        assert!(protocol_error(&json!({ "value": "text" })).is_none());
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let config: AppiumConfig = toml::from_str(
            r#"
url = "http://farm:4723/wd/hub"

[locators]
save = "btnSave"
"#,
        )
        .unwrap();
        assert_eq!(config.url, "http://farm:4723/wd/hub");
        assert_eq!(config.locator("save"), "btnSave");
        // defaults still present
        assert_eq!(config.route(ScreenId::IssueList), Some("tab_issues"));
    }
}
