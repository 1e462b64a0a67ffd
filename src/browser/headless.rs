//! Headless Chrome implementation of the render session
//!
//! Drives a Chrome/Chromium process over the DevTools protocol. Element
//! waits use the tab's default timeout, so every interaction is bounded.

use crate::browser::{CookieInfo, EngineError, RenderSession};
use headless_chrome::protocol::cdp::Network;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::sync::Arc;
use std::time::Duration;

/// Bounded wait applied to element lookups
const ELEMENT_WAIT_SECS: u64 = 10;

/// Script returning every anchor's resolved href as a JSON array
const ANCHOR_HREFS_JS: &str =
    "JSON.stringify(Array.from(document.querySelectorAll('a[href]'), a => a.href))";

/// Render session backed by a headless Chrome instance
///
/// The browser process is kept alive for the lifetime of the session
/// and shut down when the session is dropped.
pub struct HeadlessSession {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl HeadlessSession {
    /// Launches a browser and opens the session's single tab
    pub fn launch(headless: bool) -> Result<Self, EngineError> {
        let options = LaunchOptions::default_builder()
            .headless(headless)
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| EngineError::Launch(e.to_string()))?;

        let browser = Browser::new(options).map_err(|e| EngineError::Launch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| EngineError::Session(e.to_string()))?;

        tab.set_default_timeout(Duration::from_secs(ELEMENT_WAIT_SECS));

        tracing::info!(headless, "Browser session ready");
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// Locates an element with a bounded wait
    ///
    /// Locators starting with `/` or `(` are treated as XPath, anything
    /// else as a CSS selector.
    fn locate(&self, locator: &str) -> Result<Element<'_>, EngineError> {
        let found = if locator.starts_with('/') || locator.starts_with('(') {
            self.tab.wait_for_xpath(locator)
        } else {
            self.tab.wait_for_element(locator)
        };

        found.map_err(|_| EngineError::ElementNotFound {
            locator: locator.to_string(),
        })
    }
}

impl RenderSession for HeadlessSession {
    fn navigate(&self, url: &str) -> Result<(), EngineError> {
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| EngineError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    fn current_url(&self) -> Result<String, EngineError> {
        Ok(self.tab.get_url())
    }

    fn page_source(&self) -> Result<String, EngineError> {
        self.tab
            .get_content()
            .map_err(|e| EngineError::Session(e.to_string()))
    }

    fn eval_bool(&self, expression: &str) -> Result<bool, EngineError> {
        let result = self
            .tab
            .evaluate(expression, false)
            .map_err(|e| EngineError::Script(e.to_string()))?;

        Ok(matches!(result.value, Some(serde_json::Value::Bool(true))))
    }

    fn anchor_hrefs(&self) -> Result<Vec<String>, EngineError> {
        let result = self
            .tab
            .evaluate(ANCHOR_HREFS_JS, false)
            .map_err(|e| EngineError::Script(e.to_string()))?;

        match result.value {
            Some(serde_json::Value::String(json)) => {
                serde_json::from_str(&json).map_err(|e| EngineError::Script(e.to_string()))
            }
            _ => Ok(Vec::new()),
        }
    }

    fn fill_input(&self, locator: &str, value: &str) -> Result<(), EngineError> {
        let element = self.locate(locator)?;

        let interaction = |message: String| EngineError::Interaction {
            locator: locator.to_string(),
            message,
        };

        // Focus, clear, then type so input events fire as they would for
        // a real user.
        element.click().map_err(|e| interaction(e.to_string()))?;
        element
            .call_js_fn("function() { this.value = ''; }", vec![], false)
            .map_err(|e| interaction(e.to_string()))?;
        element
            .type_into(value)
            .map_err(|e| interaction(e.to_string()))?;
        Ok(())
    }

    fn click(&self, locator: &str) -> Result<(), EngineError> {
        let element = self.locate(locator)?;
        element.click().map_err(|e| EngineError::Interaction {
            locator: locator.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    fn cookies(&self) -> Result<Vec<CookieInfo>, EngineError> {
        let cookies = self
            .tab
            .get_cookies()
            .map_err(|e| EngineError::Session(e.to_string()))?;

        Ok(cookies
            .into_iter()
            .map(|cookie| CookieInfo {
                name: cookie.name,
                value: cookie.value,
                domain: cookie.domain,
                secure: cookie.secure,
            })
            .collect())
    }

    fn clear_cookies(&self) -> Result<(), EngineError> {
        self.tab
            .call_method(Network::ClearBrowserCookies(None))
            .map_err(|e| EngineError::Session(e.to_string()))?;
        Ok(())
    }

    fn clear_storage(&self) -> Result<(), EngineError> {
        self.tab
            .evaluate(
                "window.localStorage.clear(); window.sessionStorage.clear();",
                false,
            )
            .map_err(|e| EngineError::Script(e.to_string()))?;
        Ok(())
    }

    fn hard_reload(&self) -> Result<(), EngineError> {
        self.tab
            .reload(true, None)
            .map_err(|e| EngineError::Session(e.to_string()))?;
        Ok(())
    }
}
