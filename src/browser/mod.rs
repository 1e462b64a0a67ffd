//! Rendering engine collaborator boundary
//!
//! The crawl core drives the browser only through the [`RenderSession`]
//! trait: navigation, script evaluation, anchor enumeration, bounded
//! element interaction, and session-state clears. The production
//! implementation sits on a headless Chrome instance; tests substitute
//! a scripted fake.
//!
//! All element waits in implementations are bounded by a timeout and
//! never block indefinitely.

mod headless;

pub use headless::HeadlessSession;

use thiserror::Error;

/// Errors surfaced by the rendering engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation failed for {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("Element not found: {locator}")]
    ElementNotFound { locator: String },

    #[error("Interaction failed for {locator}: {message}")]
    Interaction { locator: String, message: String },

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Browser session error: {0}")]
    Session(String),
}

/// A cookie as reported by the rendering engine
#[derive(Debug, Clone)]
pub struct CookieInfo {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub secure: bool,
}

/// Interface to the external page-rendering engine
///
/// Methods are synchronous; async callers run them through
/// `tokio::task::spawn_blocking`.
pub trait RenderSession: Send + Sync {
    /// Navigates to the URL and waits for the navigation to finish
    fn navigate(&self, url: &str) -> Result<(), EngineError>;

    /// Returns the URL currently loaded (it may differ from the last
    /// navigation target after redirects or action-triggered moves)
    fn current_url(&self) -> Result<String, EngineError>;

    /// Returns the full markup of the rendered page
    fn page_source(&self) -> Result<String, EngineError>;

    /// Evaluates a script expression and returns its boolean value;
    /// non-boolean results read as false
    fn eval_bool(&self, expression: &str) -> Result<bool, EngineError>;

    /// Returns the resolved href of every anchor element in the live
    /// DOM, including script-inserted ones
    fn anchor_hrefs(&self) -> Result<Vec<String>, EngineError>;

    /// Locates an element with a bounded wait, clears it, and types the
    /// value into it
    fn fill_input(&self, locator: &str, value: &str) -> Result<(), EngineError>;

    /// Locates an element with a bounded wait and clicks it
    fn click(&self, locator: &str) -> Result<(), EngineError>;

    /// Enumerates the session's cookies
    fn cookies(&self) -> Result<Vec<CookieInfo>, EngineError>;

    /// Clears all session cookies
    fn clear_cookies(&self) -> Result<(), EngineError>;

    /// Clears local storage and session storage
    fn clear_storage(&self) -> Result<(), EngineError>;

    /// Forces a reload that bypasses the cache
    fn hard_reload(&self) -> Result<(), EngineError>;
}

#[cfg(test)]
pub mod testing {
    //! Scripted fake render session for unit tests

    use super::{CookieInfo, EngineError, RenderSession};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// In-memory render session serving canned pages
    #[derive(Default)]
    pub struct FakeSession {
        /// url -> (page markup, anchor hrefs)
        pub pages: HashMap<String, (String, Vec<String>)>,
        /// locators that fill_input/click should fail to find
        pub missing_locators: HashSet<String>,
        pub fail_navigation: bool,
        pub cookie_list: Vec<CookieInfo>,
        pub current: Mutex<String>,
        pub filled: Mutex<Vec<(String, String)>>,
        pub clicked: Mutex<Vec<String>>,
        pub cookie_clears: Mutex<u32>,
        pub storage_clears: Mutex<u32>,
        pub reloads: Mutex<u32>,
    }

    impl FakeSession {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_page(mut self, url: &str, links: &[&str]) -> Self {
            self.pages.insert(
                url.to_string(),
                (
                    format!("<html><body>page at {}</body></html>", url),
                    links.iter().map(|l| l.to_string()).collect(),
                ),
            );
            self
        }
    }

    impl RenderSession for FakeSession {
        fn navigate(&self, url: &str) -> Result<(), EngineError> {
            if self.fail_navigation {
                return Err(EngineError::Navigation {
                    url: url.to_string(),
                    message: "scripted failure".to_string(),
                });
            }
            *self.current.lock().unwrap() = url.to_string();
            Ok(())
        }

        fn current_url(&self) -> Result<String, EngineError> {
            Ok(self.current.lock().unwrap().clone())
        }

        fn page_source(&self) -> Result<String, EngineError> {
            let current = self.current.lock().unwrap().clone();
            match self.pages.get(&current) {
                Some((content, _)) => Ok(content.clone()),
                None => Err(EngineError::Session(format!("no page for {}", current))),
            }
        }

        fn eval_bool(&self, _expression: &str) -> Result<bool, EngineError> {
            Ok(true)
        }

        fn anchor_hrefs(&self) -> Result<Vec<String>, EngineError> {
            let current = self.current.lock().unwrap().clone();
            Ok(self
                .pages
                .get(&current)
                .map(|(_, links)| links.clone())
                .unwrap_or_default())
        }

        fn fill_input(&self, locator: &str, value: &str) -> Result<(), EngineError> {
            if self.missing_locators.contains(locator) {
                return Err(EngineError::ElementNotFound {
                    locator: locator.to_string(),
                });
            }
            self.filled
                .lock()
                .unwrap()
                .push((locator.to_string(), value.to_string()));
            Ok(())
        }

        fn click(&self, locator: &str) -> Result<(), EngineError> {
            if self.missing_locators.contains(locator) {
                return Err(EngineError::ElementNotFound {
                    locator: locator.to_string(),
                });
            }
            self.clicked.lock().unwrap().push(locator.to_string());
            Ok(())
        }

        fn cookies(&self) -> Result<Vec<CookieInfo>, EngineError> {
            Ok(self.cookie_list.clone())
        }

        fn clear_cookies(&self) -> Result<(), EngineError> {
            *self.cookie_clears.lock().unwrap() += 1;
            Ok(())
        }

        fn clear_storage(&self) -> Result<(), EngineError> {
            *self.storage_clears.lock().unwrap() += 1;
            Ok(())
        }

        fn hard_reload(&self) -> Result<(), EngineError> {
            *self.reloads.lock().unwrap() += 1;
            Ok(())
        }
    }
}
