//! Page fetch and link extraction
//!
//! Two interchangeable strategies behind one result shape: the rendered
//! strategy drives the browser engine (executing page scripts, so
//! script-inserted links and marketing tags are visible), the fallback
//! strategy issues a plain HTTP GET and parses the returned markup. Any
//! failure inside the rendered path falls back to HTTP for that single
//! call instead of aborting the crawl.

use crate::browser::{EngineError, RenderSession};
use crate::config::TimingProfile;
use crate::url::AdmissionFilter;
use crate::FetchError;
use rand::rngs::StdRng;
use rand::seq::index;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Fixed user agent for the plain-HTTP strategy
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Timeout for plain-HTTP requests
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval for script-condition waits
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const DOM_READY_JS: &str = "document.readyState === 'complete'";
const JQUERY_IDLE_JS: &str = "typeof jQuery === 'undefined' || jQuery.active === 0";

/// Marketing-tag globals probed in fast mode (one combined pass)
const TAG_PROBES: &[(&str, &str)] = &[
    (
        "GTM/GA",
        "typeof gtag !== 'undefined' || typeof dataLayer !== 'undefined' || typeof ga !== 'undefined'",
    ),
    ("Facebook", "typeof fbq !== 'undefined'"),
    ("Adobe", "typeof s !== 'undefined' || typeof adobe !== 'undefined'"),
];

/// Per-family probes and wait budgets for safe mode
const SAFE_TAG_PROBES: &[(&str, &str, u64)] = &[
    (
        "Google Tag Manager",
        "typeof gtag !== 'undefined' || typeof dataLayer !== 'undefined'",
        5,
    ),
    (
        "Google Analytics",
        "typeof ga !== 'undefined' || typeof gtag !== 'undefined'",
        3,
    ),
    ("Facebook Pixel", "typeof fbq !== 'undefined'", 3),
    (
        "Adobe Analytics",
        "typeof s !== 'undefined' || typeof adobe !== 'undefined'",
        3,
    ),
];

/// Normalized result of fetching one page
#[derive(Debug, Clone)]
pub struct PageCapture {
    /// URL actually loaded (post-redirect, or post-action navigation)
    pub current_url: String,

    /// Page markup
    pub content: String,

    /// Admissible, deduplicated, capped candidate links
    pub links: Vec<String>,

    /// True when the rendered path failed and HTTP served this call
    pub degraded: bool,

    /// Marketing-tag families detected while settling the page
    pub tags_detected: Vec<String>,
}

/// Raw result of the rendered strategy, before link filtering
struct RenderedPage {
    current_url: String,
    content: String,
    hrefs: Vec<String>,
    tags_detected: Vec<String>,
}

/// Fetches pages through the rendered or plain-HTTP strategy
pub struct PageFetcher {
    engine: Option<Arc<dyn RenderSession>>,
    client: Client,
    profile: TimingProfile,
    max_links: usize,
}

impl PageFetcher {
    pub fn new(
        engine: Option<Arc<dyn RenderSession>>,
        profile: TimingProfile,
        max_links: usize,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            engine,
            client: build_http_client()?,
            profile,
            max_links,
        })
    }

    /// Fetches a page and extracts its admissible candidate links
    ///
    /// When `reuse_rendered` is set (an action just ran on this page)
    /// the rendered strategy reads the page as-is instead of
    /// re-navigating, and re-reads the current URL first since the
    /// action may have triggered a redirect or navigation.
    pub async fn fetch(
        &self,
        url: &str,
        reuse_rendered: bool,
        filter: &AdmissionFilter,
        visited: &HashSet<String>,
        rng: &mut StdRng,
    ) -> Result<PageCapture, FetchError> {
        if let Some(engine) = &self.engine {
            match self.fetch_rendered(engine.clone(), url, reuse_rendered).await {
                Ok(page) => {
                    let links =
                        finalize_links(page.hrefs, filter, visited, self.max_links, rng);
                    return Ok(PageCapture {
                        current_url: page.current_url,
                        content: page.content,
                        links,
                        degraded: false,
                        tags_detected: page.tags_detected,
                    });
                }
                Err(e) => {
                    tracing::warn!(url = %url, "Rendered fetch failed, falling back to HTTP: {}", e);
                }
            }

            let mut capture = self.fetch_fallback(url, filter, visited, rng).await?;
            capture.degraded = true;
            return Ok(capture);
        }

        self.fetch_fallback(url, filter, visited, rng).await
    }

    /// Rebuilds the HTTP client, discarding its cookie store
    pub fn reset_http_cookies(&mut self) -> Result<(), reqwest::Error> {
        self.client = build_http_client()?;
        Ok(())
    }

    async fn fetch_rendered(
        &self,
        engine: Arc<dyn RenderSession>,
        url: &str,
        reuse: bool,
    ) -> Result<RenderedPage, EngineError> {
        let url = url.to_string();
        let profile = self.profile;

        tokio::task::spawn_blocking(move || rendered_capture(&*engine, &url, profile, reuse))
            .await
            .map_err(|e| EngineError::Session(format!("render task panicked: {}", e)))?
    }

    async fn fetch_fallback(
        &self,
        url: &str,
        filter: &AdmissionFilter,
        visited: &HashSet<String>,
        rng: &mut StdRng,
    ) -> Result<PageCapture, FetchError> {
        tracing::info!(url = %url, "Fetching page over plain HTTP");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Http {
                    url: url.to_string(),
                    source: e,
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();

        if !content_type.contains("text/html") {
            return Err(FetchError::NonHtml {
                url: url.to_string(),
                content_type,
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Http {
            url: url.to_string(),
            source: e,
        })?;

        // The final URL came from reqwest and always re-parses
        let candidates = match Url::parse(&final_url) {
            Ok(base) => extract_candidates(&body, &base),
            Err(_) => Vec::new(),
        };

        let links = finalize_links(candidates, filter, visited, self.max_links, rng);

        Ok(PageCapture {
            current_url: final_url,
            content: body,
            links,
            degraded: false,
            tags_detected: Vec::new(),
        })
    }
}

/// Builds the HTTP client for the fallback strategy
///
/// Cookies persist across requests within a session and are discarded
/// by rebuilding the client on restart.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(HTTP_TIMEOUT)
        .connect_timeout(HTTP_TIMEOUT)
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Synchronous rendered capture (runs on the blocking pool)
fn rendered_capture(
    engine: &dyn RenderSession,
    url: &str,
    profile: TimingProfile,
    reuse: bool,
) -> Result<RenderedPage, EngineError> {
    let (current_url, tags_detected) = if reuse {
        // An action just ran here; keep the page and pick up wherever
        // the action left the browser.
        let current = engine.current_url()?;
        tracing::info!(url = %current, "Reusing rendered page after action");
        (current, Vec::new())
    } else {
        tracing::info!(url = %url, "Fetching page with script execution");
        engine.navigate(url)?;
        let tags = match profile {
            TimingProfile::Fast => settle_fast(engine),
            TimingProfile::Safe => settle_safe(engine),
        };
        (engine.current_url()?, tags)
    };

    let content = engine.page_source()?;
    let hrefs = engine.anchor_hrefs()?;

    Ok(RenderedPage {
        current_url,
        content,
        hrefs,
        tags_detected,
    })
}

/// Polls a script condition until it holds or the timeout elapses
fn poll_until(engine: &dyn RenderSession, expression: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if engine.eval_bool(expression).unwrap_or(false) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Fast settle: short fixed sleep plus one bounded combined probe pass
fn settle_fast(engine: &dyn RenderSession) -> Vec<String> {
    std::thread::sleep(Duration::from_secs(1));

    if !poll_until(engine, DOM_READY_JS, Duration::from_secs(5)) {
        tracing::warn!("Timed out waiting for document ready (fast mode)");
    }
    poll_until(engine, JQUERY_IDLE_JS, Duration::from_secs(2));

    // One combined pass over all tag families; each check is
    // independently time-boxed and absence of a tag is not an error.
    let mut detected: Vec<String> = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(3);

    while Instant::now() < deadline && detected.len() < TAG_PROBES.len() {
        for (family, probe) in TAG_PROBES {
            if !detected.iter().any(|d| d == family)
                && engine.eval_bool(probe).unwrap_or(false)
            {
                tracing::info!(tag = %family, "Marketing tag detected");
                detected.push(family.to_string());
            }
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    if detected.is_empty() {
        tracing::debug!("No marketing tags detected within the fast-mode window");
    }

    detected
}

/// Safe settle: longer sequential waits per tag family
fn settle_safe(engine: &dyn RenderSession) -> Vec<String> {
    std::thread::sleep(Duration::from_secs(2));

    if !poll_until(engine, DOM_READY_JS, Duration::from_secs(10)) {
        tracing::warn!("Timed out waiting for document ready (safe mode)");
    }
    poll_until(engine, JQUERY_IDLE_JS, Duration::from_secs(5));

    let mut detected = Vec::new();
    for (family, probe, wait_secs) in SAFE_TAG_PROBES {
        if poll_until(engine, probe, Duration::from_secs(*wait_secs)) {
            tracing::info!(tag = %family, "Marketing tag detected");
            detected.push(family.to_string());
        }
    }

    std::thread::sleep(Duration::from_secs(1));
    detected
}

/// Extracts raw candidate links from markup, resolving relative hrefs
pub fn extract_candidates(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut candidates = Vec::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            if let Some(href) = element.value().attr("href") {
                let href = href.trim();
                if href.is_empty() {
                    continue;
                }
                if let Ok(absolute) = base.join(href) {
                    candidates.push(absolute.to_string());
                }
            }
        }
    }

    candidates
}

/// Filters candidates through admission and the visited set, dedups
/// preserving discovery order, and downsamples to the cap
///
/// The downsample is a uniform choice without replacement, so a fixed
/// RNG seed yields a reproducible subset.
pub fn finalize_links(
    candidates: Vec<String>,
    filter: &AdmissionFilter,
    visited: &HashSet<String>,
    cap: usize,
    rng: &mut StdRng,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let links: Vec<String> = candidates
        .into_iter()
        .filter(|url| filter.is_admissible(url) && !visited.contains(url))
        .filter(|url| seen.insert(url.clone()))
        .collect();

    if links.len() <= cap {
        return links;
    }

    tracing::debug!(
        discovered = links.len(),
        cap,
        "Downsampling links to the per-page cap"
    );

    let mut picked = index::sample(rng, links.len(), cap).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|i| links[i].clone()).collect()
}
