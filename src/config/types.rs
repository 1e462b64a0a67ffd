use serde::Deserialize;
use std::collections::HashMap;

/// Immutable run parameters for a crawl
///
/// Set once at construction from the command line; never mutated.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// URL the walk starts from (and returns to after a restart)
    pub start_url: String,

    /// Maximum number of crawl steps
    pub max_steps: u64,

    /// Delay between steps, in seconds
    pub delay_secs: f64,

    /// Restrict the walk to the start URL's authority
    pub stay_in_domain: bool,

    /// Maximum number of links kept per page
    pub max_links_per_page: usize,

    /// Use the rendering engine when available
    pub use_browser: bool,

    /// Periodically reset browser session state
    pub restart_enabled: bool,

    /// Restart interval range, e.g. "10-20" or "15"
    pub restart_range: String,

    /// Timing profile for the rendered fetch path
    pub profile: TimingProfile,

    /// Run the browser without a visible window
    pub headless: bool,

    /// Record cookie counts in step records
    pub log_cookies: bool,

    /// Fixed RNG seed for reproducible walks
    pub seed: Option<u64>,
}

/// Timing profile for the rendered strategy's settle/tag-probe phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingProfile {
    /// Short fixed sleep plus one bounded combined probe pass
    Fast,

    /// Longer sequential waits per tag family
    Safe,
}

/// Match kind for an exclusion rule
///
/// The wire names follow the store format; an unknown kind is rejected
/// when the store is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Contains,
    Exact,
    #[serde(rename = "startswith")]
    Prefix,
    #[serde(rename = "endswith")]
    Suffix,
    Regex,
    #[serde(rename = "wildcard")]
    Glob,
}

/// A configured deny-pattern evaluated against discovered URLs
#[derive(Debug, Clone, Deserialize)]
pub struct ExclusionRule {
    pub pattern: String,

    #[serde(rename = "type")]
    pub kind: RuleKind,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Where an action input's value comes from
///
/// The store format allows `value`, `random_values` and `value_list`
/// side by side; validation collapses them with precedence
/// Fixed > RandomChoice > NamedListRef.
#[derive(Debug, Clone)]
pub enum ValueSource {
    /// A literal value
    Fixed(String),

    /// One uniformly-random pick from an inline list
    RandomChoice(Vec<String>),

    /// One uniformly-random pick from a named word list
    NamedListRef(String),
}

/// A single form input within an action, after validation
#[derive(Debug, Clone)]
pub struct InputSpec {
    /// Element locator (XPath when it starts with `/`, CSS otherwise)
    pub locator: String,

    pub source: ValueSource,

    pub description: String,
}

/// A configured page action, after validation
#[derive(Debug, Clone)]
pub struct ActionSpec {
    pub name: String,

    /// Substring of the URL that triggers this action
    pub trigger: String,

    pub description: String,

    pub enabled: bool,

    /// Inputs populated in order before the click
    pub inputs: Vec<InputSpec>,

    /// Optional element to click after all inputs
    pub click_target: Option<String>,

    /// Seconds to sleep after a successful click
    pub post_click_wait_secs: u64,
}

/// The validated configuration store
#[derive(Debug, Clone, Default)]
pub struct Store {
    pub word_lists: HashMap<String, Vec<String>>,
    pub rules: Vec<ExclusionRule>,
    pub actions: Vec<ActionSpec>,
}

/// Raw action input as found on disk
#[derive(Debug, Clone, Deserialize)]
pub struct RawInputSpec {
    pub xpath: String,

    #[serde(default)]
    pub value: Option<String>,

    #[serde(default)]
    pub random_values: Option<Vec<String>>,

    #[serde(default)]
    pub value_list: Option<String>,

    #[serde(default)]
    pub description: String,
}

/// Raw action spec as found on disk
#[derive(Debug, Clone, Deserialize)]
pub struct RawActionSpec {
    pub name: String,

    #[serde(rename = "url_pattern")]
    pub trigger: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub inputs: Vec<RawInputSpec>,

    #[serde(rename = "click_element", default)]
    pub click_target: Option<String>,

    #[serde(rename = "wait_after_click", default = "default_click_wait")]
    pub post_click_wait_secs: u64,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Raw store as found on disk
#[derive(Debug, Clone, Deserialize)]
pub struct RawStore {
    #[serde(default)]
    pub word_lists: HashMap<String, Vec<String>>,

    #[serde(default)]
    pub ignore_patterns: Vec<ExclusionRule>,

    #[serde(default)]
    pub actions: Vec<RawActionSpec>,
}

fn default_true() -> bool {
    true
}

fn default_click_wait() -> u64 {
    3
}
