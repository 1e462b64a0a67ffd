//! Crawler module - the crawl control loop
//!
//! This module contains the core crawling logic:
//! - The step-loop controller
//! - The dual-path page fetch and link extraction adapter
//! - Page-action resolution and execution
//! - The session-restart scheduler

mod actions;
mod controller;
mod fetch;
mod restart;

pub use actions::{find_actions, resolve_actions, resolve_value, ResolvedAction, ResolvedInput};
pub use controller::Controller;
pub use fetch::{build_http_client, extract_candidates, finalize_links, PageCapture, PageFetcher};
pub use restart::{parse_restart_range, RestartScheduler};
