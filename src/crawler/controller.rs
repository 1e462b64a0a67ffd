//! Crawl controller - the main step loop
//!
//! Drives one crawl run: restart check, page actions, fetch/extract,
//! admission filtering, random link selection, history recording, and
//! termination. Steps execute strictly sequentially; the visited set,
//! the HTTP cookie store, and the browser session are owned here and
//! mutated only by the restart handling and the step loop itself.

use crate::browser::{EngineError, RenderSession};
use crate::config::{CrawlConfig, Store};
use crate::crawler::actions::{find_actions, resolve_actions, run_actions};
use crate::crawler::fetch::{PageCapture, PageFetcher};
use crate::crawler::restart::RestartScheduler;
use crate::history::{timestamp_now, Ledger, RestartRecord, StepRecord};
use crate::url::{AdmissionFilter, ExclusionEngine};
use crate::TagwalkError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Main crawl controller
pub struct Controller {
    config: CrawlConfig,
    store: Store,
    filter: AdmissionFilter,
    fetcher: PageFetcher,
    engine: Option<Arc<dyn RenderSession>>,
    restart: RestartScheduler,
    visited: HashSet<String>,
    ledger: Ledger,
    rng: StdRng,
    current_url: String,
    shutdown: Arc<AtomicBool>,
}

impl Controller {
    /// Creates a controller for one crawl run
    ///
    /// # Arguments
    ///
    /// * `config` - Immutable run parameters
    /// * `store` - Validated configuration store
    /// * `engine` - Rendering engine handle, or None for HTTP-only runs
    pub fn new(
        config: CrawlConfig,
        store: Store,
        engine: Option<Arc<dyn RenderSession>>,
    ) -> Result<Self, TagwalkError> {
        let start_url = Url::parse(&config.start_url)?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let restart = RestartScheduler::new(config.restart_enabled, &config.restart_range, &mut rng);

        let filter = AdmissionFilter::new(
            &start_url,
            config.stay_in_domain,
            ExclusionEngine::compile(&store.rules),
        );

        let fetcher = PageFetcher::new(engine.clone(), config.profile, config.max_links_per_page)?;

        let current_url = config.start_url.clone();

        Ok(Self {
            config,
            store,
            filter,
            fetcher,
            engine,
            restart,
            visited: HashSet::new(),
            ledger: Ledger::new(),
            rng,
            current_url,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Returns the flag an interrupt handler should set to stop the run
    /// between steps
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn restart_count(&self) -> u32 {
        self.restart.restart_count()
    }

    /// Runs the crawl loop until the step budget is exhausted, no
    /// admissible links remain with no restart pending, the page fetch
    /// fails on both strategies, or an interrupt arrives
    pub async fn run(&mut self) -> crate::Result<()> {
        self.announce();

        let max_steps = self.config.max_steps;

        for step in 1..=max_steps {
            if self.shutdown.load(Ordering::SeqCst) {
                tracing::info!("Interrupt received, stopping between steps");
                break;
            }

            let mut restart_occurred = false;
            if self.restart.due(step) {
                restart_occurred = self.perform_restart(step).await;
                if restart_occurred {
                    self.current_url = self.config.start_url.clone();
                    tracing::info!(url = %self.current_url, "Returning to start URL after restart");
                } else {
                    tracing::warn!("Restart failed, continuing with prior session state");
                }
            }

            tracing::info!(step, max_steps, url = %self.current_url, "Crawl step");

            let cookie_count = self.cookie_snapshot(step).await;

            // Page actions run before the fetch so the adapter can pick
            // up whatever page state they leave behind
            let matched = find_actions(&self.current_url, &self.store.actions);
            let resolved = if self.engine.is_some() && !matched.is_empty() {
                resolve_actions(&matched, &self.store.word_lists, &mut self.rng)
            } else {
                Vec::new()
            };

            let (action_performed, action_records) = match &self.engine {
                Some(engine) if !resolved.is_empty() => {
                    run_actions(engine.clone(), self.current_url.clone(), resolved).await
                }
                _ => (false, Vec::new()),
            };
            for record in action_records {
                self.ledger.record_action(record);
            }

            let capture = match self
                .fetcher
                .fetch(
                    &self.current_url,
                    action_performed,
                    &self.filter,
                    &self.visited,
                    &mut self.rng,
                )
                .await
            {
                Ok(capture) => capture,
                Err(e) => {
                    tracing::warn!("Page fetch failed on both strategies, ending run: {}", e);
                    break;
                }
            };

            self.current_url = capture.current_url.clone();
            if action_performed {
                tracing::info!(url = %self.current_url, "Current URL after action");
            }

            self.visited.insert(self.current_url.clone());
            tracing::info!(links = capture.links.len(), "Admissible links discovered");

            if capture.links.is_empty() {
                if self.restart.pending_after(step, max_steps) {
                    tracing::info!(
                        "No admissible links but a restart is still pending, returning to start"
                    );
                    self.current_url = self.config.start_url.clone();
                    self.push_step(
                        step,
                        self.current_url.clone(),
                        &capture,
                        None,
                        action_performed,
                        restart_occurred,
                        cookie_count,
                    );
                    continue;
                }

                self.push_step(
                    step,
                    self.current_url.clone(),
                    &capture,
                    None,
                    action_performed,
                    restart_occurred,
                    cookie_count,
                );
                tracing::info!("No admissible links found, ending run");
                break;
            }

            let selected = capture.links[self.rng.random_range(0..capture.links.len())].clone();
            tracing::info!(selected = %selected, "Next link selected");

            self.push_step(
                step,
                self.current_url.clone(),
                &capture,
                Some(selected.clone()),
                action_performed,
                restart_occurred,
                cookie_count,
            );

            if step < max_steps {
                self.current_url = selected;
                tracing::debug!(secs = self.config.delay_secs, "Sleeping between steps");
                tokio::time::sleep(Duration::from_secs_f64(self.config.delay_secs)).await;
            } else {
                self.lookahead(step, &selected).await;
            }
        }

        tracing::info!(
            steps = self.ledger.steps().len(),
            visited = self.visited.len(),
            actions = self.ledger.actions().len(),
            restarts = self.restart.restart_count(),
            "Crawl finished"
        );

        Ok(())
    }

    /// Logs the run parameters once at startup
    fn announce(&self) {
        let config = &self.config;
        tracing::info!(
            start = %config.start_url,
            steps = config.max_steps,
            delay = config.delay_secs,
            domain_locked = config.stay_in_domain,
            link_cap = config.max_links_per_page,
            "Starting crawl"
        );

        let rule_count = self.store.rules.iter().filter(|r| r.enabled).count();
        tracing::info!(
            browser = self.engine.is_some(),
            profile = ?config.profile,
            exclusion_rules = rule_count,
            actions = self.store.actions.iter().filter(|a| a.enabled).count(),
            "Crawl setup"
        );

        if self.restart.is_enabled() {
            let (min, max) = self.restart.interval();
            tracing::info!(
                min,
                max,
                first = ?self.restart.next_restart_step(),
                "Session restarts enabled"
            );
        }
    }

    /// Resets session state when a restart is due
    ///
    /// Order matters: the browser-side clears run first, and the visited
    /// set and HTTP cookie store are only cleared once those succeed, so
    /// a failed restart leaves the step to proceed on prior state. No
    /// step runs while a clear is in progress.
    async fn perform_restart(&mut self, step: u64) -> bool {
        tracing::info!(step, "Performing session restart");
        let visited_before = self.visited.len();
        let mut failure: Option<String> = None;

        if let Some(engine) = &self.engine {
            let engine = engine.clone();
            let result = tokio::task::spawn_blocking(move || {
                engine.clear_cookies()?;
                if let Err(e) = engine.clear_storage() {
                    tracing::warn!("Storage clear failed: {}", e);
                }
                if let Err(e) = engine.hard_reload() {
                    tracing::warn!("Hard reload failed: {}", e);
                }
                Ok::<(), EngineError>(())
            })
            .await;

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failure = Some(e.to_string()),
                Err(e) => failure = Some(format!("restart task panicked: {}", e)),
            }
        }

        if failure.is_none() {
            self.visited.clear();
            if let Err(e) = self.fetcher.reset_http_cookies() {
                failure = Some(e.to_string());
            }
        }

        match failure {
            None => {
                self.restart
                    .complete(step, self.config.max_steps, &mut self.rng);
                self.ledger.record_restart(RestartRecord {
                    step,
                    timestamp: timestamp_now(),
                    restart_count: self.restart.restart_count(),
                    visited_before,
                    success: true,
                    next_restart_step: self.restart.next_restart_step(),
                    error: None,
                });
                tracing::info!(
                    count = self.restart.restart_count(),
                    next = ?self.restart.next_restart_step(),
                    "Session restart complete"
                );
                true
            }
            Some(message) => {
                tracing::warn!("Session restart failed: {}", message);
                self.ledger.record_restart(RestartRecord {
                    step,
                    timestamp: timestamp_now(),
                    restart_count: self.restart.restart_count() + 1,
                    visited_before,
                    success: false,
                    next_restart_step: None,
                    error: Some(message),
                });
                false
            }
        }
    }

    /// Fetches the final step's chosen link once so its link count makes
    /// it into the history before the run stops
    async fn lookahead(&mut self, step: u64, selected: &str) {
        match self
            .fetcher
            .fetch(selected, false, &self.filter, &self.visited, &mut self.rng)
            .await
        {
            Ok(capture) => {
                let url = capture.current_url.clone();
                self.visited.insert(url.clone());
                self.push_step(step + 1, url, &capture, None, false, false, 0);
            }
            Err(e) => tracing::debug!("Final lookahead fetch failed: {}", e),
        }
    }

    /// Counts session cookies when cookie logging is enabled
    async fn cookie_snapshot(&self, step: u64) -> usize {
        if !self.config.log_cookies {
            return 0;
        }
        let Some(engine) = &self.engine else {
            return 0;
        };

        let engine = engine.clone();
        match tokio::task::spawn_blocking(move || engine.cookies()).await {
            Ok(Ok(cookies)) => {
                tracing::info!(step, count = cookies.len(), "Session cookies");
                for cookie in &cookies {
                    tracing::debug!(
                        name = %cookie.name,
                        domain = %cookie.domain,
                        secure = cookie.secure,
                        "Cookie"
                    );
                }
                cookies.len()
            }
            Ok(Err(e)) => {
                tracing::warn!("Cookie snapshot failed: {}", e);
                0
            }
            Err(e) => {
                tracing::warn!("Cookie snapshot task panicked: {}", e);
                0
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_step(
        &mut self,
        step: u64,
        url: String,
        capture: &PageCapture,
        selected_link: Option<String>,
        action_performed: bool,
        restart_occurred: bool,
        cookie_count: usize,
    ) {
        let domain = Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();

        self.ledger.record_step(StepRecord {
            step,
            url,
            timestamp: timestamp_now(),
            links_found: capture.links.len(),
            selected_link,
            domain,
            action_performed,
            restart_occurred,
            degraded: capture.degraded,
            cookie_count,
            tags_detected: capture.tags_detected.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::FakeSession;
    use crate::config::TimingProfile;

    fn test_config(start: &str, max_steps: u64) -> CrawlConfig {
        CrawlConfig {
            start_url: start.to_string(),
            max_steps,
            delay_secs: 0.0,
            stay_in_domain: true,
            max_links_per_page: 50,
            use_browser: true,
            restart_enabled: false,
            restart_range: "10-20".to_string(),
            profile: TimingProfile::Fast,
            headless: true,
            log_cookies: false,
            seed: Some(42),
        }
    }

    fn controller_with(
        config: CrawlConfig,
        session: FakeSession,
    ) -> (Controller, Arc<FakeSession>) {
        let session = Arc::new(session);
        let engine: Arc<dyn RenderSession> = session.clone();
        let controller = Controller::new(config, Store::default(), Some(engine)).unwrap();
        (controller, session)
    }

    #[tokio::test]
    async fn test_single_step_without_links_records_one_step() {
        let session = FakeSession::new().with_page("https://example.com/", &[]);
        let (mut controller, _) = controller_with(test_config("https://example.com/", 1), session);

        controller.run().await.unwrap();

        let steps = controller.ledger().steps();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step, 1);
        assert_eq!(steps[0].links_found, 0);
        assert_eq!(steps[0].selected_link, None);
        assert!(!steps[0].action_performed);
        assert_eq!(controller.visited_count(), 1);
    }

    #[tokio::test]
    async fn test_walk_follows_links_and_looks_ahead() {
        let session = FakeSession::new()
            .with_page("https://example.com/", &["https://example.com/a"])
            .with_page("https://example.com/a", &["https://example.com/b"])
            .with_page("https://example.com/b", &[]);
        let (mut controller, _) = controller_with(test_config("https://example.com/", 2), session);

        controller.run().await.unwrap();

        let steps = controller.ledger().steps();
        // Two budgeted steps plus the final-step lookahead record
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].url, "https://example.com/");
        assert_eq!(steps[0].selected_link.as_deref(), Some("https://example.com/a"));
        assert_eq!(steps[1].url, "https://example.com/a");
        assert_eq!(steps[1].selected_link.as_deref(), Some("https://example.com/b"));
        assert_eq!(steps[2].step, 3);
        assert_eq!(steps[2].url, "https://example.com/b");
        assert_eq!(steps[2].links_found, 0);
        assert_eq!(steps[2].selected_link, None);
    }

    #[tokio::test]
    async fn test_restart_clears_state_and_returns_to_start() {
        let mut config = test_config("https://example.com/", 4);
        config.restart_enabled = true;
        config.restart_range = "2".to_string();

        let session = FakeSession::new()
            .with_page("https://example.com/", &["https://example.com/a"])
            .with_page("https://example.com/a", &["https://example.com/"]);
        let (mut controller, session) = controller_with(config, session);

        controller.run().await.unwrap();

        let restarts = controller.ledger().restarts();
        assert_eq!(restarts.len(), 1);
        assert_eq!(restarts[0].step, 2);
        assert!(restarts[0].success);
        assert_eq!(restarts[0].visited_before, 1);
        // remaining = 4 - 2 = 2 is not > max interval 2, so no re-arm
        assert_eq!(restarts[0].next_restart_step, None);

        assert_eq!(*session.cookie_clears.lock().unwrap(), 1);
        assert_eq!(*session.storage_clears.lock().unwrap(), 1);
        assert_eq!(*session.reloads.lock().unwrap(), 1);

        let steps = controller.ledger().steps();
        assert!(steps[1].restart_occurred);
        // The step after the restart starts over from the start URL
        assert_eq!(steps[1].url, "https://example.com/");
    }

    #[tokio::test]
    async fn test_zero_links_with_pending_restart_continues() {
        let mut config = test_config("https://example.com/", 3);
        config.restart_enabled = true;
        config.restart_range = "3".to_string();

        let session = FakeSession::new().with_page("https://example.com/", &[]);
        let (mut controller, _) = controller_with(config, session);

        controller.run().await.unwrap();

        let steps = controller.ledger().steps();
        // Steps 1 and 2 find nothing but keep going because the restart
        // at step 3 is still ahead; step 3 restarts, finds nothing, and
        // ends the run with nothing pending.
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|s| s.links_found == 0));
        assert_eq!(controller.ledger().restarts().len(), 1);
        assert!(steps[2].restart_occurred);
    }

    #[tokio::test]
    async fn test_interrupt_stops_before_first_step() {
        let session = FakeSession::new().with_page("https://example.com/", &[]);
        let (mut controller, _) = controller_with(test_config("https://example.com/", 5), session);

        controller.shutdown_handle().store(true, Ordering::SeqCst);
        controller.run().await.unwrap();

        assert!(controller.ledger().steps().is_empty());
    }
}
