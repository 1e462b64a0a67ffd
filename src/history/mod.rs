//! History ledger for crawl, action, and restart records
//!
//! Three parallel append-only logs owned by the ledger. Records are
//! written once and never mutated after append; the reporting module
//! only reads them.

use chrono::Local;
use serde::Serialize;

/// One crawl step
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: u64,
    pub url: String,
    pub timestamp: String,
    pub links_found: usize,
    pub selected_link: Option<String>,
    pub domain: String,
    pub action_performed: bool,
    pub restart_occurred: bool,
    /// True when this step's page came from the plain-HTTP fallback
    /// after the rendered path failed
    pub degraded: bool,
    pub cookie_count: usize,
    pub tags_detected: Vec<String>,
}

/// One executed page action
#[derive(Debug, Clone, Serialize)]
pub struct ActionRecord {
    pub timestamp: String,
    pub url: String,
    pub action_name: String,
    pub description: String,
    pub success: bool,
    pub inputs_total: usize,
    pub inputs_successful: usize,
    pub click_attempted: bool,
    pub click_successful: bool,
}

/// One session restart attempt
#[derive(Debug, Clone, Serialize)]
pub struct RestartRecord {
    pub step: u64,
    pub timestamp: String,
    pub restart_count: u32,
    pub visited_before: usize,
    pub success: bool,
    pub next_restart_step: Option<u64>,
    pub error: Option<String>,
}

/// Append-only history of a crawl run
#[derive(Debug, Default)]
pub struct Ledger {
    steps: Vec<StepRecord>,
    actions: Vec<ActionRecord>,
    restarts: Vec<RestartRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_step(&mut self, record: StepRecord) {
        self.steps.push(record);
    }

    pub fn record_action(&mut self, record: ActionRecord) {
        self.actions.push(record);
    }

    pub fn record_restart(&mut self, record: RestartRecord) {
        self.restarts.push(record);
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn actions(&self) -> &[ActionRecord] {
        &self.actions
    }

    pub fn restarts(&self) -> &[RestartRecord] {
        &self.restarts
    }
}

/// Formats the current local time the way all records expect it
pub fn timestamp_now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_appends_in_order() {
        let mut ledger = Ledger::new();

        for step in 1..=3 {
            ledger.record_step(StepRecord {
                step,
                url: format!("https://example.com/{}", step),
                timestamp: timestamp_now(),
                links_found: 0,
                selected_link: None,
                domain: "example.com".to_string(),
                action_performed: false,
                restart_occurred: false,
                degraded: false,
                cookie_count: 0,
                tags_detected: vec![],
            });
        }

        assert_eq!(ledger.steps().len(), 3);
        assert_eq!(ledger.steps()[0].step, 1);
        assert_eq!(ledger.steps()[2].step, 3);
        assert!(ledger.actions().is_empty());
        assert!(ledger.restarts().is_empty());
    }

    #[test]
    fn test_timestamp_format() {
        let stamp = timestamp_now();
        // "YYYY-MM-DD HH:MM:SS"
        assert_eq!(stamp.len(), 19);
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[10..11], " ");
    }
}
