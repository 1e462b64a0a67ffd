//! Output module for crawl summaries and reports
//!
//! Consumes the history ledger's records and renders them for the
//! console and for a plain-text report file. This module only reads
//! the ledger; it never feeds back into the crawl.

use crate::config::CrawlConfig;
use crate::history::Ledger;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

/// Prints the end-of-run summary to stdout
pub fn print_summary(config: &CrawlConfig, ledger: &Ledger, visited: usize, restarts: u32) {
    println!("=== Crawl Summary ===\n");

    println!("Overview:");
    println!("  Total steps: {}", ledger.steps().len());
    println!("  Pages visited: {}", visited);
    println!("  Actions executed: {}", ledger.actions().len());
    if config.restart_enabled {
        println!("  Session restarts: {}", restarts);
    }
    println!();

    // Per-domain visit counts, most visited first
    let mut domain_counts: HashMap<&str, usize> = HashMap::new();
    for step in ledger.steps() {
        *domain_counts.entry(step.domain.as_str()).or_default() += 1;
    }
    let mut domains: Vec<_> = domain_counts.into_iter().collect();
    domains.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    println!("Visits by Domain:");
    for (domain, count) in domains {
        println!("  {}: {}", domain, count);
    }
    println!();

    if !ledger.restarts().is_empty() {
        println!("Restart History:");
        for restart in ledger.restarts() {
            let status = if restart.success { "ok" } else { "failed" };
            print!(
                "  [{}] #{} at step {}: {}",
                restart.timestamp, restart.restart_count, restart.step, status
            );
            match restart.next_restart_step {
                Some(next) => println!(" (next at step {})", next),
                None => println!(" (no further restart scheduled)"),
            }
            if let Some(error) = &restart.error {
                println!("    error: {}", error);
            }
        }
        println!();
    }

    if !ledger.actions().is_empty() {
        let successful = ledger.actions().iter().filter(|a| a.success).count();
        println!(
            "Action Results ({} / {} successful):",
            successful,
            ledger.actions().len()
        );
        for action in ledger.actions() {
            let status = if action.success { "ok" } else { "failed" };
            let click = if !action.click_attempted {
                "no click"
            } else if action.click_successful {
                "click ok"
            } else {
                "click failed"
            };
            println!(
                "  [{}] {}: {} (inputs {}/{}, {})",
                action.timestamp,
                action.action_name,
                status,
                action.inputs_successful,
                action.inputs_total,
                click
            );
        }
        println!();
    }

    println!("Step History:");
    for step in ledger.steps() {
        let mut marks = String::new();
        if step.action_performed {
            marks.push_str(" [action]");
        }
        if step.restart_occurred {
            marks.push_str(" [restart]");
        }
        if step.degraded {
            marks.push_str(" [degraded]");
        }
        println!("  [{}] step {}{}: {}", step.timestamp, step.step, marks, step.url);
        println!("    links found: {}", step.links_found);
        if !step.tags_detected.is_empty() {
            println!("    tags: {}", step.tags_detected.join(", "));
        }
        if let Some(selected) = &step.selected_link {
            println!("    next: {}", selected);
        }
    }
}

/// Writes the full run history to a plain-text report file
pub fn write_report(
    path: &Path,
    config: &CrawlConfig,
    ledger: &Ledger,
    visited: usize,
    restarts: u32,
) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;

    writeln!(file, "=== Crawl History ===")?;
    writeln!(file)?;
    writeln!(file, "Start URL: {}", config.start_url)?;
    writeln!(file, "Max steps: {}", config.max_steps)?;
    writeln!(file, "Pages visited: {}", visited)?;
    writeln!(file, "Actions executed: {}", ledger.actions().len())?;
    if config.restart_enabled {
        writeln!(file, "Session restarts: {}", restarts)?;
        writeln!(file, "Restart interval: {}", config.restart_range)?;
    }
    writeln!(file)?;

    if !ledger.restarts().is_empty() {
        writeln!(file, "=== Restart History ===")?;
        for restart in ledger.restarts() {
            writeln!(file, "[{}] restart #{}", restart.timestamp, restart.restart_count)?;
            writeln!(file, "  step: {}", restart.step)?;
            writeln!(file, "  success: {}", restart.success)?;
            writeln!(file, "  visited before: {}", restart.visited_before)?;
            if let Some(next) = restart.next_restart_step {
                writeln!(file, "  next restart step: {}", next)?;
            }
            if let Some(error) = &restart.error {
                writeln!(file, "  error: {}", error)?;
            }
            writeln!(file, "{}", "-".repeat(30))?;
        }
        writeln!(file)?;
    }

    writeln!(file, "=== Action History ===")?;
    for action in ledger.actions() {
        writeln!(file, "[{}] {}", action.timestamp, action.action_name)?;
        writeln!(file, "  URL: {}", action.url)?;
        if !action.description.is_empty() {
            writeln!(file, "  description: {}", action.description)?;
        }
        writeln!(file, "  success: {}", action.success)?;
        writeln!(file, "  inputs: {}/{}", action.inputs_successful, action.inputs_total)?;
        writeln!(file, "  click attempted: {}", action.click_attempted)?;
        writeln!(file, "  click successful: {}", action.click_successful)?;
        writeln!(file, "{}", "-".repeat(30))?;
    }
    writeln!(file)?;

    writeln!(file, "=== Step History ===")?;
    for step in ledger.steps() {
        writeln!(file, "[{}] step {}", step.timestamp, step.step)?;
        writeln!(file, "URL: {}", step.url)?;
        writeln!(file, "links found: {}", step.links_found)?;
        writeln!(file, "action performed: {}", step.action_performed)?;
        writeln!(file, "restart occurred: {}", step.restart_occurred)?;
        writeln!(file, "degraded fetch: {}", step.degraded)?;
        if config.log_cookies {
            writeln!(file, "cookie count: {}", step.cookie_count)?;
        }
        if !step.tags_detected.is_empty() {
            writeln!(file, "tags detected: {}", step.tags_detected.join(", "))?;
        }
        if let Some(selected) = &step.selected_link {
            writeln!(file, "selected link: {}", selected)?;
        }
        writeln!(file, "{}", "-".repeat(50))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimingProfile;
    use crate::history::{timestamp_now, StepRecord};

    fn test_config() -> CrawlConfig {
        CrawlConfig {
            start_url: "https://example.com/".to_string(),
            max_steps: 5,
            delay_secs: 2.0,
            stay_in_domain: true,
            max_links_per_page: 50,
            use_browser: false,
            restart_enabled: false,
            restart_range: "10-20".to_string(),
            profile: TimingProfile::Fast,
            headless: true,
            log_cookies: false,
            seed: None,
        }
    }

    fn ledger_with_steps(count: u64) -> Ledger {
        let mut ledger = Ledger::new();
        for step in 1..=count {
            ledger.record_step(StepRecord {
                step,
                url: format!("https://example.com/{}", step),
                timestamp: timestamp_now(),
                links_found: 3,
                selected_link: Some("https://example.com/next".to_string()),
                domain: "example.com".to_string(),
                action_performed: false,
                restart_occurred: false,
                degraded: false,
                cookie_count: 0,
                tags_detected: vec![],
            });
        }
        ledger
    }

    #[test]
    fn test_write_report_contains_steps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");

        write_report(&path, &test_config(), &ledger_with_steps(3), 3, 0).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("=== Crawl History ==="));
        assert!(content.contains("Start URL: https://example.com/"));
        assert!(content.contains("step 3"));
        assert!(content.contains("selected link: https://example.com/next"));
    }

    #[test]
    fn test_print_summary_does_not_panic_on_empty_ledger() {
        print_summary(&test_config(), &Ledger::new(), 0, 0);
    }
}
