//! Session-restart scheduler
//!
//! Decides, per step, whether browser session state should be reset and
//! computes the next scheduled restart step. The scheduler is a pure
//! state machine; the controller, which owns the session resources,
//! performs the actual clears.

use rand::rngs::StdRng;
use rand::Rng;

/// Fallback interval when the configured range cannot be parsed
const DEFAULT_RANGE: (u64, u64) = (10, 20);

/// Armed/disarmed restart state machine
#[derive(Debug)]
pub struct RestartScheduler {
    enabled: bool,
    min: u64,
    max: u64,
    next_restart_step: Option<u64>,
    restart_count: u32,
}

impl RestartScheduler {
    /// Creates the scheduler, drawing the first restart step when enabled
    pub fn new(enabled: bool, range: &str, rng: &mut StdRng) -> Self {
        let (min, max) = parse_restart_range(range);
        let next_restart_step = if enabled {
            Some(rng.random_range(min..=max))
        } else {
            None
        };

        Self {
            enabled,
            min,
            max,
            next_restart_step,
            restart_count: 0,
        }
    }

    /// Returns true when a restart must fire at this step
    pub fn due(&self, step: u64) -> bool {
        self.enabled && self.next_restart_step == Some(step)
    }

    /// Returns true when a restart is still scheduled after this step
    /// and the step budget leaves room to reach it
    pub fn pending_after(&self, step: u64, max_steps: u64) -> bool {
        self.enabled
            && self.next_restart_step.map_or(false, |next| step < next)
            && step < max_steps
    }

    /// Records a completed restart and re-arms or disarms
    ///
    /// Re-arms with a fresh draw only while the remaining steps exceed
    /// the maximum interval; otherwise the scheduler disarms for the
    /// rest of the run.
    pub fn complete(&mut self, current_step: u64, max_steps: u64, rng: &mut StdRng) {
        self.restart_count += 1;

        let remaining = max_steps.saturating_sub(current_step);
        self.next_restart_step = if remaining > self.max {
            Some(current_step + rng.random_range(self.min..=self.max))
        } else {
            None
        };
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    pub fn next_restart_step(&self) -> Option<u64> {
        self.next_restart_step
    }

    /// Returns the configured (min, max) interval
    pub fn interval(&self) -> (u64, u64) {
        (self.min, self.max)
    }
}

/// Parses a restart interval range like "10-20" or "15"
///
/// Unicode hyphen variants are normalized first. A single bare number
/// means min = max. Malformed input logs a warning and falls back to
/// the default range; it is never fatal.
pub fn parse_restart_range(raw: &str) -> (u64, u64) {
    let normalized = raw.replace(['−', '—', '–', '－'], "-");

    let parsed = if let Some((lo, hi)) = normalized.split_once('-') {
        match (lo.trim().parse::<u64>(), hi.trim().parse::<u64>()) {
            (Ok(min), Ok(max)) if min <= max => Some((min, max)),
            _ => None,
        }
    } else {
        normalized.trim().parse::<u64>().ok().map(|v| (v, v))
    };

    match parsed {
        Some(range) => range,
        None => {
            tracing::warn!(
                input = %raw,
                "Could not parse restart range, using default {}-{}",
                DEFAULT_RANGE.0,
                DEFAULT_RANGE.1
            );
            DEFAULT_RANGE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn test_rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_parse_simple_range() {
        assert_eq!(parse_restart_range("10-20"), (10, 20));
    }

    #[test]
    fn test_parse_single_value() {
        assert_eq!(parse_restart_range("15"), (15, 15));
    }

    #[test]
    fn test_parse_unicode_hyphens() {
        assert_eq!(parse_restart_range("10−20"), (10, 20));
        assert_eq!(parse_restart_range("10—20"), (10, 20));
        assert_eq!(parse_restart_range("10–20"), (10, 20));
    }

    #[test]
    fn test_parse_with_whitespace() {
        assert_eq!(parse_restart_range(" 10 - 20 "), (10, 20));
    }

    #[test]
    fn test_parse_malformed_falls_back() {
        assert_eq!(parse_restart_range("abc"), (10, 20));
        assert_eq!(parse_restart_range(""), (10, 20));
        assert_eq!(parse_restart_range("10-abc"), (10, 20));
    }

    #[test]
    fn test_parse_inverted_range_falls_back() {
        assert_eq!(parse_restart_range("20-10"), (10, 20));
    }

    #[test]
    fn test_disabled_scheduler_never_fires() {
        let mut rng = test_rng();
        let scheduler = RestartScheduler::new(false, "10-20", &mut rng);

        assert_eq!(scheduler.next_restart_step(), None);
        for step in 1..=100 {
            assert!(!scheduler.due(step));
            assert!(!scheduler.pending_after(step, 100));
        }
    }

    #[test]
    fn test_initial_draw_within_range() {
        let mut rng = test_rng();
        let scheduler = RestartScheduler::new(true, "10-20", &mut rng);

        let next = scheduler.next_restart_step().unwrap();
        assert!((10..=20).contains(&next));
    }

    #[test]
    fn test_fixed_interval_fires_at_10_and_20_only() {
        // With min = max = 10 and 30 steps, restarts fire at exactly 10
        // and 20; after step 20 only 10 steps remain, which is not
        // strictly greater than the max interval, so no third restart is
        // scheduled.
        let mut rng = test_rng();
        let mut scheduler = RestartScheduler::new(true, "10", &mut rng);

        assert_eq!(scheduler.next_restart_step(), Some(10));
        assert!(scheduler.due(10));
        scheduler.complete(10, 30, &mut rng);

        assert_eq!(scheduler.next_restart_step(), Some(20));
        assert!(scheduler.due(20));
        scheduler.complete(20, 30, &mut rng);

        assert_eq!(scheduler.next_restart_step(), None);
        assert_eq!(scheduler.restart_count(), 2);
        for step in 21..=30 {
            assert!(!scheduler.due(step));
        }
    }

    #[test]
    fn test_rearm_target_is_after_current_step() {
        let mut rng = test_rng();
        let mut scheduler = RestartScheduler::new(true, "3-5", &mut rng);

        let first = scheduler.next_restart_step().unwrap();
        scheduler.complete(first, 1000, &mut rng);

        let second = scheduler.next_restart_step().unwrap();
        assert!(second > first);
        assert!(second <= first + 5);
    }

    #[test]
    fn test_pending_after_boundaries() {
        let mut rng = test_rng();
        let scheduler = RestartScheduler::new(true, "10", &mut rng);

        assert!(scheduler.pending_after(5, 30));
        // Not pending at or past the scheduled step
        assert!(!scheduler.pending_after(10, 30));
        assert!(!scheduler.pending_after(11, 30));
        // Not pending when the budget is already exhausted
        assert!(!scheduler.pending_after(5, 5));
    }
}
