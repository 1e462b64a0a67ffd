//! Page-action resolution and execution
//!
//! Finds the configured actions matching a URL, resolves every input
//! value up front, then drives the rendering engine through form
//! population and the optional click. A failed input or click degrades
//! that action's success flag but never aborts the remaining inputs,
//! the action list, or the step. Every executed action appends exactly
//! one record regardless of outcome.

use crate::browser::{EngineError, RenderSession};
use crate::config::{ActionSpec, ValueSource};
use crate::history::{timestamp_now, ActionRecord};
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Settle time after navigating to the action's page
const PRE_ACTION_SETTLE: Duration = Duration::from_secs(2);

/// An input with its value already resolved
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub locator: String,
    /// None when no value could be resolved; the input is then skipped
    pub value: Option<String>,
    pub description: String,
}

/// An action ready to execute against the rendered page
#[derive(Debug, Clone)]
pub struct ResolvedAction {
    pub name: String,
    pub description: String,
    pub inputs: Vec<ResolvedInput>,
    pub click_target: Option<String>,
    pub post_click_wait_secs: u64,
}

/// Returns all enabled actions whose trigger substring occurs in the URL
///
/// Order is preserved from the configuration.
pub fn find_actions<'a>(url: &str, specs: &'a [ActionSpec]) -> Vec<&'a ActionSpec> {
    specs
        .iter()
        .filter(|spec| spec.enabled && url.contains(&spec.trigger))
        .collect()
}

/// Resolves an input value from its source
///
/// Fixed values pass through; random choices and named-list references
/// pick uniformly. A missing or empty named list resolves to None.
pub fn resolve_value(
    source: &ValueSource,
    word_lists: &HashMap<String, Vec<String>>,
    rng: &mut StdRng,
) -> Option<String> {
    match source {
        ValueSource::Fixed(value) => Some(value.clone()),
        ValueSource::RandomChoice(values) => {
            let picked = values[rng.random_range(0..values.len())].clone();
            tracing::debug!(value = %picked, choices = values.len(), "Picked random input value");
            Some(picked)
        }
        ValueSource::NamedListRef(list_name) => match word_lists.get(list_name) {
            Some(list) if !list.is_empty() => {
                let picked = list[rng.random_range(0..list.len())].clone();
                tracing::debug!(
                    list = %list_name,
                    value = %picked,
                    choices = list.len(),
                    "Picked value from word list"
                );
                Some(picked)
            }
            Some(_) => {
                tracing::warn!(list = %list_name, "Word list is empty");
                None
            }
            None => {
                tracing::warn!(list = %list_name, "Word list not found");
                None
            }
        },
    }
}

/// Resolves every input of the matched actions ahead of execution
pub fn resolve_actions(
    specs: &[&ActionSpec],
    word_lists: &HashMap<String, Vec<String>>,
    rng: &mut StdRng,
) -> Vec<ResolvedAction> {
    specs
        .iter()
        .map(|spec| ResolvedAction {
            name: spec.name.clone(),
            description: spec.description.clone(),
            inputs: spec
                .inputs
                .iter()
                .map(|input| ResolvedInput {
                    locator: input.locator.clone(),
                    value: resolve_value(&input.source, word_lists, rng),
                    description: input.description.clone(),
                })
                .collect(),
            click_target: spec.click_target.clone(),
            post_click_wait_secs: spec.post_click_wait_secs,
        })
        .collect()
}

/// Executes the resolved actions against the rendering engine
///
/// Runs the blocking engine work on the blocking thread pool. Returns
/// whether the page was navigated and acted on (so the fetch adapter
/// can reuse the rendered page) together with one record per action.
pub async fn run_actions(
    engine: Arc<dyn RenderSession>,
    url: String,
    actions: Vec<ResolvedAction>,
) -> (bool, Vec<ActionRecord>) {
    if actions.is_empty() {
        return (false, Vec::new());
    }

    let task = tokio::task::spawn_blocking(move || perform_actions(&*engine, &url, &actions)).await;

    match task {
        Ok(Ok(records)) => (true, records),
        Ok(Err(e)) => {
            tracing::warn!("Page actions aborted: {}", e);
            (false, Vec::new())
        }
        Err(e) => {
            tracing::warn!("Page action task panicked: {}", e);
            (false, Vec::new())
        }
    }
}

/// Synchronous action execution (runs on the blocking pool)
fn perform_actions(
    engine: &dyn RenderSession,
    url: &str,
    actions: &[ResolvedAction],
) -> Result<Vec<ActionRecord>, EngineError> {
    engine.navigate(url)?;
    std::thread::sleep(PRE_ACTION_SETTLE);

    let mut records = Vec::with_capacity(actions.len());

    for action in actions {
        tracing::info!(action = %action.name, url = %url, "Executing page action");

        let mut step_failed = false;
        let mut inputs_total = 0;
        let mut inputs_successful = 0;

        for input in &action.inputs {
            inputs_total += 1;

            let value = match &input.value {
                Some(value) => value,
                None => {
                    tracing::warn!(
                        locator = %input.locator,
                        description = %input.description,
                        "No value resolved for input, skipping"
                    );
                    continue;
                }
            };

            match engine.fill_input(&input.locator, value) {
                Ok(()) => {
                    inputs_successful += 1;
                    tracing::debug!(
                        locator = %input.locator,
                        value = %value,
                        "Input populated"
                    );
                }
                Err(e) => {
                    tracing::warn!(locator = %input.locator, "Input failed: {}", e);
                    step_failed = true;
                }
            }
        }

        let click_attempted = action.click_target.is_some();
        let mut click_successful = false;

        if let Some(target) = &action.click_target {
            match engine.click(target) {
                Ok(()) => {
                    click_successful = true;
                    tracing::debug!(locator = %target, "Click performed");
                    std::thread::sleep(Duration::from_secs(action.post_click_wait_secs));
                }
                Err(e) => {
                    tracing::warn!(locator = %target, "Click failed: {}", e);
                    step_failed = true;
                }
            }
        }

        let success = !step_failed
            && (inputs_successful == inputs_total || inputs_total == 0)
            && (click_successful || !click_attempted);

        tracing::info!(
            action = %action.name,
            success,
            inputs_successful,
            inputs_total,
            "Page action finished"
        );

        records.push(ActionRecord {
            timestamp: timestamp_now(),
            url: url.to_string(),
            action_name: action.name.clone(),
            description: action.description.clone(),
            success,
            inputs_total,
            inputs_successful,
            click_attempted,
            click_successful,
        });
    }

    Ok(records)
}
