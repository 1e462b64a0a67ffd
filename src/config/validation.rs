use crate::config::types::{
    ActionSpec, InputSpec, RawActionSpec, RawInputSpec, RawStore, Store, ValueSource,
};
use crate::ConfigError;

/// Validates a raw store and converts it into its closed form
///
/// Exclusion rules keep their configured order. Action inputs are
/// collapsed into a single value source with precedence
/// Fixed > RandomChoice > NamedListRef; an input with no source at all
/// is rejected here rather than silently skipped at execution time.
pub fn validate(raw: RawStore) -> Result<Store, ConfigError> {
    for rule in &raw.ignore_patterns {
        if rule.pattern.is_empty() {
            return Err(ConfigError::InvalidPattern(
                "exclusion pattern cannot be empty".to_string(),
            ));
        }
    }

    let actions = raw
        .actions
        .into_iter()
        .map(validate_action)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Store {
        word_lists: raw.word_lists,
        rules: raw.ignore_patterns,
        actions,
    })
}

fn validate_action(raw: RawActionSpec) -> Result<ActionSpec, ConfigError> {
    if raw.name.is_empty() {
        return Err(ConfigError::Validation(
            "action name cannot be empty".to_string(),
        ));
    }

    if raw.trigger.is_empty() {
        return Err(ConfigError::Validation(format!(
            "action '{}' has an empty url_pattern",
            raw.name
        )));
    }

    let inputs = raw
        .inputs
        .into_iter()
        .map(|input| validate_input(&raw.name, input))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ActionSpec {
        name: raw.name,
        trigger: raw.trigger,
        description: raw.description,
        enabled: raw.enabled,
        inputs,
        click_target: raw.click_target,
        post_click_wait_secs: raw.post_click_wait_secs,
    })
}

fn validate_input(action_name: &str, raw: RawInputSpec) -> Result<InputSpec, ConfigError> {
    if raw.xpath.is_empty() {
        return Err(ConfigError::Validation(format!(
            "action '{}' has an input with an empty locator",
            action_name
        )));
    }

    // Precedence: a fixed value wins, then an inline random list, then a
    // named list reference. An empty inline list is treated as absent so
    // a configured value_list can still take effect.
    let source = if let Some(value) = raw.value {
        ValueSource::Fixed(value)
    } else if let Some(values) = raw.random_values.filter(|v| !v.is_empty()) {
        ValueSource::RandomChoice(values)
    } else if let Some(list_name) = raw.value_list {
        ValueSource::NamedListRef(list_name)
    } else {
        return Err(ConfigError::Validation(format!(
            "input '{}' in action '{}' has no value, random_values or value_list",
            raw.xpath, action_name
        )));
    };

    Ok(InputSpec {
        locator: raw.xpath,
        source,
        description: raw.description,
    })
}
