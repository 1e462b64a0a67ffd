use crate::config::types::{RawStore, Store};
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and validates the JSON configuration store
///
/// A missing store file is initialized with a documented sample
/// structure (word lists, exclusion rules and example actions, all
/// examples disabled) and then loaded normally.
///
/// # Arguments
///
/// * `path` - Path to the JSON store file
///
/// # Returns
///
/// * `Ok(Store)` - Successfully loaded and validated store
/// * `Err(ConfigError)` - Failed to read, parse, or validate the store
pub fn load_store(path: &Path) -> Result<Store, ConfigError> {
    if !path.exists() {
        tracing::info!("Config store not found, writing sample to {}", path.display());
        std::fs::write(path, SAMPLE_STORE)?;
    }

    let content = std::fs::read_to_string(path)?;
    let raw: RawStore = serde_json::from_str(&content)?;
    validate(raw)
}

/// Computes a SHA-256 hash of the store file content
///
/// Used to record which store a run was produced with.
pub fn compute_store_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads the store and returns both the store and its content hash
pub fn load_store_with_hash(path: &Path) -> Result<(Store, String), ConfigError> {
    let store = load_store(path)?;
    let hash = compute_store_hash(path)?;
    Ok((store, hash))
}

/// Sample store written when no store file exists
///
/// Every example rule beyond the common page exclusions is disabled, and
/// every example action is disabled, so a fresh store changes nothing
/// until edited.
const SAMPLE_STORE: &str = r#"{
  "word_lists": {
    "names": ["Alice Johnson", "Bob Smith", "Carol Davis", "Dan Wilson", "Erin Moore"],
    "cities": ["Tokyo", "Osaka", "Nagoya", "Fukuoka", "Sapporo", "Yokohama"],
    "companies": ["Sample Inc.", "Test Ltd.", "Demo LLC", "Example Corp."],
    "search_keywords": ["rust programming", "machine learning", "web development", "data science"],
    "emails": ["test@example.com", "sample@test.example", "demo@sample.example"],
    "messages": [
      "I am interested in your service, could you share more details?",
      "Could you tell me about your pricing plans?",
      "Is a free trial available?"
    ]
  },
  "ignore_patterns": [
    {
      "pattern": "logout",
      "type": "contains",
      "description": "Skip logout pages",
      "enabled": true
    },
    {
      "pattern": "admin",
      "type": "contains",
      "description": "Skip admin pages",
      "enabled": true
    },
    {
      "pattern": "privacy",
      "type": "contains",
      "description": "Skip privacy policy pages",
      "enabled": true
    },
    {
      "pattern": "terms",
      "type": "contains",
      "description": "Skip terms-of-service pages",
      "enabled": true
    },
    {
      "pattern": "https://example.com/exact/path",
      "type": "exact",
      "description": "Skip one specific URL",
      "enabled": false
    },
    {
      "pattern": "https://example.com/admin",
      "type": "startswith",
      "description": "Skip everything under /admin",
      "enabled": false
    },
    {
      "pattern": ".pdf",
      "type": "endswith",
      "description": "Skip PDF files",
      "enabled": false
    },
    {
      "pattern": "^https://example\\.com/archive/.*",
      "type": "regex",
      "description": "Skip the archive section",
      "enabled": false
    },
    {
      "pattern": "https://example.com/*.pdf",
      "type": "wildcard",
      "description": "Skip PDF files by wildcard",
      "enabled": false
    }
  ],
  "actions": [
    {
      "name": "login form example",
      "url_pattern": "example.com/login",
      "description": "Automatic login form fill",
      "inputs": [
        {
          "xpath": "//input[@name='username']",
          "random_values": ["user1", "testuser", "demo_user"],
          "description": "Username (random pick)"
        },
        {
          "xpath": "//input[@name='password']",
          "value": "testpass",
          "description": "Password (fixed value)"
        }
      ],
      "click_element": "//button[@type='submit']",
      "wait_after_click": 3,
      "enabled": false
    },
    {
      "name": "contact form example",
      "url_pattern": "contact",
      "description": "Contact form with word-list values",
      "inputs": [
        {
          "xpath": "//input[@name='name']",
          "value_list": "names",
          "description": "Name (from the names list)"
        },
        {
          "xpath": "//input[@name='email']",
          "value_list": "emails",
          "description": "Email (from the emails list)"
        },
        {
          "xpath": "//textarea[@name='message']",
          "value_list": "messages",
          "description": "Message body (from the messages list)"
        }
      ],
      "click_element": "//button[contains(text(), 'Send')]",
      "wait_after_click": 5,
      "enabled": false
    }
  ]
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::RuleKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_store(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_store() {
        let content = r#"{
            "word_lists": {"names": ["Alice", "Bob"]},
            "ignore_patterns": [
                {"pattern": "logout", "type": "contains", "description": "skip logout", "enabled": true}
            ],
            "actions": [
                {
                    "name": "search",
                    "url_pattern": "search.example.com",
                    "inputs": [{"xpath": "//input[@name='q']", "value_list": "names"}],
                    "click_element": "//button",
                    "wait_after_click": 2
                }
            ]
        }"#;

        let file = create_temp_store(content);
        let store = load_store(file.path()).unwrap();

        assert_eq!(store.word_lists["names"].len(), 2);
        assert_eq!(store.rules.len(), 1);
        assert_eq!(store.rules[0].kind, RuleKind::Contains);
        assert_eq!(store.actions.len(), 1);
        assert_eq!(store.actions[0].trigger, "search.example.com");
        assert!(store.actions[0].enabled);
    }

    #[test]
    fn test_unknown_rule_kind_is_rejected() {
        let content = r#"{
            "ignore_patterns": [
                {"pattern": "x", "type": "fuzzy", "description": "", "enabled": true}
            ]
        }"#;

        let file = create_temp_store(content);
        let result = load_store(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let file = create_temp_store("this is not JSON {{{");
        let result = load_store(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_store_is_initialized_with_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawler_config.json");
        assert!(!path.exists());

        let store = load_store(&path).unwrap();

        assert!(path.exists());
        assert!(!store.word_lists.is_empty());
        assert!(!store.rules.is_empty());
        // Sample actions must all be disabled
        assert!(store.actions.iter().all(|a| !a.enabled));
    }

    #[test]
    fn test_store_hash_is_stable() {
        let file = create_temp_store(r#"{"actions": []}"#);

        let hash1 = compute_store_hash(file.path()).unwrap();
        let hash2 = compute_store_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_store(r#"{"actions": []}"#);
        let file2 = create_temp_store(r#"{"word_lists": {}}"#);

        let hash1 = compute_store_hash(file1.path()).unwrap();
        let hash2 = compute_store_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
