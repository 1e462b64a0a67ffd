//! Exclusion pattern engine
//!
//! Evaluates the configured deny-rules against a URL. Rules are checked
//! in configured order and the first match wins; matching is
//! case-insensitive on both the URL and the pattern. A match emits one
//! diagnostic event naming the rule, for auditability only.

use crate::config::{ExclusionRule, RuleKind};
use regex::Regex;

/// A rule compiled for repeated matching
///
/// Regex patterns are compiled once here; a malformed regex is logged
/// and leaves `regex` unset, so the rule never matches but the rest of
/// the rule list stays in effect.
#[derive(Debug)]
struct CompiledRule {
    pattern: String,
    kind: RuleKind,
    description: String,
    regex: Option<Regex>,
}

/// Ordered set of enabled exclusion rules
#[derive(Debug, Default)]
pub struct ExclusionEngine {
    rules: Vec<CompiledRule>,
}

impl ExclusionEngine {
    /// Compiles the enabled rules, preserving their configured order
    pub fn compile(rules: &[ExclusionRule]) -> Self {
        let compiled = rules
            .iter()
            .filter(|rule| rule.enabled)
            .map(|rule| {
                let pattern = rule.pattern.to_lowercase();
                let regex = match rule.kind {
                    RuleKind::Regex => match Regex::new(&pattern) {
                        Ok(re) => Some(re),
                        Err(e) => {
                            tracing::warn!(
                                pattern = %rule.pattern,
                                "Malformed regex in exclusion rule, rule will never match: {}",
                                e
                            );
                            None
                        }
                    },
                    _ => None,
                };

                CompiledRule {
                    pattern,
                    kind: rule.kind,
                    description: rule.description.clone(),
                    regex,
                }
            })
            .collect();

        Self { rules: compiled }
    }

    /// Returns the number of active rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns whether no rules are active
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns true if any enabled rule matches the URL
    ///
    /// Short-circuits on the first match and emits a diagnostic event
    /// naming the matched rule.
    pub fn is_excluded(&self, url: &str) -> bool {
        let url_lower = url.to_lowercase();

        for rule in &self.rules {
            let matched = match rule.kind {
                RuleKind::Contains => url_lower.contains(&rule.pattern),
                RuleKind::Exact => url_lower == rule.pattern,
                RuleKind::Prefix => url_lower.starts_with(&rule.pattern),
                RuleKind::Suffix => url_lower.ends_with(&rule.pattern),
                RuleKind::Regex => match &rule.regex {
                    Some(re) => re.is_match(&url_lower),
                    None => false,
                },
                RuleKind::Glob => glob_match(&rule.pattern, &url_lower),
            };

            if matched {
                tracing::info!(
                    kind = ?rule.kind,
                    pattern = %rule.pattern,
                    description = %rule.description,
                    url = %url,
                    "URL matched exclusion rule"
                );
                return true;
            }
        }

        false
    }
}

/// Matches a `*`/`?` wildcard pattern against the full string
///
/// `*` matches any run of characters (including none), `?` matches
/// exactly one. Backtracks to the most recent `*` on mismatch.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let mut p = 0;
    let mut t = 0;
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }

    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, kind: RuleKind) -> ExclusionRule {
        ExclusionRule {
            pattern: pattern.to_string(),
            kind,
            description: format!("test rule for {}", pattern),
            enabled: true,
        }
    }

    #[test]
    fn test_contains_match() {
        let engine = ExclusionEngine::compile(&[rule("logout", RuleKind::Contains)]);
        assert!(engine.is_excluded("https://example.com/user/logout"));
        assert!(!engine.is_excluded("https://example.com/login"));
    }

    #[test]
    fn test_exact_match() {
        let engine = ExclusionEngine::compile(&[rule(
            "https://example.com/exact/path",
            RuleKind::Exact,
        )]);
        assert!(engine.is_excluded("https://example.com/exact/path"));
        assert!(!engine.is_excluded("https://example.com/exact/path/deeper"));
    }

    #[test]
    fn test_prefix_match() {
        let engine =
            ExclusionEngine::compile(&[rule("https://example.com/admin", RuleKind::Prefix)]);
        assert!(engine.is_excluded("https://example.com/admin/users"));
        assert!(!engine.is_excluded("https://other.com/admin"));
    }

    #[test]
    fn test_suffix_match() {
        let engine = ExclusionEngine::compile(&[rule(".pdf", RuleKind::Suffix)]);
        assert!(engine.is_excluded("https://example.com/report.pdf"));
        assert!(!engine.is_excluded("https://example.com/report.html"));
    }

    #[test]
    fn test_regex_match_is_unanchored() {
        let engine = ExclusionEngine::compile(&[rule("archive/\\d+", RuleKind::Regex)]);
        assert!(engine.is_excluded("https://example.com/archive/2024/post"));
        assert!(!engine.is_excluded("https://example.com/archive/latest"));
    }

    #[test]
    fn test_malformed_regex_never_matches_but_later_rules_apply() {
        let rules = [
            rule("[unclosed", RuleKind::Regex),
            rule("logout", RuleKind::Contains),
        ];
        let engine = ExclusionEngine::compile(&rules);

        assert!(!engine.is_excluded("https://example.com/[unclosed"));
        assert!(engine.is_excluded("https://example.com/logout"));
    }

    #[test]
    fn test_glob_match_rule() {
        let engine =
            ExclusionEngine::compile(&[rule("https://example.com/*.pdf", RuleKind::Glob)]);
        assert!(engine.is_excluded("https://example.com/docs/manual.pdf"));
        assert!(!engine.is_excluded("https://example.com/docs/manual.html"));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let engine = ExclusionEngine::compile(&[rule("LOGOUT", RuleKind::Contains)]);
        assert!(engine.is_excluded("https://example.com/Logout"));
    }

    #[test]
    fn test_disabled_rules_are_skipped() {
        let mut disabled = rule("logout", RuleKind::Contains);
        disabled.enabled = false;
        let engine = ExclusionEngine::compile(&[disabled]);

        assert!(engine.is_empty());
        assert!(!engine.is_excluded("https://example.com/logout"));
    }

    #[test]
    fn test_result_is_order_independent_for_boolean() {
        // Moving a matching rule earlier changes which rule reports the
        // match but never the boolean result.
        let a = rule("example", RuleKind::Contains);
        let b = rule("logout", RuleKind::Contains);

        let forward = ExclusionEngine::compile(&[a.clone(), b.clone()]);
        let reversed = ExclusionEngine::compile(&[b, a]);

        let url = "https://example.com/logout";
        assert_eq!(forward.is_excluded(url), reversed.is_excluded(url));
    }

    #[test]
    fn test_glob_star() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("https://*/page", "https://example.com/page"));
        assert!(glob_match("*.pdf", "report.pdf"));
        assert!(!glob_match("*.pdf", "report.pdf.html"));
    }

    #[test]
    fn test_glob_question_mark() {
        assert!(glob_match("page?", "page1"));
        assert!(!glob_match("page?", "page"));
        assert!(!glob_match("page?", "page12"));
    }

    #[test]
    fn test_glob_mixed() {
        assert!(glob_match("https://example.com/?/file-*.txt", "https://example.com/a/file-2024.txt"));
        assert!(!glob_match("https://example.com/?/file-*.txt", "https://example.com/ab/file-2024.txt"));
    }

    #[test]
    fn test_glob_empty() {
        assert!(glob_match("", ""));
        assert!(glob_match("*", ""));
        assert!(!glob_match("?", ""));
    }
}
