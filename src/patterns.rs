//! Failure pattern classification.
//!
//! [`PatternDetector`] maps a failed or partial attempt onto at most one named
//! pattern. Custom patterns are checked first, then the built-ins in fixed
//! precedence order. A pattern name is registered once; later registrations
//! under the same name are ignored.

use serde::{Deserialize, Serialize};

use crate::error::{IafError, Result};
use crate::state_machine::AttemptResult;
use crate::tracker::ScoredAttempt;

pub const NO_ITEMS: &str = "NO_ITEMS";
pub const PARTIAL_SUCCESS: &str = "PARTIAL_SUCCESS";
pub const PARSE_ERROR: &str = "PARSE_ERROR";
pub const TIMEOUT: &str = "TIMEOUT";
pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
pub const INVALID_SELECTOR: &str = "INVALID_SELECTOR";
pub const REPEATED_FAILURE: &str = "REPEATED_FAILURE";

const TIMEOUT_CODES: &[&str] = &["timeout", "etimedout", "esockettimedout"];
const NETWORK_CODES: &[&str] = &["econnrefused", "enotfound"];

/// A declarative failure pattern, usually read from a workflow file.
///
/// All given conditions must hold for the pattern to match:
/// - `error_contains`: the error text contains any of these (case-insensitive)
/// - `item_count`: `metadata.itemCount` equals this value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailurePattern {
    pub name: String,
    pub suggested_fix: String,
    #[serde(default)]
    pub escalate: bool,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub error_contains: Vec<String>,
    #[serde(default)]
    pub item_count: Option<u64>,
}

fn default_confidence() -> f64 {
    0.5
}

impl FailurePattern {
    /// Reject patterns that could never match or carry nonsense confidence.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| IafError::InvalidPattern {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(invalid("confidence must be between 0 and 1"));
        }
        if self.error_contains.iter().all(|s| s.is_empty()) && self.item_count.is_none() {
            return Err(invalid("at least one match condition is required"));
        }
        Ok(())
    }

    fn matches(&self, result: &AttemptResult) -> bool {
        let needles: Vec<&String> = self.error_contains.iter().filter(|s| !s.is_empty()).collect();
        if !needles.is_empty() {
            let error = result.error_text().to_lowercase();
            if !needles.iter().any(|n| error.contains(&n.to_lowercase())) {
                return false;
            }
        }
        if let Some(expected) = self.item_count
            && result.item_count() != Some(expected as f64)
        {
            return false;
        }
        true
    }
}

/// A positive classification returned by [`PatternDetector::detect`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub name: String,
    pub confidence: f64,
    pub suggested_fix: String,
    pub escalate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    NoItems,
    PartialSuccess,
    ParseError,
    Timeout,
    NetworkError,
    InvalidSelector,
    RepeatedFailure,
}

impl Builtin {
    /// Precedence order.
    const ALL: [Builtin; 7] = [
        Builtin::NoItems,
        Builtin::PartialSuccess,
        Builtin::ParseError,
        Builtin::Timeout,
        Builtin::NetworkError,
        Builtin::InvalidSelector,
        Builtin::RepeatedFailure,
    ];

    fn name(self) -> &'static str {
        match self {
            Builtin::NoItems => NO_ITEMS,
            Builtin::PartialSuccess => PARTIAL_SUCCESS,
            Builtin::ParseError => PARSE_ERROR,
            Builtin::Timeout => TIMEOUT,
            Builtin::NetworkError => NETWORK_ERROR,
            Builtin::InvalidSelector => INVALID_SELECTOR,
            Builtin::RepeatedFailure => REPEATED_FAILURE,
        }
    }

    fn to_match(self) -> PatternMatch {
        let (confidence, escalate, fix) = match self {
            Builtin::NoItems => (
                0.9,
                true,
                "No items found; the extraction approach likely needs to change",
            ),
            Builtin::PartialSuccess => (
                0.8,
                false,
                "Some items extracted but validation failed; refine field extraction",
            ),
            Builtin::ParseError => (
                0.85,
                true,
                "Output could not be parsed; revisit the parsing strategy",
            ),
            Builtin::Timeout => (0.95, false, "Request timed out; retry or increase the timeout"),
            Builtin::NetworkError => (
                0.9,
                false,
                "Host unreachable; check the URL and network connectivity",
            ),
            Builtin::InvalidSelector => (
                0.75,
                true,
                "Selector did not match; inspect the page structure",
            ),
            Builtin::RepeatedFailure => {
                (0.7, false, "Same error repeated; try a different approach")
            }
        };
        PatternMatch {
            name: self.name().to_string(),
            confidence,
            suggested_fix: fix.to_string(),
            escalate,
        }
    }

    fn matches(self, result: &AttemptResult, error: &str, prior: &[ScoredAttempt]) -> bool {
        match self {
            Builtin::NoItems => result.item_count() == Some(0.0),
            Builtin::PartialSuccess => {
                !result.validated && result.item_count().is_some_and(|n| n > 0.0)
            }
            Builtin::ParseError => error.contains("parse"),
            Builtin::Timeout => TIMEOUT_CODES.iter().any(|c| error.contains(c)),
            Builtin::NetworkError => NETWORK_CODES.iter().any(|c| error.contains(c)),
            Builtin::InvalidSelector => error.contains("selector"),
            Builtin::RepeatedFailure => match prior {
                [.., a, b] => {
                    let last = b.result.error_text();
                    !last.is_empty() && a.result.error_text() == last
                }
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone)]
enum Rule {
    Custom(FailurePattern),
    Builtin(Builtin),
}

impl Rule {
    fn name(&self) -> &str {
        match self {
            Rule::Custom(p) => &p.name,
            Rule::Builtin(b) => b.name(),
        }
    }
}

/// Classifies attempt results into failure patterns.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    rules: Vec<Rule>,
}

impl PatternDetector {
    /// A detector with only the built-in patterns.
    pub fn new() -> Self {
        Self {
            rules: Builtin::ALL.iter().map(|b| Rule::Builtin(*b)).collect(),
        }
    }

    /// A detector whose custom patterns are registered before the built-ins,
    /// so a custom pattern shadows a built-in of the same name.
    pub fn with_custom(patterns: &[FailurePattern]) -> Result<Self> {
        let mut detector = Self { rules: Vec::new() };
        for pattern in patterns {
            detector.register(pattern.clone())?;
        }
        for builtin in Builtin::ALL {
            if !detector.has(builtin.name()) {
                detector.rules.push(Rule::Builtin(builtin));
            }
        }
        Ok(detector)
    }

    /// Register a custom pattern ahead of the built-ins.
    ///
    /// Returns `Ok(false)` without changes when the name is already taken.
    pub fn register(&mut self, pattern: FailurePattern) -> Result<bool> {
        pattern.validate()?;
        if self.has(&pattern.name) {
            return Ok(false);
        }
        let at = self
            .rules
            .iter()
            .position(|r| matches!(r, Rule::Builtin(_)))
            .unwrap_or(self.rules.len());
        self.rules.insert(at, Rule::Custom(pattern));
        Ok(true)
    }

    pub fn has(&self, name: &str) -> bool {
        self.rules.iter().any(|r| r.name() == name)
    }

    /// Pattern names in evaluation order.
    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(Rule::name).collect()
    }

    /// Classify `result` given the attempts recorded before it in this layer.
    /// First match wins.
    ///
    /// `prior` must not include `result` itself. `REPEATED_FAILURE` compares
    /// the two most recent entries of `prior`, so with a constant error it
    /// first fires on the third attempt of a layer.
    pub fn detect(&self, result: &AttemptResult, prior: &[ScoredAttempt]) -> Option<PatternMatch> {
        let error = result.error_text().to_lowercase();
        self.rules.iter().find_map(|rule| match rule {
            Rule::Custom(p) if p.matches(result) => Some(PatternMatch {
                name: p.name.clone(),
                confidence: p.confidence,
                suggested_fix: p.suggested_fix.clone(),
                escalate: p.escalate,
            }),
            Rule::Builtin(b) if b.matches(result, &error, prior) => Some(b.to_match()),
            _ => None,
        })
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn prior(errors: &[&str]) -> Vec<ScoredAttempt> {
        errors
            .iter()
            .enumerate()
            .map(|(i, e)| ScoredAttempt {
                attempt: i as u32 + 1,
                score: 0.0,
                result: AttemptResult::failure(*e),
            })
            .collect()
    }

    fn detect(result: &AttemptResult) -> Option<String> {
        PatternDetector::new().detect(result, &[]).map(|m| m.name)
    }

    fn custom(name: &str, needle: &str, escalate: bool) -> FailurePattern {
        FailurePattern {
            name: name.into(),
            suggested_fix: "log in first".into(),
            escalate,
            confidence: 0.6,
            error_contains: vec![needle.into()],
            item_count: None,
        }
    }

    #[test]
    fn no_items_wins_over_timeout() {
        let result = AttemptResult::failure("timeout").with_item_count(0);
        let m = PatternDetector::new().detect(&result, &[]).unwrap();
        assert_eq!(m.name, NO_ITEMS);
        assert_eq!(m.confidence, 0.9);
        assert!(m.escalate);
    }

    #[test]
    fn partial_success_needs_items_and_no_validation() {
        let partial = AttemptResult::success(Value::Null).with_item_count(4);
        assert_eq!(detect(&partial).as_deref(), Some(PARTIAL_SUCCESS));

        let validated = AttemptResult::validated(Value::Null).with_item_count(4);
        assert_eq!(detect(&validated), None);
    }

    #[test]
    fn error_text_patterns() {
        let cases = [
            ("JSON parse error at line 3", PARSE_ERROR),
            ("Navigation Timeout exceeded", TIMEOUT),
            ("connect ETIMEDOUT 10.0.0.1:443", TIMEOUT),
            ("connect ECONNREFUSED 127.0.0.1:80", NETWORK_ERROR),
            ("getaddrinfo ENOTFOUND example.invalid", NETWORK_ERROR),
            ("No node found for selector: .event-date", INVALID_SELECTOR),
        ];
        for (error, expected) in cases {
            assert_eq!(
                detect(&AttemptResult::failure(error)).as_deref(),
                Some(expected),
                "error: {error}"
            );
        }
    }

    #[test]
    fn parse_precedes_selector() {
        let result = AttemptResult::failure("could not parse selector output");
        assert_eq!(detect(&result).as_deref(), Some(PARSE_ERROR));
    }

    #[test]
    fn repeated_failure_looks_at_two_prior_attempts() {
        let detector = PatternDetector::new();
        let result = AttemptResult::failure("something odd");

        let m = detector.detect(&result, &prior(&["boom", "boom"])).unwrap();
        assert_eq!(m.name, REPEATED_FAILURE);
        assert!(!m.escalate);

        assert!(detector.detect(&result, &prior(&["boom", "bang"])).is_none());
        assert!(detector.detect(&result, &prior(&["boom"])).is_none());
        assert!(detector.detect(&result, &prior(&["", ""])).is_none());
    }

    #[test]
    fn unknown_failure_has_no_pattern() {
        assert_eq!(detect(&AttemptResult::failure("disk full")), None);
        assert_eq!(detect(&AttemptResult::empty()), None);
    }

    #[test]
    fn custom_patterns_run_first() {
        let detector =
            PatternDetector::with_custom(&[custom("LOGIN_WALL", "timeout", true)]).unwrap();
        let m = detector.detect(&AttemptResult::failure("timeout on /login"), &[]).unwrap();
        assert_eq!(m.name, "LOGIN_WALL");
        assert_eq!(detector.names()[0], "LOGIN_WALL");
    }

    #[test]
    fn custom_pattern_shadows_builtin_of_same_name() {
        let detector = PatternDetector::with_custom(&[custom(TIMEOUT, "slow", true)]).unwrap();
        assert_eq!(detector.names().iter().filter(|n| **n == TIMEOUT).count(), 1);

        let m = detector.detect(&AttemptResult::failure("too slow"), &[]).unwrap();
        assert_eq!(m.name, TIMEOUT);
        assert!(m.escalate);
        // The built-in timeout check is gone.
        assert!(detector.detect(&AttemptResult::failure("timeout"), &[]).is_none());
    }

    #[test]
    fn register_never_overwrites() {
        let mut detector = PatternDetector::new();
        assert!(!detector.register(custom(NO_ITEMS, "x", false)).unwrap());
        assert!(detector.register(custom("CAPTCHA", "captcha", true)).unwrap());
        assert!(!detector.register(custom("CAPTCHA", "robot", false)).unwrap());

        let names = detector.names();
        assert_eq!(names[0], "CAPTCHA");
        assert_eq!(names.len(), 8);
    }

    #[test]
    fn custom_item_count_condition() {
        let pattern = FailurePattern {
            item_count: Some(1),
            error_contains: vec![],
            ..custom("SINGLE_ITEM", "", false)
        };
        let detector = PatternDetector::with_custom(&[pattern]).unwrap();
        let m = detector
            .detect(&AttemptResult::success(Value::Null).with_item_count(1), &[])
            .unwrap();
        assert_eq!(m.name, "SINGLE_ITEM");
    }

    #[test]
    fn invalid_custom_patterns_are_rejected() {
        let no_condition = custom("EMPTY", "", false);
        assert!(matches!(
            PatternDetector::with_custom(&[no_condition]),
            Err(IafError::InvalidPattern { .. })
        ));

        let bad_confidence = FailurePattern {
            confidence: 1.5,
            ..custom("HIGH", "x", false)
        };
        assert!(bad_confidence.validate().is_err());
    }
}
