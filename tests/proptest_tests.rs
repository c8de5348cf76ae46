//! Property-based tests for the query guard
//!
//! Uses proptest to verify invariants across randomized inputs:
//! - Normalization is idempotent and never leaves edge whitespace
//! - Validation is total and deterministic
//! - The length limit is inclusive
//! - Forbidden keywords only match whole words

use proptest::prelude::*;
use sql_query_guard::constants::DEFAULT_FORBIDDEN_KEYWORDS;
use sql_query_guard::security::normalize;
use sql_query_guard::{QueryValidator, ValidationConfig, ValidationMode};

/// SQL-flavoured text: words, quotes, comment markers, separators.
fn sqlish_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_ \\t\\n;,.'\"`()*=<>$#%/\\[\\]-]{0,80}"
}

fn forbidden_keyword() -> impl Strategy<Value = &'static str> {
    prop::sample::select(DEFAULT_FORBIDDEN_KEYWORDS)
}

// ============================================================================
// Normalization Properties
// ============================================================================

proptest! {
    #[test]
    fn normalize_is_idempotent(text in sqlish_text()) {
        let once = normalize(&text);
        prop_assert_eq!(normalize(&once), once);
    }

    #[test]
    fn normalize_has_no_leading_space(text in sqlish_text()) {
        let normalized = normalize(&text);
        prop_assert!(!normalized.starts_with(' '));
    }

    #[test]
    fn normalize_preserves_string_literals(body in "[a-zA-Z0-9 ;,*=-]{0,30}") {
        let query = format!("select  '{}'  as v", body);
        let normalized = normalize(&query);
        let expected = format!("'{}'", body);
        prop_assert!(normalized.contains(&expected));
    }
}

// ============================================================================
// Validation Properties
// ============================================================================

proptest! {
    #[test]
    fn validation_is_total_and_deterministic(text in any::<String>()) {
        let validator = QueryValidator::default();
        for mode in [ValidationMode::Strict, ValidationMode::Permissive] {
            let first = validator.validate(&text, mode);
            let second = validator.validate(&text, mode);
            prop_assert_eq!(first.normalized_query().is_some(), first.is_valid());
            prop_assert_eq!(first.error_message().is_some(), !first.is_valid());
            prop_assert_eq!(first, second);
        }
    }

    #[test]
    fn strict_acceptance_implies_permissive_acceptance(text in sqlish_text()) {
        let validator = QueryValidator::default();
        if validator.is_safe(&text) {
            prop_assert!(validator.validate_or_fail(&text).is_ok());
        }
    }

    #[test]
    fn length_limit_is_inclusive(padding in 1usize..200) {
        let limit = "SELECT ".len() + padding;
        let config = ValidationConfig::default().with_max_query_length(limit).unwrap();
        let validator = QueryValidator::new(config);

        let exact = format!("SELECT {}", "a".repeat(padding));
        prop_assert!(validator.validate_or_fail(&exact).is_ok());

        let over = format!("{}a", exact);
        let err = validator.validate_or_fail(&over).unwrap_err();
        prop_assert_eq!(
            err.reason(),
            format!("Query exceeds maximum length of {} characters", limit)
        );
    }

    #[test]
    fn keywords_inside_identifiers_are_allowed(
        keyword in forbidden_keyword(),
        prefix in "[a-z]{1,4}",
        suffix in "[a-z0-9]{1,4}",
    ) {
        let validator = QueryValidator::default();
        let query = format!(
            "SELECT {p}{k}, {k}_{s} FROM t",
            p = prefix,
            k = keyword.to_lowercase(),
            s = suffix
        );
        prop_assert!(validator.is_safe(&query), "rejected: {}", query);
    }

    #[test]
    fn standalone_keywords_are_rejected(keyword in forbidden_keyword(), lower in any::<bool>()) {
        let validator = QueryValidator::default();
        let word = if lower { keyword.to_lowercase() } else { keyword.to_string() };
        let query = format!("SELECT a FROM t WHERE {} = 1", word);
        let err = validator.validate_or_fail(&query).unwrap_err();
        prop_assert_eq!(err.reason(), format!("Forbidden keyword detected: {}", keyword));
    }
}
