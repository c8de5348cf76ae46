//! Query validation pipeline.
//!
//! [`QueryValidator`] runs a fixed chain of gates over untrusted query text:
//!
//! 1. basic checks (blank input, length limit)
//! 2. threat detection on the raw text
//! 3. normalization
//! 4. meta-command short-circuit (permissive mode only)
//! 5. structural checks (SELECT/WITH start, forbidden keywords)
//! 6. single-statement enforcement
//!
//! The first failing gate decides the outcome. Each call reads one
//! configuration snapshot, so a concurrent [`QueryValidator::reconfigure`]
//! is observed either entirely or not at all.

use crate::activity::{truncate_for_log, BestEffortSink, QueryActivityLog, SecurityEvent};
use crate::config::ValidationConfig;
use crate::constants::{
    ALLOWED_QUERY_PREFIXES, LOG_QUERY_TRUNCATE_LENGTH, META_COMMAND_DENIED_NAMES,
};
use crate::error::GuardError;
use crate::security::normalize::{normalize, split_statements};
use crate::security::threats::{self, ThreatCategory, ThreatMatch};
use arc_swap::{ArcSwap, ArcSwapOption};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Query validation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValidationMode {
    /// Only SELECT and WITH queries are accepted.
    #[default]
    Strict,

    /// Additionally accepts a single diagnostic meta-command, such as
    /// `version()` or `current_setting('work_mem')`.
    Permissive,
}

/// Reason a query was rejected.
///
/// Callers see only the message; the variants exist for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Query cannot be empty")]
    EmptyQuery,

    #[error("Query exceeds maximum length of {limit} characters")]
    QueryTooLong { limit: usize },

    #[error("Query contains suspicious patterns")]
    SuspiciousPattern,

    #[error("Query contains potential SQL injection patterns")]
    InjectionPattern,

    #[error("Only SELECT and WITH queries are allowed")]
    InvalidQueryStart,

    #[error("Forbidden keyword detected: {0}")]
    ForbiddenKeyword(String),

    #[error("Multiple statements are not allowed")]
    MultipleStatements,
}

/// Result of query validation.
///
/// Exactly one of `normalized_query` and `error_message` is present,
/// matching `is_valid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    is_valid: bool,
    normalized_query: Option<String>,
    error_message: Option<String>,
}

impl ValidationResult {
    /// A successful result carrying the normalized query.
    pub fn success(normalized_query: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            normalized_query: Some(normalized_query.into()),
            error_message: None,
        }
    }

    /// A failed result carrying the rejection message.
    pub fn failure(error_message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            normalized_query: None,
            error_message: Some(error_message.into()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn normalized_query(&self) -> Option<&str> {
        self.normalized_query.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Convert into the normalized query or a security rejection.
    pub fn into_result(self) -> Result<String, GuardError> {
        if self.is_valid {
            Ok(self.normalized_query.unwrap_or_default())
        } else {
            Err(GuardError::security(self.error_message.unwrap_or_default()))
        }
    }
}

impl From<Rejection> for ValidationResult {
    fn from(rejection: Rejection) -> Self {
        Self::failure(rejection.to_string())
    }
}

/// `SHOW <setting>`, or a bare name with an optional parenthesized argument.
static META_COMMAND_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(SHOW\s+[a-z_][a-z0-9_.]*|[a-z_][a-z0-9_]*\s*(\([^();]*\))?)$")
        .unwrap_or_else(|e| panic!("Internal error: invalid meta-command pattern: {}", e))
});

static META_COMMAND_DENIED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(r"(?i)^({})\b", META_COMMAND_DENIED_NAMES.join("|"));
    Regex::new(&pattern)
        .unwrap_or_else(|e| panic!("Internal error: invalid meta-command denylist: {}", e))
});

static QUERY_START_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(r"(?i)^({})\b", ALLOWED_QUERY_PREFIXES.join("|"));
    Regex::new(&pattern)
        .unwrap_or_else(|e| panic!("Internal error: invalid query start pattern: {}", e))
});

/// Query validator.
pub struct QueryValidator {
    config: ArcSwap<ValidationConfig>,
    activity_log: ArcSwapOption<BestEffortSink>,
}

impl QueryValidator {
    /// Create a new query validator.
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            activity_log: ArcSwapOption::empty(),
        }
    }

    /// Attach a query-activity log that receives threat events.
    pub fn with_activity_log(self, log: Arc<dyn QueryActivityLog>) -> Self {
        self.set_activity_log(Some(log));
        self
    }

    /// Attach, replace or detach the query-activity log.
    pub fn set_activity_log(&self, log: Option<Arc<dyn QueryActivityLog>>) {
        self.activity_log
            .store(log.map(|log| Arc::new(BestEffortSink::new(log))));
    }

    /// Replace the configuration snapshot.
    ///
    /// In-flight validations finish with the snapshot they started with.
    pub fn reconfigure(&self, config: ValidationConfig) {
        debug!(
            max_query_length = config.max_query_length(),
            keywords = config.forbidden_keywords().len(),
            "Validation configuration replaced"
        );
        self.config.store(Arc::new(config));
    }

    /// The current configuration snapshot.
    pub fn config(&self) -> Arc<ValidationConfig> {
        self.config.load_full()
    }

    /// Run the full pipeline and return the outcome as a value.
    pub fn validate(&self, query: &str, mode: ValidationMode) -> ValidationResult {
        match self.run(query, mode) {
            Ok(normalized) => ValidationResult::success(normalized),
            Err(rejection) => rejection.into(),
        }
    }

    /// Pre-flight check in strict mode. Meta-commands are rejected.
    pub fn is_safe(&self, query: &str) -> bool {
        match self.run(query, ValidationMode::Strict) {
            Ok(_) => true,
            Err(rejection) => {
                debug!("Pre-flight check rejected query: {}", rejection);
                false
            }
        }
    }

    /// Authoritative gate before execution, in permissive mode.
    ///
    /// Returns the normalized query, which is the only text that may be
    /// executed.
    pub fn validate_or_fail(&self, query: &str) -> Result<String, GuardError> {
        self.run(query, ValidationMode::Permissive)
            .map_err(|rejection| {
                warn!(
                    "Query rejected: {} [{}]",
                    rejection,
                    truncate_for_log(query, LOG_QUERY_TRUNCATE_LENGTH)
                );
                GuardError::security(rejection.to_string())
            })
    }

    fn run(&self, query: &str, mode: ValidationMode) -> Result<String, Rejection> {
        let config = self.config.load();

        check_basics(query, &config)?;
        self.check_threats(query)?;

        let normalized = normalize(query);

        if mode == ValidationMode::Permissive && is_meta_command(&normalized, &config) {
            debug!("Accepted meta-command: {}", normalized);
            return Ok(normalized);
        }

        check_structure(&normalized, &config)?;
        check_single_statement(&normalized)?;

        Ok(normalized)
    }

    fn check_threats(&self, query: &str) -> Result<(), Rejection> {
        let Some(found) = threats::detect(query) else {
            return Ok(());
        };

        self.report_threat(found, query);

        Err(match found.category {
            ThreatCategory::Suspicious => Rejection::SuspiciousPattern,
            ThreatCategory::Injection => Rejection::InjectionPattern,
        })
    }

    fn report_threat(&self, found: ThreatMatch, query: &str) {
        warn!(
            target: "security",
            category = %found.category,
            pattern = found.pattern,
            "Threat detected in query: {}",
            truncate_for_log(query, LOG_QUERY_TRUNCATE_LENGTH)
        );

        if let Some(sink) = self.activity_log.load_full() {
            sink.notify(&SecurityEvent::threat_detected(found.category, query));
        }
    }
}

impl Default for QueryValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

impl std::fmt::Debug for QueryValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryValidator")
            .field("config", &self.config.load_full())
            .field("activity_log", &self.activity_log.load().is_some())
            .finish()
    }
}

fn check_basics(query: &str, config: &ValidationConfig) -> Result<(), Rejection> {
    if query.trim().is_empty() {
        return Err(Rejection::EmptyQuery);
    }

    let limit = config.max_query_length();
    // Byte length bounds the character count from above.
    if query.len() > limit && query.chars().count() > limit {
        return Err(Rejection::QueryTooLong { limit });
    }

    Ok(())
}

/// Denied names and forbidden keywords get no bypass.
fn is_meta_command(normalized: &str, config: &ValidationConfig) -> bool {
    META_COMMAND_PATTERN.is_match(normalized)
        && !META_COMMAND_DENIED_PATTERN.is_match(normalized)
        && config.find_forbidden_keyword(normalized).is_none()
}

fn check_structure(normalized: &str, config: &ValidationConfig) -> Result<(), Rejection> {
    if !QUERY_START_PATTERN.is_match(normalized) {
        return Err(Rejection::InvalidQueryStart);
    }

    if let Some(keyword) = config.find_forbidden_keyword(normalized) {
        return Err(Rejection::ForbiddenKeyword(keyword.to_string()));
    }

    Ok(())
}

fn check_single_statement(normalized: &str) -> Result<(), Rejection> {
    if split_statements(normalized).len() > 1 {
        return Err(Rejection::MultipleStatements);
    }
    Ok(())
}

static GLOBAL_VALIDATOR: Lazy<QueryValidator> = Lazy::new(QueryValidator::default);

/// The process-wide validator, built from defaults on first use.
pub fn global_validator() -> &'static QueryValidator {
    &GLOBAL_VALIDATOR
}

/// Replace the process-wide configuration.
pub fn configure_global(config: ValidationConfig) {
    GLOBAL_VALIDATOR.reconfigure(config);
}

/// [`QueryValidator::is_safe`] on the process-wide validator.
pub fn is_safe(query: &str) -> bool {
    GLOBAL_VALIDATOR.is_safe(query)
}

/// [`QueryValidator::validate_or_fail`] on the process-wide validator.
pub fn validate_or_fail(query: &str) -> Result<String, GuardError> {
    GLOBAL_VALIDATOR.validate_or_fail(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::MemoryActivityLog;

    fn validator() -> QueryValidator {
        QueryValidator::default()
    }

    fn small_validator(max_query_length: usize) -> QueryValidator {
        QueryValidator::new(
            ValidationConfig::default()
                .with_max_query_length(max_query_length)
                .unwrap(),
        )
    }

    fn rejection_of(v: &QueryValidator, query: &str) -> String {
        v.validate_or_fail(query).unwrap_err().reason().to_string()
    }

    #[test]
    fn test_plain_select() {
        let v = validator();
        assert_eq!(
            v.validate_or_fail("SELECT * FROM users").unwrap(),
            "SELECT * FROM users"
        );
        assert_eq!(
            v.validate_or_fail("  SELECT * FROM users  ").unwrap(),
            "SELECT * FROM users"
        );
    }

    #[test]
    fn test_collapses_whitespace() {
        let v = validator();
        assert_eq!(
            v.validate_or_fail("select  *   from   users").unwrap(),
            "SELECT * FROM users"
        );
    }

    #[test]
    fn test_cte_accepted() {
        let v = validator();
        assert!(v.is_safe("WITH recent AS (SELECT * FROM orders) SELECT * FROM recent"));
    }

    #[test]
    fn test_empty_query() {
        let v = validator();
        assert_eq!(rejection_of(&v, ""), "Query cannot be empty");
        assert_eq!(rejection_of(&v, "   \n\t "), "Query cannot be empty");
    }

    #[test]
    fn test_length_limit_boundary() {
        let v = small_validator(20);
        let exact = format!("SELECT {}", "a".repeat(13));
        assert_eq!(exact.chars().count(), 20);
        assert!(v.validate_or_fail(&exact).is_ok());

        let over = format!("{}a", exact);
        let reason = rejection_of(&v, &over);
        assert_eq!(reason, "Query exceeds maximum length of 20 characters");
    }

    #[test]
    fn test_length_counts_characters() {
        let v = small_validator(10);
        // 10 characters, more than 10 bytes
        assert!(v.validate_or_fail("SELECT 'é'").is_ok());
    }

    #[test]
    fn test_invalid_start() {
        let v = validator();
        assert_eq!(
            rejection_of(&v, "DELETE FROM users"),
            "Only SELECT and WITH queries are allowed"
        );
        assert_eq!(
            rejection_of(&v, "SELECTED FROM x"),
            "Only SELECT and WITH queries are allowed"
        );
    }

    #[test]
    fn test_forbidden_keyword_anywhere() {
        let v = validator();
        assert_eq!(
            rejection_of(
                &v,
                "WITH d AS (DELETE FROM t RETURNING *) SELECT * FROM d"
            ),
            "Forbidden keyword detected: DELETE"
        );
        assert_eq!(
            rejection_of(&v, "SELECT * FROM users; DROP TABLE users;"),
            "Forbidden keyword detected: DROP"
        );
    }

    #[test]
    fn test_forbidden_keyword_in_literal_is_rejected() {
        let v = validator();
        assert_eq!(
            rejection_of(&v, "SELECT * FROM audit WHERE action = 'DROP'"),
            "Forbidden keyword detected: DROP"
        );
    }

    #[test]
    fn test_whole_word_only() {
        let v = validator();
        assert!(v.is_safe("SELECT dropdown_menu, updated_at, created_by FROM ui"));
        assert!(!v.is_safe("SELECT drop FROM ui"));
    }

    #[test]
    fn test_multiple_statements() {
        let v = validator();
        assert_eq!(
            rejection_of(&v, "SELECT 1; SELECT 2"),
            "Multiple statements are not allowed"
        );
        assert!(v.validate_or_fail("SELECT 1;").is_ok());
        assert!(v.validate_or_fail("SELECT ';' AS sep").is_ok());
    }

    #[test]
    fn test_multiple_statements_without_keyword_list() {
        let v = QueryValidator::new(ValidationConfig::new(1000, ["INSERT"]).unwrap());
        assert_eq!(
            rejection_of(&v, "SELECT 1; DROP TABLE users"),
            "Multiple statements are not allowed"
        );
    }

    #[test]
    fn test_threat_rejections() {
        let v = validator();
        assert_eq!(
            rejection_of(&v, "SELECT * FROM users WHERE id = 1 OR 1=1"),
            "Query contains suspicious patterns"
        );
        assert_eq!(
            rejection_of(&v, "SELECT pg_sleep(10)"),
            "Query contains potential SQL injection patterns"
        );
    }

    #[test]
    fn test_threats_checked_before_normalization() {
        let v = validator();
        // Normalization would strip the comment; detection sees it first.
        assert_eq!(
            rejection_of(&v, "SELECT name FROM users /* probe */"),
            "Query contains suspicious patterns"
        );
    }

    #[test]
    fn test_meta_commands_permissive_only() {
        let v = validator();
        assert_eq!(v.validate_or_fail("version()").unwrap(), "version()");
        assert_eq!(
            v.validate_or_fail("current_setting('work_mem')").unwrap(),
            "current_setting('work_mem')"
        );
        assert!(!v.is_safe("version()"));
        assert_eq!(
            v.validate("version()", ValidationMode::Strict).error_message(),
            Some("Only SELECT and WITH queries are allowed")
        );
    }

    #[test]
    fn test_meta_command_shape() {
        let v = validator();
        assert!(v.validate_or_fail("show_settings").is_ok());
        assert_eq!(v.validate_or_fail("show  work_mem").unwrap(), "show work_mem");
        assert!(v.validate_or_fail("vacuum users").is_err());
        assert!(v.validate_or_fail("show a b").is_err());
        assert!(v.validate_or_fail("pg_backend_pid()").is_ok());
        assert!(v.validate_or_fail("SHOW transaction_isolation").is_ok());
    }

    #[test]
    fn test_control_statements_not_meta_commands() {
        let v = validator();
        let denied = [
            "SHUTDOWN",
            "shutdown",
            "RECONFIGURE",
            "CHECKPOINT",
            "COMMIT",
            "ROLLBACK",
            "BEGIN",
            "BACKUP",
            "VACUUM",
            "pg_terminate_backend(42)",
            "setval('s', 1)",
            "set_config('work_mem', '1GB', false)",
        ];
        for query in denied {
            assert_eq!(
                rejection_of(&v, query),
                "Only SELECT and WITH queries are allowed",
                "accepted: {}",
                query
            );
        }
        assert!(v.validate_or_fail("settings_summary()").is_ok());
        assert!(v.validate_or_fail("version() extra").is_err());
    }

    #[test]
    fn test_forbidden_meta_command_not_bypassed() {
        let v = validator();
        assert_eq!(
            rejection_of(&v, "truncate(users)"),
            "Only SELECT and WITH queries are allowed"
        );
    }

    #[test]
    fn test_result_invariants() {
        let v = validator();
        let ok = v.validate("SELECT 1", ValidationMode::Strict);
        assert!(ok.is_valid());
        assert_eq!(ok.normalized_query(), Some("SELECT 1"));
        assert_eq!(ok.error_message(), None);

        let err = v.validate("", ValidationMode::Strict);
        assert!(!err.is_valid());
        assert_eq!(err.normalized_query(), None);
        assert_eq!(err, ValidationResult::failure("Query cannot be empty"));
        assert!(err.into_result().is_err());
    }

    #[test]
    fn test_threat_emits_event() {
        let log = Arc::new(MemoryActivityLog::new());
        let v = validator().with_activity_log(log.clone());

        assert!(!v.is_safe("SELECT sleep(5)"));
        assert!(v.is_safe("SELECT 1"));
        assert!(!v.is_safe("DELETE FROM users"));

        let events = log.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].query_type, ThreatCategory::Injection);
        assert_eq!(events[0].sql, "SELECT sleep(5)");
    }

    #[test]
    fn test_detached_activity_log() {
        let log = Arc::new(MemoryActivityLog::new());
        let v = validator().with_activity_log(log.clone());
        v.set_activity_log(None);
        assert!(!v.is_safe("SELECT 1 OR 1=1"));
        assert!(log.is_empty());
    }

    #[test]
    fn test_reconfigure() {
        let v = validator();
        assert!(v.is_safe("SELECT secret FROM vault"));

        let config = ValidationConfig::default()
            .with_additional_keywords(["secret"])
            .unwrap();
        v.reconfigure(config);

        assert_eq!(
            rejection_of(&v, "SELECT secret FROM vault"),
            "Forbidden keyword detected: SECRET"
        );
        assert!(v.config().forbidden_keywords().contains(&"SECRET"));
    }

    #[test]
    fn test_deterministic() {
        let v = validator();
        for query in ["SELECT  1", "DROP x", "", "SELECT 1 OR 1=1", "version()"] {
            assert_eq!(
                v.validate(query, ValidationMode::Permissive),
                v.validate(query, ValidationMode::Permissive)
            );
        }
    }
}
