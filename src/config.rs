//! Configuration management for the query guard.
//!
//! A [`ValidationConfig`] is an immutable snapshot: the host builds one at
//! startup (from defaults, environment variables or a serde document) and
//! replaces it wholesale when reconfiguring. Keyword matchers are compiled
//! when the snapshot is built, so validation never compiles a regex.

use crate::constants::{
    DEFAULT_FORBIDDEN_KEYWORDS, DEFAULT_MAX_QUERY_LENGTH, ENV_EXTRA_FORBIDDEN_KEYWORDS,
    ENV_FORBIDDEN_KEYWORDS, ENV_MAX_QUERY_LENGTH,
};
use crate::error::GuardError;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Raw, serde-facing form of the validation configuration.
///
/// Missing fields take their defaults, so a host document only needs to name
/// what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Maximum query length in characters
    pub max_query_length: usize,

    /// Forbidden keywords, in reporting order
    pub forbidden_keywords: Vec<String>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            forbidden_keywords: DEFAULT_FORBIDDEN_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

/// A forbidden keyword and its whole-word, case-insensitive matcher.
#[derive(Debug, Clone)]
struct KeywordRule {
    name: String,
    pattern: Regex,
}

impl KeywordRule {
    fn new(name: String) -> Result<Self, GuardError> {
        let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&name))).map_err(|e| {
            GuardError::config(format!("Cannot build matcher for keyword '{}': {}", name, e))
        })?;
        Ok(Self { name, pattern })
    }
}

/// Validated, immutable validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ValidationSettings", into = "ValidationSettings")]
pub struct ValidationConfig {
    max_query_length: usize,
    forbidden_keywords: Vec<KeywordRule>,
}

impl ValidationConfig {
    /// Build a configuration from a length limit and an ordered keyword list.
    ///
    /// Keywords are upper-cased and de-duplicated, keeping the first
    /// occurrence. Fails if the limit is zero or a keyword is not a plain
    /// word (ASCII letters, digits and underscores).
    pub fn new<I, S>(max_query_length: usize, forbidden_keywords: I) -> Result<Self, GuardError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if max_query_length == 0 {
            return Err(GuardError::config(
                "Maximum query length must be a positive integer",
            ));
        }

        let mut rules: Vec<KeywordRule> = Vec::new();
        for raw in forbidden_keywords {
            let name = parse_keyword(raw.as_ref())?;
            if rules.iter().any(|rule| rule.name == name) {
                continue;
            }
            rules.push(KeywordRule::new(name)?);
        }

        Ok(Self {
            max_query_length,
            forbidden_keywords: rules,
        })
    }

    /// Return a copy with a different length limit.
    pub fn with_max_query_length(self, max_query_length: usize) -> Result<Self, GuardError> {
        if max_query_length == 0 {
            return Err(GuardError::config(
                "Maximum query length must be a positive integer",
            ));
        }
        Ok(Self {
            max_query_length,
            ..self
        })
    }

    /// Return a copy whose keyword list is replaced by `keywords`.
    pub fn with_forbidden_keywords<I, S>(self, keywords: I) -> Result<Self, GuardError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(self.max_query_length, keywords)
    }

    /// Return a copy with `keywords` appended to the current list.
    pub fn with_additional_keywords<I, S>(self, keywords: I) -> Result<Self, GuardError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = self
            .forbidden_keywords
            .iter()
            .map(|rule| rule.name.clone())
            .collect();
        names.extend(keywords.into_iter().map(|k| k.as_ref().to_string()));
        Self::new(self.max_query_length, names)
    }

    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `QUERY_GUARD_MAX_QUERY_LENGTH`: Maximum query length in characters
    ///   (default: 10000; unparseable values fall back to the default)
    /// - `QUERY_GUARD_FORBIDDEN_KEYWORDS`: Comma-separated list replacing the
    ///   default forbidden keywords
    /// - `QUERY_GUARD_EXTRA_FORBIDDEN_KEYWORDS`: Comma-separated list appended
    ///   to the forbidden keywords
    pub fn from_env() -> Result<Self, GuardError> {
        let max_query_length = std::env::var(ENV_MAX_QUERY_LENGTH)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_MAX_QUERY_LENGTH);

        let mut keywords: Vec<String> = match std::env::var(ENV_FORBIDDEN_KEYWORDS) {
            Ok(list) => {
                let parsed = split_list(&list);
                if parsed.is_empty() {
                    return Err(GuardError::config(format!(
                        "{} must list at least one keyword",
                        ENV_FORBIDDEN_KEYWORDS
                    )));
                }
                parsed
            }
            Err(_) => DEFAULT_FORBIDDEN_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        };

        if let Ok(extra) = std::env::var(ENV_EXTRA_FORBIDDEN_KEYWORDS) {
            keywords.extend(split_list(&extra));
        }

        Self::new(max_query_length, keywords)
    }

    /// Maximum accepted query length, in characters.
    pub fn max_query_length(&self) -> usize {
        self.max_query_length
    }

    /// Forbidden keywords in reporting order.
    pub fn forbidden_keywords(&self) -> Vec<&str> {
        self.forbidden_keywords
            .iter()
            .map(|rule| rule.name.as_str())
            .collect()
    }

    /// Find the first configured keyword present as a whole word in `text`.
    pub fn find_forbidden_keyword(&self, text: &str) -> Option<&str> {
        self.forbidden_keywords
            .iter()
            .find(|rule| rule.pattern.is_match(text))
            .map(|rule| rule.name.as_str())
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUERY_LENGTH, DEFAULT_FORBIDDEN_KEYWORDS.iter())
            .unwrap_or_else(|e| panic!("Internal error: invalid default configuration: {}", e))
    }
}

impl TryFrom<ValidationSettings> for ValidationConfig {
    type Error = GuardError;

    fn try_from(settings: ValidationSettings) -> Result<Self, Self::Error> {
        Self::new(settings.max_query_length, settings.forbidden_keywords)
    }
}

impl From<ValidationConfig> for ValidationSettings {
    fn from(config: ValidationConfig) -> Self {
        Self {
            max_query_length: config.max_query_length,
            forbidden_keywords: config
                .forbidden_keywords
                .into_iter()
                .map(|rule| rule.name)
                .collect(),
        }
    }
}

/// Normalize and check a single keyword.
fn parse_keyword(raw: &str) -> Result<String, GuardError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(GuardError::config("Forbidden keyword cannot be empty"));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(GuardError::config(format!(
            "Forbidden keyword '{}' must contain only letters, digits and underscores",
            trimmed
        )));
    }
    Ok(trimmed.to_ascii_uppercase())
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
