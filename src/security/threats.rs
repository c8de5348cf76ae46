//! Threat pattern detection.
//!
//! Flags injection-style or otherwise suspicious shapes in raw query text.
//! Detection runs on the un-normalized input so that comment stripping or
//! case folding cannot hide a dangerous token from it.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category a threat pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    /// Syntactic anomalies: stacked statements, comments, encoding, probing.
    Suspicious,
    /// Known attack idioms: delays, out-of-band calls, destructive batches.
    Injection,
}

impl ThreatCategory {
    /// Lowercase name used in logs and security events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suspicious => "suspicious",
            Self::Injection => "injection",
        }
    }
}

impl fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, precompiled detection rule.
#[derive(Debug)]
pub struct ThreatPattern {
    /// Stable rule name, reported in diagnostics
    pub name: &'static str,
    /// Category this rule belongs to
    pub category: ThreatCategory,
    regex: Regex,
    /// Extra condition a regex hit must satisfy to count
    confirm: Option<fn(&Captures<'_>) -> bool>,
}

impl ThreatPattern {
    /// Check whether this rule matches anywhere in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        match self.confirm {
            None => self.regex.is_match(text),
            Some(confirm) => self.regex.captures_iter(text).any(|caps| confirm(&caps)),
        }
    }
}

/// The first rule that matched a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreatMatch {
    pub category: ThreatCategory,
    pub pattern: &'static str,
}

/// Helper to compile a hardcoded pattern.
///
/// A failure here is a programming error, not a query rejection, so it panics.
fn compile(name: &'static str, category: ThreatCategory, pattern: &str) -> ThreatPattern {
    let regex = Regex::new(pattern).unwrap_or_else(|e| {
        panic!("Internal error: invalid regex pattern '{}': {}", pattern, e)
    });
    ThreatPattern {
        name,
        category,
        regex,
        confirm: None,
    }
}

/// Like [`compile`], with a condition checked on each regex hit.
fn compile_confirmed(
    name: &'static str,
    category: ThreatCategory,
    pattern: &str,
    confirm: fn(&Captures<'_>) -> bool,
) -> ThreatPattern {
    ThreatPattern {
        confirm: Some(confirm),
        ..compile(name, category, pattern)
    }
}

/// Both captured integers are the same value, ignoring leading zeros.
fn same_number(caps: &Captures<'_>) -> bool {
    let digits = |i| caps.get(i).map(|m| m.as_str().trim_start_matches('0'));
    digits(1) == digits(2)
}

static SUSPICIOUS_PATTERNS: Lazy<Vec<ThreatPattern>> = Lazy::new(|| {
    let c = ThreatCategory::Suspicious;
    vec![
        // Stacked session and control statements. Stacked data statements are
        // left to the keyword and statement-count checks.
        compile(
            "stacked statement",
            c,
            r"(?i);\s*(DECLARE|SET|USE|BEGIN|COMMIT|ROLLBACK|SAVEPOINT|COPY|LOAD|ATTACH|DETACH|PRAGMA|LOCK|VACUUM|RESET)\b",
        ),
        // Comment markers
        compile("line comment", c, r"--"),
        compile("block comment", c, r"/\*|\*/"),
        // `#` ending the text, followed by whitespace, or running into a line
        // break. `#temp` table names on a single line pass.
        compile(
            "mysql hash comment",
            c,
            r#"(?:^|[^'"])#(?:\s|$|[^\n]*\n)"#,
        ),
        // Encoded or obfuscated characters
        compile("long hex literal", c, r"(?i)\b0x[0-9a-f]{8,}"),
        compile(
            "url-encoded sequence",
            c,
            r"(?i)%(00|0a|0d|22|23|27|2d|2f|3b)%[0-9a-f]{2}|%25[0-9a-f]{2}",
        ),
        compile("null byte", c, r"\x00|\\0|\\x00"),
        compile(
            "char() concatenation",
            c,
            r"(?i)\b(N?CHAR|CHR)\s*\(\s*\d+\s*\)(\s*(\+|\|\||,)\s*(N?CHAR|CHR)\s*\(\s*\d+\s*\)){2,}",
        ),
        // UNION-based probing
        compile(
            "union column probe",
            c,
            r"(?i)\bUNION\s+(ALL\s+)?SELECT\s+(NULL\s*(,|\bFROM\b|$)|\d+\s*,\s*(NULL|\d+)\b)",
        ),
        compile(
            "union fingerprinting",
            c,
            r"(?i)\bUNION\s+(ALL\s+)?SELECT\b.*(@@VERSION|\bVERSION\s*\(|\bUSER\s*\(|\bDATABASE\s*\(|\bCURRENT_USER\b)",
        ),
        // Boolean tautologies
        compile_confirmed(
            "numeric tautology",
            c,
            r"(?i)\bOR\s+(\d+)\s*=\s*(\d+)\b",
            same_number,
        ),
        compile("string tautology", c, r"(?i)'\s*OR\s+'[^']*'\s*=\s*'"),
        compile("literal true tautology", c, r"(?i)\bOR\s+TRUE\b"),
    ]
});

static INJECTION_PATTERNS: Lazy<Vec<ThreatPattern>> = Lazy::new(|| {
    let c = ThreatCategory::Injection;
    vec![
        // Time-delay functions
        compile("sleep call", c, r"(?i)\b(PG_)?SLEEP\s*\("),
        compile("benchmark call", c, r"(?i)\bBENCHMARK\s*\("),
        compile("waitfor delay", c, r"(?i)\bWAITFOR\s+(DELAY|TIME)\b"),
        compile("dbms_lock sleep", c, r"(?i)\bDBMS_LOCK\s*\.\s*SLEEP\b"),
        // Out-of-band exfiltration and file access
        compile("file read", c, r"(?i)\b(LOAD_FILE|PG_READ_FILE|PG_READ_BINARY_FILE|PG_LS_DIR)\s*\("),
        compile("file write", c, r"(?i)\bINTO\s+(OUTFILE|DUMPFILE)\b"),
        compile("large object transfer", c, r"(?i)\bLO_(IMPORT|EXPORT)\s*\("),
        compile("remote connection", c, r"(?i)\b(DBLINK\w*|OPENROWSET|OPENDATASOURCE|OPENQUERY)\s*\("),
        compile("network package", c, r"(?i)\b(UTL_HTTP|UTL_INADDR|UTL_TCP|DBMS_LDAP|HTTPURITYPE)\b"),
        compile(
            "extended stored procedure",
            c,
            r"(?i)\b(XP_CMDSHELL|XP_DIRTREE|XP_FILEEXIST|XP_REG\w*|SP_OACREATE|SP_OAMETHOD)\b",
        ),
        compile("program pipe", c, r"(?i)\bTO\s+PROGRAM\b"),
        // Batched destructive statements
        compile(
            "batched destructive statement",
            c,
            r"(?i);\s*(SHUTDOWN|KILL|DBCC|RECONFIGURE)\b",
        ),
        compile("dynamic sql", c, r"(?i)\bEXEC(UTE)?\s*\(\s*['@]"),
        compile("server shutdown", c, r"(?i)\bSHUTDOWN\s+WITH\s+NOWAIT\b"),
    ]
});

fn category_patterns(category: ThreatCategory) -> &'static [ThreatPattern] {
    match category {
        ThreatCategory::Suspicious => SUSPICIOUS_PATTERNS.as_slice(),
        ThreatCategory::Injection => INJECTION_PATTERNS.as_slice(),
    }
}

/// Find the first matching rule of one category.
fn first_match(category: ThreatCategory, text: &str) -> Option<&'static ThreatPattern> {
    category_patterns(category)
        .iter()
        .find(|pattern| pattern.is_match(text))
}

/// Check raw query text for syntactic anomalies.
pub fn has_suspicious_patterns(text: &str) -> bool {
    first_match(ThreatCategory::Suspicious, text).is_some()
}

/// Check raw query text for known injection idioms.
pub fn has_injection_patterns(text: &str) -> bool {
    first_match(ThreatCategory::Injection, text).is_some()
}

/// Return the first rule matching `text`, suspicious rules first.
pub fn detect(text: &str) -> Option<ThreatMatch> {
    [ThreatCategory::Suspicious, ThreatCategory::Injection]
        .into_iter()
        .find_map(|category| first_match(category, text))
        .map(|pattern| ThreatMatch {
            category: pattern.category,
            pattern: pattern.name,
        })
}

/// All rules of one category, in evaluation order.
pub fn patterns(category: ThreatCategory) -> &'static [ThreatPattern] {
    category_patterns(category)
}
