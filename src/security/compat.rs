//! Older entry point names, kept as thin forwarders.

use crate::error::GuardError;

#[deprecated(note = "use `security::normalize` instead")]
pub fn normalize_query(query: &str) -> String {
    super::normalize(query)
}

#[deprecated(note = "use `security::has_suspicious_patterns` instead")]
pub fn suspicious_query(query: &str) -> bool {
    super::has_suspicious_patterns(query)
}

#[deprecated(note = "use `security::has_injection_patterns` instead")]
pub fn injection_attempt(query: &str) -> bool {
    super::has_injection_patterns(query)
}

#[deprecated(note = "use `security::is_safe` instead")]
pub fn safe_query(query: &str) -> bool {
    super::is_safe(query)
}

#[deprecated(note = "use `security::validate_or_fail` instead")]
pub fn validate_query(query: &str) -> Result<String, GuardError> {
    super::validate_or_fail(query)
}

#[cfg(test)]
#[allow(deprecated)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarders_match_canonical() {
        let query = "select  *  from users -- note";
        assert_eq!(normalize_query(query), super::super::normalize(query));
        assert!(suspicious_query(query));
        assert!(!injection_attempt(query));
        assert!(injection_attempt("SELECT benchmark(1000000, md5('x'))"));
    }

    #[test]
    fn test_forwarders_use_global_validator() {
        assert!(safe_query("SELECT 1"));
        assert!(!safe_query("DROP TABLE users"));
        assert_eq!(validate_query("select 1").unwrap(), "SELECT 1");
        assert!(validate_query("").unwrap_err().is_rejection());
    }
}
