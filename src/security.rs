//! Read-only query gate: threat detection, normalization and validation.

pub mod compat;
mod normalize;
mod threats;
mod validation;

pub use normalize::{normalize, split_statements};
pub use threats::{
    detect, has_injection_patterns, has_suspicious_patterns, patterns, ThreatCategory,
    ThreatMatch, ThreatPattern,
};
pub use validation::{
    configure_global, global_validator, is_safe, validate_or_fail, QueryValidator, Rejection,
    ValidationMode, ValidationResult,
};
