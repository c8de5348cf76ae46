//! # SQL Query Guard
//!
//! A read-only safety gate for free-text SQL.
//!
//! Given arbitrary user-supplied text, the guard decides whether it is a
//! single read-only query and, if so, returns the canonical text that may be
//! executed. Everything else is rejected with a short, operator-facing reason.
//!
//! ## Pipeline
//!
//! - Basic checks: blank input, length limit
//! - Threat detection on the raw text (suspicious shapes, injection idioms)
//! - Normalization (whitespace, comments, keyword casing)
//! - Structural checks: SELECT/WITH start, forbidden keywords, one statement
//!
//! ```no_run
//! use sql_query_guard::security;
//!
//! let sql = security::validate_or_fail("select  *  from users")?;
//! assert_eq!(sql, "SELECT * FROM users");
//! # Ok::<(), sql_query_guard::GuardError>(())
//! ```

pub mod activity;
pub mod config;
pub mod constants;
pub mod error;
pub mod security;

pub use activity::{
    MemoryActivityLog, QueryActivityLog, SecurityEvent, SecurityEventType, TracingActivityLog,
};
pub use config::{ValidationConfig, ValidationSettings};
pub use error::GuardError;
pub use security::{QueryValidator, ValidationMode, ValidationResult};
