//! Centralized constants for the query guard.
//!
//! Default limits and keyword lists live here so the configuration layer and
//! the tests agree on a single source of truth.

// =============================================================================
// Validation Limits
// =============================================================================

/// Default maximum query length, in characters.
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 10_000;

/// Keywords rejected anywhere in a query unless overridden by the host.
///
/// Order matters: when several are present, the first one in this list is
/// reported.
pub const DEFAULT_FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "TRUNCATE", "GRANT", "REVOKE", "CREATE",
    "REPLACE", "EXEC", "EXECUTE", "CALL", "MERGE",
];

/// Statement prefixes accepted as read-only queries.
pub const ALLOWED_QUERY_PREFIXES: &[&str] = &["SELECT", "WITH"];

// =============================================================================
// Meta-commands
// =============================================================================

/// Statements and functions that never qualify as a meta-command, even when
/// they have the shape of one. They control the server, transactions or
/// session state, or change data through a function call.
pub const META_COMMAND_DENIED_NAMES: &[&str] = &[
    // Server control
    "SHUTDOWN", "RECONFIGURE", "CHECKPOINT", "KILL", "DBCC", "BACKUP", "RESTORE", "FLUSH",
    "PURGE",
    // Transactions and session state
    "BEGIN", "START", "COMMIT", "ROLLBACK", "SAVEPOINT", "RELEASE", "SET", "RESET", "USE",
    "DISCARD", "LOCK", "UNLOCK", "PREPARE", "DEALLOCATE", "LISTEN", "NOTIFY", "UNLISTEN",
    // Maintenance and bulk transfer
    "VACUUM", "ANALYZE", "REINDEX", "CLUSTER", "OPTIMIZE", "REPAIR", "LOAD", "COPY",
    // Side-effecting functions
    "PG_TERMINATE_BACKEND", "PG_CANCEL_BACKEND", "PG_RELOAD_CONF", "PG_ROTATE_LOGFILE",
    "PG_SWITCH_WAL", "PG_PROMOTE", "PG_ADVISORY_LOCK", "PG_ADVISORY_XACT_LOCK", "SETVAL",
    "NEXTVAL", "SET_CONFIG", "LO_CREATE", "LO_UNLINK", "DBLINK_EXEC",
];

// =============================================================================
// Logging Constants
// =============================================================================

/// Default truncation length for query logging.
pub const LOG_QUERY_TRUNCATE_LENGTH: usize = 100;

/// Truncation length for the query preview stored in security events.
pub const SECURITY_EVENT_PREVIEW_LENGTH: usize = 100;

/// Default number of events retained by the in-memory activity log.
pub const DEFAULT_ACTIVITY_LOG_CAPACITY: usize = 1_000;

// =============================================================================
// Environment Variables
// =============================================================================

/// Overrides the maximum query length.
pub const ENV_MAX_QUERY_LENGTH: &str = "QUERY_GUARD_MAX_QUERY_LENGTH";

/// Replaces the forbidden keyword list (comma separated).
pub const ENV_FORBIDDEN_KEYWORDS: &str = "QUERY_GUARD_FORBIDDEN_KEYWORDS";

/// Appends to the forbidden keyword list (comma separated).
pub const ENV_EXTRA_FORBIDDEN_KEYWORDS: &str = "QUERY_GUARD_EXTRA_FORBIDDEN_KEYWORDS";
