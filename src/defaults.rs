//! Default values for configuration and the import pipeline

pub const DEFAULT_HTTP_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads/imports";
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Rows per bulk insert
pub const DEFAULT_IMPORT_BATCH_SIZE: usize = 1000;
/// Minimum time between two progress checkpoints
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 1000;
/// Parsed lines buffered between the parser thread and the orchestrator
pub const DEFAULT_PARSER_CHANNEL_CAPACITY: usize = 4096;

pub const DEFAULT_LOGS_DIR: &str = "../logs";
pub const DEFAULT_LOG_FILTER: &str = "info,contact_import_worker=debug";
