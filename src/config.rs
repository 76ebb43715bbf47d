use std::path::PathBuf;
use std::time::Duration;

/// Default deadline for one atomic scope.
pub const DEFAULT_SCOPE_TIMEOUT: Duration = Duration::from_secs(3);

/// Default size of the SQLite connection pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// How long a writer waits on SQLite's write lock before giving up.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Runtime settings for the engine and its storage adapter.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Deadline for each credit, debit or bulk credit, from scope open to commit
    pub scope_timeout: Duration,
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl EngineConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            scope_timeout: DEFAULT_SCOPE_TIMEOUT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn with_scope_timeout(mut self, timeout: Duration) -> Self {
        self.scope_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new("ledger.db");
        assert_eq!(config.database_path, PathBuf::from("ledger.db"));
        assert_eq!(config.scope_timeout, Duration::from_secs(3));
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::new("ledger.db")
            .with_scope_timeout(Duration::from_millis(250))
            .with_max_connections(0)
            .with_busy_timeout(Duration::from_secs(1));
        assert_eq!(config.scope_timeout, Duration::from_millis(250));
        assert_eq!(config.max_connections, 1); // clamped
        assert_eq!(config.busy_timeout, Duration::from_secs(1));
    }
}
