//! Core configuration and process bootstrap.
//!
//! # Responsibility
//! - Describe host-provided settings for storage, logging and listings.
//! - Turn a configuration into a ready-to-use, migrated connection and the
//!   services whose defaults it carries.
//!
//! # Invariants
//! - Every field has a default, so an empty document is a valid config.
//! - Logging starts before the database opens so open events are captured.

use crate::db::{open_db, open_db_in_memory, DbError};
use crate::logging::{default_log_level, init_logging};
use crate::repo::session_repo::SessionRepository;
use crate::service::session_table::{
    SessionTable, DEFAULT_SESSION_PAGE_LIMIT, MAX_SESSION_PAGE_LIMIT,
};
use rusqlite::Connection;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Settings supplied by the embedding host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Database file; `None` opens a fresh in-memory database.
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    /// Absolute log directory; `None` leaves logging off.
    pub log_dir: Option<PathBuf>,
    /// Default session table page size.
    pub sessions_per_page: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
            sessions_per_page: DEFAULT_SESSION_PAGE_LIMIT,
        }
    }
}

/// Failures while bootstrapping from a `CoreConfig`.
#[derive(Debug)]
pub enum BootstrapError {
    Logging(String),
    InvalidPageSize(u32),
    Db(DbError),
}

impl Display for BootstrapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Logging(message) => write!(f, "logging bootstrap failed: {message}"),
            Self::InvalidPageSize(size) => write!(
                f,
                "sessions_per_page must be within 1..={MAX_SESSION_PAGE_LIMIT}, got {size}"
            ),
            Self::Db(err) => write!(f, "database bootstrap failed: {err}"),
        }
    }
}

impl Error for BootstrapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for BootstrapError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl CoreConfig {
    /// Checks values that deserialization alone cannot reject.
    pub fn validate(&self) -> Result<(), BootstrapError> {
        if !(1..=MAX_SESSION_PAGE_LIMIT).contains(&self.sessions_per_page) {
            return Err(BootstrapError::InvalidPageSize(self.sessions_per_page));
        }
        Ok(())
    }

    /// Starts logging when configured, then opens and migrates the database.
    pub fn bootstrap(&self) -> Result<Connection, BootstrapError> {
        self.validate()?;
        if let Some(log_dir) = &self.log_dir {
            init_logging(&self.log_level, log_dir).map_err(BootstrapError::Logging)?;
        }

        let conn = match &self.db_path {
            Some(path) => open_db(path)?,
            None => open_db_in_memory()?,
        };
        Ok(conn)
    }

    /// Session table paging by `sessions_per_page` when a query sets no limit.
    pub fn session_table<S: SessionRepository>(&self, sessions: S) -> SessionTable<S> {
        SessionTable::new(sessions).with_default_limit(self.sessions_per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::{BootstrapError, CoreConfig};
    use crate::access::capability::Capability;
    use crate::access::context::RequestContext;
    use crate::db::migrations::latest_version;
    use crate::repo::observation_repo::{ObservationRepository, SqliteObservationRepository};
    use crate::repo::session_repo::{SessionRepository, SqliteSessionRepository};
    use crate::service::session_table::SessionTableQuery;
    use std::path::PathBuf;

    #[test]
    fn empty_document_yields_defaults() {
        let config: CoreConfig = serde_json::from_str("{}").expect("empty config parses");
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.sessions_per_page, 50);
        assert!(config.db_path.is_none());
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let config: CoreConfig = serde_json::from_str(
            r#"{"db_path": "/var/lib/observation/core.db", "log_level": "warn", "sessions_per_page": 20}"#,
        )
        .expect("config parses");
        assert_eq!(
            config.db_path,
            Some(PathBuf::from("/var/lib/observation/core.db"))
        );
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.sessions_per_page, 20);
    }

    #[test]
    fn out_of_range_page_size_is_rejected() {
        let config = CoreConfig {
            sessions_per_page: 0,
            ..CoreConfig::default()
        };
        assert!(matches!(
            config.bootstrap(),
            Err(BootstrapError::InvalidPageSize(0))
        ));
    }

    #[test]
    fn default_bootstrap_opens_migrated_in_memory_db() {
        let conn = CoreConfig::default().bootstrap().expect("bootstrap");
        let version: u32 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .expect("user_version");
        assert_eq!(version, latest_version());
    }

    #[test]
    fn configured_page_size_drives_session_table_default() {
        let config: CoreConfig =
            serde_json::from_str(r#"{"sessions_per_page": 2}"#).expect("config parses");
        let conn = config.bootstrap().expect("bootstrap");
        let observation = SqliteObservationRepository::try_new(&conn)
            .expect("observation repo")
            .create_observation("Paged")
            .expect("observation");
        let sessions = SqliteSessionRepository::try_new(&conn).expect("session repo");
        for observee in 1..=3 {
            sessions
                .create_session(observation.uuid, 9, observee, 1_000 * observee)
                .expect("session");
        }

        let table = config.session_table(sessions);
        let viewer = RequestContext::new(9, [Capability::ViewSessions]);
        let page = table
            .list_sessions(&viewer, &SessionTableQuery::new(observation.uuid))
            .expect("page");
        assert_eq!(page.applied_limit, 2);
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.total, 3);
    }
}
