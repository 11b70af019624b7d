//! Repository error type shared by all SQLite repositories.

use crate::db::DbError;
use crate::model::point::PointValidationError;
use crate::model::session::ResponseValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Kind of row a `NotFound` error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoEntity {
    Observation,
    Point,
    Session,
    Response,
}

impl Display for RepoEntity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Observation => "observation",
            Self::Point => "observation point",
            Self::Session => "observation session",
            Self::Response => "point response",
        })
    }
}

/// Errors from repository persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target row does not exist under the requested scope.
    NotFound { entity: RepoEntity, id: Uuid },
    /// Point payload failed validation; nothing was written.
    InvalidPoint(PointValidationError),
    /// Response failed validation; nothing was written.
    InvalidResponse(ResponseValidationError),
    /// Session was cancelled and no longer accepts responses.
    SessionClosed(Uuid),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl RepoError {
    pub(crate) fn not_found(entity: RepoEntity, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    /// Returns `true` for missing-row errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidPoint(err) => write!(f, "{err}"),
            Self::InvalidResponse(err) => write!(f, "{err}"),
            Self::SessionClosed(id) => write!(f, "observation session is closed: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidPoint(err) => Some(err),
            Self::InvalidResponse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<PointValidationError> for RepoError {
    fn from(value: PointValidationError) -> Self {
        Self::InvalidPoint(value)
    }
}

impl From<ResponseValidationError> for RepoError {
    fn from(value: ResponseValidationError) -> Self {
        Self::InvalidResponse(value)
    }
}
