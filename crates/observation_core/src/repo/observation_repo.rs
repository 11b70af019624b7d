//! Observation activity repository contracts and SQLite implementation.

use super::error::{RepoEntity, RepoError, RepoResult};
use super::support::{ensure_connection_ready, parse_uuid, RequiredTable};
use crate::model::observation::{Observation, ObservationId};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const OBSERVATION_TABLE: RequiredTable = RequiredTable {
    name: "observations",
    columns: &["uuid", "name", "created_at", "updated_at"],
};

/// Repository interface for observation activities.
pub trait ObservationRepository {
    /// Creates one observation and returns its read model.
    fn create_observation(&self, name: &str) -> RepoResult<Observation>;
    /// Loads one observation by id.
    fn get_observation(&self, uuid: ObservationId) -> RepoResult<Option<Observation>>;
    /// Deletes one observation with its points, sessions and responses.
    fn delete_observation(&self, uuid: ObservationId) -> RepoResult<()>;
}

/// SQLite-backed observation repository.
pub struct SqliteObservationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteObservationRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[OBSERVATION_TABLE])?;
        Ok(Self { conn })
    }
}

impl ObservationRepository for SqliteObservationRepository<'_> {
    fn create_observation(&self, name: &str) -> RepoResult<Observation> {
        let uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO observations (uuid, name) VALUES (?1, ?2);",
            params![uuid.to_string(), name],
        )?;
        self.get_observation(uuid)?
            .ok_or_else(|| RepoError::not_found(RepoEntity::Observation, uuid))
    }

    fn get_observation(&self, uuid: ObservationId) -> RepoResult<Option<Observation>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, name, created_at, updated_at
             FROM observations
             WHERE uuid = ?1;",
        )?;
        let mut rows = stmt.query([uuid.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_observation_row(row)?));
        }
        Ok(None)
    }

    fn delete_observation(&self, uuid: ObservationId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM observations WHERE uuid = ?1;",
            [uuid.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(RepoEntity::Observation, uuid));
        }
        Ok(())
    }
}

fn parse_observation_row(row: &Row<'_>) -> RepoResult<Observation> {
    let uuid_text: String = row.get("uuid")?;
    Ok(Observation {
        uuid: parse_uuid(&uuid_text, "observations.uuid")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
