//! Shared SQLite helpers for repository constructors and row parsing.

use super::error::{RepoError, RepoResult};
use crate::db::migrations::latest_version;
use rusqlite::Connection;
use uuid::Uuid;

/// Table shape a repository depends on.
pub(crate) struct RequiredTable {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

/// Rejects connections that were not opened through `db::open_*`.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[RequiredTable],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in tables {
        if !table_exists(conn, table.name)? {
            return Err(RepoError::MissingRequiredTable(table.name));
        }
        for &column in table.columns {
            if !table_has_column(conn, table.name, column)? {
                return Err(RepoError::MissingRequiredColumn {
                    table: table.name,
                    column,
                });
            }
        }
    }

    Ok(())
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
