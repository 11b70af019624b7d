//! Observation point repository: the point ordering manager.
//!
//! # Responsibility
//! - Persist observation points and own their `list_order` column.
//! - Keep every ordering mutation inside one immediate transaction.
//!
//! # Invariants
//! - For each observation, `list_order` values are exactly `1..=N`.
//! - Create appends at `N + 1`; reorder swaps with one neighbor; delete
//!   decrements every later sibling by one.
//! - `update_point` never writes `list_order`.
//! - Listing is deterministic: `list_order ASC`.

use super::error::{RepoEntity, RepoError, RepoResult};
use super::support::{ensure_connection_ready, parse_uuid, RequiredTable};
use crate::model::observation::ObservationId;
use crate::model::point::{
    InstructionsFormat, ObservationPoint, PointDraft, PointId, ResponseType,
};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const POINT_SELECT_SQL: &str = "SELECT
    uuid,
    observation_uuid,
    title,
    instructions,
    instructions_format,
    max_grade,
    response_type,
    list_order
FROM observation_points";

const POINT_TABLE: RequiredTable = RequiredTable {
    name: "observation_points",
    columns: &[
        "uuid",
        "observation_uuid",
        "title",
        "instructions",
        "instructions_format",
        "max_grade",
        "response_type",
        "list_order",
    ],
};

/// Unused order value that parks a point while its neighbor moves.
const PARKED_ORDER: i64 = 0;

/// One-step move of a point within its observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderDirection {
    /// Raise `list_order` by one (+1).
    Up,
    /// Lower `list_order` by one (-1).
    Down,
}

impl ReorderDirection {
    /// Signed change applied to the moving point's `list_order`.
    pub fn delta(self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }

    /// Maps a raw `+1`/`-1` delta; any other value is rejected.
    pub fn from_delta(delta: i64) -> Option<Self> {
        match delta {
            1 => Some(Self::Up),
            -1 => Some(Self::Down),
            _ => None,
        }
    }
}

/// Result of a reorder request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderOutcome {
    /// The point exchanged orders with its neighbor.
    Swapped { from: i64, to: i64 },
    /// The point already sits at the first/last position; nothing changed.
    AtBoundary,
}

/// Repository interface for ordered observation points.
pub trait PointRepository {
    /// Appends one point after the observation's current last point.
    fn create_point(
        &self,
        observation_uuid: ObservationId,
        draft: &PointDraft,
    ) -> RepoResult<PointId>;
    /// Loads one point; `NotFound` when absent under this observation.
    fn read_point(
        &self,
        observation_uuid: ObservationId,
        point_uuid: PointId,
    ) -> RepoResult<ObservationPoint>;
    /// Replaces payload fields; `list_order` in `point` is ignored.
    fn update_point(&self, point: &ObservationPoint) -> RepoResult<()>;
    /// Swaps the point with its neighbor in `direction`.
    fn reorder_point(
        &self,
        observation_uuid: ObservationId,
        point_uuid: PointId,
        direction: ReorderDirection,
    ) -> RepoResult<ReorderOutcome>;
    /// Deletes one point and closes the order gap it leaves.
    fn delete_point(&self, observation_uuid: ObservationId, point_uuid: PointId)
        -> RepoResult<()>;
    /// Lists all points of an observation ascending by `list_order`.
    fn list_points(&self, observation_uuid: ObservationId) -> RepoResult<Vec<ObservationPoint>>;
    /// Counts points of an observation.
    fn count_points(&self, observation_uuid: ObservationId) -> RepoResult<i64>;
}

/// SQLite-backed observation point repository.
pub struct SqlitePointRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePointRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[POINT_TABLE])?;
        Ok(Self { conn })
    }
}

impl PointRepository for SqlitePointRepository<'_> {
    fn create_point(
        &self,
        observation_uuid: ObservationId,
        draft: &PointDraft,
    ) -> RepoResult<PointId> {
        draft.validate()?;

        let point_uuid = Uuid::new_v4();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let list_order = count_points_in(&tx, observation_uuid)? + 1;
        tx.execute(
            "INSERT INTO observation_points (
                uuid,
                observation_uuid,
                title,
                instructions,
                instructions_format,
                max_grade,
                response_type,
                list_order
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                point_uuid.to_string(),
                observation_uuid.to_string(),
                draft.title.as_str(),
                draft.instructions.as_str(),
                draft.instructions_format.code(),
                draft.max_grade,
                draft.response_type.code(),
                list_order,
            ],
        )?;
        tx.commit()?;

        debug!(
            "event=point_create module=point_repo status=ok observation={observation_uuid} point={point_uuid} list_order={list_order}"
        );
        Ok(point_uuid)
    }

    fn read_point(
        &self,
        observation_uuid: ObservationId,
        point_uuid: PointId,
    ) -> RepoResult<ObservationPoint> {
        let mut stmt = self.conn.prepare(&format!(
            "{POINT_SELECT_SQL}
             WHERE uuid = ?1
               AND observation_uuid = ?2;"
        ))?;
        let mut rows = stmt.query(params![
            point_uuid.to_string(),
            observation_uuid.to_string()
        ])?;
        if let Some(row) = rows.next()? {
            return parse_point_row(row);
        }
        Err(RepoError::not_found(RepoEntity::Point, point_uuid))
    }

    fn update_point(&self, point: &ObservationPoint) -> RepoResult<()> {
        point.payload.validate()?;

        let changed = self.conn.execute(
            "UPDATE observation_points
             SET title = ?3,
                 instructions = ?4,
                 instructions_format = ?5,
                 max_grade = ?6,
                 response_type = ?7,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND observation_uuid = ?2;",
            params![
                point.uuid.to_string(),
                point.observation_uuid.to_string(),
                point.payload.title.as_str(),
                point.payload.instructions.as_str(),
                point.payload.instructions_format.code(),
                point.payload.max_grade,
                point.payload.response_type.code(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(RepoEntity::Point, point.uuid));
        }
        Ok(())
    }

    fn reorder_point(
        &self,
        observation_uuid: ObservationId,
        point_uuid: PointId,
        direction: ReorderDirection,
    ) -> RepoResult<ReorderOutcome> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let current = load_list_order(&tx, observation_uuid, point_uuid)?
            .ok_or_else(|| RepoError::not_found(RepoEntity::Point, point_uuid))?;
        let target = current + direction.delta();
        let count = count_points_in(&tx, observation_uuid)?;
        if target < 1 || target > count {
            debug!(
                "event=point_reorder module=point_repo status=noop observation={observation_uuid} point={point_uuid} list_order={current} delta={}",
                direction.delta()
            );
            return Ok(ReorderOutcome::AtBoundary);
        }

        let neighbor_uuid = point_at_order(&tx, observation_uuid, target)?.ok_or_else(|| {
            RepoError::InvalidData(format!(
                "observation {observation_uuid} has no point at list_order {target}"
            ))
        })?;

        // The unique (observation_uuid, list_order) index is checked per row.
        set_list_order(&tx, point_uuid, PARKED_ORDER)?;
        set_list_order(&tx, neighbor_uuid, current)?;
        set_list_order(&tx, point_uuid, target)?;
        tx.commit()?;

        debug!(
            "event=point_reorder module=point_repo status=ok observation={observation_uuid} point={point_uuid} from={current} to={target} neighbor={neighbor_uuid}"
        );
        Ok(ReorderOutcome::Swapped {
            from: current,
            to: target,
        })
    }

    fn delete_point(
        &self,
        observation_uuid: ObservationId,
        point_uuid: PointId,
    ) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let removed_order = load_list_order(&tx, observation_uuid, point_uuid)?
            .ok_or_else(|| RepoError::not_found(RepoEntity::Point, point_uuid))?;

        tx.execute(
            "DELETE FROM observation_points
             WHERE uuid = ?1
               AND observation_uuid = ?2;",
            params![point_uuid.to_string(), observation_uuid.to_string()],
        )?;

        // Ascending order: each row moves into the slot its predecessor vacated.
        let followers = list_points_after(&tx, observation_uuid, removed_order)?;
        let shifted = followers.len();
        for (follower_uuid, list_order) in followers {
            set_list_order(&tx, follower_uuid, list_order - 1)?;
        }
        tx.commit()?;

        debug!(
            "event=point_delete module=point_repo status=ok observation={observation_uuid} point={point_uuid} list_order={removed_order} shifted={shifted}"
        );
        Ok(())
    }

    fn list_points(&self, observation_uuid: ObservationId) -> RepoResult<Vec<ObservationPoint>> {
        let mut stmt = self.conn.prepare(&format!(
            "{POINT_SELECT_SQL}
             WHERE observation_uuid = ?1
             ORDER BY list_order ASC;"
        ))?;
        let mut rows = stmt.query([observation_uuid.to_string()])?;

        let mut points = Vec::new();
        while let Some(row) = rows.next()? {
            points.push(parse_point_row(row)?);
        }
        Ok(points)
    }

    fn count_points(&self, observation_uuid: ObservationId) -> RepoResult<i64> {
        count_points_in(self.conn, observation_uuid)
    }
}

fn count_points_in(conn: &Connection, observation_uuid: ObservationId) -> RepoResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*)
         FROM observation_points
         WHERE observation_uuid = ?1;",
        [observation_uuid.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn load_list_order(
    conn: &Connection,
    observation_uuid: ObservationId,
    point_uuid: PointId,
) -> RepoResult<Option<i64>> {
    let list_order = conn
        .query_row(
            "SELECT list_order
             FROM observation_points
             WHERE uuid = ?1
               AND observation_uuid = ?2;",
            params![point_uuid.to_string(), observation_uuid.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(list_order)
}

fn point_at_order(
    conn: &Connection,
    observation_uuid: ObservationId,
    list_order: i64,
) -> RepoResult<Option<PointId>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT uuid
             FROM observation_points
             WHERE observation_uuid = ?1
               AND list_order = ?2;",
            params![observation_uuid.to_string(), list_order],
            |row| row.get(0),
        )
        .optional()?;
    value
        .map(|value| parse_uuid(&value, "observation_points.uuid"))
        .transpose()
}

fn list_points_after(
    conn: &Connection,
    observation_uuid: ObservationId,
    list_order: i64,
) -> RepoResult<Vec<(PointId, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, list_order
         FROM observation_points
         WHERE observation_uuid = ?1
           AND list_order > ?2
         ORDER BY list_order ASC;",
    )?;
    let mut rows = stmt.query(params![observation_uuid.to_string(), list_order])?;

    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let uuid_text: String = row.get(0)?;
        items.push((
            parse_uuid(&uuid_text, "observation_points.uuid")?,
            row.get(1)?,
        ));
    }
    Ok(items)
}

fn set_list_order(conn: &Connection, point_uuid: PointId, list_order: i64) -> RepoResult<()> {
    conn.execute(
        "UPDATE observation_points
         SET list_order = ?2,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE uuid = ?1;",
        params![point_uuid.to_string(), list_order],
    )?;
    Ok(())
}

fn parse_point_row(row: &Row<'_>) -> RepoResult<ObservationPoint> {
    let uuid_text: String = row.get("uuid")?;
    let observation_text: String = row.get("observation_uuid")?;

    let format_code: i64 = row.get("instructions_format")?;
    let instructions_format = InstructionsFormat::from_code(format_code).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid instructions format `{format_code}` in observation_points.instructions_format"
        ))
    })?;

    let response_code: i64 = row.get("response_type")?;
    let response_type = ResponseType::from_code(response_code).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid response type `{response_code}` in observation_points.response_type"
        ))
    })?;

    let list_order: i64 = row.get("list_order")?;
    if list_order < 1 {
        return Err(RepoError::InvalidData(format!(
            "invalid list order `{list_order}` in observation_points.list_order"
        )));
    }

    Ok(ObservationPoint {
        uuid: parse_uuid(&uuid_text, "observation_points.uuid")?,
        observation_uuid: parse_uuid(&observation_text, "observation_points.observation_uuid")?,
        list_order,
        payload: PointDraft {
            title: row.get("title")?,
            instructions: row.get("instructions")?,
            instructions_format,
            max_grade: row.get("max_grade")?,
            response_type,
        },
    })
}
