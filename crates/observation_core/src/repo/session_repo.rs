//! Observation session and response repository contracts and SQLite
//! implementation.
//!
//! # Responsibility
//! - Persist sessions, their lifecycle transitions and point responses.
//! - Provide filtered, paginated session listing.
//!
//! # Invariants
//! - Sessions leave `inprogress` through one conditional update only.
//! - Response writes check the session state and validate the grade against
//!   the point's `max_grade` inside the same transaction that upserts the
//!   response.
//! - Session listing is deterministic: `start_time DESC, uuid ASC`.

use super::error::{RepoEntity, RepoError, RepoResult};
use super::support::{ensure_connection_ready, parse_uuid, RequiredTable};
use crate::model::observation::ObservationId;
use crate::model::point::PointId;
use crate::model::session::{
    ObservationSession, PointResponse, ResponseDraft, SessionId, SessionState, UserId,
};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use uuid::Uuid;

const SESSION_SELECT_SQL: &str = "SELECT
    uuid,
    observation_uuid,
    observer_id,
    observee_id,
    state,
    start_time,
    finish_time
FROM observation_sessions";

const RESPONSE_SELECT_SQL: &str = "SELECT
    uuid,
    session_uuid,
    point_uuid,
    grade_given,
    response,
    ex_comment,
    created_at,
    updated_at
FROM observation_point_responses";

const SESSION_TABLES: &[RequiredTable] = &[
    RequiredTable {
        name: "observation_sessions",
        columns: &[
            "uuid",
            "observation_uuid",
            "observer_id",
            "observee_id",
            "state",
            "start_time",
            "finish_time",
        ],
    },
    RequiredTable {
        name: "observation_point_responses",
        columns: &[
            "uuid",
            "session_uuid",
            "point_uuid",
            "grade_given",
            "response",
            "ex_comment",
        ],
    },
];

/// Filter and pagination options for listing sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionListQuery {
    pub observation_uuid: ObservationId,
    /// Only sessions observing this user.
    pub observee_id: Option<UserId>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl SessionListQuery {
    /// Unfiltered, unpaginated query for one observation.
    pub fn for_observation(observation_uuid: ObservationId) -> Self {
        Self {
            observation_uuid,
            observee_id: None,
            limit: None,
            offset: 0,
        }
    }
}

/// Repository interface for sessions and their responses.
pub trait SessionRepository {
    /// Creates one in-progress session.
    fn create_session(
        &self,
        observation_uuid: ObservationId,
        observer_id: UserId,
        observee_id: UserId,
        start_time: i64,
    ) -> RepoResult<ObservationSession>;
    /// Loads one session by id.
    fn get_session(&self, uuid: SessionId) -> RepoResult<Option<ObservationSession>>;
    /// Moves an in-progress session to `final_state`.
    ///
    /// Returns `false` when the session exists but is no longer in progress.
    fn finish_session(
        &self,
        uuid: SessionId,
        final_state: SessionState,
        finish_time: i64,
    ) -> RepoResult<bool>;
    /// Lists sessions matching `query`.
    fn list_sessions(&self, query: &SessionListQuery) -> RepoResult<Vec<ObservationSession>>;
    /// Counts sessions matching `query` filters, ignoring pagination.
    fn count_sessions(&self, query: &SessionListQuery) -> RepoResult<i64>;
    /// Inserts or replaces the response for `(session, point)`.
    ///
    /// Fails with `SessionClosed` once the session was cancelled.
    fn upsert_response(
        &self,
        session_uuid: SessionId,
        point_uuid: PointId,
        draft: &ResponseDraft,
    ) -> RepoResult<PointResponse>;
    /// Lists responses recorded in one session.
    fn list_responses(&self, session_uuid: SessionId) -> RepoResult<Vec<PointResponse>>;
}

/// SQLite-backed session repository.
pub struct SqliteSessionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSessionRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, SESSION_TABLES)?;
        Ok(Self { conn })
    }
}

impl SessionRepository for SqliteSessionRepository<'_> {
    fn create_session(
        &self,
        observation_uuid: ObservationId,
        observer_id: UserId,
        observee_id: UserId,
        start_time: i64,
    ) -> RepoResult<ObservationSession> {
        let uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO observation_sessions (
                uuid,
                observation_uuid,
                observer_id,
                observee_id,
                state,
                start_time,
                finish_time
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL);",
            params![
                uuid.to_string(),
                observation_uuid.to_string(),
                observer_id,
                observee_id,
                SessionState::InProgress.as_db(),
                start_time,
            ],
        )?;
        debug!(
            "event=session_create module=session_repo status=ok observation={observation_uuid} session={uuid}"
        );
        self.get_session(uuid)?
            .ok_or_else(|| RepoError::not_found(RepoEntity::Session, uuid))
    }

    fn get_session(&self, uuid: SessionId) -> RepoResult<Option<ObservationSession>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SESSION_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([uuid.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_session_row(row)?));
        }
        Ok(None)
    }

    fn finish_session(
        &self,
        uuid: SessionId,
        final_state: SessionState,
        finish_time: i64,
    ) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE observation_sessions
             SET state = ?2,
                 finish_time = ?3
             WHERE uuid = ?1
               AND state = ?4;",
            params![
                uuid.to_string(),
                final_state.as_db(),
                finish_time,
                SessionState::InProgress.as_db(),
            ],
        )?;
        if changed == 1 {
            return Ok(true);
        }
        if self.get_session(uuid)?.is_none() {
            return Err(RepoError::not_found(RepoEntity::Session, uuid));
        }
        Ok(false)
    }

    fn list_sessions(&self, query: &SessionListQuery) -> RepoResult<Vec<ObservationSession>> {
        let (mut sql, mut bind_values) = session_filter_sql(SESSION_SELECT_SQL, query);
        sql.push_str(" ORDER BY start_time DESC, uuid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next()? {
            sessions.push(parse_session_row(row)?);
        }
        Ok(sessions)
    }

    fn count_sessions(&self, query: &SessionListQuery) -> RepoResult<i64> {
        let (sql, bind_values) =
            session_filter_sql("SELECT COUNT(*) FROM observation_sessions", query);
        let count = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        Ok(count)
    }

    fn upsert_response(
        &self,
        session_uuid: SessionId,
        point_uuid: PointId,
        draft: &ResponseDraft,
    ) -> RepoResult<PointResponse> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let (max_grade, state_text): (i64, String) = tx
            .query_row(
                "SELECT p.max_grade, s.state
                 FROM observation_points p
                 INNER JOIN observation_sessions s ON s.observation_uuid = p.observation_uuid
                 WHERE p.uuid = ?1
                   AND s.uuid = ?2;",
                params![point_uuid.to_string(), session_uuid.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| RepoError::not_found(RepoEntity::Point, point_uuid))?;
        let accepts_responses = SessionState::from_db(&state_text)
            .map(SessionState::accepts_responses)
            .ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid session state `{state_text}` in observation_sessions.state"
                ))
            })?;
        if !accepts_responses {
            return Err(RepoError::SessionClosed(session_uuid));
        }
        draft.validate(max_grade)?;

        tx.execute(
            "INSERT INTO observation_point_responses (
                uuid,
                session_uuid,
                point_uuid,
                grade_given,
                response,
                ex_comment
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (session_uuid, point_uuid) DO UPDATE SET
                grade_given = excluded.grade_given,
                response = excluded.response,
                ex_comment = excluded.ex_comment,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                Uuid::new_v4().to_string(),
                session_uuid.to_string(),
                point_uuid.to_string(),
                draft.grade_given,
                draft.response.as_str(),
                draft.ex_comment.as_str(),
            ],
        )?;
        let response = load_response(&tx, session_uuid, point_uuid)?
            .ok_or_else(|| RepoError::not_found(RepoEntity::Response, point_uuid))?;
        tx.commit()?;

        debug!(
            "event=response_upsert module=session_repo status=ok session={session_uuid} point={point_uuid}"
        );
        Ok(response)
    }

    fn list_responses(&self, session_uuid: SessionId) -> RepoResult<Vec<PointResponse>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RESPONSE_SELECT_SQL}
             WHERE session_uuid = ?1
             ORDER BY created_at ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([session_uuid.to_string()])?;
        let mut responses = Vec::new();
        while let Some(row) = rows.next()? {
            responses.push(parse_response_row(row)?);
        }
        Ok(responses)
    }
}

fn session_filter_sql(select: &str, query: &SessionListQuery) -> (String, Vec<Value>) {
    let mut sql = format!("{select} WHERE observation_uuid = ?");
    let mut bind_values = vec![Value::Text(query.observation_uuid.to_string())];
    if let Some(observee_id) = query.observee_id {
        sql.push_str(" AND observee_id = ?");
        bind_values.push(Value::Integer(observee_id));
    }
    (sql, bind_values)
}

fn load_response(
    conn: &Connection,
    session_uuid: SessionId,
    point_uuid: PointId,
) -> RepoResult<Option<PointResponse>> {
    let mut stmt = conn.prepare(&format!(
        "{RESPONSE_SELECT_SQL}
         WHERE session_uuid = ?1
           AND point_uuid = ?2;"
    ))?;
    let mut rows = stmt.query(params![session_uuid.to_string(), point_uuid.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_response_row(row)?));
    }
    Ok(None)
}

fn parse_session_row(row: &Row<'_>) -> RepoResult<ObservationSession> {
    let uuid_text: String = row.get("uuid")?;
    let observation_text: String = row.get("observation_uuid")?;
    let state_text: String = row.get("state")?;
    let state = SessionState::from_db(&state_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid session state `{state_text}` in observation_sessions.state"
        ))
    })?;

    Ok(ObservationSession {
        uuid: parse_uuid(&uuid_text, "observation_sessions.uuid")?,
        observation_uuid: parse_uuid(&observation_text, "observation_sessions.observation_uuid")?,
        observer_id: row.get("observer_id")?,
        observee_id: row.get("observee_id")?,
        state,
        start_time: row.get("start_time")?,
        finish_time: row.get("finish_time")?,
    })
}

fn parse_response_row(row: &Row<'_>) -> RepoResult<PointResponse> {
    let uuid_text: String = row.get("uuid")?;
    let session_text: String = row.get("session_uuid")?;
    let point_text: String = row.get("point_uuid")?;
    Ok(PointResponse {
        uuid: parse_uuid(&uuid_text, "observation_point_responses.uuid")?,
        session_uuid: parse_uuid(&session_text, "observation_point_responses.session_uuid")?,
        point_uuid: parse_uuid(&point_text, "observation_point_responses.point_uuid")?,
        grade_given: row.get("grade_given")?,
        response: row.get("response")?,
        ex_comment: row.get("ex_comment")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
