//! Session listing for the observation's session table.
//!
//! Rows carry display-ready values: state labels, RFC 2822 timestamps and
//! the actions available for each session.

use crate::access::capability::Capability;
use crate::access::context::{AccessDenied, RequestContext};
use crate::model::observation::ObservationId;
use crate::model::session::{ObservationSession, SessionId, SessionState, UserId};
use crate::repo::error::RepoError;
use crate::repo::session_repo::{SessionListQuery, SessionRepository};
use chrono::DateTime;
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_SESSION_PAGE_LIMIT: u32 = 50;
pub const MAX_SESSION_PAGE_LIMIT: u32 = 500;

/// Errors from session table operations.
#[derive(Debug)]
pub enum SessionTableError {
    PermissionDenied(AccessDenied),
    Repo(RepoError),
}

impl Display for SessionTableError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionTableError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::PermissionDenied(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for SessionTableError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<AccessDenied> for SessionTableError {
    fn from(value: AccessDenied) -> Self {
        warn!(
            "event=access_denied module=session_table user={} capability={}",
            value.user_id, value.capability
        );
        Self::PermissionDenied(value)
    }
}

/// Action offered for one session row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Resume,
    ViewSummary,
}

impl SessionAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::Resume => "Resume",
            Self::ViewSummary => "View summary",
        }
    }
}

/// Query for one page of the session table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTableQuery {
    pub observation_uuid: ObservationId,
    pub observee_id: Option<UserId>,
    /// Page size; `None` uses the table default. Clamped to `1..=500`.
    pub limit: Option<u32>,
    pub offset: u32,
}

impl SessionTableQuery {
    pub fn new(observation_uuid: ObservationId) -> Self {
        Self {
            observation_uuid,
            observee_id: None,
            limit: None,
            offset: 0,
        }
    }
}

/// One display row of the session table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub session_uuid: SessionId,
    pub observer_id: UserId,
    pub observee_id: UserId,
    pub state: SessionState,
    pub state_label: &'static str,
    pub start_time: Option<String>,
    pub finish_time: Option<String>,
    pub actions: Vec<SessionAction>,
}

impl SessionRow {
    fn from_session(session: &ObservationSession) -> Self {
        Self {
            session_uuid: session.uuid,
            observer_id: session.observer_id,
            observee_id: session.observee_id,
            state: session.state,
            state_label: session.state.label(),
            start_time: format_epoch_ms(session.start_time),
            finish_time: session.finish_time.and_then(format_epoch_ms),
            actions: actions_for(session.state),
        }
    }
}

/// One page of session rows with the unpaginated total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTablePage {
    pub rows: Vec<SessionRow>,
    pub total: i64,
    pub applied_limit: u32,
    pub offset: u32,
}

/// Session table facade.
pub struct SessionTable<S: SessionRepository> {
    sessions: S,
    default_limit: u32,
}

impl<S: SessionRepository> SessionTable<S> {
    pub fn new(sessions: S) -> Self {
        Self {
            sessions,
            default_limit: DEFAULT_SESSION_PAGE_LIMIT,
        }
    }

    /// Overrides the page size used when a query carries no limit.
    pub fn with_default_limit(mut self, default_limit: u32) -> Self {
        self.default_limit = default_limit.clamp(1, MAX_SESSION_PAGE_LIMIT);
        self
    }

    /// Lists one page of sessions ordered newest first.
    pub fn list_sessions(
        &self,
        ctx: &RequestContext,
        query: &SessionTableQuery,
    ) -> Result<SessionTablePage, SessionTableError> {
        ctx.require(Capability::ViewSessions)?;
        let applied_limit = normalize_page_limit(query.limit, self.default_limit);
        let list_query = SessionListQuery {
            observation_uuid: query.observation_uuid,
            observee_id: query.observee_id,
            limit: Some(applied_limit),
            offset: query.offset,
        };

        let total = self.sessions.count_sessions(&list_query)?;
        let rows = self
            .sessions
            .list_sessions(&list_query)?
            .iter()
            .map(SessionRow::from_session)
            .collect::<Vec<_>>();
        debug!(
            "event=session_table_list module=session_table status=ok observation={} rows={} total={} limit={} offset={}",
            query.observation_uuid,
            rows.len(),
            total,
            applied_limit,
            query.offset
        );

        Ok(SessionTablePage {
            rows,
            total,
            applied_limit,
            offset: query.offset,
        })
    }
}

/// Applies `default_limit` when unset and clamps to `1..=MAX_SESSION_PAGE_LIMIT`.
pub fn normalize_page_limit(limit: Option<u32>, default_limit: u32) -> u32 {
    limit
        .unwrap_or(default_limit)
        .clamp(1, MAX_SESSION_PAGE_LIMIT)
}

/// Formats epoch milliseconds as RFC 2822 in UTC.
///
/// Zero means "not set" and yields `None`, as do out-of-range values.
pub fn format_epoch_ms(epoch_ms: i64) -> Option<String> {
    if epoch_ms == 0 {
        return None;
    }
    DateTime::from_timestamp_millis(epoch_ms).map(|time| time.to_rfc2822())
}

fn actions_for(state: SessionState) -> Vec<SessionAction> {
    match state {
        SessionState::InProgress | SessionState::Complete => {
            vec![SessionAction::Resume, SessionAction::ViewSummary]
        }
        SessionState::Cancelled => Vec::new(),
    }
}
