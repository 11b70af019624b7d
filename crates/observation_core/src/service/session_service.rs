//! Observation session use-case service.
//!
//! # Responsibility
//! - Manage observation activities, session lifecycle and point responses.
//! - Build the marking sheet an observer steps through during a session.
//! - Decide which point to mark when the caller does not name one.
//!
//! # Invariants
//! - Sessions are started by the acting user, who becomes the observer.
//! - Responses are never recorded against cancelled sessions.
//! - Only `inprogress` sessions can be completed or cancelled.
//! - An observation without points is an error only when resolving a point
//!   to mark, never when listing.

use crate::access::capability::Capability;
use crate::access::context::{AccessDenied, RequestContext};
use crate::model::observation::{Observation, ObservationId};
use crate::model::point::{ObservationPoint, PointId};
use crate::model::session::{
    ObservationSession, PointResponse, ResponseDraft, ResponseValidationError, SessionId,
    SessionState, UserId,
};
use crate::repo::error::{RepoEntity, RepoError};
use crate::repo::observation_repo::ObservationRepository;
use crate::repo::point_repo::PointRepository;
use crate::repo::session_repo::SessionRepository;
use log::{info, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const SESSION_READERS: &[Capability] = &[Capability::PerformObservation, Capability::ViewSessions];
const OBSERVATION_READERS: &[Capability] = &[
    Capability::ManagePoints,
    Capability::PerformObservation,
    Capability::ViewSessions,
];

/// Errors from session service operations.
#[derive(Debug)]
pub enum SessionServiceError {
    /// Observation name is blank after trim.
    InvalidObservationName,
    ObservationNotFound(ObservationId),
    SessionNotFound(SessionId),
    /// Point does not exist or belongs to another observation.
    PointNotFound(PointId),
    /// Observation has no points to mark.
    NoObservationPoints(ObservationId),
    /// Session was cancelled and no longer accepts responses.
    SessionClosed(SessionId),
    /// Session is not in a state that allows the requested transition.
    InvalidStateTransition {
        session_uuid: SessionId,
        state: SessionState,
    },
    InvalidResponse(ResponseValidationError),
    PermissionDenied(AccessDenied),
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for SessionServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidObservationName => write!(f, "observation name must not be blank"),
            Self::ObservationNotFound(id) => write!(f, "observation not found: {id}"),
            Self::SessionNotFound(id) => write!(f, "observation session not found: {id}"),
            Self::PointNotFound(id) => write!(f, "observation point not found: {id}"),
            Self::NoObservationPoints(id) => {
                write!(f, "observation has no observation points: {id}")
            }
            Self::SessionClosed(id) => write!(f, "observation session is closed: {id}"),
            Self::InvalidStateTransition {
                session_uuid,
                state,
            } => write!(
                f,
                "observation session {session_uuid} cannot leave state `{}`",
                state.as_db()
            ),
            Self::InvalidResponse(err) => write!(f, "{err}"),
            Self::PermissionDenied(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidResponse(err) => Some(err),
            Self::PermissionDenied(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SessionServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => match entity {
                RepoEntity::Observation => Self::ObservationNotFound(id),
                RepoEntity::Session => Self::SessionNotFound(id),
                RepoEntity::Point => Self::PointNotFound(id),
                RepoEntity::Response => Self::Repo(RepoError::NotFound { entity, id }),
            },
            RepoError::InvalidResponse(err) => Self::InvalidResponse(err),
            RepoError::SessionClosed(id) => Self::SessionClosed(id),
            other => Self::Repo(other),
        }
    }
}

impl From<AccessDenied> for SessionServiceError {
    fn from(value: AccessDenied) -> Self {
        warn!(
            "event=access_denied module=session_service user={} capability={}",
            value.user_id, value.capability
        );
        Self::PermissionDenied(value)
    }
}

/// One point of a marking sheet with the session's response, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkingEntry {
    pub point: ObservationPoint,
    pub response: Option<PointResponse>,
}

/// Points of a session's observation in list order, paired with responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkingSheet {
    pub session: ObservationSession,
    pub entries: Vec<MarkingEntry>,
}

impl MarkingSheet {
    /// First point in list order.
    pub fn first_point(&self) -> Option<&MarkingEntry> {
        self.entries.first()
    }

    /// Point following `point_uuid`; `None` at the end or for unknown ids.
    pub fn next_point(&self, point_uuid: PointId) -> Option<&MarkingEntry> {
        let index = self.position(point_uuid)?;
        self.entries.get(index + 1)
    }

    /// Point preceding `point_uuid`; `None` at the start or for unknown ids.
    pub fn previous_point(&self, point_uuid: PointId) -> Option<&MarkingEntry> {
        let index = self.position(point_uuid)?;
        index.checked_sub(1).and_then(|prev| self.entries.get(prev))
    }

    pub fn entry(&self, point_uuid: PointId) -> Option<&MarkingEntry> {
        self.entries
            .iter()
            .find(|entry| entry.point.uuid == point_uuid)
    }

    /// Options for a point selector, labelled by list position.
    pub fn selector_options(&self) -> Vec<(PointId, String)> {
        self.entries
            .iter()
            .map(|entry| {
                (
                    entry.point.uuid,
                    format!("Point {}", entry.point.list_order),
                )
            })
            .collect()
    }

    /// Whether every point has a response.
    pub fn is_fully_marked(&self) -> bool {
        self.entries.iter().all(|entry| entry.response.is_some())
    }

    fn position(&self, point_uuid: PointId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.point.uuid == point_uuid)
    }
}

/// Aggregate results of one session.
///
/// Grade totals saturate at `i64::MAX`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub session: ObservationSession,
    pub total_points: usize,
    pub responded_points: usize,
    pub grade_given: i64,
    pub max_grade: i64,
}

/// Session service facade.
pub struct SessionService<S, P, O>
where
    S: SessionRepository,
    P: PointRepository,
    O: ObservationRepository,
{
    sessions: S,
    points: P,
    observations: O,
}

impl<S, P, O> SessionService<S, P, O>
where
    S: SessionRepository,
    P: PointRepository,
    O: ObservationRepository,
{
    /// Creates service from repository implementations.
    pub fn new(sessions: S, points: P, observations: O) -> Self {
        Self {
            sessions,
            points,
            observations,
        }
    }

    /// Creates one observation activity.
    pub fn create_observation(
        &self,
        ctx: &RequestContext,
        name: impl Into<String>,
    ) -> Result<Observation, SessionServiceError> {
        ctx.require(Capability::ManagePoints)?;
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(SessionServiceError::InvalidObservationName);
        }
        let observation = self.observations.create_observation(trimmed)?;
        info!(
            "event=observation_create module=session_service status=ok user={} observation={}",
            ctx.user_id, observation.uuid
        );
        Ok(observation)
    }

    /// Loads one observation activity.
    pub fn get_observation(
        &self,
        ctx: &RequestContext,
        observation_uuid: ObservationId,
    ) -> Result<Observation, SessionServiceError> {
        ctx.require_any(OBSERVATION_READERS)?;
        self.observations
            .get_observation(observation_uuid)?
            .ok_or(SessionServiceError::ObservationNotFound(observation_uuid))
    }

    /// Starts a session with the acting user as observer.
    pub fn start_session(
        &self,
        ctx: &RequestContext,
        observation_uuid: ObservationId,
        observee_id: UserId,
    ) -> Result<ObservationSession, SessionServiceError> {
        ctx.require(Capability::PerformObservation)?;
        if self.observations.get_observation(observation_uuid)?.is_none() {
            return Err(SessionServiceError::ObservationNotFound(observation_uuid));
        }

        let session = self.sessions.create_session(
            observation_uuid,
            ctx.user_id,
            observee_id,
            now_epoch_ms(),
        )?;
        info!(
            "event=session_start module=session_service status=ok user={} observation={} session={} observee={}",
            ctx.user_id, observation_uuid, session.uuid, observee_id
        );
        Ok(session)
    }

    /// Loads one session.
    pub fn session_info(
        &self,
        ctx: &RequestContext,
        session_uuid: SessionId,
    ) -> Result<ObservationSession, SessionServiceError> {
        ctx.require_any(SESSION_READERS)?;
        self.load_session(session_uuid)
    }

    /// Builds the marking sheet for one session.
    pub fn marking_sheet(
        &self,
        ctx: &RequestContext,
        session_uuid: SessionId,
    ) -> Result<MarkingSheet, SessionServiceError> {
        ctx.require_any(SESSION_READERS)?;
        let session = self.load_session(session_uuid)?;
        let points = self.points.list_points(session.observation_uuid)?;
        let mut responses = self
            .sessions
            .list_responses(session_uuid)?
            .into_iter()
            .map(|response| (response.point_uuid, response))
            .collect::<HashMap<_, _>>();

        let entries = points
            .into_iter()
            .map(|point| {
                let response = responses.remove(&point.uuid);
                MarkingEntry { point, response }
            })
            .collect();
        Ok(MarkingSheet { session, entries })
    }

    /// Resolves the point to mark next.
    ///
    /// A requested id must belong to the session's observation. Without one,
    /// the first point in list order is chosen.
    pub fn resolve_point(
        &self,
        ctx: &RequestContext,
        session_uuid: SessionId,
        requested: Option<PointId>,
    ) -> Result<PointId, SessionServiceError> {
        let sheet = self.marking_sheet(ctx, session_uuid)?;
        match requested {
            Some(point_uuid) => sheet
                .entry(point_uuid)
                .map(|entry| entry.point.uuid)
                .ok_or(SessionServiceError::PointNotFound(point_uuid)),
            None => sheet
                .first_point()
                .map(|entry| entry.point.uuid)
                .ok_or(SessionServiceError::NoObservationPoints(
                    sheet.session.observation_uuid,
                )),
        }
    }

    /// Records (or replaces) the response for one point of a session.
    pub fn submit_point_response(
        &self,
        ctx: &RequestContext,
        session_uuid: SessionId,
        point_uuid: PointId,
        draft: &ResponseDraft,
    ) -> Result<PointResponse, SessionServiceError> {
        ctx.require(Capability::PerformObservation)?;
        let session = self.load_session(session_uuid)?;
        if !session.state.accepts_responses() {
            return Err(SessionServiceError::SessionClosed(session_uuid));
        }

        let response = self
            .sessions
            .upsert_response(session_uuid, point_uuid, draft)?;
        info!(
            "event=response_submit module=session_service status=ok user={} session={} point={}",
            ctx.user_id, session_uuid, point_uuid
        );
        Ok(response)
    }

    /// Marks an in-progress session complete.
    pub fn complete_session(
        &self,
        ctx: &RequestContext,
        session_uuid: SessionId,
    ) -> Result<ObservationSession, SessionServiceError> {
        self.finish_session(ctx, session_uuid, SessionState::Complete)
    }

    /// Cancels an in-progress session.
    pub fn cancel_session(
        &self,
        ctx: &RequestContext,
        session_uuid: SessionId,
    ) -> Result<ObservationSession, SessionServiceError> {
        self.finish_session(ctx, session_uuid, SessionState::Cancelled)
    }

    /// Totals of one session's responses against its observation's points.
    pub fn session_summary(
        &self,
        ctx: &RequestContext,
        session_uuid: SessionId,
    ) -> Result<SessionSummary, SessionServiceError> {
        let sheet = self.marking_sheet(ctx, session_uuid)?;
        let total_points = sheet.entries.len();
        let responded_points = sheet
            .entries
            .iter()
            .filter(|entry| entry.response.is_some())
            .count();
        let grade_given = sheet
            .entries
            .iter()
            .filter_map(|entry| entry.response.as_ref())
            .map(|response| response.grade_given)
            .fold(0, i64::saturating_add);
        let max_grade = sheet
            .entries
            .iter()
            .map(|entry| entry.point.payload.max_grade)
            .fold(0, i64::saturating_add);

        Ok(SessionSummary {
            session: sheet.session,
            total_points,
            responded_points,
            grade_given,
            max_grade,
        })
    }

    fn finish_session(
        &self,
        ctx: &RequestContext,
        session_uuid: SessionId,
        final_state: SessionState,
    ) -> Result<ObservationSession, SessionServiceError> {
        ctx.require(Capability::PerformObservation)?;
        if !self
            .sessions
            .finish_session(session_uuid, final_state, now_epoch_ms())?
        {
            let session = self.load_session(session_uuid)?;
            return Err(SessionServiceError::InvalidStateTransition {
                session_uuid,
                state: session.state,
            });
        }

        info!(
            "event=session_finish module=session_service status=ok user={} session={} state={}",
            ctx.user_id,
            session_uuid,
            final_state.as_db()
        );
        self.load_session(session_uuid)
    }

    fn load_session(
        &self,
        session_uuid: SessionId,
    ) -> Result<ObservationSession, SessionServiceError> {
        self.sessions
            .get_session(session_uuid)?
            .ok_or(SessionServiceError::SessionNotFound(session_uuid))
    }
}

fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
