//! Observation point use-case service.
//!
//! # Responsibility
//! - Gate point configuration behind request-context capabilities.
//! - Normalize and validate payloads above the repository layer.
//! - Derive plain-text instruction previews for point listings.
//!
//! # Invariants
//! - Points are only created under an existing observation.
//! - Ordering changes go through `reorder_point`/`delete_point` only.
//! - Listing an observation without points yields an empty vector.

use crate::access::capability::Capability;
use crate::access::context::{AccessDenied, RequestContext};
use crate::model::observation::ObservationId;
use crate::model::point::{ObservationPoint, PointDraft, PointId, PointValidationError};
use crate::repo::error::{RepoEntity, RepoError};
use crate::repo::observation_repo::ObservationRepository;
use crate::repo::point_repo::{PointRepository, ReorderDirection, ReorderOutcome};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

const PREVIEW_MAX_CHARS: usize = 120;

static INLINE_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?(?:a|abbr|b|code|em|i|mark|small|span|strong|sub|sup|u)\b[^>]*>")
        .expect("valid inline tag regex")
});
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

const POINT_READERS: &[Capability] = &[Capability::ManagePoints, Capability::PerformObservation];

/// Errors from observation point service operations.
#[derive(Debug)]
pub enum PointServiceError {
    InvalidPoint(PointValidationError),
    /// Raw reorder delta was neither `+1` nor `-1`.
    InvalidDirection(i64),
    ObservationNotFound(ObservationId),
    PointNotFound(PointId),
    PermissionDenied(AccessDenied),
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for PointServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPoint(err) => write!(f, "{err}"),
            Self::InvalidDirection(delta) => {
                write!(f, "reorder direction must be +1 or -1, got {delta}")
            }
            Self::ObservationNotFound(id) => write!(f, "observation not found: {id}"),
            Self::PointNotFound(id) => write!(f, "observation point not found: {id}"),
            Self::PermissionDenied(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PointServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPoint(err) => Some(err),
            Self::PermissionDenied(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for PointServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: RepoEntity::Point,
                id,
            } => Self::PointNotFound(id),
            RepoError::NotFound {
                entity: RepoEntity::Observation,
                id,
            } => Self::ObservationNotFound(id),
            RepoError::InvalidPoint(err) => Self::InvalidPoint(err),
            other => Self::Repo(other),
        }
    }
}

impl From<PointValidationError> for PointServiceError {
    fn from(value: PointValidationError) -> Self {
        Self::InvalidPoint(value)
    }
}

impl From<AccessDenied> for PointServiceError {
    fn from(value: AccessDenied) -> Self {
        warn!(
            "event=access_denied module=point_service user={} capability={}",
            value.user_id, value.capability
        );
        Self::PermissionDenied(value)
    }
}

/// Observation point service facade.
pub struct PointService<P: PointRepository, O: ObservationRepository> {
    points: P,
    observations: O,
}

impl<P: PointRepository, O: ObservationRepository> PointService<P, O> {
    /// Creates service from repository implementations.
    pub fn new(points: P, observations: O) -> Self {
        Self {
            points,
            observations,
        }
    }

    /// Appends one point to the end of the observation's list.
    pub fn create_point(
        &self,
        ctx: &RequestContext,
        observation_uuid: ObservationId,
        draft: &PointDraft,
    ) -> Result<ObservationPoint, PointServiceError> {
        ctx.require(Capability::ManagePoints)?;
        let normalized = draft.normalized();
        normalized.validate()?;
        self.ensure_observation_exists(observation_uuid)?;

        let point_uuid = self.points.create_point(observation_uuid, &normalized)?;
        let point = self.points.read_point(observation_uuid, point_uuid)?;
        info!(
            "event=point_create module=point_service status=ok user={} observation={} point={} list_order={}",
            ctx.user_id, observation_uuid, point_uuid, point.list_order
        );
        Ok(point)
    }

    /// Loads one point of an observation.
    pub fn read_point(
        &self,
        ctx: &RequestContext,
        observation_uuid: ObservationId,
        point_uuid: PointId,
    ) -> Result<ObservationPoint, PointServiceError> {
        ctx.require_any(POINT_READERS)?;
        self.points
            .read_point(observation_uuid, point_uuid)
            .map_err(Into::into)
    }

    /// Replaces payload fields and returns the stored point.
    ///
    /// The returned `list_order` is the persisted one, whatever `point` held.
    pub fn update_point(
        &self,
        ctx: &RequestContext,
        point: &ObservationPoint,
    ) -> Result<ObservationPoint, PointServiceError> {
        ctx.require(Capability::ManagePoints)?;
        let normalized = ObservationPoint {
            payload: point.payload.normalized(),
            ..point.clone()
        };
        normalized.payload.validate()?;

        self.points.update_point(&normalized)?;
        info!(
            "event=point_update module=point_service status=ok user={} observation={} point={}",
            ctx.user_id, point.observation_uuid, point.uuid
        );
        self.points
            .read_point(point.observation_uuid, point.uuid)
            .map_err(Into::into)
    }

    /// Moves one point a single position; boundary moves are no-ops.
    pub fn reorder_point(
        &self,
        ctx: &RequestContext,
        observation_uuid: ObservationId,
        point_uuid: PointId,
        direction: ReorderDirection,
    ) -> Result<ReorderOutcome, PointServiceError> {
        ctx.require(Capability::ManagePoints)?;
        let outcome = self
            .points
            .reorder_point(observation_uuid, point_uuid, direction)?;
        info!(
            "event=point_reorder module=point_service status=ok user={} observation={} point={} delta={} outcome={:?}",
            ctx.user_id,
            observation_uuid,
            point_uuid,
            direction.delta(),
            outcome
        );
        Ok(outcome)
    }

    /// Same as `reorder_point` for callers holding a raw `+1`/`-1` delta.
    pub fn reorder_point_by(
        &self,
        ctx: &RequestContext,
        observation_uuid: ObservationId,
        point_uuid: PointId,
        delta: i64,
    ) -> Result<ReorderOutcome, PointServiceError> {
        let direction =
            ReorderDirection::from_delta(delta).ok_or(PointServiceError::InvalidDirection(delta))?;
        self.reorder_point(ctx, observation_uuid, point_uuid, direction)
    }

    /// Deletes one point; later siblings move up to close the gap.
    pub fn delete_point(
        &self,
        ctx: &RequestContext,
        observation_uuid: ObservationId,
        point_uuid: PointId,
    ) -> Result<(), PointServiceError> {
        ctx.require(Capability::ManagePoints)?;
        self.points.delete_point(observation_uuid, point_uuid)?;
        info!(
            "event=point_delete module=point_service status=ok user={} observation={} point={}",
            ctx.user_id, observation_uuid, point_uuid
        );
        Ok(())
    }

    /// Lists the observation's points ascending by `list_order`.
    pub fn list_points(
        &self,
        ctx: &RequestContext,
        observation_uuid: ObservationId,
    ) -> Result<Vec<ObservationPoint>, PointServiceError> {
        ctx.require_any(POINT_READERS)?;
        self.points
            .list_points(observation_uuid)
            .map_err(Into::into)
    }

    fn ensure_observation_exists(
        &self,
        observation_uuid: ObservationId,
    ) -> Result<(), PointServiceError> {
        self.observations
            .get_observation(observation_uuid)?
            .ok_or(PointServiceError::ObservationNotFound(observation_uuid))?;
        Ok(())
    }
}

/// Derives a short plain-text preview from point instructions.
///
/// Inline tags are dropped in place, block tags become word breaks, common
/// entities are decoded and whitespace is collapsed.
pub fn instructions_preview(instructions: &str) -> String {
    let without_inline = INLINE_TAG_RE.replace_all(instructions, "");
    let without_tags = HTML_TAG_RE.replace_all(&without_inline, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");
    let collapsed = WHITESPACE_RE.replace_all(decoded.trim(), " ");

    let mut preview = collapsed.chars().take(PREVIEW_MAX_CHARS).collect::<String>();
    if collapsed.chars().count() > PREVIEW_MAX_CHARS {
        preview.push_str("...");
    }
    preview
}
