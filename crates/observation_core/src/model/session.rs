//! Observation session and point response models.
//!
//! # Responsibility
//! - Define one observer/observee marking pass and its lifecycle state.
//! - Define the per-point response recorded during a session.
//!
//! # Invariants
//! - A session leaves `InProgress` at most once; `finish_time` is set then.
//! - At most one response exists per `(session, point)` pair.
//! - `grade_given` lies within `0..=max_grade` of the marked point.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use super::observation::ObservationId;
use super::point::PointId;

/// Stable identifier for one observation session.
pub type SessionId = Uuid;

/// Stable identifier for one point response.
pub type ResponseId = Uuid;

/// Host user identifier (observer, observee, acting user).
pub type UserId = i64;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    InProgress,
    Complete,
    Cancelled,
}

impl SessionState {
    /// Value persisted in `observation_sessions.state`.
    pub fn as_db(self) -> &'static str {
        match self {
            Self::InProgress => "inprogress",
            Self::Complete => "complete",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a persisted state value.
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "inprogress" => Some(Self::InProgress),
            "complete" => Some(Self::Complete),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// User-facing label.
    pub fn label(self) -> &'static str {
        match self {
            Self::InProgress => "In progress",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether responses may still be submitted or revised.
    pub fn accepts_responses(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// Persisted session read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationSession {
    pub uuid: SessionId,
    pub observation_uuid: ObservationId,
    pub observer_id: UserId,
    pub observee_id: UserId,
    pub state: SessionState,
    /// Epoch ms.
    pub start_time: i64,
    /// Epoch ms; `None` while in progress.
    pub finish_time: Option<i64>,
}

/// Response input submitted by an observer for one point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseDraft {
    pub grade_given: i64,
    pub response: String,
    /// Extra comment shown alongside the response.
    #[serde(default)]
    pub ex_comment: String,
}

impl ResponseDraft {
    pub fn new(grade_given: i64, response: impl Into<String>) -> Self {
        Self {
            grade_given,
            response: response.into(),
            ex_comment: String::new(),
        }
    }

    pub fn with_comment(mut self, ex_comment: impl Into<String>) -> Self {
        self.ex_comment = ex_comment.into();
        self
    }

    /// Validates the grade against the marked point's `max_grade`.
    pub fn validate(&self, max_grade: i64) -> Result<(), ResponseValidationError> {
        if self.grade_given < 0 {
            return Err(ResponseValidationError::NegativeGrade(self.grade_given));
        }
        if self.grade_given > max_grade {
            return Err(ResponseValidationError::GradeAboveMax {
                grade_given: self.grade_given,
                max_grade,
            });
        }
        Ok(())
    }
}

/// Persisted response read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointResponse {
    pub uuid: ResponseId,
    pub session_uuid: SessionId,
    pub point_uuid: PointId,
    pub grade_given: i64,
    pub response: String,
    pub ex_comment: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Validation errors for submitted responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseValidationError {
    NegativeGrade(i64),
    GradeAboveMax { grade_given: i64, max_grade: i64 },
}

impl Display for ResponseValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeGrade(value) => write!(f, "grade must be >= 0, got {value}"),
            Self::GradeAboveMax {
                grade_given,
                max_grade,
            } => write!(f, "grade {grade_given} exceeds point max grade {max_grade}"),
        }
    }
}

impl Error for ResponseValidationError {}

#[cfg(test)]
mod tests {
    use super::{ResponseDraft, ResponseValidationError, SessionState};

    #[test]
    fn state_round_trips_through_db_value() {
        for state in [
            SessionState::InProgress,
            SessionState::Complete,
            SessionState::Cancelled,
        ] {
            assert_eq!(SessionState::from_db(state.as_db()), Some(state));
        }
        assert_eq!(SessionState::from_db("paused"), None);
    }

    #[test]
    fn only_cancelled_sessions_reject_responses() {
        assert!(SessionState::InProgress.accepts_responses());
        assert!(SessionState::Complete.accepts_responses());
        assert!(!SessionState::Cancelled.accepts_responses());
    }

    #[test]
    fn grade_must_fit_point_range() {
        ResponseDraft::new(5, "ok").validate(5).expect("max grade ok");
        ResponseDraft::new(0, "").validate(0).expect("zero ok");
        assert_eq!(
            ResponseDraft::new(-2, "x").validate(5),
            Err(ResponseValidationError::NegativeGrade(-2))
        );
        assert_eq!(
            ResponseDraft::new(6, "x").validate(5),
            Err(ResponseValidationError::GradeAboveMax {
                grade_given: 6,
                max_grade: 5
            })
        );
    }
}
