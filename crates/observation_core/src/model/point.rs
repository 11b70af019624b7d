//! Observation point domain model.
//!
//! # Responsibility
//! - Define the rubric item marked during observation sessions.
//! - Validate payload fields before any persistence happens.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another point.
//! - `list_order` is owned by the ordering repository; payload edits never
//!   change it.
//! - Within one observation, `list_order` values form the dense range `1..=N`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use super::observation::ObservationId;

/// Stable identifier for one observation point.
pub type PointId = Uuid;

/// Markup format of point instructions, stored as the host's format code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionsFormat {
    /// Host auto-format text.
    Moodle,
    Html,
    Plain,
    Markdown,
}

impl InstructionsFormat {
    /// Integer code persisted in `observation_points.instructions_format`.
    pub fn code(self) -> i64 {
        match self {
            Self::Moodle => 0,
            Self::Html => 1,
            Self::Plain => 2,
            Self::Markdown => 4,
        }
    }

    /// Parses a persisted format code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Moodle),
            1 => Some(Self::Html),
            2 => Some(Self::Plain),
            4 => Some(Self::Markdown),
            _ => None,
        }
    }
}

/// How an observer answers a point during marking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Free-text response plus a grade.
    Text,
    /// Pass/fail style response plus a grade.
    Passfail,
}

impl ResponseType {
    /// Integer code persisted in `observation_points.response_type`.
    pub fn code(self) -> i64 {
        match self {
            Self::Text => 0,
            Self::Passfail => 1,
        }
    }

    /// Parses a persisted response type code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Text),
            1 => Some(Self::Passfail),
            _ => None,
        }
    }
}

/// Payload fields of an observation point.
///
/// These fields are carried through ordering operations unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointDraft {
    pub title: String,
    /// Marking instructions, usually host-rendered HTML.
    pub instructions: String,
    pub instructions_format: InstructionsFormat,
    /// Highest grade an observer may award; never negative.
    pub max_grade: i64,
    pub response_type: ResponseType,
}

impl PointDraft {
    /// Creates a draft with empty HTML instructions and a text response.
    pub fn new(title: impl Into<String>, max_grade: i64) -> Self {
        Self {
            title: title.into(),
            instructions: String::new(),
            instructions_format: InstructionsFormat::Html,
            max_grade,
            response_type: ResponseType::Text,
        }
    }

    /// Replaces instructions and their format.
    pub fn with_instructions(
        mut self,
        instructions: impl Into<String>,
        format: InstructionsFormat,
    ) -> Self {
        self.instructions = instructions.into();
        self.instructions_format = format;
        self
    }

    /// Replaces the response type.
    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Validates payload constraints.
    ///
    /// # Errors
    /// - `EmptyTitle` when title is blank after trim.
    /// - `NegativeMaxGrade` when `max_grade < 0`.
    pub fn validate(&self) -> Result<(), PointValidationError> {
        if self.title.trim().is_empty() {
            return Err(PointValidationError::EmptyTitle);
        }
        if self.max_grade < 0 {
            return Err(PointValidationError::NegativeMaxGrade(self.max_grade));
        }
        Ok(())
    }

    /// Returns a copy with surrounding title whitespace removed.
    pub fn normalized(&self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            ..self.clone()
        }
    }
}

/// Persisted observation point read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationPoint {
    pub uuid: PointId,
    /// Owning observation; ordering is scoped to this key.
    pub observation_uuid: ObservationId,
    /// Dense 1-based rank among sibling points.
    pub list_order: i64,
    #[serde(flatten)]
    pub payload: PointDraft,
}

/// Validation errors for observation point payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointValidationError {
    EmptyTitle,
    NegativeMaxGrade(i64),
}

impl Display for PointValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "observation point title must not be blank"),
            Self::NegativeMaxGrade(value) => {
                write!(f, "observation point max grade must be >= 0, got {value}")
            }
        }
    }
}

impl Error for PointValidationError {}
