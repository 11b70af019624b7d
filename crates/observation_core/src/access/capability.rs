//! Host capability declarations guarding observation use-cases.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Capability granted to the acting user by the host LMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    /// Create, edit, reorder and delete observation points.
    ManagePoints,
    /// Run sessions and submit point responses.
    PerformObservation,
    /// List sessions and their results.
    ViewSessions,
}

impl Capability {
    /// Stable host capability name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManagePoints => CAPABILITY_MANAGE_POINTS,
            Self::PerformObservation => CAPABILITY_PERFORM_OBSERVATION,
            Self::ViewSessions => CAPABILITY_VIEW_SESSIONS,
        }
    }

    /// User-facing short description.
    pub fn description(self) -> &'static str {
        match self {
            Self::ManagePoints => "Edit the observation points of an observation activity.",
            Self::PerformObservation => "Perform observation sessions and record point responses.",
            Self::ViewSessions => "View observation sessions and their results.",
        }
    }
}

impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host name of the point management capability.
pub const CAPABILITY_MANAGE_POINTS: &str = "mod/observation:editobservationpoints";
/// Host name of the session marking capability.
pub const CAPABILITY_PERFORM_OBSERVATION: &str = "mod/observation:performobservation";
/// Host name of the session listing capability.
pub const CAPABILITY_VIEW_SESSIONS: &str = "mod/observation:viewsessions";

const SUPPORTED_CAPABILITY_STRINGS: &[&str] = &[
    CAPABILITY_MANAGE_POINTS,
    CAPABILITY_PERFORM_OBSERVATION,
    CAPABILITY_VIEW_SESSIONS,
];

/// Returns supported host capability names.
pub fn supported_capability_strings() -> &'static [&'static str] {
    SUPPORTED_CAPABILITY_STRINGS
}

/// Parses one capability from its host name.
pub fn parse_capability(value: &str) -> Result<Capability, CapabilityError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(CapabilityError::EmptyCapability);
    }

    match normalized {
        CAPABILITY_MANAGE_POINTS => Ok(Capability::ManagePoints),
        CAPABILITY_PERFORM_OBSERVATION => Ok(Capability::PerformObservation),
        CAPABILITY_VIEW_SESSIONS => Ok(Capability::ViewSessions),
        other => Err(CapabilityError::UnsupportedCapability(other.to_string())),
    }
}

/// Capability parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    EmptyCapability,
    UnsupportedCapability(String),
}

impl Display for CapabilityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCapability => write!(f, "capability value must not be empty"),
            Self::UnsupportedCapability(value) => {
                write!(f, "capability is unsupported: {value}")
            }
        }
    }
}

impl Error for CapabilityError {}
