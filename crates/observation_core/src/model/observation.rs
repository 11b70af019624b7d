//! Observation activity model.
//!
//! An observation is the parent that scopes a set of points and sessions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for one observation activity.
pub type ObservationId = Uuid;

/// Persisted observation read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub uuid: ObservationId,
    pub name: String,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}
