//! Observation point ordering and observation session workflow.
//!
//! Points of an observation keep a dense 1-based `list_order`; sessions mark
//! those points in that order. All state lives in SQLite.

pub mod access;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use access::capability::Capability;
pub use access::context::{AccessDenied, RequestContext};
pub use config::{BootstrapError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::observation::{Observation, ObservationId};
pub use model::point::{
    InstructionsFormat, ObservationPoint, PointDraft, PointId, PointValidationError, ResponseType,
};
pub use model::session::{
    ObservationSession, PointResponse, ResponseDraft, ResponseValidationError, SessionId,
    SessionState, UserId,
};
pub use repo::error::{RepoEntity, RepoError, RepoResult};
pub use repo::observation_repo::{ObservationRepository, SqliteObservationRepository};
pub use repo::point_repo::{
    PointRepository, ReorderDirection, ReorderOutcome, SqlitePointRepository,
};
pub use repo::session_repo::{SessionListQuery, SessionRepository, SqliteSessionRepository};
pub use service::point_service::{instructions_preview, PointService, PointServiceError};
pub use service::session_service::{
    MarkingEntry, MarkingSheet, SessionService, SessionServiceError, SessionSummary,
};
pub use service::session_table::{
    SessionAction, SessionRow, SessionTable, SessionTableError, SessionTablePage,
    SessionTableQuery,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
