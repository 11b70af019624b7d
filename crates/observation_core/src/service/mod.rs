//! Observation use-case services.
//!
//! # Responsibility
//! - Gate repository calls behind `RequestContext` capability checks.
//! - Translate repository failures into use-case level errors.
//! - Build read models (marking sheets, summaries, session table rows).

pub mod point_service;
pub mod session_service;
pub mod session_table;
