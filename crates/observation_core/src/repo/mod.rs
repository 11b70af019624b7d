//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes validate payloads before persistence.
//! - Multi-row mutations run in one immediate transaction and roll back on
//!   any error.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod error;
pub mod observation_repo;
pub mod point_repo;
pub mod session_repo;
mod support;
