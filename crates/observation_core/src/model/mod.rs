//! Domain model for observation activities, points and sessions.
//!
//! # Responsibility
//! - Define canonical records shared by repositories and services.
//! - Own payload validation rules so every write path applies them.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Validation runs before persistence, never after.

pub mod observation;
pub mod point;
pub mod session;
