//! Request-scoped access control.
//!
//! # Responsibility
//! - Name the host capabilities observation use-cases depend on.
//! - Carry the acting user and granted capabilities into services explicitly.

pub mod capability;
pub mod context;
