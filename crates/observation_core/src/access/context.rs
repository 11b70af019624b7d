//! Explicit per-request access context.
//!
//! # Invariants
//! - Services never read user or capability state from globals; callers
//!   build one `RequestContext` per request and pass it down.
//! - Capability checks deny by default.

use super::capability::{parse_capability, Capability, CapabilityError};
use crate::model::session::UserId;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Acting user and the capabilities the host granted for this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: UserId,
    capabilities: BTreeSet<Capability>,
}

impl RequestContext {
    pub fn new(user_id: UserId, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            user_id,
            capabilities: capabilities.into_iter().collect(),
        }
    }

    /// Builds a context from host capability names.
    ///
    /// # Errors
    /// Returns the first name that is empty or unsupported.
    pub fn from_capability_names<'a>(
        user_id: UserId,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, CapabilityError> {
        let capabilities = names
            .into_iter()
            .map(parse_capability)
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self {
            user_id,
            capabilities,
        })
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Fails unless `capability` was granted.
    pub fn require(&self, capability: Capability) -> Result<(), AccessDenied> {
        if self.has(capability) {
            return Ok(());
        }
        Err(AccessDenied {
            user_id: self.user_id,
            capability,
        })
    }

    /// Fails unless at least one of `capabilities` was granted.
    ///
    /// The error names the first capability in the list.
    pub fn require_any(&self, capabilities: &[Capability]) -> Result<(), AccessDenied> {
        match capabilities.first() {
            Some(_) if capabilities.iter().any(|cap| self.has(*cap)) => Ok(()),
            Some(first) => Err(AccessDenied {
                user_id: self.user_id,
                capability: *first,
            }),
            None => Ok(()),
        }
    }
}

/// Acting user lacks a required capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDenied {
    pub user_id: UserId,
    pub capability: Capability,
}

impl Display for AccessDenied {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "user {} lacks capability `{}`",
            self.user_id, self.capability
        )
    }
}

impl Error for AccessDenied {}
