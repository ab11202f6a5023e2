//! Strongly typed identifiers for principals and their clients.
//!
//! # Purpose
//! Wraps string identifiers so a principal id is never passed where a client
//! id is expected (both are plain strings on the wire).
//!
//! # Key invariants
//! - Display and `as_str` return the original value.
//! - Emptiness is not validated here; the session store treats an empty
//!   client id as "no client" and fails closed.
//!
//! # Examples
//! ```rust
//! use massok_authz::{ClientId, PrincipalId};
//!
//! let principal = PrincipalId::new("u-1");
//! let client = ClientId::new("10.0.0.7");
//! assert_eq!(format!("{principal}@{client}"), "u-1@10.0.0.7");
//! ```
use serde::{Deserialize, Serialize};

/// Principal (user) identifier wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Client identifier wrapper.
///
/// # Summary
/// Identifies the client a session key is bound to. The accounts service
/// uses the observed remote IP address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
