//! Request authentication and authorization for the accounts API.
//!
//! # Purpose
//! [`middleware::authenticate`] attaches an [`massok_authz::Identity`] and the
//! caller's [`massok_authz::ClientId`] to every request; handlers then use
//! [`guard`] to demand a principal and check actions against resources.
pub mod guard;
pub mod middleware;
