//! Accounts data model.
//!
//! # Purpose
//! Defines user and address records and how each participates in access
//! resolution: users carry an ACL, addresses defer to their owning user.
mod address;
mod user;

pub use address::{ADDRESS_RESOURCE, Address};
pub use user::{USER_RESOURCE, User, UserPatch, UserRecord, actions};

#[cfg(test)]
pub(crate) use user::sample_user;
