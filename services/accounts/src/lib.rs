//! massok accounts service library crate.
//!
//! # Purpose
//! Exposes the accounts API surface, request authentication, configuration
//! and storage for use by the binary and integration tests.
pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod model;
pub mod observability;
pub mod store;
