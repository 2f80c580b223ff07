//! Gatekeeper Backend Library
//!
//! Exposes the auth subsystem for use by the server binary and tests.

pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
