//! API handlers for the auth service.
//!
//! `auth` holds the token flows; `health` and `root` are operational endpoints.

pub mod auth;
pub mod health;
pub mod root;
