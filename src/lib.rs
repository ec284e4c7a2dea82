//! # payroll-auth
//!
//! Authentication boundary for the payroll service: registers users, exchanges
//! credentials for a short-lived HMAC-signed access token plus an opaque refresh token,
//! and rotates refresh tokens on every use.
//!
//! The token machinery lives in [`auth`] and is usable as a library; [`api`] exposes it
//! over HTTP and [`cli`] wires configuration and storage together.

pub mod api;
pub mod auth;
pub mod cli;
pub mod vault;

#[cfg(test)]
mod test_support;
