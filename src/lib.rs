//! Challenge-based authentication for the Brix platform.
//!
//! The crate is organized around three engines and the plumbing that hosts
//! them:
//!
//! - [`auth::otp`] — one-time-passcode issuance and verification over the
//!   mobile and email channels.
//! - [`auth::token`] — HS256 access/refresh token minting and verification,
//!   one isolated signing configuration per (principal kind, token kind)
//!   pair.
//! - [`auth::gateway`] — bearer-credential middleware with strict and
//!   lenient modes.
//!
//! `cli` hosts the command tree and server bootstrap, `api` the HTTP
//! surface.

pub mod api;
pub mod auth;
pub mod cli;
