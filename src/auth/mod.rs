//! Core authentication subsystem: OTP challenges, signed tokens, the
//! session ledger, and the request gateway.

pub mod error;
pub mod gateway;
pub mod otp;
pub mod principal;
pub mod session;
pub mod sweep;
pub mod token;

pub use error::AuthError;
pub use principal::{ChannelKind, PrincipalKind};
