pub mod health;
pub mod me;
pub mod otp;
pub mod token;
pub mod types;

mod utils;

use std::sync::Arc;

use crate::auth::otp::OtpEngine;
use crate::auth::principal::PrincipalStore;
use crate::auth::token::TokenEngine;

/// Shared handler state, attached as a request extension.
pub struct ApiState {
    otp: OtpEngine,
    tokens: Arc<TokenEngine>,
    principals: Arc<dyn PrincipalStore>,
}

impl ApiState {
    #[must_use]
    pub fn new(
        otp: OtpEngine,
        tokens: Arc<TokenEngine>,
        principals: Arc<dyn PrincipalStore>,
    ) -> Self {
        Self {
            otp,
            tokens,
            principals,
        }
    }

    pub(crate) fn otp(&self) -> &OtpEngine {
        &self.otp
    }

    pub(crate) fn tokens(&self) -> &TokenEngine {
        &self.tokens
    }

    pub(crate) fn principals(&self) -> &dyn PrincipalStore {
        self.principals.as_ref()
    }
}
