//! Bearer-token state and the policy deciding when to re-authenticate.
//!
//! The policy is refresh *or* create, never both:
//!
//! | state                          | action            |
//! |--------------------------------|-------------------|
//! | no token                       | client credentials|
//! | token, `now > expires_at`      | refresh token     |
//! | token, `now <= expires_at`     | reuse             |
//!
//! A failed refresh clears the session so that the next call starts over
//! with a client-credentials exchange. The failing call itself is not retried.

use std::{fmt, sync::Arc};

use super::models::TokenResult;

/// Source of "now" as Unix seconds.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenState {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) when `access_token` stops being valid.
    pub expires_at: i64,
}

/// What `ensure_valid_token` has to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenAction {
    Create,
    Refresh { refresh_token: String },
    Reuse { access_token: String },
}

#[derive(Debug, Default)]
pub struct Session {
    token: Option<TokenState>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Option<&TokenState> {
        self.token.as_ref()
    }

    pub fn next_action(&self, now: i64) -> TokenAction {
        match &self.token {
            None => TokenAction::Create,
            Some(t) if now > t.expires_at => TokenAction::Refresh {
                refresh_token: t.refresh_token.clone(),
            },
            Some(t) => TokenAction::Reuse {
                access_token: t.access_token.clone(),
            },
        }
    }

    /// Store the result of a successful exchange completed at `now`.
    pub fn store(&mut self, result: TokenResult, now: i64) -> &TokenState {
        self.token.insert(TokenState {
            access_token: result.access_token,
            refresh_token: result.refresh_token,
            expires_at: now.saturating_add(result.expires_in),
        })
    }

    pub fn clear(&mut self) {
        self.token = None;
    }
}
