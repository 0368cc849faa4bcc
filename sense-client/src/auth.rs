//! Login and multi-factor completion.

use time::OffsetDateTime;

use crate::{
    error::Result,
    http::HttpRequest,
    session::SessionManager,
    timestamp::iso8601_utc,
    tracing::{mask_email, prelude::*},
    types::{AuthenticationResponse, MfaChallenge},
};

/// Result of [`SenseClient::login`](crate::SenseClient::login).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// A session was created.
    Authenticated,

    /// The account needs a second factor. Pass the token and a one-time
    /// code to [`SenseClient::complete_mfa_login`](crate::SenseClient::complete_mfa_login).
    MfaRequired(String),
}

impl LoginOutcome {
    pub fn mfa_token(&self) -> Option<&str> {
        match self {
            LoginOutcome::Authenticated => None,
            LoginOutcome::MfaRequired(token) => Some(token),
        }
    }
}

pub(crate) async fn login(
    sessions: &SessionManager,
    email: &str,
    password: &str,
) -> Result<LoginOutcome> {
    sessions.replace(None);
    info!(email = %mask_email(email), "Initiating Sense authentication.");

    let request = HttpRequest::post_form(
        format!("{}/authenticate", sessions.api_url()),
        &[("email", email), ("password", password)],
    );
    let response = sessions.fetcher().fetch(request).await?;

    if response.status == 401 {
        if let Ok(challenge) = response.json::<MfaChallenge>() {
            if !challenge.mfa_token.is_empty() {
                info!(
                    mfa_type = challenge.mfa_type.as_deref().unwrap_or("unknown"),
                    "Multi-factor authentication required."
                );
                return Ok(LoginOutcome::MfaRequired(challenge.mfa_token));
            }
        }
    }

    if !response.is_success() {
        error!(status = response.status, "Sense authentication failed.");
        return Err(response.into_error());
    }

    let auth: AuthenticationResponse = response.json()?;
    sessions.adopt(auth);
    Ok(LoginOutcome::Authenticated)
}

pub(crate) async fn complete_mfa_login(
    sessions: &SessionManager,
    mfa_token: &str,
    code: &str,
    client_time: OffsetDateTime,
) -> Result<()> {
    let client_time = iso8601_utc(client_time)?;
    debug!(client_time = %client_time, "Completing multi-factor authentication.");

    let request = HttpRequest::post_form(
        format!("{}/authenticate/mfa", sessions.api_url()),
        &[
            ("totp", code),
            ("mfa_token", mfa_token),
            ("client_time", client_time.as_str()),
        ],
    );
    let response = sessions.fetcher().fetch(request).await?;

    if !response.is_success() {
        error!(status = response.status, "Multi-factor authentication failed.");
        return Err(response.into_error());
    }

    let auth: AuthenticationResponse = response.json()?;
    sessions.adopt(auth);
    Ok(())
}
