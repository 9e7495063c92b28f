//! Login handshake run on the fuzzing session before any payload is sent.

use crate::config::AuthConfig;
use crate::error::{HarrowError, Result};
use reqwest::Client;
use tracing::{info, warn};

/// Performs the configured login on `client`, whose cookie store then carries the session.
pub async fn login(client: &Client, auth: &AuthConfig) -> Result<()> {
    let AuthConfig::FormLogin {
        login_url,
        username_field,
        username,
        password_field,
        password,
        failure_marker,
    } = auth
    else {
        return Ok(());
    };

    info!("Logging in at {} as {}", login_url, username);

    let params = [
        (username_field.as_str(), username.as_str()),
        (password_field.as_str(), password.as_str()),
    ];
    let response = client
        .post(login_url)
        .form(&params)
        .send()
        .await
        .map_err(|e| fail(format!("login request to {} failed: {}", login_url, e)))?;

    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(fail(format!("login returned HTTP {}", status.as_u16())));
    }

    let body = response
        .text()
        .await
        .map_err(|e| fail(format!("could not read login response: {}", e)))?;
    if let Some(marker) = failure_marker.as_deref().filter(|m| !m.is_empty()) {
        if body.contains(marker) {
            return Err(fail(format!("login response contains '{}'", marker)));
        }
    }

    info!("Login succeeded (HTTP {})", status.as_u16());
    Ok(())
}

fn fail(reason: String) -> HarrowError {
    warn!("Authentication failed: {}", reason);
    HarrowError::AuthError(reason)
}
