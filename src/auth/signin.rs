//! Interactive sign-in, sign-out and credential status commands

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{parse_callback, AuthError, CredentialSummary};
use crate::app::App;

/// Run the authorization-code flow: print the authorize URL, read back the
/// redirect URL the browser landed on, verify it and store the credential.
pub async fn login(app: &App, force: bool) -> Result<()> {
    let endpoint = app.token_endpoint()?;
    let lifecycle = app.lifecycle_with(endpoint.clone());

    if !force && lifecycle.has_credential()? {
        println!("Already signed in. Use --force to sign in again.");
        return Ok(());
    }

    let (authorize_url, state) = endpoint.authorize_url();

    println!();
    println!("To sign in, open:");
    println!("  {}", authorize_url);
    println!();
    println!(
        "Then paste the URL you were redirected to ({}?code=...):",
        app.settings.redirect_uri
    );

    let callback = BufReader::new(tokio::io::stdin())
        .lines()
        .next_line()
        .await
        .context("Failed to read callback URL")?
        .ok_or_else(|| AuthError::AuthorizationFailed("no callback URL entered".to_string()))?;

    let code = parse_callback(&callback, &state)?;

    tracing::info!("Exchanging authorization code...");
    let credential = lifecycle.exchange_authorization_code(&code).await?;

    println!(
        "Login successful. Access token valid until {}.",
        credential.expires_at.to_rfc3339()
    );
    Ok(())
}

/// Clear stored credentials
pub fn logout(app: &App) -> Result<()> {
    app.lifecycle()?.sign_out()?;
    println!("Logged out.");
    Ok(())
}

/// Display current credential status
pub fn status(app: &App) -> Result<()> {
    match app.lifecycle()?.credential_summary()? {
        CredentialSummary::Present {
            expires_at,
            expiring_soon,
            expired,
        } => {
            let state = if expired {
                "expired (will refresh on next use)"
            } else if expiring_soon {
                "expiring soon (will refresh on next use)"
            } else {
                "valid"
            };
            println!("Credential:  {}", state);
            println!("  expires_at: {}", expires_at.to_rfc3339());
        }
        CredentialSummary::Absent => {
            println!("Credential:  none");
            println!("\nRun 'homewatch login' to authenticate.");
        }
    }
    Ok(())
}
