//! Start-up auth check and explicit logout.
use crate::api::EvertalkApi;
use crate::routes::Route;
use crate::{Notice, Notifier, SessionContext};
use evertalk_client::ApiError;
use evertalk_client::types::AuthCheck;
use std::time::Duration;

/// Extra attempts after the first failed auth check.
pub const BOOT_RETRIES: u32 = 2;

pub const BOOT_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootOutcome {
    Authenticated(String),
    /// Logged in, but the profile has not been set up yet.
    NeedsProfile,
    /// The backend answered that the session is no longer valid.
    Expired,
    /// The check could not be completed.
    Guest,
}

impl BootOutcome {
    /// Where the app lands after boot.
    pub fn landing(&self) -> Route {
        match self {
            BootOutcome::Authenticated(_) => Route::Home,
            BootOutcome::NeedsProfile => Route::Entry,
            BootOutcome::Expired | BootOutcome::Guest => Route::Login,
        }
    }
}

fn is_retryable(error: &ApiError) -> bool {
    match error {
        ApiError::SessionRefreshed => true,
        other => !matches!(other.status(), Some(401) | Some(403)),
    }
}

async fn check_with_retry<A: EvertalkApi + ?Sized>(
    api: &A,
    backoff: Duration,
) -> Result<AuthCheck, ApiError> {
    let mut attempt = 0;
    loop {
        match api.check_auth().await {
            Ok(check) => return Ok(check),
            Err(e) if attempt < BOOT_RETRIES && is_retryable(&e) => {
                attempt += 1;
                tracing::warn!("auth check failed ({}), retry {}/{}", e, attempt, BOOT_RETRIES);
                tokio::time::sleep(backoff * attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}

pub async fn boot<A: EvertalkApi + ?Sized>(
    api: &A,
    session: &SessionContext,
    notifier: &dyn Notifier,
) -> BootOutcome {
    boot_with_backoff(api, session, notifier, BOOT_BACKOFF).await
}

/// Runs the auth check and initializes the session from it.
pub async fn boot_with_backoff<A: EvertalkApi + ?Sized>(
    api: &A,
    session: &SessionContext,
    notifier: &dyn Notifier,
    backoff: Duration,
) -> BootOutcome {
    let check = match check_with_retry(api, backoff).await {
        Ok(check) => check,
        Err(e) => {
            tracing::error!("auth check failed: {}", e);
            session.clear();
            return BootOutcome::Guest;
        }
    };

    if !check.is_authenticated() {
        tracing::info!("session expired");
        session.clear();
        notifier.notify(Notice::SessionExpired);
        return BootOutcome::Expired;
    }

    match check.nickname().filter(|name| !name.is_empty()) {
        Some(name) => {
            tracing::info!("logged in as {}", name);
            session.login(name);
            BootOutcome::Authenticated(name.to_string())
        }
        None => {
            tracing::info!("logged in without a profile");
            session.login("");
            BootOutcome::NeedsProfile
        }
    }
}

/// Best-effort server logout; the local session is cleared either way.
pub async fn logout<A: EvertalkApi + ?Sized>(api: &A, session: &SessionContext) {
    if let Err(e) = api.logout().await {
        tracing::error!("logout request failed: {}", e);
    }
    session.clear();
    tracing::info!("logged out");
}
