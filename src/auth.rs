/// OAuth implicit-grant login for the Spotify Web API
///
/// The access token comes back directly in the redirect fragment; there is
/// no client secret, code exchange or refresh. Expired tokens are detected
/// lazily and require a new login.
use crate::config::SpotifyConfig;
use crate::models::StoredCredentials;
use crate::platform::{AuthorizationPrompt, Clock, PromptError};
use crate::storage::{self, KeyValueStore, StorageError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    LoggedOut,
    /// An authorization prompt is open
    Authorizing,
    LoggedIn { expires_at_ms: i64 },
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error("Redirect URL not found")]
    MissingRedirect,
    #[error("Authorization denied: {0}")]
    Denied(String),
    #[error("Invalid redirect URL: {0}")]
    InvalidRedirect(String),
    #[error("Invalid authorization endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("Authorization already in progress")]
    InProgress,
    #[error("No token available")]
    NoToken,
    #[error("Access token expired")]
    Expired,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Token and lifetime carried by a successful redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplicitGrant {
    pub access_token: String,
    pub expires_in_secs: i64,
}

/// Parse `access_token` and `expires_in` out of the redirect fragment
pub fn parse_redirect(redirect: &str) -> Result<ImplicitGrant, AuthError> {
    let url = Url::parse(redirect).map_err(|e| AuthError::InvalidRedirect(e.to_string()))?;

    // Errors arrive in the fragment for implicit grants, but accept the query too
    let mut params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    if let Some(fragment) = url.fragment() {
        params.extend(url::form_urlencoded::parse(fragment.as_bytes()).into_owned());
    }

    if let Some(error) = params.get("error") {
        return Err(AuthError::Denied(error.clone()));
    }

    let access_token = params
        .get("access_token")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidRedirect("missing access_token".to_string()))?;
    let expires_in_secs = params
        .get("expires_in")
        .and_then(|secs| secs.parse::<i64>().ok())
        .filter(|secs| *secs > 0)
        .ok_or_else(|| AuthError::InvalidRedirect("missing or invalid expires_in".to_string()))?;

    Ok(ImplicitGrant {
        access_token: access_token.clone(),
        expires_in_secs,
    })
}

/// Resets the in-progress flag however the prompt ends
struct AuthorizingGuard<'a>(&'a AtomicBool);

impl Drop for AuthorizingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives the LoggedOut → Authorizing → LoggedIn flow
pub struct Authenticator {
    config: SpotifyConfig,
    prompt: Arc<dyn AuthorizationPrompt>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    authorizing: AtomicBool,
}

impl Authenticator {
    pub fn new(
        config: SpotifyConfig,
        prompt: Arc<dyn AuthorizationPrompt>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            prompt,
            store,
            clock,
            authorizing: AtomicBool::new(false),
        }
    }

    /// The provider authorization URL for the implicit grant
    pub fn authorize_url(&self) -> Result<Url, AuthError> {
        let base = format!(
            "{}/authorize",
            self.config.accounts_url.trim_end_matches('/')
        );
        let scope = self.config.scopes.join(" ");
        Ok(Url::parse_with_params(
            &base,
            [
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "token"),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", scope.as_str()),
            ],
        )?)
    }

    pub async fn state(&self) -> Result<AuthState, AuthError> {
        if self.authorizing.load(Ordering::SeqCst) {
            return Ok(AuthState::Authorizing);
        }
        match storage::load_credentials(self.store.as_ref()).await? {
            Some(creds) if !creds.is_expired(self.clock.now_ms()) => Ok(AuthState::LoggedIn {
                expires_at_ms: creds.expires_at_ms,
            }),
            _ => Ok(AuthState::LoggedOut),
        }
    }

    /// Run the interactive prompt and persist the returned token
    pub async fn login(&self) -> Result<StoredCredentials, AuthError> {
        if self.authorizing.swap(true, Ordering::SeqCst) {
            return Err(AuthError::InProgress);
        }
        let _guard = AuthorizingGuard(&self.authorizing);

        let url = self.authorize_url()?;
        tracing::info!("Launching Spotify authorization prompt");

        let redirect = match self.prompt.launch(&url, true).await {
            Ok(Some(redirect)) => redirect,
            Ok(None) => return Err(AuthError::MissingRedirect),
            Err(e) => {
                tracing::error!("Auth error: {}", e);
                return Err(e.into());
            }
        };

        let grant = parse_redirect(&redirect)?;
        let expires_at_ms = grant
            .expires_in_secs
            .checked_mul(1000)
            .and_then(|ms| self.clock.now_ms().checked_add(ms))
            .ok_or_else(|| AuthError::InvalidRedirect("expires_in out of range".to_string()))?;
        let credentials = StoredCredentials {
            access_token: grant.access_token,
            expires_at_ms,
        };
        storage::save_credentials(self.store.as_ref(), &credentials).await?;

        tracing::info!(
            "Access token stored (expires in {}s)",
            grant.expires_in_secs
        );
        Ok(credentials)
    }

    /// Forget the stored token
    pub async fn logout(&self) -> Result<(), AuthError> {
        storage::clear_credentials(self.store.as_ref()).await?;
        tracing::info!("Spotify credentials removed");
        Ok(())
    }

    /// The stored token, unless it is missing or expired
    pub async fn token(&self) -> Result<String, AuthError> {
        let credentials = storage::load_credentials(self.store.as_ref())
            .await?
            .ok_or(AuthError::NoToken)?;
        if credentials.is_expired(self.clock.now_ms()) {
            return Err(AuthError::Expired);
        }
        Ok(credentials.access_token)
    }
}
