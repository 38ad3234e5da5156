//! Interactive OAuth2 authorization-code flow for the upload phase.
//!
//! A local listener waits for the provider's redirect. The pending
//! authorization resolves through a one-shot channel once the browser hits
//! the callback, then the code is exchanged for tokens.

use crate::api::oauth::{
    AuthError, CALLBACK_PATH, Credentials, OAuthClient, YOUTUBE_SCOPE, redirect_uri_for_port,
};
use crate::api::youtube::YouTubeClient;
use crate::config::UploadConfig;
use crate::{logi, logok, platform};
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use reqwest::{Client, Url};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const CONSENT_THANKS: &str = "Thank you.\n Now Close this tab";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    ServerListening,
    ConsentRequested,
    CallbackReceived,
    TokenExchanged,
    Authorized,
}

fn enter(state: AuthState) {
    tracing::debug!(?state, "authorization state");
}

type CodeSender = oneshot::Sender<Result<String, AuthError>>;

#[derive(Clone)]
struct CallbackState {
    code_tx: Arc<Mutex<Option<CodeSender>>>,
}

impl CallbackState {
    fn deliver(&self, result: Result<String, AuthError>) {
        let sender = match self.code_tx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(tx) = sender {
            let _ = tx.send(result);
        }
    }
}

async fn oauth_callback(
    State(state): State<CallbackState>,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, &'static str) {
    if uri.path() != CALLBACK_PATH {
        return (StatusCode::NOT_FOUND, "Not found");
    }

    if let Some(code) = params.get("code") {
        logok("Consent given");
        state.deliver(Ok(code.clone()));
        return (StatusCode::OK, CONSENT_THANKS);
    }

    if let Some(error) = params.get("error") {
        state.deliver(Err(AuthError::ConsentDenied(error.clone())));
        return (StatusCode::OK, "Consent was not given. You can close this tab.");
    }

    (StatusCode::BAD_REQUEST, "Missing authorization code")
}

/// Listener is up and the consent URL is known; waiting on the browser.
pub struct PendingAuthorization {
    oauth: OAuthClient,
    consent_url: Url,
    local_addr: SocketAddr,
    code_rx: oneshot::Receiver<Result<String, AuthError>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: JoinHandle<()>,
}

impl PendingAuthorization {
    /// Binds the callback listener on `port` (0 picks a free one) and
    /// prepares the consent URL for that port.
    pub async fn start(
        client_id: &str,
        client_secret: &str,
        port: u16,
    ) -> Result<Self, AuthError> {
        enter(AuthState::Idle);
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|source| AuthError::Bind { port, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| AuthError::Bind { port, source })?;
        logi(format!("Listening on port {}", local_addr.port()));
        enter(AuthState::ServerListening);

        let (code_tx, code_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = Router::new()
            .fallback(oauth_callback)
            .with_state(CallbackState {
                code_tx: Arc::new(Mutex::new(Some(code_tx))),
            });

        let server = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::warn!("callback listener failed: {}", err);
            }
        });

        let oauth = OAuthClient::new(
            client_id,
            client_secret,
            redirect_uri_for_port(local_addr.port()),
        );
        let consent_url = oauth.authorization_url(YOUTUBE_SCOPE)?;

        Ok(Self {
            oauth,
            consent_url,
            local_addr,
            code_rx,
            shutdown_tx: Some(shutdown_tx),
            server,
        })
    }

    pub fn consent_url(&self) -> &Url {
        &self.consent_url
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn oauth_client(&self) -> &OAuthClient {
        &self.oauth
    }

    /// Points token exchange at a different endpoint.
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.oauth.token_uri = token_uri.into();
        self
    }

    /// Prints the consent URL and asks the desktop to open it.
    pub fn request_consent(&self) {
        logi(format!("> Please give your consent: {}", self.consent_url));
        platform::open_url(self.consent_url.as_str());
        enter(AuthState::ConsentRequested);
    }

    /// Suspends until the callback delivers a code, then stops the listener.
    pub async fn wait_for_code(&mut self) -> Result<String, AuthError> {
        let result = (&mut self.code_rx)
            .await
            .unwrap_or(Err(AuthError::CallbackDropped));
        self.stop().await;
        if result.is_ok() {
            enter(AuthState::CallbackReceived);
        }
        result
    }

    async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            let _ = (&mut self.server).await;
        }
    }

    /// Waits for consent and trades the code for tokens.
    pub async fn complete(mut self, http: Client) -> Result<AuthSession, AuthError> {
        let code = self.wait_for_code().await?;
        let credentials = self.oauth.exchange_code(&http, &code).await?;
        enter(AuthState::TokenExchanged);
        logok(format!(
            "> Access tokens received (type {}, expires in {}s, refresh token: {})",
            credentials.token_type.as_deref().unwrap_or("unknown"),
            credentials.expires_in.unwrap_or(0),
            if credentials.refresh_token.is_some() { "yes" } else { "no" }
        ));
        enter(AuthState::Authorized);
        Ok(AuthSession { http, credentials })
    }
}

impl Drop for PendingAuthorization {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Authorized HTTP client plus the tokens that authorize it. Lives for one
/// run of the upload phase.
#[derive(Debug, Clone)]
pub struct AuthSession {
    http: Client,
    credentials: Credentials,
}

impl AuthSession {
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Video platform client that authenticates every call with this session.
    pub fn youtube(&self) -> YouTubeClient {
        YouTubeClient::new(self.http.clone(), self.credentials.access_token.clone())
    }
}

/// Runs the full interactive flow for the upload phase.
pub async fn authorize(cfg: &UploadConfig, http: Client) -> Result<AuthSession, AuthError> {
    if let Some(project) = &cfg.project_id {
        logi(format!("Authorizing uploads for project {}", project));
    }
    let pending =
        PendingAuthorization::start(&cfg.client_id, &cfg.client_secret, cfg.oauth_port).await?;
    pending.request_consent();
    pending.complete(http).await
}
