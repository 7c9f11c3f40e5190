use crate::config::Config;
use crate::error::Error;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use url::Url;

pub const ADWORDS_SCOPE: &str = "https://www.googleapis.com/auth/adwords";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const EXPIRY_SKEW_SECS: i64 = 30;
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(2);
const CALLBACK_PAGE: &str =
    "The authentication flow has completed. You may close this window.";

/// An OAuth2 access token, valid for the duration of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| at - Duration::seconds(EXPIRY_SKEW_SECS) <= now)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync + 'static {
    /// Obtains a credential that is valid at the time it is returned.
    /// # Returns
    /// A Result containing either a [`Credential`] or an [`Error::Auth`].
    async fn authenticate(&self) -> Result<Credential, Error>;
}

/// The `installed` (or `web`) section of a Google client secret file.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ClientSecret {
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let invalid = |message: String| Error::InvalidClientSecret {
            path: path.display().to_string(),
            message,
        };

        let raw = fs::read_to_string(path).map_err(|err| invalid(err.to_string()))?;
        Self::from_json(&raw).map_err(invalid)
    }

    fn from_json(raw: &str) -> Result<Self, String> {
        let file: ClientSecretFile = serde_json::from_str(raw).map_err(|err| err.to_string())?;

        file.installed
            .or(file.web)
            .ok_or_else(|| "expected an \"installed\" or \"web\" section".to_string())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenResponse {
    fn into_credential(self, now: DateTime<Utc>, previous_refresh: Option<String>) -> Credential {
        Credential {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: self.expires_in.map(|secs| now + Duration::seconds(secs)),
        }
    }
}

#[derive(Deserialize, Debug)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Shows the consent URL to the person running the flow.
type ConsentPrompt = Box<dyn Fn(&Url) + Send + Sync>;

/// Desktop authorization-code flow: the consent redirect lands on a local listener.
pub struct InstalledAppFlow {
    client: Client,
    secrets_path: PathBuf,
    port: u16,
    scopes: Vec<String>,
    prompt: ConsentPrompt,
}

impl InstalledAppFlow {
    pub fn new(config: &Config) -> Self {
        InstalledAppFlow {
            client: Client::new(),
            secrets_path: config.client_secrets_file.clone(),
            port: config.oauth_port,
            scopes: vec![ADWORDS_SCOPE.to_string()],
            prompt: Box::new(|url: &Url| {
                println!("Please visit this URL to authorize this application: {}", url)
            }),
        }
    }

    #[cfg(test)]
    fn with_prompt(mut self, prompt: impl Fn(&Url) + Send + Sync + 'static) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    async fn run_local_server(&self, secret: &ClientSecret) -> Result<Credential, Error> {
        let auth_error = |message: String| Error::Auth { message };

        let listener = TcpListener::bind(("127.0.0.1", self.port))
            .await
            .map_err(|err| auth_error(format!("cannot listen on port {}: {}", self.port, err)))?;
        let port = listener
            .local_addr()
            .map_err(|err| auth_error(format!("callback listener has no address: {}", err)))?
            .port();
        let redirect_uri = format!("http://localhost:{}/", port);
        let state = uuid::Uuid::new_v4().simple().to_string();

        let url = authorization_url(secret, &redirect_uri, &self.scopes, &state)?;
        (self.prompt)(&url);
        info!("waiting for authorization callback on {}", redirect_uri);

        let code = wait_for_callback(listener, &state).await?;
        exchange_code(&self.client, secret, &code, &redirect_uri).await
    }
}

#[async_trait::async_trait]
impl Authenticator for InstalledAppFlow {
    async fn authenticate(&self) -> Result<Credential, Error> {
        let secret = ClientSecret::from_file(&self.secrets_path)?;
        let credential = self.run_local_server(&secret).await?;

        if credential.is_expired(Utc::now()) && credential.refresh_token.is_some() {
            info!("access token already expired, refreshing");
            return refresh(&self.client, &secret, &credential).await;
        }

        Ok(credential)
    }
}

fn authorization_url(
    secret: &ClientSecret,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> Result<Url, Error> {
    let mut url = Url::parse(&secret.auth_uri)?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &secret.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &scopes.join(" "))
        .append_pair("state", state)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent");

    Ok(url)
}

/// The code on success, otherwise the reason the flow failed.
type CallbackOutcome = Result<String, String>;

#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    outcome: Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>,
}

async fn receive_callback(
    State(callback): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, &'static str) {
    let outcome = match params {
        CallbackParams { error: Some(error), .. } => {
            Err(format!("authorization was not granted: {}", error))
        }
        CallbackParams { code: None, .. } => {
            return (StatusCode::BAD_REQUEST, "Missing authorization code.");
        }
        CallbackParams { state, .. } if state.as_deref() != Some(&*callback.expected_state) => {
            Err("state mismatch in authorization callback".to_string())
        }
        CallbackParams { code: Some(code), .. } => Ok(code),
    };

    let Some(sender) = callback.outcome.lock().await.take() else {
        return (StatusCode::CONFLICT, "Authorization was already received.");
    };
    let page = match outcome {
        Ok(_) => (StatusCode::OK, CALLBACK_PAGE),
        Err(_) => (StatusCode::FORBIDDEN, "Authorization failed. You may close this window."),
    };
    sender.send(outcome).ok();
    page
}

/// Serves the redirect target on `listener` until one authorization callback
/// arrives, then shuts the listener down.
async fn wait_for_callback(listener: TcpListener, expected_state: &str) -> Result<String, Error> {
    let auth_error = |message: String| Error::Auth { message };
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let app = Router::new()
        .route("/", get(receive_callback))
        .with_state(CallbackState {
            expected_state: Arc::from(expected_state),
            outcome: Arc::new(Mutex::new(Some(outcome_tx))),
        });
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
    });

    let outcome = outcome_rx.await;
    shutdown_tx.send(()).ok();
    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(Ok(Err(err))) if outcome.is_err() => {
            return Err(auth_error(format!("callback listener failed: {}", err)));
        }
        Ok(Err(err)) if outcome.is_err() => {
            return Err(auth_error(format!("callback listener stopped: {}", err)));
        }
        Err(_) => debug!("callback listener still draining connections"),
        _ => {}
    }

    outcome
        .map_err(|_| auth_error("callback listener stopped before authorization completed".to_string()))?
        .map_err(auth_error)
}

async fn exchange_code(
    client: &Client,
    secret: &ClientSecret,
    code: &str,
    redirect_uri: &str,
) -> Result<Credential, Error> {
    let form = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("client_id", secret.client_id.as_str()),
        ("client_secret", secret.client_secret.as_str()),
    ];

    let token = request_token(client, &secret.token_uri, &form).await?;
    Ok(token.into_credential(Utc::now(), None))
}

async fn refresh(
    client: &Client,
    secret: &ClientSecret,
    credential: &Credential,
) -> Result<Credential, Error> {
    let refresh_token = credential.refresh_token.as_deref().ok_or_else(|| Error::Auth {
        message: "no refresh token available".to_string(),
    })?;
    let form = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", secret.client_id.as_str()),
        ("client_secret", secret.client_secret.as_str()),
    ];

    let token = request_token(client, &secret.token_uri, &form).await?;
    Ok(token.into_credential(Utc::now(), credential.refresh_token.clone()))
}

async fn request_token(
    client: &Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, Error> {
    let auth_error = |message: String| Error::Auth { message };

    let resp = client
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|err| auth_error(format!("token request failed: {}", err)))?;
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|err| auth_error(format!("token response unreadable: {}", err)))?;

    if !status.is_success() {
        let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(TokenErrorResponse {
                error,
                error_description: Some(description),
            }) => format!("{}: {}", error, description),
            Ok(TokenErrorResponse { error, .. }) => error,
            Err(_) => format!("token endpoint responded with {}", status),
        };
        return Err(auth_error(message));
    }

    serde_json::from_str(&body).map_err(|err| auth_error(format!("malformed token response: {}", err)))
}
