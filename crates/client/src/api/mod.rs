//! Marketplace REST API client.
//!
//! One typed method per endpoint. Every request reads the bearer token from
//! the [`SessionCache`] at send time, so a logout in another process is
//! honoured on the next call.
//!
//! # Error normalization
//!
//! - 401 tears the session down and returns [`Error::Unauthenticated`]
//! - 404 becomes [`Error::NotFound`]
//! - other 4xx become [`Error::Rejected`] with the backend's reason
//! - 5xx become [`Error::Unavailable`]
//! - transport failures become [`Error::Network`]
//!
//! Nothing is retried.

mod wire;

use std::sync::Arc;

use moka::future::Cache;
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION, CONTENT_TYPE, HeaderName};
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, instrument, warn};
use url::Url;

use agent_market_core::{AgentId, Email};

use crate::catalog::CatalogQuery;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::{Agent, User};
use crate::session::cache::{Session, SessionCache};
use crate::session::forms::{AvatarUpload, PasswordChange, ProfileUpdate, RegisterRequest};

use wire::{
    AuthEnvelope, AvatarEnvelope, DataEnvelope, MessageEnvelope, UserEnvelope, classify, decode,
    disposition_filename,
};

/// What a caller wants to happen when the backend answers 401.
///
/// The session is torn down either way; the policy only decides whether the
/// resulting error asks the UI to route to login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnauthorizedPolicy {
    /// The user asked for something that needs an account.
    #[default]
    PromptLogin,
    /// Background check; degrade to anonymous quietly.
    Silent,
}

impl UnauthorizedPolicy {
    const fn login_required(self) -> bool {
        matches!(self, Self::PromptLogin)
    }
}

/// How a request authenticates.
#[derive(Debug, Clone, Copy)]
enum Auth {
    /// Attach the stored bearer token, if any.
    Bearer(UnauthorizedPolicy),
    /// Credential exchange (login, register). No token is attached and a 401
    /// is a rejection of the submitted credentials, not an expired session.
    Credentials,
}

/// A downloaded agent package.
#[derive(Clone)]
pub struct Download {
    /// Filename suggested by the server, or `agent-{id}` when absent.
    pub filename: String,
    /// Reported content type, if any.
    pub content_type: Option<String>,
    /// Package bytes.
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Client for the marketplace REST API.
///
/// Cheap to clone; clones share the connection pool, session cache and
/// agent detail cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    session: Arc<SessionCache>,
    /// Agent detail responses. Listings are never cached.
    detail_cache: Cache<AgentId, Agent>,
}

impl ApiClient {
    /// Create a client for `config.api_url` using `session` for credentials.
    ///
    /// # Errors
    ///
    /// Returns `Error::Network` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, session: Arc<SessionCache>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("agent-market-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        let detail_cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.detail_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.clone(),
                session,
                detail_cache,
            }),
        })
    }

    /// The session cache this client reads credentials from.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionCache> {
        &self.inner.session
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    /// Join path segments onto the API base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Network(format!("{} cannot be a base URL", self.inner.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and normalize any non-success status.
    async fn execute(&self, request: RequestBuilder, auth: Auth) -> Result<Response> {
        let request = match auth {
            Auth::Bearer(_) => match self.inner.session.token() {
                Some(token) => request.bearer_auth(token.expose_secret()),
                None => request,
            },
            Auth::Credentials => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::UNAUTHORIZED
            && let Auth::Bearer(policy) = auth
        {
            warn!("Backend rejected the session, clearing it");
            self.inner.session.clear();
            return Err(Error::Unauthenticated {
                login_required: policy.login_required(),
            });
        }

        Err(classify(status, &body))
    }

    /// Send a request and decode its JSON body.
    async fn execute_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
        auth: Auth,
    ) -> Result<T> {
        let response = self
            .execute(request.header(ACCEPT, "application/json"), auth)
            .await?;
        let status = response.status();
        let body = response.text().await?;
        decode(status, &body)
    }

    fn get(&self, url: Url) -> RequestBuilder {
        self.inner.client.get(url)
    }

    fn post<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> RequestBuilder {
        self.inner.client.post(url).json(body)
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// List agents matching `query`. Never cached.
    ///
    /// # Errors
    ///
    /// Returns the normalized transport or status error.
    #[instrument(skip(self), fields(category = %query.category, sort = %query.sort))]
    pub async fn list_agents(&self, query: &CatalogQuery) -> Result<Vec<Agent>> {
        let mut url = self.endpoint(&["agents"])?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query.to_params() {
                pairs.append_pair(key, &value);
            }
        }

        let envelope: DataEnvelope<Vec<Agent>> =
            self.execute_json(self.get(url), Auth::Bearer(UnauthorizedPolicy::Silent)).await?;
        debug!(count = envelope.data.len(), "Fetched agents");
        Ok(envelope.data)
    }

    /// Fetch a single agent, served from the detail cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound("Agent {id}")` for unknown agents.
    #[instrument(skip(self), fields(agent_id = %id))]
    pub async fn get_agent(&self, id: AgentId) -> Result<Agent> {
        if let Some(agent) = self.inner.detail_cache.get(&id).await {
            debug!("Agent detail cache hit");
            return Ok(agent);
        }

        let url = self.endpoint(&["agents", &id.to_string()])?;
        let envelope: DataEnvelope<Agent> = self
            .execute_json(self.get(url), Auth::Bearer(UnauthorizedPolicy::Silent))
            .await
            .map_err(|e| match e {
                Error::NotFound(_) => Error::NotFound(format!("Agent {id}")),
                other => other,
            })?;

        self.inner
            .detail_cache
            .insert(id, envelope.data.clone())
            .await;
        Ok(envelope.data)
    }

    /// Download the package of a purchased agent.
    ///
    /// Eligibility is decided by the backend; a refusal surfaces as
    /// `Error::Rejected` with status 403.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unauthenticated` without a valid session and the
    /// normalized status error otherwise.
    #[instrument(skip(self), fields(agent_id = %id))]
    pub async fn download_agent(&self, id: AgentId) -> Result<Download> {
        let url = self.endpoint(&["agents", &id.to_string(), "download"])?;
        let response = self
            .execute(self.get(url), Auth::Bearer(UnauthorizedPolicy::PromptLogin))
            .await?;

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let filename = header(CONTENT_DISPOSITION)
            .as_deref()
            .and_then(disposition_filename)
            .unwrap_or_else(|| format!("agent-{id}"));
        let content_type = header(CONTENT_TYPE);

        let bytes = response.bytes().await?.to_vec();
        debug!(filename = %filename, size = bytes.len(), "Downloaded agent package");

        Ok(Download {
            filename,
            content_type,
            bytes,
        })
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Create an account. Does not touch the session cache.
    ///
    /// # Errors
    ///
    /// Returns `Error::Rejected` with the backend's reason on failure.
    #[instrument(skip(self, form), fields(email = %email))]
    pub async fn register(&self, form: &RegisterRequest, email: &Email) -> Result<Session> {
        #[derive(Serialize)]
        struct Body<'a> {
            name: &'a str,
            email: &'a str,
            password: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            role: Option<&'a str>,
        }

        let url = self.endpoint(&["register"])?;
        let body = Body {
            name: form.name.trim(),
            email: email.as_str(),
            password: form.password.expose_secret(),
            role: form.role.as_ref().map(agent_market_core::Role::as_str),
        };

        let envelope: AuthEnvelope = self
            .execute_json(self.post(url, &body), Auth::Credentials)
            .await?;
        Ok(into_session(envelope))
    }

    /// Exchange credentials for a token. Does not touch the session cache.
    ///
    /// # Errors
    ///
    /// Returns `Error::Rejected` with the backend's reason on bad
    /// credentials.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &Email, password: &SecretString) -> Result<Session> {
        #[derive(Serialize)]
        struct Body<'a> {
            email: &'a str,
            password: &'a str,
        }

        let url = self.endpoint(&["login"])?;
        let body = Body {
            email: email.as_str(),
            password: password.expose_secret(),
        };

        let envelope: AuthEnvelope = self
            .execute_json(self.post(url, &body), Auth::Credentials)
            .await?;
        Ok(into_session(envelope))
    }

    /// Revoke the current token on the backend.
    ///
    /// # Errors
    ///
    /// Returns the normalized error; callers treat this as best-effort.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let url = self.endpoint(&["logout"])?;
        let request = self.inner.client.post(url).header(ACCEPT, "application/json");
        self.execute(request, Auth::Bearer(UnauthorizedPolicy::Silent))
            .await?;
        Ok(())
    }

    /// Current identity for the stored token.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unauthenticated` (with `login_required` per `policy`)
    /// when the token is missing or no longer valid.
    #[instrument(skip(self))]
    pub async fn me(&self, policy: UnauthorizedPolicy) -> Result<User> {
        let url = self.endpoint(&["me"])?;
        let envelope: UserEnvelope = self
            .execute_json(self.get(url), Auth::Bearer(policy))
            .await?;
        Ok(envelope.user)
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Send the provided profile fields. Returns the full updated record.
    ///
    /// # Errors
    ///
    /// Returns the normalized status error.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        let url = self.endpoint(&["profile"])?;
        let request = self.inner.client.put(url).json(update);
        let envelope: UserEnvelope = self
            .execute_json(request, Auth::Bearer(UnauthorizedPolicy::PromptLogin))
            .await?;
        Ok(envelope.user)
    }

    /// Upload a new avatar as multipart field `avatar`.
    ///
    /// Returns the media reference assigned by the backend.
    ///
    /// # Errors
    ///
    /// Returns the normalized status error.
    #[instrument(skip(self, upload), fields(file = %upload.file_name, size = upload.bytes.len()))]
    pub async fn upload_avatar(&self, upload: AvatarUpload) -> Result<String> {
        let url = self.endpoint(&["profile", "avatar"])?;
        let part = reqwest::multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)
            .map_err(|e| Error::Network(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("avatar", part);

        let request = self.inner.client.post(url).multipart(form);
        let envelope: AvatarEnvelope = self
            .execute_json(request, Auth::Bearer(UnauthorizedPolicy::PromptLogin))
            .await?;
        Ok(envelope.avatar)
    }

    /// Change the account password. Returns the backend's confirmation.
    ///
    /// # Errors
    ///
    /// Returns `Error::Rejected` when the current password is wrong.
    #[instrument(skip(self, change))]
    pub async fn change_password(&self, change: &PasswordChange) -> Result<String> {
        #[derive(Serialize)]
        struct Body<'a> {
            current_password: &'a str,
            new_password: &'a str,
            new_password_confirmation: &'a str,
        }

        let url = self.endpoint(&["profile", "change-password"])?;
        let body = Body {
            current_password: change.current.expose_secret(),
            new_password: change.new.expose_secret(),
            new_password_confirmation: change.confirm.expose_secret(),
        };

        let envelope: MessageEnvelope = self
            .execute_json(
                self.post(url, &body),
                Auth::Bearer(UnauthorizedPolicy::PromptLogin),
            )
            .await?;
        Ok(envelope
            .message
            .unwrap_or_else(|| "Password updated".to_string()))
    }
}

fn into_session(envelope: AuthEnvelope) -> Session {
    Session {
        token: SecretString::from(envelope.token),
        user: envelope.user,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(api_url: &str) -> ApiClient {
        let config = ClientConfig::new(api_url).unwrap();
        ApiClient::new(&config, Arc::new(SessionCache::in_memory())).unwrap()
    }

    #[test]
    fn test_endpoint_appends_segments() {
        let api = client("http://localhost:8000/api");
        assert_eq!(
            api.endpoint(&["agents", "7", "download"]).unwrap().as_str(),
            "http://localhost:8000/api/agents/7/download"
        );
    }

    #[test]
    fn test_endpoint_tolerates_trailing_slash() {
        let api = client("http://localhost:8000/api/");
        assert_eq!(
            api.endpoint(&["profile", "change-password"]).unwrap().as_str(),
            "http://localhost:8000/api/profile/change-password"
        );
    }

    #[test]
    fn test_policy_maps_to_login_required() {
        assert!(UnauthorizedPolicy::PromptLogin.login_required());
        assert!(!UnauthorizedPolicy::Silent.login_required());
        assert_eq!(UnauthorizedPolicy::default(), UnauthorizedPolicy::PromptLogin);
    }

    #[tokio::test]
    async fn test_network_failure_is_normalized() {
        // Port 9 (discard) on localhost is closed in test environments
        let api = client("http://127.0.0.1:9/api");
        let err = api.me(UnauthorizedPolicy::Silent).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert!(err.user_message().contains("temporarily unavailable"));
    }
}
