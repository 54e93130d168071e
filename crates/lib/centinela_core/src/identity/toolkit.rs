//! REST identity provider.
//!
//! Talks to an Identity Toolkit compatible `accounts:lookup` endpoint. The
//! same endpoint serves both calls: with `idToken` it verifies a client token,
//! with `localId` it looks a user up by uid. An empty `users` array or a
//! `USER_NOT_FOUND` error means the user does not exist.
//!
//! The API key travels in the query string, so request URLs are stripped from
//! every error before it leaves this module.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{IdentityProvider, ProviderError, ProviderUser};

const LOOKUP_PATH: &str = "v1/accounts:lookup";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_id: Option<[&'a str; 1]>,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// `accounts:lookup` client.
#[derive(Clone)]
pub struct ToolkitProvider {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl ToolkitProvider {
    /// `base_url` is the service root, e.g. `https://identitytoolkit.googleapis.com`.
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Other(format!("http client: {e}")))?;
        Self::with_client(client, base_url, api_key)
    }

    pub fn with_client(
        client: Client,
        base_url: &str,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let endpoint = Url::parse(&format!(
            "{}/{LOOKUP_PATH}",
            base_url.trim_end_matches('/')
        ))
        .map_err(|e| ProviderError::Other(format!("invalid identity API URL: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
        })
    }

    async fn lookup(&self, request: &LookupRequest<'_>) -> Result<ProviderUser, ProviderError> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| {
                ProviderError::Other(format!("lookup request failed: {}", e.without_url()))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ErrorEnvelope>()
                .await
                .map(|e| e.error.message)
                .unwrap_or_else(|_| status.to_string());
            debug!(%status, %message, "identity lookup rejected");
            return Err(classify(status, message));
        }

        let body: LookupResponse = resp
            .json()
            .await
            .map_err(|e| {
                ProviderError::Other(format!("lookup response parse error: {}", e.without_url()))
            })?;
        body.users
            .into_iter()
            .next()
            .map(|u| ProviderUser {
                uid: u.local_id,
                email: u.email,
            })
            .ok_or(ProviderError::NotFound)
    }
}

fn classify(status: StatusCode, message: String) -> ProviderError {
    if message.starts_with("USER_NOT_FOUND") || status == StatusCode::NOT_FOUND {
        return ProviderError::NotFound;
    }
    if message.starts_with("INVALID_ID_TOKEN") || message.starts_with("TOKEN_EXPIRED") {
        return ProviderError::InvalidToken(message);
    }
    ProviderError::Other(format!("{status}: {message}"))
}

#[async_trait]
impl IdentityProvider for ToolkitProvider {
    async fn verify_token(&self, raw_token: &str) -> Result<ProviderUser, ProviderError> {
        self.lookup(&LookupRequest {
            id_token: Some(raw_token),
            local_id: None,
        })
        .await
    }

    async fn get_user(&self, uid: &str) -> Result<ProviderUser, ProviderError> {
        self.lookup(&LookupRequest {
            id_token: None,
            local_id: Some([uid]),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn verify_token_returns_first_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:lookup"))
            .and(query_param("key", "test-key"))
            .and(body_json(serde_json::json!({ "idToken": "client-token" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "users": [{ "localId": "u1", "email": "a@b.com" }]
            })))
            .mount(&server)
            .await;

        let provider = ToolkitProvider::new(&server.uri(), "test-key").unwrap();
        let user = provider.verify_token("client-token").await.unwrap();
        assert_eq!(
            user,
            ProviderUser {
                uid: "u1".into(),
                email: "a@b.com".into()
            }
        );
    }

    #[tokio::test]
    async fn get_user_sends_local_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({ "localId": ["u1"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "users": [{ "localId": "u1", "email": "a@b.com" }]
            })))
            .mount(&server)
            .await;

        let provider = ToolkitProvider::new(&server.uri(), "test-key").unwrap();
        assert_eq!(provider.get_user("u1").await.unwrap().email, "a@b.com");
    }

    #[tokio::test]
    async fn empty_users_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let provider = ToolkitProvider::new(&server.uri(), "test-key").unwrap();
        assert!(matches!(
            provider.get_user("ghost").await,
            Err(ProviderError::NotFound)
        ));
    }

    #[tokio::test]
    async fn invalid_id_token_is_distinguished() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": { "code": 400, "message": "INVALID_ID_TOKEN" }
            })))
            .mount(&server)
            .await;

        let provider = ToolkitProvider::new(&server.uri(), "test-key").unwrap();
        assert!(matches!(
            provider.verify_token("bad").await,
            Err(ProviderError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn server_error_is_other() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let provider = ToolkitProvider::new(&server.uri(), "test-key").unwrap();
        assert!(matches!(
            provider.get_user("u1").await,
            Err(ProviderError::Other(_))
        ));
    }
}
