//! Target API boundary.
//!
//! The dispatcher and token manager talk to the Target through
//! [`TargetGateway`], so both can be exercised against scripted gateways in
//! tests. [`HttpTargetGateway`] is the real reqwest-backed implementation.
//!
//! Response classification happens here, once: 2xx is accepted, 401 means
//! the bearer token expired, 403 means the Target is rate limiting, and
//! everything else is a plain rejection carrying a body snippet for the
//! log. Transport errors surface as [`crate::SyncError::Network`].

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::SyncResult;
use crate::payload::{CreateEquipment, FieldPatch};
use crate::token::TokenGrant;

/// Classified outcome of one Target API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendStatus {
    /// 2xx: the item was applied.
    Accepted,
    /// 401: the bearer token is no longer valid.
    TokenExpired,
    /// 403: the Target is rate limiting us.
    RateLimited,
    /// Any other status; carries the code and a body snippet.
    Rejected { status: u16, detail: String },
}

/// Abstraction over the Target platform's API.
#[async_trait]
pub trait TargetGateway: Send + Sync {
    /// Perform the login call. `Ok(None)` means the Target answered but
    /// did not authenticate us.
    async fn login(&self) -> SyncResult<Option<TokenGrant>>;

    /// POST one equipment creation.
    async fn create_equipment(
        &self,
        token: &str,
        item: &CreateEquipment,
    ) -> SyncResult<SendStatus>;

    /// PATCH one equipment record by Target id.
    async fn update_equipment(
        &self,
        token: &str,
        id: i64,
        patch: &[FieldPatch],
    ) -> SyncResult<SendStatus>;
}

/// Login response wire shape: `{"result": {...}}`.
#[derive(Debug, Deserialize)]
struct LoginEnvelope {
    result: Option<LoginResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResult {
    #[serde(default)]
    authenticated: bool,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expiration: Option<chrono::DateTime<chrono::Utc>>,
}

/// Reqwest-backed [`TargetGateway`].
#[derive(Debug, Clone)]
pub struct HttpTargetGateway {
    client: Client,
    base_url: String,
    api_key: String,
    api_token: String,
}

/// Per-request timeout; the Target is slow under load.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

/// How many body bytes to keep when logging a rejection.
const DETAIL_SNIPPET_LEN: usize = 300;

impl HttpTargetGateway {
    /// Create a gateway against `base_url` with the login credential pair.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_token: impl Into<String>,
    ) -> SyncResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_token: api_token.into(),
        })
    }

    fn equipment_url(&self) -> String {
        format!("{}/equipments/", self.base_url)
    }

    async fn classify(response: Response) -> SyncResult<SendStatus> {
        let status = response.status();
        if status.is_success() {
            return Ok(SendStatus::Accepted);
        }
        match status {
            StatusCode::UNAUTHORIZED => Ok(SendStatus::TokenExpired),
            StatusCode::FORBIDDEN => Ok(SendStatus::RateLimited),
            _ => {
                let mut detail = response.text().await.unwrap_or_default();
                detail.truncate(DETAIL_SNIPPET_LEN);
                Ok(SendStatus::Rejected {
                    status: status.as_u16(),
                    detail,
                })
            }
        }
    }
}

#[async_trait]
impl TargetGateway for HttpTargetGateway {
    #[instrument(skip(self))]
    async fn login(&self) -> SyncResult<Option<TokenGrant>> {
        let url = format!("{}/login/", self.base_url);
        let response = self
            .client
            .get(url)
            .query(&[("apiKey", &self.api_key), ("apiToken", &self.api_token)])
            .send()
            .await?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "login returned non-success");
            return Ok(None);
        }

        let envelope: LoginEnvelope = match response.json().await {
            Ok(envelope) => envelope,
            Err(error) => {
                debug!(%error, "login response body malformed");
                return Ok(None);
            }
        };

        let Some(result) = envelope.result else {
            return Ok(None);
        };
        if !result.authenticated {
            return Ok(None);
        }
        match (result.access_token, result.expiration) {
            (Some(access_token), Some(expiration)) if !access_token.is_empty() => {
                Ok(Some(TokenGrant {
                    access_token,
                    expiration,
                }))
            }
            _ => Ok(None),
        }
    }

    #[instrument(skip(self, token, item), fields(identifier = %item.identifier))]
    async fn create_equipment(
        &self,
        token: &str,
        item: &CreateEquipment,
    ) -> SyncResult<SendStatus> {
        let response = self
            .client
            .post(self.equipment_url())
            .bearer_auth(token)
            .json(item)
            .send()
            .await?;
        Self::classify(response).await
    }

    #[instrument(skip(self, token, patch))]
    async fn update_equipment(
        &self,
        token: &str,
        id: i64,
        patch: &[FieldPatch],
    ) -> SyncResult<SendStatus> {
        // The Target expects the patch body as a bare JSON array.
        let response = self
            .client
            .patch(format!("{}{id}", self.equipment_url()))
            .bearer_auth(token)
            .json(patch)
            .send()
            .await?;
        Self::classify(response).await
    }
}
