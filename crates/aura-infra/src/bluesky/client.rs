//! BlueskyClient -- concrete [`SocialClient`] over the AT Protocol XRPC API.
//!
//! Logs in with an app password via `com.atproto.server.createSession` and
//! keeps the access token in memory. An expired token triggers one fresh
//! login before the request is repeated.
//!
//! The app password is held as a [`SecretString`] and never logged.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use aura_core::social::{BotIdentity, SocialClient};
use aura_types::error::SocialError;
use aura_types::social::{Facet, FacetFeature, Interaction, Post, PostRef, ReplyTarget};

use super::types::{
    CreateRecordRequest, CreateRecordResponse, CreateSessionRequest, FacetOut,
    GetPostThreadResponse, ListNotificationsResponse, POST_COLLECTION, PostRecordOut,
    ResolveHandleResponse, SearchPostsResponse, SessionResponse, XrpcErrorBody, flatten_thread,
};

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
struct Session {
    access_jwt: String,
    identity: BotIdentity,
}

/// Bluesky account client.
///
/// Does NOT derive Debug so the app password and access token never end up
/// in logs.
pub struct BlueskyClient {
    http: reqwest::Client,
    service_url: String,
    identifier: String,
    password: SecretString,
    session: RwLock<Option<Session>>,
}

impl BlueskyClient {
    pub fn new(service_url: &str, identifier: &str, password: SecretString) -> Result<Self, SocialError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SocialError::Network(e.to_string()))?;

        Ok(Self {
            http,
            service_url: service_url.trim_end_matches('/').to_string(),
            identifier: identifier.to_string(),
            password,
            session: RwLock::new(None),
        })
    }

    fn url(&self, nsid: &str) -> String {
        format!("{}/xrpc/{}", self.service_url, nsid)
    }

    /// Create a session and return the account the agent posts as.
    #[tracing::instrument(skip(self), fields(identifier = %self.identifier))]
    pub async fn login(&self) -> Result<BotIdentity, SocialError> {
        let body = CreateSessionRequest {
            identifier: &self.identifier,
            password: self.password.expose_secret(),
        };
        let response = self
            .http
            .post(self.url("com.atproto.server.createSession"))
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let session: SessionResponse = match decode(response).await {
            Ok(session) => session,
            Err(SocialError::Http { status, message }) if status == 401 || status == 400 => {
                return Err(SocialError::Auth(message));
            }
            Err(e) => return Err(e),
        };

        let identity = BotIdentity {
            handle: session.handle,
            did: session.did,
        };
        tracing::info!(handle = %identity.handle, did = %identity.did, "Logged in to Bluesky");
        *self.session.write().await = Some(Session {
            access_jwt: session.access_jwt,
            identity: identity.clone(),
        });
        Ok(identity)
    }

    async fn current_session(&self) -> Result<Session, SocialError> {
        if let Some(session) = self.session.read().await.clone() {
            return Ok(session);
        }
        self.login().await?;
        self.session
            .read()
            .await
            .clone()
            .ok_or_else(|| SocialError::Auth("no session after login".to_string()))
    }

    /// Send an authenticated XRPC call, logging in again once on an
    /// expired token.
    async fn call<Q, B, T>(&self, method: Method, nsid: &str, query: &Q, body: Option<&B>) -> Result<T, SocialError>
    where
        Q: Serialize + ?Sized,
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut relogged = false;
        loop {
            let session = self.current_session().await?;
            let mut request = self
                .http
                .request(method.clone(), self.url(nsid))
                .bearer_auth(&session.access_jwt)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await.map_err(map_transport_error)?;

            match decode(response).await {
                Err(SocialError::Auth(reason)) if !relogged => {
                    tracing::debug!(nsid, %reason, "Access token rejected; logging in again");
                    *self.session.write().await = None;
                    relogged = true;
                }
                other => return other,
            }
        }
    }

    async fn resolve_handle(&self, handle: &str) -> Result<String, SocialError> {
        let response: ResolveHandleResponse = self
            .call::<_, (), _>(
                Method::GET,
                "com.atproto.identity.resolveHandle",
                &[("handle", handle)],
                None,
            )
            .await?;
        Ok(response.did)
    }

    /// Resolve mention facets to DIDs. Unresolvable mentions are dropped.
    async fn wire_facets(&self, facets: &[Facet]) -> Vec<FacetOut> {
        let mut out = Vec::with_capacity(facets.len());
        for facet in facets {
            let did = match &facet.feature {
                FacetFeature::Mention { handle } => match self.resolve_handle(handle).await {
                    Ok(did) => Some(did),
                    Err(e) => {
                        tracing::warn!(handle = %handle, error = %e, "Could not resolve mentioned handle");
                        None
                    }
                },
                FacetFeature::Link { .. } => None,
            };
            out.extend(FacetOut::new(facet, did));
        }
        out
    }
}

fn map_transport_error(err: reqwest::Error) -> SocialError {
    SocialError::Network(err.to_string())
}

/// Map a non-success XRPC status and error body to a [`SocialError`].
pub(crate) fn map_status(status: StatusCode, body: &str) -> SocialError {
    let parsed: XrpcErrorBody = serde_json::from_str(body).unwrap_or_default();
    let error = parsed.error.unwrap_or_default();
    let message = parsed.message.unwrap_or_else(|| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED => SocialError::Auth(if error.is_empty() { message } else { error }),
        StatusCode::TOO_MANY_REQUESTS => SocialError::RateLimited,
        StatusCode::BAD_REQUEST if error == "ExpiredToken" || error == "InvalidToken" => SocialError::Auth(error),
        StatusCode::BAD_REQUEST if error == "NotFound" => SocialError::NotFound(message),
        StatusCode::NOT_FOUND => SocialError::NotFound(message),
        _ => SocialError::Http {
            status: status.as_u16(),
            message,
        },
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SocialError> {
    let status = response.status();
    let body = response.text().await.map_err(map_transport_error)?;
    if !status.is_success() {
        return Err(map_status(status, &body));
    }
    serde_json::from_str(&body).map_err(|e| SocialError::Decode(e.to_string()))
}

impl SocialClient for BlueskyClient {
    #[tracing::instrument(skip(self))]
    async fn fetch_notifications(&self, limit: u32) -> Result<Vec<Interaction>, SocialError> {
        let response: ListNotificationsResponse = self
            .call::<_, (), _>(
                Method::GET,
                "app.bsky.notification.listNotifications",
                &[("limit", limit.to_string())],
                None,
            )
            .await?;

        // The API lists newest first.
        let mut interactions: Vec<Interaction> =
            response.notifications.into_iter().map(Interaction::from).collect();
        interactions.reverse();
        tracing::debug!(count = interactions.len(), "Fetched notifications");
        Ok(interactions)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_thread(&self, uri: &str) -> Result<Vec<Post>, SocialError> {
        let response: GetPostThreadResponse = self
            .call::<_, (), _>(
                Method::GET,
                "app.bsky.feed.getPostThread",
                &[("uri", uri), ("depth", "0")],
                None,
            )
            .await?;
        let posts = flatten_thread(response.thread);
        tracing::debug!(depth = posts.len(), "Fetched thread");
        Ok(posts)
    }

    #[tracing::instrument(skip(self))]
    async fn search(&self, term: &str, limit: u32) -> Result<Vec<Post>, SocialError> {
        let limit = limit.to_string();
        let response: SearchPostsResponse = self
            .call::<_, (), _>(
                Method::GET,
                "app.bsky.feed.searchPosts",
                &[("q", term), ("limit", limit.as_str()), ("sort", "latest")],
                None,
            )
            .await?;
        tracing::debug!(count = response.posts.len(), "Search returned posts");
        Ok(response.posts.into_iter().map(Post::from).collect())
    }

    #[tracing::instrument(skip(self, text, facets), fields(reply = reply_to.is_some(), chars = text.chars().count()))]
    async fn publish(
        &self,
        reply_to: Option<&ReplyTarget>,
        text: &str,
        facets: &[Facet],
    ) -> Result<PostRef, SocialError> {
        let session = self.current_session().await?;
        let request = CreateRecordRequest {
            repo: &session.identity.did,
            collection: POST_COLLECTION,
            record: PostRecordOut {
                record_type: POST_COLLECTION,
                text,
                created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                facets: self.wire_facets(facets).await,
                reply: reply_to.map(Into::into),
            },
        };

        let response: CreateRecordResponse = self
            .call::<[(&str, &str)], _, _>(Method::POST, "com.atproto.repo.createRecord", &[], Some(&request))
            .await?;
        tracing::info!(uri = %response.uri, "Published post");
        Ok(PostRef {
            uri: response.uri,
            cid: response.cid,
        })
    }
}
