//! Bluesky XRPC wire types.
//!
//! Only the fields the agent reads are modelled; everything else in the
//! lexicon responses is ignored by serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aura_types::social::{
    Facet, FacetFeature, Interaction, InteractionSource, NotificationReason, Post, PostRef,
    ReplyTarget,
};

pub const POST_COLLECTION: &str = "app.bsky.feed.post";

#[derive(Debug, Serialize)]
pub struct CreateSessionRequest<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub access_jwt: String,
    pub handle: String,
    pub did: String,
}

/// XRPC error body: `{"error": "...", "message": "..."}`.
#[derive(Debug, Default, Deserialize)]
pub struct XrpcErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrongRefWire {
    pub uri: String,
    pub cid: String,
}

impl From<StrongRefWire> for PostRef {
    fn from(wire: StrongRefWire) -> Self {
        PostRef {
            uri: wire.uri,
            cid: wire.cid,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyRefWire {
    pub root: StrongRefWire,
}

/// `app.bsky.feed.post` record as returned inside views.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecordWire {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub reply: Option<ReplyRefWire>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorWire {
    pub did: String,
    pub handle: String,
}

/// `app.bsky.feed.defs#postView`.
#[derive(Debug, Clone, Deserialize)]
pub struct PostViewWire {
    pub uri: String,
    pub cid: String,
    pub author: AuthorWire,
    #[serde(default)]
    pub record: PostRecordWire,
}

fn parse_created_at(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn to_post(uri: String, cid: String, author: AuthorWire, record: PostRecordWire) -> Post {
    Post {
        uri,
        cid,
        author_handle: author.handle,
        author_did: author.did,
        created_at: parse_created_at(record.created_at.as_deref()),
        reply_root: record.reply.map(|r| r.root.into()),
        text: record.text,
    }
}

impl From<PostViewWire> for Post {
    fn from(view: PostViewWire) -> Self {
        to_post(view.uri, view.cid, view.author, view.record)
    }
}

#[derive(Debug, Deserialize)]
pub struct NotificationWire {
    pub uri: String,
    pub cid: String,
    pub author: AuthorWire,
    pub reason: String,
    #[serde(default)]
    pub record: PostRecordWire,
}

impl From<NotificationWire> for Interaction {
    fn from(wire: NotificationWire) -> Self {
        Interaction {
            source: InteractionSource::Notification {
                reason: NotificationReason::parse(&wire.reason),
            },
            post: to_post(wire.uri, wire.cid, wire.author, wire.record),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListNotificationsResponse {
    pub notifications: Vec<NotificationWire>,
}

#[derive(Debug, Deserialize)]
pub struct SearchPostsResponse {
    pub posts: Vec<PostViewWire>,
}

/// `getPostThread` node. Missing or blocked parents have no `post`.
#[derive(Debug, Deserialize)]
pub struct ThreadNodeWire {
    #[serde(default)]
    pub post: Option<PostViewWire>,
    #[serde(default)]
    pub parent: Option<Box<ThreadNodeWire>>,
}

#[derive(Debug, Deserialize)]
pub struct GetPostThreadResponse {
    pub thread: ThreadNodeWire,
}

/// Walk parent links up to the root and return posts in reading order.
pub fn flatten_thread(node: ThreadNodeWire) -> Vec<Post> {
    let mut posts = Vec::new();
    let mut current = Some(node);
    while let Some(node) = current {
        if let Some(post) = node.post {
            posts.push(Post::from(post));
        }
        current = node.parent.map(|parent| *parent);
    }
    posts.reverse();
    posts
}

#[derive(Debug, Deserialize)]
pub struct ResolveHandleResponse {
    pub did: String,
}

#[derive(Debug, Serialize)]
pub struct StrongRefOut<'a> {
    pub uri: &'a str,
    pub cid: &'a str,
}

impl<'a> From<&'a PostRef> for StrongRefOut<'a> {
    fn from(r: &'a PostRef) -> Self {
        StrongRefOut { uri: &r.uri, cid: &r.cid }
    }
}

#[derive(Debug, Serialize)]
pub struct ReplyRefOut<'a> {
    pub root: StrongRefOut<'a>,
    pub parent: StrongRefOut<'a>,
}

impl<'a> From<&'a ReplyTarget> for ReplyRefOut<'a> {
    fn from(target: &'a ReplyTarget) -> Self {
        ReplyRefOut {
            root: (&target.root).into(),
            parent: (&target.parent).into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteSliceOut {
    pub byte_start: usize,
    pub byte_end: usize,
}

#[derive(Debug, Serialize)]
#[serde(tag = "$type")]
pub enum FacetFeatureOut {
    #[serde(rename = "app.bsky.richtext.facet#mention")]
    Mention { did: String },
    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link { uri: String },
}

#[derive(Debug, Serialize)]
pub struct FacetOut {
    pub index: ByteSliceOut,
    pub features: Vec<FacetFeatureOut>,
}

impl FacetOut {
    /// Wire facet for `facet`, with mentions already resolved to `did`.
    pub fn new(facet: &Facet, resolved_did: Option<String>) -> Option<Self> {
        let feature = match (&facet.feature, resolved_did) {
            (FacetFeature::Link { uri }, _) => FacetFeatureOut::Link { uri: uri.clone() },
            (FacetFeature::Mention { .. }, Some(did)) => FacetFeatureOut::Mention { did },
            (FacetFeature::Mention { .. }, None) => return None,
        };
        Some(FacetOut {
            index: ByteSliceOut {
                byte_start: facet.index.byte_start,
                byte_end: facet.index.byte_end,
            },
            features: vec![feature],
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecordOut<'a> {
    #[serde(rename = "$type")]
    pub record_type: &'static str,
    pub text: &'a str,
    pub created_at: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<FacetOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyRefOut<'a>>,
}

#[derive(Debug, Serialize)]
pub struct CreateRecordRequest<'a> {
    pub repo: &'a str,
    pub collection: &'static str,
    pub record: PostRecordOut<'a>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecordResponse {
    pub uri: String,
    pub cid: String,
}
