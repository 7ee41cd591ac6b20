//! YouTube Data API v3 client.
//!
//! Requests go through a blocking `ureq` agent on tokio's blocking pool, so
//! callers stay async without pulling a second HTTP stack. Only the handful
//! of endpoints the sync needs are covered: channel lookup by handle, the
//! uploads playlist, and batched video lookups.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::duration::{format_duration, parse_duration_secs};
use crate::models::{Upload, VideoDetails};
use crate::reconcile::VideoCatalog;

pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
/// `videos?id=` accepts at most this many ids per call.
const MAX_IDS_PER_REQUEST: usize = 50;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("YouTube API returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("YouTube API error: {0}")]
    Api(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("reading response body failed: {0}")]
    Body(#[from] std::io::Error),

    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("not a channel id: {0}")]
    InvalidChannel(String),

    #[error("background request task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// How a user referred to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    /// Stable `UC...` id, usable as is.
    Id(String),
    /// `@handle` that needs a lookup.
    Handle(String),
}

/// Accepts `UC...` ids, `@handles`, bare handles and channel URLs
/// (`https://www.youtube.com/@name`, `.../channel/UC...`).
pub fn parse_channel_ref(reference: &str) -> ChannelRef {
    let trimmed = reference.trim();
    let without_query = trimmed.split(['?', '#']).next().unwrap_or(trimmed);
    let path = match without_query.find("youtube.com/") {
        Some(index) => &without_query[index + "youtube.com/".len()..],
        None => without_query,
    };
    let path = path.strip_prefix("channel/").unwrap_or(path);
    let path = path.split('/').next().unwrap_or(path);

    if path.starts_with("UC") {
        ChannelRef::Id(path.to_string())
    } else if path.starts_with('@') {
        ChannelRef::Handle(path.to_string())
    } else {
        ChannelRef::Handle(format!("@{path}"))
    }
}

/// Every channel `UC...` has an auto-generated uploads playlist `UU...`.
pub fn uploads_playlist_id(channel_id: &str) -> Option<String> {
    channel_id
        .strip_prefix("UC")
        .filter(|rest| !rest.is_empty())
        .map(|rest| format!("UU{rest}"))
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemDetails {
    video_id: String,
    #[serde(default)]
    video_published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    #[serde(default)]
    snippet: Option<VideoSnippet>,
    #[serde(default)]
    content_details: Option<VideoContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    #[serde(default)]
    duration: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Extracts `error.message` from a Google API error body.
fn api_error_message(body: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    envelope.error.map(|error| error.message)
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, CatalogError> {
    if let Some(message) = api_error_message(body) {
        return Err(CatalogError::Api(message));
    }
    Ok(serde_json::from_str(body)?)
}

fn rfc3339_to_millis(value: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|date| date.timestamp_millis())
}

fn playlist_items_to_uploads(items: Vec<PlaylistItem>) -> Vec<Upload> {
    items
        .into_iter()
        .map(|item| Upload {
            published_at: item
                .content_details
                .video_published_at
                .as_deref()
                .and_then(rfc3339_to_millis),
            video_id: item.content_details.video_id,
        })
        .filter(|upload| !upload.video_id.is_empty())
        .collect()
}

fn video_item_to_details(item: VideoItem) -> VideoDetails {
    let duration_secs = item
        .content_details
        .as_ref()
        .map(|details| parse_duration_secs(&details.duration))
        .unwrap_or(0);
    let snippet = item.snippet;
    VideoDetails {
        title: snippet
            .as_ref()
            .map(|s| s.title.clone())
            .unwrap_or_default(),
        creator_name: snippet
            .as_ref()
            .map(|s| s.channel_title.clone())
            .unwrap_or_default(),
        published_at: snippet
            .as_ref()
            .and_then(|s| s.published_at.as_deref())
            .and_then(rfc3339_to_millis),
        duration_secs,
        duration_text: format_duration(duration_secs),
        youtube_id: item.id,
    }
}

/// Blocking GET returning the decoded JSON body. Non-2xx statuses carry the
/// API's own error message when the body has one.
fn fetch_json<T: DeserializeOwned>(
    agent: &ureq::Agent,
    url: &str,
    api_key: &str,
    query: &[(&str, String)],
) -> Result<T, CatalogError> {
    let mut request = agent.get(url).query("key", api_key);
    for (name, value) in query {
        request = request.query(name, value);
    }

    match request.call() {
        Ok(response) => {
            let body = response.into_string()?;
            parse_body(&body)
        }
        Err(ureq::Error::Status(status, response)) => {
            let body = response.into_string().unwrap_or_default();
            let message = api_error_message(&body).unwrap_or(body);
            Err(CatalogError::Status { status, message })
        }
        Err(ureq::Error::Transport(transport)) => {
            Err(CatalogError::Transport(transport.to_string()))
        }
    }
}

/// Explicitly constructed API handle; cheap to clone.
#[derive(Clone)]
pub struct YouTubeClient {
    agent: ureq::Agent,
    api_key: String,
    base_url: String,
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(concat!("tubeprog-tools/", env!("CARGO_PKG_VERSION")))
        .build()
}

impl YouTubeClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            agent: build_agent(REQUEST_TIMEOUT),
            api_key: api_key.into(),
            base_url: YOUTUBE_API_BASE.to_string(),
        }
    }

    /// Points the client at another API root (proxy, local fake).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Overall per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    async fn get<T>(&self, endpoint: &str, query: Vec<(&'static str, String)>) -> Result<T, CatalogError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let agent = self.agent.clone();
        let api_key = self.api_key.clone();
        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::debug!(%url, "youtube request");
        tokio::task::spawn_blocking(move || fetch_json(&agent, &url, &api_key, &query)).await?
    }

    async fn videos(&self, video_ids: &[String], part: &str) -> Result<Vec<VideoItem>, CatalogError> {
        let mut items = Vec::new();
        for chunk in video_ids.chunks(MAX_IDS_PER_REQUEST) {
            let response: ListResponse<VideoItem> = self
                .get(
                    "videos",
                    vec![("part", part.to_string()), ("id", chunk.join(","))],
                )
                .await?;
            items.extend(response.items);
        }
        Ok(items)
    }

    /// Resolves a handle, URL or id to a `UC...` channel id.
    pub async fn resolve_channel_id(&self, reference: &str) -> Result<String, CatalogError> {
        let handle = match parse_channel_ref(reference) {
            ChannelRef::Id(id) => return Ok(id),
            ChannelRef::Handle(handle) => handle,
        };
        let response: ListResponse<ChannelItem> = self
            .get(
                "channels",
                vec![("part", "id".to_string()), ("forHandle", handle.clone())],
            )
            .await?;
        response
            .items
            .into_iter()
            .next()
            .map(|item| item.id)
            .ok_or(CatalogError::ChannelNotFound(handle))
    }

    /// Most recent uploads of a channel, newest first.
    pub async fn channel_uploads(
        &self,
        channel_id: &str,
        max_results: u32,
    ) -> Result<Vec<Upload>, CatalogError> {
        let playlist = uploads_playlist_id(channel_id)
            .ok_or_else(|| CatalogError::InvalidChannel(channel_id.to_string()))?;
        let response: ListResponse<PlaylistItem> = self
            .get(
                "playlistItems",
                vec![
                    ("part", "contentDetails".to_string()),
                    ("playlistId", playlist),
                    ("maxResults", max_results.clamp(1, 50).to_string()),
                ],
            )
            .await?;
        Ok(playlist_items_to_uploads(response.items))
    }

    /// Raw ISO-8601 durations keyed by video id. Ids the API does not know
    /// are simply absent from the map.
    pub async fn video_durations(
        &self,
        video_ids: &[String],
    ) -> Result<HashMap<String, String>, CatalogError> {
        if video_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let items = self.videos(video_ids, "contentDetails").await?;
        Ok(items
            .into_iter()
            .filter_map(|item| item.content_details.map(|details| (item.id, details.duration)))
            .collect())
    }

    /// Title, creator and length for display. Nothing here is persisted.
    pub async fn video_details(&self, video_ids: &[String]) -> Result<Vec<VideoDetails>, CatalogError> {
        if video_ids.is_empty() {
            return Ok(Vec::new());
        }
        let items = self.videos(video_ids, "snippet,contentDetails").await?;
        Ok(items.into_iter().map(video_item_to_details).collect())
    }
}

impl VideoCatalog for YouTubeClient {
    async fn resolve_channel(&self, reference: &str) -> Result<String, CatalogError> {
        self.resolve_channel_id(reference).await
    }

    async fn latest_uploads(&self, channel_id: &str, max: u32) -> Result<Vec<Upload>, CatalogError> {
        self.channel_uploads(channel_id, max).await
    }

    async fn durations(&self, video_ids: &[String]) -> Result<HashMap<String, String>, CatalogError> {
        self.video_durations(video_ids).await
    }
}
