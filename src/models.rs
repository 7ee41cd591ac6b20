//! Records shared by the library, the reconciler and the HTTP API.
//!
//! Field names serialize in camelCase so the JSON matches what the web
//! frontend already reads (`youtubeId`, `categoryId`, ...).

use serde::{Deserialize, Serialize};

/// One curated video reference.
///
/// Only identifiers and curation data are stored. Titles and creator names are
/// looked up from YouTube when a client asks for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: String,
    pub youtube_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    pub category_id: String,
    #[serde(default)]
    pub pitch: String,
    /// Ingestion time, milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Upstream publish time, milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<i64>,
    #[serde(default)]
    pub avg_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_by: Option<String>,
}

/// Everything needed to create a [`Program`]; the library assigns `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProgram {
    pub youtube_id: String,
    pub channel_id: Option<String>,
    pub category_id: String,
    pub pitch: String,
    pub created_at: i64,
    pub published_at: Option<i64>,
    pub avg_score: f64,
    pub added_by: Option<String>,
}

/// Editable subset of a program.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramPatch {
    pub pitch: Option<String>,
    pub category_id: Option<String>,
}

/// A channel the reconciler keeps in sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedChannel {
    pub channel_id: String,
    pub category_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Handle the channel was registered with (`@NotaBene`), informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    pub added_at: i64,
}

/// User-created category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub icon: String,
    pub created_at: i64,
}

/// Category as exposed to clients: either built in or a custom theme.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub label: String,
    pub icon: String,
    pub builtin: bool,
}

/// Built-in rows, `(id, label, icon)`.
pub const BUILTIN_CATEGORIES: &[(&str, &str, &str)] = &[
    ("ia", "IA", "cpu"),
    ("lecture", "Lecture", "book-open"),
    ("foot", "Football", "trophy"),
    ("interviews", "Interviews", "mic"),
];

pub fn builtin_categories() -> Vec<Category> {
    BUILTIN_CATEGORIES
        .iter()
        .map(|(id, label, icon)| Category {
            id: (*id).to_string(),
            label: (*label).to_string(),
            icon: (*icon).to_string(),
            builtin: true,
        })
        .collect()
}

pub fn is_builtin_category(id: &str) -> bool {
    BUILTIN_CATEGORIES.iter().any(|(builtin, _, _)| *builtin == id)
}

/// Whether `id` names a built-in category or one of the given themes.
pub fn category_exists(id: &str, themes: &[Theme]) -> bool {
    is_builtin_category(id) || themes.iter().any(|theme| theme.id == id)
}

/// One entry of a channel's upload list, most recent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub video_id: String,
    pub published_at: Option<i64>,
}

/// Read-time metadata for a stored program; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    pub youtube_id: String,
    pub title: String,
    pub creator_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<i64>,
    pub duration_secs: u64,
    pub duration_text: String,
}
