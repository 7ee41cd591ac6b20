#![forbid(unsafe_code)]

//! Axum backend for the TubeProg grid.
//!
//! Serves the curated programs, the watched channel registry and the per-owner
//! themes out of the local library, exposes the on-demand sync endpoint and
//! runs the daily channel sync in the background.

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use clap::Parser;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{signal, sync::Mutex};
use tubeprog_tools::config::{
    RuntimeOverrides, SeedChannel, SyncSettings, load_seed_channels, resolve_runtime_config,
};
use tubeprog_tools::feed::ProgramFeed;
use tubeprog_tools::library::Library;
use tubeprog_tools::logging::init_logging;
use tubeprog_tools::models::{
    Category, NewProgram, Program, ProgramPatch, Theme, VideoDetails, WatchedChannel,
    builtin_categories, category_exists,
};
use tubeprog_tools::reconcile::{Reconciler, SyncError, SyncReport, register_seed_channels};
use tubeprog_tools::schedule::DailySchedule;
use tubeprog_tools::youtube::{CatalogError, ChannelRef, YouTubeClient, parse_channel_ref};

#[derive(Debug, Parser)]
#[command(about = "Serve the TubeProg API and run the daily channel sync")]
struct BackendArgs {
    /// Library database file (TUBEPROG_DB).
    #[arg(long)]
    db: Option<PathBuf>,
    /// Application namespace inside the database (TUBEPROG_APP_ID).
    #[arg(long)]
    app_id: Option<String>,
    /// Alternative .env file.
    #[arg(long)]
    env_file: Option<PathBuf>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    host: Option<String>,
    /// Do not start the daily sync loop.
    #[arg(long)]
    no_schedule: bool,
}

fn parse_host_arg(value: &str) -> Result<IpAddr> {
    value
        .parse::<IpAddr>()
        .context("expected a valid IPv4 or IPv6 address for --host/TUBEPROG_HOST")
}

#[derive(Clone)]
struct AppState {
    library: Arc<Library>,
    catalog: Arc<YouTubeClient>,
    view: Arc<ProgramView>,
    sync: Arc<SyncJob>,
}

/// Reconciliation settings plus the lock that keeps runs from overlapping.
struct SyncJob {
    settings: SyncSettings,
    seeds: Vec<SeedChannel>,
    lock: Mutex<()>,
}

/// In-memory copy of the program list.
///
/// Filled by the program feed, dropped on every write made through the API
/// and reloaded lazily, so a client always reads its own writes.
#[derive(Default)]
struct ProgramView {
    programs: RwLock<Option<Arc<Vec<Program>>>>,
}

impl ProgramView {
    fn replace(&self, programs: Vec<Program>) {
        *self.programs.write() = Some(Arc::new(programs));
    }

    fn invalidate(&self) {
        self.programs.write().take();
    }

    async fn snapshot(&self, library: &Library) -> Result<Arc<Vec<Program>>> {
        let cached = self.programs.read().clone();
        if let Some(programs) = cached {
            return Ok(programs);
        }
        let programs = Arc::new(library.list_programs().await?);
        *self.programs.write() = Some(programs.clone());
        Ok(programs)
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("request failed: {err:#}");
        Self::internal(format!("{err:#}"))
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match &err {
            CatalogError::ChannelNotFound(_) => Self::not_found(err.to_string()),
            CatalogError::InvalidChannel(_) => Self::bad_request(err.to_string()),
            _ => {
                tracing::error!("youtube request failed: {err}");
                Self::internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = BackendArgs::parse();

    let config = resolve_runtime_config(RuntimeOverrides {
        db_path: args.db,
        app_id: args.app_id,
        port: args.port,
        host: args.host,
        env_path: args.env_file,
        ..RuntimeOverrides::default()
    })?;
    let api_key = config
        .youtube_api_key
        .clone()
        .ok_or(SyncError::MissingApiKey)?;
    let host = parse_host_arg(&config.host)?;
    let schedule = DailySchedule::parse(&config.daily_at).context("parsing SYNC_DAILY_AT")?;
    let seeds = load_seed_channels(&config.channels_file)?;

    let library = Library::open(&config.db_path, config.app_id.clone())
        .await
        .context("opening program library")?;
    tracing::info!(db = %config.db_path.display(), app_id = %config.app_id, "library ready");

    let state = AppState {
        library: Arc::new(library),
        catalog: Arc::new(YouTubeClient::new(api_key)),
        view: Arc::new(ProgramView::default()),
        sync: Arc::new(SyncJob {
            settings: config.sync.clone(),
            seeds,
            lock: Mutex::new(()),
        }),
    };

    spawn_view_refresher(state.library.clone(), state.view.clone());
    if !args.no_schedule {
        spawn_daily_sync(state.clone(), schedule);
    }

    let app = router(state);
    let addr = SocketAddr::new(host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sync", get(trigger_sync).post(trigger_sync))
        .route("/api/programs", get(list_programs).post(create_program))
        .route(
            "/api/programs/{id}",
            get(get_program).patch(update_program).delete(delete_program),
        )
        .route("/api/programs/{id}/details", get(program_details))
        .route("/api/channels", get(list_channels).post(add_channel))
        .route("/api/channels/{id}", delete(remove_channel))
        .route("/api/categories", get(list_categories))
        .route("/api/themes", post(create_theme))
        .route("/api/themes/{id}", put(rename_theme).delete(delete_theme))
        .fallback(|| async { ApiError::not_found("endpoint not found") })
        .with_state(state)
}

async fn shutdown_signal() {
    // Only graceful shutdown depends on this; ctrl-c still ends the process.
    if let Err(err) = signal::ctrl_c().await {
        tracing::warn!("failed to install Ctrl+C handler: {}", err);
    }
}

fn spawn_view_refresher(library: Arc<Library>, view: Arc<ProgramView>) {
    tokio::spawn(async move {
        let mut feed = ProgramFeed::new(library);
        loop {
            match feed.next_snapshot().await {
                Ok(programs) => {
                    tracing::debug!(programs = programs.len(), "program view refreshed");
                    view.replace(programs);
                }
                Err(err) => {
                    tracing::warn!("program feed failed: {err:#}");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    });
}

fn spawn_daily_sync(state: AppState, schedule: DailySchedule) {
    tokio::spawn(async move {
        loop {
            let wait = schedule.until_next();
            tracing::info!(
                at = %schedule.time(),
                in_secs = wait.as_secs(),
                "next channel sync scheduled"
            );
            tokio::time::sleep(wait).await;
            match run_sync(&state, None).await {
                Ok(report) => tracing::info!("{}", report.message()),
                Err(err) => tracing::error!("scheduled channel sync failed: {err}"),
            }
        }
    });
}

/// One reconciliation pass. Runs inside this process never overlap.
async fn run_sync(state: &AppState, only_channel: Option<String>) -> Result<SyncReport, SyncError> {
    let _running = state.sync.lock.lock().await;
    if only_channel.is_none() {
        register_seed_channels(&*state.library, &*state.catalog, &state.sync.seeds).await;
    }
    let report = Reconciler::new(&*state.library, &*state.catalog, state.sync.settings.clone())
        .only_channel(only_channel)
        .run()
        .await?;
    state.view.invalidate();
    Ok(report)
}

#[derive(Debug, Serialize)]
struct SyncResponse {
    success: bool,
    message: String,
    inserted: usize,
    deleted: usize,
}

async fn trigger_sync(State(state): State<AppState>) -> Response {
    match run_sync(&state, None).await {
        Ok(report) => Json(SyncResponse {
            success: true,
            message: report.message(),
            inserted: report.inserted,
            deleted: report.deleted,
        })
        .into_response(),
        Err(err) => {
            tracing::error!("channel sync failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

/// Built-in categories are valid for everyone; themes only for their owner.
/// An unknown category is logged and the write goes through.
async fn warn_unknown_category(state: &AppState, category: &str, owner: Option<&str>) -> ApiResult<()> {
    let themes = match owner {
        Some(owner) => state.library.list_themes(owner).await?,
        None => Vec::new(),
    };
    if !category_exists(category, &themes) {
        tracing::warn!(category, owner = owner.unwrap_or("-"), "unknown category");
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct ProgramQuery {
    category: Option<String>,
}

async fn list_programs(
    State(state): State<AppState>,
    Query(query): Query<ProgramQuery>,
) -> ApiResult<Json<Vec<Program>>> {
    let programs = state.view.snapshot(&state.library).await?;
    let filtered = programs
        .iter()
        .filter(|program| {
            query
                .category
                .as_deref()
                .is_none_or(|category| program.category_id == category)
        })
        .cloned()
        .collect();
    Ok(Json(filtered))
}

async fn get_program(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<Program>> {
    state
        .library
        .get_program(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("program not found"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateProgramRequest {
    youtube_id: String,
    category_id: String,
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    pitch: Option<String>,
    #[serde(default)]
    added_by: Option<String>,
}

async fn create_program(
    State(state): State<AppState>,
    Json(payload): Json<CreateProgramRequest>,
) -> ApiResult<(StatusCode, Json<Program>)> {
    let youtube_id = payload.youtube_id.trim();
    if youtube_id.is_empty() {
        return Err(ApiError::bad_request("youtubeId is required"));
    }
    warn_unknown_category(&state, &payload.category_id, payload.added_by.as_deref()).await?;

    let new = NewProgram {
        youtube_id: youtube_id.to_string(),
        channel_id: payload.channel_id.filter(|id| !id.trim().is_empty()),
        category_id: payload.category_id,
        pitch: payload.pitch.unwrap_or_default(),
        created_at: chrono::Utc::now().timestamp_millis(),
        published_at: None,
        avg_score: 0.0,
        added_by: payload.added_by,
    };
    let stored = state
        .library
        .insert_program(new)
        .await?
        .ok_or_else(|| ApiError::conflict(format!("{youtube_id} is already in the grid")))?;
    state.view.invalidate();
    tracing::info!(program = %stored.id, video = %stored.youtube_id, "program added");
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn update_program(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(patch): Json<ProgramPatch>,
) -> ApiResult<Json<Program>> {
    let existing = state
        .library
        .get_program(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("program not found"))?;
    if let Some(category) = patch.category_id.as_deref() {
        warn_unknown_category(&state, category, existing.added_by.as_deref()).await?;
    }
    let updated = state
        .library
        .update_program(&id, &patch)
        .await?
        .ok_or_else(|| ApiError::not_found("program not found"))?;
    state.view.invalidate();
    Ok(Json(updated))
}

async fn delete_program(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<StatusCode> {
    if !state.library.delete_program(&id).await? {
        return Err(ApiError::not_found("program not found"));
    }
    state.view.invalidate();
    Ok(StatusCode::NO_CONTENT)
}

/// Title, creator and duration are looked up on demand and never stored.
async fn program_details(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<VideoDetails>> {
    let program = state
        .library
        .get_program(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("program not found"))?;
    let details = state
        .catalog
        .video_details(std::slice::from_ref(&program.youtube_id))
        .await?;
    details
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("video is no longer available on YouTube"))
}

async fn list_channels(State(state): State<AppState>) -> ApiResult<Json<Vec<WatchedChannel>>> {
    Ok(Json(state.library.list_watched_channels().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddChannelRequest {
    /// Handle, channel URL or `UC...` id.
    channel: String,
    category_id: String,
    #[serde(default)]
    owner_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddChannelResponse {
    channel: WatchedChannel,
    sync: SyncReport,
}

async fn add_channel(
    State(state): State<AppState>,
    Json(payload): Json<AddChannelRequest>,
) -> ApiResult<(StatusCode, Json<AddChannelResponse>)> {
    let reference = payload.channel.trim();
    if reference.is_empty() {
        return Err(ApiError::bad_request("channel is required"));
    }
    warn_unknown_category(&state, &payload.category_id, payload.owner_id.as_deref()).await?;

    let channel_id = state.catalog.resolve_channel_id(reference).await?;
    let handle = match parse_channel_ref(reference) {
        ChannelRef::Handle(handle) => Some(handle),
        ChannelRef::Id(_) => None,
    };
    let channel = WatchedChannel {
        channel_id: channel_id.clone(),
        category_id: payload.category_id,
        owner_id: payload.owner_id,
        handle,
        added_at: chrono::Utc::now().timestamp_millis(),
    };
    state.library.upsert_watched_channel(&channel).await?;
    tracing::info!(channel = %channel_id, "channel registered");

    let sync = run_sync(&state, Some(channel_id))
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;
    Ok((StatusCode::CREATED, Json(AddChannelResponse { channel, sync })))
}

#[derive(Debug, Default, Deserialize)]
struct RemoveChannelQuery {
    #[serde(default)]
    purge: bool,
}

async fn remove_channel(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<RemoveChannelQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let removed = state.library.remove_watched_channel(&id, query.purge).await?;
    if !removed.was_registered && removed.programs_deleted == 0 && removed.programs_kept == 0 {
        return Err(ApiError::not_found("channel not found"));
    }
    if removed.programs_deleted > 0 {
        state.view.invalidate();
    }
    // Kept programs still put the channel on the sync list.
    Ok(Json(json!({
        "channelId": id,
        "programsDeleted": removed.programs_deleted,
        "stillSynced": removed.programs_kept > 0,
    })))
}

#[derive(Debug, Default, Deserialize)]
struct OwnerQuery {
    owner: Option<String>,
}

async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<Vec<Category>>> {
    let mut categories = builtin_categories();
    if let Some(owner) = query.owner.as_deref() {
        let themes = state.library.list_themes(owner).await?;
        categories.extend(themes.into_iter().map(|theme| Category {
            id: theme.id,
            label: theme.name,
            icon: theme.icon,
            builtin: false,
        }));
    }
    Ok(Json(categories))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateThemeRequest {
    owner_id: String,
    name: String,
    #[serde(default)]
    icon: Option<String>,
}

async fn create_theme(
    State(state): State<AppState>,
    Json(payload): Json<CreateThemeRequest>,
) -> ApiResult<(StatusCode, Json<Theme>)> {
    let owner = payload.owner_id.trim();
    let name = payload.name.trim();
    if owner.is_empty() || name.is_empty() {
        return Err(ApiError::bad_request("ownerId and name are required"));
    }
    let icon = payload.icon.as_deref().unwrap_or("star");
    let theme = state.library.create_theme(owner, name, icon).await?;
    Ok((StatusCode::CREATED, Json(theme)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameThemeRequest {
    owner_id: String,
    name: String,
}

async fn rename_theme(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(payload): Json<RenameThemeRequest>,
) -> ApiResult<Json<Theme>> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    state
        .library
        .rename_theme(&id, &payload.owner_id, name)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("theme not found"))
}

async fn delete_theme(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<StatusCode> {
    let owner = query
        .owner
        .ok_or_else(|| ApiError::bad_request("owner is required"))?;
    let programs = state.view.snapshot(&state.library).await?;
    if programs.iter().any(|program| program.category_id == id) {
        return Err(ApiError::conflict("theme still has programs"));
    }
    if !state.library.delete_theme(&id, &owner).await? {
        return Err(ApiError::not_found("theme not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;
    use std::collections::HashMap;
    use tempfile::tempdir;

    struct BackendTestContext {
        _temp: tempfile::TempDir,
        state: AppState,
    }

    impl BackendTestContext {
        async fn new(catalog: YouTubeClient) -> Self {
            let temp = tempdir().unwrap();
            let library = Library::open(&temp.path().join("tubeprog.db"), "test-app")
                .await
                .unwrap();
            Self {
                state: AppState {
                    library: Arc::new(library),
                    catalog: Arc::new(catalog),
                    view: Arc::new(ProgramView::default()),
                    sync: Arc::new(SyncJob {
                        settings: SyncSettings::default(),
                        seeds: Vec::new(),
                        lock: Mutex::new(()),
                    }),
                },
                _temp: temp,
            }
        }

        async fn offline() -> Self {
            // Nothing listens on port 9; catalog calls fail fast.
            let catalog = YouTubeClient::new("test-key")
                .with_base_url("http://127.0.0.1:9")
                .with_timeout(Duration::from_secs(2));
            Self::new(catalog).await
        }
    }

    /// Local stand-in for the YouTube Data API with one known channel.
    async fn fake_youtube(uploads: &'static [&'static str]) -> YouTubeClient {
        let app = Router::new()
            .route(
                "/channels",
                get(|Query(query): Query<HashMap<String, String>>| async move {
                    match query.get("forHandle").map(String::as_str) {
                        Some("@Talks") => Json(json!({"items": [{"id": "UCtalks"}]})),
                        _ => Json(json!({"items": []})),
                    }
                }),
            )
            .route(
                "/playlistItems",
                get(move || async move {
                    let items: Vec<Value> = uploads
                        .iter()
                        .map(|id| json!({"contentDetails": {"videoId": id, "videoPublishedAt": "2024-05-01T08:00:00Z"}}))
                        .collect();
                    Json(json!({ "items": items }))
                }),
            )
            .route(
                "/videos",
                get(|Query(query): Query<HashMap<String, String>>| async move {
                    let items: Vec<Value> = query["id"]
                        .split(',')
                        .map(|id| {
                            json!({
                                "id": id,
                                "snippet": {"title": format!("Episode {id}"), "channelTitle": "Talks", "publishedAt": "2024-05-01T08:00:00Z"},
                                "contentDetails": {"duration": "PT10M"}
                            })
                        })
                        .collect();
                    Json(json!({ "items": items }))
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        YouTubeClient::new("test-key").with_base_url(format!("http://{addr}"))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn create_request(youtube_id: &str, category: &str) -> CreateProgramRequest {
        CreateProgramRequest {
            youtube_id: youtube_id.into(),
            category_id: category.into(),
            channel_id: None,
            pitch: Some("Worth a watch".into()),
            added_by: None,
        }
    }

    #[test]
    fn parses_backend_flags() {
        let args = BackendArgs::try_parse_from([
            "backend",
            "--db",
            "/tmp/grid.db",
            "--port",
            "8080",
            "--no-schedule",
        ])
        .unwrap();
        assert_eq!(args.db, Some(PathBuf::from("/tmp/grid.db")));
        assert_eq!(args.port, Some(8080));
        assert!(args.no_schedule);
        assert!(BackendArgs::try_parse_from(["backend", "--port", "nope"]).is_err());
    }

    #[tokio::test]
    async fn api_error_renders_json_body() {
        let response = ApiError::conflict("taken").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await, json!({"error": "taken"}));
    }

    #[tokio::test]
    async fn program_crud_round_trip() {
        let ctx = BackendTestContext::offline().await;

        let (status, Json(created)) =
            create_program(State(ctx.state.clone()), Json(create_request("abc123", "ia")))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.pitch, "Worth a watch");

        let Json(listed) = list_programs(State(ctx.state.clone()), Query(ProgramQuery::default()))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);

        let Json(updated) = update_program(
            State(ctx.state.clone()),
            AxumPath(created.id.clone()),
            Json(ProgramPatch {
                pitch: None,
                category_id: Some("lecture".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated.category_id, "lecture");
        assert_eq!(updated.pitch, "Worth a watch");

        let Json(filtered) = list_programs(
            State(ctx.state.clone()),
            Query(ProgramQuery {
                category: Some("ia".into()),
            }),
        )
        .await
        .unwrap();
        assert!(filtered.is_empty());

        let status = delete_program(State(ctx.state.clone()), AxumPath(created.id.clone()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        let err = delete_program(State(ctx.state.clone()), AxumPath(created.id))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_and_blank_programs_are_rejected() {
        let ctx = BackendTestContext::offline().await;
        create_program(State(ctx.state.clone()), Json(create_request("dup", "foot")))
            .await
            .unwrap();

        let err = create_program(State(ctx.state.clone()), Json(create_request("dup", "ia")))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);


        let err = create_program(State(ctx.state.clone()), Json(create_request("  ", "ia")))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_category_is_accepted() {
        let ctx = BackendTestContext::offline().await;

        let (status, Json(created)) =
            create_program(State(ctx.state.clone()), Json(create_request("new", "cooking")))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.category_id, "cooking");

        let Json(updated) = update_program(
            State(ctx.state.clone()),
            AxumPath(created.id.clone()),
            Json(ProgramPatch {
                pitch: None,
                category_id: Some("gardening".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated.category_id, "gardening");

        let stored = ctx.state.library.get_program(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.category_id, "gardening");
    }

    #[tokio::test]
    async fn removing_a_derived_channel_reports_it_is_still_synced() {
        let ctx = BackendTestContext::offline().await;
        let mut request = create_request("derived1", "ia");
        request.channel_id = Some("UCderived".into());
        create_program(State(ctx.state.clone()), Json(request)).await.unwrap();

        let Json(removed) = remove_channel(
            State(ctx.state.clone()),
            AxumPath("UCderived".into()),
            Query(RemoveChannelQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(removed["programsDeleted"], json!(0));
        assert_eq!(removed["stillSynced"], json!(true));

        let err = remove_channel(
            State(ctx.state.clone()),
            AxumPath("UCunknown".into()),
            Query(RemoveChannelQuery::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn themes_extend_owner_categories() {
        let ctx = BackendTestContext::offline().await;
        let (_, Json(theme)) = create_theme(
            State(ctx.state.clone()),
            Json(CreateThemeRequest {
                owner_id: "owner-1".into(),
                name: "Cuisine".into(),
                icon: None,
            }),
        )
        .await
        .unwrap();

        let Json(categories) = list_categories(
            State(ctx.state.clone()),
            Query(OwnerQuery {
                owner: Some("owner-1".into()),
            }),
        )
        .await
        .unwrap();
        assert!(categories.iter().any(|c| c.id == theme.id && !c.builtin));

        let Json(anonymous) = list_categories(State(ctx.state.clone()), Query(OwnerQuery::default()))
            .await
            .unwrap();
        assert!(anonymous.iter().all(|c| c.builtin));

        let mut request = create_request("cook1", &theme.id);
        request.added_by = Some("owner-1".into());
        create_program(State(ctx.state.clone()), Json(request)).await.unwrap();

        let err = delete_theme(
            State(ctx.state.clone()),
            AxumPath(theme.id.clone()),
            Query(OwnerQuery {
                owner: Some("owner-1".into()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let Json(renamed) = rename_theme(
            State(ctx.state.clone()),
            AxumPath(theme.id.clone()),
            Json(RenameThemeRequest {
                owner_id: "owner-1".into(),
                name: "Recettes".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(renamed.name, "Recettes");
    }

    #[tokio::test]
    async fn sync_endpoint_reports_counts() {
        let ctx = BackendTestContext::new(fake_youtube(&["a", "b", "c", "d", "e", "f"]).await).await;
        ctx.state
            .library
            .upsert_watched_channel(&WatchedChannel {
                channel_id: "UCtalks".into(),
                category_id: "interviews".into(),
                owner_id: None,
                handle: Some("@Talks".into()),
                added_at: 1,
            })
            .await
            .unwrap();

        let response = trigger_sync(State(ctx.state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["inserted"], json!(5));
        assert_eq!(body["deleted"], json!(0));

        let body = body_json(trigger_sync(State(ctx.state.clone())).await).await;
        assert_eq!(body["inserted"], json!(0));

        let Json(programs) = list_programs(State(ctx.state.clone()), Query(ProgramQuery::default()))
            .await
            .unwrap();
        assert_eq!(programs.len(), 5);
        assert!(programs.iter().all(|p| p.published_at.is_some()));
    }

    #[tokio::test]
    async fn adding_a_channel_registers_and_syncs_it() {
        let ctx = BackendTestContext::new(fake_youtube(&["x", "y"]).await).await;

        let (status, Json(response)) = add_channel(
            State(ctx.state.clone()),
            Json(AddChannelRequest {
                channel: "https://www.youtube.com/@Talks/videos".into(),
                category_id: "interviews".into(),
                owner_id: Some("owner-1".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(response.channel.channel_id, "UCtalks");
        assert_eq!(response.sync.inserted, 2);

        let Json(channels) = list_channels(State(ctx.state.clone())).await.unwrap();
        assert_eq!(channels.len(), 1);

        let err = add_channel(
            State(ctx.state.clone()),
            Json(AddChannelRequest {
                channel: "@Nobody".into(),
                category_id: "ia".into(),
                owner_id: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let Json(removed) = remove_channel(
            State(ctx.state.clone()),
            AxumPath("UCtalks".into()),
            Query(RemoveChannelQuery { purge: true }),
        )
        .await
        .unwrap();
        assert_eq!(removed["programsDeleted"], json!(2));
        assert!(
            ctx.state.library.list_programs().await.unwrap().is_empty(),
            "purge removes the channel's programs"
        );
    }

    #[tokio::test]
    async fn unreachable_youtube_is_an_internal_error() {
        let ctx = BackendTestContext::offline().await;
        let (_, Json(created)) =
            create_program(State(ctx.state.clone()), Json(create_request("vid7", "ia")))
                .await
                .unwrap();

        let err = program_details(State(ctx.state.clone()), AxumPath(created.id))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);

        let err = program_details(State(ctx.state.clone()), AxumPath("missing".into()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn details_are_hydrated_from_youtube() {
        let ctx = BackendTestContext::new(fake_youtube(&[]).await).await;
        let (_, Json(created)) =
            create_program(State(ctx.state.clone()), Json(create_request("vid42", "lecture")))
                .await
                .unwrap();

        let Json(details) = program_details(State(ctx.state.clone()), AxumPath(created.id))
            .await
            .unwrap();
        assert_eq!(details.title, "Episode vid42");
        assert_eq!(details.creator_name, "Talks");
        assert_eq!(details.duration_text, "10:00");
    }
}
