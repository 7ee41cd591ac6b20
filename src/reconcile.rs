//! Channel sync reconciler.
//!
//! For every watched channel the reconciler fetches the latest uploads,
//! drops short-form clips, keeps the first K survivors (the channel's
//! window) and then aligns the stored programs with that window: missing
//! videos are inserted, stored videos outside the window are deleted.
//!
//! The decision part ([`qualifying_uploads`], [`plan_channel`]) is pure. The
//! [`Reconciler`] driver performs the I/O through two injected seams,
//! [`ProgramStore`] and [`VideoCatalog`], one channel at a time.
//!
//! Runs are not transactional. A failed channel or write is recorded in the
//! [`SyncReport`] and the run moves on; running again converges.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use anyhow::Result;
use serde::Serialize;

use crate::config::{EmptyFetchPolicy, SeedChannel, SyncSettings};
use crate::duration::parse_duration_secs;
use crate::models::{NewProgram, Program, Upload, WatchedChannel};
use crate::youtube::CatalogError;

/// Storage the reconciler reads from and writes to.
pub trait ProgramStore: Sync {
    fn programs(&self) -> impl Future<Output = Result<Vec<Program>>> + Send;

    fn watched_channels(&self) -> impl Future<Output = Result<Vec<WatchedChannel>>> + Send;

    fn register_channel(
        &self,
        channel: &WatchedChannel,
    ) -> impl Future<Output = Result<()>> + Send;

    /// `Ok(None)` when a program with the same `youtube_id` already exists.
    fn insert(&self, program: NewProgram) -> impl Future<Output = Result<Option<Program>>> + Send;

    /// `Ok(false)` when the id was already gone.
    fn delete(&self, id: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// Upstream video source.
pub trait VideoCatalog: Sync {
    fn resolve_channel(
        &self,
        reference: &str,
    ) -> impl Future<Output = Result<String, CatalogError>> + Send;

    /// Newest first, at most `max` entries.
    fn latest_uploads(
        &self,
        channel_id: &str,
        max: u32,
    ) -> impl Future<Output = Result<Vec<Upload>, CatalogError>> + Send;

    /// ISO-8601 durations keyed by video id; unknown ids are absent.
    fn durations(
        &self,
        video_ids: &[String],
    ) -> impl Future<Output = Result<HashMap<String, String>, CatalogError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("YOUTUBE_API_KEY is not set; channel sync needs YouTube API credentials")]
    MissingApiKey,

    #[error("loading stored programs failed: {0:#}")]
    LoadState(anyhow::Error),
}

/// Why a channel was left untouched during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    UploadsUnavailable(String),
    NoUploads,
    DurationsUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSkip {
    pub channel_id: String,
    pub reason: SkipReason,
}

/// Per-channel result: the youtube ids written or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelOutcome {
    pub channel_id: String,
    pub inserted: Vec<String>,
    pub deleted: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub dry_run: bool,
    pub channels_checked: usize,
    pub inserted: usize,
    pub deleted: usize,
    /// Inserts the store refused because the video is already stored
    /// (under another channel, or by a concurrent run).
    pub already_present: usize,
    pub channels: Vec<ChannelOutcome>,
    pub skipped: Vec<ChannelSkip>,
    pub write_failures: Vec<String>,
}

impl SyncReport {
    pub fn message(&self) -> String {
        let verb = if self.dry_run { "would be" } else { "were" };
        let mut message = format!(
            "Sync finished: {} new video(s) {verb} added and {} {verb} removed across {} channel(s).",
            self.inserted, self.deleted, self.channels_checked
        );
        if !self.skipped.is_empty() {
            message.push_str(&format!(" {} channel(s) skipped.", self.skipped.len()));
        }
        if !self.write_failures.is_empty() {
            message.push_str(&format!(" {} write(s) failed.", self.write_failures.len()));
        }
        message
    }
}

/// Decision for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelPlan {
    pub channel_id: String,
    pub inserts: Vec<NewProgram>,
    pub evictions: Vec<Program>,
}

/// First `settings.window` uploads that are long enough, in fetch order.
///
/// Uploads with no duration entry are skipped. A video listed twice counts
/// once.
pub fn qualifying_uploads<'a>(
    uploads: &'a [Upload],
    durations: &HashMap<String, String>,
    settings: &SyncSettings,
) -> Vec<&'a Upload> {
    let mut seen = HashSet::new();
    uploads
        .iter()
        .filter(|upload| {
            durations
                .get(&upload.video_id)
                .is_some_and(|raw| parse_duration_secs(raw) >= settings.min_duration_secs)
        })
        .filter(|upload| seen.insert(upload.video_id.as_str()))
        .take(settings.window)
        .collect()
}

/// Compares a channel's stored programs with its window.
pub fn plan_channel(
    channel: &WatchedChannel,
    stored: &[&Program],
    window: &[&Upload],
    now_ms: i64,
) -> ChannelPlan {
    let stored_ids: HashSet<&str> = stored
        .iter()
        .map(|program| program.youtube_id.as_str())
        .collect();
    let window_ids: HashSet<&str> = window
        .iter()
        .map(|upload| upload.video_id.as_str())
        .collect();

    let inserts = window
        .iter()
        .filter(|upload| !stored_ids.contains(upload.video_id.as_str()))
        .map(|upload| NewProgram {
            youtube_id: upload.video_id.clone(),
            channel_id: Some(channel.channel_id.clone()),
            category_id: channel.category_id.clone(),
            pitch: String::new(),
            created_at: now_ms,
            published_at: upload.published_at,
            avg_score: 0.0,
            added_by: channel.owner_id.clone(),
        })
        .collect();

    let evictions = stored
        .iter()
        .filter(|program| !window_ids.contains(program.youtube_id.as_str()))
        .map(|program| (*program).clone())
        .collect();

    ChannelPlan {
        channel_id: channel.channel_id.clone(),
        inserts,
        evictions,
    }
}

/// Registered channels first, then channels only known through stored
/// programs. A derived channel takes the category and owner of its first
/// program.
pub fn watch_list(registered: &[WatchedChannel], programs: &[Program]) -> Vec<WatchedChannel> {
    let mut seen: HashSet<&str> = registered
        .iter()
        .map(|channel| channel.channel_id.as_str())
        .collect();
    let mut channels = registered.to_vec();

    for program in programs {
        let Some(channel_id) = program.channel_id.as_deref() else {
            continue;
        };
        if channel_id.is_empty() || !seen.insert(channel_id) {
            continue;
        }
        channels.push(WatchedChannel {
            channel_id: channel_id.to_string(),
            category_id: program.category_id.clone(),
            owner_id: program.added_by.clone(),
            handle: None,
            added_at: program.created_at,
        });
    }

    channels
}

/// Resolves seed channels and registers the ones not registered yet.
/// Existing registrations are left alone. Returns how many were added.
pub async fn register_seed_channels<S, C>(store: &S, catalog: &C, seeds: &[SeedChannel]) -> usize
where
    S: ProgramStore,
    C: VideoCatalog,
{
    if seeds.is_empty() {
        return 0;
    }
    let registered: HashSet<String> = match store.watched_channels().await {
        Ok(channels) => channels.into_iter().map(|channel| channel.channel_id).collect(),
        Err(err) => {
            tracing::warn!("could not read watched channels, skipping seeds: {err:#}");
            return 0;
        }
    };

    let mut added = 0;
    for seed in seeds {
        let channel_id = match catalog.resolve_channel(&seed.handle).await {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(handle = %seed.handle, "could not resolve seed channel: {err}");
                continue;
            }
        };
        if registered.contains(&channel_id) {
            continue;
        }
        let channel = WatchedChannel {
            channel_id,
            category_id: seed.category.clone(),
            owner_id: seed.owner.clone(),
            handle: Some(seed.handle.clone()),
            added_at: chrono::Utc::now().timestamp_millis(),
        };
        match store.register_channel(&channel).await {
            Ok(()) => {
                tracing::info!(handle = %seed.handle, channel = %channel.channel_id, "registered seed channel");
                added += 1;
            }
            Err(err) => {
                tracing::warn!(handle = %seed.handle, "could not register seed channel: {err:#}");
            }
        }
    }
    added
}

/// Runs reconciliation passes against injected store and catalog handles.
pub struct Reconciler<'a, S, C> {
    store: &'a S,
    catalog: &'a C,
    settings: SyncSettings,
    dry_run: bool,
    only_channel: Option<String>,
}

impl<'a, S, C> Reconciler<'a, S, C>
where
    S: ProgramStore,
    C: VideoCatalog,
{
    pub fn new(store: &'a S, catalog: &'a C, settings: SyncSettings) -> Self {
        Self {
            store,
            catalog,
            settings,
            dry_run: false,
            only_channel: None,
        }
    }

    /// Plan and report without writing anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Restrict the pass to a single channel id.
    pub fn only_channel(mut self, channel_id: Option<String>) -> Self {
        self.only_channel = channel_id;
        self
    }

    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let programs = self.store.programs().await.map_err(SyncError::LoadState)?;
        let registered = self
            .store
            .watched_channels()
            .await
            .map_err(SyncError::LoadState)?;

        let mut channels = watch_list(&registered, &programs);
        if let Some(only) = self.only_channel.as_deref() {
            channels.retain(|channel| channel.channel_id == only);
        }

        let mut report = SyncReport {
            dry_run: self.dry_run,
            ..SyncReport::default()
        };
        let now_ms = chrono::Utc::now().timestamp_millis();
        tracing::info!(channels = channels.len(), dry_run = self.dry_run, "starting channel sync");

        for channel in &channels {
            report.channels_checked += 1;
            let stored: Vec<&Program> = programs
                .iter()
                .filter(|program| program.channel_id.as_deref() == Some(channel.channel_id.as_str()))
                .collect();

            match self.plan(channel, &stored, now_ms).await {
                Ok(plan) => self.apply(plan, &mut report).await,
                Err(reason) => {
                    tracing::warn!(channel = %channel.channel_id, ?reason, "channel skipped");
                    report.skipped.push(ChannelSkip {
                        channel_id: channel.channel_id.clone(),
                        reason,
                    });
                }
            }
        }

        tracing::info!(
            inserted = report.inserted,
            deleted = report.deleted,
            skipped = report.skipped.len(),
            failures = report.write_failures.len(),
            "channel sync finished"
        );
        Ok(report)
    }

    async fn plan(
        &self,
        channel: &WatchedChannel,
        stored: &[&Program],
        now_ms: i64,
    ) -> Result<ChannelPlan, SkipReason> {
        let uploads = self
            .catalog
            .latest_uploads(&channel.channel_id, self.settings.fetch_size)
            .await
            .map_err(|err| SkipReason::UploadsUnavailable(err.to_string()))?;

        if uploads.is_empty() {
            return match self.settings.empty_fetch {
                EmptyFetchPolicy::Keep => Err(SkipReason::NoUploads),
                EmptyFetchPolicy::Evict => Ok(plan_channel(channel, stored, &[], now_ms)),
            };
        }

        let ids: Vec<String> = uploads.iter().map(|upload| upload.video_id.clone()).collect();
        let durations = self
            .catalog
            .durations(&ids)
            .await
            .map_err(|err| SkipReason::DurationsUnavailable(err.to_string()))?;

        let window = qualifying_uploads(&uploads, &durations, &self.settings);
        Ok(plan_channel(channel, stored, &window, now_ms))
    }

    async fn apply(&self, plan: ChannelPlan, report: &mut SyncReport) {
        let mut outcome = ChannelOutcome {
            channel_id: plan.channel_id.clone(),
            ..ChannelOutcome::default()
        };

        if self.dry_run {
            outcome.inserted = plan.inserts.iter().map(|new| new.youtube_id.clone()).collect();
            outcome.deleted = plan.evictions.iter().map(|old| old.youtube_id.clone()).collect();
        } else {
            for new in plan.inserts {
                let youtube_id = new.youtube_id.clone();
                match self.store.insert(new).await {
                    Ok(Some(_)) => outcome.inserted.push(youtube_id),
                    Ok(None) => {
                        tracing::debug!(channel = %plan.channel_id, video = %youtube_id, "already stored");
                        report.already_present += 1;
                    }
                    Err(err) => {
                        tracing::error!(channel = %plan.channel_id, video = %youtube_id, "insert failed: {err:#}");
                        report
                            .write_failures
                            .push(format!("insert {youtube_id}: {err:#}"));
                    }
                }
            }

            for old in &plan.evictions {
                match self.store.delete(&old.id).await {
                    Ok(true) => outcome.deleted.push(old.youtube_id.clone()),
                    Ok(false) => {}
                    Err(err) => {
                        tracing::error!(channel = %plan.channel_id, video = %old.youtube_id, "delete failed: {err:#}");
                        report
                            .write_failures
                            .push(format!("delete {}: {err:#}", old.youtube_id));
                    }
                }
            }
        }

        if !outcome.inserted.is_empty() || !outcome.deleted.is_empty() {
            tracing::info!(
                channel = %outcome.channel_id,
                inserted = outcome.inserted.len(),
                deleted = outcome.deleted.len(),
                "channel reconciled"
            );
        }
        report.inserted += outcome.inserted.len();
        report.deleted += outcome.deleted.len();
        report.channels.push(outcome);
    }
}
