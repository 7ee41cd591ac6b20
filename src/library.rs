//! Program library backed by a local libsql database.
//!
//! Every row carries the application namespace (`app_id`) so one database
//! file can host several curated grids side by side. The library is the
//! document store the reconciler and the HTTP API share.

use std::path::Path;

use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use libsql::{Builder, Connection, Row, params};
use rand_core::{OsRng, RngCore};
use tokio::sync::watch;

use crate::models::{NewProgram, Program, ProgramPatch, Theme, WatchedChannel};
use crate::reconcile::ProgramStore;

async fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA foreign_keys=ON;
        "#,
    )
    .await?;
    Ok(())
}

async fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS programs (
            app_id TEXT NOT NULL,
            id TEXT NOT NULL,
            youtube_id TEXT NOT NULL,
            channel_id TEXT,
            category_id TEXT NOT NULL,
            pitch TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            published_at INTEGER,
            avg_score REAL NOT NULL DEFAULT 0,
            added_by TEXT,
            PRIMARY KEY (app_id, id)
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_programs_youtube
            ON programs(app_id, youtube_id);
        CREATE INDEX IF NOT EXISTS idx_programs_channel
            ON programs(app_id, channel_id);

        CREATE TABLE IF NOT EXISTS watched_channels (
            app_id TEXT NOT NULL,
            channel_id TEXT NOT NULL,
            category_id TEXT NOT NULL,
            owner_id TEXT,
            handle TEXT,
            added_at INTEGER NOT NULL,
            PRIMARY KEY (app_id, channel_id)
        );

        CREATE TABLE IF NOT EXISTS themes (
            app_id TEXT NOT NULL,
            id TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            icon TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (app_id, id)
        );

        CREATE INDEX IF NOT EXISTS idx_themes_owner ON themes(app_id, owner_id);
        "#,
    )
    .await?;
    Ok(())
}

/// Firestore-style document id: 20 URL-safe characters.
fn generate_id() -> String {
    let mut bytes = [0u8; 15];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Outcome of unregistering a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovedChannel {
    pub was_registered: bool,
    pub programs_deleted: u64,
    /// Programs still stored for the channel, which keep it derived.
    pub programs_kept: u64,
}

/// Read/write handle on one application namespace of the database.
#[derive(Debug)]
pub struct Library {
    conn: Connection,
    app_id: String,
    revisions: watch::Sender<u64>,
}

impl Library {
    /// Opens (and if necessary creates) the database and ensures the schema
    /// exists.
    pub async fn open(path: &Path, app_id: impl Into<String>) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating library directory {}", parent.display()))?;
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .with_context(|| format!("opening library DB {}", path.display()))?;

        let conn = db.connect()?;
        configure_connection(&conn).await?;
        ensure_schema(&conn).await?;

        let (revisions, _) = watch::channel(0);
        Ok(Self {
            conn,
            app_id: app_id.into(),
            revisions,
        })
    }

    /// Receives a new revision number after every write made through this
    /// handle.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revisions.subscribe()
    }

    /// SQLite's `data_version`; changes when another connection commits.
    pub async fn data_version(&self) -> Result<i64> {
        let mut rows = self.conn.query("PRAGMA data_version", params![]).await?;
        let row = rows
            .next()
            .await?
            .context("missing data_version row")?;
        Ok(row.get(0)?)
    }

    fn bump(&self) {
        self.revisions.send_modify(|revision| *revision += 1);
    }

    /// All programs, newest upstream publish date first.
    pub async fn list_programs(&self) -> Result<Vec<Program>> {
        let mut rows = self
            .conn
            .query(
                r#"
                SELECT id, youtube_id, channel_id, category_id, pitch,
                       created_at, published_at, avg_score, added_by
                FROM programs
                WHERE app_id = ?1
                ORDER BY COALESCE(published_at, created_at) DESC, rowid DESC
                "#,
                params![self.app_id.as_str()],
            )
            .await?;

        let mut programs = Vec::new();
        while let Some(row) = rows.next().await? {
            programs.push(row_to_program(&row)?);
        }
        Ok(programs)
    }

    pub async fn get_program(&self, id: &str) -> Result<Option<Program>> {
        let mut rows = self
            .conn
            .query(
                r#"
                SELECT id, youtube_id, channel_id, category_id, pitch,
                       created_at, published_at, avg_score, added_by
                FROM programs
                WHERE app_id = ?1 AND id = ?2
                "#,
                params![self.app_id.as_str(), id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_program(&row)?)),
            None => Ok(None),
        }
    }

    /// Stores a new program under a generated id. Returns `None` when a
    /// program with the same `youtube_id` already exists in this namespace.
    pub async fn insert_program(&self, new: NewProgram) -> Result<Option<Program>> {
        let id = generate_id();
        let changed = self
            .conn
            .execute(
                r#"
                INSERT INTO programs (
                    app_id, id, youtube_id, channel_id, category_id, pitch,
                    created_at, published_at, avg_score, added_by
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(app_id, youtube_id) DO NOTHING
                "#,
                params![
                    self.app_id.as_str(),
                    id.as_str(),
                    new.youtube_id.as_str(),
                    new.channel_id.as_deref(),
                    new.category_id.as_str(),
                    new.pitch.as_str(),
                    new.created_at,
                    new.published_at,
                    new.avg_score,
                    new.added_by.as_deref(),
                ],
            )
            .await
            .with_context(|| format!("inserting program {}", new.youtube_id))?;

        if changed == 0 {
            return Ok(None);
        }
        self.bump();

        Ok(Some(Program {
            id,
            youtube_id: new.youtube_id,
            channel_id: new.channel_id,
            category_id: new.category_id,
            pitch: new.pitch,
            created_at: new.created_at,
            published_at: new.published_at,
            avg_score: new.avg_score,
            added_by: new.added_by,
        }))
    }

    /// Applies a pitch/category edit. Returns the updated program, or `None`
    /// when the id is unknown.
    pub async fn update_program(&self, id: &str, patch: &ProgramPatch) -> Result<Option<Program>> {
        let changed = self
            .conn
            .execute(
                r#"
                UPDATE programs
                SET pitch = COALESCE(?3, pitch),
                    category_id = COALESCE(?4, category_id)
                WHERE app_id = ?1 AND id = ?2
                "#,
                params![
                    self.app_id.as_str(),
                    id,
                    patch.pitch.as_deref(),
                    patch.category_id.as_deref(),
                ],
            )
            .await
            .with_context(|| format!("updating program {id}"))?;
        if changed == 0 {
            return Ok(None);
        }
        self.bump();
        self.get_program(id).await
    }

    pub async fn delete_program(&self, id: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "DELETE FROM programs WHERE app_id = ?1 AND id = ?2",
                params![self.app_id.as_str(), id],
            )
            .await
            .with_context(|| format!("deleting program {id}"))?;
        if changed > 0 {
            self.bump();
        }
        Ok(changed > 0)
    }

    pub async fn list_watched_channels(&self) -> Result<Vec<WatchedChannel>> {
        let mut rows = self
            .conn
            .query(
                r#"
                SELECT channel_id, category_id, owner_id, handle, added_at
                FROM watched_channels
                WHERE app_id = ?1
                ORDER BY added_at ASC, rowid ASC
                "#,
                params![self.app_id.as_str()],
            )
            .await?;

        let mut channels = Vec::new();
        while let Some(row) = rows.next().await? {
            channels.push(WatchedChannel {
                channel_id: row.get(0)?,
                category_id: row.get(1)?,
                owner_id: row.get(2)?,
                handle: row.get(3)?,
                added_at: row.get(4)?,
            });
        }
        Ok(channels)
    }

    /// Registers a channel, or moves an already registered one to another
    /// category/owner. The first `added_at` is kept on update.
    pub async fn upsert_watched_channel(&self, channel: &WatchedChannel) -> Result<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO watched_channels (
                    app_id, channel_id, category_id, owner_id, handle, added_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(app_id, channel_id) DO UPDATE SET
                    category_id = excluded.category_id,
                    owner_id = excluded.owner_id,
                    handle = COALESCE(excluded.handle, watched_channels.handle)
                "#,
                params![
                    self.app_id.as_str(),
                    channel.channel_id.as_str(),
                    channel.category_id.as_str(),
                    channel.owner_id.as_deref(),
                    channel.handle.as_deref(),
                    channel.added_at,
                ],
            )
            .await
            .with_context(|| format!("registering channel {}", channel.channel_id))?;
        self.bump();
        Ok(())
    }

    /// Unregisters a channel. With `purge`, its stored programs go too;
    /// otherwise they stay and the channel keeps being derived from them.
    ///
    /// Each statement commits on its own; the connection is shared with
    /// concurrent writers. Programs go first so a failure never leaves
    /// purged programs behind an unregistered channel.
    pub async fn remove_watched_channel(
        &self,
        channel_id: &str,
        purge: bool,
    ) -> Result<RemovedChannel> {
        let programs_deleted = if purge {
            self.conn
                .execute(
                    "DELETE FROM programs WHERE app_id = ?1 AND channel_id = ?2",
                    params![self.app_id.as_str(), channel_id],
                )
                .await?
        } else {
            0
        };
        let registered = self
            .conn
            .execute(
                "DELETE FROM watched_channels WHERE app_id = ?1 AND channel_id = ?2",
                params![self.app_id.as_str(), channel_id],
            )
            .await?;
        let programs_kept = if purge {
            0
        } else {
            self.count_channel_programs(channel_id).await?
        };

        if registered > 0 || programs_deleted > 0 {
            self.bump();
        }
        Ok(RemovedChannel {
            was_registered: registered > 0,
            programs_deleted,
            programs_kept,
        })
    }

    async fn count_channel_programs(&self, channel_id: &str) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM programs WHERE app_id = ?1 AND channel_id = ?2",
                params![self.app_id.as_str(), channel_id],
            )
            .await?;
        let row = rows.next().await?.context("missing count row")?;
        let count: i64 = row.get(0)?;
        Ok(count.max(0) as u64)
    }

    /// Themes created by `owner`, oldest first.
    pub async fn list_themes(&self, owner: &str) -> Result<Vec<Theme>> {
        let mut rows = self
            .conn
            .query(
                r#"
                SELECT id, owner_id, name, icon, created_at
                FROM themes
                WHERE app_id = ?1 AND owner_id = ?2
                ORDER BY created_at ASC, rowid ASC
                "#,
                params![self.app_id.as_str(), owner],
            )
            .await?;

        let mut themes = Vec::new();
        while let Some(row) = rows.next().await? {
            themes.push(row_to_theme(&row)?);
        }
        Ok(themes)
    }

    pub async fn create_theme(&self, owner: &str, name: &str, icon: &str) -> Result<Theme> {
        let theme = Theme {
            id: generate_id(),
            owner_id: owner.to_string(),
            name: name.trim().to_string(),
            icon: icon.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        self.conn
            .execute(
                r#"
                INSERT INTO themes (app_id, id, owner_id, name, icon, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    self.app_id.as_str(),
                    theme.id.as_str(),
                    theme.owner_id.as_str(),
                    theme.name.as_str(),
                    theme.icon.as_str(),
                    theme.created_at,
                ],
            )
            .await
            .with_context(|| format!("creating theme {}", theme.name))?;
        self.bump();
        Ok(theme)
    }

    /// Renames a theme owned by `owner`. `None` when no such theme exists.
    pub async fn rename_theme(&self, id: &str, owner: &str, name: &str) -> Result<Option<Theme>> {
        let changed = self
            .conn
            .execute(
                "UPDATE themes SET name = ?4 WHERE app_id = ?1 AND id = ?2 AND owner_id = ?3",
                params![self.app_id.as_str(), id, owner, name.trim()],
            )
            .await
            .with_context(|| format!("renaming theme {id}"))?;
        if changed == 0 {
            return Ok(None);
        }
        self.bump();

        let mut rows = self
            .conn
            .query(
                r#"
                SELECT id, owner_id, name, icon, created_at
                FROM themes
                WHERE app_id = ?1 AND id = ?2
                "#,
                params![self.app_id.as_str(), id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_theme(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn delete_theme(&self, id: &str, owner: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "DELETE FROM themes WHERE app_id = ?1 AND id = ?2 AND owner_id = ?3",
                params![self.app_id.as_str(), id, owner],
            )
            .await
            .with_context(|| format!("deleting theme {id}"))?;
        if changed > 0 {
            self.bump();
        }
        Ok(changed > 0)
    }
}

impl ProgramStore for Library {
    async fn programs(&self) -> Result<Vec<Program>> {
        self.list_programs().await
    }

    async fn watched_channels(&self) -> Result<Vec<WatchedChannel>> {
        self.list_watched_channels().await
    }

    async fn register_channel(&self, channel: &WatchedChannel) -> Result<()> {
        self.upsert_watched_channel(channel).await
    }

    async fn insert(&self, program: NewProgram) -> Result<Option<Program>> {
        self.insert_program(program).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.delete_program(id).await
    }
}

/// Column order must match the program SELECTs above.
fn row_to_program(row: &Row) -> Result<Program> {
    Ok(Program {
        id: row.get(0)?,
        youtube_id: row.get(1)?,
        channel_id: row.get(2)?,
        category_id: row.get(3)?,
        pitch: row.get(4)?,
        created_at: row.get(5)?,
        published_at: row.get(6)?,
        avg_score: row.get(7)?,
        added_by: row.get(8)?,
    })
}

fn row_to_theme(row: &Row) -> Result<Theme> {
    Ok(Theme {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        icon: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn new_program(youtube_id: &str, channel: Option<&str>) -> NewProgram {
        NewProgram {
            youtube_id: youtube_id.into(),
            channel_id: channel.map(str::to_string),
            category_id: "ia".into(),
            pitch: String::new(),
            created_at: 1_700_000_000_000,
            published_at: None,
            avg_score: 0.0,
            added_by: None,
        }
    }

    fn channel(id: &str, category: &str) -> WatchedChannel {
        WatchedChannel {
            channel_id: id.into(),
            category_id: category.into(),
            owner_id: None,
            handle: None,
            added_at: 1,
        }
    }

    async fn create_library() -> Result<(tempfile::TempDir, Library, PathBuf)> {
        let dir = tempdir()?;
        let path = dir.path().join("data/library.db");
        let library = Library::open(&path, "test-app").await?;
        Ok((dir, library, path))
    }

    #[tokio::test]
    async fn opens_library_and_creates_schema() -> Result<()> {
        let (_temp, library, path) = create_library().await?;
        assert!(path.exists(), "database file should be created");

        for table in ["programs", "watched_channels", "themes"] {
            let mut rows = library
                .conn
                .query(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                )
                .await?;
            let exists: Option<String> = rows
                .next()
                .await?
                .map(|row| row.get::<String>(0))
                .transpose()?;
            assert_eq!(exists.as_deref(), Some(table));
        }
        Ok(())
    }

    #[tokio::test]
    async fn insert_assigns_id_and_lists_program() -> Result<()> {
        let (_temp, library, _path) = create_library().await?;
        let stored = library
            .insert_program(new_program("vid-a", Some("UC1")))
            .await?
            .expect("program inserted");
        assert_eq!(stored.id.len(), 20);

        let programs = library.list_programs().await?;
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0], stored);
        Ok(())
    }

    #[tokio::test]
    async fn insert_skips_known_youtube_id() -> Result<()> {
        let (_temp, library, _path) = create_library().await?;
        assert!(library.insert_program(new_program("dup", Some("UC1"))).await?.is_some());
        assert!(library.insert_program(new_program("dup", Some("UC2"))).await?.is_none());
        assert_eq!(library.list_programs().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn namespaces_are_isolated() -> Result<()> {
        let (temp, library, path) = create_library().await?;
        library.insert_program(new_program("shared", None)).await?;

        let other = Library::open(&path, "other-app").await?;
        assert!(other.list_programs().await?.is_empty());
        assert!(other.insert_program(new_program("shared", None)).await?.is_some());
        drop(temp);
        Ok(())
    }

    #[tokio::test]
    async fn list_orders_by_publish_date() -> Result<()> {
        let (_temp, library, _path) = create_library().await?;
        let mut old = new_program("old", None);
        old.published_at = Some(1_000);
        let mut new = new_program("new", None);
        new.published_at = Some(2_000);
        library.insert_program(old).await?;
        library.insert_program(new).await?;

        let programs = library.list_programs().await?;
        assert_eq!(programs[0].youtube_id, "new");
        assert_eq!(programs[1].youtube_id, "old");
        Ok(())
    }

    #[tokio::test]
    async fn update_changes_only_patched_fields() -> Result<()> {
        let (_temp, library, _path) = create_library().await?;
        let stored = library
            .insert_program(new_program("vid", None))
            .await?
            .expect("inserted");

        let patch = ProgramPatch {
            pitch: Some("A must-watch".into()),
            category_id: None,
        };
        let updated = library
            .update_program(&stored.id, &patch)
            .await?
            .expect("updated");
        assert_eq!(updated.pitch, "A must-watch");
        assert_eq!(updated.category_id, "ia");

        assert!(library.update_program("ghost", &patch).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn delete_reports_whether_row_existed() -> Result<()> {
        let (_temp, library, _path) = create_library().await?;
        let stored = library
            .insert_program(new_program("vid", None))
            .await?
            .expect("inserted");
        assert!(library.delete_program(&stored.id).await?);
        assert!(!library.delete_program(&stored.id).await?);
        assert!(library.get_program(&stored.id).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn watched_channel_upsert_keeps_added_at() -> Result<()> {
        let (_temp, library, _path) = create_library().await?;
        library.upsert_watched_channel(&channel("UC1", "ia")).await?;

        let mut moved = channel("UC1", "foot");
        moved.added_at = 99;
        library.upsert_watched_channel(&moved).await?;

        let channels = library.list_watched_channels().await?;
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].category_id, "foot");
        assert_eq!(channels[0].added_at, 1);
        Ok(())
    }

    #[tokio::test]
    async fn remove_channel_with_purge_deletes_programs() -> Result<()> {
        let (_temp, library, _path) = create_library().await?;
        library.upsert_watched_channel(&channel("UC1", "ia")).await?;
        library.insert_program(new_program("a", Some("UC1"))).await?;
        library.insert_program(new_program("b", Some("UC1"))).await?;
        library.insert_program(new_program("c", Some("UC2"))).await?;

        let removed = library.remove_watched_channel("UC1", true).await?;
        assert_eq!(
            removed,
            RemovedChannel {
                was_registered: true,
                programs_deleted: 2,
                programs_kept: 0,
            }
        );
        let remaining = library.list_programs().await?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].youtube_id, "c");
        Ok(())
    }

    #[tokio::test]
    async fn remove_channel_without_purge_reports_kept_programs() -> Result<()> {
        let (_temp, library, _path) = create_library().await?;
        library.insert_program(new_program("a", Some("UC9"))).await?;

        let removed = library.remove_watched_channel("UC9", false).await?;
        assert_eq!(
            removed,
            RemovedChannel {
                was_registered: false,
                programs_deleted: 0,
                programs_kept: 1,
            }
        );
        assert_eq!(library.list_programs().await?.len(), 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_channel_removals_do_not_collide() -> Result<()> {
        let (_temp, library, _path) = create_library().await?;
        let library = std::sync::Arc::new(library);

        for round in 0..25 {
            let channel_id = format!("UC{round}");
            library.upsert_watched_channel(&channel(&channel_id, "ia")).await?;
            library
                .insert_program(new_program(&format!("v{round}"), Some(&channel_id)))
                .await?;

            let mut tasks = Vec::new();
            for _ in 0..4 {
                let library = library.clone();
                let channel_id = channel_id.clone();
                tasks.push(tokio::spawn(async move {
                    library.remove_watched_channel(&channel_id, true).await
                }));
            }
            let writer = {
                let library = library.clone();
                tokio::spawn(async move {
                    library
                        .insert_program(new_program(&format!("other{round}"), Some("UCother")))
                        .await
                })
            };

            let mut unregistered = 0;
            for task in tasks {
                let removed = task.await??;
                if removed.was_registered {
                    unregistered += 1;
                }
            }
            assert_eq!(unregistered, 1);
            assert!(writer.await??.is_some());
        }

        let programs = library.list_programs().await?;
        assert_eq!(programs.len(), 25);
        assert!(programs.iter().all(|p| p.channel_id.as_deref() == Some("UCother")));
        assert!(library.list_watched_channels().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn themes_are_scoped_to_owner() -> Result<()> {
        let (_temp, library, _path) = create_library().await?;
        let theme = library.create_theme("alice", " Cinema ", "custom").await?;
        assert_eq!(theme.name, "Cinema");
        library.create_theme("bob", "Jazz", "custom").await?;

        assert_eq!(library.list_themes("alice").await?.len(), 1);
        assert!(library.rename_theme(&theme.id, "bob", "Stolen").await?.is_none());

        let renamed = library
            .rename_theme(&theme.id, "alice", "Films")
            .await?
            .expect("renamed");
        assert_eq!(renamed.name, "Films");

        assert!(!library.delete_theme(&theme.id, "bob").await?);
        assert!(library.delete_theme(&theme.id, "alice").await?);
        assert!(library.list_themes("alice").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn writes_bump_revision() -> Result<()> {
        let (_temp, library, _path) = create_library().await?;
        let mut revisions = library.subscribe();
        let before = *revisions.borrow_and_update();

        library.insert_program(new_program("vid", None)).await?;
        assert!(revisions.has_changed()?);
        assert!(*revisions.borrow_and_update() > before);

        // A no-op insert leaves the revision alone.
        library.insert_program(new_program("vid", None)).await?;
        assert!(!revisions.has_changed()?);
        Ok(())
    }
}
