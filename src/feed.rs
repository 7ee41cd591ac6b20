//! Change feed over the program library.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;

use crate::library::Library;
use crate::models::Program;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Lazy sequence of full program snapshots.
///
/// The first [`ProgramFeed::next_snapshot`] returns immediately. Every later
/// call waits until the library changes and then returns the whole list
/// again. Writes made through the same [`Library`] are seen through its
/// revision channel; commits from other processes are picked up by polling
/// `PRAGMA data_version`. A fresh feed starts over with an immediate
/// snapshot.
pub struct ProgramFeed {
    library: Arc<Library>,
    revisions: watch::Receiver<u64>,
    data_version: Option<i64>,
    poll_interval: Duration,
    started: bool,
}

impl ProgramFeed {
    pub fn new(library: Arc<Library>) -> Self {
        let revisions = library.subscribe();
        Self {
            library,
            revisions,
            data_version: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            started: false,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub async fn next_snapshot(&mut self) -> Result<Vec<Program>> {
        if self.started {
            self.wait_for_change().await?;
        } else {
            self.started = true;
            self.revisions.mark_unchanged();
        }
        self.data_version = Some(self.library.data_version().await?);
        self.library.list_programs().await
    }

    async fn wait_for_change(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                changed = self.revisions.changed() => {
                    // The sender lives inside the library we hold, so this
                    // only fails if the library is torn down.
                    changed?;
                    self.revisions.mark_unchanged();
                    return Ok(());
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    let current = self.library.data_version().await?;
                    if self.data_version != Some(current) {
                        return Ok(());
                    }
                }
            }
        }
    }
}
