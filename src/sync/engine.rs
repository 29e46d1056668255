use std::fmt;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use tokio::sync::Mutex;

use super::Confirm;
use crate::config::{ConfigStore, Settings};
use crate::db::{upsert, Session, REQUIRED_TABLES};
use crate::error::{AppError, OutcomeKind, Result};
use crate::models::{NewBookmark, NewThink, SaveOutcome};
use crate::remote::RemoteStore;

/// Where a sync cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Idle,
    Downloading,
    Opened,
    Mutating,
    Exporting,
    Uploading,
    Done,
    Failed(OutcomeKind),
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStage::Idle => f.write_str("idle"),
            SyncStage::Downloading => f.write_str("downloading"),
            SyncStage::Opened => f.write_str("opened"),
            SyncStage::Mutating => f.write_str("mutating"),
            SyncStage::Exporting => f.write_str("exporting"),
            SyncStage::Uploading => f.write_str("uploading"),
            SyncStage::Done => f.write_str("done"),
            SyncStage::Failed(kind) => write!(f, "failed ({})", kind),
        }
    }
}

enum Mutation {
    Bookmark(NewBookmark),
    Think(NewThink),
}

/// Runs download, mutate, upload cycles against the shared database.
///
/// Cycles never overlap inside one engine: a second save waits until the
/// first has finished. Nothing coordinates separate engines, so the last
/// upload wins and can silently discard a concurrent writer's change.
pub struct SyncEngine {
    config: Arc<dyn ConfigStore>,
    remote: Arc<dyn RemoteStore>,
    confirm: Arc<dyn Confirm>,
    cycle: Mutex<()>,
    stage: StdMutex<SyncStage>,
}

impl SyncEngine {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        remote: Arc<dyn RemoteStore>,
        confirm: Arc<dyn Confirm>,
    ) -> Self {
        Self {
            config,
            remote,
            confirm,
            cycle: Mutex::new(()),
            stage: StdMutex::new(SyncStage::Idle),
        }
    }

    pub fn stage(&self) -> SyncStage {
        self.stage
            .lock()
            .map(|stage| *stage)
            .unwrap_or(SyncStage::Idle)
    }

    fn enter(&self, stage: SyncStage) {
        tracing::debug!("Sync stage: {}", stage);
        if let Ok(mut current) = self.stage.lock() {
            *current = stage;
        }
    }

    /// Record a rejected input as a failed cycle without waiting for the
    /// cycle lock or touching the network.
    fn validated<T>(&self, input: Result<T>) -> Result<T> {
        if let Err(e) = &input {
            self.enter(SyncStage::Failed(e.kind()));
            tracing::warn!("Nothing to save: {}", e);
        }
        input
    }

    pub async fn save_bookmark(
        &self,
        url: &str,
        title: &str,
        description: &str,
        tags_csv: &str,
    ) -> Result<SaveOutcome> {
        let bookmark = self.validated(NewBookmark::from_input(url, title, description, tags_csv))?;
        self.run_cycle(Mutation::Bookmark(bookmark)).await
    }

    pub async fn save_think(&self, title: &str, content: &str) -> Result<SaveOutcome> {
        let think = self.validated(NewThink::new(title, content))?;
        self.run_cycle(Mutation::Think(think)).await
    }

    /// Save selected text as a think, titled after its first line.
    pub async fn save_selection(&self, selection: &str) -> Result<SaveOutcome> {
        let think = self.validated(NewThink::from_selection(selection))?;
        self.run_cycle(Mutation::Think(think)).await
    }

    async fn run_cycle(&self, mutation: Mutation) -> Result<SaveOutcome> {
        let _cycle = self.cycle.lock().await;

        let result = self.cycle_steps(mutation).await;
        match &result {
            Ok(outcome) => {
                self.enter(SyncStage::Done);
                tracing::info!(id = outcome.id(), "{}", outcome);
            }
            Err(e) => {
                self.enter(SyncStage::Failed(e.kind()));
                match e {
                    AppError::UserCancelled(_) => tracing::warn!("Sync cancelled: {}", e),
                    _ => tracing::error!("Sync failed: {}", e),
                }
            }
        }
        result
    }

    async fn cycle_steps(&self, mutation: Mutation) -> Result<SaveOutcome> {
        let settings = Settings::load(self.config.as_ref())?;
        let target = settings.remote_target()?;
        tracing::debug!("Syncing with {}", target.base_url());

        self.enter(SyncStage::Downloading);
        let bytes = self.remote.fetch_database(&target).await?;

        let session = Session::open(&bytes).await?;
        self.enter(SyncStage::Opened);
        let missing = session.missing_tables(&REQUIRED_TABLES).await?;
        if !missing.is_empty() {
            return Err(AppError::CorruptDatabase(format!(
                "not a ThinkNote database, missing tables: {}",
                missing.join(", ")
            )));
        }

        self.enter(SyncStage::Mutating);
        let now = Utc::now();
        let outcome = match mutation {
            Mutation::Bookmark(bookmark) => {
                upsert::upsert_bookmark(&session, &bookmark, self.confirm.as_ref(), now).await?
            }
            Mutation::Think(think) => upsert::insert_think(&session, &think, now).await?,
        };

        self.enter(SyncStage::Exporting);
        let updated = session.export().await?;
        drop(session);

        self.enter(SyncStage::Uploading);
        self.remote.store_database(&target, updated).await?;

        Ok(outcome)
    }
}
