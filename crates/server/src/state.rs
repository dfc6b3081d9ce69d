//! # Application State
//!
//! `AppState` holds the configuration and the knowledge-base services shared
//! by every handler. Building it opens the database, creates the schema and
//! upload directories, and starts the background activity recorder and the
//! periodic retention cleanup.

use crate::config::AppConfig;
use kbase::{
    activity::{spawn_recorder, ActivityLog, ActivityRecorder, SqliteActivitySink},
    files::FileStore,
    providers::db::sqlite::SqliteProvider,
    KnowledgeBase,
};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub kb: KnowledgeBase,
    /// Shared with the services; the audit middleware records through it too.
    pub recorder: ActivityRecorder,
}

impl AppState {
    /// The raw turso handle the user directory works on.
    pub fn db(&self) -> &turso::Database {
        &self.kb.db.db
    }
}

pub async fn build_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let db = SqliteProvider::new(&config.db_url).await?;
    db.initialize_schema().await?;
    info!(db_path = %config.db_url, "Database ready");

    let files = FileStore::new(&config.upload_dir);
    files.ensure_layout().await?;
    info!(upload_dir = %config.upload_dir, "Upload directories ready");

    let (recorder, _drain) = spawn_recorder(
        Arc::new(SqliteActivitySink::new(db.clone())),
        config.activity.channel_capacity,
    );
    let kb = KnowledgeBase::new(db, recorder.clone(), files);

    if let Err(e) = kb.activity.cleanup_from_settings().await {
        error!(error = %e, "Startup activity cleanup failed");
    }
    spawn_retention_task(kb.activity.clone(), config.activity.cleanup_interval_hours);

    Ok(AppState {
        config: Arc::new(config),
        kb,
        recorder,
    })
}

/// Re-applies the retention setting every `interval_hours`. Returns `None`
/// when the periodic run is disabled.
pub fn spawn_retention_task(log: ActivityLog, interval_hours: u64) -> Option<JoinHandle<()>> {
    if interval_hours == 0 {
        return None;
    }
    let period = Duration::from_secs(interval_hours * 3600);
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick fires immediately and startup already ran a pass.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match log.cleanup_from_settings().await {
                Ok(report) => info!(
                    activity_rows = report.activity_rows,
                    audit_rows = report.audit_rows,
                    "Scheduled activity cleanup finished"
                ),
                Err(e) => error!(error = %e, "Scheduled activity cleanup failed"),
            }
        }
    }))
}
