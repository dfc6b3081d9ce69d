//! # Activity & Audit Log
//!
//! Services describe what happened as an [`ActivityEvent`] and hand it to an
//! injected [`ActivityRecorder`]. The recorder pushes onto a bounded channel
//! without waiting; a background task drains the channel into an
//! [`ActivitySink`]. A full queue drops the event and a failing sink logs the
//! failure, so neither can fail or slow down the operation that emitted it.
//! The HTTP audit middleware feeds [`AuditEvent`]s through the same path.

use crate::errors::KbError;
use crate::providers::db::sqlite::{value, Executor, RowExt, SqliteProvider};
use crate::types::{format_ts, new_id, Actor, UserSummary};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use turso::Value;

pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const MAX_LIST_LIMIT: i64 = 500;

/// The setting that controls how long log rows are kept.
pub const RETENTION_SETTING_KEY: &str = "activity_retention_days";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Created,
    Updated,
    Deleted,
    Trashed,
    Restored,
    PermanentlyDeleted,
    Duplicated,
    Reordered,
    SubmittedForReview,
    Approved,
    Rejected,
    Published,
    Archived,
    Snapshotted,
    VersionRestored,
    Registered,
    RoleAssigned,
    RoleRemoved,
    Activated,
    Deactivated,
}

impl ActivityAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityAction::Created => "created",
            ActivityAction::Updated => "updated",
            ActivityAction::Deleted => "deleted",
            ActivityAction::Trashed => "trashed",
            ActivityAction::Restored => "restored",
            ActivityAction::PermanentlyDeleted => "permanently_deleted",
            ActivityAction::Duplicated => "duplicated",
            ActivityAction::Reordered => "reordered",
            ActivityAction::SubmittedForReview => "submitted_for_review",
            ActivityAction::Approved => "approved",
            ActivityAction::Rejected => "rejected",
            ActivityAction::Published => "published",
            ActivityAction::Archived => "archived",
            ActivityAction::Snapshotted => "snapshotted",
            ActivityAction::VersionRestored => "version_restored",
            ActivityAction::Registered => "registered",
            ActivityAction::RoleAssigned => "role_assigned",
            ActivityAction::RoleRemoved => "role_removed",
            ActivityAction::Activated => "activated",
            ActivityAction::Deactivated => "deactivated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Section,
    Page,
    Module,
    User,
    Setting,
    Suggestion,
    Template,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Section => "section",
            EntityType::Page => "page",
            EntityType::Module => "module",
            EntityType::User => "user",
            EntityType::Setting => "setting",
            EntityType::Suggestion => "suggestion",
            EntityType::Template => "template",
        }
    }
}

/// One domain-level fact: who did what to which entity.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEvent {
    pub user_id: Option<String>,
    pub action: ActivityAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn new(
        actor: &Actor,
        action: ActivityAction,
        entity_type: EntityType,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: actor.user_id.clone(),
            action,
            entity_type,
            entity_id: entity_id.into(),
            details: None,
            ip_address: actor.ip_address.clone(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// One mutating HTTP request, captured after it succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub user_id: Option<String>,
    /// `"<METHOD> <route>"`, e.g. `"PATCH /api/pages/{id}/publish"`.
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum LogEvent {
    Activity(ActivityEvent),
    Audit(AuditEvent),
}

impl From<ActivityEvent> for LogEvent {
    fn from(event: ActivityEvent) -> Self {
        LogEvent::Activity(event)
    }
}

impl From<AuditEvent> for LogEvent {
    fn from(event: AuditEvent) -> Self {
        LogEvent::Audit(event)
    }
}

/// Where drained events end up.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn write(&self, event: &LogEvent) -> Result<(), KbError>;
}

/// A cheap, cloneable handle for emitting log events.
#[derive(Clone, Debug)]
pub struct ActivityRecorder {
    sender: Option<mpsc::Sender<LogEvent>>,
}

impl ActivityRecorder {
    /// Creates a recorder and the receiving end of its queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LogEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// A recorder that discards every event.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Queues `event` without waiting. Never fails the caller.
    pub fn record(&self, event: impl Into<LogEvent>) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(event.into()) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                warn!(event = ?dropped, "Activity queue is full, dropping event");
            }
            Err(TrySendError::Closed(dropped)) => {
                warn!(event = ?dropped, "Activity recorder is shut down, dropping event");
            }
        }
    }
}

/// Starts the background task that drains the queue into `sink`. The task
/// ends once every recorder clone has been dropped.
pub fn spawn_recorder(
    sink: Arc<dyn ActivitySink>,
    capacity: usize,
) -> (ActivityRecorder, JoinHandle<()>) {
    let (recorder, mut receiver) = ActivityRecorder::channel(capacity);
    let handle = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            if let Err(e) = sink.write(&event).await {
                error!(error = %e, "Failed to persist activity event");
            }
        }
        info!("Activity recorder stopped");
    });
    (recorder, handle)
}

/// Persists events into `activity_logs` / `audit_logs`.
#[derive(Clone, Debug)]
pub struct SqliteActivitySink {
    db: SqliteProvider,
}

impl SqliteActivitySink {
    pub fn new(db: SqliteProvider) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ActivitySink for SqliteActivitySink {
    async fn write(&self, event: &LogEvent) -> Result<(), KbError> {
        match event {
            LogEvent::Activity(e) => {
                self.db
                    .execute(
                        "INSERT INTO activity_logs (id, user_id, action, entity_type, entity_id, details, ip_address, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                        vec![
                            value::text(new_id()),
                            value::opt_text(e.user_id.clone()),
                            value::text(e.action.as_str()),
                            value::text(e.entity_type.as_str()),
                            value::text(e.entity_id.clone()),
                            value::opt_text(e.details.clone()),
                            value::opt_text(e.ip_address.clone()),
                            value::text(format_ts(e.occurred_at)),
                        ],
                    )
                    .await?;
            }
            LogEvent::Audit(e) => {
                self.db
                    .execute(
                        "INSERT INTO audit_logs (id, user_id, action, entity_type, entity_id, before, after, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                        vec![
                            value::text(new_id()),
                            value::opt_text(e.user_id.clone()),
                            value::text(e.action.clone()),
                            value::text(e.entity_type.clone()),
                            value::text(e.entity_id.clone()),
                            value::opt_json(e.before.as_ref()),
                            value::opt_json(e.after.as_ref()),
                            value::text(format_ts(e.occurred_at)),
                        ],
                    )
                    .await?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: String,
    pub user_id: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub user: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub user_id: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Query-string filter for log listings (`?userId=&entityType=&limit=`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFilter {
    pub user_id: Option<String>,
    pub entity_type: Option<String>,
    pub limit: Option<i64>,
}

impl ActivityFilter {
    fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }

    fn where_clause(&self, alias: &str) -> (String, Vec<Value>) {
        let mut conditions = Vec::new();
        let mut params = Vec::new();
        if let Some(user_id) = &self.user_id {
            conditions.push(format!("{alias}.user_id = ?"));
            params.push(value::text(user_id.clone()));
        }
        if let Some(entity_type) = &self.entity_type {
            conditions.push(format!("{alias}.entity_type = ?"));
            params.push(value::text(entity_type.clone()));
        }
        if conditions.is_empty() {
            (String::new(), params)
        } else {
            (format!("WHERE {}", conditions.join(" AND ")), params)
        }
    }
}

/// Rows removed by one retention pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub activity_rows: u64,
    pub audit_rows: u64,
}

/// The longest retention window accepted, about a century.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Interprets the stored retention setting. Only a whole number of days in
/// `1..=MAX_RETENTION_DAYS` enables cleanup.
pub fn parse_retention_days(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|days| (1..=MAX_RETENTION_DAYS).contains(days))
}

/// The instant before which rows are old enough to delete, or `None` when
/// `retention_days` cannot be represented as a date.
pub fn retention_cutoff(retention_days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(retention_days).and_then(|window| Utc::now().checked_sub_signed(window))
}

/// Read and maintenance access to the log tables.
#[derive(Clone, Debug)]
pub struct ActivityLog {
    db: SqliteProvider,
}

impl ActivityLog {
    pub fn new(db: SqliteProvider) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: &ActivityFilter) -> Result<Vec<ActivityLogEntry>, KbError> {
        let (where_clause, params) = filter.where_clause("a");
        let sql = format!(
            "SELECT a.id, a.user_id, a.action, a.entity_type, a.entity_id, a.details, a.ip_address, a.created_at, u.id, u.name, u.email \
             FROM activity_logs a LEFT JOIN users u ON u.id = a.user_id \
             {where_clause} ORDER BY a.created_at DESC LIMIT {}",
            filter.effective_limit()
        );
        let rows = self.db.query(&sql, params).await?;
        rows.iter()
            .map(|row| {
                Ok(ActivityLogEntry {
                    id: row.text(0)?,
                    user_id: row.opt_text(1)?,
                    action: row.text(2)?,
                    entity_type: row.text(3)?,
                    entity_id: row.text(4)?,
                    details: row.opt_text(5)?,
                    ip_address: row.opt_text(6)?,
                    created_at: row.ts(7)?,
                    user: row.opt_user(8)?,
                })
            })
            .collect()
    }

    pub async fn list_audit(&self, filter: &ActivityFilter) -> Result<Vec<AuditLogEntry>, KbError> {
        let (where_clause, params) = filter.where_clause("l");
        let sql = format!(
            "SELECT l.id, l.user_id, l.action, l.entity_type, l.entity_id, l.before, l.after, l.created_at \
             FROM audit_logs l {where_clause} ORDER BY l.created_at DESC LIMIT {}",
            filter.effective_limit()
        );
        let rows = self.db.query(&sql, params).await?;
        rows.iter()
            .map(|row| {
                Ok(AuditLogEntry {
                    id: row.text(0)?,
                    user_id: row.opt_text(1)?,
                    action: row.text(2)?,
                    entity_type: row.text(3)?,
                    entity_id: row.text(4)?,
                    before: row.opt_json(5)?,
                    after: row.opt_json(6)?,
                    created_at: row.ts(7)?,
                })
            })
            .collect()
    }

    /// Deletes activity and audit rows older than `retention_days`.
    /// Zero, negative and out-of-range values delete nothing.
    pub async fn cleanup(&self, retention_days: i64) -> Result<CleanupReport, KbError> {
        if retention_days <= 0 {
            return Ok(CleanupReport::default());
        }
        let Some(cutoff) = retention_cutoff(retention_days) else {
            warn!(retention_days, "Retention window out of range, skipping cleanup");
            return Ok(CleanupReport::default());
        };
        let cutoff = format_ts(cutoff);
        let activity_rows = self
            .db
            .execute(
                "DELETE FROM activity_logs WHERE created_at < ?",
                vec![value::text(cutoff.clone())],
            )
            .await?;
        let audit_rows = self
            .db
            .execute(
                "DELETE FROM audit_logs WHERE created_at < ?",
                vec![value::text(cutoff)],
            )
            .await?;
        info!(
            retention_days,
            activity_rows, audit_rows, "Activity retention cleanup finished"
        );
        Ok(CleanupReport {
            activity_rows,
            audit_rows,
        })
    }

    /// Reads the retention setting and applies it. Unset or invalid values
    /// are a no-op.
    pub async fn cleanup_from_settings(&self) -> Result<CleanupReport, KbError> {
        let row = self
            .db
            .query_one(
                "SELECT value FROM settings WHERE key = ?",
                vec![value::text(RETENTION_SETTING_KEY)],
            )
            .await?;
        let raw = match row {
            Some(row) => row.opt_text(0)?,
            None => None,
        };
        match parse_retention_days(raw.as_deref()) {
            Some(days) => self.cleanup(days).await,
            None => Ok(CleanupReport::default()),
        }
    }
}
