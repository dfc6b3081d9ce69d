//! # Page Versions
//!
//! A version is an immutable JSON copy of a page row and its live modules.
//! Version numbers are per page and start at 1. Restoring a version rewrites
//! the page inside a single transaction: either every snapshot module is
//! back or the page keeps the modules it had.

use crate::activity::{ActivityAction, ActivityEvent, ActivityRecorder, EntityType};
use crate::errors::KbError;
use crate::modules::{insert_module, list_live, Module, ModuleDraft};
use crate::pages::{fetch_page, Page, Scope};
use crate::providers::db::sqlite::{value, Executor, RowExt, SqliteProvider};
use crate::types::{new_id, now_ts, Actor, UserSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use turso::Row;

/// What a version stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    #[serde(flatten)]
    pub page: Page,
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageVersion {
    pub id: String,
    pub page_id: String,
    pub version: i64,
    pub snapshot: PageSnapshot,
    pub changed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub user: Option<UserSummary>,
}

const VERSION_SELECT: &str = "SELECT v.id, v.page_id, v.version, v.snapshot, v.changed_by, v.created_at, u.id, u.name, u.email FROM page_versions v LEFT JOIN users u ON u.id = v.changed_by";

impl TryFrom<&Row> for PageVersion {
    type Error = KbError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        let snapshot = serde_json::from_str(&row.text(3)?).map_err(|e| {
            KbError::DataIntegrity(format!("Unreadable snapshot: {e}"))
        })?;
        Ok(PageVersion {
            id: row.text(0)?,
            page_id: row.text(1)?,
            version: row.int(2)?,
            snapshot,
            changed_by: row.opt_text(4)?,
            created_at: row.ts(5)?,
            user: row.opt_user(6)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RestoreOutcome {
    pub restored: bool,
    pub version: i64,
}

async fn fetch_version(
    exec: &dyn Executor,
    page_id: &str,
    version_id: &str,
) -> Result<PageVersion, KbError> {
    exec.query_one(
        &format!("{VERSION_SELECT} WHERE v.id = ? AND v.page_id = ?"),
        vec![value::text(version_id), value::text(page_id)],
    )
    .await?
    .as_ref()
    .map(PageVersion::try_from)
    .transpose()?
    .ok_or_else(|| KbError::not_found("Version", version_id))
}

#[derive(Clone, Debug)]
pub struct VersionService {
    db: SqliteProvider,
    activity: ActivityRecorder,
}

impl VersionService {
    pub fn new(db: SqliteProvider, activity: ActivityRecorder) -> Self {
        Self { db, activity }
    }

    /// Records the current state of a live page as its next version. Every
    /// call creates a version, even when nothing changed.
    pub async fn snapshot(&self, page_id: &str, actor: &Actor) -> Result<PageVersion, KbError> {
        let tx = self.db.begin().await?;
        let result = async {
            let page = fetch_page(&tx, page_id, Scope::Live)
                .await?
                .ok_or_else(|| KbError::not_found("Page", page_id))?;
            let modules = list_live(&tx, page_id).await?;
            let latest = tx
                .query_one(
                    "SELECT MAX(version) FROM page_versions WHERE page_id = ?",
                    vec![value::text(page_id)],
                )
                .await?
                .map(|row| row.int(0))
                .transpose()?
                .unwrap_or(0);

            let id = new_id();
            let version = latest + 1;
            let snapshot = serde_json::to_string(&PageSnapshot { page, modules })?;
            tx.execute(
                "INSERT INTO page_versions (id, page_id, version, snapshot, changed_by, created_at) VALUES (?, ?, ?, ?, ?, ?)",
                vec![
                    value::text(id.clone()),
                    value::text(page_id),
                    value::int(version),
                    value::text(snapshot),
                    value::opt_text(actor.user_id.clone()),
                    value::text(now_ts()),
                ],
            )
            .await?;
            Ok::<_, KbError>((id, version))
        }
        .await;
        let (id, version) = tx.finish(result).await?;

        info!(page_id = %page_id, version, "Page snapshot taken");
        self.activity.record(
            ActivityEvent::new(actor, ActivityAction::Snapshotted, EntityType::Page, page_id)
                .with_details(format!("version {version}")),
        );
        self.get(page_id, &id).await
    }

    /// Versions of a page, newest first.
    pub async fn list(&self, page_id: &str) -> Result<Vec<PageVersion>, KbError> {
        let rows = self
            .db
            .query(
                &format!("{VERSION_SELECT} WHERE v.page_id = ? ORDER BY v.version DESC"),
                vec![value::text(page_id)],
            )
            .await?;
        rows.iter().map(PageVersion::try_from).collect()
    }

    pub async fn get(&self, page_id: &str, version_id: &str) -> Result<PageVersion, KbError> {
        fetch_version(&self.db, page_id, version_id).await
    }

    /// Puts a live page back to a stored version: title, status and icon come
    /// from the snapshot, current modules are soft-deleted and the snapshot's
    /// modules are inserted as new rows.
    pub async fn restore(
        &self,
        page_id: &str,
        version_id: &str,
        actor: &Actor,
    ) -> Result<RestoreOutcome, KbError> {
        let tx = self.db.begin().await?;
        let result = async {
            fetch_page(&tx, page_id, Scope::Live)
                .await?
                .ok_or_else(|| KbError::not_found("Page", page_id))?;
            let version = fetch_version(&tx, page_id, version_id).await?;
            let snapshot = &version.snapshot;
            let now = now_ts();

            tx.execute(
                "UPDATE pages SET title = ?, status = ?, icon = ?, updated_by_id = ?, updated_at = ? WHERE id = ?",
                vec![
                    value::text(snapshot.page.title.clone()),
                    value::text(snapshot.page.status.as_str()),
                    value::opt_text(snapshot.page.icon.clone()),
                    value::opt_text(actor.user_id.clone()),
                    value::text(now.clone()),
                    value::text(page_id),
                ],
            )
            .await?;
            tx.execute(
                "UPDATE modules SET deleted_at = ?, updated_at = ? WHERE page_id = ? AND deleted_at IS NULL",
                vec![value::text(now.clone()), value::text(now), value::text(page_id)],
            )
            .await?;
            for module in &snapshot.modules {
                insert_module(&tx, page_id, &ModuleDraft::from(module), module.order).await?;
            }
            Ok::<_, KbError>(version.version)
        }
        .await;
        let version = tx.finish(result).await?;

        info!(page_id = %page_id, version, "Page restored to version");
        self.activity.record(
            ActivityEvent::new(
                actor,
                ActivityAction::VersionRestored,
                EntityType::Page,
                page_id,
            )
            .with_details(format!("version {version}")),
        );
        Ok(RestoreOutcome {
            restored: true,
            version,
        })
    }
}
