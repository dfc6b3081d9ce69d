//! # Pages
//!
//! CRUD, trash and restore, permanent deletion, duplication and the workflow
//! transitions of pages. Status is never written through `update`; it only
//! moves through [`PageService::transition`].

use crate::activity::{ActivityAction, ActivityEvent, ActivityRecorder, EntityType};
use crate::columns::{Assignments, Column};
use crate::errors::KbError;
use crate::files::FileStore;
use crate::modules::{self, insert_module, list_live, Module, ModuleDraft};
use crate::providers::db::sqlite::{value, Executor, RowExt, SqliteProvider};
use crate::sections::{section_refs, SectionRef};
use crate::slug::{ensure_unique_slug, slugify, validate_slug};
use crate::templates;
use crate::types::{double_option, new_id, now_ts, Actor};
use crate::workflow::{self, PageStatus, WorkflowAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use turso::Row;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub section_id: String,
    pub title: String,
    pub slug: String,
    pub status: PageStatus,
    pub show_author: bool,
    pub show_metrics: bool,
    pub icon: Option<String>,
    pub views: i64,
    pub created_by_id: Option<String>,
    pub updated_by_id: Option<String>,
    pub reviewed_by_id: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const PAGE_COLUMNS: &str = "id, section_id, title, slug, status, show_author, show_metrics, icon, views, created_by_id, updated_by_id, reviewed_by_id, reviewed_at, deleted_at, created_at, updated_at";

impl TryFrom<&Row> for Page {
    type Error = KbError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Page {
            id: row.text(0)?,
            section_id: row.text(1)?,
            title: row.text(2)?,
            slug: row.text(3)?,
            status: row.text(4)?.parse()?,
            show_author: row.flag(5)?,
            show_metrics: row.flag(6)?,
            icon: row.opt_text(7)?,
            views: row.int(8)?,
            created_by_id: row.opt_text(9)?,
            updated_by_id: row.opt_text(10)?,
            reviewed_by_id: row.opt_text(11)?,
            reviewed_at: row.opt_ts(12)?,
            deleted_at: row.opt_ts(13)?,
            created_at: row.ts(14)?,
            updated_at: row.ts(15)?,
        })
    }
}

/// A page with its section, as returned by listings.
#[derive(Debug, Clone, Serialize)]
pub struct PageListItem {
    #[serde(flatten)]
    pub page: Page,
    pub section: Option<SectionRef>,
}

/// A page with its section and live modules.
#[derive(Debug, Clone, Serialize)]
pub struct PageDetail {
    #[serde(flatten)]
    pub page: Page,
    pub section: Option<SectionRef>,
    pub modules: Vec<Module>,
}

/// Which rows a lookup may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    Live,
    Any,
}

impl Scope {
    fn clause(self) -> &'static str {
        match self {
            Scope::Live => "AND deleted_at IS NULL",
            Scope::Any => "",
        }
    }
}

pub(crate) async fn fetch_page(
    exec: &dyn Executor,
    id: &str,
    scope: Scope,
) -> Result<Option<Page>, KbError> {
    exec.query_one(
        &format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = ? {}", scope.clause()),
        vec![value::text(id)],
    )
    .await?
    .as_ref()
    .map(Page::try_from)
    .transpose()
}

/// Loads pages with an arbitrary `WHERE ... ORDER BY ...` tail.
pub(crate) async fn query_pages(
    exec: &dyn Executor,
    tail: &str,
    params: Vec<turso::Value>,
) -> Result<Vec<Page>, KbError> {
    let rows = exec
        .query(&format!("SELECT {PAGE_COLUMNS} FROM pages {tail}"), params)
        .await?;
    rows.iter().map(Page::try_from).collect()
}

pub(crate) async fn with_sections(
    exec: &dyn Executor,
    pages: Vec<Page>,
) -> Result<Vec<PageListItem>, KbError> {
    let sections = section_refs(exec).await?;
    Ok(pages
        .into_iter()
        .map(|page| PageListItem {
            section: sections.get(&page.section_id).cloned(),
            page,
        })
        .collect())
}

pub(crate) async fn detail(exec: &dyn Executor, page: Page) -> Result<PageDetail, KbError> {
    let modules = list_live(exec, &page.id).await?;
    let section = section_refs(exec).await?.remove(&page.section_id);
    Ok(PageDetail {
        page,
        section,
        modules,
    })
}

async fn ensure_section(exec: &dyn Executor, section_id: &str) -> Result<(), KbError> {
    exec.query_one(
        "SELECT id FROM sections WHERE id = ?",
        vec![value::text(section_id)],
    )
    .await?
    .map(|_| ())
    .ok_or_else(|| KbError::not_found("Section", section_id))
}

async fn ensure_slug_free(
    exec: &dyn Executor,
    slug: &str,
    except_id: Option<&str>,
) -> Result<(), KbError> {
    let owner = exec
        .query_one("SELECT id FROM pages WHERE slug = ?", vec![value::text(slug)])
        .await?;
    match owner {
        Some(row) if Some(row.text(0)?.as_str()) != except_id => Err(KbError::Conflict(format!(
            "A page with slug '{slug}' already exists"
        ))),
        _ => Ok(()),
    }
}

fn require_title(title: &str) -> Result<(), KbError> {
    if title.trim().is_empty() {
        Err(KbError::BadRequest("Page title cannot be empty".into()))
    } else {
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewPage {
    pub section_id: String,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default = "default_true")]
    pub show_author: bool,
    #[serde(default = "default_true")]
    pub show_metrics: bool,
    #[serde(default)]
    pub icon: Option<String>,
    /// Instantiates the template's modules on the new page.
    #[serde(default)]
    pub template_id: Option<String>,
    /// Accepted for form compatibility; pages always start as drafts.
    #[serde(default)]
    pub status: Option<PageStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageUpdate {
    #[serde(default)]
    pub section_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub show_author: Option<bool>,
    #[serde(default)]
    pub show_metrics: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub icon: Option<Option<String>>,
}

#[derive(Debug, Clone, Copy)]
enum PageColumn {
    SectionId,
    Title,
    Slug,
    ShowAuthor,
    ShowMetrics,
    Icon,
    UpdatedById,
    UpdatedAt,
}

impl Column for PageColumn {
    fn name(self) -> &'static str {
        match self {
            PageColumn::SectionId => "section_id",
            PageColumn::Title => "title",
            PageColumn::Slug => "slug",
            PageColumn::ShowAuthor => "show_author",
            PageColumn::ShowMetrics => "show_metrics",
            PageColumn::Icon => "icon",
            PageColumn::UpdatedById => "updated_by_id",
            PageColumn::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageFilter {
    #[serde(default, alias = "sectionId")]
    pub section_id: Option<String>,
    #[serde(default)]
    pub status: Option<PageStatus>,
}

#[derive(Clone, Debug)]
pub struct PageService {
    db: SqliteProvider,
    activity: ActivityRecorder,
    files: FileStore,
}

impl PageService {
    pub fn new(db: SqliteProvider, activity: ActivityRecorder, files: FileStore) -> Self {
        Self {
            db,
            activity,
            files,
        }
    }

    /// Creates a draft page. Without an explicit slug one is derived from the
    /// title and suffixed until free; an explicit slug that is taken is a
    /// conflict.
    pub async fn create(&self, input: NewPage, actor: &Actor) -> Result<PageDetail, KbError> {
        require_title(&input.title)?;
        if matches!(input.status, Some(status) if status != PageStatus::Draft) {
            return Err(KbError::BadRequest(
                "New pages start as drafts; use the workflow actions to change status".into(),
            ));
        }

        let tx = self.db.begin().await?;
        let result = async {
            ensure_section(&tx, &input.section_id).await?;
            let slug = match input.slug.as_deref().filter(|s| !s.is_empty()) {
                Some(slug) => {
                    validate_slug(slug)?;
                    ensure_slug_free(&tx, slug, None).await?;
                    slug.to_string()
                }
                None => ensure_unique_slug(&tx, &slugify(&input.title)).await?,
            };

            let id = new_id();
            let now = now_ts();
            tx.execute(
                "INSERT INTO pages (id, section_id, title, slug, status, show_author, show_metrics, icon, views, created_by_id, updated_by_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)",
                vec![
                    value::text(id.clone()),
                    value::text(input.section_id.clone()),
                    value::text(input.title.trim()),
                    value::text(slug),
                    value::text(PageStatus::Draft.as_str()),
                    value::flag(input.show_author),
                    value::flag(input.show_metrics),
                    value::opt_text(input.icon.clone()),
                    value::opt_text(actor.user_id.clone()),
                    value::opt_text(actor.user_id.clone()),
                    value::text(now.clone()),
                    value::text(now),
                ],
            )
            .await?;

            if let Some(template_id) = &input.template_id {
                let drafts = templates::load_modules(&tx, template_id).await?;
                for (position, draft) in drafts.iter().enumerate() {
                    insert_module(&tx, &id, draft, draft.order.unwrap_or(position as i64)).await?;
                }
            }
            Ok::<_, KbError>(id)
        }
        .await;
        let id = tx.finish(result).await?;

        info!(page_id = %id, title = %input.title, "Page created");
        self.activity.record(
            ActivityEvent::new(actor, ActivityAction::Created, EntityType::Page, &id)
                .with_details(input.title.clone()),
        );
        self.get(&id).await
    }

    /// Live pages, newest first.
    pub async fn list(&self, filter: &PageFilter) -> Result<Vec<PageListItem>, KbError> {
        let mut tail = String::from("WHERE deleted_at IS NULL");
        let mut params = Vec::new();
        if let Some(section_id) = &filter.section_id {
            tail.push_str(" AND section_id = ?");
            params.push(value::text(section_id.clone()));
        }
        if let Some(status) = filter.status {
            tail.push_str(" AND status = ?");
            params.push(value::text(status.as_str()));
        }
        tail.push_str(" ORDER BY created_at DESC");
        let pages = query_pages(&self.db, &tail, params).await?;
        with_sections(&self.db, pages).await
    }

    pub async fn get(&self, id: &str) -> Result<PageDetail, KbError> {
        let page = fetch_page(&self.db, id, Scope::Live)
            .await?
            .ok_or_else(|| KbError::not_found("Page", id))?;
        detail(&self.db, page).await
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<PageDetail, KbError> {
        let page = query_pages(
            &self.db,
            "WHERE slug = ? AND deleted_at IS NULL",
            vec![value::text(slug)],
        )
        .await?
        .pop()
        .ok_or_else(|| KbError::not_found("Page", slug))?;
        detail(&self.db, page).await
    }

    /// Applies a partial update in one statement. Concurrent updates are
    /// last-write-wins per request.
    pub async fn update(
        &self,
        id: &str,
        patch: PageUpdate,
        actor: &Actor,
    ) -> Result<PageDetail, KbError> {
        fetch_page(&self.db, id, Scope::Live)
            .await?
            .ok_or_else(|| KbError::not_found("Page", id))?;

        let mut set = Assignments::new();
        if let Some(section_id) = patch.section_id {
            ensure_section(&self.db, &section_id).await?;
            set.set(PageColumn::SectionId, value::text(section_id));
        }
        if let Some(title) = patch.title {
            require_title(&title)?;
            set.set(PageColumn::Title, value::text(title.trim()));
        }
        if let Some(slug) = patch.slug {
            validate_slug(&slug)?;
            ensure_slug_free(&self.db, &slug, Some(id)).await?;
            set.set(PageColumn::Slug, value::text(slug));
        }
        if let Some(show_author) = patch.show_author {
            set.set(PageColumn::ShowAuthor, value::flag(show_author));
        }
        if let Some(show_metrics) = patch.show_metrics {
            set.set(PageColumn::ShowMetrics, value::flag(show_metrics));
        }
        if let Some(icon) = patch.icon {
            set.set(PageColumn::Icon, value::opt_text(icon));
        }
        set.set(PageColumn::UpdatedById, value::opt_text(actor.user_id.clone()))
            .set(PageColumn::UpdatedAt, value::text(now_ts()));

        let (sql, params) = set.into_update("pages", "id", value::text(id));
        self.db.execute(&sql, params).await?;

        self.activity.record(ActivityEvent::new(
            actor,
            ActivityAction::Updated,
            EntityType::Page,
            id,
        ));
        self.get(id).await
    }

    /// Moves a page along the workflow. The update is conditional on the
    /// status that was checked, so two racing transitions cannot both apply.
    pub async fn transition(
        &self,
        id: &str,
        action: WorkflowAction,
        actor: &Actor,
    ) -> Result<PageDetail, KbError> {
        let page = fetch_page(&self.db, id, Scope::Live)
            .await?
            .ok_or_else(|| KbError::not_found("Page", id))?;
        let to = workflow::transition(page.status, action)?;
        let now = now_ts();
        let actor_id = value::opt_text(actor.user_id.clone());

        let (sql, params) = match action {
            WorkflowAction::Approve | WorkflowAction::Reject => (
                "UPDATE pages SET status = ?, reviewed_by_id = ?, reviewed_at = ?, updated_at = ? WHERE id = ? AND status = ? AND deleted_at IS NULL",
                vec![
                    value::text(to.as_str()),
                    actor_id,
                    value::text(now.clone()),
                    value::text(now),
                    value::text(id),
                    value::text(page.status.as_str()),
                ],
            ),
            WorkflowAction::Publish | WorkflowAction::Archive => (
                "UPDATE pages SET status = ?, updated_by_id = ?, updated_at = ? WHERE id = ? AND status = ? AND deleted_at IS NULL",
                vec![
                    value::text(to.as_str()),
                    actor_id,
                    value::text(now),
                    value::text(id),
                    value::text(page.status.as_str()),
                ],
            ),
            WorkflowAction::SubmitForReview => (
                "UPDATE pages SET status = ?, updated_at = ? WHERE id = ? AND status = ? AND deleted_at IS NULL",
                vec![
                    value::text(to.as_str()),
                    value::text(now),
                    value::text(id),
                    value::text(page.status.as_str()),
                ],
            ),
        };
        if self.db.execute(sql, params).await? == 0 {
            return Err(KbError::Conflict(format!(
                "Page '{id}' changed status while the request was in flight"
            )));
        }

        info!(page_id = %id, from = %page.status, to = %to, "Page status changed");
        self.activity.record(
            ActivityEvent::new(actor, action.activity(), EntityType::Page, id)
                .with_details(format!("{} -> {}", page.status, to)),
        );
        self.get(id).await
    }

    /// Soft-deletes a page. Its modules and versions stay untouched so a
    /// restore brings everything back.
    pub async fn trash(&self, id: &str, actor: &Actor) -> Result<(), KbError> {
        let now = now_ts();
        let affected = self
            .db
            .execute(
                "UPDATE pages SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
                vec![value::text(now.clone()), value::text(now), value::text(id)],
            )
            .await?;
        if affected == 0 {
            return Err(KbError::not_found("Page", id));
        }
        info!(page_id = %id, "Page moved to trash");
        self.activity.record(ActivityEvent::new(
            actor,
            ActivityAction::Trashed,
            EntityType::Page,
            id,
        ));
        Ok(())
    }

    /// Trashed pages, most recently deleted first.
    pub async fn list_trashed(&self) -> Result<Vec<PageListItem>, KbError> {
        let pages = query_pages(
            &self.db,
            "WHERE deleted_at IS NOT NULL ORDER BY deleted_at DESC",
            Vec::new(),
        )
        .await?;
        with_sections(&self.db, pages).await
    }

    pub async fn restore(&self, id: &str, actor: &Actor) -> Result<PageDetail, KbError> {
        let affected = self
            .db
            .execute(
                "UPDATE pages SET deleted_at = NULL, updated_at = ? WHERE id = ? AND deleted_at IS NOT NULL",
                vec![value::text(now_ts()), value::text(id)],
            )
            .await?;
        if affected == 0 {
            return Err(KbError::NotFound(format!("Page '{id}' is not in the trash")));
        }
        info!(page_id = %id, "Page restored from trash");
        self.activity.record(ActivityEvent::new(
            actor,
            ActivityAction::Restored,
            EntityType::Page,
            id,
        ));
        self.get(id).await
    }

    /// Removes a page, all of its modules and versions for good, then deletes
    /// the uploaded files its modules referenced.
    pub async fn permanent_delete(&self, id: &str, actor: &Actor) -> Result<(), KbError> {
        let tx = self.db.begin().await?;
        let result = async {
            fetch_page(&tx, id, Scope::Any)
                .await?
                .ok_or_else(|| KbError::not_found("Page", id))?;
            let rows = tx
                .query(
                    "SELECT file_path FROM modules WHERE page_id = ? AND file_path IS NOT NULL",
                    vec![value::text(id)],
                )
                .await?;
            let mut paths = Vec::with_capacity(rows.len());
            for row in &rows {
                paths.push(row.text(0)?);
            }
            tx.execute("DELETE FROM modules WHERE page_id = ?", vec![value::text(id)])
                .await?;
            tx.execute(
                "DELETE FROM page_versions WHERE page_id = ?",
                vec![value::text(id)],
            )
            .await?;
            tx.execute("DELETE FROM pages WHERE id = ?", vec![value::text(id)])
                .await?;
            Ok::<_, KbError>(paths)
        }
        .await;
        let paths = tx.finish(result).await?;

        let removed = modules::release_files(&self.db, &self.files, &paths).await;
        info!(page_id = %id, files = removed, "Page permanently deleted");
        self.activity.record(ActivityEvent::new(
            actor,
            ActivityAction::PermanentlyDeleted,
            EntityType::Page,
            id,
        ));
        Ok(())
    }

    /// Copies a live page and its live modules into a new draft.
    pub async fn duplicate(&self, id: &str, actor: &Actor) -> Result<PageDetail, KbError> {
        let tx = self.db.begin().await?;
        let result = async {
            let source = fetch_page(&tx, id, Scope::Live)
                .await?
                .ok_or_else(|| KbError::not_found("Page", id))?;
            let source_modules = modules::list_live(&tx, id).await?;
            let slug = ensure_unique_slug(&tx, &format!("{}-copy", source.slug)).await?;

            let copy_id = new_id();
            let now = now_ts();
            tx.execute(
                "INSERT INTO pages (id, section_id, title, slug, status, show_author, show_metrics, icon, views, created_by_id, updated_by_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)",
                vec![
                    value::text(copy_id.clone()),
                    value::text(source.section_id.clone()),
                    value::text(format!("{} (Copy)", source.title)),
                    value::text(slug),
                    value::text(PageStatus::Draft.as_str()),
                    value::flag(source.show_author),
                    value::flag(source.show_metrics),
                    value::opt_text(source.icon.clone()),
                    value::opt_text(actor.user_id.clone()),
                    value::opt_text(actor.user_id.clone()),
                    value::text(now.clone()),
                    value::text(now),
                ],
            )
            .await?;
            for module in &source_modules {
                insert_module(&tx, &copy_id, &ModuleDraft::from(module), module.order).await?;
            }
            Ok::<_, KbError>(copy_id)
        }
        .await;
        let copy_id = tx.finish(result).await?;

        info!(source_id = %id, page_id = %copy_id, "Page duplicated");
        self.activity.record(
            ActivityEvent::new(actor, ActivityAction::Duplicated, EntityType::Page, &copy_id)
                .with_details(format!("copied from {id}")),
        );
        self.get(&copy_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn update_whitelist_excludes_status_and_bookkeeping() {
        for key in ["status", "views", "created_by_id", "deleted_at", "id"] {
            let body = json!({ key: "x" });
            assert!(
                serde_json::from_value::<PageUpdate>(body).is_err(),
                "'{key}' must not be writable"
            );
        }
    }

    #[test]
    fn new_page_defaults() {
        let input: NewPage = serde_json::from_value(json!({
            "section_id": "s1",
            "title": "Getting Started"
        }))
        .unwrap();
        assert!(input.show_author);
        assert!(input.show_metrics);
        assert!(input.slug.is_none());
        assert!(input.template_id.is_none());
    }

    #[test]
    fn filter_accepts_camel_case_section() {
        let filter: PageFilter = serde_json::from_value(json!({"sectionId": "s1"})).unwrap();
        assert_eq!(filter.section_id.as_deref(), Some("s1"));
    }
}
