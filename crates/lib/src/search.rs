//! # Public Catalog
//!
//! Read-only views for the reader site. Only live, published pages are ever
//! returned, and only sections that are visible to anonymous readers.

use crate::errors::KbError;
use crate::pages::{detail, query_pages, with_sections, PageDetail, PageListItem};
use crate::providers::db::sqlite::{value, Executor, RowExt, SqliteProvider};
use crate::sections::{published_section, PublishedSection};
use std::collections::HashSet;
use tracing::debug;

pub const PUBLISHED_LIMIT: usize = 50;
pub const RECENT_LIMIT: usize = 10;
pub const SEARCH_LIMIT: usize = 20;
/// Queries shorter than this (after trimming) return nothing.
pub const MIN_QUERY_CHARS: usize = 2;

const PUBLISHED_LIVE: &str = "status = 'published' AND deleted_at IS NULL";

#[derive(Clone, Debug)]
pub struct PublicCatalog {
    db: SqliteProvider,
}

impl PublicCatalog {
    pub fn new(db: SqliteProvider) -> Self {
        Self { db }
    }

    /// Published pages, most recently updated first.
    pub async fn published(&self) -> Result<Vec<PageListItem>, KbError> {
        let pages = query_pages(
            &self.db,
            &format!("WHERE {PUBLISHED_LIVE} ORDER BY updated_at DESC LIMIT {PUBLISHED_LIMIT}"),
            Vec::new(),
        )
        .await?;
        with_sections(&self.db, pages).await
    }

    /// Published pages, most recently created first.
    pub async fn recent(&self) -> Result<Vec<PageListItem>, KbError> {
        let pages = query_pages(
            &self.db,
            &format!("WHERE {PUBLISHED_LIVE} ORDER BY created_at DESC LIMIT {RECENT_LIMIT}"),
            Vec::new(),
        )
        .await?;
        with_sections(&self.db, pages).await
    }

    /// Case-insensitive substring search over page titles and the content or
    /// title of live modules. Title hits come first.
    pub async fn search(&self, raw_query: &str) -> Result<Vec<PageListItem>, KbError> {
        let query = raw_query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Ok(Vec::new());
        }
        let pattern = format!("%{}%", query.to_lowercase());
        debug!(query, "Public search");

        let mut pages = query_pages(
            &self.db,
            &format!(
                "WHERE {PUBLISHED_LIVE} AND LOWER(title) LIKE ? ORDER BY updated_at DESC LIMIT {SEARCH_LIMIT}"
            ),
            vec![value::text(pattern.clone())],
        )
        .await?;

        if pages.len() < SEARCH_LIMIT {
            let rows = self
                .db
                .query(
                    "SELECT DISTINCT page_id FROM modules WHERE deleted_at IS NULL AND (LOWER(content) LIKE ? OR LOWER(title) LIKE ?)",
                    vec![value::text(pattern.clone()), value::text(pattern)],
                )
                .await?;
            let mut seen: HashSet<String> = pages.iter().map(|p| p.id.clone()).collect();
            for row in &rows {
                if pages.len() >= SEARCH_LIMIT {
                    break;
                }
                let page_id = row.text(0)?;
                if !seen.insert(page_id.clone()) {
                    continue;
                }
                if let Some(page) = query_pages(
                    &self.db,
                    &format!("WHERE id = ? AND {PUBLISHED_LIVE}"),
                    vec![value::text(page_id)],
                )
                .await?
                .pop()
                {
                    pages.push(page);
                }
            }
        }
        with_sections(&self.db, pages).await
    }

    /// A published page with its modules. Each read counts as a view.
    pub async fn page_by_slug(&self, slug: &str) -> Result<PageDetail, KbError> {
        let page = query_pages(
            &self.db,
            &format!("WHERE slug = ? AND {PUBLISHED_LIVE}"),
            vec![value::text(slug)],
        )
        .await?
        .pop()
        .ok_or_else(|| KbError::not_found("Page", slug))?;
        self.db
            .execute(
                "UPDATE pages SET views = views + 1 WHERE id = ?",
                vec![value::text(page.id.clone())],
            )
            .await?;
        let mut detail = detail(&self.db, page).await?;
        detail.page.views += 1;
        Ok(detail)
    }

    /// A public section with its published pages. Hidden or role-restricted
    /// sections are reported as missing.
    pub async fn section_by_slug(&self, slug: &str) -> Result<PublishedSection, KbError> {
        let found = published_section(&self.db, slug).await?;
        if !found.section.visible || !found.section.roles_allowed.is_empty() {
            return Err(KbError::not_found("Section", slug));
        }
        Ok(found)
    }

    /// Whether the database answers a trivial query.
    pub async fn ping(&self) -> bool {
        self.db.query_one("SELECT 1", Vec::new()).await.is_ok()
    }
}
