//! # Sections
//!
//! Top-level content categories, optionally nested under a parent section.
//! Visibility for readers is controlled by `visible` and `roles_allowed`
//! (empty means public).

use crate::activity::{ActivityAction, ActivityEvent, ActivityRecorder, EntityType};
use crate::columns::{Assignments, Column};
use crate::errors::KbError;
use crate::pages::{query_pages, Page};
use crate::providers::db::sqlite::{value, Executor, RowExt, SqliteProvider};
use crate::slug::validate_slug;
use crate::types::{double_option, new_id, now_ts, Actor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::info;
use turso::Row;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub route: Option<String>,
    pub roles_allowed: Vec<String>,
    pub order: i64,
    pub visible: bool,
    pub icon: Option<String>,
    pub parent_id: Option<String>,
    pub show_on_homepage: bool,
    pub homepage_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const SECTION_COLUMNS: &str = "id, name, slug, route, roles_allowed, sort_order, visible, icon, parent_id, show_on_homepage, homepage_order, created_at, updated_at";

impl TryFrom<&Row> for Section {
    type Error = KbError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        let roles_allowed = match row.opt_text(4)? {
            Some(raw) if !raw.is_empty() => serde_json::from_str(&raw)?,
            _ => Vec::new(),
        };
        Ok(Section {
            id: row.text(0)?,
            name: row.text(1)?,
            slug: row.text(2)?,
            route: row.opt_text(3)?,
            roles_allowed,
            order: row.int(5)?,
            visible: row.flag(6)?,
            icon: row.opt_text(7)?,
            parent_id: row.opt_text(8)?,
            show_on_homepage: row.flag(9)?,
            homepage_order: row.int(10)?,
            created_at: row.ts(11)?,
            updated_at: row.ts(12)?,
        })
    }
}

impl Section {
    /// Whether a caller holding `roles` may see this section.
    pub fn is_visible_to(&self, roles: &[String]) -> bool {
        self.roles_allowed.is_empty() || self.roles_allowed.iter().any(|r| roles.contains(r))
    }
}

/// The `{id, name, slug}` view attached to pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRef {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSummary {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionWithPages {
    #[serde(flatten)]
    pub section: Section,
    pub pages: Vec<PageSummary>,
}

/// A section with its published pages, for readers.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedSection {
    #[serde(flatten)]
    pub section: Section,
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionNode {
    #[serde(flatten)]
    pub section: Section,
    pub children: Vec<SectionNode>,
}

/// Accepts `["admin", "viewer"]`, `"admin, viewer"` or `null`.
fn roles_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Csv(String),
    }
    let roles = match Option::<Raw>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Raw::List(list)) => list,
        Some(Raw::Csv(csv)) => csv.split(',').map(str::to_string).collect(),
    };
    Ok(roles
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect())
}

fn opt_roles_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    roles_list(deserializer).map(Some)
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewSection {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default, deserialize_with = "roles_list")]
    pub roles_allowed: Vec<String>,
    #[serde(default)]
    pub order: i64,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub show_on_homepage: bool,
    #[serde(default)]
    pub homepage_order: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub route: Option<Option<String>>,
    #[serde(default, deserialize_with = "opt_roles_list")]
    pub roles_allowed: Option<Vec<String>>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub visible: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub icon: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<String>>,
    #[serde(default)]
    pub show_on_homepage: Option<bool>,
    #[serde(default)]
    pub homepage_order: Option<i64>,
}

#[derive(Debug, Clone, Copy)]
enum SectionColumn {
    Name,
    Slug,
    Route,
    RolesAllowed,
    SortOrder,
    Visible,
    Icon,
    ParentId,
    ShowOnHomepage,
    HomepageOrder,
    UpdatedAt,
}

impl Column for SectionColumn {
    fn name(self) -> &'static str {
        match self {
            SectionColumn::Name => "name",
            SectionColumn::Slug => "slug",
            SectionColumn::Route => "route",
            SectionColumn::RolesAllowed => "roles_allowed",
            SectionColumn::SortOrder => "sort_order",
            SectionColumn::Visible => "visible",
            SectionColumn::Icon => "icon",
            SectionColumn::ParentId => "parent_id",
            SectionColumn::ShowOnHomepage => "show_on_homepage",
            SectionColumn::HomepageOrder => "homepage_order",
            SectionColumn::UpdatedAt => "updated_at",
        }
    }
}

fn roles_value(roles: &[String]) -> Result<turso::Value, KbError> {
    if roles.is_empty() {
        Ok(turso::Value::Null)
    } else {
        Ok(value::text(serde_json::to_string(roles)?))
    }
}

fn require_name(name: &str) -> Result<(), KbError> {
    if name.trim().is_empty() {
        Err(KbError::BadRequest("Section name cannot be empty".into()))
    } else {
        Ok(())
    }
}

/// Every section keyed by id, as `{id, name, slug}`.
pub(crate) async fn section_refs(
    exec: &dyn Executor,
) -> Result<HashMap<String, SectionRef>, KbError> {
    let rows = exec.query("SELECT id, name, slug FROM sections", Vec::new()).await?;
    let mut refs = HashMap::with_capacity(rows.len());
    for row in &rows {
        let id = row.text(0)?;
        refs.insert(
            id.clone(),
            SectionRef {
                id,
                name: row.text(1)?,
                slug: row.text(2)?,
            },
        );
    }
    Ok(refs)
}

pub(crate) async fn published_section(
    exec: &dyn Executor,
    slug: &str,
) -> Result<PublishedSection, KbError> {
    let section = exec
        .query_one(
            &format!("SELECT {SECTION_COLUMNS} FROM sections WHERE slug = ?"),
            vec![value::text(slug)],
        )
        .await?
        .as_ref()
        .map(Section::try_from)
        .transpose()?
        .ok_or_else(|| KbError::not_found("Section", slug))?;
    let pages = query_pages(
        exec,
        "WHERE section_id = ? AND status = 'published' AND deleted_at IS NULL ORDER BY created_at DESC",
        vec![value::text(section.id.clone())],
    )
    .await?;
    Ok(PublishedSection { section, pages })
}

async fn all_sections(exec: &dyn Executor) -> Result<Vec<Section>, KbError> {
    let rows = exec
        .query(
            &format!("SELECT {SECTION_COLUMNS} FROM sections ORDER BY sort_order ASC, name ASC"),
            Vec::new(),
        )
        .await?;
    rows.iter().map(Section::try_from).collect()
}

/// Nests `sections` under their parents, keeping the incoming order.
/// Sections whose parent is not in the list are dropped along with their
/// subtree.
pub fn build_tree(sections: Vec<Section>) -> Vec<SectionNode> {
    let mut by_parent: HashMap<Option<String>, Vec<Section>> = HashMap::new();
    for section in sections {
        by_parent
            .entry(section.parent_id.clone())
            .or_default()
            .push(section);
    }

    fn attach(
        parent: Option<String>,
        by_parent: &mut HashMap<Option<String>, Vec<Section>>,
        seen: &mut HashSet<String>,
    ) -> Vec<SectionNode> {
        let children = by_parent.remove(&parent).unwrap_or_default();
        children
            .into_iter()
            .filter_map(|section| {
                if !seen.insert(section.id.clone()) {
                    return None;
                }
                let children = attach(Some(section.id.clone()), by_parent, seen);
                Some(SectionNode { section, children })
            })
            .collect()
    }

    let mut seen = HashSet::new();
    attach(None, &mut by_parent, &mut seen)
}

#[derive(Clone, Debug)]
pub struct SectionService {
    db: SqliteProvider,
    activity: ActivityRecorder,
}

impl SectionService {
    pub fn new(db: SqliteProvider, activity: ActivityRecorder) -> Self {
        Self { db, activity }
    }

    async fn fetch(&self, id: &str) -> Result<Section, KbError> {
        self.db
            .query_one(
                &format!("SELECT {SECTION_COLUMNS} FROM sections WHERE id = ?"),
                vec![value::text(id)],
            )
            .await?
            .as_ref()
            .map(Section::try_from)
            .transpose()?
            .ok_or_else(|| KbError::not_found("Section", id))
    }

    async fn ensure_slug_free(&self, slug: &str, except_id: Option<&str>) -> Result<(), KbError> {
        let owner = self
            .db
            .query_one("SELECT id FROM sections WHERE slug = ?", vec![value::text(slug)])
            .await?;
        match owner {
            Some(row) if Some(row.text(0)?.as_str()) != except_id => Err(KbError::Conflict(
                format!("A section with slug '{slug}' already exists"),
            )),
            _ => Ok(()),
        }
    }

    /// Rejects a parent that does not exist, or that would make `id` its own
    /// ancestor.
    async fn check_parent(&self, id: Option<&str>, parent_id: &str) -> Result<(), KbError> {
        let mut cursor = Some(parent_id.to_string());
        let mut hops = 0;
        while let Some(current) = cursor {
            if Some(current.as_str()) == id {
                return Err(KbError::BadRequest(
                    "A section cannot be nested under itself".into(),
                ));
            }
            let parent = match self.fetch(&current).await {
                Ok(parent) => parent,
                Err(KbError::NotFound(_)) if hops == 0 => {
                    return Err(KbError::BadRequest(format!(
                        "Parent section '{parent_id}' does not exist"
                    )))
                }
                Err(e) => return Err(e),
            };
            cursor = parent.parent_id;
            hops += 1;
        }
        Ok(())
    }

    async fn page_summaries(&self) -> Result<HashMap<String, Vec<PageSummary>>, KbError> {
        let rows = self
            .db
            .query(
                "SELECT id, section_id, title, slug, status FROM pages WHERE deleted_at IS NULL ORDER BY created_at DESC",
                Vec::new(),
            )
            .await?;
        let mut by_section: HashMap<String, Vec<PageSummary>> = HashMap::new();
        for row in &rows {
            by_section
                .entry(row.text(1)?)
                .or_default()
                .push(PageSummary {
                    id: row.text(0)?,
                    title: row.text(2)?,
                    slug: row.text(3)?,
                    status: row.text(4)?,
                });
        }
        Ok(by_section)
    }

    pub async fn create(&self, input: NewSection, actor: &Actor) -> Result<Section, KbError> {
        require_name(&input.name)?;
        validate_slug(&input.slug)?;
        self.ensure_slug_free(&input.slug, None).await?;
        if let Some(parent_id) = &input.parent_id {
            self.check_parent(None, parent_id).await?;
        }

        let id = new_id();
        let now = now_ts();
        self.db
            .execute(
                &format!("INSERT INTO sections ({SECTION_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"),
                vec![
                    value::text(id.clone()),
                    value::text(input.name.trim()),
                    value::text(input.slug.clone()),
                    value::opt_text(input.route.clone()),
                    roles_value(&input.roles_allowed)?,
                    value::int(input.order),
                    value::flag(input.visible),
                    value::opt_text(input.icon.clone()),
                    value::opt_text(input.parent_id.clone()),
                    value::flag(input.show_on_homepage),
                    value::int(input.homepage_order),
                    value::text(now.clone()),
                    value::text(now),
                ],
            )
            .await?;

        info!(section_id = %id, slug = %input.slug, "Section created");
        self.activity.record(
            ActivityEvent::new(actor, ActivityAction::Created, EntityType::Section, &id)
                .with_details(input.name.clone()),
        );
        self.fetch(&id).await
    }

    /// All sections in display order, each with its live pages.
    pub async fn list(&self) -> Result<Vec<SectionWithPages>, KbError> {
        let mut pages = self.page_summaries().await?;
        Ok(all_sections(&self.db)
            .await?
            .into_iter()
            .map(|section| SectionWithPages {
                pages: pages.remove(&section.id).unwrap_or_default(),
                section,
            })
            .collect())
    }

    pub async fn get(&self, id: &str) -> Result<SectionWithPages, KbError> {
        let section = self.fetch(id).await?;
        let pages = self.page_summaries().await?.remove(id).unwrap_or_default();
        Ok(SectionWithPages { section, pages })
    }

    /// A section by slug with only its published, live pages.
    pub async fn get_published_by_slug(&self, slug: &str) -> Result<PublishedSection, KbError> {
        published_section(&self.db, slug).await
    }

    /// Visible sections the caller may see, nested by parent. With
    /// `see_all` every section is returned, hidden ones included.
    pub async fn tree(&self, roles: &[String], see_all: bool) -> Result<Vec<SectionNode>, KbError> {
        let sections = all_sections(&self.db)
            .await?
            .into_iter()
            .filter(|s| see_all || (s.visible && s.is_visible_to(roles)))
            .collect();
        Ok(build_tree(sections))
    }

    pub async fn update(
        &self,
        id: &str,
        patch: SectionUpdate,
        actor: &Actor,
    ) -> Result<Section, KbError> {
        self.fetch(id).await?;

        let mut set = Assignments::new();
        if let Some(name) = patch.name {
            require_name(&name)?;
            set.set(SectionColumn::Name, value::text(name.trim()));
        }
        if let Some(slug) = patch.slug {
            validate_slug(&slug)?;
            self.ensure_slug_free(&slug, Some(id)).await?;
            set.set(SectionColumn::Slug, value::text(slug));
        }
        if let Some(route) = patch.route {
            set.set(SectionColumn::Route, value::opt_text(route));
        }
        if let Some(roles) = patch.roles_allowed {
            set.set(SectionColumn::RolesAllowed, roles_value(&roles)?);
        }
        if let Some(order) = patch.order {
            set.set(SectionColumn::SortOrder, value::int(order));
        }
        if let Some(visible) = patch.visible {
            set.set(SectionColumn::Visible, value::flag(visible));
        }
        if let Some(icon) = patch.icon {
            set.set(SectionColumn::Icon, value::opt_text(icon));
        }
        if let Some(parent_id) = patch.parent_id {
            if let Some(parent_id) = &parent_id {
                self.check_parent(Some(id), parent_id).await?;
            }
            set.set(SectionColumn::ParentId, value::opt_text(parent_id));
        }
        if let Some(show) = patch.show_on_homepage {
            set.set(SectionColumn::ShowOnHomepage, value::flag(show));
        }
        if let Some(order) = patch.homepage_order {
            set.set(SectionColumn::HomepageOrder, value::int(order));
        }
        set.set(SectionColumn::UpdatedAt, value::text(now_ts()));

        let (sql, params) = set.into_update("sections", "id", value::text(id));
        self.db.execute(&sql, params).await?;

        self.activity.record(ActivityEvent::new(
            actor,
            ActivityAction::Updated,
            EntityType::Section,
            id,
        ));
        self.fetch(id).await
    }

    /// Hard-deletes an empty section. Sections that still own pages (live or
    /// trashed) or child sections cannot be deleted.
    pub async fn delete(&self, id: &str, actor: &Actor) -> Result<(), KbError> {
        self.fetch(id).await?;
        let pages = self
            .db
            .query_one(
                "SELECT COUNT(*) FROM pages WHERE section_id = ?",
                vec![value::text(id)],
            )
            .await?
            .map(|row| row.int(0))
            .transpose()?
            .unwrap_or(0);
        let children = self
            .db
            .query_one(
                "SELECT COUNT(*) FROM sections WHERE parent_id = ?",
                vec![value::text(id)],
            )
            .await?
            .map(|row| row.int(0))
            .transpose()?
            .unwrap_or(0);
        if pages > 0 || children > 0 {
            return Err(KbError::Conflict(format!(
                "Section '{id}' still has {pages} page(s) and {children} subsection(s)"
            )));
        }

        self.db
            .execute("DELETE FROM sections WHERE id = ?", vec![value::text(id)])
            .await?;
        info!(section_id = %id, "Section deleted");
        self.activity.record(ActivityEvent::new(
            actor,
            ActivityAction::Deleted,
            EntityType::Section,
            id,
        ));
        Ok(())
    }

    /// Rewrites section positions to `0..n` in the given order, atomically.
    pub async fn reorder(
        &self,
        ordered_ids: &[String],
        actor: &Actor,
    ) -> Result<Vec<SectionWithPages>, KbError> {
        let tx = self.db.begin().await?;
        let result = async {
            let now = now_ts();
            for (position, id) in ordered_ids.iter().enumerate() {
                let affected = tx
                    .execute(
                        "UPDATE sections SET sort_order = ?, updated_at = ? WHERE id = ?",
                        vec![
                            value::int(position as i64),
                            value::text(now.clone()),
                            value::text(id.clone()),
                        ],
                    )
                    .await?;
                if affected == 0 {
                    return Err(KbError::BadRequest(format!("Section '{id}' does not exist")));
                }
            }
            Ok(())
        }
        .await;
        tx.finish(result).await?;

        self.activity.record(ActivityEvent::new(
            actor,
            ActivityAction::Reordered,
            EntityType::Section,
            "*",
        ));
        self.list().await
    }
}
