//! # Content Modules
//!
//! A module is one typed block of a page. Its payload is a tagged union keyed
//! on `type`; each variant owns exactly the fields it may carry, so a TABLE
//! module cannot hold a code `language` and a PDF cannot exist without a file.
//! In the database the payload is spread over `content`, `file_path`, `url`
//! and `metadata`; [`ModuleBody::from_columns`] re-validates it on every read.

use crate::activity::{ActivityAction, ActivityEvent, ActivityRecorder, EntityType};
use crate::columns::{Assignments, Column};
use crate::errors::KbError;
use crate::files::FileStore;
use crate::providers::db::sqlite::{value, Executor, RowExt, SqliteProvider};
use crate::types::{double_option, new_id, now_ts, Actor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info, warn};
use turso::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModuleKind {
    Text,
    Pdf,
    Video,
    Url,
    Image,
    Code,
    Table,
    Embed,
}

impl ModuleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleKind::Text => "TEXT",
            ModuleKind::Pdf => "PDF",
            ModuleKind::Video => "VIDEO",
            ModuleKind::Url => "URL",
            ModuleKind::Image => "IMAGE",
            ModuleKind::Code => "CODE",
            ModuleKind::Table => "TABLE",
            ModuleKind::Embed => "EMBED",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableMeta {
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbedMeta {
    #[serde(rename = "embedUrl")]
    pub embed_url: String,
}

/// The type-specific payload of a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ModuleBody {
    Text {
        content: String,
    },
    Pdf {
        file_path: String,
    },
    Video {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Url {
        url: String,
    },
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Code {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<CodeMeta>,
    },
    Table {
        metadata: TableMeta,
    },
    Embed {
        metadata: EmbedMeta,
    },
}

/// The storage shape of a module payload.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyColumns {
    pub kind: ModuleKind,
    pub content: Option<String>,
    pub file_path: Option<String>,
    pub url: Option<String>,
    pub metadata: Option<JsonValue>,
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn non_empty(field: Option<&String>) -> bool {
    field.is_some_and(|s| !s.trim().is_empty())
}

impl ModuleBody {
    pub fn kind(&self) -> ModuleKind {
        match self {
            ModuleBody::Text { .. } => ModuleKind::Text,
            ModuleBody::Pdf { .. } => ModuleKind::Pdf,
            ModuleBody::Video { .. } => ModuleKind::Video,
            ModuleBody::Url { .. } => ModuleKind::Url,
            ModuleBody::Image { .. } => ModuleKind::Image,
            ModuleBody::Code { .. } => ModuleKind::Code,
            ModuleBody::Table { .. } => ModuleKind::Table,
            ModuleBody::Embed { .. } => ModuleKind::Embed,
        }
    }

    /// The uploaded file this module points at, if any.
    pub fn file_path(&self) -> Option<&str> {
        match self {
            ModuleBody::Pdf { file_path } => Some(file_path),
            ModuleBody::Video { file_path, .. } | ModuleBody::Image { file_path, .. } => {
                file_path.as_deref()
            }
            _ => None,
        }
    }

    /// Checks the constraints serde cannot express.
    pub fn validate(&self) -> Result<(), KbError> {
        let bad = |msg: String| Err(KbError::BadRequest(msg));
        match self {
            ModuleBody::Pdf { file_path } if file_path.trim().is_empty() => {
                bad("PDF modules require a file_path".into())
            }
            ModuleBody::Video { file_path, url } | ModuleBody::Image { file_path, url }
                if !non_empty(file_path.as_ref()) && !non_empty(url.as_ref()) =>
            {
                bad(format!(
                    "{} modules require a file_path or a url",
                    self.kind().as_str()
                ))
            }
            ModuleBody::Url { url } if !is_http_url(url) => {
                bad(format!("URL module link '{url}' must be http(s)"))
            }
            ModuleBody::Table { metadata } => {
                if metadata.headers.is_empty() {
                    return bad("TABLE modules require at least one header".into());
                }
                match metadata
                    .rows
                    .iter()
                    .position(|row| row.len() != metadata.headers.len())
                {
                    Some(i) => bad(format!(
                        "TABLE row {i} has {} cells but there are {} headers",
                        metadata.rows[i].len(),
                        metadata.headers.len()
                    )),
                    None => Ok(()),
                }
            }
            ModuleBody::Embed { metadata } if !is_http_url(&metadata.embed_url) => bad(format!(
                "EMBED url '{}' must be http(s)",
                metadata.embed_url
            )),
            _ => Ok(()),
        }
    }

    pub fn to_columns(&self) -> Result<BodyColumns, KbError> {
        let json = serde_json::to_value(self)?;
        let text = |key: &str| json.get(key).and_then(JsonValue::as_str).map(String::from);
        Ok(BodyColumns {
            kind: self.kind(),
            content: text("content"),
            file_path: text("file_path"),
            url: text("url"),
            metadata: json.get("metadata").cloned(),
        })
    }

    /// Rebuilds and validates a payload from its storage shape. Columns the
    /// variant does not own are ignored.
    pub fn from_columns(columns: BodyColumns) -> Result<Self, KbError> {
        let mut map = Map::new();
        map.insert("type".into(), JsonValue::String(columns.kind.as_str().into()));
        if let Some(content) = columns.content {
            map.insert("content".into(), JsonValue::String(content));
        }
        if let Some(file_path) = columns.file_path {
            map.insert("file_path".into(), JsonValue::String(file_path));
        }
        if let Some(url) = columns.url {
            map.insert("url".into(), JsonValue::String(url));
        }
        if let Some(metadata) = columns.metadata.filter(|m| !m.is_null()) {
            map.insert("metadata".into(), metadata);
        }
        let body: ModuleBody = serde_json::from_value(JsonValue::Object(map)).map_err(|e| {
            KbError::BadRequest(format!("Invalid {} module: {e}", columns.kind.as_str()))
        })?;
        body.validate()?;
        Ok(body)
    }
}

/// A stored module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub page_id: String,
    pub title: Option<String>,
    pub order: i64,
    #[serde(flatten)]
    pub body: ModuleBody,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const MODULE_COLUMNS: &str =
    "id, page_id, kind, content, file_path, url, title, metadata, sort_order, deleted_at, created_at, updated_at";

fn parse_kind(raw: &str) -> Result<ModuleKind, KbError> {
    serde_json::from_value(JsonValue::String(raw.to_string()))
        .map_err(|_| KbError::DataIntegrity(format!("Unknown module type '{raw}'")))
}

impl TryFrom<&Row> for Module {
    type Error = KbError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        let body = ModuleBody::from_columns(BodyColumns {
            kind: parse_kind(&row.text(2)?)?,
            content: row.opt_text(3)?,
            file_path: row.opt_text(4)?,
            url: row.opt_text(5)?,
            metadata: row.opt_json(7)?,
        })
        .map_err(|e| KbError::DataIntegrity(e.to_string()))?;
        Ok(Module {
            id: row.text(0)?,
            page_id: row.text(1)?,
            title: row.opt_text(6)?,
            order: row.int(8)?,
            body,
            deleted_at: row.opt_ts(9)?,
            created_at: row.ts(10)?,
            updated_at: row.ts(11)?,
        })
    }
}

/// A module that does not exist yet: the shape used by create requests,
/// templates and snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDraft {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(flatten)]
    pub body: ModuleBody,
}

impl From<&Module> for ModuleDraft {
    fn from(module: &Module) -> Self {
        Self {
            title: module.title.clone(),
            order: Some(module.order),
            body: module.body.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewModule {
    pub page_id: String,
    #[serde(flatten)]
    pub draft: ModuleDraft,
}

/// A partial update. Only these keys are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleUpdate {
    #[serde(default, rename = "type")]
    pub kind: Option<ModuleKind>,
    #[serde(default, deserialize_with = "double_option")]
    pub content: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub file_path: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub metadata: Option<Option<JsonValue>>,
    #[serde(default)]
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Copy)]
enum ModuleColumn {
    Kind,
    Content,
    FilePath,
    Url,
    Title,
    Metadata,
    SortOrder,
    UpdatedAt,
}

impl Column for ModuleColumn {
    fn name(self) -> &'static str {
        match self {
            ModuleColumn::Kind => "kind",
            ModuleColumn::Content => "content",
            ModuleColumn::FilePath => "file_path",
            ModuleColumn::Url => "url",
            ModuleColumn::Title => "title",
            ModuleColumn::Metadata => "metadata",
            ModuleColumn::SortOrder => "sort_order",
            ModuleColumn::UpdatedAt => "updated_at",
        }
    }
}

/// Live modules of a page in render order.
pub async fn list_live(exec: &dyn Executor, page_id: &str) -> Result<Vec<Module>, KbError> {
    let rows = exec
        .query(
            &format!(
                "SELECT {MODULE_COLUMNS} FROM modules WHERE page_id = ? AND deleted_at IS NULL ORDER BY sort_order ASC, created_at ASC"
            ),
            vec![value::text(page_id)],
        )
        .await?;
    rows.iter().map(Module::try_from).collect()
}

/// The position after the last live module of a page.
pub async fn next_position(exec: &dyn Executor, page_id: &str) -> Result<i64, KbError> {
    let row = exec
        .query_one(
            "SELECT COUNT(*), MAX(sort_order) FROM modules WHERE page_id = ? AND deleted_at IS NULL",
            vec![value::text(page_id)],
        )
        .await?;
    match row {
        Some(row) if row.int(0)? > 0 => Ok(row.int(1)? + 1),
        _ => Ok(0),
    }
}

/// Validates and inserts a module. Shared by module creation, templates,
/// duplication and version restore so every path enforces the same rules.
pub async fn insert_module(
    exec: &dyn Executor,
    page_id: &str,
    draft: &ModuleDraft,
    order: i64,
) -> Result<Module, KbError> {
    draft.body.validate()?;
    let columns = draft.body.to_columns()?;
    let id = new_id();
    let now = now_ts();
    exec.execute(
        "INSERT INTO modules (id, page_id, kind, content, file_path, url, title, metadata, sort_order, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        vec![
            value::text(id.clone()),
            value::text(page_id),
            value::text(columns.kind.as_str()),
            value::opt_text(columns.content),
            value::opt_text(columns.file_path),
            value::opt_text(columns.url),
            value::opt_text(draft.title.clone()),
            value::opt_json(columns.metadata.as_ref()),
            value::int(order),
            value::text(now.clone()),
            value::text(now),
        ],
    )
    .await?;
    fetch(exec, &id)
        .await?
        .ok_or_else(|| KbError::DataIntegrity(format!("Module '{id}' vanished after insert")))
}

async fn fetch(exec: &dyn Executor, id: &str) -> Result<Option<Module>, KbError> {
    exec.query_one(
        &format!("SELECT {MODULE_COLUMNS} FROM modules WHERE id = ? AND deleted_at IS NULL"),
        vec![value::text(id)],
    )
    .await?
    .as_ref()
    .map(Module::try_from)
    .transpose()
}

pub(crate) async fn ensure_live_page(exec: &dyn Executor, page_id: &str) -> Result<(), KbError> {
    exec.query_one(
        "SELECT id FROM pages WHERE id = ? AND deleted_at IS NULL",
        vec![value::text(page_id)],
    )
    .await?
    .map(|_| ())
    .ok_or_else(|| KbError::not_found("Page", page_id))
}

/// True when a live module or a template still points at `path`.
pub(crate) async fn file_in_use(exec: &dyn Executor, path: &str) -> Result<bool, KbError> {
    let module = exec
        .query_one(
            "SELECT 1 FROM modules WHERE file_path = ? AND deleted_at IS NULL LIMIT 1",
            vec![value::text(path)],
        )
        .await?;
    if module.is_some() {
        return Ok(true);
    }
    // Template modules are stored as JSON, so look for the encoded string.
    let encoded = serde_json::to_string(path)?;
    let template = exec
        .query_one(
            "SELECT 1 FROM page_templates WHERE instr(modules, ?) > 0 LIMIT 1",
            vec![value::text(encoded)],
        )
        .await?;
    Ok(template.is_some())
}

/// Deletes the managed uploads in `paths` that nothing references any more
/// and returns how many were removed. The write lock is held throughout so no
/// copy can start pointing at a file between the check and the unlink. A
/// failed check keeps the file.
pub(crate) async fn release_files(db: &SqliteProvider, files: &FileStore, paths: &[String]) -> usize {
    let mut unique: Vec<&String> = paths.iter().collect();
    unique.sort();
    unique.dedup();

    let _guard = db.exclusive().await;
    let mut removed = 0;
    for path in unique {
        match file_in_use(db, path).await {
            Ok(true) => debug!(path = %path, "Upload still referenced, keeping it"),
            Ok(false) => {
                if files.remove_managed(path).await {
                    removed += 1;
                }
            }
            Err(e) => warn!(error = %e, path = %path, "Could not check upload references, keeping it"),
        }
    }
    removed
}

#[derive(Clone, Debug)]
pub struct ModuleService {
    db: SqliteProvider,
    activity: ActivityRecorder,
    files: FileStore,
}

impl ModuleService {
    pub fn new(db: SqliteProvider, activity: ActivityRecorder, files: FileStore) -> Self {
        Self {
            db,
            activity,
            files,
        }
    }

    pub async fn create(&self, input: NewModule, actor: &Actor) -> Result<Module, KbError> {
        let tx = self.db.begin().await?;
        let result = async {
            ensure_live_page(&tx, &input.page_id).await?;
            let order = match input.draft.order {
                Some(order) => order,
                None => next_position(&tx, &input.page_id).await?,
            };
            insert_module(&tx, &input.page_id, &input.draft, order).await
        }
        .await;
        let module = tx.finish(result).await?;

        info!(module_id = %module.id, page_id = %module.page_id, "Module created");
        self.activity.record(
            ActivityEvent::new(actor, ActivityAction::Created, EntityType::Module, &module.id)
                .with_details(format!("page {}", module.page_id)),
        );
        Ok(module)
    }

    pub async fn list(&self, page_id: &str) -> Result<Vec<Module>, KbError> {
        list_live(&self.db, page_id).await
    }

    pub async fn get(&self, id: &str) -> Result<Module, KbError> {
        fetch(&self.db, id)
            .await?
            .ok_or_else(|| KbError::not_found("Module", id))
    }

    /// Overlays `patch` on the stored module and re-validates the result as a
    /// whole. Switching `type` rewrites every payload column so no field of
    /// the previous type survives.
    pub async fn update(
        &self,
        id: &str,
        patch: ModuleUpdate,
        actor: &Actor,
    ) -> Result<Module, KbError> {
        let current = self.get(id).await?;
        let stored = current.body.to_columns()?;
        let merged = BodyColumns {
            kind: patch.kind.unwrap_or(stored.kind),
            content: patch.content.unwrap_or(stored.content),
            file_path: patch.file_path.unwrap_or(stored.file_path),
            url: patch.url.unwrap_or(stored.url),
            metadata: patch.metadata.unwrap_or(stored.metadata),
        };
        let body = ModuleBody::from_columns(merged)?;
        let columns = body.to_columns()?;

        let mut set = Assignments::new();
        set.set(ModuleColumn::Kind, value::text(columns.kind.as_str()))
            .set(ModuleColumn::Content, value::opt_text(columns.content))
            .set(ModuleColumn::FilePath, value::opt_text(columns.file_path))
            .set(ModuleColumn::Url, value::opt_text(columns.url))
            .set(
                ModuleColumn::Metadata,
                value::opt_json(columns.metadata.as_ref()),
            );
        if let Some(title) = patch.title {
            set.set(ModuleColumn::Title, value::opt_text(title));
        }
        if let Some(order) = patch.order {
            set.set(ModuleColumn::SortOrder, value::int(order));
        }
        set.set(ModuleColumn::UpdatedAt, value::text(now_ts()));

        let (sql, params) = set.into_update("modules", "id", value::text(id));
        self.db.execute(&sql, params).await?;
        if let Some(previous) = current.body.file_path() {
            if body.file_path() != Some(previous) {
                release_files(&self.db, &self.files, &[previous.to_string()]).await;
            }
        }

        self.activity.record(
            ActivityEvent::new(actor, ActivityAction::Updated, EntityType::Module, id)
                .with_details(format!("page {}", current.page_id)),
        );
        self.get(id).await
    }

    /// Soft-deletes the module and removes its uploaded file, if it has one.
    pub async fn delete(&self, id: &str, actor: &Actor) -> Result<(), KbError> {
        let module = self.get(id).await?;
        let now = now_ts();
        self.db
            .execute(
                "UPDATE modules SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
                vec![value::text(now.clone()), value::text(now), value::text(id)],
            )
            .await?;
        if let Some(path) = module.body.file_path() {
            release_files(&self.db, &self.files, &[path.to_string()]).await;
        }

        info!(module_id = %id, "Module deleted");
        self.activity.record(
            ActivityEvent::new(actor, ActivityAction::Deleted, EntityType::Module, id)
                .with_details(format!("page {}", module.page_id)),
        );
        Ok(())
    }

    /// Rewrites the positions of a page's modules to `0..n` in the given order.
    /// Every id must be a live module of that page, otherwise nothing changes.
    pub async fn reorder(
        &self,
        page_id: &str,
        ordered_ids: &[String],
        actor: &Actor,
    ) -> Result<Vec<Module>, KbError> {
        let tx = self.db.begin().await?;
        let result = async {
            ensure_live_page(&tx, page_id).await?;
            let now = now_ts();
            for (position, id) in ordered_ids.iter().enumerate() {
                let affected = tx
                    .execute(
                        "UPDATE modules SET sort_order = ?, updated_at = ? WHERE id = ? AND page_id = ? AND deleted_at IS NULL",
                        vec![
                            value::int(position as i64),
                            value::text(now.clone()),
                            value::text(id.clone()),
                            value::text(page_id),
                        ],
                    )
                    .await?;
                if affected == 0 {
                    return Err(KbError::BadRequest(format!(
                        "Module '{id}' is not a live module of page '{page_id}'"
                    )));
                }
            }
            Ok(())
        }
        .await;
        tx.finish(result).await?;

        self.activity.record(ActivityEvent::new(
            actor,
            ActivityAction::Reordered,
            EntityType::Page,
            page_id,
        ));
        self.list(page_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: JsonValue) -> Result<ModuleBody, serde_json::Error> {
        serde_json::from_value(v)
    }

    #[test]
    fn parses_each_variant_from_wire_shape() {
        let text = parse(json!({"type": "TEXT", "content": "<p>hi</p>"})).unwrap();
        assert_eq!(text.kind(), ModuleKind::Text);

        let code = parse(json!({"type": "CODE", "content": "fn main() {}", "metadata": {"language": "rust"}})).unwrap();
        assert_eq!(
            code,
            ModuleBody::Code {
                content: "fn main() {}".into(),
                metadata: Some(CodeMeta {
                    language: Some("rust".into())
                })
            }
        );

        let embed = parse(json!({"type": "EMBED", "metadata": {"embedUrl": "https://youtube.com/embed/x"}})).unwrap();
        assert!(embed.validate().is_ok());
    }

    #[test]
    fn table_cannot_carry_a_language() {
        let err = parse(json!({
            "type": "TABLE",
            "metadata": {"headers": ["a"], "rows": [["1"]], "language": "rust"}
        }));
        assert!(err.is_err());
    }

    #[test]
    fn table_rows_must_match_headers() {
        let body = parse(json!({
            "type": "TABLE",
            "metadata": {"headers": ["name", "role"], "rows": [["Ada", "admin"], ["Bob"]]}
        }))
        .unwrap();
        assert!(matches!(body.validate(), Err(KbError::BadRequest(_))));
    }

    #[test]
    fn media_needs_a_source() {
        let video = parse(json!({"type": "VIDEO"})).unwrap();
        assert!(video.validate().is_err());
        let video = parse(json!({"type": "VIDEO", "url": "https://cdn.example.com/a.mp4"})).unwrap();
        assert!(video.validate().is_ok());
        assert!(parse(json!({"type": "PDF"})).is_err());
    }

    #[test]
    fn columns_round_trip_and_drop_foreign_fields() {
        let body = ModuleBody::Code {
            content: "SELECT 1".into(),
            metadata: Some(CodeMeta {
                language: Some("sql".into()),
            }),
        };
        let columns = body.to_columns().unwrap();
        assert_eq!(columns.kind, ModuleKind::Code);
        assert_eq!(columns.url, None);
        assert_eq!(ModuleBody::from_columns(columns).unwrap(), body);

        // A leftover url from a previous type is not carried into TEXT.
        let text = ModuleBody::from_columns(BodyColumns {
            kind: ModuleKind::Text,
            content: Some("hello".into()),
            file_path: None,
            url: Some("https://old.example.com".into()),
            metadata: None,
        })
        .unwrap();
        assert_eq!(text.to_columns().unwrap().url, None);
    }

    #[test]
    fn update_rejects_unknown_keys() {
        let err = serde_json::from_value::<ModuleUpdate>(json!({"page_id": "other"}));
        assert!(err.is_err());
        let ok: ModuleUpdate = serde_json::from_value(json!({"content": null, "order": 2})).unwrap();
        assert_eq!(ok.content, Some(None));
        assert_eq!(ok.order, Some(2));
    }

    #[test]
    fn new_module_reads_flat_payload() {
        let input: NewModule = serde_json::from_value(json!({
            "page_id": "p1",
            "type": "TEXT",
            "content": "<p>hi</p>",
            "order": 0
        }))
        .unwrap();
        assert_eq!(input.page_id, "p1");
        assert_eq!(input.draft.order, Some(0));
        assert_eq!(input.draft.body.kind(), ModuleKind::Text);
    }
}
