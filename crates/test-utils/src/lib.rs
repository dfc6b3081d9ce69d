use anyhow::Result;
use kbase::activity::{spawn_recorder, SqliteActivitySink};
use kbase::modules::{ModuleBody, ModuleDraft, NewModule};
use kbase::pages::{NewPage, PageDetail};
use kbase::providers::db::sqlite::{value, Executor};
use kbase::sections::{NewSection, Section};
use kbase::types::{new_id, now_ts};
use kbase::{Actor, FileStore, KnowledgeBase, SqliteProvider};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;

// --- Test Setup ---

/// A fresh database file and upload directory with every service wired up.
/// Activity events are persisted by a real background recorder.
pub struct TestSetup {
    pub kb: KnowledgeBase,
    pub db: SqliteProvider,
    pub upload_dir: TempDir,
    _db_dir: TempDir,
    _recorder: JoinHandle<()>,
}

impl TestSetup {
    pub async fn new() -> Result<Self> {
        let db_dir = tempfile::tempdir()?;
        let db_path = db_dir.path().join("kbase.db");
        let db = SqliteProvider::new(&db_path.to_string_lossy()).await?;
        db.initialize_schema().await?;

        let upload_dir = tempfile::tempdir()?;
        let files = FileStore::new(upload_dir.path());
        files.ensure_layout().await?;

        let (recorder, handle) =
            spawn_recorder(Arc::new(SqliteActivitySink::new(db.clone())), 256);
        let kb = KnowledgeBase::new(db.clone(), recorder, files);
        Ok(Self {
            kb,
            db,
            upload_dir,
            _db_dir: db_dir,
            _recorder: handle,
        })
    }

    // --- Fixtures ---

    /// Inserts an active user directly and returns its id.
    pub async fn insert_user(&self, email: &str, name: &str) -> Result<String> {
        let id = new_id();
        let now = now_ts();
        self.db
            .execute(
                "INSERT INTO users (id, email, name, auth_source, status, created_at, updated_at) VALUES (?, ?, ?, 'local', 'active', ?, ?)",
                vec![
                    value::text(id.clone()),
                    value::text(email),
                    value::text(name),
                    value::text(now.clone()),
                    value::text(now),
                ],
            )
            .await?;
        Ok(id)
    }

    pub async fn section(&self, slug: &str) -> Result<Section> {
        self.section_with(slug, None, Vec::new()).await
    }

    pub async fn section_with(
        &self,
        slug: &str,
        parent_id: Option<&str>,
        roles_allowed: Vec<String>,
    ) -> Result<Section> {
        let input = NewSection {
            name: slug.replace('-', " "),
            slug: slug.to_string(),
            route: None,
            roles_allowed,
            order: 0,
            visible: true,
            icon: None,
            parent_id: parent_id.map(String::from),
            show_on_homepage: false,
            homepage_order: 0,
        };
        Ok(self.kb.sections.create(input, &Actor::system()).await?)
    }

    pub async fn page(&self, section_id: &str, title: &str) -> Result<PageDetail> {
        let input = NewPage {
            section_id: section_id.to_string(),
            title: title.to_string(),
            slug: None,
            show_author: true,
            show_metrics: true,
            icon: None,
            template_id: None,
            status: None,
        };
        Ok(self.kb.pages.create(input, &Actor::system()).await?)
    }

    pub async fn text_module(&self, page_id: &str, content: &str) -> Result<kbase::modules::Module> {
        let input = NewModule {
            page_id: page_id.to_string(),
            draft: ModuleDraft {
                title: None,
                order: None,
                body: ModuleBody::Text {
                    content: content.to_string(),
                },
            },
        };
        Ok(self.kb.modules.create(input, &Actor::system()).await?)
    }
}

// --- Polling ---

/// Re-evaluates `check` until it yields `Some` or `timeout` elapses. Used for
/// effects that land asynchronously, such as activity rows.
pub async fn wait_for<T, F, Fut>(timeout: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(found) = check().await {
            return Some(found);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
