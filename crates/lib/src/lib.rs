//! # kbase
//!
//! The domain library of the knowledge base: sections, pages and their typed
//! modules, the page workflow, version snapshots, trash, settings,
//! suggestions, templates, the activity log and the upload store. Every
//! service runs on top of one [`SqliteProvider`] and reports what it did to
//! an [`ActivityRecorder`].

pub mod activity;
pub mod columns;
pub mod errors;
pub mod files;
pub mod modules;
pub mod pages;
pub mod providers;
pub mod search;
pub mod sections;
pub mod settings;
pub mod slug;
pub mod suggestions;
pub mod templates;
pub mod types;
pub mod versions;
pub mod workflow;

pub use activity::{ActivityLog, ActivityRecorder};
pub use errors::KbError;
pub use files::FileStore;
pub use modules::ModuleService;
pub use pages::PageService;
pub use providers::db::sqlite::SqliteProvider;
pub use search::PublicCatalog;
pub use sections::SectionService;
pub use settings::SettingService;
pub use suggestions::SuggestionService;
pub use templates::TemplateService;
pub use types::Actor;
pub use versions::VersionService;
pub use workflow::{PageStatus, WorkflowAction};

/// Every service, wired to the same database, recorder and file store.
#[derive(Clone, Debug)]
pub struct KnowledgeBase {
    pub db: SqliteProvider,
    pub files: FileStore,
    pub sections: SectionService,
    pub pages: PageService,
    pub modules: ModuleService,
    pub versions: VersionService,
    pub settings: SettingService,
    pub suggestions: SuggestionService,
    pub templates: TemplateService,
    pub activity: ActivityLog,
    pub catalog: PublicCatalog,
}

impl KnowledgeBase {
    pub fn new(db: SqliteProvider, recorder: ActivityRecorder, files: FileStore) -> Self {
        Self {
            sections: SectionService::new(db.clone(), recorder.clone()),
            pages: PageService::new(db.clone(), recorder.clone(), files.clone()),
            modules: ModuleService::new(db.clone(), recorder.clone(), files.clone()),
            versions: VersionService::new(db.clone(), recorder.clone()),
            settings: SettingService::new(db.clone(), recorder.clone()),
            suggestions: SuggestionService::new(db.clone(), recorder.clone()),
            templates: TemplateService::new(db.clone(), recorder),
            activity: ActivityLog::new(db.clone()),
            catalog: PublicCatalog::new(db.clone()),
            files,
            db,
        }
    }
}
