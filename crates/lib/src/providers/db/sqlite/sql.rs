//! # Schema
//!
//! Table definitions for the knowledge base. Identifiers are UUID strings and
//! timestamps are RFC 3339 text written by the application, so no statement
//! depends on SQLite date functions. `sort_order` backs the `order` field.

pub const CREATE_SECTIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS sections (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    route TEXT,
    roles_allowed TEXT,
    sort_order INTEGER NOT NULL DEFAULT 0,
    visible INTEGER NOT NULL DEFAULT 1,
    icon TEXT,
    parent_id TEXT,
    show_on_homepage INTEGER NOT NULL DEFAULT 0,
    homepage_order INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);";

pub const CREATE_PAGES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS pages (
    id TEXT PRIMARY KEY,
    section_id TEXT NOT NULL,
    title TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL DEFAULT 'draft',
    show_author INTEGER NOT NULL DEFAULT 1,
    show_metrics INTEGER NOT NULL DEFAULT 1,
    icon TEXT,
    views INTEGER NOT NULL DEFAULT 0,
    created_by_id TEXT,
    updated_by_id TEXT,
    reviewed_by_id TEXT,
    reviewed_at TEXT,
    deleted_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);";

pub const CREATE_MODULES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS modules (
    id TEXT PRIMARY KEY,
    page_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    content TEXT,
    file_path TEXT,
    url TEXT,
    title TEXT,
    metadata TEXT,
    sort_order INTEGER NOT NULL DEFAULT 0,
    deleted_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);";

pub const CREATE_MODULES_PAGE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_modules_page ON modules (page_id);";

pub const CREATE_PAGE_VERSIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS page_versions (
    id TEXT PRIMARY KEY,
    page_id TEXT NOT NULL,
    version INTEGER NOT NULL,
    snapshot TEXT NOT NULL,
    changed_by TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (page_id, version)
);";

pub const CREATE_USERS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    name TEXT,
    password_hash TEXT,
    auth_source TEXT NOT NULL DEFAULT 'local',
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);";

pub const CREATE_ROLES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS roles (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);";

pub const CREATE_USER_ROLES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS user_roles (
    user_id TEXT NOT NULL,
    role_id TEXT NOT NULL,
    PRIMARY KEY (user_id, role_id)
);";

pub const CREATE_SETTINGS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT,
    updated_at TEXT NOT NULL
);";

pub const CREATE_SUGGESTIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS suggestions (
    id TEXT PRIMARY KEY,
    message TEXT NOT NULL,
    user_id TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL
);";

pub const CREATE_PAGE_TEMPLATES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS page_templates (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    modules TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);";

pub const CREATE_ACTIVITY_LOGS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS activity_logs (
    id TEXT PRIMARY KEY,
    user_id TEXT,
    action TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    details TEXT,
    ip_address TEXT,
    created_at TEXT NOT NULL
);";

pub const CREATE_AUDIT_LOGS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS audit_logs (
    id TEXT PRIMARY KEY,
    user_id TEXT,
    action TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    before TEXT,
    after TEXT,
    created_at TEXT NOT NULL
);";

/// Every statement needed to bring an empty database up to date, in order.
pub const ALL_TABLE_CREATION_SQL: &[&str] = &[
    CREATE_SECTIONS_TABLE,
    CREATE_PAGES_TABLE,
    CREATE_MODULES_TABLE,
    CREATE_MODULES_PAGE_INDEX,
    CREATE_PAGE_VERSIONS_TABLE,
    CREATE_USERS_TABLE,
    CREATE_ROLES_TABLE,
    CREATE_USER_ROLES_TABLE,
    CREATE_SETTINGS_TABLE,
    CREATE_SUGGESTIONS_TABLE,
    CREATE_PAGE_TEMPLATES_TABLE,
    CREATE_ACTIVITY_LOGS_TABLE,
    CREATE_AUDIT_LOGS_TABLE,
];
