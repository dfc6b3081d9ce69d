//! # Core Access Crate
//!
//! Identity and authorization for the knowledge base: user accounts, their
//! roles, password hashing and the role sets that gate each operation.
//! Everything here works directly on the shared `turso::Database`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};
use turso::{Connection, Database, Error as TursoError, Row, Value, params};
use uuid::Uuid;

/// Shortest password `register` and `create_user` accept.
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum CoreAccessError {
    #[error("Database error: {0}")]
    Database(#[from] TursoError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),
    #[error("{0}")]
    Validation(String),
}

// --- Roles ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Contributor,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Viewer, Role::Contributor, Role::Admin, Role::SuperAdmin];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Contributor => "contributor",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreAccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| CoreAccessError::NotFound(format!("Role \"{s}\" not found")))
    }
}

/// Roles that may author content.
pub const CONTRIBUTOR_ROLES: &[Role] = &[Role::Contributor, Role::Admin, Role::SuperAdmin];
/// Roles that may administer content, users and settings.
pub const ADMIN_ROLES: &[Role] = &[Role::Admin, Role::SuperAdmin];

/// True when any of `held` is one of `allowed`.
pub fn has_any_role(held: &[String], allowed: &[Role]) -> bool {
    held.iter()
        .any(|name| allowed.iter().any(|role| role.as_str() == name))
}

// --- Users ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }
}

/// A user account. The password hash never leaves this crate.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub auth_source: String,
    pub status: UserStatus,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewUser {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

const USER_COLUMNS: &str = "id, email, name, auth_source, status, created_at, updated_at";

fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn text(row: &Row, idx: usize) -> Result<String, CoreAccessError> {
    match row.get_value(idx)? {
        Value::Text(s) => Ok(s),
        other => Err(CoreAccessError::DataIntegrity(format!(
            "Expected text in column {idx}, found {other:?}"
        ))),
    }
}

fn opt_text(row: &Row, idx: usize) -> Result<Option<String>, CoreAccessError> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s)),
        other => Err(CoreAccessError::DataIntegrity(format!(
            "Expected nullable text in column {idx}, found {other:?}"
        ))),
    }
}

fn timestamp(row: &Row, idx: usize) -> Result<DateTime<Utc>, CoreAccessError> {
    let raw = text(row, idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreAccessError::DataIntegrity(format!("Failed to parse date '{raw}': {e}")))
}

fn user_from_row(row: &Row, roles: Vec<String>) -> Result<User, CoreAccessError> {
    let status = match text(row, 4)?.as_str() {
        "active" => UserStatus::Active,
        "inactive" => UserStatus::Inactive,
        other => {
            return Err(CoreAccessError::DataIntegrity(format!(
                "Unknown user status '{other}'"
            )));
        }
    };
    Ok(User {
        id: text(row, 0)?,
        email: text(row, 1)?,
        name: opt_text(row, 2)?,
        auth_source: text(row, 3)?,
        status,
        roles,
        created_at: timestamp(row, 5)?,
        updated_at: timestamp(row, 6)?,
    })
}

fn normalize_email(email: &str) -> Result<String, CoreAccessError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(CoreAccessError::Validation(format!(
            "'{email}' is not a valid email address"
        ))),
    }
}

fn check_password(password: &str) -> Result<(), CoreAccessError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CoreAccessError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, CoreAccessError> {
    Ok(bcrypt::hash(password, cost)?)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, CoreAccessError> {
    Ok(bcrypt::verify(password, hash)?)
}

async fn roles_of(conn: &Connection, user_id: &str) -> Result<Vec<String>, CoreAccessError> {
    let mut rows = conn
        .query(
            "SELECT r.name FROM user_roles ur JOIN roles r ON r.id = ur.role_id WHERE ur.user_id = ? ORDER BY r.name ASC",
            params![user_id],
        )
        .await?;
    let mut roles = Vec::new();
    while let Some(row) = rows.next().await? {
        roles.push(text(&row, 0)?);
    }
    Ok(roles)
}

async fn load_user(conn: &Connection, id: &str) -> Result<Option<User>, CoreAccessError> {
    let mut rows = conn
        .query(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
            params![id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => {
            let roles = roles_of(conn, id).await?;
            Ok(Some(user_from_row(&row, roles)?))
        }
        None => Ok(None),
    }
}

async fn require_user(conn: &Connection, id: &str) -> Result<User, CoreAccessError> {
    load_user(conn, id)
        .await?
        .ok_or_else(|| CoreAccessError::NotFound(format!("User {id} not found")))
}

async fn role_id(conn: &Connection, role: Role) -> Result<String, CoreAccessError> {
    let mut rows = conn
        .query("SELECT id FROM roles WHERE name = ?", params![role.as_str()])
        .await?;
    match rows.next().await? {
        Some(row) => text(&row, 0),
        None => Err(CoreAccessError::NotFound(format!(
            "Role \"{role}\" is not seeded"
        ))),
    }
}

async fn grant(conn: &Connection, user_id: &str, role: Role) -> Result<(), CoreAccessError> {
    let role_id = role_id(conn, role).await?;
    let mut existing = conn
        .query(
            "SELECT 1 FROM user_roles WHERE user_id = ? AND role_id = ?",
            params![user_id, role_id.clone()],
        )
        .await?;
    if existing.next().await?.is_none() {
        conn.execute(
            "INSERT INTO user_roles (user_id, role_id) VALUES (?, ?)",
            params![user_id, role_id],
        )
        .await?;
    }
    Ok(())
}

async fn email_taken(conn: &Connection, email: &str) -> Result<bool, CoreAccessError> {
    let mut rows = conn
        .query("SELECT id FROM users WHERE email = ?", params![email])
        .await?;
    Ok(rows.next().await?.is_some())
}

async fn insert_user(
    conn: &Connection,
    email: &str,
    name: Option<&str>,
    password_hash: Option<&str>,
) -> Result<String, CoreAccessError> {
    if email_taken(conn, email).await? {
        return Err(CoreAccessError::Conflict(format!(
            "A user with email '{email}' already exists"
        )));
    }
    let id = Uuid::new_v4().to_string();
    let now = now_ts();
    conn.execute(
        "INSERT INTO users (id, email, name, password_hash, auth_source, status, created_at, updated_at) VALUES (?, ?, ?, ?, 'local', 'active', ?, ?)",
        vec![
            Value::Text(id.clone()),
            Value::Text(email.to_string()),
            name.map(|n| Value::Text(n.to_string())).unwrap_or(Value::Null),
            password_hash
                .map(|h| Value::Text(h.to_string()))
                .unwrap_or(Value::Null),
            Value::Text(now.clone()),
            Value::Text(now),
        ],
    )
    .await?;
    Ok(id)
}

/// Runs `BEGIN`, then commits or rolls back depending on `result`.
async fn finish<T>(
    conn: &Connection,
    result: Result<T, CoreAccessError>,
) -> Result<T, CoreAccessError> {
    match result {
        Ok(value) => {
            conn.execute("COMMIT", ()).await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = conn.execute("ROLLBACK", ()).await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}

/// Creates a local account with a password. The very first account becomes
/// `super_admin`; every later one starts as `viewer`.
pub async fn register(
    db: &Database,
    email: &str,
    password: &str,
    name: Option<&str>,
    bcrypt_cost: u32,
) -> Result<User, CoreAccessError> {
    let email = normalize_email(email)?;
    check_password(password)?;
    let password_hash = hash_password(password, bcrypt_cost)?;

    let conn = db.connect()?;
    conn.execute("BEGIN TRANSACTION", ()).await?;
    let result = async {
        let first_user = conn
            .query("SELECT 1 FROM users LIMIT 1", ())
            .await?
            .next()
            .await?
            .is_none();
        let id = insert_user(&conn, &email, name, Some(&password_hash)).await?;
        let role = if first_user { Role::SuperAdmin } else { Role::Viewer };
        grant(&conn, &id, role).await?;
        Ok::<_, CoreAccessError>((id, role))
    }
    .await;
    let (id, role) = finish(&conn, result).await?;

    info!(user_id = %id, %role, "User registered");
    require_user(&conn, &id).await
}

/// Checks an email/password pair. Unknown emails, accounts without a
/// password, wrong passwords and inactive accounts all fail the same way.
pub async fn authenticate(
    db: &Database,
    email: &str,
    password: &str,
) -> Result<User, CoreAccessError> {
    let conn = db.connect()?;
    let email = email.trim().to_lowercase();
    let mut rows = conn
        .query(
            "SELECT id, password_hash FROM users WHERE email = ?",
            params![email.clone()],
        )
        .await?;
    let Some(row) = rows.next().await? else {
        warn!(%email, "Login for unknown email");
        return Err(CoreAccessError::InvalidCredentials);
    };
    let id = text(&row, 0)?;
    let Some(hash) = opt_text(&row, 1)? else {
        return Err(CoreAccessError::InvalidCredentials);
    };
    if !verify_password(password, &hash)? {
        warn!(user_id = %id, "Login with wrong password");
        return Err(CoreAccessError::InvalidCredentials);
    }
    let user = require_user(&conn, &id).await?;
    if !user.is_active() {
        warn!(user_id = %id, "Login for inactive account");
        return Err(CoreAccessError::InvalidCredentials);
    }
    Ok(user)
}

/// Creates an account on behalf of an administrator. The password is
/// optional; without one the account cannot log in locally.
pub async fn create_user(
    db: &Database,
    input: NewUser,
    bcrypt_cost: u32,
) -> Result<User, CoreAccessError> {
    let email = normalize_email(&input.email)?;
    let role = input.role.as_deref().map(Role::from_str).transpose()?;
    let password_hash = match input.password.as_deref() {
        Some(password) => {
            check_password(password)?;
            Some(hash_password(password, bcrypt_cost)?)
        }
        None => None,
    };

    let conn = db.connect()?;
    conn.execute("BEGIN TRANSACTION", ()).await?;
    let result = async {
        let id = insert_user(
            &conn,
            &email,
            input.name.as_deref(),
            password_hash.as_deref(),
        )
        .await?;
        if let Some(role) = role {
            grant(&conn, &id, role).await?;
        }
        Ok::<_, CoreAccessError>(id)
    }
    .await;
    let id = finish(&conn, result).await?;

    info!(user_id = %id, "User created");
    require_user(&conn, &id).await
}

pub async fn find_user(db: &Database, id: &str) -> Result<User, CoreAccessError> {
    let conn = db.connect()?;
    require_user(&conn, id).await
}

/// All users, newest first.
pub async fn list_users(db: &Database) -> Result<Vec<User>, CoreAccessError> {
    let conn = db.connect()?;
    let mut rows = conn
        .query(
            &format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"),
            (),
        )
        .await?;
    let mut pending = Vec::new();
    while let Some(row) = rows.next().await? {
        pending.push(row);
    }
    let mut users = Vec::with_capacity(pending.len());
    for row in &pending {
        let roles = roles_of(&conn, &text(row, 0)?).await?;
        users.push(user_from_row(row, roles)?);
    }
    Ok(users)
}

pub async fn update_user(
    db: &Database,
    id: &str,
    patch: UserUpdate,
) -> Result<User, CoreAccessError> {
    let conn = db.connect()?;
    let current = require_user(&conn, id).await?;
    let email = match patch.email {
        Some(email) => {
            let email = normalize_email(&email)?;
            if email != current.email && email_taken(&conn, &email).await? {
                return Err(CoreAccessError::Conflict(format!(
                    "A user with email '{email}' already exists"
                )));
            }
            email
        }
        None => current.email,
    };
    let name = patch.name.or(current.name);
    conn.execute(
        "UPDATE users SET email = ?, name = ?, updated_at = ? WHERE id = ?",
        vec![
            Value::Text(email),
            name.map(Value::Text).unwrap_or(Value::Null),
            Value::Text(now_ts()),
            Value::Text(id.to_string()),
        ],
    )
    .await?;
    require_user(&conn, id).await
}

/// Adds `role` to the user's roles. Holding it already is not an error.
pub async fn assign_role(db: &Database, id: &str, role: &str) -> Result<User, CoreAccessError> {
    let role = Role::from_str(role)?;
    let conn = db.connect()?;
    require_user(&conn, id).await?;
    grant(&conn, id, role).await?;
    info!(user_id = %id, %role, "Role assigned");
    require_user(&conn, id).await
}

/// Makes `roles` the user's exact role set.
pub async fn replace_roles(
    db: &Database,
    id: &str,
    roles: &[String],
) -> Result<User, CoreAccessError> {
    let roles = roles
        .iter()
        .map(|r| Role::from_str(r))
        .collect::<Result<Vec<_>, _>>()?;
    let conn = db.connect()?;
    require_user(&conn, id).await?;

    conn.execute("BEGIN TRANSACTION", ()).await?;
    let result = async {
        conn.execute("DELETE FROM user_roles WHERE user_id = ?", params![id])
            .await?;
        for role in &roles {
            grant(&conn, id, *role).await?;
        }
        Ok::<_, CoreAccessError>(())
    }
    .await;
    finish(&conn, result).await?;

    info!(user_id = %id, roles = ?roles, "Roles replaced");
    require_user(&conn, id).await
}

pub async fn remove_role(db: &Database, id: &str, role: &str) -> Result<User, CoreAccessError> {
    let role = Role::from_str(role)?;
    let conn = db.connect()?;
    require_user(&conn, id).await?;
    let role_id = role_id(&conn, role).await?;
    conn.execute(
        "DELETE FROM user_roles WHERE user_id = ? AND role_id = ?",
        params![id, role_id],
    )
    .await?;
    info!(user_id = %id, %role, "Role removed");
    require_user(&conn, id).await
}

pub async fn set_status(
    db: &Database,
    id: &str,
    status: UserStatus,
) -> Result<User, CoreAccessError> {
    let conn = db.connect()?;
    let affected = conn
        .execute(
            "UPDATE users SET status = ?, updated_at = ? WHERE id = ?",
            params![status.as_str(), now_ts(), id],
        )
        .await?;
    if affected == 0 {
        return Err(CoreAccessError::NotFound(format!("User {id} not found")));
    }
    info!(user_id = %id, status = status.as_str(), "User status changed");
    require_user(&conn, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbase::providers::db::sqlite::SqliteProvider;

    const COST: u32 = 4;

    async fn database() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.db");
        let provider = SqliteProvider::new(&path.to_string_lossy()).await.unwrap();
        provider.initialize_schema().await.unwrap();
        (dir, provider.db)
    }

    #[test]
    fn role_gates() {
        let contributor = vec!["contributor".to_string()];
        let viewer = vec!["viewer".to_string()];
        assert!(has_any_role(&contributor, CONTRIBUTOR_ROLES));
        assert!(!has_any_role(&contributor, ADMIN_ROLES));
        assert!(!has_any_role(&viewer, CONTRIBUTOR_ROLES));
        assert!(has_any_role(&["super_admin".to_string()], ADMIN_ROLES));
        assert!(Role::from_str("owner").is_err());
    }

    #[tokio::test]
    async fn first_registered_user_is_super_admin() {
        let (_dir, db) = database().await;

        let first = register(&db, "Founder@Example.com", "correct horse", Some("Founder"), COST)
            .await
            .unwrap();
        assert_eq!(first.email, "founder@example.com");
        assert_eq!(first.roles, vec!["super_admin"]);

        let second = register(&db, "reader@example.com", "battery staple", None, COST)
            .await
            .unwrap();
        assert_eq!(second.roles, vec!["viewer"]);

        let duplicate = register(&db, "reader@example.com", "another secret", None, COST).await;
        assert!(matches!(duplicate, Err(CoreAccessError::Conflict(_))));
        let short = register(&db, "new@example.com", "short", None, COST).await;
        assert!(matches!(short, Err(CoreAccessError::Validation(_))));
    }

    #[tokio::test]
    async fn authenticate_rejects_bad_passwords_and_inactive_accounts() {
        let (_dir, db) = database().await;
        let user = register(&db, "ana@example.com", "open sesame", None, COST)
            .await
            .unwrap();

        let ok = authenticate(&db, " ANA@example.com ", "open sesame").await.unwrap();
        assert_eq!(ok.id, user.id);
        assert!(matches!(
            authenticate(&db, "ana@example.com", "wrong password").await,
            Err(CoreAccessError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate(&db, "nobody@example.com", "open sesame").await,
            Err(CoreAccessError::InvalidCredentials)
        ));

        set_status(&db, &user.id, UserStatus::Inactive).await.unwrap();
        assert!(matches!(
            authenticate(&db, "ana@example.com", "open sesame").await,
            Err(CoreAccessError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn roles_can_be_added_replaced_and_removed() {
        let (_dir, db) = database().await;
        let user = create_user(
            &db,
            NewUser {
                email: "editor@example.com".into(),
                name: Some("Editor".into()),
                password: None,
                role: Some("contributor".into()),
            },
            COST,
        )
        .await
        .unwrap();
        assert_eq!(user.roles, vec!["contributor"]);

        let user = assign_role(&db, &user.id, "admin").await.unwrap();
        assert_eq!(user.roles, vec!["admin", "contributor"]);
        let again = assign_role(&db, &user.id, "admin").await.unwrap();
        assert_eq!(again.roles, user.roles, "assigning twice is idempotent");

        let user = replace_roles(&db, &user.id, &["viewer".to_string()])
            .await
            .unwrap();
        assert_eq!(user.roles, vec!["viewer"]);

        let user = remove_role(&db, &user.id, "viewer").await.unwrap();
        assert!(user.roles.is_empty());

        assert!(matches!(
            assign_role(&db, &user.id, "owner").await,
            Err(CoreAccessError::NotFound(_))
        ));
        assert!(matches!(
            replace_roles(&db, &user.id, &["admin".into(), "owner".into()]).await,
            Err(CoreAccessError::NotFound(_))
        ));
    }
}
