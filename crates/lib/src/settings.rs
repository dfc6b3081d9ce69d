//! Key/value site settings.

use crate::activity::{
    parse_retention_days, ActivityAction, ActivityEvent, ActivityLog, ActivityRecorder,
    EntityType, MAX_RETENTION_DAYS, RETENTION_SETTING_KEY,
};
use crate::errors::KbError;
use crate::providers::db::sqlite::{value, Executor, RowExt, SqliteProvider};
use crate::types::{now_ts, Actor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use tracing::{error, info};
use turso::Row;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Setting {
    pub key: String,
    pub value: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<&Row> for Setting {
    type Error = KbError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Setting {
            key: row.text(0)?,
            value: row.opt_text(1)?,
            updated_at: row.ts(2)?,
        })
    }
}

/// Settings are stored as text; numbers and booleans are kept in their JSON
/// spelling.
fn setting_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingInput {
    #[serde(default, deserialize_with = "setting_text")]
    pub value: Option<String>,
}

/// A numeric retention value must fit the supported window. Anything that
/// is not a number is stored as-is and disables cleanup.
fn check_retention_value(raw: Option<&str>) -> Result<(), KbError> {
    match raw.and_then(|s| s.trim().parse::<i64>().ok()) {
        Some(days) if days > MAX_RETENTION_DAYS => Err(KbError::BadRequest(format!(
            "{RETENTION_SETTING_KEY} cannot exceed {MAX_RETENTION_DAYS} days"
        ))),
        _ => Ok(()),
    }
}

#[derive(Clone, Debug)]
pub struct SettingService {
    db: SqliteProvider,
    activity: ActivityRecorder,
}

impl SettingService {
    pub fn new(db: SqliteProvider, activity: ActivityRecorder) -> Self {
        Self { db, activity }
    }

    pub async fn list(&self) -> Result<Vec<Setting>, KbError> {
        let rows = self
            .db
            .query("SELECT key, value, updated_at FROM settings ORDER BY key ASC", Vec::new())
            .await?;
        rows.iter().map(Setting::try_from).collect()
    }

    pub async fn get(&self, key: &str) -> Result<Setting, KbError> {
        self.db
            .query_one(
                "SELECT key, value, updated_at FROM settings WHERE key = ?",
                vec![value::text(key)],
            )
            .await?
            .as_ref()
            .map(Setting::try_from)
            .transpose()?
            .ok_or_else(|| KbError::not_found("Setting", key))
    }

    /// Inserts or overwrites a setting. Changing the retention window starts
    /// a cleanup pass in the background; its failure is only logged.
    pub async fn upsert(
        &self,
        key: &str,
        input: SettingInput,
        actor: &Actor,
    ) -> Result<Setting, KbError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(KbError::BadRequest("Setting key cannot be empty".into()));
        }

        if key == RETENTION_SETTING_KEY {
            check_retention_value(input.value.as_deref())?;
        }

        // One transaction, so two first writes of a key cannot both insert.
        let now = now_ts();
        let tx = self.db.begin().await?;
        let result = async {
            let updated = tx
                .execute(
                    "UPDATE settings SET value = ?, updated_at = ? WHERE key = ?",
                    vec![
                        value::opt_text(input.value.clone()),
                        value::text(now.clone()),
                        value::text(key),
                    ],
                )
                .await?;
            if updated == 0 {
                tx.execute(
                    "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)",
                    vec![
                        value::text(key),
                        value::opt_text(input.value.clone()),
                        value::text(now.clone()),
                    ],
                )
                .await?;
            }
            Ok::<_, KbError>(())
        }
        .await;
        tx.finish(result).await?;

        self.activity.record(
            ActivityEvent::new(actor, ActivityAction::Updated, EntityType::Setting, key)
                .with_details(input.value.clone().unwrap_or_default()),
        );

        if key == RETENTION_SETTING_KEY {
            let log = ActivityLog::new(self.db.clone());
            let days = parse_retention_days(input.value.as_deref());
            info!(?days, "Retention setting changed");
            tokio::spawn(async move {
                if let Some(days) = days {
                    if let Err(e) = log.cleanup(days).await {
                        error!(error = %e, "Retention cleanup after settings change failed");
                    }
                }
            });
        }

        self.get(key).await
    }
}
