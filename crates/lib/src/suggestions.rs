//! Reader feedback on the knowledge base.

use crate::activity::{ActivityAction, ActivityEvent, ActivityRecorder, EntityType};
use crate::errors::KbError;
use crate::providers::db::sqlite::{value, Executor, RowExt, SqliteProvider};
use crate::types::{new_id, now_ts, Actor, UserSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use turso::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    Pending,
    Reviewed,
}

impl SuggestionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Reviewed => "reviewed",
        }
    }

    fn parse(raw: &str) -> Result<Self, KbError> {
        match raw {
            "pending" => Ok(SuggestionStatus::Pending),
            "reviewed" => Ok(SuggestionStatus::Reviewed),
            other => Err(KbError::DataIntegrity(format!(
                "Unknown suggestion status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub id: String,
    pub message: String,
    pub user_id: Option<String>,
    pub status: SuggestionStatus,
    pub created_at: DateTime<Utc>,
    pub user: Option<UserSummary>,
}

const SUGGESTION_SELECT: &str = "SELECT s.id, s.message, s.user_id, s.status, s.created_at, u.id, u.name, u.email FROM suggestions s LEFT JOIN users u ON u.id = s.user_id";

impl TryFrom<&Row> for Suggestion {
    type Error = KbError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Suggestion {
            id: row.text(0)?,
            message: row.text(1)?,
            user_id: row.opt_text(2)?,
            status: SuggestionStatus::parse(&row.text(3)?)?,
            created_at: row.ts(4)?,
            user: row.opt_user(5)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewSuggestion {
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuggestionUpdate {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<SuggestionStatus>,
}

fn require_message(message: &str) -> Result<(), KbError> {
    if message.trim().is_empty() {
        Err(KbError::BadRequest("Suggestion message cannot be empty".into()))
    } else {
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct SuggestionService {
    db: SqliteProvider,
    activity: ActivityRecorder,
}

impl SuggestionService {
    pub fn new(db: SqliteProvider, activity: ActivityRecorder) -> Self {
        Self { db, activity }
    }

    /// Files a suggestion on behalf of the caller.
    pub async fn create(&self, input: NewSuggestion, actor: &Actor) -> Result<Suggestion, KbError> {
        require_message(&input.message)?;
        let id = new_id();
        self.db
            .execute(
                "INSERT INTO suggestions (id, message, user_id, status, created_at) VALUES (?, ?, ?, ?, ?)",
                vec![
                    value::text(id.clone()),
                    value::text(input.message.trim()),
                    value::opt_text(actor.user_id.clone()),
                    value::text(SuggestionStatus::Pending.as_str()),
                    value::text(now_ts()),
                ],
            )
            .await?;
        self.activity.record(ActivityEvent::new(
            actor,
            ActivityAction::Created,
            EntityType::Suggestion,
            &id,
        ));
        self.get(&id).await
    }

    pub async fn list(&self) -> Result<Vec<Suggestion>, KbError> {
        let rows = self
            .db
            .query(
                &format!("{SUGGESTION_SELECT} ORDER BY s.created_at DESC"),
                Vec::new(),
            )
            .await?;
        rows.iter().map(Suggestion::try_from).collect()
    }

    pub async fn get(&self, id: &str) -> Result<Suggestion, KbError> {
        self.db
            .query_one(
                &format!("{SUGGESTION_SELECT} WHERE s.id = ?"),
                vec![value::text(id)],
            )
            .await?
            .as_ref()
            .map(Suggestion::try_from)
            .transpose()?
            .ok_or_else(|| KbError::not_found("Suggestion", id))
    }

    pub async fn update(
        &self,
        id: &str,
        patch: SuggestionUpdate,
        actor: &Actor,
    ) -> Result<Suggestion, KbError> {
        let current = self.get(id).await?;
        let message = match patch.message {
            Some(message) => {
                require_message(&message)?;
                message.trim().to_string()
            }
            None => current.message,
        };
        let status = patch.status.unwrap_or(current.status);
        self.db
            .execute(
                "UPDATE suggestions SET message = ?, status = ? WHERE id = ?",
                vec![
                    value::text(message),
                    value::text(status.as_str()),
                    value::text(id),
                ],
            )
            .await?;
        self.activity.record(
            ActivityEvent::new(actor, ActivityAction::Updated, EntityType::Suggestion, id)
                .with_details(status.as_str()),
        );
        self.get(id).await
    }

    pub async fn delete(&self, id: &str, actor: &Actor) -> Result<(), KbError> {
        let affected = self
            .db
            .execute("DELETE FROM suggestions WHERE id = ?", vec![value::text(id)])
            .await?;
        if affected == 0 {
            return Err(KbError::not_found("Suggestion", id));
        }
        self.activity.record(ActivityEvent::new(
            actor,
            ActivityAction::Deleted,
            EntityType::Suggestion,
            id,
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_accepts_only_known_values() {
        let ok: SuggestionUpdate = serde_json::from_value(json!({"status": "reviewed"})).unwrap();
        assert_eq!(ok.status, Some(SuggestionStatus::Reviewed));
        assert!(serde_json::from_value::<SuggestionUpdate>(json!({"status": "done"})).is_err());
        assert!(serde_json::from_value::<SuggestionUpdate>(json!({"user_id": "u1"})).is_err());
    }
}
