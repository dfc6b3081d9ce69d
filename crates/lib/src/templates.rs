//! Page templates: named lists of module drafts that seed new pages.

use crate::activity::{ActivityAction, ActivityEvent, ActivityRecorder, EntityType};
use crate::errors::KbError;
use crate::modules::ModuleDraft;
use crate::providers::db::sqlite::{value, Executor, RowExt, SqliteProvider};
use crate::types::{new_id, now_ts, Actor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use turso::Row;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTemplate {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub modules: Vec<ModuleDraft>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const TEMPLATE_COLUMNS: &str = "id, name, description, modules, created_at, updated_at";

impl TryFrom<&Row> for PageTemplate {
    type Error = KbError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        let modules = serde_json::from_str(&row.text(3)?).map_err(|e| {
            KbError::DataIntegrity(format!("Template modules are not valid drafts: {e}"))
        })?;
        Ok(PageTemplate {
            id: row.text(0)?,
            name: row.text(1)?,
            description: row.opt_text(2)?,
            modules,
            created_at: row.ts(4)?,
            updated_at: row.ts(5)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub modules: Vec<ModuleDraft>,
}

impl TemplateInput {
    fn validate(&self) -> Result<(), KbError> {
        if self.name.trim().is_empty() {
            return Err(KbError::BadRequest("Template name cannot be empty".into()));
        }
        for draft in &self.modules {
            draft.body.validate()?;
        }
        Ok(())
    }
}

async fn fetch(exec: &dyn Executor, id: &str) -> Result<PageTemplate, KbError> {
    exec.query_one(
        &format!("SELECT {TEMPLATE_COLUMNS} FROM page_templates WHERE id = ?"),
        vec![value::text(id)],
    )
    .await?
    .as_ref()
    .map(PageTemplate::try_from)
    .transpose()?
    .ok_or_else(|| KbError::not_found("Template", id))
}

/// The module drafts of a template, for instantiating a page.
pub(crate) async fn load_modules(
    exec: &dyn Executor,
    id: &str,
) -> Result<Vec<ModuleDraft>, KbError> {
    Ok(fetch(exec, id).await?.modules)
}

#[derive(Clone, Debug)]
pub struct TemplateService {
    db: SqliteProvider,
    activity: ActivityRecorder,
}

impl TemplateService {
    pub fn new(db: SqliteProvider, activity: ActivityRecorder) -> Self {
        Self { db, activity }
    }

    pub async fn list(&self) -> Result<Vec<PageTemplate>, KbError> {
        let rows = self
            .db
            .query(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM page_templates ORDER BY name ASC"),
                Vec::new(),
            )
            .await?;
        rows.iter().map(PageTemplate::try_from).collect()
    }

    pub async fn get(&self, id: &str) -> Result<PageTemplate, KbError> {
        fetch(&self.db, id).await
    }

    pub async fn create(&self, input: TemplateInput, actor: &Actor) -> Result<PageTemplate, KbError> {
        input.validate()?;
        let id = new_id();
        let now = now_ts();
        self.db
            .execute(
                &format!("INSERT INTO page_templates ({TEMPLATE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"),
                vec![
                    value::text(id.clone()),
                    value::text(input.name.trim()),
                    value::opt_text(input.description.clone()),
                    value::text(serde_json::to_string(&input.modules)?),
                    value::text(now.clone()),
                    value::text(now),
                ],
            )
            .await?;
        self.activity.record(
            ActivityEvent::new(actor, ActivityAction::Created, EntityType::Template, &id)
                .with_details(input.name.clone()),
        );
        self.get(&id).await
    }

    /// Replaces name, description and modules wholesale.
    pub async fn update(
        &self,
        id: &str,
        input: TemplateInput,
        actor: &Actor,
    ) -> Result<PageTemplate, KbError> {
        input.validate()?;
        let affected = self
            .db
            .execute(
                "UPDATE page_templates SET name = ?, description = ?, modules = ?, updated_at = ? WHERE id = ?",
                vec![
                    value::text(input.name.trim()),
                    value::opt_text(input.description.clone()),
                    value::text(serde_json::to_string(&input.modules)?),
                    value::text(now_ts()),
                    value::text(id),
                ],
            )
            .await?;
        if affected == 0 {
            return Err(KbError::not_found("Template", id));
        }
        self.activity.record(ActivityEvent::new(
            actor,
            ActivityAction::Updated,
            EntityType::Template,
            id,
        ));
        self.get(id).await
    }

    pub async fn delete(&self, id: &str, actor: &Actor) -> Result<(), KbError> {
        let affected = self
            .db
            .execute("DELETE FROM page_templates WHERE id = ?", vec![value::text(id)])
            .await?;
        if affected == 0 {
            return Err(KbError::not_found("Template", id));
        }
        self.activity.record(ActivityEvent::new(
            actor,
            ActivityAction::Deleted,
            EntityType::Template,
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
    fn template_input_validates_module_drafts() {
        let ok: TemplateInput = serde_json::from_value(json!({
            "name": "How-to",
            "modules": [
                {"type": "TEXT", "content": "Intro"},
                {"type": "CODE", "content": "ls -la", "metadata": {"language": "bash"}}
            ]
        }))
        .unwrap();
        assert!(ok.validate().is_ok());

        let bad: TemplateInput = serde_json::from_value(json!({
            "name": "Broken",
            "modules": [{"type": "URL", "url": ""}]
        }))
        .unwrap();
        assert!(matches!(bad.validate(), Err(KbError::BadRequest(_))));
    }
}
