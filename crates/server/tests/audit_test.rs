//! The audit trail and the activity feed as seen through the admin API.

mod common;

use common::TestApp;
use kbase_test_utils::wait_for;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

/// Polls `path` until `pred` matches one of the returned entries. Log writes
/// are asynchronous, so the entry may take a moment to appear.
async fn wait_for_entry(
    app: &TestApp,
    token: &str,
    path: &str,
    pred: impl Fn(&Value) -> bool,
) -> anyhow::Result<(Value, Vec<Value>)> {
    let pred = &pred;
    wait_for(Duration::from_secs(5), || async move {
        let entries: Vec<Value> = app.get(path, Some(token)).await.ok()?.json().await.ok()?;
        let found = entries.iter().find(|e| pred(e)).cloned()?;
        Some((found, entries))
    })
    .await
    .ok_or_else(|| anyhow::anyhow!("no matching entry appeared at {path}"))
}

#[tokio::test]
async fn successful_mutations_are_audited_with_the_route_template() -> anyhow::Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.super_admin().await?;
    let section_id = app.section(&admin, "Ops", "ops").await?;
    let page = app.page(&admin, &section_id, "Incident process").await?;
    let id = page["id"].as_str().unwrap_or_default().to_string();

    // A rejected transition and a plain read, both before the publish.
    let failed = app
        .patch(&format!("/api/pages/{id}/approve"), &admin, json!({}))
        .await?;
    assert_eq!(failed.status(), StatusCode::CONFLICT);
    app.get(&format!("/api/pages/{id}"), Some(&admin))
        .await?
        .error_for_status()?;

    app.patch(&format!("/api/pages/{id}/publish"), &admin, json!({}))
        .await?
        .error_for_status()?;

    let (entry, entries) = wait_for_entry(&app, &admin, "/api/activity/audit?entityType=pages", |e| {
        e["action"] == "PATCH /api/pages/{id}/publish"
    })
    .await?;
    assert_eq!(entry["entity_type"], "pages");
    assert_eq!(entry["entity_id"], json!(id));
    assert_eq!(entry["before"]["params"]["id"], json!(id));
    assert_eq!(entry["after"]["status"], "published");
    assert!(entry["user_id"].is_string());

    let create = entries
        .iter()
        .find(|e| e["action"] == "POST /api/pages")
        .expect("page creation is audited");
    assert_eq!(create["entity_id"], "new");

    assert!(entries
        .iter()
        .all(|e| e["action"] != "PATCH /api/pages/{id}/approve"));
    assert!(entries
        .iter()
        .all(|e| !e["action"].as_str().unwrap_or_default().starts_with("GET ")));
    Ok(())
}

#[tokio::test]
async fn workflow_actions_reach_the_activity_feed() -> anyhow::Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.super_admin().await?;
    let section_id = app.section(&admin, "Ops", "ops").await?;
    let page = app.page(&admin, &section_id, "On-call").await?;
    let id = page["id"].as_str().unwrap_or_default().to_string();
    app.patch(&format!("/api/pages/{id}/publish"), &admin, json!({}))
        .await?
        .error_for_status()?;

    let (entry, _) = wait_for_entry(&app, &admin, "/api/activity?entityType=page", |e| {
        e["entity_id"] == json!(id) && e["action"] == "published"
    })
    .await?;
    assert_eq!(entry["user"]["email"], "root@example.com");
    Ok(())
}

#[tokio::test]
async fn logs_are_admin_only() -> anyhow::Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.super_admin().await?;
    let author = app
        .user_with_role(&admin, "author@example.com", "contributor")
        .await?;

    for path in ["/api/activity", "/api/activity/audit"] {
        let resp = app.get(path, Some(&author)).await?;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{path}");
        let resp = app.get(path, None).await?;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{path}");
    }
    Ok(())
}

#[tokio::test]
async fn issued_tokens_never_reach_the_audit_log() -> anyhow::Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.super_admin().await?;
    let fresh = app.login("root@example.com").await?;

    let (login, entries) = wait_for_entry(&app, &admin, "/api/activity/audit?entityType=auth", |e| {
        e["action"] == "POST /api/auth/login"
    })
    .await?;
    assert_eq!(login["after"]["access_token"], "[redacted]");

    let register = entries
        .iter()
        .find(|e| e["action"] == "POST /api/auth/register")
        .expect("registration is audited");
    assert_eq!(register["after"]["access_token"], "[redacted]");

    let logged = serde_json::to_string(&entries)?;
    assert!(!logged.contains(&admin));
    assert!(!logged.contains(&fresh));
    Ok(())
}
