//! Page lifecycle over HTTP: trash, restore, permanent delete, duplicates,
//! concurrent writers and the public reader views.

mod common;

use common::TestApp;
use futures::future::join_all;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::collections::HashSet;

async fn published_page(app: &TestApp, token: &str, section_id: &str, title: &str) -> anyhow::Result<String> {
    let page = app.page(token, section_id, title).await?;
    let id = page["id"].as_str().unwrap_or_default().to_string();
    app.patch(&format!("/api/pages/{id}/publish"), token, json!({}))
        .await?
        .error_for_status()?;
    Ok(id)
}

fn ids(pages: &[Value]) -> HashSet<String> {
    pages
        .iter()
        .filter_map(|p| p["id"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn trashed_pages_leave_the_public_views() -> anyhow::Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.super_admin().await?;
    let section_id = app.section(&admin, "Guides", "guides").await?;
    let id = published_page(&app, &admin, &section_id, "Onboarding").await?;

    let before: Vec<Value> = app.get("/api/public/pages", None).await?.json().await?;
    assert!(ids(&before).contains(&id));

    let trashed = app.delete(&format!("/api/pages/{id}"), &admin).await?;
    assert_eq!(trashed.status(), StatusCode::NO_CONTENT);

    for path in ["/api/public/pages", "/api/public/pages/recent"] {
        let pages: Vec<Value> = app.get(path, None).await?.json().await?;
        assert!(!ids(&pages).contains(&id), "{path} hides trashed pages");
    }
    let by_slug = app.get("/api/public/pages/onboarding", None).await?;
    assert_eq!(by_slug.status(), StatusCode::NOT_FOUND);
    let search: Vec<Value> = app
        .get("/api/public/search?q=onboard", None)
        .await?
        .json()
        .await?;
    assert!(search.is_empty());

    let direct = app.get(&format!("/api/pages/{id}"), Some(&admin)).await?;
    assert_eq!(direct.status(), StatusCode::NOT_FOUND);
    let trash: Vec<Value> = app
        .get("/api/pages/admin/trashed", Some(&admin))
        .await?
        .json()
        .await?;
    assert!(ids(&trash).contains(&id));
    Ok(())
}

#[tokio::test]
async fn restore_keeps_the_status_and_permanent_delete_is_final() -> anyhow::Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.super_admin().await?;
    let section_id = app.section(&admin, "Guides", "guides").await?;
    let id = published_page(&app, &admin, &section_id, "Security basics").await?;

    app.delete(&format!("/api/pages/{id}"), &admin)
        .await?
        .error_for_status()?;
    let restored: Value = app
        .patch(&format!("/api/pages/{id}/restore"), &admin, json!({}))
        .await?
        .error_for_status()?
        .json()
        .await?;
    assert_eq!(restored["status"], "published");
    assert!(restored["deleted_at"].is_null());

    let again = app
        .patch(&format!("/api/pages/{id}/restore"), &admin, json!({}))
        .await?;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);

    let gone = app
        .delete(&format!("/api/pages/{id}/permanent"), &admin)
        .await?;
    assert_eq!(gone.status(), StatusCode::NO_CONTENT);
    let trash: Vec<Value> = app
        .get("/api/pages/admin/trashed", Some(&admin))
        .await?
        .json()
        .await?;
    assert!(!ids(&trash).contains(&id));
    let missing = app
        .delete(&format!("/api/pages/{id}/permanent"), &admin)
        .await?;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn trash_management_needs_an_admin() -> anyhow::Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.super_admin().await?;
    let author = app
        .user_with_role(&admin, "author@example.com", "contributor")
        .await?;
    let section_id = app.section(&admin, "Guides", "guides").await?;
    let page = app.page(&author, &section_id, "Draft notes").await?;
    let id = page["id"].as_str().unwrap_or_default().to_string();

    // Contributors may trash, but not restore or purge.
    app.delete(&format!("/api/pages/{id}"), &author)
        .await?
        .error_for_status()?;
    let restore = app
        .patch(&format!("/api/pages/{id}/restore"), &author, json!({}))
        .await?;
    assert_eq!(restore.status(), StatusCode::FORBIDDEN);
    let purge = app
        .delete(&format!("/api/pages/{id}/permanent"), &author)
        .await?;
    assert_eq!(purge.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn concurrent_creates_get_distinct_slugs() -> anyhow::Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.super_admin().await?;
    let section_id = app.section(&admin, "Guides", "guides").await?;

    let responses = join_all((0..5).map(|_| {
        app.post(
            "/api/pages",
            &admin,
            json!({ "section_id": section_id, "title": "Release notes" }),
        )
    }))
    .await;

    let mut slugs = HashSet::new();
    for resp in responses {
        let resp = resp?;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let page: Value = resp.json().await?;
        slugs.insert(page["slug"].as_str().unwrap_or_default().to_string());
    }
    assert_eq!(slugs.len(), 5);
    assert!(slugs.contains("release-notes"));
    Ok(())
}

#[tokio::test]
async fn concurrent_edits_all_land() -> anyhow::Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.super_admin().await?;
    let section_id = app.section(&admin, "Guides", "guides").await?;
    let page = app.page(&admin, &section_id, "Shared doc").await?;
    let id = page["id"].as_str().unwrap_or_default().to_string();
    let path = format!("/api/pages/{id}");

    let titles: Vec<String> = (0..6).map(|i| format!("Shared doc rev {i}")).collect();
    let responses = join_all(
        titles
            .iter()
            .map(|title| app.patch(&path, &admin, json!({ "title": title }))),
    )
    .await;
    for resp in responses {
        assert_eq!(resp?.status(), StatusCode::OK);
    }

    let current: Value = app.get(&path, Some(&admin)).await?.json().await?;
    let title = current["title"].as_str().unwrap_or_default().to_string();
    assert!(titles.contains(&title));
    Ok(())
}

#[tokio::test]
async fn duplicates_are_fresh_drafts() -> anyhow::Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.super_admin().await?;
    let section_id = app.section(&admin, "Guides", "guides").await?;
    let id = published_page(&app, &admin, &section_id, "Checklist").await?;
    app.post(
        "/api/modules",
        &admin,
        json!({ "page_id": id, "type": "TEXT", "content": "Step one" }),
    )
    .await?
    .error_for_status()?;

    let resp = app
        .post(&format!("/api/pages/{id}/duplicate"), &admin, json!({}))
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let copy: Value = resp.json().await?;
    assert_eq!(copy["title"], "Checklist (Copy)");
    assert_eq!(copy["slug"], "checklist-copy");
    assert_eq!(copy["status"], "draft");
    assert_eq!(copy["modules"][0]["content"], "Step one");
    Ok(())
}

#[tokio::test]
async fn public_reads_count_views_and_search_matches_content() -> anyhow::Result<()> {
    let app = TestApp::spawn().await?;
    let admin = app.super_admin().await?;
    let section_id = app.section(&admin, "Guides", "guides").await?;
    let titled = published_page(&app, &admin, &section_id, "Kubernetes primer").await?;
    let bodied = published_page(&app, &admin, &section_id, "Cluster notes").await?;
    app.post(
        "/api/modules",
        &admin,
        json!({ "page_id": bodied, "type": "TEXT", "content": "Runs on kubernetes" }),
    )
    .await?
    .error_for_status()?;
    let draft = app.page(&admin, &section_id, "Kubernetes draft").await?;

    let first: Value = app
        .get("/api/public/pages/kubernetes-primer", None)
        .await?
        .json()
        .await?;
    let second: Value = app
        .get("/api/public/pages/kubernetes-primer", None)
        .await?
        .json()
        .await?;
    assert_eq!(first["views"], 1);
    assert_eq!(second["views"], 2);

    let hits: Vec<Value> = app
        .get("/api/public/search?q=KUBERNETES", None)
        .await?
        .json()
        .await?;
    let hit_ids: Vec<&str> = hits.iter().filter_map(|p| p["id"].as_str()).collect();
    assert_eq!(hit_ids, vec![titled.as_str(), bodied.as_str()]);
    assert!(!hit_ids.contains(&draft["id"].as_str().unwrap_or_default()));

    let short: Vec<Value> = app.get("/api/public/search?q=k", None).await?.json().await?;
    assert!(short.is_empty());
    Ok(())
}
