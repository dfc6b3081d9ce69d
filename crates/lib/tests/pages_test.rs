//! # Page Service Tests
//!
//! Slug handling, the update whitelist, workflow transitions and the trash
//! lifecycle, run against a real database file.

use kbase::errors::KbError;
use kbase::modules::{ModuleBody, ModuleDraft, NewModule};
use kbase::pages::{NewPage, PageFilter, PageUpdate};
use kbase::types::Actor;
use kbase::workflow::{PageStatus, WorkflowAction};
use kbase_test_utils::TestSetup;

fn new_page(section_id: &str, title: &str, slug: Option<&str>) -> NewPage {
    NewPage {
        section_id: section_id.to_string(),
        title: title.to_string(),
        slug: slug.map(String::from),
        show_author: true,
        show_metrics: false,
        icon: None,
        template_id: None,
        status: None,
    }
}

#[tokio::test]
async fn derived_slugs_are_deduplicated() -> anyhow::Result<()> {
    let t = TestSetup::new().await?;
    let section = t.section("guides").await?;

    let first = t.page(&section.id, "Getting Started").await?;
    let second = t.page(&section.id, "Getting Started").await?;
    let third = t.page(&section.id, "Getting   Started!").await?;

    assert_eq!(first.page.slug, "getting-started");
    assert_eq!(second.page.slug, "getting-started-1");
    assert_eq!(third.page.slug, "getting-started-2");
    assert_eq!(first.page.status, PageStatus::Draft);
    assert_eq!(first.section.as_ref().map(|s| s.slug.as_str()), Some("guides"));
    Ok(())
}

#[tokio::test]
async fn explicit_slug_collision_is_a_conflict() -> anyhow::Result<()> {
    let t = TestSetup::new().await?;
    let section = t.section("guides").await?;
    let actor = Actor::system();

    t.kb.pages
        .create(new_page(&section.id, "Intro", Some("intro")), &actor)
        .await?;
    let err = t
        .kb
        .pages
        .create(new_page(&section.id, "Another intro", Some("intro")), &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, KbError::Conflict(_)), "got {err:?}");

    let err = t
        .kb
        .pages
        .create(new_page(&section.id, "Bad", Some("Not A Slug")), &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, KbError::BadRequest(_)));
    Ok(())
}

#[tokio::test]
async fn pages_cannot_start_outside_draft_or_in_a_missing_section() -> anyhow::Result<()> {
    let t = TestSetup::new().await?;
    let section = t.section("guides").await?;
    let actor = Actor::system();

    let mut published = new_page(&section.id, "Shortcut", None);
    published.status = Some(PageStatus::Published);
    assert!(matches!(
        t.kb.pages.create(published, &actor).await,
        Err(KbError::BadRequest(_))
    ));
    assert!(matches!(
        t.kb.pages.create(new_page("nope", "Orphan", None), &actor).await,
        Err(KbError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn update_changes_only_the_given_fields() -> anyhow::Result<()> {
    let t = TestSetup::new().await?;
    let section = t.section("guides").await?;
    let editor = t.insert_user("editor@example.com", "Editor").await?;
    let page = t.page(&section.id, "Draft title").await?;

    let updated = t
        .kb
        .pages
        .update(
            &page.page.id,
            PageUpdate {
                title: Some("Final title".into()),
                icon: Some(Some("book".into())),
                ..Default::default()
            },
            &Actor::user(&editor),
        )
        .await?;

    assert_eq!(updated.page.title, "Final title");
    assert_eq!(updated.page.icon.as_deref(), Some("book"));
    assert_eq!(updated.page.slug, page.page.slug);
    assert_eq!(updated.page.status, PageStatus::Draft);
    assert_eq!(updated.page.updated_by_id.as_deref(), Some(editor.as_str()));
    Ok(())
}

#[tokio::test]
async fn workflow_moves_through_review_and_rejects_invalid_pairs() -> anyhow::Result<()> {
    let t = TestSetup::new().await?;
    let section = t.section("guides").await?;
    let reviewer = t.insert_user("admin@example.com", "Admin").await?;
    let page = t.page(&section.id, "Policy").await?;
    let id = page.page.id.as_str();
    let admin = Actor::user(&reviewer);

    let err = t
        .kb
        .pages
        .transition(id, WorkflowAction::Approve, &admin)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        KbError::InvalidTransition {
            from: PageStatus::Draft,
            action: WorkflowAction::Approve
        }
    ));

    let review = t
        .kb
        .pages
        .transition(id, WorkflowAction::SubmitForReview, &Actor::system())
        .await?;
    assert_eq!(review.page.status, PageStatus::Review);

    let rejected = t.kb.pages.transition(id, WorkflowAction::Reject, &admin).await?;
    assert_eq!(rejected.page.status, PageStatus::Draft);
    assert_eq!(rejected.page.reviewed_by_id.as_deref(), Some(reviewer.as_str()));
    assert!(rejected.page.reviewed_at.is_some());

    t.kb.pages
        .transition(id, WorkflowAction::SubmitForReview, &Actor::system())
        .await?;
    let approved = t.kb.pages.transition(id, WorkflowAction::Approve, &admin).await?;
    assert_eq!(approved.page.status, PageStatus::Published);

    let archived = t.kb.pages.transition(id, WorkflowAction::Archive, &admin).await?;
    assert_eq!(archived.page.status, PageStatus::Archived);
    assert!(t
        .kb
        .pages
        .transition(id, WorkflowAction::SubmitForReview, &admin)
        .await
        .is_err());
    let republished = t.kb.pages.transition(id, WorkflowAction::Publish, &admin).await?;
    assert_eq!(republished.page.status, PageStatus::Published);
    Ok(())
}

#[tokio::test]
async fn trash_restore_and_permanent_delete() -> anyhow::Result<()> {
    let t = TestSetup::new().await?;
    let section = t.section("guides").await?;
    let actor = Actor::system();
    let page = t.page(&section.id, "Handbook").await?;
    let id = page.page.id.clone();

    let pdf = t.upload_dir.path().join("pdfs").join("handbook.pdf");
    tokio::fs::write(&pdf, b"%PDF-1.4").await?;
    t.kb.modules
        .create(
            NewModule {
                page_id: id.clone(),
                draft: ModuleDraft {
                    title: Some("Handbook".into()),
                    order: None,
                    body: ModuleBody::Pdf {
                        file_path: pdf.to_string_lossy().into_owned(),
                    },
                },
            },
            &actor,
        )
        .await?;

    t.kb.pages.trash(&id, &actor).await?;
    assert!(t.kb.pages.list(&PageFilter::default()).await?.is_empty());
    assert!(matches!(t.kb.pages.get(&id).await, Err(KbError::NotFound(_))));
    let trashed = t.kb.pages.list_trashed().await?;
    assert_eq!(trashed.len(), 1);
    assert!(trashed[0].page.deleted_at.is_some());

    let restored = t.kb.pages.restore(&id, &actor).await?;
    assert!(restored.page.deleted_at.is_none());
    assert_eq!(restored.modules.len(), 1, "modules survive the trash");
    assert!(matches!(
        t.kb.pages.restore(&id, &actor).await,
        Err(KbError::NotFound(_))
    ));

    t.kb.pages.permanent_delete(&id, &actor).await?;
    assert!(!pdf.exists(), "managed upload is removed from disk");
    assert!(t.kb.pages.list_trashed().await?.is_empty());
    assert!(t.kb.modules.list(&id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn duplicate_copies_live_modules_into_a_draft() -> anyhow::Result<()> {
    let t = TestSetup::new().await?;
    let section = t.section("guides").await?;
    let page = t.page(&section.id, "Onboarding").await?;
    t.text_module(&page.page.id, "Welcome").await?;
    let removed = t.text_module(&page.page.id, "Old news").await?;
    t.kb.modules.delete(&removed.id, &Actor::system()).await?;

    let copy = t.kb.pages.duplicate(&page.page.id, &Actor::system()).await?;
    assert_eq!(copy.page.title, "Onboarding (Copy)");
    assert_eq!(copy.page.slug, "onboarding-copy");
    assert_eq!(copy.page.status, PageStatus::Draft);
    assert_eq!(copy.modules.len(), 1);
    assert!(matches!(
        &copy.modules[0].body,
        ModuleBody::Text { content } if content == "Welcome"
    ));

    let again = t.kb.pages.duplicate(&page.page.id, &Actor::system()).await?;
    assert_eq!(again.page.slug, "onboarding-copy-1");
    Ok(())
}
