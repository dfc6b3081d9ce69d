//! # Shared Upload Tests
//!
//! Duplicates and template-made pages point at the same stored files as
//! their source. A file is only unlinked once nothing live refers to it.

use kbase::modules::{Module, ModuleBody, ModuleDraft, ModuleKind, ModuleUpdate, NewModule};
use kbase::pages::NewPage;
use kbase::templates::TemplateInput;
use kbase::types::Actor;
use kbase_test_utils::TestSetup;
use std::path::{Path, PathBuf};

fn stored_file(t: &TestSetup, name: &str) -> anyhow::Result<PathBuf> {
    let path = t.upload_dir.path().join("pdfs").join(name);
    std::fs::write(&path, b"%PDF-1.4\n%%EOF\n")?;
    Ok(path)
}

fn pdf(path: &Path) -> ModuleDraft {
    ModuleDraft {
        title: None,
        order: None,
        body: ModuleBody::Pdf {
            file_path: path.to_string_lossy().into_owned(),
        },
    }
}

async fn pdf_module(t: &TestSetup, page_id: &str, path: &Path) -> anyhow::Result<Module> {
    let input = NewModule {
        page_id: page_id.to_string(),
        draft: pdf(path),
    };
    Ok(t.kb.modules.create(input, &Actor::system()).await?)
}

#[tokio::test]
async fn purging_a_duplicate_keeps_the_source_file() -> anyhow::Result<()> {
    let t = TestSetup::new().await?;
    let section = t.section("manuals").await?;
    let page = t.page(&section.id, "Handbook").await?;
    let file = stored_file(&t, "handbook.pdf")?;
    pdf_module(&t, &page.page.id, &file).await?;

    let copy = t.kb.pages.duplicate(&page.page.id, &Actor::system()).await?;
    t.kb.pages.trash(&copy.page.id, &Actor::system()).await?;
    t.kb.pages.permanent_delete(&copy.page.id, &Actor::system()).await?;
    assert!(file.exists(), "source page still serves the file");

    t.kb.pages.trash(&page.page.id, &Actor::system()).await?;
    t.kb.pages.permanent_delete(&page.page.id, &Actor::system()).await?;
    assert!(!file.exists(), "last reference gone");
    Ok(())
}

#[tokio::test]
async fn deleting_a_shared_module_keeps_the_file_until_the_last_one() -> anyhow::Result<()> {
    let t = TestSetup::new().await?;
    let section = t.section("manuals").await?;
    let page = t.page(&section.id, "Handbook").await?;
    let file = stored_file(&t, "shared.pdf")?;
    let original = pdf_module(&t, &page.page.id, &file).await?;
    let copy = t.kb.pages.duplicate(&page.page.id, &Actor::system()).await?;

    t.kb.modules.delete(&copy.modules[0].id, &Actor::system()).await?;
    assert!(file.exists());

    t.kb.modules.delete(&original.id, &Actor::system()).await?;
    assert!(!file.exists());
    Ok(())
}

#[tokio::test]
async fn template_files_outlive_the_pages_made_from_them() -> anyhow::Result<()> {
    let t = TestSetup::new().await?;
    let section = t.section("manuals").await?;
    let file = stored_file(&t, "template.pdf")?;
    let template = t
        .kb
        .templates
        .create(
            TemplateInput {
                name: "Manual".to_string(),
                description: None,
                modules: vec![pdf(&file)],
            },
            &Actor::system(),
        )
        .await?;

    let page = t
        .kb
        .pages
        .create(
            NewPage {
                section_id: section.id.clone(),
                title: "From template".to_string(),
                slug: None,
                show_author: true,
                show_metrics: true,
                icon: None,
                template_id: Some(template.id.clone()),
                status: None,
            },
            &Actor::system(),
        )
        .await?;
    assert_eq!(page.modules.len(), 1);

    t.kb.pages.trash(&page.page.id, &Actor::system()).await?;
    t.kb.pages.permanent_delete(&page.page.id, &Actor::system()).await?;
    assert!(file.exists(), "template still refers to the file");
    Ok(())
}

#[tokio::test]
async fn replacing_a_module_file_releases_the_old_one() -> anyhow::Result<()> {
    let t = TestSetup::new().await?;
    let section = t.section("manuals").await?;
    let page = t.page(&section.id, "Handbook").await?;
    let first = stored_file(&t, "v1.pdf")?;
    let second = stored_file(&t, "v2.pdf")?;
    let module = pdf_module(&t, &page.page.id, &first).await?;

    let patch = ModuleUpdate {
        file_path: Some(Some(second.to_string_lossy().into_owned())),
        ..Default::default()
    };
    t.kb.modules.update(&module.id, patch, &Actor::system()).await?;
    assert!(!first.exists());
    assert!(second.exists());

    let patch = ModuleUpdate {
        kind: Some(ModuleKind::Text),
        content: Some(Some("Now inline".to_string())),
        file_path: Some(None),
        ..Default::default()
    };
    let updated = t.kb.modules.update(&module.id, patch, &Actor::system()).await?;
    assert!(matches!(updated.body, ModuleBody::Text { .. }));
    assert!(!second.exists());
    Ok(())
}
