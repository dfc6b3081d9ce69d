//! Slug derivation and de-duplication.

use crate::errors::KbError;
use crate::providers::db::sqlite::{value, Executor, RowExt};
use std::collections::HashSet;

/// Lowercases `input` and collapses every run of characters outside
/// `[a-z0-9]` into a single `-`, trimming dashes at both ends.
/// Input with no usable characters yields `"page"`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "page".to_string()
    } else {
        slug
    }
}

/// True for non-empty strings made only of `[a-z0-9-]`.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

pub fn validate_slug(slug: &str) -> Result<(), KbError> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(KbError::BadRequest(format!(
            "Slug '{slug}' must contain only lowercase letters, numbers and hyphens"
        )))
    }
}

/// Returns `base` if it is not taken, otherwise the first of `base-1`,
/// `base-2`, ... that is free.
pub fn next_free_slug(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    let mut n: u64 = 1;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Picks a free page slug derived from `base`.
///
/// Trashed pages still own their slugs (they can be restored), so they are
/// part of the probe.
pub async fn ensure_unique_slug(exec: &dyn Executor, base: &str) -> Result<String, KbError> {
    let rows = exec
        .query(
            "SELECT slug FROM pages WHERE slug = ? OR slug LIKE ?",
            vec![value::text(base), value::text(format!("{base}-%"))],
        )
        .await?;
    let mut taken = HashSet::with_capacity(rows.len());
    for row in &rows {
        taken.insert(row.text(0)?);
    }
    Ok(next_free_slug(base, &taken))
}
