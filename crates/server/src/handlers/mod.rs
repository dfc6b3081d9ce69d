//! # API Route Handlers
//!
//! One sub-module per resource. Handlers stay thin: they pick the caller
//! out of the request, call the matching `kbase` service and let `AppError`
//! map failures onto status codes.

pub mod activity;
pub mod auth_handlers;
pub mod files;
pub mod general;
pub mod modules;
pub mod pages;
pub mod public;
pub mod sections;
pub mod settings;
pub mod suggestions;
pub mod templates;
pub mod users;
pub mod versions;

use serde::Deserialize;

/// Body of every reorder endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReorderRequest {
    pub ordered_ids: Vec<String>,
}
