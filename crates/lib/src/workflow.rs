//! # Page Workflow
//!
//! The status of a page moves only along this table:
//!
//! | Action              | From               | To        |
//! |---------------------|--------------------|-----------|
//! | `submit_for_review` | draft              | review    |
//! | `approve`           | review             | published |
//! | `reject`            | review             | draft     |
//! | `publish`           | draft, archived    | published |
//! | `archive`           | draft, published   | archived  |
//!
//! Everything else is an `InvalidTransition`. Which roles may trigger each
//! action is decided at the HTTP boundary.

use crate::activity::ActivityAction;
use crate::errors::KbError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Draft,
    Review,
    Published,
    Archived,
}

impl PageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PageStatus::Draft => "draft",
            PageStatus::Review => "review",
            PageStatus::Published => "published",
            PageStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageStatus {
    type Err = KbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PageStatus::Draft),
            "review" => Ok(PageStatus::Review),
            "published" => Ok(PageStatus::Published),
            "archived" => Ok(PageStatus::Archived),
            other => Err(KbError::DataIntegrity(format!(
                "Unknown page status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    SubmitForReview,
    Approve,
    Reject,
    Publish,
    Archive,
}

impl WorkflowAction {
    pub fn allowed_from(self) -> &'static [PageStatus] {
        use PageStatus::*;
        match self {
            WorkflowAction::SubmitForReview => &[Draft],
            WorkflowAction::Approve | WorkflowAction::Reject => &[Review],
            WorkflowAction::Publish => &[Draft, Archived],
            WorkflowAction::Archive => &[Draft, Published],
        }
    }

    pub fn target(self) -> PageStatus {
        match self {
            WorkflowAction::SubmitForReview => PageStatus::Review,
            WorkflowAction::Approve | WorkflowAction::Publish => PageStatus::Published,
            WorkflowAction::Reject => PageStatus::Draft,
            WorkflowAction::Archive => PageStatus::Archived,
        }
    }

    /// Approve and reject are reviews: they stamp `reviewed_by_id` and
    /// `reviewed_at`. The direct admin actions stamp `updated_by_id`.
    pub fn is_review(self) -> bool {
        matches!(self, WorkflowAction::Approve | WorkflowAction::Reject)
    }

    pub fn activity(self) -> ActivityAction {
        match self {
            WorkflowAction::SubmitForReview => ActivityAction::SubmittedForReview,
            WorkflowAction::Approve => ActivityAction::Approved,
            WorkflowAction::Reject => ActivityAction::Rejected,
            WorkflowAction::Publish => ActivityAction::Published,
            WorkflowAction::Archive => ActivityAction::Archived,
        }
    }
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkflowAction::SubmitForReview => "submit for review",
            WorkflowAction::Approve => "approve",
            WorkflowAction::Reject => "reject",
            WorkflowAction::Publish => "publish",
            WorkflowAction::Archive => "archive",
        })
    }
}

/// Resolves the status `action` leads to from `from`.
pub fn transition(from: PageStatus, action: WorkflowAction) -> Result<PageStatus, KbError> {
    if action.allowed_from().contains(&from) {
        Ok(action.target())
    } else {
        Err(KbError::InvalidTransition { from, action })
    }
}
