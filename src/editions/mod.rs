//! # Editions Module
//!
//! The edition registry (one row per calendar week, created lazily) and
//! the weekly publication job.
//!
//! The job is idempotent and safe to race: the first run for a week
//! stamps `published_at`, promotes every SUBMITTED post and archives the
//! leftover DRAFTs; any later run leaves the stamp and the archive sweep
//! alone but still promotes posts that were submitted after (or missed
//! by) the first run, so nothing stays stuck in SUBMITTED. The whole
//! sweep executes as one SQLite transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::storage::{Database, EditionRecord, PublishSweep};
use crate::week;

/// Why a publish run changed nothing (or less than everything)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishSkipReason {
    /// No edition row exists for the week — nothing was ever submitted
    NoEdition,
    /// A prior run already stamped the week
    AlreadyPublished,
}

/// Result of one `publish_week` invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    /// True only for the run that stamped `published_at`
    pub published: bool,
    pub reason: Option<PublishSkipReason>,
    pub edition_id: Option<String>,
    /// Posts promoted SUBMITTED → PUBLISHED by this run
    pub posts_published: u64,
}

/// Service for the edition registry and the weekly publish job
pub struct EditionService {
    db: Arc<Database>,
}

impl EditionService {
    /// Create a new edition service backed by the given database
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Find or create the edition for the week containing `at`.
    ///
    /// Concurrent calls for the same week converge on a single row via
    /// the UNIQUE week-start key.
    pub fn resolve_or_create(&self, at: DateTime<Utc>) -> Result<EditionRecord> {
        let week_start = week::week_start(at);
        let key = week_start.timestamp();
        let title = format!("Week of {}", week::week_label(week_start));

        let created = self
            .db
            .insert_edition_if_absent(&Uuid::new_v4().to_string(), &title, key)?;
        if created {
            tracing::info!("Created edition for week {}", week::week_label(week_start));
        }

        self.db
            .get_edition_by_week_start(key)?
            .ok_or(Error::EditionNotFound)
    }

    /// Get an edition by id
    pub fn get(&self, id: &str) -> Result<EditionRecord> {
        self.db.get_edition(id)?.ok_or(Error::EditionNotFound)
    }

    /// Published editions, newest week first
    pub fn list_published(&self) -> Result<Vec<EditionRecord>> {
        self.db.published_editions()
    }

    /// Run the weekly publication job for the week containing `target`.
    ///
    /// `target` is normalized to its week-start key first, so the cron
    /// trigger can pass any instant inside the intended week (the
    /// scheduled run passes "yesterday" to publish the week that just
    /// ended). Safe to invoke repeatedly and concurrently; see the
    /// module docs for the idempotence rules.
    pub fn publish_week(&self, target: DateTime<Utc>, now: DateTime<Utc>) -> Result<PublishOutcome> {
        let week_start = week::week_start(target);
        tracing::debug!(
            "publish_week: target week {} ({})",
            week::week_label(week_start),
            week_start
        );

        let sweep = self.db.publish_edition(week_start.timestamp(), now.timestamp())?;

        let outcome = match sweep {
            PublishSweep::NoEdition => {
                tracing::debug!("publish_week: no edition for {}", week::week_label(week_start));
                PublishOutcome {
                    published: false,
                    reason: Some(PublishSkipReason::NoEdition),
                    edition_id: None,
                    posts_published: 0,
                }
            }
            PublishSweep::AlreadyPublished {
                edition_id,
                promoted,
            } => {
                tracing::debug!(
                    "publish_week: edition {} already published, promoted {} straggler(s)",
                    edition_id,
                    promoted
                );
                PublishOutcome {
                    published: false,
                    reason: Some(PublishSkipReason::AlreadyPublished),
                    edition_id: Some(edition_id),
                    posts_published: promoted,
                }
            }
            PublishSweep::Published {
                edition_id,
                promoted,
                archived,
            } => {
                tracing::info!(
                    "Published edition {}: {} post(s) published, {} draft(s) archived",
                    edition_id,
                    promoted,
                    archived
                );
                PublishOutcome {
                    published: true,
                    reason: None,
                    edition_id: Some(edition_id),
                    posts_published: promoted,
                }
            }
        };

        Ok(outcome)
    }
}

// ============================================================================
// TESTS
// ============================================================================
