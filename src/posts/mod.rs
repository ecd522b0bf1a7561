//! # Posts Module
//!
//! The post lifecycle state machine and its optimistic-concurrency
//! editorial contract.
//!
//! ## Lifecycle
//!
//! ```text
//!             create              submit (author)
//!   ┌───────┐         ┌───────┐ ──────────────────► ┌───────────┐
//!   │ (new) │ ──────► │ DRAFT │                     │ SUBMITTED │
//!   └───────┘         └───────┘ ◄────────────────── └───────────┘
//!                         │         unsubmit              │
//!            publish job  │                               │  publish job
//!                         ▼                               ▼
//!                    ┌──────────┐                   ┌───────────┐
//!                    │ ARCHIVED │                   │ PUBLISHED │
//!                    └──────────┘                   └───────────┘
//! ```
//!
//! Submission binds the post to the current week's edition (creating the
//! edition row if needed) and fires the one-time notification fan-out.
//! PUBLISHED and ARCHIVED are terminal; only the weekly publish job ever
//! sets them.
//!
//! Editorial updates are compare-and-swap: the caller presents the
//! version it last read, exactly one racer per version wins, and the
//! losers get [`UpdateOutcome::Conflict`] — a value to branch on, not an
//! error. There is no server-side merge; on conflict, re-fetch and retry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::editions::EditionService;
use crate::error::{Error, Result};
use crate::notifications::{NotificationService, SubmissionNotifier};
use crate::storage::{Database, PostRecord};

/// Status of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostStatus {
    /// Initial; mutable; visible only to the author
    Draft,
    /// Bound to an edition, waiting for the weekly publish
    Submitted,
    /// Promoted by the publish job; readable per its audience
    Published,
    /// Was still DRAFT when its week published; never shown
    Archived,
}

impl PostStatus {
    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "DRAFT",
            PostStatus::Submitted => "SUBMITTED",
            PostStatus::Published => "PUBLISHED",
            PostStatus::Archived => "ARCHIVED",
        }
    }

    /// Parse from database string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(PostStatus::Draft),
            "SUBMITTED" => Some(PostStatus::Submitted),
            "PUBLISHED" => Some(PostStatus::Published),
            "ARCHIVED" => Some(PostStatus::Archived),
            _ => None,
        }
    }

    /// Terminal statuses permit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, PostStatus::Published | PostStatus::Archived)
    }
}

/// The audience an author chose for a post.
///
/// A circle audience always carries its circle id, so the invalid
/// "CIRCLE without a circle" combination cannot be represented; the
/// string pair stored in the database goes through [`Audience::from_parts`],
/// which rejects it before any write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Audience {
    /// Every authenticated user
    AllUsers,
    /// Accepted friends of the author
    Friends,
    /// Joined members of one named circle
    Circle(String),
}

impl Audience {
    /// The stored (audience_type, circle_id) column pair
    pub fn as_parts(&self) -> (&'static str, Option<&str>) {
        match self {
            Audience::AllUsers => ("ALL_USERS", None),
            Audience::Friends => ("FRIENDS", None),
            Audience::Circle(id) => ("CIRCLE", Some(id)),
        }
    }

    /// Validate and build from the stored (or incoming) column pair.
    ///
    /// A non-circle audience ignores any stray circle id; a circle
    /// audience without one is a validation error.
    pub fn from_parts(audience_type: &str, circle_id: Option<String>) -> Result<Self> {
        match audience_type {
            "ALL_USERS" => Ok(Audience::AllUsers),
            "FRIENDS" => Ok(Audience::Friends),
            "CIRCLE" => circle_id.map(Audience::Circle).ok_or_else(|| {
                Error::InvalidAudience("CIRCLE audience requires a circle id".into())
            }),
            other => Err(Error::InvalidAudience(format!(
                "unknown audience type: {}",
                other
            ))),
        }
    }
}

/// Editorial fields of an update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<serde_json::Value>,
    pub audience: Option<Audience>,
}

/// Result of an editorial update attempt.
///
/// Conflict and not-found are expected outcomes the caller branches on.
/// Not-found also covers "not the author", so non-owners cannot tell a
/// missing post from someone else's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOutcome {
    /// The write landed; version advanced by exactly 1
    Updated { version: i64, updated_at: i64 },
    /// Stored version differed from the expected one; re-fetch and retry
    Conflict,
    /// No such post, or the caller is not its author
    NotFound,
}

/// Service for authoring and transitioning posts
pub struct PostService {
    db: Arc<Database>,
    editions: EditionService,
    notifications: NotificationService,
}

impl PostService {
    /// Create a new post service backed by the given database.
    ///
    /// `notifier` is the delivery collaborator invoked on submission
    /// fan-out; pass [`crate::notifications::NullNotifier`] when no
    /// delivery is wired up.
    pub fn new(db: Arc<Database>, notifier: Arc<dyn SubmissionNotifier>) -> Self {
        Self {
            editions: EditionService::new(db.clone()),
            notifications: NotificationService::new(db.clone(), notifier),
            db,
        }
    }

    /// Create a new DRAFT at version 1, bound to no edition
    pub fn create_draft(
        &self,
        author_id: &str,
        title: Option<&str>,
        content: &serde_json::Value,
        audience: Audience,
    ) -> Result<PostRecord> {
        let id = Uuid::new_v4().to_string();
        let body = serde_json::to_string(content)?;
        let (audience_type, circle_id) = audience.as_parts();

        self.db
            .create_post(&id, author_id, title, &body, audience_type, circle_id)?;

        tracing::info!("Created draft {} by {}", id, author_id);
        self.owned_post(&id, author_id)
    }

    /// Editorial update with optimistic concurrency.
    ///
    /// The caller must present the version it last read. On success the
    /// version advances by exactly 1 and the new (version, updated_at)
    /// pair is returned. A stale version yields `Conflict`; a missing
    /// post or a non-author caller yields `NotFound`. A post that has
    /// been published or archived can no longer be edited at all — that
    /// is a validation error, raised before any write.
    pub fn update(
        &self,
        post_id: &str,
        caller_id: &str,
        patch: &PostPatch,
        expected_version: i64,
    ) -> Result<UpdateOutcome> {
        let post = match self.db.get_post(post_id)? {
            Some(post) => post,
            None => return Ok(UpdateOutcome::NotFound),
        };
        if post.author_id != caller_id {
            return Ok(UpdateOutcome::NotFound);
        }
        if status_of(&post)?.is_terminal() {
            return Err(Error::PostLocked);
        }

        let content = match &patch.content {
            Some(value) => Some(serde_json::to_string(value)?),
            None => None,
        };
        let audience = patch.audience.as_ref().map(|a| a.as_parts());

        let written = self.db.cas_update_post(
            post_id,
            expected_version,
            patch.title.as_deref(),
            content.as_deref(),
            audience,
        )?;

        if !written {
            // The row existed a moment ago, so this is almost always a
            // version race; re-check in case it was deleted meanwhile.
            return Ok(match self.db.get_post(post_id)? {
                Some(_) => UpdateOutcome::Conflict,
                None => UpdateOutcome::NotFound,
            });
        }

        let updated = self.owned_post(post_id, caller_id)?;
        Ok(UpdateOutcome::Updated {
            version: updated.version,
            updated_at: updated.updated_at,
        })
    }

    /// DRAFT → SUBMITTED.
    ///
    /// Author-only. Resolves (or creates) the edition for the week
    /// containing `at`, binds the post to it, and fires the submission
    /// fan-out — at most once per (post, recipient), ever.
    pub fn submit(&self, post_id: &str, author_id: &str, at: DateTime<Utc>) -> Result<PostRecord> {
        let post = self.owned_post(post_id, author_id)?;
        let status = status_of(&post)?;
        if status != PostStatus::Draft {
            return Err(Error::InvalidTransition(format!(
                "{} → SUBMITTED",
                post.status
            )));
        }

        let edition = self.editions.resolve_or_create(at)?;

        if !self.db.mark_submitted(post_id, &edition.id)? {
            // Lost a race against another transition on the same post
            return Err(Error::InvalidTransition("DRAFT → SUBMITTED".into()));
        }

        let submitted = self.owned_post(post_id, author_id)?;
        self.notifications.notify_submission(&submitted)?;

        tracing::info!("Submitted post {} into edition {}", post_id, edition.id);
        Ok(submitted)
    }

    /// SUBMITTED → DRAFT.
    ///
    /// The edition binding stays (a resubmission in the same week lands
    /// in the same edition) and sent notifications are not reversed.
    pub fn unsubmit(&self, post_id: &str, author_id: &str) -> Result<PostRecord> {
        let post = self.owned_post(post_id, author_id)?;
        if status_of(&post)? != PostStatus::Submitted {
            return Err(Error::InvalidTransition(format!("{} → DRAFT", post.status)));
        }

        if !self.db.mark_unsubmitted(post_id)? {
            return Err(Error::InvalidTransition("SUBMITTED → DRAFT".into()));
        }

        tracing::info!("Unsubmitted post {}", post_id);
        self.owned_post(post_id, author_id)
    }

    /// Author-only hard delete. Published posts cannot be deleted.
    pub fn delete(&self, post_id: &str, author_id: &str) -> Result<()> {
        let post = self.owned_post(post_id, author_id)?;
        if status_of(&post)? == PostStatus::Published {
            return Err(Error::PostLocked);
        }

        self.db.delete_post(post_id)?;
        tracing::info!("Deleted post {}", post_id);
        Ok(())
    }

    /// Fetch a post as its author; anyone else sees `PostNotFound`
    pub fn get_own(&self, post_id: &str, author_id: &str) -> Result<PostRecord> {
        self.owned_post(post_id, author_id)
    }

    fn owned_post(&self, post_id: &str, caller_id: &str) -> Result<PostRecord> {
        match self.db.get_post(post_id)? {
            Some(post) if post.author_id == caller_id => Ok(post),
            _ => Err(Error::PostNotFound),
        }
    }
}

fn status_of(post: &PostRecord) -> Result<PostStatus> {
    PostStatus::parse(&post.status)
        .ok_or_else(|| Error::DatabaseError(format!("unknown post status: {}", post.status)))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NullNotifier;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 3, 12, 0, 0).unwrap()
    }

    fn setup() -> (Arc<Database>, PostService) {
        let db = Arc::new(Database::open(None).unwrap());
        for id in ["author", "friend", "stranger"] {
            db.sync_user(id, Some(id), &format!("{}@example.com", id))
                .unwrap();
        }
        let service = PostService::new(db.clone(), Arc::new(NullNotifier));
        (db, service)
    }

    fn body() -> serde_json::Value {
        serde_json::json!({ "root": { "children": [] } })
    }

    #[test]
    fn test_create_draft_defaults() {
        let (_db, posts) = setup();
        let post = posts
            .create_draft("author", Some("Hello"), &body(), Audience::Friends)
            .unwrap();

        assert_eq!(post.status, "DRAFT");
        assert_eq!(post.version, 1);
        assert!(post.edition_id.is_none());
        assert_eq!(post.audience_type, "FRIENDS");
        assert!(post.circle_id.is_none());
    }

    #[test]
    fn test_update_versions_are_strictly_increasing() {
        let (_db, posts) = setup();
        let post = posts
            .create_draft("author", None, &body(), Audience::Friends)
            .unwrap();

        let mut version = post.version;
        for i in 0..3 {
            let patch = PostPatch {
                title: Some(format!("rev {}", i)),
                ..Default::default()
            };
            match posts.update(&post.id, "author", &patch, version).unwrap() {
                UpdateOutcome::Updated {
                    version: new_version,
                    ..
                } => {
                    assert_eq!(new_version, version + 1);
                    version = new_version;
                }
                other => panic!("expected update, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_stale_version_conflicts_without_overwriting() {
        let (_db, posts) = setup();
        let post = posts
            .create_draft("author", None, &body(), Audience::Friends)
            .unwrap();

        let patch = PostPatch {
            title: Some("tab one".into()),
            ..Default::default()
        };
        let outcome = posts.update(&post.id, "author", &patch, 1).unwrap();
        assert!(matches!(outcome, UpdateOutcome::Updated { version: 2, .. }));

        // Second tab still holds version 1
        let patch = PostPatch {
            title: Some("tab two".into()),
            ..Default::default()
        };
        let outcome = posts.update(&post.id, "author", &patch, 1).unwrap();
        assert_eq!(outcome, UpdateOutcome::Conflict);

        let current = posts.get_own(&post.id, "author").unwrap();
        assert_eq!(current.title.as_deref(), Some("tab one"));
        assert_eq!(current.version, 2);
    }

    #[test]
    fn test_update_not_found_hides_existence() {
        let (_db, posts) = setup();
        let post = posts
            .create_draft("author", None, &body(), Audience::Friends)
            .unwrap();

        let patch = PostPatch::default();
        assert_eq!(
            posts.update("missing", "author", &patch, 1).unwrap(),
            UpdateOutcome::NotFound
        );
        // A non-author gets the same signal as a missing post
        assert_eq!(
            posts.update(&post.id, "stranger", &patch, 1).unwrap(),
            UpdateOutcome::NotFound
        );
    }

    #[test]
    fn test_published_post_is_locked() {
        let (db, posts) = setup();
        let post = posts
            .create_draft("author", None, &body(), Audience::AllUsers)
            .unwrap();
        posts.submit(&post.id, "author", at()).unwrap();

        let edition_id = posts.get_own(&post.id, "author").unwrap().edition_id.unwrap();
        let week_start = db.get_edition(&edition_id).unwrap().unwrap().week_start;
        db.publish_edition(week_start, at().timestamp()).unwrap();

        let patch = PostPatch {
            title: Some("too late".into()),
            ..Default::default()
        };
        assert!(matches!(
            posts.update(&post.id, "author", &patch, 2),
            Err(Error::PostLocked)
        ));
        assert!(matches!(
            posts.delete(&post.id, "author"),
            Err(Error::PostLocked)
        ));
    }

    #[test]
    fn test_submit_binds_edition_and_notifies_once() {
        let (db, posts) = setup();
        // author and friend are accepted friends
        let (lo, hi) = crate::friends::canonical_pair("author", "friend").unwrap();
        db.create_friendship(&lo, &hi, "author").unwrap();
        db.accept_friendship(&lo, &hi).unwrap();

        let post = posts
            .create_draft("author", None, &body(), Audience::Friends)
            .unwrap();
        let submitted = posts.submit(&post.id, "author", at()).unwrap();

        assert_eq!(submitted.status, "SUBMITTED");
        let edition_id = submitted.edition_id.clone().unwrap();
        assert!(db.get_edition(&edition_id).unwrap().is_some());
        assert_eq!(db.notifications_for("friend", 20).unwrap().len(), 1);

        // Unsubmit keeps the binding; resubmission lands in the same
        // edition and produces no second notification.
        let back = posts.unsubmit(&post.id, "author").unwrap();
        assert_eq!(back.status, "DRAFT");
        assert_eq!(back.edition_id.as_deref(), Some(edition_id.as_str()));

        let again = posts.submit(&post.id, "author", at()).unwrap();
        assert_eq!(again.edition_id.as_deref(), Some(edition_id.as_str()));
        assert_eq!(db.notifications_for("friend", 20).unwrap().len(), 1);
    }

    #[test]
    fn test_submit_requires_draft_and_author() {
        let (_db, posts) = setup();
        let post = posts
            .create_draft("author", None, &body(), Audience::Friends)
            .unwrap();

        assert!(matches!(
            posts.submit(&post.id, "stranger", at()),
            Err(Error::PostNotFound)
        ));

        posts.submit(&post.id, "author", at()).unwrap();
        assert!(matches!(
            posts.submit(&post.id, "author", at()),
            Err(Error::InvalidTransition(_))
        ));
        assert!(matches!(
            posts.unsubmit(&post.id, "stranger"),
            Err(Error::PostNotFound)
        ));
    }

    #[test]
    fn test_audience_parts_round_trip_and_validation() {
        assert_eq!(
            Audience::from_parts("CIRCLE", Some("c1".into())).unwrap(),
            Audience::Circle("c1".into())
        );
        assert!(matches!(
            Audience::from_parts("CIRCLE", None),
            Err(Error::InvalidAudience(_))
        ));
        assert!(matches!(
            Audience::from_parts("EVERYONE", None),
            Err(Error::InvalidAudience(_))
        ));
        // A stray circle id on a non-circle audience is dropped
        assert_eq!(
            Audience::from_parts("FRIENDS", Some("c1".into())).unwrap(),
            Audience::Friends
        );
    }

    #[test]
    fn test_update_audience_rewrites_circle_id() {
        let (_db, posts) = setup();
        let post = posts
            .create_draft("author", None, &body(), Audience::Circle("c1".into()))
            .unwrap();
        assert_eq!(post.circle_id.as_deref(), Some("c1"));

        let patch = PostPatch {
            audience: Some(Audience::Friends),
            ..Default::default()
        };
        posts.update(&post.id, "author", &patch, 1).unwrap();

        let current = posts.get_own(&post.id, "author").unwrap();
        assert_eq!(current.audience_type, "FRIENDS");
        assert!(current.circle_id.is_none());
    }

    #[test]
    fn test_delete_draft() {
        let (_db, posts) = setup();
        let post = posts
            .create_draft("author", None, &body(), Audience::Friends)
            .unwrap();

        assert!(matches!(
            posts.delete(&post.id, "stranger"),
            Err(Error::PostNotFound)
        ));
        posts.delete(&post.id, "author").unwrap();
        assert!(matches!(
            posts.get_own(&post.id, "author"),
            Err(Error::PostNotFound)
        ));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(PostStatus::Draft.as_str(), "DRAFT");
        assert_eq!(PostStatus::parse("ARCHIVED"), Some(PostStatus::Archived));
        assert_eq!(PostStatus::parse("bogus"), None);
        assert!(PostStatus::Published.is_terminal());
        assert!(!PostStatus::Submitted.is_terminal());
    }
}
