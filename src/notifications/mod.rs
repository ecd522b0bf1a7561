//! # Notifications Module
//!
//! Submission fan-out: when a post moves DRAFT → SUBMITTED, every
//! recipient in the post's resolved audience gets exactly one
//! notification, however many times the transition detection runs.
//!
//! The recipient set depends on the audience: friends of the author for
//! FRIENDS, joined circle members (minus the author) for CIRCLE, and
//! nobody for ALL_USERS. Dedup is the `UNIQUE (user_id, type, post_id)`
//! constraint — delivery is attempted only for rows actually inserted.
//!
//! Delivery itself (email, push) is the out-of-scope collaborator behind
//! [`SubmissionNotifier`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::posts::Audience;
use crate::storage::{Database, NotificationRecord, PostRecord};

/// Kind of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationType {
    /// A friend's (or circle-mate's) post was submitted for this week
    Submit,
}

impl NotificationType {
    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Submit => "SUBMIT",
        }
    }

    /// Parse from database string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUBMIT" => Some(NotificationType::Submit),
            _ => None,
        }
    }
}

/// Delivery collaborator for submission notifications.
///
/// Implementations send email/push for the given recipients. The core
/// guarantees the recipient list is already deduplicated against
/// everything previously delivered for the same post.
pub trait SubmissionNotifier: Send + Sync {
    fn notify_submission(&self, post_id: &str, recipient_ids: &[String]) -> Result<()>;
}

/// No-op notifier for callers without delivery wiring (and for tests)
pub struct NullNotifier;

impl SubmissionNotifier for NullNotifier {
    fn notify_submission(&self, _post_id: &str, _recipient_ids: &[String]) -> Result<()> {
        Ok(())
    }
}

/// Service for creating and reading notifications
pub struct NotificationService {
    db: Arc<Database>,
    notifier: Arc<dyn SubmissionNotifier>,
}

impl NotificationService {
    /// Create a new notification service
    pub fn new(db: Arc<Database>, notifier: Arc<dyn SubmissionNotifier>) -> Self {
        Self { db, notifier }
    }

    /// Fan out the submitted-post notification to the post's audience.
    ///
    /// Inserts one notification per recipient not already notified for
    /// this post, then hands the fresh recipients to the delivery
    /// collaborator. Returns how many recipients were newly notified.
    /// Delivery failures are logged, not propagated — the submission
    /// itself already happened.
    pub fn notify_submission(&self, post: &PostRecord) -> Result<usize> {
        let recipients = self.recipients_for(post)?;
        let mut fresh = Vec::new();

        for recipient in recipients {
            let id = Uuid::new_v4().to_string();
            let inserted = self.db.insert_notification(
                &id,
                &recipient,
                &post.author_id,
                NotificationType::Submit.as_str(),
                &post.id,
            )?;
            if inserted {
                fresh.push(recipient);
            }
        }

        if !fresh.is_empty() {
            if let Err(e) = self.notifier.notify_submission(&post.id, &fresh) {
                tracing::warn!("Submission delivery failed for post {}: {}", post.id, e);
            }
        }

        tracing::info!(
            "Submission fan-out for post {}: {} new recipient(s)",
            post.id,
            fresh.len()
        );
        Ok(fresh.len())
    }

    /// The recipient set for a post's audience
    pub fn recipients_for(&self, post: &PostRecord) -> Result<Vec<String>> {
        let audience = Audience::from_parts(&post.audience_type, post.circle_id.clone())?;
        match audience {
            // Everyone will see it on the edition page; no targeted fan-out.
            Audience::AllUsers => Ok(Vec::new()),
            Audience::Friends => self.db.accepted_friend_ids(&post.author_id),
            Audience::Circle(circle_id) => {
                let mut members = self.db.joined_member_ids(&circle_id)?;
                members.retain(|m| m != &post.author_id);
                Ok(members)
            }
        }
    }

    /// A user's notifications, newest first
    pub fn notifications_for(&self, user_id: &str) -> Result<Vec<NotificationRecord>> {
        self.db.notifications_for(user_id, 20)
    }

    /// Mark notifications read
    pub fn mark_read(&self, ids: &[String]) -> Result<usize> {
        self.db.mark_notifications_read(ids)
    }
}

// ============================================================================
// TESTS
// ============================================================================
