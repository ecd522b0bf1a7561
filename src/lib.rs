//! # Rogha Core
//!
//! The edition-lifecycle and post-visibility core of Rogha, a social
//! publishing app where posts are grouped into weekly "editions" and
//! released on a shared schedule instead of appearing immediately.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌──────────────┐
//! │   Friends   │  │   Circles   │  │    Posts    │  │   Editions   │
//! │             │  │             │  │             │  │              │
//! │ - Request   │  │ - Create    │  │ - Draft     │  │ - Week keys  │
//! │ - Accept    │  │ - Add/Leave │  │ - CAS edits │  │ - Resolve    │
//! │ - Unfriend  │  │ - Rejoin    │  │ - Submit    │  │ - Publish    │
//! └──────┬──────┘  └──────┬──────┘  └──────┬──────┘  └──────┬───────┘
//!        │                │                │                │
//!        └───────────┬────┴────────────────┴───────┬────────┘
//!                    ▼                             ▼
//!            ┌─────────────┐              ┌────────────────┐
//!            │ Visibility  │              │ Notifications  │
//!            │  resolver   │              │  (fan-out +    │
//!            │             │              │   dedup)       │
//!            └──────┬──────┘              └────────┬───────┘
//!                   │                              │
//!                   └──────────────┬───────────────┘
//!                                  ▼
//!                         ┌─────────────────┐
//!                         │     Storage     │
//!                         │    (SQLite)     │
//!                         └─────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`storage`] - SQLite persistence (records, CAS update, publish sweep)
//! - [`week`] - Canonical week-key computation
//! - [`time`] - Wall-clock helpers
//! - [`friends`] - Friendship graph (requests, acceptance, unfriending)
//! - [`circles`] - Named member groups scoping post audiences
//! - [`posts`] - Post lifecycle and optimistic concurrency
//! - [`editions`] - Edition registry and the weekly publication job
//! - [`visibility`] - Audience-scoped read resolver
//! - [`notifications`] - Submission fan-out and its delivery seam
//!
//! ## Lifecycle Model
//!
//! A post starts as a DRAFT, editable only by its author under an
//! optimistic-concurrency version counter. Submitting binds it to the
//! current week's edition and notifies its audience once. The weekly
//! publication job — idempotent, transactional, safe to race — promotes
//! the week's SUBMITTED posts to PUBLISHED and archives the drafts that
//! missed the window. Readers go through the visibility resolver, which
//! checks post status and audience against the *current* friendship and
//! circle-membership state on every read.

pub mod circles;
pub mod editions;
pub mod error;
pub mod friends;
pub mod notifications;
pub mod posts;
pub mod storage;
pub mod time;
pub mod visibility;
pub mod week;

// Re-export the primary API at the crate root
pub use circles::{CircleService, MembershipStatus};
pub use editions::{EditionService, PublishOutcome, PublishSkipReason};
pub use error::{Error, Result};
pub use friends::{canonical_pair, FriendBox, FriendsService, FriendshipStatus, PerspectiveState};
pub use notifications::{NotificationService, NotificationType, NullNotifier, SubmissionNotifier};
pub use posts::{Audience, PostPatch, PostService, PostStatus, UpdateOutcome};
pub use storage::{Database, EditionRecord, PostRecord, UserRecord};
pub use visibility::VisibilityService;

/// Get the library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// TESTS
// ============================================================================
