//! # Error Handling
//!
//! Error types for Rogha Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! Error (top-level)
//! │
//! ├── User Errors (100-199)
//! │   └── UserNotFound            - No user with that id/email
//! │
//! ├── Friendship Errors (200-299)
//! │   ├── CannotFriendSelf        - Self-friendship attempt
//! │   ├── AlreadyFriends          - Edge already ACCEPTED
//! │   ├── RequestAlreadyPending   - Caller already has a request out
//! │   ├── OppositePendingExists   - The other party already asked
//! │   ├── NoPendingRequest        - Nothing to accept/decline/cancel
//! │   ├── OnlyRecipientCanRespond - Requester tried to accept/decline
//! │   ├── OnlyRequesterCanCancel  - Recipient tried to cancel
//! │   ├── CannotUnfriendPending   - Unfriend on a PENDING edge
//! │   └── NotFriends              - No ACCEPTED edge
//! │
//! ├── Circle Errors (300-399)
//! │   ├── CircleNotFound          - No circle with that id
//! │   ├── NotCircleMember         - Actor is not a joined member
//! │   └── CanOnlyAddFriends       - Target is not an accepted friend
//! │
//! ├── Post Errors (400-499)
//! │   ├── PostNotFound            - Missing, or caller is not the author
//! │   ├── PostLocked              - Editorial mutation after publication
//! │   ├── InvalidTransition       - Disallowed status transition
//! │   └── InvalidAudience         - Bad audience/circle combination
//! │
//! ├── Edition Errors (500-599)
//! │   └── EditionNotFound         - No edition with that id
//! │
//! └── Storage Errors (900-999)
//!     ├── DatabaseError           - SQLite failure (retryable)
//!     └── SerializationError      - JSON encode/decode failure
//! ```
//!
//! Expected outcomes are not errors: optimistic-concurrency conflicts and
//! not-found on update are [`crate::posts::UpdateOutcome`] variants, and a
//! publish run that finds nothing to do reports a
//! [`crate::editions::PublishSkipReason`].

use thiserror::Error;

/// Result type alias for Rogha Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Rogha Core
///
/// All errors are categorized by module/domain to make error handling
/// clearer and to provide meaningful error messages to users.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // User Errors (100-199)
    // ========================================================================

    /// No user with that id or email
    #[error("User not found.")]
    UserNotFound,

    // ========================================================================
    // Friendship Errors (200-299)
    // ========================================================================

    /// Cannot friend yourself
    #[error("You cannot friend yourself.")]
    CannotFriendSelf,

    /// Already friends with this user
    #[error("You are already friends.")]
    AlreadyFriends,

    /// Caller already has a pending request to this user
    #[error("Request already pending.")]
    RequestAlreadyPending,

    /// The other party already has a pending request to the caller
    #[error("Incoming request already exists.")]
    OppositePendingExists,

    /// No pending request between the two users
    #[error("No pending request between these users.")]
    NoPendingRequest,

    /// Only the non-requesting party may accept or decline
    #[error("Only the recipient can respond to this request.")]
    OnlyRecipientCanRespond,

    /// Only the requester may withdraw a pending request
    #[error("Only the requester can cancel this request.")]
    OnlyRequesterCanCancel,

    /// Unfriending a PENDING edge (must decline/cancel instead)
    #[error("Cannot unfriend while the request is pending.")]
    CannotUnfriendPending,

    /// Not friends with this user
    #[error("Not friends with this user.")]
    NotFriends,

    // ========================================================================
    // Circle Errors (300-399)
    // ========================================================================

    /// Circle does not exist
    #[error("Circle not found.")]
    CircleNotFound,

    /// Actor is not a joined member of the circle
    #[error("You are not a member of this circle.")]
    NotCircleMember,

    /// Only accepted friends of the actor may be added to a circle
    #[error("You can only add friends to circles.")]
    CanOnlyAddFriends,

    // ========================================================================
    // Post Errors (400-499)
    // ========================================================================

    /// Post missing, or the caller is not its author.
    ///
    /// The two cases are deliberately collapsed so non-owners cannot
    /// probe for a post's existence.
    #[error("Post not found.")]
    PostNotFound,

    /// Editorial mutation on a PUBLISHED or ARCHIVED post
    #[error("Post can no longer be edited.")]
    PostLocked,

    /// Disallowed status transition
    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    /// Invalid audience/circle combination
    #[error("Invalid audience: {0}")]
    InvalidAudience(String),

    // ========================================================================
    // Edition Errors (500-599)
    // ========================================================================

    /// Edition does not exist
    #[error("Edition not found.")]
    EditionNotFound,

    // ========================================================================
    // Storage Errors (900-999)
    // ========================================================================

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// Get the stable numeric code for this error
    ///
    /// Error codes are organized by category:
    /// - 100-199: Users
    /// - 200-299: Friendships
    /// - 300-399: Circles
    /// - 400-499: Posts
    /// - 500-599: Editions
    /// - 900-999: Storage
    pub fn code(&self) -> i32 {
        match self {
            // Users (100-199)
            Error::UserNotFound => 100,

            // Friendships (200-299)
            Error::CannotFriendSelf => 200,
            Error::AlreadyFriends => 201,
            Error::RequestAlreadyPending => 202,
            Error::OppositePendingExists => 203,
            Error::NoPendingRequest => 204,
            Error::OnlyRecipientCanRespond => 205,
            Error::OnlyRequesterCanCancel => 206,
            Error::CannotUnfriendPending => 207,
            Error::NotFriends => 208,

            // Circles (300-399)
            Error::CircleNotFound => 300,
            Error::NotCircleMember => 301,
            Error::CanOnlyAddFriends => 302,

            // Posts (400-499)
            Error::PostNotFound => 400,
            Error::PostLocked => 401,
            Error::InvalidTransition(_) => 402,
            Error::InvalidAudience(_) => 403,

            // Editions (500-599)
            Error::EditionNotFound => 500,

            // Storage (900-999)
            Error::DatabaseError(_) => 900,
            Error::SerializationError(_) => 901,
        }
    }

    /// Check if this error is retryable
    ///
    /// Only transient store failures are retryable; everything else needs
    /// a different request. The publish job is safe to blindly retry, and
    /// a retried post update must re-supply a fresh expected version.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::DatabaseError(_))
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
