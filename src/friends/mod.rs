//! # Friends Module
//!
//! The symmetric friendship graph: request, accept/decline, cancel,
//! unfriend, and the listings the visibility resolver reads.
//!
//! ## Friend Request Flow
//!
//! ```text
//! Alice                                    Bob
//! ─────────────────────────────────────────────────────────────
//! request(bob)
//!   └─► friendships row (a_id < b_id),
//!       status PENDING, requester alice
//!                                          accept(alice)
//!                                            └─► status ACCEPTED,
//!                                                accepted_at stamped
//!                                          — or —
//!                                          decline(alice)
//!                                            └─► row deleted
//! ```
//!
//! An edge is stored once per unordered pair, canonically ordered so
//! lookups never depend on who asks. Only the non-requesting party may
//! accept or decline; the requester may cancel. Unfriending is only
//! possible once ACCEPTED — a pending request is withdrawn, not
//! unfriended.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::storage::{Database, FriendshipRecord, UserRecord};

/// Compute the canonical unordered pair (low, high).
///
/// Lexicographic ordering over the two ids; rejects self-friendship.
pub fn canonical_pair(me: &str, other: &str) -> Result<(String, String)> {
    if me == other {
        return Err(Error::CannotFriendSelf);
    }
    if me < other {
        Ok((me.to_string(), other.to_string()))
    } else {
        Ok((other.to_string(), me.to_string()))
    }
}

/// Status of a friendship edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FriendshipStatus {
    /// Waiting for the recipient to respond
    Pending,
    /// Both parties confirmed
    Accepted,
}

impl FriendshipStatus {
    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendshipStatus::Pending => "PENDING",
            FriendshipStatus::Accepted => "ACCEPTED",
        }
    }

    /// Parse from database string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(FriendshipStatus::Pending),
            "ACCEPTED" => Some(FriendshipStatus::Accepted),
            _ => None,
        }
    }
}

/// The caller's perspective on an edge (or its absence)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerspectiveState {
    /// No edge between the two users
    None,
    /// The caller asked and is waiting
    PendingOutgoing,
    /// The other party asked; the caller may accept or decline
    PendingIncoming,
    /// Friends
    Accepted,
}

/// Derive the caller's perspective from a stored edge.
pub fn perspective_state(row: Option<&FriendshipRecord>, me: &str) -> PerspectiveState {
    match row {
        None => PerspectiveState::None,
        Some(row) if row.status == "ACCEPTED" => PerspectiveState::Accepted,
        Some(row) if row.requester_id == me => PerspectiveState::PendingOutgoing,
        Some(_) => PerspectiveState::PendingIncoming,
    }
}

/// Which slice of a user's edges to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendBox {
    /// Accepted friendships
    Accepted,
    /// Requests awaiting the caller's response
    Incoming,
    /// Requests the caller sent
    Outgoing,
}

/// One listed edge, from the caller's perspective
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendEntry {
    pub state: PerspectiveState,
    pub user: UserRecord,
    pub created_at: i64,
    pub accepted_at: Option<i64>,
}

/// Service for managing friendship edges
pub struct FriendsService {
    db: Arc<Database>,
}

impl FriendsService {
    /// Create a new friends service backed by the given database
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Send a friend request to another user.
    ///
    /// Creates the PENDING edge, or explains why one cannot be created:
    /// self-friendship, already friends, a request of ours already out,
    /// or an incoming request from the other side that should be
    /// answered instead.
    pub fn request(&self, me: &str, other_id: &str) -> Result<PerspectiveState> {
        let (a_id, b_id) = canonical_pair(me, other_id)?;

        if self.db.get_user(other_id)?.is_none() {
            return Err(Error::UserNotFound);
        }

        match self.db.get_friendship(&a_id, &b_id)? {
            None => {
                self.db.create_friendship(&a_id, &b_id, me)?;
                tracing::info!("Friend request from {} to {}", me, other_id);
                Ok(PerspectiveState::PendingOutgoing)
            }
            Some(row) if row.status == "ACCEPTED" => Err(Error::AlreadyFriends),
            Some(row) if row.requester_id == me => Err(Error::RequestAlreadyPending),
            Some(_) => Err(Error::OppositePendingExists),
        }
    }

    /// Send a friend request addressed by email
    pub fn request_by_email(&self, me: &str, email: &str) -> Result<PerspectiveState> {
        let target = self.db.get_user_by_email(email)?.ok_or(Error::UserNotFound)?;
        self.request(me, &target.id)
    }

    /// Accept an incoming request.
    ///
    /// Only the non-requesting party may accept; stamps accepted_at.
    pub fn accept(&self, me: &str, other_id: &str) -> Result<()> {
        let (a_id, b_id) = canonical_pair(me, other_id)?;
        let row = self.pending_edge(&a_id, &b_id)?;

        if row.requester_id == me {
            return Err(Error::OnlyRecipientCanRespond);
        }

        if !self.db.accept_friendship(&a_id, &b_id)? {
            // The edge changed between the read and the write
            return Err(Error::NoPendingRequest);
        }

        tracing::info!("{} accepted friend request from {}", me, other_id);
        Ok(())
    }

    /// Decline an incoming request (deletes the edge)
    pub fn decline(&self, me: &str, other_id: &str) -> Result<()> {
        let (a_id, b_id) = canonical_pair(me, other_id)?;
        let row = self.pending_edge(&a_id, &b_id)?;

        if row.requester_id == me {
            return Err(Error::OnlyRecipientCanRespond);
        }

        self.db.delete_friendship(&a_id, &b_id)?;
        tracing::info!("{} declined friend request from {}", me, other_id);
        Ok(())
    }

    /// Withdraw an outgoing request (deletes the edge)
    pub fn cancel(&self, me: &str, other_id: &str) -> Result<()> {
        let (a_id, b_id) = canonical_pair(me, other_id)?;
        let row = self.pending_edge(&a_id, &b_id)?;

        if row.requester_id != me {
            return Err(Error::OnlyRequesterCanCancel);
        }

        self.db.delete_friendship(&a_id, &b_id)?;
        tracing::info!("{} cancelled friend request to {}", me, other_id);
        Ok(())
    }

    /// Remove an accepted friendship; either party may do this.
    ///
    /// A PENDING edge cannot be unfriended — it must be declined or
    /// cancelled, so the requester learns nothing from the refusal path.
    pub fn unfriend(&self, me: &str, other_id: &str) -> Result<()> {
        let (a_id, b_id) = canonical_pair(me, other_id)?;

        match self.db.get_friendship(&a_id, &b_id)? {
            None => Err(Error::NotFriends),
            Some(row) if row.status == "PENDING" => Err(Error::CannotUnfriendPending),
            Some(_) => {
                self.db.delete_friendship(&a_id, &b_id)?;
                tracing::info!("{} unfriended {}", me, other_id);
                Ok(())
            }
        }
    }

    /// The caller's perspective on their edge with another user
    pub fn state_between(&self, me: &str, other_id: &str) -> Result<PerspectiveState> {
        let (a_id, b_id) = canonical_pair(me, other_id)?;
        let row = self.db.get_friendship(&a_id, &b_id)?;
        Ok(perspective_state(row.as_ref(), me))
    }

    /// Whether an ACCEPTED edge exists between two users, either order
    pub fn are_friends(&self, me: &str, other_id: &str) -> Result<bool> {
        Ok(self.state_between(me, other_id)? == PerspectiveState::Accepted)
    }

    /// Ids of the user's accepted friends
    pub fn accepted_friend_ids(&self, user_id: &str) -> Result<Vec<String>> {
        self.db.accepted_friend_ids(user_id)
    }

    /// The user's accepted friends as user records
    pub fn friends_of(&self, user_id: &str) -> Result<Vec<UserRecord>> {
        let mut friends = Vec::new();
        for id in self.db.accepted_friend_ids(user_id)? {
            if let Some(user) = self.db.get_user(&id)? {
                friends.push(user);
            }
        }
        Ok(friends)
    }

    /// List the caller's edges for one box, newest first
    pub fn list(&self, me: &str, selection: FriendBox) -> Result<Vec<FriendEntry>> {
        let rows = self.db.friendships_for(me)?;
        let mut entries = Vec::new();

        for row in rows {
            let state = perspective_state(Some(&row), me);
            let keep = match selection {
                FriendBox::Accepted => state == PerspectiveState::Accepted,
                FriendBox::Incoming => state == PerspectiveState::PendingIncoming,
                FriendBox::Outgoing => state == PerspectiveState::PendingOutgoing,
            };
            if !keep {
                continue;
            }

            let other_id = if row.a_id == me { &row.b_id } else { &row.a_id };
            if let Some(user) = self.db.get_user(other_id)? {
                entries.push(FriendEntry {
                    state,
                    user,
                    created_at: row.created_at,
                    accepted_at: row.accepted_at,
                });
            }
        }

        Ok(entries)
    }

    fn pending_edge(&self, a_id: &str, b_id: &str) -> Result<FriendshipRecord> {
        match self.db.get_friendship(a_id, b_id)? {
            Some(row) if row.status == "PENDING" => Ok(row),
            _ => Err(Error::NoPendingRequest),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Arc<Database>, FriendsService) {
        let db = Arc::new(Database::open(None).unwrap());
        for id in ["alice", "bob", "carol"] {
            db.sync_user(id, Some(id), &format!("{}@example.com", id))
                .unwrap();
        }
        let service = FriendsService::new(db.clone());
        (db, service)
    }

    #[test]
    fn test_canonical_pair_is_order_independent() {
        assert_eq!(
            canonical_pair("bob", "alice").unwrap(),
            canonical_pair("alice", "bob").unwrap()
        );
        assert_eq!(
            canonical_pair("alice", "bob").unwrap(),
            ("alice".to_string(), "bob".to_string())
        );
    }

    #[test]
    fn test_cannot_friend_self() {
        assert!(matches!(
            canonical_pair("alice", "alice"),
            Err(Error::CannotFriendSelf)
        ));
    }

    #[test]
    fn test_request_then_accept() {
        let (_db, service) = setup();

        let state = service.request("alice", "bob").unwrap();
        assert_eq!(state, PerspectiveState::PendingOutgoing);
        assert_eq!(
            service.state_between("bob", "alice").unwrap(),
            PerspectiveState::PendingIncoming
        );

        service.accept("bob", "alice").unwrap();
        assert!(service.are_friends("alice", "bob").unwrap());
        assert!(service.are_friends("bob", "alice").unwrap());
    }

    #[test]
    fn test_requester_cannot_accept_own_request() {
        let (_db, service) = setup();
        service.request("alice", "bob").unwrap();

        assert!(matches!(
            service.accept("alice", "bob"),
            Err(Error::OnlyRecipientCanRespond)
        ));
    }

    #[test]
    fn test_decline_deletes_edge() {
        let (_db, service) = setup();
        service.request("alice", "bob").unwrap();
        service.decline("bob", "alice").unwrap();

        assert_eq!(
            service.state_between("alice", "bob").unwrap(),
            PerspectiveState::None
        );
        // Alice may ask again after a decline
        service.request("alice", "bob").unwrap();
    }

    #[test]
    fn test_cancel_only_by_requester() {
        let (_db, service) = setup();
        service.request("alice", "bob").unwrap();

        assert!(matches!(
            service.cancel("bob", "alice"),
            Err(Error::OnlyRequesterCanCancel)
        ));
        service.cancel("alice", "bob").unwrap();
        assert_eq!(
            service.state_between("alice", "bob").unwrap(),
            PerspectiveState::None
        );
    }

    #[test]
    fn test_duplicate_and_opposite_requests() {
        let (_db, service) = setup();
        service.request("alice", "bob").unwrap();

        assert!(matches!(
            service.request("alice", "bob"),
            Err(Error::RequestAlreadyPending)
        ));
        assert!(matches!(
            service.request("bob", "alice"),
            Err(Error::OppositePendingExists)
        ));

        service.accept("bob", "alice").unwrap();
        assert!(matches!(
            service.request("alice", "bob"),
            Err(Error::AlreadyFriends)
        ));
    }

    #[test]
    fn test_unfriend_rules() {
        let (_db, service) = setup();

        assert!(matches!(
            service.unfriend("alice", "bob"),
            Err(Error::NotFriends)
        ));

        service.request("alice", "bob").unwrap();
        assert!(matches!(
            service.unfriend("alice", "bob"),
            Err(Error::CannotUnfriendPending)
        ));

        service.accept("bob", "alice").unwrap();
        // Either party may unfriend once accepted
        service.unfriend("bob", "alice").unwrap();
        assert_eq!(
            service.state_between("alice", "bob").unwrap(),
            PerspectiveState::None
        );
    }

    #[test]
    fn test_request_by_email() {
        let (_db, service) = setup();
        let state = service.request_by_email("alice", "bob@example.com").unwrap();
        assert_eq!(state, PerspectiveState::PendingOutgoing);

        assert!(matches!(
            service.request_by_email("alice", "nobody@example.com"),
            Err(Error::UserNotFound)
        ));
    }

    #[test]
    fn test_list_boxes() {
        let (_db, service) = setup();
        service.request("alice", "bob").unwrap();
        service.request("carol", "alice").unwrap();

        let outgoing = service.list("alice", FriendBox::Outgoing).unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].user.id, "bob");

        let incoming = service.list("alice", FriendBox::Incoming).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].user.id, "carol");

        service.accept("bob", "alice").unwrap();
        let accepted = service.list("alice", FriendBox::Accepted).unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].user.id, "bob");
        assert!(accepted[0].accepted_at.is_some());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(FriendshipStatus::Pending.as_str(), "PENDING");
        assert_eq!(
            FriendshipStatus::parse("ACCEPTED"),
            Some(FriendshipStatus::Accepted)
        );
        assert_eq!(FriendshipStatus::parse("bogus"), None);
    }
}
