//! # Circles Module
//!
//! Named groups of friends used to scope a post's audience. The creator
//! is auto-joined; existing members may add others, but only users who
//! are accepted friends of the adder. Leaving keeps the membership row
//! (status LEFT) so a later re-add is an upsert back to JOINED.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::friends::canonical_pair;
use crate::storage::{CircleMemberRecord, CircleRecord, Database};

/// Status of a circle membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipStatus {
    /// Currently in the circle
    Joined,
    /// Left the circle; the row stays for rejoin
    Left,
}

impl MembershipStatus {
    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Joined => "JOINED",
            MembershipStatus::Left => "LEFT",
        }
    }

    /// Parse from database string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "JOINED" => Some(MembershipStatus::Joined),
            "LEFT" => Some(MembershipStatus::Left),
            _ => None,
        }
    }
}

/// Service for managing circles and their membership
pub struct CircleService {
    db: Arc<Database>,
}

impl CircleService {
    /// Create a new circle service backed by the given database
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a circle and auto-join its creator
    pub fn create(
        &self,
        owner_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<CircleRecord> {
        let circle_id = Uuid::new_v4().to_string();
        self.db
            .create_circle(&circle_id, name, description, owner_id)?;
        self.db.upsert_circle_member(&circle_id, owner_id)?;

        tracing::info!("Created circle {} ({})", circle_id, name);
        self.db.get_circle(&circle_id)?.ok_or(Error::CircleNotFound)
    }

    /// Add a user to a circle, or re-join them after a leave.
    ///
    /// The actor must be a joined member, and the target must be an
    /// accepted friend of the actor.
    pub fn add_member(&self, actor_id: &str, circle_id: &str, user_id: &str) -> Result<()> {
        if self.db.get_circle(circle_id)?.is_none() {
            return Err(Error::CircleNotFound);
        }
        self.require_joined(circle_id, actor_id)?;

        if actor_id != user_id {
            let (a_id, b_id) = canonical_pair(actor_id, user_id)?;
            let accepted = self
                .db
                .get_friendship(&a_id, &b_id)?
                .map(|row| row.status == "ACCEPTED")
                .unwrap_or(false);
            if !accepted {
                return Err(Error::CanOnlyAddFriends);
            }
        }

        self.db.upsert_circle_member(circle_id, user_id)?;
        tracing::info!("Added {} to circle {}", user_id, circle_id);
        Ok(())
    }

    /// Leave a circle (status LEFT; the row is retained)
    pub fn leave(&self, user_id: &str, circle_id: &str) -> Result<()> {
        if !self.db.mark_circle_member_left(circle_id, user_id)? {
            return Err(Error::NotCircleMember);
        }
        tracing::info!("{} left circle {}", user_id, circle_id);
        Ok(())
    }

    /// Remove a member's row entirely. The actor must be a joined member.
    pub fn remove_member(&self, actor_id: &str, circle_id: &str, user_id: &str) -> Result<()> {
        self.require_joined(circle_id, actor_id)?;

        self.db.delete_circle_member(circle_id, user_id)?;
        tracing::info!("Removed {} from circle {}", user_id, circle_id);
        Ok(())
    }

    /// Circles the user is currently joined to, newest join first
    pub fn circles_for(&self, user_id: &str) -> Result<Vec<CircleRecord>> {
        self.db.circles_for_user(user_id)
    }

    /// All membership rows of a circle (joined and left)
    pub fn members_of(&self, circle_id: &str) -> Result<Vec<CircleMemberRecord>> {
        if self.db.get_circle(circle_id)?.is_none() {
            return Err(Error::CircleNotFound);
        }
        self.db.circle_members(circle_id)
    }

    /// Whether the user is a currently JOINED member
    pub fn is_joined(&self, circle_id: &str, user_id: &str) -> Result<bool> {
        Ok(self
            .db
            .get_circle_member(circle_id, user_id)?
            .map(|m| m.status == "JOINED")
            .unwrap_or(false))
    }

    fn require_joined(&self, circle_id: &str, user_id: &str) -> Result<()> {
        if !self.is_joined(circle_id, user_id)? {
            return Err(Error::NotCircleMember);
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
