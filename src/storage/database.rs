//! # Database
//!
//! SQLite database wrapper. All SQL in the crate lives behind the typed
//! methods here; services never touch the connection directly.
//!
//! The weekly publish sweep ([`Database::publish_edition`]) is the one
//! multi-statement mutation and runs inside a single SQLite transaction,
//! so the publish stamp and the bulk status promotions are never observed
//! partially applied.

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::schema;
use crate::error::{Error, Result};

/// The main database handle
///
/// This wraps a SQLite connection and provides high-level methods for
/// storing and retrieving Rogha data.
pub struct Database {
    /// The underlying SQLite connection
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create a database
    ///
    /// If path is None, creates an in-memory database (useful for testing).
    pub fn open(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)
                .map_err(|e| Error::DatabaseError(format!("Failed to open database: {}", e)))?,
            None => Connection::open_in_memory().map_err(|e| {
                Error::DatabaseError(format!("Failed to create in-memory database: {}", e))
            })?,
        };

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        // Check current schema version
        let version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .ok();

        match version {
            None => {
                // Fresh database, create all tables
                conn.execute_batch(schema::CREATE_TABLES)
                    .map_err(|e| Error::DatabaseError(format!("Failed to create tables: {}", e)))?;

                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    params![schema::SCHEMA_VERSION],
                )
                .map_err(|e| {
                    Error::DatabaseError(format!("Failed to set schema version: {}", e))
                })?;

                tracing::info!("Database schema created (version {})", schema::SCHEMA_VERSION);
            }
            Some(v) if v < schema::SCHEMA_VERSION => {
                tracing::info!(
                    "Database schema version {} is older than current {}, running migrations",
                    v,
                    schema::SCHEMA_VERSION
                );

                if v < 2 {
                    tracing::info!("Running migration v1 → v2 (post audiences)");
                    conn.execute_batch(schema::MIGRATE_V1_TO_V2).map_err(|e| {
                        Error::DatabaseError(format!("Migration v1→v2 failed: {}", e))
                    })?;
                }

                tracing::info!(
                    "All migrations complete (now at version {})",
                    schema::SCHEMA_VERSION
                );
            }
            Some(v) => {
                tracing::debug!("Database schema version: {}", v);
            }
        }

        Ok(())
    }

    // ========================================================================
    // USER OPERATIONS
    // ========================================================================

    /// Insert a user row (first sign-in sync).
    ///
    /// Upserts by email: the id is stable after first creation, a changed
    /// display name is taken over.
    pub fn sync_user(&self, id: &str, name: Option<&str>, email: &str) -> Result<UserRecord> {
        {
            let conn = self.conn.lock();
            let now = crate::time::now_timestamp();

            conn.execute(
                "INSERT INTO users (id, name, email, created_at) VALUES (?, ?, ?, ?)
                 ON CONFLICT(email) DO UPDATE SET name = excluded.name",
                params![id, name, email, now],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to sync user: {}", e)))?;
        }

        self.get_user_by_email(email)?.ok_or(Error::UserNotFound)
    }

    /// Get a user by id
    pub fn get_user(&self, id: &str) -> Result<Option<UserRecord>> {
        let conn = self.conn.lock();

        let result = conn.query_row(
            "SELECT id, name, email, created_at FROM users WHERE id = ?",
            params![id],
            |row| {
                Ok(UserRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::DatabaseError(format!("Failed to get user: {}", e))),
        }
    }

    /// Get a user by email
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let conn = self.conn.lock();

        let result = conn.query_row(
            "SELECT id, name, email, created_at FROM users WHERE email = ?",
            params![email],
            |row| {
                Ok(UserRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::DatabaseError(format!("Failed to get user: {}", e))),
        }
    }

    // ========================================================================
    // FRIENDSHIP OPERATIONS
    // ========================================================================

    /// Get the friendship edge for a canonical pair
    pub fn get_friendship(&self, a_id: &str, b_id: &str) -> Result<Option<FriendshipRecord>> {
        let conn = self.conn.lock();

        let result = conn.query_row(
            "SELECT a_id, b_id, requester_id, status, created_at, accepted_at
             FROM friendships WHERE a_id = ? AND b_id = ?",
            params![a_id, b_id],
            Self::map_friendship,
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::DatabaseError(format!(
                "Failed to get friendship: {}",
                e
            ))),
        }
    }

    /// Create a PENDING friendship edge
    pub fn create_friendship(&self, a_id: &str, b_id: &str, requester_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        let now = crate::time::now_timestamp();

        conn.execute(
            "INSERT INTO friendships (a_id, b_id, requester_id, status, created_at)
             VALUES (?, ?, ?, 'PENDING', ?)",
            params![a_id, b_id, requester_id, now],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to create friendship: {}", e)))?;

        Ok(())
    }

    /// Mark a PENDING edge ACCEPTED, stamping accepted_at
    pub fn accept_friendship(&self, a_id: &str, b_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let now = crate::time::now_timestamp();

        let rows = conn
            .execute(
                "UPDATE friendships SET status = 'ACCEPTED', accepted_at = ?
                 WHERE a_id = ? AND b_id = ? AND status = 'PENDING'",
                params![now, a_id, b_id],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to accept friendship: {}", e)))?;

        Ok(rows > 0)
    }

    /// Delete a friendship edge (decline, cancel, or unfriend)
    pub fn delete_friendship(&self, a_id: &str, b_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM friendships WHERE a_id = ? AND b_id = ?",
                params![a_id, b_id],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to delete friendship: {}", e)))?;

        Ok(rows > 0)
    }

    /// All edges touching a user, newest first
    pub fn friendships_for(&self, user_id: &str) -> Result<Vec<FriendshipRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT a_id, b_id, requester_id, status, created_at, accepted_at
                 FROM friendships WHERE a_id = ? OR b_id = ?
                 ORDER BY created_at DESC",
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![user_id, user_id], Self::map_friendship)
            .map_err(|e| Error::DatabaseError(format!("Failed to query friendships: {}", e)))?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(
                row.map_err(|e| Error::DatabaseError(format!("Failed to read friendship: {}", e)))?,
            );
        }

        Ok(edges)
    }

    /// Ids of the user's ACCEPTED friends, either storage order
    pub fn accepted_friend_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT CASE WHEN a_id = ?1 THEN b_id ELSE a_id END
                 FROM friendships
                 WHERE status = 'ACCEPTED' AND (a_id = ?1 OR b_id = ?1)",
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![user_id], |row| row.get(0))
            .map_err(|e| Error::DatabaseError(format!("Failed to query friend ids: {}", e)))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(
                row.map_err(|e| Error::DatabaseError(format!("Failed to read friend id: {}", e)))?,
            );
        }

        Ok(ids)
    }

    fn map_friendship(row: &rusqlite::Row<'_>) -> rusqlite::Result<FriendshipRecord> {
        Ok(FriendshipRecord {
            a_id: row.get(0)?,
            b_id: row.get(1)?,
            requester_id: row.get(2)?,
            status: row.get(3)?,
            created_at: row.get(4)?,
            accepted_at: row.get(5)?,
        })
    }

    // ========================================================================
    // CIRCLE OPERATIONS
    // ========================================================================

    /// Create a circle
    pub fn create_circle(
        &self,
        id: &str,
        name: &str,
        description: Option<&str>,
        created_by: &str,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let now = crate::time::now_timestamp();

        conn.execute(
            "INSERT INTO circles (id, name, description, created_by, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![id, name, description, created_by, now],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to create circle: {}", e)))?;

        Ok(())
    }

    /// Get a circle by id
    pub fn get_circle(&self, id: &str) -> Result<Option<CircleRecord>> {
        let conn = self.conn.lock();

        let result = conn.query_row(
            "SELECT id, name, description, created_by, created_at FROM circles WHERE id = ?",
            params![id],
            |row| {
                Ok(CircleRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    created_by: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::DatabaseError(format!("Failed to get circle: {}", e))),
        }
    }

    /// Add or rejoin a circle member.
    ///
    /// On rejoin the original joined_at is kept; only the status resets.
    pub fn upsert_circle_member(&self, circle_id: &str, user_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        let now = crate::time::now_timestamp();

        conn.execute(
            "INSERT INTO circle_members (circle_id, user_id, status, joined_at)
             VALUES (?, ?, 'JOINED', ?)
             ON CONFLICT(circle_id, user_id) DO UPDATE SET status = 'JOINED'",
            params![circle_id, user_id, now],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to upsert circle member: {}", e)))?;

        Ok(())
    }

    /// Mark a membership LEFT (row retained for rejoin)
    pub fn mark_circle_member_left(&self, circle_id: &str, user_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE circle_members SET status = 'LEFT'
                 WHERE circle_id = ? AND user_id = ?",
                params![circle_id, user_id],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to update circle member: {}", e)))?;

        Ok(rows > 0)
    }

    /// Remove a membership row entirely
    pub fn delete_circle_member(&self, circle_id: &str, user_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM circle_members WHERE circle_id = ? AND user_id = ?",
                params![circle_id, user_id],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to delete circle member: {}", e)))?;

        Ok(rows > 0)
    }

    /// Get a single membership row
    pub fn get_circle_member(
        &self,
        circle_id: &str,
        user_id: &str,
    ) -> Result<Option<CircleMemberRecord>> {
        let conn = self.conn.lock();

        let result = conn.query_row(
            "SELECT circle_id, user_id, status, joined_at
             FROM circle_members WHERE circle_id = ? AND user_id = ?",
            params![circle_id, user_id],
            |row| {
                Ok(CircleMemberRecord {
                    circle_id: row.get(0)?,
                    user_id: row.get(1)?,
                    status: row.get(2)?,
                    joined_at: row.get(3)?,
                })
            },
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::DatabaseError(format!(
                "Failed to get circle member: {}",
                e
            ))),
        }
    }

    /// All membership rows of a circle
    pub fn circle_members(&self, circle_id: &str) -> Result<Vec<CircleMemberRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT circle_id, user_id, status, joined_at
                 FROM circle_members WHERE circle_id = ? ORDER BY joined_at",
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![circle_id], |row| {
                Ok(CircleMemberRecord {
                    circle_id: row.get(0)?,
                    user_id: row.get(1)?,
                    status: row.get(2)?,
                    joined_at: row.get(3)?,
                })
            })
            .map_err(|e| Error::DatabaseError(format!("Failed to query circle members: {}", e)))?;

        let mut members = Vec::new();
        for row in rows {
            members.push(
                row.map_err(|e| Error::DatabaseError(format!("Failed to read member: {}", e)))?,
            );
        }

        Ok(members)
    }

    /// Ids of currently JOINED members of a circle
    pub fn joined_member_ids(&self, circle_id: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT user_id FROM circle_members
                 WHERE circle_id = ? AND status = 'JOINED'",
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![circle_id], |row| row.get(0))
            .map_err(|e| Error::DatabaseError(format!("Failed to query member ids: {}", e)))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(
                row.map_err(|e| Error::DatabaseError(format!("Failed to read member id: {}", e)))?,
            );
        }

        Ok(ids)
    }

    /// Circles where the user is currently JOINED, newest join first
    pub fn circles_for_user(&self, user_id: &str) -> Result<Vec<CircleRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT c.id, c.name, c.description, c.created_by, c.created_at
                 FROM circles c
                 JOIN circle_members m ON m.circle_id = c.id
                 WHERE m.user_id = ? AND m.status = 'JOINED'
                 ORDER BY m.joined_at DESC",
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(CircleRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    created_by: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .map_err(|e| Error::DatabaseError(format!("Failed to query circles: {}", e)))?;

        let mut circles = Vec::new();
        for row in rows {
            circles.push(
                row.map_err(|e| Error::DatabaseError(format!("Failed to read circle: {}", e)))?,
            );
        }

        Ok(circles)
    }

    // ========================================================================
    // EDITION OPERATIONS
    // ========================================================================

    /// Insert an edition row unless one exists for the week.
    ///
    /// Returns true if this call created the row. Unrelated requests racing
    /// on the same week converge via the UNIQUE week_start key.
    pub fn insert_edition_if_absent(&self, id: &str, title: &str, week_start: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "INSERT OR IGNORE INTO editions (id, title, week_start) VALUES (?, ?, ?)",
                params![id, title, week_start],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to insert edition: {}", e)))?;

        Ok(rows > 0)
    }

    /// Get the edition for a week-start key
    pub fn get_edition_by_week_start(&self, week_start: i64) -> Result<Option<EditionRecord>> {
        let conn = self.conn.lock();

        let result = conn.query_row(
            "SELECT id, title, week_start, published_at FROM editions WHERE week_start = ?",
            params![week_start],
            Self::map_edition,
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::DatabaseError(format!("Failed to get edition: {}", e))),
        }
    }

    /// Get an edition by id
    pub fn get_edition(&self, id: &str) -> Result<Option<EditionRecord>> {
        let conn = self.conn.lock();

        let result = conn.query_row(
            "SELECT id, title, week_start, published_at FROM editions WHERE id = ?",
            params![id],
            Self::map_edition,
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::DatabaseError(format!("Failed to get edition: {}", e))),
        }
    }

    /// Published editions, newest week first
    pub fn published_editions(&self) -> Result<Vec<EditionRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, title, week_start, published_at FROM editions
                 WHERE published_at IS NOT NULL ORDER BY week_start DESC",
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], Self::map_edition)
            .map_err(|e| Error::DatabaseError(format!("Failed to query editions: {}", e)))?;

        let mut editions = Vec::new();
        for row in rows {
            editions.push(
                row.map_err(|e| Error::DatabaseError(format!("Failed to read edition: {}", e)))?,
            );
        }

        Ok(editions)
    }

    fn map_edition(row: &rusqlite::Row<'_>) -> rusqlite::Result<EditionRecord> {
        Ok(EditionRecord {
            id: row.get(0)?,
            title: row.get(1)?,
            week_start: row.get(2)?,
            published_at: row.get(3)?,
        })
    }

    /// Run the weekly publish sweep for a week, atomically.
    ///
    /// One transaction covers the publish stamp and both bulk status
    /// promotions; either all of it commits or none of it does.
    ///
    /// - No edition row for the week: nothing to do.
    /// - Already stamped: promote any posts still SUBMITTED (late
    ///   submissions, or a partially failed prior run) without touching
    ///   the stamp, and never re-archive.
    /// - First publish: stamp published_at, promote SUBMITTED posts to
    ///   PUBLISHED, archive leftover DRAFTs.
    pub fn publish_edition(&self, week_start: i64, now: i64) -> Result<PublishSweep> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

        let edition: Option<(String, Option<i64>)> = match tx.query_row(
            "SELECT id, published_at FROM editions WHERE week_start = ?",
            params![week_start],
            |row| Ok((row.get(0)?, row.get(1)?)),
        ) {
            Ok(pair) => Some(pair),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => {
                return Err(Error::DatabaseError(format!(
                    "Failed to look up edition: {}",
                    e
                )))
            }
        };

        let (edition_id, published_at) = match edition {
            Some(pair) => pair,
            None => return Ok(PublishSweep::NoEdition),
        };

        if published_at.is_some() {
            let promoted = tx
                .execute(
                    "UPDATE posts SET status = 'PUBLISHED', updated_at = ?
                     WHERE edition_id = ? AND status = 'SUBMITTED'",
                    params![now, edition_id],
                )
                .map_err(|e| Error::DatabaseError(format!("Failed to promote posts: {}", e)))?;

            tx.commit()
                .map_err(|e| Error::DatabaseError(format!("Failed to commit publish: {}", e)))?;

            return Ok(PublishSweep::AlreadyPublished {
                edition_id,
                promoted: promoted as u64,
            });
        }

        tx.execute(
            "UPDATE editions SET published_at = ? WHERE id = ?",
            params![now, edition_id],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to stamp edition: {}", e)))?;

        let promoted = tx
            .execute(
                "UPDATE posts SET status = 'PUBLISHED', updated_at = ?
                 WHERE edition_id = ? AND status = 'SUBMITTED'",
                params![now, edition_id],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to promote posts: {}", e)))?;

        let archived = tx
            .execute(
                "UPDATE posts SET status = 'ARCHIVED', updated_at = ?
                 WHERE edition_id = ? AND status = 'DRAFT'",
                params![now, edition_id],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to archive drafts: {}", e)))?;

        tx.commit()
            .map_err(|e| Error::DatabaseError(format!("Failed to commit publish: {}", e)))?;

        Ok(PublishSweep::Published {
            edition_id,
            promoted: promoted as u64,
            archived: archived as u64,
        })
    }

    // ========================================================================
    // POST OPERATIONS
    // ========================================================================

    /// Insert a new DRAFT post at version 1
    pub fn create_post(
        &self,
        id: &str,
        author_id: &str,
        title: Option<&str>,
        content: &str,
        audience_type: &str,
        circle_id: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let now = crate::time::now_timestamp();

        conn.execute(
            "INSERT INTO posts (id, author_id, title, content, status, audience_type, circle_id, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, 'DRAFT', ?, ?, 1, ?, ?)",
            params![id, author_id, title, content, audience_type, circle_id, now, now],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to create post: {}", e)))?;

        Ok(())
    }

    /// Get a post by id
    pub fn get_post(&self, id: &str) -> Result<Option<PostRecord>> {
        let conn = self.conn.lock();

        let result = conn.query_row(
            "SELECT id, author_id, title, content, status, audience_type, circle_id, edition_id, version, created_at, updated_at
             FROM posts WHERE id = ?",
            params![id],
            Self::map_post,
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::DatabaseError(format!("Failed to get post: {}", e))),
        }
    }

    /// Compare-and-swap editorial update.
    ///
    /// A single conditional UPDATE: the row is written only when the
    /// stored version matches the caller's expected version, and the
    /// version advances by exactly 1. Returns false on mismatch (or a
    /// missing row) — the caller distinguishes the two by re-fetching.
    pub fn cas_update_post(
        &self,
        id: &str,
        expected_version: i64,
        title: Option<&str>,
        content: Option<&str>,
        audience: Option<(&str, Option<&str>)>,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let now = crate::time::now_timestamp();

        let mut updates: Vec<&str> = vec!["version = version + 1", "updated_at = ?"];
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(now)];

        if let Some(title) = title {
            updates.push("title = ?");
            values.push(Box::new(title.to_string()));
        }
        if let Some(content) = content {
            updates.push("content = ?");
            values.push(Box::new(content.to_string()));
        }
        if let Some((audience_type, circle_id)) = audience {
            updates.push("audience_type = ?");
            values.push(Box::new(audience_type.to_string()));
            updates.push("circle_id = ?");
            values.push(Box::new(circle_id.map(|s| s.to_string())));
        }

        let sql = format!(
            "UPDATE posts SET {} WHERE id = ? AND version = ?",
            updates.join(", ")
        );
        values.push(Box::new(id.to_string()));
        values.push(Box::new(expected_version));

        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();

        let rows = conn
            .execute(&sql, params.as_slice())
            .map_err(|e| Error::DatabaseError(format!("Failed to update post: {}", e)))?;

        Ok(rows > 0)
    }

    /// DRAFT → SUBMITTED, binding the post to its edition.
    ///
    /// Guarded on the current status so a raced double-submit writes once.
    pub fn mark_submitted(&self, id: &str, edition_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let now = crate::time::now_timestamp();

        let rows = conn
            .execute(
                "UPDATE posts SET status = 'SUBMITTED', edition_id = ?, updated_at = ?
                 WHERE id = ? AND status = 'DRAFT'",
                params![edition_id, now, id],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to submit post: {}", e)))?;

        Ok(rows > 0)
    }

    /// SUBMITTED → DRAFT. The edition binding is kept.
    pub fn mark_unsubmitted(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let now = crate::time::now_timestamp();

        let rows = conn
            .execute(
                "UPDATE posts SET status = 'DRAFT', updated_at = ?
                 WHERE id = ? AND status = 'SUBMITTED'",
                params![now, id],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to unsubmit post: {}", e)))?;

        Ok(rows > 0)
    }

    /// Hard-delete a post
    pub fn delete_post(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM posts WHERE id = ?", params![id])
            .map_err(|e| Error::DatabaseError(format!("Failed to delete post: {}", e)))?;

        Ok(rows > 0)
    }

    /// Posts of an edition in its defined order: most recently updated
    /// first, insertion order as the tiebreak.
    pub fn posts_for_edition(&self, edition_id: &str) -> Result<Vec<PostRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, author_id, title, content, status, audience_type, circle_id, edition_id, version, created_at, updated_at
                 FROM posts WHERE edition_id = ?
                 ORDER BY updated_at DESC, rowid ASC",
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![edition_id], Self::map_post)
            .map_err(|e| Error::DatabaseError(format!("Failed to query posts: {}", e)))?;

        let mut posts = Vec::new();
        for row in rows {
            posts
                .push(row.map_err(|e| Error::DatabaseError(format!("Failed to read post: {}", e)))?);
        }

        Ok(posts)
    }

    fn map_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRecord> {
        Ok(PostRecord {
            id: row.get(0)?,
            author_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            status: row.get(4)?,
            audience_type: row.get(5)?,
            circle_id: row.get(6)?,
            edition_id: row.get(7)?,
            version: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    // ========================================================================
    // NOTIFICATION OPERATIONS
    // ========================================================================

    /// Insert a notification unless one exists for (recipient, type, post).
    ///
    /// Returns true only when the row was actually created — the caller
    /// fans out delivery exclusively for fresh rows.
    pub fn insert_notification(
        &self,
        id: &str,
        user_id: &str,
        creator_id: &str,
        kind: &str,
        post_id: &str,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let now = crate::time::now_timestamp();

        let rows = conn
            .execute(
                "INSERT OR IGNORE INTO notifications (id, user_id, creator_id, type, post_id, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![id, user_id, creator_id, kind, post_id, now],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to insert notification: {}", e)))?;

        Ok(rows > 0)
    }

    /// A user's notifications, newest first
    pub fn notifications_for(&self, user_id: &str, limit: u32) -> Result<Vec<NotificationRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, creator_id, type, post_id, read, created_at
                 FROM notifications WHERE user_id = ?
                 ORDER BY created_at DESC LIMIT ?",
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![user_id, limit], |row| {
                Ok(NotificationRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    creator_id: row.get(2)?,
                    kind: row.get(3)?,
                    post_id: row.get(4)?,
                    read: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })
            .map_err(|e| Error::DatabaseError(format!("Failed to query notifications: {}", e)))?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(
                row.map_err(|e| {
                    Error::DatabaseError(format!("Failed to read notification: {}", e))
                })?,
            );
        }

        Ok(notifications)
    }

    /// Mark notifications read; returns how many rows changed
    pub fn mark_notifications_read(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let conn = self.conn.lock();
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "UPDATE notifications SET read = 1 WHERE id IN ({})",
            placeholders
        );

        let rows = conn
            .execute(&sql, rusqlite::params_from_iter(ids.iter()))
            .map_err(|e| Error::DatabaseError(format!("Failed to mark read: {}", e)))?;

        Ok(rows)
    }
}

// ============================================================================
// RECORD TYPES
// ============================================================================

/// A user row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub created_at: i64,
}

/// A friendship edge, stored canonically with `a_id < b_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendshipRecord {
    pub a_id: String,
    pub b_id: String,
    pub requester_id: String,
    pub status: String,
    pub created_at: i64,
    pub accepted_at: Option<i64>,
}

/// A circle row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircleRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: i64,
}

/// A circle membership row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircleMemberRecord {
    pub circle_id: String,
    pub user_id: String,
    pub status: String,
    pub joined_at: i64,
}

/// An edition row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditionRecord {
    pub id: String,
    pub title: String,
    /// UTC instant (unix seconds) of the canonical week-start
    pub week_start: i64,
    /// Null until the week's first publish run; never cleared after
    pub published_at: Option<i64>,
}

/// A post row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub author_id: String,
    pub title: Option<String>,
    /// Opaque JSON editor document
    pub content: String,
    pub status: String,
    pub audience_type: String,
    pub circle_id: Option<String>,
    pub edition_id: Option<String>,
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A notification row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub user_id: String,
    pub creator_id: String,
    pub kind: String,
    pub post_id: String,
    pub read: bool,
    pub created_at: i64,
}

/// Result of one publish sweep, as observed by the transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishSweep {
    /// No edition row exists for the week
    NoEdition,
    /// The stamp was already set; only stragglers were promoted
    AlreadyPublished { edition_id: String, promoted: u64 },
    /// First publish: stamped, promoted, and archived
    Published {
        edition_id: String,
        promoted: u64,
        archived: u64,
    },
}

// ============================================================================
// TESTS
// ============================================================================
