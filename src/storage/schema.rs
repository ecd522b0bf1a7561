//! # Database Schema
//!
//! SQL schema definitions for the Rogha database.
//!
//! ## Schema Overview
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐      ┌─────────────────┐
//! │     users       │    │   friendships   │      │    circles      │
//! ├─────────────────┤    ├─────────────────┤      ├─────────────────┤
//! │ id              │◄───│ a_id            │      │ id              │
//! │ name            │◄───│ b_id            │      │ name            │
//! │ email           │    │ requester_id    │      │ description     │
//! │ created_at      │    │ status          │      │ created_by      │
//! └─────────────────┘    │ created_at      │      │ created_at      │
//!                        │ accepted_at     │      └────────┬────────┘
//!                        └─────────────────┘               │
//! ┌─────────────────┐    ┌─────────────────┐      ┌────────▼────────┐
//! │    editions     │    │     posts       │      │ circle_members  │
//! ├─────────────────┤    ├─────────────────┤      ├─────────────────┤
//! │ id              │◄───│ edition_id      │      │ circle_id       │
//! │ title           │    │ author_id       │      │ user_id         │
//! │ week_start (UQ) │    │ status          │      │ status          │
//! │ published_at    │    │ audience_type   │      │ joined_at       │
//! └─────────────────┘    │ circle_id       │      └─────────────────┘
//!                        │ version         │
//!                        │ created_at      │      ┌─────────────────┐
//!                        │ updated_at      │      │  notifications  │
//!                        └─────────────────┘      ├─────────────────┤
//!                                                 │ user/creator/post│
//!                                                 │ UNIQUE dedup key │
//!                                                 └─────────────────┘
//! ```
//!
//! The friendship pair is stored canonically (`a_id < b_id`), so there is
//! at most one edge per pair and lookups are direction-independent. The
//! `editions.week_start` UNIQUE key is what makes concurrent
//! find-or-create calls converge on a single row per week.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL to create all tables
pub const CREATE_TABLES: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Users table
-- Created on first sign-in sync; the id never changes once created
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    -- Display name (may be absent until the user sets one)
    name TEXT,
    email TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);

-- Friendships table
-- One row per unordered pair, stored canonically with a_id < b_id
CREATE TABLE IF NOT EXISTS friendships (
    a_id TEXT NOT NULL,
    b_id TEXT NOT NULL,
    -- Who initiated the request (one of a_id/b_id)
    requester_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'PENDING' CHECK (status IN ('PENDING', 'ACCEPTED')),
    created_at INTEGER NOT NULL,
    -- Null until the recipient accepts
    accepted_at INTEGER,
    PRIMARY KEY (a_id, b_id),
    CHECK (a_id < b_id),
    FOREIGN KEY (a_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (b_id) REFERENCES users(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_friendships_b ON friendships(b_id);

-- Circles table
-- Named groups; the creator is auto-joined on creation
CREATE TABLE IF NOT EXISTS circles (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    created_by TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (created_by) REFERENCES users(id)
);

-- Circle members table
-- Upsert semantics: leaving sets status LEFT, rejoining resets to JOINED
CREATE TABLE IF NOT EXISTS circle_members (
    circle_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'JOINED' CHECK (status IN ('JOINED', 'LEFT')),
    joined_at INTEGER NOT NULL,
    PRIMARY KEY (circle_id, user_id),
    FOREIGN KEY (circle_id) REFERENCES circles(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_circle_members_user ON circle_members(user_id, status);

-- Editions table
-- One row per calendar week; week_start is the UTC instant of the
-- canonical Monday 00:00. published_at is a one-way stamp.
CREATE TABLE IF NOT EXISTS editions (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    week_start INTEGER NOT NULL UNIQUE,
    published_at INTEGER
);

-- Posts table
-- content is an opaque JSON editor document
CREATE TABLE IF NOT EXISTS posts (
    id TEXT PRIMARY KEY,
    author_id TEXT NOT NULL,
    title TEXT,
    content TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'DRAFT' CHECK (status IN ('DRAFT', 'SUBMITTED', 'PUBLISHED', 'ARCHIVED')),
    audience_type TEXT NOT NULL DEFAULT 'FRIENDS' CHECK (audience_type IN ('ALL_USERS', 'FRIENDS', 'CIRCLE')),
    -- Set iff audience_type = 'CIRCLE'
    circle_id TEXT,
    -- Null until first submission binds the post to a week
    edition_id TEXT,
    -- Optimistic concurrency counter; starts at 1
    version INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (edition_id) REFERENCES editions(id)
);
CREATE INDEX IF NOT EXISTS idx_posts_edition_status ON posts(edition_id, status);
CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);

-- Notifications table
-- The UNIQUE key is the submission-dedup guarantee: at most one
-- notification per (recipient, type, post)
CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    creator_id TEXT NOT NULL,
    type TEXT NOT NULL CHECK (type IN ('SUBMIT')),
    post_id TEXT NOT NULL,
    read INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    UNIQUE (user_id, type, post_id),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, created_at DESC);
"#;

/// Migration SQL from schema version 1 → 2
///
/// Adds the audience columns on posts. v1 posts were always
/// friends-visible; existing rows keep that behavior via the default.
pub const MIGRATE_V1_TO_V2: &str = r#"
ALTER TABLE posts ADD COLUMN audience_type TEXT NOT NULL DEFAULT 'FRIENDS';
ALTER TABLE posts ADD COLUMN circle_id TEXT;

-- Update schema version
UPDATE schema_version SET version = 2;
"#;
