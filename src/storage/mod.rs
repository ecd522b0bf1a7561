//! # Storage Module
//!
//! SQLite persistence for Rogha data.
//!
//! ## Storage Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    Services     │  friends, circles, posts, editions, visibility
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Database     │  High-level typed API (this module)
//! │                 │  - Record structs per table
//! │                 │  - CAS update for posts
//! │                 │  - Publish sweep in one transaction
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    rusqlite     │  SQLite wrapper
//! │                 │  - In-memory for tests
//! │                 │  - File for production
//! └─────────────────┘
//! ```

mod database;
pub mod schema;

pub use database::{
    CircleMemberRecord, CircleRecord, Database, EditionRecord, FriendshipRecord,
    NotificationRecord, PostRecord, PublishSweep, UserRecord,
};
