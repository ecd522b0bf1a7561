//! # Visibility Module
//!
//! Decides whether a viewer may read a post, and assembles the readable
//! subset of an edition.
//!
//! The rules, in order:
//!
//! 1. The author always sees their own post, whatever its status.
//! 2. Everyone else sees a post only once it is PUBLISHED — drafts,
//!    submissions, and archived posts are never shown to non-authors.
//! 3. A published post is then gated by its audience: ALL_USERS is open
//!    to any viewer, FRIENDS requires an accepted friendship with the
//!    author (either storage order), CIRCLE requires a currently-joined
//!    membership in the post's circle.
//!
//! Relationship state is evaluated fresh on every read. A friendship
//! revoked after publication hides the post from then on; a friendship
//! accepted after publication reveals it. There is no publish-time
//! snapshot.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::friends::canonical_pair;
use crate::posts::{Audience, PostStatus};
use crate::storage::{Database, PostRecord};

/// Service answering read-visibility questions
pub struct VisibilityService {
    db: Arc<Database>,
}

impl VisibilityService {
    /// Create a new visibility service backed by the given database
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// May `viewer_id` read this post?
    pub fn can_view(&self, viewer_id: &str, post: &PostRecord) -> Result<bool> {
        if post.author_id == viewer_id {
            return Ok(true);
        }
        if PostStatus::parse(&post.status) != Some(PostStatus::Published) {
            return Ok(false);
        }

        match Audience::from_parts(&post.audience_type, post.circle_id.clone())? {
            Audience::AllUsers => Ok(true),
            Audience::Friends => {
                let (a_id, b_id) = canonical_pair(viewer_id, &post.author_id)?;
                Ok(self
                    .db
                    .get_friendship(&a_id, &b_id)?
                    .map(|row| row.status == "ACCEPTED")
                    .unwrap_or(false))
            }
            Audience::Circle(circle_id) => Ok(self
                .db
                .get_circle_member(&circle_id, viewer_id)?
                .map(|m| m.status == "JOINED")
                .unwrap_or(false)),
        }
    }

    /// May `viewer_id` read the post with this id?
    ///
    /// A missing post reads as not-visible, indistinguishable from a
    /// post the viewer is not allowed to see.
    pub fn can_view_post(&self, viewer_id: &str, post_id: &str) -> Result<bool> {
        match self.db.get_post(post_id)? {
            Some(post) => self.can_view(viewer_id, &post),
            None => Ok(false),
        }
    }

    /// The subset of `posts` the viewer may read, order preserved
    pub fn filter_visible(&self, viewer_id: &str, posts: &[PostRecord]) -> Result<Vec<PostRecord>> {
        let mut visible = Vec::new();
        for post in posts {
            if self.can_view(viewer_id, post)? {
                visible.push(post.clone());
            }
        }
        Ok(visible)
    }

    /// An edition's posts the viewer may read, in the edition's defined
    /// order: most recently updated first, creation order as tiebreak.
    ///
    /// Grouping by audience is a presentation concern and happens in the
    /// caller, not here.
    pub fn list_visible_posts(&self, viewer_id: &str, edition_id: &str) -> Result<Vec<PostRecord>> {
        if self.db.get_edition(edition_id)?.is_none() {
            return Err(Error::EditionNotFound);
        }

        let posts = self.db.posts_for_edition(edition_id)?;
        self.filter_visible(viewer_id, &posts)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circles::CircleService;
    use crate::editions::EditionService;
    use crate::friends::FriendsService;
    use crate::notifications::NullNotifier;
    use crate::posts::{Audience, PostService};
    use chrono::{DateTime, TimeZone, Utc};

    struct Fixture {
        friends: FriendsService,
        circles: CircleService,
        posts: PostService,
        editions: EditionService,
        visibility: VisibilityService,
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 3, 12, 0, 0).unwrap()
    }

    fn publish_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 8, 7, 0, 0).unwrap()
    }

    fn setup() -> Fixture {
        let db = Arc::new(Database::open(None).unwrap());
        for id in ["author", "friend", "stranger", "member"] {
            db.sync_user(id, Some(id), &format!("{}@example.com", id))
                .unwrap();
        }
        Fixture {
            friends: FriendsService::new(db.clone()),
            circles: CircleService::new(db.clone()),
            posts: PostService::new(db.clone(), Arc::new(NullNotifier)),
            editions: EditionService::new(db.clone()),
            visibility: VisibilityService::new(db),
        }
    }

    fn befriend(fx: &Fixture, a: &str, b: &str) {
        fx.friends.request(a, b).unwrap();
        fx.friends.accept(b, a).unwrap();
    }

    fn body() -> serde_json::Value {
        serde_json::json!({})
    }

    /// Submit a post and run the week's publish job.
    fn submit_and_publish(fx: &Fixture, post_id: &str) {
        fx.posts.submit(post_id, "author", at()).unwrap();
        fx.editions.publish_week(at(), publish_time()).unwrap();
    }

    #[test]
    fn test_author_always_sees_own_post() {
        let fx = setup();
        let post = fx
            .posts
            .create_draft("author", None, &body(), Audience::Friends)
            .unwrap();

        assert!(fx.visibility.can_view_post("author", &post.id).unwrap());
    }

    #[test]
    fn test_no_premature_visibility() {
        let fx = setup();
        befriend(&fx, "author", "friend");

        // DRAFT
        let post = fx
            .posts
            .create_draft("author", None, &body(), Audience::AllUsers)
            .unwrap();
        assert!(!fx.visibility.can_view_post("friend", &post.id).unwrap());

        // SUBMITTED
        fx.posts.submit(&post.id, "author", at()).unwrap();
        assert!(!fx.visibility.can_view_post("friend", &post.id).unwrap());

        // ARCHIVED: a second post left as DRAFT through the publish
        let archived = fx
            .posts
            .create_draft("author", None, &body(), Audience::AllUsers)
            .unwrap();
        fx.posts.submit(&archived.id, "author", at()).unwrap();
        fx.posts.unsubmit(&archived.id, "author").unwrap();
        fx.editions.publish_week(at(), publish_time()).unwrap();

        assert_eq!(
            fx.posts.get_own(&archived.id, "author").unwrap().status,
            "ARCHIVED"
        );
        assert!(!fx.visibility.can_view_post("friend", &archived.id).unwrap());
        // The author still sees it
        assert!(fx.visibility.can_view_post("author", &archived.id).unwrap());
    }

    #[test]
    fn test_all_users_audience_is_open_once_published() {
        let fx = setup();
        let post = fx
            .posts
            .create_draft("author", None, &body(), Audience::AllUsers)
            .unwrap();
        submit_and_publish(&fx, &post.id);

        assert!(fx.visibility.can_view_post("stranger", &post.id).unwrap());
    }

    #[test]
    fn test_friends_audience_requires_accepted_edge() {
        let fx = setup();
        let post = fx
            .posts
            .create_draft("author", None, &body(), Audience::Friends)
            .unwrap();
        submit_and_publish(&fx, &post.id);

        // No edge, and a merely pending edge, are both insufficient
        assert!(!fx.visibility.can_view_post("friend", &post.id).unwrap());
        fx.friends.request("friend", "author").unwrap();
        assert!(!fx.visibility.can_view_post("friend", &post.id).unwrap());

        // Acceptance reveals the post, in either direction
        fx.friends.accept("author", "friend").unwrap();
        assert!(fx.visibility.can_view_post("friend", &post.id).unwrap());

        assert!(!fx.visibility.can_view_post("stranger", &post.id).unwrap());
    }

    #[test]
    fn test_visibility_tracks_current_relationship_state() {
        let fx = setup();
        befriend(&fx, "author", "friend");
        let post = fx
            .posts
            .create_draft("author", None, &body(), Audience::Friends)
            .unwrap();
        submit_and_publish(&fx, &post.id);
        assert!(fx.visibility.can_view_post("friend", &post.id).unwrap());

        // Unfriending hides the post from the next read on
        fx.friends.unfriend("friend", "author").unwrap();
        assert!(!fx.visibility.can_view_post("friend", &post.id).unwrap());

        // Re-friending reveals it again; there is no snapshot
        befriend(&fx, "friend", "author");
        assert!(fx.visibility.can_view_post("friend", &post.id).unwrap());
    }

    #[test]
    fn test_circle_audience_requires_joined_membership() {
        let fx = setup();
        befriend(&fx, "author", "member");
        befriend(&fx, "author", "friend");
        let circle = fx.circles.create("author", "Club", None).unwrap();
        fx.circles.add_member("author", &circle.id, "member").unwrap();
        fx.circles.add_member("author", &circle.id, "friend").unwrap();
        // friend leaves before publication
        fx.circles.leave("friend", &circle.id).unwrap();

        let post = fx
            .posts
            .create_draft("author", None, &body(), Audience::Circle(circle.id.clone()))
            .unwrap();
        submit_and_publish(&fx, &post.id);

        assert!(fx.visibility.can_view_post("member", &post.id).unwrap());
        assert!(!fx.visibility.can_view_post("friend", &post.id).unwrap());
        // Being a friend of the author is not enough for a circle post
        assert!(!fx.visibility.can_view_post("stranger", &post.id).unwrap());
    }

    #[test]
    fn test_missing_post_reads_as_invisible() {
        let fx = setup();
        assert!(!fx.visibility.can_view_post("stranger", "missing").unwrap());
    }

    #[test]
    fn test_list_visible_posts_filters_and_orders() {
        let fx = setup();
        befriend(&fx, "author", "friend");

        let open = fx
            .posts
            .create_draft("author", Some("open"), &body(), Audience::AllUsers)
            .unwrap();
        let friends_only = fx
            .posts
            .create_draft("author", Some("friends"), &body(), Audience::Friends)
            .unwrap();
        let hidden_draft = fx
            .posts
            .create_draft("author", Some("draft"), &body(), Audience::AllUsers)
            .unwrap();

        fx.posts.submit(&open.id, "author", at()).unwrap();
        fx.posts.submit(&friends_only.id, "author", at()).unwrap();
        fx.posts.submit(&hidden_draft.id, "author", at()).unwrap();
        fx.posts.unsubmit(&hidden_draft.id, "author").unwrap();
        fx.editions.publish_week(at(), publish_time()).unwrap();

        let edition_id = fx
            .posts
            .get_own(&open.id, "author")
            .unwrap()
            .edition_id
            .unwrap();

        // The friend sees both published posts; the archived draft never
        // appears. Both were promoted in the same sweep, so the tiebreak
        // is creation order.
        let seen = fx
            .visibility
            .list_visible_posts("friend", &edition_id)
            .unwrap();
        let titles: Vec<_> = seen.iter().map(|p| p.title.as_deref().unwrap()).collect();
        assert_eq!(titles, vec!["open", "friends"]);

        // A stranger sees only the open post
        let seen = fx
            .visibility
            .list_visible_posts("stranger", &edition_id)
            .unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].id, open.id);

        // The author sees everything, including the archived draft
        let seen = fx
            .visibility
            .list_visible_posts("author", &edition_id)
            .unwrap();
        assert_eq!(seen.len(), 3);

        assert!(matches!(
            fx.visibility.list_visible_posts("friend", "missing"),
            Err(Error::EditionNotFound)
        ));
    }

    #[test]
    fn test_filter_visible_preserves_input_order() {
        let fx = setup();
        let a = fx
            .posts
            .create_draft("author", Some("a"), &body(), Audience::AllUsers)
            .unwrap();
        let b = fx
            .posts
            .create_draft("author", Some("b"), &body(), Audience::AllUsers)
            .unwrap();
        submit_and_publish(&fx, &a.id);
        fx.posts.submit(&b.id, "author", at()).unwrap();
        fx.editions.publish_week(at(), publish_time()).unwrap();

        let a = fx.posts.get_own(&a.id, "author").unwrap();
        let b = fx.posts.get_own(&b.id, "author").unwrap();

        let kept = fx
            .visibility
            .filter_visible("stranger", &[b.clone(), a.clone()])
            .unwrap();
        assert_eq!(kept[0].id, b.id);
        assert_eq!(kept[1].id, a.id);
    }
}
