use std::collections::BTreeSet;

use async_trait::async_trait;
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::{Image, ImageId, NewImage, NewUser, Slug, User, UserId};

/// Conditional set operator applied by a store in one atomic update.
///
/// `AddToSet` adds the member only if absent, `Pull` removes it only if
/// present, so neither can produce duplicates or fail on a missing member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetOp {
    AddToSet,
    Pull,
}

impl SetOp {
    /// The operator that flips the current membership.
    pub fn toggle(present: bool) -> Self {
        if present {
            SetOp::Pull
        } else {
            SetOp::AddToSet
        }
    }

    pub fn inverse(self) -> Self {
        match self {
            SetOp::AddToSet => SetOp::Pull,
            SetOp::Pull => SetOp::AddToSet,
        }
    }

    /// Membership after the operator has been applied.
    pub fn resulting_membership(self) -> bool {
        matches!(self, SetOp::AddToSet)
    }

    /// Apply to an in-memory set. Returns whether the set changed.
    pub fn apply<T: Ord>(self, set: &mut BTreeSet<T>, member: T) -> bool {
        match self {
            SetOp::AddToSet => set.insert(member),
            SetOp::Pull => set.remove(&member),
        }
    }
}

/// Window over the images of a set of authors, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorWindow {
    pub authors: BTreeSet<UserId>,
    pub limit: usize,
    pub offset: usize,
}

impl AuthorWindow {
    pub fn new(authors: BTreeSet<UserId>, limit: usize) -> Self {
        Self {
            authors,
            limit,
            offset: 0,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Image record store.
///
/// - `create`           → insert one (slug must be unique)
/// - `find_by_slug`     → find one by public slug
/// - `find_by_id`       → find one by primary key
/// - `list_by_authors`  → find many, sorted by `created_at` desc, limited
/// - `update_liked_by`  → conditional set update on `liked_by`
///
/// Missing documents fail with `NotFound`, write failures with
/// `PersistenceError` (both as `PixError` inside `anyhow::Error`).
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn create(&self, image: NewImage) -> Result<Image>;

    async fn find_by_slug(&self, slug: &Slug) -> Result<Image>;

    async fn find_by_id(&self, id: &ImageId) -> Result<Image>;

    /// Ordering is `created_at` descending with ties broken by id
    /// descending, so consecutive calls page deterministically.
    async fn list_by_authors(&self, window: AuthorWindow) -> Result<Vec<Image>>;

    /// Returns the document as it is after the update.
    async fn update_liked_by(&self, id: &ImageId, user: &UserId, op: SetOp) -> Result<Image>;
}

/// User record store, as far as this pipeline needs it.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<User>;

    async fn get(&self, id: &UserId) -> Result<User>;

    async fn update_likes(&self, id: &UserId, image: &ImageId, op: SetOp) -> Result<User>;

    async fn update_following(&self, id: &UserId, followee: &UserId, op: SetOp) -> Result<User>;

    async fn increment_posts(&self, id: &UserId, by: i64) -> Result<User>;

    /// Users whose `likes` contain `image`.
    async fn find_liking(&self, image: &ImageId) -> Result<Vec<User>>;
}
