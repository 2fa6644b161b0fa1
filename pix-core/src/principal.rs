//! The authenticated principal handed in by the auth layer.

use std::collections::BTreeSet;

use crate::errors::PixError;
use crate::models::{ImageId, User, UserId};

/// Context carried with every viewer-scoped operation.
///
/// Authentication itself happens elsewhere; this is only the identity it
/// produced, snapshotted at request start.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub id: UserId,
    pub following: BTreeSet<UserId>,
    pub likes: BTreeSet<ImageId>,
}

impl Principal {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: UserId(id.into()),
            following: BTreeSet::new(),
            likes: BTreeSet::new(),
        }
    }

    /// `following ∪ {self}`: the authors a feed is built from.
    pub fn feed_authors(&self) -> BTreeSet<UserId> {
        let mut authors = self.following.clone();
        authors.insert(self.id.clone());
        authors
    }

    /// Reject a missing principal with `NotAuthenticated`.
    pub fn require(principal: Option<&Principal>) -> anyhow::Result<&Principal> {
        principal.ok_or_else(|| PixError::not_authenticated("Please log in to continue").into_anyhow())
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            following: user.following.clone(),
            likes: user.likes.clone(),
        }
    }
}
