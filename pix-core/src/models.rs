//! Documents owned by the image and user record stores.
//!
//! Cross references between the two aggregates are identifiers only.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a new random id.
            pub fn generate() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::new_v4().simple()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Primary key of an image document.
    ImageId,
    "img"
);
string_id!(
    /// Primary key of a user document.
    UserId,
    "usr"
);
string_id!(
    /// Reference to a comment (comments live outside this pipeline).
    CommentId,
    "cmt"
);
string_id!(
    /// Public, URL-safe identifier of an image; also the stored file stem.
    Slug,
    "slug"
);

/// A posted image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: ImageId,
    pub slug: Slug,
    pub author: UserId,
    pub storage_path: String,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
    pub caption: String,
    pub created_at: DateTime<Utc>,
    pub liked_by: BTreeSet<UserId>,
    pub comments: Vec<CommentId>,
}

impl Image {
    pub fn is_liked_by(&self, user: &UserId) -> bool {
        self.liked_by.contains(user)
    }

    pub fn like_count(&self) -> usize {
        self.liked_by.len()
    }

    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            id: self.id.clone(),
            slug: self.slug.clone(),
            author: self.author.clone(),
            url: format!("/uploads/{}", self.storage_path),
            caption: self.caption.clone(),
            created_at: self.created_at,
            like_count: self.like_count(),
            comment_count: self.comments.len(),
        }
    }
}

/// Input of the image store `create` operation.
///
/// Built only after the artifact has been durably written.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub slug: Slug,
    pub author: UserId,
    pub storage_path: String,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
    pub caption: String,
}

/// Feed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub id: ImageId,
    pub slug: Slug,
    pub author: UserId,
    pub url: String,
    pub caption: String,
    pub created_at: DateTime<Utc>,
    pub like_count: usize,
    pub comment_count: usize,
}

/// A user as consumed by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub following: BTreeSet<UserId>,
    pub likes: BTreeSet<ImageId>,
    pub posts: u64,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            username: self.username.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
}
