use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use pix_core::errors::PixError;
use pix_core::{
    AuthorWindow, Image, ImageId, ImageStore, NewImage, NewUser, SetOp, Slug, User, UserId, UserStore,
};
use tokio::sync::RwLock;

#[derive(Default)]
struct ImageTable {
    by_id: HashMap<ImageId, Image>,
    by_slug: HashMap<Slug, ImageId>,
}

/// In-memory document store backing both record stores.
///
/// Every mutation is one conditional update applied under the collection's
/// write lock.
#[derive(Default)]
pub struct MemoryStore {
    images: RwLock<ImageTable>,
    users: RwLock<HashMap<UserId, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn image_not_found(what: impl std::fmt::Display) -> anyhow::Error {
    PixError::not_found(format!("No image found for {what}")).into_anyhow()
}

fn user_not_found(id: &UserId) -> anyhow::Error {
    PixError::not_found(format!("No user found for id '{id}'")).into_anyhow()
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn create(&self, image: NewImage) -> Result<Image> {
        let mut table = self.images.write().await;
        if table.by_slug.contains_key(&image.slug) {
            return Err(PixError::persistence(format!("Duplicate slug '{}'", image.slug)).into_anyhow());
        }

        let record = Image {
            id: ImageId::generate(),
            slug: image.slug,
            author: image.author,
            storage_path: image.storage_path,
            content_type: image.content_type,
            width: image.width,
            height: image.height,
            caption: image.caption,
            created_at: Utc::now(),
            liked_by: Default::default(),
            comments: Vec::new(),
        };

        table.by_slug.insert(record.slug.clone(), record.id.clone());
        table.by_id.insert(record.id.clone(), record.clone());
        tracing::debug!(image = %record.id, slug = %record.slug, "image created");
        Ok(record)
    }

    async fn find_by_slug(&self, slug: &Slug) -> Result<Image> {
        let table = self.images.read().await;
        table
            .by_slug
            .get(slug)
            .and_then(|id| table.by_id.get(id))
            .cloned()
            .ok_or_else(|| image_not_found(format_args!("slug '{slug}'")))
    }

    async fn find_by_id(&self, id: &ImageId) -> Result<Image> {
        let table = self.images.read().await;
        table
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| image_not_found(format_args!("id '{id}'")))
    }

    async fn list_by_authors(&self, window: AuthorWindow) -> Result<Vec<Image>> {
        let table = self.images.read().await;
        let mut matching: Vec<&Image> = table
            .by_id
            .values()
            .filter(|img| window.authors.contains(&img.author))
            .collect();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        Ok(matching
            .into_iter()
            .skip(window.offset)
            .take(window.limit)
            .cloned()
            .collect())
    }

    async fn update_liked_by(&self, id: &ImageId, user: &UserId, op: SetOp) -> Result<Image> {
        let mut table = self.images.write().await;
        let image = table
            .by_id
            .get_mut(id)
            .ok_or_else(|| image_not_found(format_args!("id '{id}'")))?;
        op.apply(&mut image.liked_by, user.clone());
        Ok(image.clone())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let username = user.username.trim();
        if username.is_empty() {
            return Err(PixError::bad_request("A username is required")
                .with_errors(serde_json::json!({"username": ["required"]}))
                .into_anyhow());
        }

        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == username) {
            return Err(
                PixError::bad_request("A user with the given username is already registered")
                    .into_anyhow(),
            );
        }

        let record = User {
            id: UserId::generate(),
            username: username.to_string(),
            following: Default::default(),
            likes: Default::default(),
            posts: 0,
        };
        users.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &UserId) -> Result<User> {
        self.users
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| user_not_found(id))
    }

    async fn update_likes(&self, id: &UserId, image: &ImageId, op: SetOp) -> Result<User> {
        let mut users = self.users.write().await;
        let user = users.get_mut(id).ok_or_else(|| user_not_found(id))?;
        op.apply(&mut user.likes, image.clone());
        Ok(user.clone())
    }

    async fn update_following(&self, id: &UserId, followee: &UserId, op: SetOp) -> Result<User> {
        let mut users = self.users.write().await;
        let user = users.get_mut(id).ok_or_else(|| user_not_found(id))?;
        op.apply(&mut user.following, followee.clone());
        Ok(user.clone())
    }

    async fn increment_posts(&self, id: &UserId, by: i64) -> Result<User> {
        let mut users = self.users.write().await;
        let user = users.get_mut(id).ok_or_else(|| user_not_found(id))?;
        user.posts = user.posts.saturating_add_signed(by);
        Ok(user.clone())
    }

    async fn find_liking(&self, image: &ImageId) -> Result<Vec<User>> {
        let users = self.users.read().await;
        let mut liking: Vec<User> = users.values().filter(|u| u.likes.contains(image)).cloned().collect();
        liking.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(liking)
    }
}
