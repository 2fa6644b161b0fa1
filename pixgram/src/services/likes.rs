//! Like toggling across the image's `liked_by` and the user's `likes`.
//!
//! The image side is authoritative: the operator is decided from it, applied
//! to it first, then applied unchanged to the user side. Toggles on one
//! (user, image) edge are serialized; if the user side fails the image side
//! is rolled back. Both writes run in a spawned task, so a dropped request
//! cannot stop between them.

use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use pix_core::{
    ErrorKind, ImageId, ImageStore, PixError, Principal, SetOp, UserId, UserStore, UserSummary,
};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{instrument, Instrument};

type Edge = (UserId, ImageId);
type EdgeLocks = DashMap<Edge, Arc<Mutex<()>>>;

/// Outcome of one toggle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
    pub image_id: ImageId,
    pub liked: bool,
    pub like_count: usize,
    pub liked_by: Vec<UserId>,
}

/// Exclusive hold on one edge. Dropping it unlocks the edge and forgets
/// the lock once nobody else is waiting on it.
struct EdgeLease {
    locks: Arc<EdgeLocks>,
    edge: Edge,
    guard: Option<OwnedMutexGuard<()>>,
}

impl EdgeLease {
    async fn acquire(locks: &Arc<EdgeLocks>, edge: Edge) -> Self {
        let lock = locks.entry(edge.clone()).or_default().clone();
        let mut lease = Self {
            locks: Arc::clone(locks),
            edge,
            guard: None,
        };
        lease.guard = Some(lock.lock_owned().await);
        lease
    }
}

impl Drop for EdgeLease {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.edge, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[derive(Clone)]
pub struct LikeEngine {
    images: Arc<dyn ImageStore>,
    users: Arc<dyn UserStore>,
    edges: Arc<EdgeLocks>,
}

impl LikeEngine {
    pub fn new(images: Arc<dyn ImageStore>, users: Arc<dyn UserStore>) -> Self {
        Self {
            images,
            users,
            edges: Arc::new(DashMap::new()),
        }
    }

    /// Flip `viewer`'s like on `image_id`.
    #[instrument(skip(self, viewer), fields(user = viewer.map(|p| p.id.as_str())))]
    pub async fn toggle_like(&self, viewer: Option<&Principal>, image_id: &ImageId) -> Result<LikeToggle> {
        let viewer = Principal::require(viewer)?;
        // Unknown users fail before either side is touched
        self.users.get(&viewer.id).await?;

        let engine = self.clone();
        let edge = (viewer.id.clone(), image_id.clone());
        let task = tokio::spawn(
            async move {
                let _lease = EdgeLease::acquire(&engine.edges, edge.clone()).await;
                engine.toggle_locked(&edge.0, &edge.1).await
            }
            .in_current_span(),
        );

        task.await.map_err(|e| {
            PixError::general_error("Like toggle did not complete")
                .with_source(e.into())
                .into_anyhow()
        })?
    }

    async fn toggle_locked(&self, user: &UserId, image_id: &ImageId) -> Result<LikeToggle> {
        let current = self.images.find_by_id(image_id).await?;
        let op = SetOp::toggle(current.is_liked_by(user));

        let updated = self.images.update_liked_by(image_id, user, op).await?;

        if let Err(e) = self.users.update_likes(user, image_id, op).await {
            if let Err(rollback) = self.images.update_liked_by(image_id, user, op.inverse()).await {
                tracing::error!(
                    %user, image = %image_id, error = %rollback,
                    "failed to roll back image-side like, reconciling edge"
                );
                if let Err(repair) = self.reconcile_edge(user, image_id).await {
                    tracing::error!(%user, image = %image_id, error = %repair, "like edge left inconsistent");
                }
            }
            return Err(PixError::persistence("Could not update the like")
                .with_source(e)
                .into_anyhow());
        }

        tracing::debug!(%user, image = %image_id, ?op, "like toggled");

        Ok(LikeToggle {
            image_id: updated.id.clone(),
            liked: op.resulting_membership(),
            like_count: updated.like_count(),
            liked_by: updated.liked_by.into_iter().collect(),
        })
    }

    /// Repair the edges of one image so both sides agree with `liked_by`.
    ///
    /// Returns how many edges were changed.
    #[instrument(skip(self))]
    pub async fn reconcile_image(&self, image_id: &ImageId) -> Result<usize> {
        let image = self.images.find_by_id(image_id).await?;

        let mut candidates: Vec<UserId> = image.liked_by.iter().cloned().collect();
        for user in self.users.find_liking(image_id).await? {
            if !image.liked_by.contains(&user.id) {
                candidates.push(user.id);
            }
        }

        let mut repaired = 0;
        for user in candidates {
            let _lease = EdgeLease::acquire(&self.edges, (user.clone(), image_id.clone())).await;
            if self.reconcile_edge(&user, image_id).await? {
                repaired += 1;
            }
        }

        if repaired > 0 {
            tracing::info!(image = %image_id, repaired, "like edges reconciled");
        }
        Ok(repaired)
    }

    async fn reconcile_edge(&self, user: &UserId, image_id: &ImageId) -> Result<bool> {
        let image = self.images.find_by_id(image_id).await?;
        let liked = image.is_liked_by(user);

        let account = match self.users.get(user).await {
            Ok(account) => account,
            Err(e) if PixError::kind_of(&e) == Some(ErrorKind::NotFound) => {
                // Dangling like from a user that no longer exists
                if liked {
                    self.images.update_liked_by(image_id, user, SetOp::Pull).await?;
                    return Ok(true);
                }
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        if account.likes.contains(image_id) == liked {
            return Ok(false);
        }
        let op = if liked { SetOp::AddToSet } else { SetOp::Pull };
        self.users.update_likes(user, image_id, op).await?;
        Ok(true)
    }

    /// Users who like `image_id`, in `liked_by` order.
    pub async fn likers(&self, image_id: &ImageId) -> Result<Vec<UserSummary>> {
        let image = self.images.find_by_id(image_id).await?;
        let mut out = Vec::with_capacity(image.liked_by.len());
        for id in &image.liked_by {
            match self.users.get(id).await {
                Ok(user) => out.push(user.summary()),
                Err(e) if PixError::kind_of(&e) == Some(ErrorKind::NotFound) => {
                    tracing::debug!(user = %id, image = %image_id, "skipping unknown liker");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::adapters::memory_store::MemoryStore;
    use async_trait::async_trait;
    use pix_core::{Image, NewImage, NewUser, Slug, User};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    async fn fixture() -> (Arc<MemoryStore>, LikeEngine, User, Image) {
        let store = Arc::new(MemoryStore::new());
        let author = store.insert(NewUser { username: "author".into() }).await.unwrap();
        let fan = store.insert(NewUser { username: "fan".into() }).await.unwrap();
        let image = store
            .create(NewImage {
                slug: Slug::from("s"),
                author: author.id.clone(),
                storage_path: "s.jpeg".into(),
                content_type: "image/jpeg".into(),
                width: 1,
                height: 1,
                caption: String::new(),
            })
            .await
            .unwrap();
        let engine = LikeEngine::new(store.clone(), store.clone());
        (store, engine, fan, image)
    }

    async fn assert_consistent(store: &MemoryStore, user: &UserId, image: &ImageId) -> bool {
        let liked = store.find_by_id(image).await.unwrap().is_liked_by(user);
        let listed = store.get(user).await.unwrap().likes.contains(image);
        assert_eq!(liked, listed, "image and user disagree");
        liked
    }

    #[tokio::test]
    async fn toggle_twice_restores_both_sides() {
        let (store, engine, fan, image) = fixture().await;
        let viewer = Principal::from(&fan);

        let first = engine.toggle_like(Some(&viewer), &image.id).await.unwrap();
        assert!(first.liked);
        assert_eq!(first.liked_by, vec![fan.id.clone()]);
        assert!(store.get(&fan.id).await.unwrap().likes.contains(&image.id));

        let second = engine.toggle_like(Some(&viewer), &image.id).await.unwrap();
        assert!(!second.liked);
        assert_eq!(second.like_count, 0);
        assert!(!assert_consistent(&store, &fan.id, &image.id).await);
        assert!(engine.edges.is_empty());
    }

    #[tokio::test]
    async fn missing_principal_image_or_user() {
        let (_store, engine, fan, image) = fixture().await;

        let err = engine.toggle_like(None, &image.id).await.unwrap_err();
        assert_eq!(PixError::kind_of(&err), Some(ErrorKind::NotAuthenticated));

        let err = engine
            .toggle_like(Some(&Principal::from(&fan)), &ImageId::from("img_missing"))
            .await
            .unwrap_err();
        assert_eq!(PixError::kind_of(&err), Some(ErrorKind::NotFound));

        let err = engine
            .toggle_like(Some(&Principal::new("usr_ghost")), &image.id)
            .await
            .unwrap_err();
        assert_eq!(PixError::kind_of(&err), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn concurrent_toggles_keep_sides_in_agreement() {
        let (store, engine, fan, image) = fixture().await;
        let engine = Arc::new(engine);
        let viewer = Principal::from(&fan);

        let tasks: Vec<_> = (0..25)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let viewer = viewer.clone();
                let id = image.id.clone();
                tokio::spawn(async move { engine.toggle_like(Some(&viewer), &id).await.unwrap() })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        // 25 flips from unliked ends liked
        assert!(assert_consistent(&store, &fan.id, &image.id).await);
    }

    /// User store whose next `failures` like updates fail.
    struct FlakyUsers {
        inner: Arc<MemoryStore>,
        failures: AtomicUsize,
    }

    impl FlakyUsers {
        fn new(inner: Arc<MemoryStore>, failures: usize) -> Self {
            Self {
                inner,
                failures: AtomicUsize::new(failures),
            }
        }
    }

    #[async_trait]
    impl UserStore for FlakyUsers {
        async fn insert(&self, user: NewUser) -> Result<User> {
            self.inner.insert(user).await
        }
        async fn get(&self, id: &UserId) -> Result<User> {
            self.inner.get(id).await
        }
        async fn update_likes(&self, id: &UserId, image: &ImageId, op: SetOp) -> Result<User> {
            if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
                anyhow::bail!("connection reset");
            }
            self.inner.update_likes(id, image, op).await
        }
        async fn update_following(&self, id: &UserId, followee: &UserId, op: SetOp) -> Result<User> {
            self.inner.update_following(id, followee, op).await
        }
        async fn increment_posts(&self, id: &UserId, by: i64) -> Result<User> {
            self.inner.increment_posts(id, by).await
        }
        async fn find_liking(&self, image: &ImageId) -> Result<Vec<User>> {
            self.inner.find_liking(image).await
        }
    }

    #[tokio::test]
    async fn failed_user_side_rolls_back_image_side() {
        let (store, _engine, fan, image) = fixture().await;
        let users = Arc::new(FlakyUsers::new(store.clone(), usize::MAX));
        let engine = LikeEngine::new(store.clone(), users.clone());

        let err = engine
            .toggle_like(Some(&Principal::from(&fan)), &image.id)
            .await
            .unwrap_err();
        assert_eq!(PixError::kind_of(&err), Some(ErrorKind::PersistenceError));
        assert!(!assert_consistent(&store, &fan.id, &image.id).await);

        users.failures.store(0, Ordering::SeqCst);
        assert!(engine.toggle_like(Some(&Principal::from(&fan)), &image.id).await.unwrap().liked);
    }

    /// Image store whose `Pull` updates can be made to fail.
    struct FlakyImages {
        inner: Arc<MemoryStore>,
        fail_pulls: AtomicBool,
    }

    #[async_trait]
    impl ImageStore for FlakyImages {
        async fn create(&self, image: NewImage) -> Result<Image> {
            self.inner.create(image).await
        }
        async fn find_by_slug(&self, slug: &Slug) -> Result<Image> {
            self.inner.find_by_slug(slug).await
        }
        async fn find_by_id(&self, id: &ImageId) -> Result<Image> {
            self.inner.find_by_id(id).await
        }
        async fn list_by_authors(&self, window: pix_core::AuthorWindow) -> Result<Vec<Image>> {
            self.inner.list_by_authors(window).await
        }
        async fn update_liked_by(&self, id: &ImageId, user: &UserId, op: SetOp) -> Result<Image> {
            if matches!(op, SetOp::Pull) && self.fail_pulls.load(Ordering::SeqCst) {
                anyhow::bail!("primary stepped down");
            }
            self.inner.update_liked_by(id, user, op).await
        }
    }

    #[tokio::test]
    async fn failed_rollback_reconciles_the_edge() {
        let (store, _engine, fan, image) = fixture().await;
        let images = Arc::new(FlakyImages {
            inner: store.clone(),
            fail_pulls: AtomicBool::new(true),
        });
        let users = Arc::new(FlakyUsers::new(store.clone(), 1));
        let engine = LikeEngine::new(images, users);

        let err = engine
            .toggle_like(Some(&Principal::from(&fan)), &image.id)
            .await
            .unwrap_err();
        assert_eq!(PixError::kind_of(&err), Some(ErrorKind::PersistenceError));

        // The image side kept the like, and the repair carried it to the user
        assert!(assert_consistent(&store, &fan.id, &image.id).await);
        assert!(engine.edges.is_empty());
    }

    /// User store whose like updates wait until the test releases them.
    struct GatedUsers {
        inner: Arc<MemoryStore>,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl UserStore for GatedUsers {
        async fn insert(&self, user: NewUser) -> Result<User> {
            self.inner.insert(user).await
        }
        async fn get(&self, id: &UserId) -> Result<User> {
            self.inner.get(id).await
        }
        async fn update_likes(&self, id: &UserId, image: &ImageId, op: SetOp) -> Result<User> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.update_likes(id, image, op).await
        }
        async fn update_following(&self, id: &UserId, followee: &UserId, op: SetOp) -> Result<User> {
            self.inner.update_following(id, followee, op).await
        }
        async fn increment_posts(&self, id: &UserId, by: i64) -> Result<User> {
            self.inner.increment_posts(id, by).await
        }
        async fn find_liking(&self, image: &ImageId) -> Result<Vec<User>> {
            self.inner.find_liking(image).await
        }
    }

    #[tokio::test]
    async fn aborted_request_still_updates_both_sides() {
        let (store, _engine, fan, image) = fixture().await;
        let users = Arc::new(GatedUsers {
            inner: store.clone(),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let engine = LikeEngine::new(store.clone(), users.clone());

        let request = {
            let engine = engine.clone();
            let viewer = Principal::from(&fan);
            let id = image.id.clone();
            tokio::spawn(async move { engine.toggle_like(Some(&viewer), &id).await })
        };

        // Image side is written, user side is in flight
        users.entered.notified().await;
        request.abort();
        assert!(request.await.unwrap_err().is_cancelled());
        users.release.notify_one();

        tokio::time::timeout(Duration::from_secs(5), async {
            while !engine.edges.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert!(assert_consistent(&store, &fan.id, &image.id).await);
    }

    #[tokio::test]
    async fn reconcile_repairs_both_directions() {
        let (store, engine, fan, image) = fixture().await;
        let other = store.insert(NewUser { username: "other".into() }).await.unwrap();

        // fan: image says liked, user does not; other: user says liked, image does not
        store.update_liked_by(&image.id, &fan.id, SetOp::AddToSet).await.unwrap();
        store.update_likes(&other.id, &image.id, SetOp::AddToSet).await.unwrap();

        assert_eq!(engine.reconcile_image(&image.id).await.unwrap(), 2);
        assert!(assert_consistent(&store, &fan.id, &image.id).await);
        assert!(!assert_consistent(&store, &other.id, &image.id).await);

        assert_eq!(engine.reconcile_image(&image.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn likers_lists_user_summaries() {
        let (store, engine, fan, image) = fixture().await;
        engine.toggle_like(Some(&Principal::from(&fan)), &image.id).await.unwrap();
        store.update_liked_by(&image.id, &UserId::from("usr_gone"), SetOp::AddToSet).await.unwrap();

        let likers = engine.likers(&image.id).await.unwrap();
        assert_eq!(likers, vec![fan.summary()]);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn toggle_sequences_preserve_invariant(script in proptest::collection::vec((0usize..3, 0usize..2), 1..40)) {
                let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
                rt.block_on(async {
                    let store = Arc::new(MemoryStore::new());
                    let mut users = Vec::new();
                    for i in 0..3 {
                        users.push(store.insert(NewUser { username: format!("u{i}") }).await.unwrap());
                    }
                    let mut images = Vec::new();
                    for i in 0..2 {
                        images.push(store.create(NewImage {
                            slug: Slug::from(format!("s{i}")),
                            author: users[0].id.clone(),
                            storage_path: format!("s{i}.png"),
                            content_type: "image/png".into(),
                            width: 1,
                            height: 1,
                            caption: String::new(),
                        }).await.unwrap());
                    }
                    let engine = LikeEngine::new(store.clone(), store.clone());

                    let mut expected = std::collections::BTreeSet::new();
                    for (u, i) in script {
                        let toggle = engine
                            .toggle_like(Some(&Principal::from(&users[u])), &images[i].id)
                            .await
                            .unwrap();
                        let key = (u, i);
                        let now_liked = expected.insert(key) || { expected.remove(&key); false };
                        assert_eq!(toggle.liked, now_liked);
                        for user in &users {
                            for image in &images {
                                assert_consistent(&store, &user.id, &image.id).await;
                            }
                        }
                    }
                });
            }
        }
    }
}
