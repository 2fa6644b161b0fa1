use std::sync::Arc;

use anyhow::Result;
use pix_core::{bail_pix, NewUser, Principal, SetOp, User, UserId, UserStore};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowToggle {
    pub following: bool,
}

pub struct UserService {
    users: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn register(&self, user: NewUser) -> Result<User> {
        let user = self.users.insert(user).await?;
        tracing::info!(user = %user.id, username = %user.username, "user registered");
        Ok(user)
    }

    /// Flip whether `viewer` follows `target`.
    pub async fn toggle_follow(&self, viewer: Option<&Principal>, target: &UserId) -> Result<FollowToggle> {
        let viewer = Principal::require(viewer)?;
        if viewer.id == *target {
            bail_pix!(bad_request, "You cannot follow yourself");
        }

        // Both must exist; read the follower fresh rather than trusting the principal snapshot
        self.users.get(target).await?;
        let current = self.users.get(&viewer.id).await?;

        let op = SetOp::toggle(current.following.contains(target));
        let updated = self.users.update_following(&viewer.id, target, op).await?;

        Ok(FollowToggle {
            following: updated.following.contains(target),
        })
    }
}
