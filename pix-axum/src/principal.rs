use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use pix_core::{ErrorKind, PixError, Principal, UserId, UserStore};

use crate::PixAxumError;

/// Header the authentication layer sets to the signed-in user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// User store handle the principal is resolved against.
pub type UserDirectory = Arc<dyn UserStore>;

pub fn user_id_from_headers(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(UserId::from)
}

fn login_required() -> PixAxumError {
    PixError::not_authenticated("Please log in to continue").into()
}

/// The signed-in user, loaded fresh from the user store.
///
/// A missing header or an id the store does not know rejects with 401.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Principal);

impl<S> FromRequestParts<S> for Authenticated
where
    UserDirectory: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = PixAxumError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let id = user_id_from_headers(&parts.headers).ok_or_else(login_required)?;
        let users = UserDirectory::from_ref(state);

        match users.get(&id).await {
            Ok(user) => Ok(Self(Principal::from(&user))),
            Err(e) if PixError::kind_of(&e) == Some(ErrorKind::NotFound) => {
                tracing::debug!(user = %id, "unknown principal");
                Err(login_required())
            }
            Err(e) => Err(e.into()),
        }
    }
}
