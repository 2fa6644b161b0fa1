use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header::LOCATION, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use pix_axum::{map_json_rejection, Authenticated, PhotoUpload, PixAxumError, RequestId};
use pix_core::{Image, ImageId, ImageSummary, NewUser, PixError, Slug, User, UserId, UserSummary};
use serde::Deserialize;
use serde_json::json;

use crate::services::{
    FeedService, FollowToggle, ImageService, LikeEngine, PixState, UploadService, UserService,
};

pub fn router(state: PixState) -> Router<()> {
    Router::new()
        .route("/users", post(register))
        .route("/api/upload", post(upload))
        .route("/p/{slug}", get(show_image))
        .route("/api/images/{id}/like", post(toggle_like))
        .route("/api/images/{id}/likes", get(likers))
        .route("/api/images/{id}/reconcile", post(reconcile))
        .route("/api/users/{id}/follow", post(toggle_follow))
        .route("/api/feed", get(feed))
        .with_state(state)
}

async fn register(
    State(accounts): State<Arc<UserService>>,
    data: Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), PixAxumError> {
    let Json(data) = data.map_err(map_json_rejection)?;
    let user = accounts.register(data).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Accepts the upload, then redirects to the new image's page.
async fn upload(
    State(uploads): State<Arc<UploadService>>,
    Authenticated(me): Authenticated,
    request_id: RequestId,
    form: PhotoUpload,
) -> Result<impl IntoResponse, PixAxumError> {
    let image = uploads
        .publish(&me, form.artifact, form.caption, request_id.as_deref())
        .await?;
    let location = format!("/p/{}", image.slug);
    let body = json!({
        "slug": image.slug,
        "id": image.id,
        "url": image.summary().url,
    });
    Ok((StatusCode::SEE_OTHER, [(LOCATION, location)], Json(body)))
}

async fn show_image(
    State(images): State<Arc<ImageService>>,
    Path(slug): Path<String>,
) -> Result<Json<Image>, PixAxumError> {
    Ok(Json(images.show_image(&Slug::from(slug)).await?))
}

async fn toggle_like(
    State(likes): State<Arc<LikeEngine>>,
    Authenticated(me): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Vec<UserId>>, PixAxumError> {
    let toggle = likes.toggle_like(Some(&me), &ImageId::from(id)).await?;
    Ok(Json(toggle.liked_by))
}

async fn likers(
    State(likes): State<Arc<LikeEngine>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<UserSummary>>, PixAxumError> {
    Ok(Json(likes.likers(&ImageId::from(id)).await?))
}

/// Repair like edges that disagree between the image and its likers.
async fn reconcile(
    State(likes): State<Arc<LikeEngine>>,
    Authenticated(_me): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, PixAxumError> {
    let repaired = likes.reconcile_image(&ImageId::from(id)).await?;
    Ok(Json(json!({ "repaired": repaired })))
}

async fn toggle_follow(
    State(accounts): State<Arc<UserService>>,
    Authenticated(me): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<FollowToggle>, PixAxumError> {
    Ok(Json(accounts.toggle_follow(Some(&me), &UserId::from(id)).await?))
}

#[derive(Debug, Default, Deserialize)]
struct FeedQuery {
    offset: Option<usize>,
}

async fn feed(
    State(feed): State<Arc<FeedService>>,
    Authenticated(me): Authenticated,
    query: Result<Query<FeedQuery>, QueryRejection>,
) -> Result<Json<Vec<ImageSummary>>, PixAxumError> {
    let Query(query) = query.map_err(|e| {
        PixError::bad_request("Invalid feed query").with_errors(json!({"_query": [e.body_text()]}))
    })?;
    let images = feed.compose_feed(Some(&me), query.offset.unwrap_or(0)).await?;
    Ok(Json(images.iter().map(Image::summary).collect()))
}
